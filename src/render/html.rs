use std::fs;
use std::path::{Path, PathBuf};

use tera::{Context, Tera};
use thiserror::Error;
use tracing::{debug, info};

use super::RenderedInvoice;
use crate::model::TemplateKind;

// Embedded at compile time so printing works before the user customises anything.
const BASE_TEMPLATE: &str = include_str!("../../templates/base.html");
const MODERN_TEMPLATE: &str = include_str!("../../templates/modern.html");
const CLASSIC_TEMPLATE: &str = include_str!("../../templates/classic.html");
const MINIMAL_TEMPLATE: &str = include_str!("../../templates/minimal.html");

const DEFAULT_TEMPLATES: [(&str, &str); 4] = [
    ("base.html", BASE_TEMPLATE),
    ("modern.html", MODERN_TEMPLATE),
    ("classic.html", CLASSIC_TEMPLATE),
    ("minimal.html", MINIMAL_TEMPLATE),
];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("failed to prepare template directory {path}: {source}")]
    TemplateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template directory {0} is not valid UTF-8")]
    NonUtf8Path(PathBuf),
}

pub fn template_name(kind: TemplateKind) -> &'static str {
    match kind {
        TemplateKind::Modern => "modern.html",
        TemplateKind::Classic => "classic.html",
        TemplateKind::Minimal => "minimal.html",
    }
}

/// Turns a [`RenderedInvoice`] into a standalone, printable HTML page.
pub struct HtmlRenderer {
    tera: Tera,
}

impl HtmlRenderer {
    /// Uses only the templates compiled into the binary.
    pub fn embedded() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(DEFAULT_TEMPLATES.to_vec())?;
        Ok(Self { tera })
    }

    /// Loads `*.html` from `dir`, first writing any default template that is
    /// missing there so users have something to edit.
    pub fn from_dir(dir: &Path) -> Result<Self, RenderError> {
        install_defaults(dir)?;
        let glob = dir.join("*.html");
        let glob = glob.to_str().ok_or_else(|| RenderError::NonUtf8Path(dir.to_path_buf()))?;
        let tera = Tera::new(glob)?;
        debug!(dir = %dir.display(), templates = tera.get_template_names().count(), "Loaded templates");
        Ok(Self { tera })
    }

    pub fn render(&self, doc: &RenderedInvoice) -> Result<String, RenderError> {
        let context = Context::from_serialize(doc)?;
        Ok(self.tera.render(template_name(doc.template), &context)?)
    }
}

fn install_defaults(dir: &Path) -> Result<(), RenderError> {
    let io_err = |source| RenderError::TemplateDir { path: dir.to_path_buf(), source };
    fs::create_dir_all(dir).map_err(io_err)?;
    for (name, body) in DEFAULT_TEMPLATES {
        let path = dir.join(name);
        if !path.exists() {
            info!(path = %path.display(), "Initializing default template");
            fs::write(&path, body).map_err(io_err)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{Fee, FeeKind, InvoiceData, LineItem};
    use crate::render::render_as;

    fn invoice() -> InvoiceData {
        let mut inv = InvoiceData::new_for(NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
        inv.items = vec![LineItem::new("Consulting", 2.0, 150.0)];
        inv.fees = vec![Fee::new("Rush fee", 25.0, FeeKind::Fixed)];
        inv.tax_rate = 8.0;
        inv.client.name = "Acme <Corp>".into();
        inv
    }

    #[test]
    fn every_layout_renders_to_html() {
        let renderer = HtmlRenderer::embedded().unwrap();
        let inv = invoice();
        for kind in TemplateKind::ALL {
            let html = renderer.render(&render_as(&inv, kind)).unwrap();
            assert!(html.contains("$349.00"), "{kind} is missing the grand total");
            assert!(html.contains("Tax (8%)"), "{kind} is missing the tax row");
            assert!(html.contains("Rush fee"));
            assert!(html.contains("#059669"));
        }
    }

    #[test]
    fn user_text_is_escaped() {
        let renderer = HtmlRenderer::embedded().unwrap();
        let html = renderer.render(&render_as(&invoice(), TemplateKind::Modern)).unwrap();
        assert!(html.contains("Acme &lt;Corp&gt;"));
        assert!(!html.contains("Acme <Corp>"));
    }

    #[test]
    fn zero_tax_leaves_no_tax_markup() {
        let renderer = HtmlRenderer::embedded().unwrap();
        let mut inv = invoice();
        inv.tax_rate = 0.0;
        for kind in TemplateKind::ALL {
            let html = renderer.render(&render_as(&inv, kind)).unwrap();
            assert!(!html.contains("Tax ("), "{kind} still shows tax");
        }
    }

    #[test]
    fn empty_items_show_the_message() {
        let renderer = HtmlRenderer::embedded().unwrap();
        let mut inv = invoice();
        inv.items.clear();
        let html = renderer.render(&render_as(&inv, TemplateKind::Modern)).unwrap();
        assert!(html.contains("No items added yet"));
    }

    #[test]
    fn template_dir_is_seeded_and_overridable() {
        let dir = tempfile::tempdir().unwrap();
        HtmlRenderer::from_dir(dir.path()).unwrap();
        assert!(dir.path().join("modern.html").exists());

        fs::write(
            dir.path().join("modern.html"),
            "CUSTOM {{ grand_total.value }}",
        )
        .unwrap();
        let renderer = HtmlRenderer::from_dir(dir.path()).unwrap();
        let html = renderer.render(&render_as(&invoice(), TemplateKind::Modern)).unwrap();
        assert_eq!(html, "CUSTOM $349.00");
    }
}
