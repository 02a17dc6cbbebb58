mod config;
mod currency;
mod editor;
mod extract;
mod memory;
mod model;
mod render;
mod share;
mod state;
mod store;
mod totals;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{CommandFactory, Parser, Subcommand};
use inquire::InquireError;
use slug::slugify;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppSettings, DataLayout};
use crate::extract::{ExtractError, ExtractionGate, LlmExtractor, smart_fill};
use crate::memory::SavedEntities;
use crate::model::{InvoiceData, TemplateKind};
use crate::render::html::HtmlRenderer;
use crate::share::ShareError;
use crate::state::WorkingInvoice;
use crate::store::FileStore;

#[derive(Parser)]
#[command(name = "invoice-studio", version, about = "Create, preview, share and print invoices")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview the current invoice in the terminal
    Show {
        /// Preview with another layout (modern, classic, minimal) without changing the invoice
        #[arg(long)]
        template: Option<String>,
    },
    /// Edit invoice fields interactively
    Edit,
    /// Add a line item
    AddItem,
    /// Remove a line item
    RemoveItem,
    /// Add a fee or discount
    AddFee,
    /// Remove a fee or discount
    RemoveFee,
    /// Fill in the invoice from free text using the extraction model
    Import {
        /// Text to read; prompts when omitted
        text: Option<String>,
        /// Read the text from a file instead
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// Create a share link for the current invoice
    Share {
        /// Also print a mailto: draft addressed to the client
        #[arg(long)]
        email: bool,
    },
    /// Open an invoice from a share link
    OpenShare {
        /// Full link or bare `share` parameter
        link: String,
        /// Keep the shared invoice as your working invoice
        #[arg(long)]
        clone: bool,
        /// Write it out for printing as well
        #[arg(long)]
        print: bool,
    },
    /// Write the invoice as HTML and open it for printing
    Print {
        /// Only write the file
        #[arg(long)]
        no_open: bool,
    },
    /// Start over with a fresh invoice
    Reset {
        /// Skip the confirmation
        #[arg(long)]
        yes: bool,
    },
    /// List saved clients
    Clients,
    /// List saved items
    Items,
    /// Configure data directory, share link and extraction settings
    Config,
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_cancellation(&e) => {
            println!("Operation cancelled.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn is_cancellation(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<InquireError>(),
            Some(InquireError::OperationCanceled | InquireError::OperationInterrupted)
        )
    })
}

fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let settings = match config::load()? {
        Some(settings) => settings,
        None => {
            let settings = config::setup_config_wizard()?;
            if matches!(command, Commands::Config) {
                return Ok(());
            }
            settings
        }
    };
    let layout = settings.layout();
    let store = FileStore::open(layout.state_dir())?;
    debug!(root = %layout.root().display(), "Using data directory");

    let saved = SavedEntities::new(&store);
    let mut working = WorkingInvoice::open(&store);

    match command {
        Commands::Show { template } => {
            let doc = match template {
                Some(name) => render::render_as(working.invoice(), TemplateKind::from_name(&name)),
                None => render::render(working.invoice()),
            };
            println!("{}", render::terminal::preview(&doc));
        }
        Commands::Edit => {
            editor::edit_loop(&mut working, &saved)?;
            show(working.invoice());
        }
        Commands::AddItem => editor::add_item(&mut working, &saved)?,
        Commands::RemoveItem => editor::remove_item(&mut working)?,
        Commands::AddFee => editor::add_fee(&mut working)?,
        Commands::RemoveFee => editor::remove_fee(&mut working)?,
        Commands::Import { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => editor::prompt_import_text()?,
            };
            import(&settings, &mut working, &text)?;
        }
        Commands::Share { email } => share_current(&settings, working.invoice(), email)?,
        Commands::OpenShare { link, clone, print } => {
            let mut view = WorkingInvoice::open_with_share(&store, Some(&link));
            if !view.is_shared() {
                println!("❌ Could not read that share link. Showing your working invoice instead.");
            }
            show(view.invoice());
            if clone && view.is_shared() {
                view.clone_shared()?;
                println!("✅ Shared invoice saved as your working invoice.");
            }
            if print {
                print_invoice(&layout, view.invoice(), true)?;
            }
        }
        Commands::Print { no_open } => {
            print_invoice(&layout, working.invoice(), !no_open)?;
        }
        Commands::Reset { yes } => {
            if yes || editor::confirm_reset()? {
                working.reset(Local::now().date_naive())?;
                println!("✨ Started a new invoice.");
            } else {
                println!("Operation cancelled.");
            }
        }
        Commands::Clients => {
            let clients = saved.clients();
            if clients.is_empty() {
                println!("No saved clients yet. They are remembered as you fill in invoices.");
            } else {
                println!("{}", editor::clients_table(&clients));
            }
        }
        Commands::Items => {
            let items = saved.items();
            if items.is_empty() {
                println!("No saved items yet. They are remembered as you add line items.");
            } else {
                println!("{}", editor::items_table(&items, &working.invoice().currency));
            }
        }
        Commands::Config => {
            config::setup_config_wizard()?;
        }
    }
    Ok(())
}

fn show(invoice: &InvoiceData) {
    println!("{}", render::terminal::preview(&render::render(invoice)));
}

fn import(settings: &AppSettings, working: &mut WorkingInvoice<&FileStore>, text: &str) -> Result<()> {
    let extractor = match LlmExtractor::from_settings(&settings.extraction) {
        Ok(extractor) => extractor,
        Err(e) if e.is_configuration() => {
            println!("❌ {e}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let gate = ExtractionGate::new();

    println!("🔍 Reading your text...");
    match smart_fill(&extractor, &gate, working, text) {
        Ok(true) => {
            println!("✨ Invoice updated.");
            show(working.invoice());
        }
        Ok(false) => println!("Nothing to import."),
        Err(ExtractError::Persist(e)) => return Err(e.into()),
        Err(e) => {
            debug!(error = %e, "Import failed");
            println!("❌ Failed to parse text. Please try again.");
        }
    }
    Ok(())
}

fn share_current(settings: &AppSettings, invoice: &InvoiceData, email: bool) -> Result<()> {
    match share::share_link(&settings.share.base_url, invoice) {
        Ok(link) => {
            println!("🔗 Share link:\n{link}");
            println!("{}", share::open_hint(&link));
            if email {
                println!("\n✉️  Email draft:\n{}", share::mail_draft(invoice, &link));
            }
        }
        Err(e @ ShareError::TooLarge { .. }) => {
            println!("❌ {e}");
            println!("You can still print the invoice with `invoice-studio print`.");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn print_invoice(layout: &DataLayout, invoice: &InvoiceData, open: bool) -> Result<PathBuf> {
    let renderer = HtmlRenderer::from_dir(&layout.templates_dir())?;
    let html = renderer.render(&render::render(invoice))?;

    let output_dir = layout.output_dir();
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let path = output_dir.join(output_file_name(invoice));
    fs::write(&path, html).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("✅ Invoice written: {}", path.display());

    if open {
        open_in_browser(&path);
        println!("🖨️  Use your browser's Print dialog and choose \"Save as PDF\" to export.");
    }
    Ok(path)
}

fn output_file_name(invoice: &InvoiceData) -> String {
    let stem = slugify(&invoice.invoice_number);
    if stem.is_empty() { "invoice.html".to_string() } else { format!("{stem}.html") }
}

fn open_in_browser(path: &Path) {
    #[cfg(target_os = "macos")]
    let spawned = Command::new("open").arg(path).spawn();

    #[cfg(target_os = "windows")]
    let spawned = Command::new("explorer").arg(path).spawn();

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let spawned = Command::new("xdg-open").arg(path).spawn();

    if let Err(e) = spawned {
        warn!(path = %path.display(), error = %e, "Failed to open invoice");
        println!("Open {} in your browser to print it.", path.display());
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn output_name_is_slugged_invoice_number() {
        let mut inv = InvoiceData::new_for(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        inv.invoice_number = "INV 2025/07".into();
        assert_eq!(output_file_name(&inv), "inv-2025-07.html");
        inv.invoice_number = "  ".into();
        assert_eq!(output_file_name(&inv), "invoice.html");
    }

    #[test]
    fn print_writes_html_into_the_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let inv = InvoiceData::new_for(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        let path = print_invoice(&layout, &inv, false).unwrap();
        assert_eq!(path, layout.output_dir().join("inv-001.html"));
        let html = fs::read_to_string(path).unwrap();
        assert!(html.contains("Consulting Services"));
        assert!(layout.templates_dir().join("modern.html").exists());
    }

    #[test]
    fn cancelled_prompts_are_recognised_through_wrappers() {
        let direct = anyhow::Error::from(InquireError::OperationCanceled);
        assert!(is_cancellation(&direct));
        let wrapped = anyhow::Error::from(config::ConfigError::Prompt(InquireError::OperationInterrupted));
        assert!(is_cancellation(&wrapped));
        assert!(!is_cancellation(&anyhow::anyhow!("disk full")));
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["invoice-studio", "open-share", "https://x/?share=abc", "--clone"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::OpenShare { clone: true, print: false, .. })));
        assert!(Cli::try_parse_from(["invoice-studio", "import", "hello", "--file", "x.txt"]).is_err());
    }
}
