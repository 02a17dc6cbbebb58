use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};

use super::{ItemsRegion, RenderedInvoice, RowKind, Text};

/// Plain-terminal preview of a rendered invoice.
pub fn preview(doc: &RenderedInvoice) -> String {
    let accent = accent_rgb(&doc.accent);
    let mut out = String::new();

    let heading = doc
        .header
        .title
        .as_deref()
        .or(doc.header.wordmark.as_deref())
        .unwrap_or("INVOICE");
    out.push_str(&format!("{heading}  {}  ({} layout)\n", doc.header.number, doc.template));
    if doc.header.logo.is_some() {
        out.push_str("[logo]\n");
    }

    let mut parties = Table::new();
    parties.set_header(vec![
        Cell::new(&doc.sender.heading).add_attribute(Attribute::Bold),
        Cell::new(&doc.client.heading).add_attribute(Attribute::Bold),
    ]);
    parties.add_row(vec![text_cell(&doc.sender.name), text_cell(&doc.client.name)]);
    parties.add_row(vec![text_cell(&doc.sender.address), text_cell(&doc.client.address)]);
    parties.add_row(vec![
        Cell::new(doc.sender.email.as_deref().unwrap_or("")),
        Cell::new(doc.client.email.as_deref().unwrap_or("")),
    ]);
    out.push_str(&format!("{parties}\n"));

    let dates: Vec<String> = doc.dates.iter().map(|d| format!("{} {}", d.label, d.value)).collect();
    out.push_str(&format!("{}\n", dates.join("   ")));

    match &doc.items {
        ItemsRegion::Empty(message) => out.push_str(&format!("\n  {message}\n\n")),
        ItemsRegion::Rows(rows) => {
            let mut table = Table::new();
            table.set_header(doc.columns.iter().map(|c| Cell::new(c).add_attribute(Attribute::Bold)));
            for row in rows {
                table.add_row(vec![
                    text_cell(&row.description),
                    Cell::new(&row.quantity).set_alignment(CellAlignment::Right),
                    Cell::new(&row.unit_price).set_alignment(CellAlignment::Right),
                    Cell::new(&row.amount).set_alignment(CellAlignment::Right),
                ]);
            }
            out.push_str(&format!("{table}\n"));
        }
    }

    let mut totals = Table::new();
    for row in &doc.totals {
        let label = Cell::new(&row.label);
        let label = if row.kind == RowKind::Subtotal { label.add_attribute(Attribute::Bold) } else { label };
        totals.add_row(vec![label, Cell::new(&row.value).set_alignment(CellAlignment::Right)]);
    }
    totals.add_row(vec![
        Cell::new(&doc.grand_total.label).add_attribute(Attribute::Bold),
        Cell::new(&doc.grand_total.value)
            .add_attribute(Attribute::Bold)
            .fg(accent)
            .set_alignment(CellAlignment::Right),
    ]);
    out.push_str(&format!("{totals}\n"));

    for entry in &doc.footer {
        out.push_str(&format!("{}: {}\n", entry.label.trim_end_matches(':'), entry.value));
    }
    if !doc.fine_print.is_empty() {
        out.push_str(&format!("{}\n", doc.fine_print.join("  ·  ")));
    }
    out
}

fn text_cell(text: &Text) -> Cell {
    let cell = Cell::new(&text.value);
    if text.placeholder {
        cell.fg(Color::DarkGrey).add_attribute(Attribute::Italic)
    } else {
        cell
    }
}

fn accent_rgb(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    let expanded: String = if digits.len() == 3 {
        digits.chars().flat_map(|c| [c, c]).collect()
    } else {
        digits.to_string()
    };
    let channel = |i: usize| {
        expanded
            .get(i..i + 2)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .unwrap_or(0)
    };
    Color::Rgb { r: channel(0), g: channel(2), b: channel(4) }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{InvoiceData, TemplateKind};
    use crate::render::render_as;

    #[test]
    fn preview_lists_items_and_total() {
        let mut inv = InvoiceData::new_for(NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
        inv.client.name = "Acme Corp".into();
        let out = preview(&render_as(&inv, TemplateKind::Classic));
        assert!(out.contains("Consulting Services"));
        assert!(out.contains("Acme Corp"));
        assert!(out.contains("$100.00"));
        assert!(out.contains("Terms: Net 7"));
    }

    #[test]
    fn preview_shows_empty_message() {
        let mut inv = InvoiceData::new_for(NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
        inv.items.clear();
        let out = preview(&render_as(&inv, TemplateKind::Minimal));
        assert!(out.contains("Nothing billed yet"));
    }

    #[test]
    fn accent_hex_parses_short_and_long_forms() {
        assert_eq!(accent_rgb("#059669"), Color::Rgb { r: 0x05, g: 0x96, b: 0x69 });
        assert_eq!(accent_rgb("#fff"), Color::Rgb { r: 255, g: 255, b: 255 });
    }
}
