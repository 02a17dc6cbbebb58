//! Projection of an invoice into a presentation-ready layout.
//!
//! Totals are derived once in [`RenderContext`]; each template variant then
//! arranges the same figures through its own [`Layout`] implementation.

mod classic;
pub mod html;
mod minimal;
mod modern;
pub mod terminal;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::currency::format_money;
use crate::model::{DEFAULT_BRAND_COLOR, FeeKind, InvoiceData, Party, TemplateKind};
use crate::totals::{FeeLine, Totals};

pub use classic::Classic;
pub use minimal::Minimal;
pub use modern::Modern;

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid color regex"));

/// A piece of text that may be standing in for a missing value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub value: String,
    pub placeholder: bool,
}

impl Text {
    fn or(value: &str, placeholder: &str) -> Self {
        if value.trim().is_empty() {
            Text { value: placeholder.to_string(), placeholder: !placeholder.is_empty() }
        } else {
            Text { value: value.to_string(), placeholder: false }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    pub logo: Option<String>,
    pub wordmark: Option<String>,
    pub title: Option<String>,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyBlock {
    pub heading: String,
    pub name: Text,
    pub address: Text,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Labeled {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRow {
    pub id: String,
    pub description: Text,
    pub quantity: String,
    pub unit_price: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum ItemsRegion {
    Rows(Vec<ItemRow>),
    Empty(String),
}

impl ItemsRegion {
    pub fn is_empty(&self) -> bool {
        matches!(self, ItemsRegion::Empty(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Subtotal,
    Tax,
    Fee,
    Total,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalRow {
    pub kind: RowKind,
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedInvoice {
    pub template: TemplateKind,
    pub accent: String,
    pub header: Header,
    pub sender: PartyBlock,
    pub client: PartyBlock,
    pub dates: Vec<Labeled>,
    pub columns: [String; 4],
    pub items: ItemsRegion,
    /// Subtotal, tax and fee rows in display order. The grand total is kept apart.
    pub totals: Vec<TotalRow>,
    pub grand_total: TotalRow,
    pub footer: Vec<Labeled>,
    /// Small print along the page edge (minimal layout only).
    pub fine_print: Vec<String>,
}

impl RenderedInvoice {
    pub fn tax_row(&self) -> Option<&TotalRow> {
        self.totals.iter().find(|r| r.kind == RowKind::Tax)
    }
}

/// Read-only view shared by all layouts.
pub struct RenderContext<'a> {
    pub invoice: &'a InvoiceData,
    pub totals: Totals,
}

impl<'a> RenderContext<'a> {
    pub fn new(invoice: &'a InvoiceData) -> Self {
        RenderContext { invoice, totals: invoice.totals() }
    }

    pub fn money(&self, amount: f64) -> String {
        format_money(amount, &self.invoice.currency)
    }

    pub fn accent(&self) -> String {
        accent_color(&self.invoice.brand_color)
    }

    pub fn logo(&self) -> Option<String> {
        self.invoice.logo.clone().filter(|l| !l.trim().is_empty())
    }

    pub fn number(&self) -> String {
        format!("#{}", self.invoice.invoice_number)
    }

    pub fn party(&self, party: &Party, heading: &str, name: &str, address: &str) -> PartyBlock {
        PartyBlock {
            heading: heading.to_string(),
            name: Text::or(&party.name, name),
            address: Text::or(&party.address, address),
            email: non_empty(&party.email),
        }
    }

    /// One row per line item, or the layout's empty-state message.
    pub fn item_rows(&self, description_placeholder: &str, empty: &str) -> ItemsRegion {
        if self.invoice.items.is_empty() {
            return ItemsRegion::Empty(empty.to_string());
        }
        ItemsRegion::Rows(
            self.invoice
                .items
                .iter()
                .map(|item| ItemRow {
                    id: item.id.clone(),
                    description: Text::or(&item.description, description_placeholder),
                    quantity: format!("{}", item.quantity),
                    unit_price: self.money(item.price),
                    amount: self.money(item.amount()),
                })
                .collect(),
        )
    }

    /// Subtotal, optional tax and fee rows; `suffix` is appended to every label.
    pub fn total_rows(&self, subtotal_label: &str, suffix: &str) -> Vec<TotalRow> {
        let mut rows = vec![TotalRow {
            kind: RowKind::Subtotal,
            label: format!("{subtotal_label}{suffix}"),
            value: self.money(self.totals.subtotal),
        }];
        if self.totals.shows_tax() {
            rows.push(TotalRow {
                kind: RowKind::Tax,
                label: format!("{}{suffix}", tax_label(self.totals.tax_rate)),
                value: self.money(self.totals.tax_amount),
            });
        }
        rows.extend(self.totals.fees.iter().map(|fee| TotalRow {
            kind: RowKind::Fee,
            label: format!("{}{suffix}", fee_label(fee)),
            value: self.money(fee.amount),
        }));
        rows
    }

    pub fn grand_total(&self, label: &str) -> TotalRow {
        TotalRow {
            kind: RowKind::Total,
            label: label.to_string(),
            value: self.money(self.totals.grand_total),
        }
    }

    /// Payment terms then notes, each only when filled in.
    pub fn footer(&self, terms: &str, notes: &str) -> Vec<Labeled> {
        let mut footer = Vec::new();
        if let Some(value) = non_empty(&self.invoice.payment_terms) {
            footer.push(Labeled { label: terms.to_string(), value });
        }
        if let Some(value) = non_empty(&self.invoice.notes) {
            footer.push(Labeled { label: notes.to_string(), value });
        }
        footer
    }
}

pub fn tax_label(rate: f64) -> String {
    format!("Tax ({rate}%)")
}

pub fn fee_label(fee: &FeeLine) -> String {
    let name = if fee.description.trim().is_empty() { "Fee" } else { fee.description.as_str() };
    match fee.kind {
        FeeKind::Percent => format!("{name} ({}%)", fee.rate),
        FeeKind::Fixed => name.to_string(),
    }
}

/// The configured brand color if it is a hex color, else the default accent.
pub fn accent_color(color: &str) -> String {
    let color = color.trim();
    if HEX_COLOR.is_match(color) {
        color.to_string()
    } else {
        DEFAULT_BRAND_COLOR.to_string()
    }
}

pub fn is_hex_color(color: &str) -> bool {
    HEX_COLOR.is_match(color.trim())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| value.to_string())
}

/// Something that can arrange an invoice's fields and totals.
pub trait Layout {
    fn kind(&self) -> TemplateKind;
    fn compose(&self, ctx: &RenderContext<'_>) -> RenderedInvoice;
}

pub fn layout_for(kind: TemplateKind) -> &'static dyn Layout {
    match kind {
        TemplateKind::Modern => &Modern,
        TemplateKind::Classic => &Classic,
        TemplateKind::Minimal => &Minimal,
    }
}

/// Render `invoice` with the layout it selects.
pub fn render(invoice: &InvoiceData) -> RenderedInvoice {
    render_as(invoice, invoice.template)
}

pub fn render_as(invoice: &InvoiceData, kind: TemplateKind) -> RenderedInvoice {
    let ctx = RenderContext::new(invoice);
    layout_for(kind).compose(&ctx)
}
