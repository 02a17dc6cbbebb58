use super::{Header, Labeled, Layout, RenderContext, RenderedInvoice};
use crate::model::TemplateKind;

/// Wordmark header, sender block on the right, bracketed placeholders for
/// anything not filled in yet.
pub struct Modern;

impl Layout for Modern {
    fn kind(&self) -> TemplateKind {
        TemplateKind::Modern
    }

    fn compose(&self, ctx: &RenderContext<'_>) -> RenderedInvoice {
        let inv = ctx.invoice;
        let logo = ctx.logo();
        let wordmark = logo.is_none().then(|| "INVOICE".to_string());

        RenderedInvoice {
            template: self.kind(),
            accent: ctx.accent(),
            header: Header { logo, wordmark, title: None, number: ctx.number() },
            sender: ctx.party(&inv.sender, "From", "[Your Business Name]", "[Your Address]"),
            client: ctx.party(&inv.client, "Bill To", "[Client Name]", "[Client Address]"),
            dates: vec![
                Labeled { label: "Date Issue".into(), value: inv.date.clone() },
                Labeled { label: "Due Date".into(), value: inv.due_date.clone() },
            ],
            columns: ["Description".into(), "Qty".into(), "Price".into(), "Amount".into()],
            items: ctx.item_rows("Item description", "No items added yet"),
            totals: ctx.total_rows("Subtotal", ""),
            grand_total: ctx.grand_total("Total"),
            footer: ctx.footer("Payment Terms", "Notes"),
            fine_print: Vec::new(),
        }
    }
}
