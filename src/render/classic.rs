use super::{Header, Labeled, Layout, RenderContext, RenderedInvoice};
use crate::model::TemplateKind;

/// Centered serif letterhead with ruled tables. Missing party fields are left
/// blank rather than hinted.
pub struct Classic;

impl Layout for Classic {
    fn kind(&self) -> TemplateKind {
        TemplateKind::Classic
    }

    fn compose(&self, ctx: &RenderContext<'_>) -> RenderedInvoice {
        let inv = ctx.invoice;

        RenderedInvoice {
            template: self.kind(),
            accent: ctx.accent(),
            header: Header {
                logo: ctx.logo(),
                wordmark: Some("INVOICE".into()),
                title: None,
                number: ctx.number(),
            },
            sender: ctx.party(&inv.sender, "From:", "", ""),
            client: ctx.party(&inv.client, "To:", "", ""),
            dates: vec![
                Labeled { label: "Date:".into(), value: inv.date.clone() },
                Labeled { label: "Due Date:".into(), value: inv.due_date.clone() },
            ],
            columns: ["Item".into(), "Qty".into(), "Rate".into(), "Amount".into()],
            items: ctx.item_rows("", "No line items"),
            totals: ctx.total_rows("Subtotal", ":"),
            grand_total: ctx.grand_total("Total:"),
            footer: ctx.footer("Terms", "Notes"),
            fine_print: Vec::new(),
        }
    }
}
