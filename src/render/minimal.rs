use super::{Header, Labeled, Layout, RenderContext, RenderedInvoice};
use crate::model::TemplateKind;

pub struct Minimal;

impl Layout for Minimal {
    fn kind(&self) -> TemplateKind {
        TemplateKind::Minimal
    }

    fn compose(&self, ctx: &RenderContext<'_>) -> RenderedInvoice {
        let inv = ctx.invoice;
        let logo = ctx.logo();
        let wordmark = logo.is_none().then(|| {
            if inv.sender.name.trim().is_empty() {
                "INVOICE".to_string()
            } else {
                inv.sender.name.clone()
            }
        });

        let mut fine_print = Vec::new();
        if !inv.sender.email.trim().is_empty() {
            fine_print.push(inv.sender.email.clone());
        }
        fine_print.push(format!("Due: {}", inv.due_date));

        RenderedInvoice {
            template: self.kind(),
            accent: ctx.accent(),
            header: Header {
                logo,
                wordmark,
                title: Some("INVOICE".into()),
                number: ctx.number(),
            },
            sender: ctx.party(&inv.sender, "Issued By", "", ""),
            client: ctx.party(&inv.client, "Billed To", "", ""),
            dates: vec![
                Labeled { label: "Issued".into(), value: inv.date.clone() },
                Labeled { label: "Due".into(), value: inv.due_date.clone() },
            ],
            columns: ["Item".into(), "Qty".into(), "Price".into(), "Amount".into()],
            items: ctx.item_rows("", "Nothing billed yet"),
            totals: ctx.total_rows("Subtotal", ""),
            grand_total: ctx.grand_total("Total"),
            footer: ctx.footer("Terms", "Notes"),
            fine_print,
        }
    }
}
