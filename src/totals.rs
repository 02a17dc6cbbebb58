use serde::Serialize;

use crate::model::{Fee, FeeKind, InvoiceData, LineItem};

/// A fee resolved against the items subtotal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeLine {
    pub id: String,
    pub description: String,
    pub kind: FeeKind,
    /// The fee's own figure: a flat amount or a percentage.
    pub rate: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub fees: Vec<FeeLine>,
    pub fees_total: f64,
    pub grand_total: f64,
}

impl Totals {
    /// Zero (or unusable) tax rates hide the tax row entirely.
    pub fn shows_tax(&self) -> bool {
        self.tax_rate > 0.0
    }
}

/// Derive every figure shown on an invoice. Fees and tax are all computed
/// against the items subtotal, so nothing compounds.
pub fn compute_totals(items: &[LineItem], fees: &[Fee], tax_rate: f64) -> Totals {
    let subtotal: f64 = items.iter().map(LineItem::amount).sum();

    // Negative and NaN rates are treated as "no tax" so the visible rows
    // always add up to the grand total.
    let tax_rate = if tax_rate > 0.0 { tax_rate } else { 0.0 };
    let tax_amount = if tax_rate > 0.0 { subtotal * (tax_rate / 100.0) } else { 0.0 };

    let fees: Vec<FeeLine> = fees
        .iter()
        .map(|fee| FeeLine {
            id: fee.id.clone(),
            description: fee.description.clone(),
            kind: fee.kind,
            rate: fee.amount,
            amount: fee_contribution(fee, subtotal),
        })
        .collect();
    let fees_total: f64 = fees.iter().map(|f| f.amount).sum();

    Totals {
        subtotal,
        tax_rate,
        tax_amount,
        fees,
        fees_total,
        grand_total: subtotal + tax_amount + fees_total,
    }
}

pub fn fee_contribution(fee: &Fee, subtotal: f64) -> f64 {
    match fee.kind {
        FeeKind::Percent => subtotal * (fee.amount / 100.0),
        FeeKind::Fixed => fee.amount,
    }
}

impl InvoiceData {
    pub fn totals(&self) -> Totals {
        compute_totals(&self.items, &self.fees, self.tax_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(desc: &str, qty: f64, price: f64) -> LineItem {
        LineItem::new(desc, qty, price)
    }

    #[test]
    fn consulting_with_rush_fee_and_tax() {
        let items = [item("Consulting", 2.0, 150.0)];
        let fees = [Fee::new("Rush fee", 25.0, FeeKind::Fixed)];
        let t = compute_totals(&items, &fees, 8.0);

        assert_eq!(t.subtotal, 300.0);
        assert_eq!(t.tax_amount, 24.0);
        assert_eq!(t.fees_total, 25.0);
        assert_eq!(t.grand_total, 349.0);
        assert!(t.shows_tax());
    }

    #[test]
    fn percent_fees_never_compound() {
        let items = [item("Design", 4.0, 50.0)];
        let fees = [
            Fee::new("Fixed", 50.0, FeeKind::Fixed),
            Fee::new("Card", 5.0, FeeKind::Percent),
        ];
        let t = compute_totals(&items, &fees, 0.0);

        assert_eq!(t.subtotal, 200.0);
        assert_eq!(t.fees[0].amount, 50.0);
        assert_eq!(t.fees[1].amount, 10.0);
        assert_eq!(t.grand_total, 260.0);

        // Same percent fee with tax on top: still 5% of the subtotal.
        let t = compute_totals(&items, &fees, 10.0);
        assert_eq!(t.fees[1].amount, 10.0);
        assert_eq!(t.grand_total, 200.0 + 20.0 + 10.0 + 50.0);
    }

    #[test]
    fn zero_tax_is_suppressed() {
        let items = [item("x", 1.0, 100.0)];
        let t = compute_totals(&items, &[], 0.0);
        assert_eq!(t.tax_amount, 0.0);
        assert!(!t.shows_tax());

        let t = compute_totals(&items, &[], 10.0);
        assert_eq!(t.tax_amount, 10.0);
        assert!(t.shows_tax());
    }

    #[test]
    fn negative_or_nan_tax_counts_as_none() {
        let items = [item("x", 1.0, 100.0)];
        for rate in [-5.0, f64::NAN] {
            let t = compute_totals(&items, &[], rate);
            assert_eq!(t.tax_amount, 0.0);
            assert_eq!(t.grand_total, 100.0);
            assert!(!t.shows_tax());
        }
    }

    #[test]
    fn empty_items_give_zero_subtotal() {
        let fees = [Fee::new("Card", 3.0, FeeKind::Percent)];
        let t = compute_totals(&[], &fees, 20.0);
        assert_eq!(t.subtotal, 0.0);
        assert_eq!(t.fees_total, 0.0);
        assert_eq!(t.grand_total, 0.0);
    }

    #[test]
    fn negative_lines_act_as_discounts() {
        let items = [item("Work", 1.0, 500.0), item("Loyalty discount", 1.0, -50.0)];
        let t = compute_totals(&items, &[], 0.0);
        assert_eq!(t.subtotal, 450.0);
    }

    #[test]
    fn computing_twice_is_identical() {
        let items = [item("a", 1.5, 19.99), item("b", 3.0, 0.1)];
        let fees = [Fee::new("f", 2.5, FeeKind::Percent)];
        assert_eq!(compute_totals(&items, &fees, 7.25), compute_totals(&items, &fees, 7.25));
    }

    #[test]
    fn fee_breakdown_keeps_order() {
        let items = [item("a", 1.0, 100.0)];
        let fees = [
            Fee::new("second", 1.0, FeeKind::Fixed),
            Fee::new("first", 1.0, FeeKind::Fixed),
        ];
        let t = compute_totals(&items, &fees, 0.0);
        let names: Vec<_> = t.fees.iter().map(|f| f.description.as_str()).collect();
        assert_eq!(names, ["second", "first"]);
    }
}
