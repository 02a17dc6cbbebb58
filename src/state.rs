use chrono::NaiveDate;
use tracing::{info, warn};

use crate::model::InvoiceData;
use crate::share;
use crate::store::{KeyValueStore, StoreError, load_json, save_json};

pub const INVOICE_KEY: &str = "invoice";

/// Where the in-memory invoice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The user's own invoice; every change is flushed to the store.
    Working,
    /// Opened from a share link; read-only until cloned.
    Shared,
}

/// Owns the session's invoice: loaded once on open, flushed after each change.
pub struct WorkingInvoice<S> {
    store: S,
    invoice: InvoiceData,
    origin: Origin,
}

impl<S: KeyValueStore> WorkingInvoice<S> {
    pub fn open(store: S) -> Self {
        let invoice = load_working(&store);
        Self { store, invoice, origin: Origin::Working }
    }

    /// Like [`open`](Self::open), but a decodable share parameter takes
    /// precedence. An undecodable one falls back to the working invoice.
    pub fn open_with_share(store: S, share_param: Option<&str>) -> Self {
        if let Some(param) = share_param.filter(|p| !p.trim().is_empty()) {
            match share::decode(param) {
                Ok(invoice) => {
                    info!(number = %invoice.invoice_number, "Opened shared invoice");
                    return Self { store, invoice, origin: Origin::Shared };
                }
                Err(e) => warn!(error = %e, "Failed to decode share data, loading working invoice"),
            }
        }
        Self::open(store)
    }

    pub fn invoice(&self) -> &InvoiceData {
        &self.invoice
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_shared(&self) -> bool {
        self.origin == Origin::Shared
    }

    /// Apply `edit` and persist the result. Shared views are never written.
    pub fn update<F>(&mut self, edit: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut InvoiceData),
    {
        edit(&mut self.invoice);
        self.invoice.clear_non_finite();
        self.flush()
    }

    pub fn replace(&mut self, invoice: InvoiceData) -> Result<(), StoreError> {
        self.update(|current| *current = invoice)
    }

    /// Adopt the shared invoice as the user's own working copy.
    pub fn clone_shared(&mut self) -> Result<(), StoreError> {
        if self.origin == Origin::Shared {
            self.invoice = self.invoice.clone().with_fresh_ids();
        }
        self.origin = Origin::Working;
        self.flush()
    }

    /// Discard everything and start over. Callers confirm with the user first.
    pub fn reset(&mut self, today: NaiveDate) -> Result<(), StoreError> {
        self.origin = Origin::Working;
        self.invoice = InvoiceData::new_for(today);
        self.flush()
    }

    fn flush(&self) -> Result<(), StoreError> {
        if self.origin == Origin::Shared {
            return Ok(());
        }
        save_json(&self.store, INVOICE_KEY, &self.invoice)
    }
}

fn load_working(store: &impl KeyValueStore) -> InvoiceData {
    match load_json::<InvoiceData>(store, INVOICE_KEY) {
        Ok(Some(invoice)) => invoice,
        Ok(None) => InvoiceData::default(),
        Err(e) => {
            warn!(error = %e, "Failed to read working invoice, starting from defaults");
            InvoiceData::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LineItem, TemplateKind};
    use crate::store::MemoryStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn changes_are_flushed_and_reloaded() {
        let store = MemoryStore::new();
        let mut working = WorkingInvoice::open(&store);
        working
            .update(|inv| {
                inv.client.name = "Acme Corp".into();
                inv.add_item(LineItem::new("Audit", 3.0, 90.0));
            })
            .unwrap();

        let reopened = WorkingInvoice::open(&store);
        assert_eq!(reopened.invoice(), working.invoice());
        assert_eq!(reopened.invoice().client.name, "Acme Corp");
    }

    #[test]
    fn infinite_price_does_not_wipe_the_invoice_on_reopen() {
        let store = MemoryStore::new();
        let mut working = WorkingInvoice::open(&store);
        working
            .update(|inv| {
                inv.invoice_number = "KEEP-ME".into();
                inv.items[0].price = f64::INFINITY;
            })
            .unwrap();

        let reopened = WorkingInvoice::open(&store);
        assert_eq!(reopened.invoice().invoice_number, "KEEP-ME");
        assert_eq!(reopened.invoice().items[0].price, 0.0);
        assert_eq!(reopened.invoice(), working.invoice());
    }

    #[test]
    fn null_amounts_written_by_older_builds_still_load() {
        let store = MemoryStore::new();
        store
            .set(
                INVOICE_KEY,
                r#"{"invoiceNumber":"KEEP-ME","items":[{"id":"a","description":"Work","quantity":1,"price":null}]}"#,
            )
            .unwrap();
        let working = WorkingInvoice::open(&store);
        assert_eq!(working.invoice().invoice_number, "KEEP-ME");
        assert_eq!(working.invoice().items[0].price, 0.0);
    }

    #[test]
    fn corrupt_state_falls_back_to_defaults() {
        let store = MemoryStore::new();
        store.set(INVOICE_KEY, "{ definitely not json").unwrap();
        let working = WorkingInvoice::open(&store);
        assert_eq!(working.invoice().invoice_number, "INV-001");
        assert_eq!(working.origin(), Origin::Working);
    }

    #[test]
    fn malformed_share_param_loads_the_working_invoice() {
        let store = MemoryStore::new();
        let mut working = WorkingInvoice::open(&store);
        working.update(|inv| inv.invoice_number = "INV-042".into()).unwrap();

        let opened = WorkingInvoice::open_with_share(&store, Some("%%%not-base64%%%"));
        assert!(!opened.is_shared());
        assert_eq!(opened.invoice().invoice_number, "INV-042");
    }

    #[test]
    fn shared_view_is_not_persisted_until_cloned() {
        let store = MemoryStore::new();
        let mut mine = WorkingInvoice::open(&store);
        mine.update(|inv| inv.invoice_number = "MINE-1".into()).unwrap();

        let mut theirs = InvoiceData::new_for(today());
        theirs.invoice_number = "THEIRS-7".into();
        theirs.template = TemplateKind::Classic;
        let param = share::encode(&theirs).unwrap();

        let mut view = WorkingInvoice::open_with_share(&store, Some(&param));
        assert!(view.is_shared());
        assert_eq!(view.invoice(), &theirs);

        view.update(|inv| inv.notes = "scribble".into()).unwrap();
        assert_eq!(WorkingInvoice::open(&store).invoice().invoice_number, "MINE-1");

        view.clone_shared().unwrap();
        assert_eq!(WorkingInvoice::open(&store).invoice().invoice_number, "THEIRS-7");
    }

    #[test]
    fn reset_restores_defaults_and_leaves_shared_view() {
        let store = MemoryStore::new();
        let param = share::encode(&InvoiceData::new_for(today())).unwrap();
        let mut view = WorkingInvoice::open_with_share(&store, Some(&param));
        view.reset(today()).unwrap();

        assert!(!view.is_shared());
        assert_eq!(view.invoice().date, "2025-06-01");
        assert!(store.get(INVOICE_KEY).unwrap().is_some());
    }
}
