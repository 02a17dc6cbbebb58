//! Smart import: free text in, partial invoice update out.

use std::cell::Cell;
use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ExtractionSettings;
use crate::model::{InvoiceData, LineItem};
use crate::state::WorkingInvoice;
use crate::store::{KeyValueStore, StoreError};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("API key not found: set the `{var}` environment variable")]
    MissingApiKey { var: String },
    #[error("an extraction is already in progress")]
    Busy,
    #[error("extraction request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("extraction API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("empty response from extraction model")]
    EmptyResponse,
    #[error("failed to parse extraction response: {0}")]
    Parse(String),
    #[error(transparent)]
    Persist(#[from] StoreError),
}

impl ExtractError {
    /// Problems the user has to fix in their setup; retrying won't help.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ExtractError::MissingApiKey { .. })
    }
}

/// One line item as the model reported it. Models write `null` for
/// anything they couldn't find, so every field is optional here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedItem {
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
}

impl ExtractedItem {
    /// Missing quantity means one; missing price means zero.
    pub fn into_line_item(self) -> LineItem {
        let quantity = self.quantity.filter(|q| q.is_finite()).unwrap_or(1.0);
        let price = self.price.filter(|p| p.is_finite()).unwrap_or(0.0);
        LineItem::new(self.description.unwrap_or_default(), quantity, price)
    }
}

/// How extracted items combine with the ones already on the invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemsRule {
    /// A non-empty extracted list replaces the current items; an empty or
    /// missing one leaves them alone.
    #[default]
    ReplaceIfNonEmpty,
}

/// Partial update produced by extraction. `None` means "not found".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoicePatch {
    pub invoice_number: Option<String>,
    pub sender_name: Option<String>,
    pub sender_address: Option<String>,
    pub sender_email: Option<String>,
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    pub client_email: Option<String>,
    pub date: Option<String>,
    pub due_date: Option<String>,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
    pub tax_rate: Option<f64>,
    pub items: Option<Vec<ExtractedItem>>,
}

impl InvoicePatch {
    pub fn is_empty(&self) -> bool {
        *self == InvoicePatch::default()
    }

    pub fn apply(self, invoice: &mut InvoiceData) {
        self.apply_with(invoice, ItemsRule::default());
    }

    /// Field-by-field overwrite: whatever the patch carries wins. Blank
    /// strings count as absent.
    pub fn apply_with(self, invoice: &mut InvoiceData, rule: ItemsRule) {
        set_text(&mut invoice.invoice_number, self.invoice_number);
        set_text(&mut invoice.sender.name, self.sender_name);
        set_text(&mut invoice.sender.address, self.sender_address);
        set_text(&mut invoice.sender.email, self.sender_email);
        set_text(&mut invoice.client.name, self.client_name);
        set_text(&mut invoice.client.address, self.client_address);
        set_text(&mut invoice.client.email, self.client_email);
        set_text(&mut invoice.date, self.date);
        set_text(&mut invoice.due_date, self.due_date);
        set_text(&mut invoice.payment_terms, self.payment_terms);
        set_text(&mut invoice.notes, self.notes);
        if let Some(rate) = self.tax_rate.filter(|r| r.is_finite()) {
            invoice.tax_rate = rate;
        }
        match rule {
            ItemsRule::ReplaceIfNonEmpty => {
                if let Some(items) = self.items.filter(|items| !items.is_empty()) {
                    invoice.items = items.into_iter().map(ExtractedItem::into_line_item).collect();
                }
            }
        }
    }
}

fn set_text(field: &mut String, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *field = value;
    }
}

pub trait Extractor {
    fn extract(&self, text: &str, current: &InvoiceData) -> Result<InvoicePatch, ExtractError>;
}

const SYSTEM_PROMPT: &str = r#"You are an expert data entry assistant.
Extract invoice details from the user's unstructured text and return ONLY valid JSON.

The JSON must match this schema:
{
  "invoiceNumber": "string or null",
  "senderName": "string or null",
  "senderAddress": "string or null",
  "senderEmail": "string or null",
  "clientName": "string or null",
  "clientAddress": "string or null",
  "clientEmail": "string or null",
  "date": "YYYY-MM-DD or null",
  "dueDate": "YYYY-MM-DD or null",
  "paymentTerms": "string or null",
  "items": [
    { "description": "string", "quantity": number, "price": number }
  ],
  "taxRate": "number (percent) or null",
  "notes": "string or null"
}

Instructions:
- Extract sender and client details if available.
- Extract line items (description, quantity, price). If only a total is given, infer price and quantity.
- Extract dates or payment terms.
- Use null for fields you cannot determine. Do not invent data unless reasonably inferred (e.g. today's date).
- Return ONLY the JSON object, no markdown fences, no commentary."#;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct LlmExtractor {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl LlmExtractor {
    /// Fails with [`ExtractError::MissingApiKey`] before touching the network.
    pub fn from_settings(settings: &ExtractionSettings) -> Result<Self, ExtractError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ExtractError::MissingApiKey { var: settings.api_key_env.clone() })?;
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()?;
        info!(url = %settings.base_url, model = %settings.model, "Using extraction endpoint");
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
        })
    }
}

impl Extractor for LlmExtractor {
    fn extract(&self, text: &str, current: &InvoiceData) -> Result<InvoicePatch, ExtractError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: format!("{SYSTEM_PROMPT}\n\nCurrent Date: {}", Local::now().format("%Y-%m-%d")),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message(text, current),
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(ExtractError::Api { status, body });
        }

        let chat: ChatResponse = response.json()?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ExtractError::EmptyResponse)?;
        parse_response(&content)
    }
}

/// The current invoice goes along as context, minus the logo image.
fn user_message(text: &str, current: &InvoiceData) -> String {
    let mut snapshot = current.clone();
    snapshot.logo = None;
    let snapshot = serde_json::to_string(&snapshot).unwrap_or_default();
    format!("Current invoice:\n{snapshot}\n\nUser Text:\n\"{text}\"")
}

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```").expect("valid fence regex"));

pub fn parse_response(content: &str) -> Result<InvoicePatch, ExtractError> {
    // Models add fences despite instructions.
    let trimmed = match CODE_FENCE.captures(content).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => content.trim(),
    };
    if trimmed.is_empty() {
        return Err(ExtractError::EmptyResponse);
    }
    let json = extract_json_object(trimmed)?;
    serde_json::from_str(json).map_err(|e| ExtractError::Parse(format!("{e}\nRaw: {json}")))
}

/// Outermost `{...}` of a reply that may carry surrounding chatter.
fn extract_json_object(s: &str) -> Result<&str, ExtractError> {
    let start = s.find('{').ok_or_else(|| ExtractError::Parse("no '{' in response".into()))?;
    let end = s.rfind('}').ok_or_else(|| ExtractError::Parse("no '}' in response".into()))?;
    if end <= start {
        return Err(ExtractError::Parse("malformed JSON in response".into()));
    }
    Ok(&s[start..=end])
}

/// Allows one extraction at a time.
#[derive(Debug, Default)]
pub struct ExtractionGate {
    in_flight: Cell<bool>,
}

impl ExtractionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Result<InFlight<'_>, ExtractError> {
        if self.in_flight.replace(true) {
            return Err(ExtractError::Busy);
        }
        Ok(InFlight { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.get()
    }
}

/// Clears the gate when dropped, success or not.
pub struct InFlight<'a> {
    gate: &'a ExtractionGate,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.set(false);
    }
}

/// Run one extraction and merge the result into the working invoice.
/// Returns `false` when `text` is blank and nothing was attempted. On error
/// the invoice is left as it was.
pub fn smart_fill<E, S>(
    extractor: &E,
    gate: &ExtractionGate,
    working: &mut WorkingInvoice<S>,
    text: &str,
) -> Result<bool, ExtractError>
where
    E: Extractor + ?Sized,
    S: KeyValueStore,
{
    if text.trim().is_empty() {
        return Ok(false);
    }
    let _in_flight = gate.begin()?;
    debug!(chars = text.len(), "Starting extraction");
    let patch = match extractor.extract(text, working.invoice()) {
        Ok(patch) => patch,
        Err(e) => {
            warn!(error = %e, "Extraction failed");
            return Err(e);
        }
    };
    if patch.is_empty() {
        info!("Extraction returned no fields");
    }
    working.update(|invoice| patch.apply(invoice))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::NaiveDate;

    use super::*;
    use crate::store::MemoryStore;

    struct Canned(RefCell<Option<Result<InvoicePatch, ExtractError>>>);

    impl Canned {
        fn ok(patch: InvoicePatch) -> Self {
            Self(RefCell::new(Some(Ok(patch))))
        }

        fn err(e: ExtractError) -> Self {
            Self(RefCell::new(Some(Err(e))))
        }
    }

    impl Extractor for Canned {
        fn extract(&self, _text: &str, _current: &InvoiceData) -> Result<InvoicePatch, ExtractError> {
            self.0.borrow_mut().take().unwrap_or(Err(ExtractError::EmptyResponse))
        }
    }

    fn invoice() -> InvoiceData {
        InvoiceData::new_for(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap())
    }

    fn extracted(description: &str, quantity: f64, price: f64) -> ExtractedItem {
        ExtractedItem { description: Some(description.into()), quantity: Some(quantity), price: Some(price) }
    }

    #[test]
    fn patch_overwrites_only_present_fields() {
        let mut inv = invoice();
        inv.sender.name = "Me Ltd".into();
        let original_item = inv.items[0].clone();

        InvoicePatch {
            client_name: Some("Acme".into()),
            tax_rate: Some(10.0),
            sender_name: Some("   ".into()),
            items: Some(vec![]),
            ..Default::default()
        }
        .apply(&mut inv);

        assert_eq!(inv.client.name, "Acme");
        assert_eq!(inv.tax_rate, 10.0);
        assert_eq!(inv.sender.name, "Me Ltd");
        assert_eq!(inv.items, vec![original_item]);
    }

    #[test]
    fn non_empty_items_replace_with_fresh_ids() {
        let mut inv = invoice();
        let old_id = inv.items[0].id.clone();
        InvoicePatch {
            items: Some(vec![
                extracted("Logo design", 1.0, 500.0),
                extracted("Revisions", 2.0, 50.0),
            ]),
            ..Default::default()
        }
        .apply(&mut inv);

        assert_eq!(inv.items.len(), 2);
        assert!(inv.items.iter().all(|i| i.id != old_id));
        assert_ne!(inv.items[0].id, inv.items[1].id);
        assert_eq!(inv.totals().subtotal, 600.0);
    }

    #[test]
    fn parses_fenced_and_chatty_replies() {
        let reply = "Sure! Here you go:\n```json\n{\"clientName\": \"Acme\", \"items\": [{\"description\": \"Audit\", \"price\": 90}]}\n```";
        let patch = parse_response(reply).unwrap();
        assert_eq!(patch.client_name.as_deref(), Some("Acme"));
        let item = patch.items.unwrap().remove(0).into_line_item();
        assert_eq!(item.quantity, 1.0);
        assert_eq!(item.price, 90.0);

        let nulls = parse_response(r#"{"invoiceNumber": null, "taxRate": null}"#).unwrap();
        assert!(nulls.is_empty());
    }

    #[test]
    fn null_item_fields_fall_back_instead_of_failing() {
        let reply = r#"{"clientName": "Acme", "items": [
            {"description": "Design", "quantity": null, "price": 500},
            {"description": null, "quantity": 3, "price": null}
        ]}"#;
        let patch = parse_response(reply).unwrap();
        assert_eq!(patch.client_name.as_deref(), Some("Acme"));

        let mut inv = invoice();
        patch.apply(&mut inv);
        assert_eq!(inv.items.len(), 2);
        assert_eq!((inv.items[0].quantity, inv.items[0].price), (1.0, 500.0));
        assert_eq!(inv.items[1].description, "");
        assert_eq!((inv.items[1].quantity, inv.items[1].price), (3.0, 0.0));
        assert_eq!(inv.client.name, "Acme");
    }

    #[test]
    fn unparseable_replies_are_errors() {
        assert!(matches!(parse_response(""), Err(ExtractError::EmptyResponse)));
        assert!(matches!(parse_response("no json here"), Err(ExtractError::Parse(_))));
        assert!(matches!(parse_response("} {"), Err(ExtractError::Parse(_))));
    }

    #[test]
    fn missing_api_key_is_reported_before_any_request() {
        let settings = ExtractionSettings {
            api_key_env: "INVOICE_STUDIO_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..Default::default()
        };
        let err = LlmExtractor::from_settings(&settings).err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("INVOICE_STUDIO_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn gate_allows_one_request_at_a_time() {
        let gate = ExtractionGate::new();
        let first = gate.begin().unwrap();
        assert!(matches!(gate.begin(), Err(ExtractError::Busy)));
        drop(first);
        assert!(!gate.is_busy());
        assert!(gate.begin().is_ok());
    }

    #[test]
    fn smart_fill_merges_and_persists() {
        let store = MemoryStore::new();
        let mut working = WorkingInvoice::open(&store);
        let gate = ExtractionGate::new();
        let extractor = Canned::ok(InvoicePatch {
            client_name: Some("Acme".into()),
            items: Some(vec![extracted("Logo design", 1.0, 500.0)]),
            ..Default::default()
        });

        assert!(smart_fill(&extractor, &gate, &mut working, "Bill Acme $500 for logo design").unwrap());
        assert!(!gate.is_busy());
        let reopened = WorkingInvoice::open(&store);
        assert_eq!(reopened.invoice().client.name, "Acme");
        assert_eq!(reopened.invoice().items[0].description, "Logo design");
    }

    #[test]
    fn failed_extraction_leaves_state_and_clears_gate() {
        let store = MemoryStore::new();
        let mut working = WorkingInvoice::open(&store);
        let before = working.invoice().clone();
        let gate = ExtractionGate::new();
        let extractor = Canned::err(ExtractError::Parse("bad".into()));

        assert!(smart_fill(&extractor, &gate, &mut working, "something").is_err());
        assert_eq!(working.invoice(), &before);
        assert!(!gate.is_busy());
    }

    #[test]
    fn blank_text_is_a_no_op() {
        let store = MemoryStore::new();
        let mut working = WorkingInvoice::open(&store);
        let gate = ExtractionGate::new();
        let extractor = Canned::err(ExtractError::EmptyResponse);
        assert!(!smart_fill(&extractor, &gate, &mut working, "  \n").unwrap());
        assert!(store.get(crate::state::INVOICE_KEY).unwrap().is_none());
    }
}
