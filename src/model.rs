use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DEFAULT_BRAND_COLOR: &str = "#059669";
pub const DEFAULT_CURRENCY: &str = "USD";

/// Opaque id for line items and fees. Never reused once handed out.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Reads a number that may have been written as `null`. JSON has no
/// infinity or NaN, so a non-finite value is stored as `null` and comes
/// back as zero instead of failing the whole invoice.
pub fn finite_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|v| v.is_finite()).unwrap_or(0.0))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub address: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub description: String,
    #[serde(default, deserialize_with = "finite_or_zero")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "finite_or_zero")]
    pub price: f64,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: f64, price: f64) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            quantity,
            price,
        }
    }

    pub fn amount(&self) -> f64 {
        self.quantity * self.price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeKind {
    Fixed,
    Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub id: String,
    pub description: String,
    #[serde(default, deserialize_with = "finite_or_zero")]
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: FeeKind,
}

impl Fee {
    pub fn new(description: impl Into<String>, amount: f64, kind: FeeKind) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            amount,
            kind,
        }
    }
}

/// Layout variant. Anything we don't recognise renders as `Minimal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemplateKind {
    #[default]
    Modern,
    Classic,
    Minimal,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 3] = [TemplateKind::Modern, TemplateKind::Classic, TemplateKind::Minimal];

    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "modern" => TemplateKind::Modern,
            "classic" => TemplateKind::Classic,
            _ => TemplateKind::Minimal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Modern => "modern",
            TemplateKind::Classic => "classic",
            TemplateKind::Minimal => "minimal",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TemplateKind::Modern => "Modern",
            TemplateKind::Classic => "Classic",
            TemplateKind::Minimal => "Minimal",
        }
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for TemplateKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TemplateKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(TemplateKind::from_name(&name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "InvoiceRecord", into = "InvoiceRecord")]
pub struct InvoiceData {
    pub invoice_number: String,
    pub date: String,
    pub due_date: String,
    pub payment_terms: String,
    pub sender: Party,
    pub client: Party,
    pub items: Vec<LineItem>,
    pub tax_rate: f64,
    pub fees: Vec<Fee>,
    pub notes: String,
    pub currency: String,
    pub logo: Option<String>,
    pub brand_color: String,
    pub template: TemplateKind,
}

impl InvoiceData {
    /// A fresh invoice dated `today`, due a week later.
    pub fn new_for(today: NaiveDate) -> Self {
        let due = today.checked_add_days(Days::new(7)).unwrap_or(today);
        Self {
            invoice_number: "INV-001".to_string(),
            date: today.format("%Y-%m-%d").to_string(),
            due_date: due.format("%Y-%m-%d").to_string(),
            payment_terms: "Net 7".to_string(),
            sender: Party::default(),
            client: Party::default(),
            items: vec![LineItem::new("Consulting Services", 1.0, 100.0)],
            tax_rate: 0.0,
            fees: Vec::new(),
            notes: "Thank you for your business!".to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            logo: None,
            brand_color: DEFAULT_BRAND_COLOR.to_string(),
            template: TemplateKind::Modern,
        }
    }

    pub fn add_item(&mut self, item: LineItem) -> &str {
        self.items.push(item);
        &self.items[self.items.len() - 1].id
    }

    pub fn remove_item(&mut self, id: &str) -> Option<LineItem> {
        let idx = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(idx))
    }

    pub fn item_mut(&mut self, id: &str) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    pub fn add_fee(&mut self, fee: Fee) -> &str {
        self.fees.push(fee);
        &self.fees[self.fees.len() - 1].id
    }

    pub fn remove_fee(&mut self, id: &str) -> Option<Fee> {
        let idx = self.fees.iter().position(|f| f.id == id)?;
        Some(self.fees.remove(idx))
    }

    pub fn fee_mut(&mut self, id: &str) -> Option<&mut Fee> {
        self.fees.iter_mut().find(|f| f.id == id)
    }

    /// Zeroes any infinite or NaN amount so the invoice survives a JSON round trip unchanged.
    pub fn clear_non_finite(&mut self) {
        let fix = |v: &mut f64| {
            if !v.is_finite() {
                *v = 0.0;
            }
        };
        for item in &mut self.items {
            fix(&mut item.quantity);
            fix(&mut item.price);
        }
        for fee in &mut self.fees {
            fix(&mut fee.amount);
        }
        fix(&mut self.tax_rate);
    }

    /// Same invoice with every item and fee given a new id.
    pub fn with_fresh_ids(mut self) -> Self {
        for item in &mut self.items {
            item.id = new_id();
        }
        for fee in &mut self.fees {
            fee.id = new_id();
        }
        self
    }
}

impl Default for InvoiceData {
    fn default() -> Self {
        InvoiceData::new_for(Local::now().date_naive())
    }
}

/// Flat camelCase wire shape, shared by the stored working invoice and share links.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InvoiceRecord {
    invoice_number: String,
    date: String,
    due_date: String,
    payment_terms: String,
    sender_name: String,
    sender_address: String,
    sender_email: String,
    client_name: String,
    client_address: String,
    client_email: String,
    items: Vec<LineItem>,
    #[serde(deserialize_with = "finite_or_zero")]
    tax_rate: f64,
    fees: Option<Vec<Fee>>,
    notes: String,
    currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    logo: Option<String>,
    brand_color: String,
    template: TemplateKind,
}

impl From<InvoiceRecord> for InvoiceData {
    fn from(r: InvoiceRecord) -> Self {
        InvoiceData {
            invoice_number: r.invoice_number,
            date: r.date,
            due_date: r.due_date,
            payment_terms: r.payment_terms,
            sender: Party {
                name: r.sender_name,
                address: r.sender_address,
                email: r.sender_email,
            },
            client: Party {
                name: r.client_name,
                address: r.client_address,
                email: r.client_email,
            },
            items: r.items,
            tax_rate: r.tax_rate,
            fees: r.fees.unwrap_or_default(),
            notes: r.notes,
            currency: r.currency,
            logo: r.logo,
            brand_color: r.brand_color,
            template: r.template,
        }
    }
}

impl From<InvoiceData> for InvoiceRecord {
    fn from(d: InvoiceData) -> Self {
        InvoiceRecord {
            invoice_number: d.invoice_number,
            date: d.date,
            due_date: d.due_date,
            payment_terms: d.payment_terms,
            sender_name: d.sender.name,
            sender_address: d.sender.address,
            sender_email: d.sender.email,
            client_name: d.client.name,
            client_address: d.client.address,
            client_email: d.client.email,
            items: d.items,
            tax_rate: d.tax_rate,
            fees: Some(d.fees),
            notes: d.notes,
            currency: d.currency,
            logo: d.logo,
            brand_color: d.brand_color,
            template: d.template,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedClient {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedItem {
    pub description: String,
    #[serde(default, deserialize_with = "finite_or_zero")]
    pub price: f64,
}
