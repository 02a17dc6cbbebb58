//! Interactive prompts that edit the working invoice.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{Local, NaiveDate};
use comfy_table::{Attribute, Cell, CellAlignment, Table};
use inquire::autocompletion::{Autocomplete, Replacement};
use inquire::validator::Validation;
use inquire::{Confirm, CustomType, CustomUserError, DateSelect, Select, Text};
use tracing::debug;

use crate::currency::{CURRENCIES, Currency, format_money};
use crate::memory::{SavedEntities, matches_query};
use crate::model::{Fee, FeeKind, InvoiceData, LineItem, Party, SavedClient, SavedItem, TemplateKind};
use crate::render::is_hex_color;
use crate::state::WorkingInvoice;
use crate::store::KeyValueStore;

/// Suggests previously saved names while typing.
#[derive(Debug, Clone)]
pub struct Suggester {
    candidates: Vec<String>,
}

impl Suggester {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }
}

impl Autocomplete for Suggester {
    fn get_suggestions(&mut self, input: &str) -> Result<Vec<String>, CustomUserError> {
        Ok(self
            .candidates
            .iter()
            .filter(|c| matches_query(c, input))
            .cloned()
            .collect())
    }

    fn get_completion(
        &mut self,
        _input: &str,
        highlighted_suggestion: Option<String>,
    ) -> Result<Replacement, CustomUserError> {
        Ok(highlighted_suggestion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Number,
    Dates,
    Terms,
    Sender,
    Client,
    Items,
    Fees,
    Tax,
    Notes,
    Currency,
    Template,
    BrandColor,
    Logo,
    Done,
}

impl Field {
    const ALL: [Field; 14] = [
        Field::Client,
        Field::Items,
        Field::Number,
        Field::Dates,
        Field::Terms,
        Field::Sender,
        Field::Fees,
        Field::Tax,
        Field::Notes,
        Field::Currency,
        Field::Template,
        Field::BrandColor,
        Field::Logo,
        Field::Done,
    ];
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Field::Number => "Invoice number",
            Field::Dates => "Dates",
            Field::Terms => "Payment terms",
            Field::Sender => "Your details",
            Field::Client => "Client",
            Field::Items => "Line items",
            Field::Fees => "Fees & discounts",
            Field::Tax => "Tax rate",
            Field::Notes => "Notes",
            Field::Currency => "Currency",
            Field::Template => "Template",
            Field::BrandColor => "Brand color",
            Field::Logo => "Logo",
            Field::Done => "✅ Done",
        };
        f.write_str(label)
    }
}

/// An entry in a pick list that maps back to an item or fee id.
#[derive(Debug, Clone)]
struct Choice {
    id: String,
    label: String,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Clone, Copy)]
struct CurrencyChoice(&'static Currency);

impl fmt::Display for CurrencyChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.0.code, self.0.symbol, self.0.name)
    }
}

pub fn edit_loop<S, M>(working: &mut WorkingInvoice<S>, saved: &SavedEntities<M>) -> Result<()>
where
    S: KeyValueStore,
    M: KeyValueStore,
{
    loop {
        let field = Select::new("What would you like to edit?", Field::ALL.to_vec())
            .with_page_size(Field::ALL.len())
            .prompt()?;
        debug!(?field, "Editing");
        let current = working.invoice().clone();
        match field {
            Field::Number => {
                let number = Text::new("Invoice number:")
                    .with_initial_value(&current.invoice_number)
                    .prompt()?;
                working.update(|inv| inv.invoice_number = number)?;
            }
            Field::Dates => {
                let date = prompt_date("Invoice date:", &current.date)?;
                let due = prompt_date("Due date:", &current.due_date)?;
                working.update(|inv| {
                    inv.date = date;
                    inv.due_date = due;
                })?;
            }
            Field::Terms => {
                let terms = Text::new("Payment terms:")
                    .with_initial_value(&current.payment_terms)
                    .prompt()?;
                working.update(|inv| inv.payment_terms = terms)?;
            }
            Field::Sender => {
                let sender = prompt_sender(&current.sender)?;
                working.update(|inv| inv.sender = sender)?;
            }
            Field::Client => {
                let client = prompt_client(saved, &current.client)?;
                working.update(|inv| inv.client = client)?;
            }
            Field::Items => edit_items(working, saved)?,
            Field::Fees => edit_fees(working)?,
            Field::Tax => {
                let rate = prompt_rate("Tax rate (%):", current.tax_rate)?;
                working.update(|inv| inv.tax_rate = rate)?;
            }
            Field::Notes => {
                println!("💡 Tip: Use '\\n' for new lines.");
                let notes = Text::new("Notes:")
                    .with_initial_value(&escape_newlines(&current.notes))
                    .prompt()?;
                working.update(|inv| inv.notes = unescape_newlines(&notes))?;
            }
            Field::Currency => {
                let code = prompt_currency(&current.currency)?;
                working.update(|inv| inv.currency = code)?;
            }
            Field::Template => {
                let template = prompt_template(current.template)?;
                working.update(|inv| inv.template = template)?;
            }
            Field::BrandColor => {
                let color = Text::new("Brand color (#rrggbb):")
                    .with_initial_value(&current.brand_color)
                    .with_validator(|input: &str| {
                        Ok::<_, CustomUserError>(if is_hex_color(input) {
                            Validation::Valid
                        } else {
                            Validation::Invalid("Use a hex color like #059669 or #0a6".into())
                        })
                    })
                    .prompt()?;
                working.update(|inv| inv.brand_color = color.trim().to_string())?;
            }
            Field::Logo => {
                let logo = prompt_logo()?;
                working.update(|inv| inv.logo = logo)?;
            }
            Field::Done => break,
        }
    }
    Ok(())
}

fn prompt_date(message: &str, current: &str) -> Result<String> {
    let default = NaiveDate::parse_from_str(current, "%Y-%m-%d").unwrap_or_else(|_| Local::now().date_naive());
    let date = DateSelect::new(message).with_default(default).prompt()?;
    Ok(date.format("%Y-%m-%d").to_string())
}

fn prompt_rate(message: &str, current: f64) -> Result<f64> {
    let rate = CustomType::<f64>::new(message)
        .with_default(current)
        .with_error_message("Please type a valid number")
        .with_validator(|v: &f64| Ok::<_, CustomUserError>(check_rate(*v)))
        .prompt()?;
    Ok(rate)
}

fn prompt_number(message: &str, default: f64) -> Result<f64> {
    Ok(CustomType::<f64>::new(message)
        .with_default(default)
        .with_error_message("Please type a valid number")
        .with_validator(|v: &f64| Ok::<_, CustomUserError>(check_number(*v)))
        .prompt()?)
}

// `inf` and `NaN` parse as f64 but cannot be stored as JSON.
fn check_number(v: f64) -> Validation {
    if v.is_finite() {
        Validation::Valid
    } else {
        Validation::Invalid("Please type a valid number".into())
    }
}

fn check_rate(v: f64) -> Validation {
    match check_number(v) {
        Validation::Valid if v < 0.0 => Validation::Invalid("Rates can't be negative".into()),
        other => other,
    }
}

fn prompt_sender(current: &Party) -> Result<Party> {
    println!("\n--- Your Details ---");
    println!("💡 Tip: Use '\\n' for new lines.");
    let name = Text::new("Business name:").with_initial_value(&current.name).prompt()?;
    let address = Text::new("Address:")
        .with_initial_value(&escape_newlines(&current.address))
        .prompt()?;
    let email = Text::new("Email:").with_initial_value(&current.email).prompt()?;
    Ok(Party { name, address: unescape_newlines(&address), email })
}

/// Client prompt with autocomplete. Picking a remembered client fills in
/// their email and address, and whatever is confirmed is remembered again.
pub fn prompt_client<M: KeyValueStore>(saved: &SavedEntities<M>, current: &Party) -> Result<Party> {
    println!("\n--- Bill To ---");
    let names = saved.clients().into_iter().map(|c| c.name).collect();
    let name = Text::new("Client name:")
        .with_initial_value(&current.name)
        .with_autocomplete(Suggester::new(names))
        .prompt()?;

    let remembered = saved.find_client(&name);
    if remembered.is_some() {
        println!("🔍 Found saved client, pre-filling details.");
    }
    let email_default = remembered
        .as_ref()
        .map(|c| c.email.clone())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| current.email.clone());
    let address_default = remembered
        .as_ref()
        .map(|c| c.address.clone())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| current.address.clone());

    let email = Text::new("Client email:").with_initial_value(&email_default).prompt()?;
    let address = Text::new("Client address:")
        .with_initial_value(&escape_newlines(&address_default))
        .prompt()?;
    let address = unescape_newlines(&address);

    saved.upsert_client(SavedClient {
        name: name.clone(),
        email: email.clone(),
        address: address.clone(),
    })?;
    Ok(Party { name, address, email })
}

pub fn add_item<S, M>(working: &mut WorkingInvoice<S>, saved: &SavedEntities<M>) -> Result<()>
where
    S: KeyValueStore,
    M: KeyValueStore,
{
    println!("\n--- Add Line Item ---");
    let descriptions = saved.items().into_iter().map(|i| i.description).collect();
    let description = Text::new("Description:")
        .with_autocomplete(Suggester::new(descriptions))
        .prompt()?;
    let remembered = saved.find_item(&description);
    let quantity = prompt_number("Quantity:", 1.0)?;
    let price = prompt_number("Unit price:", remembered.map_or(0.0, |i| i.price))?;

    saved.upsert_item(SavedItem { description: description.clone(), price })?;
    working.update(|inv| {
        inv.add_item(LineItem::new(description, quantity, price));
    })?;
    println!("✅ Item added.");
    Ok(())
}

fn edit_items<S, M>(working: &mut WorkingInvoice<S>, saved: &SavedEntities<M>) -> Result<()>
where
    S: KeyValueStore,
    M: KeyValueStore,
{
    const ADD: &str = "➕ Add item";
    let mut options = vec![Choice { id: String::new(), label: ADD.to_string() }];
    options.extend(item_choices(working.invoice()));
    let picked = Select::new("Select an item to edit:", options).prompt()?;
    if picked.id.is_empty() {
        return add_item(working, saved);
    }

    let Some(item) = working.invoice().items.iter().find(|i| i.id == picked.id).cloned() else {
        return Ok(());
    };
    let description = Text::new("Description:").with_initial_value(&item.description).prompt()?;
    let quantity = prompt_number("Quantity:", item.quantity)?;
    let price = prompt_number("Unit price:", item.price)?;
    saved.upsert_item(SavedItem { description: description.clone(), price })?;
    working.update(|inv| {
        if let Some(target) = inv.item_mut(&item.id) {
            target.description = description;
            target.quantity = quantity;
            target.price = price;
        }
    })?;
    Ok(())
}

pub fn remove_item<S: KeyValueStore>(working: &mut WorkingInvoice<S>) -> Result<()> {
    let options = item_choices(working.invoice());
    if options.is_empty() {
        println!("❌ No items to remove.");
        return Ok(());
    }
    let picked = Select::new("Remove which item?", options).prompt()?;
    working.update(|inv| {
        inv.remove_item(&picked.id);
    })?;
    println!("✅ Removed: {}", picked.label);
    Ok(())
}

pub fn add_fee<S: KeyValueStore>(working: &mut WorkingInvoice<S>) -> Result<()> {
    println!("\n--- Add Fee or Discount ---");
    println!("💡 Tip: Use a negative amount for a discount.");
    let description = Text::new("Description:").prompt()?;
    let kind = prompt_fee_kind(FeeKind::Fixed)?;
    let amount = prompt_number(fee_amount_prompt(kind), 0.0)?;
    working.update(|inv| {
        inv.add_fee(Fee::new(description, amount, kind));
    })?;
    println!("✅ Fee added.");
    Ok(())
}

fn edit_fees<S: KeyValueStore>(working: &mut WorkingInvoice<S>) -> Result<()> {
    const ADD: &str = "➕ Add fee or discount";
    let mut options = vec![Choice { id: String::new(), label: ADD.to_string() }];
    options.extend(fee_choices(working.invoice()));
    let picked = Select::new("Select a fee to edit:", options).prompt()?;
    if picked.id.is_empty() {
        return add_fee(working);
    }

    let Some(fee) = working.invoice().fees.iter().find(|f| f.id == picked.id).cloned() else {
        return Ok(());
    };
    let description = Text::new("Description:").with_initial_value(&fee.description).prompt()?;
    let kind = prompt_fee_kind(fee.kind)?;
    let amount = prompt_number(fee_amount_prompt(kind), fee.amount)?;
    working.update(|inv| {
        if let Some(target) = inv.fee_mut(&fee.id) {
            target.description = description;
            target.kind = kind;
            target.amount = amount;
        }
    })?;
    Ok(())
}

pub fn remove_fee<S: KeyValueStore>(working: &mut WorkingInvoice<S>) -> Result<()> {
    let options = fee_choices(working.invoice());
    if options.is_empty() {
        println!("❌ No fees to remove.");
        return Ok(());
    }
    let picked = Select::new("Remove which fee?", options).prompt()?;
    working.update(|inv| {
        inv.remove_fee(&picked.id);
    })?;
    println!("✅ Removed: {}", picked.label);
    Ok(())
}

fn prompt_fee_kind(current: FeeKind) -> Result<FeeKind> {
    const FIXED: &str = "Fixed amount";
    const PERCENT: &str = "Percent of subtotal";
    let cursor = if current == FeeKind::Percent { 1 } else { 0 };
    let picked = Select::new("Fee type:", vec![FIXED, PERCENT])
        .with_starting_cursor(cursor)
        .prompt()?;
    Ok(if picked == PERCENT { FeeKind::Percent } else { FeeKind::Fixed })
}

fn fee_amount_prompt(kind: FeeKind) -> &'static str {
    match kind {
        FeeKind::Fixed => "Amount:",
        FeeKind::Percent => "Percent (%):",
    }
}

fn item_choices(invoice: &InvoiceData) -> Vec<Choice> {
    invoice
        .items
        .iter()
        .map(|i| Choice {
            id: i.id.clone(),
            label: format!(
                "{} ({} × {})",
                if i.description.trim().is_empty() { "(no description)" } else { i.description.as_str() },
                i.quantity,
                format_money(i.price, &invoice.currency)
            ),
        })
        .collect()
}

fn fee_choices(invoice: &InvoiceData) -> Vec<Choice> {
    invoice
        .fees
        .iter()
        .map(|f| Choice {
            id: f.id.clone(),
            label: match f.kind {
                FeeKind::Fixed => format!("{} ({})", f.description, format_money(f.amount, &invoice.currency)),
                FeeKind::Percent => format!("{} ({}%)", f.description, f.amount),
            },
        })
        .collect()
}

fn prompt_currency(current: &str) -> Result<String> {
    let options: Vec<CurrencyChoice> = CURRENCIES.iter().map(CurrencyChoice).collect();
    let cursor = CURRENCIES
        .iter()
        .position(|c| c.code.eq_ignore_ascii_case(current))
        .unwrap_or(0);
    let picked = Select::new("Currency:", options).with_starting_cursor(cursor).prompt()?;
    Ok(picked.0.code.to_string())
}

fn prompt_template(current: TemplateKind) -> Result<TemplateKind> {
    let cursor = TemplateKind::ALL.iter().position(|t| *t == current).unwrap_or(0);
    Ok(Select::new("Template:", TemplateKind::ALL.to_vec())
        .with_starting_cursor(cursor)
        .prompt()?)
}

fn prompt_logo() -> Result<Option<String>> {
    let path = Text::new("Logo image path (leave empty to remove):").prompt()?;
    let path = path.trim();
    if path.is_empty() {
        return Ok(None);
    }
    let expanded = crate::config::expand_home_dir(path);
    let url = logo_data_url(Path::new(&expanded))?;
    println!("✅ Logo loaded ({} KB).", url.len() / 1024);
    Ok(Some(url))
}

/// Read an image into a `data:` URL so it travels inside the invoice.
pub fn logo_data_url(path: &Path) -> Result<String> {
    let mime = image_mime(path)
        .with_context(|| format!("{} is not a supported image (png, jpg, gif, svg, webp)", path.display()))?;
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

pub fn confirm_reset() -> Result<bool> {
    Ok(Confirm::new("Start over? This clears the current invoice.")
        .with_default(false)
        .prompt()?)
}

pub fn prompt_import_text() -> Result<String> {
    println!("💡 Paste an email, note or description of the work. Use '\\n' for new lines.");
    let text = Text::new("Text to import:").prompt()?;
    Ok(unescape_newlines(&text))
}

pub fn clients_table(clients: &[SavedClient]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Email").add_attribute(Attribute::Bold),
        Cell::new("Address").add_attribute(Attribute::Bold),
    ]);
    for c in clients {
        table.add_row(vec![Cell::new(&c.name), Cell::new(&c.email), Cell::new(&c.address)]);
    }
    table
}

pub fn items_table(items: &[SavedItem], currency: &str) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Description").add_attribute(Attribute::Bold),
        Cell::new("Price").add_attribute(Attribute::Bold),
    ]);
    for i in items {
        table.add_row(vec![
            Cell::new(&i.description),
            Cell::new(format_money(i.price, currency)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

fn escape_newlines(s: &str) -> String {
    s.replace('\n', "\\n")
}

fn unescape_newlines(s: &str) -> String {
    s.replace("\\n", "\n")
}
