//! Invoice state packed into a single `?share=` link parameter.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;

use crate::model::InvoiceData;

pub const SHARE_PARAM: &str = "share";
/// Longest encoded payload we hand out. Links much past this get cut off by
/// browsers and mail clients.
pub const MAX_ENCODED_LEN: usize = 12_000;

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("failed to serialize invoice: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("the invoice data is too large to create a link ({len} > {max} characters); try removing the logo image")]
    TooLarge { len: usize, max: usize },
    #[error("share data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("share data is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("share data is not a valid invoice: {0}")]
    Json(#[source] serde_json::Error),
    #[error("share link is empty")]
    Empty,
}

/// Encode `invoice` as a URL-safe parameter value, refusing payloads over
/// [`MAX_ENCODED_LEN`].
pub fn encode(invoice: &InvoiceData) -> Result<String, ShareError> {
    let json = serde_json::to_string(invoice).map_err(ShareError::Serialize)?;
    let encoded = URL_SAFE_NO_PAD.encode(json.as_bytes());
    ensure_within_limit(&encoded)?;
    Ok(encoded)
}

pub fn ensure_within_limit(encoded: &str) -> Result<(), ShareError> {
    if encoded.len() > MAX_ENCODED_LEN {
        return Err(ShareError::TooLarge { len: encoded.len(), max: MAX_ENCODED_LEN });
    }
    Ok(())
}

pub fn share_link(base_url: &str, invoice: &InvoiceData) -> Result<String, ShareError> {
    let encoded = encode(invoice)?;
    let sep = if base_url.contains('?') { '&' } else { '?' };
    Ok(format!("{base_url}{sep}{SHARE_PARAM}={encoded}"))
}

/// How to reopen a link locally. The base URL only decorates the link;
/// nothing is served there unless the user points it at their own viewer.
pub fn open_hint(link: &str) -> String {
    format!("Open it with: invoice-studio open-share '{link}'")
}

/// Decode a full share link or a bare parameter value. Both URL-safe and
/// standard base64 are accepted, padded or not.
pub fn decode(input: &str) -> Result<InvoiceData, ShareError> {
    let raw = extract_param(input.trim());
    if raw.is_empty() {
        return Err(ShareError::Empty);
    }
    let raw = urlencoding::decode(raw).map(|c| c.into_owned()).unwrap_or_else(|_| raw.to_string());
    let normalized: String = raw
        .chars()
        .filter(|c| *c != '=' && !c.is_whitespace())
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = URL_SAFE_NO_PAD.decode(normalized.as_bytes())?;
    let json = String::from_utf8(bytes)?;
    serde_json::from_str(&json).map_err(ShareError::Json)
}

fn extract_param(input: &str) -> &str {
    let needle = format!("{SHARE_PARAM}=");
    let Some(query_start) = input.find('?') else {
        return input.strip_prefix(needle.as_str()).unwrap_or(input);
    };
    input[query_start + 1..]
        .split(['&', '#'])
        .find_map(|pair| pair.strip_prefix(needle.as_str()))
        .unwrap_or("")
}

/// A `mailto:` draft that sends the share link to the client.
pub fn mail_draft(invoice: &InvoiceData, link: &str) -> String {
    let client = if invoice.client.name.trim().is_empty() { "there" } else { invoice.client.name.as_str() };
    let subject = format!("Invoice {} from {}", invoice.invoice_number, invoice.sender.name);
    let body = format!(
        "Hi {client},\n\nPlease find attached invoice #{}.\n\nYou can view and print it online here:\n{link}\n\nBest regards,\n{}",
        invoice.invoice_number, invoice.sender.name
    );
    format!(
        "mailto:{}?subject={}&body={}",
        invoice.client.email,
        urlencoding::encode(&subject),
        urlencoding::encode(&body)
    )
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{Fee, FeeKind, LineItem, TemplateKind};

    fn invoice() -> InvoiceData {
        let mut inv = InvoiceData::new_for(NaiveDate::from_ymd_opt(2025, 4, 2).unwrap());
        inv.client.name = "Zoë & Co".into();
        inv.items.push(LineItem::new("Half day", 0.5, 640.25));
        inv.fees.push(Fee::new("Card", 2.9, FeeKind::Percent));
        inv.tax_rate = 7.5;
        inv.template = TemplateKind::Minimal;
        inv
    }

    #[test]
    fn encode_then_decode_is_lossless() {
        let inv = invoice();
        let encoded = encode(&inv).unwrap();
        assert_eq!(decode(&encoded).unwrap(), inv);
    }

    #[test]
    fn full_links_decode_too() {
        let inv = invoice();
        let link = share_link("https://invoices.example/?lang=en", &inv).unwrap();
        assert!(link.starts_with("https://invoices.example/?lang=en&share="));
        assert_eq!(decode(&link).unwrap(), inv);
    }

    #[test]
    fn open_hint_carries_a_link_that_open_share_accepts() {
        let inv = invoice();
        let link = share_link(crate::config::DEFAULT_SHARE_BASE_URL, &inv).unwrap();
        let hint = open_hint(&link);
        assert!(hint.contains("invoice-studio open-share"));

        let quoted = hint.split('\'').nth(1).unwrap();
        assert_eq!(quoted, link);
        assert_eq!(decode(quoted).unwrap(), inv);
    }

    #[test]
    fn standard_padded_base64_is_accepted() {
        let inv = invoice();
        let json = serde_json::to_string(&inv).unwrap();
        let padded = STANDARD.encode(json);
        assert_eq!(decode(&padded).unwrap(), inv);
    }

    #[test]
    fn oversized_payload_is_refused_at_encode_time() {
        let mut inv = invoice();
        inv.logo = Some(format!("data:image/png;base64,{}", "A".repeat(MAX_ENCODED_LEN)));
        assert!(matches!(encode(&inv), Err(ShareError::TooLarge { .. })));
        assert!(matches!(share_link("https://x", &inv), Err(ShareError::TooLarge { .. })));
    }

    #[test]
    fn limit_is_inclusive() {
        assert!(ensure_within_limit(&"a".repeat(MAX_ENCODED_LEN)).is_ok());
        let err = ensure_within_limit(&"a".repeat(MAX_ENCODED_LEN + 1)).unwrap_err();
        assert!(matches!(err, ShareError::TooLarge { len, .. } if len == MAX_ENCODED_LEN + 1));
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        assert!(decode("").is_err());
        assert!(decode("!!!").is_err());
        assert!(decode("https://x/?other=1").is_err());
        let not_invoice = URL_SAFE_NO_PAD.encode("[1,2,3]");
        assert!(matches!(decode(&not_invoice), Err(ShareError::Json(_))));
    }

    #[test]
    fn mail_draft_embeds_the_link() {
        let mut inv = invoice();
        inv.client.email = "ap@zoe.test".into();
        inv.sender.name = "Northwind".into();
        let draft = mail_draft(&inv, "https://x/?share=abc");
        assert!(draft.starts_with("mailto:ap@zoe.test?subject=Invoice%20INV-001%20from%20Northwind"));
        assert!(draft.contains("https%3A%2F%2Fx%2F%3Fshare%3Dabc"));
    }
}
