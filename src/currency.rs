use crate::model::DEFAULT_CURRENCY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
    /// Prefix used when printing amounts, en-US style (`CA$`, `CHF `).
    display: &'static str,
    pub fraction_digits: usize,
}

const fn currency(
    code: &'static str,
    symbol: &'static str,
    name: &'static str,
    display: &'static str,
    fraction_digits: usize,
) -> Currency {
    Currency { code, symbol, name, display, fraction_digits }
}

pub const CURRENCIES: &[Currency] = &[
    currency("USD", "$", "United States Dollar", "$", 2),
    currency("EUR", "€", "Euro", "€", 2),
    currency("GBP", "£", "British Pound", "£", 2),
    currency("CAD", "$", "Canadian Dollar", "CA$", 2),
    currency("AUD", "$", "Australian Dollar", "A$", 2),
    currency("JPY", "¥", "Japanese Yen", "¥", 0),
    currency("CNY", "¥", "Chinese Yuan", "CN¥", 2),
    currency("INR", "₹", "Indian Rupee", "₹", 2),
    currency("BRL", "R$", "Brazilian Real", "R$", 2),
    currency("MXN", "$", "Mexican Peso", "MX$", 2),
    currency("CHF", "Fr", "Swiss Franc", "CHF\u{a0}", 2),
    currency("ZAR", "R", "South African Rand", "ZAR\u{a0}", 2),
    currency("SGD", "$", "Singapore Dollar", "SGD\u{a0}", 2),
    currency("NZD", "$", "New Zealand Dollar", "NZ$", 2),
    currency("HKD", "$", "Hong Kong Dollar", "HK$", 2),
    currency("SEK", "kr", "Swedish Krona", "SEK\u{a0}", 2),
    currency("NOK", "kr", "Norwegian Krone", "NOK\u{a0}", 2),
];

pub fn lookup(code: &str) -> Option<&'static Currency> {
    let code = code.trim();
    let code = if code.is_empty() { DEFAULT_CURRENCY } else { code };
    CURRENCIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

impl Currency {
    pub fn format(&self, amount: f64) -> Option<String> {
        if !amount.is_finite() {
            return None;
        }
        let factor = 10u64.pow(self.fraction_digits as u32) as f64;
        let scaled = (amount.abs() * factor).round();
        if scaled >= u64::MAX as f64 {
            return None;
        }
        let scaled = scaled as u64;
        let factor = factor as u64;
        let whole = group_thousands(scaled / factor);
        let sign = if amount < 0.0 && scaled != 0 { "-" } else { "" };

        Some(if self.fraction_digits == 0 {
            format!("{sign}{}{whole}", self.display)
        } else {
            let frac = scaled % factor;
            format!(
                "{sign}{}{whole}.{frac:0width$}",
                self.display,
                width = self.fraction_digits
            )
        })
    }
}

/// Format `amount` for display in `code`. Unknown codes degrade to the bare
/// number rather than failing.
pub fn format_money(amount: f64, code: &str) -> String {
    lookup(code)
        .and_then(|c| c.format(amount))
        .unwrap_or_else(|| format!("{amount}"))
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|c| std::str::from_utf8(c).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_usd_with_grouping() {
        assert_eq!(format_money(1234567.891, "USD"), "$1,234,567.89");
        assert_eq!(format_money(0.0, "USD"), "$0.00");
        assert_eq!(format_money(349.0, "usd"), "$349.00");
    }

    #[test]
    fn negative_amounts_keep_a_leading_minus() {
        assert_eq!(format_money(-50.0, "USD"), "-$50.00");
        assert_eq!(format_money(-0.001, "USD"), "$0.00");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(format_money(0.125, "EUR"), "€0.13");
        assert_eq!(format_money(2.5, "JPY"), "¥3");
    }

    #[test]
    fn code_prefixed_currencies() {
        assert_eq!(format_money(1234.5, "CHF"), "CHF\u{a0}1,234.50");
        assert_eq!(format_money(10.0, "CAD"), "CA$10.00");
    }

    #[test]
    fn empty_code_means_usd() {
        assert_eq!(format_money(5.0, ""), "$5.00");
    }

    #[test]
    fn unknown_code_falls_back_to_raw_number() {
        assert_eq!(format_money(300.0, "XYZ"), "300");
        assert_eq!(format_money(2.5, "not-a-code"), "2.5");
        assert_eq!(format_money(f64::NAN, "USD"), "NaN");
    }

    #[test]
    fn table_has_unique_codes() {
        for (i, a) in CURRENCIES.iter().enumerate() {
            for b in &CURRENCIES[i + 1..] {
                assert_ne!(a.code, b.code);
            }
        }
    }
}
