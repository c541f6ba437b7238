//! Currency codes and minor-unit helpers.

use serde::{Deserialize, Serialize};

/// ISO 4217 currency representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CurrencyCode(pub String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn minor_units(&self) -> u8 {
        minor_units_for(self.as_str())
    }

    pub fn symbol(&self) -> String {
        symbol_for(self.as_str())
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("USD")
    }
}

pub fn symbol_for(code: &str) -> String {
    match code {
        "USD" => "$".into(),
        "EUR" => "€".into(),
        "GBP" => "£".into(),
        "JPY" => "¥".into(),
        "AUD" => "A$".into(),
        _ => code.into(),
    }
}

pub fn minor_units_for(code: &str) -> u8 {
    match code {
        "JPY" | "KRW" => 0,
        "KWD" | "BHD" => 3,
        _ => 2,
    }
}

/// Renders an amount held in minor units, e.g. `-1234` USD as `-$12.34`.
pub fn format_minor(amount_minor: i64, code: &CurrencyCode) -> String {
    let precision = code.minor_units() as u32;
    let divisor = 10_i64.pow(precision);
    let abs = amount_minor.unsigned_abs();
    let whole = abs / divisor as u64;
    let fraction = abs % divisor as u64;
    let sign = if amount_minor < 0 { "-" } else { "" };
    let whole = group_digits(&whole.to_string(), ',');
    if precision == 0 {
        format!("{sign}{}{whole}", code.symbol())
    } else {
        format!(
            "{sign}{}{whole}.{fraction:0width$}",
            code.symbol(),
            width = precision as usize
        )
    }
}

fn group_digits(digits: &str, separator: char) -> String {
    let mut grouped = String::new();
    for (count, ch) in digits.chars().rev().enumerate() {
        if count != 0 && count % 3 == 0 {
            grouped.insert(0, separator);
        }
        grouped.insert(0, ch);
    }
    grouped
}
