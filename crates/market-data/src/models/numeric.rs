//! Lenient numeric parsing for provider payloads.
//!
//! Providers encode numbers as strings (`"187.4400"`), sometimes with a trailing
//! percent sign (`"0.5146%"`). Anything that does not parse is treated as absent.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

fn decimal_from_str(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Parse a provider value (string or JSON number) into a decimal.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => decimal_from_str(s),
        Value::Number(n) => decimal_from_str(&n.to_string()),
        _ => None,
    }
}

/// Parse a percent-formatted value (`"0.51%"`) into a plain decimal (`0.51`).
pub fn parse_percent(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => decimal_from_str(s.trim().trim_end_matches('%')),
        other => parse_decimal(other),
    }
}
