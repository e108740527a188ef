//! Numeric normalization for values scraped out of markup.

use serde_json::Value;

/// Parse the first number in `raw`, ignoring currency symbols, thousands
/// separators and unit suffixes: `"$2,150/mo"` → 2150, `"1,024 sqft"` → 1024.
pub fn parse_number(raw: &str) -> Option<f64> {
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    let digits: String = raw[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    let digits = digits.trim_end_matches('.');

    let value: f64 = digits.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Numeric JSON value or a numeric string
pub fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Non-empty trimmed string from a JSON value
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
