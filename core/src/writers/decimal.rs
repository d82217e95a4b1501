//! Recursive float→decimal conversion for analytics payloads. Grounded in
//! `chatbot_engine.py`'s `_log_analytics_isolated`, which converts floats
//! to `Decimal` before writing so the downstream store never receives a
//! raw IEEE-754 float (the out-of-scope store rejects them).

use rust_decimal::Decimal;
use serde_json::Value;

/// A JSON-like value where every float has been converted to [`Decimal`].
/// Kept distinct from `serde_json::Value` so a caller can't accidentally
/// write an unconverted float downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsValue {
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Array(Vec<AnalyticsValue>),
    Object(std::collections::BTreeMap<String, AnalyticsValue>),
}

/// Converts a `serde_json::Value` tree, turning every JSON number that
/// isn't a clean integer into a `Decimal` via its string representation
/// (avoids the binary-float round-trip `Decimal::from_f64` would do).
pub fn convert(value: &Value) -> AnalyticsValue {
    match value {
        Value::Null => AnalyticsValue::Null,
        Value::Bool(b) => AnalyticsValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                AnalyticsValue::Integer(i)
            } else {
                n.to_string()
                    .parse::<Decimal>()
                    .map(AnalyticsValue::Decimal)
                    .unwrap_or(AnalyticsValue::Null)
            }
        }
        Value::String(s) => AnalyticsValue::String(s.clone()),
        Value::Array(items) => AnalyticsValue::Array(items.iter().map(convert).collect()),
        Value::Object(map) => {
            AnalyticsValue::Object(map.iter().map(|(k, v)| (k.clone(), convert(v))).collect())
        }
    }
}
