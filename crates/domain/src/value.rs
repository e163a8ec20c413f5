//! Loose comparison helpers for JSON field values.
//!
//! Clients send ids and flags both as numbers and as strings (`1` vs `"1"`),
//! so filters and checks compare the textual form of scalar values.

use serde_json::Value;

use crate::id::RecordId;

/// Textual form of a scalar value; `None` for arrays and objects.
#[must_use]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some("0".to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Compare two values by their textual form.
#[must_use]
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (scalar_text(a), scalar_text(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Whether a value counts as "set": not null, false, zero, `""`, `"0"` or empty.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Whether a value is a number or a numeric string.
#[must_use]
pub fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

/// Integer form of a number, numeric string or boolean.
#[must_use]
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Interpret a value as a record reference.
#[must_use]
pub fn as_id(value: &Value) -> Option<RecordId> {
    as_i64(value).and_then(RecordId::new)
}

/// Collect record references from a scalar or an array of scalars.
#[must_use]
pub fn ids(value: &Value) -> Vec<RecordId> {
    let mut out = Vec::new();
    match value {
        Value::Array(items) => {
            for id in items.iter().filter_map(as_id) {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        other => out.extend(as_id(other)),
    }
    out
}
