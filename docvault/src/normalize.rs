//! Normalization of driver-native types into string form.
//!
//! - `_id` always becomes a string, whatever type the store used for it.
//! - Every `DateTime` at any depth becomes UTC ISO-8601 with `+00:00`.
//! - Every other `ObjectId` at any depth becomes hex.
//!
//! Anything else is left exactly as read; types without a canonical form
//! are the serializer's problem.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};

use crate::document::{Document, Value};

/// Name of the primary identifier field.
pub const ID_FIELD: &str = "_id";

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS[.ffffff]+00:00`.
///
/// Fractional seconds are written only when non-zero, always with six digits.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    if dt.nanosecond() == 0 {
        dt.to_rfc3339_opts(SecondsFormat::Secs, false)
    } else {
        dt.to_rfc3339_opts(SecondsFormat::Micros, false)
    }
}

/// Normalize one document in place.
pub fn normalize_document(doc: &mut Document) {
    for (key, value) in doc.iter_mut() {
        if key == ID_FIELD {
            normalize_id(value);
        } else {
            normalize_value(value);
        }
    }
}

fn normalize_id(value: &mut Value) {
    if matches!(value, Value::String(_)) {
        return;
    }
    normalize_value(value);
    *value = Value::String(id_text(value));
}

/// String form of an identifier.
///
/// | id type            | text                                    |
/// |--------------------|-----------------------------------------|
/// | objectId           | 24 lowercase hex chars                  |
/// | numbers            | decimal                                 |
/// | bool / null        | `true`, `false`, `null`                 |
/// | binary, subtype 4  | hyphenated UUID                         |
/// | other binary       | lowercase hex                           |
/// | document / array   | compact JSON of the normalized value    |
pub fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int32(n) => n.to_string(),
        Value::Int64(n) => n.to_string(),
        Value::Double(n) => n.to_string(),
        Value::ObjectId(id) => id.to_hex(),
        Value::DateTime(dt) => format_timestamp(dt),
        Value::Binary { subtype: 4, bytes } if bytes.len() == 16 => {
            let mut raw = [0u8; 16];
            raw.copy_from_slice(bytes);
            uuid::Uuid::from_bytes(raw).hyphenated().to_string()
        }
        Value::Binary { bytes, .. } => hex::encode(bytes),
        Value::Decimal128(bytes) => hex::encode(bytes),
        Value::Regex { pattern, options } => format!("/{}/{}", pattern, options),
        Value::JavaScript(code) => code.clone(),
        Value::Timestamp { time, increment } => format!("Timestamp({}, {})", time, increment),
        Value::MinKey => "MinKey".to_string(),
        Value::MaxKey => "MaxKey".to_string(),
        Value::Undefined => "undefined".to_string(),
        Value::Array(_) | Value::Document(_) => id_json(value).to_string(),
    }
}

// Compound ids: JSON where possible, id text for everything else.
fn id_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int32(n) => (*n).into(),
        Value::Int64(n) => (*n).into(),
        Value::Double(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(n.to_string())),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(id_json).collect()),
        Value::Document(doc) => serde_json::Value::Object(
            doc.iter()
                .map(|(k, v)| (k.clone(), id_json(v)))
                .collect(),
        ),
        other => serde_json::Value::String(id_text(other)),
    }
}

/// Recursively replace identifiers and timestamps inside `value`.
pub fn normalize_value(value: &mut Value) {
    let text = match value {
        Value::ObjectId(id) => id.to_hex(),
        Value::DateTime(dt) => format_timestamp(dt),
        Value::Document(doc) => {
            for (_, nested) in doc.iter_mut() {
                normalize_value(nested);
            }
            return;
        }
        Value::Array(items) => {
            items.iter_mut().for_each(normalize_value);
            return;
        }
        _ => return,
    };
    *value = Value::String(text);
}
