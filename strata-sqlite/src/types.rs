//! Conversions between resolver values and SQLite values.

use rusqlite::types::{Value as SqlValue, ValueRef};

use strata_query::{Key, Value};

/// Convert a resolver value to a SQLite value.
///
/// Booleans are stored as 0/1 and lists as their JSON text.
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.to_string()),
        Value::List(items) => SqlValue::Text(serde_json::to_string(items).unwrap_or_default()),
    }
}

/// Convert a key to a SQLite value.
pub fn key_to_sql(key: &Key) -> SqlValue {
    match key {
        Key::Int(i) => SqlValue::Integer(*i),
        Key::String(s) => SqlValue::Text(s.to_string()),
    }
}

/// Convert a column value to a resolver value.
///
/// Blobs that are not valid UTF-8 are decoded lossily.
pub fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).as_ref().into())
        }
    }
}
