// Field normalization - form values → flat storage columns
//
// Multi-select answers are stored as JSON-array text so one row keeps
// one column per field.

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};

/// A value as it arrives from a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Integer(i64),
    Text(String),
    List(Vec<String>),
    Absent,
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Flag(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::List(items)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Absent)
    }
}

/// A value ready to bind into a single column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StorageValue {
    Null,
    Flag(bool),
    Integer(i64),
    Text(String),
}

impl ToSql for StorageValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            StorageValue::Null => ToSqlOutput::Owned(Value::Null),
            StorageValue::Flag(b) => ToSqlOutput::Owned(Value::Integer(*b as i64)),
            StorageValue::Integer(n) => ToSqlOutput::Owned(Value::Integer(*n)),
            StorageValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl StorageValue {
    /// Raw column value, typed by what SQLite actually holds
    pub fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => StorageValue::Null,
            ValueRef::Integer(n) => StorageValue::Integer(n),
            ValueRef::Real(r) => StorageValue::Text(r.to_string()),
            ValueRef::Text(t) => StorageValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => StorageValue::Text(hex::encode(b)),
        }
    }
}

/// Lists become JSON-array text; scalars pass through
pub fn normalize(value: FieldValue) -> StorageValue {
    match value {
        FieldValue::Flag(b) => StorageValue::Flag(b),
        FieldValue::Integer(n) => StorageValue::Integer(n),
        FieldValue::Text(s) => StorageValue::Text(s),
        FieldValue::List(items) => {
            // Serializing Vec<String> cannot fail
            StorageValue::Text(serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string()))
        }
        FieldValue::Absent => StorageValue::Null,
    }
}

/// Inverse of `normalize` for list fields
pub fn deserialize_list(text: &str) -> Result<Vec<String>, serde_json::Error> {
    serde_json::from_str(text)
}

/// Split a comma-separated admin input into list items
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
