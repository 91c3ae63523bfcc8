//! Core data models used throughout Story Book.
//!
//! Records are kept as ordered JSON maps so fields the importer knows nothing
//! about survive the round trip into the document store untouched.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// A single imported record: an arbitrary JSON object.
pub type Record = Map<String, Value>;

/// Canonical form of a business key value.
///
/// The key is the compact JSON encoding of the value, so the number `1` and
/// the string `"1"` address different documents. Numbers are compared by
/// value: `1.0` and `1` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Build a key from a record field value. `null` is not a key.
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        Some(Self(canonical(value).to_string()))
    }

    /// Parse a key typed on the command line.
    ///
    /// Input that is valid JSON is taken as-is (`42` is a number, `"42"` a
    /// string); anything else is treated as a bare string.
    pub fn from_cli(input: &str) -> Self {
        match serde_json::from_str::<Value>(input) {
            Ok(value) if !value.is_null() => Self(canonical(&value).to_string()),
            _ => Self(Value::String(input.to_string()).to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Rewrite integral floats as integers, recursively, so numerically equal
/// keys encode identically.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                Value::from(f as i64)
            }
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        Value::Object(members) => Value::Object(
            members
                .iter()
                .map(|(k, v)| (k.clone(), canonical(v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an upsert did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// A document as held by a collection.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub collection: String,
    pub key: DocumentKey,
    pub body: Record,
    /// 1 after the first insert, incremented by every replace.
    pub revision: i64,
    pub created_at: i64,
    pub updated_at: i64,
}
