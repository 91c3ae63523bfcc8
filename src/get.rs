//! Document retrieval by key or by field.
//!
//! Used by `sbook get` to check what an import left in a collection, and
//! the same lookups the site performs (categories by `url`, gallery entries
//! by `filename`).

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{DocumentKey, StoredDocument};
use crate::store::sqlite::SqliteCollection;
use crate::store::Collection;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub collection: String,
    pub key: Value,
    pub revision: i64,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
    pub body: Value,
}

impl From<StoredDocument> for DocumentResponse {
    fn from(doc: StoredDocument) -> Self {
        Self {
            collection: doc.collection,
            key: serde_json::from_str(doc.key.as_str()).unwrap_or(Value::Null),
            revision: doc.revision,
            created_at: format_ts_iso(doc.created_at),
            updated_at: format_ts_iso(doc.updated_at),
            body: Value::Object(doc.body),
        }
    }
}

/// How `sbook get` addresses a document.
#[derive(Debug, Clone)]
pub enum Lookup {
    Key(DocumentKey),
    Field { field: String, value: Value },
}

impl Lookup {
    /// `value` is read like a CLI key: JSON when it parses, a string otherwise.
    pub fn from_cli(field: Option<String>, value: &str) -> Self {
        match field {
            None => Lookup::Key(DocumentKey::from_cli(value)),
            Some(field) => Lookup::Field {
                field,
                value: serde_json::from_str::<Value>(value)
                    .ok()
                    .filter(|v| !v.is_null())
                    .unwrap_or_else(|| Value::String(value.to_string())),
            },
        }
    }
}

pub async fn find_document(
    collection: &dyn Collection,
    lookup: &Lookup,
) -> Result<Option<DocumentResponse>> {
    let doc = match lookup {
        Lookup::Key(key) => collection.get(key).await?,
        Lookup::Field { field, value } => collection.find_one(field, value).await?,
    };
    Ok(doc.map(DocumentResponse::from))
}

pub async fn run_get(config: &Config, collection: &str, lookup: Lookup) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let col = SqliteCollection::new(pool.clone(), collection);
    let found = find_document(&col, &lookup).await;
    pool.close().await;

    match found? {
        Some(doc) => {
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        None => match lookup {
            Lookup::Key(key) => bail!("document not found: {} {}", collection, key),
            Lookup::Field { field, value } => {
                bail!("document not found: {} where {} = {}", collection, field, value)
            }
        },
    }
}

fn format_ts_iso(ts: i64) -> String {
    match chrono::DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        None => ts.to_string(),
    }
}
