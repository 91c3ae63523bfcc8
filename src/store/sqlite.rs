//! SQLite-backed [`Collection`].
//!
//! Every collection shares the `documents` table, partitioned by the
//! `collection` column. Upserts are a single `INSERT … ON CONFLICT DO UPDATE`
//! statement, so the check-and-write is atomic inside SQLite.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{DocumentKey, Record, StoredDocument, UpsertOutcome};

use super::Collection;

#[derive(Clone)]
pub struct SqliteCollection {
    pool: SqlitePool,
    name: String,
}

impl SqliteCollection {
    pub fn new(pool: SqlitePool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
        }
    }
}

/// JSON path addressing a top-level member, quoted so field names with dots
/// or spaces stay a single path step. SQLite path labels have no escape for
/// `"`, so such names cannot be addressed.
fn member_path(field: &str) -> Result<String> {
    if field.contains('"') {
        bail!("field name cannot contain '\"': {}", field);
    }
    Ok(format!("$.\"{}\"", field))
}

fn row_to_document(row: &SqliteRow) -> Result<StoredDocument> {
    let key: String = row.get("doc_key");
    let body: String = row.get("body");
    let body: Record = serde_json::from_str(&body)
        .with_context(|| format!("Corrupt document body for key {}", key))?;
    let key_value: Value = serde_json::from_str(&key)
        .with_context(|| format!("Corrupt document key {}", key))?;

    Ok(StoredDocument {
        collection: row.get("collection"),
        key: DocumentKey::from_value(&key_value)
            .with_context(|| format!("Null document key in {}", key))?,
        body,
        revision: row.get("revision"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, key: &DocumentKey, record: &Record) -> Result<UpsertOutcome> {
        let body = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp();

        let revision: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO documents (collection, doc_key, body, revision, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            ON CONFLICT(collection, doc_key) DO UPDATE SET
                body = excluded.body,
                revision = documents.revision + 1,
                updated_at = excluded.updated_at
            RETURNING revision
            "#,
        )
        .bind(&self.name)
        .bind(key.as_str())
        .bind(&body)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(if revision == 1 {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Replaced
        })
    }

    async fn get(&self, key: &DocumentKey) -> Result<Option<StoredDocument>> {
        let row = sqlx::query(
            "SELECT collection, doc_key, body, revision, created_at, updated_at FROM documents WHERE collection = ? AND doc_key = ?",
        )
        .bind(&self.name)
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn find_one(&self, field: &str, value: &Value) -> Result<Option<StoredDocument>> {
        // `->` yields the member as JSON text, which matches serde's compact
        // encoding for the scalars stored by `upsert`.
        let row = sqlx::query(
            r#"
            SELECT collection, doc_key, body, revision, created_at, updated_at
            FROM documents
            WHERE collection = ? AND body -> ? = ?
            ORDER BY doc_key ASC
            LIMIT 1
            "#,
        )
        .bind(&self.name)
        .bind(member_path(field)?)
        .bind(value.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
