//! Storage abstraction for Story Book.
//!
//! A [`Collection`] is a named set of JSON documents addressed by a business
//! key. The importer only ever writes through this trait, so any backend that
//! offers an atomic single-document upsert can sit behind it.
//!
//! | Backend | Purpose |
//! |---------|---------|
//! | [`sqlite::SqliteCollection`] | The site's document store |
//! | [`memory::InMemoryCollection`] | Tests and dry tooling |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{DocumentKey, Record, StoredDocument, UpsertOutcome};

#[async_trait]
pub trait Collection: Send + Sync {
    /// Collection name as stored.
    fn name(&self) -> &str;

    /// Replace the document stored under `key` with `record`, or insert it
    /// if there is none. Must be atomic with respect to concurrent callers.
    async fn upsert(&self, key: &DocumentKey, record: &Record) -> Result<UpsertOutcome>;

    async fn get(&self, key: &DocumentKey) -> Result<Option<StoredDocument>>;

    /// First document whose top-level `field` equals `value`.
    async fn find_one(&self, field: &str, value: &Value) -> Result<Option<StoredDocument>>;

    async fn count(&self) -> Result<u64>;
}
