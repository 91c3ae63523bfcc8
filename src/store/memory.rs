//! In-memory [`Collection`] implementation for testing.
//!
//! Documents live in a `BTreeMap` behind a `std::sync::RwLock`; an upsert
//! holds the write lock for its whole check-and-write.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{DocumentKey, Record, StoredDocument, UpsertOutcome};

use super::Collection;

pub struct InMemoryCollection {
    name: String,
    docs: RwLock<BTreeMap<DocumentKey, StoredDocument>>,
}

impl InMemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Snapshot of every stored document, ordered by key.
    pub fn documents(&self) -> Vec<StoredDocument> {
        self.docs.read().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, key: &DocumentKey, record: &Record) -> Result<UpsertOutcome> {
        let now = chrono::Utc::now().timestamp();
        let mut docs = self.docs.write().unwrap();
        match docs.get_mut(key) {
            Some(existing) => {
                existing.body = record.clone();
                existing.revision += 1;
                existing.updated_at = now;
                Ok(UpsertOutcome::Replaced)
            }
            None => {
                docs.insert(
                    key.clone(),
                    StoredDocument {
                        collection: self.name.clone(),
                        key: key.clone(),
                        body: record.clone(),
                        revision: 1,
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn get(&self, key: &DocumentKey) -> Result<Option<StoredDocument>> {
        Ok(self.docs.read().unwrap().get(key).cloned())
    }

    async fn find_one(&self, field: &str, value: &Value) -> Result<Option<StoredDocument>> {
        let docs = self.docs.read().unwrap();
        Ok(docs
            .values()
            .find(|doc| doc.body.get(field) == Some(value))
            .cloned())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.docs.read().unwrap().len() as u64)
    }
}
