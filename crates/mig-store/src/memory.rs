//! In-memory document store
//!
//! Each collection lives behind one `DashMap` shard entry, so every call holds
//! the collection exclusively for its whole duration. That makes
//! `update_one` a real compare-and-swap for callers sharing the store across
//! tasks or threads.

use crate::document::{Document, ID_FIELD};
use crate::error::StoreError;
use crate::filter::{Filter, Update};
use crate::index::{IndexSpec, ID_INDEX};
use crate::store::{DocumentStore, UpdateOutcome};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

/// Thread-safe in-process [`DocumentStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<String, Collection>,
}

#[derive(Debug, Default)]
struct Collection {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl Collection {
    /// Check `candidate` against `_id` and every unique index
    ///
    /// `skip` excludes the document being replaced.
    fn check_unique(
        &self,
        name: &str,
        candidate: &Document,
        skip: Option<usize>,
    ) -> Result<(), StoreError> {
        let others = || {
            self.documents
                .iter()
                .enumerate()
                .filter(move |(i, _)| Some(*i) != skip)
                .map(|(_, d)| d)
        };

        if let Some(id) = candidate.get(ID_FIELD) {
            if others().any(|d| d.get(ID_FIELD) == Some(id)) {
                return Err(duplicate(name, ID_INDEX, &[id.clone()]));
            }
        }

        for index in self.indexes.iter().filter(|i| i.unique) {
            let key = index.key_of(candidate);
            if others().any(|d| index.key_of(d) == key) {
                return Err(duplicate(name, &index.name, &key));
            }
        }

        Ok(())
    }
}

fn duplicate(collection: &str, index: &str, key: &[Value]) -> StoreError {
    StoreError::DuplicateKey {
        collection: collection.to_string(),
        index: index.to_string(),
        key: Value::Array(key.to_vec()).to_string(),
    }
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map_or(0, |c| c.documents.len())
    }

    /// Check if a collection holds no documents
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let mut coll = self.collections.entry(collection.to_string()).or_default();
        coll.check_unique(collection, &document, None)?;
        coll.documents.push(document);
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.collections.get(collection).and_then(|c| {
            c.documents.iter().find(|d| filter.matches(d)).cloned()
        }))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|d| filter.matches(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut coll = self.collections.entry(collection.to_string()).or_default();

        if let Some(pos) = coll.documents.iter().position(|d| filter.matches(d)) {
            let mut next = coll.documents[pos].clone();
            let modified = update.apply(&mut next);
            if modified {
                coll.check_unique(collection, &next, Some(pos))?;
                coll.documents[pos] = next;
            }
            return Ok(UpdateOutcome {
                matched: 1,
                modified: u64::from(modified),
                upserted: false,
            });
        }

        if !upsert {
            return Ok(UpdateOutcome::default());
        }

        let mut seeded = Document::new();
        for (field, value) in filter.implied_fields() {
            seeded.insert(field.to_string(), value.clone());
        }
        update.apply(&mut seeded);
        coll.check_unique(collection, &seeded, None)?;
        coll.documents.push(seeded);
        tracing::debug!(collection, "upserted document");

        Ok(UpdateOutcome {
            matched: 0,
            modified: 0,
            upserted: true,
        })
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default())
    }

    async fn create_index(&self, collection: &str, index: IndexSpec) -> Result<(), StoreError> {
        let mut coll = self.collections.entry(collection.to_string()).or_default();

        if let Some(existing) = coll.indexes.iter().find(|i| i.name == index.name) {
            if *existing == index {
                return Ok(());
            }
            return Err(StoreError::IndexConflict {
                collection: collection.to_string(),
                name: index.name,
            });
        }

        if index.unique {
            let mut seen: Vec<Vec<Value>> = Vec::with_capacity(coll.documents.len());
            for doc in &coll.documents {
                let key = index.key_of(doc);
                if seen.contains(&key) {
                    return Err(duplicate(collection, &index.name, &key));
                }
                seen.push(key);
            }
        }

        tracing::debug!(collection, index = %index.name, unique = index.unique, "created index");
        coll.indexes.push(index);
        Ok(())
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), StoreError> {
        let not_found = || StoreError::IndexNotFound {
            collection: collection.to_string(),
            name: name.to_string(),
        };

        let mut coll = self.collections.get_mut(collection).ok_or_else(not_found)?;
        let pos = coll
            .indexes
            .iter()
            .position(|i| i.name == name)
            .ok_or_else(not_found)?;
        coll.indexes.remove(pos);
        Ok(())
    }
}
