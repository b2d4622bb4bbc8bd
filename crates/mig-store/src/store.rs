//! Document store contract

use crate::document::Document;
use crate::error::StoreError;
use crate::filter::{Filter, Update};
use crate::index::IndexSpec;
use async_trait::async_trait;

/// Result of a conditional update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents matched by the filter (0 or 1)
    pub matched: u64,
    /// Documents whose fields actually changed
    pub modified: u64,
    /// Whether a new document was inserted
    pub upserted: bool,
}

impl UpdateOutcome {
    /// Check if the update took effect on a matched or newly inserted document
    #[inline]
    #[must_use]
    pub fn applied(&self) -> bool {
        self.matched > 0 || self.upserted
    }
}

/// Handle to one logical document database
///
/// Implementations must make each call atomic with respect to every other
/// call on the same collection. In particular [`update_one`](Self::update_one)
/// is the compare-and-swap primitive: evaluating the filter and applying the
/// update cannot be interleaved with another writer.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert one document
    ///
    /// # Errors
    /// - `StoreError::DuplicateKey` if `_id` or a unique index is violated
    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError>;

    /// First document matching the filter, in insertion order
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;

    /// All documents matching the filter, in insertion order
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    /// Atomically update the first document matching the filter
    ///
    /// With `upsert`, a missing match inserts a document seeded from the
    /// filter's equality constraints and then updated.
    ///
    /// # Errors
    /// - `StoreError::DuplicateKey` if the upserted or updated document
    ///   violates `_id` or a unique index
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Secondary indexes declared on the collection
    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, StoreError>;

    /// Declare an index; re-declaring an identical index is a no-op
    ///
    /// # Errors
    /// - `StoreError::DuplicateKey` if a unique index cannot be built over
    ///   existing documents
    /// - `StoreError::IndexConflict` if the name is taken by a different index
    async fn create_index(&self, collection: &str, index: IndexSpec) -> Result<(), StoreError>;

    /// Drop an index by name
    ///
    /// # Errors
    /// - `StoreError::IndexNotFound` if no such index exists
    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), StoreError>;
}
