//! Ledger index inspection and repair
//!
//! Older deployments may carry an `(id, author)` index that was created
//! without the unique flag. Such an index looks right but protects nothing,
//! so it is dropped and rebuilt.

use mig_store::{DocumentStore, IndexSpec, StoreError};

/// Fields covered by the ledger's uniqueness constraint
pub const LEDGER_INDEX_KEYS: [&str; 2] = ["id", "author"];

/// What [`ExecutionLedger::ensure_unique_index`](crate::ExecutionLedger::ensure_unique_index) did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRepair {
    /// A unique index was already in place
    Present,
    /// No index covered `(id, author)`; one was created
    Created,
    /// A non-unique index was dropped and recreated as unique
    Recreated,
}

/// Index operations on the ledger collection
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerIndex;

impl LedgerIndex {
    /// Create index helper
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The index the ledger requires
    #[must_use]
    pub fn required() -> IndexSpec {
        IndexSpec::new(LEDGER_INDEX_KEYS).unique()
    }

    /// Find an index over exactly `(id, author)`, unique or not
    ///
    /// # Errors
    /// Store failures are propagated.
    pub async fn find_required_index(
        &self,
        store: &dyn DocumentStore,
        collection: &str,
    ) -> Result<Option<IndexSpec>, StoreError> {
        Ok(store
            .list_indexes(collection)
            .await?
            .into_iter()
            .find(|i| i.covers(&LEDGER_INDEX_KEYS)))
    }

    /// Check if an index enforces uniqueness
    #[inline]
    #[must_use]
    pub fn is_unique(index: &IndexSpec) -> bool {
        index.unique
    }

    /// Create the required unique index
    ///
    /// # Errors
    /// Fails if existing records already violate uniqueness.
    pub async fn create_required_unique_index(
        &self,
        store: &dyn DocumentStore,
        collection: &str,
    ) -> Result<(), StoreError> {
        store.create_index(collection, Self::required()).await
    }

    /// Drop an index found by [`find_required_index`](Self::find_required_index)
    ///
    /// # Errors
    /// Store failures are propagated.
    pub async fn drop_index(
        &self,
        store: &dyn DocumentStore,
        collection: &str,
        index: &IndexSpec,
    ) -> Result<(), StoreError> {
        store.drop_index(collection, &index.name).await
    }
}
