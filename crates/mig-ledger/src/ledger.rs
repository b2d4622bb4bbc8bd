//! Execution ledger over a document store collection

use crate::entry::ChangeEntry;
use crate::error::LedgerError;
use crate::index::{IndexRepair, LedgerIndex};
use mig_store::{from_document, to_document, DocumentStore, Filter, StoreError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default ledger collection name
pub const DEFAULT_LEDGER_COLLECTION: &str = "changelog";

/// Record of executed changesets
///
/// Records are insert-only. Uniqueness of `(id, author)` is enforced by a
/// store index that [`ensure_unique_index`](Self::ensure_unique_index)
/// creates or repairs; [`append`](Self::append) refuses to run until that
/// has happened on this handle.
pub struct ExecutionLedger {
    store: Arc<dyn DocumentStore>,
    collection: String,
    index: LedgerIndex,
    index_verified: AtomicBool,
}

impl ExecutionLedger {
    /// Create ledger over `collection`
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            index: LedgerIndex::new(),
            index_verified: AtomicBool::new(false),
        }
    }

    /// Ledger collection name
    #[inline]
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Make sure a unique `(id, author)` index exists
    ///
    /// A matching non-unique index is dropped and recreated. Safe to call
    /// any number of times.
    ///
    /// # Errors
    /// - `LedgerError::IndexCreation` if existing records violate uniqueness
    /// - `LedgerError::Store` on any other store failure
    pub async fn ensure_unique_index(&self) -> Result<IndexRepair, LedgerError> {
        let store = self.store.as_ref();
        let existing = self
            .index
            .find_required_index(store, &self.collection)
            .await?;

        let repair = match existing {
            Some(index) if LedgerIndex::is_unique(&index) => {
                debug!(collection = %self.collection, index = %index.name, "ledger index present");
                IndexRepair::Present
            }
            Some(index) => {
                warn!(
                    collection = %self.collection,
                    index = %index.name,
                    "ledger index is not unique, recreating"
                );
                self.index
                    .drop_index(store, &self.collection, &index)
                    .await?;
                self.create_index().await?;
                IndexRepair::Recreated
            }
            None => {
                info!(collection = %self.collection, "creating unique ledger index");
                self.create_index().await?;
                IndexRepair::Created
            }
        };

        self.index_verified.store(true, Ordering::Release);
        Ok(repair)
    }

    async fn create_index(&self) -> Result<(), LedgerError> {
        self.index
            .create_required_unique_index(self.store.as_ref(), &self.collection)
            .await
            .map_err(|source| LedgerError::IndexCreation {
                collection: self.collection.clone(),
                source,
            })
    }

    /// Check if `(id, author)` has been recorded
    ///
    /// # Errors
    /// Store failures are propagated.
    pub async fn contains(&self, id: &str, author: &str) -> Result<bool, LedgerError> {
        Ok(self
            .store
            .find_one(&self.collection, &Self::key_filter(id, author))
            .await?
            .is_some())
    }

    /// Record of `(id, author)`, if any
    ///
    /// # Errors
    /// Store failures and unreadable records are propagated.
    pub async fn find(&self, id: &str, author: &str) -> Result<Option<ChangeEntry>, LedgerError> {
        self.store
            .find_one(&self.collection, &Self::key_filter(id, author))
            .await?
            .map(from_document)
            .transpose()
            .map_err(LedgerError::from)
    }

    /// Record an executed changeset
    ///
    /// # Errors
    /// - `LedgerError::IndexNotVerified` before `ensure_unique_index`
    /// - `LedgerError::DuplicateChange` if `(id, author)` is already recorded
    /// - `LedgerError::Store` on any other store failure
    pub async fn append(&self, entry: &ChangeEntry) -> Result<(), LedgerError> {
        if !self.index_verified.load(Ordering::Acquire) {
            return Err(LedgerError::IndexNotVerified {
                collection: self.collection.clone(),
            });
        }

        let document = to_document(entry)?;
        match self.store.insert_one(&self.collection, document).await {
            Ok(()) => {
                debug!(id = %entry.id, author = %entry.author, "ledger entry recorded");
                Ok(())
            }
            Err(StoreError::DuplicateKey { .. }) => Err(LedgerError::DuplicateChange {
                id: entry.id.clone(),
                author: entry.author.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// All records, oldest first
    ///
    /// # Errors
    /// Store failures and unreadable records are propagated.
    pub async fn entries(&self) -> Result<Vec<ChangeEntry>, LedgerError> {
        let mut entries = self
            .store
            .find(&self.collection, &Filter::All)
            .await?
            .into_iter()
            .map(from_document)
            .collect::<Result<Vec<ChangeEntry>, _>>()?;
        entries.sort_by_key(|e| e.executed_at);
        Ok(entries)
    }

    fn key_filter(id: &str, author: &str) -> Filter {
        Filter::eq("id", id).and(Filter::eq("author", author))
    }
}

impl fmt::Debug for ExecutionLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionLedger")
            .field("collection", &self.collection)
            .field(
                "index_verified",
                &self.index_verified.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}
