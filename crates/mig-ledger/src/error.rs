//! Ledger error types

use mig_store::StoreError;

/// Errors from the execution ledger
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The unique index rejected a second record of a changeset
    ///
    /// Indicates a concurrency or logic bug: the lock should have prevented
    /// the race that got here.
    #[error("change {id}/{author} is already recorded in the ledger")]
    DuplicateChange {
        /// Changeset id
        id: String,
        /// Changeset author
        author: String,
    },

    /// `append` called before the unique index was verified
    #[error("ledger index on {collection} has not been verified; call ensure_unique_index first")]
    IndexNotVerified {
        /// Ledger collection
        collection: String,
    },

    /// The required unique index could not be created
    #[error("cannot create unique (id, author) index on {collection}: {source}")]
    IndexCreation {
        /// Ledger collection
        collection: String,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// Any other store failure
    #[error("ledger store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Check if error is a uniqueness violation
    #[inline]
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateChange { .. })
    }
}
