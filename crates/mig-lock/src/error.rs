//! Lock error types

use mig_store::StoreError;

/// Errors from lock operations
///
/// Contention is not an error here: `acquire` returns `false`.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The store failed while reading or writing the lock record
    #[error("lock store unavailable during {operation}: {source}")]
    Unavailable {
        /// Lock operation that failed
        operation: &'static str,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// The lock record exists but cannot be read
    #[error("lock record is malformed: {0}")]
    Malformed(#[source] StoreError),
}

impl LockError {
    pub(crate) fn unavailable(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Unavailable { operation, source }
    }

    /// Lock operation that failed, if the store was involved
    #[must_use]
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Unavailable { operation, .. } => Some(operation),
            Self::Malformed(_) => None,
        }
    }
}
