//! Store error types

/// Errors surfaced by a [`DocumentStore`](crate::DocumentStore)
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend unreachable or refused the operation
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A unique index rejected the write
    #[error("duplicate key in {collection} for index {index}: {key}")]
    DuplicateKey {
        /// Collection written to
        collection: String,
        /// Name of the violated index
        index: String,
        /// Rendered key values
        key: String,
    },

    /// Index to drop does not exist
    #[error("index not found: {collection}.{name}")]
    IndexNotFound {
        /// Collection inspected
        collection: String,
        /// Requested index name
        name: String,
    },

    /// An index with the same name but a different definition exists
    #[error("index {name} in {collection} already exists with different options")]
    IndexConflict {
        /// Collection inspected
        collection: String,
        /// Conflicting index name
        name: String,
    },

    /// Value is not representable as a document
    #[error("expected a document, got {0}")]
    NotADocument(&'static str),

    /// Document does not match the expected record shape
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if error is a unique-index violation
    #[inline]
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    /// Check if error means the backend could not be reached
    #[inline]
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Create unavailable error
    #[inline]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}
