//! Catalog error types

/// Malformed catalog input
///
/// Always fatal, and always raised before any lock is taken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Changelog declared without a name
    #[error("changelog with order key '{order_key}' has an empty name")]
    EmptyChangeLogName {
        /// Order key of the offending changelog
        order_key: String,
    },

    /// Changeset declared without an id
    #[error("changeset {change_log}.{name} has an empty id")]
    MissingId {
        /// Declaring changelog
        change_log: String,
        /// Declaring function name
        name: String,
    },

    /// Changeset declared without an author
    #[error("changeset '{id}' in {change_log} has an empty author")]
    MissingAuthor {
        /// Declaring changelog
        change_log: String,
        /// Changeset id
        id: String,
    },

    /// Provider could not produce descriptors
    #[error("catalog provider failed: {0}")]
    Provider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_error_display() {
        let err = CatalogError::MissingAuthor {
            change_log: "users".to_string(),
            id: "init".to_string(),
        };
        assert_eq!(err.to_string(), "changeset 'init' in users has an empty author");
    }
}
