//! Identity of a changeset within its changelog

use serde::{Deserialize, Serialize};
use std::fmt;

/// Names a changeset for the ledger, reports and errors
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeSetRef {
    /// Declaring changelog name
    pub change_log: String,
    /// Declaring function name
    pub name: String,
    /// Changeset id
    pub id: String,
    /// Changeset author
    pub author: String,
}

impl ChangeSetRef {
    /// Create reference
    #[must_use]
    pub fn new(
        change_log: impl Into<String>,
        name: impl Into<String>,
        id: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            change_log: change_log.into(),
            name: name.into(),
            id: id.into(),
            author: author.into(),
        }
    }

    /// Declaring changelog plus function name, as persisted in the ledger
    #[must_use]
    pub fn source_location(&self) -> String {
        format!("{}.{}", self.change_log, self.name)
    }
}

impl fmt::Display for ChangeSetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({}.{})",
            self.id, self.author, self.change_log, self.name
        )
    }
}
