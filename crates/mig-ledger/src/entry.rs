//! Ledger record

use chrono::{DateTime, SubsecRound, Utc};
use mig_catalog::ChangeSetRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One executed changeset as persisted in the ledger
///
/// `executedAt` is stored as epoch milliseconds; construction truncates to
/// the same precision so a record reads back equal to what was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    /// Changeset id
    pub id: String,
    /// Changeset author
    pub author: String,
    /// When the executable completed
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub executed_at: DateTime<Utc>,
    /// `<changelog>.<changeset name>`
    pub source_location: String,
    /// Declaring changelog
    pub change_log: String,
    /// Declaring changeset function name
    pub change_set: String,
}

impl ChangeEntry {
    /// Create entry for a changeset executed at `executed_at`
    #[must_use]
    pub fn new(reference: &ChangeSetRef, executed_at: DateTime<Utc>) -> Self {
        Self {
            id: reference.id.clone(),
            author: reference.author.clone(),
            executed_at: executed_at.trunc_subsecs(3),
            source_location: reference.source_location(),
            change_log: reference.change_log.clone(),
            change_set: reference.name.clone(),
        }
    }

    /// Create entry stamped with the current time
    #[inline]
    #[must_use]
    pub fn now(reference: &ChangeSetRef) -> Self {
        Self::new(reference, Utc::now())
    }

    /// Check if this entry records the given `(id, author)`
    #[inline]
    #[must_use]
    pub fn is_for(&self, id: &str, author: &str) -> bool {
        self.id == id && self.author == author
    }
}

impl fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChangeEntry{{id={}, author={}, executedAt={}, source={}}}",
            self.id,
            self.author,
            self.executed_at.to_rfc3339(),
            self.source_location
        )
    }
}
