//! Run outcome

use mig_catalog::ChangeSetRef;
use mig_ledger::ChangeEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a successful run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Changesets executed and recorded for the first time, in order
    pub applied: Vec<ChangeEntry>,
    /// Already-recorded `runAlways` changesets executed again; not re-recorded
    pub reapplied: Vec<ChangeEntry>,
    /// Recorded changesets left alone
    pub skipped: Vec<ChangeSetRef>,
}

impl RunReport {
    /// Check if nothing was executed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty() && self.reapplied.is_empty() && self.skipped.is_empty()
    }

    /// Number of changesets that ran
    #[inline]
    #[must_use]
    pub fn executed(&self) -> usize {
        self.applied.len() + self.reapplied.len()
    }

    /// Ids of newly recorded changesets, in order
    #[must_use]
    pub fn applied_ids(&self) -> Vec<&str> {
        self.applied.iter().map(|e| e.id.as_str()).collect()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied, {} reapplied, {} skipped",
            self.applied.len(),
            self.reapplied.len(),
            self.skipped.len()
        )
    }
}
