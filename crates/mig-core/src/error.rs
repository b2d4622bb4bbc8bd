//! Runner error taxonomy

use crate::config::ConfigError;
use mig_catalog::{CatalogError, ChangeSetRef};
use mig_ledger::LedgerError;
use mig_lock::LockError;
use std::fmt;

/// Step of a run an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationPhase {
    /// Catalog discovery and validation
    Discover,
    /// Lock initialization and acquisition
    AcquireLock,
    /// Ledger index verification and repair
    VerifyIndex,
    /// Ledger lookup for a changeset
    CheckLedger,
    /// Running a changeset
    Execute,
    /// Writing a ledger entry
    Record,
    /// Releasing the lock
    ReleaseLock,
    /// Read-only inspection outside a run
    Inspect,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discover => "discover",
            Self::AcquireLock => "acquire-lock",
            Self::VerifyIndex => "verify-index",
            Self::CheckLedger => "check-ledger",
            Self::Execute => "execute",
            Self::Record => "record",
            Self::ReleaseLock => "release-lock",
            Self::Inspect => "inspect",
        };
        f.write_str(name)
    }
}

/// Errors returned by [`MigrationRunner`](crate::MigrationRunner)
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Configuration failed validation; nothing was touched
    #[error("invalid runner configuration: {0}")]
    Config(#[from] ConfigError),

    /// Malformed changeset descriptors; rejected before locking
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The lock store failed; never treated as a free lock
    #[error("lock store unavailable during {phase}: {source}")]
    LockUnavailable {
        phase: MigrationPhase,
        #[source]
        source: LockError,
    },

    /// This runner's hold ended before the run did, so another process may
    /// have entered
    #[error("migration lock was lost during {phase}")]
    LockLost { phase: MigrationPhase },

    /// Another process holds the lock; nothing was executed
    #[error("migration lock is held by {}", .holder.as_deref().unwrap_or("another process"))]
    LockContention { holder: Option<String> },

    /// The ledger already had a record the runner just tried to write
    #[error("changeset {change_set} was recorded concurrently; the ledger rejected a duplicate")]
    DuplicateChange { change_set: ChangeSetRef },

    /// A changeset's executable failed; the run stopped there
    #[error("changeset {change_set} failed: {cause:#}")]
    Execution {
        change_set: ChangeSetRef,
        cause: anyhow::Error,
    },

    /// The ledger store failed; the changeset at hand may have run but is
    /// not recorded
    #[error("ledger error during {phase}: {source}")]
    Ledger {
        phase: MigrationPhase,
        #[source]
        source: LedgerError,
    },
}

impl MigrationError {
    /// Check if the run was refused because another process holds the lock
    #[inline]
    #[must_use]
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::LockContention { .. })
    }

    /// Changeset the error is about, if any
    #[must_use]
    pub fn failed_change_set(&self) -> Option<&ChangeSetRef> {
        match self {
            Self::Execution { change_set, .. } | Self::DuplicateChange { change_set } => {
                Some(change_set)
            }
            _ => None,
        }
    }

    /// Phase the error occurred in
    #[must_use]
    pub fn phase(&self) -> Option<MigrationPhase> {
        match self {
            Self::Config(_) => None,
            Self::Catalog(_) => Some(MigrationPhase::Discover),
            Self::LockContention { .. } => Some(MigrationPhase::AcquireLock),
            Self::DuplicateChange { .. } => Some(MigrationPhase::Record),
            Self::Execution { .. } => Some(MigrationPhase::Execute),
            Self::LockUnavailable { phase, .. }
            | Self::Ledger { phase, .. }
            | Self::LockLost { phase } => Some(*phase),
        }
    }

    pub(crate) fn lock(phase: MigrationPhase) -> impl FnOnce(LockError) -> Self {
        move |source| Self::LockUnavailable { phase, source }
    }

    pub(crate) fn ledger(phase: MigrationPhase) -> impl FnOnce(LedgerError) -> Self {
        move |source| Self::Ledger { phase, source }
    }
}
