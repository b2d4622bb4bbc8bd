//! Mig Ledger
//!
//! Durable record of executed changesets.
//!
//! # Core Concepts
//!
//! - [`ChangeEntry`]: One executed changeset (`id`, `author`, `executedAt`,
//!   `sourceLocation`)
//! - [`ExecutionLedger`]: Point lookups and inserts against the ledger collection
//! - [`LedgerIndex`]: Inspection and repair of the unique `(id, author)` index
//!
//! The unique index, not the distributed lock, is what makes a second record
//! of the same changeset impossible. The lock only keeps processes from
//! racing to get there.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod entry;
mod error;
mod index;
mod ledger;

pub use entry::ChangeEntry;
pub use error::LedgerError;
pub use index::{IndexRepair, LedgerIndex, LEDGER_INDEX_KEYS};
pub use ledger::{ExecutionLedger, DEFAULT_LEDGER_COLLECTION};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
