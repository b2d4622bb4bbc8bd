//! Mig Core - migration runner
//!
//! Composes the changeset catalog, the execution ledger and the distributed
//! lock into one safe pass:
//! - Validates and orders the catalog before touching the database
//! - Takes the single-owner lock (optionally waiting for it)
//! - Verifies the ledger's unique `(id, author)` index
//! - Executes pending changesets in order, recording each success
//! - Releases the lock on every exit path
//!
//! # Example
//!
//! ```rust,ignore
//! use mig_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), MigrationError> {
//! let catalog = StaticCatalog::new().with_change_log(
//!     ChangeLogDescriptor::builder("users")
//!         .order("001")
//!         .change_set(ChangeSetDescriptor::builder("init", "alice").build())
//!         .build(),
//! );
//! let runner = MigrationRunner::new(Arc::new(MemoryStore::new()), catalog, RunnerConfig::new());
//!
//! let report = runner.run(&tags(["prod"])).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod report;
pub mod runner;

pub use config::{ConfigError, LockWait, RunnerConfig, DEFAULT_LOCK_POLL_MILLIS};
pub use error::{MigrationError, MigrationPhase};
pub use report::RunReport;
pub use runner::MigrationRunner;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for defining and running migrations
    pub use crate::{MigrationError, MigrationRunner, RunReport, RunnerConfig};
    pub use mig_catalog::{
        tags, ChangeLogDescriptor, ChangeSetDescriptor, ChangeSetExecutable, EnvironmentTags,
        StaticCatalog,
    };
    pub use mig_ledger::ChangeEntry;
    pub use mig_lock::OwnerToken;
    pub use mig_store::{DocumentStore, MemoryStore};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
