//! Mig Store
//!
//! The database connection seam for the migration runner.
//!
//! # Core Concepts
//!
//! - [`DocumentStore`]: Minimal document database contract (insert, query,
//!   index management, atomic conditional update)
//! - [`Filter`] / [`Update`]: Predicates and field assignments evaluated by the store
//! - [`IndexSpec`]: Compound index declaration, optionally unique
//! - [`MemoryStore`]: In-process backend honoring the same atomicity contract
//!
//! # Example
//!
//! ```rust,ignore
//! use mig_store::{DocumentStore, Filter, MemoryStore, Update};
//!
//! let store = MemoryStore::new();
//! let outcome = store
//!     .update_one(
//!         "locks",
//!         &Filter::eq("_id", "lock").and(Filter::eq("status", false)),
//!         &Update::new().set("status", true),
//!         true,
//!     )
//!     .await?;
//! assert!(outcome.applied());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod document;
mod error;
mod filter;
mod index;
mod memory;
mod store;

pub use document::{from_document, to_document, Document, ID_FIELD};
pub use error::StoreError;
pub use filter::{Filter, Update};
pub use index::{IndexSpec, ID_INDEX};
pub use memory::MemoryStore;
pub use store::{DocumentStore, UpdateOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
