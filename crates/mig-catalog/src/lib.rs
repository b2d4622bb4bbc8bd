//! Mig Catalog
//!
//! Discovery and ordering of migration units.
//!
//! # Core Concepts
//!
//! - [`ChangeLogDescriptor`]: Named, ordered group of changesets
//! - [`ChangeSetDescriptor`]: Smallest unit of migration work (id, author, executable)
//! - [`CatalogProvider`]: Where raw descriptors come from ([`StaticCatalog`] for
//!   manual registration)
//! - [`ChangesetCatalog`]: Validates, filters by environment tags, and orders
//!
//! # Example
//!
//! ```rust,ignore
//! use mig_catalog::{ChangeLogDescriptor, ChangeSetDescriptor, ChangesetCatalog, StaticCatalog};
//!
//! let catalog = StaticCatalog::new().with_change_log(
//!     ChangeLogDescriptor::builder("users")
//!         .order("001")
//!         .change_set(ChangeSetDescriptor::builder("init", "alice").run(|| async { Ok(()) }).build())
//!         .build(),
//! );
//!
//! let plan = ChangesetCatalog::new(catalog).plan(&tags(["prod"]))?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod catalog;
mod descriptor;
mod error;
mod provider;
mod reference;

pub use catalog::{matches_environment, ChangesetCatalog, PlannedChangeSet};
pub use descriptor::{
    executable_fn, tags, ChangeLogBuilder, ChangeLogDescriptor, ChangeSetBuilder,
    ChangeSetDescriptor, ChangeSetExecutable, EnvironmentTags, Executable,
};
pub use error::CatalogError;
pub use provider::{CatalogProvider, StaticCatalog};
pub use reference::ChangeSetRef;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
