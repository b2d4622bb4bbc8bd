//! Mig Lock
//!
//! Single-owner mutual exclusion across processes sharing one database.
//!
//! # Core Concepts
//!
//! - [`LockRecord`]: The singleton lock document (`_id = "lock"`)
//! - [`OwnerToken`]: Per-process identity written into the record on acquire
//! - [`DistributedLock`]: Acquire/release via one atomic conditional update
//! - [`LockPolicy`]: Optional lease after which a held lock may be taken over
//!
//! There is no in-process mutex: the store's compare-and-swap is the only
//! arbiter, so two runners in the same process contend like two processes.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod lock;
mod record;

pub use error::LockError;
pub use lock::{DistributedLock, DEFAULT_LOCK_COLLECTION};
pub use record::{LockPolicy, LockRecord, OwnerToken, LOCK_ID};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
