//! Lock record and owner identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Fixed `_id` of the singleton lock record
pub const LOCK_ID: &str = "lock";

/// Identity of a would-be lock holder
///
/// One token per runner instance. Release only succeeds for the token that
/// acquired the lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerToken(String);

impl OwnerToken {
    /// Generate a fresh random token
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an externally chosen token (host name, pod id)
    #[inline]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token as stored in the record
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OwnerToken {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted lock state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    /// Always [`LOCK_ID`]
    #[serde(rename = "_id")]
    pub id: String,
    /// Whether the lock is held
    pub status: bool,
    /// Last holder; kept after release for diagnostics
    #[serde(default)]
    pub owner: Option<String>,
    /// When the last holder acquired
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub locked_at: Option<DateTime<Utc>>,
}

impl LockRecord {
    /// Fresh, free record
    #[must_use]
    pub fn free() -> Self {
        Self {
            id: LOCK_ID.to_string(),
            status: false,
            owner: None,
            locked_at: None,
        }
    }

    /// Check if held by `owner`
    #[must_use]
    pub fn is_held_by(&self, owner: &OwnerToken) -> bool {
        self.status && self.owner.as_deref() == Some(owner.as_str())
    }
}

/// Acquisition policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockPolicy {
    /// A held lock older than this may be taken over by another owner
    ///
    /// `None` means a crashed holder keeps the lock until
    /// [`force_release`](crate::DistributedLock::force_release).
    pub lease: Option<Duration>,
}

impl LockPolicy {
    /// Policy with a takeover lease
    #[inline]
    #[must_use]
    pub fn with_lease(lease: Duration) -> Self {
        Self { lease: Some(lease) }
    }
}
