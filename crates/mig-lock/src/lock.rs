//! Distributed lock over a single store record

use crate::error::LockError;
use crate::record::{LockPolicy, LockRecord, OwnerToken, LOCK_ID};
use chrono::{DateTime, Utc};
use mig_store::{
    from_document, to_document, DocumentStore, Filter, StoreError, Update, ID_FIELD,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default lock collection name
pub const DEFAULT_LOCK_COLLECTION: &str = "migration_lock";

/// Cross-process mutual exclusion backed by one document
///
/// Every state change is a single conditional `update_one`, so the store
/// decides the winner when owners race.
pub struct DistributedLock {
    store: Arc<dyn DocumentStore>,
    collection: String,
    policy: LockPolicy,
}

impl DistributedLock {
    /// Create lock over `collection` with the default policy (no lease)
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            policy: LockPolicy::default(),
        }
    }

    /// Set acquisition policy
    #[must_use]
    pub fn with_policy(mut self, policy: LockPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Lock collection name
    #[inline]
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Current policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Create the free lock record if it does not exist yet
    ///
    /// Idempotent; losing an insert race to another process is success.
    ///
    /// # Errors
    /// `LockError::Unavailable` if the store fails.
    pub async fn ensure_initialized(&self) -> Result<(), LockError> {
        let document = to_document(&LockRecord::free()).map_err(LockError::Malformed)?;
        match self.store.insert_one(&self.collection, document).await {
            Ok(()) => {
                info!(collection = %self.collection, "lock record created");
                Ok(())
            }
            Err(StoreError::DuplicateKey { .. }) => {
                debug!(collection = %self.collection, "lock record already present");
                Ok(())
            }
            Err(e) => Err(LockError::unavailable("initialize")(e)),
        }
    }

    /// Try to take the lock for `owner`
    ///
    /// Returns `true` only if this call moved the record from free to held
    /// (or, with a lease, took over an expired hold). Never blocks.
    ///
    /// # Errors
    /// `LockError::Unavailable` if the store fails. An unreachable store is
    /// never reported as a free lock.
    pub async fn acquire(&self, owner: &OwnerToken) -> Result<bool, LockError> {
        let now = Utc::now();
        let update = Update::new()
            .set("status", true)
            .set("owner", owner.as_str())
            .set("lockedAt", now.timestamp_millis());

        match self
            .store
            .update_one(&self.collection, &self.acquirable(now), &update, true)
            .await
        {
            Ok(outcome) if outcome.applied() => {
                info!(owner = %owner, upserted = outcome.upserted, "lock acquired");
                Ok(true)
            }
            Ok(_) => Ok(false),
            // The upsert collided with a held record
            Err(StoreError::DuplicateKey { .. }) => {
                debug!(owner = %owner, "lock held by another owner");
                Ok(false)
            }
            Err(e) => Err(LockError::unavailable("acquire")(e)),
        }
    }

    /// Filter matching a record `acquire` may transition
    fn acquirable(&self, now: DateTime<Utc>) -> Filter {
        let mut free = vec![Filter::eq("status", false), Filter::missing("status")];
        if let Some(cutoff) = self.lease_cutoff(now) {
            free.push(Filter::lt("lockedAt", cutoff.timestamp_millis()));
        }
        Filter::eq(ID_FIELD, LOCK_ID).and(Filter::any_of(free))
    }

    fn lease_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let lease = chrono::Duration::from_std(self.policy.lease?).ok()?;
        now.checked_sub_signed(lease)
    }

    /// Release the lock if `owner` holds it
    ///
    /// Returns whether this call freed the lock. Releasing a free lock, or
    /// one held by someone else, is a no-op.
    ///
    /// # Errors
    /// `LockError::Unavailable` if the store fails.
    pub async fn release(&self, owner: &OwnerToken) -> Result<bool, LockError> {
        let filter = Filter::eq(ID_FIELD, LOCK_ID)
            .and(Filter::eq("status", true))
            .and(Filter::eq("owner", owner.as_str()));
        let outcome = self
            .store
            .update_one(
                &self.collection,
                &filter,
                &Update::new().set("status", false),
                false,
            )
            .await
            .map_err(LockError::unavailable("release"))?;

        let released = outcome.modified > 0;
        if released {
            info!(owner = %owner, "lock released");
        } else {
            debug!(owner = %owner, "release was a no-op");
        }
        Ok(released)
    }

    /// Refresh `lockedAt` while `owner` still holds the lock
    ///
    /// Keeps a lease from expiring under a long run. Returns `false` if the
    /// lock is free or held by someone else, meaning `owner` lost it.
    ///
    /// # Errors
    /// `LockError::Unavailable` if the store fails.
    pub async fn renew(&self, owner: &OwnerToken) -> Result<bool, LockError> {
        let filter = Filter::eq(ID_FIELD, LOCK_ID)
            .and(Filter::eq("status", true))
            .and(Filter::eq("owner", owner.as_str()));
        let update = Update::new().set("lockedAt", Utc::now().timestamp_millis());
        let outcome = self
            .store
            .update_one(&self.collection, &filter, &update, false)
            .await
            .map_err(LockError::unavailable("renew"))?;

        if outcome.matched == 0 {
            warn!(owner = %owner, "lock no longer held at renewal");
            return Ok(false);
        }
        debug!(owner = %owner, "lock lease renewed");
        Ok(true)
    }

    /// Free the lock regardless of holder
    ///
    /// Manual recovery after a holder crashed without a lease configured.
    ///
    /// # Errors
    /// `LockError::Unavailable` if the store fails.
    pub async fn force_release(&self) -> Result<bool, LockError> {
        let outcome = self
            .store
            .update_one(
                &self.collection,
                &Filter::eq(ID_FIELD, LOCK_ID),
                &Update::new().set("status", false),
                false,
            )
            .await
            .map_err(LockError::unavailable("force_release"))?;

        let released = outcome.modified > 0;
        if released {
            warn!(collection = %self.collection, "lock forcibly released");
        }
        Ok(released)
    }

    /// Current lock record, if initialized
    ///
    /// # Errors
    /// - `LockError::Unavailable` if the store fails
    /// - `LockError::Malformed` if the record cannot be decoded
    pub async fn inspect(&self) -> Result<Option<LockRecord>, LockError> {
        self.store
            .find_one(&self.collection, &Filter::eq(ID_FIELD, Value::from(LOCK_ID)))
            .await
            .map_err(LockError::unavailable("inspect"))?
            .map(from_document)
            .transpose()
            .map_err(LockError::Malformed)
    }

    /// Check if anyone holds the lock
    ///
    /// Advisory only; the answer may be stale by the time it is read.
    ///
    /// # Errors
    /// Same as [`inspect`](Self::inspect).
    pub async fn is_held(&self) -> Result<bool, LockError> {
        Ok(self.inspect().await?.is_some_and(|r| r.status))
    }
}

impl fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedLock")
            .field("collection", &self.collection)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
