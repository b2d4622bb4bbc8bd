//! Migration runner
//!
//! One run: validate the catalog, take the lock, verify the ledger index,
//! then execute every pending changeset in order, recording each success.
//! The lock is released on every exit path, including a panicking
//! changeset. With a lease configured the hold is renewed while changesets
//! run, and the run aborts if the renewal finds the lock taken.

use crate::config::RunnerConfig;
use crate::error::{MigrationError, MigrationPhase};
use crate::report::RunReport;
use futures::FutureExt;
use mig_catalog::{CatalogProvider, ChangesetCatalog, EnvironmentTags, PlannedChangeSet};
use mig_ledger::{ChangeEntry, ExecutionLedger, LedgerError};
use mig_lock::{DistributedLock, OwnerToken};
use mig_store::DocumentStore;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Runs pending changesets against one database
pub struct MigrationRunner {
    catalog: ChangesetCatalog,
    ledger: ExecutionLedger,
    lock: DistributedLock,
    owner: OwnerToken,
    config: RunnerConfig,
}

impl MigrationRunner {
    /// Create runner with a freshly generated owner token
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: impl CatalogProvider + 'static,
        config: RunnerConfig,
    ) -> Self {
        let ledger = ExecutionLedger::new(Arc::clone(&store), config.ledger_collection.clone());
        let lock = DistributedLock::new(store, config.lock_collection.clone())
            .with_policy(config.lock_policy());
        Self {
            catalog: ChangesetCatalog::new(provider),
            ledger,
            lock,
            owner: OwnerToken::generate(),
            config,
        }
    }

    /// With a specific owner token
    #[inline]
    #[must_use]
    pub fn with_owner(mut self, owner: OwnerToken) -> Self {
        self.owner = owner;
        self
    }

    /// Token written into the lock record while this runner holds it
    #[inline]
    #[must_use]
    pub fn owner(&self) -> &OwnerToken {
        &self.owner
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run with the configured active tags
    ///
    /// # Errors
    /// Same as [`run`](Self::run).
    pub async fn run_configured(&self) -> Result<RunReport, MigrationError> {
        self.run(&self.config.active_tags).await
    }

    /// Execute every pending changeset active under `active`
    ///
    /// A disabled runner returns an empty report without touching the store.
    ///
    /// # Errors
    /// - `MigrationError::Catalog` for malformed descriptors (before locking)
    /// - `MigrationError::LockContention` if another process holds the lock
    /// - `MigrationError::Execution` for the first failing changeset
    /// - `MigrationError::LockLost` if the hold ended before the run did
    /// - `MigrationError::LockUnavailable` / `Ledger` on store failures
    ///
    /// # Panics
    /// A panic inside a changeset is resumed after the lock is released.
    pub async fn run(&self, active: &EnvironmentTags) -> Result<RunReport, MigrationError> {
        if !self.config.enabled {
            info!("migrations disabled, skipping run");
            return Ok(RunReport::default());
        }
        self.config.validate()?;

        let span = info_span!("migration_run", owner = %self.owner);
        self.run_locked(active).instrument(span).await
    }

    async fn run_locked(&self, active: &EnvironmentTags) -> Result<RunReport, MigrationError> {
        let plan = self.catalog.plan(active)?;
        info!(planned = plan.len(), ?active, "starting migration run");

        self.acquire().await?;
        let work = AssertUnwindSafe(self.execute_plan(&plan)).catch_unwind();
        let outcome = match self.lock.policy().lease {
            Some(lease) => tokio::select! {
                outcome = work => outcome,
                lost = self.keep_alive(lease) => Ok(Err(lost)),
            },
            None => work.await,
        };
        let released = self.lock.release(&self.owner).await;

        match outcome {
            Ok(Ok(report)) => {
                match released {
                    Ok(true) => {}
                    Ok(false) => {
                        error!(%report, "lock was no longer held by this runner at release");
                        return Err(MigrationError::LockLost {
                            phase: MigrationPhase::ReleaseLock,
                        });
                    }
                    Err(source) => {
                        return Err(MigrationError::lock(MigrationPhase::ReleaseLock)(source))
                    }
                }
                info!(%report, "migration run complete");
                Ok(report)
            }
            Ok(Err(err)) => {
                if let Err(release_err) = released {
                    error!(error = %release_err, "lock release failed after a failed run");
                }
                error!(error = %err, "migration run failed");
                Err(err)
            }
            Err(panic) => {
                if let Err(release_err) = released {
                    error!(error = %release_err, "lock release failed after a panic");
                }
                error!("changeset panicked, lock released");
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn acquire(&self) -> Result<(), MigrationError> {
        let lock_err = || MigrationError::lock(MigrationPhase::AcquireLock);
        self.lock.ensure_initialized().await.map_err(lock_err())?;

        let wait = self
            .config
            .lock_wait()
            .map(|w| (Instant::now() + w.max_wait, w.poll_interval));

        loop {
            if self.lock.acquire(&self.owner).await.map_err(lock_err())? {
                return Ok(());
            }
            match wait {
                Some((deadline, poll)) if Instant::now() < deadline => {
                    debug!(?poll, "lock held, waiting");
                    tokio::time::sleep(poll.min(deadline - Instant::now())).await;
                }
                _ => break,
            }
        }

        // Holder is informational; a failed read does not change the outcome
        let holder = self
            .lock
            .inspect()
            .await
            .ok()
            .flatten()
            .and_then(|r| r.owner);
        warn!(?holder, "migration lock held by another process");
        Err(MigrationError::LockContention { holder })
    }

    /// Renew the hold every third of `lease` until a renewal fails
    ///
    /// Only returns once the lock can no longer be vouched for.
    async fn keep_alive(&self, lease: Duration) -> MigrationError {
        let period = (lease / 3).max(Duration::from_millis(1));
        let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            match self.lock.renew(&self.owner).await {
                Ok(true) => debug!(?period, "lease renewed"),
                Ok(false) => {
                    error!("migration lock taken over mid-run, aborting");
                    return MigrationError::LockLost {
                        phase: MigrationPhase::Execute,
                    };
                }
                Err(source) => {
                    error!(error = %source, "lease renewal failed, aborting");
                    return MigrationError::lock(MigrationPhase::Execute)(source);
                }
            }
        }
    }

    async fn execute_plan(&self, plan: &[PlannedChangeSet]) -> Result<RunReport, MigrationError> {
        self.ledger
            .ensure_unique_index()
            .await
            .map_err(MigrationError::ledger(MigrationPhase::VerifyIndex))?;

        let mut report = RunReport::default();
        for planned in plan {
            let reference = &planned.reference;
            let recorded = self
                .ledger
                .contains(&reference.id, &reference.author)
                .await
                .map_err(MigrationError::ledger(MigrationPhase::CheckLedger))?;

            if recorded && !planned.change_set.run_always {
                info!(change_set = %reference, "already applied, skipping");
                report.skipped.push(reference.clone());
                continue;
            }

            info!(
                change_set = %reference,
                run_always = planned.change_set.run_always,
                "executing changeset"
            );
            if let Err(cause) = planned.change_set.executable.execute().await {
                error!(change_set = %reference, error = %format!("{cause:#}"), "changeset failed");
                return Err(MigrationError::Execution {
                    change_set: reference.clone(),
                    cause,
                });
            }

            let entry = ChangeEntry::now(reference);
            if recorded {
                report.reapplied.push(entry);
                continue;
            }

            self.ledger.append(&entry).await.map_err(|e| match e {
                LedgerError::DuplicateChange { .. } => MigrationError::DuplicateChange {
                    change_set: reference.clone(),
                },
                source => MigrationError::ledger(MigrationPhase::Record)(source),
            })?;
            report.applied.push(entry);
        }

        Ok(report)
    }

    /// Check if any process currently holds the lock
    ///
    /// # Errors
    /// `MigrationError::LockUnavailable` if the store fails.
    pub async fn is_lock_held(&self) -> Result<bool, MigrationError> {
        self.lock
            .is_held()
            .await
            .map_err(MigrationError::lock(MigrationPhase::Inspect))
    }

    /// Every recorded changeset, oldest first
    ///
    /// # Errors
    /// `MigrationError::Ledger` if the store fails.
    pub async fn applied_entries(&self) -> Result<Vec<ChangeEntry>, MigrationError> {
        self.ledger
            .entries()
            .await
            .map_err(MigrationError::ledger(MigrationPhase::Inspect))
    }
}

impl fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("owner", &self.owner)
            .field("ledger", &self.ledger)
            .field("lock", &self.lock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
