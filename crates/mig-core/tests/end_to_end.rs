//! Full runs against the in-memory store.

use mig_catalog::{tags, ChangeLogDescriptor, ChangeSetDescriptor, EnvironmentTags, StaticCatalog};
use mig_core::{MigrationError, MigrationPhase, MigrationRunner, RunnerConfig};
use mig_lock::{DistributedLock, OwnerToken};
use mig_store::{DocumentStore, IndexSpec, MemoryStore};
use mig_test_utils::{
    failing_second_catalog, init_seed_catalog, init_test_tracing, sequential_catalog,
    ExecutionRecorder, FaultyStore, StoreOperation,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn runner(store: Arc<dyn DocumentStore>, catalog: StaticCatalog) -> MigrationRunner {
    MigrationRunner::new(store, catalog, RunnerConfig::new())
}

fn ids(entries: &[mig_ledger::ChangeEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.id.as_str()).collect()
}

#[tokio::test]
async fn init_then_seed_across_environments() {
    init_test_tracing();
    let store = Arc::new(MemoryStore::new());
    let recorder = ExecutionRecorder::new();
    let runner = runner(store.clone(), init_seed_catalog(&recorder));

    let report = runner.run(&EnvironmentTags::new()).await.unwrap();
    assert_eq!(report.applied_ids(), vec!["init"]);
    assert!(report.skipped.is_empty());
    assert_eq!(recorder.calls(), vec!["init"]);
    assert_eq!(ids(&runner.applied_entries().await.unwrap()), vec!["init"]);

    let report = runner.run(&tags(["prod"])).await.unwrap();
    assert_eq!(report.applied_ids(), vec!["seed"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "init");
    assert_eq!(recorder.calls(), vec!["init", "seed"]);

    let entries = runner.applied_entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    let seed = entries.iter().find(|e| e.id == "seed").unwrap();
    assert_eq!(seed.author, "bob");
    assert_eq!(seed.change_log, "B");
    assert_eq!(seed.source_location, "B.seed");
    assert!(!runner.is_lock_held().await.unwrap());
}

#[tokio::test]
async fn recorded_change_sets_never_run_again() {
    let store = Arc::new(MemoryStore::new());
    let recorder = ExecutionRecorder::new();
    let runner = runner(store.clone(), init_seed_catalog(&recorder));

    for _ in 0..3 {
        runner.run(&tags(["prod"])).await.unwrap();
    }
    assert_eq!(recorder.count("init"), 1);
    assert_eq!(recorder.count("seed"), 1);
    assert_eq!(store.len("changelog"), 2);
}

#[tokio::test]
async fn failing_change_set_stops_the_run() {
    let store = Arc::new(MemoryStore::new());
    let recorder = ExecutionRecorder::new();
    let runner = runner(store.clone(), failing_second_catalog(&recorder));

    let err = runner.run(&EnvironmentTags::new()).await.unwrap_err();
    assert_eq!(err.phase(), Some(MigrationPhase::Execute));
    assert_eq!(err.failed_change_set().map(|c| c.id.as_str()), Some("two"));
    assert!(err.to_string().contains("column already exists"));

    assert_eq!(ids(&runner.applied_entries().await.unwrap()), vec!["one"]);
    assert!(!runner.is_lock_held().await.unwrap());
    assert_eq!(recorder.calls(), vec!["one", "two"]);
    assert_eq!(recorder.count("three"), 0);

    // A retry resumes at the failed changeset
    recorder.clear();
    assert!(runner.run(&EnvironmentTags::new()).await.is_err());
    assert_eq!(recorder.calls(), vec!["two"]);
}

#[tokio::test]
async fn run_always_executes_every_run_but_records_once() {
    let store = Arc::new(MemoryStore::new());
    let recorder = ExecutionRecorder::new();
    let catalog = StaticCatalog::new().with_change_log(
        ChangeLogDescriptor::builder("Maintenance")
            .change_set(
                ChangeSetDescriptor::builder("refresh", "ops")
                    .order("1")
                    .run_always(true)
                    .executable(recorder.executable("refresh"))
                    .build(),
            )
            .change_set(
                ChangeSetDescriptor::builder("once", "ops")
                    .order("2")
                    .executable(recorder.executable("once"))
                    .build(),
            )
            .build(),
    );
    let runner = runner(store.clone(), catalog);

    let first = runner.run(&EnvironmentTags::new()).await.unwrap();
    assert_eq!(first.applied_ids(), vec!["refresh", "once"]);
    assert!(first.reapplied.is_empty());

    let first_recorded = runner.applied_entries().await.unwrap()[0].executed_at;

    let second = runner.run(&EnvironmentTags::new()).await.unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(second.reapplied.len(), 1);
    assert_eq!(second.reapplied[0].id, "refresh");
    assert_eq!(second.skipped.len(), 1);
    assert_eq!(second.skipped[0].id, "once");

    assert_eq!(recorder.count("refresh"), 2);
    assert_eq!(recorder.count("once"), 1);
    assert_eq!(store.len("changelog"), 2);
    // The original record is left untouched
    let entries = runner.applied_entries().await.unwrap();
    let refresh = entries.iter().find(|e| e.id == "refresh").unwrap();
    assert_eq!(refresh.executed_at, first_recorded);
}

#[tokio::test]
async fn held_lock_means_contention_and_no_work() {
    let store = Arc::new(MemoryStore::new());
    let other = DistributedLock::new(store.clone(), "migration_lock");
    let other_owner = OwnerToken::new("other-host");
    assert!(other.acquire(&other_owner).await.unwrap());

    let recorder = ExecutionRecorder::new();
    let runner = runner(store.clone(), init_seed_catalog(&recorder));

    let err = runner.run(&EnvironmentTags::new()).await.unwrap_err();
    assert!(err.is_contention());
    assert!(matches!(
        err,
        MigrationError::LockContention { holder: Some(ref h) } if h == "other-host"
    ));
    assert!(recorder.calls().is_empty());
    assert!(store.is_empty("changelog"));
    // The contender did not free someone else's lock
    assert!(runner.is_lock_held().await.unwrap());

    other.release(&other_owner).await.unwrap();
    let report = runner.run(&EnvironmentTags::new()).await.unwrap();
    assert_eq!(report.applied_ids(), vec!["init"]);
}

#[tokio::test(start_paused = true)]
async fn bounded_wait_picks_up_a_released_lock() {
    let store = Arc::new(MemoryStore::new());
    let other = Arc::new(DistributedLock::new(store.clone(), "migration_lock"));
    let other_owner = OwnerToken::new("other-host");
    assert!(other.acquire(&other_owner).await.unwrap());

    let releaser = tokio::spawn({
        let other = other.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            other.release(&other_owner).await.unwrap()
        }
    });

    let recorder = ExecutionRecorder::new();
    let runner = MigrationRunner::new(
        store,
        init_seed_catalog(&recorder),
        RunnerConfig::new().with_lock_wait(Duration::from_secs(10), Duration::from_millis(100)),
    );

    let report = runner.run(&EnvironmentTags::new()).await.unwrap();
    assert!(releaser.await.unwrap());
    assert_eq!(report.applied_ids(), vec!["init"]);
}

#[tokio::test(start_paused = true)]
async fn bounded_wait_gives_up_at_the_deadline() {
    let store = Arc::new(MemoryStore::new());
    let other = DistributedLock::new(store.clone(), "migration_lock");
    assert!(other.acquire(&OwnerToken::new("stuck")).await.unwrap());

    let recorder = ExecutionRecorder::new();
    let runner = MigrationRunner::new(
        store,
        init_seed_catalog(&recorder),
        RunnerConfig::new().with_lock_wait(Duration::from_secs(3), Duration::from_millis(250)),
    );

    let started = tokio::time::Instant::now();
    let err = runner.run(&EnvironmentTags::new()).await.unwrap_err();
    assert!(err.is_contention());
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn lease_takes_over_a_crashed_holder() {
    let store = Arc::new(MemoryStore::new());
    let stale = serde_json::json!({
        "_id": "lock", "status": true, "owner": "crashed", "lockedAt": 0
    });
    store
        .insert_one("migration_lock", stale.as_object().cloned().unwrap())
        .await
        .unwrap();

    let recorder = ExecutionRecorder::new();
    let strict = runner(store.clone(), init_seed_catalog(&recorder));
    assert!(strict.run(&EnvironmentTags::new()).await.unwrap_err().is_contention());

    let leased = MigrationRunner::new(
        store,
        init_seed_catalog(&recorder),
        RunnerConfig::new().with_lock_lease(Duration::from_secs(60)),
    );
    let report = leased.run(&EnvironmentTags::new()).await.unwrap();
    assert_eq!(report.applied_ids(), vec!["init"]);
    assert!(!leased.is_lock_held().await.unwrap());
}

#[tokio::test]
async fn panicking_change_set_releases_the_lock() {
    let store = Arc::new(MemoryStore::new());
    let recorder = ExecutionRecorder::new();
    let catalog = sequential_catalog(
        "Risky",
        vec![
            ("before", recorder.executable("before")),
            ("explodes", recorder.panicking("explodes")),
            ("after", recorder.executable("after")),
        ],
    );
    let runner = Arc::new(runner(store.clone(), catalog));

    let handle = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run(&EnvironmentTags::new()).await }
    });
    let joined = handle.await;
    assert!(joined.unwrap_err().is_panic());

    assert!(!runner.is_lock_held().await.unwrap());
    assert_eq!(ids(&runner.applied_entries().await.unwrap()), vec!["before"]);
    assert_eq!(recorder.count("after"), 0);
}

#[tokio::test]
async fn malformed_catalog_fails_before_locking() {
    let store = Arc::new(MemoryStore::new());
    let recorder = ExecutionRecorder::new();
    let catalog = StaticCatalog::new()
        .with_change_log(
            ChangeLogDescriptor::builder("A")
                .change_set(
                    ChangeSetDescriptor::builder("init", "x")
                        .executable(recorder.executable("init"))
                        .build(),
                )
                .build(),
        )
        .with_change_log(
            ChangeLogDescriptor::builder("B")
                .tags(["prod"])
                .change_set(ChangeSetDescriptor::builder("anonymous", "").build())
                .build(),
        );
    let runner = runner(store.clone(), catalog);

    // Rejected even though B is not active
    let err = runner.run(&EnvironmentTags::new()).await.unwrap_err();
    assert!(matches!(err, MigrationError::Catalog(_)));
    assert_eq!(err.phase(), Some(MigrationPhase::Discover));
    assert!(store.is_empty("migration_lock"));
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn same_change_set_per_environment_runs_the_active_one() {
    let store = Arc::new(MemoryStore::new());
    let recorder = ExecutionRecorder::new();
    let seed = |env: &str| {
        ChangeLogDescriptor::builder(format!("{env}Seed"))
            .tags([env])
            .change_set(
                ChangeSetDescriptor::builder("seed_admin", "ops")
                    .executable(recorder.executable(env))
                    .build(),
            )
            .build()
    };
    let catalog = StaticCatalog::new()
        .with_change_log(seed("dev"))
        .with_change_log(seed("prod"));
    let runner = runner(store.clone(), catalog);

    let report = runner.run(&tags(["prod"])).await.unwrap();
    assert_eq!(report.applied_ids(), vec!["seed_admin"]);
    assert_eq!(report.applied[0].change_log, "prodSeed");
    assert_eq!(recorder.calls(), vec!["prod"]);

    // The pair is recorded; the dev variant is skipped from then on
    let report = runner.run(&tags(["dev"])).await.unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(recorder.calls(), vec!["prod"]);
    assert_eq!(store.len("changelog"), 1);
}

#[tokio::test]
async fn legacy_non_unique_index_is_repaired_during_run() {
    let store = Arc::new(MemoryStore::new());
    store
        .create_index("changelog", IndexSpec::new(["id", "author"]).named("legacy"))
        .await
        .unwrap();

    let recorder = ExecutionRecorder::new();
    runner(store.clone(), init_seed_catalog(&recorder))
        .run(&EnvironmentTags::new())
        .await
        .unwrap();

    let indexes = store.list_indexes("changelog").await.unwrap();
    assert_eq!(indexes.len(), 1);
    assert!(indexes[0].unique);
}

#[tokio::test]
async fn unreachable_lock_store_is_not_a_free_lock() {
    let store = Arc::new(FaultyStore::new());
    store.fail(StoreOperation::UpdateOne);

    let recorder = ExecutionRecorder::new();
    let runner = runner(store.clone(), init_seed_catalog(&recorder));

    let err = runner.run(&EnvironmentTags::new()).await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::LockUnavailable {
            phase: MigrationPhase::AcquireLock,
            ..
        }
    ));
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn ledger_failure_still_releases_the_lock() {
    let store = Arc::new(FaultyStore::new());
    store.fail(StoreOperation::ListIndexes);

    let recorder = ExecutionRecorder::new();
    let runner = runner(store.clone(), init_seed_catalog(&recorder));

    let err = runner.run(&EnvironmentTags::new()).await.unwrap_err();
    assert_eq!(err.phase(), Some(MigrationPhase::VerifyIndex));
    assert!(recorder.calls().is_empty());
    assert!(!runner.is_lock_held().await.unwrap());
}

#[tokio::test]
async fn release_failure_does_not_mask_the_run_error() {
    let store = Arc::new(FaultyStore::new());
    let breaker = {
        let store = store.clone();
        mig_catalog::executable_fn(move || {
            // Later lock writes fail, then the changeset itself fails
            store.fail(StoreOperation::UpdateOne);
            async { Err::<(), _>(anyhow::anyhow!("disk full")) }
        })
    };
    let runner = runner(store.clone(), sequential_catalog("Log", vec![("breaks", breaker)]));

    let err = runner.run(&EnvironmentTags::new()).await.unwrap_err();
    assert_eq!(err.phase(), Some(MigrationPhase::Execute));
    assert!(err.to_string().contains("disk full"));

    // The failed release left the lock held; manual recovery frees it
    store.heal(StoreOperation::UpdateOne);
    assert!(runner.is_lock_held().await.unwrap());
    let lock = DistributedLock::new(store.clone(), "migration_lock");
    assert!(lock.force_release().await.unwrap());
    assert!(!runner.is_lock_held().await.unwrap());
}

#[tokio::test]
async fn custom_collections_are_honored() {
    let store = Arc::new(MemoryStore::new());
    let recorder = ExecutionRecorder::new();
    let runner = MigrationRunner::new(
        store.clone(),
        init_seed_catalog(&recorder),
        RunnerConfig::new()
            .with_ledger_collection("history")
            .with_lock_collection("locks"),
    );

    runner.run(&EnvironmentTags::new()).await.unwrap();
    assert_eq!(store.len("history"), 1);
    assert_eq!(store.len("locks"), 1);
    assert!(store.is_empty("changelog"));
}

/// Executable that counts its runs and takes `duration` to finish
fn slow_step(runs: &Arc<AtomicUsize>, duration: Duration) -> mig_catalog::Executable {
    let runs = runs.clone();
    mig_catalog::executable_fn(move || {
        runs.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(duration).await;
            Ok::<(), anyhow::Error>(())
        }
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_outliving_its_lease_keeps_the_lock() {
    let store = Arc::new(MemoryStore::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let leased = |owner: &str| {
        MigrationRunner::new(
            store.clone(),
            sequential_catalog("Slow", vec![("slow", slow_step(&runs, Duration::from_millis(900)))]),
            RunnerConfig::new().with_lock_lease(Duration::from_millis(300)),
        )
        .with_owner(OwnerToken::new(owner))
    };

    let first = leased("first");
    let handle = tokio::spawn(async move { first.run(&EnvironmentTags::new()).await });

    // Past the lease; renewals keep the hold fresh
    tokio::time::sleep(Duration::from_millis(450)).await;
    let second = leased("second");
    let err = second.run(&EnvironmentTags::new()).await.unwrap_err();
    assert!(err.is_contention());

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.applied_ids(), vec!["slow"]);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(store.len("changelog"), 1);
    assert!(!second.is_lock_held().await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lock_taken_over_mid_run_aborts_the_run() {
    let store = Arc::new(MemoryStore::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let first = MigrationRunner::new(
        store.clone(),
        sequential_catalog("Slow", vec![("slow", slow_step(&runs, Duration::from_secs(2)))]),
        RunnerConfig::new().with_lock_lease(Duration::from_millis(300)),
    );
    let handle = tokio::spawn(async move { first.run(&EnvironmentTags::new()).await });

    tokio::time::sleep(Duration::from_millis(150)).await;
    let intruder = DistributedLock::new(store.clone(), "migration_lock");
    let token = OwnerToken::new("intruder");
    assert!(intruder.force_release().await.unwrap());
    assert!(intruder.acquire(&token).await.unwrap());

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        MigrationError::LockLost {
            phase: MigrationPhase::Execute
        }
    ));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(store.is_empty("changelog"));
    // The aborted run did not free someone else's hold
    assert!(intruder.inspect().await.unwrap().unwrap().is_held_by(&token));
}

#[tokio::test]
async fn release_after_losing_the_lock_is_an_error() {
    let store = Arc::new(MemoryStore::new());
    let thief = {
        let lock = Arc::new(DistributedLock::new(store.clone(), "migration_lock"));
        mig_catalog::executable_fn(move || {
            let lock = lock.clone();
            async move {
                lock.force_release().await?;
                Ok::<(), anyhow::Error>(())
            }
        })
    };
    let runner = runner(store.clone(), sequential_catalog("Log", vec![("steal", thief)]));

    let err = runner.run(&EnvironmentTags::new()).await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::LockLost {
            phase: MigrationPhase::ReleaseLock
        }
    ));
    assert_eq!(store.len("changelog"), 1);
}

#[tokio::test]
async fn concurrently_recorded_change_set_is_a_duplicate() {
    let store = Arc::new(MemoryStore::new());
    let racer = {
        let store = store.clone();
        mig_catalog::executable_fn(move || {
            let store = store.clone();
            async move {
                // Another process records the same pair first
                let row = serde_json::json!({ "id": "dup", "author": "test" });
                store
                    .insert_one("changelog", row.as_object().cloned().unwrap_or_default())
                    .await?;
                Ok::<(), anyhow::Error>(())
            }
        })
    };
    let runner = runner(store.clone(), sequential_catalog("Log", vec![("dup", racer)]));

    let err = runner.run(&EnvironmentTags::new()).await.unwrap_err();
    assert!(matches!(err, MigrationError::DuplicateChange { .. }));
    assert_eq!(err.phase(), Some(MigrationPhase::Record));
    assert_eq!(err.failed_change_set().map(|c| c.id.as_str()), Some("dup"));
    assert!(!runner.is_lock_held().await.unwrap());
    assert_eq!(store.len("changelog"), 1);
}
