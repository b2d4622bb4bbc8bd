//! Testing utilities for the Mig workspace
//!
//! Shared fixtures: recording executables, a fault-injecting store and the
//! catalogs used by end-to-end scenarios.

#![allow(missing_docs)]

use async_trait::async_trait;
use mig_catalog::{
    executable_fn, ChangeLogDescriptor, ChangeSetDescriptor, Executable, StaticCatalog,
};
use mig_store::{
    Document, DocumentStore, Filter, IndexSpec, MemoryStore, StoreError, Update, UpdateOutcome,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Route `tracing` output to the test harness; honors `RUST_LOG`
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records which executables ran, in order
#[derive(Debug, Clone, Default)]
pub struct ExecutionRecorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl ExecutionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executable that records `label` and succeeds
    pub fn executable(&self, label: &str) -> Executable {
        let calls = self.calls.clone();
        let label = label.to_string();
        executable_fn(move || {
            calls.lock().push(label.clone());
            async { Ok::<(), anyhow::Error>(()) }
        })
    }

    /// Executable that records `label` and fails with `message`
    pub fn failing(&self, label: &str, message: &str) -> Executable {
        let calls = self.calls.clone();
        let label = label.to_string();
        let message = message.to_string();
        executable_fn(move || {
            calls.lock().push(label.clone());
            let message = message.clone();
            async move { Err(anyhow::anyhow!(message)) }
        })
    }

    /// Executable that records `label` and panics
    pub fn panicking(&self, label: &str) -> Executable {
        let calls = self.calls.clone();
        let label = label.to_string();
        executable_fn(move || {
            calls.lock().push(label.clone());
            explode(label.clone())
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == label).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

async fn explode(label: String) -> anyhow::Result<()> {
    panic!("changeset {label} panicked")
}

/// Store operations [`FaultyStore`] can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    InsertOne,
    FindOne,
    Find,
    UpdateOne,
    ListIndexes,
    CreateIndex,
    DropIndex,
}

/// [`MemoryStore`] that reports `Unavailable` for selected operations
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<StoreOperation>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of `operation` fail
    pub fn fail(&self, operation: StoreOperation) {
        self.failing.lock().insert(operation);
    }

    /// Let `operation` succeed again
    pub fn heal(&self, operation: StoreOperation) {
        self.failing.lock().remove(&operation);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self, operation: StoreOperation) -> Result<(), StoreError> {
        if self.failing.lock().contains(&operation) {
            return Err(StoreError::unavailable(format!(
                "injected failure in {operation:?}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        self.check(StoreOperation::InsertOne)?;
        self.inner.insert_one(collection, document).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        self.check(StoreOperation::FindOne)?;
        self.inner.find_one(collection, filter).await
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        self.check(StoreOperation::Find)?;
        self.inner.find(collection, filter).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        self.check(StoreOperation::UpdateOne)?;
        self.inner.update_one(collection, filter, update, upsert).await
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, StoreError> {
        self.check(StoreOperation::ListIndexes)?;
        self.inner.list_indexes(collection).await
    }

    async fn create_index(&self, collection: &str, index: IndexSpec) -> Result<(), StoreError> {
        self.check(StoreOperation::CreateIndex)?;
        self.inner.create_index(collection, index).await
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), StoreError> {
        self.check(StoreOperation::DropIndex)?;
        self.inner.drop_index(collection, name).await
    }
}

/// Changelog A (order "1", untagged) with `init/alice`, changelog B
/// (order "2", tagged `prod`) with `seed/bob`
pub fn init_seed_catalog(recorder: &ExecutionRecorder) -> StaticCatalog {
    StaticCatalog::new()
        .with_change_log(
            ChangeLogDescriptor::builder("B")
                .order("2")
                .tags(["prod"])
                .change_set(
                    ChangeSetDescriptor::builder("seed", "bob")
                        .executable(recorder.executable("seed"))
                        .build(),
                )
                .build(),
        )
        .with_change_log(
            ChangeLogDescriptor::builder("A")
                .order("1")
                .change_set(
                    ChangeSetDescriptor::builder("init", "alice")
                        .executable(recorder.executable("init"))
                        .build(),
                )
                .build(),
        )
}

/// One changelog of three changesets where the second fails
pub fn failing_second_catalog(recorder: &ExecutionRecorder) -> StaticCatalog {
    StaticCatalog::new().with_change_log(
        ChangeLogDescriptor::builder("Steps")
            .change_set(
                ChangeSetDescriptor::builder("one", "ops")
                    .order("1")
                    .executable(recorder.executable("one"))
                    .build(),
            )
            .change_set(
                ChangeSetDescriptor::builder("two", "ops")
                    .order("2")
                    .executable(recorder.failing("two", "column already exists"))
                    .build(),
            )
            .change_set(
                ChangeSetDescriptor::builder("three", "ops")
                    .order("3")
                    .executable(recorder.executable("three"))
                    .build(),
            )
            .build(),
    )
}

/// Single changelog built from `(id, executable)` pairs, ordered as given
pub fn sequential_catalog(name: &str, steps: Vec<(&str, Executable)>) -> StaticCatalog {
    let mut change_log = ChangeLogDescriptor::builder(name);
    for (i, (id, executable)) in steps.into_iter().enumerate() {
        change_log = change_log.change_set(
            ChangeSetDescriptor::builder(id, "test")
                .order(format!("{i:04}"))
                .executable(executable)
                .build(),
        );
    }
    StaticCatalog::new().with_change_log(change_log.build())
}
