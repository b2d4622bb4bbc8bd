//! Changelog and changeset descriptors
//!
//! Descriptors are plain data plus an opaque executable. They carry no
//! knowledge of how they were found.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Set of environment labels; empty means unconditional
pub type EnvironmentTags = BTreeSet<String>;

/// Build an [`EnvironmentTags`] set from string-likes
pub fn tags<I, S>(labels: I) -> EnvironmentTags
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    labels.into_iter().map(Into::into).collect()
}

/// The work a changeset performs
///
/// Takes no arguments; anything it needs (a database handle, a client) is
/// captured when the descriptor is built.
#[async_trait]
pub trait ChangeSetExecutable: Send + Sync {
    /// Run the change
    ///
    /// # Errors
    /// Any failure aborts the migration run.
    async fn execute(&self) -> anyhow::Result<()>;
}

/// Shared handle to an executable
pub type Executable = Arc<dyn ChangeSetExecutable>;

struct FnExecutable<F>(F);

#[async_trait]
impl<F, Fut> ChangeSetExecutable for FnExecutable<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn execute(&self) -> anyhow::Result<()> {
        (self.0)().await
    }
}

struct Noop;

#[async_trait]
impl ChangeSetExecutable for Noop {
    async fn execute(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Wrap an async closure as an [`Executable`]
pub fn executable_fn<F, Fut>(f: F) -> Executable
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnExecutable(f))
}

/// Smallest unit of migration work
#[derive(Clone)]
pub struct ChangeSetDescriptor {
    /// Identifier, unique together with `author`
    pub id: String,
    /// Author, unique together with `id`
    pub author: String,
    /// Declaring function name, used in the ledger's source location
    pub name: String,
    /// Sort key within the changelog
    pub order_key: String,
    /// Execute on every run even when already recorded
    pub run_always: bool,
    /// Environments this changeset is restricted to
    pub environment_tags: EnvironmentTags,
    /// The work itself
    pub executable: Executable,
}

impl ChangeSetDescriptor {
    /// Start building a changeset
    #[inline]
    pub fn builder(id: impl Into<String>, author: impl Into<String>) -> ChangeSetBuilder {
        ChangeSetBuilder::new(id, author)
    }
}

impl fmt::Debug for ChangeSetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSetDescriptor")
            .field("id", &self.id)
            .field("author", &self.author)
            .field("name", &self.name)
            .field("order_key", &self.order_key)
            .field("run_always", &self.run_always)
            .field("environment_tags", &self.environment_tags)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ChangeSetDescriptor`]
///
/// Building never validates; malformed descriptors are reported by the
/// catalog so that every provider gets the same checks.
pub struct ChangeSetBuilder {
    id: String,
    author: String,
    name: Option<String>,
    order_key: String,
    run_always: bool,
    environment_tags: EnvironmentTags,
    executable: Option<Executable>,
}

impl ChangeSetBuilder {
    fn new(id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            name: None,
            order_key: String::new(),
            run_always: false,
            environment_tags: EnvironmentTags::new(),
            executable: None,
        }
    }

    /// Set declaring function name (defaults to the id)
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set order key
    #[must_use]
    pub fn order(mut self, order_key: impl Into<String>) -> Self {
        self.order_key = order_key.into();
        self
    }

    /// Mark as run-always
    #[must_use]
    pub fn run_always(mut self, run_always: bool) -> Self {
        self.run_always = run_always;
        self
    }

    /// Restrict to environments
    #[must_use]
    pub fn tags<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment_tags.extend(labels.into_iter().map(Into::into));
        self
    }

    /// Set executable
    #[must_use]
    pub fn executable(mut self, executable: Executable) -> Self {
        self.executable = Some(executable);
        self
    }

    /// Set executable from an async closure
    #[must_use]
    pub fn run<F, Fut>(self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.executable(executable_fn(f))
    }

    /// Finish; a missing executable becomes a no-op
    #[must_use]
    pub fn build(self) -> ChangeSetDescriptor {
        ChangeSetDescriptor {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            author: self.author,
            order_key: self.order_key,
            run_always: self.run_always,
            environment_tags: self.environment_tags,
            executable: self.executable.unwrap_or_else(|| Arc::new(Noop)),
        }
    }
}

/// Named, ordered group of changesets
#[derive(Debug, Clone)]
pub struct ChangeLogDescriptor {
    /// Identity: the declaring type or module
    pub name: String,
    /// Sort key among changelogs
    pub order_key: String,
    /// Environments this changelog is restricted to
    pub environment_tags: EnvironmentTags,
    /// Changesets in provider (declaration) order
    pub change_sets: Vec<ChangeSetDescriptor>,
}

impl ChangeLogDescriptor {
    /// Start building a changelog
    #[inline]
    pub fn builder(name: impl Into<String>) -> ChangeLogBuilder {
        ChangeLogBuilder {
            inner: ChangeLogDescriptor {
                name: name.into(),
                order_key: String::new(),
                environment_tags: EnvironmentTags::new(),
                change_sets: Vec::new(),
            },
        }
    }
}

/// Builder for [`ChangeLogDescriptor`]
#[derive(Debug)]
pub struct ChangeLogBuilder {
    inner: ChangeLogDescriptor,
}

impl ChangeLogBuilder {
    /// Set order key
    #[must_use]
    pub fn order(mut self, order_key: impl Into<String>) -> Self {
        self.inner.order_key = order_key.into();
        self
    }

    /// Restrict to environments
    #[must_use]
    pub fn tags<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .environment_tags
            .extend(labels.into_iter().map(Into::into));
        self
    }

    /// Append a changeset
    #[must_use]
    pub fn change_set(mut self, change_set: ChangeSetDescriptor) -> Self {
        self.inner.change_sets.push(change_set);
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> ChangeLogDescriptor {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn change_set_defaults() {
        let cs = ChangeSetDescriptor::builder("init", "alice").build();
        assert_eq!(cs.name, "init");
        assert!(cs.order_key.is_empty());
        assert!(!cs.run_always);
        assert!(cs.environment_tags.is_empty());
    }

    #[test]
    fn change_set_builder_sets_fields() {
        let cs = ChangeSetDescriptor::builder("seed", "bob")
            .name("seed_users")
            .order("002")
            .run_always(true)
            .tags(["prod", "staging"])
            .build();
        assert_eq!(cs.name, "seed_users");
        assert_eq!(cs.order_key, "002");
        assert!(cs.run_always);
        assert_eq!(cs.environment_tags, tags(["staging", "prod"]));
    }

    #[test]
    fn debug_omits_executable() {
        let cs = ChangeSetDescriptor::builder("init", "alice").build();
        let rendered = format!("{cs:?}");
        assert!(rendered.contains("init"));
        assert!(!rendered.contains("executable"));
    }

    #[tokio::test]
    async fn closure_executable_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cs = ChangeSetDescriptor::builder("init", "alice")
            .run(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), anyhow::Error>(())
                }
            })
            .build();

        cs.executable.execute().await.unwrap();
        cs.executable.execute().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn default_executable_is_noop() {
        let cs = ChangeSetDescriptor::builder("init", "alice").build();
        assert!(cs.executable.execute().await.is_ok());
    }

    #[test]
    fn change_log_builder_keeps_declaration_order() {
        let log = ChangeLogDescriptor::builder("users")
            .order("1")
            .tags(["prod"])
            .change_set(ChangeSetDescriptor::builder("b", "x").build())
            .change_set(ChangeSetDescriptor::builder("a", "x").build())
            .build();
        let ids: Vec<_> = log.change_sets.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(log.environment_tags, tags(["prod"]));
    }
}
