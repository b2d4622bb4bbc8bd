//! Changeset catalog
//!
//! Validates provider output, filters by active environment tags and
//! produces the execution order.
//!
//! # Ordering
//! Lexicographic on the order key. The empty key is the smallest string, so
//! unordered descriptors run first. Ties keep provider order (stable sort);
//! callers must not read meaning into that tie order.

use crate::descriptor::{ChangeLogDescriptor, ChangeSetDescriptor, EnvironmentTags};
use crate::error::CatalogError;
use crate::provider::CatalogProvider;
use crate::reference::ChangeSetRef;
use std::fmt;
use std::sync::Arc;

/// Check if a descriptor restricted to `tags` is active under `active`
///
/// Unconditional (empty) descriptors always match; otherwise at least one
/// tag must be active.
#[inline]
#[must_use]
pub fn matches_environment(tags: &EnvironmentTags, active: &EnvironmentTags) -> bool {
    tags.is_empty() || !tags.is_disjoint(active)
}

fn sort_by_order_key<T>(items: &mut [T], key: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| key(a).cmp(key(b)));
}

/// A changeset scheduled for execution, with its identity resolved
#[derive(Debug, Clone)]
pub struct PlannedChangeSet {
    /// Identity for ledger and reports
    pub reference: ChangeSetRef,
    /// Descriptor to execute
    pub change_set: ChangeSetDescriptor,
}

/// Validating, filtering, ordering view over a [`CatalogProvider`]
#[derive(Clone)]
pub struct ChangesetCatalog {
    provider: Arc<dyn CatalogProvider>,
}

impl fmt::Debug for ChangesetCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangesetCatalog").finish_non_exhaustive()
    }
}

impl ChangesetCatalog {
    /// Create catalog over a provider
    #[inline]
    pub fn new(provider: impl CatalogProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Create catalog over a shared provider
    #[inline]
    #[must_use]
    pub fn from_shared(provider: Arc<dyn CatalogProvider>) -> Self {
        Self { provider }
    }

    /// Active changelogs in execution order
    ///
    /// The whole provider output is validated, including changelogs filtered
    /// out by `active`, so a misdeclared changeset fails in every environment.
    ///
    /// # Errors
    /// `CatalogError` on malformed descriptors.
    pub fn discover(
        &self,
        active: &EnvironmentTags,
    ) -> Result<Vec<ChangeLogDescriptor>, CatalogError> {
        let change_logs = self.provider.change_logs()?;
        validate(&change_logs)?;

        let mut selected: Vec<_> = change_logs
            .into_iter()
            .filter(|c| matches_environment(&c.environment_tags, active))
            .collect();
        sort_by_order_key(&mut selected, |c| c.order_key.as_str());

        tracing::debug!(count = selected.len(), "discovered changelogs");
        Ok(selected)
    }

    /// Active changesets of one changelog in execution order
    ///
    /// # Errors
    /// `CatalogError` if the changelog itself is malformed.
    pub fn discover_change_sets(
        &self,
        change_log: &ChangeLogDescriptor,
        active: &EnvironmentTags,
    ) -> Result<Vec<ChangeSetDescriptor>, CatalogError> {
        validate(std::slice::from_ref(change_log))?;

        let mut selected: Vec<_> = change_log
            .change_sets
            .iter()
            .filter(|c| matches_environment(&c.environment_tags, active))
            .cloned()
            .collect();
        sort_by_order_key(&mut selected, |c| c.order_key.as_str());
        Ok(selected)
    }

    /// Flattened execution order across all active changelogs
    ///
    /// # Errors
    /// `CatalogError` on malformed descriptors.
    pub fn plan(&self, active: &EnvironmentTags) -> Result<Vec<PlannedChangeSet>, CatalogError> {
        let mut plan = Vec::new();
        for change_log in self.discover(active)? {
            for change_set in self.discover_change_sets(&change_log, active)? {
                plan.push(PlannedChangeSet {
                    reference: ChangeSetRef::new(
                        &change_log.name,
                        &change_set.name,
                        &change_set.id,
                        &change_set.author,
                    ),
                    change_set,
                });
            }
        }
        Ok(plan)
    }
}

fn validate(change_logs: &[ChangeLogDescriptor]) -> Result<(), CatalogError> {
    for change_log in change_logs {
        if change_log.name.is_empty() {
            return Err(CatalogError::EmptyChangeLogName {
                order_key: change_log.order_key.clone(),
            });
        }

        for cs in &change_log.change_sets {
            if cs.id.is_empty() {
                return Err(CatalogError::MissingId {
                    change_log: change_log.name.clone(),
                    name: cs.name.clone(),
                });
            }
            if cs.author.is_empty() {
                return Err(CatalogError::MissingAuthor {
                    change_log: change_log.name.clone(),
                    id: cs.id.clone(),
                });
            }
        }
    }

    Ok(())
}
