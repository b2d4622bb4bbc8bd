//! Catalog providers
//!
//! A provider hands the catalog raw descriptors. How it found them
//! (registration, scanning, a config file) is its own business.

use crate::descriptor::ChangeLogDescriptor;
use crate::error::CatalogError;

/// Source of raw changelog descriptors
pub trait CatalogProvider: Send + Sync {
    /// All changelogs, in discovery order
    ///
    /// # Errors
    /// `CatalogError::Provider` if the source cannot be read.
    fn change_logs(&self) -> Result<Vec<ChangeLogDescriptor>, CatalogError>;
}

/// Manually registered changelogs
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    change_logs: Vec<ChangeLogDescriptor>,
}

impl StaticCatalog {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a changelog (builder style)
    #[inline]
    #[must_use]
    pub fn with_change_log(mut self, change_log: ChangeLogDescriptor) -> Self {
        self.register(change_log);
        self
    }

    /// Register a changelog
    #[inline]
    pub fn register(&mut self, change_log: ChangeLogDescriptor) {
        self.change_logs.push(change_log);
    }

    /// Number of registered changelogs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.change_logs.len()
    }

    /// Check if nothing is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.change_logs.is_empty()
    }
}

impl CatalogProvider for StaticCatalog {
    fn change_logs(&self) -> Result<Vec<ChangeLogDescriptor>, CatalogError> {
        Ok(self.change_logs.clone())
    }
}

impl<P: CatalogProvider + ?Sized> CatalogProvider for std::sync::Arc<P> {
    fn change_logs(&self) -> Result<Vec<ChangeLogDescriptor>, CatalogError> {
        (**self).change_logs()
    }
}
