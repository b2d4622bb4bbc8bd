//! Runner configuration
//!
//! Loadable from TOML, YAML or JSON. Every field has a default, so an empty
//! document yields a working configuration.

use mig_catalog::EnvironmentTags;
use mig_ledger::DEFAULT_LEDGER_COLLECTION;
use mig_lock::{LockPolicy, DEFAULT_LOCK_COLLECTION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default interval between lock attempts while waiting
pub const DEFAULT_LOCK_POLL_MILLIS: u64 = 500;

/// Migration runner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Kill switch; a disabled runner returns an empty report untouched
    pub enabled: bool,
    /// Collection holding executed changesets
    pub ledger_collection: String,
    /// Collection holding the lock record
    pub lock_collection: String,
    /// Tags used by [`MigrationRunner::run_configured`](crate::MigrationRunner::run_configured)
    pub active_tags: EnvironmentTags,
    /// Lease in milliseconds after which a held lock may be taken over;
    /// unset means never. A running holder renews it.
    pub lock_lease_millis: Option<u64>,
    /// How long to keep retrying a held lock, in milliseconds; unset means
    /// fail immediately
    pub lock_wait_millis: Option<u64>,
    /// Delay between lock attempts while waiting
    pub lock_poll_millis: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ledger_collection: DEFAULT_LEDGER_COLLECTION.to_string(),
            lock_collection: DEFAULT_LOCK_COLLECTION.to_string(),
            active_tags: EnvironmentTags::new(),
            lock_lease_millis: None,
            lock_wait_millis: None,
            lock_poll_millis: DEFAULT_LOCK_POLL_MILLIS,
        }
    }
}

/// Bounded wait for a held lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockWait {
    /// Give up after this long
    pub max_wait: Duration,
    /// Delay between attempts
    pub poll_interval: Duration,
}

impl RunnerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With kill switch
    #[inline]
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// With ledger collection
    #[inline]
    #[must_use]
    pub fn with_ledger_collection(mut self, name: impl Into<String>) -> Self {
        self.ledger_collection = name.into();
        self
    }

    /// With lock collection
    #[inline]
    #[must_use]
    pub fn with_lock_collection(mut self, name: impl Into<String>) -> Self {
        self.lock_collection = name.into();
        self
    }

    /// With active environment tags
    #[must_use]
    pub fn with_active_tags<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_tags = labels.into_iter().map(Into::into).collect();
        self
    }

    /// With lock lease
    #[inline]
    #[must_use]
    pub fn with_lock_lease(mut self, lease: Duration) -> Self {
        self.lock_lease_millis = Some(millis(lease));
        self
    }

    /// With bounded wait on a held lock
    #[inline]
    #[must_use]
    pub fn with_lock_wait(mut self, max_wait: Duration, poll_interval: Duration) -> Self {
        self.lock_wait_millis = Some(millis(max_wait));
        self.lock_poll_millis = millis(poll_interval);
        self
    }

    /// Lock policy derived from `lock_lease_millis`
    #[must_use]
    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy {
            lease: self.lock_lease_millis.map(Duration::from_millis),
        }
    }

    /// Wait settings, if waiting is configured
    #[must_use]
    pub fn lock_wait(&self) -> Option<LockWait> {
        self.lock_wait_millis.map(|wait| LockWait {
            max_wait: Duration::from_millis(wait),
            poll_interval: Duration::from_millis(self.lock_poll_millis),
        })
    }

    /// Check invariants
    ///
    /// # Errors
    /// `ConfigError::Invalid` describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger_collection.trim().is_empty() {
            return Err(ConfigError::Invalid("ledger_collection is empty".to_string()));
        }
        if self.lock_collection.trim().is_empty() {
            return Err(ConfigError::Invalid("lock_collection is empty".to_string()));
        }
        if self.ledger_collection == self.lock_collection {
            return Err(ConfigError::Invalid(format!(
                "ledger and lock share collection {:?}",
                self.ledger_collection
            )));
        }
        if self.lock_lease_millis == Some(0) {
            return Err(ConfigError::Invalid(
                "lock_lease_millis must be non-zero".to_string(),
            ));
        }
        if self.lock_wait_millis.is_some() && self.lock_poll_millis == 0 {
            return Err(ConfigError::Invalid(
                "lock_poll_millis must be non-zero when lock_wait_millis is set".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns error if TOML is invalid or the result fails validation
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML
    ///
    /// # Errors
    /// Returns error if YAML is invalid or the result fails validation
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON
    ///
    /// # Errors
    /// Returns error if JSON is invalid or the result fails validation
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, choosing the format by extension
    ///
    /// # Errors
    /// Returns error if the file cannot be read, has an unknown extension,
    /// or its content is invalid
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

// Saturates; a lease of u64::MAX milliseconds never expires anyway
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid TOML: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
