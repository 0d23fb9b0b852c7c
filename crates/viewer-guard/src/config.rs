//! Engine configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::BlockDuration;
use crate::error::GuardResult;
use crate::snapshot::JsonSnapshot;
use crate::store::{MAX_PER_PAGE, MemoryRuleStore, RuleStore};

/// Default `blocked_by` for rules created without one.
pub const DEFAULT_BLOCKED_BY: &str = "manual";

/// Default page size for listings.
pub const DEFAULT_PER_PAGE: usize = 50;

/// Settings for the background expiry reaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Whether the reaper runs at all.
    pub enabled: bool,
    /// Seconds between passes.
    pub interval_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

impl ReaperConfig {
    /// Pass interval; never shorter than one second.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Access guard configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Duration applied when a block request names none.
    pub default_duration: BlockDuration,
    /// `blocked_by` applied when a block request names none.
    pub default_blocked_by: String,
    /// Page size when the caller asks for none.
    pub default_per_page: usize,
    /// Ceiling on the page size.
    pub max_per_page: usize,
    /// JSON snapshot location; memory only when unset.
    pub snapshot_path: Option<PathBuf>,
    /// Background reaper settings.
    pub reaper: ReaperConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            default_duration: BlockDuration::default(),
            default_blocked_by: DEFAULT_BLOCKED_BY.to_string(),
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
            snapshot_path: None,
            reaper: ReaperConfig::default(),
        }
    }
}

impl GuardConfig {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> GuardConfigBuilder {
        GuardConfigBuilder::default()
    }

    /// Build the store this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a configured snapshot exists but cannot be
    /// loaded.
    pub fn build_store(&self) -> GuardResult<Arc<dyn RuleStore>> {
        let store = match &self.snapshot_path {
            Some(path) => MemoryRuleStore::with_snapshot(JsonSnapshot::new(path))?,
            None => MemoryRuleStore::new(),
        };
        Ok(Arc::new(store.with_max_per_page(self.max_per_page)))
    }
}

/// Builder for [`GuardConfig`].
#[derive(Debug, Clone, Default)]
pub struct GuardConfigBuilder {
    config: GuardConfig,
}

impl GuardConfigBuilder {
    /// Set the default block duration.
    #[must_use]
    pub const fn default_duration(mut self, duration: BlockDuration) -> Self {
        self.config.default_duration = duration;
        self
    }

    /// Set the default `blocked_by`.
    #[must_use]
    pub fn default_blocked_by(mut self, blocked_by: impl Into<String>) -> Self {
        self.config.default_blocked_by = blocked_by.into();
        self
    }

    /// Set the default page size.
    #[must_use]
    pub const fn default_per_page(mut self, per_page: usize) -> Self {
        self.config.default_per_page = per_page;
        self
    }

    /// Set the page size ceiling.
    #[must_use]
    pub const fn max_per_page(mut self, max: usize) -> Self {
        self.config.max_per_page = max;
        self
    }

    /// Persist rules to a JSON snapshot at `path`.
    #[must_use]
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = Some(path.into());
        self
    }

    /// Set reaper configuration.
    #[must_use]
    pub const fn reaper(mut self, config: ReaperConfig) -> Self {
        self.config.reaper = config;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> GuardConfig {
        self.config
    }
}
