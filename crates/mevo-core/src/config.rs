//! Configuration loading and typed config structures for the Mevo map sync.
//!
//! The configuration lives in `mevo-config.yaml`. Every field has a default,
//! so an empty file (or no file at all) yields a working setup against the
//! public Wellington feeds.
//!
//! Environment variables override YAML values:
//! - `MEVO_BASE_URL` overrides `feed.base_url`
//! - `MEVO_AREA` overrides `feed.area`
//! - `MEVO_REFRESH_SECS` overrides `sync.refresh_interval_secs`

use std::path::Path;
use std::time::Duration;

use mevo_feed::DEFAULT_MAX_ICON_BYTES;
use mevo_render::{
    DEFAULT_MAX_CONCURRENT_ICONS, DEFAULT_QUEUE_CAPACITY, IconAnchor, IdentityStrategy, LineStyle,
    ReconcilerSettings,
};
use mevo_types::FeedType;
use serde::Deserialize;
use tracing::warn;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level sync configuration, mirroring `mevo-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SyncConfig {
    /// Feed endpoint settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Icon fetch settings.
    #[serde(default)]
    pub icons: IconConfig,

    /// Render reconciliation settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// Cycle scheduling.
    #[serde(default)]
    pub sync: ScheduleConfig,
}

impl SyncConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_yaml(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn parse_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml reads an empty document as unit rather than a mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEVO_BASE_URL") {
            self.feed.base_url = val;
        }
        if let Ok(val) = std::env::var("MEVO_AREA") {
            self.feed.area = val;
        }
        if let Ok(val) = std::env::var("MEVO_REFRESH_SECS") {
            match val.trim().parse::<u64>() {
                Ok(secs) => self.sync.refresh_interval_secs = secs,
                Err(e) => warn!(value = %val, error = %e, "ignoring invalid MEVO_REFRESH_SECS"),
            }
        }
    }

    /// Reconciler settings derived from the `icons` and `render` sections.
    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            identity: self.render.identity.clone(),
            teardown_stale: self.render.teardown_stale,
            line_style: self.render.outline.clone(),
            anchor: self.render.anchor,
            max_concurrent_icons: self.icons.max_concurrent,
        }
    }
}

/// Feed endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// API base URL, without the feed path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Service area path segment.
    #[serde(default = "default_area")]
    pub area: String,

    /// Per-request timeout for feed fetches.
    #[serde(default = "default_feed_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Feeds to sync each cycle, in order.
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedType>,
}

impl FeedConfig {
    /// Feed request timeout.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            area: default_area(),
            request_timeout_ms: default_feed_timeout_ms(),
            feeds: default_feeds(),
        }
    }
}

/// Icon fetch settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IconConfig {
    /// Per-request timeout for icon fetches.
    #[serde(default = "default_icon_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum icon fetches in flight.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Largest icon body accepted, in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl IconConfig {
    /// Icon request timeout.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_icon_timeout_ms(),
            max_concurrent: default_max_concurrent(),
            max_bytes: default_max_bytes(),
        }
    }
}

/// Render reconciliation settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderConfig {
    /// Entity identity strategy.
    #[serde(default)]
    pub identity: IdentityStrategy,

    /// Remove primitives of entities that left the feed.
    #[serde(default = "default_true")]
    pub teardown_stale: bool,

    /// Icon anchor of symbol layers.
    #[serde(default)]
    pub anchor: IconAnchor,

    /// Outline layer style.
    #[serde(default)]
    pub outline: LineStyle,

    /// Render command buffer size.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            identity: IdentityStrategy::default(),
            teardown_stale: default_true(),
            anchor: IconAnchor::default(),
            outline: LineStyle::default(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Cycle scheduling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between refresh cycles; `0` runs a single cycle.
    #[serde(default)]
    pub refresh_interval_secs: u64,
}

impl ScheduleConfig {
    /// Refresh period, or `None` for a single cycle.
    pub const fn refresh_interval(&self) -> Option<Duration> {
        if self.refresh_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.refresh_interval_secs))
        }
    }
}

fn default_base_url() -> String {
    "https://api.mevo.co.nz/public".to_owned()
}

fn default_area() -> String {
    "Wellington".to_owned()
}

const fn default_feed_timeout_ms() -> u64 {
    10_000
}

fn default_feeds() -> Vec<FeedType> {
    FeedType::ALL.to_vec()
}

const fn default_icon_timeout_ms() -> u64 {
    5_000
}

const fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT_ICONS
}

const fn default_max_bytes() -> usize {
    DEFAULT_MAX_ICON_BYTES
}

const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

const fn default_true() -> bool {
    true
}
