//! Engine configuration

use crate::error::{HistDiffError, Result};
use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_POLL_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CHANNEL_CAPACITY_ENV: &str = "HISTDIFF_CHANNEL_CAPACITY";
pub const POLL_INTERVAL_ENV: &str = "HISTDIFF_POLL_INTERVAL_MS";

/// Tuning for diff sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound of the channel between the diff worker and the row iterator
    pub channel_capacity: usize,
    /// How often blocked sends and receives re-check for cancellation
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HistDiffError::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Apply `HISTDIFF_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|name| env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(CHANNEL_CAPACITY_ENV) {
            self.channel_capacity = raw.trim().parse().map_err(|_| {
                HistDiffError::config(format!("{} must be a positive integer, got '{}'", CHANNEL_CAPACITY_ENV, raw))
            })?;
        }
        if let Some(raw) = lookup(POLL_INTERVAL_ENV) {
            self.poll_interval_ms = raw.trim().parse().map_err(|_| {
                HistDiffError::config(format!("{} must be a positive integer, got '{}'", POLL_INTERVAL_ENV, raw))
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(HistDiffError::config("channel_capacity must be at least 1"));
        }
        if self.poll_interval_ms == 0 {
            return Err(HistDiffError::config("poll_interval_ms must be at least 1"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Resolve the configuration: file (if any), then environment, then validate
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(p) => EngineConfig::from_file(p)?,
        None => EngineConfig::default(),
    }
    .with_env_overrides()?;
    config.validate()?;

    log::debug!(
        "engine config: channel_capacity={}, poll_interval_ms={}",
        config.channel_capacity,
        config.poll_interval_ms
    );
    Ok(config)
}
