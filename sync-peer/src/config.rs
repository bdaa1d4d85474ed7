//! Configuration for the ndsync protocol actors.
//!
//! Configuration is loaded from a TOML file; every field has a default so a
//! missing file or empty table yields the stock protocol timings.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Timing and pacing configuration shared by publisher and subscribers.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    /// Publisher drain tick period in milliseconds (default: 10).
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,
    /// Delay before the first drain tick in milliseconds (default: 1000).
    #[serde(default = "default_drain_warmup_ms")]
    pub drain_warmup_ms: u64,
    /// Freshness period attached to publisher replies in milliseconds (default: 20).
    #[serde(default = "default_freshness_ms")]
    pub freshness_ms: u64,
    /// Request lifetime before the transport reports a timeout (default: 1000 ms).
    #[serde(default = "default_request_lifetime_ms")]
    pub request_lifetime_ms: u64,
    /// Pacing sleeps at or below this threshold are skipped (default: 10 ms).
    #[serde(default = "default_min_pacing_sleep_ms")]
    pub min_pacing_sleep_ms: u64,
    /// Period of the publisher's stats log line in seconds (default: 60).
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
    /// Target inter-request delay for block subscriptions (default: 100 ms).
    #[serde(default = "default_block_pacing_ms")]
    pub block_pacing_ms: u64,
}

// Default value functions
fn default_drain_interval_ms() -> u64 {
    10
}

fn default_drain_warmup_ms() -> u64 {
    1000
}

fn default_freshness_ms() -> u64 {
    sync_types::DEFAULT_FRESHNESS_MS
}

fn default_request_lifetime_ms() -> u64 {
    sync_types::DEFAULT_REQUEST_LIFETIME_MS
}

fn default_min_pacing_sleep_ms() -> u64 {
    10
}

fn default_stats_interval_secs() -> u64 {
    60
}

fn default_block_pacing_ms() -> u64 {
    100
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: default_drain_interval_ms(),
            drain_warmup_ms: default_drain_warmup_ms(),
            freshness_ms: default_freshness_ms(),
            request_lifetime_ms: default_request_lifetime_ms(),
            min_pacing_sleep_ms: default_min_pacing_sleep_ms(),
            stats_interval_secs: default_stats_interval_secs(),
            block_pacing_ms: default_block_pacing_ms(),
        }
    }
}

impl ProtocolConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Drain tick period as a [`Duration`].
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    /// Drain warm-up delay as a [`Duration`].
    pub fn drain_warmup(&self) -> Duration {
        Duration::from_millis(self.drain_warmup_ms)
    }

    /// Minimum pacing sleep as a [`Duration`].
    pub fn min_pacing_sleep(&self) -> Duration {
        Duration::from_millis(self.min_pacing_sleep_ms)
    }

    /// Stats log period as a [`Duration`].
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    /// Block subscription pacing target as a [`Duration`].
    pub fn block_pacing(&self) -> Duration {
        Duration::from_millis(self.block_pacing_ms)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
