//! Ground-station configuration.
//!
//! Every option has a default, so an absent or partial configuration file
//! still yields a working station. Values can be overridden per-field from
//! a TOML file or from CLI flags in the binary.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Recognized station options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GcsConfig {
    /// Default serial endpoint to connect to when the operator does not
    /// pick one.
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Force simulated telemetry regardless of available endpoints.
    pub use_dummy: bool,
    /// Interval between simulator steps.
    pub dummy_interval_ms: u64,
    /// Polling intervals to wait for a first live record after a
    /// successful connect before falling back to simulated telemetry.
    pub fallback_retries: u32,
    pub fallback_interval_ms: u64,
    /// Ingestion queue capacity; 0 means unbounded.
    pub queue_capacity: usize,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
            use_dummy: false,
            dummy_interval_ms: 1000,
            fallback_retries: 5,
            fallback_interval_ms: 1000,
            queue_capacity: 0,
        }
    }
}

impl GcsConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
