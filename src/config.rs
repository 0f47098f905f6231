//! Client configuration.
//!
//! Every tunable the pipeline consumes lives here as an explicit,
//! serde-derived struct. Nothing reads configuration through globals:
//! callers load a [`Config`] once and pass the relevant sections into
//! each client and pipeline construction.
//!
//! ## Loading order
//!
//! 1. `CRYOSTATION_CONFIG` environment variable (path to a TOML file)
//! 2. `cryostation.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Defaults match the instrument's documented behaviour, so an absent
//! config file changes nothing.

use crate::pipeline::sampler::TickPolicy;
use crate::pipeline::stability::{StabilitySource, StabilityThresholds, TemperatureSource};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Connection and sampling default constants.
pub mod defaults {
    /// Default instrument TCP port.
    pub const PORT: u16 = crate::protocol::DEFAULT_PORT;

    /// TCP connect timeout (seconds).
    pub const CONNECT_TIMEOUT_SECS: u64 = 30;

    /// Sampler tick interval (milliseconds).
    pub const SAMPLE_RATE_MS: u64 = 1000;

    /// Sliding-window length for general periodic observation.
    pub const OBSERVER_WINDOW: usize = 100;

    /// Sliding-window length for setpoint stability detection.
    pub const STABILITY_WINDOW: usize = 30;

    /// Bounded-retry attempt cap for opt-in connect retry.
    pub const RETRY_MAX_ATTEMPTS: u32 = 5;

    /// Initial connect-retry delay (milliseconds, doubles per attempt).
    pub const RETRY_INITIAL_DELAY_MS: u64 = 500;

    /// Connect-retry delay cap (milliseconds).
    pub const RETRY_MAX_DELAY_MS: u64 = 10_000;
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one instrument deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Instrument connection parameters
    pub connection: ConnectionConfig,

    /// Periodic sampling parameters
    pub sampling: SamplingConfig,

    /// Stability detection parameters
    pub stability: StabilityConfig,
}

impl Config {
    /// Load configuration using the standard search order:
    /// `$CRYOSTATION_CONFIG`, then `./cryostation.toml`, then defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("CRYOSTATION_CONFIG") {
            let path = PathBuf::from(&path);
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded config from CRYOSTATION_CONFIG");
                    return config;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring CRYOSTATION_CONFIG");
                }
            }
        }

        let local = Path::new("cryostation.toml");
        if local.exists() {
            match Self::load_from_file(local) {
                Ok(config) => {
                    info!(path = %local.display(), "Loaded config file");
                    return config;
                }
                Err(e) => {
                    warn!(path = %local.display(), error = %e, "Ignoring unreadable config file");
                }
            }
        }

        info!("No config file found, using built-in defaults");
        Self::default()
    }

    /// Load configuration from an explicit TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Instrument connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Instrument hostname or address.
    pub host: String,

    /// Instrument TCP port.
    pub port: u16,

    /// TCP connect timeout (seconds).
    pub connect_timeout_secs: u64,

    /// Optional bound on each command's response wait (seconds).
    ///
    /// `None` preserves the instrument's native contract: block until a
    /// full response arrives, however long that takes. Set a value to
    /// get a distinguishable `TimedOut` error instead.
    pub response_timeout_secs: Option<u64>,

    /// Opt-in connect retry policy.
    pub retry: RetryConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: defaults::PORT,
            connect_timeout_secs: defaults::CONNECT_TIMEOUT_SECS,
            response_timeout_secs: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded connect retry with exponential backoff. Disabled by default;
/// a failed connect is then reported immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            initial_delay_ms: defaults::RETRY_INITIAL_DELAY_MS,
            max_delay_ms: defaults::RETRY_MAX_DELAY_MS,
        }
    }
}

/// Periodic sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Tick interval (milliseconds).
    pub sample_rate_ms: u64,

    /// Sliding-window length for general observation pipelines.
    pub window: usize,

    /// What a failed tick does to the pipeline run.
    pub on_tick_failure: TickPolicy,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_rate_ms: defaults::SAMPLE_RATE_MS,
            window: defaults::OBSERVER_WINDOW,
            on_tick_failure: TickPolicy::default(),
        }
    }
}

/// Stability detection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Sliding-window length for stability detection.
    pub window: usize,

    /// Slope and magnitude thresholds for the verdict.
    pub thresholds: StabilityThresholds,

    /// Which temperature reading the evaluator trends.
    pub temperature_source: TemperatureSource,

    /// Which stability reading the evaluator trends.
    pub stability_source: StabilitySource,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            window: defaults::STABILITY_WINDOW,
            thresholds: StabilityThresholds::default(),
            temperature_source: TemperatureSource::User,
            stability_source: StabilitySource::User,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.connection.port, 7773);
        assert_eq!(config.connection.response_timeout_secs, None);
        assert!(!config.connection.retry.enabled);
        assert_eq!(config.sampling.sample_rate_ms, 1000);
        assert_eq!(config.sampling.window, 100);
        assert_eq!(config.stability.window, 30);
        assert_eq!(config.stability.thresholds.temperature_slope_threshold, 5e-3);
        assert_eq!(config.stability.thresholds.stability_slope_threshold, 5e-3);
        assert_eq!(config.stability.thresholds.max_stability, 0.1);
    }

    #[test]
    fn test_partial_toml_overlays_defaults() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            host = "cryostation-127"
            response_timeout_secs = 5

            [stability]
            window = 10
            "#,
        )
        .expect("parse");

        assert_eq!(config.connection.host, "cryostation-127");
        assert_eq!(config.connection.port, 7773);
        assert_eq!(config.connection.response_timeout_secs, Some(5));
        assert_eq!(config.stability.window, 10);
        assert_eq!(config.stability.thresholds.max_stability, 0.1);
        assert_eq!(config.sampling.sample_rate_ms, 1000);
    }

    #[test]
    fn test_load_from_file_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cryostation.toml");
        std::fs::write(
            &path,
            "[sampling]\nsample_rate_ms = 250\non_tick_failure = \"skip_tick\"\n",
        )
        .expect("write");

        let config = Config::load_from_file(&path).expect("load");
        assert_eq!(config.sampling.sample_rate_ms, 250);
        assert_eq!(config.sampling.on_tick_failure, TickPolicy::SkipTick);
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let err = Config::load_from_file(Path::new("/nonexistent/cryostation.toml"))
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
