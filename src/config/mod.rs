//! Configuration management for sniper
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. Bounds are enforced here; the monitor core
//! accepts whatever pacing it is handed.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::monitor::Pacing;

/// Allowed range for the pause between probes within a turn
pub const CHECK_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 5..=300;

/// Allowed range for the pause between rounds
pub const PAIR_DELAY_RANGE: std::ops::RangeInclusive<u64> = 10..=600;

/// Accepted values of `logging.level`
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Monitoring configuration
    pub monitor: MonitorConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Monitoring loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between probes within one turn
    pub check_interval_secs: u64,

    /// Seconds between rounds
    pub pair_delay_secs: u64,

    /// Seconds to wait when idle or after a bookkeeping error
    pub idle_backoff_secs: u64,

    /// Capacity of the found-event queue
    pub found_queue_capacity: usize,
}

/// Logging configuration
///
/// The `--verbose` and `--log-format` flags override these values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

/// Metrics configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Register Prometheus metrics on startup
    pub enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            pair_delay_secs: 60,
            idle_backoff_secs: 30,
            found_queue_capacity: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl MonitorConfig {
    /// Pacing consumed by the scheduler
    #[must_use]
    pub fn pacing(&self) -> Pacing {
        Pacing::from_secs(self.check_interval_secs, self.pair_delay_secs)
    }

    /// Idle backoff as Duration
    #[must_use]
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_secs(self.idle_backoff_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = MonitorConfig::default();

        let monitor = MonitorConfig {
            check_interval_secs: env_parse("SNIPER_CHECK_INTERVAL", defaults.check_interval_secs),
            pair_delay_secs: env_parse("SNIPER_PAIR_DELAY", defaults.pair_delay_secs),
            idle_backoff_secs: env_parse("SNIPER_IDLE_BACKOFF", defaults.idle_backoff_secs),
            found_queue_capacity: env_parse("SNIPER_FOUND_QUEUE", defaults.found_queue_capacity),
        };

        let level = std::env::var("SNIPER_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let format = std::env::var("SNIPER_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            monitor,
            logging: LoggingConfig { level, format },
            metrics: MetricsConfig {
                enabled: env_parse("SNIPER_METRICS", false),
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::with_source(format!("Failed to read config file: {}", path.display()), e)
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            Error::with_source(
                format!("Failed to parse TOML config file: {}", path.display()),
                e,
            )
        })?;

        Ok(config)
    }

    /// Load from `path` if given, otherwise from the environment, and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let monitor = &self.monitor;

        if !CHECK_INTERVAL_RANGE.contains(&monitor.check_interval_secs) {
            return Err(Error::config(format!(
                "check_interval_secs must be between {} and {} seconds, got {}",
                CHECK_INTERVAL_RANGE.start(),
                CHECK_INTERVAL_RANGE.end(),
                monitor.check_interval_secs
            )));
        }

        if !PAIR_DELAY_RANGE.contains(&monitor.pair_delay_secs) {
            return Err(Error::config(format!(
                "pair_delay_secs must be between {} and {} seconds, got {}",
                PAIR_DELAY_RANGE.start(),
                PAIR_DELAY_RANGE.end(),
                monitor.pair_delay_secs
            )));
        }

        if monitor.idle_backoff_secs == 0 {
            return Err(Error::config("idle_backoff_secs must be greater than 0"));
        }

        if monitor.found_queue_capacity == 0 {
            return Err(Error::config("found_queue_capacity must be greater than 0"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(Error::config(format!(
                "log level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(Error::config(format!(
                "log format must be 'text' or 'json', got '{}'",
                self.logging.format
            )));
        }

        Ok(())
    }
}
