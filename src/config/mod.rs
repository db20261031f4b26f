//! Configuration system for nimbusq.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base of every queue URL, e.g. `http://localhost:9324`.
    pub endpoint: String,
    /// Region embedded in queue ARNs.
    pub region: String,
    /// Timer processing configuration.
    pub scheduler: SchedulerConfig,
    /// Tenant limits.
    pub limits: LimitsConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

/// Timer processing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Background tick interval in milliseconds. Also bounds how late a long
    /// poll may return after its wait time.
    pub tick_interval_ms: u64,
}

impl SchedulerConfig {
    /// Tick interval as a duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 200,
        }
    }
}

/// Tenant limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Queue quota for accounts whose directory entry sets none.
    pub max_queues_per_account: Option<usize>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive.
    pub level: String,
    /// Log format (text or json).
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log format enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text format.
    Text,
    /// JSON format.
    Json,
}

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Record Prometheus metrics.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9324".to_string(),
            region: "us-east-1".to_string(),
            scheduler: SchedulerConfig::default(),
            limits: LimitsConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text and validate it.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(Error::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }

        if self.region.is_empty() || self.region.contains(':') {
            return Err(Error::Config(format!("invalid region '{}'", self.region)));
        }

        if self.scheduler.tick_interval_ms == 0 {
            return Err(Error::Config(
                "scheduler.tick_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.limits.max_queues_per_account == Some(0) {
            return Err(Error::Config(
                "limits.max_queues_per_account must be greater than zero".to_string(),
            ));
        }

        EnvFilter::try_new(&self.logging.level)
            .map_err(|e| Error::Config(format!("invalid log level '{}': {}", self.logging.level, e)))?;

        Ok(())
    }
}

/// Install a global tracing subscriber. `RUST_LOG` overrides the configured
/// level. Fails if a global subscriber is already set.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| Error::Config(format!("invalid log level '{}': {}", logging.level, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = match logging.format {
        LogFormat::Text => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| Error::Config(format!("failed to install tracing subscriber: {}", e)))
}
