//! Configuration for the ingestion pipeline and aggregation engine.
//!
//! Layered the way the teacher crate's `CliConfig` loads settings: built-in defaults, then an
//! optional YAML file, then environment variables (prefixed `ANALYTICS_`) as the final
//! override — via the `config` crate rather than hand-rolled env parsing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config as ConfigSource, Environment, File};
use serde::{Deserialize, Serialize};

/// Top-level service configuration; the subset relevant to the aggregation core (§6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_size_secs")]
    pub size_secs: i64,
}

fn default_worker_count() -> usize {
    10
}
fn default_buffer_size() -> usize {
    1000
}
fn default_flush_interval_secs() -> u64 {
    5
}
fn default_window_size_secs() -> i64 {
    60
}
fn default_shutdown_timeout_secs() -> u64 {
    10
}
fn default_http_port() -> u16 {
    8080
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            buffer_size: default_buffer_size(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size_secs: default_window_size_secs(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::default(),
            window: WindowConfig::default(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            http_port: default_http_port(),
        }
    }
}

impl ServiceConfig {
    /// Loads defaults, then an optional YAML file (`ANALYTICS_CONFIG` env var, or
    /// `./config.yaml` if present), then `ANALYTICS_*` environment variable overrides
    /// (e.g. `ANALYTICS_PROCESSING__WORKER_COUNT=20`).
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = ConfigSource::builder()
            .set_default("processing.worker_count", default_worker_count() as i64)?
            .set_default("processing.buffer_size", default_buffer_size() as i64)?
            .set_default(
                "processing.flush_interval_secs",
                default_flush_interval_secs() as i64,
            )?
            .set_default("window.size_secs", default_window_size_secs())?
            .set_default(
                "shutdown_timeout_secs",
                default_shutdown_timeout_secs() as i64,
            )?
            .set_default("http_port", default_http_port() as i64)?;

        let config_path = Self::config_path();
        if config_path.exists() {
            builder = builder.add_source(File::from(config_path));
        }

        builder = builder.add_source(
            Environment::with_prefix("ANALYTICS")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the subset of configuration this core cares about (§6): worker count and
    /// buffer size must be usable, window/flush durations must be positive.
    fn validate(&self) -> Result<()> {
        if self.processing.worker_count < 1 {
            anyhow::bail!("processing.worker_count must be >= 1");
        }
        if self.processing.buffer_size < 100 {
            anyhow::bail!("processing.buffer_size must be >= 100");
        }
        if self.processing.flush_interval_secs == 0 {
            anyhow::bail!("processing.flush_interval_secs must be > 0");
        }
        if self.window.size_secs <= 0 {
            anyhow::bail!("window.size_secs must be > 0");
        }
        Ok(())
    }

    /// `ANALYTICS_CONFIG` wins if set; otherwise a `config.yaml` in the current directory;
    /// otherwise the user's config directory (`dirs::config_dir()/event-aggregator/config.yaml`),
    /// matching the teacher's own `CliConfig::config_path` fallback chain.
    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("ANALYTICS_CONFIG") {
            return PathBuf::from(path);
        }
        let cwd_config = PathBuf::from("config.yaml");
        if cwd_config.exists() {
            return cwd_config;
        }
        dirs::config_dir()
            .map(|dir| dir.join("event-aggregator").join("config.yaml"))
            .unwrap_or(cwd_config)
    }

    pub fn window_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window.size_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.processing.flush_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = ServiceConfig::default();
        assert_eq!(config.processing.worker_count, 10);
        assert_eq!(config.processing.buffer_size, 1000);
        assert_eq!(config.processing.flush_interval_secs, 5);
        assert_eq!(config.window.size_secs, 60);
        assert_eq!(config.shutdown_timeout_secs, 10);
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(ServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn validation_rejects_undersized_buffer() {
        let mut config = ServiceConfig::default();
        config.processing.buffer_size = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_workers() {
        let mut config = ServiceConfig::default();
        config.processing.worker_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial_test::serial]
    fn config_path_honors_env_var_override() {
        std::env::set_var("ANALYTICS_CONFIG", "/tmp/event-aggregator-test-config.yaml");
        assert_eq!(
            ServiceConfig::config_path(),
            PathBuf::from("/tmp/event-aggregator-test-config.yaml")
        );
        std::env::remove_var("ANALYTICS_CONFIG");
    }
}
