//! Exporter configuration.
//!
//! Every setting has a default matching a stock x-ui install, so the exporter
//! runs without a config file. A TOML file can override any section, and
//! command-line flags override the file (see [`crate::cli`]).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default location of the x-ui database.
pub const DEFAULT_DB_PATH: &str = "/etc/x-ui/x-ui.db";

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("database path must not be empty")]
    EmptyDbPath,
    #[error("invalid listen address `{0}`")]
    InvalidListenAddress(String),
    #[error("telemetry path must start with '/' (got `{0}`)")]
    InvalidTelemetryPath(String),
    #[error("worker thread count must be at least 1")]
    InvalidWorkerThreads,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExporterConfig {
    /// Database settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// HTTP listener settings.
    #[serde(default)]
    pub web: WebConfig,
    /// Async runtime settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Where and how to read the traffic table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database.
    pub db_path: PathBuf,
    /// How long a query waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout_ms: 5000,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// Address to listen on.
    pub listen_address: String,
    /// Path under which to expose metrics.
    pub telemetry_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:9100".to_string(),
            telemetry_path: "/metrics".to_string(),
        }
    }
}

impl WebConfig {
    /// Parses the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_address
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddress(self.listen_address.clone()))
    }
}

/// Async runtime sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of tokio worker threads.
    pub worker_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { worker_threads: 1 }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Fallback filter when `RUST_LOG` is unset (e.g. `info`, `debug`).
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ExporterConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config: ExporterConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.db_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDbPath);
        }
        self.web.socket_addr()?;
        if !self.web.telemetry_path.starts_with('/') {
            return Err(ConfigError::InvalidTelemetryPath(
                self.web.telemetry_path.clone(),
            ));
        }
        if self.runtime.worker_threads == 0 {
            return Err(ConfigError::InvalidWorkerThreads);
        }
        Ok(())
    }
}
