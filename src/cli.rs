//! Command-line flags.

use crate::config::{ConfigError, ExporterConfig};
use clap::Parser;
use std::path::PathBuf;

/// Prometheus exporter for x-ui per-account traffic.
#[derive(Debug, Parser)]
#[command(name = "traffic-exporter", version, about)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database.
    #[arg(long = "db-path", env = "TRAFFIC_EXPORTER_DB_PATH", value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Address on which to expose metrics and web interface.
    #[arg(long = "web.listen-address", value_name = "ADDR")]
    pub listen_address: Option<String>,

    /// Path under which to expose metrics.
    #[arg(long = "web.telemetry-path", value_name = "PATH")]
    pub telemetry_path: Option<String>,

    /// Number of async runtime worker threads.
    #[arg(
        long = "runtime.worker-threads",
        env = "TRAFFIC_EXPORTER_WORKER_THREADS",
        value_name = "N"
    )]
    pub worker_threads: Option<usize>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long = "log.level", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Builds the effective configuration: defaults, then the file, then flags.
    pub fn resolve(self) -> Result<ExporterConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ExporterConfig::from_file(path)?,
            None => ExporterConfig::default(),
        };

        if let Some(db_path) = self.db_path {
            config.store.db_path = db_path;
        }
        if let Some(addr) = self.listen_address {
            config.web.listen_address = addr;
        }
        if let Some(path) = self.telemetry_path {
            config.web.telemetry_path = path;
        }
        if let Some(threads) = self.worker_threads {
            config.runtime.worker_threads = threads;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }

        config.validate()?;
        Ok(config)
    }
}
