//! Traffic Exporter CLI
//!
//! Serves x-ui per-account traffic counters to Prometheus.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use traffic_exporter::{
    cli::Cli,
    metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig},
    store::SqliteStore,
    ExporterConfig,
};

fn main() -> ExitCode {
    let config = match Cli::parse().resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.level)),
        )
        .init();

    info!(version = traffic_exporter::VERSION, "Starting traffic-exporter");

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: ExporterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::open(&config.store)?;
    let registry = MetricsRegistry::with_store(store)?;
    let server = MetricsServer::new(MetricsServerConfig::try_from(&config.web)?, registry);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.runtime.worker_threads)
        .enable_all()
        .build()?;
    info!(
        workers = config.runtime.worker_threads,
        db = %config.store.db_path.display(),
        "Runtime ready"
    );

    runtime.block_on(server.run())?;
    Ok(())
}
