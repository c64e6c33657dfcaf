//! Metrics registry and text encoding.

use super::TrafficCollector;
use crate::store::TrafficStore;
use prometheus::{Encoder, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Registry holding the exporter's collectors.
///
/// Owns its own [`Registry`] instead of the process-wide default one, so
/// every exporter instance (and every test) sees only what it registered.
pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// Creates a registry with a traffic collector over `store` registered.
    pub fn with_store<S>(store: S) -> Result<Self, MetricsError>
    where
        S: TrafficStore + 'static,
    {
        let registry = Self::new();
        registry.register_traffic(TrafficCollector::new(store)?)?;
        Ok(registry)
    }

    /// Registers a traffic collector; its descriptors are validated here.
    pub fn register_traffic<S>(&self, collector: TrafficCollector<S>) -> Result<(), MetricsError>
    where
        S: TrafficStore + 'static,
    {
        self.registry.register(Box::new(collector))?;
        Ok(())
    }

    /// Encodes all metrics in Prometheus text format.
    ///
    /// Runs every registered collector, so this blocks on the store.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
