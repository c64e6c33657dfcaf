//! Prometheus exporter for per-account traffic.
//!
//! # Metrics Exposed
//!
//! - `email_upload_bytes_total{email, enable}` - Total bytes uploaded by each email
//! - `email_download_bytes_total{email, enable}` - Total bytes downloaded by each email
//!
//! `email` is the account identifier and `enable` the raw status column of
//! the same row, rendered as a decimal string. Values are read fresh from
//! the store on every scrape.
//!
//! # Example
//!
//! ```
//! use traffic_exporter::metrics::MetricsRegistry;
//! use traffic_exporter::store::{MemoryStore, TrafficRecord};
//!
//! let store = MemoryStore::with_records([TrafficRecord::new("a@b.com", 100, 50, 1)]);
//! let registry = MetricsRegistry::with_store(store).expect("Failed to create registry");
//!
//! let output = registry.encode().unwrap();
//! assert!(output.contains(r#"email_upload_bytes_total{email="a@b.com",enable="1"} 100"#));
//! ```

mod collector;
mod registry;
mod server;

pub use collector::{
    CollectReport, LabelSet, MetricDescriptor, MetricKind, MetricSample, TrafficCollector,
    DOWNLOAD_METRIC, LABEL_EMAIL, LABEL_ENABLE, UPLOAD_METRIC,
};
pub use registry::{MetricsError, MetricsRegistry};
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
