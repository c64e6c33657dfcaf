//! Traffic Exporter Library
//!
//! Exposes the per-account traffic counters kept by x-ui in its SQLite
//! database as Prometheus counters.
//!
//! # Architecture
//!
//! Every scrape is an independent, synchronous read:
//!
//! ```text
//! HTTP GET /metrics → registry gather → TrafficCollector → TrafficStore (SQLite)
//!                          ↓
//!                    text exposition
//! ```
//!
//! # Design Principles
//!
//! - **Stateless**: nothing is cached or aggregated between scrapes
//! - **Fail-soft**: store and row failures are logged and produce fewer
//!   samples, never a crashed process or a failed response
//! - **Read-only**: the database is opened read-only and only ever queried
//! - **Opaque labels**: the `enable` column is passed through as-is
//!
//! # Example
//!
//! ```
//! use traffic_exporter::{
//!     metrics::TrafficCollector,
//!     store::{MemoryStore, TrafficRecord},
//! };
//!
//! let store = MemoryStore::with_records([TrafficRecord::new("a@b.com", 100, 50, 1)]);
//! let collector = TrafficCollector::new(store).unwrap();
//!
//! let samples = collector.collect();
//! assert_eq!(samples.len(), 2);
//! assert_eq!(samples[0].name, "email_upload_bytes_total");
//! assert_eq!(samples[0].labels.enable, "1");
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod metrics;
pub mod store;

// Re-export commonly used types at crate root
pub use config::ExporterConfig;
pub use metrics::{MetricSample, MetricsRegistry, MetricsServer, TrafficCollector};
pub use store::{MemoryStore, SqliteStore, TrafficRecord, TrafficStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
