//! Read access to the traffic table.
//!
//! The collector only depends on the [`TrafficStore`] trait, which hands back
//! every row of the table as an explicit per-row result. [`SqliteStore`] reads
//! the x-ui database; [`MemoryStore`] is an in-process double for tests.

mod memory;
mod record;
mod sqlite;

pub use memory::MemoryStore;
pub use record::{counter_from_i64, RowDecodeError, RowResult, TrafficRecord};
pub use sqlite::{SqliteStore, SQLITE_HEADER, TRAFFIC_QUERY};

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a traffic store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The query could not be executed at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Iteration broke off after some rows were read.
    #[error("row stream interrupted: {0}")]
    Stream(String),
    #[error("failed to open database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("it doesn't look like a sqlite file: {0}")]
    NotSqlite(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything one query returned.
#[derive(Debug, Default)]
pub struct TrafficScan {
    /// Rows in store order, decoded or not.
    pub rows: Vec<RowResult>,
    /// Set when the row stream failed before it was exhausted.
    pub interrupted: Option<StoreError>,
}

impl TrafficScan {
    /// A scan that ran to completion.
    pub fn from_rows(rows: Vec<RowResult>) -> Self {
        Self {
            rows,
            interrupted: None,
        }
    }
}

/// A source of traffic rows.
///
/// Implementations must be safe to call from concurrent scrapes.
pub trait TrafficStore: Send + Sync {
    /// Reads the whole traffic table.
    ///
    /// `Err` means nothing could be read. Row-level failures and late stream
    /// failures are reported inside the returned [`TrafficScan`].
    fn scan(&self) -> Result<TrafficScan, StoreError>;
}

impl<S: TrafficStore + ?Sized> TrafficStore for Arc<S> {
    fn scan(&self) -> Result<TrafficScan, StoreError> {
        (**self).scan()
    }
}
