//! In-memory traffic store for testing.

use super::{RowDecodeError, RowResult, StoreError, TrafficRecord, TrafficScan, TrafficStore};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    rows: Vec<RowResult>,
    query_failure: Option<String>,
    stream_failure: Option<(usize, String)>,
}

/// Store double with injectable failures.
///
/// Rows are returned in insertion order. Failures stay armed until
/// [`MemoryStore::clear_failures`] is called.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given records.
    pub fn with_records(records: impl IntoIterator<Item = TrafficRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.push(record);
        }
        store
    }

    /// Appends a well-formed row.
    pub fn push(&self, record: TrafficRecord) {
        self.with_state(|state| state.rows.push(Ok(record)));
    }

    /// Appends a row that fails to decode.
    pub fn push_malformed(&self, error: RowDecodeError) {
        self.with_state(|state| state.rows.push(Err(error)));
    }

    /// Overwrites the counters of every row belonging to `account`.
    pub fn set_counters(&self, account: &str, bytes_uploaded: u64, bytes_downloaded: u64) {
        self.with_state(|state| {
            for record in state.rows.iter_mut().flatten() {
                if record.account == account {
                    record.bytes_uploaded = bytes_uploaded;
                    record.bytes_downloaded = bytes_downloaded;
                }
            }
        });
    }

    /// Makes every query fail before returning any row.
    pub fn fail_queries(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.with_state(|state| state.query_failure = Some(reason));
    }

    /// Breaks the row stream after `rows` rows have been returned.
    pub fn fail_stream_after(&self, rows: usize, reason: impl Into<String>) {
        let reason = reason.into();
        self.with_state(|state| state.stream_failure = Some((rows, reason)));
    }

    /// Disarms query and stream failures.
    pub fn clear_failures(&self) {
        self.with_state(|state| {
            state.query_failure = None;
            state.stream_failure = None;
        });
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }
}

impl TrafficStore for MemoryStore {
    fn scan(&self) -> Result<TrafficScan, StoreError> {
        self.with_state(|state| {
            if let Some(reason) = &state.query_failure {
                return Err(StoreError::Unavailable(reason.clone()));
            }

            match &state.stream_failure {
                Some((limit, reason)) if *limit < state.rows.len() => Ok(TrafficScan {
                    rows: state.rows[..*limit].to_vec(),
                    interrupted: Some(StoreError::Stream(reason.clone())),
                }),
                _ => Ok(TrafficScan::from_rows(state.rows.clone())),
            }
        })
    }
}
