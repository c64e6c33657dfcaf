//! Traffic rows and their decode results.

use thiserror::Error;

/// One row of the traffic table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficRecord {
    /// Account the traffic belongs to (the `email` column).
    pub account: String,
    /// Cumulative bytes uploaded.
    pub bytes_uploaded: u64,
    /// Cumulative bytes downloaded.
    pub bytes_downloaded: u64,
    /// Raw status column, passed through without interpretation.
    pub status_flag: i64,
}

impl TrafficRecord {
    /// Creates a record from already validated column values.
    pub fn new(
        account: impl Into<String>,
        bytes_uploaded: u64,
        bytes_downloaded: u64,
        status_flag: i64,
    ) -> Self {
        Self {
            account: account.into(),
            bytes_uploaded,
            bytes_downloaded,
            status_flag,
        }
    }
}

/// Reasons a single row could not be turned into a [`TrafficRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowDecodeError {
    #[error("column `{column}`: {detail}")]
    Column {
        column: &'static str,
        detail: String,
    },
    #[error("column `{column}` holds a negative counter ({value})")]
    NegativeCounter { column: &'static str, value: i64 },
}

impl RowDecodeError {
    /// A column whose value could not be read as the expected type.
    pub fn column(column: &'static str, detail: impl ToString) -> Self {
        Self::Column {
            column,
            detail: detail.to_string(),
        }
    }

    /// Name of the offending column.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Column { column, .. } | Self::NegativeCounter { column, .. } => column,
        }
    }
}

/// Outcome of decoding one row.
pub type RowResult = Result<TrafficRecord, RowDecodeError>;

/// Converts a signed store integer into a counter value.
pub fn counter_from_i64(column: &'static str, value: i64) -> Result<u64, RowDecodeError> {
    u64::try_from(value).map_err(|_| RowDecodeError::NegativeCounter { column, value })
}
