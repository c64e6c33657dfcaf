//! SQLite-backed traffic store.

use super::{
    counter_from_i64, RowDecodeError, RowResult, StoreError, TrafficRecord, TrafficScan,
    TrafficStore,
};
use crate::config::StoreConfig;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Magic bytes at the start of every SQLite 3 database file.
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// The only query the exporter ever runs.
pub const TRAFFIC_QUERY: &str = "SELECT email, up, down, enable FROM client_traffics";

/// Read-only view of the `client_traffics` table.
///
/// `rusqlite::Connection` is not `Sync`; the mutex is held only while the
/// query runs and its rows are decoded.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens the database described by `config` in read-only mode.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let path = config.db_path.as_path();
        if !is_sqlite_file(path)? {
            return Err(StoreError::NotSqlite(path.to_path_buf()));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(path, flags).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!(path = %path.display(), "Opened traffic database");
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl TrafficStore for SqliteStore {
    fn scan(&self) -> Result<TrafficScan, StoreError> {
        // A panic mid-scan leaves the connection itself usable.
        let conn = self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovering traffic database connection after a panicked scrape");
            poisoned.into_inner()
        });

        let mut stmt = conn
            .prepare_cached(TRAFFIC_QUERY)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut scan = TrafficScan::default();
        loop {
            match rows.next() {
                Ok(Some(row)) => scan.rows.push(decode_row(row)),
                Ok(None) => break,
                // Nothing was read yet: the query itself never got going.
                Err(e) if scan.rows.is_empty() => {
                    return Err(StoreError::Unavailable(e.to_string()));
                }
                Err(e) => {
                    scan.interrupted = Some(StoreError::Stream(e.to_string()));
                    break;
                }
            }
        }
        Ok(scan)
    }
}

fn decode_row(row: &Row<'_>) -> RowResult {
    let value = row
        .get_ref(0)
        .map_err(|e| RowDecodeError::column("email", e))?;
    let account = decode_account(value)?;
    let up: i64 = row.get(1).map_err(|e| RowDecodeError::column("up", e))?;
    let down: i64 = row.get(2).map_err(|e| RowDecodeError::column("down", e))?;
    let enable: i64 = row
        .get(3)
        .map_err(|e| RowDecodeError::column("enable", e))?;

    Ok(TrafficRecord::new(
        account,
        counter_from_i64("up", up)?,
        counter_from_i64("down", down)?,
        enable,
    ))
}

/// Reads the account column; integer identifiers are taken as their decimal text.
fn decode_account(value: ValueRef<'_>) -> Result<String, RowDecodeError> {
    match value {
        ValueRef::Text(_) => value
            .as_str()
            .map(str::to_owned)
            .map_err(|e| RowDecodeError::column("email", e)),
        ValueRef::Integer(i) => Ok(i.to_string()),
        other => Err(RowDecodeError::column(
            "email",
            format!("unexpected {} value", other.data_type()),
        )),
    }
}

/// Checks the SQLite magic header without opening the database.
fn is_sqlite_file(path: &Path) -> Result<bool, StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    let mut buf = [0u8; 16];
    match file.read_exact(&mut buf) {
        Ok(()) => Ok(&buf == SQLITE_HEADER),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(io_err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SCHEMA: &str = "CREATE TABLE client_traffics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        inbound_id INTEGER,
        enable INTEGER,
        email TEXT,
        up INTEGER,
        down INTEGER,
        expiry_time INTEGER,
        total INTEGER
    )";

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn
    }

    #[test]
    fn test_scan_decodes_rows_in_order() {
        let conn = memory_db();
        conn.execute_batch(
            "INSERT INTO client_traffics (email, up, down, enable) VALUES ('a@b.com', 100, 50, 1);
             INSERT INTO client_traffics (email, up, down, enable) VALUES ('c@d.com', 0, 7, 0);",
        )
        .unwrap();

        let scan = SqliteStore::from_connection(conn).scan().unwrap();
        assert!(scan.interrupted.is_none());
        assert_eq!(
            scan.rows,
            vec![
                Ok(TrafficRecord::new("a@b.com", 100, 50, 1)),
                Ok(TrafficRecord::new("c@d.com", 0, 7, 0)),
            ]
        );
    }

    #[test]
    fn test_scan_reports_bad_rows_individually() {
        let conn = memory_db();
        conn.execute_batch(
            "INSERT INTO client_traffics (email, up, down, enable) VALUES (NULL, 1, 2, 1);
             INSERT INTO client_traffics (email, up, down, enable) VALUES ('x@y.com', 'lots', 2, 1);
             INSERT INTO client_traffics (email, up, down, enable) VALUES ('n@y.com', 1, -2, 1);
             INSERT INTO client_traffics (email, up, down, enable) VALUES ('ok@y.com', 3, 4, 5);",
        )
        .unwrap();

        let scan = SqliteStore::from_connection(conn).scan().unwrap();
        assert_eq!(scan.rows.len(), 4);
        assert_eq!(scan.rows[0].as_ref().unwrap_err().column_name(), "email");
        assert_eq!(scan.rows[1].as_ref().unwrap_err().column_name(), "up");
        assert_eq!(
            scan.rows[2],
            Err(RowDecodeError::NegativeCounter {
                column: "down",
                value: -2
            })
        );
        assert_eq!(scan.rows[3], Ok(TrafficRecord::new("ok@y.com", 3, 4, 5)));
    }

    /// `client_traffics` as a view whose filter overflows on row `failing_id`.
    fn overflowing_db(failing_id: i64) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&format!(
            "CREATE TABLE traffic_rows (id INTEGER PRIMARY KEY, email TEXT, up INTEGER, down INTEGER, enable INTEGER);
             INSERT INTO traffic_rows VALUES (1, 'a', 1, 2, 1);
             INSERT INTO traffic_rows VALUES (2, 'b', 3, 4, 1);
             INSERT INTO traffic_rows VALUES (3, 'c', 5, 6, 1);
             CREATE VIEW client_traffics AS
                 SELECT email, up, down, enable FROM traffic_rows
                 WHERE CASE WHEN id = {failing_id} THEN abs(-9223372036854775807 - 1) ELSE 1 END;"
        ))
        .unwrap();
        conn
    }

    #[test]
    fn test_late_step_error_keeps_earlier_rows() {
        let scan = SqliteStore::from_connection(overflowing_db(2))
            .scan()
            .unwrap();
        assert_eq!(scan.rows, vec![Ok(TrafficRecord::new("a", 1, 2, 1))]);
        assert!(matches!(scan.interrupted, Some(StoreError::Stream(_))));
    }

    #[test]
    fn test_first_step_error_is_unavailable() {
        let result = SqliteStore::from_connection(overflowing_db(1)).scan();
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_integer_email_is_stringified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE client_traffics (email, up, down, enable);
             INSERT INTO client_traffics VALUES (12345, 1, 2, 1);
             INSERT INTO client_traffics VALUES (1.5, 1, 2, 1);",
        )
        .unwrap();

        let scan = SqliteStore::from_connection(conn).scan().unwrap();
        assert_eq!(scan.rows[0], Ok(TrafficRecord::new("12345", 1, 2, 1)));
        assert_eq!(scan.rows[1].as_ref().unwrap_err().column_name(), "email");
    }

    #[test]
    fn test_scan_recovers_from_poisoned_lock() {
        let conn = memory_db();
        conn.execute_batch(
            "INSERT INTO client_traffics (email, up, down, enable) VALUES ('a@b.com', 100, 50, 1);",
        )
        .unwrap();
        let store = SqliteStore::from_connection(conn);

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.conn.lock().unwrap();
            panic!("scrape panicked while holding the connection");
        }));
        assert!(store.conn.is_poisoned());

        let scan = store.scan().unwrap();
        assert_eq!(
            scan.rows,
            vec![Ok(TrafficRecord::new("a@b.com", 100, 50, 1))]
        );
    }

    #[test]
    fn test_missing_table_is_unavailable() {
        let conn = Connection::open_in_memory().unwrap();
        let result = SqliteStore::from_connection(conn).scan();
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_open_rejects_non_sqlite_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"definitely not a database file").unwrap();

        let config = StoreConfig {
            db_path: file.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(
            SqliteStore::open(&config),
            Err(StoreError::NotSqlite(_))
        ));
    }

    #[test]
    fn test_open_rejects_short_file() {
        let file = NamedTempFile::new().unwrap();
        let config = StoreConfig {
            db_path: file.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(
            SqliteStore::open(&config),
            Err(StoreError::NotSqlite(_))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            db_path: dir.path().join("absent.db"),
            ..Default::default()
        };
        assert!(matches!(
            SqliteStore::open(&config),
            Err(StoreError::Io { .. })
        ));
    }

    #[test]
    fn test_open_reads_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x-ui.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(SCHEMA).unwrap();
            conn.execute(
                "INSERT INTO client_traffics (email, up, down, enable) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params!["user@example.com", 10i64, 20i64, 1i64],
            )
            .unwrap();
        }

        let config = StoreConfig {
            db_path: path,
            ..Default::default()
        };
        let store = SqliteStore::open(&config).unwrap();
        let scan = store.scan().unwrap();
        assert_eq!(
            scan.rows,
            vec![Ok(TrafficRecord::new("user@example.com", 10, 20, 1))]
        );
    }
}
