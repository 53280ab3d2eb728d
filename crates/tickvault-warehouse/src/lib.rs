//! # Tickvault Warehouse
//!
//! DuckDB-backed store for acquired market and macroeconomic series.
//!
//! ## Overview
//!
//! One table holds everything the acquisition pipeline produces:
//!
//! | Table | Description |
//! |-------|-------------|
//! | `market_data` | One row per (symbol, date): close and optional volume |
//! | `ingest_log` | One audit row per persisted source batch |
//! | `schema_migrations` | Versioned migration bookkeeping |
//!
//! ## Write discipline
//!
//! - A single connection behind a mutex serializes all writes; there is no
//!   second writer to interleave partial commits with.
//! - Each source batch is one transaction, committed or rolled back whole.
//! - `INSERT OR REPLACE` on the `(symbol, date)` primary key makes
//!   persistence idempotent: re-running a cycle over an overlapping window
//!   replaces rows instead of duplicating them.
//!
//! All user-provided values travel as query parameters, never interpolated.

pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use ::duckdb::{Connection, ToSql};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Location of the store on disk.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for tickvault data.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let home = resolve_tickvault_home();
        let db_path = home.join("market.duckdb");
        Self { home, db_path }
    }
}

impl StoreConfig {
    /// A store rooted at `dir`, used by tests and one-off tooling.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        let home = dir.into();
        let db_path = home.join("market.duckdb");
        Self { home, db_path }
    }
}

/// One persisted observation. Logical primary key: `(symbol, date)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketRow {
    pub symbol: String,
    /// Source-local timestamp string, stored verbatim.
    pub date: String,
    pub close: f64,
    pub volume: Option<u64>,
}

/// The acquisition pipeline's durable sink.
///
/// Opened once per run; the handle closing on drop is the store's release
/// point on every exit path.
pub struct MarketStore {
    config: StoreConfig,
    connection: Mutex<Connection>,
}

impl MarketStore {
    /// Open (creating if needed) the store and bring its schema up to date.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let connection = Connection::open(&config.db_path)?;
        migrations::apply_migrations(&connection)?;
        tracing::debug!(db_path = %config.db_path.display(), "market store opened");

        Ok(Self {
            config,
            connection: Mutex::new(connection),
        })
    }

    /// Open a store with the default on-disk location.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(StoreConfig::default())
    }

    pub fn db_path(&self) -> &Path {
        &self.config.db_path
    }

    /// Persist one source's batch as a single transaction.
    ///
    /// Idempotent: a `(symbol, date)` pair that already exists is replaced,
    /// never duplicated. Zero rows is a no-op. Returns the number of rows
    /// written.
    pub fn persist(
        &self,
        source_id: &str,
        request_id: &str,
        rows: &[MarketRow],
    ) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.writer();
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, StoreError> {
            for row in rows {
                let params: [&dyn ToSql; 4] = [&row.symbol, &row.date, &row.close, &row.volume];
                connection.execute(
                    "INSERT OR REPLACE INTO market_data \
                     (symbol, date, close, volume, updated_at) \
                     VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;
            }

            let row_count = rows.len() as i64;
            let params: [&dyn ToSql; 3] = [&request_id, &source_id, &row_count];
            connection.execute(
                "INSERT INTO ingest_log (request_id, symbol, row_count, status, timestamp) \
                 VALUES (?, ?, ?, 'ok', CURRENT_TIMESTAMP)",
                params.as_slice(),
            )?;

            Ok(rows.len())
        })();

        finalize_transaction(&connection, result)
    }

    /// Total row count in `market_data`.
    pub fn row_count(&self) -> Result<i64, StoreError> {
        let connection = self.writer();
        let count = connection.query_row("SELECT COUNT(*) FROM market_data", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All rows for one symbol, ordered by date.
    pub fn rows_for_symbol(&self, symbol: &str) -> Result<Vec<MarketRow>, StoreError> {
        let connection = self.writer();
        let mut statement = connection.prepare(
            "SELECT symbol, date, close, volume FROM market_data WHERE symbol = ? ORDER BY date",
        )?;
        let params: [&dyn ToSql; 1] = [&symbol];
        let rows = statement
            .query_map(params.as_slice(), |row| {
                Ok(MarketRow {
                    symbol: row.get(0)?,
                    date: row.get(1)?,
                    close: row.get(2)?,
                    volume: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of audit rows recorded for a run.
    pub fn ingest_log_count(&self, request_id: &str) -> Result<i64, StoreError> {
        let connection = self.writer();
        let params: [&dyn ToSql; 1] = [&request_id];
        let count = connection.query_row(
            "SELECT COUNT(*) FROM ingest_log WHERE request_id = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn writer(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .expect("market store mutex is not poisoned")
    }
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Resolve the tickvault home directory from environment or default.
fn resolve_tickvault_home() -> PathBuf {
    if let Some(path) = env::var_os("TICKVAULT_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tickvault");
    }

    PathBuf::from(".tickvault")
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn sample_row(symbol: &str, date: &str, close: f64) -> MarketRow {
        MarketRow {
            symbol: symbol.to_owned(),
            date: date.to_owned(),
            close,
            volume: Some(1_000),
        }
    }

    #[test]
    fn open_creates_schema() {
        let temp = tempdir().expect("tempdir");
        let store = MarketStore::open(StoreConfig::at(temp.path())).expect("store open");

        assert_eq!(store.row_count().expect("count"), 0);
    }

    #[test]
    fn persisting_the_same_key_twice_leaves_one_row() {
        let temp = tempdir().expect("tempdir");
        let store = MarketStore::open(StoreConfig::at(temp.path())).expect("store open");

        let rows = vec![sample_row("AAPL", "2026-02-20", 178.5)];
        store.persist("AAPL", "req-001", &rows).expect("first write");
        store.persist("AAPL", "req-002", &rows).expect("second write");

        assert_eq!(store.row_count().expect("count"), 1);
        let stored = store.rows_for_symbol("AAPL").expect("rows");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].close, 178.5);
    }

    #[test]
    fn replace_updates_close_for_existing_key() {
        let temp = tempdir().expect("tempdir");
        let store = MarketStore::open(StoreConfig::at(temp.path())).expect("store open");

        store
            .persist("AAPL", "req-001", &[sample_row("AAPL", "2026-02-20", 178.5)])
            .expect("first write");
        store
            .persist("AAPL", "req-002", &[sample_row("AAPL", "2026-02-20", 180.0)])
            .expect("second write");

        let stored = store.rows_for_symbol("AAPL").expect("rows");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].close, 180.0);
    }

    #[test]
    fn zero_rows_is_a_no_op_without_audit_entry() {
        let temp = tempdir().expect("tempdir");
        let store = MarketStore::open(StoreConfig::at(temp.path())).expect("store open");

        let written = store.persist("BBB", "req-001", &[]).expect("empty write");
        assert_eq!(written, 0);
        assert_eq!(store.ingest_log_count("req-001").expect("count"), 0);
    }

    #[test]
    fn each_batch_writes_one_audit_row() {
        let temp = tempdir().expect("tempdir");
        let store = MarketStore::open(StoreConfig::at(temp.path())).expect("store open");

        store
            .persist("AAPL", "req-001", &[sample_row("AAPL", "2026-02-20", 178.5)])
            .expect("write aapl");
        store
            .persist(
                "DFF",
                "req-001",
                &[
                    sample_row("DFF", "2026-02-19", 4.33),
                    sample_row("DFF", "2026-02-20", 4.35),
                ],
            )
            .expect("write dff");

        assert_eq!(store.ingest_log_count("req-001").expect("count"), 2);
        assert_eq!(store.row_count().expect("count"), 3);
    }

    #[test]
    fn data_survives_reopen() {
        let temp = tempdir().expect("tempdir");
        let config = StoreConfig::at(temp.path());

        {
            let store = MarketStore::open(config.clone()).expect("store open");
            store
                .persist("EURUSD", "req-001", &[sample_row("EURUSD", "2026-02-20", 1.08)])
                .expect("write");
        }

        let reopened = MarketStore::open(config).expect("reopen");
        assert_eq!(reopened.row_count().expect("count"), 1);
    }

    #[test]
    fn rows_come_back_ordered_by_date() {
        let temp = tempdir().expect("tempdir");
        let store = MarketStore::open(StoreConfig::at(temp.path())).expect("store open");

        store
            .persist(
                "DGS10",
                "req-001",
                &[
                    sample_row("DGS10", "2026-02-20", 4.4),
                    sample_row("DGS10", "2026-02-18", 4.2),
                    sample_row("DGS10", "2026-02-19", 4.3),
                ],
            )
            .expect("write");

        let stored = store.rows_for_symbol("DGS10").expect("rows");
        let dates: Vec<&str> = stored.iter().map(|row| row.date.as_str()).collect();
        assert_eq!(dates, vec!["2026-02-18", "2026-02-19", "2026-02-20"]);
    }
}
