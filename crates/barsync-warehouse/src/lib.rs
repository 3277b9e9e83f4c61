//! # Barsync Warehouse
//!
//! DuckDB-backed storage for daily OHLCV bars.
//!
//! ## Overview
//!
//! The warehouse keeps one row per `(symbol, date)` in `daily_bars`. The pair is the
//! table's primary key and every write goes through `INSERT OR REPLACE`, so writing
//! the same bars twice leaves exactly one row per trading day.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use barsync_warehouse::{DailyBarRecord, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!
//!     let bars = vec![DailyBarRecord {
//!         symbol: "AAPL".to_string(),
//!         date: "2024-01-02".to_string(),
//!         open: 187.15,
//!         high: 188.44,
//!         low: 183.89,
//!         close: 185.64,
//!         volume: 82_488_674,
//!     }];
//!     warehouse.ingest_daily_bars("polygon", "req-0001", &bars, Some(120))?;
//!
//!     let bounds = warehouse.coverage_bounds("AAPL")?;
//!     println!("{bounds:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `daily_bars` | Daily bars keyed by `(symbol, date)` |
//! | `ingest_log` | Ingestion audit log |
//! | `sync_ranges` | Requested ranges that were fetched successfully |
//! | `schema_migrations` | Applied migration versions |
//!
//! ## Views
//!
//! | View | Description |
//! |------|-------------|
//! | `vw_symbol_coverage` | First/last stored date and bar count per symbol |

pub mod duckdb;
pub mod migrations;
pub mod views;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::Connection;
use ::duckdb::ToSql;
use thiserror::Error;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Dataset name recorded in `ingest_log` for daily bars.
pub const DAILY_BARS_DATASET: &str = "bars_1d";

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Request was rejected before reaching the database.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for barsync data.
    pub barsync_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::for_home(resolve_barsync_home())
    }
}

impl WarehouseConfig {
    /// Configuration rooted at `barsync_home`, with the database in `cache/`.
    pub fn for_home(barsync_home: impl Into<PathBuf>) -> Self {
        let barsync_home = barsync_home.into();
        let db_path = barsync_home.join("cache").join("warehouse.duckdb");
        Self {
            barsync_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// One daily bar as stored in `daily_bars`.
///
/// Dates travel as ISO `YYYY-MM-DD` strings and are cast to `DATE` by the
/// database, so a malformed date fails the write instead of being stored.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBarRecord {
    /// Ticker symbol.
    pub symbol: String,
    /// Trading date as `YYYY-MM-DD`.
    pub date: String,
    /// Opening price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume.
    pub volume: u64,
}

/// A requested `[start_date, end_date]` that was fetched successfully.
///
/// Dates are ISO `YYYY-MM-DD` strings, like [`DailyBarRecord::date`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedRangeRecord {
    pub symbol: String,
    pub start_date: String,
    pub end_date: String,
}

/// A row of `vw_symbol_coverage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolCoverageRecord {
    pub symbol: String,
    pub first_date: String,
    pub last_date: String,
    pub bar_count: u64,
}

/// The main warehouse interface for daily bar storage.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager =
            DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        tracing::debug!(db_path = %warehouse.db_path().display(), "warehouse opened");
        Ok(warehouse)
    }

    /// Initialize database schema and views.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Write daily bars, replacing any row that already exists for the same
    /// `(symbol, date)`. The whole batch commits or rolls back together.
    ///
    /// Returns the number of bars written. Bars repeated inside `rows` are
    /// written once per distinct key, last one wins.
    ///
    /// # Security
    /// All user-provided values are passed as query parameters.
    pub fn ingest_daily_bars(
        &self,
        source: &str,
        request_id: &str,
        rows: &[DailyBarRecord],
        latency_ms: Option<u64>,
    ) -> Result<usize, WarehouseError> {
        self.ingest(source, request_id, None, rows, latency_ms)
    }

    /// Same as [`Warehouse::ingest_daily_bars`], and also records `range` in
    /// `sync_ranges` inside the same transaction, so later coverage checks
    /// include requested days the provider had no bar for.
    pub fn ingest_synced_range(
        &self,
        source: &str,
        request_id: &str,
        range: &SyncedRangeRecord,
        rows: &[DailyBarRecord],
        latency_ms: Option<u64>,
    ) -> Result<usize, WarehouseError> {
        if range.start_date > range.end_date {
            return Err(WarehouseError::Rejected(format!(
                "range start {} is after end {}",
                range.start_date, range.end_date
            )));
        }
        self.ingest(source, request_id, Some(range), rows, latency_ms)
    }

    fn ingest(
        &self,
        source: &str,
        request_id: &str,
        range: Option<&SyncedRangeRecord>,
        rows: &[DailyBarRecord],
        latency_ms: Option<u64>,
    ) -> Result<usize, WarehouseError> {
        if rows.is_empty() && range.is_none() {
            return Ok(0);
        }

        let rows = last_per_key(rows);
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            for row in &rows {
                let params: [&dyn ToSql; 8] = [
                    &row.symbol,
                    &row.date,
                    &row.open,
                    &row.high,
                    &row.low,
                    &row.close,
                    &row.volume,
                    &source,
                ];
                connection.execute(
                    "INSERT OR REPLACE INTO daily_bars \
                     (symbol, date, open, high, low, close, volume, source, updated_at) \
                     VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;

                let params: [&dyn ToSql; 5] = [
                    &request_id,
                    &row.symbol,
                    &source,
                    &DAILY_BARS_DATASET,
                    &latency_ms,
                ];
                connection.execute(
                    "INSERT INTO ingest_log \
                     (request_id, symbol, source, dataset, status, latency_ms, timestamp) \
                     VALUES (?, ?, ?, ?, 'ok', ?, CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;
            }

            if let Some(range) = range {
                let params: [&dyn ToSql; 4] =
                    [&range.symbol, &range.start_date, &range.end_date, &request_id];
                connection.execute(
                    "INSERT INTO sync_ranges (symbol, start_date, end_date, request_id, recorded_at) \
                     VALUES (?, CAST(? AS DATE), CAST(? AS DATE), ?, CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;
            }

            Ok(rows.len())
        })();

        let written = finalize_transaction(&connection, result)?;
        tracing::debug!(source, request_id, written, "daily bars ingested");
        Ok(written)
    }

    /// Earliest and latest covered dates for `symbol`: stored bars plus the
    /// bounds of every recorded sync range. `None` when neither exists.
    pub fn coverage_bounds(
        &self,
        symbol: &str,
    ) -> Result<Option<(String, String)>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 3] = [&symbol, &symbol, &symbol];
        let (min_date, max_date) = connection.query_row(
            "SELECT CAST(MIN(day) AS VARCHAR), CAST(MAX(day) AS VARCHAR) FROM ( \
                 SELECT date AS day FROM daily_bars WHERE symbol = ? \
                 UNION ALL SELECT start_date FROM sync_ranges WHERE symbol = ? \
                 UNION ALL SELECT end_date FROM sync_ranges WHERE symbol = ? \
             )",
            params.as_slice(),
            |row| {
                let min_date: Option<String> = row.get(0)?;
                let max_date: Option<String> = row.get(1)?;
                Ok((min_date, max_date))
            },
        )?;

        Ok(min_date.zip(max_date))
    }

    /// Bars for `symbol` between `start` and `end` inclusive, ascending by date.
    pub fn read_daily_bars(
        &self,
        symbol: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<DailyBarRecord>, WarehouseError> {
        if start > end {
            return Err(WarehouseError::Rejected(format!(
                "range start {start} is after end {end}"
            )));
        }

        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT symbol, CAST(date AS VARCHAR), open, high, low, close, volume \
             FROM daily_bars \
             WHERE symbol = ? AND date BETWEEN CAST(? AS DATE) AND CAST(? AS DATE) \
             ORDER BY date ASC",
        )?;
        let params: [&dyn ToSql; 3] = [&symbol, &start, &end];
        let rows = statement.query_map(params.as_slice(), read_daily_bar)?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Number of stored bars for `symbol`.
    pub fn bar_count(&self, symbol: &str) -> Result<u64, WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 1] = [&symbol];
        let count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM daily_bars WHERE symbol = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Coverage of every stored symbol, ordered by symbol.
    pub fn symbol_coverage(&self) -> Result<Vec<SymbolCoverageRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT symbol, CAST(first_date AS VARCHAR), CAST(last_date AS VARCHAR), bar_count \
             FROM vw_symbol_coverage ORDER BY symbol",
        )?;
        let rows = statement.query_map([], |row| {
            let bar_count: i64 = row.get(3)?;
            Ok(SymbolCoverageRecord {
                symbol: row.get(0)?,
                first_date: row.get(1)?,
                last_date: row.get(2)?,
                bar_count: u64::try_from(bar_count).unwrap_or_default(),
            })
        })?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn read_daily_bar(row: &::duckdb::Row<'_>) -> Result<DailyBarRecord, ::duckdb::Error> {
    Ok(DailyBarRecord {
        symbol: row.get(0)?,
        date: row.get(1)?,
        open: row.get(2)?,
        high: row.get(3)?,
        low: row.get(4)?,
        close: row.get(5)?,
        volume: row.get(6)?,
    })
}

/// Keep the last record for every `(symbol, date)` key, preserving first-seen order.
fn last_per_key(rows: &[DailyBarRecord]) -> Vec<&DailyBarRecord> {
    let mut slots: HashMap<(&str, &str), usize> = HashMap::with_capacity(rows.len());
    let mut kept: Vec<&DailyBarRecord> = Vec::with_capacity(rows.len());
    for row in rows {
        match slots.entry((row.symbol.as_str(), row.date.as_str())) {
            Entry::Occupied(slot) => kept[*slot.get()] = row,
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(row);
            }
        }
    }
    kept
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
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

/// Resolve the barsync home directory from environment or default.
fn resolve_barsync_home() -> PathBuf {
    if let Some(path) = env::var_os("BARSYNC_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".barsync");
    }

    PathBuf::from(".barsync")
}
