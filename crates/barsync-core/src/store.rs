//! Durable and in-memory bar storage behind one [`BarStore`] contract.
//!
//! | Implementation | Backing |
//! |----------------|---------|
//! | [`WarehouseBarStore`] | `barsync-warehouse` DuckDB file |
//! | [`InMemoryBarStore`] | `BTreeMap` keyed by `(symbol, date)` |
//!
//! Both guarantee at most one bar per `(symbol, date)`: writing a bar for a key
//! that already exists replaces it. Coverage spans stored bars and the
//! requested bounds of every fetch recorded through [`BarStore::record_fetch`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use barsync_warehouse::{
    DailyBarRecord, SymbolCoverageRecord, SyncedRangeRecord, Warehouse, WarehouseError,
};
use thiserror::Error;

use crate::data_source::DailyBarsRequest;
use crate::{Bar, CoverageRange, Symbol, SymbolCoverage, SyncError, TradeDate, ValidationError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Rejected(#[from] ValidationError),

    #[error("stored row for {symbol} is unreadable: {reason}")]
    Corrupt { symbol: String, reason: String },
}

impl From<StoreError> for SyncError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Persistent mapping `(symbol, date) -> Bar`.
pub trait BarStore: Send + Sync {
    /// Insert or replace `bars` for `symbol`; every bar must carry `symbol`.
    /// Returns the number of distinct days written. The batch is atomic.
    fn upsert_bars(&self, symbol: &Symbol, bars: &[Bar]) -> Result<usize, StoreError>;

    /// Write the bars a successful fetch returned for `request` and mark
    /// `[request.start, request.end]` as synced, in one atomic step.
    /// `latency` is how long the provider call took, when known.
    fn record_fetch(
        &self,
        request: &DailyBarsRequest,
        bars: &[Bar],
        latency: Option<Duration>,
    ) -> Result<usize, StoreError>;

    /// Outer bounds of stored bars and synced ranges for `symbol`, `None` if
    /// neither exists.
    fn coverage(&self, symbol: &Symbol) -> Result<Option<CoverageRange>, StoreError>;

    /// Stored bars with `start <= date <= end`, ascending by date.
    fn read_series(
        &self,
        symbol: &Symbol,
        start: TradeDate,
        end: TradeDate,
    ) -> Result<Vec<Bar>, StoreError>;

    /// Every stored symbol with its bounds and bar count, ordered by symbol.
    fn coverage_summary(&self) -> Result<Vec<SymbolCoverage>, StoreError>;
}

fn ensure_symbol(symbol: &Symbol, bars: &[Bar]) -> Result<(), ValidationError> {
    match bars.iter().find(|bar| &bar.symbol != symbol) {
        Some(stray) => Err(ValidationError::SymbolMismatch {
            expected: symbol.to_string(),
            found: stray.symbol.to_string(),
        }),
        None => Ok(()),
    }
}

fn ensure_range(start: TradeDate, end: TradeDate) -> Result<(), ValidationError> {
    if start > end {
        return Err(ValidationError::InvertedRange {
            start: start.format_iso(),
            end: end.format_iso(),
        });
    }
    Ok(())
}

/// [`BarStore`] over the DuckDB warehouse. Each write is logged in `ingest_log`
/// under a fresh request id; synced ranges land in `sync_ranges`.
#[derive(Clone)]
pub struct WarehouseBarStore {
    warehouse: Warehouse,
    source: String,
}

impl WarehouseBarStore {
    pub fn new(warehouse: Warehouse, source: impl Into<String>) -> Self {
        Self {
            warehouse,
            source: source.into(),
        }
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }
}

fn latency_millis(latency: Option<Duration>) -> Option<u64> {
    latency.map(|value| u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

impl BarStore for WarehouseBarStore {
    fn upsert_bars(&self, symbol: &Symbol, bars: &[Bar]) -> Result<usize, StoreError> {
        ensure_symbol(symbol, bars)?;
        let records = bars.iter().map(to_record).collect::<Vec<_>>();
        let request_id = uuid::Uuid::new_v4().to_string();

        let written = self
            .warehouse
            .ingest_daily_bars(&self.source, &request_id, &records, None)?;
        Ok(written)
    }

    fn record_fetch(
        &self,
        request: &DailyBarsRequest,
        bars: &[Bar],
        latency: Option<Duration>,
    ) -> Result<usize, StoreError> {
        ensure_symbol(&request.symbol, bars)?;
        let records = bars.iter().map(to_record).collect::<Vec<_>>();
        let request_id = uuid::Uuid::new_v4().to_string();
        let range = SyncedRangeRecord {
            symbol: request.symbol.as_str().to_owned(),
            start_date: request.start.format_iso(),
            end_date: request.end.format_iso(),
        };

        let written = self.warehouse.ingest_synced_range(
            &self.source,
            &request_id,
            &range,
            &records,
            latency_millis(latency),
        )?;
        Ok(written)
    }

    fn coverage(&self, symbol: &Symbol) -> Result<Option<CoverageRange>, StoreError> {
        let Some((min_date, max_date)) = self.warehouse.coverage_bounds(symbol.as_str())? else {
            return Ok(None);
        };

        Ok(Some(CoverageRange {
            min_date: stored_date(symbol.as_str(), &min_date)?,
            max_date: stored_date(symbol.as_str(), &max_date)?,
        }))
    }

    fn read_series(
        &self,
        symbol: &Symbol,
        start: TradeDate,
        end: TradeDate,
    ) -> Result<Vec<Bar>, StoreError> {
        ensure_range(start, end)?;
        self.warehouse
            .read_daily_bars(symbol.as_str(), &start.format_iso(), &end.format_iso())?
            .into_iter()
            .map(from_record)
            .collect()
    }

    fn coverage_summary(&self) -> Result<Vec<SymbolCoverage>, StoreError> {
        self.warehouse
            .symbol_coverage()?
            .into_iter()
            .map(from_coverage_record)
            .collect()
    }
}

fn to_record(bar: &Bar) -> DailyBarRecord {
    DailyBarRecord {
        symbol: bar.symbol.as_str().to_owned(),
        date: bar.date.format_iso(),
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        volume: bar.volume,
    }
}

fn corrupt(symbol: &str, error: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt {
        symbol: symbol.to_owned(),
        reason: error.to_string(),
    }
}

fn stored_date(symbol: &str, value: &str) -> Result<TradeDate, StoreError> {
    TradeDate::parse(value).map_err(|e| corrupt(symbol, e))
}

fn from_record(record: DailyBarRecord) -> Result<Bar, StoreError> {
    let symbol = Symbol::parse(&record.symbol).map_err(|e| corrupt(&record.symbol, e))?;
    let date = stored_date(&record.symbol, &record.date)?;
    Bar::new(
        symbol,
        date,
        record.open,
        record.high,
        record.low,
        record.close,
        record.volume,
    )
    .map_err(|e| corrupt(&record.symbol, e))
}

fn from_coverage_record(record: SymbolCoverageRecord) -> Result<SymbolCoverage, StoreError> {
    Ok(SymbolCoverage {
        symbol: Symbol::parse(&record.symbol).map_err(|e| corrupt(&record.symbol, e))?,
        first_date: stored_date(&record.symbol, &record.first_date)?,
        last_date: stored_date(&record.symbol, &record.last_date)?,
        bar_count: record.bar_count,
    })
}

/// Process-local [`BarStore`], used by tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryBarStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    bars: BTreeMap<(Symbol, TradeDate), Bar>,
    synced: BTreeMap<Symbol, CoverageRange>,
}

impl MemoryState {
    fn insert(&mut self, symbol: &Symbol, bars: &[Bar]) -> usize {
        let mut days = BTreeSet::new();
        for bar in bars {
            self.bars.insert((symbol.clone(), bar.date), bar.clone());
            days.insert(bar.date);
        }
        days.len()
    }
}

impl InMemoryBarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bars
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BarStore for InMemoryBarStore {
    fn upsert_bars(&self, symbol: &Symbol, bars: &[Bar]) -> Result<usize, StoreError> {
        ensure_symbol(symbol, bars)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.insert(symbol, bars))
    }

    fn record_fetch(
        &self,
        request: &DailyBarsRequest,
        bars: &[Bar],
        _latency: Option<Duration>,
    ) -> Result<usize, StoreError> {
        ensure_symbol(&request.symbol, bars)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let written = state.insert(&request.symbol, bars);

        let requested = CoverageRange {
            min_date: request.start,
            max_date: request.end,
        };
        let synced = match state.synced.get(&request.symbol) {
            Some(existing) => existing.widen(requested),
            None => requested,
        };
        state.synced.insert(request.symbol.clone(), synced);
        Ok(written)
    }

    fn coverage(&self, symbol: &Symbol) -> Result<Option<CoverageRange>, StoreError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut dates = state
            .bars
            .keys()
            .filter(|(stored_symbol, _)| stored_symbol == symbol)
            .map(|(_, date)| *date);

        let stored = dates.next().map(|min_date| CoverageRange {
            min_date,
            max_date: dates.last().unwrap_or(min_date),
        });
        let synced = state.synced.get(symbol).copied();

        Ok(match (stored, synced) {
            (Some(stored), Some(synced)) => Some(stored.widen(synced)),
            (stored, synced) => stored.or(synced),
        })
    }

    fn read_series(
        &self,
        symbol: &Symbol,
        start: TradeDate,
        end: TradeDate,
    ) -> Result<Vec<Bar>, StoreError> {
        ensure_range(start, end)?;
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let bars = state
            .bars
            .range((symbol.clone(), start)..=(symbol.clone(), end))
            .map(|(_, bar)| bar.clone())
            .collect();
        Ok(bars)
    }

    fn coverage_summary(&self) -> Result<Vec<SymbolCoverage>, StoreError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut summary: Vec<SymbolCoverage> = Vec::new();
        for (symbol, date) in state.bars.keys() {
            match summary.last_mut() {
                Some(entry) if &entry.symbol == symbol => {
                    entry.last_date = *date;
                    entry.bar_count += 1;
                }
                _ => summary.push(SymbolCoverage {
                    symbol: symbol.clone(),
                    first_date: *date,
                    last_date: *date,
                    bar_count: 1,
                }),
            }
        }
        Ok(summary)
    }
}
