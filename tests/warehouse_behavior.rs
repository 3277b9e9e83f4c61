//! Behavior-driven tests for the bar warehouse
//!
//! These tests verify what a user sees after bars land in DuckDB: one row per
//! trading day, durable coverage, and batches that either fully commit or
//! leave storage untouched.

use std::sync::Arc;
use std::thread;

use barsync_core::{
    Bar, BarStore, StoreError, Symbol, SymbolCoverage, TradeDate, ValidationError, Warehouse,
    WarehouseBarStore, WarehouseConfig,
};
use barsync_warehouse::DailyBarRecord;
use tempfile::tempdir;

fn open(home: &std::path::Path) -> Warehouse {
    Warehouse::open(WarehouseConfig {
        barsync_home: home.to_path_buf(),
        db_path: home.join("warehouse.duckdb"),
        max_pool_size: 2,
    })
    .expect("warehouse open")
}

fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("symbol")
}

fn day(value: &str) -> TradeDate {
    TradeDate::parse(value).expect("date")
}

fn bar(ticker: &str, date: &str, close: f64) -> Bar {
    Bar::new(
        symbol(ticker),
        day(date),
        close - 1.0,
        close + 2.0,
        close - 2.0,
        close,
        1_000_000,
    )
    .expect("bar")
}

// =============================================================================
// Warehouse: Upserts
// =============================================================================

#[test]
fn when_user_syncs_the_same_days_twice_each_day_is_stored_once() {
    // Given: A warehouse holding three AAPL days
    let temp = tempdir().expect("tempdir");
    let store = WarehouseBarStore::new(open(temp.path()), "polygon");
    let aapl = symbol("AAPL");
    let first = vec![
        bar("AAPL", "2024-01-02", 185.64),
        bar("AAPL", "2024-01-03", 184.25),
        bar("AAPL", "2024-01-04", 181.91),
    ];
    store.upsert_bars(&aapl, &first).expect("first write");

    // When: An overlapping batch arrives with a restated close
    let second = vec![
        bar("AAPL", "2024-01-04", 182.10),
        bar("AAPL", "2024-01-05", 181.18),
    ];
    let written = store.upsert_bars(&aapl, &second).expect("second write");

    // Then: Four distinct days exist and the restated close wins
    assert_eq!(written, 2);
    assert_eq!(store.warehouse().bar_count("AAPL").expect("count"), 4);
    let stored = store
        .read_series(&aapl, day("2024-01-04"), day("2024-01-04"))
        .expect("read");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].close, 182.10);
}

#[test]
fn when_a_batch_contains_another_symbol_nothing_is_written() {
    // Given: A fresh warehouse
    let temp = tempdir().expect("tempdir");
    let store = WarehouseBarStore::new(open(temp.path()), "polygon");

    // When: An AAPL write carries an MSFT bar
    let error = store
        .upsert_bars(
            &symbol("AAPL"),
            &[bar("AAPL", "2024-01-02", 185.64), bar("MSFT", "2024-01-02", 370.87)],
        )
        .expect_err("mixed batch must fail");

    // Then: The write is rejected before storage
    assert!(matches!(
        error,
        StoreError::Rejected(ValidationError::SymbolMismatch { .. })
    ));
    assert!(store.coverage_summary().expect("summary").is_empty());
}

#[test]
fn when_a_record_has_an_impossible_date_the_whole_batch_rolls_back() {
    // Given: A warehouse written through the raw record API
    let temp = tempdir().expect("tempdir");
    let warehouse = open(temp.path());
    let good = DailyBarRecord {
        symbol: String::from("MSFT"),
        date: String::from("2024-01-02"),
        open: 373.86,
        high: 375.90,
        low: 366.77,
        close: 370.87,
        volume: 25_258_600,
    };
    let bad = DailyBarRecord {
        date: String::from("2024-02-30"),
        ..good.clone()
    };

    // When: The batch includes the bad row
    let result = warehouse.ingest_daily_bars("polygon", "req-rollback", &[good, bad], None);

    // Then: Neither row is stored
    assert!(result.is_err());
    assert_eq!(warehouse.bar_count("MSFT").expect("count"), 0);
    assert_eq!(warehouse.coverage_bounds("MSFT").expect("bounds"), None);
}

// =============================================================================
// Warehouse: Coverage and durability
// =============================================================================

#[test]
fn when_user_reopens_the_database_coverage_is_unchanged() {
    // Given: Bars written and the warehouse closed
    let temp = tempdir().expect("tempdir");
    {
        let store = WarehouseBarStore::new(open(temp.path()), "polygon");
        store
            .upsert_bars(
                &symbol("MSFT"),
                &[bar("MSFT", "2024-01-02", 370.87), bar("MSFT", "2024-01-05", 367.75)],
            )
            .expect("write");
    }

    // When: The same file is opened again
    let store = WarehouseBarStore::new(open(temp.path()), "polygon");

    // Then: Coverage and bars survive
    let coverage = store
        .coverage(&symbol("MSFT"))
        .expect("coverage")
        .expect("stored");
    assert_eq!(coverage.min_date, day("2024-01-02"));
    assert_eq!(coverage.max_date, day("2024-01-05"));
    assert_eq!(
        store
            .read_series(&symbol("MSFT"), coverage.min_date, coverage.max_date)
            .expect("read")
            .len(),
        2
    );
}

#[test]
fn summary_lists_every_symbol_in_order_with_counts() {
    let temp = tempdir().expect("tempdir");
    let store = WarehouseBarStore::new(open(temp.path()), "polygon");
    store
        .upsert_bars(&symbol("MSFT"), &[bar("MSFT", "2024-01-02", 370.87)])
        .expect("msft");
    store
        .upsert_bars(
            &symbol("AAPL"),
            &[bar("AAPL", "2024-01-02", 185.64), bar("AAPL", "2024-01-03", 184.25)],
        )
        .expect("aapl");

    let summary = store.coverage_summary().expect("summary");

    assert_eq!(
        summary,
        vec![
            SymbolCoverage {
                symbol: symbol("AAPL"),
                first_date: day("2024-01-02"),
                last_date: day("2024-01-03"),
                bar_count: 2,
            },
            SymbolCoverage {
                symbol: symbol("MSFT"),
                first_date: day("2024-01-02"),
                last_date: day("2024-01-02"),
                bar_count: 1,
            },
        ]
    );
}

#[test]
fn unknown_symbol_has_no_coverage_and_an_empty_series() {
    let temp = tempdir().expect("tempdir");
    let store = WarehouseBarStore::new(open(temp.path()), "polygon");

    assert_eq!(store.coverage(&symbol("NVDA")).expect("coverage"), None);
    assert!(store
        .read_series(&symbol("NVDA"), day("2024-01-01"), day("2024-12-31"))
        .expect("read")
        .is_empty());
}

#[test]
fn inverted_read_range_is_rejected() {
    let temp = tempdir().expect("tempdir");
    let store = WarehouseBarStore::new(open(temp.path()), "polygon");

    let error = store
        .read_series(&symbol("AAPL"), day("2024-02-01"), day("2024-01-01"))
        .expect_err("must fail");

    assert!(matches!(
        error,
        StoreError::Rejected(ValidationError::InvertedRange { .. })
    ));
}

// =============================================================================
// Warehouse: Concurrency
// =============================================================================

#[test]
fn when_symbols_are_synced_from_several_threads_all_writes_land() {
    // Given: One store shared across threads
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(WarehouseBarStore::new(open(temp.path()), "polygon"));

    // When: Each thread writes its own symbol
    let handles: Vec<_> = ["AAPL", "MSFT", "NVDA", "AMZN"]
        .into_iter()
        .map(|ticker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let bars = [
                    bar(ticker, "2024-01-02", 100.0),
                    bar(ticker, "2024-01-03", 101.0),
                ];
                store.upsert_bars(&symbol(ticker), &bars).expect("write")
            })
        })
        .collect();
    let written: usize = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .sum();

    // Then: Every bar is stored
    assert_eq!(written, 8);
    let summary = store.coverage_summary().expect("summary");
    assert_eq!(summary.len(), 4);
    assert!(summary.iter().all(|row| row.bar_count == 2));
}
