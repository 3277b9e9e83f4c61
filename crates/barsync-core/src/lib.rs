//! # Barsync Core
//!
//! Incremental synchronization of daily OHLCV bars, plus RSI over the stored
//! closes.
//!
//! ## Overview
//!
//! A caller asks for `(symbol, start, end)`. If the stored bounds for the symbol
//! already contain the range nothing happens; otherwise the range is fetched
//! from the provider (retrying transport failures) and written idempotently.
//!
//! - **Domain models** with validation at construction
//! - **Bar store** contract over the DuckDB warehouse or an in-memory map
//! - **Coverage tracking** by min/max over stored bars and synced ranges
//! - **Retrying fetcher** with a fixed delay and an injectable sleeper
//! - **Sync orchestrator** returning a four-way [`SyncResult`]
//! - **Indicators**: simple-mean RSI
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Polygon aggregates adapter |
//! | [`coverage`] | Covered-range check |
//! | [`data_source`] | [`BarSource`] trait, requests and source errors |
//! | [`domain`] | Symbol, date, bar and coverage types |
//! | [`error`] | Validation and sync errors |
//! | [`fetcher`] | Retrying fetch |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`indicators`] | RSI |
//! | [`retry`] | Retry policy and sleepers |
//! | [`store`] | [`BarStore`] and its implementations |
//! | [`sync`] | [`SyncOrchestrator`] |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use barsync_core::{
//!     PolygonAdapter, RetryPolicy, RetryingFetcher, SyncOrchestrator, SyncResult, Warehouse,
//!     WarehouseBarStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(WarehouseBarStore::new(Warehouse::open_default()?, "polygon"));
//!     let fetcher = RetryingFetcher::new(Arc::new(PolygonAdapter::default()), RetryPolicy::default());
//!     let orchestrator = SyncOrchestrator::new(store, fetcher);
//!
//!     match orchestrator.ensure_range("AAPL", "2024-01-01", "2024-03-31").await {
//!         SyncResult::Updated(count) => println!("stored {count} bars"),
//!         other => println!("{other:?}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ SyncOrchestrator │
//! └──┬──────────┬────┘
//!    │          │
//!    ▼          ▼
//! ┌──────────┐ ┌────────────────┐     ┌─────────────┐
//! │ Coverage │ │ RetryingFetcher│────▶│ BarSource   │──▶ HttpClient
//! │ Tracker  │ └────────────────┘     │ (Polygon)   │
//! └──┬───────┘                        └─────────────┘
//!    ▼
//! ┌──────────┐     ┌─────────────────┐
//! │ BarStore │◀────│ IndicatorEngine │
//! └──────────┘     └─────────────────┘
//! ```
//!
//! ## Security
//!
//! - The Polygon API key is read from the environment and sent as a bearer
//!   header, never in the URL
//! - Storage writes use bound parameters only

pub mod adapters;
pub mod coverage;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod indicators;
pub mod retry;
pub mod store;
pub mod sync;

pub use adapters::{PolygonAdapter, PolygonConfig};

pub use coverage::{range_needs_fetch, CoverageTracker};

pub use data_source::{BarSource, DailyBarsRequest, SourceError, SourceErrorKind};

pub use domain::{parse_range, Bar, CoverageRange, Symbol, SymbolCoverage, TradeDate};

pub use error::{SyncError, ValidationError};

pub use fetcher::{FetchOutcome, RetryingFetcher};

pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
};

pub use indicators::{compute_rsi, IndicatorEngine, IndicatorError, RsiPoint, DEFAULT_RSI_PERIOD};

pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};

pub use store::{BarStore, InMemoryBarStore, StoreError, WarehouseBarStore};

pub use sync::{SyncOrchestrator, SyncResult};

// Re-exported from barsync-warehouse
pub use barsync_warehouse::{Warehouse, WarehouseConfig, WarehouseError};
