//! # Domain Models
//!
//! Validated value types shared by the store, fetcher and indicator code.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Upper-cased ticker |
//! | [`TradeDate`] | Calendar date, `YYYY-MM-DD` |
//! | [`Bar`] | One day of OHLCV data |
//! | [`CoverageRange`] | Stored min/max dates for a symbol |
//! | [`SymbolCoverage`] | Coverage bounds plus bar count |
//!
//! Construction checks every invariant, so a [`Bar`] with `high < low` or a
//! date like `2024-02-30` cannot exist:
//!
//! ```rust
//! use barsync_core::{Bar, Symbol, TradeDate, ValidationError};
//!
//! let symbol = Symbol::parse("aapl").unwrap();
//! let date = TradeDate::parse("2024-01-02").unwrap();
//! let invalid = Bar::new(symbol, date, 100.0, 95.0, 105.0, 102.0, 1_000);
//! assert!(matches!(invalid, Err(ValidationError::InvalidBarRange)));
//! ```

mod date;
mod models;
mod symbol;

pub use date::{parse_range, TradeDate};
pub use models::{Bar, CoverageRange, SymbolCoverage};
pub use symbol::Symbol;
