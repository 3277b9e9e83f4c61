use serde::{Deserialize, Serialize};

use crate::{Symbol, TradeDate, ValidationError};

/// One trading day of OHLCV data for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: Symbol,
    pub date: TradeDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        symbol: Symbol,
        date: TradeDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_price("open", open)?;
        validate_price("high", high)?;
        validate_price("low", low)?;
        validate_price("close", close)?;

        // Open and close are not clamped to [low, high]; providers occasionally
        // report them a tick outside and those rows are kept as delivered.
        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        Ok(Self {
            symbol,
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Earliest and latest covered dates for one symbol.
///
/// The bounds span stored bars and the requested ranges of successful syncs.
/// Days missing in between are not detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRange {
    pub min_date: TradeDate,
    pub max_date: TradeDate,
}

impl CoverageRange {
    /// True when `[start, end]` lies entirely inside the stored bounds.
    pub fn contains(&self, start: TradeDate, end: TradeDate) -> bool {
        start >= self.min_date && end <= self.max_date
    }

    /// Smallest range holding both `self` and `other`.
    pub fn widen(self, other: Self) -> Self {
        Self {
            min_date: self.min_date.min(other.min_date),
            max_date: self.max_date.max(other.max_date),
        }
    }
}

/// Per-symbol storage summary: bounds plus number of stored bars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCoverage {
    pub symbol: Symbol,
    pub first_date: TradeDate,
    pub last_date: TradeDate,
    pub bar_count: u64,
}

fn validate_price(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
