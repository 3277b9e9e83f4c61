//! Relative Strength Index over stored closes.
//!
//! The averages are plain rolling means of the last `period` gains and losses
//! (not Wilder smoothing). With `period = 14` the first value lands on the
//! 15th close; earlier closes have no RSI.
//!
//! | avg gain | avg loss | RSI |
//! |----------|----------|-----|
//! | any | > 0 | `100 - 100 / (1 + gain / loss)` |
//! | > 0 | 0 | `100` |
//! | 0 | 0 | undefined (`None`) |

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::store::{BarStore, StoreError};
use crate::{Symbol, TradeDate, ValidationError};

pub const DEFAULT_RSI_PERIOD: usize = 14;

/// One close and its RSI. `rsi` is `None` when every change in the window is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RsiPoint {
    pub date: TradeDate,
    pub close: f64,
    pub rsi: Option<f64>,
}

/// RSI for each close from index `period` on.
///
/// `series` is sorted by date before use. Fewer than `period + 1` closes
/// yields an empty result.
pub fn compute_rsi(
    series: &[(TradeDate, f64)],
    period: usize,
) -> Result<Vec<RsiPoint>, ValidationError> {
    if period == 0 {
        return Err(ValidationError::InvalidPeriod);
    }
    if series.len() <= period {
        return Ok(Vec::new());
    }

    let mut ordered = series.to_vec();
    ordered.sort_by_key(|(date, _)| *date);

    let (gains, losses): (Vec<f64>, Vec<f64>) = ordered
        .windows(2)
        .map(|pair| {
            let change = pair[1].1 - pair[0].1;
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    // Window `k` of changes ends at close `k + period`. Sums are recomputed per
    // window, never carried, so flat runs average to exactly zero.
    let divisor = period as f64;
    let points = gains
        .windows(period)
        .zip(losses.windows(period))
        .zip(&ordered[period..])
        .map(|((gain_window, loss_window), &(date, close))| {
            let avg_gain = gain_window.iter().sum::<f64>() / divisor;
            let avg_loss = loss_window.iter().sum::<f64>() / divisor;
            RsiPoint {
                date,
                close,
                rsi: rsi_value(avg_gain, avg_loss),
            }
        })
        .collect();

    Ok(points)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        return (avg_gain > 0.0).then_some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads close series from a [`BarStore`] and derives indicators from them.
#[derive(Clone)]
pub struct IndicatorEngine {
    store: Arc<dyn BarStore>,
}

impl IndicatorEngine {
    pub fn new(store: Arc<dyn BarStore>) -> Self {
        Self { store }
    }

    /// RSI over stored closes for `symbol`. Missing bounds default to the
    /// symbol's stored coverage; an unknown symbol gives an empty result, as
    /// does a given bound that falls outside that coverage.
    pub fn rsi_series(
        &self,
        symbol: &Symbol,
        start: Option<TradeDate>,
        end: Option<TradeDate>,
        period: usize,
    ) -> Result<Vec<RsiPoint>, IndicatorError> {
        if period == 0 {
            return Err(ValidationError::InvalidPeriod.into());
        }

        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            (start, end) => {
                let Some(coverage) = self.store.coverage(symbol)? else {
                    return Ok(Vec::new());
                };
                let start = start.unwrap_or(coverage.min_date);
                let end = end.unwrap_or(coverage.max_date);
                if start > end {
                    return Ok(Vec::new());
                }
                (start, end)
            }
        };

        let closes: Vec<(TradeDate, f64)> = self
            .store
            .read_series(symbol, start, end)?
            .into_iter()
            .map(|bar| (bar.date, bar.close))
            .collect();

        tracing::debug!(symbol = %symbol, closes = closes.len(), period, "computing rsi");
        Ok(compute_rsi(&closes, period)?)
    }
}
