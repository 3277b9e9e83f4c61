use std::sync::Arc;

use crate::store::{BarStore, StoreError};
use crate::{CoverageRange, Symbol, TradeDate};

/// Decides whether a requested range is already held locally.
#[derive(Clone)]
pub struct CoverageTracker {
    store: Arc<dyn BarStore>,
}

impl CoverageTracker {
    pub fn new(store: Arc<dyn BarStore>) -> Self {
        Self { store }
    }

    pub fn needs_fetch(
        &self,
        symbol: &Symbol,
        start: TradeDate,
        end: TradeDate,
    ) -> Result<bool, StoreError> {
        let coverage = self.store.coverage(symbol)?;
        Ok(range_needs_fetch(coverage, start, end))
    }
}

/// True unless `[start, end]` lies inside the stored bounds. Holes between
/// the bounds are not looked for.
pub fn range_needs_fetch(coverage: Option<CoverageRange>, start: TradeDate, end: TradeDate) -> bool {
    coverage.map_or(true, |stored| !stored.contains(start, end))
}
