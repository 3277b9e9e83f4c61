//! Fetch-if-not-covered, then persist.

use std::sync::Arc;

use crate::coverage::CoverageTracker;
use crate::data_source::DailyBarsRequest;
use crate::fetcher::{FetchOutcome, RetryingFetcher};
use crate::store::BarStore;
use crate::{parse_range, Symbol, SyncError, TradeDate};

/// What [`SyncOrchestrator::ensure_range`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// The range was already inside stored coverage; nothing was fetched.
    AlreadyCurrent,
    /// Bars were fetched and written; the count is the number of bars fetched.
    Updated(usize),
    /// The provider had no bars for the range.
    NoDataAvailable,
    Failed(SyncError),
}

impl SyncResult {
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub const fn status(&self) -> &'static str {
        match self {
            Self::AlreadyCurrent => "already_current",
            Self::Updated(_) => "updated",
            Self::NoDataAvailable => "no_data_available",
            Self::Failed(_) => "failed",
        }
    }
}

/// Coordinates coverage checks, fetching and storage for one symbol/range at a time.
#[derive(Clone)]
pub struct SyncOrchestrator {
    store: Arc<dyn BarStore>,
    coverage: CoverageTracker,
    fetcher: RetryingFetcher,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<dyn BarStore>, fetcher: RetryingFetcher) -> Self {
        Self {
            coverage: CoverageTracker::new(Arc::clone(&store)),
            store,
            fetcher,
        }
    }

    /// Validate raw input, then sync. Malformed or inverted dates fail with
    /// [`SyncError::InvalidDate`] before any storage or network access.
    pub async fn ensure_range(&self, symbol: &str, start: &str, end: &str) -> SyncResult {
        let (start, end) = match parse_range(start, end) {
            Ok(range) => range,
            Err(error) => return SyncResult::Failed(error.into()),
        };
        let symbol = match Symbol::parse(symbol) {
            Ok(symbol) => symbol,
            Err(error) => return SyncResult::Failed(error.into()),
        };

        self.ensure_dates(&symbol, start, end).await
    }

    #[tracing::instrument(skip_all, fields(symbol = %symbol, start = %start, end = %end))]
    pub async fn ensure_dates(
        &self,
        symbol: &Symbol,
        start: TradeDate,
        end: TradeDate,
    ) -> SyncResult {
        let request = match DailyBarsRequest::new(symbol.clone(), start, end) {
            Ok(request) => request,
            Err(error) => return SyncResult::Failed(error.into()),
        };

        match self.coverage.needs_fetch(symbol, start, end) {
            Ok(false) => {
                tracing::info!("range already stored");
                return SyncResult::AlreadyCurrent;
            }
            Ok(true) => {}
            Err(error) => return SyncResult::Failed(error.into()),
        }

        // A failed fetch leaves storage untouched.
        let (bars, latency) = match self.fetcher.fetch(&request).await {
            FetchOutcome::Fetched { bars, latency } => (bars, latency),
            FetchOutcome::NoData => return SyncResult::NoDataAvailable,
            FetchOutcome::Failed(error) => {
                tracing::warn!(code = error.code(), error = %error, "sync failed");
                return SyncResult::Failed(error);
            }
        };

        match self.store.record_fetch(&request, &bars, Some(latency)) {
            Ok(written) => {
                tracing::info!(
                    count = bars.len(),
                    days = written,
                    source = self.fetcher.source_name(),
                    "stored bars"
                );
                SyncResult::Updated(bars.len())
            }
            Err(error) => {
                tracing::warn!(error = %error, "storing fetched bars failed");
                SyncResult::Failed(error.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use time::Weekday;

    use super::*;
    use crate::data_source::{BarSource, SourceError};
    use crate::retry::{RecordingSleeper, RetryPolicy};
    use crate::store::InMemoryBarStore;
    use crate::Bar;

    /// Serves every day of the request with a flat bar, counting calls.
    /// With `weekdays_only`, Saturdays and Sundays have no bar.
    #[derive(Default)]
    struct DailySource {
        calls: Mutex<Vec<(String, String)>>,
        weekdays_only: bool,
    }

    impl BarSource for DailySource {
        fn name(&self) -> &'static str {
            "daily"
        }

        fn daily_bars<'a>(
            &'a self,
            request: &'a DailyBarsRequest,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<Bar>, SourceError>> + Send + 'a>> {
            self.calls
                .lock()
                .expect("lock")
                .push((request.start.format_iso(), request.end.format_iso()));
            let weekdays_only = self.weekdays_only;
            Box::pin(async move {
                let mut bars = Vec::new();
                let mut date = request.start.into_inner();
                while TradeDate::from_date(date) <= request.end {
                    let weekend = matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday);
                    if weekdays_only && weekend {
                        date = date.next_day().ok_or_else(|| SourceError::malformed("overflow"))?;
                        continue;
                    }
                    bars.push(
                        Bar::new(
                            request.symbol.clone(),
                            TradeDate::from_date(date),
                            10.0,
                            10.0,
                            10.0,
                            10.0,
                            1,
                        )
                        .map_err(|e| SourceError::malformed(e.to_string()))?,
                    );
                    date = date.next_day().ok_or_else(|| SourceError::malformed("overflow"))?;
                }
                Ok::<_, SourceError>(bars)
            })
        }
    }

    fn orchestrator(source: Arc<DailySource>) -> (SyncOrchestrator, Arc<InMemoryBarStore>) {
        let store = Arc::new(InMemoryBarStore::new());
        let fetcher = RetryingFetcher::new(source, RetryPolicy::default())
            .with_sleeper(Arc::new(RecordingSleeper::new()));
        (SyncOrchestrator::new(store.clone(), fetcher), store)
    }

    #[tokio::test]
    async fn first_sync_updates_and_second_is_current() {
        let source = Arc::new(DailySource::default());
        let (orchestrator, store) = orchestrator(source.clone());

        let first = orchestrator.ensure_range("aapl", "2024-01-01", "2024-01-05").await;
        assert_eq!(first, SyncResult::Updated(5));

        let second = orchestrator.ensure_range("AAPL", "2024-01-02", "2024-01-04").await;
        assert_eq!(second, SyncResult::AlreadyCurrent);

        assert_eq!(source.calls.lock().expect("lock").len(), 1);
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn extending_the_range_refetches_the_whole_request() {
        let source = Arc::new(DailySource::default());
        let (orchestrator, store) = orchestrator(source.clone());

        orchestrator.ensure_range("AAPL", "2024-01-01", "2024-01-05").await;
        let extended = orchestrator.ensure_range("AAPL", "2024-01-03", "2024-01-08").await;

        assert_eq!(extended, SyncResult::Updated(6));
        assert_eq!(store.len(), 8);
        assert_eq!(
            source.calls.lock().expect("lock").last().cloned(),
            Some((String::from("2024-01-03"), String::from("2024-01-08")))
        );
    }

    #[tokio::test]
    async fn weekend_bounded_range_is_current_on_repeat() {
        let source = Arc::new(DailySource {
            weekdays_only: true,
            ..DailySource::default()
        });
        let (orchestrator, store) = orchestrator(source.clone());

        let first = orchestrator.ensure_range("MSFT", "2024-06-01", "2024-06-09").await;
        let second = orchestrator.ensure_range("MSFT", "2024-06-01", "2024-06-09").await;

        assert_eq!(first, SyncResult::Updated(5));
        assert_eq!(second, SyncResult::AlreadyCurrent);
        assert_eq!(source.calls.lock().expect("lock").len(), 1);
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn weekend_only_range_is_not_recorded_as_synced() {
        let source = Arc::new(DailySource {
            weekdays_only: true,
            ..DailySource::default()
        });
        let (orchestrator, store) = orchestrator(source.clone());

        let first = orchestrator.ensure_range("MSFT", "2024-06-01", "2024-06-02").await;
        let second = orchestrator.ensure_range("MSFT", "2024-06-01", "2024-06-02").await;

        assert_eq!(first, SyncResult::NoDataAvailable);
        assert_eq!(second, SyncResult::NoDataAvailable);
        assert_eq!(source.calls.lock().expect("lock").len(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn invalid_dates_fail_before_any_io() {
        let source = Arc::new(DailySource::default());
        let (orchestrator, store) = orchestrator(source.clone());

        for (start, end) in [("2024-13-01", "2024-12-31"), ("2024-02-01", "2024-01-01"), ("", "2024-01-01")] {
            let result = orchestrator.ensure_range("AAPL", start, end).await;
            assert!(
                matches!(result, SyncResult::Failed(SyncError::InvalidDate(_))),
                "{start}..{end} gave {result:?}"
            );
        }

        assert!(source.calls.lock().expect("lock").is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn invalid_symbol_is_reported() {
        let source = Arc::new(DailySource::default());
        let (orchestrator, _store) = orchestrator(source.clone());

        let result = orchestrator.ensure_range("$$$", "2024-01-01", "2024-01-02").await;
        assert!(matches!(result, SyncResult::Failed(SyncError::InvalidSymbol(_))));
        assert!(source.calls.lock().expect("lock").is_empty());
    }

    #[test]
    fn status_labels_are_stable() {
        assert_eq!(SyncResult::AlreadyCurrent.status(), "already_current");
        assert_eq!(SyncResult::Updated(3).status(), "updated");
        assert_eq!(SyncResult::NoDataAvailable.status(), "no_data_available");
        assert!(SyncResult::Failed(SyncError::Api { status: 500 }).is_failure());
    }
}
