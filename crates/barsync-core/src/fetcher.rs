use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::data_source::{BarSource, DailyBarsRequest, SourceErrorKind};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::{Bar, SyncError};

/// Result of one fetch, after any retries.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Non-empty bars, ascending by date, and how long the successful call took.
    Fetched { bars: Vec<Bar>, latency: Duration },
    /// The provider answered successfully but had nothing for the range.
    NoData,
    /// `Api`, `Network` or `MalformedResponse`.
    Failed(SyncError),
}

/// Calls a [`BarSource`], retrying transport failures with a fixed delay.
///
/// Status errors and unparseable bodies are returned on first occurrence;
/// an empty answer is returned as [`FetchOutcome::NoData`] without retrying.
#[derive(Clone)]
pub struct RetryingFetcher {
    source: Arc<dyn BarSource>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingFetcher {
    pub fn new(source: Arc<dyn BarSource>, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub async fn fetch(&self, request: &DailyBarsRequest) -> FetchOutcome {
        self.fetch_with_policy(request, self.policy).await
    }

    pub async fn fetch_with_policy(
        &self,
        request: &DailyBarsRequest,
        policy: RetryPolicy,
    ) -> FetchOutcome {
        let mut attempt = 1;

        loop {
            let started = Instant::now();
            let result = self.source.daily_bars(request).await;
            let latency = started.elapsed();

            let error = match result {
                Ok(bars) if bars.is_empty() => {
                    tracing::info!(
                        symbol = %request.symbol,
                        start = %request.start,
                        end = %request.end,
                        attempt,
                        "provider has no bars for range"
                    );
                    return FetchOutcome::NoData;
                }
                Ok(bars) => {
                    tracing::debug!(
                        symbol = %request.symbol,
                        count = bars.len(),
                        attempt,
                        latency_ms = millis(latency),
                        "fetched bars"
                    );
                    return FetchOutcome::Fetched { bars, latency };
                }
                Err(error) => error,
            };

            if error.retryable() && policy.allows_attempt_after(attempt) {
                tracing::warn!(
                    symbol = %request.symbol,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = millis(policy.delay),
                    error = %error,
                    "transport failure, retrying"
                );
                self.sleeper.sleep(policy.delay).await;
                attempt += 1;
                continue;
            }

            let failure = match error.kind() {
                SourceErrorKind::Status => SyncError::Api {
                    status: error.http_status().unwrap_or_default(),
                },
                SourceErrorKind::Malformed => {
                    SyncError::MalformedResponse(error.message().to_owned())
                }
                SourceErrorKind::Transport => SyncError::Network {
                    attempts: attempt,
                    message: error.message().to_owned(),
                },
            };
            tracing::warn!(
                symbol = %request.symbol,
                attempts = attempt,
                code = failure.code(),
                error = %error,
                "fetch failed"
            );
            return FetchOutcome::Failed(failure);
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::data_source::SourceError;
    use crate::retry::RecordingSleeper;
    use crate::{Symbol, TradeDate};

    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<Bar>, SourceError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<Bar>, SourceError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().expect("lock")
        }
    }

    impl BarSource for ScriptedSource {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn daily_bars<'a>(
            &'a self,
            _request: &'a DailyBarsRequest,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<Bar>, SourceError>> + Send + 'a>> {
            *self.calls.lock().expect("lock") += 1;
            let next = self
                .script
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::transport("script exhausted")));
            Box::pin(async move { next })
        }
    }

    fn request() -> DailyBarsRequest {
        DailyBarsRequest::new(
            Symbol::parse("AAPL").expect("symbol"),
            TradeDate::parse("2024-01-02").expect("date"),
            TradeDate::parse("2024-01-05").expect("date"),
        )
        .expect("request")
    }

    fn bar(date: &str) -> Bar {
        Bar::new(
            Symbol::parse("AAPL").expect("symbol"),
            TradeDate::parse(date).expect("date"),
            10.0,
            11.0,
            9.0,
            10.5,
            100,
        )
        .expect("bar")
    }

    fn fetcher(source: Arc<ScriptedSource>, sleeper: Arc<RecordingSleeper>) -> RetryingFetcher {
        RetryingFetcher::new(source, RetryPolicy::default()).with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn returns_bars_on_first_success() {
        let source = ScriptedSource::new(vec![Ok(vec![bar("2024-01-02")])]);
        let sleeper = Arc::new(RecordingSleeper::new());

        let outcome = fetcher(source.clone(), sleeper.clone()).fetch(&request()).await;

        let FetchOutcome::Fetched { bars, .. } = outcome else {
            panic!("expected bars, got {outcome:?}");
        };
        assert_eq!(bars, vec![bar("2024-01-02")]);
        assert_eq!(source.calls(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn empty_answer_is_no_data_without_retry() {
        let source = ScriptedSource::new(vec![Ok(Vec::new())]);
        let sleeper = Arc::new(RecordingSleeper::new());

        let outcome = fetcher(source.clone(), sleeper.clone()).fetch(&request()).await;

        assert_eq!(outcome, FetchOutcome::NoData);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn status_error_fails_immediately() {
        let source = ScriptedSource::new(vec![Err(SourceError::status(500))]);
        let sleeper = Arc::new(RecordingSleeper::new());

        let outcome = fetcher(source.clone(), sleeper.clone()).fetch(&request()).await;

        assert_eq!(outcome, FetchOutcome::Failed(SyncError::Api { status: 500 }));
        assert_eq!(source.calls(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn transport_errors_are_retried_until_success() {
        let source = ScriptedSource::new(vec![
            Err(SourceError::transport("reset")),
            Err(SourceError::transport("reset")),
            Ok(vec![bar("2024-01-03")]),
        ]);
        let sleeper = Arc::new(RecordingSleeper::new());

        let outcome = fetcher(source.clone(), sleeper.clone()).fetch(&request()).await;

        let FetchOutcome::Fetched { bars, .. } = outcome else {
            panic!("expected bars, got {outcome:?}");
        };
        assert_eq!(bars, vec![bar("2024-01-03")]);
        assert_eq!(source.calls(), 3);
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(5); 2]);
    }

    #[tokio::test]
    async fn exhausted_attempts_report_network_error() {
        let source = ScriptedSource::new(vec![
            Err(SourceError::transport("timeout")),
            Err(SourceError::transport("timeout")),
            Err(SourceError::transport("timeout")),
        ]);
        let sleeper = Arc::new(RecordingSleeper::new());

        let outcome = fetcher(source.clone(), sleeper.clone()).fetch(&request()).await;

        assert_eq!(
            outcome,
            FetchOutcome::Failed(SyncError::Network {
                attempts: 3,
                message: String::from("timeout"),
            })
        );
        assert_eq!(source.calls(), 3);
        assert_eq!(sleeper.total(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn malformed_body_is_not_retried() {
        let source = ScriptedSource::new(vec![Err(SourceError::malformed("bad json"))]);
        let sleeper = Arc::new(RecordingSleeper::new());

        let outcome = fetcher(source.clone(), sleeper).fetch(&request()).await;

        assert!(matches!(
            outcome,
            FetchOutcome::Failed(SyncError::MalformedResponse(_))
        ));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn explicit_policy_overrides_configured_one() {
        let source = ScriptedSource::new(vec![Err(SourceError::transport("down"))]);
        let sleeper = Arc::new(RecordingSleeper::new());

        let outcome = fetcher(source.clone(), sleeper.clone())
            .fetch_with_policy(&request(), RetryPolicy::no_retry())
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::Failed(SyncError::Network { attempts: 1, .. })
        ));
        assert_eq!(source.calls(), 1);
        assert!(sleeper.delays().is_empty());
    }
}
