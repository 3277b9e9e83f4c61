use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::data_source::{BarSource, DailyBarsRequest, SourceError};
use crate::http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpRequest, ReqwestHttpClient,
};
use crate::{Bar, Symbol, TradeDate};

const DEFAULT_BASE_URL: &str = "https://api.polygon.io";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const MAX_AGGREGATES_PER_PAGE: u32 = 50_000;

/// Connection settings for the Polygon aggregates endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolygonConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for PolygonConfig {
    /// Reads `BARSYNC_POLYGON_API_KEY` and `BARSYNC_POLYGON_BASE_URL`.
    fn default() -> Self {
        let api_key = std::env::var("BARSYNC_POLYGON_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let base_url = std::env::var("BARSYNC_POLYGON_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| String::from(DEFAULT_BASE_URL));

        Self {
            base_url,
            api_key,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl PolygonConfig {
    fn auth(&self) -> HttpAuth {
        self.api_key
            .as_ref()
            .map_or(HttpAuth::None, |key| HttpAuth::BearerToken(key.clone()))
    }
}

/// Daily aggregates client for `GET /v2/aggs/ticker/{ticker}/range/1/day/{from}/{to}`.
#[derive(Clone)]
pub struct PolygonAdapter {
    config: PolygonConfig,
    http_client: Arc<dyn HttpClient>,
}

impl Default for PolygonAdapter {
    fn default() -> Self {
        Self::new(PolygonConfig::default(), Arc::new(ReqwestHttpClient::new()))
    }
}

impl PolygonAdapter {
    pub fn new(config: PolygonConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &PolygonConfig {
        &self.config
    }

    pub fn aggregates_url(&self, request: &DailyBarsRequest) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}?adjusted=true&sort=asc&limit={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(request.symbol.as_str()),
            request.start,
            request.end,
            MAX_AGGREGATES_PER_PAGE,
        )
    }

    async fn fetch_aggregates(&self, request: &DailyBarsRequest) -> Result<Vec<Bar>, SourceError> {
        let http_request = HttpRequest::get(self.aggregates_url(request))
            .with_header("accept", "application/json")
            .with_auth(&self.config.auth())
            .with_timeout_ms(self.config.timeout_ms);

        let response = self
            .http_client
            .execute(http_request)
            .await
            .map_err(transport_error)?;

        if !response.is_success() {
            tracing::debug!(
                symbol = %request.symbol,
                status = response.status,
                "polygon aggregates request rejected"
            );
            return Err(SourceError::status(response.status));
        }

        parse_aggregates(&request.symbol, &response.body)
    }
}

impl BarSource for PolygonAdapter {
    fn name(&self) -> &'static str {
        "polygon"
    }

    fn daily_bars<'a>(
        &'a self,
        request: &'a DailyBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Bar>, SourceError>> + Send + 'a>> {
        Box::pin(self.fetch_aggregates(request))
    }
}

fn transport_error(error: HttpError) -> SourceError {
    let what = match error.kind() {
        HttpErrorKind::Timeout => "polygon request timed out",
        HttpErrorKind::Connect => "could not connect to polygon",
        HttpErrorKind::Body => "polygon response body was cut short",
        HttpErrorKind::Other => "polygon transport error",
    };
    SourceError::transport(format!("{what}: {}", error.message()))
}

#[derive(Debug, Deserialize)]
struct PolygonAggregatesResponse {
    #[serde(default)]
    results: Option<Vec<PolygonAggregate>>,
    #[serde(default)]
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PolygonAggregate {
    /// Start of the aggregate window, Unix epoch milliseconds.
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

/// Decode an aggregates body. Missing or empty `results` yields no bars.
pub(crate) fn parse_aggregates(symbol: &Symbol, body: &str) -> Result<Vec<Bar>, SourceError> {
    let response: PolygonAggregatesResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::malformed(format!("failed to parse polygon aggregates: {e}")))?;

    if response.next_url.is_some() {
        tracing::warn!(
            symbol = %symbol,
            "polygon returned a next_url; only the first page of aggregates is stored"
        );
    }

    let mut bars = response
        .results
        .unwrap_or_default()
        .into_iter()
        .map(|aggregate| normalize_aggregate(symbol, aggregate))
        .collect::<Result<Vec<_>, _>>()?;
    bars.sort_by_key(|bar| bar.date);
    Ok(bars)
}

fn normalize_aggregate(symbol: &Symbol, aggregate: PolygonAggregate) -> Result<Bar, SourceError> {
    let date = TradeDate::from_unix_millis(aggregate.t)
        .map_err(|e| SourceError::malformed(e.to_string()))?;

    if !aggregate.v.is_finite() || aggregate.v < 0.0 {
        return Err(SourceError::malformed(format!(
            "polygon volume {} for {date} is not a non-negative number",
            aggregate.v
        )));
    }
    // Volumes arrive as JSON numbers and are sometimes fractional.
    let volume = aggregate.v.round() as u64;

    Bar::new(
        symbol.clone(),
        date,
        aggregate.o,
        aggregate.h,
        aggregate.l,
        aggregate.c,
        volume,
    )
    .map_err(|e| SourceError::malformed(format!("invalid polygon bar for {date}: {e}")))
}
