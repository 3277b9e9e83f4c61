//! Bar source contract and request/error types.
//!
//! A [`BarSource`] turns one [`DailyBarsRequest`] into the bars the provider
//! holds for that range. It performs exactly one upstream call; retrying is the
//! caller's job (see [`crate::RetryingFetcher`]), so the source only has to say
//! *what* went wrong through [`SourceErrorKind`].

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{Bar, Symbol, TradeDate, ValidationError};

/// Inclusive daily-bar range for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyBarsRequest {
    pub symbol: Symbol,
    pub start: TradeDate,
    pub end: TradeDate,
}

impl DailyBarsRequest {
    pub fn new(symbol: Symbol, start: TradeDate, end: TradeDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedRange {
                start: start.format_iso(),
                end: end.format_iso(),
            });
        }
        Ok(Self { symbol, start, end })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// No complete response arrived: connect failure, timeout, truncated body.
    Transport,
    /// The provider answered with a non-2xx status.
    Status,
    /// A 2xx body that does not decode into valid bars.
    Malformed,
}

/// Error returned by a single [`BarSource`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    status: Option<u16>,
}

impl SourceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Transport,
            message: message.into(),
            status: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            kind: SourceErrorKind::Status,
            message: format!("upstream returned status {status}"),
            status: Some(status),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Malformed,
            message: message.into(),
            status: None,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn http_status(&self) -> Option<u16> {
        self.status
    }

    /// Only transport failures are worth another attempt.
    pub const fn retryable(&self) -> bool {
        matches!(self.kind, SourceErrorKind::Transport)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Transport => "source.transport",
            SourceErrorKind::Status => "source.status",
            SourceErrorKind::Malformed => "source.malformed",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Provider of daily bars.
pub trait BarSource: Send + Sync {
    /// Short provider name recorded alongside stored bars.
    fn name(&self) -> &'static str;

    /// Bars for `request`, ascending by date. An empty vector means the
    /// provider has no data for the range.
    fn daily_bars<'a>(
        &'a self,
        request: &'a DailyBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Bar>, SourceError>> + Send + 'a>>;
}
