use thiserror::Error;

/// Validation and contract errors exposed by `barsync-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("date must be a calendar date formatted YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
    #[error("range start {start} is after range end {end}")]
    InvertedRange { start: String, end: String },
    #[error("epoch timestamp {millis}ms is out of range")]
    TimestampOutOfRange { millis: i64 },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bar symbol {found} does not match {expected}")]
    SymbolMismatch { expected: String, found: String },

    #[error("indicator period must be greater than zero")]
    InvalidPeriod,
    #[error("retry policy needs at least one attempt")]
    InvalidMaxAttempts,
}

/// Terminal failure reasons for a fetch or a synchronization run.
///
/// `Network` is the only kind produced after retrying; every other kind is
/// reported on first occurrence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("invalid date range: {0}")]
    InvalidDate(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("provider responded with status {status}")]
    Api { status: u16 },

    #[error("network failure after {attempts} attempt(s): {message}")]
    Network { attempts: u32, message: String },

    #[error("provider response could not be parsed: {0}")]
    MalformedResponse(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl SyncError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidDate(_) => "sync.invalid_date",
            Self::InvalidSymbol(_) => "sync.invalid_symbol",
            Self::Api { .. } => "sync.api_error",
            Self::Network { .. } => "sync.network_error",
            Self::MalformedResponse(_) => "sync.malformed_response",
            Self::Storage(_) => "sync.storage_error",
        }
    }
}

impl From<ValidationError> for SyncError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::InvalidDate { .. } | ValidationError::InvertedRange { .. } => {
                Self::InvalidDate(error.to_string())
            }
            ValidationError::EmptySymbol
            | ValidationError::SymbolTooLong { .. }
            | ValidationError::SymbolInvalidStart { .. }
            | ValidationError::SymbolInvalidChar { .. } => Self::InvalidSymbol(error.to_string()),
            other => Self::MalformedResponse(other.to_string()),
        }
    }
}
