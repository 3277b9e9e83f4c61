use thiserror::Error;

use barsync_core::{IndicatorError, StoreError, ValidationError, WarehouseError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<IndicatorError> for CliError {
    fn from(error: IndicatorError) -> Self {
        match error {
            IndicatorError::Validation(error) => Self::Validation(error),
            IndicatorError::Store(error) => Self::Store(error),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Store(StoreError::Rejected(_)) => 2,
            Self::Serialization(_) => 4,
            Self::Warehouse(_) | Self::Store(_) => 7,
            Self::Io(_) => 10,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Store(StoreError::Rejected(_)) => "cli.validation",
            Self::Serialization(_) => "cli.serialization",
            Self::Warehouse(_) | Self::Store(_) => "cli.warehouse",
            Self::Io(_) => "cli.io",
        }
    }
}
