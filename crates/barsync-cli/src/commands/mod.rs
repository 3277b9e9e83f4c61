mod rsi;
mod summary;
mod sync;

use std::sync::Arc;
use std::time::Instant;

use barsync_core::{Warehouse, WarehouseBarStore, WarehouseConfig};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::Envelope;

/// Source name recorded for stored bars.
pub const POLYGON_SOURCE: &str = "polygon";

#[derive(Debug)]
pub struct CommandResult {
    pub data: Value,
    pub errors: Vec<(String, String)>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.push((code.into(), message.into()));
        self
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope, CliError> {
    let started = Instant::now();
    let (name, result) = match &cli.command {
        Command::Sync(args) => ("sync", sync::run(args, cli).await?),
        Command::Summary => ("summary", summary::run(cli)?),
        Command::Rsi(args) => ("rsi", rsi::run(args, cli)?),
    };
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let envelope = result
        .errors
        .into_iter()
        .fold(Envelope::new(name, result.data, latency_ms), |envelope, (code, message)| {
            envelope.with_error(code, message)
        });
    Ok(envelope)
}

/// Open the warehouse named by `--db-path`, or the default under `BARSYNC_HOME`.
pub fn open_store(cli: &Cli, source: &str) -> Result<Arc<WarehouseBarStore>, CliError> {
    let mut config = WarehouseConfig::default();
    if let Some(path) = &cli.db_path {
        config.db_path = path.clone();
    }

    let warehouse = Warehouse::open(config)?;
    Ok(Arc::new(WarehouseBarStore::new(warehouse, source)))
}
