use std::sync::Arc;
use std::time::Duration;

use barsync_core::{
    parse_range, BarSource, PolygonAdapter, PolygonConfig, ReqwestHttpClient, RetryPolicy,
    RetryingFetcher, SyncOrchestrator, SyncResult,
};
use serde_json::json;

use crate::cli::{Cli, SyncArgs};
use crate::error::CliError;

use super::CommandResult;

pub async fn run(args: &SyncArgs, cli: &Cli) -> Result<CommandResult, CliError> {
    // Bad dates are reported before the warehouse file is touched.
    if let Err(error) = parse_range(&args.from, &args.to) {
        return Ok(describe(args, &SyncResult::Failed(error.into())));
    }

    let policy = RetryPolicy::new(cli.max_attempts, Duration::from_secs(cli.retry_delay_secs))?;
    let config = PolygonConfig {
        timeout_ms: cli.timeout_ms,
        ..PolygonConfig::default()
    };
    if config.api_key.is_none() {
        tracing::warn!("BARSYNC_POLYGON_API_KEY is not set; requests are sent without credentials");
    }

    let adapter = Arc::new(PolygonAdapter::new(config, Arc::new(ReqwestHttpClient::new())));
    let store = super::open_store(cli, adapter.name())?;
    let orchestrator = SyncOrchestrator::new(store, RetryingFetcher::new(adapter, policy));

    let result = orchestrator
        .ensure_range(&args.symbol, &args.from, &args.to)
        .await;
    Ok(describe(args, &result))
}

fn describe(args: &SyncArgs, result: &SyncResult) -> CommandResult {
    let bars_written = match result {
        SyncResult::Updated(count) => Some(*count),
        _ => None,
    };
    let data = json!({
        "symbol": args.symbol.trim().to_ascii_uppercase(),
        "from": args.from,
        "to": args.to,
        "status": result.status(),
        "bars_written": bars_written,
    });

    match result {
        SyncResult::Failed(error) => {
            CommandResult::ok(data).with_error(error.code(), error.to_string())
        }
        _ => CommandResult::ok(data),
    }
}
