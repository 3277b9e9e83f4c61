use barsync_core::{IndicatorEngine, Symbol, TradeDate};
use serde_json::json;

use crate::cli::{Cli, RsiArgs};
use crate::error::CliError;

use super::{open_store, CommandResult, POLYGON_SOURCE};

pub fn run(args: &RsiArgs, cli: &Cli) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let from = args.from.as_deref().map(TradeDate::parse).transpose()?;
    let to = args.to.as_deref().map(TradeDate::parse).transpose()?;

    let engine = IndicatorEngine::new(open_store(cli, POLYGON_SOURCE)?);
    let points = serde_json::to_value(engine.rsi_series(&symbol, from, to, args.period)?)?;

    Ok(CommandResult::ok(json!({
        "symbol": symbol.as_str(),
        "period": args.period,
        "points": points,
    })))
}
