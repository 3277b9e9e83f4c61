use barsync_core::BarStore;
use serde_json::json;

use crate::cli::Cli;
use crate::error::CliError;

use super::{open_store, CommandResult, POLYGON_SOURCE};

pub fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let store = open_store(cli, POLYGON_SOURCE)?;
    let symbols = serde_json::to_value(store.coverage_summary()?)?;
    Ok(CommandResult::ok(json!({ "symbols": symbols })))
}

#[cfg(test)]
mod tests {
    use barsync_core::{Bar, Symbol, TradeDate};
    use tempfile::tempdir;

    use super::*;
    use crate::commands::test_support::cli_for;

    #[test]
    fn lists_each_stored_symbol() {
        let temp = tempdir().expect("tempdir");
        let cli = cli_for(&temp.path().join("warehouse.duckdb"), &["summary"]);

        {
            let store = open_store(&cli, "test").expect("store");
            let symbol = Symbol::parse("AAPL").expect("symbol");
            let bars: Vec<Bar> = ["2024-01-02", "2024-01-03"]
                .iter()
                .map(|date| {
                    Bar::new(
                        symbol.clone(),
                        TradeDate::parse(date).expect("date"),
                        1.0,
                        1.0,
                        1.0,
                        1.0,
                        10,
                    )
                    .expect("bar")
                })
                .collect();
            store.upsert_bars(&symbol, &bars).expect("seed");
        }

        let result = run(&cli).expect("summary");

        assert_eq!(
            result.data,
            json!({
                "symbols": [{
                    "symbol": "AAPL",
                    "first_date": "2024-01-02",
                    "last_date": "2024-01-03",
                    "bar_count": 2
                }]
            })
        );
    }
}
