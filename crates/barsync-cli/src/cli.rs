//! CLI argument definitions for barsync.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sync` | Make sure a symbol's daily bars cover a date range |
//! | `summary` | Stored date bounds and bar count per symbol |
//! | `rsi` | RSI over stored closes |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--db-path` | `$BARSYNC_HOME/cache/warehouse.duckdb` | Warehouse file |
//! | `--max-attempts` | `3` | Attempts per fetch on transport failure |
//! | `--retry-delay-secs` | `5` | Wait between attempts |
//! | `--timeout-ms` | `10000` | Per-request HTTP timeout |
//! | `-v` | warn | `-v` info, `-vv` debug (overridden by `RUST_LOG`) |
//!
//! # Examples
//!
//! ```bash
//! barsync sync AAPL --from 2024-01-01 --to 2024-03-31
//! barsync summary --format table
//! barsync rsi AAPL --from 2024-01-01 --period 14 --pretty
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Incremental daily bar sync backed by a local DuckDB warehouse.
#[derive(Debug, Parser)]
#[command(name = "barsync", author, version, about)]
pub struct Cli {
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Warehouse database file; defaults under `BARSYNC_HOME`.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Attempts per fetch when the transport fails (first call included).
    #[arg(long, global = true, default_value_t = 3)]
    pub max_attempts: u32,

    /// Seconds to wait between fetch attempts.
    #[arg(long, global = true, default_value_t = 5)]
    pub retry_delay_secs: u64,

    /// HTTP request timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Increase log verbosity on stderr.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object.
    Json,
    /// Plain text for terminals.
    Table,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch and store daily bars unless the range is already stored.
    Sync(SyncArgs),
    /// Show stored coverage for every symbol.
    Summary,
    /// Compute RSI from stored closes.
    Rsi(RsiArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    pub symbol: String,

    /// First day, `YYYY-MM-DD`, inclusive.
    #[arg(long)]
    pub from: String,

    /// Last day, `YYYY-MM-DD`, inclusive.
    #[arg(long)]
    pub to: String,
}

#[derive(Debug, Args)]
pub struct RsiArgs {
    pub symbol: String,

    /// First day; defaults to the earliest stored bar.
    #[arg(long)]
    pub from: Option<String>,

    /// Last day; defaults to the latest stored bar.
    #[arg(long)]
    pub to: Option<String>,

    #[arg(long, default_value_t = 14)]
    pub period: usize,
}
