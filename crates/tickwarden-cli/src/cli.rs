//! CLI argument definitions for tickwarden.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `prices` | Daily bars for a symbol, cache first |
//! | `fetch` | Route any data method through the vendor chain |
//! | `chain` | Show the effective vendor chain per method |
//! | `cache` | Inspect and maintain the local price cache |
//!
//! # Examples
//!
//! ```bash
//! tickwarden prices AAPL --start 2024-01-02 --end 2024-01-31 --pretty
//! tickwarden fetch get_news --symbol MSFT --start 2024-03-01 --end 2024-03-07
//! tickwarden chain get_stock_data
//! tickwarden cache invalidate --symbol AAPL
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Resilient market-data access with vendor fallback and a local price cache.
#[derive(Debug, Parser)]
#[command(name = "tickwarden", author, version, about)]
pub struct Cli {
    /// JSON configuration file. Falls back to `TICKWARDEN_CONFIG`, then defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Fail with exit code 7 when the answer is a degraded placeholder.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Daily OHLCV bars, served from the cache when fresh.
    Prices(PricesArgs),
    /// Route one data method and print the payload with its trace.
    Fetch(FetchArgs),
    /// Show configured and effective vendor chains.
    Chain(ChainArgs),
    /// Price cache maintenance.
    Cache(CacheArgs),
}

#[derive(Debug, Args)]
pub struct PricesArgs {
    pub symbol: String,

    /// First day, `YYYY-MM-DD`.
    #[arg(long)]
    pub start: String,

    /// Last day, `YYYY-MM-DD`, inclusive.
    #[arg(long)]
    pub end: String,

    /// Skip the cache and go straight to the vendors.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Print the series as CSV instead of JSON.
    #[arg(long, default_value_t = false)]
    pub csv: bool,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Method name, e.g. `get_news` or `get_balance_sheet`.
    pub method: String,

    #[arg(long)]
    pub symbol: Option<String>,

    #[arg(long, requires = "end")]
    pub start: Option<String>,

    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Extra vendor parameter as `key=value`; repeatable.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ChainArgs {
    /// Limit output to one method.
    pub method: Option<String>,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Row counts, date span and per-source totals.
    Stats,
    /// Delete stale realtime rows and stale recent end-of-day rows.
    Cleanup,
    /// Delete cached rows by symbol and/or fetch age. No filter clears everything.
    Invalidate {
        #[arg(long)]
        symbol: Option<String>,

        /// Only rows fetched more than this many days ago.
        #[arg(long)]
        older_than_days: Option<u32>,
    },
}
