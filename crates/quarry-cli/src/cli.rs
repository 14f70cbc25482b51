//! CLI argument definitions for quarry.
//!
//! Commands:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `credentials` | Manage upstream API keys |
//! | `symbols` | Manage the tracked symbol set |
//! | `scrape` | Scrape daily history for tracked or given symbols |
//! | `status` | Inspect saved runs and their checkpoints |

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Bulk historical market data scraper.
#[derive(Debug, Parser)]
#[command(
    name = "quarry",
    author,
    version,
    about = "Bulk historical market data scraper",
    long_about = "Quarry collects full daily price history for large symbol sets from \
Alpha Vantage, pacing requests under the upstream quota and writing one CSV file per \
symbol. Interrupted runs checkpoint their progress and can be resumed without \
re-fetching completed symbols."
)]
pub struct Cli {
    /// Quarry home directory. Defaults to $QUARRY_HOME, then ~/.quarry.
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage upstream API credentials.
    Credentials(CredentialsArgs),

    /// Manage the tracked symbol set.
    Symbols(SymbolsArgs),

    /// Scrape daily history for the tracked (or given) symbols.
    ///
    /// # Examples
    ///
    ///   quarry scrape
    ///   quarry scrape AAPL MSFT --max-retries 5
    ///   quarry scrape --stale-first --daily-limit 500
    ///   quarry scrape --resume RUN_ID
    Scrape(ScrapeArgs),

    /// Show saved runs, or the detailed status of one run.
    Status(StatusArgs),
}

/// Arguments for the `credentials` command group.
#[derive(Debug, Args)]
pub struct CredentialsArgs {
    #[command(subcommand)]
    pub command: CredentialsCommand,
}

/// Credential management subcommands.
#[derive(Debug, Subcommand)]
pub enum CredentialsCommand {
    /// Save an API key for a source (e.g. alphavantage).
    Set {
        /// Source name the key belongs to.
        source: String,
        /// The API key.
        key: String,
    },

    /// Print the stored API key for a source.
    Show {
        /// Source name to look up.
        source: String,
    },
}

/// Arguments for the `symbols` command group.
#[derive(Debug, Args)]
pub struct SymbolsArgs {
    #[command(subcommand)]
    pub command: SymbolsCommand,
}

/// Symbol set subcommands.
#[derive(Debug, Subcommand)]
pub enum SymbolsCommand {
    /// Add symbols to the tracked set.
    Add {
        #[arg(required = true, num_args = 1..)]
        symbols: Vec<String>,
    },

    /// Remove symbols from the tracked set.
    Remove {
        #[arg(required = true, num_args = 1..)]
        symbols: Vec<String>,
    },

    /// Union a bundled list (e.g. sp500) into the tracked set.
    AddList {
        /// List name; currently only "sp500" is bundled.
        name: String,
    },

    /// Print the tracked symbol set.
    List,
}

/// Arguments for the `scrape` command.
#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Symbols to scrape. When omitted, the tracked set is used.
    pub symbols: Vec<String>,

    /// Maximum total fetch attempts per symbol.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Requests allowed per rate window.
    #[arg(long, default_value_t = 5)]
    pub rate_limit: u32,

    /// Rate window length in seconds.
    #[arg(long, default_value_t = 60)]
    pub rate_window_secs: u64,

    /// Optional cap on total requests per 24 hours.
    #[arg(long, value_name = "N")]
    pub daily_limit: Option<u32>,

    /// Scrape never-seen symbols first, then least recently scraped.
    #[arg(long, default_value_t = false)]
    pub stale_first: bool,

    /// Resume an interrupted run from its checkpoint.
    #[arg(long, value_name = "RUN_ID", conflicts_with = "symbols")]
    pub resume: Option<String>,

    /// Upstream time-series function to scrape.
    #[arg(long, default_value = quarry_core::DEFAULT_FUNCTION)]
    pub function: String,
}

/// Arguments for the `status` command.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Run id to inspect. When omitted, all saved run ids are listed.
    pub run_id: Option<String>,
}
