//! CLI argument definitions for tickvest.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Fetch the current quote through the fallback chain |
//! | `portfolio` | Value the configured holding |
//! | `vesting` | Analyze the RSU schedule at the current price |
//! | `history` | Fetch price bars with indicators |
//! | `sources` | List the provider chain |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--source` | `auto` | Provider selection |
//! | `--allow-synthetic` / `--no-synthetic` | from `TICKVEST_ALLOW_SYNTHETIC` | Synthetic fallback |
//! | `--timeout-ms` | from `TICKVEST_PROVIDER_TIMEOUT_MS` | Per-provider call budget |
//!
//! # Examples
//!
//! ```bash
//! tickvest quote
//! tickvest quote AAPL --source finnhub --pretty
//! tickvest vesting --as-of 2025-06-01
//! tickvest history --range 3mo
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Quote, portfolio and RSU vesting dashboard from the terminal.
///
/// Holdings, grants and provider keys are read from `TICKVEST_*`
/// environment variables (a `.env` file is loaded first).
#[derive(Debug, Parser)]
#[command(name = "tickvest", author, version, about = "Personal investment dashboard CLI")]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Provider selection.
    #[arg(long, global = true, value_enum, default_value_t = SourceSelector::Auto)]
    pub source: SourceSelector,

    /// Serve clearly tagged synthetic data when every provider fails.
    #[arg(long, global = true, conflicts_with = "no_synthetic")]
    pub allow_synthetic: bool,

    /// Fail instead of serving synthetic data, whatever the environment says.
    #[arg(long, global = true)]
    pub no_synthetic: bool,

    /// Per-provider timeout budget in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Source selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceSelector {
    /// Configured providers in priority order, with fallback.
    Auto,
    /// Yahoo Finance only.
    Yahoo,
    /// Finnhub only (needs `FINNHUB_API_KEY`).
    Finnhub,
    /// Twelve Data only (needs `TWELVEDATA_API_KEY`).
    Twelvedata,
    /// Alpha Vantage only (needs `ALPHAVANTAGE_API_KEY`).
    Alphavantage,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the current quote.
    ///
    ///   tickvest quote
    ///   tickvest quote AAPL --pretty
    Quote(QuoteArgs),

    /// Value the configured holding: gain, annualized return, milestones, projections.
    Portfolio(AsOfArgs),

    /// Analyze the RSU vesting schedule at the current price.
    ///
    ///   tickvest vesting --as-of 2025-06-01
    Vesting(AsOfArgs),

    /// Fetch price bars and indicators.
    ///
    ///   tickvest history --range 6mo
    History(HistoryArgs),

    /// List the provider chain with capabilities and circuit state.
    Sources,
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// Market symbol; defaults to `TICKVEST_SYMBOL`.
    pub symbol: Option<String>,
}

#[derive(Debug, Args)]
pub struct AsOfArgs {
    /// Valuation date (YYYY-MM-DD); defaults to today in New York.
    #[arg(long)]
    pub as_of: Option<String>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Market symbol; defaults to `TICKVEST_SYMBOL`.
    pub symbol: Option<String>,

    /// Chart window: 1d, 5d, 1mo, 3mo, 6mo or 1y.
    #[arg(long, default_value = "1mo")]
    pub range: String,
}

impl Cli {
    /// Explicit synthetic choice, if either flag was given.
    pub fn synthetic_override(&self) -> Option<bool> {
        if self.allow_synthetic {
            Some(true)
        } else if self.no_synthetic {
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::parse_from(["tickvest", "quote", "AAPL", "--pretty", "--source", "finnhub"]);

        assert!(cli.pretty);
        assert_eq!(cli.source, SourceSelector::Finnhub);
        assert!(matches!(
            cli.command,
            Command::Quote(QuoteArgs { symbol: Some(ref s) }) if s == "AAPL"
        ));
    }

    #[test]
    fn synthetic_flags_are_exclusive() {
        let result =
            Cli::try_parse_from(["tickvest", "quote", "--allow-synthetic", "--no-synthetic"]);

        assert!(result.is_err());
    }

    #[test]
    fn synthetic_override_is_absent_by_default() {
        let cli = Cli::parse_from(["tickvest", "sources"]);

        assert_eq!(cli.synthetic_override(), None);
        assert_eq!(
            Cli::parse_from(["tickvest", "--no-synthetic", "sources"]).synthetic_override(),
            Some(false)
        );
    }

    #[test]
    fn history_range_defaults_to_one_month() {
        let cli = Cli::parse_from(["tickvest", "history"]);

        assert!(matches!(cli.command, Command::History(HistoryArgs { ref range, .. }) if range == "1mo"));
    }
}
