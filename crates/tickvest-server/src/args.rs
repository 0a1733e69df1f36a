use std::net::SocketAddr;

use clap::{Parser, ValueEnum};

/// Live quote, portfolio and vesting API for one holding.
///
/// Dashboard settings (symbol, holdings, grants, provider keys) come from
/// `TICKVEST_*` environment variables; a `.env` file in the working
/// directory is loaded first.
#[derive(Debug, Parser)]
#[command(name = "tickvest-server", version, about = "Serves tickvest dashboard data over HTTP")]
pub struct ServerArgs {
    /// Socket address to bind.
    #[arg(long, env = "TICKVEST_LISTEN_ADDR", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Log line format.
    #[arg(long, env = "TICKVEST_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Do not start the background poller; every request fetches on demand.
    #[arg(long, default_value_t = false)]
    pub no_poll: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
