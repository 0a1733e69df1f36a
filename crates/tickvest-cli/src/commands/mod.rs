mod history;
mod portfolio;
mod quote;
mod sources;
mod vesting;

use std::time::Duration;

use serde_json::Value;
use tickvest_core::{
    parse_date, DashboardConfig, FallbackPolicy, ProviderId, QuoteRouter, QuoteRouterBuilder,
    SourceStrategy, Symbol, UtcDateTime, ValidationError,
};
use time::Date;

use crate::cli::{Cli, Command, SourceSelector};
use crate::error::CliError;

/// Configuration plus the router every command shares.
pub struct Context {
    pub config: DashboardConfig,
    pub router: QuoteRouter,
}

impl Context {
    pub fn new(config: DashboardConfig, router: QuoteRouter) -> Self {
        Self { config, router }
    }

    fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut config = DashboardConfig::from_env()?;
        if let Some(allow) = cli.synthetic_override() {
            config.fallback.allow_synthetic = allow;
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            config.provider_timeout = Duration::from_millis(timeout_ms.max(1));
        }
        let router = QuoteRouterBuilder::from_config(&config)
            .with_strategy(to_source_strategy(cli.source))
            .build();
        Ok(Self::new(config, router))
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.config.fallback
    }

    /// Explicit symbol, or the configured one.
    pub fn symbol(&self, raw: Option<&str>) -> Result<Symbol, ValidationError> {
        match raw {
            Some(value) => Symbol::parse(value),
            None => Ok(self.config.symbol.clone()),
        }
    }

    /// Explicit date, or today on the exchange calendar.
    pub fn as_of(&self, raw: Option<&str>) -> Result<Date, ValidationError> {
        match raw {
            Some(value) => parse_date(value),
            None => Ok(self.router.calendar().local_date(UtcDateTime::now())),
        }
    }
}

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let ctx = Context::from_cli(cli)?;
    dispatch(&cli.command, &ctx).await
}

async fn dispatch(command: &Command, ctx: &Context) -> Result<Value, CliError> {
    match command {
        Command::Quote(args) => quote::run(args, ctx).await,
        Command::Portfolio(args) => portfolio::run(args, ctx).await,
        Command::Vesting(args) => vesting::run(args, ctx).await,
        Command::History(args) => history::run(args, ctx).await,
        Command::Sources => sources::run(ctx),
    }
}

fn to_source_strategy(source: SourceSelector) -> SourceStrategy {
    match source {
        SourceSelector::Auto => SourceStrategy::Configured,
        SourceSelector::Yahoo => SourceStrategy::Strict(ProviderId::Yahoo),
        SourceSelector::Finnhub => SourceStrategy::Strict(ProviderId::Finnhub),
        SourceSelector::Twelvedata => SourceStrategy::Strict(ProviderId::Twelvedata),
        SourceSelector::Alphavantage => SourceStrategy::Strict(ProviderId::Alphavantage),
    }
}
