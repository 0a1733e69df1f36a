use serde::Serialize;
use serde_json::Value;
use tickvest_core::{HoldingsConfig, PortfolioSummary, Quote};

use super::Context;
use crate::cli::AsOfArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PortfolioOutput<'a> {
    holdings: &'a HoldingsConfig,
    quote: Quote,
    #[serde(flatten)]
    summary: PortfolioSummary,
}

pub async fn run(args: &AsOfArgs, ctx: &Context) -> Result<Value, CliError> {
    let as_of = ctx.as_of(args.as_of.as_deref())?;
    let quote = ctx
        .router
        .fetch_quote(&ctx.config.symbol, ctx.policy())
        .await?
        .data;
    let summary = PortfolioSummary::build(&ctx.config.holdings, &quote, as_of);

    Ok(serde_json::to_value(PortfolioOutput {
        holdings: &ctx.config.holdings,
        quote,
        summary,
    })?)
}
