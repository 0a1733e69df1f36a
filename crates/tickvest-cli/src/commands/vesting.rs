use serde::Serialize;
use serde_json::Value;
use tickvest_core::{QuoteSource, VestingAnalytics};
use tracing::warn;

use super::Context;
use crate::cli::AsOfArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VestingOutput {
    source: QuoteSource,
    #[serde(flatten)]
    analytics: VestingAnalytics,
}

pub async fn run(args: &AsOfArgs, ctx: &Context) -> Result<Value, CliError> {
    let as_of = ctx.as_of(args.as_of.as_deref())?;
    if ctx.config.schedule.is_empty() {
        warn!("no grants configured; set TICKVEST_GRANTS or TICKVEST_GRANTS_FILE");
    }
    let quote = ctx
        .router
        .fetch_quote(&ctx.config.symbol, ctx.policy())
        .await?
        .data;
    let analytics =
        VestingAnalytics::analyze(&ctx.config.schedule, quote.price, &ctx.config.tax, as_of)?;

    Ok(serde_json::to_value(VestingOutput {
        source: quote.source,
        analytics,
    })?)
}
