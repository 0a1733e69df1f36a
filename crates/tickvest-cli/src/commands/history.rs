use serde::Serialize;
use serde_json::Value;
use tickvest_core::{HistoryRange, IndicatorSnapshot, PriceHistory, ProviderId};

use super::Context;
use crate::cli::HistoryArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryOutput {
    history: PriceHistory,
    indicators: IndicatorSnapshot,
    source_chain: Vec<ProviderId>,
}

pub async fn run(args: &HistoryArgs, ctx: &Context) -> Result<Value, CliError> {
    let symbol = ctx.symbol(args.symbol.as_deref())?;
    let range: HistoryRange = args.range.parse()?;
    let routed = ctx
        .router
        .fetch_history(&symbol, range, ctx.policy())
        .await?;
    let indicators = IndicatorSnapshot::from_closes(&routed.data.closes());

    Ok(serde_json::to_value(HistoryOutput {
        history: routed.data,
        indicators,
        source_chain: routed.source_chain,
    })?)
}
