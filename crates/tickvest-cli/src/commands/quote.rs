use serde::Serialize;
use serde_json::Value;
use tickvest_core::{Attempt, ProviderId, Quote};

use super::Context;
use crate::cli::QuoteArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteOutput {
    quote: Quote,
    source_chain: Vec<ProviderId>,
    attempts: Vec<Attempt>,
    latency_ms: u64,
}

pub async fn run(args: &QuoteArgs, ctx: &Context) -> Result<Value, CliError> {
    let symbol = ctx.symbol(args.symbol.as_deref())?;
    let routed = ctx.router.fetch_quote(&symbol, ctx.policy()).await?;

    Ok(serde_json::to_value(QuoteOutput {
        quote: routed.data,
        source_chain: routed.source_chain,
        attempts: routed.attempts,
        latency_ms: routed.latency_ms,
    })?)
}
