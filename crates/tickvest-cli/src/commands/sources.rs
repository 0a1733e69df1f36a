use serde::Serialize;
use serde_json::Value;
use tickvest_core::{Endpoint, ProviderId, SourceSnapshot};

use super::Context;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SourcesOutput {
    allow_synthetic: bool,
    quote_chain: Vec<ProviderId>,
    history_chain: Vec<ProviderId>,
    sources: Vec<SourceSnapshot>,
}

pub fn run(ctx: &Context) -> Result<Value, CliError> {
    Ok(serde_json::to_value(SourcesOutput {
        allow_synthetic: ctx.policy().allow_synthetic,
        quote_chain: ctx.router.source_chain(Endpoint::Quote),
        history_chain: ctx.router.source_chain(Endpoint::History),
        sources: ctx.router.sources(),
    })?)
}
