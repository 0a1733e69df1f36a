use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;
use tickvest_core::AllSourcesUnavailable;

use crate::error::CliError;

#[derive(Serialize)]
struct FailureBody<'a> {
    error: &'static str,
    message: String,
    details: &'a AllSourcesUnavailable,
}

pub fn render(data: &Value, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(data)?
    } else {
        serde_json::to_string(data)?
    };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{payload}")?;
    Ok(())
}

/// `{error, message, details}` on stderr when the chain is exhausted.
pub fn render_failure(error: &CliError) -> Result<(), CliError> {
    let CliError::Unavailable(failure) = error else {
        return Ok(());
    };
    let body = FailureBody {
        error: "sources_unavailable",
        message: failure.to_string(),
        details: failure,
    };
    let mut stderr = io::stderr().lock();
    writeln!(stderr, "{}", serde_json::to_string(&body)?)?;
    Ok(())
}
