mod api;
mod args;
mod error;
mod state;
mod telemetry;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tickvest_core::{DashboardConfig, QuoteRouterBuilder};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::api::app_router;
use crate::args::ServerArgs;
use crate::error::ServerError;
use crate::state::AppState;
use crate::telemetry::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = ServerArgs::parse();
    init_tracing(args.log_format);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            error!(error = %failure, "tickvest server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: ServerArgs) -> Result<(), ServerError> {
    let config = DashboardConfig::from_env()?;
    let router = QuoteRouterBuilder::from_config(&config).build();
    let state = Arc::new(AppState::new(config, router));

    if args.no_poll {
        info!("background poller disabled");
    } else {
        let _poll_task = Arc::clone(&state.poller).spawn();
    }

    let listener = bind(args.listen).await?;
    info!(
        listen = %args.listen,
        symbol = %state.config.symbol,
        allow_synthetic = state.config.fallback.allow_synthetic,
        "tickvest server listening"
    );

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use tickvest_core::{ConfigError, ValidationError};

    use super::*;

    #[tokio::test]
    async fn bind_conflict_reports_the_address() {
        let taken = TcpListener::bind("127.0.0.1:0").await.expect("ephemeral port");
        let addr = taken.local_addr().expect("local addr");

        let failure = bind(addr).await.expect_err("port already in use");

        assert!(matches!(failure, ServerError::Bind { addr: reported, .. } if reported == addr));
        assert!(failure.to_string().starts_with(&format!("failed to bind {addr}")));
        assert!(failure.source().is_some());
    }

    #[test]
    fn config_failures_keep_their_cause() {
        let failure = ServerError::from(ConfigError::from(ValidationError::NonPositiveValue {
            field: "referencePrice",
        }));

        assert!(matches!(failure, ServerError::Config(ConfigError::Validation(_))));
        assert!(failure.to_string().starts_with("invalid configuration:"));
    }
}
