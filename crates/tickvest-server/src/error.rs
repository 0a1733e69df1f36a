use std::io;
use std::net::SocketAddr;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tickvest_core::{AllSourcesUnavailable, ConfigError, ValidationError};
use tracing::warn;

/// Failures that stop the server process.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Unavailable(#[from] AllSourcesUnavailable),
}

/// Body of every non-2xx response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_request",
            Self::Unavailable(_) => "sources_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            Self::Validation(_) => None,
            // Attempt list: provider, error code, latency.
            Self::Unavailable(failure) => serde_json::to_value(failure).ok(),
        };
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
