//! Quote provider contract and request types.
//!
//! Every upstream source implements [`QuoteProvider`]. Provider errors are
//! always [`SourceError`] values; the router absorbs them and only surfaces
//! [`AllSourcesUnavailable`](crate::AllSourcesUnavailable) after the whole
//! chain failed.
//!
//! | Endpoint | Request | Response |
//! |----------|---------|----------|
//! | Quote | [`QuoteRequest`] | [`Quote`] |
//! | History | [`HistoryRequest`] | [`PriceHistory`] |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::circuit_breaker::CircuitState;
use crate::{HistoryRange, PriceHistory, ProviderId, Quote, Symbol, UtcDateTime};

/// Boxed future returned by provider calls.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Data endpoint type used for routing and capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Quote,
    History,
}

impl Endpoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::History => "history",
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported endpoint matrix for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub quote: bool,
    pub history: bool,
}

impl CapabilitySet {
    pub const fn new(quote: bool, history: bool) -> Self {
        Self { quote, history }
    }

    pub const fn quote_only() -> Self {
        Self::new(true, false)
    }

    pub const fn full() -> Self {
        Self::new(true, true)
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Quote => self.quote,
            Endpoint::History => self.history,
        }
    }

    pub fn supported_endpoints(self) -> Vec<&'static str> {
        let mut values = Vec::with_capacity(2);
        if self.quote {
            values.push(Endpoint::Quote.as_str());
        }
        if self.history {
            values.push(Endpoint::History.as_str());
        }
        values
    }
}

/// Provider-level failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Upstream answered with a non-2xx status.
    HttpStatus { status: u16 },
    /// Body failed to decode or lacked price / previous close.
    MalformedResponse,
    Timeout,
    Transport,
    RateLimited,
    CircuitOpen,
    Unsupported,
}

/// Structured provider error recorded by the router for each failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::HttpStatus { status }, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::MalformedResponse, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Transport, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message)
    }

    pub fn circuit_open(provider: ProviderId) -> Self {
        Self::new(
            SourceErrorKind::CircuitOpen,
            format!("{provider} circuit breaker is open; skipping upstream call"),
        )
    }

    pub fn unsupported(provider: ProviderId, endpoint: Endpoint) -> Self {
        Self::new(
            SourceErrorKind::Unsupported,
            format!("endpoint '{endpoint}' is not supported by '{provider}'"),
        )
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        match self.kind {
            SourceErrorKind::HttpStatus { status } => Some(status),
            _ => None,
        }
    }

    /// Whether a later attempt against the same provider may succeed.
    pub const fn retryable(&self) -> bool {
        match self.kind {
            SourceErrorKind::HttpStatus { status } => status == 429 || status >= 500,
            SourceErrorKind::Timeout
            | SourceErrorKind::Transport
            | SourceErrorKind::RateLimited
            | SourceErrorKind::CircuitOpen => true,
            SourceErrorKind::MalformedResponse | SourceErrorKind::Unsupported => false,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::HttpStatus { .. } => "source.http_status",
            SourceErrorKind::MalformedResponse => "source.malformed_response",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::Transport => "source.transport",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::CircuitOpen => "source.circuit_open",
            SourceErrorKind::Unsupported => "source.unsupported",
        }
    }

    /// Whether the failure should count against the provider's circuit.
    pub(crate) const fn trips_circuit(&self) -> bool {
        !matches!(
            self.kind,
            SourceErrorKind::CircuitOpen
                | SourceErrorKind::RateLimited
                | SourceErrorKind::Unsupported
        )
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl Serialize for SourceError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let status = self.status();
        let mut state =
            serializer.serialize_struct("SourceError", if status.is_some() { 4 } else { 3 })?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("retryable", &self.retryable())?;
        if let Some(status) = status {
            state.serialize_field("status", &status)?;
        }
        state.end()
    }
}

/// Request payload for quote endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub symbol: Symbol,
    /// Capture instant stamped on the resulting quote.
    pub captured_at: UtcDateTime,
    pub market_open: bool,
}

impl QuoteRequest {
    pub fn new(symbol: Symbol, captured_at: UtcDateTime, market_open: bool) -> Self {
        Self {
            symbol,
            captured_at,
            market_open,
        }
    }
}

/// Request payload for price-history endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: Symbol,
    pub range: HistoryRange,
    pub captured_at: UtcDateTime,
}

impl HistoryRequest {
    pub fn new(symbol: Symbol, range: HistoryRange, captured_at: UtcDateTime) -> Self {
        Self {
            symbol,
            range,
            captured_at,
        }
    }
}

/// Upstream quote source contract.
///
/// Implementations issue exactly one network request per call and never
/// retry; fallback is the router's job. Each call either yields a normalized
/// value or a [`SourceError`].
pub trait QuoteProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    /// Fetches the current quote for one symbol.
    fn quote<'a>(&'a self, req: QuoteRequest) -> ProviderFuture<'a, Quote>;

    /// Fetches chart bars. Providers without chart data keep the default.
    fn history<'a>(&'a self, req: HistoryRequest) -> ProviderFuture<'a, PriceHistory> {
        let _ = req;
        let error = SourceError::unsupported(self.id(), Endpoint::History);
        Box::pin(async move { Err(error) })
    }

    /// Circuit state reported by `sources` listings.
    fn circuit_state(&self) -> CircuitState {
        CircuitState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_follows_failure_kind() {
        assert!(SourceError::http_status(503, "down").retryable());
        assert!(SourceError::http_status(429, "slow down").retryable());
        assert!(!SourceError::http_status(404, "missing").retryable());
        assert!(!SourceError::malformed("no price").retryable());
        assert!(SourceError::timeout("4s elapsed").retryable());
    }

    #[test]
    fn serializes_status_only_for_http_failures() {
        let json = serde_json::to_value(SourceError::http_status(502, "bad gateway"))
            .expect("serializes");
        assert_eq!(json["code"], "source.http_status");
        assert_eq!(json["status"], 502);

        let json = serde_json::to_value(SourceError::timeout("elapsed")).expect("serializes");
        assert!(json.get("status").is_none());
    }

    #[test]
    fn capability_listing_matches_flags() {
        assert_eq!(CapabilitySet::quote_only().supported_endpoints(), vec!["quote"]);
        assert!(CapabilitySet::full().supports(Endpoint::History));
    }
}
