//! Priority-ordered fallback chain across quote providers.
//!
//! Providers are tried one at a time in priority order; the first success
//! returns immediately and later providers are never invoked. Each call is
//! bounded by a per-provider timeout. When the chain is exhausted the
//! [`FallbackPolicy`] decides between a synthetic quote and
//! [`AllSourcesUnavailable`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adapters::{AlphaVantageAdapter, FinnhubAdapter, TwelveDataAdapter, YahooAdapter};
use crate::circuit_breaker::CircuitState;
use crate::config::DashboardConfig;
use crate::data_source::{
    CapabilitySet, Endpoint, HistoryRequest, ProviderFuture, QuoteProvider, QuoteRequest,
    SourceError, SourceErrorKind,
};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::market_hours::ExchangeCalendar;
use crate::normalize::ReferenceData;
use crate::synthetic::SyntheticQuotes;
use crate::{HistoryRange, PriceHistory, ProviderId, Quote, QuoteSource, Symbol, UtcDateTime};

/// Default ceiling for one provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(4);

/// What to do once every provider failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackPolicy {
    /// Serve a synthetic quote instead of failing. Off unless requested.
    pub allow_synthetic: bool,
}

impl FallbackPolicy {
    pub const fn strict() -> Self {
        Self {
            allow_synthetic: false,
        }
    }

    pub const fn synthetic() -> Self {
        Self {
            allow_synthetic: true,
        }
    }
}

/// Provider selection strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceStrategy {
    /// Registered providers in registration order.
    #[default]
    Configured,
    /// Explicit order; duplicates are dropped.
    Priority(Vec<ProviderId>),
    /// One provider, no fallback.
    Strict(ProviderId),
}

/// One failed provider call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub provider: ProviderId,
    pub error: SourceError,
    pub latency_ms: u64,
}

/// Successful routed call.
#[derive(Debug, Clone)]
pub struct RouteSuccess<T> {
    pub data: T,
    pub selected_source: QuoteSource,
    /// Providers tried, in order, including the one that answered.
    pub source_chain: Vec<ProviderId>,
    /// Failures that preceded the answer.
    pub attempts: Vec<Attempt>,
    pub latency_ms: u64,
}

/// Every provider in the chain failed and synthetic fallback was not allowed.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("all sources unavailable for {symbol} {endpoint}: {} failed attempt(s)", .attempts.len())]
pub struct AllSourcesUnavailable {
    pub symbol: Symbol,
    pub endpoint: Endpoint,
    pub attempts: Vec<Attempt>,
}

/// Row of the `sources` listing.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSnapshot {
    pub id: ProviderId,
    pub priority: usize,
    pub capabilities: CapabilitySet,
    pub circuit: CircuitState,
}

/// Provider registry and fallback engine.
pub struct QuoteRouter {
    providers: Vec<Arc<dyn QuoteProvider>>,
    strategy: SourceStrategy,
    provider_timeout: Duration,
    calendar: ExchangeCalendar,
    synthetic: SyntheticQuotes,
}

impl QuoteRouter {
    /// Providers in priority order.
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>) -> Self {
        Self {
            providers,
            strategy: SourceStrategy::Configured,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            calendar: ExchangeCalendar::nyse(),
            synthetic: SyntheticQuotes::new(ReferenceData::default()),
        }
    }

    pub fn with_strategy(mut self, strategy: SourceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_provider_timeout(mut self, provider_timeout: Duration) -> Self {
        self.provider_timeout = provider_timeout;
        self
    }

    pub fn with_calendar(mut self, calendar: ExchangeCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_synthetic(mut self, synthetic: SyntheticQuotes) -> Self {
        self.synthetic = synthetic;
        self
    }

    pub fn calendar(&self) -> &ExchangeCalendar {
        &self.calendar
    }

    pub fn strategy(&self) -> &SourceStrategy {
        &self.strategy
    }

    pub fn sources(&self) -> Vec<SourceSnapshot> {
        self.providers
            .iter()
            .enumerate()
            .map(|(index, provider)| SourceSnapshot {
                id: provider.id(),
                priority: index + 1,
                capabilities: provider.capabilities(),
                circuit: provider.circuit_state(),
            })
            .collect()
    }

    /// Chain that `endpoint` calls would walk under the current strategy.
    pub fn source_chain(&self, endpoint: Endpoint) -> Vec<ProviderId> {
        match &self.strategy {
            SourceStrategy::Configured => self
                .providers
                .iter()
                .filter(|provider| provider.capabilities().supports(endpoint))
                .map(|provider| provider.id())
                .collect(),
            SourceStrategy::Priority(priority) => dedupe_chain(priority),
            SourceStrategy::Strict(provider) => vec![*provider],
        }
    }

    pub async fn fetch_quote(
        &self,
        symbol: &Symbol,
        policy: FallbackPolicy,
    ) -> Result<RouteSuccess<Quote>, AllSourcesUnavailable> {
        self.fetch_quote_at(symbol, policy, UtcDateTime::now()).await
    }

    /// Like [`fetch_quote`](Self::fetch_quote) with an explicit capture instant.
    pub async fn fetch_quote_at(
        &self,
        symbol: &Symbol,
        policy: FallbackPolicy,
        captured_at: UtcDateTime,
    ) -> Result<RouteSuccess<Quote>, AllSourcesUnavailable> {
        let started = Instant::now();
        let market_open = self.calendar.is_open(captured_at);
        let req = QuoteRequest::new(symbol.clone(), captured_at, market_open);

        let routed = self
            .route_endpoint(symbol, Endpoint::Quote, move |provider| {
                provider.quote(req.clone())
            })
            .await;

        let failure = match routed {
            Ok(success) => return Ok(success),
            Err(failure) => failure,
        };
        if !policy.allow_synthetic {
            return Err(failure);
        }

        match self.synthetic.quote(symbol, captured_at, market_open) {
            Ok(quote) => {
                warn!(
                    symbol = %symbol,
                    attempts = failure.attempts.len(),
                    "all providers failed; serving synthetic quote"
                );
                Ok(synthetic_success(quote, failure, started))
            }
            Err(error) => {
                warn!(symbol = %symbol, error = %error, "synthetic quote rejected by normalizer");
                Err(failure)
            }
        }
    }

    pub async fn fetch_history(
        &self,
        symbol: &Symbol,
        range: HistoryRange,
        policy: FallbackPolicy,
    ) -> Result<RouteSuccess<PriceHistory>, AllSourcesUnavailable> {
        let started = Instant::now();
        let captured_at = UtcDateTime::now();
        let req = HistoryRequest::new(symbol.clone(), range, captured_at);

        let routed = self
            .route_endpoint(symbol, Endpoint::History, move |provider| {
                provider.history(req.clone())
            })
            .await;

        match routed {
            Ok(success) => Ok(success),
            Err(failure) if policy.allow_synthetic => {
                warn!(
                    symbol = %symbol,
                    range = %range,
                    "all providers failed; serving synthetic history"
                );
                let history = self.synthetic.history(symbol, range, captured_at);
                Ok(synthetic_success(history, failure, started))
            }
            Err(failure) => Err(failure),
        }
    }

    async fn route_endpoint<T, F>(
        &self,
        symbol: &Symbol,
        endpoint: Endpoint,
        mut invoke: F,
    ) -> Result<RouteSuccess<T>, AllSourcesUnavailable>
    where
        F: for<'a> FnMut(&'a dyn QuoteProvider) -> ProviderFuture<'a, T>,
    {
        let started = Instant::now();
        let mut source_chain = Vec::new();
        let mut attempts = Vec::new();

        for provider_id in self.source_chain(endpoint) {
            source_chain.push(provider_id);
            let call_started = Instant::now();

            let outcome = match self.provider(provider_id) {
                None => Err(SourceError::new(
                    SourceErrorKind::Unsupported,
                    format!("provider '{provider_id}' is not configured"),
                )),
                Some(provider) if !provider.capabilities().supports(endpoint) => {
                    Err(SourceError::unsupported(provider_id, endpoint))
                }
                Some(provider) => {
                    debug!(provider = %provider_id, %symbol, %endpoint, "calling provider");
                    match tokio::time::timeout(self.provider_timeout, invoke(provider.as_ref()))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(SourceError::timeout(format!(
                            "{provider_id} did not answer within {}ms",
                            self.provider_timeout.as_millis()
                        ))),
                    }
                }
            };

            match outcome {
                Ok(data) => {
                    if !attempts.is_empty() {
                        info!(
                            provider = %provider_id,
                            %symbol,
                            failed = attempts.len(),
                            "fallback succeeded"
                        );
                    }
                    return Ok(RouteSuccess {
                        data,
                        selected_source: QuoteSource::Provider(provider_id),
                        source_chain,
                        attempts,
                        latency_ms: elapsed_ms(started),
                    });
                }
                Err(error) => {
                    warn!(
                        provider = %provider_id,
                        %symbol,
                        %endpoint,
                        code = error.code(),
                        error = %error.message(),
                        "provider call failed"
                    );
                    attempts.push(Attempt {
                        provider: provider_id,
                        error,
                        latency_ms: elapsed_ms(call_started),
                    });
                }
            }
        }

        warn!(%symbol, %endpoint, attempts = attempts.len(), "all sources unavailable");
        Err(AllSourcesUnavailable {
            symbol: symbol.clone(),
            endpoint,
            attempts,
        })
    }

    fn provider(&self, id: ProviderId) -> Option<&Arc<dyn QuoteProvider>> {
        self.providers.iter().find(|provider| provider.id() == id)
    }
}

fn synthetic_success<T>(
    data: T,
    failure: AllSourcesUnavailable,
    started: Instant,
) -> RouteSuccess<T> {
    RouteSuccess {
        data,
        selected_source: QuoteSource::Synthetic,
        source_chain: failure.attempts.iter().map(|attempt| attempt.provider).collect(),
        attempts: failure.attempts,
        latency_ms: elapsed_ms(started),
    }
}

/// Builds a router with real HTTP adapters.
///
/// Yahoo is always registered; key-based providers only when a key is set.
///
/// | Provider | Key |
/// |----------|-----|
/// | Yahoo | none |
/// | Finnhub | `with_finnhub_key` |
/// | Twelve Data | `with_twelvedata_key` |
/// | Alpha Vantage | `with_alphavantage_key` |
pub struct QuoteRouterBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    reference: ReferenceData,
    finnhub_api_key: Option<String>,
    twelvedata_api_key: Option<String>,
    alphavantage_api_key: Option<String>,
    enable_yahoo: bool,
    provider_timeout: Duration,
    strategy: SourceStrategy,
    calendar: ExchangeCalendar,
    synthetic_seed: Option<u64>,
}

impl Default for QuoteRouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteRouterBuilder {
    pub fn new() -> Self {
        Self {
            http_client: None,
            reference: ReferenceData::default(),
            finnhub_api_key: None,
            twelvedata_api_key: None,
            alphavantage_api_key: None,
            enable_yahoo: true,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            strategy: SourceStrategy::Configured,
            calendar: ExchangeCalendar::nyse(),
            synthetic_seed: None,
        }
    }

    /// Keys, reference data and timeout taken from the dashboard configuration.
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new()
            .with_reference_data(config.reference.clone())
            .with_finnhub_key(config.api_keys.finnhub.clone())
            .with_twelvedata_key(config.api_keys.twelvedata.clone())
            .with_alphavantage_key(config.api_keys.alphavantage.clone())
            .with_provider_timeout(config.provider_timeout)
    }

    /// Transport shared by every adapter. Defaults to reqwest.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_reference_data(mut self, reference: ReferenceData) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_finnhub_key(mut self, key: Option<String>) -> Self {
        self.finnhub_api_key = non_empty(key);
        self
    }

    pub fn with_twelvedata_key(mut self, key: Option<String>) -> Self {
        self.twelvedata_api_key = non_empty(key);
        self
    }

    pub fn with_alphavantage_key(mut self, key: Option<String>) -> Self {
        self.alphavantage_api_key = non_empty(key);
        self
    }

    pub fn with_yahoo_enabled(mut self, enabled: bool) -> Self {
        self.enable_yahoo = enabled;
        self
    }

    pub fn with_provider_timeout(mut self, provider_timeout: Duration) -> Self {
        self.provider_timeout = provider_timeout;
        self
    }

    pub fn with_strategy(mut self, strategy: SourceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_calendar(mut self, calendar: ExchangeCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_synthetic_seed(mut self, seed: u64) -> Self {
        self.synthetic_seed = Some(seed);
        self
    }

    pub fn build(self) -> QuoteRouter {
        let http_client = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let timeout_ms = self.provider_timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        let mut providers: Vec<Arc<dyn QuoteProvider>> = Vec::with_capacity(4);

        if self.enable_yahoo {
            providers.push(Arc::new(
                YahooAdapter::new(http_client.clone(), self.reference.clone())
                    .with_timeout_ms(timeout_ms),
            ));
        }
        if let Some(key) = self.finnhub_api_key {
            providers.push(Arc::new(
                FinnhubAdapter::new(http_client.clone(), key, self.reference.clone())
                    .with_timeout_ms(timeout_ms),
            ));
        }
        if let Some(key) = self.twelvedata_api_key {
            providers.push(Arc::new(
                TwelveDataAdapter::new(http_client.clone(), key, self.reference.clone())
                    .with_timeout_ms(timeout_ms),
            ));
        }
        if let Some(key) = self.alphavantage_api_key {
            providers.push(Arc::new(
                AlphaVantageAdapter::new(http_client, key, self.reference.clone())
                    .with_timeout_ms(timeout_ms),
            ));
        }

        let synthetic = match self.synthetic_seed {
            Some(seed) => SyntheticQuotes::with_seed(self.reference, seed),
            None => SyntheticQuotes::new(self.reference),
        };

        info!(
            providers = ?providers.iter().map(|p| p.id().as_str()).collect::<Vec<_>>(),
            "quote router configured"
        );

        QuoteRouter::new(providers)
            .with_strategy(self.strategy)
            .with_provider_timeout(self.provider_timeout)
            .with_calendar(self.calendar)
            .with_synthetic(synthetic)
    }
}

fn non_empty(key: Option<String>) -> Option<String> {
    key.map(|key| key.trim().to_owned())
        .filter(|key| !key.is_empty())
}

fn dedupe_chain(chain: &[ProviderId]) -> Vec<ProviderId> {
    let mut seen = HashSet::new();
    let mut output = Vec::with_capacity(chain.len());

    for provider in chain {
        if seen.insert(*provider) {
            output.push(*provider);
        }
    }

    output
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
