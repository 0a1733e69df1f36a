use std::sync::Arc;

use serde::Deserialize;

use super::{decode, Upstream};
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::data_source::{CapabilitySet, ProviderFuture, QuoteProvider, QuoteRequest, SourceError};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::normalize::{lenient_f64, normalize_quote, QuoteContext, RawQuote, ReferenceData};
use crate::throttling::RateBudget;
use crate::{ProviderId, Quote, QuoteSource};

/// Alpha Vantage `GLOBAL_QUOTE` adapter. Lowest priority: the free tier
/// allows 5 calls per minute.
#[derive(Clone)]
pub struct AlphaVantageAdapter {
    upstream: Upstream,
    auth: HttpAuth,
    base_url: String,
    reference: ReferenceData,
}

impl AlphaVantageAdapter {
    pub const DEFAULT_BASE_URL: &'static str = "https://www.alphavantage.co";

    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        reference: ReferenceData,
    ) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Alphavantage, http_client),
            auth: HttpAuth::QueryParam {
                name: String::from("apikey"),
                value: api_key.into(),
            },
            base_url: String::from(Self::DEFAULT_BASE_URL),
            reference,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.upstream.set_circuit_breaker(circuit_breaker);
        self
    }

    pub fn with_rate_budget(mut self, rate_budget: Option<RateBudget>) -> Self {
        self.upstream.set_rate_budget(rate_budget);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.upstream.set_timeout_ms(timeout_ms);
        self
    }

    async fn fetch_quote(&self, req: QuoteRequest) -> Result<Quote, SourceError> {
        let request = HttpRequest::get(format!(
            "{}/query?function=GLOBAL_QUOTE&symbol={}",
            self.base_url,
            urlencoding::encode(req.symbol.as_str())
        ))
        .with_auth(&self.auth);

        self.upstream
            .call(request, |body| {
                let payload: AlphaVantageResponse = decode(ProviderId::Alphavantage, body)?;
                let quote = payload.into_quote()?;
                normalize_quote(
                    &quote.into_raw(),
                    QuoteContext {
                        symbol: &req.symbol,
                        source: QuoteSource::Provider(ProviderId::Alphavantage),
                        captured_at: req.captured_at,
                        market_open: req.market_open,
                        reference: &self.reference,
                    },
                )
            })
            .await
    }
}

impl QuoteProvider for AlphaVantageAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Alphavantage
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::quote_only()
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> ProviderFuture<'a, Quote> {
        Box::pin(self.fetch_quote(req))
    }

    fn circuit_state(&self) -> CircuitState {
        self.upstream.circuit_breaker().state()
    }
}

#[derive(Debug, Deserialize)]
struct AlphaVantageResponse {
    #[serde(rename = "Global Quote", default)]
    quote: Option<GlobalQuote>,
    /// Quota notices arrive as a 200 with one of these keys.
    #[serde(rename = "Note", default)]
    note: Option<String>,
    #[serde(rename = "Information", default)]
    information: Option<String>,
    #[serde(rename = "Error Message", default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price", default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(rename = "08. previous close", default, deserialize_with = "lenient_f64")]
    previous_close: Option<f64>,
    #[serde(rename = "02. open", default, deserialize_with = "lenient_f64")]
    open: Option<f64>,
    #[serde(rename = "03. high", default, deserialize_with = "lenient_f64")]
    high: Option<f64>,
    #[serde(rename = "04. low", default, deserialize_with = "lenient_f64")]
    low: Option<f64>,
    #[serde(rename = "06. volume", default, deserialize_with = "lenient_f64")]
    volume: Option<f64>,
}

impl AlphaVantageResponse {
    fn into_quote(self) -> Result<GlobalQuote, SourceError> {
        if let Some(notice) = self.note.or(self.information) {
            return Err(SourceError::rate_limited(format!(
                "alphavantage quota notice: {notice}"
            )));
        }
        if let Some(message) = self.error_message {
            return Err(SourceError::malformed(format!("alphavantage error: {message}")));
        }
        self.quote
            .ok_or_else(|| SourceError::malformed("alphavantage response has no 'Global Quote'"))
    }
}

impl GlobalQuote {
    fn into_raw(self) -> RawQuote {
        RawQuote {
            price: self.price,
            previous_close: self.previous_close,
            day_high: self.high,
            day_low: self.low,
            open: self.open,
            volume: self.volume,
            ..RawQuote::default()
        }
    }
}
