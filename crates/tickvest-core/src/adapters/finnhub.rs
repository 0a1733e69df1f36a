use std::sync::Arc;

use serde::Deserialize;

use super::{decode, Upstream};
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::data_source::{CapabilitySet, ProviderFuture, QuoteProvider, QuoteRequest, SourceError};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::normalize::{lenient_f64, normalize_quote, QuoteContext, RawQuote, ReferenceData};
use crate::throttling::RateBudget;
use crate::{ProviderId, Quote, QuoteSource};

/// Finnhub `/quote` adapter.
#[derive(Clone)]
pub struct FinnhubAdapter {
    upstream: Upstream,
    auth: HttpAuth,
    base_url: String,
    reference: ReferenceData,
}

impl FinnhubAdapter {
    pub const DEFAULT_BASE_URL: &'static str = "https://finnhub.io";

    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        reference: ReferenceData,
    ) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Finnhub, http_client),
            auth: HttpAuth::Header {
                name: String::from("X-Finnhub-Token"),
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
            "{}/api/v1/quote?symbol={}",
            self.base_url,
            urlencoding::encode(req.symbol.as_str())
        ))
        .with_auth(&self.auth);

        self.upstream
            .call(request, |body| {
                let payload: FinnhubQuote = decode(ProviderId::Finnhub, body)?;
                normalize_quote(
                    &payload.into_raw(),
                    QuoteContext {
                        symbol: &req.symbol,
                        source: QuoteSource::Provider(ProviderId::Finnhub),
                        captured_at: req.captured_at,
                        market_open: req.market_open,
                        reference: &self.reference,
                    },
                )
            })
            .await
    }
}

impl QuoteProvider for FinnhubAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Finnhub
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

/// Finnhub answers unknown symbols with all-zero fields; the zero price is
/// rejected by the normalizer.
#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    #[serde(rename = "c", default, deserialize_with = "lenient_f64")]
    current: Option<f64>,
    #[serde(rename = "pc", default, deserialize_with = "lenient_f64")]
    previous_close: Option<f64>,
    #[serde(rename = "h", default, deserialize_with = "lenient_f64")]
    high: Option<f64>,
    #[serde(rename = "l", default, deserialize_with = "lenient_f64")]
    low: Option<f64>,
    #[serde(rename = "o", default, deserialize_with = "lenient_f64")]
    open: Option<f64>,
}

impl FinnhubQuote {
    fn into_raw(self) -> RawQuote {
        RawQuote {
            price: self.current,
            previous_close: self.previous_close,
            day_high: self.high,
            day_low: self.low,
            open: self.open,
            ..RawQuote::default()
        }
    }
}
