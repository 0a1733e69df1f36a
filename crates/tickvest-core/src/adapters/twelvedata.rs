use std::sync::Arc;

use serde::Deserialize;

use super::{decode, Upstream};
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::data_source::{CapabilitySet, ProviderFuture, QuoteProvider, QuoteRequest, SourceError};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::normalize::{lenient_f64, normalize_quote, QuoteContext, RawQuote, ReferenceData};
use crate::throttling::RateBudget;
use crate::{ProviderId, Quote, QuoteSource};

/// Twelve Data `/quote` adapter.
#[derive(Clone)]
pub struct TwelveDataAdapter {
    upstream: Upstream,
    auth: HttpAuth,
    base_url: String,
    reference: ReferenceData,
}

impl TwelveDataAdapter {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.twelvedata.com";

    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        reference: ReferenceData,
    ) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Twelvedata, http_client),
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
            "{}/quote?symbol={}",
            self.base_url,
            urlencoding::encode(req.symbol.as_str())
        ))
        .with_auth(&self.auth);

        self.upstream
            .call(request, |body| {
                let payload: TwelveDataQuote = decode(ProviderId::Twelvedata, body)?;
                payload.check_status()?;
                normalize_quote(
                    &payload.into_raw(),
                    QuoteContext {
                        symbol: &req.symbol,
                        source: QuoteSource::Provider(ProviderId::Twelvedata),
                        captured_at: req.captured_at,
                        market_open: req.market_open,
                        reference: &self.reference,
                    },
                )
            })
            .await
    }
}

impl QuoteProvider for TwelveDataAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Twelvedata
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

/// Twelve Data encodes every number as a string and reports errors in a
/// 200 body with `"status": "error"`.
#[derive(Debug, Deserialize)]
struct TwelveDataQuote {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(alias = "price", default, deserialize_with = "lenient_f64")]
    close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    previous_close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    open: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    high: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    low: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    average_volume: Option<f64>,
    #[serde(default)]
    fifty_two_week: Option<TwelveDataRange>,
}

#[derive(Debug, Deserialize)]
struct TwelveDataRange {
    #[serde(default, deserialize_with = "lenient_f64")]
    low: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    high: Option<f64>,
}

impl TwelveDataQuote {
    fn check_status(&self) -> Result<(), SourceError> {
        if self.status.as_deref() != Some("error") {
            return Ok(());
        }
        let message = format!(
            "twelvedata error: {}",
            self.message.as_deref().unwrap_or("no message")
        );
        match self.code {
            Some(429) => Err(SourceError::rate_limited(message)),
            Some(code) if code >= 400 => Err(SourceError::http_status(code, message)),
            _ => Err(SourceError::malformed(message)),
        }
    }

    fn into_raw(self) -> RawQuote {
        let (week52_low, week52_high) = self
            .fifty_two_week
            .map(|range| (range.low, range.high))
            .unwrap_or((None, None));
        RawQuote {
            price: self.close,
            previous_close: self.previous_close,
            day_high: self.high,
            day_low: self.low,
            open: self.open,
            volume: self.volume,
            avg_volume: self.average_volume,
            week52_high,
            week52_low,
            ..RawQuote::default()
        }
    }
}
