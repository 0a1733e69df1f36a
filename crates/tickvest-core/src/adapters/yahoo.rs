use std::sync::Arc;

use serde::Deserialize;

use super::{decode, Upstream};
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::data_source::{
    CapabilitySet, HistoryRequest, ProviderFuture, QuoteProvider, QuoteRequest, SourceError,
};
use crate::http_client::{HttpClient, HttpRequest, BROWSER_USER_AGENT};
use crate::normalize::{lenient_f64, normalize_quote, QuoteContext, RawQuote, ReferenceData};
use crate::{PriceHistory, PricePoint, ProviderId, Quote, QuoteSource, Symbol, UtcDateTime};

/// Yahoo Finance chart adapter. Primary source; no API key.
#[derive(Clone)]
pub struct YahooAdapter {
    upstream: Upstream,
    base_url: String,
    reference: ReferenceData,
}

impl YahooAdapter {
    pub const DEFAULT_BASE_URL: &'static str = "https://query1.finance.yahoo.com";

    pub fn new(http_client: Arc<dyn HttpClient>, reference: ReferenceData) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Yahoo, http_client),
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

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.upstream.set_timeout_ms(timeout_ms);
        self
    }

    // Yahoo blocks requests that do not look like a browser session.
    fn chart_request(&self, symbol: &Symbol, interval: &str, range: &str) -> HttpRequest {
        HttpRequest::get(format!(
            "{}/v8/finance/chart/{}?interval={interval}&range={range}",
            self.base_url,
            urlencoding::encode(symbol.as_str())
        ))
        .with_header("user-agent", BROWSER_USER_AGENT)
        .with_header("referer", "https://finance.yahoo.com/")
        .with_header("accept", "application/json")
    }

    async fn fetch_quote(&self, req: QuoteRequest) -> Result<Quote, SourceError> {
        let request = self.chart_request(&req.symbol, "1d", "1d");
        self.upstream
            .call(request, |body| {
                let result = first_result(body)?;
                let raw = result.raw_quote();
                normalize_quote(
                    &raw,
                    QuoteContext {
                        symbol: &req.symbol,
                        source: QuoteSource::Provider(ProviderId::Yahoo),
                        captured_at: req.captured_at,
                        market_open: req.market_open,
                        reference: &self.reference,
                    },
                )
            })
            .await
    }

    async fn fetch_history(&self, req: HistoryRequest) -> Result<PriceHistory, SourceError> {
        let request = self.chart_request(
            &req.symbol,
            req.range.bar_interval(),
            req.range.as_str(),
        );
        self.upstream
            .call(request, |body| {
                let points = first_result(body)?.price_points()?;
                Ok(PriceHistory {
                    symbol: req.symbol.clone(),
                    range: req.range,
                    source: QuoteSource::Provider(ProviderId::Yahoo),
                    points,
                })
            })
            .await
    }
}

impl QuoteProvider for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> ProviderFuture<'a, Quote> {
        Box::pin(self.fetch_quote(req))
    }

    fn history<'a>(&'a self, req: HistoryRequest) -> ProviderFuture<'a, PriceHistory> {
        Box::pin(self.fetch_history(req))
    }

    fn circuit_state(&self) -> CircuitState {
        self.upstream.circuit_breaker().state()
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default, deserialize_with = "lenient_f64")]
    regular_market_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    previous_close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    chart_previous_close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    regular_market_open: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    regular_market_day_high: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    regular_market_day_low: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    regular_market_volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    fifty_two_week_high: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    fifty_two_week_low: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl ChartResult {
    fn series(&self) -> Option<&ChartSeries> {
        self.indicators.quote.first()
    }

    fn raw_quote(&self) -> RawQuote {
        let meta = &self.meta;
        let first_open = self
            .series()
            .and_then(|series| series.open.iter().flatten().copied().next());

        RawQuote {
            price: meta.regular_market_price,
            previous_close: meta.previous_close.or(meta.chart_previous_close),
            day_high: meta.regular_market_day_high,
            day_low: meta.regular_market_day_low,
            open: meta.regular_market_open.or(first_open),
            volume: meta.regular_market_volume,
            week52_high: meta.fifty_two_week_high,
            week52_low: meta.fifty_two_week_low,
            ..RawQuote::default()
        }
    }

    /// Zips the parallel bar arrays, skipping slots without a close.
    fn price_points(&self) -> Result<Vec<PricePoint>, SourceError> {
        let Some(series) = self.series() else {
            return Err(SourceError::malformed("yahoo chart has no quote indicators"));
        };

        let mut points = Vec::with_capacity(self.timestamp.len());
        for (index, epoch) in self.timestamp.iter().enumerate() {
            let Some(close) = value_at(&series.close, index).filter(|close| *close > 0.0) else {
                continue;
            };
            let timestamp = UtcDateTime::from_unix_timestamp(*epoch).map_err(|_| {
                SourceError::malformed(format!("yahoo chart timestamp {epoch} is out of range"))
            })?;
            let open = value_at(&series.open, index).unwrap_or(close);
            points.push(PricePoint {
                timestamp,
                open,
                high: value_at(&series.high, index)
                    .unwrap_or(close)
                    .max(open.max(close)),
                low: value_at(&series.low, index)
                    .unwrap_or(close)
                    .min(open.min(close)),
                close,
                volume: value_at(&series.volume, index)
                    .map(|volume| volume.max(0.0).round() as u64)
                    .unwrap_or(0),
            });
        }

        if points.is_empty() {
            return Err(SourceError::malformed("yahoo chart returned no usable bars"));
        }
        points.sort_by_key(|point| point.timestamp);
        Ok(points)
    }
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values
        .get(index)
        .copied()
        .flatten()
        .filter(|value| value.is_finite())
}

fn first_result(body: &str) -> Result<ChartResult, SourceError> {
    let envelope: ChartEnvelope = decode(ProviderId::Yahoo, body)?;
    if let Some(error) = envelope.chart.error {
        return Err(SourceError::malformed(format!(
            "yahoo chart error {}: {}",
            error.code.as_deref().unwrap_or("unknown"),
            error.description.as_deref().unwrap_or("no description")
        )));
    }

    envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| SourceError::malformed("yahoo chart response has no result"))
}
