//! Shared doubles for the integration suites.
#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tickvest_core::{
    CapabilitySet, HttpClient, HttpError, HttpRequest, HttpResponse, ProviderFuture, ProviderId,
    Quote, QuoteProvider, QuoteRequest, QuoteSource, RawQuote, ReferenceData, SourceError,
    UtcDateTime, normalize_quote, QuoteContext,
};

pub const YAHOO_CHART: &str = include_str!("../fixtures/yahoo_chart.json");
pub const YAHOO_CHART_HISTORY: &str = include_str!("../fixtures/yahoo_chart_history.json");
pub const FINNHUB_QUOTE: &str = include_str!("../fixtures/finnhub_quote.json");
pub const TWELVEDATA_QUOTE: &str = include_str!("../fixtures/twelvedata_quote.json");
pub const ALPHAVANTAGE_QUOTE: &str = include_str!("../fixtures/alphavantage_quote.json");
pub const ALPHAVANTAGE_QUOTA_NOTE: &str = include_str!("../fixtures/alphavantage_quota_note.json");
pub const GRANTS: &str = include_str!("../fixtures/grants.json");

pub fn at(value: &str) -> UtcDateTime {
    UtcDateTime::parse(value).expect("valid timestamp")
}

/// Answers by URL fragment; every request is recorded.
#[derive(Default)]
pub struct RoutedHttpClient {
    routes: Vec<(String, Result<HttpResponse, HttpError>)>,
    requests: Mutex<Vec<String>>,
}

impl RoutedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, fragment: &str, response: Result<HttpResponse, HttpError>) -> Self {
        self.routes.push((fragment.to_owned(), response));
        self
    }

    pub fn json(self, fragment: &str, body: &str) -> Self {
        self.route(fragment, Ok(HttpResponse::ok_json(body)))
    }

    pub fn status(self, fragment: &str, status: u16) -> Self {
        self.route(fragment, Ok(HttpResponse::with_status(status, "")))
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.lock().expect("request log").clone()
    }

    pub fn calls_to(&self, fragment: &str) -> usize {
        self.urls().iter().filter(|url| url.contains(fragment)).count()
    }
}

impl HttpClient for RoutedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("request log")
            .push(request.url.clone());
        let response = self
            .routes
            .iter()
            .find(|(fragment, _)| request.url.contains(fragment.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Err(HttpError::new(format!("no route for {}", request.url))));
        Box::pin(async move { response })
    }
}

/// In-process provider with a fixed answer and a call counter.
pub struct StubProvider {
    id: ProviderId,
    price: Option<f64>,
    error: Option<SourceError>,
    delay: Duration,
    /// Successful answers before switching to a transport error.
    fail_after: Option<usize>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn answering(id: ProviderId, price: f64) -> Arc<Self> {
        Arc::new(Self {
            id,
            price: Some(price),
            error: None,
            delay: Duration::ZERO,
            fail_after: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(id: ProviderId, error: SourceError) -> Arc<Self> {
        Arc::new(Self {
            id,
            price: None,
            error: Some(error),
            delay: Duration::ZERO,
            fail_after: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(id: ProviderId, price: f64, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            price: Some(price),
            error: None,
            delay,
            fail_after: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing_after(id: ProviderId, price: f64, successes: usize) -> Arc<Self> {
        Arc::new(Self {
            id,
            price: Some(price),
            error: None,
            delay: Duration::ZERO,
            fail_after: Some(successes),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self, req: QuoteRequest) -> Result<Quote, SourceError> {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if self.fail_after.is_some_and(|successes| previous >= successes) {
            return Err(SourceError::transport("connection reset"));
        }
        let raw = RawQuote {
            price: self.price,
            previous_close: Some(5.10),
            ..RawQuote::default()
        };
        normalize_quote(
            &raw,
            QuoteContext {
                symbol: &req.symbol,
                source: QuoteSource::Provider(self.id),
                captured_at: req.captured_at,
                market_open: req.market_open,
                reference: &ReferenceData::default(),
            },
        )
    }
}

impl QuoteProvider for StubProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::quote_only()
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> ProviderFuture<'a, Quote> {
        Box::pin(self.answer(req))
    }
}
