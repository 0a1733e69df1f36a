//! `/api/*` routes.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /api/quote?symbol=` | canonical quote, freshly fetched |
//! | `GET /api/portfolio` | quote, metrics, milestones, projections |
//! | `GET /api/vesting?asOf=` | vesting analytics at the current price |
//! | `GET /api/history?symbol=&range=` | price bars and indicators |
//! | `GET /api/status` | session state and poller health |

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tickvest_core::{
    parse_date, HistoryRange, IndicatorSnapshot, PortfolioSummary, PriceHistory, ProviderId,
    Quote, QuoteSource, SourceSnapshot, Symbol, UtcDateTime, VestingAnalytics,
};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::error::ApiResult;
use crate::state::AppState;

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

pub fn app_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/quote", get(quote))
        .route("/api/portfolio", get(portfolio))
        .route("/api/vesting", get(vesting))
        .route("/api/history", get(history))
        .route("/api/status", get(status))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(NO_CACHE),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SymbolParams {
    symbol: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    #[serde(flatten)]
    quote: Quote,
    /// Milliseconds until the next scheduled refresh.
    next_update: u64,
    source_chain: Vec<ProviderId>,
}

async fn quote(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SymbolParams>,
) -> ApiResult<Json<QuoteResponse>> {
    let symbol = requested_symbol(&state, params.symbol.as_deref())?;
    let routed = state
        .router
        .fetch_quote(&symbol, state.config.fallback)
        .await?;
    let next_update = millis(state.config.cadence.interval(routed.data.is_market_open));

    Ok(Json(QuoteResponse {
        quote: routed.data,
        next_update,
        source_chain: routed.source_chain,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PortfolioResponse {
    quote: Quote,
    #[serde(flatten)]
    summary: PortfolioSummary,
}

async fn portfolio(State(state): State<Arc<AppState>>) -> ApiResult<Json<PortfolioResponse>> {
    let quote = state.dashboard_quote().await?;
    let summary = PortfolioSummary::build(&state.config.holdings, &quote, state.today());

    Ok(Json(PortfolioResponse { quote, summary }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VestingParams {
    as_of: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VestingResponse {
    /// Where the valuation price came from.
    source: QuoteSource,
    #[serde(flatten)]
    analytics: VestingAnalytics,
}

async fn vesting(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VestingParams>,
) -> ApiResult<Json<VestingResponse>> {
    let as_of = match params.as_of.as_deref().filter(|value| !value.trim().is_empty()) {
        Some(value) => parse_date(value)?,
        None => state.today(),
    };
    let quote = state.dashboard_quote().await?;
    let analytics =
        VestingAnalytics::analyze(&state.config.schedule, quote.price, &state.config.tax, as_of)?;

    Ok(Json(VestingResponse {
        source: quote.source,
        analytics,
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    symbol: Option<String>,
    range: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    history: PriceHistory,
    indicators: IndicatorSnapshot,
    source_chain: Vec<ProviderId>,
}

async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryResponse>> {
    let symbol = requested_symbol(&state, params.symbol.as_deref())?;
    let range = match params.range.as_deref() {
        Some(value) => value.parse::<HistoryRange>()?,
        None => HistoryRange::default(),
    };
    let routed = state
        .router
        .fetch_history(&symbol, range, state.config.fallback)
        .await?;
    let indicators = IndicatorSnapshot::from_closes(&routed.data.closes());

    Ok(Json(HistoryResponse {
        history: routed.data,
        indicators,
        source_chain: routed.source_chain,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    symbol: Symbol,
    market_open: bool,
    poll_interval_ms: u64,
    allow_synthetic: bool,
    last_price: Option<f64>,
    last_source: Option<QuoteSource>,
    last_success: Option<UtcDateTime>,
    last_error: Option<String>,
    source_chain: Vec<ProviderId>,
    sources: Vec<SourceSnapshot>,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let now = UtcDateTime::now();
    let poll = state.poller.state();

    Json(StatusResponse {
        symbol: state.config.symbol.clone(),
        market_open: state.router.calendar().is_open(now),
        poll_interval_ms: millis(state.poller.interval_at(now)),
        allow_synthetic: state.config.fallback.allow_synthetic,
        last_price: poll.quote.as_ref().map(|quote| quote.price),
        last_source: poll.quote.as_ref().map(|quote| quote.source),
        last_success: poll.last_success,
        last_error: poll.last_error,
        source_chain: poll.source_chain,
        sources: state.router.sources(),
    })
}

/// Blank or missing `symbol` falls back to the configured one.
fn requested_symbol(state: &AppState, raw: Option<&str>) -> ApiResult<Symbol> {
    match raw.filter(|value| !value.trim().is_empty()) {
        Some(value) => Ok(Symbol::parse(value)?),
        None => Ok(state.config.symbol.clone()),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tickvest_core::{
        normalize_quote, CapabilitySet, DashboardConfig, ProviderFuture, QuoteContext,
        QuoteProvider, QuoteRequest, QuoteRouter, RawQuote, ReferenceData, SourceError,
    };
    use tower::ServiceExt;

    use super::*;

    const GRANTS: &str = r#"[
        {"grantId":"RSU-1","grantDate":"2024-03-01","grantPrice":6.10,"vestDate":"2025-03-15","shares":2500},
        {"grantId":"RSU-1","grantDate":"2024-03-01","grantPrice":6.10,"vestDate":"2025-09-15","shares":2500}
    ]"#;

    struct FixedProvider {
        price: f64,
    }

    impl QuoteProvider for FixedProvider {
        fn id(&self) -> ProviderId {
            ProviderId::Yahoo
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::quote_only()
        }

        fn quote<'a>(&'a self, req: QuoteRequest) -> ProviderFuture<'a, Quote> {
            let raw = RawQuote {
                price: Some(self.price),
                previous_close: Some(5.10),
                ..RawQuote::default()
            };
            let result = normalize_quote(
                &raw,
                QuoteContext {
                    symbol: &req.symbol,
                    source: QuoteSource::Provider(ProviderId::Yahoo),
                    captured_at: req.captured_at,
                    market_open: req.market_open,
                    reference: &ReferenceData::default(),
                },
            );
            Box::pin(async move { result })
        }
    }

    struct DownProvider(ProviderId);

    impl QuoteProvider for DownProvider {
        fn id(&self) -> ProviderId {
            self.0
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::quote_only()
        }

        fn quote<'a>(&'a self, _req: QuoteRequest) -> ProviderFuture<'a, Quote> {
            Box::pin(async { Err(SourceError::http_status(503, "service unavailable")) })
        }
    }

    fn config(extra: &[(&str, &str)]) -> DashboardConfig {
        let extra: Vec<(String, String)> = extra
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        DashboardConfig::from_lookup(|key| {
            if key == "TICKVEST_GRANTS" {
                return Some(GRANTS.to_owned());
            }
            extra
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        })
        .expect("valid test configuration")
    }

    fn app(providers: Vec<Arc<dyn QuoteProvider>>, config: DashboardConfig) -> Router {
        let state = AppState::new(config, QuoteRouter::new(providers));
        app_router(Arc::new(state))
    }

    fn healthy() -> Router {
        app(vec![Arc::new(FixedProvider { price: 5.25 })], config(&[]))
    }

    fn all_down() -> Vec<Arc<dyn QuoteProvider>> {
        vec![
            Arc::new(DownProvider(ProviderId::Yahoo)),
            Arc::new(DownProvider(ProviderId::Finnhub)),
            Arc::new(DownProvider(ProviderId::Twelvedata)),
        ]
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).expect("json body");
        (status, headers, json)
    }

    #[tokio::test]
    async fn quote_defaults_to_configured_symbol() {
        let (status, _, body) = get_json(healthy(), "/api/quote").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "UWMC");
        assert_eq!(body["price"], 5.25);
        assert_eq!(body["source"], "yahoo");
        assert_eq!(body["sourceChain"], serde_json::json!(["yahoo"]));
        assert!(body["nextUpdate"].is_u64());
    }

    #[tokio::test]
    async fn quote_accepts_symbol_parameter() {
        let (status, _, body) = get_json(healthy(), "/api/quote?symbol=aapl").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "AAPL");
    }

    #[tokio::test]
    async fn responses_disable_caching_and_allow_any_origin() {
        let response = healthy()
            .oneshot(
                Request::get("/api/quote")
                    .header(header::ORIGIN, "http://dashboard.local")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router is infallible");

        let headers = response.headers();
        assert_eq!(headers[header::CACHE_CONTROL], NO_CACHE);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn exhausted_chain_returns_503_with_attempts() {
        let (status, headers, body) =
            get_json(app(all_down(), config(&[])), "/api/quote?symbol=UWMC").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(headers[header::CACHE_CONTROL], NO_CACHE);
        assert_eq!(body["error"], "sources_unavailable");
        assert!(body["message"]
            .as_str()
            .is_some_and(|message| message.contains("all sources unavailable")));
        let attempts = body["details"]["attempts"].as_array().expect("attempts");
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0]["error"]["code"], "source.http_status");
    }

    #[tokio::test]
    async fn synthetic_fallback_is_tagged_when_enabled() {
        let app = app(all_down(), config(&[("TICKVEST_ALLOW_SYNTHETIC", "true")]));

        let (status, _, body) = get_json(app, "/api/quote").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "synthetic");
    }

    #[tokio::test]
    async fn invalid_symbol_is_a_bad_request() {
        let (status, _, body) = get_json(healthy(), "/api/quote?symbol=%24%24%24").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
        assert!(body["details"].is_null());
    }

    #[tokio::test]
    async fn portfolio_combines_quote_and_metrics() {
        let (status, _, body) = get_json(healthy(), "/api/portfolio").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quote"]["price"], 5.25);
        assert_eq!(body["metrics"]["shares"], 9876);
        assert_eq!(body["milestones"].as_array().map(Vec::len), Some(4));
        assert_eq!(body["projections"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn vesting_honours_as_of_parameter() {
        let (status, _, body) = get_json(healthy(), "/api/vesting?asOf=2025-06-01").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "yahoo");
        assert_eq!(body["asOf"], "2025-06-01");
        assert_eq!(body["totalVested"], 2500);
        assert_eq!(body["nextVesting"]["vestDate"], "2025-09-15");
    }

    #[tokio::test]
    async fn vesting_rejects_malformed_date() {
        let (status, _, body) = get_json(healthy(), "/api/vesting?asOf=06/01/2025").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn history_without_chart_provider_is_unavailable() {
        // Given: the only provider is quote-only
        let (status, _, body) = get_json(healthy(), "/api/history?range=1mo").await;

        // Then
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["details"]["endpoint"], "history");
    }

    #[tokio::test]
    async fn history_rejects_unknown_range() {
        let (status, _, _) = get_json(healthy(), "/api/history?range=10y").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn synthetic_history_carries_indicators() {
        let app = app(all_down(), config(&[("TICKVEST_ALLOW_SYNTHETIC", "1")]));

        let (status, _, body) = get_json(app, "/api/history?range=3mo").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["history"]["source"], "synthetic");
        assert!(body["indicators"]["sma20"].is_number());
        assert!(body["indicators"]["rsi14"].is_number());
    }

    #[tokio::test]
    async fn status_reports_sources_before_first_poll() {
        let (status, _, body) = get_json(healthy(), "/api/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "UWMC");
        assert!(body["marketOpen"].is_boolean());
        assert!(body["lastSuccess"].is_null());
        assert_eq!(body["sources"][0]["id"], "yahoo");
    }
}
