//! Behavior of the priority-ordered fallback chain.

mod support;

use std::sync::Arc;
use std::time::Duration;

use support::{at, RoutedHttpClient, StubProvider, FINNHUB_QUOTE, YAHOO_CHART, YAHOO_CHART_HISTORY};
use tickvest_core::{
    Endpoint, FallbackPolicy, HistoryRange, ProviderId, QuoteProvider, QuoteRouter,
    QuoteRouterBuilder, QuoteSource, SourceError, SourceErrorKind, SourceStrategy, Symbol,
};

fn uwmc() -> Symbol {
    Symbol::parse("UWMC").expect("valid symbol")
}

fn router(providers: &[Arc<StubProvider>]) -> QuoteRouter {
    QuoteRouter::new(
        providers
            .iter()
            .map(|provider| provider.clone() as Arc<dyn QuoteProvider>)
            .collect(),
    )
}

// =============================================================================
// Short-circuit
// =============================================================================

#[tokio::test]
async fn first_success_stops_the_chain() {
    // Given: three healthy providers
    let first = StubProvider::answering(ProviderId::Yahoo, 5.30);
    let second = StubProvider::answering(ProviderId::Finnhub, 5.20);
    let third = StubProvider::answering(ProviderId::Twelvedata, 5.10);
    let router = router(&[first.clone(), second.clone(), third.clone()]);

    // When
    let routed = router
        .fetch_quote(&uwmc(), FallbackPolicy::strict())
        .await
        .expect("first provider answers");

    // Then: only the first provider was invoked
    assert_eq!(routed.data.price, 5.30);
    assert_eq!(routed.selected_source, QuoteSource::Provider(ProviderId::Yahoo));
    assert_eq!(routed.source_chain, vec![ProviderId::Yahoo]);
    assert!(routed.attempts.is_empty());
    assert_eq!((first.calls(), second.calls(), third.calls()), (1, 0, 0));
}

#[tokio::test]
async fn failure_falls_through_to_next_provider_in_order() {
    // Given: the primary provider errors
    let first = StubProvider::failing(
        ProviderId::Yahoo,
        SourceError::http_status(503, "yahoo returned status 503"),
    );
    let second = StubProvider::answering(ProviderId::Finnhub, 5.20);
    let third = StubProvider::answering(ProviderId::Twelvedata, 5.10);
    let router = router(&[first.clone(), second.clone(), third.clone()]);

    // When
    let routed = router
        .fetch_quote(&uwmc(), FallbackPolicy::strict())
        .await
        .expect("second provider answers");

    // Then: the second provider's quote is returned and the failure recorded
    assert_eq!(routed.selected_source, QuoteSource::Provider(ProviderId::Finnhub));
    assert_eq!(routed.source_chain, vec![ProviderId::Yahoo, ProviderId::Finnhub]);
    assert_eq!(routed.attempts.len(), 1);
    assert_eq!(routed.attempts[0].provider, ProviderId::Yahoo);
    assert_eq!(third.calls(), 0);
}

// =============================================================================
// Exhaustion
// =============================================================================

#[tokio::test]
async fn exhausted_chain_reports_exactly_one_attempt_per_provider() {
    // Given: three failing providers and no synthetic fallback
    let router = router(&[
        StubProvider::failing(ProviderId::Yahoo, SourceError::timeout("slow")),
        StubProvider::failing(ProviderId::Finnhub, SourceError::malformed("empty")),
        StubProvider::failing(ProviderId::Twelvedata, SourceError::rate_limited("quota")),
    ]);

    // When
    let failure = router
        .fetch_quote(&uwmc(), FallbackPolicy::strict())
        .await
        .expect_err("all providers fail");

    // Then
    assert_eq!(failure.endpoint, Endpoint::Quote);
    assert_eq!(failure.attempts.len(), 3);
    let kinds: Vec<_> = failure.attempts.iter().map(|a| a.error.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            SourceErrorKind::Timeout,
            SourceErrorKind::MalformedResponse,
            SourceErrorKind::RateLimited,
        ]
    );
    assert!(failure.to_string().contains("3 failed attempt(s)"));
}

#[tokio::test]
async fn synthetic_fallback_is_tagged_and_only_used_when_allowed() {
    let failing = || {
        vec![
            StubProvider::failing(ProviderId::Yahoo, SourceError::transport("reset")),
            StubProvider::failing(ProviderId::Finnhub, SourceError::transport("reset")),
        ]
    };

    // Given: the default policy
    let strict = router(&failing()).fetch_quote(&uwmc(), FallbackPolicy::default()).await;
    // Then: no data is fabricated
    assert!(strict.is_err());

    // Given: synthetic fallback explicitly enabled
    let routed = router(&failing())
        .fetch_quote(&uwmc(), FallbackPolicy::synthetic())
        .await
        .expect("synthetic quote served");

    // Then: the quote is unmistakably synthetic and keeps the failure trail
    assert_eq!(routed.selected_source, QuoteSource::Synthetic);
    assert!(routed.data.is_synthetic());
    assert_eq!(routed.attempts.len(), 2);
    let json = serde_json::to_value(&routed.data).expect("serializes");
    assert_eq!(json["source"], "synthetic");
}

#[tokio::test]
async fn slow_provider_is_cut_off_by_the_per_call_timeout() {
    // Given: a provider slower than the router's ceiling
    let slow = StubProvider::slow(ProviderId::Yahoo, 5.30, Duration::from_secs(5));
    let backup = StubProvider::answering(ProviderId::Finnhub, 5.20);
    let router = router(&[slow, backup]).with_provider_timeout(Duration::from_millis(50));

    // When
    let routed = router
        .fetch_quote(&uwmc(), FallbackPolicy::strict())
        .await
        .expect("backup answers");

    // Then
    assert_eq!(routed.selected_source, QuoteSource::Provider(ProviderId::Finnhub));
    assert_eq!(routed.attempts[0].error.kind(), SourceErrorKind::Timeout);
}

// =============================================================================
// Strategies and real adapters
// =============================================================================

#[tokio::test]
async fn priority_strategy_reorders_and_reports_missing_providers() {
    let yahoo = StubProvider::answering(ProviderId::Yahoo, 5.30);
    let router = router(&[yahoo.clone()]).with_strategy(SourceStrategy::Priority(vec![
        ProviderId::Alphavantage,
        ProviderId::Yahoo,
    ]));

    let routed = router
        .fetch_quote(&uwmc(), FallbackPolicy::strict())
        .await
        .expect("yahoo answers second");

    assert_eq!(routed.attempts[0].provider, ProviderId::Alphavantage);
    assert_eq!(routed.attempts[0].error.kind(), SourceErrorKind::Unsupported);
    assert_eq!(yahoo.calls(), 1);
}

#[tokio::test]
async fn builder_chain_falls_back_from_yahoo_to_finnhub_over_http() {
    // Given: Yahoo throttles and Finnhub has a key
    let client = Arc::new(
        RoutedHttpClient::new()
            .status("finance.yahoo.com", 429)
            .json("finnhub.io", FINNHUB_QUOTE),
    );
    let router = QuoteRouterBuilder::new()
        .with_http_client(client.clone())
        .with_finnhub_key(Some(String::from("fh")))
        .build();

    // When
    let routed = router
        .fetch_quote_at(&uwmc(), FallbackPolicy::strict(), at("2025-08-05T15:00:00Z"))
        .await
        .expect("finnhub answers");

    // Then
    assert_eq!(routed.data.price, 5.27);
    assert!(routed.data.is_market_open, "11:00 EDT on a Tuesday is in session");
    assert_eq!(client.calls_to("finance.yahoo.com"), 1);
    assert_eq!(client.calls_to("finnhub.io"), 1);
}

#[tokio::test]
async fn history_routes_only_through_chart_capable_providers() {
    let client = Arc::new(
        RoutedHttpClient::new()
            .json("finance.yahoo.com", YAHOO_CHART_HISTORY)
            .json("finnhub.io", FINNHUB_QUOTE),
    );
    let router = QuoteRouterBuilder::new()
        .with_http_client(client.clone())
        .with_finnhub_key(Some(String::from("fh")))
        .build();

    let routed = router
        .fetch_history(&uwmc(), HistoryRange::FiveDays, FallbackPolicy::strict())
        .await
        .expect("yahoo serves history");

    assert_eq!(routed.data.points.len(), 4);
    assert_eq!(routed.data.closes().last().copied(), Some(5.31));
    assert_eq!(client.calls_to("finnhub.io"), 0);
}

#[tokio::test]
async fn weekend_quote_is_marked_closed() {
    let client = Arc::new(RoutedHttpClient::new().json("finance.yahoo.com", YAHOO_CHART));
    let router = QuoteRouterBuilder::new().with_http_client(client).build();

    let routed = router
        .fetch_quote_at(&uwmc(), FallbackPolicy::strict(), at("2025-08-09T15:00:00Z"))
        .await
        .expect("yahoo answers");

    assert_eq!(routed.data.price, 5.31);
    assert!(!routed.data.is_market_open, "Saturday is closed");
}
