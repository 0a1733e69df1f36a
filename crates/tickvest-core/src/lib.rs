//! # Tickvest Core
//!
//! Quote acquisition and analytics for a single-stock investment dashboard.
//!
//! ## Overview
//!
//! - **Provider adapters** for Yahoo, Finnhub, Twelve Data and Alpha Vantage
//! - **Normalizer** mapping every payload onto one canonical [`Quote`]
//! - **Fallback router** walking providers in priority order, with an
//!   opt-in synthetic fallback
//! - **Market hours** evaluated in the exchange's own timezone
//! - **Portfolio and vesting engines**, pure functions of a quote
//! - **Single-flight poller** publishing the current quote
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters |
//! | [`circuit_breaker`] | Circuit breaker for upstream calls |
//! | [`config`] | `TICKVEST_*` configuration |
//! | [`data_source`] | Provider trait, requests and [`SourceError`] |
//! | [`domain`] | Quote, history, symbol and time types |
//! | [`error`] | Validation, configuration and top-level errors |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`indicators`] | SMA, RSI and volatility |
//! | [`market_hours`] | Exchange calendar and polling cadence |
//! | [`normalize`] | Raw payload to [`Quote`] |
//! | [`poller`] | Background refresh |
//! | [`portfolio`] | Holding valuation, milestones, projections |
//! | [`provider_policy`] | Free-tier quotas |
//! | [`routing`] | Fallback chain |
//! | [`source`] | Provider identifiers |
//! | [`synthetic`] | Tagged placeholder data |
//! | [`throttling`] | Rate budgets |
//! | [`vesting`] | RSU vesting analytics |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tickvest_core::{FallbackPolicy, QuoteRouterBuilder, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = QuoteRouterBuilder::new().build();
//!     let symbol = Symbol::parse("UWMC")?;
//!
//!     let routed = router.fetch_quote(&symbol, FallbackPolicy::strict()).await?;
//!     println!("{} {} via {}", symbol, routed.data.price, routed.selected_source);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  QuotePoller    │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  QuoteRouter    │────▶│ SyntheticQuotes  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ QuoteProvider   │────▶│ HttpClient       │
//! │ (adapters)      │     │ (reqwest)        │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ normalize_quote │────▶│ Portfolio/Vesting│
//! └─────────────────┘     └──────────────────┘
//! ```

pub mod adapters;
pub mod circuit_breaker;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod indicators;
pub mod market_hours;
pub mod normalize;
pub mod poller;
pub mod portfolio;
pub mod provider_policy;
pub mod routing;
pub mod source;
pub mod synthetic;
pub mod throttling;
pub mod vesting;

pub use adapters::{AlphaVantageAdapter, FinnhubAdapter, TwelveDataAdapter, YahooAdapter};

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

pub use config::{ApiKeys, DashboardConfig};

pub use data_source::{
    CapabilitySet, Endpoint, HistoryRequest, ProviderFuture, QuoteProvider, QuoteRequest,
    SourceError, SourceErrorKind,
};

pub use domain::{
    days_between, format_date, parse_date, HistoryRange, PriceHistory, PricePoint, Quote, Symbol,
    UtcDateTime,
};

pub use error::{ConfigError, CoreError, ValidationError};

pub use http_client::{HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

pub use indicators::{annualized_volatility, rsi, sma, IndicatorSnapshot};

pub use market_hours::{is_market_open, ExchangeCalendar, PollingCadence, NYSE_TIMEZONE};

pub use normalize::{change_percent, normalize_quote, QuoteContext, RawQuote, ReferenceData};

pub use poller::{PollState, QuotePoller, RefreshOutcome};

pub use portfolio::{HoldingsConfig, Milestone, PortfolioMetrics, PortfolioSummary, Projection};

pub use provider_policy::ProviderPolicy;

pub use routing::{
    AllSourcesUnavailable, Attempt, FallbackPolicy, QuoteRouter, QuoteRouterBuilder, RouteSuccess,
    SourceSnapshot, SourceStrategy,
};

pub use source::{ProviderId, QuoteSource};

pub use synthetic::SyntheticQuotes;

pub use throttling::RateBudget;

pub use vesting::{
    GrantSummary, TaxConfig, VestingAnalytics, VestingEvent, VestingEventAnalysis,
    VestingSchedule, VestingTotals,
};
