//! Background quote refresh.
//!
//! One refresh runs at a time. The latest quote lives in a `watch` channel so
//! readers always see a whole value, and a quote captured earlier than the
//! current one is dropped instead of applied.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::market_hours::PollingCadence;
use crate::routing::{AllSourcesUnavailable, FallbackPolicy, QuoteRouter};
use crate::{ProviderId, Quote, Symbol, UtcDateTime};

/// Latest poll result shared with readers.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollState {
    pub quote: Option<Quote>,
    /// Providers walked for the current quote.
    pub source_chain: Vec<ProviderId>,
    pub last_success: Option<UtcDateTime>,
    /// Most recent failure; cleared by the next success.
    pub last_error: Option<String>,
}

/// Result of one [`QuotePoller::refresh`] call.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Updated(Box<Quote>),
    /// Another refresh was already running.
    Skipped,
    /// The fetched quote was older than the one already held.
    Stale,
    Failed(AllSourcesUnavailable),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

pub struct QuotePoller {
    router: Arc<QuoteRouter>,
    symbol: Symbol,
    policy: FallbackPolicy,
    cadence: PollingCadence,
    in_flight: Mutex<()>,
    state: watch::Sender<PollState>,
}

impl QuotePoller {
    pub fn new(
        router: Arc<QuoteRouter>,
        symbol: Symbol,
        policy: FallbackPolicy,
        cadence: PollingCadence,
    ) -> Self {
        let (state, _) = watch::channel(PollState::default());
        Self {
            router,
            symbol,
            policy,
            cadence,
            in_flight: Mutex::new(()),
            state,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn router(&self) -> &Arc<QuoteRouter> {
        &self.router
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn current(&self) -> Option<Quote> {
        self.state.borrow().quote.clone()
    }

    /// Period until the next tick, given the session state at `at`.
    pub fn interval_at(&self, at: UtcDateTime) -> Duration {
        self.cadence
            .interval(self.router.calendar().is_open(at))
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_at(UtcDateTime::now()).await
    }

    /// Single-flight refresh stamped with `captured_at`.
    pub async fn refresh_at(&self, captured_at: UtcDateTime) -> RefreshOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!(symbol = %self.symbol, "refresh already in flight");
            return RefreshOutcome::Skipped;
        };

        let routed = self
            .router
            .fetch_quote_at(&self.symbol, self.policy, captured_at)
            .await;

        match routed {
            Ok(success) => {
                let quote = success.data;
                let applied = self.state.send_if_modified(|state| {
                    if state
                        .quote
                        .as_ref()
                        .is_some_and(|current| current.timestamp > quote.timestamp)
                    {
                        return false;
                    }
                    state.quote = Some(quote.clone());
                    state.source_chain = success.source_chain.clone();
                    state.last_success = Some(quote.timestamp);
                    state.last_error = None;
                    true
                });

                if applied {
                    debug!(
                        symbol = %self.symbol,
                        price = quote.price,
                        source = %quote.source,
                        "quote updated"
                    );
                    RefreshOutcome::Updated(Box::new(quote))
                } else {
                    debug!(symbol = %self.symbol, "discarding quote older than the current one");
                    RefreshOutcome::Stale
                }
            }
            Err(failure) => {
                let message = failure.to_string();
                self.state.send_modify(|state| state.last_error = Some(message));
                RefreshOutcome::Failed(failure)
            }
        }
    }

    /// Refreshes forever on the session cadence. Abort the handle to stop.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(symbol = %self.symbol, "quote poller started");
            loop {
                if let RefreshOutcome::Failed(failure) = self.refresh().await {
                    warn!(symbol = %self.symbol, error = %failure, "scheduled refresh failed");
                }
                tokio::time::sleep(self.interval_at(UtcDateTime::now())).await;
            }
        })
    }
}
