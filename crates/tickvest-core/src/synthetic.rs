//! Placeholder market data served only when every provider failed and the
//! caller opted in. Every value produced here is tagged
//! [`QuoteSource::Synthetic`].

use std::sync::{Mutex, PoisonError};

use time::Weekday;

use crate::data_source::SourceError;
use crate::normalize::{normalize_quote, QuoteContext, RawQuote, ReferenceData};
use crate::{HistoryRange, PriceHistory, PricePoint, Quote, QuoteSource, Symbol, UtcDateTime};

const SECONDS_PER_DAY: i64 = 86_400;

/// Seedable random-walk generator anchored on the configured reference price.
#[derive(Debug)]
pub struct SyntheticQuotes {
    reference: ReferenceData,
    /// Maximum distance from the reference price.
    band: f64,
    /// Maximum move per generated quote.
    step: f64,
    state: Mutex<WalkState>,
}

#[derive(Debug)]
struct WalkState {
    rng: fastrand::Rng,
    last_price: f64,
}

impl SyntheticQuotes {
    pub fn new(reference: ReferenceData) -> Self {
        Self::from_rng(reference, fastrand::Rng::new())
    }

    /// Reproducible sequence for tests and demos.
    pub fn with_seed(reference: ReferenceData, seed: u64) -> Self {
        Self::from_rng(reference, fastrand::Rng::with_seed(seed))
    }

    fn from_rng(reference: ReferenceData, rng: fastrand::Rng) -> Self {
        let last_price = reference.reference_price;
        Self {
            reference,
            band: 0.15,
            step: 0.05,
            state: Mutex::new(WalkState { rng, last_price }),
        }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Next point of the walk, normalized like any provider payload.
    pub fn quote(
        &self,
        symbol: &Symbol,
        captured_at: UtcDateTime,
        market_open: bool,
    ) -> Result<Quote, SourceError> {
        let raw = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let delta = (state.rng.f64() * 2.0 - 1.0) * self.step;
            let anchor = self.reference.reference_price;
            let floor = (anchor - self.band).max(0.01);
            let ceiling = (anchor + self.band).max(floor);
            let price = (state.last_price + delta).clamp(floor, ceiling);
            state.last_price = price;

            RawQuote {
                price: Some(price),
                previous_close: Some(self.reference.previous_close),
                day_high: Some(price * 1.02),
                day_low: Some(price * 0.98),
                open: Some(self.reference.previous_close),
                volume: Some(state.rng.u64(5_000_000..10_000_000) as f64),
                bid: Some((price - self.reference.spread).max(0.0)),
                ask: Some(price + self.reference.spread),
                bid_size: Some(state.rng.u64(100..600) as f64),
                ask_size: Some(state.rng.u64(100..600) as f64),
                ..RawQuote::default()
            }
        };

        normalize_quote(
            &raw,
            QuoteContext {
                symbol,
                source: QuoteSource::Synthetic,
                captured_at,
                market_open,
                reference: &self.reference,
            },
        )
    }

    /// Daily bars over weekdays ending at `end`, oldest first.
    pub fn history(&self, symbol: &Symbol, range: HistoryRange, end: UtcDateTime) -> PriceHistory {
        let sessions = session_timestamps(end, range.trading_days());
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let low_bound = self.reference.week52_low.max(0.01);
        let high_bound = self.reference.week52_high.max(low_bound);
        let mut close = self.reference.reference_price.clamp(low_bound, high_bound);
        let mut points = Vec::with_capacity(sessions.len());
        for timestamp in sessions {
            let open = close;
            let drift = (state.rng.f64() * 2.0 - 1.0) * 0.02;
            close = (open * (1.0 + drift)).clamp(low_bound, high_bound);
            let wick = state.rng.f64() * 0.01;
            points.push(PricePoint {
                timestamp,
                open,
                high: open.max(close) * (1.0 + wick),
                low: open.min(close) * (1.0 - wick),
                close,
                volume: state.rng.u64(5_000_000..10_000_000),
            });
        }

        PriceHistory {
            symbol: symbol.clone(),
            range,
            source: QuoteSource::Synthetic,
            points,
        }
    }
}

fn session_timestamps(end: UtcDateTime, count: usize) -> Vec<UtcDateTime> {
    let mut sessions = Vec::with_capacity(count);
    let mut offset_days = 0_i64;
    // Bounded so a pathological count cannot spin forever.
    while sessions.len() < count && offset_days < (count as i64) * 2 + 7 {
        let seconds = end.unix_timestamp() - offset_days * SECONDS_PER_DAY;
        offset_days += 1;
        let Ok(candidate) = UtcDateTime::from_unix_timestamp(seconds) else {
            break;
        };
        if matches!(
            candidate.into_inner().weekday(),
            Weekday::Saturday | Weekday::Sunday
        ) {
            continue;
        }
        sessions.push(candidate);
    }
    sessions.reverse();
    sessions
}
