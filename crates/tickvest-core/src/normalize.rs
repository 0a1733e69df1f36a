//! Mapping from provider payloads into the canonical [`Quote`].
//!
//! Adapters decode their wire schema into a [`RawQuote`] (every field
//! optional) and hand it to [`normalize_quote`]. Missing optional fields are
//! replaced by the documented defaults below and recorded in
//! `Quote::defaulted_fields`; nothing is silently zero-filled.
//!
//! | Field | Default |
//! |-------|---------|
//! | `dayHigh`, `dayLow` | price |
//! | `open` | previous close |
//! | `avgVolume`, `week52High`, `week52Low` | [`ReferenceData`] |
//! | `bid`, `ask` | price ∓ reference spread |
//! | `marketCap` | price × shares outstanding |
//! | `volume`, `bidSize`, `askSize` | 0 |

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::data_source::SourceError;
use crate::{Quote, QuoteSource, Symbol, UtcDateTime, ValidationError};

/// Configured facts about the tracked security used as fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceData {
    /// Anchor of the synthetic random walk.
    pub reference_price: f64,
    pub previous_close: f64,
    pub shares_outstanding: f64,
    pub avg_volume: u64,
    pub week52_high: f64,
    pub week52_low: f64,
    /// Half of the quoted bid/ask spread.
    pub spread: f64,
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self {
            reference_price: 5.25,
            previous_close: 5.10,
            shares_outstanding: 1_590_000_000.0,
            avg_volume: 7_500_000,
            week52_high: 8.54,
            week52_low: 3.36,
            spread: 0.01,
        }
    }
}

impl ReferenceData {
    /// Validated reference values; the spread keeps its default.
    pub fn new(
        reference_price: f64,
        previous_close: f64,
        shares_outstanding: f64,
        avg_volume: u64,
        week52_high: f64,
        week52_low: f64,
    ) -> Result<Self, ValidationError> {
        require_positive("referencePrice", reference_price)?;
        require_finite("previousClose", previous_close)?;
        if previous_close < 0.0 {
            return Err(ValidationError::NegativeValue {
                field: "previousClose",
            });
        }
        require_positive("sharesOutstanding", shares_outstanding)?;
        require_positive("week52Low", week52_low)?;
        require_finite("week52High", week52_high)?;
        if week52_low > week52_high {
            return Err(ValidationError::InvalidWeek52Range {
                low: week52_low,
                high: week52_high,
            });
        }

        Ok(Self {
            reference_price,
            previous_close,
            shares_outstanding,
            avg_volume,
            week52_high,
            week52_low,
            ..Self::default()
        })
    }
}

fn require_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFiniteValue { field })
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    require_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NonPositiveValue { field })
    }
}

/// Provider-agnostic decoded quote fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQuote {
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub open: Option<f64>,
    pub volume: Option<f64>,
    pub avg_volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub week52_high: Option<f64>,
    pub week52_low: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub bid_size: Option<f64>,
    pub ask_size: Option<f64>,
}

impl From<&Quote> for RawQuote {
    /// Feeding the result back through [`normalize_quote`] with the same
    /// context reproduces the quote's values.
    fn from(quote: &Quote) -> Self {
        Self {
            price: Some(quote.price),
            previous_close: Some(quote.previous_close),
            day_high: Some(quote.day_high),
            day_low: Some(quote.day_low),
            open: Some(quote.open),
            volume: Some(quote.volume as f64),
            avg_volume: Some(quote.avg_volume as f64),
            market_cap: Some(quote.market_cap),
            pe_ratio: quote.pe_ratio,
            week52_high: Some(quote.week52_high),
            week52_low: Some(quote.week52_low),
            bid: Some(quote.bid),
            ask: Some(quote.ask),
            bid_size: Some(quote.bid_size as f64),
            ask_size: Some(quote.ask_size as f64),
        }
    }
}

/// Everything about a quote that does not come from the payload.
#[derive(Debug, Clone, Copy)]
pub struct QuoteContext<'a> {
    pub symbol: &'a Symbol,
    pub source: QuoteSource,
    pub captured_at: UtcDateTime,
    pub market_open: bool,
    pub reference: &'a ReferenceData,
}

/// Builds a canonical quote, or `MalformedResponse` when price or previous
/// close is unusable.
pub fn normalize_quote(raw: &RawQuote, ctx: QuoteContext<'_>) -> Result<Quote, SourceError> {
    let price = positive(raw.price).ok_or_else(|| {
        SourceError::malformed(format!(
            "{} payload for {} has no usable current price",
            ctx.source, ctx.symbol
        ))
    })?;
    let previous_close = raw
        .previous_close
        .filter(|value| value.is_finite() && *value >= 0.0)
        .ok_or_else(|| {
            SourceError::malformed(format!(
                "{} payload for {} has no usable previous close",
                ctx.source, ctx.symbol
            ))
        })?;

    let mut defaults = Defaults::default();
    let reference = ctx.reference;

    let day_high = defaults.price("dayHigh", raw.day_high, price);
    let day_low = defaults.price("dayLow", raw.day_low, price);
    let open = defaults.price("open", raw.open, previous_close);
    let volume = defaults.count("volume", raw.volume, 0);
    let avg_volume = match raw.avg_volume.and_then(to_count).filter(|value| *value > 0) {
        Some(value) => value,
        None => {
            defaults.mark("avgVolume");
            reference.avg_volume
        }
    };
    let market_cap = defaults.price(
        "marketCap",
        raw.market_cap,
        price * reference.shares_outstanding,
    );
    let week52_high = defaults.price("week52High", raw.week52_high, reference.week52_high);
    let week52_low = defaults.price("week52Low", raw.week52_low, reference.week52_low);
    let bid = defaults.price("bid", raw.bid, (price - reference.spread).max(0.0));
    let ask = defaults.price("ask", raw.ask, price + reference.spread);
    let bid_size = defaults.count("bidSize", raw.bid_size, 0);
    let ask_size = defaults.count("askSize", raw.ask_size, 0);

    let change = price - previous_close;

    Ok(Quote {
        symbol: ctx.symbol.clone(),
        price,
        change,
        change_percent: change_percent(change, previous_close),
        day_high,
        day_low,
        open,
        previous_close,
        volume,
        avg_volume,
        market_cap,
        pe_ratio: raw.pe_ratio.filter(|value| value.is_finite()),
        week52_high,
        week52_low,
        bid,
        ask,
        bid_size,
        ask_size,
        timestamp: ctx.captured_at,
        is_market_open: ctx.market_open,
        source: ctx.source,
        defaulted_fields: defaults.into_fields(),
    })
}

/// `change / previous_close * 100`, or 0 when the denominator is 0.
pub fn change_percent(change: f64, previous_close: f64) -> f64 {
    if previous_close == 0.0 {
        return 0.0;
    }
    change / previous_close * 100.0
}

/// Parses provider numerics: JSON numbers, or strings such as `"1,234.5"`
/// and `"-2.9412%"`.
pub fn lenient_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_lenient(text),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

pub fn parse_lenient(text: &str) -> Option<f64> {
    let cleaned = text
        .trim()
        .trim_end_matches('%')
        .trim()
        .replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// `deserialize_with` target for optional lenient numeric fields.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(lenient_number))
}

#[derive(Default)]
struct Defaults {
    fields: Vec<String>,
}

impl Defaults {
    fn mark(&mut self, field: &str) {
        self.fields.push(field.to_owned());
    }

    /// Non-positive prices are treated as absent: providers use 0 for "unknown".
    fn price(&mut self, field: &str, value: Option<f64>, fallback: f64) -> f64 {
        match positive(value) {
            Some(value) => value,
            None => {
                self.mark(field);
                fallback
            }
        }
    }

    fn count(&mut self, field: &str, value: Option<f64>, fallback: u64) -> u64 {
        match value.and_then(to_count) {
            Some(value) => value,
            None => {
                self.mark(field);
                fallback
            }
        }
    }

    fn into_fields(self) -> Vec<String> {
        self.fields
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|value| value.is_finite() && *value > 0.0)
}

fn to_count(value: f64) -> Option<u64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    // Float-to-int `as` saturates at u64::MAX.
    Some(value.round() as u64)
}
