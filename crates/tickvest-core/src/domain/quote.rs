use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{QuoteSource, Symbol, UtcDateTime, ValidationError};

/// Canonical market snapshot for one ticker.
///
/// Built only through [`normalize_quote`](crate::normalize_quote), which
/// guarantees `change == price - previous_close` and a `change_percent`
/// recomputed from those two values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub open: f64,
    pub previous_close: f64,
    pub volume: u64,
    pub avg_volume: u64,
    pub market_cap: f64,
    pub pe_ratio: Option<f64>,
    #[serde(rename = "week52High")]
    pub week52_high: f64,
    #[serde(rename = "week52Low")]
    pub week52_low: f64,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: u64,
    pub ask_size: u64,
    pub timestamp: UtcDateTime,
    pub is_market_open: bool,
    pub source: QuoteSource,
    /// Fields filled from a documented default instead of provider data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaulted_fields: Vec<String>,
}

impl Quote {
    pub fn is_synthetic(&self) -> bool {
        self.source.is_synthetic()
    }

    pub fn is_defaulted(&self, field: &str) -> bool {
        self.defaulted_fields.iter().any(|name| name == field)
    }
}

/// Chart window supported by the history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HistoryRange {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl HistoryRange {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
        }
    }

    /// Bar width requested from chart providers.
    pub const fn bar_interval(self) -> &'static str {
        match self {
            Self::OneDay => "5m",
            Self::FiveDays => "15m",
            Self::OneMonth | Self::ThreeMonths | Self::SixMonths | Self::OneYear => "1d",
        }
    }

    /// Approximate number of trading sessions covered by the range.
    pub const fn trading_days(self) -> usize {
        match self {
            Self::OneDay => 1,
            Self::FiveDays => 5,
            Self::OneMonth => 21,
            Self::ThreeMonths => 63,
            Self::SixMonths => 126,
            Self::OneYear => 252,
        }
    }
}

impl Default for HistoryRange {
    fn default() -> Self {
        Self::OneMonth
    }
}

impl Display for HistoryRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryRange {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(Self::OneDay),
            "5d" => Ok(Self::FiveDays),
            "1mo" => Ok(Self::OneMonth),
            "3mo" => Ok(Self::ThreeMonths),
            "6mo" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            other => Err(ValidationError::InvalidHistoryRange {
                value: other.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for HistoryRange {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HistoryRange> for String {
    fn from(value: HistoryRange) -> Self {
        value.as_str().to_owned()
    }
}

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Chronologically ordered bars for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: Symbol,
    pub range: HistoryRange,
    pub source: QuoteSource,
    pub points: Vec<PricePoint>,
}

impl PriceHistory {
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.close).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_range_parses_case_insensitively() {
        assert_eq!("3MO".parse::<HistoryRange>(), Ok(HistoryRange::ThreeMonths));
        assert!(matches!(
            "2w".parse::<HistoryRange>(),
            Err(ValidationError::InvalidHistoryRange { .. })
        ));
    }

    #[test]
    fn history_range_serializes_as_wire_token() {
        let json = serde_json::to_string(&HistoryRange::OneYear).expect("serializes");
        assert_eq!(json, "\"1y\"");
    }
}
