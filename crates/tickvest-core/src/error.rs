use thiserror::Error;

use crate::routing::AllSourcesUnavailable;

/// Validation and contract errors exposed by `tickvest-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid source '{value}', expected one of yahoo, finnhub, twelvedata, alphavantage, synthetic")]
    InvalidSource { value: String },
    #[error("invalid history range '{value}', expected one of 1d, 5d, 1mo, 3mo, 6mo, 1y")]
    InvalidHistoryRange { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("date must be formatted YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' must be greater than zero")]
    NonPositiveValue { field: &'static str },

    #[error("tax rate '{field}' must be within [0, 1): {value}")]
    TaxRateOutOfRange { field: &'static str, value: f64 },
    #[error("combined tax rate must be below 100%: {total}")]
    CombinedTaxRateTooHigh { total: f64 },

    #[error("grant id cannot be empty")]
    EmptyGrantId,
    #[error("grant '{grant_id}' vests on {vest_date} before its grant date {grant_date}")]
    VestBeforeGrant {
        grant_id: String,
        grant_date: String,
        vest_date: String,
    },
    #[error("tranches of grant '{grant_id}' disagree on grant date or grant price")]
    InconsistentGrant { grant_id: String },

    #[error("52-week low {low} exceeds 52-week high {high}")]
    InvalidWeek52Range { low: f64, high: f64 },

    #[error("market window must satisfy open < close <= 1440 minutes: {open}..{close}")]
    InvalidMarketWindow { open: u16, close: u16 },
}

/// Errors raised while loading a [`DashboardConfig`](crate::DashboardConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read grants file '{path}': {source}")]
    GrantsFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse grant table: {0}")]
    Grants(#[source] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Unavailable(#[from] AllSourcesUnavailable),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
