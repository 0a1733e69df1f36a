//! # Domain Models
//!
//! Canonical value types shared by the quote pipeline and the analytics
//! engines.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Quote`] | Normalized market snapshot for one ticker |
//! | [`PriceHistory`] | Ordered OHLCV bars for a [`HistoryRange`] |
//! | [`Symbol`] | Validated uppercase ticker |
//! | [`UtcDateTime`] | UTC instant |
//!
//! Calendar dates use [`time::Date`] and travel as `YYYY-MM-DD` through
//! [`iso_date`].

mod date;
mod quote;
mod symbol;
mod timestamp;

pub use date::{days_between, format_date, iso_date, parse_date};
pub use quote::{HistoryRange, PricePoint, PriceHistory, Quote};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
