//! Exchange session calendar and polling cadence.
//!
//! Session checks always convert the instant into the exchange's own
//! timezone first; the caller's local clock never participates.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use time::macros::date;
use time::Date;

use crate::{UtcDateTime, ValidationError};

/// Default exchange timezone.
pub const NYSE_TIMEZONE: Tz = chrono_tz::America::New_York;

const NYSE_OPEN_MINUTE: u16 = 9 * 60 + 30;
const NYSE_CLOSE_MINUTE: u16 = 16 * 60;

/// Full-day NYSE closures. Early closes trade a normal window here.
const NYSE_HOLIDAYS: &[Date] = &[
    date!(2025 - 01 - 01),
    date!(2025 - 01 - 09),
    date!(2025 - 01 - 20),
    date!(2025 - 02 - 17),
    date!(2025 - 04 - 18),
    date!(2025 - 05 - 26),
    date!(2025 - 06 - 19),
    date!(2025 - 07 - 04),
    date!(2025 - 09 - 01),
    date!(2025 - 11 - 27),
    date!(2025 - 12 - 25),
    date!(2026 - 01 - 01),
    date!(2026 - 01 - 19),
    date!(2026 - 02 - 16),
    date!(2026 - 04 - 03),
    date!(2026 - 05 - 25),
    date!(2026 - 06 - 19),
    date!(2026 - 07 - 03),
    date!(2026 - 09 - 07),
    date!(2026 - 11 - 26),
    date!(2026 - 12 - 25),
    date!(2027 - 01 - 01),
    date!(2027 - 01 - 18),
    date!(2027 - 02 - 15),
    date!(2027 - 03 - 26),
    date!(2027 - 05 - 31),
    date!(2027 - 06 - 18),
    date!(2027 - 07 - 05),
    date!(2027 - 09 - 06),
    date!(2027 - 11 - 25),
    date!(2027 - 12 - 24),
];

/// Trading-session rules for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeCalendar {
    timezone: Tz,
    open_minute: u16,
    close_minute: u16,
    holidays: BTreeSet<Date>,
}

impl Default for ExchangeCalendar {
    fn default() -> Self {
        Self::nyse()
    }
}

impl ExchangeCalendar {
    /// NYSE regular session, 09:30-16:00 America/New_York.
    pub fn nyse() -> Self {
        Self {
            timezone: NYSE_TIMEZONE,
            open_minute: NYSE_OPEN_MINUTE,
            close_minute: NYSE_CLOSE_MINUTE,
            holidays: NYSE_HOLIDAYS.iter().copied().collect(),
        }
    }

    /// Session window in minutes after local midnight, `[open, close)`.
    pub fn new(timezone: Tz, open_minute: u16, close_minute: u16) -> Result<Self, ValidationError> {
        if open_minute >= close_minute || close_minute > 24 * 60 {
            return Err(ValidationError::InvalidMarketWindow {
                open: open_minute,
                close: close_minute,
            });
        }
        Ok(Self {
            timezone,
            open_minute,
            close_minute,
            holidays: BTreeSet::new(),
        })
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = Date>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn is_holiday(&self, local_date: Date) -> bool {
        self.holidays.contains(&local_date)
    }

    /// Calendar date at the exchange for the given instant.
    pub fn local_date(&self, at: UtcDateTime) -> Date {
        self.localize(at)
            .and_then(|local| to_date(local.year(), local.ordinal()))
            .unwrap_or_else(|| at.date())
    }

    pub fn is_open(&self, at: UtcDateTime) -> bool {
        let Some(local) = self.localize(at) else {
            return false;
        };

        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        if to_date(local.year(), local.ordinal()).is_some_and(|day| self.is_holiday(day)) {
            return false;
        }

        let minute = (local.hour() * 60 + local.minute()) as u16;
        minute >= self.open_minute && minute < self.close_minute
    }

    fn localize(&self, at: UtcDateTime) -> Option<DateTime<Tz>> {
        let inner = at.into_inner();
        DateTime::<Utc>::from_timestamp(inner.unix_timestamp(), inner.nanosecond())
            .map(|utc| utc.with_timezone(&self.timezone))
    }
}

/// Whether `calendar`'s exchange is in its regular session at `at`.
pub fn is_market_open(at: UtcDateTime, calendar: &ExchangeCalendar) -> bool {
    calendar.is_open(at)
}

fn to_date(year: i32, ordinal: u32) -> Option<Date> {
    Date::from_ordinal_date(year, u16::try_from(ordinal).ok()?).ok()
}

/// Refresh periods chosen from the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingCadence {
    pub open: Duration,
    pub closed: Duration,
}

impl Default for PollingCadence {
    fn default() -> Self {
        Self {
            open: Duration::from_secs(5),
            closed: Duration::from_secs(60),
        }
    }
}

impl PollingCadence {
    pub const fn interval(&self, market_open: bool) -> Duration {
        if market_open {
            self.open
        } else {
            self.closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(value: &str) -> UtcDateTime {
        UtcDateTime::parse(value).expect("valid timestamp")
    }

    #[test]
    fn rejects_inverted_window() {
        assert!(matches!(
            ExchangeCalendar::new(NYSE_TIMEZONE, 960, 570),
            Err(ValidationError::InvalidMarketWindow { .. })
        ));
        assert!(ExchangeCalendar::new(NYSE_TIMEZONE, 0, 1440).is_ok());
    }

    #[test]
    fn listed_holiday_is_closed_mid_session() {
        let calendar = ExchangeCalendar::nyse();
        // 2025-07-04 12:00 EDT
        assert!(!calendar.is_open(at("2025-07-04T16:00:00Z")));
        // 2025-07-03 12:00 EDT
        assert!(calendar.is_open(at("2025-07-03T16:00:00Z")));
    }

    #[test]
    fn local_date_follows_exchange_timezone() {
        let calendar = ExchangeCalendar::nyse();
        // 02:00Z on Aug 6 is still Aug 5 in New York.
        assert_eq!(
            calendar.local_date(at("2025-08-06T02:00:00Z")),
            date!(2025 - 08 - 05)
        );
    }

    #[test]
    fn cadence_is_short_while_open() {
        let cadence = PollingCadence::default();
        assert_eq!(cadence.interval(true), Duration::from_secs(5));
        assert_eq!(cadence.interval(false), Duration::from_secs(60));
    }
}
