use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// Instant on the UTC timeline; serialized as RFC3339 with a zero offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Rejects any offset other than UTC instead of converting it.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match OffsetDateTime::parse(input, &Rfc3339) {
            Ok(parsed) if parsed.offset() == UtcOffset::UTC => Ok(Self(parsed)),
            _ => Err(ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }),
        }
    }

    /// Provider payloads report epoch seconds.
    pub fn from_unix_timestamp(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| ValidationError::TimestampNotUtc {
                value: seconds.to_string(),
            })
    }

    pub fn unix_timestamp(self) -> i64 {
        self.0.unix_timestamp()
    }

    /// Calendar date of this instant in UTC.
    pub fn date(self) -> Date {
        self.0.date()
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.unix_timestamp().to_string())
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl TryFrom<String> for UtcDateTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UtcDateTime> for String {
    fn from(value: UtcDateTime) -> Self {
        value.format_rfc3339()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_and_reports_its_date() {
        let parsed = UtcDateTime::parse("2025-08-05T13:30:00Z").expect("must parse");
        assert_eq!(parsed.to_string(), "2025-08-05T13:30:00Z");
        assert_eq!(parsed.date().to_string(), "2025-08-05");
    }

    #[test]
    fn rejects_exchange_local_offsets() {
        let err = UtcDateTime::parse("2025-08-05T09:30:00-04:00").expect_err("must fail");
        assert!(matches!(err, ValidationError::TimestampNotUtc { .. }));
    }

    #[test]
    fn converts_epoch_seconds() {
        let ts = UtcDateTime::from_unix_timestamp(1_754_400_600).expect("valid epoch");
        assert_eq!(ts.format_rfc3339(), "2025-08-05T13:30:00Z");
        assert_eq!(ts.unix_timestamp(), 1_754_400_600);
    }

    #[test]
    fn json_uses_rfc3339_strings() {
        let ts: UtcDateTime = serde_json::from_str("\"2025-08-05T13:30:00Z\"").expect("valid");
        assert_eq!(serde_json::to_string(&ts).expect("serializes"), "\"2025-08-05T13:30:00Z\"");
        assert!(serde_json::from_str::<UtcDateTime>("\"2025-08-05T13:30:00+02:00\"").is_err());
    }
}
