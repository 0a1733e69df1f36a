use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Identifiers for the upstream quote providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Yahoo,
    Finnhub,
    Twelvedata,
    Alphavantage,
}

impl ProviderId {
    /// Default priority order: the authoritative source first.
    pub const ALL: [Self; 4] = [
        Self::Yahoo,
        Self::Finnhub,
        Self::Twelvedata,
        Self::Alphavantage,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::Finnhub => "finnhub",
            Self::Twelvedata => "twelvedata",
            Self::Alphavantage => "alphavantage",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "finnhub" => Ok(Self::Finnhub),
            "twelvedata" => Ok(Self::Twelvedata),
            "alphavantage" => Ok(Self::Alphavantage),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}

/// Provenance of a [`Quote`](crate::Quote).
///
/// Serialized as a plain string: the provider id, or `"synthetic"` for
/// placeholder data produced when every provider failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QuoteSource {
    Provider(ProviderId),
    Synthetic,
}

impl QuoteSource {
    pub const fn is_synthetic(self) -> bool {
        matches!(self, Self::Synthetic)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provider(provider) => provider.as_str(),
            Self::Synthetic => "synthetic",
        }
    }
}

impl From<ProviderId> for QuoteSource {
    fn from(value: ProviderId) -> Self {
        Self::Provider(value)
    }
}

impl Display for QuoteSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteSource {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("synthetic") {
            return Ok(Self::Synthetic);
        }
        value.parse::<ProviderId>().map(Self::Provider)
    }
}

impl TryFrom<String> for QuoteSource {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QuoteSource> for String {
    fn from(value: QuoteSource) -> Self {
        value.as_str().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_source_round_trips_through_strings() {
        assert_eq!(
            "Synthetic".parse::<QuoteSource>().expect("parses"),
            QuoteSource::Synthetic
        );
        assert_eq!(
            " finnhub ".parse::<QuoteSource>().expect("parses"),
            QuoteSource::Provider(ProviderId::Finnhub)
        );
        assert!(matches!(
            "iex".parse::<QuoteSource>(),
            Err(ValidationError::InvalidSource { .. })
        ));
    }

    #[test]
    fn serializes_as_bare_string() {
        let json = serde_json::to_string(&QuoteSource::Provider(ProviderId::Yahoo))
            .expect("serializes");
        assert_eq!(json, "\"yahoo\"");
    }
}
