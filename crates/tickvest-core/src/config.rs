//! Dashboard configuration read from `TICKVEST_*` environment variables.
//!
//! | Key | Default |
//! |-----|---------|
//! | `TICKVEST_SYMBOL` | `UWMC` |
//! | `TICKVEST_SHARES` | `9876` |
//! | `TICKVEST_COST_BASIS` | `4.05` |
//! | `TICKVEST_PURCHASE_DATE` | `2024-07-30` |
//! | `TICKVEST_FEDERAL_RATE` / `STATE_RATE` / `FICA_RATE` | `0.22` / `0.09` / `0.0765` |
//! | `TICKVEST_GRANTS` | inline JSON array, else `TICKVEST_GRANTS_FILE` |
//! | `TICKVEST_GRANTS_FILE` | path to a JSON array, else no grants |
//! | `TICKVEST_ALLOW_SYNTHETIC` | `false` |
//! | `TICKVEST_REFERENCE_PRICE`, `_PREVIOUS_CLOSE` | `5.25`, `5.10` |
//! | `TICKVEST_SHARES_OUTSTANDING`, `_AVG_VOLUME` | `1590000000`, `7500000` |
//! | `TICKVEST_WEEK52_HIGH`, `_WEEK52_LOW` | `8.54`, `3.36` |
//! | `TICKVEST_PROVIDER_TIMEOUT_MS` | `4000` |
//! | `TICKVEST_POLL_OPEN_SECS`, `_POLL_CLOSED_SECS` | `5`, `60` |
//! | `TICKVEST_FINNHUB_API_KEY` (or `FINNHUB_API_KEY`) | unset |
//! | `TICKVEST_TWELVEDATA_API_KEY` (or `TWELVEDATA_API_KEY`) | unset |
//! | `TICKVEST_ALPHAVANTAGE_API_KEY` (or `ALPHAVANTAGE_API_KEY`) | unset |
//!
//! Loading `.env` files is left to the binaries.

use std::str::FromStr;
use std::time::Duration;

use time::macros::date;
use time::Date;

use crate::domain::parse_date;
use crate::error::ConfigError;
use crate::market_hours::PollingCadence;
use crate::normalize::ReferenceData;
use crate::portfolio::HoldingsConfig;
use crate::routing::{FallbackPolicy, DEFAULT_PROVIDER_TIMEOUT};
use crate::vesting::{TaxConfig, VestingSchedule};
use crate::Symbol;

const PREFIX: &str = "TICKVEST_";

const DEFAULT_SYMBOL: &str = "UWMC";
const DEFAULT_SHARES: u64 = 9876;
const DEFAULT_COST_BASIS: f64 = 4.05;
const DEFAULT_PURCHASE_DATE: Date = date!(2024 - 07 - 30);

/// Everything the dashboard needs besides live prices.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub symbol: Symbol,
    pub holdings: HoldingsConfig,
    pub tax: TaxConfig,
    pub schedule: VestingSchedule,
    pub fallback: FallbackPolicy,
    pub reference: ReferenceData,
    pub provider_timeout: Duration,
    pub cadence: PollingCadence,
    pub api_keys: ApiKeys,
}

/// Credentials for the key-based providers.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    pub finnhub: Option<String>,
    pub twelvedata: Option<String>,
    pub alphavantage: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "***");
        f.debug_struct("ApiKeys")
            .field("finnhub", &mask(&self.finnhub))
            .field("twelvedata", &mask(&self.twelvedata))
            .field("alphavantage", &mask(&self.alphavantage))
            .finish()
    }
}

impl DashboardConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads through `lookup`, which receives full key names such as `TICKVEST_SHARES`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup: &lookup };
        let default_tax = TaxConfig::default();
        let default_reference = ReferenceData::default();

        let symbol = Symbol::parse(vars.get("SYMBOL").as_deref().unwrap_or(DEFAULT_SYMBOL))?;

        let holdings = HoldingsConfig::new(
            vars.parse("SHARES")?.unwrap_or(DEFAULT_SHARES),
            vars.parse("COST_BASIS")?.unwrap_or(DEFAULT_COST_BASIS),
            match vars.get("PURCHASE_DATE") {
                Some(value) => parse_date(&value)?,
                None => DEFAULT_PURCHASE_DATE,
            },
        )?;

        let tax = TaxConfig::new(
            vars.parse("FEDERAL_RATE")?
                .unwrap_or(default_tax.federal_rate()),
            vars.parse("STATE_RATE")?.unwrap_or(default_tax.state_rate()),
            vars.parse("FICA_RATE")?.unwrap_or(default_tax.fica_rate()),
        )?;

        let schedule = match (vars.get("GRANTS"), vars.get("GRANTS_FILE")) {
            (Some(inline), _) => parse_grants(&inline)?,
            (None, Some(path)) => {
                let body = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::GrantsFile { path, source })?;
                parse_grants(&body)?
            }
            (None, None) => VestingSchedule::default(),
        };

        let reference = ReferenceData::new(
            vars.parse("REFERENCE_PRICE")?
                .unwrap_or(default_reference.reference_price),
            vars.parse("REFERENCE_PREVIOUS_CLOSE")?
                .unwrap_or(default_reference.previous_close),
            vars.parse("SHARES_OUTSTANDING")?
                .unwrap_or(default_reference.shares_outstanding),
            vars.parse("AVG_VOLUME")?
                .unwrap_or(default_reference.avg_volume),
            vars.parse("WEEK52_HIGH")?
                .unwrap_or(default_reference.week52_high),
            vars.parse("WEEK52_LOW")?
                .unwrap_or(default_reference.week52_low),
        )?;

        let provider_timeout = vars
            .parse::<u64>("PROVIDER_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT);
        let cadence = PollingCadence {
            open: vars
                .parse::<u64>("POLL_OPEN_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(PollingCadence::default().open),
            closed: vars
                .parse::<u64>("POLL_CLOSED_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(PollingCadence::default().closed),
        };
        for (key, value) in [
            ("PROVIDER_TIMEOUT_MS", provider_timeout),
            ("POLL_OPEN_SECS", cadence.open),
            ("POLL_CLOSED_SECS", cadence.closed),
        ] {
            if value.is_zero() {
                return Err(invalid(key, "0", "must be greater than zero"));
            }
        }

        let fallback = FallbackPolicy {
            allow_synthetic: vars.flag("ALLOW_SYNTHETIC")?.unwrap_or(false),
        };

        let api_keys = ApiKeys {
            finnhub: vars.secret("FINNHUB_API_KEY"),
            twelvedata: vars.secret("TWELVEDATA_API_KEY"),
            alphavantage: vars.secret("ALPHAVANTAGE_API_KEY"),
        };

        Ok(Self {
            symbol,
            holdings,
            tax,
            schedule,
            fallback,
            reference,
            provider_timeout,
            cadence,
            api_keys,
        })
    }
}

fn parse_grants(body: &str) -> Result<VestingSchedule, ConfigError> {
    serde_json::from_str(body).map_err(ConfigError::Grants)
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_owned(),
        reason: reason.into(),
    }
}

struct Vars<'a, F> {
    lookup: &'a F,
}

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, suffix: &str) -> Option<String> {
        (self.lookup)(&format!("{PREFIX}{suffix}"))
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn parse<T>(&self, suffix: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(suffix)
            .map(|value| {
                value
                    .parse::<T>()
                    .map_err(|error| invalid(suffix, &value, error.to_string()))
            })
            .transpose()
    }

    fn flag(&self, suffix: &'static str) -> Result<Option<bool>, ConfigError> {
        self.get(suffix)
            .map(|value| match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(invalid(suffix, &value, "expected true or false")),
            })
            .transpose()
    }

    /// Prefixed key first, then the bare provider name.
    fn secret(&self, suffix: &str) -> Option<String> {
        self.get(suffix).or_else(|| {
            (self.lookup)(suffix)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::ValidationError;

    fn load(pairs: &[(&str, &str)]) -> Result<DashboardConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        DashboardConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = load(&[]).expect("defaults load");
        assert_eq!(config.symbol.as_str(), "UWMC");
        assert_eq!(config.holdings.shares(), 9876);
        assert!(!config.fallback.allow_synthetic);
        assert!(config.schedule.is_empty());
        assert_eq!(config.provider_timeout, Duration::from_secs(4));
    }

    #[test]
    fn reads_prefixed_values_and_bare_api_keys() {
        let config = load(&[
            ("TICKVEST_SYMBOL", "aapl"),
            ("TICKVEST_SHARES", "100"),
            ("TICKVEST_ALLOW_SYNTHETIC", "yes"),
            ("FINNHUB_API_KEY", "bare"),
            ("TICKVEST_TWELVEDATA_API_KEY", "prefixed"),
            ("TWELVEDATA_API_KEY", "ignored"),
        ])
        .expect("valid config");

        assert_eq!(config.symbol.as_str(), "AAPL");
        assert_eq!(config.holdings.shares(), 100);
        assert!(config.fallback.allow_synthetic);
        assert_eq!(config.api_keys.finnhub.as_deref(), Some("bare"));
        assert_eq!(config.api_keys.twelvedata.as_deref(), Some("prefixed"));
        assert_eq!(config.api_keys.alphavantage, None);
    }

    #[test]
    fn rejects_zero_shares_and_excess_tax() {
        assert!(matches!(
            load(&[("TICKVEST_SHARES", "0")]),
            Err(ConfigError::Validation(ValidationError::NonPositiveValue { field: "shares" }))
        ));
        assert!(matches!(
            load(&[("TICKVEST_FEDERAL_RATE", "0.6"), ("TICKVEST_STATE_RATE", "0.4")]),
            Err(ConfigError::Validation(ValidationError::CombinedTaxRateTooHigh { .. }))
        ));
        assert!(matches!(
            load(&[("TICKVEST_SHARES", "many")]),
            Err(ConfigError::InvalidValue { key: "SHARES", .. })
        ));
    }

    #[test]
    fn rejects_negative_or_non_finite_reference_data() {
        assert!(matches!(
            load(&[("TICKVEST_REFERENCE_PRICE", "-1")]),
            Err(ConfigError::Validation(ValidationError::NonPositiveValue {
                field: "referencePrice"
            }))
        ));
        assert!(matches!(
            load(&[("TICKVEST_REFERENCE_PRICE", "NaN")]),
            Err(ConfigError::Validation(ValidationError::NonFiniteValue {
                field: "referencePrice"
            }))
        ));
        assert!(matches!(
            load(&[("TICKVEST_SHARES_OUTSTANDING", "inf")]),
            Err(ConfigError::Validation(ValidationError::NonFiniteValue {
                field: "sharesOutstanding"
            }))
        ));
        assert!(matches!(
            load(&[("TICKVEST_WEEK52_LOW", "9"), ("TICKVEST_WEEK52_HIGH", "4")]),
            Err(ConfigError::Validation(ValidationError::InvalidWeek52Range { .. }))
        ));
    }

    #[test]
    fn grants_with_vest_before_grant_fail_to_load() {
        let result = load(&[(
            "TICKVEST_GRANTS",
            r#"[{"grantId":"G","grantDate":"2025-05-01","grantPrice":5.0,"vestDate":"2025-04-01","shares":10}]"#,
        )]);
        assert!(matches!(result, Err(ConfigError::Grants(_))));
    }

    #[test]
    fn grants_file_is_read_from_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("grants.json");
        std::fs::write(
            &path,
            r#"[{"grantId":"G","grantDate":"2025-01-01","grantPrice":5.0,"vestDate":"2025-06-01","shares":10}]"#,
        )
        .expect("write grants");

        let config = load(&[("TICKVEST_GRANTS_FILE", path.to_str().expect("utf-8 path"))])
            .expect("grants file loads");
        assert_eq!(config.schedule.len(), 1);

        let missing = load(&[("TICKVEST_GRANTS_FILE", "/nonexistent/grants.json")]);
        assert!(matches!(missing, Err(ConfigError::GrantsFile { .. })));
    }
}
