//! Valuation of a single holding against a live quote.
//!
//! Everything here is a pure function of `(holdings, quote, as_of)`; the
//! engine never fetches or caches prices.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::{days_between, iso_date};
use crate::{Quote, ValidationError};

const DAYS_PER_YEAR: f64 = 365.0;

/// Holdings younger than this get an extrapolation label on the annualized return.
pub const EXTRAPOLATION_THRESHOLD_DAYS: i64 = 30;

/// Return targets reported as milestones, in percent.
pub const MILESTONE_PERCENTS: [f64; 4] = [10.0, 25.0, 50.0, 100.0];

/// Horizons for linear projections, in days.
pub const PROJECTION_HORIZONS: [i64; 3] = [30, 90, 365];

/// Position held in the tracked symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawHoldings")]
pub struct HoldingsConfig {
    shares: u64,
    cost_basis: f64,
    #[serde(with = "iso_date")]
    purchase_date: Date,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHoldings {
    shares: u64,
    cost_basis: f64,
    #[serde(with = "iso_date")]
    purchase_date: Date,
}

impl TryFrom<RawHoldings> for HoldingsConfig {
    type Error = ValidationError;

    fn try_from(raw: RawHoldings) -> Result<Self, Self::Error> {
        Self::new(raw.shares, raw.cost_basis, raw.purchase_date)
    }
}

impl HoldingsConfig {
    pub fn new(shares: u64, cost_basis: f64, purchase_date: Date) -> Result<Self, ValidationError> {
        if shares == 0 {
            return Err(ValidationError::NonPositiveValue { field: "shares" });
        }
        if !cost_basis.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "cost_basis",
            });
        }
        if cost_basis <= 0.0 {
            return Err(ValidationError::NonPositiveValue {
                field: "cost_basis",
            });
        }

        Ok(Self {
            shares,
            cost_basis,
            purchase_date,
        })
    }

    pub fn shares(&self) -> u64 {
        self.shares
    }

    pub fn cost_basis(&self) -> f64 {
        self.cost_basis
    }

    pub fn purchase_date(&self) -> Date {
        self.purchase_date
    }

    pub fn total_cost(&self) -> f64 {
        self.shares as f64 * self.cost_basis
    }
}

/// Valuation snapshot. Percentages are in percent, not fractions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    pub shares: u64,
    pub price: f64,
    pub total_value: f64,
    pub total_cost: f64,
    pub total_gain: f64,
    pub total_gain_percent: f64,
    pub day_gain: f64,
    pub day_gain_percent: f64,
    pub annualized_return: f64,
    /// Days from purchase to `as_of`; negative when `as_of` precedes the purchase.
    pub holding_days: i64,
    /// Set when the holding is too young for the annualized figure to be meaningful.
    pub annualized_return_extrapolated: bool,
    #[serde(with = "iso_date")]
    pub as_of: Date,
}

impl PortfolioMetrics {
    pub fn compute(holdings: &HoldingsConfig, quote: &Quote, as_of: Date) -> Self {
        let shares = holdings.shares as f64;
        let total_cost = holdings.total_cost();
        let total_value = shares * quote.price;
        let total_gain = total_value - total_cost;
        let day_gain = shares * (quote.price - quote.previous_close);

        let holding_days = days_between(holdings.purchase_date, as_of);
        let years = holding_days.max(1) as f64 / DAYS_PER_YEAR;

        Self {
            shares: holdings.shares,
            price: quote.price,
            total_value,
            total_cost,
            total_gain,
            total_gain_percent: percent_of(total_gain, total_cost),
            day_gain,
            day_gain_percent: percent_of(quote.price - quote.previous_close, quote.previous_close),
            annualized_return: annualized_return(total_value, total_cost, years),
            holding_days,
            annualized_return_extrapolated: holding_days < EXTRAPOLATION_THRESHOLD_DAYS,
            as_of,
        }
    }

    /// Progress toward each of [`MILESTONE_PERCENTS`].
    pub fn milestones(&self) -> Vec<Milestone> {
        MILESTONE_PERCENTS
            .iter()
            .map(|&return_percent| {
                let target_value = self.total_cost * (1.0 + return_percent / 100.0);
                Milestone {
                    return_percent,
                    target_value,
                    price_needed: target_value / self.shares as f64,
                    achieved: self.total_value >= target_value,
                    remaining_value: (target_value - self.total_value).max(0.0),
                }
            })
            .collect()
    }

    /// Average daily gain since purchase carried forward over [`PROJECTION_HORIZONS`].
    pub fn projections(&self) -> Vec<Projection> {
        let daily_gain = self.total_gain / self.holding_days.max(1) as f64;
        PROJECTION_HORIZONS
            .iter()
            .map(|&days| {
                let projected_gain = daily_gain * days as f64;
                Projection {
                    days,
                    projected_value: self.total_value + projected_gain,
                    projected_gain,
                }
            })
            .collect()
    }
}

/// One return target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub return_percent: f64,
    pub target_value: f64,
    pub price_needed: f64,
    pub achieved: bool,
    pub remaining_value: f64,
}

/// Linear projection of the position value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub days: i64,
    pub projected_value: f64,
    pub projected_gain: f64,
}

/// Metrics plus the derived milestone and projection tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub metrics: PortfolioMetrics,
    pub milestones: Vec<Milestone>,
    pub projections: Vec<Projection>,
}

impl PortfolioSummary {
    pub fn build(holdings: &HoldingsConfig, quote: &Quote, as_of: Date) -> Self {
        let metrics = PortfolioMetrics::compute(holdings, quote, as_of);
        Self {
            milestones: metrics.milestones(),
            projections: metrics.projections(),
            metrics,
        }
    }
}

fn percent_of(amount: f64, base: f64) -> f64 {
    if base == 0.0 {
        0.0
    } else {
        amount / base * 100.0
    }
}

fn annualized_return(total_value: f64, total_cost: f64, years: f64) -> f64 {
    if total_cost <= 0.0 || years <= 0.0 {
        return 0.0;
    }
    ((total_value / total_cost).powf(1.0 / years) - 1.0) * 100.0
}
