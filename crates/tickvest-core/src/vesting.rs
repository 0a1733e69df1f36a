//! RSU vesting analytics.
//!
//! The schedule is validated once at construction; [`VestingAnalytics::analyze`]
//! is then a pure function of `(schedule, price, tax, as_of)`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::{days_between, format_date, iso_date};
use crate::ValidationError;

/// Absorbs float noise before the withheld-share ceiling, so a tax amount of
/// exactly N shares does not round up to N + 1.
const WITHHOLDING_EPSILON: f64 = 1e-9;

/// Withholding rates applied to vest income.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawTaxConfig")]
pub struct TaxConfig {
    federal_rate: f64,
    state_rate: f64,
    fica_rate: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTaxConfig {
    federal_rate: f64,
    state_rate: f64,
    fica_rate: f64,
}

impl TryFrom<RawTaxConfig> for TaxConfig {
    type Error = ValidationError;

    fn try_from(raw: RawTaxConfig) -> Result<Self, Self::Error> {
        Self::new(raw.federal_rate, raw.state_rate, raw.fica_rate)
    }
}

impl Default for TaxConfig {
    /// 22% federal supplemental, 9% state, 7.65% FICA.
    fn default() -> Self {
        Self {
            federal_rate: 0.22,
            state_rate: 0.09,
            fica_rate: 0.0765,
        }
    }
}

impl TaxConfig {
    pub fn new(federal_rate: f64, state_rate: f64, fica_rate: f64) -> Result<Self, ValidationError> {
        check_rate("federal_rate", federal_rate)?;
        check_rate("state_rate", state_rate)?;
        check_rate("fica_rate", fica_rate)?;

        let total = federal_rate + state_rate + fica_rate;
        if total >= 1.0 {
            return Err(ValidationError::CombinedTaxRateTooHigh { total });
        }

        Ok(Self {
            federal_rate,
            state_rate,
            fica_rate,
        })
    }

    pub fn federal_rate(&self) -> f64 {
        self.federal_rate
    }

    pub fn state_rate(&self) -> f64 {
        self.state_rate
    }

    pub fn fica_rate(&self) -> f64 {
        self.fica_rate
    }

    pub fn total_rate(&self) -> f64 {
        self.federal_rate + self.state_rate + self.fica_rate
    }
}

fn check_rate(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || !(0.0..1.0).contains(&value) {
        return Err(ValidationError::TaxRateOutOfRange { field, value });
    }
    Ok(())
}

/// One tranche of an RSU grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawVestingEvent")]
pub struct VestingEvent {
    grant_id: String,
    #[serde(with = "iso_date")]
    grant_date: Date,
    grant_price: f64,
    #[serde(with = "iso_date")]
    vest_date: Date,
    shares: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVestingEvent {
    grant_id: String,
    #[serde(with = "iso_date")]
    grant_date: Date,
    grant_price: f64,
    #[serde(with = "iso_date", alias = "date")]
    vest_date: Date,
    shares: u64,
}

impl TryFrom<RawVestingEvent> for VestingEvent {
    type Error = ValidationError;

    fn try_from(raw: RawVestingEvent) -> Result<Self, Self::Error> {
        Self::new(
            raw.grant_id,
            raw.grant_date,
            raw.grant_price,
            raw.vest_date,
            raw.shares,
        )
    }
}

impl VestingEvent {
    pub fn new(
        grant_id: impl Into<String>,
        grant_date: Date,
        grant_price: f64,
        vest_date: Date,
        shares: u64,
    ) -> Result<Self, ValidationError> {
        let grant_id = grant_id.into().trim().to_owned();
        if grant_id.is_empty() {
            return Err(ValidationError::EmptyGrantId);
        }
        if !grant_price.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "grant_price",
            });
        }
        if grant_price <= 0.0 {
            return Err(ValidationError::NonPositiveValue {
                field: "grant_price",
            });
        }
        if shares == 0 {
            return Err(ValidationError::NonPositiveValue { field: "shares" });
        }
        if vest_date < grant_date {
            return Err(ValidationError::VestBeforeGrant {
                grant_id,
                grant_date: format_date(grant_date),
                vest_date: format_date(vest_date),
            });
        }

        Ok(Self {
            grant_id,
            grant_date,
            grant_price,
            vest_date,
            shares,
        })
    }

    pub fn grant_id(&self) -> &str {
        &self.grant_id
    }

    pub fn grant_date(&self) -> Date {
        self.grant_date
    }

    pub fn grant_price(&self) -> f64 {
        self.grant_price
    }

    pub fn vest_date(&self) -> Date {
        self.vest_date
    }

    pub fn shares(&self) -> u64 {
        self.shares
    }
}

/// Validated grant table, ordered by `(vest_date, grant_id, input order)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<VestingEvent>", into = "Vec<VestingEvent>")]
pub struct VestingSchedule {
    events: Vec<VestingEvent>,
}

impl TryFrom<Vec<VestingEvent>> for VestingSchedule {
    type Error = ValidationError;

    fn try_from(events: Vec<VestingEvent>) -> Result<Self, Self::Error> {
        Self::new(events)
    }
}

impl From<VestingSchedule> for Vec<VestingEvent> {
    fn from(schedule: VestingSchedule) -> Self {
        schedule.events
    }
}

impl VestingSchedule {
    pub fn new(mut events: Vec<VestingEvent>) -> Result<Self, ValidationError> {
        let mut grants: HashMap<&str, (Date, f64)> = HashMap::new();
        for event in &events {
            let terms = (event.grant_date, event.grant_price);
            if *grants.entry(event.grant_id.as_str()).or_insert(terms) != terms {
                return Err(ValidationError::InconsistentGrant {
                    grant_id: event.grant_id.clone(),
                });
            }
        }

        // Stable: equal keys keep input order.
        events.sort_by(|a, b| {
            a.vest_date
                .cmp(&b.vest_date)
                .then_with(|| a.grant_id.cmp(&b.grant_id))
        });
        Ok(Self { events })
    }

    pub fn events(&self) -> &[VestingEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Valuation of one tranche at the current price.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VestingEventAnalysis {
    pub grant_id: String,
    #[serde(with = "iso_date")]
    pub grant_date: Date,
    pub grant_price: f64,
    #[serde(with = "iso_date")]
    pub vest_date: Date,
    pub shares: u64,
    pub is_vested: bool,
    /// Negative for tranches already vested.
    pub days_until_vest: i64,
    pub gross_value: f64,
    pub tax_withholding: f64,
    pub net_value: f64,
    pub shares_withheld: u64,
    pub net_shares: u64,
    pub price_change_since_grant_percent: f64,
}

/// Sums over a set of tranches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VestingTotals {
    pub events: usize,
    pub shares: u64,
    pub gross_value: f64,
    pub tax_withholding: f64,
    pub net_value: f64,
    pub shares_withheld: u64,
    pub net_shares: u64,
}

impl VestingTotals {
    fn add(&mut self, event: &VestingEventAnalysis) {
        self.events += 1;
        self.shares = self.shares.saturating_add(event.shares);
        self.gross_value += event.gross_value;
        self.tax_withholding += event.tax_withholding;
        self.net_value += event.net_value;
        self.shares_withheld = self.shares_withheld.saturating_add(event.shares_withheld);
        self.net_shares = self.net_shares.saturating_add(event.net_shares);
    }
}

/// Tranches of one grant rolled up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantSummary {
    pub grant_id: String,
    #[serde(with = "iso_date")]
    pub grant_date: Date,
    pub grant_price: f64,
    pub vested_shares: u64,
    pub unvested_shares: u64,
    pub totals: VestingTotals,
    pub price_change_since_grant_percent: f64,
    #[serde(with = "iso_date::option")]
    pub next_vest_date: Option<Date>,
}

/// Full analysis of a schedule at one price and date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VestingAnalytics {
    pub price: f64,
    #[serde(with = "iso_date")]
    pub as_of: Date,
    pub total_tax_rate: f64,
    pub events: Vec<VestingEventAnalysis>,
    pub total_vested: u64,
    pub total_unvested: u64,
    pub total_shares: u64,
    pub total_gross_value: f64,
    pub total_net_value: f64,
    pub total_taxes: f64,
    pub vested: VestingTotals,
    pub unvested: VestingTotals,
    pub next_vesting: Option<VestingEventAnalysis>,
    pub grants: Vec<GrantSummary>,
}

impl VestingAnalytics {
    pub fn analyze(
        schedule: &VestingSchedule,
        price: f64,
        tax: &TaxConfig,
        as_of: Date,
    ) -> Result<Self, ValidationError> {
        if !price.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "price" });
        }
        if price <= 0.0 {
            return Err(ValidationError::NonPositiveValue { field: "price" });
        }

        let total_rate = tax.total_rate();
        let events: Vec<VestingEventAnalysis> = schedule
            .events()
            .iter()
            .map(|event| analyze_event(event, price, total_rate, as_of))
            .collect();

        let mut vested = VestingTotals::default();
        let mut unvested = VestingTotals::default();
        for event in &events {
            if event.is_vested {
                vested.add(event);
            } else {
                unvested.add(event);
            }
        }

        let total_gross_value = vested.gross_value + unvested.gross_value;
        let total_net_value = vested.net_value + unvested.net_value;

        Ok(Self {
            price,
            as_of,
            total_tax_rate: total_rate,
            next_vesting: events.iter().find(|event| !event.is_vested).cloned(),
            grants: summarize_grants(&events, price),
            total_vested: vested.shares,
            total_unvested: unvested.shares,
            total_shares: vested.shares.saturating_add(unvested.shares),
            total_gross_value,
            total_net_value,
            total_taxes: total_gross_value - total_net_value,
            vested,
            unvested,
            events,
        })
    }
}

fn analyze_event(
    event: &VestingEvent,
    price: f64,
    total_rate: f64,
    as_of: Date,
) -> VestingEventAnalysis {
    let gross_value = event.shares as f64 * price;
    let tax_withholding = gross_value * total_rate;
    let shares_withheld = withheld_shares(tax_withholding, price, event.shares);

    VestingEventAnalysis {
        grant_id: event.grant_id.clone(),
        grant_date: event.grant_date,
        grant_price: event.grant_price,
        vest_date: event.vest_date,
        shares: event.shares,
        is_vested: event.vest_date <= as_of,
        days_until_vest: days_between(as_of, event.vest_date),
        gross_value,
        tax_withholding,
        net_value: gross_value - tax_withholding,
        shares_withheld,
        net_shares: event.shares - shares_withheld,
        price_change_since_grant_percent: change_since_grant(price, event.grant_price),
    }
}

fn withheld_shares(tax_withholding: f64, price: f64, shares: u64) -> u64 {
    let raw = (tax_withholding / price - WITHHOLDING_EPSILON).ceil().max(0.0);
    (raw as u64).min(shares)
}

fn change_since_grant(price: f64, grant_price: f64) -> f64 {
    (price - grant_price) / grant_price * 100.0
}

fn summarize_grants(events: &[VestingEventAnalysis], price: f64) -> Vec<GrantSummary> {
    let mut order: Vec<GrantSummary> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for event in events {
        let slot = *index.entry(event.grant_id.as_str()).or_insert_with(|| {
            order.push(GrantSummary {
                grant_id: event.grant_id.clone(),
                grant_date: event.grant_date,
                grant_price: event.grant_price,
                vested_shares: 0,
                unvested_shares: 0,
                totals: VestingTotals::default(),
                price_change_since_grant_percent: change_since_grant(price, event.grant_price),
                next_vest_date: None,
            });
            order.len() - 1
        });

        let summary = &mut order[slot];
        summary.totals.add(event);
        if event.is_vested {
            summary.vested_shares = summary.vested_shares.saturating_add(event.shares);
        } else {
            summary.unvested_shares = summary.unvested_shares.saturating_add(event.shares);
            if summary.next_vest_date.is_none() {
                summary.next_vest_date = Some(event.vest_date);
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn tax_rates_are_bounded() {
        assert!(matches!(
            TaxConfig::new(1.0, 0.0, 0.0),
            Err(ValidationError::TaxRateOutOfRange { field: "federal_rate", .. })
        ));
        assert!(matches!(
            TaxConfig::new(0.5, 0.3, 0.2),
            Err(ValidationError::CombinedTaxRateTooHigh { .. })
        ));
        assert!(TaxConfig::new(-0.1, 0.0, 0.0).is_err());
        assert!((TaxConfig::default().total_rate() - 0.3865).abs() < 1e-12);
    }

    #[test]
    fn event_rejects_vest_before_grant() {
        let error = VestingEvent::new("G1", date!(2025 - 03 - 01), 5.0, date!(2025 - 02 - 01), 10)
            .expect_err("vest precedes grant");
        assert!(matches!(error, ValidationError::VestBeforeGrant { .. }));
    }

    #[test]
    fn schedule_rejects_tranches_with_different_terms() {
        let a = VestingEvent::new("G1", date!(2025 - 01 - 01), 5.0, date!(2025 - 06 - 01), 10)
            .expect("valid");
        let b = VestingEvent::new("G1", date!(2025 - 01 - 01), 6.0, date!(2025 - 09 - 01), 10)
            .expect("valid");

        assert_eq!(
            VestingSchedule::new(vec![a, b]),
            Err(ValidationError::InconsistentGrant {
                grant_id: String::from("G1")
            })
        );
    }

    #[test]
    fn exact_share_multiple_does_not_round_up() {
        // 100 shares at 10.00 with a 0.25 rate withholds exactly 25 shares.
        assert_eq!(withheld_shares(250.0, 10.0, 100), 25);
        assert_eq!(withheld_shares(250.01, 10.0, 100), 26);
        assert_eq!(withheld_shares(5000.0, 10.0, 100), 100);
    }

    #[test]
    fn share_totals_saturate_instead_of_overflowing() {
        let huge = u64::MAX / 2 + 1;
        let events = vec![
            VestingEvent::new("G1", date!(2024 - 01 - 01), 1.0, date!(2024 - 06 - 01), huge)
                .expect("valid"),
            VestingEvent::new("G1", date!(2024 - 01 - 01), 1.0, date!(2024 - 12 - 01), huge)
                .expect("valid"),
        ];
        let schedule = VestingSchedule::new(events).expect("valid schedule");
        let tax = TaxConfig::new(0.0, 0.0, 0.0).expect("valid rates");

        let analytics =
            VestingAnalytics::analyze(&schedule, 1.0, &tax, date!(2025 - 01 - 01)).expect("analyzes");

        assert_eq!(analytics.vested.shares, u64::MAX);
        assert_eq!(analytics.total_shares, u64::MAX);
        assert_eq!(analytics.grants[0].vested_shares, u64::MAX);
    }

    #[test]
    fn schedule_deserializes_with_legacy_date_key() {
        let schedule: VestingSchedule = serde_json::from_str(
            r#"[{"grantId":"RSU-2","grantDate":"2024-03-01","grantPrice":6.1,"date":"2025-09-15","shares":1200},
                {"grantId":"RSU-1","grantDate":"2024-03-01","grantPrice":6.1,"vestDate":"2025-03-15","shares":1200}]"#,
        )
        .expect("valid schedule");

        assert_eq!(schedule.events()[0].grant_id(), "RSU-1");
        assert_eq!(schedule.events()[1].vest_date(), date!(2025 - 09 - 15));
    }
}
