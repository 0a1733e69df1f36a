//! Technical indicators over closing prices, oldest first.

use serde::Serialize;

/// Default RSI lookback.
pub const DEFAULT_RSI_PERIOD: usize = 14;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Mean of the last `period` values.
pub fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Wilder-smoothed relative strength index in `[0, 100]`.
///
/// Needs `period + 1` closes. A window with no losses reads 100.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }

    let changes: Vec<f64> = closes.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let (seed, rest) = changes.split_at(period);

    let mut avg_gain = seed.iter().map(|delta| delta.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = seed.iter().map(|delta| (-delta).max(0.0)).sum::<f64>() / period as f64;

    let smoothing = (period - 1) as f64;
    for delta in rest {
        avg_gain = (avg_gain * smoothing + delta.max(0.0)) / period as f64;
        avg_loss = (avg_loss * smoothing + (-delta).max(0.0)) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Sample standard deviation of simple daily returns scaled by √252, in percent.
pub fn annualized_volatility(closes: &[f64]) -> Option<f64> {
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect();
    if returns.len() < 2 {
        return None;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (returns.len() - 1) as f64;

    Some((variance * TRADING_DAYS_PER_YEAR).sqrt() * 100.0)
}

/// Indicator values attached to a price history response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub rsi14: Option<f64>,
    pub volatility: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn from_closes(closes: &[f64]) -> Self {
        Self {
            sma20: sma(closes, 20),
            sma50: sma(closes, 50),
            rsi14: rsi(closes, DEFAULT_RSI_PERIOD),
            volatility: annualized_volatility(closes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_uses_trailing_window() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&closes, 2), Some(4.5));
        assert_eq!(sma(&closes, 5), Some(3.0));
        assert_eq!(sma(&closes, 6), None);
        assert_eq!(sma(&closes, 0), None);
    }

    #[test]
    fn rsi_saturates_without_losses() {
        let rising: Vec<f64> = (0..20).map(|step| 5.0 + step as f64 * 0.1).collect();
        assert_eq!(rsi(&rising, 14), Some(100.0));

        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert_eq!(rsi(&falling, 14), Some(0.0));
    }

    #[test]
    fn rsi_is_balanced_for_alternating_moves() {
        let closes: Vec<f64> = (0..15)
            .map(|step| if step % 2 == 0 { 5.0 } else { 5.5 })
            .collect();
        let value = rsi(&closes, 14).expect("enough data");
        assert!((value - 50.0).abs() < 1e-9);
        assert_eq!(rsi(&closes[..14], 14), None);
    }

    #[test]
    fn flat_series_has_zero_volatility() {
        assert_eq!(annualized_volatility(&[5.0, 5.0, 5.0, 5.0]), Some(0.0));
        assert_eq!(annualized_volatility(&[5.0, 5.1]), None);
    }

    #[test]
    fn volatility_scales_by_trading_days() {
        // Returns +10% and -10%: sample std dev is sqrt(0.02).
        let value = annualized_volatility(&[100.0, 110.0, 99.0]).expect("enough data");
        let expected = (0.02_f64 * 252.0).sqrt() * 100.0;
        assert!((value - expected).abs() < 1e-9);
    }
}
