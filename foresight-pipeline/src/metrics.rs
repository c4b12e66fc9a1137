//! Forecast accuracy metrics — pure functions over aligned value series.
//!
//! Every metric is a pure function: slices in, scalar out. No
//! dependencies on the stores or the stage runners. Accuracy metrics
//! expect the caller to have aligned actual and predicted values by
//! date; return statistics work on a single value series.

use serde::{Deserialize, Serialize};

/// Accuracy and return metrics for a single entity's evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMetrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub sharpe: f64,
}

impl EntityMetrics {
    /// Compute accuracy metrics from aligned pairs, attaching a Sharpe
    /// ratio computed elsewhere.
    pub fn compute(actual: &[f64], predicted: &[f64], sharpe: f64) -> Self {
        Self {
            mae: mean_absolute_error(actual, predicted),
            mse: mean_squared_error(actual, predicted),
            rmse: root_mean_squared_error(actual, predicted),
            sharpe,
        }
    }
}

// ─── Accuracy metrics ───────────────────────────────────────────────

/// Mean absolute error over aligned pairs.
///
/// Returns 0.0 for empty or mismatched inputs.
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return 0.0;
    }
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    total / actual.len() as f64
}

/// Mean squared error over aligned pairs.
///
/// Returns 0.0 for empty or mismatched inputs.
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return 0.0;
    }
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    total / actual.len() as f64
}

/// Root mean squared error over aligned pairs.
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean_squared_error(actual, predicted).sqrt()
}

// ─── Return statistics ──────────────────────────────────────────────

/// Day-over-day fractional changes of a value series.
///
/// The first value has no predecessor and is dropped. A zero
/// predecessor yields 0.0 for that step.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    if values.len() < 2 {
        return Vec::new();
    }
    values
        .windows(2)
        .map(|w| {
            if w[0].abs() > 1e-12 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

/// Annualized Sharpe ratio of a daily value series.
///
/// Sharpe = mean(daily returns - rf) / std(daily returns) * sqrt(252),
/// with `risk_free_rate` quoted annually. Returns None when there are
/// fewer than two returns or the return volatility is zero; a flat
/// series has no meaningful risk-adjusted return and callers surface
/// that explicitly rather than report 0.0.
pub fn annualized_sharpe(values: &[f64], risk_free_rate: f64) -> Option<f64> {
    let returns = pct_change(values);
    if returns.len() < 2 {
        return None;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-12 {
        return None;
    }
    Some((mean / std) * (252.0_f64).sqrt())
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Accuracy ──

    #[test]
    fn mae_known_values() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [2.0, 2.0, 5.0];
        assert!((mean_absolute_error(&actual, &predicted) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn mse_known_values() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [2.0, 2.0, 5.0];
        assert!((mean_squared_error(&actual, &predicted) - 5.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn rmse_is_sqrt_of_mse() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [2.0, 2.0, 5.0];
        let expected = (5.0_f64 / 3.0).sqrt();
        assert!((root_mean_squared_error(&actual, &predicted) - expected).abs() < 1e-10);
    }

    #[test]
    fn perfect_prediction_is_zero_error() {
        let values = [10.0, 20.0, 30.0];
        assert_eq!(mean_absolute_error(&values, &values), 0.0);
        assert_eq!(mean_squared_error(&values, &values), 0.0);
        assert_eq!(root_mean_squared_error(&values, &values), 0.0);
    }

    #[test]
    fn accuracy_degenerate_inputs() {
        assert_eq!(mean_absolute_error(&[], &[]), 0.0);
        assert_eq!(mean_absolute_error(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(mean_squared_error(&[1.0, 2.0], &[1.0]), 0.0);
    }

    // ── Pct change ──

    #[test]
    fn pct_change_basic() {
        let values = [100.0, 110.0, 99.0];
        let r = pct_change(&values);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.1).abs() < 1e-10);
        let expected = (99.0 - 110.0) / 110.0;
        assert!((r[1] - expected).abs() < 1e-10);
    }

    #[test]
    fn pct_change_short_series() {
        assert!(pct_change(&[]).is_empty());
        assert!(pct_change(&[100.0]).is_empty());
    }

    #[test]
    fn pct_change_zero_predecessor() {
        let r = pct_change(&[0.0, 5.0, 10.0]);
        assert_eq!(r[0], 0.0);
        assert!((r[1] - 1.0).abs() < 1e-10);
    }

    // ── Sharpe ──

    #[test]
    fn sharpe_known_returns() {
        // Returns exactly [0.01, 0.02, 0.03]: mean 0.02, sample std 0.01
        let values = [100.0, 101.0, 103.02, 106.1106];
        let s = annualized_sharpe(&values, 0.0).unwrap();
        let expected = 2.0 * (252.0_f64).sqrt();
        assert!((s - expected).abs() < 1e-6, "expected {expected}, got {s}");
    }

    #[test]
    fn sharpe_constant_series_is_none() {
        let values = [100.0; 20];
        assert_eq!(annualized_sharpe(&values, 0.0), None);
    }

    #[test]
    fn sharpe_constant_return_is_none() {
        // Perfectly constant daily return → zero std
        let mut values = vec![100.0];
        for i in 1..20 {
            values.push(values[i - 1] * 1.001);
        }
        assert_eq!(annualized_sharpe(&values, 0.0), None);
    }

    #[test]
    fn sharpe_too_few_points_is_none() {
        assert_eq!(annualized_sharpe(&[], 0.0), None);
        assert_eq!(annualized_sharpe(&[100.0], 0.0), None);
        assert_eq!(annualized_sharpe(&[100.0, 101.0], 0.0), None);
    }

    #[test]
    fn risk_free_rate_lowers_sharpe() {
        let values = [100.0, 101.0, 103.02, 106.1106];
        let s0 = annualized_sharpe(&values, 0.0).unwrap();
        let s_rf = annualized_sharpe(&values, 0.0525).unwrap();
        assert!(s_rf < s0);
    }

    // ── Aggregate ──

    #[test]
    fn compute_wires_all_fields() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [2.0, 2.0, 5.0];
        let m = EntityMetrics::compute(&actual, &predicted, 1.5);
        assert!((m.mae - 1.0).abs() < 1e-10);
        assert!((m.mse - 5.0 / 3.0).abs() < 1e-10);
        assert!((m.rmse - m.mse.sqrt()).abs() < 1e-10);
        assert_eq!(m.sharpe, 1.5);
    }
}
