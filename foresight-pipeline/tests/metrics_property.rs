//! Property tests for evaluation metrics and aggregation.
//!
//! Uses proptest to verify:
//! 1. Metric identities — RMSE² equals MSE, MAE never exceeds RMSE,
//!    everything non-negative, identical series score zero
//! 2. Sharpe guards — flat paths have no Sharpe; varied paths always
//!    get a finite one, strictly lowered by the risk-free rate
//! 3. Aggregation — means cover exactly the successful subset, with a
//!    fixed key set and no contribution from failures

use foresight_pipeline::aggregate::aggregate;
use foresight_pipeline::metrics::{
    annualized_sharpe, mean_absolute_error, mean_squared_error, root_mean_squared_error,
    EntityMetrics,
};
use foresight_pipeline::EvaluationResult;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_value() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|v| (v * 100.0).round() / 100.0)
}

fn arb_pairs() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((arb_value(), arb_value()), 1..50)
}

/// Daily returns with a guaranteed spread, so volatility is never zero.
fn arb_returns() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.05..0.05_f64, 3..30).prop_filter("needs return spread", |r| {
        let lo = r.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let hi = r.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        hi - lo > 1e-4
    })
}

/// Per-entity outcomes: `Some` carries success metrics, `None` fails.
fn arb_outcomes() -> impl Strategy<Value = Vec<Option<(f64, f64, f64, f64)>>> {
    let metrics = (0.0..100.0_f64, 0.0..100.0_f64, 0.0..100.0_f64, -5.0..5.0_f64);
    prop::collection::vec(prop::option::of(metrics), 0..12)
}

fn path_from(returns: &[f64]) -> Vec<f64> {
    let mut values = vec![100.0];
    for r in returns {
        let last = *values.last().unwrap();
        values.push(last * (1.0 + r));
    }
    values
}

fn results_from(outcomes: &[Option<(f64, f64, f64, f64)>]) -> Vec<EvaluationResult> {
    outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| {
            let symbol = format!("E{i}");
            match outcome {
                Some((mae, mse, rmse, sharpe)) => EvaluationResult::success(
                    &symbol,
                    EntityMetrics {
                        mae: *mae,
                        mse: *mse,
                        rmse: *rmse,
                        sharpe: *sharpe,
                    },
                ),
                None => EvaluationResult::failure(&symbol, "evaluation failed"),
            }
        })
        .collect()
}

// ── 1. Metric identities ─────────────────────────────────────────────

proptest! {
    /// RMSE is the square root of MSE, and by the power-mean inequality
    /// MAE can never exceed it.
    #[test]
    fn rmse_squares_to_mse_and_dominates_mae(pairs in arb_pairs()) {
        let actual: Vec<f64> = pairs.iter().map(|p| p.0).collect();
        let predicted: Vec<f64> = pairs.iter().map(|p| p.1).collect();

        let mae = mean_absolute_error(&actual, &predicted);
        let mse = mean_squared_error(&actual, &predicted);
        let rmse = root_mean_squared_error(&actual, &predicted);

        prop_assert!(mae >= 0.0 && mse >= 0.0 && rmse >= 0.0);
        prop_assert!((rmse * rmse - mse).abs() < 1e-9 * mse.max(1.0));
        prop_assert!(mae <= rmse + 1e-9);
    }

    /// A forecast equal to the actuals scores exactly zero on every
    /// error metric.
    #[test]
    fn identical_series_scores_zero_error(values in prop::collection::vec(arb_value(), 1..50)) {
        prop_assert_eq!(mean_absolute_error(&values, &values), 0.0);
        prop_assert_eq!(mean_squared_error(&values, &values), 0.0);
        prop_assert_eq!(root_mean_squared_error(&values, &values), 0.0);
    }
}

// ── 2. Sharpe guards ─────────────────────────────────────────────────

proptest! {
    /// A flat value path has zero volatility and therefore no Sharpe.
    #[test]
    fn flat_paths_have_no_sharpe(value in arb_value(), len in 3usize..40) {
        let values = vec![value; len];
        prop_assert_eq!(annualized_sharpe(&values, 0.0), None);
    }

    /// Any path with genuinely varied returns gets a finite Sharpe.
    #[test]
    fn varied_returns_give_finite_sharpe(returns in arb_returns()) {
        let values = path_from(&returns);
        let sharpe = annualized_sharpe(&values, 0.0);
        prop_assert!(sharpe.is_some());
        prop_assert!(sharpe.unwrap().is_finite());
    }

    /// Raising the risk-free rate strictly lowers the Sharpe ratio
    /// (the volatility term is shift-invariant).
    #[test]
    fn risk_free_rate_strictly_lowers_sharpe(returns in arb_returns(), rf in 0.01..0.20_f64) {
        let values = path_from(&returns);
        let base = annualized_sharpe(&values, 0.0).unwrap();
        let discounted = annualized_sharpe(&values, rf).unwrap();
        prop_assert!(discounted < base);
    }
}

// ── 3. Aggregation ───────────────────────────────────────────────────

proptest! {
    /// The summary counts and means are computed over exactly the
    /// successful subset; failures are listed and never contribute.
    #[test]
    fn means_cover_exactly_the_successes(outcomes in arb_outcomes()) {
        let results = results_from(&outcomes);
        let summary = aggregate(&results);

        let successes: Vec<&(f64, f64, f64, f64)> = outcomes.iter().flatten().collect();
        prop_assert_eq!(summary.succeeded, successes.len());

        let failures: Vec<String> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| outcome.is_none())
            .map(|(i, _)| format!("E{i}"))
            .collect();
        prop_assert_eq!(summary.failed, failures);

        if successes.is_empty() {
            prop_assert!(summary.means.is_empty());
        } else {
            let keys: Vec<&str> = summary.means.keys().map(|k| k.as_str()).collect();
            prop_assert_eq!(keys, vec!["mae", "mse", "rmse", "sharpe"]);

            let count = successes.len() as f64;
            let expected_mae = successes.iter().map(|m| m.0).sum::<f64>() / count;
            let expected_sharpe = successes.iter().map(|m| m.3).sum::<f64>() / count;
            prop_assert!((summary.means["mae"] - expected_mae).abs() < 1e-9);
            prop_assert!((summary.means["sharpe"] - expected_sharpe).abs() < 1e-9);
        }
    }
}
