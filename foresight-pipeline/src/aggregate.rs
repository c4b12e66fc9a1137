//! Cross-entity aggregation of evaluation results.
//!
//! The summary is rebuilt from scratch on every run and fully replaces
//! any prior one. Failed entities are listed for diagnostics but never
//! contribute to the numeric means.

use crate::evaluate::EvaluationResult;
use crate::metrics::mean_f64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unweighted cross-entity means of evaluation metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub succeeded: usize,
    pub failed: Vec<String>,
    /// Metric name to mean value across successful entities. Empty when
    /// no entity succeeded.
    pub means: BTreeMap<String, f64>,
}

/// Combine per-entity results into a summary.
pub fn aggregate(results: &[EvaluationResult]) -> AggregateSummary {
    let mut mae = Vec::new();
    let mut mse = Vec::new();
    let mut rmse = Vec::new();
    let mut sharpe = Vec::new();
    let mut failed = Vec::new();

    for result in results {
        match &result.metrics {
            Some(m) => {
                mae.push(m.mae);
                mse.push(m.mse);
                rmse.push(m.rmse);
                sharpe.push(m.sharpe);
            }
            None => failed.push(result.symbol.clone()),
        }
    }

    let mut means = BTreeMap::new();
    if !mae.is_empty() {
        means.insert("mae".to_string(), mean_f64(&mae));
        means.insert("mse".to_string(), mean_f64(&mse));
        means.insert("rmse".to_string(), mean_f64(&rmse));
        means.insert("sharpe".to_string(), mean_f64(&sharpe));
    }

    AggregateSummary {
        succeeded: mae.len(),
        failed,
        means,
    }
}
