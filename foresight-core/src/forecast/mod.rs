//! Forecast model seam and baseline implementation.
//!
//! The pipeline treats the forecasting model as an opaque function from
//! a daily close series to a forecast with uncertainty bounds. The
//! [`Forecaster`] trait is that seam; [`DriftForecaster`] is the
//! built-in baseline (random walk with drift). Heavier models plug in
//! behind the same trait.

pub mod config;
pub mod holidays;

pub use config::{ForecastConfig, GrowthMode, SeasonalityMode, SeasonalityTerm};
pub use holidays::Holiday;

use crate::data::normalize::CleanedPoint;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One day of a model-produced forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// Errors from fitting or predicting. All are per-entity failures.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("series is empty")]
    EmptySeries,

    #[error("series has {len} points; at least 2 are required to fit")]
    TooShort { len: usize },

    #[error("model failure: {0}")]
    Model(String),
}

/// A forecasting model.
///
/// `forecast` fits on `series` and returns one point per input date
/// (fitted values) followed by `horizon_days` consecutive daily points
/// beyond the last input date. Callers validate `config` before
/// invoking; models are not required to be deterministic across re-fits.
pub trait Forecaster: Send + Sync {
    fn name(&self) -> &str;

    fn forecast(
        &self,
        series: &[CleanedPoint],
        horizon_days: u32,
        config: &ForecastConfig,
    ) -> Result<Vec<ForecastPoint>, ForecastError>;
}

/// Random walk with drift.
///
/// Drift is the mean day-over-day change; the uncertainty band grows
/// with the square root of the number of steps ahead, scaled to the
/// configured interval width under a Gaussian increment assumption.
pub struct DriftForecaster;

impl DriftForecaster {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DriftForecaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for DriftForecaster {
    fn name(&self) -> &str {
        "drift"
    }

    fn forecast(
        &self,
        series: &[CleanedPoint],
        horizon_days: u32,
        config: &ForecastConfig,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        if series.is_empty() {
            return Err(ForecastError::EmptySeries);
        }
        if series.len() < 2 {
            return Err(ForecastError::TooShort { len: series.len() });
        }

        let diffs: Vec<f64> = series.windows(2).map(|w| w[1].close - w[0].close).collect();
        let drift = mean(&diffs);
        let sigma = std_dev(&diffs);
        let z = normal_quantile((1.0 + config.interval_width) / 2.0);

        let mut points = Vec::with_capacity(series.len() + horizon_days as usize);

        // Fitted values: one-step-ahead prediction from the prior close
        points.push(ForecastPoint {
            date: series[0].date,
            yhat: series[0].close,
            yhat_lower: series[0].close,
            yhat_upper: series[0].close,
        });
        for pair in series.windows(2) {
            let yhat = pair[0].close + drift;
            points.push(ForecastPoint {
                date: pair[1].date,
                yhat,
                yhat_lower: yhat - z * sigma,
                yhat_upper: yhat + z * sigma,
            });
        }

        // Future values: last close plus drift per step
        let last = &series[series.len() - 1];
        for step in 1..=horizon_days as i64 {
            let yhat = last.close + drift * step as f64;
            let spread = z * sigma * (step as f64).sqrt();
            points.push(ForecastPoint {
                date: last.date + chrono::Duration::days(step),
                yhat,
                yhat_lower: yhat - spread,
                yhat_upper: yhat + spread,
            });
        }

        Ok(points)
    }
}

// ─── Math primitives ────────────────────────────────────────────────

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator). Zero for fewer than two values.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Inverse standard normal CDF via Acklam's rational approximation
/// (absolute error below 1.2e-9 over the open unit interval).
fn normal_quantile(p: f64) -> f64 {
    if !(0.0..=1.0).contains(&p) || p == 0.0 || p == 1.0 {
        return f64::NAN;
    }

    #[allow(clippy::excessive_precision)]
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    #[allow(clippy::excessive_precision)]
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    #[allow(clippy::excessive_precision)]
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    #[allow(clippy::excessive_precision)]
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];

    const P_LOW: f64 = 0.02425;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}
