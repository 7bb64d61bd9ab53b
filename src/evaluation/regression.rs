//! Regression summary metrics (scikit-learn definitions).

use crate::common::error::{RetroError, RetroResult};
use crate::common::time;

use super::domain::{EvalMeta, Metric, RegressionSummary};

/// Summarise `y_pred` against `y_true` in a single row.
pub fn evaluate_regression(
    y_true: &[f64],
    y_pred: &[f64],
    model_name: &str,
    grouping: Option<&str>,
) -> RetroResult<RegressionSummary> {
    if y_true.len() != y_pred.len() {
        return Err(RetroError::invalid(format!(
            "y_true has {} values, y_pred has {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(RetroError::invalid("regression evaluation needs at least one value"));
    }

    let residuals: Vec<f64> = y_true.iter().zip(y_pred).map(|(t, p)| t - p).collect();
    let abs_residuals: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();

    Ok(RegressionSummary {
        meta: EvalMeta::new(model_name, grouping, time::timestamp()),
        explained_variance: explained_variance(y_true, &residuals),
        r2: r2(y_true, &residuals),
        mape: mape(y_true, &abs_residuals),
        mae: mean(&abs_residuals),
        median_ae: median(&abs_residuals),
        mse: residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64,
        msle: msle(y_true, y_pred),
        max_error: abs_residuals.iter().copied().fold(0.0, f64::max),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

// A constant target scores 1.0 when predicted perfectly and 0.0 otherwise.
fn score_against_variance(unexplained: f64, total: f64) -> f64 {
    if total == 0.0 {
        if unexplained == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - unexplained / total
    }
}

fn explained_variance(y_true: &[f64], residuals: &[f64]) -> f64 {
    score_against_variance(variance(residuals), variance(y_true))
}

fn r2(y_true: &[f64], residuals: &[f64]) -> f64 {
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let m = mean(y_true);
    let ss_tot: f64 = y_true.iter().map(|v| (v - m).powi(2)).sum();
    score_against_variance(ss_res, ss_tot)
}

fn mape(y_true: &[f64], abs_residuals: &[f64]) -> f64 {
    let sum: f64 = y_true
        .iter()
        .zip(abs_residuals)
        .map(|(t, r)| r / t.abs().max(f64::EPSILON))
        .sum();
    sum / y_true.len() as f64
}

fn msle(y_true: &[f64], y_pred: &[f64]) -> Metric {
    let positive = |v: &[f64]| v.iter().all(|&x| x > 0.0);
    if !positive(y_true) || !positive(y_pred) {
        return Metric::UNDEFINED;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t.ln_1p() - p.ln_1p()).powi(2))
        .sum();
    Metric::defined(sum / y_true.len() as f64)
}
