//! Evaluation entry points over scored frames.

use crate::common::error::RetroResult;
use crate::data::domain::Frame;
use crate::inference::domain::{prediction_column, P1_COLUMN};

use super::domain::{CostModel, RegressionSummary, ScoredRecord, ThresholdRow};
use super::regression::evaluate_regression;
use super::threshold::{evaluate_with, SweepOptions};

/// Threshold sweep over the `target_column` and `p1` columns of a scored frame.
pub fn evaluate_frame(
    frame: &Frame,
    target_column: &str,
    model_name: &str,
    grouping: Option<&str>,
    cost: &CostModel,
    opts: SweepOptions,
) -> RetroResult<Vec<ThresholdRow>> {
    let records = scored_records(frame, target_column)?;
    Ok(evaluate_with(&records, model_name, grouping, cost, opts))
}

/// Regression summary over `target_column` and `Predict_{target_column}`.
pub fn evaluate_regression_frame(
    frame: &Frame,
    target_column: &str,
    model_name: &str,
    grouping: Option<&str>,
) -> RetroResult<RegressionSummary> {
    let y_true = frame.numeric(target_column)?;
    let y_pred = frame.numeric(&prediction_column(target_column))?;
    evaluate_regression(y_true, y_pred, model_name, grouping)
}

/// Pair labels with `p1`. Non-integral labels match neither class.
pub fn scored_records(frame: &Frame, target_column: &str) -> RetroResult<Vec<ScoredRecord>> {
    let labels = frame.numeric(target_column)?;
    let p1 = frame.numeric(P1_COLUMN)?;
    Ok(labels
        .iter()
        .zip(p1)
        .map(|(&y, &p)| {
            let label = if y.is_finite() && y.fract() == 0.0 {
                y as i64
            } else {
                -1
            };
            ScoredRecord::new(label, p)
        })
        .collect())
}
