//! Scoring helpers bridging fitted models and frames.

use std::time::Instant;

use crate::common::error::{RetroError, RetroResult};
use crate::data::domain::{ClassMap, Column, Frame};
use crate::training::domain::FittedModel;

use super::domain::{
    prediction_column, PredictMode, PredictRequest, Predictions, ScoreLayout, P0_COLUMN,
    P1_COLUMN,
};

/// Predict mode a layout needs from the engine.
pub fn predict_mode(layout: ScoreLayout) -> PredictMode {
    match layout {
        ScoreLayout::Value => PredictMode::RawValue,
        ScoreLayout::ClassLabel => PredictMode::Class,
        ScoreLayout::ProbabilityPair
        | ScoreLayout::PositiveOnly
        | ScoreLayout::ClassProbabilities => PredictMode::Probability,
    }
}

/// Run a fitted model over `features` and write the result onto `out`.
pub fn score_frame(
    model: &dyn FittedModel,
    features: &Frame,
    request: PredictRequest,
    layout: ScoreLayout,
    target: &str,
    class_map: Option<&ClassMap>,
    out: &mut Frame,
) -> RetroResult<()> {
    let start = Instant::now();
    let predictions = model.predict(features, request)?;
    if predictions.rows() != out.nrows() {
        return Err(RetroError::invalid(format!(
            "model returned {} predictions for {} rows",
            predictions.rows(),
            out.nrows()
        )));
    }
    write_predictions(layout, target, predictions, class_map, out)?;
    tracing::debug!(
        rows = out.nrows(),
        ?layout,
        dur_ms = start.elapsed().as_millis() as u64,
        "scored frame"
    );
    Ok(())
}

/// Append prediction columns to `out` following the naming conventions of `layout`.
pub fn write_predictions(
    layout: ScoreLayout,
    target: &str,
    predictions: Predictions,
    class_map: Option<&ClassMap>,
    out: &mut Frame,
) -> RetroResult<()> {
    match layout {
        ScoreLayout::Value => {
            out.push_column(prediction_column(target), Column::Float(predictions.into_values()?))
        }
        ScoreLayout::ProbabilityPair => {
            let mut cols = predictions.into_columns()?;
            if cols.len() != 2 {
                return Err(RetroError::invalid(format!(
                    "expected 2 probability columns, got {}",
                    cols.len()
                )));
            }
            let p1 = cols.pop().unwrap_or_default();
            let p0 = cols.pop().unwrap_or_default();
            out.push_column(P0_COLUMN, Column::Float(p0))?;
            out.push_column(P1_COLUMN, Column::Float(p1))
        }
        ScoreLayout::PositiveOnly => {
            let p1 = predictions.into_values()?;
            let p0 = p1.iter().map(|p| 1.0 - p).collect();
            out.push_column(P1_COLUMN, Column::Float(p1))?;
            out.push_column(P0_COLUMN, Column::Float(p0))
        }
        ScoreLayout::ClassLabel => {
            let codes = predictions.into_values()?;
            let column = match class_map {
                Some(map) => Column::Text(decode_classes(&codes, map)?),
                None => Column::Float(codes),
            };
            out.push_column(prediction_column(target), column)
        }
        ScoreLayout::ClassProbabilities => {
            let cols = predictions.into_columns()?;
            if let Some(map) = class_map {
                if map.len() != cols.len() {
                    return Err(RetroError::invalid(format!(
                        "{} probability columns for {} classes",
                        cols.len(),
                        map.len()
                    )));
                }
            }
            let names: Vec<String> = (0..cols.len())
                .map(|idx| {
                    class_map
                        .and_then(|m| m.label(idx))
                        .map_or_else(|| format!("C{idx}"), str::to_string)
                })
                .collect();
            // class columns are appended, never written over inputs
            if let Some(taken) = names.iter().find(|name| out.has_column(name)) {
                return Err(RetroError::invalid(format!(
                    "class label {taken:?} collides with an existing column"
                )));
            }
            for (name, values) in names.into_iter().zip(cols) {
                out.push_column(name, Column::Float(values))?;
            }
            Ok(())
        }
    }
}

fn decode_classes(codes: &[f64], map: &ClassMap) -> RetroResult<Vec<String>> {
    codes
        .iter()
        .map(|&code| {
            let idx = code.round();
            (idx >= 0.0)
                .then(|| map.label(idx as usize))
                .flatten()
                .map(str::to_string)
                .ok_or_else(|| RetroError::invalid(format!("predicted class code {code} is unknown")))
        })
        .collect()
}
