//! Domain definitions for prediction requests and how predictions land in frames.

use crate::common::error::{RetroError, RetroResult};

/// Output requested from a fitted model.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PredictMode {
    /// Untransformed model output (regression values).
    RawValue,
    /// Class probabilities.
    Probability,
    /// Most likely class code.
    Class,
}

/// Arguments of a single predict call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PredictRequest {
    pub mode: PredictMode,
    /// Restrict boosting to `0..limit` iterations.
    pub iteration_limit: Option<usize>,
}

impl PredictRequest {
    pub fn new(mode: PredictMode) -> Self {
        Self {
            mode,
            iteration_limit: None,
        }
    }
}

/// Raw predictions returned by an engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Predictions {
    /// One value per row.
    Values(Vec<f64>),
    /// One column per class, each with one value per row.
    Probabilities(Vec<Vec<f64>>),
}

impl Predictions {
    pub fn rows(&self) -> usize {
        match self {
            Predictions::Values(v) => v.len(),
            Predictions::Probabilities(cols) => cols.first().map_or(0, Vec::len),
        }
    }

    pub fn into_values(self) -> RetroResult<Vec<f64>> {
        match self {
            Predictions::Values(v) => Ok(v),
            Predictions::Probabilities(_) => Err(RetroError::invalid(
                "expected one prediction per row, got class probabilities",
            )),
        }
    }

    pub fn into_columns(self) -> RetroResult<Vec<Vec<f64>>> {
        match self {
            Predictions::Probabilities(cols) => Ok(cols),
            Predictions::Values(_) => Err(RetroError::invalid(
                "expected class probabilities, got one prediction per row",
            )),
        }
    }
}

/// How a backend's predictions are written back onto the scored frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScoreLayout {
    /// `Predict_{target}` holds the raw value.
    Value,
    /// Engine returns `[p0, p1]`; both are written.
    ProbabilityPair,
    /// Engine returns `p1` only; `p0 = 1 - p1`.
    PositiveOnly,
    /// Engine returns class codes; `Predict_{target}` holds the original labels.
    ClassLabel,
    /// Engine returns one probability column per class, named by class label.
    ClassProbabilities,
}

/// Column holding the positive-class probability.
pub const P1_COLUMN: &str = "p1";
/// Column holding the negative-class probability.
pub const P0_COLUMN: &str = "p0";

/// Column name for regression values and multiclass labels.
pub fn prediction_column(target: &str) -> String {
    format!("Predict_{target}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_column_naming() {
        assert_eq!(prediction_column("Leads"), "Predict_Leads");
    }

    #[test]
    fn prediction_shape_accessors() {
        let v = Predictions::Values(vec![0.1, 0.2]);
        assert_eq!(v.rows(), 2);
        assert!(v.clone().into_columns().is_err());
        assert_eq!(v.into_values().unwrap(), vec![0.1, 0.2]);

        let p = Predictions::Probabilities(vec![vec![0.9, 0.4], vec![0.1, 0.6]]);
        assert_eq!(p.rows(), 2);
        assert_eq!(p.into_columns().unwrap().len(), 2);
    }
}
