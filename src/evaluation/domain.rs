//! Domain primitives for model evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker used in place of the `Grouping` label when none was supplied.
pub const NO_GROUPING: &str = "NA";

/// Value written for an undefined metric in flat tabular exports.
pub const UNDEFINED_SENTINEL: f64 = -1.0;

/// One scored prediction: ground truth plus predicted probability of class 1.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub label: i64,
    pub p1: f64,
}

impl ScoredRecord {
    pub fn new(label: i64, p1: f64) -> Self {
        Self { label, p1 }
    }
}

/// Per-outcome weights for the utility score.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    pub tp_cost: f64,
    pub fp_cost: f64,
    pub fn_cost: f64,
    pub tn_cost: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            tp_cost: 0.0,
            fp_cost: 1.0,
            fn_cost: 1.0,
            tn_cost: 0.0,
        }
    }
}

/// A ratio that is either defined or undefined because its denominator was zero.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metric(Option<f64>);

impl Metric {
    pub const UNDEFINED: Metric = Metric(None);

    pub fn defined(value: f64) -> Self {
        Metric(Some(value))
    }

    /// `numerator / denominator`, undefined when the denominator is zero.
    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            Metric::UNDEFINED
        } else {
            Metric::defined(numerator / denominator)
        }
    }

    pub fn value(self) -> Option<f64> {
        self.0
    }

    pub fn is_defined(self) -> bool {
        self.0.is_some()
    }

    /// Legacy rendering: undefined becomes `-1.0`.
    pub fn sentinel(self) -> f64 {
        self.0.unwrap_or(UNDEFINED_SENTINEL)
    }
}

impl From<Option<f64>> for Metric {
    fn from(value: Option<f64>) -> Self {
        Metric(value)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v}"),
            None => write!(f, "{UNDEFINED_SENTINEL}"),
        }
    }
}

/// Identifying metadata attached to every evaluation row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalMeta {
    pub model_name: String,
    pub feature_set: Option<String>,
    pub grouping: String,
    pub created_at: String,
}

impl EvalMeta {
    pub fn new(model_name: &str, grouping: Option<&str>, created_at: String) -> Self {
        Self {
            model_name: model_name.to_string(),
            feature_set: None,
            grouping: grouping.unwrap_or(NO_GROUPING).to_string(),
            created_at,
        }
    }
}

/// Confusion-matrix counts at a single threshold.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdCounts {
    pub tn: u64,
    pub tp: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
    pub fp: u64,
    /// Records predicted negative (`p1 < t`).
    pub n: u64,
    /// Positive records predicted positive.
    pub p: u64,
    /// Every record in the input.
    pub n_total: u64,
    /// Every record labelled positive.
    pub p_total: u64,
}

/// One row of the threshold sweep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRow {
    #[serde(flatten)]
    pub meta: EvalMeta,
    pub threshold: f64,
    pub counts: ThresholdCounts,
    pub utility: Metric,
    pub mcc: Metric,
    pub accuracy: Metric,
    pub f1: Metric,
    pub f2: Metric,
    pub f0_5: Metric,
    pub tpr: Metric,
    pub tnr: Metric,
    pub fnr: Metric,
    pub fpr: Metric,
    pub fdr: Metric,
    #[serde(rename = "for")]
    pub for_: Metric,
    pub npv: Metric,
    pub ppv: Metric,
    pub threat_score: Metric,
}

impl ThresholdRow {
    /// Lookup used by threshold selection.
    pub fn metric(&self, kind: MetricKind) -> Metric {
        match kind {
            MetricKind::Utility => self.utility,
            MetricKind::Mcc => self.mcc,
            MetricKind::Accuracy => self.accuracy,
            MetricKind::F1 => self.f1,
            MetricKind::F2 => self.f2,
            MetricKind::F0_5 => self.f0_5,
            MetricKind::ThreatScore => self.threat_score,
        }
    }
}

/// Metrics a threshold can be selected by.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MetricKind {
    /// Expected cost; lower is better.
    Utility,
    Mcc,
    Accuracy,
    F1,
    F2,
    F0_5,
    ThreatScore,
}

impl MetricKind {
    pub fn lower_is_better(self) -> bool {
        matches!(self, MetricKind::Utility)
    }
}

/// Single-row summary of a regression model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionSummary {
    #[serde(flatten)]
    pub meta: EvalMeta,
    pub explained_variance: f64,
    pub r2: f64,
    pub mape: f64,
    pub mae: f64,
    pub median_ae: f64,
    pub mse: f64,
    /// Undefined when any actual or prediction is non-positive.
    pub msle: Metric,
    pub max_error: f64,
}

/// Output of an evaluation request, keyed by target type.
#[derive(Clone, Debug, PartialEq)]
pub enum Evaluation {
    Classification(Vec<ThresholdRow>),
    Regression(RegressionSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_guards_zero_denominator() {
        assert_eq!(Metric::ratio(3.0, 0.0), Metric::UNDEFINED);
        assert_eq!(Metric::ratio(3.0, 4.0).value(), Some(0.75));
    }

    #[test]
    fn sentinel_rendering() {
        assert_eq!(Metric::UNDEFINED.sentinel(), -1.0);
        assert_eq!(Metric::defined(0.25).sentinel(), 0.25);
        assert_eq!(Metric::UNDEFINED.to_string(), "-1");
    }

    #[test]
    fn undefined_serialises_as_null() {
        let json = serde_json::to_string(&Metric::UNDEFINED).unwrap();
        assert_eq!(json, "null");
        let back: Metric = serde_json::from_str("0.5").unwrap();
        assert_eq!(back, Metric::defined(0.5));
    }

    #[test]
    fn cost_model_defaults_fill_missing_fields() {
        let cost: CostModel = serde_json::from_str(r#"{"fn_cost": 5.0}"#).unwrap();
        assert_eq!(
            cost,
            CostModel {
                tp_cost: 0.0,
                fp_cost: 1.0,
                fn_cost: 5.0,
                tn_cost: 0.0
            }
        );
    }

    #[test]
    fn missing_grouping_uses_marker() {
        let meta = EvalMeta::new("CatBoost1", None, "2021-09-20 00:00:00".into());
        assert_eq!(meta.grouping, NO_GROUPING);
        assert!(meta.feature_set.is_none());
    }
}
