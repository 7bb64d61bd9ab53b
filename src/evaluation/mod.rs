//! Model evaluation: the binary threshold sweep, regression summaries and
//! their tabular export.

pub mod domain;
pub mod regression;
pub mod repo_fs;
pub mod service;
pub mod threshold;

pub use domain::{
    CostModel, EvalMeta, Evaluation, Metric, MetricKind, RegressionSummary, ScoredRecord,
    ThresholdCounts, ThresholdRow,
};
pub use regression::evaluate_regression;
pub use threshold::{best_threshold, evaluate, evaluate_with, threshold_grid, SweepOptions};
