// lib.rs - central orchestrator
pub mod common;
pub mod data;
pub mod training;
pub mod inference;
pub mod evaluation;
pub mod api;

pub use common::{RetroCode, RetroError, RetroResult};
pub use data::{ColumnRoles, DataFrames, Frame};
pub use evaluation::{evaluate, CostModel, Evaluation, Metric, ScoredRecord, ThresholdRow};
pub use training::{model_parameters, Algorithm, RetroFit, TargetType, TrainMethod};
