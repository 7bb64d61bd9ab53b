//! Inference domain: prediction requests and scored-frame conventions.

pub mod domain;
pub mod service;

pub use domain::{PredictMode, PredictRequest, Predictions, ScoreLayout};
