//! Training domain: parameter tables, backend strategies and the modelling session.

pub mod backends;
pub mod domain;
pub mod params;
pub mod repo_fs;
pub mod service;

pub use backends::{backend_for, Backend};
pub use domain::{
    AlgoArgs, Algorithm, ArgsList, FitPlan, FitRequest, FittedModel, ModelArgs, ModelEngine,
    ParamValue, TargetType, TrainMethod,
};
pub use params::{model_parameters, model_parameters_for};
pub use service::RetroFit;
