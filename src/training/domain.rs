//! Domain types for model configuration and the contracts external engines fulfil.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::error::{RetroError, RetroResult};
use crate::data::domain::{Frame, ModelInput};
use crate::inference::domain::{PredictRequest, Predictions};

/// Supported modelling backends.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Algorithm {
    CatBoost,
    XGBoost,
    LightGBM,
    Ftrl,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::CatBoost,
        Algorithm::XGBoost,
        Algorithm::LightGBM,
        Algorithm::Ftrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::CatBoost => "CatBoost",
            Algorithm::XGBoost => "XGBoost",
            Algorithm::LightGBM => "LightGBM",
            Algorithm::Ftrl => "Ftrl",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = RetroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RetroError::invalid(format!("unknown algorithm {s}")))
    }
}

/// What the model predicts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    Regression,
    Classification,
    MultiClass,
}

impl FromStr for TargetType {
    type Err = RetroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "regression" => Ok(TargetType::Regression),
            "classification" => Ok(TargetType::Classification),
            "multiclass" => Ok(TargetType::MultiClass),
            _ => Err(RetroError::invalid(format!("unknown target type {s}"))),
        }
    }
}

/// Single fit with fixed values, or candidate lists for grid tuning.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TrainMethod {
    Train,
    GridTune,
}

impl FromStr for TrainMethod {
    type Err = RetroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train" => Ok(TrainMethod::Train),
            "gridtune" => Ok(TrainMethod::GridTune),
            _ => Err(RetroError::invalid(format!("unknown train method {s}"))),
        }
    }
}

/// A hyperparameter value, passed to engines verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ParamValue::List(_))
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamValue::Null, Into::into)
    }
}

/// Flat, ordered backend hyperparameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgoArgs(BTreeMap<String, ParamValue>);

impl AlgoArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) -> &mut Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys holding candidate lists (grid-tune tables).
    pub fn grid_keys(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, v)| v.is_list())
            .map(|(k, _)| k)
            .collect()
    }

    /// Cartesian product over every list-valued key, in key order.
    ///
    /// Fails when the product exceeds `limit` combinations.
    pub fn expand_grid(&self, limit: usize) -> RetroResult<Vec<AlgoArgs>> {
        self.expand_grid_over(&self.grid_keys(), limit)
    }

    /// Cartesian product over the list-valued entries of `keys` only; other
    /// lists (e.g. `eval_at`) pass through untouched.
    pub fn expand_grid_over(&self, keys: &[&str], limit: usize) -> RetroResult<Vec<AlgoArgs>> {
        let mut combos = vec![self.clone()];
        for (key, value) in self.iter() {
            let ParamValue::List(options) = value else {
                continue;
            };
            if !keys.iter().any(|k| *k == key) {
                continue;
            }
            if combos.len().saturating_mul(options.len()) > limit {
                return Err(RetroError::invalid(format!(
                    "grid exceeds {limit} combinations at {key}"
                )));
            }
            combos = combos
                .into_iter()
                .flat_map(|base| {
                    options.iter().map(move |option| {
                        let mut next = base.clone();
                        next.set(key, option.clone());
                        next
                    })
                })
                .collect();
        }
        Ok(combos)
    }
}

/// Everything needed to configure one backend run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArgsList {
    pub algorithm: Algorithm,
    pub target_type: TargetType,
    pub train_method: TrainMethod,
    pub algo_args: AlgoArgs,
}

/// Argument lists for every requested backend, in request order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelArgs {
    entries: Vec<ArgsList>,
}

impl ModelArgs {
    pub fn new(entries: Vec<ArgsList>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, algorithm: Algorithm) -> Option<&ArgsList> {
        self.entries.iter().find(|e| e.algorithm == algorithm)
    }

    pub fn get_mut(&mut self, algorithm: Algorithm) -> Option<&mut ArgsList> {
        self.entries.iter_mut().find(|e| e.algorithm == algorithm)
    }

    /// The entry for `algorithm`, or the first entry when none is named.
    pub fn resolve(&self, algorithm: Option<Algorithm>) -> RetroResult<&ArgsList> {
        match algorithm {
            Some(algo) => self
                .get(algo)
                .ok_or_else(|| RetroError::invalid(format!("no arguments for {algo}"))),
            None => self
                .entries
                .first()
                .ok_or_else(|| RetroError::invalid("ModelArgs is empty")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArgsList> {
        self.entries.iter()
    }

    pub fn algorithms(&self) -> Vec<Algorithm> {
        self.entries.iter().map(|e| e.algorithm).collect()
    }
}

/// Storage for named argument sets, so tuned tables can be reused across sessions.
pub trait ArgsRepo {
    fn put_args(&self, name: &str, args: &ModelArgs) -> RetroResult<()>;
    fn get_args(&self, name: &str) -> RetroResult<ModelArgs>;
}

/// Parameters and fit-call arguments after backend-specific adjustment.
#[derive(Clone, Debug, PartialEq)]
pub struct FitPlan {
    pub params: AlgoArgs,
    pub num_boost_round: Option<i64>,
    pub early_stopping_rounds: Option<i64>,
    /// Evaluate against validation (and test) partitions during fitting.
    pub use_eval_sets: bool,
}

/// A single fit call handed to an engine.
pub struct FitRequest<'a> {
    pub algorithm: Algorithm,
    pub target_type: TargetType,
    pub plan: &'a FitPlan,
    pub train: &'a ModelInput,
    pub validation: Option<&'a ModelInput>,
    pub test: Option<&'a ModelInput>,
}

/// External modelling library: builds and fits a model from a plan.
pub trait ModelEngine: Send + Sync {
    fn fit(&self, request: FitRequest<'_>) -> RetroResult<Box<dyn FittedModel>>;
}

/// A fitted model returned by an engine.
pub trait FittedModel: Send + Sync {
    fn predict(&self, features: &Frame, request: PredictRequest) -> RetroResult<Predictions>;

    /// Best boosting iteration found by early stopping, when tracked.
    fn best_iteration(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("catboost".parse::<Algorithm>().unwrap(), Algorithm::CatBoost);
        assert_eq!("LIGHTGBM".parse::<Algorithm>().unwrap(), Algorithm::LightGBM);
        assert_eq!("MultiClass".parse::<TargetType>().unwrap(), TargetType::MultiClass);
        assert_eq!("gridtune".parse::<TrainMethod>().unwrap(), TrainMethod::GridTune);
        assert!("randomforest".parse::<Algorithm>().is_err());
    }

    #[test]
    fn param_values_serialise_flat() {
        let mut args = AlgoArgs::new();
        args.set("depth", 6)
            .set("eta", 0.3)
            .set("grow_policy", "depthwise")
            .set("learning_rate", None::<f64>)
            .set("eval_at", vec![1, 2, 3]);
        let json = serde_json::to_string(&args).unwrap();
        assert_eq!(
            json,
            r#"{"depth":6,"eta":0.3,"eval_at":[1,2,3],"grow_policy":"depthwise","learning_rate":null}"#
        );
        let back: AlgoArgs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, args);
    }

    #[test]
    fn expand_grid_is_cartesian() {
        let mut args = AlgoArgs::new();
        args.set("depth", vec![4, 6])
            .set("eta", vec![0.1, 0.2, 0.3])
            .set("nthread", 8);
        assert_eq!(args.grid_keys(), vec!["depth", "eta"]);

        let grid = args.expand_grid(100).unwrap();
        assert_eq!(grid.len(), 6);
        assert!(grid.iter().all(|g| g.grid_keys().is_empty()));
        assert_eq!(grid[0].get("depth"), Some(&ParamValue::Int(4)));
        assert_eq!(grid[5].get("eta"), Some(&ParamValue::Float(0.3)));
        assert_eq!(grid[5].get("nthread"), Some(&ParamValue::Int(8)));

        assert!(args.expand_grid(5).is_err());

        let only_depth = args.expand_grid_over(&["depth"], 100).unwrap();
        assert_eq!(only_depth.len(), 2);
        assert!(only_depth[1].get("eta").unwrap().is_list());
    }

    #[test]
    fn resolve_defaults_to_first_entry() {
        let entry = |algorithm| ArgsList {
            algorithm,
            target_type: TargetType::Regression,
            train_method: TrainMethod::Train,
            algo_args: AlgoArgs::new(),
        };
        let args = ModelArgs::new(vec![entry(Algorithm::XGBoost), entry(Algorithm::Ftrl)]);
        assert_eq!(args.resolve(None).unwrap().algorithm, Algorithm::XGBoost);
        assert_eq!(args.resolve(Some(Algorithm::Ftrl)).unwrap().algorithm, Algorithm::Ftrl);
        assert!(args.resolve(Some(Algorithm::CatBoost)).is_err());
        assert!(ModelArgs::default().resolve(None).is_err());
    }
}
