//! Per-backend behaviour: which columns a backend consumes, how its parameters
//! become fit arguments, and how its predictions are laid out.

use crate::common::error::{RetroError, RetroResult};
use crate::data::domain::ColumnRoles;
use crate::inference::domain::ScoreLayout;

use super::domain::{AlgoArgs, Algorithm, ArgsList, FitPlan, ParamValue, TargetType, TrainMethod};
use super::params;

/// Strategy selected once per algorithm.
pub trait Backend: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// Default hyperparameter table.
    fn default_params(&self, target: TargetType, method: TrainMethod) -> AlgoArgs {
        params::default_args(self.algorithm(), target, method)
    }

    /// Parameters that hold candidate lists when grid tuning.
    fn grid_params(&self) -> &'static [&'static str];

    /// Columns handed to the engine as features.
    fn feature_columns(&self, roles: &ColumnRoles) -> Vec<String>;

    /// Turn an argument list into the parameters and fit arguments of one fit call.
    fn fit_plan(&self, args: &ArgsList, class_count: Option<usize>) -> RetroResult<FitPlan>;

    fn score_layout(&self, target: TargetType) -> ScoreLayout;

    /// Whether scoring limits boosting to the best iteration found while fitting.
    fn uses_best_iteration(&self) -> bool {
        false
    }

    /// Expand tunable candidate lists into single-valued tables.
    fn expand_grid(&self, args: &AlgoArgs, limit: usize) -> RetroResult<Vec<AlgoArgs>> {
        args.expand_grid_over(self.grid_params(), limit)
    }
}

pub struct CatBoostBackend;
pub struct XGBoostBackend;
pub struct LightGbmBackend;
pub struct FtrlBackend;

/// The backend for `algorithm`.
pub fn backend_for(algorithm: Algorithm) -> &'static dyn Backend {
    match algorithm {
        Algorithm::CatBoost => &CatBoostBackend,
        Algorithm::XGBoost => &XGBoostBackend,
        Algorithm::LightGBM => &LightGbmBackend,
        Algorithm::Ftrl => &FtrlBackend,
    }
}

fn all_features(roles: &ColumnRoles) -> Vec<String> {
    roles
        .numeric
        .iter()
        .chain(&roles.categorical)
        .chain(&roles.text)
        .cloned()
        .collect()
}

/// Fail when a tunable key still holds a candidate list.
fn ensure_single(algorithm: Algorithm, args: &AlgoArgs, grid: &[&str]) -> RetroResult<()> {
    match args.grid_keys().into_iter().find(|k| grid.iter().any(|g| g == k)) {
        Some(key) => Err(RetroError::invalid(format!(
            "{algorithm} parameter {key} holds a grid; expand it before fitting"
        ))),
        None => Ok(()),
    }
}

fn class_count_for(target: TargetType, class_count: Option<usize>) -> RetroResult<Option<i64>> {
    match (target, class_count) {
        (TargetType::MultiClass, Some(n)) if n >= 2 => Ok(Some(n as i64)),
        (TargetType::MultiClass, _) => Err(RetroError::invalid(
            "multiclass target needs at least two classes",
        )),
        _ => Ok(None),
    }
}

fn take_round(params: &mut AlgoArgs, key: &str) -> RetroResult<Option<i64>> {
    match params.remove(key) {
        None | Some(ParamValue::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| RetroError::invalid(format!("{key} must be an integer"))),
    }
}

impl Backend for CatBoostBackend {
    fn algorithm(&self) -> Algorithm {
        Algorithm::CatBoost
    }

    fn grid_params(&self) -> &'static [&'static str] {
        params::CATBOOST_GRID
    }

    fn feature_columns(&self, roles: &ColumnRoles) -> Vec<String> {
        all_features(roles)
    }

    fn fit_plan(&self, args: &ArgsList, class_count: Option<usize>) -> RetroResult<FitPlan> {
        ensure_single(self.algorithm(), &args.algo_args, self.grid_params())?;
        let mut params = args.algo_args.clone();
        if let Some(n) = class_count_for(args.target_type, class_count)? {
            params.set("classes_count", n);
        }
        Ok(FitPlan {
            params,
            num_boost_round: None,
            early_stopping_rounds: None,
            use_eval_sets: true,
        })
    }

    fn score_layout(&self, target: TargetType) -> ScoreLayout {
        match target {
            TargetType::Regression => ScoreLayout::Value,
            TargetType::Classification => ScoreLayout::ProbabilityPair,
            TargetType::MultiClass => ScoreLayout::ClassLabel,
        }
    }
}

impl Backend for XGBoostBackend {
    fn algorithm(&self) -> Algorithm {
        Algorithm::XGBoost
    }

    fn grid_params(&self) -> &'static [&'static str] {
        params::XGBOOST_GRID
    }

    fn feature_columns(&self, roles: &ColumnRoles) -> Vec<String> {
        roles.numeric.clone()
    }

    fn fit_plan(&self, args: &ArgsList, class_count: Option<usize>) -> RetroResult<FitPlan> {
        ensure_single(self.algorithm(), &args.algo_args, self.grid_params())?;
        let mut params = args.algo_args.clone();
        if let Some(n) = class_count_for(args.target_type, class_count)? {
            params.set("num_class", n);
        }
        let num_boost_round = take_round(&mut params, "num_boost_round")?;
        let early_stopping_rounds = take_round(&mut params, "early_stopping_rounds")?;
        Ok(FitPlan {
            params,
            num_boost_round,
            early_stopping_rounds,
            use_eval_sets: true,
        })
    }

    fn score_layout(&self, target: TargetType) -> ScoreLayout {
        match target {
            TargetType::Regression => ScoreLayout::Value,
            TargetType::Classification => ScoreLayout::PositiveOnly,
            TargetType::MultiClass => ScoreLayout::ClassProbabilities,
        }
    }

    fn uses_best_iteration(&self) -> bool {
        true
    }
}

impl Backend for LightGbmBackend {
    fn algorithm(&self) -> Algorithm {
        Algorithm::LightGBM
    }

    fn grid_params(&self) -> &'static [&'static str] {
        params::LIGHTGBM_GRID
    }

    fn feature_columns(&self, roles: &ColumnRoles) -> Vec<String> {
        roles.numeric.clone()
    }

    fn fit_plan(&self, args: &ArgsList, class_count: Option<usize>) -> RetroResult<FitPlan> {
        ensure_single(self.algorithm(), &args.algo_args, self.grid_params())?;
        let mut params = args.algo_args.clone();
        if let Some(n) = class_count_for(args.target_type, class_count)? {
            params.set("num_class", n);
        }
        // the engine rejects these inside params when they are also fit arguments
        let num_boost_round = take_round(&mut params, "num_iterations")?;
        let early_stopping_rounds = take_round(&mut params, "early_stopping_round")?;
        Ok(FitPlan {
            params,
            num_boost_round,
            early_stopping_rounds,
            use_eval_sets: true,
        })
    }

    fn score_layout(&self, target: TargetType) -> ScoreLayout {
        match target {
            TargetType::Regression => ScoreLayout::Value,
            TargetType::Classification => ScoreLayout::PositiveOnly,
            TargetType::MultiClass => ScoreLayout::ClassProbabilities,
        }
    }
}

impl Backend for FtrlBackend {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Ftrl
    }

    fn grid_params(&self) -> &'static [&'static str] {
        params::FTRL_GRID
    }

    fn feature_columns(&self, roles: &ColumnRoles) -> Vec<String> {
        all_features(roles)
    }

    fn fit_plan(&self, args: &ArgsList, _class_count: Option<usize>) -> RetroResult<FitPlan> {
        ensure_single(self.algorithm(), &args.algo_args, self.grid_params())?;
        Ok(FitPlan {
            params: args.algo_args.clone(),
            num_boost_round: None,
            early_stopping_rounds: None,
            use_eval_sets: false,
        })
    }

    fn score_layout(&self, target: TargetType) -> ScoreLayout {
        match target {
            TargetType::Regression => ScoreLayout::Value,
            TargetType::Classification => ScoreLayout::ProbabilityPair,
            TargetType::MultiClass => ScoreLayout::ClassProbabilities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(algorithm: Algorithm, target_type: TargetType, method: TrainMethod) -> ArgsList {
        ArgsList {
            algorithm,
            target_type,
            train_method: method,
            algo_args: backend_for(algorithm).default_params(target_type, method),
        }
    }

    fn roles() -> ColumnRoles {
        ColumnRoles::new("y")
            .numeric(["x1", "x2"])
            .categorical(["seg"])
            .text(["note"])
    }

    #[test]
    fn backend_for_matches_algorithm() {
        for algo in Algorithm::ALL {
            assert_eq!(backend_for(algo).algorithm(), algo);
        }
    }

    #[test]
    fn feature_columns_per_backend() {
        let r = roles();
        assert_eq!(
            backend_for(Algorithm::CatBoost).feature_columns(&r),
            vec!["x1", "x2", "seg", "note"]
        );
        assert_eq!(backend_for(Algorithm::XGBoost).feature_columns(&r), vec!["x1", "x2"]);
        assert_eq!(backend_for(Algorithm::LightGBM).feature_columns(&r), vec!["x1", "x2"]);
        assert_eq!(backend_for(Algorithm::Ftrl).feature_columns(&r).len(), 4);
    }

    #[test]
    fn lightgbm_lifts_rounds_out_of_params() {
        let a = args(Algorithm::LightGBM, TargetType::Classification, TrainMethod::Train);
        let plan = backend_for(Algorithm::LightGBM).fit_plan(&a, None).unwrap();
        assert_eq!(plan.num_boost_round, Some(1000));
        assert_eq!(plan.early_stopping_rounds, Some(10));
        assert!(!plan.params.contains("num_iterations"));
        assert!(!plan.params.contains("early_stopping_round"));
        assert!(plan.params.get("eval_at").unwrap().is_list());
    }

    #[test]
    fn xgboost_multiclass_sets_num_class() {
        let a = args(Algorithm::XGBoost, TargetType::MultiClass, TrainMethod::Train);
        let backend = backend_for(Algorithm::XGBoost);
        let plan = backend.fit_plan(&a, Some(4)).unwrap();
        assert_eq!(plan.params.get("num_class").and_then(ParamValue::as_i64), Some(4));
        assert_eq!(plan.num_boost_round, Some(1000));
        assert_eq!(plan.early_stopping_rounds, Some(50));
        assert!(backend.uses_best_iteration());
        assert!(backend.fit_plan(&a, None).is_err());
    }

    #[test]
    fn catboost_overrides_classes_count() {
        let a = args(Algorithm::CatBoost, TargetType::MultiClass, TrainMethod::Train);
        let plan = backend_for(Algorithm::CatBoost).fit_plan(&a, Some(5)).unwrap();
        assert_eq!(plan.params.get("classes_count").and_then(ParamValue::as_i64), Some(5));
        assert!(plan.use_eval_sets);
    }

    #[test]
    fn ftrl_passes_params_verbatim() {
        let a = args(Algorithm::Ftrl, TargetType::Regression, TrainMethod::Train);
        let plan = backend_for(Algorithm::Ftrl).fit_plan(&a, None).unwrap();
        assert_eq!(plan.params, a.algo_args);
        assert!(!plan.use_eval_sets);
    }

    #[test]
    fn unexpanded_grid_is_rejected_then_expands() {
        let a = args(Algorithm::Ftrl, TargetType::Classification, TrainMethod::GridTune);
        let backend = backend_for(Algorithm::Ftrl);
        assert!(matches!(backend.fit_plan(&a, None), Err(RetroError::InvalidInput(_))));

        let grid = backend.expand_grid(&a.algo_args, usize::MAX).unwrap();
        assert_eq!(grid.len(), 3usize.pow(7));
        let single = ArgsList {
            algo_args: grid[0].clone(),
            ..a
        };
        assert!(backend.fit_plan(&single, None).is_ok());
    }

    #[test]
    fn score_layouts() {
        use ScoreLayout::*;
        let cases = [
            (Algorithm::CatBoost, ProbabilityPair, ClassLabel),
            (Algorithm::Ftrl, ProbabilityPair, ClassProbabilities),
            (Algorithm::XGBoost, PositiveOnly, ClassProbabilities),
            (Algorithm::LightGBM, PositiveOnly, ClassProbabilities),
        ];
        for (algo, binary, multi) in cases {
            let b = backend_for(algo);
            assert_eq!(b.score_layout(TargetType::Regression), Value);
            assert_eq!(b.score_layout(TargetType::Classification), binary);
            assert_eq!(b.score_layout(TargetType::MultiClass), multi);
        }
    }
}
