//! Default hyperparameter tables per backend.
//!
//! `Train` tables hold one value per parameter; `GridTune` tables hold the
//! candidate list for every tunable parameter and single values elsewhere.

use crate::common::error::{RetroError, RetroResult};

use super::domain::{AlgoArgs, Algorithm, ArgsList, ModelArgs, ParamValue, TargetType, TrainMethod};

/// Tunable CatBoost parameters.
pub const CATBOOST_GRID: &[&str] = &[
    "iterations",
    "depth",
    "langevin",
    "diffusion_temperature",
    "grow_policy",
    "model_size_reg",
];

/// Tunable XGBoost parameters.
pub const XGBOOST_GRID: &[&str] = &[
    "num_parallel_tree",
    "num_boost_round",
    "grow_policy",
    "eta",
    "max_depth",
    "min_child_weight",
    "max_delta_step",
    "subsample",
    "colsample_bytree",
    "colsample_bylevel",
    "colsample_bynode",
    "alpha",
    "lambda",
    "gamma",
];

/// Tunable LightGBM parameters.
pub const LIGHTGBM_GRID: &[&str] = &[
    "num_iterations",
    "learning_rate",
    "num_leaves",
    "bagging_freq",
    "bagging_fraction",
    "feature_fraction",
    "feature_fraction_bynode",
    "max_delta_step",
];

/// Tunable Ftrl parameters.
pub const FTRL_GRID: &[&str] = &[
    "alpha",
    "beta",
    "lambda1",
    "lambda2",
    "nbins",
    "mantissa_nbits",
    "nepochs",
];

const FTRL_ALPHA: f64 = 0.005;
const FTRL_BETA: f64 = 1.0;
const FTRL_NBINS: i64 = 1_000_000;
const FTRL_MANTISSA_NBITS: i64 = 10;
const FTRL_NEPOCHS: i64 = 1;

/// Build the argument lists for string-named inputs.
///
/// Every argument is required; a missing one is reported by name.
pub fn model_parameters(
    algorithms: Option<&[&str]>,
    target_type: Option<&str>,
    train_method: Option<&str>,
) -> RetroResult<ModelArgs> {
    let algorithms = algorithms.ok_or(RetroError::MissingArgument("Algorithms"))?;
    let target_type: TargetType = target_type
        .ok_or(RetroError::MissingArgument("TargetType"))?
        .parse()?;
    let train_method: TrainMethod = train_method
        .ok_or(RetroError::MissingArgument("TrainMethod"))?
        .parse()?;
    let algorithms = algorithms
        .iter()
        .map(|a| a.parse::<Algorithm>())
        .collect::<RetroResult<Vec<_>>>()?;
    Ok(model_parameters_for(&algorithms, target_type, train_method))
}

/// Typed variant of [`model_parameters`]. Repeated algorithms keep their first position.
pub fn model_parameters_for(
    algorithms: &[Algorithm],
    target_type: TargetType,
    train_method: TrainMethod,
) -> ModelArgs {
    let mut entries: Vec<ArgsList> = Vec::with_capacity(algorithms.len());
    for &algorithm in algorithms {
        if entries.iter().any(|e| e.algorithm == algorithm) {
            continue;
        }
        entries.push(ArgsList {
            algorithm,
            target_type,
            train_method,
            algo_args: default_args(algorithm, target_type, train_method),
        });
    }
    tracing::debug!(
        algorithms = entries.len(),
        ?target_type,
        ?train_method,
        "model parameters built"
    );
    ModelArgs::new(entries)
}

/// The default table of one backend.
pub fn default_args(algorithm: Algorithm, target: TargetType, method: TrainMethod) -> AlgoArgs {
    match algorithm {
        Algorithm::CatBoost => catboost(target, method),
        Algorithm::XGBoost => xgboost(target, method),
        Algorithm::LightGBM => lightgbm(target, method),
        Algorithm::Ftrl => ftrl(target, method),
    }
}

fn pick(
    args: &mut AlgoArgs,
    method: TrainMethod,
    key: &str,
    single: impl Into<ParamValue>,
    grid: impl Into<ParamValue>,
) {
    match method {
        TrainMethod::Train => args.set(key, single),
        TrainMethod::GridTune => args.set(key, grid),
    };
}

fn catboost(target: TargetType, method: TrainMethod) -> AlgoArgs {
    let mut args = AlgoArgs::new();
    let loss = match target {
        TargetType::Classification => {
            args.set("auto_class_weights", "Balanced");
            "Logloss"
        }
        TargetType::MultiClass => {
            args.set("classes_count", 3);
            "MultiClassOneVsAll"
        }
        TargetType::Regression => "RMSE",
    };
    args.set("loss_function", loss).set("eval_metric", loss);

    let train_dir = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| ".".to_string());
    args.set("train_dir", train_dir)
        .set("task_type", "GPU")
        .set("learning_rate", None::<f64>)
        .set("l2_leaf_reg", None::<f64>)
        .set("has_time", false)
        .set("best_model_min_trees", 10)
        .set("nan_mode", "Min")
        .set("fold_permutation_block", 1)
        .set("boosting_type", "Plain")
        .set("random_seed", None::<i64>)
        .set("thread_count", -1)
        .set("metric_period", 10);

    pick(&mut args, method, "iterations", 1000, vec![1000, 1500, 2000, 2500, 3000, 3500, 4000]);
    pick(&mut args, method, "depth", 6, vec![4, 5, 6, 7, 8, 9, 10]);
    pick(&mut args, method, "langevin", true, vec![true, false]);
    pick(&mut args, method, "diffusion_temperature", 10000, vec![7500, 10000, 12500]);
    pick(
        &mut args,
        method,
        "grow_policy",
        "SymmetricTree",
        vec!["SymmetricTree", "Lossguide", "Depthwise"],
    );
    pick(&mut args, method, "model_size_reg", 0.5, vec![0.0, 0.25, 0.5, 0.75, 1.0]);

    // GPU task with Bayesian bootstrap
    args.set("bootstrap_type", "Bayesian")
        .set("score_function", "L2")
        .set("border_count", 128)
        .set("bagging_temperature", 1);

    let from_average = matches!(
        loss,
        "RMSE" | "Logloss" | "CrossEntropy" | "Quantile" | "MAE" | "MAPE"
    );
    args.set("boost_from_average", from_average);
    args
}

fn xgboost(target: TargetType, method: TrainMethod) -> AlgoArgs {
    let mut args = AlgoArgs::new();
    let nthread = std::thread::available_parallelism().map_or(1, |n| n.get() as i64);
    args.set("nthread", nthread)
        .set("predictor", "auto")
        .set("single_precision_histogram", false)
        .set("early_stopping_rounds", 50)
        .set("tree_method", "gpu_hist")
        .set("max_bin", 256)
        .set("sampling_method", "uniform");

    pick(&mut args, method, "num_parallel_tree", 1, vec![1, 5, 10]);
    pick(&mut args, method, "num_boost_round", 1000, vec![500, 1000, 1500, 2000, 2500]);
    pick(&mut args, method, "grow_policy", "depthwise", vec!["depthwise", "lossguide"]);
    pick(&mut args, method, "eta", 0.30, vec![0.10, 0.20, 0.30]);
    pick(&mut args, method, "max_depth", 6, vec![4, 5, 6, 7, 8]);
    pick(&mut args, method, "min_child_weight", 1, vec![1, 5, 10]);
    pick(&mut args, method, "max_delta_step", 0, vec![0, 1, 5, 10]);
    for key in ["subsample", "colsample_bytree", "colsample_bylevel", "colsample_bynode"] {
        pick(&mut args, method, key, 1.0, vec![0.615, 0.8, 1.0]);
    }
    pick(&mut args, method, "alpha", 0, vec![0.0, 0.1, 0.2]);
    pick(&mut args, method, "lambda", 1, vec![0.80, 0.90, 1.0]);
    pick(&mut args, method, "gamma", 0, vec![0.0, 0.1, 0.5]);

    let (objective, metric) = match target {
        TargetType::Classification => ("binary:logistic", "auc"),
        TargetType::Regression => ("reg:squarederror", "rmse"),
        TargetType::MultiClass => ("multi:softprob", "mlogloss"),
    };
    args.set("objective", objective).set("eval_metric", metric);
    args
}

fn lightgbm(target: TargetType, method: TrainMethod) -> AlgoArgs {
    let mut args = AlgoArgs::new();
    let (objective, metric) = match target {
        TargetType::Classification => ("binary", "auc"),
        TargetType::Regression => ("regression", "rmse"),
        TargetType::MultiClass => ("multiclassova", "multi_logloss"),
    };
    args.set("objective", objective).set("metric", metric);

    pick(&mut args, method, "num_iterations", 1000, vec![500, 1000, 1500, 2000, 2500]);
    pick(
        &mut args,
        method,
        "learning_rate",
        None::<f64>,
        vec![0.05, 0.10, 0.15, 0.20, 0.25],
    );
    pick(&mut args, method, "num_leaves", 31, vec![20, 25, 31, 36, 40]);
    pick(&mut args, method, "bagging_freq", 0, vec![0, 1, 5]);
    for key in ["bagging_fraction", "feature_fraction", "feature_fraction_bynode"] {
        pick(&mut args, method, key, 1.0, vec![0.615, 0.80, 1.0]);
    }
    pick(&mut args, method, "max_delta_step", 0.0, vec![0.0, 0.10, 0.20]);

    args.set("task", "train")
        .set("device_type", "CPU")
        .set("boosting", "gbdt")
        .set("lambda_l1", 0.0)
        .set("lambda_l2", 0.0)
        .set("deterministic", true)
        .set("force_col_wise", false)
        .set("force_row_wise", false)
        .set("max_depth", None::<i64>)
        .set("min_data_in_leaf", 20)
        .set("min_sum_hessian_in_leaf", 0.001)
        .set("extra_trees", false)
        .set("early_stopping_round", 10)
        .set("first_metric_only", true)
        .set("linear_lambda", 0.0)
        .set("min_gain_to_split", 0)
        .set("monotone_constraints", None::<i64>)
        .set("monotone_constraints_method", "advanced")
        .set("monotone_penalty", 0.0)
        .set("forcedsplits_filename", None::<String>)
        .set("refit_decay_rate", 0.90)
        .set("path_smooth", 0.0);

    // dataset io
    args.set("max_bin", 255)
        .set("min_data_in_bin", 3)
        .set("data_random_seed", 1)
        .set("is_enable_sparse", true)
        .set("enable_bundle", true)
        .set("use_missing", true)
        .set("zero_as_missing", false)
        .set("two_round", false)
        .set("convert_model", None::<String>)
        .set("convert_model_language", "cpp");

    // objective, metric, network and gpu
    args.set("boost_from_average", true)
        .set("alpha", 0.90)
        .set("fair_c", 1.0)
        .set("poisson_max_delta_step", 0.70)
        .set("tweedie_variance_power", 1.5)
        .set("lambdarank_truncation_level", 30)
        .set("is_provide_training_metric", true)
        .set("eval_at", vec![1, 2, 3, 4, 5])
        .set("num_machines", 1)
        .set("gpu_platform_id", -1)
        .set("gpu_device_id", -1)
        .set("gpu_use_dp", true)
        .set("num_gpu", 1);
    args
}

fn ftrl(target: TargetType, method: TrainMethod) -> AlgoArgs {
    let mut args = AlgoArgs::new();
    args.set("interactions", None::<String>);

    pick(
        &mut args,
        method,
        "alpha",
        FTRL_ALPHA,
        vec![FTRL_ALPHA, FTRL_ALPHA * 2.0, FTRL_ALPHA * 3.0],
    );
    pick(
        &mut args,
        method,
        "beta",
        FTRL_BETA,
        vec![FTRL_BETA * 0.5, FTRL_BETA, FTRL_BETA * 1.5],
    );
    pick(&mut args, method, "lambda1", 0.0, vec![0.0, 0.05, 0.10]);
    pick(&mut args, method, "lambda2", 0.0, vec![0.0, 0.05, 0.10]);
    pick(
        &mut args,
        method,
        "nbins",
        FTRL_NBINS,
        vec![FTRL_NBINS / 2, FTRL_NBINS, FTRL_NBINS * 3 / 2],
    );
    pick(
        &mut args,
        method,
        "mantissa_nbits",
        FTRL_MANTISSA_NBITS,
        vec![FTRL_MANTISSA_NBITS / 2, FTRL_MANTISSA_NBITS, FTRL_MANTISSA_NBITS * 3 / 2],
    );
    pick(
        &mut args,
        method,
        "nepochs",
        FTRL_NEPOCHS,
        vec![FTRL_NEPOCHS, FTRL_NEPOCHS * 2, FTRL_NEPOCHS * 3],
    );

    let model_type = match target {
        TargetType::Regression => "regression",
        TargetType::Classification => "binomial",
        TargetType::MultiClass => {
            args.set("negative_class", false);
            "multinomial"
        }
    };
    args.set("model_type", model_type);
    args
}
