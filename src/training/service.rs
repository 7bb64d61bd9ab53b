//! The modelling session: prepares backend inputs, fits through registered
//! engines, scores partitions and evaluates scored frames.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::common::error::{RetroError, RetroResult};
use crate::data::domain::{ColumnRoles, DataFrames, Frame, ModelData, Partition};
use crate::data::repo_fs;
use crate::data::service::get_model_data;
use crate::evaluation::domain::{CostModel, Evaluation};
use crate::evaluation::service as eval_service;
use crate::evaluation::threshold::SweepOptions;
use crate::inference::domain::PredictRequest;
use crate::inference::service::{predict_mode, score_frame};

use super::backends::{backend_for, Backend};
use super::domain::{
    Algorithm, ArgsList, FitPlan, FitRequest, FittedModel, ModelArgs, ModelEngine, TargetType,
};

/// A fitted model tracked by the session.
pub struct FitEntry {
    pub name: String,
    pub algorithm: Algorithm,
    pub plan: FitPlan,
    pub model: Box<dyn FittedModel>,
}

/// A stored evaluation result.
#[derive(Clone, Debug)]
pub struct EvaluationEntry {
    pub fit_name: String,
    pub scored_data_name: String,
    pub evaluation: Evaluation,
}

/// Modelling session over one set of partitions.
pub struct RetroFit {
    model_args: ModelArgs,
    frames: DataFrames,
    roles: ColumnRoles,
    model_data: HashMap<Algorithm, ModelData>,
    engines: HashMap<Algorithm, Arc<dyn ModelEngine>>,
    fits: Vec<FitEntry>,
    scored: BTreeMap<String, Frame>,
    scored_names: Vec<String>,
    evaluations: Vec<EvaluationEntry>,
    sweep: SweepOptions,
}

impl RetroFit {
    /// Prepare model data for every algorithm named in `model_args`.
    pub fn new(model_args: ModelArgs, frames: DataFrames, roles: ColumnRoles) -> RetroResult<Self> {
        if model_args.is_empty() {
            return Err(RetroError::MissingArgument("ModelArgs"));
        }
        let mut model_data = HashMap::new();
        for algorithm in model_args.algorithms() {
            let columns = backend_for(algorithm).feature_columns(&roles);
            model_data.insert(algorithm, get_model_data(&frames, &roles, &columns)?);
        }
        tracing::info!(
            algorithms = model_args.len(),
            train_rows = frames.train.nrows(),
            "session ready"
        );
        Ok(Self {
            model_args,
            frames,
            roles,
            model_data,
            engines: HashMap::new(),
            fits: Vec::new(),
            scored: BTreeMap::new(),
            scored_names: Vec::new(),
            evaluations: Vec::new(),
            sweep: SweepOptions::default(),
        })
    }

    pub fn with_engine(mut self, algorithm: Algorithm, engine: Arc<dyn ModelEngine>) -> Self {
        self.register_engine(algorithm, engine);
        self
    }

    pub fn register_engine(&mut self, algorithm: Algorithm, engine: Arc<dyn ModelEngine>) {
        self.engines.insert(algorithm, engine);
    }

    pub fn with_sweep_options(mut self, sweep: SweepOptions) -> Self {
        self.sweep = sweep;
        self
    }

    pub fn model_args(&self) -> &ModelArgs {
        &self.model_args
    }

    pub fn model_args_mut(&mut self) -> &mut ModelArgs {
        &mut self.model_args
    }

    pub fn model_data(&self, algorithm: Algorithm) -> Option<&ModelData> {
        self.model_data.get(&algorithm)
    }

    pub fn fit_names(&self) -> Vec<&str> {
        self.fits.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn fitted(&self, name: &str) -> Option<&FitEntry> {
        self.fits.iter().find(|f| f.name == name)
    }

    pub fn scored_names(&self) -> &[String] {
        &self.scored_names
    }

    pub fn scored(&self, name: &str) -> Option<&Frame> {
        self.scored.get(name)
    }

    /// Write a stored scored frame to CSV.
    pub fn export_scored(&self, name: &str, path: &Path) -> RetroResult<()> {
        let frame = self
            .scored
            .get(name)
            .ok_or_else(|| RetroError::data_missing(name.to_string()))?;
        repo_fs::write_csv(frame, path)
    }

    pub fn evaluations(&self) -> &[EvaluationEntry] {
        &self.evaluations
    }

    /// Pretty JSON of the argument list for `algorithm` (first entry when `None`).
    pub fn print_algo_args(&self, algorithm: Option<Algorithm>) -> RetroResult<String> {
        let entry = self.model_args.resolve(algorithm)?;
        serde_json::to_string_pretty(entry).map_err(|e| RetroError::Internal(e.to_string()))
    }

    /// Fit one model with the stored arguments; returns the fit name.
    pub fn train(&mut self, algorithm: Option<Algorithm>) -> RetroResult<String> {
        let args = self.model_args.resolve(algorithm)?.clone();
        self.fit_with(&args)
    }

    /// Fit one model per combination of the tunable candidate lists.
    ///
    /// Fits are registered as they finish. When a combination fails the error
    /// is returned and the earlier fits stay registered under their names in
    /// [`RetroFit::fit_names`].
    pub fn train_grid(
        &mut self,
        algorithm: Option<Algorithm>,
        limit: usize,
    ) -> RetroResult<Vec<String>> {
        let args = self.model_args.resolve(algorithm)?.clone();
        let backend = backend_for(args.algorithm);
        let grid = backend.expand_grid(&args.algo_args, limit)?;
        tracing::info!(algorithm = %args.algorithm, combinations = grid.len(), "grid tuning");
        grid.into_iter()
            .map(|algo_args| {
                self.fit_with(&ArgsList {
                    algo_args,
                    ..args.clone()
                })
            })
            .collect()
    }

    fn fit_with(&mut self, args: &ArgsList) -> RetroResult<String> {
        let algorithm = args.algorithm;
        let engine = self
            .engines
            .get(&algorithm)
            .cloned()
            .ok_or_else(|| RetroError::model_missing(format!("no engine registered for {algorithm}")))?;
        let data = self
            .model_data
            .get(&algorithm)
            .ok_or_else(|| RetroError::data_missing(format!("model data for {algorithm}")))?;

        let backend = backend_for(algorithm);
        let plan = backend.fit_plan(args, class_count(data))?;
        let start = Instant::now();
        let model = engine.fit(FitRequest {
            algorithm,
            target_type: args.target_type,
            plan: &plan,
            train: &data.train,
            validation: plan.use_eval_sets.then_some(data.validation.as_ref()).flatten(),
            test: plan.use_eval_sets.then_some(data.test.as_ref()).flatten(),
        })?;

        let name = format!("{algorithm}{}", self.fits.len() + 1);
        tracing::info!(
            fit = %name,
            rows = data.train.label.len(),
            dur_ms = start.elapsed().as_millis() as u64,
            best_iteration = model.best_iteration(),
            "model fitted"
        );
        self.fits.push(FitEntry {
            name: name.clone(),
            algorithm,
            plan,
            model,
        });
        Ok(name)
    }

    /// Score a stored partition and keep the result as `Scored_{data}_{Algo}_{n}`.
    pub fn score(
        &mut self,
        data_name: &str,
        model_name: Option<&str>,
        algorithm: Option<Algorithm>,
    ) -> RetroResult<String> {
        let source = self.data_set(data_name)?.clone();
        let (algorithm, scored) = self.score_with(&source, model_name, algorithm)?;
        let name = format!("Scored_{data_name}_{algorithm}_{}", self.fits.len());
        if self.scored.insert(name.clone(), scored).is_none() {
            self.scored_names.push(name.clone());
        }
        tracing::info!(scored = %name, "scored data stored");
        Ok(name)
    }

    /// Score a caller-supplied frame; the session does not keep it.
    pub fn score_new_data(
        &self,
        new_data: &Frame,
        model_name: Option<&str>,
        algorithm: Option<Algorithm>,
    ) -> RetroResult<Frame> {
        self.score_with(new_data, model_name, algorithm)
            .map(|(_, scored)| scored)
    }

    fn score_with(
        &self,
        source: &Frame,
        model_name: Option<&str>,
        algorithm: Option<Algorithm>,
    ) -> RetroResult<(Algorithm, Frame)> {
        let args = self.model_args.resolve(algorithm)?;
        let algorithm = args.algorithm;
        let fit = self.resolve_fit(model_name, algorithm)?;
        let backend = backend_for(algorithm);
        let target = self.roles.target_name()?;

        let layout = backend.score_layout(args.target_type);
        let request = PredictRequest {
            mode: predict_mode(layout),
            iteration_limit: if backend.uses_best_iteration() {
                fit.model.best_iteration()
            } else {
                None
            },
        };
        let columns = backend.feature_columns(&self.roles);
        let features = source.select(columns.as_slice())?;
        let class_map = self
            .model_data
            .get(&algorithm)
            .and_then(|d| d.class_map.as_ref());

        let mut out = source.clone();
        score_frame(
            fit.model.as_ref(),
            &features,
            request,
            layout,
            target,
            class_map,
            &mut out,
        )?;
        Ok((algorithm, out))
    }

    /// Threshold table (classification) or summary (regression) for a stored scored frame.
    pub fn evaluate(
        &mut self,
        fit_name: &str,
        target_type: TargetType,
        scored_data_name: &str,
        by_variables: Option<&str>,
        cost: &CostModel,
    ) -> RetroResult<&Evaluation> {
        let frame = self
            .scored
            .get(scored_data_name)
            .ok_or_else(|| RetroError::data_missing(scored_data_name.to_string()))?;
        let target = self.roles.target_name()?;
        let evaluation = match target_type {
            TargetType::Classification => Evaluation::Classification(eval_service::evaluate_frame(
                frame,
                target,
                fit_name,
                by_variables,
                cost,
                self.sweep,
            )?),
            TargetType::Regression => Evaluation::Regression(eval_service::evaluate_regression_frame(
                frame,
                target,
                fit_name,
                by_variables,
            )?),
            TargetType::MultiClass => {
                return Err(RetroError::invalid(
                    "multiclass scored data has no threshold evaluation",
                ))
            }
        };
        self.evaluations.push(EvaluationEntry {
            fit_name: fit_name.to_string(),
            scored_data_name: scored_data_name.to_string(),
            evaluation,
        });
        let last = self.evaluations.len() - 1;
        Ok(&self.evaluations[last].evaluation)
    }

    fn data_set(&self, name: &str) -> RetroResult<&Frame> {
        if let Some(scored) = self.scored.get(name) {
            return Ok(scored);
        }
        let frame = match name.parse::<Partition>()? {
            Partition::Train => Some(&self.frames.train),
            Partition::Validation => self.frames.validation.as_ref(),
            Partition::Test => self.frames.test.as_ref(),
        };
        frame.ok_or_else(|| RetroError::data_missing(name.to_string()))
    }

    /// Named fit, or the most recent fit `"{Algo}{count}"` when unnamed.
    fn resolve_fit(&self, model_name: Option<&str>, algorithm: Algorithm) -> RetroResult<&FitEntry> {
        if self.fits.is_empty() {
            return Err(RetroError::model_missing("no fitted models"));
        }
        let name = match model_name {
            Some(name) => name.to_string(),
            None => format!("{algorithm}{}", self.fits.len()),
        };
        self.fitted(&name)
            .ok_or_else(|| RetroError::model_missing(name))
    }
}

/// Distinct classes seen by a backend, when the target needs them.
fn class_count(data: &ModelData) -> Option<usize> {
    if let Some(map) = &data.class_map {
        return Some(map.len());
    }
    let mut labels: Vec<i64> = data
        .train
        .label
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| *v as i64)
        .collect();
    labels.sort_unstable();
    labels.dedup();
    Some(labels.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::domain::Column;
    use crate::inference::domain::{PredictMode, Predictions};
    use crate::training::params::model_parameters_for;
    use crate::training::TrainMethod;
    use std::sync::Mutex;

    /// Predicts the first feature column (clamped to [0,1] for probabilities).
    struct EchoEngine {
        calls: Mutex<Vec<FitPlan>>,
    }

    struct EchoModel {
        classes: usize,
    }

    impl ModelEngine for EchoEngine {
        fn fit(&self, request: FitRequest<'_>) -> RetroResult<Box<dyn FittedModel>> {
            self.calls.lock().unwrap().push(request.plan.clone());
            let classes = request
                .plan
                .params
                .get("num_class")
                .or_else(|| request.plan.params.get("classes_count"))
                .and_then(|v| v.as_i64())
                .unwrap_or(2) as usize;
            Ok(Box::new(EchoModel { classes }))
        }
    }

    impl FittedModel for EchoModel {
        fn predict(&self, features: &Frame, request: PredictRequest) -> RetroResult<Predictions> {
            let (_, first) = features.iter().next().unwrap();
            let Column::Float(x) = first else {
                return Err(RetroError::invalid("text feature"));
            };
            let p: Vec<f64> = x.iter().map(|v| v.clamp(0.0, 1.0)).collect();
            Ok(match (request.mode, self.classes) {
                (PredictMode::RawValue, _) => Predictions::Values(x.clone()),
                (PredictMode::Class, _) => Predictions::Values(vec![0.0; x.len()]),
                (PredictMode::Probability, 2) => {
                    if features.ncols() > 1 {
                        Predictions::Probabilities(vec![p.iter().map(|v| 1.0 - v).collect(), p])
                    } else {
                        Predictions::Values(p)
                    }
                }
                (PredictMode::Probability, n) => {
                    Predictions::Probabilities(vec![vec![1.0 / n as f64; x.len()]; n])
                }
            })
        }

        fn best_iteration(&self) -> Option<usize> {
            Some(7)
        }
    }

    fn engine() -> Arc<EchoEngine> {
        Arc::new(EchoEngine {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn frames(target: Column) -> DataFrames {
        let frame = |y: Column| {
            Frame::from_columns([
                ("x1", Column::from(vec![0.9, 0.2, 0.7, 0.1])),
                ("seg", Column::from(vec!["a", "b", "a", "b"])),
                ("y", y),
            ])
            .unwrap()
        };
        DataFrames {
            train: frame(target.clone()),
            validation: Some(frame(target.clone())),
            test: Some(frame(target)),
        }
    }

    fn session(algos: &[Algorithm], target: TargetType, y: Column) -> RetroFit {
        let args = model_parameters_for(algos, target, TrainMethod::Train);
        let roles = ColumnRoles::new("y").numeric(["x1"]).categorical(["seg"]);
        RetroFit::new(args, frames(y), roles).unwrap()
    }

    fn binary() -> Column {
        Column::from(vec![1.0, 0.0, 1.0, 0.0])
    }

    #[test]
    fn empty_model_args_is_missing_argument() {
        let err = RetroFit::new(ModelArgs::default(), frames(binary()), ColumnRoles::new("y"));
        assert!(matches!(err, Err(RetroError::MissingArgument("ModelArgs"))));
    }

    #[test]
    fn train_without_engine_is_model_missing() {
        let mut s = session(&[Algorithm::XGBoost], TargetType::Classification, binary());
        assert!(matches!(s.train(None), Err(RetroError::ModelMissing(_))));
    }

    #[test]
    fn fit_names_count_across_algorithms() {
        let mut s = session(
            &[Algorithm::XGBoost, Algorithm::LightGBM],
            TargetType::Classification,
            binary(),
        )
        .with_engine(Algorithm::XGBoost, engine())
        .with_engine(Algorithm::LightGBM, engine());
        assert_eq!(s.train(None).unwrap(), "XGBoost1");
        assert_eq!(s.train(Some(Algorithm::LightGBM)).unwrap(), "LightGBM2");
        assert_eq!(s.fit_names(), vec!["XGBoost1", "LightGBM2"]);
    }

    #[test]
    fn xgboost_binary_scoring_and_evaluation() {
        let e = engine();
        let mut s = session(&[Algorithm::XGBoost], TargetType::Classification, binary())
            .with_engine(Algorithm::XGBoost, e.clone());
        let fit = s.train(None).unwrap();
        assert_eq!(e.calls.lock().unwrap()[0].num_boost_round, Some(1000));

        let name = s.score("test_data", None, None).unwrap();
        assert_eq!(name, "Scored_test_data_XGBoost_1");
        let scored = s.scored(&name).unwrap();
        assert_eq!(scored.names(), vec!["x1", "seg", "y", "p1", "p0"]);
        assert_eq!(scored.numeric("p1").unwrap(), &[0.9, 0.2, 0.7, 0.1]);

        let eval = s
            .evaluate(&fit, TargetType::Classification, &name, None, &CostModel::default())
            .unwrap();
        let Evaluation::Classification(rows) = eval else {
            panic!("expected threshold rows");
        };
        assert_eq!(rows.len(), 101);
        assert_eq!(rows[50].counts.tp, 2);
        assert_eq!(rows[50].meta.model_name, "XGBoost1");
        assert_eq!(s.evaluations().len(), 1);
    }

    #[test]
    fn catboost_writes_probability_pair() {
        let mut s = session(&[Algorithm::CatBoost], TargetType::Classification, binary())
            .with_engine(Algorithm::CatBoost, engine());
        s.train(None).unwrap();
        let name = s.score("train_data", Some("CatBoost1"), None).unwrap();
        let scored = s.scored(&name).unwrap();
        assert!(scored.has_column("p0") && scored.has_column("p1"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scored.csv");
        s.export_scored(&name, &path).unwrap();
        let back = crate::data::service::ingest_file(&path).unwrap();
        assert_eq!(back.names(), scored.names());
        assert!(s.export_scored("Scored_nothing", &path).is_err());
    }

    #[test]
    fn regression_scores_predict_column() {
        let y = Column::from(vec![0.8, 0.3, 0.6, 0.2]);
        let mut s = session(&[Algorithm::Ftrl], TargetType::Regression, y)
            .with_engine(Algorithm::Ftrl, engine());
        let fit = s.train(None).unwrap();
        let name = s.score("validation_data", None, None).unwrap();
        assert!(s.scored(&name).unwrap().has_column("Predict_y"));
        let eval = s
            .evaluate(&fit, TargetType::Regression, &name, Some("seg"), &CostModel::default())
            .unwrap();
        let Evaluation::Regression(summary) = eval else {
            panic!("expected regression summary");
        };
        assert_eq!(summary.meta.grouping, "seg");
    }

    #[test]
    fn multiclass_text_target_round_trips_labels() {
        let y = Column::from(vec!["lo", "hi", "mid", "lo"]);
        let e = engine();
        let mut s = session(&[Algorithm::CatBoost, Algorithm::XGBoost], TargetType::MultiClass, y)
            .with_engine(Algorithm::CatBoost, e.clone())
            .with_engine(Algorithm::XGBoost, e.clone());

        s.train(Some(Algorithm::CatBoost)).unwrap();
        {
            let calls = e.calls.lock().unwrap();
            assert_eq!(calls[0].params.get("classes_count").and_then(|v| v.as_i64()), Some(3));
        }

        let name = s.score("test_data", None, Some(Algorithm::CatBoost)).unwrap();
        assert_eq!(
            s.scored(&name).unwrap().column("Predict_y").unwrap(),
            &Column::from(vec!["hi"; 4])
        );

        s.train(Some(Algorithm::XGBoost)).unwrap();
        let scored = s
            .score_new_data(&frames(Column::from(vec!["lo"; 4])).train, None, Some(Algorithm::XGBoost))
            .unwrap();
        assert!(["hi", "lo", "mid"].iter().all(|c| scored.has_column(c)));
        assert!(s.scored_names().len() == 1);
    }

    #[test]
    fn unknown_model_and_data_names() {
        let mut s = session(&[Algorithm::LightGBM], TargetType::Classification, binary())
            .with_engine(Algorithm::LightGBM, engine());
        assert!(matches!(s.score("test_data", None, None), Err(RetroError::ModelMissing(_))));
        s.train(None).unwrap();
        assert!(matches!(
            s.score("test_data", Some("LightGBM9"), None),
            Err(RetroError::ModelMissing(_))
        ));
        assert!(matches!(
            s.score("holdout", None, None),
            Err(RetroError::DataMissing(_))
        ));
    }

    #[test]
    fn grid_tune_fits_every_combination() {
        let args = model_parameters_for(&[Algorithm::Ftrl], TargetType::Classification, TrainMethod::GridTune);
        let roles = ColumnRoles::new("y").numeric(["x1"]);
        let mut s = RetroFit::new(args, frames(binary()), roles)
            .unwrap()
            .with_engine(Algorithm::Ftrl, engine());
        assert!(matches!(s.train(None), Err(RetroError::InvalidInput(_))));
        assert!(s.train_grid(None, 10).is_err());

        let entry = s.model_args_mut().get_mut(Algorithm::Ftrl).unwrap();
        for key in ["beta", "lambda1", "lambda2", "nbins", "mantissa_nbits", "nepochs"] {
            entry.algo_args.set(key, 1);
        }
        let names = s.train_grid(None, 10).unwrap();
        assert_eq!(names, vec!["Ftrl1", "Ftrl2", "Ftrl3"]);
    }

    /// Fails every fit after the first `ok` calls.
    struct FailingEngine {
        ok: usize,
        calls: Mutex<usize>,
    }

    impl ModelEngine for FailingEngine {
        fn fit(&self, _request: FitRequest<'_>) -> RetroResult<Box<dyn FittedModel>> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls > self.ok {
                return Err(RetroError::backend("Ftrl", "diverged"));
            }
            Ok(Box::new(EchoModel { classes: 2 }))
        }
    }

    #[test]
    fn failed_grid_keeps_earlier_fits() {
        let args = model_parameters_for(&[Algorithm::Ftrl], TargetType::Classification, TrainMethod::GridTune);
        let roles = ColumnRoles::new("y").numeric(["x1"]);
        let failing = Arc::new(FailingEngine {
            ok: 2,
            calls: Mutex::new(0),
        });
        let mut s = RetroFit::new(args, frames(binary()), roles)
            .unwrap()
            .with_engine(Algorithm::Ftrl, failing);
        let entry = s.model_args_mut().get_mut(Algorithm::Ftrl).unwrap();
        for key in ["beta", "lambda1", "lambda2", "nbins", "mantissa_nbits", "nepochs"] {
            entry.algo_args.set(key, 1);
        }

        let err = s.train_grid(None, 10).unwrap_err();
        assert!(matches!(err, RetroError::Backend { ref message, .. } if message == "diverged"));
        assert_eq!(s.fit_names(), vec!["Ftrl1", "Ftrl2"]);
    }

    #[test]
    fn print_algo_args_is_json() {
        let s = session(&[Algorithm::Ftrl], TargetType::Classification, binary());
        let json = s.print_algo_args(None).unwrap();
        assert!(json.contains("\"algorithm\": \"Ftrl\""));
        assert!(json.contains("\"model_type\": \"binomial\""));
    }
}
