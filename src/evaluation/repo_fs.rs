//! Flat CSV export of evaluation results.
//!
//! Column names and order follow the long-standing tabular layout; undefined
//! metrics are written as `-1`.

use std::path::{Path, PathBuf};

use crate::common::config::AppCfg;
use crate::common::error::{RetroError, RetroResult};
use crate::data::repo_fs::check_file_stem;

use super::domain::{RegressionSummary, ThresholdRow};

pub const THRESHOLD_HEADER: [&str; 26] = [
    "ModelName",
    "FeatureSet",
    "Grouping",
    "CreateTime",
    "Threshold",
    "TN",
    "TP",
    "FN",
    "FP",
    "N",
    "P",
    "Utility",
    "MCC",
    "Accuracy",
    "F1_Score",
    "F2_Score",
    "F0_5_Score",
    "TPR",
    "TNR",
    "FNR",
    "FPR",
    "FDR",
    "FOR",
    "NPV",
    "PPV",
    "ThreatScore",
];

pub const REGRESSION_HEADER: [&str; 12] = [
    "ModelName",
    "FeatureSet",
    "CreateTime",
    "Grouping",
    "explained_variance_score",
    "r2_score",
    "mean_absolute_percentage_error",
    "mean_absolute_error",
    "median_absolute_error",
    "mean_squared_error",
    "mean_squared_log_error",
    "max_error",
];

/// Write one line per threshold.
pub fn write_threshold_csv(rows: &[ThresholdRow], path: &Path) -> RetroResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(THRESHOLD_HEADER)?;
    for row in rows {
        let c = &row.counts;
        let mut record = vec![
            row.meta.model_name.clone(),
            row.meta.feature_set.clone().unwrap_or_default(),
            row.meta.grouping.clone(),
            row.meta.created_at.clone(),
            row.threshold.to_string(),
        ];
        record.extend([c.tn, c.tp, c.fn_, c.fp, c.n, c.p].map(|v| v.to_string()));
        record.extend(
            [
                row.utility,
                row.mcc,
                row.accuracy,
                row.f1,
                row.f2,
                row.f0_5,
                row.tpr,
                row.tnr,
                row.fnr,
                row.fpr,
                row.fdr,
                row.for_,
                row.npv,
                row.ppv,
                row.threat_score,
            ]
            .map(|m| m.to_string()),
        );
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|err| RetroError::io(path, err))?;
    Ok(())
}

/// Write a single-row regression summary.
pub fn write_regression_csv(summary: &RegressionSummary, path: &Path) -> RetroResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(REGRESSION_HEADER)?;
    let m = &summary.meta;
    let mut record = vec![
        m.model_name.clone(),
        m.feature_set.clone().unwrap_or_default(),
        m.created_at.clone(),
        m.grouping.clone(),
    ];
    record.extend(
        [
            summary.explained_variance,
            summary.r2,
            summary.mape,
            summary.mae,
            summary.median_ae,
            summary.mse,
            summary.msle.sentinel(),
            summary.max_error,
        ]
        .map(|v| v.to_string()),
    );
    writer.write_record(&record)?;
    writer.flush().map_err(|err| RetroError::io(path, err))?;
    Ok(())
}

/// Evaluation exports rooted at `<data_root>/evaluations`.
pub struct FsEvalRepo {
    root: PathBuf,
}

impl FsEvalRepo {
    pub fn new(cfg: &AppCfg) -> Self {
        Self {
            root: PathBuf::from(&cfg.data_root).join("evaluations"),
        }
    }

    /// Store a threshold table as `<fit_name>_<scored_data>.csv`; returns the path written.
    pub fn put_thresholds(
        &self,
        fit_name: &str,
        scored_data_name: &str,
        rows: &[ThresholdRow],
    ) -> RetroResult<PathBuf> {
        let path = self.prepare(fit_name, scored_data_name)?;
        write_threshold_csv(rows, &path)?;
        Ok(path)
    }

    pub fn put_regression(
        &self,
        fit_name: &str,
        scored_data_name: &str,
        summary: &RegressionSummary,
    ) -> RetroResult<PathBuf> {
        let path = self.prepare(fit_name, scored_data_name)?;
        write_regression_csv(summary, &path)?;
        Ok(path)
    }

    fn prepare(&self, fit_name: &str, scored_data_name: &str) -> RetroResult<PathBuf> {
        let fit_name = check_file_stem(fit_name)?;
        let scored_data_name = check_file_stem(scored_data_name)?;
        std::fs::create_dir_all(&self.root).map_err(|err| RetroError::io(&self.root, err))?;
        let path = self.root.join(format!("{fit_name}_{scored_data_name}.csv"));
        tracing::debug!(path = %path.display(), "writing evaluation");
        Ok(path)
    }
}
