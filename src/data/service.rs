//! Service layer turning raw frames into backend-shaped model inputs.

use std::path::Path;
use std::time::Instant;

use crate::common::error::{RetroError, RetroResult};

use super::domain::{ClassMap, Column, ColumnRoles, DataFrames, Frame, ModelData, ModelInput};
use super::repo_fs;

/// Load a CSV file into a frame.
pub fn ingest_file(path: impl AsRef<Path>) -> RetroResult<Frame> {
    let path = path.as_ref();
    let start = Instant::now();
    let frame = repo_fs::read_csv(path)?;
    tracing::info!(
        path = %path.display(),
        rows = frame.nrows(),
        cols = frame.ncols(),
        dur_ms = start.elapsed().as_millis() as u64,
        "ingested frame"
    );
    Ok(frame)
}

/// Build model inputs for every available partition.
///
/// `feature_columns` is decided by the backend; the target and weight columns
/// come from `roles`. A text target is encoded through a [`ClassMap`] built
/// from the labels of all partitions.
pub fn get_model_data(
    frames: &DataFrames,
    roles: &ColumnRoles,
    feature_columns: &[String],
) -> RetroResult<ModelData> {
    let target = roles.target_name()?;

    let class_map = if frames.train.column(target)?.is_text() {
        Some(build_class_map(frames, target)?)
    } else {
        None
    };

    let input = |frame: &Frame| -> RetroResult<ModelInput> {
        Ok(ModelInput {
            features: frame.select(feature_columns)?,
            label: labels(frame, target, class_map.as_ref())?,
            weight: match &roles.weight {
                Some(w) => Some(frame.numeric(w)?.to_vec()),
                None => None,
            },
        })
    };

    let data = ModelData {
        train: input(&frames.train)?,
        validation: frames.validation.as_ref().map(&input).transpose()?,
        test: frames.test.as_ref().map(&input).transpose()?,
        roles: roles.clone(),
        class_map: class_map.clone(),
    };

    tracing::debug!(
        target_column = target,
        features = feature_columns.len(),
        classes = data.class_map.as_ref().map_or(0, ClassMap::len),
        "model data prepared"
    );
    Ok(data)
}

fn partitions(frames: &DataFrames) -> impl Iterator<Item = &Frame> {
    std::iter::once(&frames.train)
        .chain(frames.validation.as_ref())
        .chain(frames.test.as_ref())
}

fn build_class_map(frames: &DataFrames, target: &str) -> RetroResult<ClassMap> {
    let mut all = Vec::new();
    for frame in partitions(frames) {
        match frame.column(target)? {
            Column::Text(values) => all.extend(values.iter().map(String::as_str)),
            Column::Float(_) => {
                return Err(RetroError::invalid(format!(
                    "target {target} is text in train_data but numeric elsewhere"
                )))
            }
        }
    }
    Ok(ClassMap::from_labels(all))
}

fn labels(frame: &Frame, target: &str, class_map: Option<&ClassMap>) -> RetroResult<Vec<f64>> {
    match (frame.column(target)?, class_map) {
        (Column::Float(values), None) => Ok(values.clone()),
        (Column::Text(values), Some(map)) => values
            .iter()
            .map(|v| {
                map.code(v)
                    .map(|code| code as f64)
                    .ok_or_else(|| RetroError::invalid(format!("unmapped class label {v}")))
            })
            .collect(),
        _ => Err(RetroError::invalid(format!(
            "target {target} has inconsistent types across partitions"
        ))),
    }
}
