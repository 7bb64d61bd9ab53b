//! Core dataset definitions: a small columnar frame and the column roles used
//! to turn frames into model inputs.

use serde::{Deserialize, Serialize};

use crate::common::error::{RetroError, RetroResult};

/// A single named column.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Column::Text(_))
    }

    fn take(&self, keep: &[bool]) -> Column {
        fn pick<T: Clone>(values: &[T], keep: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(keep)
                .filter(|&(_, &k)| k)
                .map(|(v, _)| v.clone())
                .collect()
        }
        match self {
            Column::Float(v) => Column::Float(pick(v, keep)),
            Column::Text(v) => Column::Text(pick(v, keep)),
        }
    }
}

impl From<Vec<f64>> for Column {
    fn from(values: Vec<f64>) -> Self {
        Column::Float(values)
    }
}

impl From<Vec<String>> for Column {
    fn from(values: Vec<String>) -> Self {
        Column::Text(values)
    }
}

impl From<Vec<&str>> for Column {
    fn from(values: Vec<&str>) -> Self {
        Column::Text(values.into_iter().map(str::to_string).collect())
    }
}

/// Ordered collection of equal-length named columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    columns: Vec<(String, Column)>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from `(name, column)` pairs.
    pub fn from_columns<I, S>(columns: I) -> RetroResult<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut frame = Frame::new();
        for (name, column) in columns {
            frame.push_column(name, column)?;
        }
        Ok(frame)
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.len())
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Append a column, replacing any existing column of the same name in place.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> RetroResult<()> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.nrows() {
            return Err(RetroError::invalid(format!(
                "column {name} has {} rows, frame has {}",
                column.len(),
                self.nrows()
            )));
        }
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = column,
            None => self.columns.push((name, column)),
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> RetroResult<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| RetroError::data_missing(format!("column {name}")))
    }

    /// Borrow a numeric column.
    pub fn numeric(&self, name: &str) -> RetroResult<&[f64]> {
        match self.column(name)? {
            Column::Float(v) => Ok(v),
            Column::Text(_) => Err(RetroError::invalid(format!("column {name} is not numeric"))),
        }
    }

    /// Projection onto `names`, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> RetroResult<Frame> {
        let mut out = Frame::new();
        for name in names {
            let name = name.as_ref();
            out.push_column(name, self.column(name)?.clone())?;
        }
        Ok(out)
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.columns.iter().position(|(n, _)| n == name)?;
        Some(self.columns.remove(idx).1)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> RetroResult<()> {
        if from != to && self.has_column(to) {
            return Err(RetroError::invalid(format!("column {to} already exists")));
        }
        let (name, _) = self
            .columns
            .iter_mut()
            .find(|(n, _)| n.as_str() == from)
            .ok_or_else(|| RetroError::data_missing(format!("column {from}")))?;
        *name = to.to_string();
        Ok(())
    }

    /// Keep rows where `mask` is true.
    pub fn filter_rows(&self, mask: &[bool]) -> RetroResult<Frame> {
        if mask.len() != self.nrows() {
            return Err(RetroError::invalid(format!(
                "mask has {} entries, frame has {} rows",
                mask.len(),
                self.nrows()
            )));
        }
        Ok(Frame {
            columns: self
                .columns
                .iter()
                .map(|(n, c)| (n.clone(), c.take(mask)))
                .collect(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }
}

/// Which columns play which role (the "ArgsList" of a modelling run).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnRoles {
    pub target: Option<String>,
    #[serde(default)]
    pub numeric: Vec<String>,
    #[serde(default)]
    pub categorical: Vec<String>,
    #[serde(default)]
    pub text: Vec<String>,
    pub weight: Option<String>,
}

impl ColumnRoles {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn numeric<S: Into<String>>(mut self, cols: impl IntoIterator<Item = S>) -> Self {
        self.numeric = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn categorical<S: Into<String>>(mut self, cols: impl IntoIterator<Item = S>) -> Self {
        self.categorical = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn text<S: Into<String>>(mut self, cols: impl IntoIterator<Item = S>) -> Self {
        self.text = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn weight(mut self, col: impl Into<String>) -> Self {
        self.weight = Some(col.into());
        self
    }

    pub fn target_name(&self) -> RetroResult<&str> {
        self.target
            .as_deref()
            .ok_or(RetroError::MissingArgument("TargetColumnName"))
    }
}

/// Mapping from original text class labels to the integer codes models see.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMap {
    /// Sorted distinct labels; a label's code is its index.
    labels: Vec<String>,
}

impl ClassMap {
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut labels: Vec<String> = labels.into_iter().map(str::to_string).collect();
        labels.sort();
        labels.dedup();
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn code(&self, label: &str) -> Option<usize> {
        self.labels.binary_search_by(|l| l.as_str().cmp(label)).ok()
    }

    pub fn label(&self, code: usize) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }
}

/// Features, labels and optional weights for one partition, shaped for a backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelInput {
    pub features: Frame,
    pub label: Vec<f64>,
    pub weight: Option<Vec<f64>>,
}

/// The partitions fed to a backend plus the roles that produced them.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelData {
    pub train: ModelInput,
    pub validation: Option<ModelInput>,
    pub test: Option<ModelInput>,
    pub roles: ColumnRoles,
    /// Present when the target was text and had to be encoded.
    pub class_map: Option<ClassMap>,
}

/// The raw partitions that scored predictions are written back onto.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataFrames {
    pub train: Frame,
    pub validation: Option<Frame>,
    pub test: Option<Frame>,
}

/// Names by which partitions are addressed when scoring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Partition {
    Train,
    Validation,
    Test,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train_data",
            Partition::Validation => "validation_data",
            Partition::Test => "test_data",
        }
    }
}

impl std::str::FromStr for Partition {
    type Err = RetroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train_data" => Ok(Partition::Train),
            "validation_data" => Ok(Partition::Validation),
            "test_data" => Ok(Partition::Test),
            other => Err(RetroError::data_missing(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_columns([
            ("x", Column::from(vec![1.0, 2.0, 3.0])),
            ("seg", Column::from(vec!["a", "b", "a"])),
        ])
        .unwrap()
    }

    #[test]
    fn push_rejects_ragged_columns() {
        let mut f = sample();
        assert!(f.push_column("y", Column::from(vec![1.0])).is_err());
    }

    #[test]
    fn push_replaces_in_place() {
        let mut f = sample();
        f.push_column("x", Column::from(vec![9.0, 9.0, 9.0])).unwrap();
        assert_eq!(f.names(), vec!["x", "seg"]);
        assert_eq!(f.numeric("x").unwrap(), &[9.0, 9.0, 9.0]);
    }

    #[test]
    fn select_and_missing_column() {
        let f = sample();
        let s = f.select(&["seg"]).unwrap();
        assert_eq!(s.names(), vec!["seg"]);
        assert!(matches!(f.select(&["nope"]), Err(RetroError::DataMissing(_))));
        assert!(f.numeric("seg").is_err());
    }

    #[test]
    fn rename_and_filter() {
        let mut f = sample();
        f.rename("x", "p1").unwrap();
        assert!(f.rename("seg", "p1").is_err());
        let kept = f.filter_rows(&[true, false, true]).unwrap();
        assert_eq!(kept.nrows(), 2);
        assert_eq!(kept.numeric("p1").unwrap(), &[1.0, 3.0]);
        assert!(f.filter_rows(&[true]).is_err());
    }

    #[test]
    fn class_map_codes_follow_sorted_order() {
        let map = ClassMap::from_labels(["red", "blue", "red", "green"]);
        assert_eq!(map.labels(), &["blue", "green", "red"]);
        assert_eq!(map.code("green"), Some(1));
        assert_eq!(map.label(2), Some("red"));
        assert_eq!(map.code("purple"), None);
    }

    #[test]
    fn missing_target_is_missing_argument() {
        let roles = ColumnRoles::default();
        assert!(matches!(
            roles.target_name(),
            Err(RetroError::MissingArgument("TargetColumnName"))
        ));
    }

    #[test]
    fn partition_names_round_trip() {
        for p in [Partition::Train, Partition::Validation, Partition::Test] {
            assert_eq!(p.as_str().parse::<Partition>().unwrap(), p);
        }
    }
}
