//! CSV-backed persistence for frames.
//!
//! A column is numeric when every non-empty cell parses as `f64`; empty cells
//! in numeric columns load as NaN.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::common::error::{RetroError, RetroResult};

use super::domain::{Column, Frame};

/// Read a headed CSV file.
pub fn read_csv(path: &Path) -> RetroResult<Frame> {
    let file = File::open(path).map_err(|err| RetroError::io(path, err))?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (idx, slot) in cells.iter_mut().enumerate() {
            slot.push(record.get(idx).unwrap_or_default().to_string());
        }
    }

    Frame::from_columns(headers.into_iter().zip(cells).map(|(name, raw)| (name, infer(raw))))
}

fn infer(raw: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = raw
        .iter()
        .map(|cell| {
            let cell = cell.trim();
            if cell.is_empty() {
                Some(f64::NAN)
            } else {
                cell.parse().ok()
            }
        })
        .collect();
    match parsed {
        Some(values) if raw.iter().any(|c| !c.trim().is_empty()) => Column::Float(values),
        _ => Column::Text(raw),
    }
}

/// Write a frame with a header row.
/// Reject names that would leave their repository directory once joined into a path.
pub(crate) fn check_file_stem(name: &str) -> RetroResult<&str> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(RetroError::invalid(format!("invalid file name {name:?}")));
    }
    Ok(name)
}

pub fn write_csv(frame: &Frame, path: &Path) -> RetroResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(frame.names())?;
    let columns: Vec<&Column> = frame.iter().map(|(_, c)| c).collect();
    for row in 0..frame.nrows() {
        writer.write_record(columns.iter().map(|c| match c {
            Column::Float(v) => v[row].to_string(),
            Column::Text(v) => v[row].clone(),
        }))?;
    }
    writer.flush().map_err(|err| RetroError::io(path, err))?;
    Ok(())
}
