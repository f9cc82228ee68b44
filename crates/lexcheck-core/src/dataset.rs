//! Dataset discovery and reading
//!
//! A dataset is one CSV file with a header row. Missing required columns fail
//! the whole file before any row is looked at; extra columns are ignored.

use crate::error::{LexcheckError, Result};
use lexcheck_record::{RawRecord, REQUIRED_COLUMNS};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Columns title maintenance needs
pub const TITLE_COLUMNS: [&str; 2] = ["Id", "title"];

/// Input datasets in `dir`, sorted by name, skipping outputs of earlier runs
///
/// # Errors
/// `dir` cannot be listed.
pub fn discover_datasets(dir: &Path, output_suffix: &str) -> Result<Vec<PathBuf>> {
    discover(dir, |stem| !stem.ends_with(output_suffix))
}

/// Corrected datasets in `dir` (stem ends with `output_suffix`), sorted by name
///
/// # Errors
/// `dir` cannot be listed.
pub fn discover_outputs(dir: &Path, output_suffix: &str) -> Result<Vec<PathBuf>> {
    discover(dir, |stem| stem.ends_with(output_suffix))
}

fn discover(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| LexcheckError::dataset_io(dir, e))?;
    let mut found = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| LexcheckError::dataset_io(dir, e))?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if path.is_file() && is_csv && keep(stem) {
            found.push(path);
        }
    }
    found.sort();
    tracing::debug!(dir = %dir.display(), datasets = found.len(), "discovered datasets");
    Ok(found)
}

/// Display name of a dataset: its file name
#[must_use]
pub fn dataset_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Open `path` and locate the `required` columns in its header
///
/// Returns the reader positioned at the first data row and, for each
/// required column, its position in the header.
///
/// # Errors
/// Unreadable file or header, or [`LexcheckError::MissingColumns`].
pub fn open_dataset(path: &Path, required: &[&str]) -> Result<(csv::Reader<File>, Vec<usize>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| LexcheckError::dataset_io(path, e))?;
    let headers = reader
        .headers()
        .map_err(|e| LexcheckError::dataset_io(path, e))?;

    let mut positions = Vec::with_capacity(required.len());
    let mut missing = Vec::new();
    for column in required {
        match headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == *column)
        {
            Some(i) => positions.push(i),
            None => missing.push((*column).to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(LexcheckError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        });
    }
    Ok((reader, positions))
}

/// Read every data row of an input dataset, in file order
///
/// Cells missing from a short row read as empty and are rejected by
/// normalization like any other empty field.
///
/// # Errors
/// See [`open_dataset`]; an I/O failure mid-file fails the dataset.
pub fn read_dataset(path: &Path) -> Result<Vec<RawRecord>> {
    let rows = read_columns(path, &REQUIRED_COLUMNS)?;
    Ok(rows
        .into_iter()
        .map(|[jurisdiction, source, last_reform_date, title, id]| {
            RawRecord::new(jurisdiction, source, last_reform_date, title, id)
        })
        .collect())
}

/// Identifier and title of one corrected row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleRow {
    /// Identifier as written
    pub id: String,
    /// Corrected title
    pub title: String,
}

/// Read `(Id, title)` pairs for title maintenance
///
/// # Errors
/// See [`open_dataset`].
pub fn read_title_rows(path: &Path) -> Result<Vec<TitleRow>> {
    let rows = read_columns(path, &TITLE_COLUMNS)?;
    Ok(rows
        .into_iter()
        .map(|[id, title]| TitleRow { id, title })
        .collect())
}

fn read_columns<const N: usize>(path: &Path, required: &[&str; N]) -> Result<Vec<[String; N]>> {
    let (mut reader, positions) = open_dataset(path, required)?;
    let mut rows = Vec::new();
    for (i, record) in reader.byte_records().enumerate() {
        let record =
            record.map_err(|e| LexcheckError::dataset_io(path, format!("data row {}: {e}", i + 1)))?;
        let short = record.len() < positions.iter().max().map_or(0, |p| p + 1);
        if short {
            tracing::warn!(path = %path.display(), row = i + 1, cells = record.len(), "short row");
        }
        rows.push(std::array::from_fn(|c| {
            record
                .get(positions[c])
                .map(|cell| String::from_utf8_lossy(cell).into_owned())
                .unwrap_or_default()
        }));
    }
    tracing::debug!(path = %path.display(), rows = rows.len(), "read dataset");
    Ok(rows)
}
