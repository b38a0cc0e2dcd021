//! Cleaning functions - deduplicate, fill gaps, format ratio columns
//! Pure functions over `Dataset`, composed by `clean`

use crate::format_percentage;
use crate::ingestion::error::{LoadError, Result};
use crate::ingestion::types::{CellValue, Column, Dataset};
use chrono::NaiveDateTime;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Value written into every missing cell
pub const FILL_PLACEHOLDER: &str = " ";

/// Clean one sheet. Absent input or any failure yields `None`, never a partial result.
pub fn clean(dataset: Option<Dataset>) -> Option<Dataset> {
    let dataset = match dataset {
        Some(dataset) => dataset,
        None => {
            warn!("No data to clean");
            return None;
        }
    };

    match try_clean(dataset) {
        Ok(cleaned) => Some(cleaned),
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

/// Run all cleaning steps in sequence
pub fn try_clean(dataset: Dataset) -> Result<Dataset> {
    if !dataset.is_rectangular() {
        let lengths: Vec<usize> = dataset.columns.iter().map(|c| c.values.len()).collect();
        return Err(LoadError::Cleaning(format!(
            "columns have different lengths: {:?}",
            lengths
        )));
    }

    let before = dataset.height();

    // Step 1: Remove duplicate rows
    let dataset = drop_duplicates(dataset);

    // Step 2: Fill missing values
    let dataset = fill_missing(dataset, FILL_PLACEHOLDER);

    // Step 3: Convert float columns to percentages
    let dataset = format_float_columns(dataset);

    info!(
        "Cleaned dataset: {} rows ({} duplicates removed), {} columns",
        dataset.height(),
        before - dataset.height(),
        dataset.width()
    );

    Ok(dataset)
}

/// Hashable view of a cell for row comparison
#[derive(Hash, PartialEq, Eq)]
enum CellKey<'a> {
    Int(i64),
    Float(u64),
    Text(&'a str),
    Bool(bool),
    DateTime(NaiveDateTime),
    Missing,
}

impl<'a> From<&'a CellValue> for CellKey<'a> {
    fn from(cell: &'a CellValue) -> Self {
        match cell {
            CellValue::Int(i) => CellKey::Int(*i),
            CellValue::Float(f) => {
                if f.is_nan() {
                    CellKey::Float(f64::NAN.to_bits())
                } else if f.fract() == 0.0 && f.abs() < 9_223_372_036_854_775_808.0 {
                    // 1.0 == 1 and -0.0 == 0.0
                    CellKey::Int(*f as i64)
                } else {
                    CellKey::Float(f.to_bits())
                }
            }
            CellValue::Text(s) => CellKey::Text(s),
            CellValue::Bool(b) => CellKey::Bool(*b),
            CellValue::DateTime(dt) => CellKey::DateTime(*dt),
            CellValue::Missing => CellKey::Missing,
        }
    }
}

/// Remove rows identical to an earlier row, keeping the first occurrence
pub fn drop_duplicates(dataset: Dataset) -> Dataset {
    let mut seen: HashSet<Vec<CellKey>> = HashSet::with_capacity(dataset.height());
    let keep: Vec<bool> = dataset
        .rows()
        .map(|row| seen.insert(row.into_iter().map(CellKey::from).collect()))
        .collect();
    drop(seen);

    let removed = keep.iter().filter(|k| !**k).count();
    if removed > 0 {
        debug!("Dropping {} duplicate rows", removed);
    }

    let columns = dataset
        .columns
        .into_iter()
        .map(|column| Column {
            name: column.name,
            values: column
                .values
                .into_iter()
                .zip(&keep)
                .filter_map(|(value, keep)| keep.then_some(value))
                .collect(),
        })
        .collect();

    Dataset::new(columns)
}

/// Replace every missing cell with `placeholder`, in every column
pub fn fill_missing(dataset: Dataset, placeholder: &str) -> Dataset {
    let columns = dataset
        .columns
        .into_iter()
        .map(|column| Column {
            name: column.name,
            values: column
                .values
                .into_iter()
                .map(|value| match value {
                    CellValue::Missing => CellValue::text(placeholder),
                    other => other,
                })
                .collect(),
        })
        .collect();

    Dataset::new(columns)
}

/// A float column holds only numbers, at least one of them fractional.
/// Columns that took a placeholder in `fill_missing` no longer qualify.
pub fn is_float_column(column: &Column) -> bool {
    column.values.iter().all(CellValue::is_numeric)
        && column
            .values
            .iter()
            .any(|value| matches!(value, CellValue::Float(_)))
}

/// Rewrite float columns as percentage text; other columns are untouched
pub fn format_float_columns(dataset: Dataset) -> Dataset {
    let columns = dataset
        .columns
        .into_iter()
        .map(|column| {
            if !is_float_column(&column) {
                return column;
            }

            debug!("Formatting column '{}' as percentages", column.name);

            Column {
                name: column.name,
                values: column
                    .values
                    .into_iter()
                    .map(|value| match value.as_f64() {
                        Some(v) => CellValue::Text(format_percentage(v)),
                        None => value,
                    })
                    .collect(),
            }
        })
        .collect();

    Dataset::new(columns)
}
