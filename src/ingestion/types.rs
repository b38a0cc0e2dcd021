//! Core data types for the ingestion pipeline
//! Pure data structures with no behavior beyond rendering

use bytes::Bytes;
use chrono::NaiveDateTime;
use std::fmt;

use crate::ingestion::utils::python_float_repr;

/// Downloaded workbook, held in memory until parsed
#[derive(Debug, Clone)]
pub struct RawData {
    pub source: String,
    pub bytes: Bytes,
}

impl RawData {
    pub fn new(source: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        RawData {
            source: source.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A single spreadsheet cell after conversion
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Int(_) | CellValue::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", python_float_repr(*v)),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Bool(true) => write!(f, "True"),
            CellValue::Bool(false) => write!(f, "False"),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Missing => write!(f, "NaN"),
        }
    }
}

/// Named column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }
}

/// Tabular dataset - ordered columns of equal length
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub columns: Vec<Column>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Self {
        Dataset { columns }
    }

    /// Build a dataset from a header and row-major cells.
    /// Short rows are padded with `Missing`, long rows truncated.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut columns: Vec<Column> = header
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(CellValue::Missing));
            }
        }

        Dataset { columns }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// True when every column holds the same number of cells
    pub fn is_rectangular(&self) -> bool {
        let height = self.height();
        self.columns.iter().all(|c| c.values.len() == height)
    }

    pub fn row(&self, idx: usize) -> Vec<&CellValue> {
        self.columns.iter().map(|c| &c.values[idx]).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&CellValue>> + '_ {
        (0..self.height()).map(move |idx| self.row(idx))
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() || self.is_empty() {
            writeln!(f, "Empty dataset")?;
            return write!(f, "Columns: [{}]", self.column_names().join(", "));
        }

        let height = self.height();
        let index_width = height.saturating_sub(1).to_string().len();

        let rendered: Vec<Vec<String>> = self
            .columns
            .iter()
            .map(|c| c.values.iter().map(|v| v.to_string()).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .zip(&rendered)
            .map(|(col, cells)| {
                cells
                    .iter()
                    .map(|s| s.chars().count())
                    .chain(std::iter::once(col.name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:width$}", "", width = index_width)?;
        for (col, width) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>width$}", col.name, width = *width)?;
        }
        writeln!(f)?;

        for row in 0..height {
            write!(f, "{:>width$}", row, width = index_width)?;
            for (cells, width) in rendered.iter().zip(&widths) {
                let cell = cells.get(row).map(String::as_str).unwrap_or("");
                write!(f, "  {:>width$}", cell, width = *width)?;
            }
            writeln!(f)?;
        }

        write!(f, "\n[{} rows x {} columns]", height, self.width())
    }
}

/// Sheets of a workbook in workbook order
#[derive(Debug, Clone, Default)]
pub struct SheetCollection {
    sheets: Vec<(String, Dataset)>,
}

impl SheetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet; returns false (and keeps the first) if the name is taken
    pub fn insert(&mut self, name: impl Into<String>, dataset: Dataset) -> bool {
        let name = name.into();
        if self.get(&name).is_some() {
            return false;
        }
        self.sheets.push((name, dataset));
        true
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.sheets
            .iter()
            .find(|(sheet, _)| sheet == name)
            .map(|(_, dataset)| dataset)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

impl IntoIterator for SheetCollection {
    type Item = (String, Dataset);
    type IntoIter = std::vec::IntoIter<(String, Dataset)>;

    fn into_iter(self) -> Self::IntoIter {
        self.sheets.into_iter()
    }
}

/// Write operation statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteStats {
    pub rows_written: usize,
    pub columns: usize,
    pub batches: usize,
}

impl fmt::Display for WriteStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows: {}, columns: {}, batches: {}",
            self.rows_written, self.columns, self.batches
        )
    }
}

/// One sheet successfully loaded into a table
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub sheet: String,
    pub table: String,
    pub stats: WriteStats,
}

/// Outcome of a loader run that got past fetch and parse
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub tables: Vec<LoadedTable>,
    pub skipped: Vec<String>,
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tables loaded: {}, sheets skipped: {}",
            self.tables.len(),
            self.skipped.len()
        )?;
        if let Some(reason) = &self.aborted {
            write!(f, ", aborted: {}", reason)?;
        }
        Ok(())
    }
}
