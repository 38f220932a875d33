//! Row-oriented tabular input
//!
//! A header plus string cells, loaded from CSV. Typed access is column-based
//! so the feature extractor can look columns up by name.

use std::io::Read;
use std::path::Path;

use crate::{PipelineError, Result};

/// A CSV table held in memory as string cells
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RecordTable {
    /// Build a table from already-split cells; every row must match the
    /// header width. Rows are numbered from 1, not counting the header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(PipelineError::MalformedRow {
                row: i + 1,
                cells: row.len(),
                expected: headers.len(),
            });
        }
        Ok(RecordTable { headers, rows })
    }

    /// Load a table from a CSV file with a header row
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            PipelineError::Io(std::io::Error::new(
                e.kind(),
                format!("cannot open {}: {}", path.display(), e),
            ))
        })?;
        let table = Self::from_reader(file)?;
        log::info!("Loaded {} rows from {}", table.len(), path.display());
        Ok(table)
    }

    /// Load a table from any CSV reader with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }

        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Raw string cells of one column
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[index].as_str())
    }

    /// Column parsed as `f32`; empty or unparsable cells become NaN
    pub fn numeric_column(&self, index: usize) -> Vec<f32> {
        self.column(index).map(parse_numeric).collect()
    }
}

fn parse_numeric(cell: &str) -> f32 {
    match cell.trim().to_ascii_lowercase().as_str() {
        "true" => 1.0,
        "false" => 0.0,
        other => other.parse::<f32>().unwrap_or(f32::NAN),
    }
}
