// ==============================================================================
// loader.rs - Delimited Observation File Loader
// ==============================================================================
// Description: Reads lab observation exports into an in-memory table
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: Delimited text with a header row
// Example:
//   Patient.birthDate,Condition.recordedDate,Observation.code,Observation.value
//   1961-04-12,2021-03-02,1783-0,84.2
//   1975-09-30,2020-11-17,13457-7,3.1
// ==============================================================================

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{CellValue, ObservationRow, ObservationTable};

/// Errors that can occur while loading an observation file
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid date in column {column} at line {line}: {value}")]
    InvalidDate {
        column: String,
        line: u64,
        value: String,
    },
}

/// Loader for delimited lab observation exports
#[derive(Debug, Clone)]
pub struct ObservationLoader {
    /// Field delimiter byte
    pub delimiter: u8,
    /// Columns parsed as date-times
    pub date_columns: Vec<String>,
    /// Columns that must be present in the header
    pub required_columns: Vec<String>,
}

impl Default for ObservationLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationLoader {
    /// Comma-delimited loader with no date or required columns
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            date_columns: Vec::new(),
            required_columns: Vec::new(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_date_columns(mut self, columns: Vec<String>) -> Self {
        self.date_columns = columns;
        self
    }

    pub fn with_required_columns(mut self, columns: Vec<String>) -> Self {
        self.required_columns = columns;
        self
    }

    /// Load an observation file
    ///
    /// # Arguments
    /// * `path` - Path to the delimited file
    ///
    /// # Returns
    /// * `Ok(ObservationTable)` - All rows and columns, date columns parsed
    /// * `Err(LoadError)` - Missing file, missing column, ragged row or bad date
    ///
    /// Empty cells (including empty date cells) load as `CellValue::Missing`.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ObservationTable, LoadError> {
        let path = path.as_ref();
        info!("Loading observations from {:?}", path);

        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

        for column in self.required_columns.iter().chain(self.date_columns.iter()) {
            if !headers.iter().any(|h| h == column) {
                return Err(LoadError::MissingColumn(column.clone()));
            }
        }

        let is_date: Vec<bool> = headers
            .iter()
            .map(|h| self.date_columns.iter().any(|d| d == h))
            .collect();

        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let mut cells = Vec::with_capacity(headers.len());
            for (col, raw) in record.iter().enumerate() {
                let cell = if is_date[col] {
                    parse_date_cell(raw).ok_or_else(|| LoadError::InvalidDate {
                        column: headers[col].clone(),
                        line,
                        value: raw.to_string(),
                    })?
                } else {
                    CellValue::infer(raw)
                };
                cells.push(cell);
            }

            rows.push(ObservationRow { index, cells });
        }

        debug!("Parsed {} columns: {:?}", headers.len(), headers);
        info!("Loaded {} observation rows", rows.len());

        Ok(ObservationTable::new(headers, rows))
    }
}

/// Parse a date cell; `None` means the text is not a recognized date
fn parse_date_cell(raw: &str) -> Option<CellValue> {
    if raw.is_empty() {
        return Some(CellValue::Missing);
    }
    parse_datetime(raw).map(CellValue::Date)
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc())
}
