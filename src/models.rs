// ==============================================================================
// models.rs - Observation Table and Aggregate Data Models
// ==============================================================================
// Description: Data structures for lab observation filtering and aggregation
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lab value category reported by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabCategory {
    /// Alkaline phosphatase
    Alp,
    /// Low-density lipoprotein cholesterol
    Ldl,
}

impl LabCategory {
    /// Lowercase identifier used in archive entry names
    pub fn as_str(&self) -> &'static str {
        match self {
            LabCategory::Alp => "alp",
            LabCategory::Ldl => "ldl",
        }
    }

    /// Uppercase label used in plot titles and axes
    pub fn label(&self) -> &'static str {
        match self {
            LabCategory::Alp => "ALP",
            LabCategory::Ldl => "LDL",
        }
    }

    /// LOINC codes accepted for this category
    pub fn default_codes(&self) -> &'static [&'static str] {
        match self {
            LabCategory::Alp => &["109532-2", "1783-0", "59164-4", "16337-8"],
            LabCategory::Ldl => &["13457-7", "53133-5", "96258-9", "69419-0"],
        }
    }

    /// Conventional reporting unit, used on plot axes
    pub fn default_unit(&self) -> &'static str {
        match self {
            LabCategory::Alp => "U/L",
            LabCategory::Ldl => "mmol/L",
        }
    }

    /// Value range spanned by generated uniform bin edges
    pub fn default_value_range(&self) -> (f64, f64) {
        match self {
            LabCategory::Alp => (0.0, 400.0),
            LabCategory::Ldl => (0.0, 10.0),
        }
    }
}

impl fmt::Display for LabCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// CellValue - a single cell of the observation table
// ---------------------------------------------------------------------------

/// A typed table cell. Date variants only appear in configured date columns.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Missing,
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDateTime),
}

impl CellValue {
    /// Infer the type of a raw (already trimmed) non-date cell
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return CellValue::Missing;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return CellValue::Float(f);
        }
        CellValue::Text(raw.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => Ok(()),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

// ---------------------------------------------------------------------------
// ObservationTable - the loaded dataset
// ---------------------------------------------------------------------------

/// One row of the source file
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRow {
    /// 0-based position of the row in the source file (excluding the header)
    pub index: usize,
    /// One cell per header column
    pub cells: Vec<CellValue>,
}

/// In-memory observation table. Row order is source order.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationTable {
    headers: Vec<String>,
    rows: Vec<ObservationRow>,
}

impl ObservationTable {
    pub fn new(headers: Vec<String>, rows: Vec<ObservationRow>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[ObservationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact header name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at (row, column), `None` if either is out of range
    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.cells.get(col))
    }

    /// New table with the same headers, keeping the rows that match `keep`
    pub fn retain_rows<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&ObservationRow) -> bool,
    {
        let rows = self.rows.iter().filter(|r| keep(r)).cloned().collect();
        Self {
            headers: self.headers.clone(),
            rows,
        }
    }

    /// Numeric values of a column in row order; non-numeric cells are skipped
    pub fn numeric_column(&self, column: &str) -> Option<Vec<f64>> {
        let col = self.column_index(column)?;
        Some(
            self.rows
                .iter()
                .filter_map(|r| r.cells.get(col).and_then(CellValue::as_f64))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Aggregate records
// ---------------------------------------------------------------------------

/// Mean of one fixed-size row window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupMeanRecord {
    pub group_index: usize,
    pub group_mean: f64,
}

/// Count of values falling into one bin interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinCountRecord {
    pub left: f64,
    pub right: f64,
    /// Lowest bin, closed on both sides
    pub closed_left: bool,
    pub n: usize,
    pub midpoint: f64,
}

impl BinCountRecord {
    /// Interval label, e.g. `(10, 20]` or `[0, 10]` for the lowest bin
    pub fn label(&self) -> String {
        let open = if self.closed_left { '[' } else { '(' };
        format!("{open}{}, {}]", self.left, self.right)
    }
}

/// Output of one aggregation policy
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateTable {
    GroupMeans(Vec<GroupMeanRecord>),
    BinCounts(Vec<BinCountRecord>),
}

impl AggregateTable {
    pub fn len(&self) -> usize {
        match self {
            AggregateTable::GroupMeans(records) => records.len(),
            AggregateTable::BinCounts(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples and frequency weights for density estimation.
    ///
    /// Group means are unweighted; bin midpoints are weighted by their counts.
    pub fn density_input(&self) -> (Vec<f64>, Option<Vec<f64>>) {
        match self {
            AggregateTable::GroupMeans(records) => {
                (records.iter().map(|r| r.group_mean).collect(), None)
            }
            AggregateTable::BinCounts(records) => (
                records.iter().map(|r| r.midpoint).collect(),
                Some(records.iter().map(|r| r.n as f64).collect()),
            ),
        }
    }
}
