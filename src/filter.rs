// ==============================================================================
// filter.rs - LOINC Code and Positive Value Filter
// ==============================================================================
// Description: Selects observation rows for one lab category
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::models::{CellValue, ObservationTable};

/// Errors that can occur while filtering observations
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Non-numeric value in column {column} at row {row}: {value}")]
    NonNumericValue {
        column: String,
        row: usize,
        value: String,
    },
}

/// Row filter for one lab category
#[derive(Debug, Clone)]
pub struct LabFilter {
    pub code_column: String,
    pub value_column: String,
    pub accepted_codes: HashSet<String>,
}

impl LabFilter {
    pub fn new(
        code_column: impl Into<String>,
        value_column: impl Into<String>,
        accepted_codes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            code_column: code_column.into(),
            value_column: value_column.into(),
            accepted_codes: accepted_codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Rows whose code is accepted and whose value is strictly positive
    ///
    /// Keeps every column and the source row order. No match is
    /// an empty table, not an error. Missing or non-finite values are
    /// excluded; text in the value column of an accepted row is an error.
    pub fn apply(&self, table: &ObservationTable) -> Result<ObservationTable, FilterError> {
        let code_idx = table
            .column_index(&self.code_column)
            .ok_or_else(|| FilterError::MissingColumn(self.code_column.clone()))?;
        let value_idx = table
            .column_index(&self.value_column)
            .ok_or_else(|| FilterError::MissingColumn(self.value_column.clone()))?;

        // Surface the first malformed value before building the subset
        for row in table.rows() {
            if !self.code_matches(&row.cells[code_idx]) {
                continue;
            }
            if let cell @ (CellValue::Text(_) | CellValue::Date(_)) = &row.cells[value_idx] {
                return Err(FilterError::NonNumericValue {
                    column: self.value_column.clone(),
                    row: row.index,
                    value: cell.to_string(),
                });
            }
        }

        let filtered = table.retain_rows(|row| {
            self.code_matches(&row.cells[code_idx])
                && row.cells[value_idx]
                    .as_f64()
                    .is_some_and(|v| v.is_finite() && v > 0.0)
        });

        debug!(
            "Filter on {} codes kept {} of {} rows",
            self.accepted_codes.len(),
            filtered.len(),
            table.len()
        );
        Ok(filtered)
    }

    /// Values of the filtered rows in row order
    pub fn values(&self, filtered: &ObservationTable) -> Result<Vec<f64>, FilterError> {
        filtered
            .numeric_column(&self.value_column)
            .ok_or_else(|| FilterError::MissingColumn(self.value_column.clone()))
    }

    fn code_matches(&self, cell: &CellValue) -> bool {
        match cell {
            CellValue::Missing => false,
            CellValue::Text(code) => self.accepted_codes.contains(code),
            other => self.accepted_codes.contains(&other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObservationRow;

    fn table(rows: &[(&str, &str)]) -> ObservationTable {
        ObservationTable::new(
            vec![
                "Observation.code".to_string(),
                "Observation.value".to_string(),
                "note".to_string(),
            ],
            rows.iter()
                .enumerate()
                .map(|(index, (code, value))| ObservationRow {
                    index,
                    cells: vec![
                        CellValue::infer(code),
                        CellValue::infer(value),
                        CellValue::Text(format!("row{index}")),
                    ],
                })
                .collect(),
        )
    }

    fn alp_filter() -> LabFilter {
        LabFilter::new(
            "Observation.code",
            "Observation.value",
            ["109532-2", "1783-0", "59164-4", "16337-8"],
        )
    }

    #[test]
    fn test_filter_codes_and_positive_values() {
        let input = table(&[
            ("1783-0", "84.2"),
            ("13457-7", "3.1"),
            ("59164-4", "0"),
            ("16337-8", "-5"),
            ("109532-2", "120"),
            ("1783-0", ""),
        ]);
        let filtered = alp_filter().apply(&input).unwrap();

        let indices: Vec<usize> = filtered.rows().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 4]);
        assert_eq!(filtered.headers(), input.headers());
        assert_eq!(
            filtered.rows()[1].cells[2],
            CellValue::Text("row4".to_string())
        );
        assert_eq!(alp_filter().values(&filtered).unwrap(), vec![84.2, 120.0]);
    }

    #[test]
    fn test_filter_output_is_subset_satisfying_predicate() {
        let input = table(&[
            ("1783-0", "1"),
            ("1783-0", "-1"),
            ("2345-7", "5"),
            ("59164-4", "2.5"),
            ("", "7"),
        ]);
        let filter = alp_filter();
        let filtered = filter.apply(&input).unwrap();

        for row in filtered.rows() {
            assert!(input.rows().contains(row));
            assert!(filter.accepted_codes.contains(&row.cells[0].to_string()));
            assert!(row.cells[1].as_f64().unwrap() > 0.0);
        }
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_no_match_is_empty() {
        let input = table(&[("2345-7", "5"), ("718-7", "13.2")]);
        let filtered = alp_filter().apply(&input).unwrap();
        assert!(filtered.is_empty());
        assert!(alp_filter().values(&filtered).unwrap().is_empty());
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let input = table(&[("1783-0", "84.2"), ("1783-0", "high")]);
        match alp_filter().apply(&input) {
            Err(FilterError::NonNumericValue { row, value, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "high");
            }
            other => panic!("Expected NonNumericValue error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_value_in_other_category_ignored() {
        let input = table(&[("1783-0", "84.2"), ("2345-7", "pending")]);
        assert_eq!(alp_filter().apply(&input).unwrap().len(), 1);
    }

    #[test]
    fn test_nan_excluded() {
        let input = table(&[("1783-0", "NaN"), ("1783-0", "2")]);
        assert_eq!(alp_filter().apply(&input).unwrap().len(), 1);
    }

    #[test]
    fn test_numeric_codes_match_as_text() {
        let input = table(&[("12345", "1.0")]);
        let filter = LabFilter::new("Observation.code", "Observation.value", ["12345"]);
        assert_eq!(filter.apply(&input).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_column() {
        let input = table(&[("1783-0", "1")]);
        let filter = LabFilter::new("code", "Observation.value", ["1783-0"]);
        assert!(matches!(filter.apply(&input), Err(FilterError::MissingColumn(c)) if c == "code"));
    }
}
