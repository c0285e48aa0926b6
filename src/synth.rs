// ==============================================================================
// synth.rs - Synthetic Lab Observation Dataset
// ==============================================================================
// Description: Deterministic synthetic observation CSV for demos and testing
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::models::LabCategory;

/// Codes of unrelated observations mixed into the dataset
const OTHER_CODES: [&str; 3] = ["2345-7", "718-7", "2160-0"];

/// One synthetic observation, serialized with the export's column names
#[derive(Debug, Clone, Serialize)]
pub struct SyntheticObservation {
    #[serde(rename = "Patient.identifier")]
    pub patient_id: String,
    #[serde(rename = "Patient.birthDate")]
    pub birth_date: String,
    #[serde(rename = "Condition.recordedDate")]
    pub recorded_date: String,
    #[serde(rename = "Observation.code")]
    pub code: String,
    #[serde(rename = "Observation.value")]
    pub value: f64,
    #[serde(rename = "Observation.unit")]
    pub unit: String,
    #[serde(rename = "Observation.effective.x.extension.QuelleKlinischesBezugsdatum")]
    pub effective_date: String,
}

/// Generator for reproducible synthetic observation tables
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub rows: usize,
    pub seed: u64,
    /// Share of rows given a zero or negative value
    pub non_positive_share: f64,
}

impl Default for SyntheticDataset {
    fn default() -> Self {
        Self {
            rows: 1000,
            seed: 42,
            non_positive_share: 0.03,
        }
    }
}

impl SyntheticDataset {
    pub fn new(rows: usize, seed: u64) -> Self {
        Self {
            rows,
            seed,
            ..Self::default()
        }
    }

    /// Generate all observations; the same seed always gives the same rows
    pub fn generate(&self) -> Vec<SyntheticObservation> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let epoch = NaiveDate::from_ymd_opt(1940, 1, 1).unwrap_or_default();
        let study_start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default();

        (0..self.rows)
            .map(|i| {
                let (code, value, unit) = match rng.gen_range(0..10) {
                    0..=3 => {
                        let codes = LabCategory::Alp.default_codes();
                        let code = codes[rng.gen_range(0..codes.len())];
                        (code, gauss(&mut rng, 90.0, 30.0), "U/L")
                    }
                    4..=7 => {
                        let codes = LabCategory::Ldl.default_codes();
                        let code = codes[rng.gen_range(0..codes.len())];
                        (code, gauss(&mut rng, 3.0, 0.9), "mmol/L")
                    }
                    _ => {
                        let code = OTHER_CODES[rng.gen_range(0..OTHER_CODES.len())];
                        (code, gauss(&mut rng, 50.0, 20.0), "1")
                    }
                };
                let value = if rng.gen::<f64>() < self.non_positive_share {
                    -value.abs()
                } else {
                    value
                };

                let birth = epoch + Duration::days(rng.gen_range(0..60 * 365));
                let recorded = study_start + Duration::days(rng.gen_range(0..5 * 365));
                let effective = recorded + Duration::days(rng.gen_range(0..30));

                SyntheticObservation {
                    patient_id: format!("P{:05}", i / 3),
                    birth_date: birth.format("%Y-%m-%d").to_string(),
                    recorded_date: recorded.format("%Y-%m-%d").to_string(),
                    code: code.to_string(),
                    value: (value * 100.0).round() / 100.0,
                    unit: unit.to_string(),
                    effective_date: effective.format("%Y-%m-%d").to_string(),
                }
            })
            .collect()
    }

    /// Write the dataset as CSV
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<usize, csv::Error> {
        let path = path.as_ref();
        let rows = self.generate();
        let mut writer = csv::Writer::from_path(path)?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        info!("Wrote {} synthetic observations to {:?}", rows.len(), path);
        Ok(rows.len())
    }
}

/// Box-Muller transform for normal distribution
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}
