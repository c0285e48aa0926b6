// ==============================================================================
// config.rs - Pipeline Configuration
// ==============================================================================
// Description: Run configuration, defaults, JSON loading and validation
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::aggregator::AggregateError;
use crate::models::LabCategory;

pub const DEFAULT_INPUT_PATH: &str = "synth_dataset.csv";
pub const DEFAULT_OUTPUT_PATH: &str = "lab_density_outputs.zip";
pub const DEFAULT_CODE_COLUMN: &str = "Observation.code";
pub const DEFAULT_VALUE_COLUMN: &str = "Observation.value";
pub const DEFAULT_DATE_COLUMNS: [&str; 3] = [
    "Patient.birthDate",
    "Condition.recordedDate",
    "Observation.effective.x.extension.QuelleKlinischesBezugsdatum",
];
pub const DEFAULT_ROWS_PER_GROUP: usize = 10;
/// Upper bound on the number of bins a uniform edge spec may generate
pub const MAX_UNIFORM_BINS: usize = 100_000;

/// Errors that can occur while loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Bin edge specification for fixed-width binning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinEdges {
    /// Explicit, strictly increasing edges
    Explicit(Vec<f64>),
    /// Evenly spaced edges from `start` up to (at least) `end`
    Uniform { start: f64, end: f64, width: f64 },
}

impl BinEdges {
    /// `count` equal-width bins spanning the category's default value range
    pub fn for_category(category: LabCategory, count: NonZeroUsize) -> Self {
        let (start, end) = category.default_value_range();
        BinEdges::Uniform {
            start,
            end,
            width: (end - start) / count.get() as f64,
        }
    }

    /// Materialize the edge list, checking it is usable for binning
    pub fn resolve(&self) -> Result<Vec<f64>, AggregateError> {
        let edges = match self {
            BinEdges::Explicit(edges) => edges.clone(),
            BinEdges::Uniform { start, end, width } => {
                if !(start.is_finite() && end.is_finite() && width.is_finite()) {
                    return Err(AggregateError::InvalidEdges(
                        "uniform edge parameters must be finite".to_string(),
                    ));
                }
                if *width <= 0.0 || end <= start {
                    return Err(AggregateError::InvalidEdges(format!(
                        "uniform edges need width > 0 and end > start (start={start}, end={end}, width={width})"
                    )));
                }
                // Tolerate rounding so an exact multiple does not gain an extra edge
                let steps = ((end - start) / width - 1e-9).ceil().max(1.0);
                if steps > MAX_UNIFORM_BINS as f64 {
                    return Err(AggregateError::InvalidEdges(format!(
                        "uniform edges would create more than {MAX_UNIFORM_BINS} bins (start={start}, end={end}, width={width})"
                    )));
                }
                let steps = steps as usize;
                (0..=steps).map(|i| start + i as f64 * width).collect()
            }
        };

        if edges.len() < 2 {
            return Err(AggregateError::InvalidEdges(format!(
                "at least two edges required, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(AggregateError::InvalidEdges(
                "edges must be finite".to_string(),
            ));
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AggregateError::InvalidEdges(
                "edges must be strictly increasing".to_string(),
            ));
        }
        Ok(edges)
    }
}

/// How filtered rows are reduced before plotting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Mean over consecutive windows of `rows_per_group` rows
    ChunkMean { rows_per_group: usize },
    /// Count per value interval
    FixedBins { edges: BinEdges },
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        AggregationPolicy::ChunkMean {
            rows_per_group: DEFAULT_ROWS_PER_GROUP,
        }
    }
}

/// Per-category filter and labeling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub category: LabCategory,
    /// Accepted LOINC codes
    pub codes: Vec<String>,
    /// Axis unit; defaults to the category's conventional unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Overrides the run-wide edges when binning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_edges: Option<BinEdges>,
}

impl CategoryConfig {
    pub fn with_defaults(category: LabCategory) -> Self {
        Self {
            category,
            codes: category
                .default_codes()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            unit: None,
            bin_edges: None,
        }
    }

    pub fn unit(&self) -> &str {
        self.unit
            .as_deref()
            .unwrap_or_else(|| self.category.default_unit())
    }

    /// Policy in effect for this category
    pub fn effective_policy(&self, run_policy: &AggregationPolicy) -> AggregationPolicy {
        match (run_policy, &self.bin_edges) {
            (AggregationPolicy::FixedBins { .. }, Some(edges)) => AggregationPolicy::FixedBins {
                edges: edges.clone(),
            },
            (policy, _) => policy.clone(),
        }
    }
}

/// Density plot rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RenderConfig {
    #[validate(range(min = 64, max = 8192))]
    pub width: u32,
    #[validate(range(min = 64, max = 8192))]
    pub height: u32,
    /// Number of points the density curve is evaluated at
    #[validate(range(min = 2, max = 100000))]
    pub grid_size: usize,
    /// Multiplier applied to the Scott's rule bandwidth
    #[validate(range(exclusive_min = 0.0))]
    pub bw_adjust: f64,
    /// TrueType font used for labels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        // 8x5 inches at 200 dpi
        Self {
            width: 1600,
            height: 1000,
            grid_size: 200,
            bw_adjust: 1.0,
            font_path: None,
        }
    }
}

/// Full pipeline run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    #[validate(custom(function = "validate_delimiter"))]
    pub delimiter: char,
    #[validate(length(min = 1))]
    pub code_column: String,
    #[validate(length(min = 1))]
    pub value_column: String,
    pub date_columns: Vec<String>,
    #[validate(custom(function = "validate_policy"))]
    pub policy: AggregationPolicy,
    #[validate(length(min = 1), custom(function = "validate_categories"))]
    pub categories: Vec<CategoryConfig>,
    #[validate(nested)]
    pub render: RenderConfig,
    /// Appended to archive entry stems, e.g. `_synth`
    pub entry_suffix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            delimiter: ',',
            code_column: DEFAULT_CODE_COLUMN.to_string(),
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
            date_columns: DEFAULT_DATE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            policy: AggregationPolicy::default(),
            categories: vec![
                CategoryConfig::with_defaults(LabCategory::Alp),
                CategoryConfig::with_defaults(LabCategory::Ldl),
            ],
            render: RenderConfig::default(),
            entry_suffix: String::new(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Switch to fixed bins, `count` equal-width bins per category
    pub fn use_bin_count(&mut self, count: NonZeroUsize) {
        for category in &mut self.categories {
            category.bin_edges = Some(BinEdges::for_category(category.category, count));
        }
        let first = self
            .categories
            .first()
            .map(|c| c.category)
            .unwrap_or(LabCategory::Alp);
        self.policy = AggregationPolicy::FixedBins {
            edges: BinEdges::for_category(first, count),
        };
    }

    /// Delimiter as the single byte the CSV reader expects
    pub fn delimiter_byte(&self) -> u8 {
        if self.delimiter.is_ascii() {
            self.delimiter as u8
        } else {
            b','
        }
    }

    /// Columns the loader must find in the input header
    pub fn required_columns(&self) -> Vec<String> {
        let mut columns = vec![self.code_column.clone(), self.value_column.clone()];
        columns.extend(self.date_columns.iter().cloned());
        columns
    }
}

fn validate_delimiter(delimiter: &char) -> Result<(), ValidationError> {
    if !delimiter.is_ascii() || delimiter.is_ascii_alphanumeric() || *delimiter == '"' {
        return Err(ValidationError::new("delimiter")
            .with_message("delimiter must be a single ASCII punctuation or whitespace byte".into()));
    }
    Ok(())
}

fn validate_policy(policy: &AggregationPolicy) -> Result<(), ValidationError> {
    match policy {
        AggregationPolicy::ChunkMean { rows_per_group } if *rows_per_group == 0 => {
            Err(ValidationError::new("rows_per_group")
                .with_message("rows_per_group must be at least 1".into()))
        }
        AggregationPolicy::ChunkMean { .. } => Ok(()),
        AggregationPolicy::FixedBins { edges } => edges
            .resolve()
            .map(|_| ())
            .map_err(|e| ValidationError::new("edges").with_message(e.to_string().into())),
    }
}

fn validate_categories(categories: &[CategoryConfig]) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for category in categories {
        if !seen.insert(category.category) {
            return Err(ValidationError::new("categories").with_message(
                format!("category {} listed more than once", category.category).into(),
            ));
        }
        if category.codes.is_empty() || category.codes.iter().any(|c| c.trim().is_empty()) {
            return Err(ValidationError::new("codes").with_message(
                format!("category {} needs non-empty codes", category.category).into(),
            ));
        }
        if let Some(edges) = &category.bin_edges {
            edges
                .resolve()
                .map_err(|e| ValidationError::new("bin_edges").with_message(e.to_string().into()))?;
        }
    }
    Ok(())
}
