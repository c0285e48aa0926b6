// ==============================================================================
// pipeline.rs - Lab Density Pipeline
// ==============================================================================
// Description: Load -> filter -> aggregate -> render -> package, once per run
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

use crate::aggregator::{self, AggregateError};
use crate::config::{AggregationPolicy, CategoryConfig, PipelineConfig};
use crate::filter::{FilterError, LabFilter};
use crate::loader::{LoadError, ObservationLoader};
use crate::models::{LabCategory, ObservationTable};
use crate::packager::{ArchiveEntry, ArchivePackager, CategoryArtifacts, PackageError};
use crate::renderer::{DensityRenderer, PlotLabels, RenderError};

/// Fatal pipeline errors; no archive is written when one occurs
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationErrors),

    #[error("Failed to load input: {0}")]
    Load(#[from] LoadError),

    #[error("Failed to filter observations: {0}")]
    Filter(#[from] FilterError),

    #[error("Aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Failed to write archive: {0}")]
    Package(#[from] PackageError),
}

/// Non-fatal condition: an artifact is empty but the run continues
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmptyResultWarning {
    /// No row passed the code/value filter
    NoMatchingRows { category: LabCategory },
    /// Rows matched but every value fell outside the bin edges
    NoPopulatedBins {
        category: LabCategory,
        filtered_rows: usize,
    },
    /// Empty aggregate, so the density image entry is zero bytes
    PlotSkipped { category: LabCategory },
}

impl fmt::Display for EmptyResultWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyResultWarning::NoMatchingRows { category } => {
                write!(f, "{category}: no rows matched the accepted codes with a positive value")
            }
            EmptyResultWarning::NoPopulatedBins {
                category,
                filtered_rows,
            } => write!(
                f,
                "{category}: none of {filtered_rows} filtered values fell inside the bin edges"
            ),
            EmptyResultWarning::PlotSkipped { category } => {
                write!(f, "{category}: nothing to plot, density image left empty")
            }
        }
    }
}

/// Per-category counts for the run summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: LabCategory,
    pub filtered_rows: usize,
    pub records: usize,
    pub image_bytes: usize,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub rows_loaded: usize,
    pub categories: Vec<CategorySummary>,
    pub warnings: Vec<EmptyResultWarning>,
    pub manifest: Vec<ArchiveEntry>,
}

impl RunSummary {
    /// Pretty-printed JSON report of the run
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Single-pass batch pipeline over one input file
pub struct LabDensityPipeline {
    config: PipelineConfig,
    renderer: DensityRenderer,
}

impl LabDensityPipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let renderer = DensityRenderer::new(config.render.clone());
        Ok(Self { config, renderer })
    }

    /// Main processing pipeline
    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        info!("Starting lab density run: {:?}", self.config.input_path);
        info!("Aggregation policy: {:?}", self.config.policy);

        // 1. Load the observation table
        let table = ObservationLoader::new()
            .with_delimiter(self.config.delimiter_byte())
            .with_date_columns(self.config.date_columns.clone())
            .with_required_columns(self.config.required_columns())
            .load(&self.config.input_path)?;

        // 2. Filter, aggregate and render each category
        let mut artifacts = Vec::with_capacity(self.config.categories.len());
        let mut categories = Vec::with_capacity(self.config.categories.len());
        let mut warnings = Vec::new();

        for category in &self.config.categories {
            let (artifact, summary) = self.process_category(&table, category, &mut warnings)?;
            artifacts.push(artifact);
            categories.push(summary);
        }

        // 3. Package everything into one archive
        let packager = ArchivePackager::new(&self.config.output_path, &self.config.entry_suffix);
        let manifest = packager.write(&artifacts)?;
        for entry in &manifest {
            info!("  {} ({} bytes, sha256 {})", entry.name, entry.size, entry.sha256);
        }

        info!(
            "Run complete: {} entries written to {:?} ({} warnings)",
            manifest.len(),
            self.config.output_path,
            warnings.len()
        );

        Ok(RunSummary {
            output_path: self.config.output_path.clone(),
            rows_loaded: table.len(),
            categories,
            warnings,
            manifest,
        })
    }

    /// Filter, aggregate and render one category
    pub fn process_category(
        &self,
        table: &ObservationTable,
        category: &CategoryConfig,
        warnings: &mut Vec<EmptyResultWarning>,
    ) -> Result<(CategoryArtifacts, CategorySummary), PipelineError> {
        let lab = category.category;
        let filter = LabFilter::new(
            self.config.code_column.as_str(),
            self.config.value_column.as_str(),
            category.codes.iter().cloned(),
        );

        let filtered = filter.apply(table)?;
        let values = filter.values(&filtered)?;
        info!("{}: {} rows after filtering", lab, values.len());

        if values.is_empty() {
            self.record_warning(warnings, EmptyResultWarning::NoMatchingRows { category: lab });
        }

        let policy = category.effective_policy(&self.config.policy);
        let aggregate = aggregator::aggregate(&values, &policy)?;
        info!("{}: {} aggregate records", lab, aggregate.len());

        if aggregate.is_empty() && !values.is_empty() {
            self.record_warning(
                warnings,
                EmptyResultWarning::NoPopulatedBins {
                    category: lab,
                    filtered_rows: values.len(),
                },
            );
        }

        let csv = aggregator::to_csv(&aggregate)?;

        let (samples, weights) = aggregate.density_input();
        let labels = plot_labels(category, &policy);
        let png = self.renderer.render(&samples, weights.as_deref(), &labels)?;
        if png.is_empty() {
            self.record_warning(warnings, EmptyResultWarning::PlotSkipped { category: lab });
        }

        let summary = CategorySummary {
            category: lab,
            filtered_rows: values.len(),
            records: aggregate.len(),
            image_bytes: png.len(),
        };
        Ok((
            CategoryArtifacts {
                category: lab,
                csv,
                png,
            },
            summary,
        ))
    }

    fn record_warning(&self, warnings: &mut Vec<EmptyResultWarning>, warning: EmptyResultWarning) {
        warn!("{}", warning);
        warnings.push(warning);
    }
}

/// Title and axis labels for a category under a given policy
pub fn plot_labels(category: &CategoryConfig, policy: &AggregationPolicy) -> PlotLabels {
    let lab = category.category.label();
    let unit = category.unit();
    let (title, x_label) = match policy {
        AggregationPolicy::ChunkMean { rows_per_group } => (
            format!("{lab} Grouped Mean Density"),
            format!("Mean {lab} value ({unit}, per {rows_per_group} rows)"),
        ),
        AggregationPolicy::FixedBins { .. } => (
            format!("{lab} Binned Density"),
            format!("{lab} bin midpoint ({unit})"),
        ),
    };
    PlotLabels {
        title,
        x_label,
        y_label: "Density".to_string(),
    }
}
