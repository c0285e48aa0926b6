// ==============================================================================
// main.rs - Lab Density Entry Point
// ==============================================================================
// Description: Runs the lab density pipeline once and writes the result archive
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lab_density::config::AggregationPolicy;
use lab_density::{LabDensityPipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "LAB_DENSITY_CONFIG")]
    config: Option<PathBuf>,

    /// Input observation CSV (overrides config)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output ZIP archive (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use chunked means with this many rows per group
    #[arg(long, conflicts_with = "bins")]
    rows_per_group: Option<usize>,

    /// Use this many equal-width bins over each category's value range
    #[arg(long)]
    bins: Option<NonZeroUsize>,

    /// Suffix appended to archive entry names (e.g. "_synth")
    #[arg(long)]
    entry_suffix: Option<String>,

    /// TrueType font for plot labels
    #[arg(long)]
    font: Option<PathBuf>,

    /// Write a JSON run summary (counts, warnings, archive manifest) here
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lab_density=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => PipelineConfig::default(),
    };

    if let Some(input) = args.input {
        config.input_path = input;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }
    if let Some(rows_per_group) = args.rows_per_group {
        config.policy = AggregationPolicy::ChunkMean { rows_per_group };
    }
    if let Some(bins) = args.bins {
        config.use_bin_count(bins);
    }
    if let Some(suffix) = args.entry_suffix {
        config.entry_suffix = suffix;
    }
    if args.font.is_some() {
        config.render.font_path = args.font;
    }

    info!("Lab density pipeline starting...");

    let pipeline = LabDensityPipeline::new(config).context("Invalid pipeline configuration")?;
    let summary = pipeline.run().context("Lab density run failed")?;

    for category in &summary.categories {
        info!(
            "{}: {} filtered rows, {} records, {} image bytes",
            category.category, category.filtered_rows, category.records, category.image_bytes
        );
    }
    if !summary.warnings.is_empty() {
        warn!("Run finished with {} warning(s)", summary.warnings.len());
    }
    info!("Archive written: {:?}", summary.output_path);

    if let Some(path) = &args.summary {
        let json = summary.to_json().context("Failed to serialize run summary")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write summary {:?}", path))?;
        info!("Run summary written: {:?}", path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bins_must_be_positive() {
        assert!(Args::try_parse_from(["lab-density", "--bins", "0"]).is_err());

        let args = Args::try_parse_from(["lab-density", "--bins", "20"]).unwrap();
        assert_eq!(args.bins.map(NonZeroUsize::get), Some(20));
    }

    #[test]
    fn test_rows_per_group_conflicts_with_bins() {
        let result =
            Args::try_parse_from(["lab-density", "--bins", "5", "--rows-per-group", "10"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_summary_path() {
        let args = Args::try_parse_from(["lab-density", "--summary", "run.json"]).unwrap();
        assert_eq!(args.summary, Some(PathBuf::from("run.json")));
        assert!(args.bins.is_none());
    }
}
