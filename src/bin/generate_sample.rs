// ==============================================================================
// generate_sample.rs - Synthetic Dataset Generator
// ==============================================================================
// Description: Writes a reproducible synthetic lab observation CSV
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lab_density::config::DEFAULT_INPUT_PATH;
use lab_density::synth::SyntheticDataset;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate a synthetic lab observation CSV")]
struct Args {
    /// Number of observation rows
    #[arg(short, long, default_value_t = 1000)]
    rows: usize,

    /// RNG seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Output CSV path
    #[arg(short, long, default_value = DEFAULT_INPUT_PATH)]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lab_density=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let written = SyntheticDataset::new(args.rows, args.seed)
        .write_csv(&args.output)
        .with_context(|| format!("Failed to write {:?}", args.output))?;

    println!("Wrote {written} observations to {}", args.output.display());
    Ok(())
}
