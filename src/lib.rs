// ==============================================================================
// lib.rs - Lab Density Library
// ==============================================================================
// Description: Library interface for lab value density reporting modules
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod models;
pub mod config;
pub mod loader;
pub mod filter;
pub mod aggregator;
pub mod density;
pub mod renderer;
pub mod packager;
pub mod pipeline;
pub mod synth;

pub use config::{AggregationPolicy, BinEdges, CategoryConfig, PipelineConfig, RenderConfig};
pub use pipeline::{EmptyResultWarning, LabDensityPipeline, PipelineError, RunSummary};
