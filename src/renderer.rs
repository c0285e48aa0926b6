// ==============================================================================
// renderer.rs - Density Plot Rendering
// ==============================================================================
// Description: Rasterizes a KDE curve of aggregated lab values to PNG bytes
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RenderConfig;
use crate::density::{DensityCurve, GaussianKde, DEFAULT_CUT};

/// Fill colour of the density area
const CURVE_COLOR: RGBColor = RGBColor(31, 119, 180);

/// Fonts tried, in order, when no font path is configured
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Font registered with plotters for this process, if any
static LABEL_FONT: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Errors that can occur while rendering a density plot
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Draw(String),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Text placed on a density plot
#[derive(Debug, Clone, PartialEq)]
pub struct PlotLabels {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

/// Renders density plots as in-memory PNG images
#[derive(Debug, Clone)]
pub struct DensityRenderer {
    config: RenderConfig,
}

impl DensityRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render the density of `samples` (optionally frequency-weighted)
    ///
    /// Returns an empty buffer when there is nothing to plot.
    pub fn render(
        &self,
        samples: &[f64],
        weights: Option<&[f64]>,
        labels: &PlotLabels,
    ) -> Result<Vec<u8>, RenderError> {
        let kde = match GaussianKde::fit(samples, weights, self.config.bw_adjust) {
            Some(kde) => kde,
            None => {
                debug!("No samples to plot for {:?}", labels.title);
                return Ok(Vec::new());
            }
        };
        let curve = kde.curve(self.config.grid_size, DEFAULT_CUT);
        debug!(
            "KDE for {:?}: bandwidth {:.4}, {} grid points",
            labels.title,
            kde.bandwidth(),
            curve.xs.len()
        );

        let labelled = ensure_label_font(self.config.font_path.as_deref());
        if !labelled {
            warn!("No usable font found; rendering {:?} without labels", labels.title);
        }

        let (width, height) = (self.config.width, self.config.height);
        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            draw_density(&root, &curve, labels, labelled)?;
            root.present().map_err(draw_error)?;
        }

        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(&buffer, width, height, ExtendedColorType::Rgb8)?;
        Ok(png)
    }
}

fn draw_density(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    curve: &DensityCurve,
    labels: &PlotLabels,
    labelled: bool,
) -> Result<(), RenderError> {
    root.fill(&WHITE).map_err(draw_error)?;

    let (x_min, x_max) = curve.x_range();
    let y_max = curve.max_density() * 1.05;

    // Sizes are tuned for the default 1600x1000 canvas
    let (width, height) = root.dim_in_pixel();
    let scale = (width as f64 / 1600.0).min(height as f64 / 1000.0);
    let px = |base: f64| ((base * scale).round() as u32).max(1);

    let mut builder = ChartBuilder::on(root);
    builder.margin(px(40.0));
    if labelled {
        builder
            .caption(&labels.title, ("sans-serif", px(44.0)))
            .x_label_area_size(px(110.0))
            .y_label_area_size(px(140.0));
    }
    let mut chart = builder
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)
        .map_err(draw_error)?;

    if labelled {
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(labels.x_label.as_str())
            .y_desc(labels.y_label.as_str())
            .label_style(("sans-serif", px(26.0)))
            .axis_desc_style(("sans-serif", px(32.0)))
            .draw()
            .map_err(draw_error)?;
    } else {
        chart
            .plotting_area()
            .draw(&Rectangle::new([(x_min, 0.0), (x_max, y_max)], BLACK.stroke_width(2)))
            .map_err(draw_error)?;
    }

    chart
        .draw_series(
            AreaSeries::new(curve.points(), 0.0, CURVE_COLOR.mix(0.5))
                .border_style(CURVE_COLOR.stroke_width(3)),
        )
        .map_err(draw_error)?;

    Ok(())
}

fn draw_error<E>(err: DrawingAreaErrorKind<E>) -> RenderError
where
    E: std::error::Error + Send + Sync,
{
    RenderError::Draw(err.to_string())
}

/// Register a label font with plotters once per process
///
/// The first call decides the font; later calls reuse it.
fn ensure_label_font(configured: Option<&Path>) -> bool {
    LABEL_FONT
        .get_or_init(|| {
            let candidates = configured
                .map(Path::to_path_buf)
                .into_iter()
                .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));

            for path in candidates {
                let Ok(bytes) = std::fs::read(&path) else {
                    continue;
                };
                // plotters keeps registered font data for the life of the process
                let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
                if register_font("sans-serif", FontStyle::Normal, bytes).is_ok() {
                    info!("Using label font {:?}", path);
                    return Some(path);
                }
                debug!("Font {:?} could not be parsed", path);
            }
            None
        })
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn small_renderer() -> DensityRenderer {
        DensityRenderer::new(RenderConfig {
            width: 640,
            height: 400,
            ..RenderConfig::default()
        })
    }

    fn labels() -> PlotLabels {
        PlotLabels {
            title: "ALP Grouped Mean Density".to_string(),
            x_label: "Mean ALP value (U/L, per 10 rows)".to_string(),
            y_label: "Density".to_string(),
        }
    }

    #[test]
    fn test_render_png() {
        let png = small_renderer()
            .render(&[80.0, 95.0, 102.0, 130.0], None, &labels())
            .unwrap();
        assert!(png.len() > PNG_MAGIC.len());
        assert_eq!(png[..8], PNG_MAGIC);
    }

    #[test]
    fn test_render_empty_is_zero_bytes() {
        let png = small_renderer().render(&[], None, &labels()).unwrap();
        assert!(png.is_empty());
    }

    #[test]
    fn test_render_weighted_single_bin() {
        let png = small_renderer()
            .render(&[5.0], Some(&[12.0]), &labels())
            .unwrap();
        assert_eq!(png[..8], PNG_MAGIC);
    }

    #[test]
    fn test_render_deterministic() {
        let renderer = small_renderer();
        let a = renderer.render(&[1.0, 2.0, 2.5, 7.0], None, &labels()).unwrap();
        let b = renderer.render(&[1.0, 2.0, 2.5, 7.0], None, &labels()).unwrap();
        assert_eq!(a, b);
    }
}
