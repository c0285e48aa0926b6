// ==============================================================================
// density.rs - Gaussian Kernel Density Estimation
// ==============================================================================
// Description: Weighted Gaussian KDE with Scott's rule bandwidth
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Weights are frequency weights: weight k == sample repeated k times.
// Bandwidth: h = bw_adjust * sd * n^(-1/5), sd with (n - 1) denominator.
// ==============================================================================

use std::f64::consts::PI;

/// Grid extends this many bandwidths past the data on each side
pub const DEFAULT_CUT: f64 = 3.0;

/// Gaussian KDE over a fixed sample
#[derive(Debug, Clone)]
pub struct GaussianKde {
    samples: Vec<f64>,
    /// Normalized to sum to 1
    weights: Vec<f64>,
    bandwidth: f64,
}

/// Density evaluated over an evenly spaced grid
#[derive(Debug, Clone, PartialEq)]
pub struct DensityCurve {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl DensityCurve {
    pub fn max_density(&self) -> f64 {
        self.ys.iter().copied().fold(0.0, f64::max)
    }

    pub fn x_range(&self) -> (f64, f64) {
        (
            self.xs.first().copied().unwrap_or(0.0),
            self.xs.last().copied().unwrap_or(0.0),
        )
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }
}

impl GaussianKde {
    /// Fit a KDE; `None` when there is nothing to estimate
    ///
    /// Non-finite samples and samples with non-positive or non-finite weight
    /// are ignored. If no sample remains the result is `None`.
    pub fn fit(samples: &[f64], weights: Option<&[f64]>, bw_adjust: f64) -> Option<Self> {
        let pairs: Vec<(f64, f64)> = match weights {
            Some(weights) => samples
                .iter()
                .copied()
                .zip(weights.iter().copied())
                .filter(|(x, w)| x.is_finite() && w.is_finite() && *w > 0.0)
                .collect(),
            None => samples
                .iter()
                .copied()
                .filter(|x| x.is_finite())
                .map(|x| (x, 1.0))
                .collect(),
        };
        if pairs.is_empty() {
            return None;
        }

        let n: f64 = pairs.iter().map(|(_, w)| w).sum();
        let mean = pairs.iter().map(|(x, w)| x * w).sum::<f64>() / n;
        let sd = if n > 1.0 {
            let ss: f64 = pairs.iter().map(|(x, w)| w * (x - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        let bandwidth = if sd > 0.0 {
            bw_adjust * sd * n.powf(-0.2)
        } else {
            // Degenerate spread: scale with the magnitude of the data
            bw_adjust * (mean.abs() * 0.1).max(1.0)
        };

        let (samples, weights): (Vec<f64>, Vec<f64>) =
            pairs.into_iter().map(|(x, w)| (x, w / n)).unzip();

        Some(Self {
            samples,
            weights,
            bandwidth,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Density at `x`
    pub fn evaluate(&self, x: f64) -> f64 {
        let norm = 1.0 / (self.bandwidth * (2.0 * PI).sqrt());
        self.samples
            .iter()
            .zip(&self.weights)
            .map(|(xi, wi)| {
                let z = (x - xi) / self.bandwidth;
                wi * (-0.5 * z * z).exp()
            })
            .sum::<f64>()
            * norm
    }

    /// Evaluate over `grid_size` points spanning the data +/- `cut` bandwidths
    pub fn curve(&self, grid_size: usize, cut: f64) -> DensityCurve {
        let min = self.samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lo = min - cut * self.bandwidth;
        let hi = max + cut * self.bandwidth;

        let grid_size = grid_size.max(2);
        let step = (hi - lo) / (grid_size - 1) as f64;
        let xs: Vec<f64> = (0..grid_size).map(|i| lo + i as f64 * step).collect();
        let ys = xs.iter().map(|&x| self.evaluate(x)).collect();

        DensityCurve { xs, ys }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integrate(curve: &DensityCurve) -> f64 {
        curve
            .xs
            .windows(2)
            .zip(curve.ys.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
            .sum()
    }

    #[test]
    fn test_empty_sample() {
        assert!(GaussianKde::fit(&[], None, 1.0).is_none());
        assert!(GaussianKde::fit(&[1.0, 2.0], Some(&[0.0, 0.0]), 1.0).is_none());
        assert!(GaussianKde::fit(&[f64::NAN], None, 1.0).is_none());
    }

    #[test]
    fn test_scott_bandwidth() {
        // mean 3, sample sd sqrt(2.5)
        let kde = GaussianKde::fit(&[1.0, 2.0, 3.0, 4.0, 5.0], None, 1.0).unwrap();
        let expected = 2.5f64.sqrt() * 5f64.powf(-0.2);
        assert!((kde.bandwidth() - expected).abs() < 1e-12);

        let adjusted = GaussianKde::fit(&[1.0, 2.0, 3.0, 4.0, 5.0], None, 0.5).unwrap();
        assert!((adjusted.bandwidth() - expected * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_weights_match_repetition() {
        let repeated = GaussianKde::fit(&[1.0, 1.0, 1.0, 4.0, 6.0, 6.0], None, 1.0).unwrap();
        let weighted = GaussianKde::fit(&[1.0, 4.0, 6.0], Some(&[3.0, 1.0, 2.0]), 1.0).unwrap();

        assert!((repeated.bandwidth() - weighted.bandwidth()).abs() < 1e-12);
        for x in [-2.0, 0.0, 1.5, 3.3, 6.0, 9.0] {
            assert!((repeated.evaluate(x) - weighted.evaluate(x)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_degenerate_spread_fallback() {
        let single = GaussianKde::fit(&[42.0], None, 1.0).unwrap();
        assert!((single.bandwidth() - 4.2).abs() < 1e-12);

        let constant = GaussianKde::fit(&[0.5, 0.5, 0.5], None, 1.0).unwrap();
        assert_eq!(constant.bandwidth(), 1.0);
    }

    #[test]
    fn test_curve_integrates_to_one() {
        let kde = GaussianKde::fit(&[10.0, 12.0, 15.0, 21.0, 22.0, 30.0], None, 1.0).unwrap();
        let curve = kde.curve(400, DEFAULT_CUT);

        assert_eq!(curve.xs.len(), 400);
        let (lo, hi) = curve.x_range();
        assert!((lo - (10.0 - 3.0 * kde.bandwidth())).abs() < 1e-9);
        assert!((hi - (30.0 + 3.0 * kde.bandwidth())).abs() < 1e-9);
        assert!((integrate(&curve) - 1.0).abs() < 0.01);
        assert!(curve.ys.iter().all(|y| *y >= 0.0));
        assert!(curve.max_density() > 0.0);
    }

    #[test]
    fn test_curve_is_deterministic() {
        let a = GaussianKde::fit(&[3.0, 1.0, 2.0], None, 1.0).unwrap().curve(200, DEFAULT_CUT);
        let b = GaussianKde::fit(&[3.0, 1.0, 2.0], None, 1.0).unwrap().curve(200, DEFAULT_CUT);
        assert_eq!(a, b);
    }
}
