//! Closed-form grain statistics curves and size-bin layouts.
//!
//! These generators are independent of crystal symmetry. Every curve is
//! evaluated at `n` bin midpoints over a fixed domain and rejects parameter
//! sets that produce a negative density.

use rand::Rng;
use rand_distr::{Distribution as _, LogNormal};
use serde::{Deserialize, Serialize};

use crate::error::{StatsError, StatsResult};

/// Number of standard deviations either side of the mean covered by a log-normal curve.
pub const LOG_NORMAL_SPAN: f64 = 5.0;
/// Upper bound of the power law domain `[0, 3]`.
pub const POWER_LAW_MAX: f64 = 3.0;

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn beta_two_two_is_normalized() {
        let data = gen_beta_plot_data(2.0, 2.0, 100).unwrap();
        assert_eq!(data.x.len(), 100);
        assert!(data.y.iter().all(|y| *y >= 0.0));
        let sum: f64 = data.y.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((data.x[0] - 0.005).abs() < 1e-15);
        // symmetric about 1/2
        assert!((data.y[10] - data.y[89]).abs() < 1e-12);
    }

    #[test]
    fn log_normal_domain() {
        let data = gen_log_normal_plot_data(1.0, 0.2, 50).unwrap();
        let (min, max) = ((1.0f64 - 1.0).exp(), (1.0f64 + 1.0).exp());
        let width = (max - min) / 50.0;
        assert!((data.x[0] - (min + width / 2.0)).abs() < 1e-12);
        assert!((data.x[49] - (max - width / 2.0)).abs() < 1e-12);
        // binned pdf integrates to roughly one over five standard deviations
        let sum: f64 = data.y.iter().sum();
        assert!((sum - 1.0).abs() < 0.02, "sum {}", sum);
    }

    #[test]
    fn power_law_values() {
        let data = gen_power_law_plot_data(2.0, 1.0, 0.5, 3).unwrap();
        assert_eq!(data.x, vec![0.5, 1.5, 2.5]);
        assert_eq!(data.y, vec![1.5, 3.5, 5.5]);
    }

    #[test]
    fn negative_power_law_is_rejected() {
        let err = gen_power_law_plot_data(-1.0, 1.0, 0.0, 10).unwrap_err();
        match err {
            StatsError::InvalidParameter { distribution, y, .. } => {
                assert_eq!(distribution, "power law");
                assert!(y < 0.0);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn number_of_bins_reference() {
        let bins = compute_number_of_bins(1.0, 1.0, 5.0, 5.0, 0.5);
        assert_eq!(bins.count, 807);
        assert!((bins.min - (-4.0f64).exp()).abs() < 1e-15);
        assert!((bins.max - 6.0f64.exp()).abs() < 1e-9);
    }

    #[test]
    fn cutoff_layout() {
        let cut = gen_cutoff(2.0, 0.1, 3.0, 2.0, 0.25, 1.5);
        let bins = compute_number_of_bins(2.0, 0.1, 3.0, 2.0, 0.25);
        assert_eq!(cut.x, [bins.min, bins.max]);
        assert_eq!(cut.y, [0.0, 1.5]);
        assert_eq!(cut.bin_sizes.len(), bins.count);
        assert!((cut.bin_sizes[2] - (bins.min + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn size_samples_fill_cutoff_bins() {
        let mut rng = StdRng::seed_from_u64(21);
        let bins = compute_number_of_bins(2.3, 0.2, 4.0, 4.0, 0.5);
        let fractions = sample_size_distribution(2.3, 0.2, 4.0, 4.0, 0.5, 5000, &mut rng).unwrap();
        assert_eq!(fractions.len(), bins.count);
        let sum: f64 = fractions.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn curve_dispatch() {
        let curve = Curve::Beta {
            alpha: 3.0,
            beta: 1.5,
        };
        assert_eq!(curve.name(), "beta");
        assert_eq!(curve.plot_data(20).unwrap(), gen_beta_plot_data(3.0, 1.5, 20).unwrap());
    }
}

/// Curve sampled at bin midpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotData {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Size-bin layout derived from log-normal parameters and cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeBins {
    pub count: usize,
    pub max: f64,
    pub min: f64,
}

/// Cutoff markers and bin edges for a size distribution plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutOff {
    pub x: [f64; 2],
    pub y: [f64; 2],
    pub bin_sizes: Vec<f64>,
}

/// A closed-form curve with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Curve {
    Beta { alpha: f64, beta: f64 },
    LogNormal { mean: f64, std_dev: f64 },
    PowerLaw { alpha: f64, k: f64, beta: f64 },
}

impl Curve {
    pub fn name(&self) -> &'static str {
        match self {
            Curve::Beta { .. } => "beta",
            Curve::LogNormal { .. } => "log_normal",
            Curve::PowerLaw { .. } => "power_law",
        }
    }

    pub fn plot_data(&self, n: usize) -> StatsResult<PlotData> {
        match *self {
            Curve::Beta { alpha, beta } => gen_beta_plot_data(alpha, beta, n),
            Curve::LogNormal { mean, std_dev } => gen_log_normal_plot_data(mean, std_dev, n),
            Curve::PowerLaw { alpha, k, beta } => gen_power_law_plot_data(alpha, k, beta, n),
        }
    }
}

fn midpoints(min: f64, max: f64, n: usize) -> impl Iterator<Item = f64> {
    let width = (max - min) / n as f64;
    (0..n).map(move |i| min + i as f64 * width + width / 2.0)
}

fn check_positive(distribution: &'static str, data: &PlotData) -> StatsResult<()> {
    match data.x.iter().zip(&data.y).find(|(_, y)| **y < 0.0) {
        Some((&x, &y)) => Err(StatsError::InvalidParameter { distribution, x, y }),
        None => Ok(()),
    }
}

/// Beta curve over `(0, 1)`, normalized so the values sum to one.
pub fn gen_beta_plot_data(alpha: f64, beta: f64, n: usize) -> StatsResult<PlotData> {
    let x: Vec<f64> = midpoints(0.0, 1.0, n).collect();
    let y: Vec<f64> = x
        .iter()
        .map(|x| x.powf(alpha - 1.0) * (1.0 - x).powf(beta - 1.0))
        .collect();
    let mut data = PlotData { x, y };
    check_positive("beta", &data)?;
    let total: f64 = data.y.iter().sum();
    data.y.iter_mut().for_each(|y| *y /= total);
    Ok(data)
}

/// Log-normal density times bin width over `exp(mean -/+ 5 std_dev)`.
pub fn gen_log_normal_plot_data(mean: f64, std_dev: f64, n: usize) -> StatsResult<PlotData> {
    let min = (mean - LOG_NORMAL_SPAN * std_dev).exp();
    let max = (mean + LOG_NORMAL_SPAN * std_dev).exp();
    let width = (max - min) / n as f64;
    let root_two_pi = (2.0 * std::f64::consts::PI).sqrt();
    let x: Vec<f64> = midpoints(min, max, n).collect();
    let y = x
        .iter()
        .map(|x| {
            let dev = x.ln() - mean;
            let pdf = (-(dev * dev) / (2.0 * std_dev * std_dev)).exp() / (x * std_dev * root_two_pi);
            pdf * width
        })
        .collect();
    let data = PlotData { x, y };
    check_positive("log normal", &data)?;
    Ok(data)
}

/// `alpha x^k + beta` over `[0, 3]`.
pub fn gen_power_law_plot_data(alpha: f64, k: f64, beta: f64, n: usize) -> StatsResult<PlotData> {
    let x: Vec<f64> = midpoints(0.0, POWER_LAW_MAX, n).collect();
    let y = x.iter().map(|x| alpha * x.powf(k) + beta).collect();
    let data = PlotData { x, y };
    check_positive("power law", &data)?;
    Ok(data)
}

pub fn compute_number_of_bins(
    mu: f64,
    sigma: f64,
    min_cutoff: f64,
    max_cutoff: f64,
    bin_step: f64,
) -> SizeBins {
    let min = (mu - min_cutoff * sigma).exp();
    let max = (mu + max_cutoff * sigma).exp();
    let count = ((max - min) / bin_step).floor() as usize + 1;
    SizeBins { count, max, min }
}

/// Cutoff markers `[min, max]` against `[0, y_max]` plus the size-bin lower edges.
pub fn gen_cutoff(
    mu: f64,
    sigma: f64,
    min_cutoff: f64,
    max_cutoff: f64,
    bin_step: f64,
    y_max: f64,
) -> CutOff {
    let bins = compute_number_of_bins(mu, sigma, min_cutoff, max_cutoff, bin_step);
    let bin_sizes = (0..bins.count)
        .map(|i| bins.min + i as f64 * bin_step)
        .collect();
    CutOff {
        x: [bins.min, bins.max],
        y: [0.0, y_max],
        bin_sizes,
    }
}

/// Draws `n` log-normal grain diameters inside the cutoffs and returns the fraction per size bin.
pub fn sample_size_distribution<R: Rng>(
    mu: f64,
    sigma: f64,
    min_cutoff: f64,
    max_cutoff: f64,
    bin_step: f64,
    n: usize,
    rng: &mut R,
) -> StatsResult<Vec<f64>> {
    if !(bin_step > 0.0) {
        return Err(StatsError::InvalidDistribution {
            distribution: "log normal",
            reason: format!("bin step must be positive, got {}", bin_step),
        });
    }
    let dist = LogNormal::new(mu, sigma).map_err(|e| StatsError::InvalidDistribution {
        distribution: "log normal",
        reason: e.to_string(),
    })?;
    let bins = compute_number_of_bins(mu, sigma, min_cutoff, max_cutoff, bin_step);
    let mut counts = vec![0.0; bins.count];
    if n == 0 {
        return Ok(counts);
    }

    let mut accepted = 0;
    while accepted < n {
        let d: f64 = dist.sample(rng);
        if d < bins.min || d > bins.max {
            continue;
        }
        let bin = ((d - bins.min) / bin_step).floor() as usize;
        counts[bin.min(bins.count - 1)] += 1.0;
        accepted += 1;
    }
    counts.iter_mut().for_each(|c| *c /= n as f64);
    Ok(counts)
}
