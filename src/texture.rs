//! ODF and MDF builders.
//!
//! Both builders are generic over [`SymmetryOps`], which supplies the bin
//! grid and the orientation-space mapping for one crystal symmetry.
//!
//! - [`build_odf`] spreads weighted texture components over the ODF grid and
//!   fills untouched bins with the remaining mass.
//! - [`build_mdf`] places explicit misorientation components and completes
//!   the density by rejection sampling pairs of orientations from an ODF.
//! - [`build_random_odf`] bins uniformly random orientations.

use itertools::iproduct;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bins::{BinDims, CumulativeDensity};
use crate::error::{StatsError, StatsResult};
use crate::orientation::{AxisAngle, Euler};
use crate::symmetry::SymmetryOps;

/// Integer scale on which MDF counts are accumulated.
pub const MDF_SCALE: i64 = 10000;
/// Tolerance on the sum of a density passed to a sampler before a warning is logged.
pub const DENSITY_SUM_TOLERANCE: f64 = 1e-3;
/// Upper bound on draws per accepted MDF sample before sampling gives up.
pub const MAX_REJECTIONS_PER_SAMPLE: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::{CubicOps, HexagonalOps, LaueClass, OrthoRhombicOps};
    use nalgebra::Vector3;
    use rand::{rngs::StdRng, SeedableRng};

    fn origin(weight: f64, sigma: u32) -> TextureComponent {
        TextureComponent::new(Euler::new(0.0, 0.0, 0.0), weight, sigma)
    }

    #[test]
    fn sigma_is_truncated() {
        let c = TextureComponent::from_raw(Euler::new(0.1, 0.2, 0.3), 1.0, 2.9);
        assert_eq!(c.sigma, 2);
        let c = TextureComponent::from_raw(Euler::new(0.1, 0.2, 0.3), 1.0, -1.0);
        assert_eq!(c.sigma, 0);
    }

    #[test]
    fn sigma_zero_hits_one_bin() {
        let dims = CubicOps.odf_dims();
        let mut odf = vec![0.0; dims.len()];
        spread(&mut odf, &dims, [4, 5, 6], 2.5, 0);
        let hit: Vec<_> = odf.iter().enumerate().filter(|(_, v)| **v != 0.0).collect();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0], (dims.flatten([4, 5, 6]), &2.5));
    }

    #[test]
    fn spreading_wraps_each_axis() {
        let dims = CubicOps.odf_dims();
        let mut odf = vec![0.0; dims.len()];
        spread(&mut odf, &dims, [0, 0, 0], 1.0, 2);
        // one step away at sigma 2 carries 1 - (1/2)^2
        assert!((odf[dims.flatten([17, 0, 0])] - 0.75).abs() < 1e-12);
        assert!((odf[dims.flatten([0, 17, 0])] - 0.75).abs() < 1e-12);
        assert!((odf[dims.flatten([0, 0, 17])] - 0.75).abs() < 1e-12);
        assert_eq!(odf[dims.flatten([0, 0, 0])], 1.0);
        // offsets at distance sigma carry zero weight
        assert_eq!(odf[dims.flatten([16, 0, 0])], 0.0);
    }

    #[test]
    fn sigma_one_visits_the_wrapped_neighbour_with_zero_weight() {
        let dims = CubicOps.odf_dims();
        let mut odf = vec![0.0; dims.len()];
        spread(&mut odf, &dims, [0, 0, 0], 1.0, 1);
        assert_eq!(odf.iter().sum::<f64>(), 1.0);
        assert_eq!(odf[dims.flatten([17, 0, 0])], 0.0);
    }

    #[test]
    fn hexagonal_third_axis_wraps_at_twelve() {
        let dims = HexagonalOps.odf_dims();
        let mut odf = vec![0.0; dims.len()];
        spread(&mut odf, &dims, [0, 0, 0], 1.0, 2);
        assert!((odf[dims.flatten([0, 0, 11])] - 0.75).abs() < 1e-12);
        assert!((odf[dims.flatten([35, 0, 0])] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn single_cubic_component() {
        let data = build_odf(&[origin(1.0, 0)], &CubicOps, false).unwrap();
        assert_eq!(data.odf.len(), 5832);
        assert_eq!(data.total_weight, 1.0);
        let bin = CubicOps.euler_to_odf_bin(&Euler::new(0.0, 0.0, 0.0));
        assert_eq!(data.odf[bin], 1.0);
        for (i, v) in data.odf.iter().enumerate() {
            if i != bin {
                assert!((v - 1.0).abs() < 1e-12, "bin {} = {}", i, v);
            }
        }
        let sum: f64 = data.odf.iter().sum();
        assert!((sum - 5832.0).abs() < 1e-9, "sum {}", sum);
    }

    #[test]
    fn normalization_divides_by_bin_count() {
        let components = [
            TextureComponent::new(Euler::new(0.5, 0.4, 0.3), 300.0, 3),
            TextureComponent::new(Euler::new(1.5, 0.9, 0.1), 120.0, 1),
        ];
        for class in [LaueClass::Cubic, LaueClass::Hexagonal, LaueClass::Orthorhombic] {
            let ops = class.ops();
            let raw = build_odf(&components, ops, false).unwrap();
            let normalized = build_odf(&components, ops, true).unwrap();
            let n = ops.odf_size() as f64;
            let raw_sum: f64 = raw.odf.iter().sum();
            let norm_sum: f64 = normalized.odf.iter().sum();
            assert!((norm_sum * n - raw_sum).abs() < 1e-6 * raw_sum);
            assert!(normalized.odf.iter().all(|v| *v >= 0.0));
            assert_eq!(normalized.total_weight, 420.0);
        }
    }

    #[test]
    fn overweight_components_leave_zero_bins_at_zero() {
        let components = [origin(10000.0, 0)];
        let data = build_odf(&components, &CubicOps, false).unwrap();
        assert!(data.odf.iter().all(|v| *v >= 0.0));
        assert_eq!(data.odf.iter().filter(|v| **v > 0.0).count(), 1);
    }

    #[test]
    fn empty_components_give_uniform_density() {
        let data = build_odf(&[], &OrthoRhombicOps, true).unwrap();
        let expected = 1.0 / 46656.0;
        assert!(data.odf.iter().all(|v| (v - expected).abs() < 1e-15));
        assert_eq!(data.total_weight, 0.0);
    }

    #[test]
    fn negative_weight_is_rejected() {
        let err = build_odf(&[origin(-1.0, 0)], &CubicOps, false).unwrap_err();
        assert!(matches!(err, StatsError::InvalidComponent { index: 0, .. }));
    }

    #[test]
    fn mdf_placement_survives_sampling() {
        let mut rng = StdRng::seed_from_u64(42);
        let odf = build_odf(&[], &CubicOps, true).unwrap().odf;
        let aa = AxisAngle::new(45f64.to_radians(), Vector3::new(1.0, 1.0, 0.0));
        let component = MisorientationComponent::new(aa, 583.2);
        let mdf = build_mdf(&odf, &[component], &CubicOps, &mut rng).unwrap();
        assert_eq!(mdf.len(), 5832);
        let bin = CubicOps.misorientation_bin(&aa);
        assert!((mdf[bin] - 0.1).abs() < 1e-12, "mdf[bin] = {}", mdf[bin]);
        assert!(mdf.iter().all(|v| *v >= 0.0));
        let sum: f64 = mdf.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "sum {}", sum);
    }

    #[test]
    fn mdf_rejects_wrong_odf_length() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = build_mdf(&[1.0; 10], &[], &HexagonalOps, &mut rng).unwrap_err();
        assert!(matches!(err, StatsError::SizeMismatch { expected: 15552, got: 10, .. }));
    }

    #[test]
    fn random_odf_sums_to_one() {
        let mut rng = StdRng::seed_from_u64(8);
        let odf = build_random_odf(&CubicOps, 20000, &mut rng);
        let sum: f64 = odf.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(odf.iter().filter(|v| **v > 0.0).count() > 1000);
    }
}

/// A weighted peak in orientation space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureComponent {
    pub euler: Euler,
    pub weight: f64,
    /// Spread radius in bins.
    pub sigma: u32,
}

impl TextureComponent {
    pub fn new(euler: Euler, weight: f64, sigma: u32) -> Self {
        Self {
            euler,
            weight,
            sigma,
        }
    }

    /// Builds a component from a real-valued spread, truncating it toward zero.
    pub fn from_raw(euler: Euler, weight: f64, sigma: f64) -> Self {
        Self::new(euler, weight, sigma.max(0.0).trunc() as u32)
    }
}

/// A weighted misorientation placed directly into the MDF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MisorientationComponent {
    pub axis_angle: AxisAngle,
    pub weight: f64,
}

impl MisorientationComponent {
    pub fn new(axis_angle: AxisAngle, weight: f64) -> Self {
        Self { axis_angle, weight }
    }
}

/// Dense ODF together with the summed component weight.
#[derive(Debug, Clone, PartialEq)]
pub struct OdfData {
    pub odf: Vec<f64>,
    pub total_weight: f64,
}

fn check_weight(index: usize, weight: f64) -> StatsResult<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(StatsError::InvalidComponent {
            index,
            reason: format!("weight must be finite and non-negative, got {}", weight),
        });
    }
    Ok(())
}

/// Adds one component centred on `coord` into `odf`.
pub(crate) fn spread(odf: &mut [f64], dims: &BinDims, coord: [usize; 3], weight: f64, sigma: u32) {
    if sigma == 0 {
        odf[dims.flatten(coord)] += weight;
        return;
    }
    let s = sigma as i64;
    let sigma = sigma as f64;
    for (j, k, l) in iproduct!(-s..=s, -s..=s, -s..=s) {
        let dist = ((j * j + k * k + l * l) as f64).sqrt();
        if dist > sigma {
            continue;
        }
        let fraction = 1.0 - (dist / sigma) * (dist / sigma);
        odf[dims.wrap(coord, [j, k, l])] += weight * fraction;
    }
}

/// Builds a dense ODF from a set of texture components.
///
/// Bins left at exactly zero after spreading share the remaining mass
/// `N - sum(odf)`. With `normalize` every bin is divided by `N`.
pub fn build_odf(
    components: &[TextureComponent],
    ops: &dyn SymmetryOps,
    normalize: bool,
) -> StatsResult<OdfData> {
    for (index, c) in components.iter().enumerate() {
        check_weight(index, c.weight)?;
    }
    if components.is_empty() {
        warn!("no texture components given, ODF will be uniform");
    }

    let dims = ops.odf_dims();
    let n = dims.len();
    info!(
        symmetry = ops.name(),
        components = components.len(),
        bins = n,
        "building ODF"
    );

    let mut odf = components
        .par_iter()
        .fold(
            || vec![0.0; n],
            |mut acc, c| {
                let bin = ops.euler_to_odf_bin(&c.euler);
                debug!(bin, weight = c.weight, sigma = c.sigma, "spreading component");
                spread(&mut acc, &dims, dims.unflatten(bin), c.weight, c.sigma);
                acc
            },
        )
        .reduce(
            || vec![0.0; n],
            |mut acc, item| {
                for (a, i) in acc.iter_mut().zip(item.iter()) {
                    *a += i;
                }
                acc
            },
        );

    let assigned: f64 = odf.iter().sum();
    let zero_count = odf.iter().filter(|v| **v == 0.0).count();
    let remaining = n as f64 - assigned;
    if zero_count > 0 {
        if remaining < 0.0 {
            warn!(
                assigned,
                bins = n,
                "component weight exceeds the bin count, unassigned bins stay empty"
            );
        } else {
            let fill = remaining / zero_count as f64;
            odf.iter_mut().filter(|v| **v == 0.0).for_each(|v| *v = fill);
        }
    } else if (remaining / n as f64).abs() > DENSITY_SUM_TOLERANCE {
        warn!(assigned, bins = n, "every bin received weight, ODF sum is left uncorrected");
    }

    if normalize {
        let n = n as f64;
        odf.iter_mut().for_each(|v| *v /= n);
    }

    let total_weight = components.iter().map(|c| c.weight).sum();
    Ok(OdfData { odf, total_weight })
}

/// Builds an ODF from `num_samples` uniformly random orientations, normalized to sum to one.
pub fn build_random_odf<R: Rng>(ops: &dyn SymmetryOps, num_samples: usize, rng: &mut R) -> Vec<f64> {
    let n = ops.odf_size();
    if num_samples == 0 {
        warn!("no random samples requested, ODF will be uniform");
        return vec![1.0 / n as f64; n];
    }
    let mut odf = vec![0.0; n];
    for _ in 0..num_samples {
        let euler = Euler::random_uniform(rng);
        odf[ops.euler_to_odf_bin(&euler)] += 1.0;
    }
    let samples = num_samples as f64;
    odf.iter_mut().for_each(|v| *v /= samples);
    odf
}

/// Builds a dense MDF from an ODF and explicit misorientation components.
///
/// Components are placed first as negative counts on a scale of
/// [`MDF_SCALE`]. The rest of the scale is filled by drawing orientation
/// pairs from `odf`. Draws that land on a placed bin are rejected.
pub fn build_mdf<R: Rng>(
    odf: &[f64],
    components: &[MisorientationComponent],
    ops: &dyn SymmetryOps,
    rng: &mut R,
) -> StatsResult<Vec<f64>> {
    if odf.len() != ops.odf_size() {
        return Err(StatsError::SizeMismatch {
            symmetry: ops.name(),
            expected: ops.odf_size(),
            got: odf.len(),
        });
    }
    for (index, c) in components.iter().enumerate() {
        check_weight(index, c.weight)?;
    }

    let m = ops.mdf_size();
    let mut counts = vec![0i64; m];
    let mut remaining = MDF_SCALE;
    for c in components {
        let bin = ops.misorientation_bin(&c.axis_angle);
        let placed = -(c.weight / m as f64 * MDF_SCALE as f64).round() as i64;
        counts[bin] = placed;
        remaining += placed;
        debug!(bin, placed, "placed misorientation component");
    }
    let remaining = remaining.max(0) as usize;
    info!(
        symmetry = ops.name(),
        components = components.len(),
        samples = remaining,
        "building MDF"
    );

    let cdf = CumulativeDensity::new(odf);
    if (cdf.total() - 1.0).abs() > DENSITY_SUM_TOLERANCE {
        warn!(sum = cdf.total(), "ODF does not sum to one, sampling uses it as is");
    }

    let max_draws = remaining.saturating_mul(MAX_REJECTIONS_PER_SAMPLE);
    let mut accepted = 0;
    let mut draws = 0;
    while accepted < remaining {
        if draws >= max_draws {
            warn!(accepted, remaining, "rejection sampling exhausted, MDF is incomplete");
            break;
        }
        draws += 1;
        let r1: f64 = rng.random();
        let r2: f64 = rng.random();
        let e1 = ops.sample_euler_in_bin(cdf.choose(r1), &mut *rng);
        let e2 = ops.sample_euler_in_bin(cdf.choose(r2), &mut *rng);
        let q1 = ops.fz_quat(&e1.to_quat());
        let q2 = ops.fz_quat(&e2.to_quat());
        let miso = ops.misorientation(&q1, &q2);
        let bin = ops.misorientation_bin(&miso);
        if counts[bin] >= 0 {
            counts[bin] += 1;
            accepted += 1;
        }
    }
    debug!(accepted, rejected = draws - accepted, "MDF sampling finished");

    Ok(counts
        .into_iter()
        .map(|c| c.abs() as f64 / MDF_SCALE as f64)
        .collect())
}
