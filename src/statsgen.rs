//! Monte-Carlo sampling of ODF and MDF densities into plot data.
//!
//! Pole figures are built by drawing orientations from an ODF, rotating
//! each direction of a crystal family into the sample frame and projecting
//! it onto the upper hemisphere. Misorientation histograms are built by
//! drawing misorientations from an MDF and binning their angles in 5 degree
//! steps.

use nalgebra::Vector3;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::bins::CumulativeDensity;
use crate::error::{StatsError, StatsResult};
use crate::orientation::rotation_matrix;
use crate::symmetry::{OrthoRhombicOps, SymmetryOps};
use crate::texture::DENSITY_SUM_TOLERANCE;

/// Width of a misorientation histogram bin in degrees.
pub const HISTOGRAM_BIN_WIDTH: f64 = 5.0;


/// Scatter points of one pole figure, ordered draw by draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoleFigure {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MisorientationHistogram {
    /// Bin centres in degrees.
    pub bin_centers: Vec<f64>,
    /// Fraction of draws per bin.
    pub counts: Vec<f64>,
}

fn check_density(density: &[f64], expected: usize, symmetry: &'static str) -> StatsResult<CumulativeDensity> {
    if density.len() != expected {
        return Err(StatsError::SizeMismatch {
            symmetry,
            expected,
            got: density.len(),
        });
    }
    let cdf = CumulativeDensity::new(density);
    if (cdf.total() - 1.0).abs() > DENSITY_SUM_TOLERANCE {
        warn!(sum = cdf.total(), "density does not sum to one, sampling uses it as is");
    }
    Ok(cdf)
}

/// Projects a unit direction onto the upper hemisphere plot plane.
pub fn project(v: &Vector3<f64>) -> (f64, f64) {
    let v = if v.z < 0.0 { -v } else { *v };
    let t = v.z / (v.z + 1.0);
    (v.y - v.y * t, v.x - v.x * t)
}

/// Samples `num_points` orientations from `odf` into one pole figure per crystal direction family.
pub fn sample_pole_figures<R: Rng>(
    odf: &[f64],
    ops: &dyn SymmetryOps,
    num_points: usize,
    rng: &mut R,
) -> StatsResult<Vec<PoleFigure>> {
    let cdf = check_density(odf, ops.odf_size(), ops.name())?;
    let families = ops.pole_families();
    let mut figures: Vec<PoleFigure> = families
        .iter()
        .map(|f| PoleFigure {
            label: f.label.to_string(),
            points: Vec::with_capacity(num_points * f.directions.len()),
        })
        .collect();

    for _ in 0..num_points {
        let r: f64 = rng.random();
        let euler = ops.sample_euler_in_bin(cdf.choose(r), &mut *rng);
        let g = rotation_matrix(&ops.fz_quat(&euler.to_quat()));
        for (figure, family) in figures.iter_mut().zip(families) {
            for &c in family.directions {
                figure.points.push(project(&(g * Vector3::from(c))));
            }
        }
    }
    info!(symmetry = ops.name(), draws = num_points, "sampled pole figures");
    Ok(figures)
}

/// Samples A, B and C axis pole figures from an orthorhombic ODF.
pub fn sample_axis_pole_figures<R: Rng>(
    odf: &[f64],
    num_points: usize,
    rng: &mut R,
) -> StatsResult<Vec<PoleFigure>> {
    let ops = OrthoRhombicOps;
    let cdf = check_density(odf, ops.odf_size(), ops.name())?;
    let mut figures: Vec<PoleFigure> = ["A", "B", "C"]
        .into_iter()
        .map(|label| PoleFigure {
            label: label.to_string(),
            points: Vec::with_capacity(num_points),
        })
        .collect();

    for _ in 0..num_points {
        let r: f64 = rng.random();
        let euler = ops.sample_euler_in_bin(cdf.choose(r), &mut *rng);
        let g = rotation_matrix(&ops.fz_quat(&euler.to_quat()));
        for (axis, figure) in figures.iter_mut().enumerate() {
            figure.points.push(project(&g.column(axis).into_owned()));
        }
    }
    Ok(figures)
}

/// Samples `num_points` misorientations from `mdf` into a 5 degree angle histogram.
pub fn sample_misorientation_histogram<R: Rng>(
    mdf: &[f64],
    ops: &dyn SymmetryOps,
    num_points: usize,
    rng: &mut R,
) -> StatsResult<MisorientationHistogram> {
    let cdf = check_density(mdf, ops.mdf_size(), ops.name())?;
    let num_bins = ops.histogram_bins();
    let bin_centers = (0..num_bins)
        .map(|i| i as f64 * HISTOGRAM_BIN_WIDTH + HISTOGRAM_BIN_WIDTH / 2.0)
        .collect();
    let mut counts = vec![0.0; num_bins];
    if num_points == 0 {
        return Ok(MisorientationHistogram {
            bin_centers,
            counts,
        });
    }

    for _ in 0..num_points {
        let r: f64 = rng.random();
        let miso = ops.sample_misorientation_in_bin(cdf.choose(r), &mut *rng);
        let bin = (miso.angle.to_degrees() / HISTOGRAM_BIN_WIDTH).floor() as i64;
        counts[bin.clamp(0, num_bins as i64 - 1) as usize] += 1.0;
    }
    let n = num_points as f64;
    counts.iter_mut().for_each(|c| *c /= n);
    info!(symmetry = ops.name(), draws = num_points, "sampled misorientation histogram");
    Ok(MisorientationHistogram {
        bin_centers,
        counts,
    })
}
