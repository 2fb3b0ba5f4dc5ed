use nalgebra::Vector3;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use texgen::{
    distributions::{self, PlotData},
    error::StatsError,
    orientation::{AxisAngle, Euler},
    statsgen,
    symmetry::{LaueClass, SymmetryOps},
    texture::{self, MisorientationComponent, TextureComponent},
};

fn to_py_err(err: StatsError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn symmetry_ops(symmetry: &str) -> PyResult<&'static dyn SymmetryOps> {
    let class: LaueClass = symmetry.parse().map_err(PyValueError::new_err)?;
    Ok(class.ops())
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn plot_pair(data: PlotData) -> (Vec<f64>, Vec<f64>) {
    (data.x, data.y)
}

/// Build an ODF from `(phi1, Phi, phi2, weight, sigma)` components, angles in radians.
/// Returns the density and the summed component weight.
#[pyfunction]
#[pyo3(signature = (symmetry, components, normalize = true))]
fn build_odf(
    symmetry: &str,
    components: Vec<(f64, f64, f64, f64, f64)>,
    normalize: bool,
) -> PyResult<(Vec<f64>, f64)> {
    let ops = symmetry_ops(symmetry)?;
    let components: Vec<_> = components
        .into_iter()
        .map(|(e1, e2, e3, weight, sigma)| {
            TextureComponent::from_raw(Euler::new(e1, e2, e3), weight, sigma)
        })
        .collect();
    let data = texture::build_odf(&components, ops, normalize).map_err(to_py_err)?;
    Ok((data.odf, data.total_weight))
}

/// Build an MDF from a normalized ODF and `(angle, x, y, z, weight)` components, angle in radians.
#[pyfunction]
#[pyo3(signature = (symmetry, odf, components, seed = None))]
fn build_mdf(
    symmetry: &str,
    odf: Vec<f64>,
    components: Vec<(f64, f64, f64, f64, f64)>,
    seed: Option<u64>,
) -> PyResult<Vec<f64>> {
    let ops = symmetry_ops(symmetry)?;
    let components: Vec<_> = components
        .into_iter()
        .map(|(angle, x, y, z, weight)| {
            MisorientationComponent::new(AxisAngle::new(angle, Vector3::new(x, y, z)), weight)
        })
        .collect();
    texture::build_mdf(&odf, &components, ops, &mut rng(seed)).map_err(to_py_err)
}

/// Sample pole figures from an ODF. Returns `(label, points)` per direction family.
#[pyfunction]
#[pyo3(signature = (symmetry, odf, num_points, seed = None))]
fn pole_figures(
    symmetry: &str,
    odf: Vec<f64>,
    num_points: usize,
    seed: Option<u64>,
) -> PyResult<Vec<(String, Vec<(f64, f64)>)>> {
    let ops = symmetry_ops(symmetry)?;
    let figures =
        statsgen::sample_pole_figures(&odf, ops, num_points, &mut rng(seed)).map_err(to_py_err)?;
    Ok(figures.into_iter().map(|f| (f.label, f.points)).collect())
}

/// Sample a misorientation angle histogram from an MDF. Returns `(bin_centers, counts)`.
#[pyfunction]
#[pyo3(signature = (symmetry, mdf, num_points, seed = None))]
fn misorientation_histogram(
    symmetry: &str,
    mdf: Vec<f64>,
    num_points: usize,
    seed: Option<u64>,
) -> PyResult<(Vec<f64>, Vec<f64>)> {
    let ops = symmetry_ops(symmetry)?;
    let hist = statsgen::sample_misorientation_histogram(&mdf, ops, num_points, &mut rng(seed))
        .map_err(to_py_err)?;
    Ok((hist.bin_centers, hist.counts))
}

#[pyfunction]
fn beta_plot_data(alpha: f64, beta: f64, num_points: usize) -> PyResult<(Vec<f64>, Vec<f64>)> {
    distributions::gen_beta_plot_data(alpha, beta, num_points)
        .map(plot_pair)
        .map_err(to_py_err)
}

#[pyfunction]
fn log_normal_plot_data(
    mean: f64,
    std_dev: f64,
    num_points: usize,
) -> PyResult<(Vec<f64>, Vec<f64>)> {
    distributions::gen_log_normal_plot_data(mean, std_dev, num_points)
        .map(plot_pair)
        .map_err(to_py_err)
}

#[pyfunction]
fn power_law_plot_data(
    alpha: f64,
    k: f64,
    beta: f64,
    num_points: usize,
) -> PyResult<(Vec<f64>, Vec<f64>)> {
    distributions::gen_power_law_plot_data(alpha, k, beta, num_points)
        .map(plot_pair)
        .map_err(to_py_err)
}

/// Returns `(count, max, min)` for the size bins between the cutoffs.
#[pyfunction]
fn compute_number_of_bins(
    mu: f64,
    sigma: f64,
    min_cutoff: f64,
    max_cutoff: f64,
    bin_step: f64,
) -> (usize, f64, f64) {
    let bins = distributions::compute_number_of_bins(mu, sigma, min_cutoff, max_cutoff, bin_step);
    (bins.count, bins.max, bins.min)
}

/// Texture statistics generation implemented in Rust.
#[pymodule]
fn texgen_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(build_odf, m)?)?;
    m.add_function(wrap_pyfunction!(build_mdf, m)?)?;
    m.add_function(wrap_pyfunction!(pole_figures, m)?)?;
    m.add_function(wrap_pyfunction!(misorientation_histogram, m)?)?;
    m.add_function(wrap_pyfunction!(beta_plot_data, m)?)?;
    m.add_function(wrap_pyfunction!(log_normal_plot_data, m)?)?;
    m.add_function(wrap_pyfunction!(power_law_plot_data, m)?)?;
    m.add_function(wrap_pyfunction!(compute_number_of_bins, m)?)?;
    Ok(())
}
