use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ndarray::ArrayView1;
use ndarray_stats::QuantileExt;
use serde::Serialize;

use crate::distributions::{CutOff, PlotData};
use crate::settings::Settings;
use crate::statsgen::{MisorientationHistogram, PoleFigure};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_density() {
        let stats = DensityStats::from_density(&[0.5, 0.25, 0.25, 0.0]).unwrap();
        assert_eq!(stats.len, 4);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 0.5);
        assert_eq!(stats.sum, 1.0);
        assert_eq!(stats.mean, 0.25);
    }

    #[test]
    fn stats_reject_nan() {
        assert!(DensityStats::from_density(&[0.5, f64::NAN]).is_err());
        assert!(DensityStats::from_density(&[]).is_err());
    }

    #[test]
    fn density_file_has_one_line_per_bin() {
        let dir = tempfile::tempdir().unwrap();
        write_density(&[0.1, 0.2, 0.7], "odf.dat", dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join("odf.dat")).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, ["0 0.1", "1 0.2", "2 0.7"]);
    }

    #[test]
    fn pole_figure_files_are_named_by_label() {
        let dir = tempfile::tempdir().unwrap();
        let figures = [PoleFigure {
            label: "11-20".to_string(),
            points: vec![(0.0, 0.5), (0.25, -0.5)],
        }];
        write_pole_figures(&figures, dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join("pf_11-20.dat")).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn summary_is_complete_json() {
        let dir = tempfile::tempdir().unwrap();
        let stats = DensityStats::from_density(&[0.5, 0.5]).unwrap();
        let summary = Summary {
            created: "2026-01-01T00:00:00+00:00".to_string(),
            symmetry: "cubic".to_string(),
            seed: Some(7),
            normalized: true,
            total_weight: 200.0,
            odf: stats,
            mdf: stats,
            histogram: MisorientationHistogram {
                bin_centers: vec![2.5, 7.5],
                counts: vec![0.75, 0.25],
            },
            elapsed_seconds: 0.5,
        };
        write_summary(&summary, dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join("summary.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["seed"], 7);
        assert_eq!(value["histogram"]["counts"][0], 0.75);
        assert_eq!(value["mdf"]["len"], 2);
    }
}

/// Summary statistics of a density array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DensityStats {
    pub len: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub sum: f64,
}

impl DensityStats {
    pub fn from_density(density: &[f64]) -> Result<Self> {
        let view = ArrayView1::from(density);
        let min = *view
            .min()
            .map_err(|e| anyhow!("cannot take minimum of density: {}", e))?;
        let max = *view
            .max()
            .map_err(|e| anyhow!("cannot take maximum of density: {}", e))?;
        let mean = view.mean().ok_or_else(|| anyhow!("empty density"))?;
        Ok(Self {
            len: density.len(),
            min,
            max,
            mean,
            sum: view.sum(),
        })
    }
}

/// Run metadata written next to the arrays.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub created: String,
    pub symmetry: String,
    pub seed: Option<u64>,
    pub normalized: bool,
    pub total_weight: f64,
    pub odf: DensityStats,
    pub mdf: DensityStats,
    pub histogram: MisorientationHistogram,
    pub elapsed_seconds: f64,
}

fn create(directory: &Path, name: &str) -> Result<BufWriter<File>> {
    let path = directory.join(name);
    let file = File::create(&path).with_context(|| format!("failed to create {:?}", path))?;
    Ok(BufWriter::new(file))
}

/// Write a density as `index value` lines.
pub fn write_density(density: &[f64], name: &str, directory: &Path) -> Result<()> {
    let mut writer = create(directory, name)?;
    for (index, value) in density.iter().enumerate() {
        writeln!(writer, "{} {}", index, value)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write each pole figure to `pf_<label>.dat` as `x y` lines.
pub fn write_pole_figures(figures: &[PoleFigure], directory: &Path) -> Result<()> {
    for figure in figures {
        let mut writer = create(directory, &format!("pf_{}.dat", figure.label))?;
        for (x, y) in &figure.points {
            writeln!(writer, "{} {}", x, y)?;
        }
        writer.flush()?;
    }
    Ok(())
}

pub fn write_histogram(hist: &MisorientationHistogram, directory: &Path) -> Result<()> {
    let mut writer = create(directory, "mdf_hist.dat")?;
    for (centre, count) in hist.bin_centers.iter().zip(&hist.counts) {
        writeln!(writer, "{} {}", centre, count)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_plot_data(data: &PlotData, name: &str, directory: &Path) -> Result<()> {
    let mut writer = create(directory, name)?;
    for (x, y) in data.x.iter().zip(&data.y) {
        writeln!(writer, "{} {}", x, y)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the size-bin layout: cutoff markers first, then bin edges with their sampled fractions.
pub fn write_size_bins(cutoff: &CutOff, fractions: Option<&[f64]>, directory: &Path) -> Result<()> {
    let mut writer = create(directory, "size_bins.dat")?;
    writeln!(writer, "# cutoff {} {} {} {}", cutoff.x[0], cutoff.y[0], cutoff.x[1], cutoff.y[1])?;
    for (i, edge) in cutoff.bin_sizes.iter().enumerate() {
        match fractions {
            Some(f) => writeln!(writer, "{} {}", edge, f.get(i).copied().unwrap_or(0.0))?,
            None => writeln!(writer, "{}", edge)?,
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary(summary: &Summary, directory: &Path) -> Result<()> {
    let mut writer = create(directory, "summary.json")?;
    serde_json::to_writer_pretty(&mut writer, summary).context("failed to write summary")?;
    writer.flush()?;
    Ok(())
}

/// Write the settings a run used, so it can be repeated.
pub fn write_settings(settings: &Settings, directory: &Path) -> Result<()> {
    let text = toml::to_string(settings).context("failed to serialize settings")?;
    fs::write(directory.join("settings.toml"), text).context("failed to write settings")?;
    Ok(())
}
