//! End-to-end statistics generation for one phase.
//!
//! [`StatsGenerator`] turns a [`Settings`] into every derived array:
//! - ODF from texture components, or from random orientations
//! - MDF from the ODF and the misorientation components
//! - Pole figures, plus axis pole figures for orthorhombic phases
//! - Misorientation angle histogram
//! - Closed-form curves and the grain size bin layout
//!
//! All sampling draws from one generator seeded from the settings. Unseeded
//! runs draw a seed and record it, so every run is reproducible.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use tracing::info;

use crate::distributions::{self, CutOff, PlotData};
use crate::output::{self, DensityStats, Summary};
use crate::settings::Settings;
use crate::statsgen::{self, MisorientationHistogram, PoleFigure};
use crate::symmetry::LaueClass;
use crate::texture::{self, OdfData};

const PHASES: u64 = 5;

/// Everything produced by one run.
#[derive(Debug, Clone)]
pub struct GeneratorOutput {
    pub odf: OdfData,
    pub mdf: Vec<f64>,
    pub pole_figures: Vec<PoleFigure>,
    pub axis_pole_figures: Vec<PoleFigure>,
    pub histogram: MisorientationHistogram,
    pub curves: Vec<(String, PlotData)>,
    pub cutoff: Option<CutOff>,
    pub size_fractions: Option<Vec<f64>>,
    pub elapsed: Duration,
}

/// Texture statistics generator for a single phase.
///
/// **Context**: a phase is described by its symmetry, a handful of texture and
/// misorientation components and some grain size parameters. Every plot and
/// array derived from those is produced in one pass.
///
/// **How it Works**: builds the ODF, then samples it for the MDF and pole
/// figures, samples the MDF for the misorientation histogram and evaluates the
/// closed-form curves. Phase progress is reported on a progress bar.
#[derive(Debug)]
pub struct StatsGenerator {
    pub settings: Settings,
    pub result: Option<GeneratorOutput>,
}

impl StatsGenerator {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            result: None,
        }
    }

    /// Seeds the run, drawing and storing a seed from the OS when none is configured.
    fn rng(&mut self) -> StdRng {
        let seed = match self.settings.seed {
            Some(seed) => seed,
            None => {
                let seed = StdRng::from_os_rng().next_u64();
                info!("no seed configured, using {}", seed);
                self.settings.seed = Some(seed);
                seed
            }
        };
        StdRng::seed_from_u64(seed)
    }

    /// Runs every phase and stores the result.
    pub fn solve(&mut self) -> Result<()> {
        let start = Instant::now();
        let mut rng = self.rng();
        let settings = &self.settings;
        let ops = settings.symmetry.ops();
        info!("{}", settings);

        let pb = ProgressBar::new(PHASES);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>2}/{len:2} {msg}",
            )?
            .progress_chars("█▇▆▅▄▃▂▁"),
        );

        pb.set_message("odf");
        let odf = match settings.random_samples {
            Some(samples) => {
                let odf = texture::build_random_odf(ops, samples, &mut rng);
                OdfData {
                    odf,
                    total_weight: samples as f64,
                }
            }
            None => texture::build_odf(&settings.texture_components(), ops, settings.normalize)?,
        };
        // samplers expect a density summing to one
        let sampling_odf = if settings.normalize || settings.random_samples.is_some() {
            odf.odf.clone()
        } else {
            let n = odf.odf.len() as f64;
            odf.odf.iter().map(|v| v / n).collect()
        };
        pb.inc(1);

        pb.set_message("mdf");
        let mdf = texture::build_mdf(
            &sampling_odf,
            &settings.misorientation_components(),
            ops,
            &mut rng,
        )?;
        pb.inc(1);

        pb.set_message("pole figures");
        let pole_figures =
            statsgen::sample_pole_figures(&sampling_odf, ops, settings.pole_figure_points, &mut rng)?;
        let axis_pole_figures = if settings.symmetry == LaueClass::Orthorhombic {
            statsgen::sample_axis_pole_figures(&sampling_odf, settings.pole_figure_points, &mut rng)?
        } else {
            Vec::new()
        };
        pb.inc(1);

        pb.set_message("histogram");
        let histogram =
            statsgen::sample_misorientation_histogram(&mdf, ops, settings.histogram_points, &mut rng)?;
        pb.inc(1);

        pb.set_message("curves");
        let curves = settings
            .curves
            .iter()
            .map(|curve| Ok((curve.name().to_string(), curve.plot_data(settings.curve_points)?)))
            .collect::<Result<Vec<_>>>()?;

        let (cutoff, size_fractions) = match &settings.size_distribution {
            Some(size) => {
                let plot = distributions::gen_log_normal_plot_data(size.mu, size.sigma, settings.curve_points)?;
                let y_max = plot.y.iter().copied().fold(0.0, f64::max);
                let cutoff = distributions::gen_cutoff(
                    size.mu,
                    size.sigma,
                    size.min_cutoff,
                    size.max_cutoff,
                    size.bin_step,
                    y_max,
                );
                let fractions = if size.samples > 0 {
                    Some(distributions::sample_size_distribution(
                        size.mu,
                        size.sigma,
                        size.min_cutoff,
                        size.max_cutoff,
                        size.bin_step,
                        size.samples,
                        &mut rng,
                    )?)
                } else {
                    None
                };
                (Some(cutoff), fractions)
            }
            None => (None, None),
        };
        pb.inc(1);
        pb.finish_with_message("done");

        let elapsed = start.elapsed();
        info!("time taken: {:.2?}", elapsed);

        self.result = Some(GeneratorOutput {
            odf,
            mdf,
            pole_figures,
            axis_pole_figures,
            histogram,
            curves,
            cutoff,
            size_fractions,
            elapsed,
        });
        Ok(())
    }

    /// Writes every array of the last run into the configured directory.
    pub fn writeup(&self) -> Result<()> {
        let result = self
            .result
            .as_ref()
            .ok_or_else(|| anyhow!("nothing to write, solve has not been run"))?;
        let dir = &self.settings.directory;
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {:?}", dir))?;

        output::write_density(&result.odf.odf, "odf.dat", dir)?;
        output::write_density(&result.mdf, "mdf.dat", dir)?;
        output::write_pole_figures(&result.pole_figures, dir)?;
        output::write_pole_figures(&result.axis_pole_figures, dir)?;
        output::write_histogram(&result.histogram, dir)?;
        for (i, (name, data)) in result.curves.iter().enumerate() {
            output::write_plot_data(data, &format!("curve_{}_{}.dat", i, name), dir)?;
        }
        if let Some(cutoff) = &result.cutoff {
            output::write_size_bins(cutoff, result.size_fractions.as_deref(), dir)?;
        }

        let summary = Summary {
            created: chrono::Local::now().to_rfc3339(),
            symmetry: self.settings.symmetry.to_string(),
            seed: self.settings.seed,
            normalized: self.settings.normalize,
            total_weight: result.odf.total_weight,
            odf: DensityStats::from_density(&result.odf.odf)?,
            mdf: DensityStats::from_density(&result.mdf)?,
            histogram: result.histogram.clone(),
            elapsed_seconds: result.elapsed.as_secs_f64(),
        };
        output::write_summary(&summary, dir)?;
        output::write_settings(&self.settings, dir)?;
        info!("results written to {:?}", dir);
        Ok(())
    }
}
