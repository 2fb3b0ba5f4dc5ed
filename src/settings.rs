use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::distributions::Curve;
use crate::orientation::{AxisAngle, Euler};
use crate::symmetry::LaueClass;
use crate::texture::{MisorientationComponent, TextureComponent};

/// Default number of points per closed-form curve.
pub const DEFAULT_CURVE_POINTS: usize = 100;
/// Default output directory, relative to the working directory.
pub const DEFAULT_DIRECTORY: &str = "texgen_out";


/// A texture component as written in configuration, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureSpec {
    pub euler: [f64; 3],
    pub weight: f64,
    #[serde(default)]
    pub sigma: f64,
}

impl TextureSpec {
    pub fn to_component(&self) -> TextureComponent {
        let [phi1, phi, phi2] = self.euler;
        TextureComponent::from_raw(Euler::from_degrees(phi1, phi, phi2), self.weight, self.sigma)
    }
}

/// A misorientation component as written in configuration, angle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MisorientationSpec {
    pub angle: f64,
    pub axis: [f64; 3],
    pub weight: f64,
}

impl MisorientationSpec {
    pub fn to_component(&self) -> MisorientationComponent {
        let axis_angle = AxisAngle::new(self.angle.to_radians(), Vector3::from(self.axis));
        MisorientationComponent::new(axis_angle, self.weight)
    }
}

/// Log-normal grain size parameters with their cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeDistributionSpec {
    pub mu: f64,
    pub sigma: f64,
    pub min_cutoff: f64,
    pub max_cutoff: f64,
    pub bin_step: f64,
    /// Number of grain diameters to sample. No sampling when zero.
    #[serde(default)]
    pub samples: usize,
}

/// Runtime configuration for the application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub symmetry: LaueClass,
    #[serde(default = "default_normalize")]
    pub normalize: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub pole_figure_points: usize,
    pub histogram_points: usize,
    /// Build the ODF from this many random orientations instead of the texture components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_samples: Option<usize>,
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_curve_points")]
    pub curve_points: usize,
    #[serde(default)]
    pub texture: Vec<TextureSpec>,
    #[serde(default)]
    pub misorientation: Vec<MisorientationSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_distribution: Option<SizeDistributionSpec>,
    #[serde(default)]
    pub curves: Vec<Curve>,
}

fn default_normalize() -> bool {
    true
}

fn default_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DIRECTORY)
}

fn default_curve_points() -> usize {
    DEFAULT_CURVE_POINTS
}

impl Settings {
    pub fn texture_components(&self) -> Vec<TextureComponent> {
        self.texture.iter().map(TextureSpec::to_component).collect()
    }

    pub fn misorientation_components(&self) -> Vec<MisorientationComponent> {
        self.misorientation
            .iter()
            .map(MisorientationSpec::to_component)
            .collect()
    }
}

/// Loads only `config/default.toml`, without environment or command line overrides.
pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");

    let settings = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .context("failed to load configuration")?;
    let config: Settings = settings
        .try_deserialize()
        .context("failed to deserialize configuration")?;

    validate_config(&config)?;
    Ok(config)
}

/// Loads the configuration file, then applies `TEXGEN_*` environment variables and command line arguments.
pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root()?;

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    let config_file = if local_config.exists() {
        info!("using local configuration: {:?}", local_config);
        local_config
    } else {
        info!("using default configuration: {:?}", default_config_file);
        default_config_file
    };

    let settings = Config::builder()
        .add_source(File::from(config_file).required(true))
        .add_source(Environment::with_prefix("texgen"))
        .build()
        .context("failed to load configuration")?;
    let mut config: Settings = settings
        .try_deserialize()
        .context("failed to deserialize configuration")?;

    let args = CliArgs::parse();
    apply_args(&mut config, args);

    validate_config(&config)?;
    debug!("{:#?}", config);

    Ok(config)
}

fn apply_args(config: &mut Settings, args: CliArgs) {
    if let Some(symmetry) = args.symmetry {
        config.symmetry = symmetry;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if args.normalize {
        config.normalize = true;
    }
    if args.no_normalize {
        config.normalize = false;
    }
    if let Some(points) = args.points {
        config.pole_figure_points = points;
    }
    if let Some(points) = args.hist_points {
        config.histogram_points = points;
    }
    if let Some(samples) = args.random {
        config.random_samples = Some(samples);
    }
    if let Some(dir) = args.dir {
        config.directory = dir;
    }
    if let Some(texture) = args.texture {
        config.texture = texture;
    }
    if let Some(miso) = args.miso {
        config.misorientation = miso;
    }
}

/// Retrieve the project root directory.
/// The root is, in order of preference:
/// 1. `CARGO_MANIFEST_DIR`, when running through cargo.
/// 2. `TEXGEN_ROOT_DIR`, when set explicitly.
/// 3. The nearest ancestor of the executable directory containing a `config` subdirectory.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("TEXGEN_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    let exe_path = env::current_exe().context("failed to get current executable path")?;
    let mut current = exe_path.parent();
    while let Some(dir) = current {
        if dir.join("config").is_dir() {
            return Ok(dir.to_path_buf());
        }
        current = dir.parent();
    }
    Err(anyhow!(
        "could not find a directory containing config/ above {:?}",
        exe_path
    ))
}

pub fn validate_config(config: &Settings) -> Result<()> {
    for (i, t) in config.texture.iter().enumerate() {
        if !t.weight.is_finite() || t.weight < 0.0 {
            bail!("texture component {} has invalid weight {}", i, t.weight);
        }
        if !t.sigma.is_finite() || t.sigma < 0.0 {
            bail!("texture component {} has invalid sigma {}", i, t.sigma);
        }
    }
    for (i, m) in config.misorientation.iter().enumerate() {
        if !m.weight.is_finite() || m.weight < 0.0 {
            bail!("misorientation component {} has invalid weight {}", i, m.weight);
        }
        if Vector3::from(m.axis).norm() == 0.0 {
            bail!("misorientation component {} has a zero axis", i);
        }
    }
    if let Some(size) = &config.size_distribution {
        if !(size.bin_step > 0.0) {
            bail!("size distribution bin step must be positive, got {}", size.bin_step);
        }
        if !(size.sigma > 0.0) {
            bail!("size distribution sigma must be positive, got {}", size.sigma);
        }
    }
    if config.curve_points == 0 && !config.curves.is_empty() {
        bail!("curve_points must be greater than 0");
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about = "texgen - crystallographic texture statistics")]
pub struct CliArgs {
    /// Crystal symmetry of the phase.
    #[arg(long, value_enum)]
    symmetry: Option<LaueClass>,

    /// Random seed for all sampling.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Divide the ODF by its bin count.
    #[arg(long, conflicts_with = "no_normalize")]
    normalize: bool,

    /// Keep the raw ODF values.
    #[arg(long)]
    no_normalize: bool,

    /// Number of orientations drawn for the pole figures.
    #[arg(short, long)]
    points: Option<usize>,

    /// Number of misorientations drawn for the misorientation histogram.
    #[arg(long)]
    hist_points: Option<usize>,

    /// Build a random texture from the given number of orientations.
    #[arg(long)]
    random: Option<usize>,

    /// Output directory.
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Texture components in degrees, replacing those in the configuration.
    /// Format: phi1,Phi,phi2,weight,sigma ...
    #[arg(long, value_parser = parse_texture_spec, num_args = 1.., value_delimiter = ' ')]
    texture: Option<Vec<TextureSpec>>,

    /// Misorientation components, replacing those in the configuration.
    /// Format: angle,axis_x,axis_y,axis_z,weight ...
    #[arg(long, value_parser = parse_misorientation_spec, num_args = 1.., value_delimiter = ' ')]
    miso: Option<Vec<MisorientationSpec>>,
}

fn parse_floats(s: &str, names: &[&str]) -> Result<Vec<f64>, String> {
    let values: Vec<&str> = s.split(',').collect();
    if values.len() != names.len() {
        return Err(format!(
            "invalid format: '{}'. Expected '{}'",
            s,
            names.join(",")
        ));
    }
    values
        .iter()
        .zip(names)
        .map(|(v, name)| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| format!("failed to parse {}: {}", name, v))
        })
        .collect()
}

/// Parse a texture component in the format "phi1,Phi,phi2,weight,sigma"
fn parse_texture_spec(s: &str) -> Result<TextureSpec, String> {
    let v = parse_floats(s, &["phi1", "Phi", "phi2", "weight", "sigma"])?;
    Ok(TextureSpec {
        euler: [v[0], v[1], v[2]],
        weight: v[3],
        sigma: v[4],
    })
}

/// Parse a misorientation component in the format "angle,x,y,z,weight"
fn parse_misorientation_spec(s: &str) -> Result<MisorientationSpec, String> {
    let v = parse_floats(s, &["angle", "x", "y", "z", "weight"])?;
    Ok(MisorientationSpec {
        angle: v[0],
        axis: [v[1], v[2], v[3]],
        weight: v[4],
    })
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Symmetry: {}
  - Normalize: {}
  - Seed: {:?}
  - Texture Components: {}
  - Misorientation Components: {}
  - Pole Figure Points: {}
  - Histogram Points: {}
  - Output Directory: {:?}
  ",
            self.symmetry,
            self.normalize,
            self.seed,
            self.texture.len(),
            self.misorientation.len(),
            self.pole_figure_points,
            self.histogram_points,
            self.directory,
        )
    }
}
