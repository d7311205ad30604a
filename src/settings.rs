use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::grid::Axis;
use crate::sht::ShtEngine;

/// Maximum distance (radians) between an angular axis and engine nodes for the grids to be considered equal.
pub const GRID_MATCH_TOLERANCE: f64 = 1e-8;
/// Default number of polarization components of a phase matrix field.
pub const DEFAULT_COMPONENTS: usize = 6;


/// Truncation and grid of one spherical harmonics engine.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TruncationSettings {
    pub l_max: usize,
    pub m_max: usize,
    pub n_lat: usize,
    pub n_lon: usize,
}

impl TruncationSettings {
    pub fn engine(&self) -> crate::Result<ShtEngine> {
        ShtEngine::new(self.l_max, self.m_max, self.n_lat, self.n_lon)
    }
}

/// A coordinate range, equispaced either linearly or in log10.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RangeSettings {
    pub start: f64,
    pub stop: f64,
    pub n: usize,
    #[serde(default)]
    pub log: bool,
}

impl RangeSettings {
    pub fn axis(&self, name: &'static str) -> crate::Result<Axis> {
        if self.log {
            Axis::logspace(name, self.start, self.stop, self.n)
        } else {
            Axis::linspace(name, self.start, self.stop, self.n)
        }
    }
}

/// Runtime configuration for the consistency run.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    pub incoming: TruncationSettings,
    pub scattering: TruncationSettings,
    pub frequency: RangeSettings,
    pub temperature: RangeSettings,
    #[serde(default = "default_components")]
    pub n_components: usize,
    /// Number of random targets used by the interpolation checks.
    pub n_targets: usize,
    /// Maximum tolerated absolute deviation between representations.
    pub tolerance: f64,
    pub seed: Option<u64>,
}

fn default_components() -> usize {
    DEFAULT_COMPONENTS
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Settings:")?;
        writeln!(
            f,
            "  Incoming:    l_max {} m_max {} grid {}x{}",
            self.incoming.l_max, self.incoming.m_max, self.incoming.n_lat, self.incoming.n_lon
        )?;
        writeln!(
            f,
            "  Scattering:  l_max {} m_max {} grid {}x{}",
            self.scattering.l_max,
            self.scattering.m_max,
            self.scattering.n_lat,
            self.scattering.n_lon
        )?;
        writeln!(
            f,
            "  Frequency:   {} points in [{}, {}]{}",
            self.frequency.n,
            self.frequency.start,
            self.frequency.stop,
            if self.frequency.log { " (log10)" } else { "" }
        )?;
        writeln!(
            f,
            "  Temperature: {} points in [{}, {}]",
            self.temperature.n, self.temperature.start, self.temperature.stop
        )?;
        writeln!(f, "  Components:  {}", self.n_components)?;
        writeln!(f, "  Tolerance:   {:e}", self.tolerance)
    }
}

pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");

    let config: Settings = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .context("loading default configuration")?
        .try_deserialize()
        .context("deserializing default configuration")?;

    validate_config(&config)?;
    Ok(config)
}

/// Loads `config/default.toml`, then `config/local.toml` if present, then
/// `SCATFIELD__*` environment variables, then command-line overrides.
pub fn load_config(args: &CliArgs) -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    let mut builder = Config::builder().add_source(File::from(default_config_file).required(true));
    if local_config.exists() {
        info!(path = %local_config.display(), "using local configuration");
        builder = builder.add_source(File::from(local_config).required(true));
    }

    let mut config: Settings = builder
        .add_source(
            Environment::with_prefix("scatfield")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("loading configuration")?
        .try_deserialize()
        .context("deserializing configuration")?;

    if let Some(l_max) = args.l_max_scat {
        config.scattering.l_max = l_max;
    }
    if let Some(m_max) = args.m_max_scat {
        config.scattering.m_max = m_max;
    }
    if let Some(l_max) = args.l_max_inc {
        config.incoming.l_max = l_max;
    }
    if let Some(n) = args.components {
        config.n_components = n;
    }
    if let Some(tolerance) = args.tolerance {
        config.tolerance = tolerance;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    validate_config(&config)?;
    Ok(config)
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the SCATFIELD_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("SCATFIELD_ROOT_DIR") {
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
    bail!("could not find project root directory")
}

fn validate_config(config: &Settings) -> Result<()> {
    config
        .incoming
        .engine()
        .context("incoming truncation")?;
    config
        .scattering
        .engine()
        .context("scattering truncation")?;
    if config.incoming.m_max != 0 || config.incoming.n_lon != 1 {
        bail!("incoming grid must be azimuthally random (m_max = 0, n_lon = 1)");
    }
    if 2 * config.scattering.l_max >= config.scattering.n_lat {
        bail!("scattering n_lat must exceed 2 l_max for the re-truncation check");
    }
    if config.n_components == 0 {
        bail!("n_components must be at least 1");
    }
    if config.frequency.n < 2 || config.temperature.n < 2 {
        bail!("frequency and temperature ranges need at least two points");
    }
    if config.n_targets == 0 {
        bail!("n_targets must be at least 1");
    }
    if config.tolerance.is_nan() || config.tolerance <= 0.0 {
        bail!("tolerance must be positive");
    }
    Ok(())
}

#[derive(Parser, Debug, Default)]
#[command(
    version,
    about = "scatfield - consistency checks for multi-representation scattering data fields"
)]
pub struct CliArgs {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    pub json: bool,

    /// Maximum degree of the scattering-angle expansion.
    #[arg(long)]
    pub l_max_scat: Option<usize>,

    /// Maximum order of the scattering-angle expansion.
    #[arg(long)]
    pub m_max_scat: Option<usize>,

    /// Maximum degree of the incoming-angle expansion.
    #[arg(long)]
    pub l_max_inc: Option<usize>,

    /// Number of polarization components.
    #[arg(short, long)]
    pub components: Option<usize>,

    /// Maximum tolerated absolute deviation between representations.
    #[arg(short, long)]
    pub tolerance: Option<f64>,

    /// Random seed for the synthetic field.
    #[arg(short, long)]
    pub seed: Option<u64>,
}
