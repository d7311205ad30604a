//! Cross-representation consistency run.
//!
//! A random band-limited field is generated in fully spectral form, converted
//! through every representation and pushed through each operation along two
//! different paths. For band-limited data on sufficiently fine grids every
//! pair of paths agrees to round-off, so the maximum absolute deviation of each
//! pair is a direct measure of the numerical health of the transforms and
//! interpolators.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{ensure, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{ArrayD, ArrayViewD};
use ndarray_stats::QuantileExt;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use crate::axis_interp::AxisInterpolator;
use crate::field::{GriddedField, ParticleType, ScatteringDataField};
use crate::grid::Axis;
use crate::settings::Settings;
use crate::synthetic;


/// Outcome of comparing two paths that should yield the same result.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub max_deviation: f64,
    pub passed: bool,
}

impl Check {
    fn new(name: &'static str, max_deviation: f64, tolerance: f64) -> Self {
        Self {
            name,
            max_deviation,
            // NaN never passes
            passed: max_deviation <= tolerance,
        }
    }
}

/// Summary of a consistency run.
///
/// **Context**: The representations of a scattering data field are only
/// interchangeable if every conversion and operation commutes with the others.
/// A regression in the transforms or interpolators shows up as a check whose
/// deviation exceeds the tolerance.
///
/// **How it Works**: Each check records the maximum absolute deviation between
/// two routes to the same quantity. The run passes when all checks do.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyReport {
    pub particle_type: ParticleType,
    pub tolerance: f64,
    pub checks: Vec<Check>,
    /// Wall time of the run in seconds.
    pub elapsed: f64,
}

impl ConsistencyReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|check| !check.passed)
    }
}

impl fmt::Display for ConsistencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Consistency:")?;
        writeln!(f, "  Particle type:    {}", self.particle_type)?;
        writeln!(f, "  Tolerance:        {:e}", self.tolerance)?;
        for check in &self.checks {
            writeln!(
                f,
                "  {:<28} {:>10.3e}  {}",
                check.name,
                check.max_deviation,
                if check.passed { "ok" } else { "FAILED" }
            )?;
        }
        writeln!(f, "  Elapsed:          {:.3} s", self.elapsed)
    }
}

/// Largest absolute elementwise difference between two real tensors.
pub fn max_deviation(a: ArrayViewD<f64>, b: ArrayViewD<f64>) -> Result<f64> {
    ensure!(
        a.shape() == b.shape(),
        "cannot compare shapes {:?} and {:?}",
        a.shape(),
        b.shape()
    );
    if a.is_empty() {
        return Ok(0.0);
    }
    let diff = &a - &b;
    Ok(*diff.mapv(f64::abs).max_skipnan())
}

/// Largest modulus of the elementwise difference between two complex tensors.
pub fn max_deviation_complex(a: ArrayViewD<Complex64>, b: ArrayViewD<Complex64>) -> Result<f64> {
    ensure!(
        a.shape() == b.shape(),
        "cannot compare shapes {:?} and {:?}",
        a.shape(),
        b.shape()
    );
    if a.is_empty() {
        return Ok(0.0);
    }
    let diff = &a - &b;
    Ok(*diff.mapv(|c| c.norm()).max_skipnan())
}

/// `n` sorted random points drawn uniformly from the range of `axis`.
fn random_targets<R: Rng>(axis: &Axis, n: usize, rng: &mut R) -> crate::Result<Axis> {
    let (lower, upper) = (axis.first(), axis.last());
    let mut values: Vec<f64> = (0..n).map(|_| rng.random_range(lower..=upper)).collect();
    values.sort_by(f64::total_cmp);
    values.dedup();
    Axis::new(axis.name(), values)
}

/// Interpolates the four angle axes of `gridded` one after another.
fn interpolate_axes_sequentially(
    gridded: &GriddedField,
    targets: &[Axis; 4],
) -> crate::Result<ArrayD<f64>> {
    let sources = [
        gridded.lon_inc(),
        gridded.lat_inc(),
        gridded.lon_scat(),
        gridded.lat_scat(),
    ];
    let mut data = gridded.data().to_owned();
    for (offset, (source, target)) in sources.into_iter().zip(targets).enumerate() {
        data = AxisInterpolator::new(source, target).interpolate(data.view(), 2 + offset)?;
    }
    Ok(data)
}

fn every_other(axis: &Axis) -> crate::Result<Axis> {
    Axis::new(axis.name(), axis.as_slice().iter().step_by(2).copied().collect::<Vec<_>>())
}

struct Recorder {
    pb: ProgressBar,
    tolerance: f64,
    checks: Vec<Check>,
}

impl Recorder {
    fn record(&mut self, name: &'static str, max_deviation: f64) {
        let check = Check::new(name, max_deviation, self.tolerance);
        if check.passed {
            info!(check = name, max_deviation, "check passed");
        } else {
            warn!(
                check = name,
                max_deviation,
                tolerance = self.tolerance,
                "check failed"
            );
        }
        self.checks.push(check);
        self.pb.inc(1);
        self.pb.set_message(name);
    }
}

const N_CHECKS: u64 = 10;

/// Runs every consistency check on a random field built from `settings`.
pub fn run(settings: &Settings) -> Result<ConsistencyReport> {
    let start = Instant::now();
    let mut rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let fully = synthetic::random_fully_spectral(
        settings.frequency.axis("frequency")?,
        settings.temperature.axis("temperature")?,
        Arc::new(settings.incoming.engine()?),
        Arc::new(settings.scattering.engine()?),
        settings.n_components,
        &mut rng,
    )?;
    info!(
        shape = ?fully.data().shape(),
        particle_type = %fully.particle_type(),
        "generated fully spectral field"
    );

    let pb = ProgressBar::new(N_CHECKS);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
        )?
        .progress_chars("█▇▆▅▄▃▂▁"),
    );
    pb.set_message("converting");
    let mut recorder = Recorder {
        pb,
        tolerance: settings.tolerance,
        checks: Vec::with_capacity(N_CHECKS as usize),
    };

    let sht_inc = Arc::clone(fully.sht_inc());
    let sht_scat = Arc::clone(fully.sht_scat());
    let spectral = fully.to_spectral()?;
    let gridded = spectral.to_gridded()?;

    let fully_again = spectral.to_fully_spectral_with(Arc::clone(&sht_inc))?;
    recorder.record(
        "fully spectral round trip",
        max_deviation_complex(fully.data(), fully_again.data())?,
    );

    let spectral_again = gridded.to_spectral_with(Arc::clone(&sht_scat))?;
    recorder.record(
        "spectral round trip",
        max_deviation_complex(spectral.data(), spectral_again.data())?,
    );

    let extended = spectral.to_spectral_truncated(2 * sht_scat.l_max(), sht_scat.m_max())?;
    recorder.record(
        "extended truncation",
        max_deviation(gridded.data(), extended.to_gridded()?.data())?,
    );
    let restored = extended.to_spectral_truncated(sht_scat.l_max(), sht_scat.m_max())?;
    recorder.record(
        "truncation round trip",
        max_deviation_complex(spectral.data(), restored.data())?,
    );

    let frequencies = random_targets(fully.frequencies(), settings.n_targets, &mut rng)?;
    let by_spectrum = fully.interpolate_frequency(&frequencies)?.to_gridded()?;
    let by_grid = gridded.interpolate_frequency(&frequencies)?;
    recorder.record(
        "frequency interpolation",
        max_deviation(by_spectrum.data(), by_grid.data())?,
    );

    let temperatures = random_targets(fully.temperatures(), settings.n_targets, &mut rng)?;
    let by_spectrum = spectral.interpolate_temperature(&temperatures)?.to_gridded()?;
    let by_grid = gridded.interpolate_temperature(&temperatures)?;
    recorder.record(
        "temperature interpolation",
        max_deviation(by_spectrum.data(), by_grid.data())?,
    );

    let angles = [
        gridded.lon_inc().clone(),
        random_targets(gridded.lat_inc(), settings.n_targets, &mut rng)?,
        random_targets(gridded.lon_scat(), settings.n_targets, &mut rng)?,
        random_targets(gridded.lat_scat(), settings.n_targets, &mut rng)?,
    ];
    let joint = gridded.interpolate_angles(&angles[0], &angles[1], &angles[2], &angles[3])?;
    let per_axis = interpolate_axes_sequentially(&gridded, &angles)?;
    recorder.record(
        "angle interpolation",
        max_deviation(joint.data(), per_axis.view())?,
    );

    let coarse = gridded.downsample_scattering_angles(
        &every_other(gridded.lon_scat())?,
        &every_other(gridded.lat_scat())?,
    )?;
    let integral = gridded.integrate_scattering_angles()?;
    recorder.record(
        "downsampled integral",
        max_deviation(integral.view(), coarse.integrate_scattering_angles()?.view())?,
    );

    let combined = fully.scale(2.0).add(&fully)?.to_gridded()?;
    recorder.record(
        "add and scale",
        max_deviation(combined.data(), gridded.scale(3.0).data())?,
    );

    let from_spectrum = ScatteringDataField::from(fully.clone()).integrate_scattering_angles()?;
    let from_grid = ScatteringDataField::from(gridded.clone()).integrate_scattering_angles()?;
    recorder.record(
        "scattering integral",
        max_deviation(from_spectrum.view(), from_grid.view())?,
    );

    recorder.pb.finish_with_message("done");

    let report = ConsistencyReport {
        particle_type: fully.particle_type(),
        tolerance: settings.tolerance,
        checks: recorder.checks,
        elapsed: start.elapsed().as_secs_f64(),
    };
    info!(passed = report.passed(), "consistency run finished");
    Ok(report)
}
