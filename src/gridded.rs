use std::f64::consts::PI;
use std::sync::Arc;

use itertools::iproduct;
use ndarray::{s, Array1, Array2, Array3, ArrayD, ArrayViewD, Zip};
use num_complex::Complex64;
use tracing::debug;

use crate::angle_interp::AngleInterpolator;
use crate::axis_interp::AxisInterpolator;
use crate::error::{FieldError, Result};
use crate::field::{
    check_axes_equal, check_shape, component_count, into_standard, resize_last_axis,
    FullySpectralField, ParticleType, SpectralField,
};
use crate::grid::Axis;
use crate::quadrature::gauss_legendre;
use crate::sht::ShtEngine;


/// Scattering data sampled on explicit angular grids.
///
/// Data layout is `[f, t, lon_inc, lat_inc, lon_scat, lat_scat, pol]` with
/// real values. Longitudes lie in [0, 2 pi] and colatitudes in [0, pi].
#[derive(Debug, Clone)]
pub struct GriddedField {
    frequencies: Axis,
    temperatures: Axis,
    lon_inc: Axis,
    lat_inc: Axis,
    lon_scat: Axis,
    lat_scat: Axis,
    data: Arc<ArrayD<f64>>,
}

impl GriddedField {
    pub fn new(
        frequencies: Axis,
        temperatures: Axis,
        lon_inc: Axis,
        lat_inc: Axis,
        lon_scat: Axis,
        lat_scat: Axis,
        data: ArrayD<f64>,
    ) -> Result<Self> {
        lon_inc.check_within(0.0, 2.0 * PI)?;
        lat_inc.check_within(0.0, PI)?;
        lon_scat.check_within(0.0, 2.0 * PI)?;
        lat_scat.check_within(0.0, PI)?;

        let n_pol = component_count("gridded data", 7, data.shape())?;
        check_shape(
            "gridded data",
            &[
                frequencies.len(),
                temperatures.len(),
                lon_inc.len(),
                lat_inc.len(),
                lon_scat.len(),
                lat_scat.len(),
                n_pol,
            ],
            data.shape(),
        )?;

        Ok(Self {
            frequencies,
            temperatures,
            lon_inc,
            lat_inc,
            lon_scat,
            lat_scat,
            data: Arc::new(into_standard(data)),
        })
    }

    pub fn frequencies(&self) -> &Axis {
        &self.frequencies
    }

    pub fn temperatures(&self) -> &Axis {
        &self.temperatures
    }

    pub fn lon_inc(&self) -> &Axis {
        &self.lon_inc
    }

    pub fn lat_inc(&self) -> &Axis {
        &self.lat_inc
    }

    pub fn lon_scat(&self) -> &Axis {
        &self.lon_scat
    }

    pub fn lat_scat(&self) -> &Axis {
        &self.lat_scat
    }

    pub fn data(&self) -> ArrayViewD<'_, f64> {
        self.data.view()
    }

    pub fn n_components(&self) -> usize {
        self.data.shape()[6]
    }

    pub fn particle_type(&self) -> ParticleType {
        ParticleType::from_sizes(self.lon_inc.len(), self.lat_inc.len(), self.lon_scat.len())
    }

    fn with_data(&self, data: ArrayD<f64>) -> Self {
        Self {
            data: Arc::new(data),
            ..self.clone()
        }
    }

    /// Transforms with the largest truncation the scattering grid resolves.
    pub fn to_spectral(&self) -> Result<SpectralField> {
        let sht = ShtEngine::for_grid(self.lat_scat.len(), self.lon_scat.len())?;
        self.to_spectral_with(Arc::new(sht))
    }

    pub fn to_spectral_truncated(&self, l_max: usize, m_max: usize) -> Result<SpectralField> {
        let sht = ShtEngine::new(l_max, m_max, self.lat_scat.len(), self.lon_scat.len())?;
        self.to_spectral_with(Arc::new(sht))
    }

    /// Forward transform of the scattering angles with a given engine.
    ///
    /// The scattering grid must be the engine's Gauss-Legendre colatitudes and
    /// equispaced longitudes.
    pub fn to_spectral_with(&self, sht: Arc<ShtEngine>) -> Result<SpectralField> {
        if !self.lat_scat.matches(sht.latitude_grid()) {
            return Err(FieldError::UnsupportedConversion(format!(
                "scattering colatitudes are not the {}-point Gauss-Legendre grid",
                sht.n_lat()
            )));
        }
        if !self.lon_scat.matches(sht.longitude_grid()) {
            return Err(FieldError::UnsupportedConversion(format!(
                "scattering longitudes are not the {}-point equispaced grid",
                sht.n_lon()
            )));
        }
        debug!(
            l_max = sht.l_max(),
            m_max = sht.m_max(),
            "transforming gridded field to spectral"
        );

        let shape = self.data.shape();
        let (n_lon, n_lat, n_pol) = (shape[4], shape[5], shape[6]);
        let batch: usize = shape[..4].iter().product();
        let n_coeffs = sht.spectral_size();
        let source = self.data.to_shape((batch, n_lon, n_lat, n_pol))?;

        let mut out = Array3::<Complex64>::zeros((batch, n_coeffs, n_pol));
        Zip::from(out.outer_iter_mut())
            .and(source.outer_iter())
            .par_for_each(|mut coeffs, spatial| {
                for p in 0..n_pol {
                    sht.forward_into(
                        spatial.index_axis(ndarray::Axis(2), p),
                        coeffs.index_axis_mut(ndarray::Axis(1), p),
                    );
                }
            });

        let data =
            out.into_shape_with_order(vec![shape[0], shape[1], shape[2], shape[3], n_coeffs, n_pol])?;
        SpectralField::new(
            self.frequencies.clone(),
            self.temperatures.clone(),
            self.lon_inc.clone(),
            self.lat_inc.clone(),
            sht,
            data,
        )
    }

    pub fn to_fully_spectral(&self) -> Result<FullySpectralField> {
        self.to_spectral()?.to_fully_spectral()
    }

    pub fn interpolate_frequency(&self, targets: &Axis) -> Result<Self> {
        let data = AxisInterpolator::new(&self.frequencies, targets).interpolate(self.data(), 0)?;
        Ok(Self {
            frequencies: targets.clone(),
            ..self.with_data(data)
        })
    }

    pub fn interpolate_temperature(&self, targets: &Axis) -> Result<Self> {
        let data = AxisInterpolator::new(&self.temperatures, targets).interpolate(self.data(), 1)?;
        Ok(Self {
            temperatures: targets.clone(),
            ..self.with_data(data)
        })
    }

    /// Multilinear interpolation onto new incoming and scattering angle grids.
    pub fn interpolate_angles(
        &self,
        lon_inc: &Axis,
        lat_inc: &Axis,
        lon_scat: &Axis,
        lat_scat: &Axis,
    ) -> Result<Self> {
        let interpolator = AngleInterpolator::new(
            [&self.lon_inc, &self.lat_inc, &self.lon_scat, &self.lat_scat],
            [lon_inc, lat_inc, lon_scat, lat_scat],
        );
        let data = interpolator.interpolate(self.data())?;
        Self::new(
            self.frequencies.clone(),
            self.temperatures.clone(),
            lon_inc.clone(),
            lat_inc.clone(),
            lon_scat.clone(),
            lat_scat.clone(),
            data,
        )
    }

    /// Interpolates onto new frequency, temperature and angle grids at once.
    pub fn regrid(
        &self,
        frequencies: &Axis,
        temperatures: &Axis,
        lon_inc: &Axis,
        lat_inc: &Axis,
        lon_scat: &Axis,
        lat_scat: &Axis,
    ) -> Result<Self> {
        self.interpolate_frequency(frequencies)?
            .interpolate_temperature(temperatures)?
            .interpolate_angles(lon_inc, lat_inc, lon_scat, lat_scat)
    }

    /// Averages the scattering angles onto coarser grids.
    ///
    /// Every grid point owns a cell whose size is its integration weight, the
    /// cells laid end to end over the longitude circle and over cos(theta) from
    /// the north pole. A new value is the overlap-weighted mean of the old cells
    /// under its own cell, so [`Self::integrate_scattering_angles`] is unchanged.
    pub fn downsample_scattering_angles(&self, lon_scat: &Axis, lat_scat: &Axis) -> Result<Self> {
        lon_scat.check_within(0.0, 2.0 * PI)?;
        lat_scat.check_within(0.0, PI)?;
        debug!(
            n_lon = lon_scat.len(),
            n_lat = lat_scat.len(),
            "downsampling scattering angles"
        );

        let lon_matrix = overlap_matrix(
            &cells(longitude_start(&self.lon_scat), &longitude_weights(&self.lon_scat)),
            &cells(longitude_start(lon_scat), &longitude_weights(lon_scat)),
            Some(2.0 * PI),
        );
        let lat_matrix = overlap_matrix(
            &cells(0.0, &colatitude_weights(&self.lat_scat)),
            &cells(0.0, &colatitude_weights(lat_scat)),
            None,
        );
        let data = apply_along_axis(self.data(), 4, &lon_matrix)?;
        let data = apply_along_axis(data.view(), 5, &lat_matrix)?;
        Ok(Self {
            lon_scat: lon_scat.clone(),
            lat_scat: lat_scat.clone(),
            ..self.with_data(data)
        })
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        check_axes_equal("frequency", &self.frequencies, &other.frequencies)?;
        check_axes_equal("temperature", &self.temperatures, &other.temperatures)?;
        check_axes_equal("incoming longitude", &self.lon_inc, &other.lon_inc)?;
        check_axes_equal("incoming colatitude", &self.lat_inc, &other.lat_inc)?;
        check_axes_equal("scattering longitude", &self.lon_scat, &other.lon_scat)?;
        check_axes_equal("scattering colatitude", &self.lat_scat, &other.lat_scat)?;
        if self.data.shape() != other.data.shape() {
            return Err(FieldError::IncompatibleFields(format!(
                "data shapes differ: {:?} and {:?}",
                self.data.shape(),
                other.data.shape()
            )));
        }
        Ok(self.with_data(&*self.data + &*other.data))
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.with_data(self.data.mapv(|v| v * factor))
    }

    /// New field with `n` polarization components, zero-padded or truncated.
    pub fn resize_components(&self, n: usize) -> Self {
        self.with_data(resize_last_axis(&self.data, n.max(1)))
    }

    /// Integral over the scattering sphere, shape `[f, t, lon_inc, lat_inc, pol]`.
    ///
    /// Longitudes use the periodic trapezoidal rule. Colatitudes use
    /// Gauss-Legendre weights when the grid is a Gauss-Legendre grid and the
    /// trapezoidal rule in cos(theta) otherwise, with the values at the first and
    /// last colatitude extended to the poles.
    pub fn integrate_scattering_angles(&self) -> Result<ArrayD<f64>> {
        let lon_weights = longitude_weights(&self.lon_scat);
        let lat_weights = colatitude_weights(&self.lat_scat);
        let shape = self.data.shape();
        let (n_lon, n_lat, n_pol) = (shape[4], shape[5], shape[6]);
        let batch: usize = shape[..4].iter().product();
        let source = self.data.to_shape((batch, n_lon, n_lat, n_pol))?;

        let mut integrals = Array2::<f64>::zeros((batch, n_pol));
        Zip::from(integrals.outer_iter_mut())
            .and(source.outer_iter())
            .par_for_each(|mut acc, spatial| {
                for (k, j) in iproduct!(0..n_lon, 0..n_lat) {
                    acc.scaled_add(
                        lon_weights[k] * lat_weights[j],
                        &spatial.slice(s![k, j, ..]),
                    );
                }
            });

        Ok(integrals.into_shape_with_order(vec![shape[0], shape[1], shape[2], shape[3], n_pol])?)
    }

    /// Scales every (f, t, incoming) slice so that the scattering-angle integral
    /// of the first polarization component equals `value`. Slices with a zero
    /// integral are left unchanged.
    pub fn normalize(&self, value: f64) -> Result<Self> {
        let integrals = self.integrate_scattering_angles()?;
        let shape = self.data.shape();
        let batch: usize = shape[..4].iter().product();
        let rest: usize = shape[4..].iter().product();
        let integrals = integrals.into_shape_with_order((batch, shape[6]))?;

        let mut data = (*self.data).clone();
        let mut slices = data.view_mut().into_shape_with_order((batch, rest))?;
        Zip::from(slices.outer_iter_mut())
            .and(integrals.outer_iter())
            .par_for_each(|mut slice, integral| {
                if integral[0] != 0.0 {
                    slice *= value / integral[0];
                }
            });
        Ok(self.with_data(data))
    }
}

/// Periodic trapezoidal weights of a longitude grid. A single longitude carries 2 pi.
fn longitude_weights(lon: &Axis) -> Array1<f64> {
    let values = lon.as_slice();
    let n = values.len();
    if n == 1 {
        return Array1::from_elem(1, 2.0 * PI);
    }
    Array1::from_shape_fn(n, |i| {
        let next = if i + 1 < n {
            values[i + 1]
        } else {
            values[0] + 2.0 * PI
        };
        let prev = if i > 0 {
            values[i - 1]
        } else {
            values[n - 1] - 2.0 * PI
        };
        0.5 * (next - prev)
    })
}

/// Integration weights in cos(theta) of a colatitude grid.
fn colatitude_weights(lat: &Axis) -> Array1<f64> {
    let n = lat.len();
    let (nodes, weights) = gauss_legendre(n);
    if lat.matches(nodes.mapv(f64::acos).view()) {
        return weights;
    }
    if n == 1 {
        return Array1::from_elem(1, 2.0);
    }

    let x: Vec<f64> = lat.as_slice().iter().map(|t| t.cos()).collect();
    let mut w = Array1::zeros(n);
    for i in 0..n - 1 {
        let half = 0.5 * (x[i] - x[i + 1]);
        w[i] += half;
        w[i + 1] += half;
    }
    w[0] += 1.0 - x[0];
    w[n - 1] += x[n - 1] + 1.0;
    w
}

/// Lower edge of the first longitude cell, halfway back to the last node.
fn longitude_start(lon: &Axis) -> f64 {
    0.5 * (lon.first() + lon.last()) - PI
}

fn cells(start: f64, sizes: &Array1<f64>) -> Vec<(f64, f64)> {
    sizes
        .iter()
        .scan(start, |lower, &size| {
            let cell = (*lower, *lower + size);
            *lower += size;
            Some(cell)
        })
        .collect()
}

/// Overlap of every old cell with every new cell, divided by the new cell size.
/// With a period the cells wrap around; starts lie within half a period of zero.
fn overlap_matrix(old: &[(f64, f64)], new: &[(f64, f64)], period: Option<f64>) -> Array2<f64> {
    let shifts: Vec<f64> = match period {
        Some(p) => (-2..=2).map(|k| k as f64 * p).collect(),
        None => vec![0.0],
    };
    Array2::from_shape_fn((new.len(), old.len()), |(j, i)| {
        let (lower, upper) = new[j];
        let overlap: f64 = shifts
            .iter()
            .map(|shift| (upper.min(old[i].1 + shift) - lower.max(old[i].0 + shift)).max(0.0))
            .sum();
        overlap / (upper - lower)
    })
}

/// Contracts `axis` of `data` with `matrix`, `out[.., j, ..] = sum_i matrix[j, i] data[.., i, ..]`.
fn apply_along_axis(data: ArrayViewD<f64>, axis: usize, matrix: &Array2<f64>) -> Result<ArrayD<f64>> {
    let mut shape = data.shape().to_vec();
    let outer: usize = shape[..axis].iter().product();
    let inner: usize = shape[axis + 1..].iter().product();
    let source = data.to_shape((outer, shape[axis], inner))?;

    let mut out = Array3::<f64>::zeros((outer, matrix.nrows(), inner));
    Zip::from(out.outer_iter_mut())
        .and(source.outer_iter())
        .par_for_each(|mut target, slice| target.assign(&matrix.dot(&slice)));

    shape[axis] = matrix.nrows();
    Ok(out.into_shape_with_order(shape)?)
}
