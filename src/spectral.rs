use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{s, Array3, Array4, ArrayD, ArrayViewD, Zip};
use num_complex::Complex64;
use tracing::debug;

use crate::axis_interp::AxisInterpolator;
use crate::error::{FieldError, Result};
use crate::field::{
    check_axes_equal, check_shape, component_count, into_standard, resize_last_axis,
    FullySpectralField, GriddedField, ParticleType,
};
use crate::grid::Axis;
use crate::sht::ShtEngine;


/// Scattering data expanded in spherical harmonics over the scattering direction.
///
/// Data layout is `[f, t, lon_inc, lat_inc, nlm_scat, pol]` with real-packed
/// coefficients of the shared scattering engine.
#[derive(Debug, Clone)]
pub struct SpectralField {
    frequencies: Axis,
    temperatures: Axis,
    lon_inc: Axis,
    lat_inc: Axis,
    sht_scat: Arc<ShtEngine>,
    data: Arc<ArrayD<Complex64>>,
}

impl SpectralField {
    pub fn new(
        frequencies: Axis,
        temperatures: Axis,
        lon_inc: Axis,
        lat_inc: Axis,
        sht_scat: Arc<ShtEngine>,
        data: ArrayD<Complex64>,
    ) -> Result<Self> {
        lon_inc.check_within(0.0, 2.0 * PI)?;
        lat_inc.check_within(0.0, PI)?;

        let n_pol = component_count("spectral data", 6, data.shape())?;
        check_shape(
            "spectral data",
            &[
                frequencies.len(),
                temperatures.len(),
                lon_inc.len(),
                lat_inc.len(),
                sht_scat.spectral_size(),
                n_pol,
            ],
            data.shape(),
        )?;

        Ok(Self {
            frequencies,
            temperatures,
            lon_inc,
            lat_inc,
            sht_scat,
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

    pub fn sht_scat(&self) -> &Arc<ShtEngine> {
        &self.sht_scat
    }

    pub fn data(&self) -> ArrayViewD<'_, Complex64> {
        self.data.view()
    }

    pub fn n_components(&self) -> usize {
        self.data.shape()[5]
    }

    pub fn particle_type(&self) -> ParticleType {
        ParticleType::from_sizes(self.lon_inc.len(), self.lat_inc.len(), self.sht_scat.n_lon())
    }

    fn with_data(&self, data: ArrayD<Complex64>) -> Self {
        Self {
            data: Arc::new(data),
            ..self.clone()
        }
    }

    /// Synthesizes the scattering angles on the engine's grid.
    pub fn to_gridded(&self) -> Result<GriddedField> {
        debug!(
            l_max = self.sht_scat.l_max(),
            m_max = self.sht_scat.m_max(),
            "transforming spectral field to gridded"
        );
        let sht = &self.sht_scat;
        let shape = self.data.shape();
        let (n_coeffs, n_pol) = (shape[4], shape[5]);
        let (n_lon, n_lat) = (sht.n_lon(), sht.n_lat());
        let batch: usize = shape[..4].iter().product();
        let source = self.data.to_shape((batch, n_coeffs, n_pol))?;

        let mut out = Array4::<f64>::zeros((batch, n_lon, n_lat, n_pol));
        Zip::from(out.outer_iter_mut())
            .and(source.outer_iter())
            .par_for_each(|mut spatial, coeffs| {
                for p in 0..n_pol {
                    sht.inverse_into(
                        coeffs.index_axis(ndarray::Axis(1), p),
                        spatial.index_axis_mut(ndarray::Axis(2), p),
                    );
                }
            });

        let data = out.into_shape_with_order(vec![
            shape[0], shape[1], shape[2], shape[3], n_lon, n_lat, n_pol,
        ])?;
        GriddedField::new(
            self.frequencies.clone(),
            self.temperatures.clone(),
            self.lon_inc.clone(),
            self.lat_inc.clone(),
            sht.grid().longitude_axis()?.renamed("lon_scat"),
            sht.grid().colatitude_axis()?.renamed("lat_scat"),
            data,
        )
    }

    /// Synthesizes the scattering angles on another `n_lat` x `n_lon` Gauss-Legendre grid.
    pub fn to_gridded_on(&self, n_lat: usize, n_lon: usize) -> Result<GriddedField> {
        let sht = ShtEngine::shared(self.sht_scat.l_max(), self.sht_scat.m_max(), n_lat, n_lon)?;
        self.to_spectral_with(sht)?.to_gridded()
    }

    /// Re-truncation to `(l_max, m_max)` on the current scattering grid.
    pub fn to_spectral_truncated(&self, l_max: usize, m_max: usize) -> Result<SpectralField> {
        if l_max == self.sht_scat.l_max() && m_max == self.sht_scat.m_max() {
            return Ok(self.clone());
        }
        let sht = ShtEngine::shared(l_max, m_max, self.sht_scat.n_lat(), self.sht_scat.n_lon())?;
        self.to_spectral_with(sht)
    }

    /// Copies the coefficients into the truncation of `sht`, zero-padding
    /// missing degrees and orders and dropping those beyond it.
    pub fn to_spectral_with(&self, sht: Arc<ShtEngine>) -> Result<SpectralField> {
        if *sht == *self.sht_scat {
            return Ok(Self {
                sht_scat: sht,
                ..self.clone()
            });
        }
        debug!(
            from_l_max = self.sht_scat.l_max(),
            from_m_max = self.sht_scat.m_max(),
            to_l_max = sht.l_max(),
            to_m_max = sht.m_max(),
            "re-truncating scattering coefficients"
        );
        let data = retruncate_scattering(&self.data, &self.sht_scat, &sht)?;
        Ok(Self {
            sht_scat: sht,
            data: Arc::new(data),
            ..self.clone()
        })
    }

    /// Transforms the incoming colatitude with the largest degree the incoming grid resolves.
    pub fn to_fully_spectral(&self) -> Result<FullySpectralField> {
        self.to_fully_spectral_truncated(self.lat_inc.len().saturating_sub(1))
    }

    pub fn to_fully_spectral_truncated(&self, l_max: usize) -> Result<FullySpectralField> {
        self.check_azimuthally_random()?;
        let sht_inc = ShtEngine::shared(l_max, 0, self.lat_inc.len(), 1)?;
        self.to_fully_spectral_with(sht_inc)
    }

    /// Complex transform of the incoming colatitude with an azimuthally symmetric engine.
    pub fn to_fully_spectral_with(&self, sht_inc: Arc<ShtEngine>) -> Result<FullySpectralField> {
        self.check_azimuthally_random()?;
        if !sht_inc.is_azimuthally_symmetric() {
            return Err(FieldError::UnsupportedConversion(
                "incoming engine must have m_max = 0 and one longitude".into(),
            ));
        }
        if !self.lat_inc.matches(sht_inc.latitude_grid()) {
            return Err(FieldError::UnsupportedConversion(format!(
                "incoming colatitudes are not the {}-point Gauss-Legendre grid",
                sht_inc.n_lat()
            )));
        }
        debug!(l_max_inc = sht_inc.l_max(), "transforming spectral field to fully spectral");

        let shape = self.data.shape();
        let (n_lat_inc, n_coeffs, n_pol) = (shape[3], shape[4], shape[5]);
        let batch = shape[0] * shape[1];
        let n_inc = sht_inc.spectral_size_complex();
        let source = self.data.to_shape((batch, 1, n_lat_inc, n_coeffs, n_pol))?;

        let mut out = Array4::<Complex64>::zeros((batch, n_inc, n_coeffs, n_pol));
        Zip::from(out.outer_iter_mut())
            .and(source.outer_iter())
            .par_for_each(|mut inc_coeffs, spatial| {
                for k in 0..n_coeffs {
                    for p in 0..n_pol {
                        sht_inc.forward_complex_into(
                            spatial.slice(s![.., .., k, p]),
                            inc_coeffs.slice_mut(s![.., k, p]),
                        );
                    }
                }
            });

        let data = out.into_shape_with_order(vec![shape[0], shape[1], n_inc, n_coeffs, n_pol])?;
        FullySpectralField::new(
            self.frequencies.clone(),
            self.temperatures.clone(),
            sht_inc,
            Arc::clone(&self.sht_scat),
            data,
        )
    }

    fn check_azimuthally_random(&self) -> Result<()> {
        if self.lon_inc.len() != 1 {
            return Err(FieldError::UnsupportedConversion(format!(
                "fully spectral form requires one incoming longitude, got {}",
                self.lon_inc.len()
            )));
        }
        Ok(())
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

    /// Interpolates onto new frequency, temperature and incoming-angle grids.
    /// The scattering coefficients keep their truncation.
    pub fn regrid(
        &self,
        frequencies: &Axis,
        temperatures: &Axis,
        lon_inc: &Axis,
        lat_inc: &Axis,
    ) -> Result<Self> {
        let field = self
            .interpolate_frequency(frequencies)?
            .interpolate_temperature(temperatures)?;
        let data = AxisInterpolator::new(&field.lon_inc, lon_inc).interpolate(field.data(), 2)?;
        let data = AxisInterpolator::new(&field.lat_inc, lat_inc).interpolate(data.view(), 3)?;
        Self::new(
            field.frequencies.clone(),
            field.temperatures.clone(),
            lon_inc.clone(),
            lat_inc.clone(),
            field.sht_scat.clone(),
            data,
        )
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        check_axes_equal("frequency", &self.frequencies, &other.frequencies)?;
        check_axes_equal("temperature", &self.temperatures, &other.temperatures)?;
        check_axes_equal("incoming longitude", &self.lon_inc, &other.lon_inc)?;
        check_axes_equal("incoming colatitude", &self.lat_inc, &other.lat_inc)?;
        if *self.sht_scat != *other.sht_scat {
            return Err(FieldError::IncompatibleFields(format!(
                "scattering engines differ: {:?} and {:?}",
                self.sht_scat, other.sht_scat
            )));
        }
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
        self.with_data(self.data.mapv(|c| c * factor))
    }

    pub fn resize_components(&self, n: usize) -> Self {
        self.with_data(resize_last_axis(&self.data, n.max(1)))
    }

    /// Integral over the scattering sphere, `sqrt(4 pi) Re c_00`, shape
    /// `[f, t, lon_inc, lat_inc, pol]`.
    pub fn integrate_scattering_angles(&self) -> Result<ArrayD<f64>> {
        let norm = (4.0 * PI).sqrt();
        Ok(self
            .data
            .index_axis(ndarray::Axis(4), 0)
            .mapv(|c| c.re * norm))
    }

    /// Scales every (f, t, incoming) slice so that the integral of the first
    /// polarization component equals `value`. Zero integrals are left unchanged.
    pub fn normalize(&self, value: f64) -> Result<Self> {
        let norm = (4.0 * PI).sqrt();
        let shape = self.data.shape();
        let batch: usize = shape[..4].iter().product();
        let mut data = (*self.data).clone();
        let mut slices = data
            .view_mut()
            .into_shape_with_order((batch, shape[4], shape[5]))?;
        slices.outer_iter_mut().for_each(|mut slice| {
            let integral = slice[[0, 0]].re * norm;
            if integral != 0.0 {
                let factor = value / integral;
                slice.mapv_inplace(|c| c * factor);
            }
        });
        Ok(self.with_data(data))
    }
}

/// Re-truncates the second-to-last (scattering coefficient) axis of a spectral tensor.
pub(crate) fn retruncate_scattering(
    data: &ArrayD<Complex64>,
    from: &ShtEngine,
    to: &ShtEngine,
) -> Result<ArrayD<Complex64>> {
    let shape = data.shape();
    let ndim = shape.len();
    let n_pol = shape[ndim - 1];
    let batch: usize = shape[..ndim - 2].iter().product();
    let source = data.to_shape((batch, shape[ndim - 2], n_pol))?;

    let mut out = Array3::<Complex64>::zeros((batch, to.spectral_size(), n_pol));
    Zip::from(out.outer_iter_mut())
        .and(source.outer_iter())
        .par_for_each(|mut target, coeffs| {
            for p in 0..n_pol {
                from.retruncate_into(
                    coeffs.index_axis(ndarray::Axis(1), p),
                    to,
                    target.index_axis_mut(ndarray::Axis(1), p),
                );
            }
        });

    let mut new_shape = shape.to_vec();
    new_shape[ndim - 2] = to.spectral_size();
    Ok(out.into_shape_with_order(new_shape)?)
}
