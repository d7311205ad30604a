use std::sync::Arc;

use ndarray::{s, Array5, ArrayD, ArrayViewD, Zip};
use num_complex::Complex64;
use tracing::debug;

use crate::axis_interp::AxisInterpolator;
use crate::error::{FieldError, Result};
use crate::field::{
    check_axes_equal, check_shape, component_count, into_standard, resize_last_axis, GriddedField,
    ParticleType, SpectralField,
};
use crate::grid::Axis;
use crate::sht::ShtEngine;
use crate::spectral::retruncate_scattering;


/// Scattering data expanded in spherical harmonics over both the incoming and
/// the scattering direction.
///
/// Data layout is `[f, t, nlm_inc, nlm_scat, pol]`. The incoming coefficients
/// use the complex-packed layout of an azimuthally symmetric engine
/// (`m_max = 0`, one longitude), so this form only exists for azimuthally
/// random media.
#[derive(Debug, Clone)]
pub struct FullySpectralField {
    frequencies: Axis,
    temperatures: Axis,
    sht_inc: Arc<ShtEngine>,
    sht_scat: Arc<ShtEngine>,
    data: Arc<ArrayD<Complex64>>,
}

impl FullySpectralField {
    pub fn new(
        frequencies: Axis,
        temperatures: Axis,
        sht_inc: Arc<ShtEngine>,
        sht_scat: Arc<ShtEngine>,
        data: ArrayD<Complex64>,
    ) -> Result<Self> {
        if !sht_inc.is_azimuthally_symmetric() {
            return Err(FieldError::UnsupportedConversion(format!(
                "fully spectral fields need an azimuthally symmetric incoming engine, got {:?}",
                sht_inc
            )));
        }
        let n_pol = component_count("fully spectral data", 5, data.shape())?;
        check_shape(
            "fully spectral data",
            &[
                frequencies.len(),
                temperatures.len(),
                sht_inc.spectral_size_complex(),
                sht_scat.spectral_size(),
                n_pol,
            ],
            data.shape(),
        )?;

        Ok(Self {
            frequencies,
            temperatures,
            sht_inc,
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

    pub fn sht_inc(&self) -> &Arc<ShtEngine> {
        &self.sht_inc
    }

    pub fn sht_scat(&self) -> &Arc<ShtEngine> {
        &self.sht_scat
    }

    pub fn data(&self) -> ArrayViewD<'_, Complex64> {
        self.data.view()
    }

    pub fn n_components(&self) -> usize {
        self.data.shape()[4]
    }

    pub fn particle_type(&self) -> ParticleType {
        ParticleType::from_sizes(1, self.sht_inc.n_lat(), self.sht_scat.n_lon())
    }

    fn with_data(&self, data: ArrayD<Complex64>) -> Self {
        Self {
            data: Arc::new(data),
            ..self.clone()
        }
    }

    /// Synthesizes the incoming angle on the incoming engine's grid.
    pub fn to_spectral(&self) -> Result<SpectralField> {
        debug!(
            l_max_inc = self.sht_inc.l_max(),
            n_lat_inc = self.sht_inc.n_lat(),
            "transforming fully spectral field to spectral"
        );
        let sht_inc = &self.sht_inc;
        let shape = self.data.shape();
        let (n_inc, n_coeffs, n_pol) = (shape[2], shape[3], shape[4]);
        let (n_lon_inc, n_lat_inc) = (sht_inc.n_lon(), sht_inc.n_lat());
        let batch = shape[0] * shape[1];
        let source = self.data.to_shape((batch, n_inc, n_coeffs, n_pol))?;

        let mut out = Array5::<Complex64>::zeros((batch, n_lon_inc, n_lat_inc, n_coeffs, n_pol));
        Zip::from(out.outer_iter_mut())
            .and(source.outer_iter())
            .par_for_each(|mut spatial, inc_coeffs| {
                for k in 0..n_coeffs {
                    for p in 0..n_pol {
                        sht_inc.inverse_complex_into(
                            inc_coeffs.slice(s![.., k, p]),
                            spatial.slice_mut(s![.., .., k, p]),
                        );
                    }
                }
            });

        let data = out.into_shape_with_order(vec![
            shape[0], shape[1], n_lon_inc, n_lat_inc, n_coeffs, n_pol,
        ])?;
        SpectralField::new(
            self.frequencies.clone(),
            self.temperatures.clone(),
            sht_inc.grid().longitude_axis()?.renamed("lon_inc"),
            sht_inc.grid().colatitude_axis()?.renamed("lat_inc"),
            Arc::clone(&self.sht_scat),
            data,
        )
    }

    /// Re-truncates the scattering coefficients to `(l_max, m_max)` on the
    /// current scattering grid, then synthesizes the incoming angle.
    pub fn to_spectral_truncated(&self, l_max: usize, m_max: usize) -> Result<SpectralField> {
        if l_max == self.sht_scat.l_max() && m_max == self.sht_scat.m_max() {
            return self.to_spectral();
        }
        let sht = ShtEngine::shared(l_max, m_max, self.sht_scat.n_lat(), self.sht_scat.n_lon())?;
        self.to_spectral_with(sht)
    }

    pub fn to_spectral_with(&self, sht_scat: Arc<ShtEngine>) -> Result<SpectralField> {
        if *sht_scat == *self.sht_scat {
            return self.to_spectral();
        }
        let data = retruncate_scattering(&self.data, &self.sht_scat, &sht_scat)?;
        Self {
            sht_scat,
            data: Arc::new(data),
            ..self.clone()
        }
        .to_spectral()
    }

    pub fn to_gridded(&self) -> Result<GriddedField> {
        self.to_spectral()?.to_gridded()
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

    pub fn add(&self, other: &Self) -> Result<Self> {
        check_axes_equal("frequency", &self.frequencies, &other.frequencies)?;
        check_axes_equal("temperature", &self.temperatures, &other.temperatures)?;
        if *self.sht_inc != *other.sht_inc || *self.sht_scat != *other.sht_scat {
            return Err(FieldError::IncompatibleFields(format!(
                "engines differ: ({:?}, {:?}) and ({:?}, {:?})",
                self.sht_inc, self.sht_scat, other.sht_inc, other.sht_scat
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
}
