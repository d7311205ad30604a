//! Scattering data fields and their three interchangeable representations.
//!
//! A scattering data field holds a quantity such as the phase matrix over
//! frequency, temperature, incoming direction and scattering direction. The
//! same field can be encoded as
//!
//! - [`GriddedField`]: real values on explicit angular grids,
//!   `[f, t, lon_inc, lat_inc, lon_scat, lat_scat, pol]`,
//! - [`SpectralField`]: spherical harmonic coefficients over the scattering
//!   direction, `[f, t, lon_inc, lat_inc, nlm_scat, pol]`,
//! - [`FullySpectralField`]: coefficients over both directions,
//!   `[f, t, nlm_inc, nlm_scat, pol]`, for azimuthally random media.
//!
//! [`ScatteringDataField`] is the tagged union used when the representation is
//! only known at runtime. Every operation returns a new field; tensors are
//! shared behind `Arc`, so clones are cheap.
//!
//! # Operations
//!
//! - Conversions between representations (`to_gridded`, `to_spectral`,
//!   `to_fully_spectral`)
//! - Frequency and temperature interpolation, preserving the representation
//! - Angle interpolation and integral-conserving downsampling, on gridded
//!   fields only
//! - Elementwise `add` and `scale`
//! - Integration over scattering angles

use std::fmt;

use ndarray::{ArrayD, ArrayViewD, Slice};
use num_complex::Complex64;
use serde::Serialize;

pub use crate::fully_spectral::FullySpectralField;
pub use crate::gridded::GriddedField;
pub use crate::spectral::SpectralField;

use crate::error::{FieldError, Result};
use crate::grid::Axis;


/// Representation of a scattering data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataFormat {
    Gridded,
    Spectral,
    FullySpectral,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Gridded => write!(f, "gridded"),
            DataFormat::Spectral => write!(f, "spectral"),
            DataFormat::FullySpectral => write!(f, "fully spectral"),
        }
    }
}

/// Symmetry class of the scattering medium implied by the angular grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParticleType {
    /// Totally random orientation: the field only depends on the scattering angle.
    Random,
    /// Azimuthally random orientation: no dependence on the incoming longitude.
    AzimuthallyRandom,
    General,
}

impl ParticleType {
    pub fn from_sizes(n_lon_inc: usize, n_lat_inc: usize, n_lon_scat: usize) -> Self {
        if n_lon_inc == 1 && n_lat_inc == 1 && n_lon_scat == 1 {
            ParticleType::Random
        } else if n_lon_inc == 1 {
            ParticleType::AzimuthallyRandom
        } else {
            ParticleType::General
        }
    }
}

impl fmt::Display for ParticleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticleType::Random => write!(f, "random"),
            ParticleType::AzimuthallyRandom => write!(f, "azimuthally random"),
            ParticleType::General => write!(f, "general"),
        }
    }
}

/// Read-only view of a field tensor, real for gridded fields and complex otherwise.
#[derive(Debug, Clone)]
pub enum FieldData<'a> {
    Real(ArrayViewD<'a, f64>),
    Complex(ArrayViewD<'a, Complex64>),
}

impl<'a> FieldData<'a> {
    pub fn shape(&self) -> &[usize] {
        match self {
            FieldData::Real(data) => data.shape(),
            FieldData::Complex(data) => data.shape(),
        }
    }

    pub fn as_real(&self) -> Option<&ArrayViewD<'a, f64>> {
        match self {
            FieldData::Real(data) => Some(data),
            FieldData::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ArrayViewD<'a, Complex64>> {
        match self {
            FieldData::Real(_) => None,
            FieldData::Complex(data) => Some(data),
        }
    }
}

/// A scattering data field in any of its three representations.
#[derive(Debug, Clone)]
pub enum ScatteringDataField {
    Gridded(GriddedField),
    Spectral(SpectralField),
    FullySpectral(FullySpectralField),
}

impl From<GriddedField> for ScatteringDataField {
    fn from(field: GriddedField) -> Self {
        ScatteringDataField::Gridded(field)
    }
}

impl From<SpectralField> for ScatteringDataField {
    fn from(field: SpectralField) -> Self {
        ScatteringDataField::Spectral(field)
    }
}

impl From<FullySpectralField> for ScatteringDataField {
    fn from(field: FullySpectralField) -> Self {
        ScatteringDataField::FullySpectral(field)
    }
}

impl ScatteringDataField {
    pub fn format(&self) -> DataFormat {
        match self {
            ScatteringDataField::Gridded(_) => DataFormat::Gridded,
            ScatteringDataField::Spectral(_) => DataFormat::Spectral,
            ScatteringDataField::FullySpectral(_) => DataFormat::FullySpectral,
        }
    }

    pub fn particle_type(&self) -> ParticleType {
        match self {
            ScatteringDataField::Gridded(field) => field.particle_type(),
            ScatteringDataField::Spectral(field) => field.particle_type(),
            ScatteringDataField::FullySpectral(field) => field.particle_type(),
        }
    }

    pub fn frequencies(&self) -> &Axis {
        match self {
            ScatteringDataField::Gridded(field) => field.frequencies(),
            ScatteringDataField::Spectral(field) => field.frequencies(),
            ScatteringDataField::FullySpectral(field) => field.frequencies(),
        }
    }

    pub fn temperatures(&self) -> &Axis {
        match self {
            ScatteringDataField::Gridded(field) => field.temperatures(),
            ScatteringDataField::Spectral(field) => field.temperatures(),
            ScatteringDataField::FullySpectral(field) => field.temperatures(),
        }
    }

    pub fn n_components(&self) -> usize {
        match self {
            ScatteringDataField::Gridded(field) => field.n_components(),
            ScatteringDataField::Spectral(field) => field.n_components(),
            ScatteringDataField::FullySpectral(field) => field.n_components(),
        }
    }

    pub fn data(&self) -> FieldData<'_> {
        match self {
            ScatteringDataField::Gridded(field) => FieldData::Real(field.data()),
            ScatteringDataField::Spectral(field) => FieldData::Complex(field.data()),
            ScatteringDataField::FullySpectral(field) => FieldData::Complex(field.data()),
        }
    }

    /// The gridded field, if this is one. Angle interpolation is only available there.
    pub fn as_gridded(&self) -> Option<&GriddedField> {
        match self {
            ScatteringDataField::Gridded(field) => Some(field),
            _ => None,
        }
    }

    pub fn to_gridded(&self) -> Result<GriddedField> {
        match self {
            ScatteringDataField::Gridded(field) => Ok(field.clone()),
            ScatteringDataField::Spectral(field) => field.to_gridded(),
            ScatteringDataField::FullySpectral(field) => field.to_gridded(),
        }
    }

    pub fn to_spectral(&self) -> Result<SpectralField> {
        match self {
            ScatteringDataField::Gridded(field) => field.to_spectral(),
            ScatteringDataField::Spectral(field) => Ok(field.clone()),
            ScatteringDataField::FullySpectral(field) => field.to_spectral(),
        }
    }

    pub fn to_spectral_truncated(&self, l_max: usize, m_max: usize) -> Result<SpectralField> {
        match self {
            ScatteringDataField::Gridded(field) => field.to_spectral_truncated(l_max, m_max),
            ScatteringDataField::Spectral(field) => field.to_spectral_truncated(l_max, m_max),
            ScatteringDataField::FullySpectral(field) => field.to_spectral_truncated(l_max, m_max),
        }
    }

    pub fn to_fully_spectral(&self) -> Result<FullySpectralField> {
        match self {
            ScatteringDataField::Gridded(field) => field.to_fully_spectral(),
            ScatteringDataField::Spectral(field) => field.to_fully_spectral(),
            ScatteringDataField::FullySpectral(field) => Ok(field.clone()),
        }
    }

    pub fn interpolate_frequency(&self, targets: &Axis) -> Result<Self> {
        Ok(match self {
            ScatteringDataField::Gridded(field) => field.interpolate_frequency(targets)?.into(),
            ScatteringDataField::Spectral(field) => field.interpolate_frequency(targets)?.into(),
            ScatteringDataField::FullySpectral(field) => {
                field.interpolate_frequency(targets)?.into()
            }
        })
    }

    pub fn interpolate_temperature(&self, targets: &Axis) -> Result<Self> {
        Ok(match self {
            ScatteringDataField::Gridded(field) => field.interpolate_temperature(targets)?.into(),
            ScatteringDataField::Spectral(field) => field.interpolate_temperature(targets)?.into(),
            ScatteringDataField::FullySpectral(field) => {
                field.interpolate_temperature(targets)?.into()
            }
        })
    }

    /// Elementwise sum. Both fields must share representation, axes and truncations.
    pub fn add(&self, other: &Self) -> Result<Self> {
        match (self, other) {
            (ScatteringDataField::Gridded(a), ScatteringDataField::Gridded(b)) => {
                Ok(a.add(b)?.into())
            }
            (ScatteringDataField::Spectral(a), ScatteringDataField::Spectral(b)) => {
                Ok(a.add(b)?.into())
            }
            (ScatteringDataField::FullySpectral(a), ScatteringDataField::FullySpectral(b)) => {
                Ok(a.add(b)?.into())
            }
            _ => Err(FieldError::IncompatibleFields(format!(
                "cannot add {} field to {} field",
                other.format(),
                self.format()
            ))),
        }
    }

    pub fn scale(&self, factor: f64) -> Self {
        match self {
            ScatteringDataField::Gridded(field) => field.scale(factor).into(),
            ScatteringDataField::Spectral(field) => field.scale(factor).into(),
            ScatteringDataField::FullySpectral(field) => field.scale(factor).into(),
        }
    }

    /// Integral over the scattering sphere, shape `[f, t, lon_inc, lat_inc, pol]`.
    pub fn integrate_scattering_angles(&self) -> Result<ArrayD<f64>> {
        match self {
            ScatteringDataField::Gridded(field) => field.integrate_scattering_angles(),
            ScatteringDataField::Spectral(field) => field.integrate_scattering_angles(),
            ScatteringDataField::FullySpectral(field) => {
                field.to_spectral()?.integrate_scattering_angles()
            }
        }
    }
}

pub(crate) fn check_shape(what: &'static str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected != actual {
        return Err(FieldError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

/// Size of the trailing polarization axis, or an error for tensors of the wrong rank.
pub(crate) fn component_count(what: &'static str, rank: usize, shape: &[usize]) -> Result<usize> {
    match shape.last() {
        Some(&n) if shape.len() == rank && n > 0 => Ok(n),
        _ => {
            let mut expected = shape.to_vec();
            expected.resize(rank, 1);
            Err(FieldError::ShapeMismatch {
                what,
                expected,
                actual: shape.to_vec(),
            })
        }
    }
}

pub(crate) fn check_axes_equal(name: &str, a: &Axis, b: &Axis) -> Result<()> {
    if a != b {
        return Err(FieldError::IncompatibleFields(format!("{name} axes differ")));
    }
    Ok(())
}

pub(crate) fn into_standard<T: Clone>(data: ArrayD<T>) -> ArrayD<T> {
    if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().into_owned()
    }
}

/// Copies `data` into a tensor whose last axis has `n` entries, zero-padding or truncating.
pub(crate) fn resize_last_axis<T: Clone + Default>(data: &ArrayD<T>, n: usize) -> ArrayD<T> {
    let last = ndarray::Axis(data.ndim() - 1);
    let mut shape = data.shape().to_vec();
    let kept = n.min(shape[last.index()]);
    shape[last.index()] = n;
    let mut out = ArrayD::from_elem(shape, T::default());
    out.slice_axis_mut(last, Slice::from(0..kept))
        .assign(&data.slice_axis(last, Slice::from(0..kept)));
    out
}
