//! Single-scattering properties of one particle bundled in a common representation.

use crate::error::{FieldError, Result};
use crate::field::{check_axes_equal, DataFormat, ScatteringDataField};
use crate::grid::Axis;


/// Phase matrix, extinction matrix, absorption vector and the backward and
/// forward scattering coefficients of one particle.
///
/// All members share one representation and the same frequency and
/// temperature grids. Operations apply to every member.
#[derive(Debug, Clone)]
pub struct ScatteringData {
    phase_matrix: ScatteringDataField,
    extinction_matrix: ScatteringDataField,
    absorption_vector: ScatteringDataField,
    backscattering_coeff: ScatteringDataField,
    forward_scattering_coeff: ScatteringDataField,
}

impl ScatteringData {
    pub fn new(
        phase_matrix: ScatteringDataField,
        extinction_matrix: ScatteringDataField,
        absorption_vector: ScatteringDataField,
        backscattering_coeff: ScatteringDataField,
        forward_scattering_coeff: ScatteringDataField,
    ) -> Result<Self> {
        let data = Self {
            phase_matrix,
            extinction_matrix,
            absorption_vector,
            backscattering_coeff,
            forward_scattering_coeff,
        };
        data.check_members()?;
        Ok(data)
    }

    fn check_members(&self) -> Result<()> {
        let reference = &self.phase_matrix;
        for field in &self.fields()[1..] {
            if field.format() != reference.format() {
                return Err(FieldError::IncompatibleFields(format!(
                    "{} member in {} scattering data",
                    field.format(),
                    reference.format()
                )));
            }
            check_axes_equal("frequency", reference.frequencies(), field.frequencies())?;
            check_axes_equal("temperature", reference.temperatures(), field.temperatures())?;
        }
        Ok(())
    }

    /// Members in the order phase matrix, extinction matrix, absorption
    /// vector, backscattering and forward scattering.
    pub fn fields(&self) -> [&ScatteringDataField; 5] {
        [
            &self.phase_matrix,
            &self.extinction_matrix,
            &self.absorption_vector,
            &self.backscattering_coeff,
            &self.forward_scattering_coeff,
        ]
    }

    pub fn phase_matrix(&self) -> &ScatteringDataField {
        &self.phase_matrix
    }

    pub fn extinction_matrix(&self) -> &ScatteringDataField {
        &self.extinction_matrix
    }

    pub fn absorption_vector(&self) -> &ScatteringDataField {
        &self.absorption_vector
    }

    pub fn backscattering_coeff(&self) -> &ScatteringDataField {
        &self.backscattering_coeff
    }

    pub fn forward_scattering_coeff(&self) -> &ScatteringDataField {
        &self.forward_scattering_coeff
    }

    pub fn format(&self) -> DataFormat {
        self.phase_matrix.format()
    }

    pub fn frequencies(&self) -> &Axis {
        self.phase_matrix.frequencies()
    }

    pub fn temperatures(&self) -> &Axis {
        self.phase_matrix.temperatures()
    }

    fn try_map<F>(&self, f: F) -> Result<Self>
    where
        F: Fn(&ScatteringDataField) -> Result<ScatteringDataField>,
    {
        Self::new(
            f(&self.phase_matrix)?,
            f(&self.extinction_matrix)?,
            f(&self.absorption_vector)?,
            f(&self.backscattering_coeff)?,
            f(&self.forward_scattering_coeff)?,
        )
    }

    pub fn to_gridded(&self) -> Result<Self> {
        self.try_map(|field| Ok(field.to_gridded()?.into()))
    }

    pub fn to_spectral(&self) -> Result<Self> {
        self.try_map(|field| Ok(field.to_spectral()?.into()))
    }

    pub fn to_fully_spectral(&self) -> Result<Self> {
        self.try_map(|field| Ok(field.to_fully_spectral()?.into()))
    }

    pub fn interpolate_frequency(&self, targets: &Axis) -> Result<Self> {
        self.try_map(|field| field.interpolate_frequency(targets))
    }

    pub fn interpolate_temperature(&self, targets: &Axis) -> Result<Self> {
        self.try_map(|field| field.interpolate_temperature(targets))
    }

    /// Memberwise sum, e.g. of two particle species on the same grids.
    pub fn add(&self, other: &Self) -> Result<Self> {
        let [a0, a1, a2, a3, a4] = self.fields();
        let [b0, b1, b2, b3, b4] = other.fields();
        Self::new(a0.add(b0)?, a1.add(b1)?, a2.add(b2)?, a3.add(b3)?, a4.add(b4)?)
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self {
            phase_matrix: self.phase_matrix.scale(factor),
            extinction_matrix: self.extinction_matrix.scale(factor),
            absorption_vector: self.absorption_vector.scale(factor),
            backscattering_coeff: self.backscattering_coeff.scale(factor),
            forward_scattering_coeff: self.forward_scattering_coeff.scale(factor),
        }
    }
}
