pub mod angle_interp;
pub mod axis_interp;
pub mod consistency;
pub mod error;
pub mod field;
pub mod fully_spectral;
pub mod grid;
pub mod gridded;
pub mod legendre;
pub mod logging;
pub mod quadrature;
pub mod scattering_data;
pub mod settings;
pub mod sht;
pub mod spectral;
pub mod synthetic;

pub use error::{FieldError, Result};
pub use field::{
    DataFormat, FullySpectralField, GriddedField, ParticleType, ScatteringDataField,
    SpectralField,
};
pub use grid::Axis;
pub use scattering_data::ScatteringData;
pub use sht::ShtEngine;
