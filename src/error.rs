//! Error types for the scatfield crate.

/// Error type for all fallible operations on transforms and scattering fields.
///
/// Every variant is raised synchronously and deterministically. No operation
/// returns a partial result alongside an error.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// Returned when a spherical harmonics truncation cannot be resolved by, or
    /// is inconsistent with, the requested grid.
    #[error("invalid truncation (l_max = {l_max}, m_max = {m_max}): {reason}")]
    InvalidTruncation {
        /// Requested maximum degree.
        l_max: usize,
        /// Requested maximum order.
        m_max: usize,
        /// Which constraint was violated.
        reason: &'static str,
    },

    /// Returned when a tensor or vector does not have the size implied by its axes.
    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Name of the offending input.
        what: &'static str,
        /// Shape implied by the axes or the engine.
        expected: Vec<usize>,
        /// Shape that was provided.
        actual: Vec<usize>,
    },

    /// Returned when two fields cannot be combined elementwise.
    #[error("incompatible fields: {0}")]
    IncompatibleFields(String),

    /// Returned when a spectral expansion is evaluated at an invalid colatitude.
    #[error("evaluation point {index} has colatitude {colatitude} outside [0, pi]")]
    OutOfRangeEvaluation {
        /// Row of the offending point.
        index: usize,
        /// The colatitude that was supplied.
        colatitude: f64,
    },

    /// Returned when a representation change is not possible for the given field.
    #[error("unsupported conversion: {0}")]
    UnsupportedConversion(String),

    /// Returned when a coordinate axis is empty, unsorted or non-finite.
    #[error("invalid axis `{name}`: {reason}")]
    InvalidAxis {
        /// Name of the axis.
        name: &'static str,
        /// Which constraint was violated.
        reason: String,
    },

    /// Returned when an internal reshape of a data tensor fails.
    #[error("tensor layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, FieldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_invalid_truncation() {
        let err = FieldError::InvalidTruncation {
            l_max: 3,
            m_max: 5,
            reason: "m_max exceeds l_max",
        };
        assert_eq!(
            err.to_string(),
            "invalid truncation (l_max = 3, m_max = 5): m_max exceeds l_max"
        );
    }

    #[test]
    fn error_shape_mismatch() {
        let err = FieldError::ShapeMismatch {
            what: "coefficients",
            expected: vec![10],
            actual: vec![9],
        };
        assert_eq!(
            err.to_string(),
            "shape mismatch for coefficients: expected [10], got [9]"
        );
    }

    #[test]
    fn error_out_of_range() {
        let err = FieldError::OutOfRangeEvaluation {
            index: 2,
            colatitude: 4.0,
        };
        assert_eq!(
            err.to_string(),
            "evaluation point 2 has colatitude 4 outside [0, pi]"
        );
    }

    #[test]
    fn error_invalid_axis() {
        let err = FieldError::InvalidAxis {
            name: "frequency",
            reason: "values must be strictly increasing".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid axis `frequency`: values must be strictly increasing"
        );
    }

    #[test]
    fn error_incompatible_and_unsupported() {
        let err = FieldError::IncompatibleFields("formats differ".into());
        assert_eq!(err.to_string(), "incompatible fields: formats differ");
        let err = FieldError::UnsupportedConversion("grid is not gaussian".into());
        assert_eq!(
            err.to_string(),
            "unsupported conversion: grid is not gaussian"
        );
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync + std::error::Error>() {}
        assert_impl::<FieldError>();
    }
}
