use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array1, ArrayView1};

use crate::error::{FieldError, Result};
use crate::quadrature::gauss_legendre;
use crate::settings::GRID_MATCH_TOLERANCE;

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rejects_unsorted_axis() {
        assert!(Axis::new("frequency", vec![1.0, 3.0, 2.0]).is_err());
        assert!(Axis::new("frequency", vec![1.0, 1.0]).is_err());
        assert!(Axis::new("frequency", Vec::new()).is_err());
        assert!(Axis::new("frequency", vec![0.0, f64::NAN]).is_err());
    }

    #[test]
    fn logspace_endpoints() {
        let axis = Axis::logspace("frequency", 9.0, 11.0, 11).unwrap();
        assert_eq!(axis.len(), 11);
        assert_abs_diff_eq!(axis.first(), 1e9, epsilon = 1e-3);
        assert_abs_diff_eq!(axis.last(), 1e11, epsilon = 1e-1);
    }

    #[test]
    fn angular_grid_layout() {
        let grid = AngularGrid::new(9, 4);
        assert_eq!(grid.colatitudes().len(), 9);
        assert_abs_diff_eq!(grid.colatitudes()[4], PI / 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(grid.longitudes()[1], PI / 2.0, epsilon = 1e-15);
        assert_abs_diff_eq!(grid.weights().sum(), 2.0, epsilon = 1e-13);
        for j in 1..9 {
            assert!(grid.colatitudes()[j] > grid.colatitudes()[j - 1]);
        }
    }

    #[test]
    fn matches_nodes_within_tolerance() {
        let grid = AngularGrid::new(5, 8);
        let axis = grid.colatitude_axis().unwrap();
        assert!(axis.matches(grid.colatitudes()));
        let shifted = Axis::new(
            "colatitude",
            grid.colatitudes().iter().map(|v| v + 1e-3).collect::<Vec<_>>(),
        )
        .unwrap();
        assert!(!shifted.matches(grid.colatitudes()));
    }
}

/// A strictly increasing, finite, non-empty coordinate axis.
///
/// Values are shared, so clones are cheap and several fields can refer to the
/// same frequency or temperature grid.
#[derive(Debug, Clone)]
pub struct Axis {
    name: &'static str,
    values: Arc<[f64]>,
}

impl PartialEq for Axis {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Axis {
    /// Creates a validated axis. `name` is only used in error messages.
    pub fn new(name: &'static str, values: impl Into<Vec<f64>>) -> Result<Self> {
        let values = values.into();
        if values.is_empty() {
            return Err(FieldError::InvalidAxis {
                name,
                reason: "axis must contain at least one value".into(),
            });
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(FieldError::InvalidAxis {
                name,
                reason: format!("non-finite value {bad}"),
            });
        }
        if let Some(i) = values.windows(2).position(|w| w[1] <= w[0]) {
            return Err(FieldError::InvalidAxis {
                name,
                reason: format!(
                    "values must be strictly increasing (index {} to {})",
                    i,
                    i + 1
                ),
            });
        }
        Ok(Self {
            name,
            values: values.into(),
        })
    }

    /// Axis holding one value.
    pub fn singleton(name: &'static str, value: f64) -> Result<Self> {
        Self::new(name, vec![value])
    }

    /// `n` equispaced values from `start` to `stop` inclusive.
    pub fn linspace(name: &'static str, start: f64, stop: f64, n: usize) -> Result<Self> {
        Self::new(name, Array1::linspace(start, stop, n).to_vec())
    }

    /// `n` values equispaced in log10 from `10^start` to `10^stop`.
    pub fn logspace(name: &'static str, start: f64, stop: f64, n: usize) -> Result<Self> {
        Self::new(name, Array1::logspace(10.0, start, stop, n).to_vec())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a validated axis.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn values(&self) -> ArrayView1<'_, f64> {
        ArrayView1::from(&self.values[..])
    }

    pub fn first(&self) -> f64 {
        self.values[0]
    }

    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// Returns the same axis under another name.
    pub fn renamed(&self, name: &'static str) -> Self {
        Self {
            name,
            values: Arc::clone(&self.values),
        }
    }

    /// Checks that every value lies in `[lower, upper]`.
    pub fn check_within(&self, lower: f64, upper: f64) -> Result<()> {
        if self.first() < lower || self.last() > upper {
            return Err(FieldError::InvalidAxis {
                name: self.name,
                reason: format!(
                    "values must lie in [{lower}, {upper}], got [{}, {}]",
                    self.first(),
                    self.last()
                ),
            });
        }
        Ok(())
    }

    /// Whether the axis coincides with `nodes` to within the grid tolerance.
    pub fn matches(&self, nodes: ArrayView1<f64>) -> bool {
        self.len() == nodes.len()
            && self
                .values
                .iter()
                .zip(nodes.iter())
                .all(|(a, b)| (a - b).abs() <= GRID_MATCH_TOLERANCE)
    }
}

/// Gauss-Legendre colatitudes and equispaced longitudes of a spherical grid.
#[derive(Debug, Clone)]
pub struct AngularGrid {
    colatitudes: Array1<f64>,
    cos_colatitudes: Array1<f64>,
    weights: Array1<f64>,
    longitudes: Array1<f64>,
}

impl AngularGrid {
    pub fn new(n_lat: usize, n_lon: usize) -> Self {
        let (cos_colatitudes, weights) = gauss_legendre(n_lat);
        let colatitudes = cos_colatitudes.mapv(f64::acos);
        let longitudes = Array1::from_shape_fn(n_lon, |j| 2.0 * PI * j as f64 / n_lon as f64);
        Self {
            colatitudes,
            cos_colatitudes,
            weights,
            longitudes,
        }
    }

    /// Colatitude nodes in (0, pi), ascending.
    pub fn colatitudes(&self) -> ArrayView1<'_, f64> {
        self.colatitudes.view()
    }

    /// Cosines of the colatitude nodes, descending.
    pub fn cos_colatitudes(&self) -> ArrayView1<'_, f64> {
        self.cos_colatitudes.view()
    }

    pub fn weights(&self) -> ArrayView1<'_, f64> {
        self.weights.view()
    }

    /// Longitudes 2 pi j / n_lon in [0, 2 pi).
    pub fn longitudes(&self) -> ArrayView1<'_, f64> {
        self.longitudes.view()
    }

    pub fn colatitude_axis(&self) -> Result<Axis> {
        Axis::new("colatitude", self.colatitudes.to_vec())
    }

    pub fn longitude_axis(&self) -> Result<Axis> {
        Axis::new("longitude", self.longitudes.to_vec())
    }
}
