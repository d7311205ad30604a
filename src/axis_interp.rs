//! Piecewise-linear interpolation along a single tensor axis.

use std::ops::{Add, Mul};

use ndarray::{ArrayD, ArrayViewD};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{FieldError, Result};
use crate::grid::Axis;


/// Element types that can be blended linearly with real weights.
pub trait Sample: Copy + Send + Sync + Add<Output = Self> + Mul<f64, Output = Self> {}

impl<T> Sample for T where T: Copy + Send + Sync + Add<Output = T> + Mul<f64, Output = T> {}

/// Source indices and weight producing one target value.
///
/// The interpolated value is `(1 - weight) * x[lower] + weight * x[upper]`.
/// A zero weight selects `x[lower]` exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    pub lower: usize,
    pub upper: usize,
    pub weight: f64,
}

impl Stencil {
    fn exact(index: usize) -> Self {
        Self {
            lower: index,
            upper: index,
            weight: 0.0,
        }
    }

    /// Contributing `(index, weight)` pairs, one for exact hits and two otherwise.
    pub fn corners(&self) -> Vec<(usize, f64)> {
        if self.weight == 0.0 || self.lower == self.upper {
            vec![(self.lower, 1.0)]
        } else {
            vec![(self.lower, 1.0 - self.weight), (self.upper, self.weight)]
        }
    }
}

/// Linear interpolation from one axis onto another.
///
/// Targets below the first or above the last source value are clamped to the
/// boundary value. A source axis with a single value broadcasts it to every
/// target.
#[derive(Debug, Clone)]
pub struct AxisInterpolator {
    source_len: usize,
    stencils: Vec<Stencil>,
    clamped: usize,
}

impl AxisInterpolator {
    pub fn new(source: &Axis, target: &Axis) -> Self {
        let s = source.as_slice();
        let n = s.len();
        let mut clamped = 0;

        let stencils = target
            .as_slice()
            .iter()
            .map(|&t| {
                if n == 1 {
                    return Stencil::exact(0);
                }
                if t <= s[0] {
                    if t < s[0] {
                        clamped += 1;
                    }
                    return Stencil::exact(0);
                }
                if t >= s[n - 1] {
                    if t > s[n - 1] {
                        clamped += 1;
                    }
                    return Stencil::exact(n - 1);
                }
                let lower = s.partition_point(|&v| v <= t) - 1;
                if s[lower] == t {
                    return Stencil::exact(lower);
                }
                Stencil {
                    lower,
                    upper: lower + 1,
                    weight: (t - s[lower]) / (s[lower + 1] - s[lower]),
                }
            })
            .collect();

        if clamped > 0 {
            debug!(
                axis = source.name(),
                clamped,
                lower = source.first(),
                upper = source.last(),
                "clamping interpolation targets to source range"
            );
        }

        Self {
            source_len: n,
            stencils,
            clamped,
        }
    }

    pub fn stencils(&self) -> &[Stencil] {
        &self.stencils
    }

    pub fn source_len(&self) -> usize {
        self.source_len
    }

    pub fn target_len(&self) -> usize {
        self.stencils.len()
    }

    /// Number of targets that fell outside the source range.
    pub fn clamped(&self) -> usize {
        self.clamped
    }

    /// Interpolates `data` along `axis`, leaving all other axes untouched.
    pub fn interpolate<T: Sample>(&self, data: ArrayViewD<T>, axis: usize) -> Result<ArrayD<T>> {
        if axis >= data.ndim() || data.len_of(ndarray::Axis(axis)) != self.source_len {
            let mut expected = data.shape().to_vec();
            if axis < expected.len() {
                expected[axis] = self.source_len;
            }
            return Err(FieldError::ShapeMismatch {
                what: "interpolation input",
                expected,
                actual: data.shape().to_vec(),
            });
        }

        let slices: Vec<ArrayD<T>> = self
            .stencils
            .par_iter()
            .map(|stencil| {
                let lower = data.index_axis(ndarray::Axis(axis), stencil.lower);
                if stencil.weight == 0.0 || stencil.lower == stencil.upper {
                    return lower.to_owned();
                }
                let upper = data.index_axis(ndarray::Axis(axis), stencil.upper);
                let w = stencil.weight;
                let mut out = lower.mapv(|a| a * (1.0 - w));
                out.zip_mut_with(&upper, |o, &b| *o = *o + b * w);
                out
            })
            .collect();

        let views: Vec<_> = slices.iter().map(|s| s.view()).collect();
        Ok(ndarray::stack(ndarray::Axis(axis), &views)?)
    }
}
