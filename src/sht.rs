//! Spherical harmonics transforms on Gauss-Legendre grids.
//!
//! An [`ShtEngine`] binds one truncation `(l_max, m_max)` to one spatial grid
//! `(n_lat, n_lon)`. Forward transforms take a spatial field sampled on the
//! grid to spectral coefficients, inverse transforms synthesize the field back
//! onto the grid, and [`ShtEngine::evaluate`] synthesizes at arbitrary points.
//!
//! # Algorithm
//!
//! The forward transform is a discrete Fourier transform along longitude,
//! scaled to approximate `∫ f e^{-imφ} dφ`, followed by Gauss-Legendre
//! quadrature of each Fourier mode against the tabulated P̄_l^m. The inverse
//! sums the Legendre series per order and feeds the orders through an inverse
//! FFT. Both are exact for band-limited fields whenever `n_lat > l_max` and
//! `n_lon >= 2 m_max + 1`, which the constructor enforces.
//!
//! # Layouts
//!
//! Spatial fields are `[n_lon, n_lat]` arrays. Real fields use the real-packed
//! coefficient layout, complex fields the complex-packed one (see
//! [`crate::legendre`]).

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::error::{FieldError, Result};
use crate::grid::AngularGrid;
use crate::legendre;

/// Spherical harmonics transform bound to one truncation and one grid.
///
/// **Context**: Every spectral scattering field refers to the engine that
/// produced its coefficients. Engines are immutable and shared through `Arc`
/// so that many fields with the same truncation reuse one set of tables.
///
/// **How it Works**: Construction tabulates the orthonormal Legendre functions
/// at the Gauss-Legendre nodes and plans forward and inverse FFTs of length
/// `n_lon`. Transform calls only read this state, so an engine can be used
/// from many threads at once.
pub struct ShtEngine {
    l_max: usize,
    m_max: usize,
    n_lat: usize,
    n_lon: usize,
    grid: AngularGrid,
    legendre: Array2<f64>,
    fft_forward: Arc<dyn Fft<f64>>,
    fft_inverse: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for ShtEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShtEngine")
            .field("l_max", &self.l_max)
            .field("m_max", &self.m_max)
            .field("n_lat", &self.n_lat)
            .field("n_lon", &self.n_lon)
            .finish_non_exhaustive()
    }
}

/// Engines are equal when they bind the same truncation to the same grid.
impl PartialEq for ShtEngine {
    fn eq(&self, other: &Self) -> bool {
        self.l_max == other.l_max
            && self.m_max == other.m_max
            && self.n_lat == other.n_lat
            && self.n_lon == other.n_lon
    }
}

impl ShtEngine {
    pub fn new(l_max: usize, m_max: usize, n_lat: usize, n_lon: usize) -> Result<Self> {
        let invalid = |reason| FieldError::InvalidTruncation {
            l_max,
            m_max,
            reason,
        };
        if m_max > l_max {
            return Err(invalid("m_max exceeds l_max"));
        }
        if n_lat == 0 || n_lon == 0 {
            return Err(invalid("grid must have at least one latitude and one longitude"));
        }
        if n_lat <= l_max {
            return Err(invalid("n_lat must exceed l_max"));
        }
        if n_lon < 2 * m_max + 1 {
            return Err(invalid("n_lon must be at least 2 m_max + 1"));
        }

        let grid = AngularGrid::new(n_lat, n_lon);
        let legendre = legendre::normalized_table(l_max, m_max, grid.cos_colatitudes());
        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(n_lon);
        let fft_inverse = planner.plan_fft_inverse(n_lon);

        Ok(Self {
            l_max,
            m_max,
            n_lat,
            n_lon,
            grid,
            legendre,
            fft_forward,
            fft_inverse,
        })
    }

    /// Same as [`ShtEngine::new`] but wrapped for sharing between fields.
    pub fn shared(l_max: usize, m_max: usize, n_lat: usize, n_lon: usize) -> Result<Arc<Self>> {
        Self::new(l_max, m_max, n_lat, n_lon).map(Arc::new)
    }

    /// Engine with the largest truncation the grid resolves.
    pub fn for_grid(n_lat: usize, n_lon: usize) -> Result<Self> {
        let (l_max, m_max) = Self::default_truncation(n_lat, n_lon);
        Self::new(l_max, m_max, n_lat, n_lon)
    }

    /// Largest `(l_max, m_max)` resolved by a grid of `n_lat` x `n_lon` points.
    pub fn default_truncation(n_lat: usize, n_lon: usize) -> (usize, usize) {
        let l_max = n_lat.saturating_sub(1);
        let m_max = l_max.min(n_lon.saturating_sub(1) / 2);
        (l_max, m_max)
    }

    pub fn l_max(&self) -> usize {
        self.l_max
    }

    pub fn m_max(&self) -> usize {
        self.m_max
    }

    pub fn n_lat(&self) -> usize {
        self.n_lat
    }

    pub fn n_lon(&self) -> usize {
        self.n_lon
    }

    /// Colatitude nodes in radians, ascending.
    pub fn latitude_grid(&self) -> ArrayView1<'_, f64> {
        self.grid.colatitudes()
    }

    /// Cosines of the colatitude nodes.
    pub fn colatitude_grid(&self) -> ArrayView1<'_, f64> {
        self.grid.cos_colatitudes()
    }

    pub fn longitude_grid(&self) -> ArrayView1<'_, f64> {
        self.grid.longitudes()
    }

    pub fn quadrature_weights(&self) -> ArrayView1<'_, f64> {
        self.grid.weights()
    }

    pub fn grid(&self) -> &AngularGrid {
        &self.grid
    }

    pub fn spectral_size(&self) -> usize {
        legendre::real_size(self.l_max, self.m_max)
    }

    pub fn spectral_size_complex(&self) -> usize {
        legendre::complex_size(self.l_max, self.m_max)
    }

    pub fn lm_index(&self, l: usize, m: usize) -> Option<usize> {
        legendre::real_index(self.l_max, self.m_max, l, m)
    }

    pub fn lm_index_complex(&self, l: usize, m: i64) -> Option<usize> {
        legendre::complex_index(self.l_max, self.m_max, l, m)
    }

    /// Whether the azimuthal dimension is trivial (`m_max = 0`, one longitude).
    pub fn is_azimuthally_symmetric(&self) -> bool {
        self.m_max == 0 && self.n_lon == 1
    }

    /// Real field on the grid to real-packed coefficients.
    pub fn forward_transform(&self, spatial: ArrayView2<f64>) -> Result<Array1<Complex64>> {
        self.check_spatial(spatial.shape())?;
        let mut coeffs = Array1::zeros(self.spectral_size());
        self.forward_into(spatial, coeffs.view_mut());
        Ok(coeffs)
    }

    /// Real-packed coefficients to the real field on the grid.
    pub fn inverse_transform(&self, coeffs: ArrayView1<Complex64>) -> Result<Array2<f64>> {
        self.check_coeffs(coeffs.len(), self.spectral_size())?;
        let mut spatial = Array2::zeros((self.n_lon, self.n_lat));
        self.inverse_into(coeffs, spatial.view_mut());
        Ok(spatial)
    }

    /// Complex field on the grid to complex-packed coefficients.
    pub fn forward_transform_complex(
        &self,
        spatial: ArrayView2<Complex64>,
    ) -> Result<Array1<Complex64>> {
        self.check_spatial(spatial.shape())?;
        let mut coeffs = Array1::zeros(self.spectral_size_complex());
        self.forward_complex_into(spatial, coeffs.view_mut());
        Ok(coeffs)
    }

    /// Complex-packed coefficients to the complex field on the grid.
    pub fn inverse_transform_complex(
        &self,
        coeffs: ArrayView1<Complex64>,
    ) -> Result<Array2<Complex64>> {
        self.check_coeffs(coeffs.len(), self.spectral_size_complex())?;
        let mut spatial = Array2::zeros((self.n_lon, self.n_lat));
        self.inverse_complex_into(coeffs, spatial.view_mut());
        Ok(spatial)
    }

    /// Synthesizes a real-packed expansion at `(longitude, colatitude)` rows of `points`.
    pub fn evaluate(
        &self,
        coeffs: ArrayView1<Complex64>,
        points: ArrayView2<f64>,
    ) -> Result<Array1<f64>> {
        self.check_coeffs(coeffs.len(), self.spectral_size())?;
        self.check_points(points)?;
        let mut p = vec![0.0; self.spectral_size()];
        let values = points
            .rows()
            .into_iter()
            .map(|row| {
                let (lon, colat) = (row[0], row[1]);
                legendre::normalized_into(self.l_max, self.m_max, colat.cos(), &mut p);
                let mut value = 0.0;
                let mut idx = 0;
                for m in 0..=self.m_max {
                    let phase = Complex64::from_polar(1.0, m as f64 * lon);
                    let mut sum = Complex64::new(0.0, 0.0);
                    for _ in m..=self.l_max {
                        sum += coeffs[idx] * p[idx];
                        idx += 1;
                    }
                    value += if m == 0 {
                        sum.re
                    } else {
                        2.0 * (sum * phase).re
                    };
                }
                value
            })
            .collect();
        Ok(values)
    }

    /// Synthesizes a complex-packed expansion at `(longitude, colatitude)` rows of `points`.
    pub fn evaluate_complex(
        &self,
        coeffs: ArrayView1<Complex64>,
        points: ArrayView2<f64>,
    ) -> Result<Array1<Complex64>> {
        self.check_coeffs(coeffs.len(), self.spectral_size_complex())?;
        self.check_points(points)?;
        let mut p = vec![0.0; self.spectral_size()];
        let values = points
            .rows()
            .into_iter()
            .map(|row| {
                let (lon, colat) = (row[0], row[1]);
                legendre::normalized_into(self.l_max, self.m_max, colat.cos(), &mut p);
                let mut value = Complex64::new(0.0, 0.0);
                let mut idx = 0;
                for l in 0..=self.l_max {
                    let m_lim = l.min(self.m_max) as i64;
                    for m in -m_lim..=m_lim {
                        let phase = Complex64::from_polar(1.0, m as f64 * lon);
                        value += coeffs[idx] * self.signed_legendre(&p, l, m) * phase;
                        idx += 1;
                    }
                }
                value
            })
            .collect();
        Ok(values)
    }

    /// Copies real-packed coefficients into the truncation of `target`.
    ///
    /// Degrees and orders missing from the source are zero, those beyond the
    /// target truncation are dropped.
    pub fn retruncate(
        &self,
        coeffs: ArrayView1<Complex64>,
        target: &ShtEngine,
    ) -> Result<Array1<Complex64>> {
        self.check_coeffs(coeffs.len(), self.spectral_size())?;
        let mut out = Array1::zeros(target.spectral_size());
        self.retruncate_into(coeffs, target, out.view_mut());
        Ok(out)
    }

    /// Copies complex-packed coefficients into the truncation of `target`.
    pub fn retruncate_complex(
        &self,
        coeffs: ArrayView1<Complex64>,
        target: &ShtEngine,
    ) -> Result<Array1<Complex64>> {
        self.check_coeffs(coeffs.len(), self.spectral_size_complex())?;
        let mut out = Array1::zeros(target.spectral_size_complex());
        for l in 0..=self.l_max.min(target.l_max) {
            let m_lim = l.min(self.m_max).min(target.m_max) as i64;
            for m in -m_lim..=m_lim {
                if let (Some(src), Some(dst)) =
                    (self.lm_index_complex(l, m), target.lm_index_complex(l, m))
                {
                    out[dst] = coeffs[src];
                }
            }
        }
        Ok(out)
    }

    pub(crate) fn forward_into(&self, spatial: ArrayView2<f64>, mut out: ArrayViewMut1<Complex64>) {
        let fourier = self.fourier_modes(|buffer, j| {
            for (b, &v) in buffer.iter_mut().zip(spatial.column(j)) {
                *b = Complex64::new(v, 0.0);
            }
        });
        let weights = self.grid.weights();
        let mut idx = 0;
        for m in 0..=self.m_max {
            let mode = fourier.row(m);
            for _ in m..=self.l_max {
                let p = self.legendre.row(idx);
                out[idx] = mode
                    .iter()
                    .zip(p.iter())
                    .zip(weights.iter())
                    .map(|((&f, &p), &w)| f * (p * w))
                    .sum();
                idx += 1;
            }
        }
    }

    pub(crate) fn inverse_into(&self, coeffs: ArrayView1<Complex64>, mut out: ArrayViewMut2<f64>) {
        let mut modes = Array2::<Complex64>::zeros((self.m_max + 1, self.n_lat));
        let mut idx = 0;
        for m in 0..=self.m_max {
            for _ in m..=self.l_max {
                let c = coeffs[idx];
                for (mode, &p) in modes.row_mut(m).iter_mut().zip(self.legendre.row(idx)) {
                    *mode += c * p;
                }
                idx += 1;
            }
        }

        let mut buffer = vec![Complex64::new(0.0, 0.0); self.n_lon];
        for j in 0..self.n_lat {
            buffer.fill(Complex64::new(0.0, 0.0));
            buffer[0] = Complex64::new(modes[[0, j]].re, 0.0);
            for m in 1..=self.m_max {
                buffer[m] = modes[[m, j]];
                buffer[self.n_lon - m] = modes[[m, j]].conj();
            }
            self.fft_inverse.process(&mut buffer);
            for (o, b) in out.column_mut(j).iter_mut().zip(&buffer) {
                *o = b.re;
            }
        }
    }

    pub(crate) fn forward_complex_into(
        &self,
        spatial: ArrayView2<Complex64>,
        mut out: ArrayViewMut1<Complex64>,
    ) {
        let fourier = self.fourier_modes(|buffer, j| {
            for (b, &v) in buffer.iter_mut().zip(spatial.column(j)) {
                *b = v;
            }
        });
        let weights = self.grid.weights();
        let mut idx = 0;
        for l in 0..=self.l_max {
            let m_lim = l.min(self.m_max) as i64;
            for m in -m_lim..=m_lim {
                let mode = fourier.row(self.fourier_row(m));
                let p = self.legendre.row(self.real_row(l, m));
                let sign = condon_sign(m);
                out[idx] = mode
                    .iter()
                    .zip(p.iter())
                    .zip(weights.iter())
                    .map(|((&f, &p), &w)| f * (sign * p * w))
                    .sum();
                idx += 1;
            }
        }
    }

    pub(crate) fn inverse_complex_into(
        &self,
        coeffs: ArrayView1<Complex64>,
        mut out: ArrayViewMut2<Complex64>,
    ) {
        let mut modes = Array2::<Complex64>::zeros((self.n_lon, self.n_lat));
        let mut idx = 0;
        for l in 0..=self.l_max {
            let m_lim = l.min(self.m_max) as i64;
            for m in -m_lim..=m_lim {
                let c = coeffs[idx] * condon_sign(m);
                let row = self.fourier_row(m);
                for (mode, &p) in modes
                    .row_mut(row)
                    .iter_mut()
                    .zip(self.legendre.row(self.real_row(l, m)))
                {
                    *mode += c * p;
                }
                idx += 1;
            }
        }

        let mut buffer = vec![Complex64::new(0.0, 0.0); self.n_lon];
        for j in 0..self.n_lat {
            for (b, &v) in buffer.iter_mut().zip(modes.column(j)) {
                *b = v;
            }
            self.fft_inverse.process(&mut buffer);
            for (o, &b) in out.column_mut(j).iter_mut().zip(&buffer) {
                *o = b;
            }
        }
    }

    pub(crate) fn retruncate_into(
        &self,
        coeffs: ArrayView1<Complex64>,
        target: &ShtEngine,
        mut out: ArrayViewMut1<Complex64>,
    ) {
        out.fill(Complex64::new(0.0, 0.0));
        for m in 0..=self.m_max.min(target.m_max) {
            for l in m..=self.l_max.min(target.l_max) {
                if let (Some(src), Some(dst)) = (self.lm_index(l, m), target.lm_index(l, m)) {
                    out[dst] = coeffs[src];
                }
            }
        }
    }

    /// Scaled longitude DFT of every latitude ring, shape [n_lon, n_lat].
    ///
    /// Row `k` holds order `m` with `k = m mod n_lon`.
    fn fourier_modes(&self, fill: impl Fn(&mut [Complex64], usize)) -> Array2<Complex64> {
        let scale = 2.0 * PI / self.n_lon as f64;
        let mut modes = Array2::zeros((self.n_lon, self.n_lat));
        let mut buffer = vec![Complex64::new(0.0, 0.0); self.n_lon];
        for j in 0..self.n_lat {
            fill(buffer.as_mut_slice(), j);
            self.fft_forward.process(&mut buffer);
            for (mode, &b) in modes.column_mut(j).iter_mut().zip(&buffer) {
                *mode = b * scale;
            }
        }
        modes
    }

    fn fourier_row(&self, m: i64) -> usize {
        m.rem_euclid(self.n_lon as i64) as usize
    }

    /// Row of P̄_l^|m| in the Legendre table.
    fn real_row(&self, l: usize, m: i64) -> usize {
        let m = m.unsigned_abs() as usize;
        m * (self.l_max + 1) - m * m.saturating_sub(1) / 2 + (l - m)
    }

    fn signed_legendre(&self, p: &[f64], l: usize, m: i64) -> f64 {
        condon_sign(m) * p[self.real_row(l, m)]
    }

    fn check_spatial(&self, shape: &[usize]) -> Result<()> {
        if shape != [self.n_lon, self.n_lat] {
            return Err(FieldError::ShapeMismatch {
                what: "spatial field",
                expected: vec![self.n_lon, self.n_lat],
                actual: shape.to_vec(),
            });
        }
        Ok(())
    }

    fn check_coeffs(&self, len: usize, expected: usize) -> Result<()> {
        if len != expected {
            return Err(FieldError::ShapeMismatch {
                what: "coefficients",
                expected: vec![expected],
                actual: vec![len],
            });
        }
        Ok(())
    }

    fn check_points(&self, points: ArrayView2<f64>) -> Result<()> {
        if points.ncols() != 2 {
            return Err(FieldError::ShapeMismatch {
                what: "evaluation points",
                expected: vec![points.nrows(), 2],
                actual: points.shape().to_vec(),
            });
        }
        for (index, row) in points.rows().into_iter().enumerate() {
            let colatitude = row[1];
            if !colatitude.is_finite() || !(0.0..=PI).contains(&colatitude) || !row[0].is_finite()
            {
                return Err(FieldError::OutOfRangeEvaluation { index, colatitude });
            }
        }
        Ok(())
    }
}

/// (-1)^m for negative orders, 1 otherwise. P̄_l^{-m} = (-1)^m P̄_l^m.
fn condon_sign(m: i64) -> f64 {
    if m < 0 && m % 2 != 0 {
        -1.0
    } else {
        1.0
    }
}
