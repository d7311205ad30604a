//! Orthonormal associated Legendre functions and spherical harmonic
//! coefficient bookkeeping.
//!
//! The functions P̄_l^m(cos θ) are normalized so that
//! Y_l^m(θ, φ) = P̄_l^m(cos θ) e^{imφ} is orthonormal on the unit sphere and
//! carry the Condon-Shortley phase (-1)^m.
//!
//! Two coefficient layouts are used throughout the crate:
//!
//! - *real-packed*: one coefficient per (l, m) with 0 <= m <= min(l, m_max),
//!   ordered m-major. Used for fields that are real in space.
//! - *complex-packed*: one coefficient per (l, m) with |m| <= min(l, m_max),
//!   ordered l-major with ascending m. Used for complex fields.

use ndarray::{Array2, ArrayView1};
use std::f64::consts::PI;


/// Number of real-packed coefficients for a truncation.
pub fn real_size(l_max: usize, m_max: usize) -> usize {
    (m_max + 1) * (l_max + 1) - m_max * (m_max + 1) / 2
}

/// Position of (l, m) in the real-packed layout.
pub fn real_index(l_max: usize, m_max: usize, l: usize, m: usize) -> Option<usize> {
    if m > m_max || m > l || l > l_max {
        return None;
    }
    Some(m * (l_max + 1) - m * m.saturating_sub(1) / 2 + (l - m))
}

/// Number of complex-packed coefficients for a truncation.
pub fn complex_size(l_max: usize, m_max: usize) -> usize {
    (m_max + 1) * (m_max + 1) + (l_max - m_max) * (2 * m_max + 1)
}

/// Position of (l, m) in the complex-packed layout.
pub fn complex_index(l_max: usize, m_max: usize, l: usize, m: i64) -> Option<usize> {
    let m_lim = l.min(m_max) as i64;
    if l > l_max || m.abs() > m_lim {
        return None;
    }
    let offset = if l <= m_max {
        l * l
    } else {
        (m_max + 1) * (m_max + 1) + (l - m_max - 1) * (2 * m_max + 1)
    };
    Some(offset + (m + m_lim) as usize)
}

/// Fills `out` (real-packed layout) with P̄_l^m(x) for the whole truncation.
///
/// `x` is the cosine of the colatitude and must lie in [-1, 1].
pub fn normalized_into(l_max: usize, m_max: usize, x: f64, out: &mut [f64]) {
    let s = ((1.0 - x) * (1.0 + x)).max(0.0).sqrt();
    let mut pmm = 1.0 / (4.0 * PI).sqrt();
    let mut idx = 0;

    for m in 0..=m_max {
        if m > 0 {
            let mf = m as f64;
            pmm *= -((2.0 * mf + 1.0) / (2.0 * mf)).sqrt() * s;
        }
        out[idx] = pmm;
        idx += 1;
        if m == l_max {
            continue;
        }

        let mf = m as f64;
        let mut p_prev = pmm;
        let mut p = (2.0 * mf + 3.0).sqrt() * x * pmm;
        let mut a_prev = (2.0 * mf + 3.0).sqrt();
        out[idx] = p;
        idx += 1;

        for l in (m + 2)..=l_max {
            let lf = l as f64;
            let a = ((4.0 * lf * lf - 1.0) / (lf * lf - mf * mf)).sqrt();
            let next = a * (x * p - p_prev / a_prev);
            p_prev = p;
            p = next;
            a_prev = a;
            out[idx] = p;
            idx += 1;
        }
    }
}

/// Tabulates P̄_l^m at every point of `xs`, returning shape [real_size, xs.len()].
pub fn normalized_table(l_max: usize, m_max: usize, xs: ArrayView1<f64>) -> Array2<f64> {
    let n_coeffs = real_size(l_max, m_max);
    let mut table = Array2::zeros((n_coeffs, xs.len()));
    let mut column = vec![0.0; n_coeffs];
    for (j, &x) in xs.iter().enumerate() {
        normalized_into(l_max, m_max, x, &mut column);
        for (i, &v) in column.iter().enumerate() {
            table[[i, j]] = v;
        }
    }
    table
}
