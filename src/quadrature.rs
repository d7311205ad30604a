//! Gauss-Legendre quadrature on the interval [-1, 1].
//!
//! The nodes are the roots of the Legendre polynomial of degree `n`, found by
//! Newton iteration on the three-term recurrence. Nodes are returned in
//! descending order so that the corresponding colatitudes `acos(x)` ascend.

use ndarray::Array1;


/// Maximum number of Newton steps per node.
const MAX_NEWTON_STEPS: usize = 100;
/// Convergence threshold on the Newton step.
const NEWTON_EPSILON: f64 = 1e-15;

/// Returns the `n` Gauss-Legendre nodes (descending) and their weights.
///
/// An empty rule is returned for `n == 0`.
pub fn gauss_legendre(n: usize) -> (Array1<f64>, Array1<f64>) {
    let mut nodes = Array1::zeros(n);
    let mut weights = Array1::zeros(n);
    let nf = n as f64;

    for i in 0..(n + 1) / 2 {
        let mut x = (std::f64::consts::PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
        let mut dp = 1.0;
        for _ in 0..MAX_NEWTON_STEPS {
            let (p, p_prev) = legendre_pair(n, x);
            dp = nf * (x * p - p_prev) / (x * x - 1.0);
            let step = p / dp;
            x -= step;
            if step.abs() < NEWTON_EPSILON {
                break;
            }
        }
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        nodes[i] = x;
        weights[i] = w;
        nodes[n - 1 - i] = -x;
        weights[n - 1 - i] = w;
    }

    (nodes, weights)
}

/// Evaluates (P_n(x), P_{n-1}(x)) with the Bonnet recurrence.
fn legendre_pair(n: usize, x: f64) -> (f64, f64) {
    let mut p = 1.0;
    let mut p_prev = 0.0;
    for l in 1..=n {
        let lf = l as f64;
        let next = ((2.0 * lf - 1.0) * x * p - (lf - 1.0) * p_prev) / lf;
        p_prev = p;
        p = next;
    }
    (p, p_prev)
}
