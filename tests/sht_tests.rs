use std::f64::consts::PI;

use approx::assert_abs_diff_eq;
use ndarray::{array, Array1, Array2};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scatfield::{FieldError, ShtEngine};

const TOL: f64 = 1e-10;

/// Random coefficients of a real band-limited field. Zonal coefficients are real.
fn random_real_coeffs(sht: &ShtEngine, rng: &mut StdRng) -> Array1<Complex64> {
    let mut coeffs = Array1::zeros(sht.spectral_size());
    for m in 0..=sht.m_max() {
        for l in m..=sht.l_max() {
            let idx = sht.lm_index(l, m).unwrap();
            let im = if m == 0 {
                0.0
            } else {
                rng.random_range(-1.0..1.0)
            };
            coeffs[idx] = Complex64::new(rng.random_range(-1.0..1.0), im);
        }
    }
    coeffs
}

fn random_complex_coeffs(sht: &ShtEngine, rng: &mut StdRng) -> Array1<Complex64> {
    Array1::from_shape_fn(sht.spectral_size_complex(), |_| {
        Complex64::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0))
    })
}

fn sample_grid(sht: &ShtEngine, f: impl Fn(f64, f64) -> f64) -> Array2<f64> {
    let lon = sht.longitude_grid();
    let colat = sht.latitude_grid();
    Array2::from_shape_fn((sht.n_lon(), sht.n_lat()), |(k, j)| f(lon[k], colat[j]))
}

fn max_norm_diff(a: &Array1<Complex64>, b: &Array1<Complex64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).norm())
        .fold(0.0, f64::max)
}

#[test]
fn rejects_invalid_truncations() {
    assert!(matches!(
        ShtEngine::new(3, 4, 8, 9),
        Err(FieldError::InvalidTruncation { l_max: 3, m_max: 4, .. })
    ));
    assert!(matches!(
        ShtEngine::new(8, 2, 8, 9),
        Err(FieldError::InvalidTruncation { .. })
    ));
    assert!(matches!(
        ShtEngine::new(8, 4, 9, 8),
        Err(FieldError::InvalidTruncation { .. })
    ));
    assert!(ShtEngine::new(8, 4, 9, 9).is_ok());
}

#[test]
fn grids_are_gauss_legendre_and_equispaced() {
    let sht = ShtEngine::new(6, 3, 7, 8).unwrap();
    let colat = sht.latitude_grid();
    assert_eq!(colat.len(), 7);
    assert!(colat.windows(2).into_iter().all(|w| w[0] < w[1]));
    assert!(colat.iter().all(|&t| t > 0.0 && t < PI));
    assert_abs_diff_eq!(sht.quadrature_weights().sum(), 2.0, epsilon = 1e-13);
    for (x, t) in sht.colatitude_grid().iter().zip(colat.iter()) {
        assert_abs_diff_eq!(*x, t.cos(), epsilon = 1e-14);
    }
    for (j, lon) in sht.longitude_grid().iter().enumerate() {
        assert_abs_diff_eq!(*lon, 2.0 * PI * j as f64 / 8.0, epsilon = 1e-14);
    }
}

#[test]
fn default_truncation_is_resolved_by_grid() {
    assert_eq!(ShtEngine::default_truncation(16, 1), (15, 0));
    assert_eq!(ShtEngine::default_truncation(16, 9), (15, 4));
    assert_eq!(ShtEngine::default_truncation(3, 36), (2, 2));
    let sht = ShtEngine::for_grid(16, 9).unwrap();
    assert_eq!((sht.l_max(), sht.m_max()), (15, 4));
}

#[test]
fn forward_isolates_zonal_harmonic() {
    let sht = ShtEngine::new(4, 2, 6, 5).unwrap();
    let norm = (5.0 / (16.0 * PI)).sqrt();
    let spatial = sample_grid(&sht, |_, theta| norm * (3.0 * theta.cos().powi(2) - 1.0));
    let coeffs = sht.forward_transform(spatial.view()).unwrap();
    let target = sht.lm_index(2, 0).unwrap();
    for (idx, c) in coeffs.iter().enumerate() {
        let expected = if idx == target { 1.0 } else { 0.0 };
        assert_abs_diff_eq!(c.re, expected, epsilon = TOL);
        assert_abs_diff_eq!(c.im, 0.0, epsilon = TOL);
    }
}

#[test]
fn forward_isolates_sectoral_harmonic() {
    // sqrt(3 / 8 pi) sin(theta) cos(phi) = -(Y_11 - Y_1-1) / 2
    let sht = ShtEngine::new(3, 2, 5, 7).unwrap();
    let norm = (3.0 / (8.0 * PI)).sqrt();
    let spatial = sample_grid(&sht, |phi, theta| norm * theta.sin() * phi.cos());
    let coeffs = sht.forward_transform(spatial.view()).unwrap();
    let target = sht.lm_index(1, 1).unwrap();
    for (idx, c) in coeffs.iter().enumerate() {
        let expected = if idx == target { -0.5 } else { 0.0 };
        assert_abs_diff_eq!(c.re, expected, epsilon = TOL);
        assert_abs_diff_eq!(c.im, 0.0, epsilon = TOL);
    }
}

#[test]
fn legendre_only_engine() {
    let sht = ShtEngine::new(3, 0, 4, 1).unwrap();
    assert!(sht.is_azimuthally_symmetric());
    let spatial = sample_grid(&sht, |_, theta| theta.cos());
    let coeffs = sht.forward_transform(spatial.view()).unwrap();
    assert_eq!(coeffs.len(), 4);
    assert_abs_diff_eq!(coeffs[1].re, (4.0 * PI / 3.0).sqrt(), epsilon = TOL);
    assert_abs_diff_eq!(coeffs[0].re, 0.0, epsilon = TOL);
    assert_abs_diff_eq!(coeffs[2].re, 0.0, epsilon = TOL);

    let back = sht.inverse_transform(coeffs.view()).unwrap();
    for (b, s) in back.iter().zip(spatial.iter()) {
        assert_abs_diff_eq!(*b, *s, epsilon = TOL);
    }
}

#[test]
fn band_limited_round_trip() {
    let mut rng = StdRng::seed_from_u64(7);
    let sht = ShtEngine::new(10, 6, 12, 15).unwrap();
    let coeffs = random_real_coeffs(&sht, &mut rng);
    let spatial = sht.inverse_transform(coeffs.view()).unwrap();
    assert_eq!(spatial.shape(), &[15, 12]);
    let again = sht.forward_transform(spatial.view()).unwrap();
    assert!(max_norm_diff(&coeffs, &again) < TOL);
}

#[test]
fn complex_round_trip() {
    let mut rng = StdRng::seed_from_u64(8);
    let sht = ShtEngine::new(6, 3, 8, 7).unwrap();
    let coeffs = random_complex_coeffs(&sht, &mut rng);
    let spatial = sht.inverse_transform_complex(coeffs.view()).unwrap();
    let again = sht.forward_transform_complex(spatial.view()).unwrap();
    assert!(max_norm_diff(&coeffs, &again) < TOL);
}

#[test]
fn complex_transform_of_real_field_has_conjugate_symmetry() {
    let mut rng = StdRng::seed_from_u64(9);
    let sht = ShtEngine::new(5, 3, 7, 8).unwrap();
    let real = random_real_coeffs(&sht, &mut rng);
    let spatial = sht.inverse_transform(real.view()).unwrap();
    let complex = sht
        .forward_transform_complex(spatial.mapv(|v| Complex64::new(v, 0.0)).view())
        .unwrap();
    for m in 0..=sht.m_max() {
        for l in m..=sht.l_max() {
            let c = real[sht.lm_index(l, m).unwrap()];
            let plus = complex[sht.lm_index_complex(l, m as i64).unwrap()];
            let minus = complex[sht.lm_index_complex(l, -(m as i64)).unwrap()];
            let sign = if m % 2 == 0 { 1.0 } else { -1.0 };
            assert!((plus - c).norm() < TOL);
            assert!((minus - c.conj() * sign).norm() < TOL);
        }
    }
}

#[test]
fn evaluate_matches_grid_synthesis() {
    let mut rng = StdRng::seed_from_u64(10);
    let sht = ShtEngine::new(6, 4, 8, 11).unwrap();
    let coeffs = random_real_coeffs(&sht, &mut rng);
    let spatial = sht.inverse_transform(coeffs.view()).unwrap();

    let lon = sht.longitude_grid();
    let colat = sht.latitude_grid();
    let points = array![
        [lon[0], colat[0]],
        [lon[3], colat[5]],
        [lon[10], colat[7]],
    ];
    let values = sht.evaluate(coeffs.view(), points.view()).unwrap();
    assert_abs_diff_eq!(values[0], spatial[[0, 0]], epsilon = TOL);
    assert_abs_diff_eq!(values[1], spatial[[3, 5]], epsilon = TOL);
    assert_abs_diff_eq!(values[2], spatial[[10, 7]], epsilon = TOL);
}

#[test]
fn evaluate_closed_forms_off_grid() {
    let sht = ShtEngine::new(2, 1, 3, 3).unwrap();
    let mut coeffs = Array1::zeros(sht.spectral_size());
    coeffs[sht.lm_index(0, 0).unwrap()] = Complex64::new(2.0, 0.0);
    coeffs[sht.lm_index(1, 1).unwrap()] = Complex64::new(-0.5, 0.0);
    let (phi, theta) = (0.3, 1.1);
    let points = array![[phi, theta], [0.0, 0.0], [0.0, PI]];
    let values = sht.evaluate(coeffs.view(), points.view()).unwrap();
    let monopole = 2.0 / (4.0 * PI).sqrt();
    let dipole = (3.0 / (8.0 * PI)).sqrt() * theta.sin() * phi.cos();
    assert_abs_diff_eq!(values[0], monopole + dipole, epsilon = 1e-12);
    assert_abs_diff_eq!(values[1], monopole, epsilon = 1e-12);
    assert_abs_diff_eq!(values[2], monopole, epsilon = 1e-12);
}

#[test]
fn evaluate_complex_matches_grid_synthesis() {
    let mut rng = StdRng::seed_from_u64(11);
    let sht = ShtEngine::new(4, 2, 6, 5).unwrap();
    let coeffs = random_complex_coeffs(&sht, &mut rng);
    let spatial = sht.inverse_transform_complex(coeffs.view()).unwrap();
    let points = array![
        [sht.longitude_grid()[2], sht.latitude_grid()[1]],
        [sht.longitude_grid()[4], sht.latitude_grid()[5]],
    ];
    let values = sht.evaluate_complex(coeffs.view(), points.view()).unwrap();
    assert!((values[0] - spatial[[2, 1]]).norm() < TOL);
    assert!((values[1] - spatial[[4, 5]]).norm() < TOL);
}

#[test]
fn evaluate_rejects_colatitude_outside_range() {
    let sht = ShtEngine::new(2, 1, 3, 3).unwrap();
    let coeffs = Array1::zeros(sht.spectral_size());
    let points = array![[0.0, 1.0], [0.0, 4.0]];
    let result = sht.evaluate(coeffs.view(), points.view());
    assert!(matches!(
        result,
        Err(FieldError::OutOfRangeEvaluation { index: 1, .. })
    ));
    let points = array![[0.0, -0.1]];
    assert!(sht.evaluate(coeffs.view(), points.view()).is_err());
}

#[test]
fn transforms_reject_wrong_shapes() {
    let sht = ShtEngine::new(2, 1, 3, 3).unwrap();
    let spatial = Array2::zeros((3, 4));
    assert!(matches!(
        sht.forward_transform(spatial.view()),
        Err(FieldError::ShapeMismatch { .. })
    ));
    let coeffs = Array1::zeros(sht.spectral_size() + 1);
    assert!(matches!(
        sht.inverse_transform(coeffs.view()),
        Err(FieldError::ShapeMismatch { .. })
    ));
}

#[test]
fn retruncation_pads_and_drops() {
    let mut rng = StdRng::seed_from_u64(12);
    let small = ShtEngine::new(4, 2, 10, 9).unwrap();
    let large = ShtEngine::new(8, 4, 10, 9).unwrap();
    let coeffs = random_real_coeffs(&small, &mut rng);

    let padded = small.retruncate(coeffs.view(), &large).unwrap();
    assert_eq!(padded.len(), large.spectral_size());
    assert_eq!(padded[large.lm_index(3, 1).unwrap()], coeffs[small.lm_index(3, 1).unwrap()]);
    assert_eq!(padded[large.lm_index(7, 3).unwrap()], Complex64::new(0.0, 0.0));

    let restored = large.retruncate(padded.view(), &small).unwrap();
    assert_eq!(restored, coeffs);

    // Padding does not change the synthesized field.
    let a = small.inverse_transform(coeffs.view()).unwrap();
    let b = large.inverse_transform(padded.view()).unwrap();
    for (x, y) in a.iter().zip(b.iter()) {
        assert_abs_diff_eq!(*x, *y, epsilon = TOL);
    }
}

#[test]
fn complex_retruncation_keeps_shared_modes() {
    let mut rng = StdRng::seed_from_u64(13);
    let large = ShtEngine::new(5, 3, 8, 7).unwrap();
    let small = ShtEngine::new(3, 1, 8, 7).unwrap();
    let coeffs = random_complex_coeffs(&large, &mut rng);
    let cut = large.retruncate_complex(coeffs.view(), &small).unwrap();
    assert_eq!(cut.len(), small.spectral_size_complex());
    for l in 0..=3 {
        let m_lim = l.min(1) as i64;
        for m in -m_lim..=m_lim {
            assert_eq!(
                cut[small.lm_index_complex(l, m).unwrap()],
                coeffs[large.lm_index_complex(l, m).unwrap()]
            );
        }
    }
}

#[test]
fn engines_compare_by_truncation_and_grid() {
    let a = ShtEngine::new(4, 2, 6, 5).unwrap();
    let b = ShtEngine::new(4, 2, 6, 5).unwrap();
    let c = ShtEngine::new(4, 2, 6, 7).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.spectral_size(), 5 + 4 + 3);
    assert_eq!(a.spectral_size_complex(), 1 + 3 + 5 + 5 + 5);
}
