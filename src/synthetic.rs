//! Random, band-limited scattering fields for testing representation consistency.

use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::Result;
use crate::fully_spectral::FullySpectralField;
use crate::grid::Axis;
use crate::sht::ShtEngine;

#[cfg(test)]
mod tests {

    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zonal_scattering_coefficients_are_real() {
        let mut rng = StdRng::seed_from_u64(3);
        let sht_inc = ShtEngine::shared(2, 0, 3, 1).unwrap();
        let sht_scat = ShtEngine::shared(3, 2, 4, 5).unwrap();
        let field = random_fully_spectral(
            Axis::new("frequency", vec![1.0, 2.0]).unwrap(),
            Axis::singleton("temperature", 1.0).unwrap(),
            sht_inc,
            Arc::clone(&sht_scat),
            2,
            &mut rng,
        )
        .unwrap();
        for l in 0..=3 {
            let idx = sht_scat.lm_index(l, 0).unwrap();
            assert!(field
                .data()
                .index_axis(ndarray::Axis(3), idx)
                .iter()
                .all(|c| c.im == 0.0));
        }
        let idx = sht_scat.lm_index(2, 1).unwrap();
        assert!(field
            .data()
            .index_axis(ndarray::Axis(3), idx)
            .iter()
            .any(|c| c.im != 0.0));
    }

    #[test]
    fn seeded_fields_repeat() {
        let sht_inc = ShtEngine::shared(1, 0, 2, 1).unwrap();
        let sht_scat = ShtEngine::shared(2, 1, 3, 3).unwrap();
        let make = || {
            random_fully_spectral(
                Axis::singleton("frequency", 1.0).unwrap(),
                Axis::singleton("temperature", 1.0).unwrap(),
                Arc::clone(&sht_inc),
                Arc::clone(&sht_scat),
                1,
                &mut StdRng::seed_from_u64(11),
            )
            .unwrap()
        };
        assert_eq!(make().data(), make().data());
    }
}

/// Fills a fully spectral field with normally distributed coefficients whose
/// spread decays with degree on both directions.
///
/// Coefficients of zonal (m = 0) scattering harmonics are real, so the field is
/// real in scattering angle.
pub fn random_fully_spectral<R: Rng>(
    frequencies: Axis,
    temperatures: Axis,
    sht_inc: Arc<ShtEngine>,
    sht_scat: Arc<ShtEngine>,
    n_components: usize,
    rng: &mut R,
) -> Result<FullySpectralField> {
    let mut scat_modes = Vec::with_capacity(sht_scat.spectral_size());
    for m in 0..=sht_scat.m_max() {
        for l in m..=sht_scat.l_max() {
            scat_modes.push((l, m));
        }
    }

    let shape = [
        frequencies.len(),
        temperatures.len(),
        sht_inc.spectral_size_complex(),
        sht_scat.spectral_size(),
        n_components,
    ];
    let data = ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
        // The incoming engine has m_max = 0, so the incoming index is the degree.
        let l_inc = idx[2] as f64;
        let (l, m) = scat_modes[idx[3]];
        let sigma = 1.0 / ((1.0 + l_inc) * (1.0 + l as f64));
        let re: f64 = rng.sample(StandardNormal);
        let im: f64 = if m == 0 {
            0.0
        } else {
            rng.sample(StandardNormal)
        };
        Complex64::new(re, im) * sigma
    });

    FullySpectralField::new(frequencies, temperatures, sht_inc, sht_scat, data)
}
