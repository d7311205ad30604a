use itertools::iproduct;
use ndarray::{s, Array6, ArrayD, ArrayViewD, Zip};

use crate::axis_interp::AxisInterpolator;
use crate::error::{FieldError, Result};
use crate::grid::Axis;

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::IxDyn;

    fn axis(values: &[f64]) -> Axis {
        Axis::new("angle", values.to_vec()).unwrap()
    }

    #[test]
    fn bilinear_in_two_axes() {
        // f = lat_inc + 10 * lat_scat is reproduced exactly by multilinear weights.
        let lat_inc = axis(&[0.0, 1.0]);
        let lat_scat = axis(&[0.0, 2.0]);
        let one = axis(&[0.0]);
        let data = ArrayD::from_shape_fn(IxDyn(&[1, 1, 1, 2, 1, 2, 1]), |idx| {
            lat_inc.as_slice()[idx[3]] + 10.0 * lat_scat.as_slice()[idx[5]]
        });
        let interp = AngleInterpolator::new(
            [&one, &lat_inc, &one, &lat_scat],
            [&one, &axis(&[0.25, 0.5]), &one, &axis(&[1.5])],
        );
        let out = interp.interpolate(data.view()).unwrap();
        assert_eq!(out.shape(), &[1, 1, 1, 2, 1, 1, 1]);
        assert_abs_diff_eq!(out[IxDyn(&[0, 0, 0, 0, 0, 0, 0])], 15.25, epsilon = 1e-12);
        assert_abs_diff_eq!(out[IxDyn(&[0, 0, 0, 1, 0, 0, 0])], 15.5, epsilon = 1e-12);
    }

    #[test]
    fn size_one_axis_is_constant() {
        let one = axis(&[0.3]);
        let lat = axis(&[0.0, 1.0, 2.0]);
        let data = ArrayD::from_shape_fn(IxDyn(&[2, 1, 1, 3, 1, 1, 2]), |idx| {
            (idx[0] * 7 + idx[3] * 3 + idx[6]) as f64
        });
        let targets = axis(&[0.1, 0.2, 0.4, 0.9]);
        let interp =
            AngleInterpolator::new([&one, &lat, &one, &one], [&targets, &lat, &targets, &one]);
        let out = interp.interpolate(data.view()).unwrap();
        assert_eq!(out.shape(), &[2, 1, 4, 3, 4, 1, 2]);
        for i in 1..4 {
            assert_eq!(
                out.slice(s![.., .., i, .., .., .., ..]),
                out.slice(s![.., .., 0, .., .., .., ..])
            );
        }
        assert_eq!(out[IxDyn(&[1, 0, 2, 2, 3, 0, 1])], data[IxDyn(&[1, 0, 0, 2, 0, 0, 1])]);
    }

    #[test]
    fn rejects_mismatched_data() {
        let one = axis(&[0.0]);
        let two = axis(&[0.0, 1.0]);
        let interp = AngleInterpolator::new([&one, &two, &one, &two], [&one, &two, &one, &two]);
        let data = ArrayD::<f64>::zeros(IxDyn(&[1, 1, 1, 3, 1, 2, 1]));
        assert!(interp.interpolate(data.view()).is_err());
    }
}

/// Joint multilinear interpolation over the four angular axes of a gridded
/// scattering tensor `[f, t, lon_inc, lat_inc, lon_scat, lat_scat, pol]`.
///
/// **Context**: Angular resampling of gridded data mixes up to sixteen source
/// points per target, so the four one-dimensional stencils are combined into
/// one pass instead of four sequential axis passes.
///
/// **How it Works**: One [`AxisInterpolator`] is built per angular axis. Each
/// output point accumulates the weighted source lanes over the corner product
/// of the four stencils. Exact hits and size-1 source axes contribute a single
/// corner of weight one, so the output along a size-1 source axis is a copy of
/// its only slice. Work is split over the (frequency, temperature) batch.
#[derive(Debug, Clone)]
pub struct AngleInterpolator {
    axes: [AxisInterpolator; 4],
}

impl AngleInterpolator {
    /// `sources` and `targets` are ordered lon_inc, lat_inc, lon_scat, lat_scat.
    pub fn new(sources: [&Axis; 4], targets: [&Axis; 4]) -> Self {
        Self {
            axes: [0, 1, 2, 3].map(|i| AxisInterpolator::new(sources[i], targets[i])),
        }
    }

    pub fn target_shape(&self) -> [usize; 4] {
        [0, 1, 2, 3].map(|i| self.axes[i].target_len())
    }

    pub fn interpolate(&self, data: ArrayViewD<f64>) -> Result<ArrayD<f64>> {
        let shape = data.shape().to_vec();
        let source_shape = [0, 1, 2, 3].map(|i| self.axes[i].source_len());
        if shape.len() != 7 || shape[2..6] != source_shape {
            let mut expected = shape.clone();
            expected.resize(7, 1);
            expected[2..6].copy_from_slice(&source_shape);
            return Err(FieldError::ShapeMismatch {
                what: "gridded angular data",
                expected,
                actual: shape,
            });
        }

        let (n_f, n_t, n_pol) = (shape[0], shape[1], shape[6]);
        let batch = n_f * n_t;
        let data = data.to_shape((
            batch,
            source_shape[0],
            source_shape[1],
            source_shape[2],
            source_shape[3],
            n_pol,
        ))?;

        let [t0, t1, t2, t3] = self.target_shape();
        let corners: [Vec<Vec<(usize, f64)>>; 4] = [0, 1, 2, 3].map(|i| {
            self.axes[i]
                .stencils()
                .iter()
                .map(|s| s.corners())
                .collect()
        });

        let mut out = Array6::<f64>::zeros((batch, t0, t1, t2, t3, n_pol));
        Zip::from(out.outer_iter_mut())
            .and(data.outer_iter())
            .par_for_each(|mut target, source| {
                for (i0, i1, i2, i3) in iproduct!(0..t0, 0..t1, 0..t2, 0..t3) {
                    let mut lane = target.slice_mut(s![i0, i1, i2, i3, ..]);
                    for (&(j0, w0), &(j1, w1), &(j2, w2), &(j3, w3)) in iproduct!(
                        &corners[0][i0],
                        &corners[1][i1],
                        &corners[2][i2],
                        &corners[3][i3]
                    ) {
                        lane.scaled_add(w0 * w1 * w2 * w3, &source.slice(s![j0, j1, j2, j3, ..]));
                    }
                }
            });

        Ok(out.into_shape_with_order(vec![n_f, n_t, t0, t1, t2, t3, n_pol])?)
    }
}
