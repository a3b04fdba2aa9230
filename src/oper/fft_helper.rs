//! Wavenumber samplings and meshes for the half-spectrum layout.

use crate::consts::TWOPI;
use ndarray::{Array1, Array2};

/// Returns a sampling of k values along a full axis in FFT standard order.
///
/// For a grid size of `n`, the 0th-mode is at index `0`. For even `n` the
/// index `n/2` represents both the largest positive and negative frequency
/// and carries the negative value. For the values at index `i`, `-i = n-i`
/// holds true.
///
/// Example:
///     n = 6 => k = [0, 1, 2, -3, -2, -1] * 2 pi / l
///     n = 7 => k = [0, 1, 2, 3, -3, -2, -1] * 2 pi / l
pub fn k_sampling_full(n: usize, l: f64) -> Array1<f64> {
    let step = TWOPI / l;

    Array1::from_shape_fn(n, |j| {
        let k = if j < (n + 1) / 2 {
            j as isize
        } else {
            j as isize - n as isize
        };
        k as f64 * step
    })
}

/// Positive-only sampling for the real-to-complex axis, length `n/2 + 1`.
pub fn k_sampling_half(n: usize, l: f64) -> Array1<f64> {
    let step = TWOPI / l;
    Array1::from_shape_fn(n / 2 + 1, |i| i as f64 * step)
}

/// Returns meshgrids `(KX, KY)` for a local spectral block of `nk0` rows
/// starting at global row `row_offset`, `nk1` columns.
pub fn k_meshes(
    nk0: usize,
    nk1: usize,
    row_offset: usize,
    nx: usize,
    ny: usize,
    lx: f64,
    ly: f64,
) -> (Array2<f64>, Array2<f64>) {
    let kx = k_sampling_half(nx, lx);
    let ky = k_sampling_full(ny, ly);

    let kx_mesh = Array2::from_shape_fn((nk0, nk1), |(_, i)| kx[i]);
    let ky_mesh = Array2::from_shape_fn((nk0, nk1), |(j, _)| ky[row_offset + j]);

    (kx_mesh, ky_mesh)
}

/// Scalar field of the inverse norm squared of the k values.
///
/// The inverse norm of k = 0 is set to zero, i.e. 1/(k=0)^2 == 0, so that
/// divisions by |k|^2 never produce NaN/Inf and the mean mode contributes
/// nothing.
pub fn inverse_norm_squared(k2: &Array2<f64>) -> Array2<f64> {
    k2.map(|&v| if v == 0. { 0. } else { 1. / v })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::equal_floats;

    #[test]
    fn test_k_sampling_full() {
        let k = k_sampling_full(6, 6.);

        let expect = [
            0.,
            1.0471975511965976,
            2.0943951023931953,
            -3.1415926535897931,
            -2.0943951023931953,
            -1.0471975511965976,
        ];

        for (v, e) in k.iter().zip(&expect) {
            assert!(equal_floats(*v, *e), "{} != {}", v, e);
        }

        let k = k_sampling_full(7, 7.);

        let expect = [
            0.,
            0.8975979010256552,
            1.7951958020513104,
            2.6927937030769655,
            -2.6927937030769655,
            -1.7951958020513104,
            -0.8975979010256552,
        ];

        for (v, e) in k.iter().zip(&expect) {
            assert!(equal_floats(*v, *e), "{} != {}", v, e);
        }
    }

    #[test]
    fn test_k_sampling_half() {
        let k = k_sampling_half(8, crate::consts::TWOPI);

        assert_eq!(k.len(), 5);
        for (i, v) in k.iter().enumerate() {
            assert!(equal_floats(*v, i as f64), "{} != {}", v, i);
        }
    }

    #[test]
    fn test_k_meshes() {
        let (kx, ky) = k_meshes(4, 3, 0, 4, 4, crate::consts::TWOPI, crate::consts::TWOPI);

        assert_eq!(kx.dim(), (4, 3));
        for j in 0..4 {
            for (i, e) in [0., 1., 2.].iter().enumerate() {
                assert!(equal_floats(kx[[j, i]], *e));
            }
        }
        let ky_expect = [0., 1., -2., -1.];
        for (j, e) in ky_expect.iter().enumerate() {
            for i in 0..3 {
                assert!(equal_floats(ky[[j, i]], *e));
            }
        }
    }

    #[test]
    fn test_inverse_norm_squared() {
        let (kx, ky) = k_meshes(4, 3, 0, 4, 4, crate::consts::TWOPI, crate::consts::TWOPI);
        let k2 = &kx * &kx + &ky * &ky;
        let inv = inverse_norm_squared(&k2);

        assert_eq!(inv[[0, 0]], 0.);
        assert!(equal_floats(inv[[0, 1]], 1.));
        assert!(equal_floats(inv[[1, 1]], 0.5));
        assert!(equal_floats(inv[[2, 0]], 0.25));
    }
}
