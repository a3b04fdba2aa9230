//! Sequential transform provider backed by rustfft.
//!
//! The layout matches the usual real-to-complex convention: a real field of
//! shape `(ny, nx)` transforms to `(ny, nx/2 + 1)` complex coefficients,
//! kx >= 0 only. The negative-kx half is redundant for a real field and is
//! reconstructed on the way back, so conjugate symmetry cannot be violated
//! by construction.

use super::{DecompContext, TransformProvider};
use crate::errors::*;
use ndarray::{s, Array2, ArrayView2, Zip};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

pub struct SequentialFft2 {
    nx: usize,
    ny: usize,
    fwd_x: Arc<dyn Fft<f64>>,
    inv_x: Arc<dyn Fft<f64>>,
    fwd_y: Arc<dyn Fft<f64>>,
    inv_y: Arc<dyn Fft<f64>>,
}

impl SequentialFft2 {
    pub fn new(nx: usize, ny: usize) -> Result<SequentialFft2> {
        if nx < 2 || ny < 2 {
            bail!(ErrorKind::Config(format!(
                "transform needs at least a 2x2 grid, got {}x{}",
                nx, ny
            )));
        }

        let mut planner = FftPlanner::new();

        Ok(SequentialFft2 {
            nx,
            ny,
            fwd_x: planner.plan_fft_forward(nx),
            inv_x: planner.plan_fft_inverse(nx),
            fwd_y: planner.plan_fft_forward(ny),
            inv_y: planner.plan_fft_inverse(ny),
        })
    }

    fn nxh(&self) -> usize {
        self.nx / 2 + 1
    }

    fn check_phys_shape(&self, got: (usize, usize)) -> Result<()> {
        let expected = (self.ny, self.nx);
        if got != expected {
            bail!(ErrorKind::ShapeMismatch(expected, got));
        }
        Ok(())
    }

    fn check_spect_shape(&self, got: (usize, usize)) -> Result<()> {
        let expected = (self.ny, self.nxh());
        if got != expected {
            bail!(ErrorKind::ShapeMismatch(expected, got));
        }
        Ok(())
    }
}

impl TransformProvider for SequentialFft2 {
    fn shape_phys_local(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    fn shape_spect_local(&self) -> (usize, usize) {
        (self.ny, self.nxh())
    }

    fn spect_row_offset(&self) -> usize {
        0
    }

    fn forward(&self, phys: ArrayView2<f64>) -> Result<Array2<Complex64>> {
        self.check_phys_shape(phys.dim())?;

        let nxh = self.nxh();
        let norm = 1. / (self.nx * self.ny) as f64;

        // Pass along x, one transform per row.
        let mut buf = phys.map(|&v| Complex64::new(v, 0.));
        Zip::from(buf.rows_mut()).par_for_each(|mut row| {
            self.fwd_x.process(row.as_slice_mut().unwrap());
        });

        // Pass along y on the retained kx columns.
        let mut out = Array2::<Complex64>::zeros((self.ny, nxh));
        Zip::from(out.columns_mut())
            .and(buf.slice(s![.., ..nxh]).columns())
            .par_for_each(|mut ocol, icol| {
                let mut tmp: Vec<Complex64> = icol.to_vec();
                self.fwd_y.process(&mut tmp);
                for (o, t) in ocol.iter_mut().zip(&tmp) {
                    *o = *t * norm;
                }
            });

        Ok(out)
    }

    fn backward(&self, spect: ArrayView2<Complex64>) -> Result<Array2<f64>> {
        self.check_spect_shape(spect.dim())?;

        let nx = self.nx;
        let nxh = self.nxh();

        // Inverse pass along y; rows end up in mixed (y, kx) space.
        let mut mixed = Array2::<Complex64>::zeros((self.ny, nxh));
        Zip::from(mixed.columns_mut())
            .and(spect.columns())
            .par_for_each(|mut mcol, scol| {
                let mut tmp: Vec<Complex64> = scol.to_vec();
                self.inv_y.process(&mut tmp);
                for (m, t) in mcol.iter_mut().zip(&tmp) {
                    *m = *t;
                }
            });

        // Mirror the redundant kx < 0 half per row and inverse transform
        // along x. Each mixed-space row is the x spectrum of a real
        // function, hence Hermitian.
        let mut full = Array2::<Complex64>::zeros((self.ny, nx));
        Zip::from(full.rows_mut())
            .and(mixed.rows())
            .par_for_each(|mut frow, mrow| {
                for (i, v) in mrow.iter().enumerate() {
                    frow[i] = *v;
                }
                for i in nxh..nx {
                    frow[i] = mrow[nx - i].conj();
                }
                self.inv_x.process(frow.as_slice_mut().unwrap());
            });

        Ok(full.map(|v| v.re))
    }

    fn gather_phys(
        &self,
        ctx: DecompContext,
        local: ArrayView2<f64>,
    ) -> Result<Option<Array2<f64>>> {
        if ctx.size != 1 {
            bail!(ErrorKind::Config(format!(
                "sequential provider used with a decomposition of size {}",
                ctx.size
            )));
        }
        self.check_phys_shape(local.dim())?;
        Ok(if ctx.is_root() {
            Some(local.to_owned())
        } else {
            None
        })
    }

    fn gather_spect(
        &self,
        ctx: DecompContext,
        local: ArrayView2<Complex64>,
    ) -> Result<Option<Array2<Complex64>>> {
        if ctx.size != 1 {
            bail!(ErrorKind::Config(format!(
                "sequential provider used with a decomposition of size {}",
                ctx.size
            )));
        }
        self.check_spect_shape(local.dim())?;
        Ok(if ctx.is_root() {
            Some(local.to_owned())
        } else {
            None
        })
    }

    fn sum_scalar(&self, ctx: DecompContext, local: f64) -> Result<f64> {
        if ctx.size != 1 {
            bail!(ErrorKind::Config(format!(
                "sequential provider used with a decomposition of size {}",
                ctx.size
            )));
        }
        Ok(local)
    }

    fn max_scalar(&self, ctx: DecompContext, local: f64) -> Result<f64> {
        if ctx.size != 1 {
            bail!(ErrorKind::Config(format!(
                "sequential provider used with a decomposition of size {}",
                ctx.size
            )));
        }
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::equal_floats_tol;
    use ndarray::Array;

    fn sample_field(ny: usize, nx: usize) -> Array2<f64> {
        // A deterministic, non-symmetric field with several active modes.
        Array::from_shape_fn((ny, nx), |(j, i)| {
            let x = i as f64 / nx as f64;
            let y = j as f64 / ny as f64;
            (crate::consts::TWOPI * x).cos()
                + 0.5 * (crate::consts::TWOPI * 2. * y).sin()
                + 0.1 * (crate::consts::TWOPI * (3. * x + y)).cos()
        })
    }

    #[test]
    fn round_trip() {
        let fft = SequentialFft2::new(8, 8).unwrap();
        let f = sample_field(8, 8);

        let f_fft = fft.forward(f.view()).unwrap();
        let f_back = fft.backward(f_fft.view()).unwrap();

        for (a, b) in f.iter().zip(f_back.iter()) {
            assert!(equal_floats_tol(*a, *b, 1e-14), "{} != {}", a, b);
        }
    }

    #[test]
    fn round_trip_rectangular() {
        let fft = SequentialFft2::new(16, 8).unwrap();
        let f = sample_field(8, 16);

        let f_fft = fft.forward(f.view()).unwrap();
        assert_eq!(f_fft.dim(), (8, 9));
        let f_back = fft.backward(f_fft.view()).unwrap();

        for (a, b) in f.iter().zip(f_back.iter()) {
            assert!(equal_floats_tol(*a, *b, 1e-14), "{} != {}", a, b);
        }
    }

    #[test]
    fn single_mode_coefficient() {
        // cos(2 pi x / L) has coefficients 1/2 at (ky=0, kx=1) only.
        let (ny, nx) = (8, 8);
        let fft = SequentialFft2::new(nx, ny).unwrap();
        let f = Array::from_shape_fn((ny, nx), |(_, i)| {
            (crate::consts::TWOPI * i as f64 / nx as f64).cos()
        });

        let f_fft = fft.forward(f.view()).unwrap();

        for ((j, i), v) in f_fft.indexed_iter() {
            let expected = if j == 0 && i == 1 { 0.5 } else { 0. };
            assert!(
                equal_floats_tol(v.re, expected, 1e-14) && equal_floats_tol(v.im, 0., 1e-14),
                "({}, {}): {}",
                j,
                i,
                v
            );
        }
    }

    #[test]
    fn forward_rejects_wrong_shape() {
        let fft = SequentialFft2::new(8, 8).unwrap();
        let f = Array2::<f64>::zeros((4, 8));
        assert!(fft.forward(f.view()).is_err());
    }

    #[test]
    fn gather_is_identity_on_size_one() {
        let fft = SequentialFft2::new(8, 8).unwrap();
        let ctx = DecompContext::sequential();
        let f = sample_field(8, 8);

        let g = fft.gather_phys(ctx, f.view()).unwrap().unwrap();
        assert_eq!(f, g);
    }

    #[test]
    fn scalar_reductions_are_identity_on_size_one() {
        let fft = SequentialFft2::new(8, 8).unwrap();
        let ctx = DecompContext::sequential();

        assert_eq!(fft.sum_scalar(ctx, 1.5).unwrap(), 1.5);
        assert_eq!(fft.max_scalar(ctx, -0.25).unwrap(), -0.25);
        assert!(fft
            .sum_scalar(DecompContext { rank: 0, size: 2 }, 1.)
            .is_err());
    }
}
