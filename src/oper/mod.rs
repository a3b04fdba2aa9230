//! Pseudo-spectral operators on the doubly periodic box.
//!
//! Owns the wavenumber grid, the dealiasing mask and every differential or
//! algebraic operator the tendencies computers need. All arrays are local to
//! the decomposition: the wavenumber meshes are built from the provider's
//! local spectral block, so the same code runs under any number of
//! partitions. Everything here is computed once at construction and
//! immutable afterwards.

pub mod fft_helper;

use self::fft_helper::{inverse_norm_squared, k_meshes};
use crate::decomp::{DecompContext, TransformProvider};
use crate::errors::*;
use crate::settings::OperSettings;
use crate::state::SetOfVariables;
use ndarray::{Array2, ArrayView2, Zip};
use num_complex::Complex64;

pub struct OperatorsPseudoSpectral2D {
    ctx: DecompContext,
    provider: Box<dyn TransformProvider + Send + Sync>,

    pub nx: usize,
    pub ny: usize,
    pub lx: f64,
    pub ly: f64,
    pub deltax: f64,
    pub deltay: f64,
    pub deltakx: f64,
    pub deltaky: f64,
    /// Smallest wavenumber increment, the unit of forcing band bounds.
    pub deltakh: f64,
    pub coef_dealiasing: f64,

    shape_phys_loc: (usize, usize),
    shape_spect_loc: (usize, usize),

    pub kx: Array2<f64>,
    pub ky: Array2<f64>,
    pub k2: Array2<f64>,
    pub k4: Array2<f64>,
    /// 1/|k|^2 with the zero mode defined as exactly zero.
    pub inv_k2: Array2<f64>,

    /// True where a coefficient is truncated after a nonlinear product.
    dealiasing_mask: Array2<bool>,
    /// Conjugate-symmetry weights for sums over the half spectrum: the
    /// kx = 0 column (and the Nyquist column for even nx) represents one
    /// coefficient, every other column two.
    weights: Array2<f64>,
}

impl OperatorsPseudoSpectral2D {
    pub fn new(
        settings: &OperSettings,
        provider: Box<dyn TransformProvider + Send + Sync>,
        ctx: DecompContext,
    ) -> Result<OperatorsPseudoSpectral2D> {
        let (nx, ny) = (settings.nx, settings.ny);
        let (lx, ly) = (settings.lx, settings.ly);

        let shape_phys_loc = provider.shape_phys_local();
        let shape_spect_loc = provider.shape_spect_local();
        let row_offset = provider.spect_row_offset();

        // The local blocks must tile the global grid of this resolution;
        // anything else is unrecoverable at this boundary.
        if shape_phys_loc.1 != nx || shape_phys_loc.0 > ny {
            bail!(ErrorKind::ShapeMismatch((ny, nx), shape_phys_loc));
        }
        let nxh = nx / 2 + 1;
        if shape_spect_loc.1 != nxh || row_offset + shape_spect_loc.0 > ny {
            bail!(ErrorKind::ShapeMismatch((ny, nxh), shape_spect_loc));
        }

        let deltax = lx / nx as f64;
        let deltay = ly / ny as f64;
        let deltakx = crate::consts::TWOPI / lx;
        let deltaky = crate::consts::TWOPI / ly;

        let (nk0, nk1) = shape_spect_loc;
        let (kx, ky) = k_meshes(nk0, nk1, row_offset, nx, ny, lx, ly);
        let k2 = &kx * &kx + &ky * &ky;
        let k4 = &k2 * &k2;
        let inv_k2 = inverse_norm_squared(&k2);

        let kx_max = deltakx * (nx / 2) as f64;
        let ky_max = deltaky * (ny / 2) as f64;
        let coef = settings.coef_dealiasing;
        let dealiasing_mask = Zip::from(&kx)
            .and(&ky)
            .map_collect(|&kx, &ky| kx.abs() > coef * kx_max || ky.abs() > coef * ky_max);

        let weights = Array2::from_shape_fn((nk0, nk1), |(_, i)| {
            if i == 0 || (nx % 2 == 0 && i == nk1 - 1) {
                1.
            } else {
                2.
            }
        });

        Ok(OperatorsPseudoSpectral2D {
            ctx,
            provider,
            nx,
            ny,
            lx,
            ly,
            deltax,
            deltay,
            deltakx,
            deltaky,
            deltakh: deltakx.min(deltaky),
            coef_dealiasing: coef,
            shape_phys_loc,
            shape_spect_loc,
            kx,
            ky,
            k2,
            k4,
            inv_k2,
            dealiasing_mask,
            weights,
        })
    }

    pub fn ctx(&self) -> DecompContext {
        self.ctx
    }

    pub fn shape_phys_local(&self) -> (usize, usize) {
        self.shape_phys_loc
    }

    pub fn shape_spect_local(&self) -> (usize, usize) {
        self.shape_spect_loc
    }

    pub fn fft2(&self, phys: ArrayView2<f64>) -> Result<Array2<Complex64>> {
        self.provider.forward(phys)
    }

    pub fn ifft2(&self, spect: ArrayView2<Complex64>) -> Result<Array2<f64>> {
        self.provider.backward(spect)
    }

    /// Spectral gradient: multiplication by i k, component wise. Exactly
    /// zero for the zero wavenumber.
    pub fn gradfft_from_fft(
        &self,
        f: ArrayView2<Complex64>,
    ) -> (Array2<Complex64>, Array2<Complex64>) {
        let px = Zip::from(&f)
            .and(&self.kx)
            .map_collect(|&v, &k| v * Complex64::new(0., k));
        let py = Zip::from(&f)
            .and(&self.ky)
            .map_collect(|&v, &k| v * Complex64::new(0., k));
        (px, py)
    }

    /// Vorticity from a velocity vector: i kx uy - i ky ux.
    pub fn rotfft_from_vecfft(
        &self,
        ux: ArrayView2<Complex64>,
        uy: ArrayView2<Complex64>,
    ) -> Array2<Complex64> {
        Zip::from(&ux)
            .and(&uy)
            .and(&self.kx)
            .and(&self.ky)
            .map_collect(|&ux, &uy, &kx, &ky| {
                uy * Complex64::new(0., kx) - ux * Complex64::new(0., ky)
            })
    }

    /// Divergence of a velocity vector: i kx ux + i ky uy.
    pub fn divfft_from_vecfft(
        &self,
        ux: ArrayView2<Complex64>,
        uy: ArrayView2<Complex64>,
    ) -> Array2<Complex64> {
        Zip::from(&ux)
            .and(&uy)
            .and(&self.kx)
            .and(&self.ky)
            .map_collect(|&ux, &uy, &kx, &ky| {
                ux * Complex64::new(0., kx) + uy * Complex64::new(0., ky)
            })
    }

    /// Non-divergent velocity recovered from vorticity as k-perp/|k|^2.
    /// The zero-wavenumber mode is exactly zero: the mean flow is excluded
    /// by convention.
    pub fn vecfft_from_rotfft(
        &self,
        rot: ArrayView2<Complex64>,
    ) -> (Array2<Complex64>, Array2<Complex64>) {
        let ux = Zip::from(&rot)
            .and(&self.ky)
            .and(&self.inv_k2)
            .map_collect(|&r, &ky, &ik2| r * Complex64::new(0., ky * ik2));
        let uy = Zip::from(&rot)
            .and(&self.kx)
            .and(&self.inv_k2)
            .map_collect(|&r, &kx, &ik2| r * Complex64::new(0., -kx * ik2));
        (ux, uy)
    }

    /// Curl-free velocity recovered from divergence; zero mode excluded.
    pub fn vecfft_from_divfft(
        &self,
        div: ArrayView2<Complex64>,
    ) -> (Array2<Complex64>, Array2<Complex64>) {
        let ux = Zip::from(&div)
            .and(&self.kx)
            .and(&self.inv_k2)
            .map_collect(|&d, &kx, &ik2| d * Complex64::new(0., -kx * ik2));
        let uy = Zip::from(&div)
            .and(&self.ky)
            .and(&self.inv_k2)
            .map_collect(|&d, &ky, &ik2| d * Complex64::new(0., -ky * ik2));
        (ux, uy)
    }

    /// Helmholtz decomposition: projection onto the k-perpendicular
    /// (rotational) and k-parallel (divergent) subspaces, returned as the
    /// scalar potentials (vorticity, divergence).
    pub fn rotdivfft_from_vecfft(
        &self,
        ux: ArrayView2<Complex64>,
        uy: ArrayView2<Complex64>,
    ) -> (Array2<Complex64>, Array2<Complex64>) {
        (
            self.rotfft_from_vecfft(ux, uy),
            self.divfft_from_vecfft(ux, uy),
        )
    }

    /// Inverse of the Helmholtz decomposition.
    pub fn vecfft_from_rotdivfft(
        &self,
        rot: ArrayView2<Complex64>,
        div: ArrayView2<Complex64>,
    ) -> (Array2<Complex64>, Array2<Complex64>) {
        let (urx, ury) = self.vecfft_from_rotfft(rot);
        let (udx, udy) = self.vecfft_from_divfft(div);
        (urx + udx, ury + udy)
    }

    /// Rotational and divergent vector parts of a velocity field.
    pub fn helmholtz_decompose(
        &self,
        ux: ArrayView2<Complex64>,
        uy: ArrayView2<Complex64>,
    ) -> (
        (Array2<Complex64>, Array2<Complex64>),
        (Array2<Complex64>, Array2<Complex64>),
    ) {
        let (rot, div) = self.rotdivfft_from_vecfft(ux, uy);
        (
            self.vecfft_from_rotfft(rot.view()),
            self.vecfft_from_divfft(div.view()),
        )
    }

    pub fn laplacian_fft(&self, f: ArrayView2<Complex64>) -> Array2<Complex64> {
        Zip::from(&f).and(&self.k2).map_collect(|&v, &k2| -k2 * v)
    }

    /// Inverse Laplacian with the zero mode defined as zero.
    pub fn invlaplacian_fft(&self, f: ArrayView2<Complex64>) -> Array2<Complex64> {
        Zip::from(&f)
            .and(&self.inv_k2)
            .map_collect(|&v, &ik2| -ik2 * v)
    }

    /// Zeroes the coefficients outside the retained band, in place. Called
    /// after every nonlinear product evaluated through the transform;
    /// idempotent.
    pub fn dealiasing(&self, f: &mut Array2<Complex64>) {
        Zip::from(f).and(&self.dealiasing_mask).for_each(|v, &m| {
            if m {
                *v = Complex64::new(0., 0.);
            }
        });
    }

    pub fn dealiasing_setofvar(&self, set: &mut SetOfVariables) {
        for var in set.iter_mut() {
            self.dealiasing(var);
        }
    }

    /// Sum of a real spectral quantity over all wavenumbers, counting the
    /// conjugate-symmetric half that is not stored. Reduced over the
    /// decomposition, so every rank sees the same global value; this feeds
    /// the CFL step size and the forcing amplitude, not just diagnostics.
    pub fn sum_wavenumbers(&self, field: ArrayView2<f64>) -> Result<f64> {
        let local = Zip::from(&field)
            .and(&self.weights)
            .fold(0., |acc, &v, &w| acc + v * w);
        self.provider.sum_scalar(self.ctx, local)
    }

    /// Energy 1/2 sum |f_k|^2 of one spectral field.
    pub fn energy_from_spect(&self, f: ArrayView2<Complex64>) -> Result<f64> {
        self.sum_wavenumbers(f.map(|v| 0.5 * v.norm_sqr()).view())
    }

    pub fn gather_phys_to_root(&self, local: ArrayView2<f64>) -> Result<Option<Array2<f64>>> {
        self.provider.gather_phys(self.ctx, local)
    }

    pub fn gather_spect_to_root(
        &self,
        local: ArrayView2<Complex64>,
    ) -> Result<Option<Array2<Complex64>>> {
        self.provider.gather_spect(self.ctx, local)
    }

    /// Largest absolute value of a physical field, reduced over the
    /// decomposition so every rank agrees on the CFL bound.
    pub fn max_abs_phys(&self, f: ArrayView2<f64>) -> Result<f64> {
        let local = f.iter().fold(0., |acc: f64, &v| acc.max(v.abs()));
        self.provider.max_scalar(self.ctx, local)
    }

    /// A spectral array of the local shape, all zeros.
    pub fn zeros_spect(&self) -> Array2<Complex64> {
        Array2::zeros(self.shape_spect_loc)
    }

    /// A physical array of the local shape, all zeros.
    pub fn zeros_phys(&self) -> Array2<f64> {
        Array2::zeros(self.shape_phys_loc)
    }
}
