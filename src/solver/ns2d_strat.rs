//! Stratified 2D Navier-Stokes under the Boussinesq approximation.
//!
//! Vorticity plus buoyancy b with background stratification N:
//! d_t rot = -u.grad(rot) - beta uy + dx b, d_t b = -u.grad(b) - N^2 uy.

use crate::errors::*;
use crate::oper::OperatorsPseudoSpectral2D;
use crate::state::{SetOfVariables, SpectKey};
use ndarray::{Array2, Zip};
use num_complex::Complex64;

pub const KEYS: &[SpectKey] = &[SpectKey::RotFft, SpectKey::BFft];

#[derive(Clone, Copy, Debug)]
pub struct Ns2dStrat {
    pub beta: f64,
    pub brunt_vaisala: f64,
}

impl Ns2dStrat {
    pub fn tendencies_nonlin(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
        forcing: Option<&Array2<Complex64>>,
    ) -> Result<SetOfVariables> {
        let rot_fft = spect.get(SpectKey::RotFft);
        let b_fft = spect.get(SpectKey::BFft);

        let (ux_fft, uy_fft) = oper.vecfft_from_rotfft(rot_fft.view());
        let (px_rot_fft, py_rot_fft) = oper.gradfft_from_fft(rot_fft.view());
        let (px_b_fft, py_b_fft) = oper.gradfft_from_fft(b_fft.view());

        let ux = oper.ifft2(ux_fft.view())?;
        let uy = oper.ifft2(uy_fft.view())?;
        let px_rot = oper.ifft2(px_rot_fft.view())?;
        let py_rot = oper.ifft2(py_rot_fft.view())?;
        let px_b = oper.ifft2(px_b_fft.view())?;
        let py_b = oper.ifft2(py_b_fft.view())?;

        let beta = self.beta;
        let frot = Zip::from(&ux)
            .and(&uy)
            .and(&px_rot)
            .and(&py_rot)
            .map_collect(|&ux, &uy, &px, &py| -ux * px - uy * (py + beta));
        let fb = Zip::from(&ux)
            .and(&uy)
            .and(&px_b)
            .and(&py_b)
            .map_collect(|&ux, &uy, &px, &py| -ux * px - uy * py);

        let mut frot_fft = oper.fft2(frot.view())?;
        let mut fb_fft = oper.fft2(fb.view())?;

        // Linear coupling terms, exact in spectral space.
        let n2 = self.brunt_vaisala * self.brunt_vaisala;
        Zip::from(&mut frot_fft)
            .and(b_fft)
            .and(&oper.kx)
            .for_each(|f, &b, &kx| *f += b * Complex64::new(0., kx));
        Zip::from(&mut fb_fft)
            .and(&uy_fft)
            .for_each(|f, &uy| *f -= n2 * uy);

        oper.dealiasing(&mut frot_fft);
        oper.dealiasing(&mut fb_fft);

        if let Some(f) = forcing {
            frot_fft += f;
        }

        let mut tend = SetOfVariables::zeros(KEYS, oper.shape_spect_local());
        *tend.get_mut(SpectKey::RotFft) = frot_fft;
        *tend.get_mut(SpectKey::BFft) = fb_fft;
        Ok(tend)
    }

    /// Kinetic plus available potential energy, the latter 1/2 |b_k|^2 / N^2.
    pub fn compute_energy(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
    ) -> Result<f64> {
        let rot_fft = spect.get(SpectKey::RotFft);
        let b_fft = spect.get(SpectKey::BFft);
        let n2 = self.brunt_vaisala * self.brunt_vaisala;

        let e_kin = Zip::from(rot_fft)
            .and(&oper.inv_k2)
            .map_collect(|&r, &ik2| 0.5 * r.norm_sqr() * ik2);
        let mut e = oper.sum_wavenumbers(e_kin.view())?;
        if n2 > 0. {
            e += oper.energy_from_spect(b_fft.view())? / n2;
        }
        Ok(e)
    }
}
