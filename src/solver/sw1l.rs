//! One-layer rotating shallow water, vector-invariant form.
//!
//! Evolved fields ux, uy, eta with Coriolis parameter f and squared wave
//! speed c2:
//!   d_t u = -(rot + f) k x u - grad(c2 eta + |u|^2 / 2)
//!   d_t eta = -div((1 + eta) u)
//! The gradient of the Bernoulli function is taken in spectral space after
//! transforming the kinetic part.

use crate::errors::*;
use crate::oper::OperatorsPseudoSpectral2D;
use crate::state::{SetOfVariables, SpectKey};
use ndarray::{Array2, Zip};
use num_complex::Complex64;

pub const KEYS: &[SpectKey] = &[SpectKey::UxFft, SpectKey::UyFft, SpectKey::EtaFft];

#[derive(Clone, Copy, Debug)]
pub struct Sw1l {
    pub f: f64,
    pub c2: f64,
}

impl Sw1l {
    pub fn tendencies_nonlin(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
        forcing: Option<&Array2<Complex64>>,
    ) -> Result<SetOfVariables> {
        let ux_fft = spect.get(SpectKey::UxFft);
        let uy_fft = spect.get(SpectKey::UyFft);
        let eta_fft = spect.get(SpectKey::EtaFft);

        let rot_fft = oper.rotfft_from_vecfft(ux_fft.view(), uy_fft.view());

        let ux = oper.ifft2(ux_fft.view())?;
        let uy = oper.ifft2(uy_fft.view())?;
        let eta = oper.ifft2(eta_fft.view())?;
        let rot = oper.ifft2(rot_fft.view())?;

        let f = self.f;
        let n1x = Zip::from(&rot)
            .and(&uy)
            .map_collect(|&rot, &uy| (rot + f) * uy);
        let n1y = Zip::from(&rot)
            .and(&ux)
            .map_collect(|&rot, &ux| -(rot + f) * ux);
        let ek = Zip::from(&ux)
            .and(&uy)
            .map_collect(|&ux, &uy| 0.5 * (ux * ux + uy * uy));

        // Bernoulli function c2 eta + EK, differentiated spectrally.
        let mut bernoulli_fft = oper.fft2(ek.view())?;
        Zip::from(&mut bernoulli_fft)
            .and(eta_fft)
            .for_each(|b, &e| *b += self.c2 * e);
        let (gradx_fft, grady_fft) = oper.gradfft_from_fft(bernoulli_fft.view());

        let mut fx_fft = oper.fft2(n1x.view())?;
        let mut fy_fft = oper.fft2(n1y.view())?;
        fx_fft -= &gradx_fft;
        fy_fft -= &grady_fft;

        // Mass flux (1 + eta) u.
        let qx = Zip::from(&eta).and(&ux).map_collect(|&e, &u| (1. + e) * u);
        let qy = Zip::from(&eta).and(&uy).map_collect(|&e, &u| (1. + e) * u);
        let qx_fft = oper.fft2(qx.view())?;
        let qy_fft = oper.fft2(qy.view())?;
        let mut feta_fft = oper.divfft_from_vecfft(qx_fft.view(), qy_fft.view());
        feta_fft.map_inplace(|v| *v = -*v);

        oper.dealiasing(&mut fx_fft);
        oper.dealiasing(&mut fy_fft);
        oper.dealiasing(&mut feta_fft);

        if let Some(frot) = forcing {
            // Vorticity forcing enters through its rotational velocity.
            let (ffx, ffy) = oper.vecfft_from_rotfft(frot.view());
            fx_fft += &ffx;
            fy_fft += &ffy;
        }

        let mut tend = SetOfVariables::zeros(KEYS, oper.shape_spect_local());
        *tend.get_mut(SpectKey::UxFft) = fx_fft;
        *tend.get_mut(SpectKey::UyFft) = fy_fft;
        *tend.get_mut(SpectKey::EtaFft) = feta_fft;
        Ok(tend)
    }

    /// Quadratic energy 1/2 (|ux_k|^2 + |uy_k|^2 + c2 |eta_k|^2).
    pub fn compute_energy(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
    ) -> Result<f64> {
        Ok(oper.energy_from_spect(spect.get(SpectKey::UxFft).view())?
            + oper.energy_from_spect(spect.get(SpectKey::UyFft).view())?
            + self.c2 * oper.energy_from_spect(spect.get(SpectKey::EtaFft).view())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oper::tests::create_oper;
    use crate::state::State;

    #[test]
    fn rest_state_is_steady() {
        let oper = create_oper();
        let state = State::new(KEYS, oper.shape_spect_local());
        let eq = Sw1l { f: 1., c2: 400. };

        let tend = eq.tendencies_nonlin(&oper, &state.spect, None).unwrap();
        for var in tend.iter() {
            for v in var.iter() {
                assert!(v.norm() < 1e-14, "{}", v);
            }
        }
    }

    #[test]
    fn surface_gradient_accelerates_flow() {
        let oper = create_oper();
        let mut state = State::new(KEYS, oper.shape_spect_local());
        let mut eta_fft = oper.zeros_spect();
        eta_fft[[0, 1]] = Complex64::new(0.01, 0.);
        state.set_from_spectral(SpectKey::EtaFft, eta_fft.clone());

        let eq = Sw1l { f: 0., c2: 400. };
        let tend = eq.tendencies_nonlin(&oper, &state.spect, None).unwrap();

        // At rest, d_t ux = -c2 dx eta and eta is steady.
        let expected = -400. * eta_fft[[0, 1]] * Complex64::new(0., oper.kx[[0, 1]]);
        assert!((tend.get(SpectKey::UxFft)[[0, 1]] - expected).norm() < 1e-12);
        for v in tend.get(SpectKey::EtaFft).iter() {
            assert!(v.norm() < 1e-13, "{}", v);
        }
    }

    #[test]
    fn coriolis_rotates_a_uniform_mode() {
        let oper = create_oper();
        let mut state = State::new(KEYS, oper.shape_spect_local());
        let mut ux_fft = oper.zeros_spect();
        // A single low mode, weak enough that quadratic terms stay tiny.
        ux_fft[[1, 0]] = Complex64::new(1e-6, 0.);
        state.set_from_spectral(SpectKey::UxFft, ux_fft.clone());

        let eq = Sw1l { f: 2., c2: 0. };
        let tend = eq.tendencies_nonlin(&oper, &state.spect, None).unwrap();

        // -(rot + f) k x u: d_t uy picks up -f ux to leading order.
        let expected = -2. * ux_fft[[1, 0]];
        assert!(
            (tend.get(SpectKey::UyFft)[[1, 0]] - expected).norm() < 1e-10,
            "{} != {}",
            tend.get(SpectKey::UyFft)[[1, 0]],
            expected
        );
    }

    #[test]
    fn forcing_enters_as_rotational_velocity() {
        let oper = create_oper();
        let state = State::new(KEYS, oper.shape_spect_local());
        let mut frot = oper.zeros_spect();
        frot[[1, 1]] = Complex64::new(0.5, 0.5);

        let eq = Sw1l { f: 0., c2: 400. };
        let tend = eq
            .tendencies_nonlin(&oper, &state.spect, Some(&frot))
            .unwrap();

        let (ffx, ffy) = oper.vecfft_from_rotfft(frot.view());
        assert_eq!(tend.get(SpectKey::UxFft)[[1, 1]], ffx[[1, 1]]);
        assert_eq!(tend.get(SpectKey::UyFft)[[1, 1]], ffy[[1, 1]]);
        for v in tend.get(SpectKey::EtaFft).iter() {
            assert!(v.norm() < 1e-14);
        }
    }
}
