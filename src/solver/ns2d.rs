//! Incompressible 2D Navier-Stokes in vorticity form.
//!
//! d_t rot = -u.grad(rot) - beta uy + forcing, with u recovered from rot by
//! the k-perp inversion. The beta term sits inside the advection product so
//! a beta-plane run works with or without forcing.

use crate::errors::*;
use crate::oper::OperatorsPseudoSpectral2D;
use crate::state::{SetOfVariables, SpectKey};
use ndarray::{Array2, Zip};
use num_complex::Complex64;

pub const KEYS: &[SpectKey] = &[SpectKey::RotFft];

#[derive(Clone, Copy, Debug)]
pub struct Ns2d {
    pub beta: f64,
}

impl Ns2d {
    pub fn tendencies_nonlin(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
        forcing: Option<&Array2<Complex64>>,
    ) -> Result<SetOfVariables> {
        let rot_fft = spect.get(SpectKey::RotFft);

        let (ux_fft, uy_fft) = oper.vecfft_from_rotfft(rot_fft.view());
        let (px_rot_fft, py_rot_fft) = oper.gradfft_from_fft(rot_fft.view());

        let ux = oper.ifft2(ux_fft.view())?;
        let uy = oper.ifft2(uy_fft.view())?;
        let px_rot = oper.ifft2(px_rot_fft.view())?;
        let py_rot = oper.ifft2(py_rot_fft.view())?;

        let beta = self.beta;
        let frot = Zip::from(&ux)
            .and(&uy)
            .and(&px_rot)
            .and(&py_rot)
            .map_collect(|&ux, &uy, &px, &py| -ux * px - uy * (py + beta));

        let mut frot_fft = oper.fft2(frot.view())?;
        oper.dealiasing(&mut frot_fft);

        if let Some(f) = forcing {
            frot_fft += f;
        }

        let mut tend = SetOfVariables::zeros(KEYS, oper.shape_spect_local());
        *tend.get_mut(SpectKey::RotFft) = frot_fft;
        Ok(tend)
    }

    /// Kinetic energy 1/2 sum |rot_k|^2 / |k|^2.
    pub fn compute_energy(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
    ) -> Result<f64> {
        let rot_fft = spect.get(SpectKey::RotFft);
        let density = Zip::from(rot_fft)
            .and(&oper.inv_k2)
            .map_collect(|&r, &ik2| 0.5 * r.norm_sqr() * ik2);
        oper.sum_wavenumbers(density.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oper::tests::{create_oper, random_phys};
    use crate::state::PhysKey;

    fn single_mode_state(
        oper: &OperatorsPseudoSpectral2D,
        eq: &Ns2d,
    ) -> crate::state::State {
        let mut rot_fft = oper.zeros_spect();
        rot_fft[[1, 1]] = Complex64::new(0.3, -0.2);
        crate::solver::EquationSet::Ns2d(*eq).state_from_rotfft(oper, rot_fft)
    }

    #[test]
    fn single_mode_has_zero_tendency() {
        // A lone Fourier mode is an exact steady solution of the inviscid
        // unforced equations: its own flow advects it nowhere.
        let oper = create_oper();
        let eq = Ns2d { beta: 0. };
        let state = single_mode_state(&oper, &eq);

        let tend = eq.tendencies_nonlin(&oper, &state.spect, None).unwrap();
        for v in tend.get(SpectKey::RotFft).iter() {
            assert!(v.norm() < 1e-14, "{}", v);
        }
    }

    #[test]
    fn beta_term_acts_without_forcing() {
        let oper = create_oper();
        let state = single_mode_state(&oper, &Ns2d { beta: 0. });

        let tend = Ns2d { beta: 1.5 }
            .tendencies_nonlin(&oper, &state.spect, None)
            .unwrap();
        let max = tend.get(SpectKey::RotFft).iter().fold(0., |a: f64, v| a.max(v.norm()));
        assert!(max > 1e-3, "beta tendency missing, max {}", max);
    }

    #[test]
    fn tendency_is_dealiased() {
        let oper = create_oper();
        let mut rot_fft = oper.fft2(random_phys(&oper, 20).view()).unwrap();
        rot_fft[[0, 0]] = Complex64::new(0., 0.);
        oper.dealiasing(&mut rot_fft);
        let eq = Ns2d { beta: 0. };
        let state = crate::solver::EquationSet::Ns2d(eq).state_from_rotfft(&oper, rot_fft);

        let mut tend = eq.tendencies_nonlin(&oper, &state.spect, None).unwrap();
        let before = tend.get(SpectKey::RotFft).clone();
        oper.dealiasing(tend.get_mut(SpectKey::RotFft));
        assert_eq!(before, *tend.get(SpectKey::RotFft));
    }

    #[test]
    fn energy_matches_velocity_energy() {
        let oper = create_oper();
        let mut rot_fft = oper.fft2(random_phys(&oper, 21).view()).unwrap();
        rot_fft[[0, 0]] = Complex64::new(0., 0.);
        let eq = Ns2d { beta: 0. };
        let state = crate::solver::EquationSet::Ns2d(eq).state_from_rotfft(&oper, rot_fft);

        let (ux_fft, uy_fft) =
            oper.vecfft_from_rotfft(state.spect.get(SpectKey::RotFft).view());
        let e_vec = oper.energy_from_spect(ux_fft.view()).unwrap()
            + oper.energy_from_spect(uy_fft.view()).unwrap();
        let e = eq.compute_energy(&oper, &state.spect).unwrap();

        assert!((e - e_vec).abs() < 1e-12 * e_vec.max(1.), "{} != {}", e, e_vec);
    }

    #[test]
    fn derived_fields_are_cached_until_invalidated() {
        let oper = create_oper();
        let eq = Ns2d { beta: 0. };
        let mut state = single_mode_state(&oper, &eq);
        let set = crate::solver::EquationSet::Ns2d(eq);

        set.get_phys(&oper, &mut state, PhysKey::Ux).unwrap();
        assert!(state.cached_phys(PhysKey::Ux).is_some());

        state.set_from_spectral(SpectKey::RotFft, oper.zeros_spect());
        assert!(state.cached_phys(PhysKey::Ux).is_none());

        let ux = set.get_phys(&oper, &mut state, PhysKey::Ux).unwrap();
        assert!(ux.iter().all(|&v| v == 0.));
    }
}
