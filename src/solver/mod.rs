//! Tendencies computers for the supported equation sets.
//!
//! Every equation set turns a spectral state into the nonlinear part of its
//! time derivative: derived fields in physical space, pointwise products,
//! forward transform, dealiasing, then the forcing contribution mapped into
//! the evolved fields. The linear viscous part never appears here; the time
//! stepper integrates it exactly.

pub mod ns2d;
pub mod ns2d_strat;
pub mod sw1l;

use crate::errors::*;
use crate::oper::OperatorsPseudoSpectral2D;
use crate::settings::{EquationKind, PhysicsSettings};
use crate::state::{PhysKey, SetOfVariables, State};
use ndarray::Array2;
use num_complex::Complex64;

/// The closed set of equation sets. Parameters are bound at construction
/// from the physics section of the settings.
#[derive(Clone, Copy, Debug)]
pub enum EquationSet {
    Ns2d(ns2d::Ns2d),
    Ns2dStrat(ns2d_strat::Ns2dStrat),
    Sw1l(sw1l::Sw1l),
}

impl EquationSet {
    pub fn from_settings(phys: &PhysicsSettings) -> EquationSet {
        match phys.equations {
            EquationKind::Ns2d => EquationSet::Ns2d(ns2d::Ns2d { beta: phys.beta }),
            EquationKind::Ns2dStrat => EquationSet::Ns2dStrat(ns2d_strat::Ns2dStrat {
                beta: phys.beta,
                brunt_vaisala: phys.brunt_vaisala,
            }),
            EquationKind::Sw1l => EquationSet::Sw1l(sw1l::Sw1l {
                f: phys.f,
                c2: phys.c2,
            }),
        }
    }

    /// The prognostic spectral variables this set evolves, in state order.
    pub fn keys(&self) -> &'static [crate::state::SpectKey] {
        match self {
            EquationSet::Ns2d(_) => ns2d::KEYS,
            EquationSet::Ns2dStrat(_) => ns2d_strat::KEYS,
            EquationSet::Sw1l(_) => sw1l::KEYS,
        }
    }

    /// The physical fields worth writing out for this set.
    pub fn phys_keys(&self) -> &'static [PhysKey] {
        match self {
            EquationSet::Ns2d(_) => &[PhysKey::Ux, PhysKey::Uy, PhysKey::Rot],
            EquationSet::Ns2dStrat(_) => &[PhysKey::Ux, PhysKey::Uy, PhysKey::Rot, PhysKey::B],
            EquationSet::Sw1l(_) => &[
                PhysKey::Ux,
                PhysKey::Uy,
                PhysKey::Rot,
                PhysKey::Div,
                PhysKey::Eta,
            ],
        }
    }

    /// Nonlinear tendencies of a spectral state. `forcing` is the band
    /// limited vorticity-shaped forcing of this step, mapped by each set
    /// into its own evolved fields; the supplied state is never mutated.
    pub fn tendencies_nonlin(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
        forcing: Option<&Array2<Complex64>>,
    ) -> Result<SetOfVariables> {
        match self {
            EquationSet::Ns2d(eq) => eq.tendencies_nonlin(oper, spect, forcing),
            EquationSet::Ns2dStrat(eq) => eq.tendencies_nonlin(oper, spect, forcing),
            EquationSet::Sw1l(eq) => eq.tendencies_nonlin(oper, spect, forcing),
        }
    }

    /// Quadratic total energy of a spectral state.
    pub fn compute_energy(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
    ) -> Result<f64> {
        match self {
            EquationSet::Ns2d(eq) => eq.compute_energy(oper, spect),
            EquationSet::Ns2dStrat(eq) => eq.compute_energy(oper, spect),
            EquationSet::Sw1l(eq) => eq.compute_energy(oper, spect),
        }
    }

    /// Enstrophy 1/2 sum |rot_k|^2.
    pub fn compute_enstrophy(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
    ) -> Result<f64> {
        let rot_fft = self.rotfft(oper, spect);
        oper.energy_from_spect(rot_fft.view())
    }

    /// Vorticity of a spectral state, however the set stores its velocity.
    pub fn rotfft(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
    ) -> Array2<Complex64> {
        use crate::state::SpectKey::*;
        match self {
            EquationSet::Ns2d(_) | EquationSet::Ns2dStrat(_) => spect.get(RotFft).clone(),
            EquationSet::Sw1l(_) => {
                oper.rotfft_from_vecfft(spect.get(UxFft).view(), spect.get(UyFft).view())
            }
        }
    }

    /// Spectral velocity of a state.
    pub fn vecfft(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
    ) -> (Array2<Complex64>, Array2<Complex64>) {
        use crate::state::SpectKey::*;
        match self {
            EquationSet::Ns2d(_) | EquationSet::Ns2dStrat(_) => {
                oper.vecfft_from_rotfft(spect.get(RotFft).view())
            }
            EquationSet::Sw1l(_) => (spect.get(UxFft).clone(), spect.get(UyFft).clone()),
        }
    }

    /// Builds a state of this set from a vorticity field. The divergent and
    /// scalar variables start at rest.
    pub fn state_from_rotfft(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        rot_fft: Array2<Complex64>,
    ) -> State {
        use crate::state::SpectKey::*;
        let mut state = State::new(self.keys(), oper.shape_spect_local());
        match self {
            EquationSet::Ns2d(_) | EquationSet::Ns2dStrat(_) => {
                state.set_from_spectral(RotFft, rot_fft);
            }
            EquationSet::Sw1l(_) => {
                let (ux_fft, uy_fft) = oper.vecfft_from_rotfft(rot_fft.view());
                state.set_from_spectral(UxFft, ux_fft);
                state.set_from_spectral(UyFft, uy_fft);
            }
        }
        state
    }

    /// A derived physical field, computed on first use and cached on the
    /// state until a prognostic variable it depends on changes.
    pub fn get_phys<'a>(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        state: &'a mut State,
        key: PhysKey,
    ) -> Result<&'a Array2<f64>> {
        if state.cached_phys(key).is_none() {
            let field = self.compute_phys(oper, &state.spect, key)?;
            state.insert_phys(key, field);
        }
        Ok(state.cached_phys(key).unwrap())
    }

    fn compute_phys(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        spect: &SetOfVariables,
        key: PhysKey,
    ) -> Result<Array2<f64>> {
        use crate::state::SpectKey::*;
        match key {
            PhysKey::Ux => {
                let (ux_fft, _) = self.vecfft(oper, spect);
                oper.ifft2(ux_fft.view())
            }
            PhysKey::Uy => {
                let (_, uy_fft) = self.vecfft(oper, spect);
                oper.ifft2(uy_fft.view())
            }
            PhysKey::Rot => {
                let rot_fft = self.rotfft(oper, spect);
                oper.ifft2(rot_fft.view())
            }
            PhysKey::Div => match self {
                // Incompressible sets: identically zero.
                EquationSet::Ns2d(_) | EquationSet::Ns2dStrat(_) => Ok(oper.zeros_phys()),
                EquationSet::Sw1l(_) => {
                    let div_fft =
                        oper.divfft_from_vecfft(spect.get(UxFft).view(), spect.get(UyFft).view());
                    oper.ifft2(div_fft.view())
                }
            },
            PhysKey::B => oper.ifft2(spect.get(BFft).view()),
            PhysKey::Eta => oper.ifft2(spect.get(EtaFft).view()),
        }
    }

    /// Largest pointwise velocity components, the quantities the CFL policy
    /// watches.
    pub fn max_velocity(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        state: &mut State,
    ) -> Result<(f64, f64)> {
        let max_ux = oper.max_abs_phys(self.get_phys(oper, state, PhysKey::Ux)?.view())?;
        let max_uy = oper.max_abs_phys(self.get_phys(oper, state, PhysKey::Uy)?.view())?;
        Ok((max_ux, max_uy))
    }
}
