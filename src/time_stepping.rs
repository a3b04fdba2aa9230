//! Time integration of the spectral state.
//!
//! Runge-Kutta schemes of order 2 and 4 with the linear viscous operator
//! integrated exactly: every stage multiplies by precomputed exp(-f_d dt)
//! or exp(-f_d dt/2) arrays, so the stiff diagonal part never limits the
//! step. The nonlinear tendencies come from the equation set; the forcing
//! array is computed once per step and held fixed across stages.

use crate::errors::*;
use crate::forcing::Forcing;
use crate::oper::OperatorsPseudoSpectral2D;
use crate::settings::{PhysicsSettings, TimeScheme, TimeSteppingSettings};
use crate::solver::EquationSet;
use crate::state::{SetOfVariables, SpectKey, State};
use ndarray::{Array2, Zip};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepperStatus {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// exp(-f_d dt) and exp(-f_d dt/2), recomputed only when dt changes.
struct ExactLinearCoefs {
    deltat: f64,
    exact: Array2<f64>,
    exact2: Array2<f64>,
}

impl ExactLinearCoefs {
    fn compute(freq_diss: &Array2<f64>, deltat: f64) -> ExactLinearCoefs {
        ExactLinearCoefs {
            deltat,
            exact: freq_diss.map(|&f| (-f * deltat).exp()),
            exact2: freq_diss.map(|&f| (-f * deltat / 2.).exp()),
        }
    }
}

/// Dissipation frequency of every wavenumber:
/// nu_2 k^2 + nu_4 k^4 + nu_8 k^8 + nu_m4 / k^4, the hypoviscous part
/// vanishing at k = 0.
pub fn compute_freq_diss(
    oper: &OperatorsPseudoSpectral2D,
    phys: &PhysicsSettings,
) -> Array2<f64> {
    Zip::from(&oper.k2)
        .and(&oper.k4)
        .map_collect(|&k2, &k4| {
            let mut f = phys.nu_2 * k2 + phys.nu_4 * k4 + phys.nu_8 * k4 * k4;
            if k4 > 0. {
                f += phys.nu_m4 / k4;
            }
            f
        })
}

pub struct TimeStepper {
    settings: TimeSteppingSettings,
    freq_diss: Array2<f64>,
    coefs: ExactLinearCoefs,
    status: StepperStatus,
    pub t: f64,
    pub it: u64,
}

impl TimeStepper {
    pub fn new(
        oper: &OperatorsPseudoSpectral2D,
        phys: &PhysicsSettings,
        settings: TimeSteppingSettings,
    ) -> TimeStepper {
        let freq_diss = compute_freq_diss(oper, phys);
        let deltat0 = settings.deltat0;
        TimeStepper {
            settings,
            coefs: ExactLinearCoefs::compute(&freq_diss, deltat0),
            freq_diss,
            status: StepperStatus::Idle,
            t: 0.,
            it: 0,
        }
    }

    pub fn status(&self) -> StepperStatus {
        self.status
    }

    pub fn deltat(&self) -> f64 {
        self.coefs.deltat
    }

    /// The stopping condition, checked only at step boundaries. Time target
    /// and iteration target are exclusive by configuration.
    pub fn is_finished(&self) -> bool {
        if self.settings.use_t_end {
            self.t >= self.settings.t_end
        } else {
            self.it >= self.settings.it_end
        }
    }

    fn set_deltat(&mut self, deltat: f64) {
        if deltat != self.coefs.deltat {
            self.coefs = ExactLinearCoefs::compute(&self.freq_diss, deltat);
        }
    }

    /// Advances the state by one step. On a fatal error the stepper moves to
    /// `Aborted` and the state is not meaningful anymore.
    pub fn one_time_step(
        &mut self,
        oper: &OperatorsPseudoSpectral2D,
        equations: &EquationSet,
        state: &mut State,
        forcing: &mut Forcing,
    ) -> Result<()> {
        if self.status == StepperStatus::Idle {
            self.status = StepperStatus::Running;
        }
        debug_assert_eq!(self.status, StepperStatus::Running);

        if let Err(e) = self.try_step(oper, equations, state, forcing) {
            self.status = StepperStatus::Aborted;
            return Err(e);
        }
        if self.is_finished() {
            self.status = StepperStatus::Completed;
            info!("integration completed at t = {:.6e}, it = {}", self.t, self.it);
        }
        Ok(())
    }

    fn try_step(
        &mut self,
        oper: &OperatorsPseudoSpectral2D,
        equations: &EquationSet,
        state: &mut State,
        forcing: &mut Forcing,
    ) -> Result<()> {
        if self.settings.use_cfl && self.it % 2 == 0 {
            let deltat = self.deltat_from_cfl(oper, equations, state)?;
            self.set_deltat(deltat);
        }

        let rot_fft = equations.rotfft(oper, &state.spect);
        let forcing_fft = forcing.compute(oper, rot_fft.view(), self.coefs.deltat)?;

        let new_spect = match self.settings.type_time_scheme {
            TimeScheme::Rk2 => self.step_rk2(oper, equations, &state.spect, forcing_fft.as_ref())?,
            TimeScheme::Rk4 => self.step_rk4(oper, equations, &state.spect, forcing_fft.as_ref())?,
        };
        state.spect = new_spect;
        state.invalidate_cache();

        self.it += 1;
        self.t += self.coefs.deltat;
        debug!("it = {}, t = {:.6e}, deltat = {:.3e}", self.it, self.t, self.coefs.deltat);

        self.check_state(oper, equations, state)
    }

    fn deltat_from_cfl(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        equations: &EquationSet,
        state: &mut State,
    ) -> Result<f64> {
        let (max_ux, max_uy) = equations.max_velocity(oper, state)?;
        let tmp = max_ux / oper.deltax + max_uy / oper.deltay;
        let deltat = if tmp > 0. {
            (self.settings.cfl_coef / tmp).min(self.settings.deltat_max)
        } else {
            self.settings.deltat_max
        };
        if deltat < self.settings.deltat_min {
            bail!(ErrorKind::SmallTimeStep(deltat, self.settings.deltat_min));
        }
        Ok(deltat)
    }

    /// NaN/Inf in any coefficient or energy above the configured bound ends
    /// the run.
    fn check_state(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        equations: &EquationSet,
        state: &State,
    ) -> Result<()> {
        for (array, &key) in state.spect.arrays().iter().zip(equations.keys()) {
            if array.iter().any(|v| !v.re.is_finite() || !v.im.is_finite()) {
                error!("non-finite coefficient in {:?} at it = {}", key, self.it);
                bail!(ErrorKind::Divergence(self.it, self.t, key_name(key)));
            }
        }
        if let Some(max_energy) = self.settings.max_energy {
            let energy = equations.compute_energy(oper, &state.spect)?;
            if energy > max_energy {
                error!(
                    "energy {:.6e} above bound {:.6e} at it = {}",
                    energy, max_energy, self.it
                );
                bail!(ErrorKind::Divergence(self.it, self.t, "energy"));
            }
        }
        Ok(())
    }

    fn step_rk2(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        equations: &EquationSet,
        spect: &SetOfVariables,
        forcing: Option<&Array2<num_complex::Complex64>>,
    ) -> Result<SetOfVariables> {
        let dt = self.coefs.deltat;
        let diss = &self.coefs.exact;
        let diss2 = &self.coefs.exact2;

        let t1 = equations.tendencies_nonlin(oper, spect, forcing)?;
        let approx = add_scaled_then_damp(spect, &t1, dt / 2., diss2);
        let t2 = equations.tendencies_nonlin(oper, &approx, forcing)?;

        // S <- S exp(-f dt) + dt exp(-f dt/2) T(midpoint)
        let mut out = damp(spect, diss);
        acc_damped(&mut out, &t2, dt, diss2);
        Ok(out)
    }

    fn step_rk4(
        &self,
        oper: &OperatorsPseudoSpectral2D,
        equations: &EquationSet,
        spect: &SetOfVariables,
        forcing: Option<&Array2<num_complex::Complex64>>,
    ) -> Result<SetOfVariables> {
        let dt = self.coefs.deltat;
        let diss = &self.coefs.exact;
        let diss2 = &self.coefs.exact2;

        let t1 = equations.tendencies_nonlin(oper, spect, forcing)?;
        let mut state_temp = add_scaled_then_damp(spect, &t1, dt / 6., diss);

        let approx1 = add_scaled_then_damp(spect, &t1, dt / 2., diss2);
        let t2 = equations.tendencies_nonlin(oper, &approx1, forcing)?;
        acc_damped(&mut state_temp, &t2, dt / 3., diss2);

        let mut approx2 = damp(spect, diss2);
        acc(&mut approx2, &t2, dt / 2.);
        let t3 = equations.tendencies_nonlin(oper, &approx2, forcing)?;
        acc_damped(&mut state_temp, &t3, dt / 3., diss2);

        let mut approx3 = damp(spect, diss);
        acc_damped(&mut approx3, &t3, dt, diss2);
        let t4 = equations.tendencies_nonlin(oper, &approx3, forcing)?;
        acc(&mut state_temp, &t4, dt / 6.);

        Ok(state_temp)
    }
}

fn key_name(key: SpectKey) -> &'static str {
    match key {
        SpectKey::RotFft => "rot_fft",
        SpectKey::BFft => "b_fft",
        SpectKey::UxFft => "ux_fft",
        SpectKey::UyFft => "uy_fft",
        SpectKey::EtaFft => "eta_fft",
    }
}

/// (S + c T) * d, elementwise over every variable.
fn add_scaled_then_damp(
    s: &SetOfVariables,
    t: &SetOfVariables,
    c: f64,
    d: &Array2<f64>,
) -> SetOfVariables {
    let mut out = s.clone();
    for (o, t) in out.iter_mut().zip(t.iter()) {
        Zip::from(o).and(t).and(d).for_each(|o, &t, &d| *o = (*o + t * c) * d);
    }
    out
}

/// S * d.
fn damp(s: &SetOfVariables, d: &Array2<f64>) -> SetOfVariables {
    let mut out = s.clone();
    for o in out.iter_mut() {
        Zip::from(o).and(d).for_each(|o, &d| *o = *o * d);
    }
    out
}

/// S += c d T.
fn acc_damped(s: &mut SetOfVariables, t: &SetOfVariables, c: f64, d: &Array2<f64>) {
    for (o, t) in s.iter_mut().zip(t.iter()) {
        Zip::from(o).and(t).and(d).for_each(|o, &t, &d| *o += t * (c * d));
    }
}

/// S += c T.
fn acc(s: &mut SetOfVariables, t: &SetOfVariables, c: f64) {
    for (o, t) in s.iter_mut().zip(t.iter()) {
        Zip::from(o).and(t).for_each(|o, &t| *o += t * c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oper::tests::{create_oper_sized, random_phys};
    use crate::settings::{EquationKind, Settings};
    use crate::test_helper::equal_floats_tol;
    use num_complex::Complex64;

    fn ns2d_parts(
        settings: &Settings,
    ) -> (OperatorsPseudoSpectral2D, EquationSet, TimeStepper) {
        let oper = create_oper_sized(
            settings.oper.nx,
            settings.oper.ny,
            settings.oper.lx,
            settings.oper.ly,
        );
        let equations = EquationSet::from_settings(&settings.physics);
        let stepper = TimeStepper::new(&oper, &settings.physics, settings.time_stepping);
        (oper, equations, stepper)
    }

    fn inviscid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.oper.nx = 8;
        settings.oper.ny = 8;
        settings.oper.lx = 6.;
        settings.oper.ly = 6.;
        settings.time_stepping.use_cfl = false;
        settings.time_stepping.deltat0 = 0.1;
        settings
    }

    #[test]
    fn single_mode_energy_unchanged_over_one_step() {
        // One Fourier mode, no viscosity, no forcing: an exact steady
        // solution, so a step must leave the energy untouched.
        let settings = inviscid_settings();
        let (oper, equations, mut stepper) = ns2d_parts(&settings);

        let mut rot_fft = oper.zeros_spect();
        rot_fft[[1, 1]] = Complex64::new(0.4, -0.1);
        let mut state = equations.state_from_rotfft(&oper, rot_fft);
        let mut forcing = Forcing::Disabled;

        let e0 = equations.compute_energy(&oper, &state.spect).unwrap();
        stepper
            .one_time_step(&oper, &equations, &mut state, &mut forcing)
            .unwrap();
        let e1 = equations.compute_energy(&oper, &state.spect).unwrap();

        assert!(equal_floats_tol(e1, e0, 1e-10 * e0), "{} != {}", e1, e0);
    }

    #[test]
    fn energy_conserved_without_forcing_and_viscosity() {
        let mut settings = inviscid_settings();
        settings.oper.nx = 16;
        settings.oper.ny = 16;
        settings.time_stepping.deltat0 = 1e-3;
        let (oper, equations, mut stepper) = ns2d_parts(&settings);

        let mut rot_fft = oper.fft2(random_phys(&oper, 40).view()).unwrap();
        rot_fft[[0, 0]] = Complex64::new(0., 0.);
        oper.dealiasing(&mut rot_fft);
        let mut state = equations.state_from_rotfft(&oper, rot_fft);
        let mut forcing = Forcing::Disabled;

        let e0 = equations.compute_energy(&oper, &state.spect).unwrap();
        for _ in 0..20 {
            stepper
                .one_time_step(&oper, &equations, &mut state, &mut forcing)
                .unwrap();
        }
        let e1 = equations.compute_energy(&oper, &state.spect).unwrap();

        // RK4 with these step sizes keeps the quadratic invariant to high
        // accuracy over a short run.
        assert!(
            (e1 - e0).abs() < 1e-8 * e0,
            "energy drifted: {} -> {}",
            e0,
            e1
        );
    }

    #[test]
    fn viscosity_decays_a_mode_exactly() {
        let mut settings = inviscid_settings();
        settings.physics.nu_2 = 0.05;
        let (oper, equations, mut stepper) = ns2d_parts(&settings);

        let mut rot_fft = oper.zeros_spect();
        rot_fft[[1, 1]] = Complex64::new(1., 0.);
        let k2 = oper.k2[[1, 1]];
        let mut state = equations.state_from_rotfft(&oper, rot_fft);
        let mut forcing = Forcing::Disabled;

        stepper
            .one_time_step(&oper, &equations, &mut state, &mut forcing)
            .unwrap();

        // A steady mode under pure Laplacian viscosity decays as
        // exp(-nu k^2 dt), exactly, because the linear part is integrated
        // exactly and the nonlinear tendency of a lone mode vanishes.
        let expected = (-0.05 * k2 * 0.1).exp();
        let got = state.spect.get(SpectKey::RotFft)[[1, 1]].re;
        assert!(equal_floats_tol(got, expected, 1e-12), "{} != {}", got, expected);
    }

    #[test]
    fn stops_exactly_at_iteration_target() {
        let mut settings = inviscid_settings();
        settings.time_stepping.use_t_end = false;
        settings.time_stepping.it_end = 10;
        let (oper, equations, mut stepper) = ns2d_parts(&settings);

        let mut rot_fft = oper.zeros_spect();
        rot_fft[[1, 1]] = Complex64::new(0.1, 0.);
        let mut state = equations.state_from_rotfft(&oper, rot_fft);
        let mut forcing = Forcing::Disabled;

        assert_eq!(stepper.status(), StepperStatus::Idle);
        while !stepper.is_finished() {
            stepper
                .one_time_step(&oper, &equations, &mut state, &mut forcing)
                .unwrap();
        }
        assert_eq!(stepper.it, 10);
        assert_eq!(stepper.status(), StepperStatus::Completed);
    }

    #[test]
    fn energy_bound_aborts_the_run() {
        let mut settings = inviscid_settings();
        settings.time_stepping.max_energy = Some(1e-30);
        let (oper, equations, mut stepper) = ns2d_parts(&settings);

        let mut rot_fft = oper.zeros_spect();
        rot_fft[[1, 1]] = Complex64::new(1., 0.);
        let mut state = equations.state_from_rotfft(&oper, rot_fft);
        let mut forcing = Forcing::Disabled;

        let err = stepper
            .one_time_step(&oper, &equations, &mut state, &mut forcing)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Divergence(..)));
        assert_eq!(stepper.status(), StepperStatus::Aborted);
    }

    #[test]
    fn cfl_keeps_the_step_within_bounds() {
        let mut settings = inviscid_settings();
        settings.time_stepping.use_cfl = true;
        settings.time_stepping.deltat_max = 0.2;
        let (oper, equations, mut stepper) = ns2d_parts(&settings);

        let mut rot_fft = oper.zeros_spect();
        rot_fft[[1, 1]] = Complex64::new(5., 0.);
        let mut state = equations.state_from_rotfft(&oper, rot_fft);
        let mut forcing = Forcing::Disabled;

        stepper
            .one_time_step(&oper, &equations, &mut state, &mut forcing)
            .unwrap();
        assert!(stepper.deltat() <= 0.2);
        assert!(stepper.deltat() >= settings.time_stepping.deltat_min);
    }

    #[test]
    fn rk2_matches_rk4_to_scheme_order() {
        let mut settings = inviscid_settings();
        settings.time_stepping.deltat0 = 1e-3;
        settings.physics.equations = EquationKind::Ns2d;
        let (oper, equations, mut stepper4) = ns2d_parts(&settings);
        settings.time_stepping.type_time_scheme = TimeScheme::Rk2;
        let (_, _, mut stepper2) = ns2d_parts(&settings);

        let mut rot_fft = oper.fft2(random_phys(&oper, 41).view()).unwrap();
        rot_fft[[0, 0]] = Complex64::new(0., 0.);
        oper.dealiasing(&mut rot_fft);

        let mut state4 = equations.state_from_rotfft(&oper, rot_fft.clone());
        let mut state2 = equations.state_from_rotfft(&oper, rot_fft);
        let mut forcing = Forcing::Disabled;

        stepper4
            .one_time_step(&oper, &equations, &mut state4, &mut forcing)
            .unwrap();
        stepper2
            .one_time_step(&oper, &equations, &mut state2, &mut forcing)
            .unwrap();

        for (a, b) in state4
            .spect
            .get(SpectKey::RotFft)
            .iter()
            .zip(state2.spect.get(SpectKey::RotFft).iter())
        {
            // Both consistent to the step cubed.
            assert!((a - b).norm() < 1e-6, "{} != {}", a, b);
        }
    }
}
