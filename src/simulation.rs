//! The simulation facade: operator, state, stepper and forcing bundled
//! behind `Simul::new` and `advance`.

use crate::decomp::sequential::SequentialFft2;
use crate::decomp::{DecompContext, TransformProvider};
use crate::errors::*;
use crate::forcing::Forcing;
use crate::oper::OperatorsPseudoSpectral2D;
use crate::output::{OnSave, PeriodicOutput, Snapshot};
use crate::preprocess;
use crate::settings::{check_settings, InitFields, Settings};
use crate::solver::EquationSet;
use crate::state::State;
use crate::time_stepping::{StepperStatus, TimeStepper};
use ndarray::Array2;
use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

pub struct Simul {
    pub settings: Settings,
    pub oper: OperatorsPseudoSpectral2D,
    pub equations: EquationSet,
    pub state: State,
    pub time_stepping: TimeStepper,
    forcing: Forcing,
    outputs: Vec<PeriodicOutput>,
}

impl Simul {
    /// Builds a simulation on an externally supplied transform provider.
    /// Order matters: the fields are initialised and preprocessed before
    /// the forcing generator and the stepper read the (possibly rewritten)
    /// viscosities and forcing rate.
    pub fn new(
        mut settings: Settings,
        provider: Box<dyn TransformProvider + Send + Sync>,
        ctx: DecompContext,
    ) -> Result<Simul> {
        check_settings(&settings)?;
        let oper = OperatorsPseudoSpectral2D::new(&settings.oper, provider, ctx)?;
        let equations = EquationSet::from_settings(&settings.physics);

        let rot_fft = init_rotfft(&settings.init_fields, &oper)?;
        let mut state = equations.state_from_rotfft(&oper, rot_fft);

        preprocess::run(&mut settings, &oper, &equations, &mut state)?;

        let forcing =
            Forcing::from_settings(&settings.forcing, &oper, settings.time_stepping.deltat0)?;
        let time_stepping = TimeStepper::new(&oper, &settings.physics, settings.time_stepping);

        info!(
            "simulation ready: {:?} on {}x{}, scheme {:?}",
            settings.physics.equations,
            settings.oper.nx,
            settings.oper.ny,
            settings.time_stepping.type_time_scheme
        );
        Ok(Simul {
            settings,
            oper,
            equations,
            state,
            time_stepping,
            forcing,
            outputs: Vec::new(),
        })
    }

    /// Single-process simulation with the in-crate FFT provider.
    pub fn new_sequential(settings: Settings) -> Result<Simul> {
        let provider = Box::new(SequentialFft2::new(settings.oper.nx, settings.oper.ny)?);
        Simul::new(settings, provider, DecompContext::sequential())
    }

    /// Registers a hook called every `period` of simulated time. The period
    /// must be positive and finite.
    pub fn add_output(&mut self, period: f64, hook: Box<dyn OnSave>) -> Result<()> {
        self.outputs.push(PeriodicOutput::new(period, hook)?);
        Ok(())
    }

    pub fn status(&self) -> StepperStatus {
        self.time_stepping.status()
    }

    /// Runs to the configured stop condition. An error leaves the stepper
    /// aborted; the run is not restartable.
    pub fn advance(&mut self) -> Result<()> {
        while !self.time_stepping.is_finished() {
            self.time_stepping.one_time_step(
                &self.oper,
                &self.equations,
                &mut self.state,
                &mut self.forcing,
            )?;
            self.save_outputs()?;
        }
        Ok(())
    }

    fn save_outputs(&mut self) -> Result<()> {
        let t = self.time_stepping.t;
        if !self.outputs.iter().any(|o| o.is_due(t)) {
            return Ok(());
        }

        let snapshot = self.snapshot()?;
        for out in &mut self.outputs {
            if out.is_due(t) {
                out.hook.save(&snapshot)?;
                out.advance_schedule(t);
            }
        }
        Ok(())
    }

    /// Gathers the physical fields of this instant to the root rank.
    pub fn snapshot(&mut self) -> Result<Snapshot> {
        let mut fields = Vec::new();
        for &key in self.equations.phys_keys() {
            let local = self
                .equations
                .get_phys(&self.oper, &mut self.state, key)?
                .view();
            if let Some(global) = self.oper.gather_phys_to_root(local)? {
                fields.push((key, global));
            }
        }
        Ok(Snapshot {
            t: self.time_stepping.t,
            it: self.time_stepping.it,
            energy: self.equations.compute_energy(&self.oper, &self.state.spect)?,
            enstrophy: self
                .equations
                .compute_enstrophy(&self.oper, &self.state.spect)?,
            fields,
        })
    }
}

/// Initial vorticity in spectral space; the equation set derives its own
/// variables from it.
fn init_rotfft(
    init: &InitFields,
    oper: &OperatorsPseudoSpectral2D,
) -> Result<Array2<Complex64>> {
    match *init {
        InitFields::Zero => Ok(oper.zeros_spect()),
        InitFields::Noise { max_velocity, seed } => noise_rotfft(oper, max_velocity, seed),
        InitFields::Dipole { amplitude } => dipole_rotfft(oper, amplitude),
        InitFields::Harmonic {
            ikx,
            iky,
            amplitude,
        } => {
            let (nk0, nk1) = oper.shape_spect_local();
            if ikx >= nk1 || iky >= nk0 || (ikx, iky) == (0, 0) {
                bail!(ErrorKind::Config(format!(
                    "harmonic mode ({}, {}) outside the spectral grid {}x{}",
                    ikx, iky, nk0, nk1
                )));
            }
            let mut rot_fft = oper.zeros_spect();
            rot_fft[[iky, ikx]] = Complex64::new(amplitude, 0.);
            Ok(rot_fft)
        }
    }
}

/// Random vorticity, dealiased and rescaled so the largest velocity
/// component matches `max_velocity`.
fn noise_rotfft(
    oper: &OperatorsPseudoSpectral2D,
    max_velocity: f64,
    seed: u64,
) -> Result<Array2<Complex64>> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let rot = Array2::from_shape_fn(oper.shape_phys_local(), |_| rng.gen_range(-1.0..1.0));

    let mut rot_fft = oper.fft2(rot.view())?;
    rot_fft[[0, 0]] = Complex64::new(0., 0.);
    oper.dealiasing(&mut rot_fft);

    let (ux_fft, uy_fft) = oper.vecfft_from_rotfft(rot_fft.view());
    let max_ux = oper.max_abs_phys(oper.ifft2(ux_fft.view())?.view())?;
    let max_uy = oper.max_abs_phys(oper.ifft2(uy_fft.view())?.view())?;
    let max_u = max_ux.max(max_uy);
    if max_u > 0. {
        let factor = max_velocity / max_u;
        rot_fft.map_inplace(|v| *v *= factor);
    }
    Ok(rot_fft)
}

/// Two counter-rotating Gaussian vortices side by side on the x axis.
fn dipole_rotfft(oper: &OperatorsPseudoSpectral2D, amplitude: f64) -> Result<Array2<Complex64>> {
    let (lx, ly) = (oper.lx, oper.ly);
    let radius = lx.min(ly) / 6.;
    let centers = [(lx / 3., ly / 2., 1.), (2. * lx / 3., ly / 2., -1.)];

    let rot = Array2::from_shape_fn(oper.shape_phys_local(), |(j, i)| {
        let x = i as f64 * oper.deltax;
        let y = j as f64 * oper.deltay;
        centers
            .iter()
            .map(|&(cx, cy, sign)| {
                let r2 = (x - cx).powi(2) + (y - cy).powi(2);
                sign * amplitude * (-r2 / radius.powi(2)).exp()
            })
            .sum()
    });

    let mut rot_fft = oper.fft2(rot.view())?;
    rot_fft[[0, 0]] = Complex64::new(0., 0.);
    oper.dealiasing(&mut rot_fft);
    Ok(rot_fft)
}
