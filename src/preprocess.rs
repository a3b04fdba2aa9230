//! Preprocessing pass between initialisation and time stepping.
//!
//! Rescales the initial fields against a chosen invariant, derives the
//! forcing rate and the viscosity from turbulence scalings of the initial
//! state, and writes the results back into the settings before the forcing
//! generator and the stepper are built. Every derived physical field is
//! invalidated afterwards.

use crate::errors::*;
use crate::oper::OperatorsPseudoSpectral2D;
use crate::settings::{
    ForcingScale, InitFieldScale, PreprocessSettings, Settings, ViscosityScale, ViscosityType,
};
use crate::solver::EquationSet;
use crate::state::State;
use std::f64::consts::PI;

pub fn run(
    settings: &mut Settings,
    oper: &OperatorsPseudoSpectral2D,
    equations: &EquationSet,
    state: &mut State,
) -> Result<()> {
    let pre = match settings.preprocess {
        Some(p) if p.enable => p,
        _ => return Ok(()),
    };

    if settings.forcing.enable {
        // A forcing-based field scale needs the forcing rate first; the
        // other scales feed the forcing rate instead.
        if pre.init_field_scale == InitFieldScale::EnstrophyForcing {
            set_forcing_rate(&pre, settings, oper, equations, state)?;
            normalize_init_fields(&pre, settings, oper, equations, state)?;
        } else {
            normalize_init_fields(&pre, settings, oper, equations, state)?;
            set_forcing_rate(&pre, settings, oper, equations, state)?;
        }
    } else {
        normalize_init_fields(&pre, settings, oper, equations, state)?;
    }

    state.invalidate_cache();
    set_viscosity(&pre, settings, oper, equations, state)?;
    info!(
        "preprocess done: nu_2 = {:.3e}, nu_4 = {:.3e}, nu_8 = {:.3e}, nu_m4 = {:.3e}, \
         forcing_rate = {:.3e}",
        settings.physics.nu_2,
        settings.physics.nu_4,
        settings.physics.nu_8,
        settings.physics.nu_m4,
        settings.forcing.forcing_rate
    );
    Ok(())
}

/// Central wavenumber of the forcing band.
fn forcing_wavenumber(settings: &Settings, oper: &OperatorsPseudoSpectral2D) -> f64 {
    oper.deltakh
        * ((settings.forcing.nkmax_forcing + settings.forcing.nkmin_forcing) / 2.).floor()
}

fn scale_state(state: &mut State, factor: f64) {
    for a in state.spect.iter_mut() {
        a.map_inplace(|v| *v *= factor);
    }
    state.invalidate_cache();
}

fn normalize_init_fields(
    pre: &PreprocessSettings,
    settings: &Settings,
    oper: &OperatorsPseudoSpectral2D,
    equations: &EquationSet,
    state: &mut State,
) -> Result<()> {
    let c = pre.init_field_const;
    match pre.init_field_scale {
        InitFieldScale::Energy => {
            let energy = equations.compute_energy(oper, &state.spect)?;
            if energy != 0. {
                scale_state(state, (c / energy).sqrt());
            }
        }
        InitFieldScale::Enstrophy => {
            let omega_0 = equations.compute_enstrophy(oper, &state.spect)?;
            if omega_0 != 0. {
                scale_state(state, (c / omega_0).sqrt());
            }
        }
        InitFieldScale::EnstrophyForcing => {
            let omega_0 = equations.compute_enstrophy(oper, &state.spect)?;
            if omega_0 != 0. {
                let p = settings.forcing.forcing_rate;
                let k_f = forcing_wavenumber(settings, oper);
                let c_0 = omega_0 / (p.powf(2. / 3.) * k_f.powf(4. / 3.));
                scale_state(state, (c / c_0).sqrt());
            }
        }
        InitFieldScale::Unity => {}
    }
    Ok(())
}

fn set_viscosity(
    pre: &PreprocessSettings,
    settings: &mut Settings,
    oper: &OperatorsPseudoSpectral2D,
    equations: &EquationSet,
    state: &State,
) -> Result<()> {
    // Smallest resolved scale after dealiasing.
    let k_max = PI / oper.deltax * oper.coef_dealiasing;
    let length_scale = pre.viscosity_const * PI / k_max;

    let time_scale = match pre.viscosity_scale {
        ViscosityScale::Enstrophy => {
            let omega_0 = equations.compute_enstrophy(oper, &state.spect)?;
            // Enstrophy dissipation rate omega_0^(3/2).
            omega_0.powf(1.5).powf(-1. / 3.)
        }
        ViscosityScale::EnstrophyForcing => {
            let omega_0 = equations.compute_enstrophy(oper, &state.spect)?;
            let t1 = omega_0.powf(1.5).powf(-1. / 3.);
            let epsilon = settings.forcing.forcing_rate;
            let t2 = epsilon.powf(-1. / 3.) * length_scale.powf(2. / 3.);
            t1.min(t2)
        }
        ViscosityScale::EnergyEnstrophy => {
            let energy_0 = equations.compute_energy(oper, &state.spect)?;
            let omega_0 = equations.compute_enstrophy(oper, &state.spect)?;
            let epsilon = energy_0 * omega_0.sqrt();
            epsilon.powf(-1. / 3.) * length_scale.powf(2. / 3.)
        }
        ViscosityScale::Forcing => {
            let epsilon = settings.forcing.forcing_rate;
            epsilon.powf(-1. / 3.) * length_scale.powf(2. / 3.)
        }
    };

    let phys = &mut settings.physics;
    phys.nu_2 = 0.;
    phys.nu_4 = 0.;
    phys.nu_8 = 0.;
    phys.nu_m4 = 0.;
    match pre.viscosity_type {
        ViscosityType::Laplacian => phys.nu_2 = length_scale.powi(2) / time_scale,
        // The hyper4 calibration carries a negative sign.
        ViscosityType::Hyper4 => phys.nu_4 = -length_scale.powi(4) / time_scale,
        ViscosityType::Hyper8 => phys.nu_8 = length_scale.powi(8) / time_scale,
        ViscosityType::Hypo => phys.nu_m4 = length_scale.powi(-4) / time_scale,
    }
    Ok(())
}

fn set_forcing_rate(
    pre: &PreprocessSettings,
    settings: &mut Settings,
    oper: &OperatorsPseudoSpectral2D,
    equations: &EquationSet,
    state: &State,
) -> Result<()> {
    let c = pre.forcing_const;
    let k_f = forcing_wavenumber(settings, oper);

    settings.forcing.forcing_rate = match pre.forcing_scale {
        ForcingScale::Unity => c,
        ForcingScale::Energy => {
            let energy_0 = equations.compute_energy(oper, &state.spect)?;
            c * energy_0.powf(1.5) * k_f
        }
        ForcingScale::Enstrophy => {
            let omega_0 = equations.compute_enstrophy(oper, &state.spect)?;
            // TODO: the omega_0 exponent here looks dimensionally off;
            // check it against a forced-run calibration before changing it.
            c * omega_0.powf(1.5) / k_f.powi(2)
        }
    };
    Ok(())
}
