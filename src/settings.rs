//! This module handles a TOML parameter file.
//!
//! Every keyword that selects a behaviour (equation set, time scheme,
//! forcing kind, preprocessing scales) is a closed enum, so a typo is a
//! parse error instead of a surprise at run time.

use crate::consts::TWOPI;
use crate::errors::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::prelude::*;

const DEFAULT_COEF_DEALIASING: f64 = 2. / 3.;
const DEFAULT_CFL_COEF: f64 = 0.4;

/// Structure that holds settings, which are defined externally in a TOML
/// file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub oper: OperSettings,
    pub physics: PhysicsSettings,
    pub time_stepping: TimeSteppingSettings,
    #[serde(default = "default_init_fields")]
    pub init_fields: InitFields,
    #[serde(default)]
    pub forcing: ForcingSettings,
    #[serde(default)]
    pub preprocess: Option<PreprocessSettings>,
}

/// Physical box extents and grid resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OperSettings {
    pub nx: usize,
    pub ny: usize,
    pub lx: f64,
    pub ly: f64,
    /// Fraction of the Nyquist wavenumber kept after a nonlinear product.
    #[serde(default = "default_coef_dealiasing")]
    pub coef_dealiasing: f64,
}

fn default_coef_dealiasing() -> f64 {
    DEFAULT_COEF_DEALIASING
}

/// Which set of equations the tendencies computer solves.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum EquationKind {
    Ns2d,
    Ns2dStrat,
    Sw1l,
}

/// Holds physical parameters (viscosities and per-equation-set constants).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhysicsSettings {
    pub equations: EquationKind,
    /// Laplacian viscosity.
    #[serde(default)]
    pub nu_2: f64,
    /// Fourth-order hyperviscosity.
    #[serde(default)]
    pub nu_4: f64,
    /// Eighth-order hyperviscosity.
    #[serde(default)]
    pub nu_8: f64,
    /// Hypoviscosity, damping the largest scales.
    #[serde(default)]
    pub nu_m4: f64,
    /// Background planetary vorticity gradient (beta plane).
    #[serde(default)]
    pub beta: f64,
    /// Brunt-Vaisala frequency for the stratified set.
    #[serde(default = "default_brunt_vaisala")]
    pub brunt_vaisala: f64,
    /// Coriolis parameter for shallow water.
    #[serde(default)]
    pub f: f64,
    /// Squared gravity-wave speed for shallow water.
    #[serde(default = "default_c2")]
    pub c2: f64,
}

fn default_brunt_vaisala() -> f64 {
    1.
}

fn default_c2() -> f64 {
    400.
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum TimeScheme {
    Rk2,
    Rk4,
}

/// Holds the step-size policy and the stopping condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeSteppingSettings {
    /// Stop on simulated time (`t_end`) when true, on `it_end` otherwise.
    #[serde(default = "default_true")]
    pub use_t_end: bool,
    #[serde(default = "default_t_end")]
    pub t_end: f64,
    #[serde(default = "default_it_end")]
    pub it_end: u64,
    /// Recompute the time step from the CFL condition when true, use
    /// `deltat0` fixed otherwise.
    #[serde(default = "default_true")]
    pub use_cfl: bool,
    #[serde(default = "default_cfl_coef")]
    pub cfl_coef: f64,
    #[serde(default = "default_deltat0")]
    pub deltat0: f64,
    #[serde(default = "default_deltat_max")]
    pub deltat_max: f64,
    #[serde(default = "default_deltat_min")]
    pub deltat_min: f64,
    #[serde(default = "default_type_time_scheme")]
    pub type_time_scheme: TimeScheme,
    /// Abort when the total energy exceeds this bound.
    #[serde(default)]
    pub max_energy: Option<f64>,
}

fn default_true() -> bool {
    true
}

fn default_t_end() -> f64 {
    10.
}

fn default_it_end() -> u64 {
    10
}

fn default_cfl_coef() -> f64 {
    DEFAULT_CFL_COEF
}

fn default_deltat0() -> f64 {
    0.2
}

fn default_deltat_max() -> f64 {
    0.2
}

fn default_deltat_min() -> f64 {
    1e-10
}

fn default_type_time_scheme() -> TimeScheme {
    TimeScheme::Rk4
}

/// Initial condition for the vorticity field (shallow water derives its
/// velocities from it, the surface displacement starts flat).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum InitFields {
    Zero,
    /// Random large-scale vorticity, rescaled to the given maximum velocity.
    Noise { max_velocity: f64, seed: u64 },
    /// Two counter-rotating Gaussian vortices.
    Dipole { amplitude: f64 },
    /// A single Fourier mode of the vorticity.
    Harmonic { ikx: usize, iky: usize, amplitude: f64 },
}

fn default_init_fields() -> InitFields {
    InitFields::Noise {
        max_velocity: 1.,
        seed: 0,
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ForcingKind {
    /// New random phases every step, normalized to the target injection
    /// rate.
    Random,
    /// Fixed pattern, constant in time.
    Deterministic,
}

/// Holds the forcing configuration. The band bounds are in units of the
/// smallest wavenumber increment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForcingSettings {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_forcing_kind")]
    pub kind: ForcingKind,
    #[serde(default = "default_forcing_rate")]
    pub forcing_rate: f64,
    #[serde(default = "default_nkmin_forcing")]
    pub nkmin_forcing: f64,
    #[serde(default = "default_nkmax_forcing")]
    pub nkmax_forcing: f64,
    #[serde(default)]
    pub seed: u64,
}

impl Default for ForcingSettings {
    fn default() -> ForcingSettings {
        ForcingSettings {
            enable: false,
            kind: default_forcing_kind(),
            forcing_rate: default_forcing_rate(),
            nkmin_forcing: default_nkmin_forcing(),
            nkmax_forcing: default_nkmax_forcing(),
            seed: 0,
        }
    }
}

fn default_forcing_kind() -> ForcingKind {
    ForcingKind::Random
}

fn default_forcing_rate() -> f64 {
    1.
}

fn default_nkmin_forcing() -> f64 {
    4.
}

fn default_nkmax_forcing() -> f64 {
    6.
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum InitFieldScale {
    Energy,
    Enstrophy,
    EnstrophyForcing,
    Unity,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ViscosityType {
    Laplacian,
    Hyper4,
    Hyper8,
    Hypo,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ViscosityScale {
    Enstrophy,
    EnstrophyForcing,
    EnergyEnstrophy,
    Forcing,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ForcingScale {
    Unity,
    Energy,
    Enstrophy,
}

/// Preprocessing: rescale the initial fields and derive viscosity and
/// forcing rate from the initial invariants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreprocessSettings {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_init_field_scale")]
    pub init_field_scale: InitFieldScale,
    #[serde(default = "default_unit_const")]
    pub init_field_const: f64,
    #[serde(default = "default_viscosity_type")]
    pub viscosity_type: ViscosityType,
    #[serde(default = "default_viscosity_scale")]
    pub viscosity_scale: ViscosityScale,
    #[serde(default = "default_unit_const")]
    pub viscosity_const: f64,
    #[serde(default = "default_forcing_scale")]
    pub forcing_scale: ForcingScale,
    #[serde(default = "default_unit_const")]
    pub forcing_const: f64,
}

fn default_init_field_scale() -> InitFieldScale {
    InitFieldScale::Unity
}

fn default_viscosity_type() -> ViscosityType {
    ViscosityType::Laplacian
}

fn default_viscosity_scale() -> ViscosityScale {
    ViscosityScale::Forcing
}

fn default_forcing_scale() -> ForcingScale {
    ForcingScale::Unity
}

fn default_unit_const() -> f64 {
    1.
}

/// Reads the content of a file `filename` into a string and returns it.
fn read_from_file(filename: &str) -> Result<String> {
    let mut f = File::open(filename).chain_err(|| "Unable to open file.")?;
    let mut content = String::new();

    f.read_to_string(&mut content)
        .chain_err(|| "Unable to read file.")?;

    Ok(content)
}

/// Reads the content of a file `param_file`, that should point to a valid
/// TOML file, and parses it. Then returns the deserialized data in form of a
/// `Settings` struct.
pub fn read_parameter_file(param_file: &str) -> Result<Settings> {
    let toml_string =
        read_from_file(param_file).chain_err(|| "Unable to read parameter file.")?;

    let settings: Settings =
        toml::from_str(&toml_string).chain_err(|| "Unable to parse parameter file.")?;

    check_settings(&settings)?;

    Ok(settings)
}

/// Rejects contradictory or out-of-range configurations. Fatal, never
/// retried.
pub fn check_settings(s: &Settings) -> Result<()> {
    let o = &s.oper;

    if o.nx == 0 || o.ny == 0 {
        bail!(ErrorKind::Config(format!(
            "grid resolution must be positive, got {}x{}",
            o.nx, o.ny
        )));
    }
    if o.nx % 2 != 0 || o.ny % 2 != 0 {
        bail!(ErrorKind::Config(format!(
            "grid resolution must be even, got {}x{}",
            o.nx, o.ny
        )));
    }
    if o.lx <= 0. || o.ly <= 0. {
        bail!(ErrorKind::Config(format!(
            "box extents must be positive, got {}x{}",
            o.lx, o.ly
        )));
    }
    if o.coef_dealiasing <= 0. || o.coef_dealiasing > 1. {
        bail!(ErrorKind::Config(format!(
            "coef_dealiasing must lie in (0, 1], got {}",
            o.coef_dealiasing
        )));
    }

    let ts = &s.time_stepping;
    if ts.deltat0 <= 0. {
        bail!(ErrorKind::Config(format!(
            "deltat0 must be positive, got {}",
            ts.deltat0
        )));
    }
    if ts.deltat_min <= 0. || ts.deltat_max < ts.deltat_min {
        bail!(ErrorKind::Config(format!(
            "need 0 < deltat_min <= deltat_max, got [{}, {}]",
            ts.deltat_min, ts.deltat_max
        )));
    }
    // A fixed-step run uses deltat0 directly, so it is bound by the same
    // ceiling the CFL policy respects.
    if ts.deltat0 > ts.deltat_max {
        bail!(ErrorKind::Config(format!(
            "deltat0 must not exceed deltat_max, got {} > {}",
            ts.deltat0, ts.deltat_max
        )));
    }
    if ts.use_t_end && ts.t_end <= 0. {
        bail!(ErrorKind::Config(format!(
            "t_end must be positive, got {}",
            ts.t_end
        )));
    }

    let fo = &s.forcing;
    if fo.enable {
        if fo.nkmin_forcing < 0. || fo.nkmax_forcing < fo.nkmin_forcing {
            bail!(ErrorKind::Config(format!(
                "need 0 <= nkmin_forcing <= nkmax_forcing, got [{}, {}]",
                fo.nkmin_forcing, fo.nkmax_forcing
            )));
        }
        if fo.forcing_rate <= 0. {
            bail!(ErrorKind::Config(format!(
                "forcing_rate must be positive, got {}",
                fo.forcing_rate
            )));
        }
        // The deterministic pattern assumes a constant time step; combining
        // it with the CFL policy silently changes the injected power.
        if fo.kind == ForcingKind::Deterministic && ts.use_cfl {
            bail!(ErrorKind::Config(
                "deterministic forcing requires a fixed time step (use_cfl = false)"
                    .to_string()
            ));
        }
    }

    Ok(())
}

impl Default for Settings {
    /// A small, valid configuration used as a starting point in tests.
    fn default() -> Settings {
        Settings {
            oper: OperSettings {
                nx: 16,
                ny: 16,
                lx: TWOPI,
                ly: TWOPI,
                coef_dealiasing: DEFAULT_COEF_DEALIASING,
            },
            physics: PhysicsSettings {
                equations: EquationKind::Ns2d,
                nu_2: 0.,
                nu_4: 0.,
                nu_8: 0.,
                nu_m4: 0.,
                beta: 0.,
                brunt_vaisala: default_brunt_vaisala(),
                f: 0.,
                c2: default_c2(),
            },
            time_stepping: TimeSteppingSettings {
                use_t_end: true,
                t_end: default_t_end(),
                it_end: default_it_end(),
                use_cfl: true,
                cfl_coef: DEFAULT_CFL_COEF,
                deltat0: default_deltat0(),
                deltat_max: default_deltat_max(),
                deltat_min: default_deltat_min(),
                type_time_scheme: TimeScheme::Rk4,
                max_energy: None,
            },
            init_fields: default_init_fields(),
            forcing: ForcingSettings::default(),
            preprocess: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMETER_TOML: &str = r#"
        [oper]
        nx = 32
        ny = 32
        lx = 6.283185307179586
        ly = 6.283185307179586

        [physics]
        equations = "Ns2d"
        nu_8 = 2e-8

        [time_stepping]
        use_t_end = false
        it_end = 100
        use_cfl = true

        [init_fields.Harmonic]
        ikx = 1
        iky = 2
        amplitude = 1.0

        [forcing]
        enable = true
        kind = "Random"
        forcing_rate = 1.5
        nkmin_forcing = 4.0
        nkmax_forcing = 6.0
        seed = 7
    "#;

    #[test]
    fn read_settings() {
        let settings: Settings = toml::from_str(PARAMETER_TOML).unwrap();
        check_settings(&settings).unwrap();

        assert_eq!(settings.oper.nx, 32);
        assert_eq!(settings.oper.coef_dealiasing, DEFAULT_COEF_DEALIASING);
        assert_eq!(settings.physics.equations, EquationKind::Ns2d);
        assert_eq!(settings.physics.nu_8, 2e-8);
        assert_eq!(settings.physics.nu_2, 0.);
        assert!(!settings.time_stepping.use_t_end);
        assert_eq!(settings.time_stepping.it_end, 100);
        assert_eq!(settings.time_stepping.type_time_scheme, TimeScheme::Rk4);
        assert_eq!(
            settings.init_fields,
            InitFields::Harmonic {
                ikx: 1,
                iky: 2,
                amplitude: 1.0,
            }
        );
        assert!(settings.forcing.enable);
        assert_eq!(settings.forcing.forcing_rate, 1.5);
        assert_eq!(settings.forcing.seed, 7);
        assert!(settings.preprocess.is_none());
    }

    #[test]
    fn settings_unknown_keys() {
        let toml_str = "[oper]\nnx = 8\nny = 8\nlx = 1.0\nly = 1.0\nfoo = 3\n";
        assert!(toml::from_str::<Settings>(toml_str).is_err());
    }

    #[test]
    fn settings_unknown_keyword() {
        // A misspelled keyword is a parse error, not a runtime one.
        let toml_str = PARAMETER_TOML.replace("\"Ns2d\"", "\"Ns2dx\"");
        assert!(toml::from_str::<Settings>(&toml_str).is_err());
    }

    #[test]
    fn contradictory_stepping_policy() {
        let mut settings = Settings::default();
        settings.forcing.enable = true;
        settings.forcing.kind = ForcingKind::Deterministic;
        settings.time_stepping.use_cfl = true;
        assert!(check_settings(&settings).is_err());

        settings.time_stepping.use_cfl = false;
        assert!(check_settings(&settings).is_ok());
    }

    #[test]
    fn fixed_step_above_deltat_max_rejected() {
        let mut settings = Settings::default();
        settings.time_stepping.use_cfl = false;
        settings.time_stepping.deltat_max = 0.1;
        settings.time_stepping.deltat0 = 0.5;
        assert!(check_settings(&settings).is_err());

        settings.time_stepping.deltat0 = 0.1;
        assert!(check_settings(&settings).is_ok());
    }

    #[test]
    fn odd_resolution_rejected() {
        let mut settings = Settings::default();
        settings.oper.nx = 9;
        assert!(check_settings(&settings).is_err());
    }
}
