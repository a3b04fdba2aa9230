//! Prognostic state container.
//!
//! The state of a simulation is the set of spectral prognostic variables of
//! the equation set, stored in a fixed order. Physical fields derived from
//! them (velocities, vorticity, buoyancy fields in physical space) are
//! cached per state and thrown away whenever a prognostic variable changes,
//! so a derived field is never served stale.

use ndarray::Array2;
use num_complex::Complex64;
use std::collections::HashMap;

/// Spectral prognostic variables. Which of these a state carries depends on
/// the equation set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpectKey {
    RotFft,
    BFft,
    UxFft,
    UyFft,
    EtaFft,
}

/// Physical fields derivable from the prognostic variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhysKey {
    Ux,
    Uy,
    Rot,
    Div,
    B,
    Eta,
}

/// An ordered set of same-shaped spectral arrays. The time stepper treats a
/// whole set as one flat vector; the tendencies computers address members by
/// key.
#[derive(Clone, Debug)]
pub struct SetOfVariables {
    keys: &'static [SpectKey],
    arrays: Vec<Array2<Complex64>>,
}

impl SetOfVariables {
    pub fn zeros(keys: &'static [SpectKey], shape: (usize, usize)) -> SetOfVariables {
        SetOfVariables {
            keys,
            arrays: keys.iter().map(|_| Array2::zeros(shape)).collect(),
        }
    }

    pub fn keys(&self) -> &'static [SpectKey] {
        self.keys
    }

    pub fn shape(&self) -> (usize, usize) {
        let a = &self.arrays[0];
        (a.nrows(), a.ncols())
    }

    fn index_of(&self, key: SpectKey) -> usize {
        self.keys
            .iter()
            .position(|&k| k == key)
            .unwrap_or_else(|| panic!("variable {:?} not in state {:?}", key, self.keys))
    }

    pub fn contains(&self, key: SpectKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn get(&self, key: SpectKey) -> &Array2<Complex64> {
        &self.arrays[self.index_of(key)]
    }

    pub fn get_mut(&mut self, key: SpectKey) -> &mut Array2<Complex64> {
        let i = self.index_of(key);
        &mut self.arrays[i]
    }

    pub fn arrays(&self) -> &[Array2<Complex64>] {
        &self.arrays
    }

    pub fn arrays_mut(&mut self) -> &mut [Array2<Complex64>] {
        &mut self.arrays
    }

    pub fn iter(&self) -> impl Iterator<Item = &Array2<Complex64>> {
        self.arrays.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Array2<Complex64>> {
        self.arrays.iter_mut()
    }

    /// Largest absolute coefficient over every variable, the quantity the
    /// divergence guard watches.
    pub fn max_abs(&self) -> f64 {
        self.arrays
            .iter()
            .flat_map(|a| a.iter())
            .fold(0., |acc: f64, v| acc.max(v.norm()))
    }
}

/// Physical fields that can become stale when one prognostic variable
/// changes. Conservative: a velocity may be derived from the vorticity or
/// stored directly, so the table covers both derivations.
pub fn dependents(key: SpectKey) -> &'static [PhysKey] {
    match key {
        SpectKey::RotFft => &[PhysKey::Ux, PhysKey::Uy, PhysKey::Rot, PhysKey::Div],
        SpectKey::UxFft => &[PhysKey::Ux, PhysKey::Rot, PhysKey::Div],
        SpectKey::UyFft => &[PhysKey::Uy, PhysKey::Rot, PhysKey::Div],
        SpectKey::BFft => &[PhysKey::B],
        SpectKey::EtaFft => &[PhysKey::Eta],
    }
}

/// Prognostic spectral variables plus the cache of derived physical fields.
#[derive(Clone, Debug)]
pub struct State {
    pub spect: SetOfVariables,
    phys_cache: HashMap<PhysKey, Array2<f64>>,
}

impl State {
    pub fn new(keys: &'static [SpectKey], shape: (usize, usize)) -> State {
        State {
            spect: SetOfVariables::zeros(keys, shape),
            phys_cache: HashMap::new(),
        }
    }

    /// Replaces one prognostic variable. Derived fields depending on it are
    /// dropped from the cache.
    pub fn set_from_spectral(&mut self, key: SpectKey, field: Array2<Complex64>) {
        assert_eq!(
            (field.nrows(), field.ncols()),
            self.spect.shape(),
            "spectral field of wrong shape"
        );
        *self.spect.get_mut(key) = field;
        for &phys in dependents(key) {
            self.phys_cache.remove(&phys);
        }
    }

    /// Must be called after any mutation of `spect` as a whole, as the time
    /// stepper does at the end of a step.
    pub fn invalidate_cache(&mut self) {
        self.phys_cache.clear();
    }

    pub fn cached_phys(&self, key: PhysKey) -> Option<&Array2<f64>> {
        self.phys_cache.get(&key)
    }

    pub fn insert_phys(&mut self, key: PhysKey, field: Array2<f64>) {
        self.phys_cache.insert(key, field);
    }

    #[cfg(test)]
    pub fn cache_len(&self) -> usize {
        self.phys_cache.len()
    }
}
