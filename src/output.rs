//! Periodic output hooks.
//!
//! Consumers register an `OnSave` callback with a period in simulated time.
//! After each step the simulation compares the elapsed time against the
//! hook's schedule and, when due, hands it a snapshot of gathered physical
//! fields and diagnostics. Serialisation formats live entirely on the
//! consumer side of the trait.

use crate::errors::*;
use crate::state::PhysKey;
use ndarray::Array2;

/// Physical fields and diagnostics at one instant, gathered to the root
/// rank. On non-root ranks the field list is empty.
pub struct Snapshot {
    pub t: f64,
    pub it: u64,
    pub energy: f64,
    pub enstrophy: f64,
    pub fields: Vec<(PhysKey, Array2<f64>)>,
}

pub trait OnSave {
    fn save(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// One registered hook and its schedule.
pub struct PeriodicOutput {
    period: f64,
    t_next: f64,
    pub hook: Box<dyn OnSave>,
}

impl PeriodicOutput {
    /// A non-positive or non-finite period cannot be scheduled; rejected at
    /// registration like any other configuration error.
    pub fn new(period: f64, hook: Box<dyn OnSave>) -> Result<PeriodicOutput> {
        if !period.is_finite() || period <= 0. {
            bail!(ErrorKind::Config(format!(
                "output period must be positive and finite, got {}",
                period
            )));
        }
        Ok(PeriodicOutput {
            period,
            // First snapshot right after the first step at or past zero.
            t_next: 0.,
            hook,
        })
    }

    pub fn is_due(&self, t: f64) -> bool {
        t >= self.t_next
    }

    /// Advances the schedule past `t`, skipping periods the stepper jumped
    /// over in one large step.
    pub fn advance_schedule(&mut self, t: f64) {
        while self.t_next <= t {
            self.t_next += self.period;
        }
    }
}
