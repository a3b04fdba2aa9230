//! Crate-wide error types.
//!
//! None of these are retried by the solver itself: a diverged integration is
//! not meaningful to restart automatically, and a configuration or shape
//! problem is fatal at setup time.

error_chain! {
    errors {
        /// Contradictory or invalid configuration, raised at setup.
        Config(msg: String) {
            description("invalid configuration")
            display("invalid configuration: {}", msg)
        }

        /// NaN/Inf in a spectral coefficient or unbounded energy growth,
        /// detected at a stage boundary.
        Divergence(it: u64, time: f64, field: &'static str) {
            description("numerical divergence")
            display(
                "numerical divergence in `{}` at it = {}, t = {:.6e}",
                field, it, time
            )
        }

        /// Local array shape inconsistent with the expected grid partition.
        ShapeMismatch(expected: (usize, usize), got: (usize, usize)) {
            description("decomposition/shape mismatch")
            display(
                "decomposition/shape mismatch: expected {:?}, got {:?}",
                expected, got
            )
        }

        /// The CFL condition pushed the time step below the configured
        /// minimum; treated as non-convergence.
        SmallTimeStep(deltat: f64, deltat_min: f64) {
            description("time step below configured minimum")
            display(
                "time step {:.6e} fell below the configured minimum {:.6e}",
                deltat, deltat_min
            )
        }
    }
}
