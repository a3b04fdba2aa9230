//! Domain decomposition context and the transform capability consumed by
//! the spectral operators.
//!
//! The solver itself never talks to MPI or any other communication layer;
//! it is written against [`TransformProvider`] with an explicit
//! [`DecompContext`] value. The provider owns the data layout: physical
//! arrays are dimensioned with the local physical shape, spectral arrays
//! with the local spectral shape, and the two are in general different
//! layouts. A sequential provider ([`sequential::SequentialFft2`]) ships
//! with the crate; a distributed one lives outside and only has to satisfy
//! the same trait.

pub mod sequential;

use crate::errors::*;
use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;

/// Where this process stands in the decomposition. Passed explicitly to
/// every call that may behave differently per rank; never read from global
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompContext {
    pub rank: usize,
    pub size: usize,
}

impl DecompContext {
    /// A decomposition of size one, which makes single-process runs and
    /// tests trivial.
    pub fn sequential() -> DecompContext {
        DecompContext { rank: 0, size: 1 }
    }

    pub fn is_root(&self) -> bool {
        self.rank == 0
    }
}

/// Transform capability: real field on the local grid portion to complex
/// spectral coefficients and back, plus the collectives the diagnostics
/// need.
///
/// Collective-communication failures are propagated unchanged; the solver
/// does not mask them.
pub trait TransformProvider {
    /// Shape `(ny_local, nx)` of physical arrays on this rank.
    fn shape_phys_local(&self) -> (usize, usize);

    /// Shape `(nky_local, nkx)` of spectral arrays on this rank.
    fn shape_spect_local(&self) -> (usize, usize);

    /// Global index of the first locally stored spectral row (slab
    /// decomposition along ky).
    fn spect_row_offset(&self) -> usize;

    /// Real physical field to complex coefficients, normalized by the
    /// number of grid points so that coefficients are Fourier coefficients.
    fn forward(&self, phys: ArrayView2<f64>) -> Result<Array2<Complex64>>;

    /// Inverse of [`forward`](Self::forward) up to round-trip tolerance.
    /// Reconstructs the redundant negative-kx coefficients by conjugate
    /// symmetry; they are never stored.
    fn backward(&self, spect: ArrayView2<Complex64>) -> Result<Array2<f64>>;

    /// Collects a distributed physical array on the root rank. Returns
    /// `None` on every other rank. Diagnostics/output only, never in the
    /// per-step hot path.
    fn gather_phys(
        &self,
        ctx: DecompContext,
        local: ArrayView2<f64>,
    ) -> Result<Option<Array2<f64>>>;

    /// Same as [`gather_phys`](Self::gather_phys) for spectral arrays.
    fn gather_spect(
        &self,
        ctx: DecompContext,
        local: ArrayView2<Complex64>,
    ) -> Result<Option<Array2<Complex64>>>;

    /// Global sum of one scalar contribution per rank; every rank receives
    /// the same value. Feeds reductions that steer the step itself (CFL,
    /// forcing normalization, the energy guard), so all ranks must agree on
    /// the result. Identity for a decomposition of size one.
    fn sum_scalar(&self, ctx: DecompContext, local: f64) -> Result<f64>;

    /// Global maximum over the per-rank contributions, with the same
    /// every-rank-agrees contract as [`sum_scalar`](Self::sum_scalar).
    fn max_scalar(&self, ctx: DecompContext, local: f64) -> Result<f64>;
}
