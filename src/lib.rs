//! Pseudo-spectral solver core for two-dimensional fluid equations.
//!
//! Fields live in a doubly periodic box and are represented both on the grid
//! and as truncated Fourier coefficients. Nonlinear terms are evaluated
//! pseudo-spectrally: products are formed in physical space, transformed
//! back and dealiased. The dissipative (viscous) part of the equations is
//! diagonal in spectral space and is integrated exactly by multiplication
//! with `exp(-f_d dt)` inside the Runge-Kutta stages.
//!
//! The distributed Fourier transform is a capability consumed through the
//! [`decomp::TransformProvider`] trait together with an explicit
//! [`decomp::DecompContext`]; the crate ships a sequential provider and all
//! operator code is written against local shapes only.

#![recursion_limit = "1024"]

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;

pub mod consts;
pub mod decomp;
pub mod errors;
pub mod forcing;
pub mod oper;
pub mod output;
pub mod preprocess;
pub mod settings;
pub mod simulation;
pub mod solver;
pub mod state;
pub mod time_stepping;

#[cfg(test)]
pub mod test_helper;
