//! Mechanics roster optimisation.
//!
//! Assigns mechanics to (base, period, shift) slots so every aircraft on the
//! schedule has its airframe, rotor and avionics work covered, optional
//! inspector sign-off is provided by someone other than the mechanic doing
//! the work, avoidance pairs never share a slot, nobody is double-booked, and
//! total relocation cost is minimal.
//!
//! A run is three steps in strict sequence:
//!
//! 1. [`compiler::compile`] validates raw rows into a [`compiler::CompiledRoster`].
//! 2. [`solver::solve`] builds the MIP and hands it to a good_lp backend.
//! 3. [`extractor::extract`] turns the 0/1 bindings into assignments and
//!    re-checks every invariant.
//!
//! [`optimize`] runs all three.

pub mod capability;
pub mod compiler;
pub mod config;
pub mod data;
pub mod error;
pub mod extractor;
pub mod server;
pub mod solver;

pub use data::{Assignment, RosterInput, RosterReport, RosterSolution};
pub use error::{Result, RosterError};
pub use solver::{Backend, SolveStatus, SolverOptions};

/// Compiles, solves and extracts one roster.
pub fn optimize(input: &RosterInput, options: &SolverOptions) -> Result<RosterReport> {
    let compiled = compiler::compile(input)?;
    let result = solver::solve(&compiled, options)?;
    let solution = extractor::extract(&compiled, &result.bindings)?;

    Ok(RosterReport {
        status: result.status,
        backend: result.backend,
        fallback_used: result.fallback_used,
        variables: result.variables,
        constraints: result.constraints,
        solve_time_ms: result.elapsed.as_millis(),
        solution,
    })
}
