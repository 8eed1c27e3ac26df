#![warn(missing_docs)]

//! Math support for the mrsim kernel.
//!
//! Dense 2D scalar fields over the workpiece grid and the bracketed 1D
//! solvers used by the contact-pressure equilibrium solves.
//!
//! # Example
//!
//! ```
//! use mrsim_math::{brent_root, Bracket, SolverSettings};
//!
//! let bracket = Bracket::new(0.0, 2.0).unwrap();
//! let root = brent_root(|x| x * x - 2.0, bracket, &SolverSettings::default()).unwrap();
//! assert!((root.x - 2f64.sqrt()).abs() < 1e-9);
//! ```

mod field;
mod solve;

pub use field::{integrate, map, zip_map, Field};
pub use solve::{
    brent_root, golden_section_min, Bracket, Solution, SolverError, SolverSettings,
    MAX_ITERATIONS,
};
