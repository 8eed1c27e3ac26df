#![warn(missing_docs)]

//! Abrasive material removal on a discretized workpiece.
//!
//! A tool of some [`Shape`] slides over a height-field workpiece. Each
//! [`Simulation::step`] evaluates contact pressure ([`PressureModel`]) and
//! sliding speed ([`VelocityModel`]) on every grid cell, turns them into a
//! removal rate through a [`RemovalLaw`] (Preston's by default), and deepens
//! the profile under the tool by `rate · dt`.
//!
//! Components are plain values composed by generics. For setups read from a
//! file, [`SimulationConfig`] builds a [`DynSimulation`] over enum-dispatched
//! components instead.
//!
//! # Example
//!
//! ```
//! use mrsim::{Belt, Flat, GridConfig, Preston, Round, Simulation};
//!
//! let grid = GridConfig::new(0.4, 0.3).with_resolution(0.002, 0.002).with_dt(0.1);
//! let mut sim = Simulation::new(
//!     &grid,
//!     Round::new(0.05)?,
//!     Flat::new(10.0)?,
//!     Belt::new(2.0)?,
//!     Preston::new(1e-3)?,
//! )?;
//!
//! sim.set_velocity(0.1, 0.0);
//! sim.follow_path((0..20).map(|i| (-0.1 + 0.01 * i as f64, 0.0)))?;
//! assert!(sim.max_depth() > 0.0);
//! # Ok::<(), mrsim::SimError>(())
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod pressure;
pub mod removal;
pub mod shape;
pub mod simulation;
pub mod velocity;

pub use config::{
    AnyPressure, AnyShape, AnyVelocity, DynSimulation, GridConfig, PressureConfig, RemovalConfig,
    ShapeConfig, SimulationConfig, VelocityConfig,
};
pub use error::{ConfigError, Result, SimError};
pub use grid::{SurfaceGrid, ToolState};
pub use pressure::{
    ConstantCurvature, ContactPatch, Equilibrium, Flat, MeshStiffness, MeshVolume, PressureModel,
};
pub use removal::{Preston, RemovalLaw};
pub use shape::{Antialias, Rectangular, Round, Shape, Square, ToolGeometry};
pub use simulation::{ProfileSnapshot, Simulation};
pub use velocity::{Belt, Orbital, Rotary, VelocityModel};

pub use mrsim_math::{Bracket, Field, SolverError, SolverSettings};
pub use mrsim_mesh::{SharedSurface, SurfaceQuery};
