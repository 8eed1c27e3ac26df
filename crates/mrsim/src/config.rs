//! Simulation setup from plain data.
//!
//! [`SimulationConfig`] describes a whole simulation in one TOML document
//! and builds a [`DynSimulation`], whose components are chosen at runtime.
//!
//! ```toml
//! [grid]
//! size_x = 0.4
//! size_y = 0.3
//! dx = 0.002
//! dy = 0.002
//!
//! [shape]
//! type = "Round"
//! radius = 0.05
//!
//! [pressure]
//! type = "Flat"
//! force = 10.0
//!
//! [velocity]
//! type = "Orbital"
//! eccentricity = 0.005
//! orbital_speed = 100.0
//! rotational_speed = 10.0
//! ```

use mrsim_math::Field;
use mrsim_mesh::SharedSurface;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::{require_finite, ConfigError, Result, SimError};
use crate::pressure::{
    ConstantCurvature, ContactPatch, Flat, MeshStiffness, MeshVolume, PressureModel,
};
use crate::removal::Preston;
use crate::shape::{Antialias, Rectangular, Round, Shape, Square, ToolGeometry};
use crate::simulation::Simulation;
use crate::velocity::{Belt, Orbital, Rotary, VelocityModel};

fn default_resolution() -> f64 {
    0.001
}

fn default_dt() -> f64 {
    1.0
}

/// Workpiece extent, resolution and timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Workpiece extent along X.
    pub size_x: f64,
    /// Workpiece extent along Y.
    pub size_y: f64,
    /// Grid spacing along X.
    #[serde(default = "default_resolution")]
    pub dx: f64,
    /// Grid spacing along Y.
    #[serde(default = "default_resolution")]
    pub dy: f64,
    /// Timestep.
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Derive the feed velocity from successive tool locations.
    #[serde(default)]
    pub auto_velocity: bool,
}

impl GridConfig {
    /// A workpiece of the given extent with default resolution and timestep.
    pub fn new(size_x: f64, size_y: f64) -> Self {
        Self {
            size_x,
            size_y,
            dx: default_resolution(),
            dy: default_resolution(),
            dt: default_dt(),
            auto_velocity: false,
        }
    }

    /// Set the grid spacing.
    pub fn with_resolution(mut self, dx: f64, dy: f64) -> Self {
        self.dx = dx;
        self.dy = dy;
        self
    }

    /// Set the timestep.
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Enable or disable auto-velocity.
    pub fn with_auto_velocity(mut self, auto_velocity: bool) -> Self {
        self.auto_velocity = auto_velocity;
        self
    }
}

/// Tool footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShapeConfig {
    /// Circular pad.
    Round {
        /// Pad radius.
        radius: Option<f64>,
    },
    /// Rectangular pad.
    Rectangular {
        /// Extent along X.
        width: Option<f64>,
        /// Extent along Y.
        height: Option<f64>,
    },
    /// Square pad.
    Square {
        /// Side length.
        width: Option<f64>,
    },
}

impl ShapeConfig {
    fn build(&self, antialias: Antialias) -> std::result::Result<AnyShape, ConfigError> {
        Ok(match *self {
            Self::Round { radius } => AnyShape::Round(
                Round::new(radius.ok_or(ConfigError::MissingParameter("radius"))?)?
                    .with_antialias(antialias),
            ),
            Self::Rectangular { width, height } => AnyShape::Rectangular(
                Rectangular::new(
                    width.ok_or(ConfigError::MissingParameter("width"))?,
                    height.ok_or(ConfigError::MissingParameter("height"))?,
                )?
                .with_antialias(antialias),
            ),
            Self::Square { width } => AnyShape::Square(
                Square::new(width.ok_or(ConfigError::MissingParameter("width"))?)?
                    .with_antialias(antialias),
            ),
        })
    }
}

/// Pressure distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PressureConfig {
    /// Rigid flat tool.
    Flat {
        /// Normal force.
        #[serde(default)]
        force: f64,
        /// Torque about X.
        #[serde(default)]
        torque_x: f64,
        /// Torque about Y.
        #[serde(default)]
        torque_y: f64,
    },
    /// Elastic tool on a surface of constant curvature.
    ConstantCurvature {
        /// Tool stiffness.
        stiffness: Option<f64>,
        /// Curvature along X.
        #[serde(default)]
        kx: f64,
        /// Curvature along Y.
        #[serde(default)]
        ky: f64,
        /// Normal force.
        #[serde(default)]
        force: f64,
    },
    /// Elastic tool on a meshed surface.
    MeshStiffness {
        /// Tool stiffness.
        stiffness: Option<f64>,
        /// Normal force.
        #[serde(default)]
        force: f64,
        /// Height samples per side of the surface patch.
        samples: Option<usize>,
    },
    /// Rigid tool on a meshed surface.
    MeshVolume {
        /// Force per unit interpenetration volume.
        stiffness: Option<f64>,
        /// Normal force.
        #[serde(default)]
        force: f64,
        /// Height samples per side of the surface patch.
        samples: Option<usize>,
    },
}

impl PressureConfig {
    fn build(&self, surface: Option<SharedSurface>) -> std::result::Result<AnyPressure, ConfigError> {
        let stiffness = |k: Option<f64>| k.ok_or(ConfigError::MissingParameter("stiffness"));
        let mesh = || surface.clone().ok_or(ConfigError::MissingParameter("surface"));

        let mut pressure = match *self {
            Self::Flat {
                torque_x, torque_y, ..
            } => {
                let mut flat = Flat::default();
                flat.set_torque(torque_x, torque_y)?;
                AnyPressure::Flat(flat)
            }
            Self::ConstantCurvature { stiffness: k, kx, ky, .. } => AnyPressure::ConstantCurvature(
                ConstantCurvature::new(stiffness(k)?)?.with_curvature(kx, ky)?,
            ),
            Self::MeshStiffness {
                stiffness: k,
                samples,
                ..
            } => {
                let mut model = MeshStiffness::new(mesh()?, stiffness(k)?)?;
                if let Some(samples) = samples {
                    model = model.with_samples(samples);
                }
                AnyPressure::MeshStiffness(model)
            }
            Self::MeshVolume {
                stiffness: k,
                samples,
                ..
            } => {
                let mut model = MeshVolume::new(mesh()?, stiffness(k)?)?;
                if let Some(samples) = samples {
                    model = model.with_samples(samples);
                }
                AnyPressure::MeshVolume(model)
            }
        };
        pressure.set_force(require_finite("force", self.force())?);
        Ok(pressure)
    }

    fn force(&self) -> f64 {
        match *self {
            Self::Flat { force, .. }
            | Self::ConstantCurvature { force, .. }
            | Self::MeshStiffness { force, .. }
            | Self::MeshVolume { force, .. } => force,
        }
    }
}

/// Tool kinematics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VelocityConfig {
    /// Random-orbit motion.
    Orbital {
        /// Orbit eccentricity.
        eccentricity: Option<f64>,
        /// Orbital angular speed.
        #[serde(default)]
        orbital_speed: f64,
        /// Pad angular speed.
        #[serde(default)]
        rotational_speed: f64,
    },
    /// Belt running at constant speed.
    Belt {
        /// Belt speed.
        #[serde(default)]
        speed: f64,
    },
    /// Pad spinning about the tool center.
    Rotary {
        /// Angular speed.
        #[serde(default)]
        speed: f64,
    },
}

impl VelocityConfig {
    fn build(&self) -> std::result::Result<AnyVelocity, ConfigError> {
        Ok(match *self {
            Self::Orbital {
                eccentricity,
                orbital_speed,
                rotational_speed,
            } => {
                let mut orbital =
                    Orbital::new(eccentricity.ok_or(ConfigError::MissingParameter("eccentricity"))?)?;
                orbital.set_speed(orbital_speed, rotational_speed)?;
                AnyVelocity::Orbital(orbital)
            }
            Self::Belt { speed } => {
                let mut belt = Belt::default();
                belt.set_speed(speed)?;
                AnyVelocity::Belt(belt)
            }
            Self::Rotary { speed } => {
                let mut rotary = Rotary::default();
                rotary.set_speed(speed)?;
                AnyVelocity::Rotary(rotary)
            }
        })
    }
}

/// Removal law parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Preston coefficient.
    pub kp: f64,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self { kp: 1.0 }
    }
}

/// A complete simulation description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Workpiece grid and timestep.
    pub grid: GridConfig,
    /// Tool footprint.
    pub shape: ShapeConfig,
    /// Pressure distribution.
    pub pressure: PressureConfig,
    /// Tool kinematics.
    pub velocity: VelocityConfig,
    /// Removal law.
    #[serde(default)]
    pub removal: RemovalConfig,
    /// Contact mask edge smoothing.
    #[serde(default)]
    pub antialias: Antialias,
}

impl SimulationConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> std::result::Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Build the simulation. Mesh pressure models need
    /// [`build_with_surface`](Self::build_with_surface).
    pub fn build(&self) -> Result<DynSimulation> {
        self.assemble(None)
    }

    /// Build the simulation against a workpiece surface.
    pub fn build_with_surface(&self, surface: SharedSurface) -> Result<DynSimulation> {
        self.assemble(Some(surface))
    }

    fn assemble(&self, surface: Option<SharedSurface>) -> Result<DynSimulation> {
        let shape = self.shape.build(self.antialias)?;
        let pressure = self.pressure.build(surface)?;
        let velocity = self.velocity.build()?;
        let law = Preston::new(self.removal.kp)?;
        Simulation::new(&self.grid, shape, pressure, velocity, law)
    }
}

/// Any built-in shape.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyShape {
    /// Circular pad.
    Round(Round),
    /// Rectangular pad.
    Rectangular(Rectangular),
    /// Square pad.
    Square(Square),
}

macro_rules! delegate_shape {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            AnyShape::Round($s) => $body,
            AnyShape::Rectangular($s) => $body,
            AnyShape::Square($s) => $body,
        }
    };
}

impl Shape for AnyShape {
    fn geometry(&self) -> ToolGeometry {
        delegate_shape!(self, s => s.geometry())
    }

    fn shape(&self, x: &Field, y: &Field) -> Field {
        delegate_shape!(self, s => s.shape(x, y))
    }

    fn antialias(&self) -> &Antialias {
        delegate_shape!(self, s => s.antialias())
    }

    fn antialias_mut(&mut self) -> &mut Antialias {
        delegate_shape!(self, s => s.antialias_mut())
    }

    fn name(&self) -> &'static str {
        delegate_shape!(self, s => s.name())
    }
}

/// Any built-in pressure model.
#[derive(Clone)]
pub enum AnyPressure {
    /// Rigid flat tool.
    Flat(Flat),
    /// Elastic tool on a surface of constant curvature.
    ConstantCurvature(ConstantCurvature),
    /// Elastic tool on a meshed surface.
    MeshStiffness(MeshStiffness<SharedSurface>),
    /// Rigid tool on a meshed surface.
    MeshVolume(MeshVolume<SharedSurface>),
}

macro_rules! delegate_pressure {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            AnyPressure::Flat($p) => $body,
            AnyPressure::ConstantCurvature($p) => $body,
            AnyPressure::MeshStiffness($p) => $body,
            AnyPressure::MeshVolume($p) => $body,
        }
    };
}

impl AnyPressure {
    /// Set the torques of a flat tool.
    pub fn set_torque(&mut self, torque_x: f64, torque_y: f64) -> Result<()> {
        match self {
            Self::Flat(flat) => Ok(flat.set_torque(torque_x, torque_y)?),
            other => Err(unsupported("set_torque", other.name())),
        }
    }

    /// Set the surface curvature of a constant-curvature contact.
    pub fn set_curvature(&mut self, kx: f64, ky: f64) -> Result<()> {
        match self {
            Self::ConstantCurvature(model) => Ok(model.set_curvature(kx, ky)?),
            other => Err(unsupported("set_curvature", other.name())),
        }
    }
}

impl PressureModel for AnyPressure {
    fn pressure(&self, patch: &ContactPatch<'_>) -> Result<Field> {
        delegate_pressure!(self, p => p.pressure(patch))
    }

    fn set_force(&mut self, force: f64) {
        delegate_pressure!(self, p => p.set_force(force))
    }

    fn force(&self) -> f64 {
        delegate_pressure!(self, p => p.force())
    }

    fn requires_radius(&self) -> bool {
        delegate_pressure!(self, p => p.requires_radius())
    }

    fn name(&self) -> &'static str {
        delegate_pressure!(self, p => p.name())
    }
}

/// Any built-in velocity model.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyVelocity {
    /// Random-orbit motion.
    Orbital(Orbital),
    /// Belt running at constant speed.
    Belt(Belt),
    /// Pad spinning about the tool center.
    Rotary(Rotary),
}

impl AnyVelocity {
    /// Set the speed of a belt or rotary tool.
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        match self {
            Self::Belt(belt) => Ok(belt.set_speed(speed)?),
            Self::Rotary(rotary) => Ok(rotary.set_speed(speed)?),
            other => Err(unsupported("set_speed", other.name())),
        }
    }

    /// Set the orbital and pad speeds of an orbital tool.
    pub fn set_orbital_speed(&mut self, orbital: f64, rotational: f64) -> Result<()> {
        match self {
            Self::Orbital(model) => Ok(model.set_speed(orbital, rotational)?),
            other => Err(unsupported("set_orbital_speed", other.name())),
        }
    }
}

impl VelocityModel for AnyVelocity {
    fn velocity(&self, x: &Field, y: &Field, feed: Vector2<f64>) -> Field {
        match self {
            Self::Orbital(v) => v.velocity(x, y, feed),
            Self::Belt(v) => v.velocity(x, y, feed),
            Self::Rotary(v) => v.velocity(x, y, feed),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Orbital(v) => v.name(),
            Self::Belt(v) => v.name(),
            Self::Rotary(v) => v.name(),
        }
    }
}

fn unsupported(command: &'static str, component: &'static str) -> SimError {
    SimError::UnsupportedCommand { command, component }
}

/// A simulation whose components were chosen at runtime.
pub type DynSimulation = Simulation<AnyShape, AnyPressure, AnyVelocity, Preston>;

impl DynSimulation {
    /// Set flat-tool torques.
    pub fn set_torque(&mut self, torque_x: f64, torque_y: f64) -> Result<()> {
        self.pressure_model_mut().set_torque(torque_x, torque_y)
    }

    /// Set constant-curvature surface curvatures.
    pub fn set_curvature(&mut self, kx: f64, ky: f64) -> Result<()> {
        self.pressure_model_mut().set_curvature(kx, ky)
    }

    /// Set belt or rotary speed.
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        self.velocity_model_mut().set_speed(speed)
    }

    /// Set orbital and pad speeds.
    pub fn set_orbital_speed(&mut self, orbital: f64, rotational: f64) -> Result<()> {
        self.velocity_model_mut().set_orbital_speed(orbital, rotational)
    }
}
