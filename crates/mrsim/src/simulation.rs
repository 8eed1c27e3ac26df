//! The steppable simulation.

use mrsim_math::{integrate, map, zip_map, Field};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::GridConfig;
use crate::error::{ConfigError, Result, SimError};
use crate::grid::{SurfaceGrid, ToolState};
use crate::pressure::{ContactPatch, PressureModel};
use crate::removal::{Preston, RemovalLaw};
use crate::shape::Shape;
use crate::velocity::VelocityModel;

/// One tool of shape `S`, pressure model `P` and kinematics `V` removing
/// material from a workpiece according to law `L`.
///
/// The workpiece profile only changes in [`step`](Self::step), and only
/// ever deepens.
pub struct Simulation<S, P, V, L = Preston> {
    grid: SurfaceGrid,
    tool: ToolState,
    profile: Field,
    shape: S,
    pressure: P,
    velocity: V,
    law: L,
}

impl<S, P, V, L> Simulation<S, P, V, L>
where
    S: Shape,
    P: PressureModel,
    V: VelocityModel,
    L: RemovalLaw,
{
    /// Assemble a simulation.
    ///
    /// Fills in the shape's default antialias distance from the grid and
    /// rejects a pressure model that needs a round tool when the shape has
    /// no radius.
    pub fn new(config: &GridConfig, mut shape: S, pressure: P, velocity: V, law: L) -> Result<Self> {
        let grid = SurfaceGrid::new(config.size_x, config.size_y, config.dx, config.dy)?;
        let tool = ToolState::new(config.dt, config.auto_velocity)?;

        if pressure.requires_radius() && shape.radius().is_none() {
            return Err(ConfigError::RequiresRoundTool {
                pressure: pressure.name(),
                shape: shape.name(),
            }
            .into());
        }
        shape.antialias_mut().resolve(grid.diagonal());

        let (ny, nx) = grid.shape();
        Ok(Self {
            grid,
            tool,
            profile: Field::zeros(ny, nx),
            shape,
            pressure,
            velocity,
            law,
        })
    }

    /// Move the tool center.
    pub fn set_location(&mut self, x: f64, y: f64) {
        self.tool.set_location(x, y);
    }

    /// Set the feed velocity. Overwritten by the next location when
    /// auto-velocity is on.
    pub fn set_velocity(&mut self, x: f64, y: f64) {
        self.tool.set_velocity(x, y);
    }

    /// Set the normal force on the pressure model.
    pub fn set_force(&mut self, force: f64) {
        self.pressure.set_force(force);
    }

    /// Grid coordinates relative to the tool center.
    pub fn local_grid(&self) -> Result<(Field, Field)> {
        let center = self.center()?;
        Ok(self.grid.local(center))
    }

    /// Contact mask on tool-local coordinates.
    pub fn shape(&self, x: &Field, y: &Field) -> Field {
        self.shape.shape(x, y)
    }

    /// Contact pressure on tool-local coordinates.
    pub fn pressure(&self, x: &Field, y: &Field) -> Result<Field> {
        let mask = self.shape.shape(x, y);
        self.pressure_with_mask(x, y, &mask)
    }

    /// Sliding speed on tool-local coordinates.
    pub fn velocity(&self, x: &Field, y: &Field) -> Field {
        self.velocity.velocity(x, y, self.tool.velocity())
    }

    /// Removal rate over the whole grid at the current tool state.
    pub fn mrr(&self) -> Result<Field> {
        let (x, y) = self.local_grid()?;
        let mask = self.shape.shape(&x, &y);
        self.rate(&x, &y, &mask)
    }

    /// Advance one timestep.
    ///
    /// The rate field is computed in full before the profile is touched, so
    /// a failed step leaves the profile unchanged. Negative rates are
    /// clamped to zero.
    pub fn step(&mut self) -> Result<()> {
        let (x, y) = self.local_grid()?;
        let mask = self.shape.shape(&x, &y);
        let rate = self.rate(&x, &y, &mask)?;

        let dt = self.tool.dt();
        let increment = zip_map(&rate, &mask, move |r, m| if m > 0.0 { r.max(0.0) * dt } else { 0.0 });
        trace!(
            location = ?self.tool.location(),
            velocity = ?self.tool.velocity(),
            max_increment = increment.max(),
            "step"
        );
        self.profile += increment;
        Ok(())
    }

    /// Place the tool at each point in turn and step once there.
    ///
    /// Returns the number of steps taken. Stops at the first failure, with
    /// the steps before it kept.
    pub fn follow_path<I>(&mut self, points: I) -> Result<usize>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut steps = 0;
        for (x, y) in points {
            self.set_location(x, y);
            self.step()?;
            steps += 1;
        }
        Ok(steps)
    }

    fn center(&self) -> Result<Point2<f64>> {
        self.tool.location().ok_or(SimError::NoLocation)
    }

    fn pressure_with_mask(&self, x: &Field, y: &Field, mask: &Field) -> Result<Field> {
        let patch = ContactPatch {
            x,
            y,
            mask,
            geometry: self.shape.geometry(),
            cell_area: self.grid.cell_area(),
            center: self.center()?,
        };
        self.pressure.pressure(&patch)
    }

    fn rate(&self, x: &Field, y: &Field, mask: &Field) -> Result<Field> {
        let p = self.pressure_with_mask(x, y, mask)?;
        let v = self.velocity(x, y);
        Ok(self.law.removal_rate(&p, &v))
    }
}

impl<S, P, V, L> Simulation<S, P, V, L> {
    /// The workpiece grid.
    pub fn grid(&self) -> &SurfaceGrid {
        &self.grid
    }

    /// Tool position and feed.
    pub fn tool(&self) -> &ToolState {
        &self.tool
    }

    /// Tool footprint.
    pub fn shape_model(&self) -> &S {
        &self.shape
    }

    /// Mutable tool footprint.
    pub fn shape_model_mut(&mut self) -> &mut S {
        &mut self.shape
    }

    /// Pressure model.
    pub fn pressure_model(&self) -> &P {
        &self.pressure
    }

    /// Mutable pressure model.
    pub fn pressure_model_mut(&mut self) -> &mut P {
        &mut self.pressure
    }

    /// Velocity model.
    pub fn velocity_model(&self) -> &V {
        &self.velocity
    }

    /// Mutable velocity model.
    pub fn velocity_model_mut(&mut self) -> &mut V {
        &mut self.velocity
    }

    /// Removal law.
    pub fn law(&self) -> &L {
        &self.law
    }

    /// Accumulated removal depth.
    pub fn profile(&self) -> &Field {
        &self.profile
    }

    /// Total removed volume, `Σ depth · dx · dy`.
    pub fn removed_volume(&self) -> f64 {
        integrate(&self.profile, self.grid.cell_area())
    }

    /// Deepest point of the profile.
    pub fn max_depth(&self) -> f64 {
        self.profile.max()
    }

    /// Profile scaled so the deepest point is 1. All zeros before any
    /// removal.
    pub fn normalized_profile(&self) -> Field {
        let max = self.max_depth();
        if max > 0.0 {
            map(&self.profile, move |d| d / max)
        } else {
            self.profile.clone()
        }
    }

    /// `[x_min, x_max, y_min, y_max]` of the grid.
    pub fn extent(&self) -> [f64; 4] {
        self.grid.extent()
    }

    /// A serializable copy of the profile.
    pub fn snapshot(&self) -> ProfileSnapshot {
        let (ny, nx) = self.grid.shape();
        ProfileSnapshot {
            nx,
            ny,
            extent: self.extent(),
            dx: self.grid.dx(),
            dy: self.grid.dy(),
            depth: self.profile.transpose().as_slice().to_vec(),
            max_depth: self.max_depth(),
            removed_volume: self.removed_volume(),
        }
    }
}

/// The profile as plain data, for rendering or export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Columns (along X).
    pub nx: usize,
    /// Rows (along Y).
    pub ny: usize,
    /// `[x_min, x_max, y_min, y_max]`.
    pub extent: [f64; 4],
    /// Spacing along X.
    pub dx: f64,
    /// Spacing along Y.
    pub dy: f64,
    /// Depths, row-major with Y outer.
    pub depth: Vec<f64>,
    /// Deepest point.
    pub max_depth: f64,
    /// Total removed volume.
    pub removed_volume: f64,
}

impl ProfileSnapshot {
    /// Depth at column `ix`, row `iy`.
    pub fn get(&self, ix: usize, iy: usize) -> f64 {
        self.depth[iy * self.nx + ix]
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
