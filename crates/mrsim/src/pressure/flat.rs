use mrsim_math::{zip_map, Field};

use super::{ContactPatch, PressureModel};
use crate::error::{require_finite, ConfigError, Result};

/// Rigid flat tool: uniform pressure plus a linear torque distribution.
///
/// `p = (F / A + x · Ty / Iy - y · Tx / Ix) · mask`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flat {
    force: f64,
    torque_x: f64,
    torque_y: f64,
}

impl Flat {
    /// A flat tool pressed with `force` and no torque.
    pub fn new(force: f64) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            force: require_finite("force", force)?,
            ..Self::default()
        })
    }

    /// Set the torques about the X and Y axes.
    pub fn set_torque(&mut self, torque_x: f64, torque_y: f64) -> std::result::Result<(), ConfigError> {
        let torque_x = require_finite("torque_x", torque_x)?;
        let torque_y = require_finite("torque_y", torque_y)?;
        self.torque_x = torque_x;
        self.torque_y = torque_y;
        Ok(())
    }

    /// Torques about the X and Y axes.
    pub fn torque(&self) -> (f64, f64) {
        (self.torque_x, self.torque_y)
    }
}

impl PressureModel for Flat {
    fn pressure(&self, patch: &ContactPatch<'_>) -> Result<Field> {
        let g = patch.geometry;
        let base = self.force / g.area;
        let sx = self.torque_x / g.ix;
        let sy = self.torque_y / g.iy;
        let p = zip_map(patch.x, patch.y, move |x, y| base + x * sy - y * sx);
        Ok(patch.masked(&p))
    }

    fn set_force(&mut self, force: f64) {
        self.force = force;
    }

    fn force(&self) -> f64 {
        self.force
    }

    fn name(&self) -> &'static str {
        "flat"
    }
}
