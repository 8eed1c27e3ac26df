//! Contact pressure models.
//!
//! Every model returns pressure on the tool-local grid already multiplied by
//! the contact mask, so cells outside the footprint carry exactly zero.

mod curvature;
mod flat;
mod mesh;

pub use curvature::{ConstantCurvature, Equilibrium};
pub use flat::Flat;
pub use mesh::{MeshStiffness, MeshVolume, DEFAULT_PATCH_SAMPLES};

use mrsim_math::{zip_map, Field, SolverError, SolverSettings};
use nalgebra::Point2;

use crate::error::Result;
use crate::shape::ToolGeometry;

/// Everything a pressure model may read about the current contact.
#[derive(Debug, Clone, Copy)]
pub struct ContactPatch<'a> {
    /// Tool-local X coordinate of every cell.
    pub x: &'a Field,
    /// Tool-local Y coordinate of every cell.
    pub y: &'a Field,
    /// Contact weight of every cell.
    pub mask: &'a Field,
    /// Footprint properties of the tool.
    pub geometry: ToolGeometry,
    /// Area of one grid cell.
    pub cell_area: f64,
    /// Tool center in workpiece coordinates.
    pub center: Point2<f64>,
}

impl ContactPatch<'_> {
    /// Area covered by the mask, `Σ mask · dA`.
    pub fn mask_area(&self) -> f64 {
        mrsim_math::integrate(self.mask, self.cell_area)
    }

    /// Whether any cell is in contact.
    pub fn is_empty(&self) -> bool {
        self.mask.iter().all(|&m| m <= 0.0)
    }

    /// Multiply `field` by the contact mask.
    pub fn masked(&self, field: &Field) -> Field {
        zip_map(field, self.mask, |p, m| p * m)
    }

    /// A field of zeros matching the grid.
    pub fn zeros(&self) -> Field {
        Field::zeros(self.mask.nrows(), self.mask.ncols())
    }
}

/// Distributes the commanded load over the contact patch.
pub trait PressureModel {
    /// Pressure on every cell of the patch.
    fn pressure(&self, patch: &ContactPatch<'_>) -> Result<Field>;

    /// Set the normal force.
    fn set_force(&mut self, force: f64);

    /// Current normal force.
    fn force(&self) -> f64;

    /// Whether the model only works with a round tool.
    fn requires_radius(&self) -> bool {
        false
    }

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Reject a solve whose achieved load misses the target.
pub(crate) fn check_balance(
    achieved: f64,
    target: f64,
    iterations: usize,
    settings: &SolverSettings,
) -> std::result::Result<(), SolverError> {
    let residual = (achieved - target).abs() / target.abs().max(f64::MIN_POSITIVE);
    if residual <= settings.f_tolerance {
        Ok(())
    } else {
        Err(SolverError::NotConverged { iterations, residual })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ToolGeometry;

    #[test]
    fn test_patch_helpers() {
        let x = Field::zeros(2, 2);
        let y = Field::zeros(2, 2);
        let mask = Field::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 0.0]);
        let patch = ContactPatch {
            x: &x,
            y: &y,
            mask: &mask,
            geometry: ToolGeometry::round(1.0),
            cell_area: 0.25,
            center: Point2::origin(),
        };
        assert_eq!(patch.mask_area(), 0.375);
        assert!(!patch.is_empty());
        let p = patch.masked(&Field::from_element(2, 2, 4.0));
        assert_eq!(p, Field::from_row_slice(2, 2, &[4.0, 2.0, 0.0, 0.0]));
    }

    #[test]
    fn test_check_balance() {
        let settings = SolverSettings::default();
        assert!(check_balance(10.0 + 1e-6, 10.0, 3, &settings).is_ok());
        assert!(matches!(
            check_balance(11.0, 10.0, 3, &settings),
            Err(SolverError::NotConverged { iterations: 3, .. })
        ));
    }
}
