use std::f64::consts::PI;

use mrsim_math::{
    brent_root, golden_section_min, integrate, map, zip_map, Bracket, Field, SolverSettings,
};
use tracing::debug;

use super::{check_balance, ContactPatch, PressureModel};
use crate::error::{require_finite, require_positive, ConfigError, Result};

/// How the penetration depth of a [`ConstantCurvature`] contact was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Equilibrium {
    /// No load, or no cell in contact.
    Unloaded,
    /// Both curvatures zero: the flat uniform distribution.
    Uniform,
    /// Contact ellipse lies inside the tool.
    SmallContact(f64),
    /// Whole tool face in contact.
    FullContact(f64),
    /// Solved on the grid.
    Numeric(f64),
}

impl Equilibrium {
    /// Penetration depth, when the paraboloid model applies.
    pub fn penetration(&self) -> Option<f64> {
        match *self {
            Self::SmallContact(d) | Self::FullContact(d) | Self::Numeric(d) => Some(d),
            Self::Unloaded | Self::Uniform => None,
        }
    }
}

/// Elastic tool pressed against a surface of constant curvature.
///
/// The tool-to-surface gap is the paraboloid `h = d - kx·x²/2 - ky·y²/2`
/// and the pressure is `k · max(h, 0) · mask`. The depth `d` balances the
/// commanded force. Round tools with curvatures of one sign use a closed
/// form when it is valid and it balances the force on the grid; otherwise
/// the depth is solved numerically.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantCurvature {
    force: f64,
    kx: f64,
    ky: f64,
    stiffness: f64,
    bracket: Option<Bracket>,
    settings: SolverSettings,
}

impl ConstantCurvature {
    /// A flat (zero curvature) contact with the given stiffness.
    pub fn new(stiffness: f64) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            force: 0.0,
            kx: 0.0,
            ky: 0.0,
            stiffness: require_positive("stiffness", stiffness)?,
            bracket: None,
            settings: SolverSettings::default(),
        })
    }

    /// Builder form of [`set_curvature`](Self::set_curvature).
    pub fn with_curvature(mut self, kx: f64, ky: f64) -> std::result::Result<Self, ConfigError> {
        self.set_curvature(kx, ky)?;
        Ok(self)
    }

    /// Search the numeric solve over this depth interval instead of the
    /// one derived from the gap field.
    pub fn with_bracket(mut self, bracket: Bracket) -> Self {
        self.bracket = Some(bracket);
        self
    }

    /// Override solver tolerances.
    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the surface curvatures along X and Y.
    pub fn set_curvature(&mut self, kx: f64, ky: f64) -> std::result::Result<(), ConfigError> {
        self.kx = require_finite("kx", kx)?;
        self.ky = require_finite("ky", ky)?;
        Ok(())
    }

    /// Surface curvatures along X and Y.
    pub fn curvature(&self) -> (f64, f64) {
        (self.kx, self.ky)
    }

    /// Tool stiffness.
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    /// Solve for the penetration depth on `patch`.
    pub fn equilibrium(&self, patch: &ContactPatch<'_>) -> Result<Equilibrium> {
        if self.force <= 0.0 || patch.is_empty() {
            return Ok(Equilibrium::Unloaded);
        }
        if self.kx == 0.0 && self.ky == 0.0 {
            return Ok(Equilibrium::Uniform);
        }

        let onset = self.onset(patch);
        let closed = patch.geometry.radius.and_then(|r| self.closed_form(r));
        if let Some(closed @ (Equilibrium::SmallContact(d) | Equilibrium::FullContact(d))) = closed {
            let achieved = self.load(&onset, patch, d);
            if check_balance(achieved, self.force, 0, &self.settings).is_ok() {
                return Ok(closed);
            }
            // Contacts a few cells wide sample the paraboloid too coarsely.
            debug!(d, achieved, "curvature contact: closed form off balance on the grid");
            let d = self.refine(&onset, patch, d, achieved)?;
            return Ok(Equilibrium::Numeric(d));
        }

        let d = self.solve_numeric(&onset, patch)?;
        Ok(Equilibrium::Numeric(d))
    }

    /// Continuum closed-form depth for a round tool of `radius`, when one of
    /// the branches is valid.
    pub fn closed_form(&self, radius: f64) -> Option<Equilibrium> {
        let (kx, ky, k, force, r) = (self.kx, self.ky, self.stiffness, self.force, radius);
        if force <= 0.0 || (kx == 0.0 && ky == 0.0) {
            return None;
        }
        if kx > 0.0 && ky > 0.0 {
            let d = (force * (kx * ky).sqrt() / (PI * k)).sqrt();
            let semi_axis = (2.0 * d / kx.min(ky)).sqrt();
            if semi_axis <= r {
                debug!(d, semi_axis, "curvature contact: small-contact branch");
                return Some(Equilibrium::SmallContact(d));
            }
        }
        if kx * ky >= 0.0 {
            let d = force / (k * PI * r * r) + (kx + ky) * r * r / 8.0;
            if d >= kx.max(ky).max(0.0) * r * r / 2.0 {
                debug!(d, "curvature contact: full-contact branch");
                return Some(Equilibrium::FullContact(d));
            }
        }
        None
    }

    /// Depth at which each cell starts to carry load.
    fn onset(&self, patch: &ContactPatch<'_>) -> Field {
        let (kx, ky) = (self.kx, self.ky);
        zip_map(patch.x, patch.y, move |x, y| kx * x * x / 2.0 + ky * y * y / 2.0)
    }

    fn load(&self, onset: &Field, patch: &ContactPatch<'_>, d: f64) -> f64 {
        let k = self.stiffness;
        let p = zip_map(onset, patch.mask, move |q, m| k * (d - q).max(0.0) * m);
        integrate(&p, patch.cell_area)
    }

    /// Caller bracket, or one from the smallest onset depth under the tool
    /// (no load) to the largest plus twice the rigid estimate (load above F).
    fn bracket(&self, onset: &Field, patch: &ContactPatch<'_>) -> Result<Bracket> {
        if let Some(bracket) = self.bracket {
            return Ok(bracket);
        }
        let (lo, hi) = onset
            .iter()
            .zip(patch.mask.iter())
            .filter(|&(_, &m)| m > 0.0)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (&q, _)| {
                (lo.min(q), hi.max(q))
            });
        let rigid = self.force / (self.stiffness * patch.mask_area());
        Ok(Bracket::new(lo, hi + 2.0 * rigid)?)
    }

    /// Root-find the grid balance, starting from a closed-form depth `d`
    /// that carries `achieved` instead of the commanded force.
    fn refine(&self, onset: &Field, patch: &ContactPatch<'_>, d: f64, achieved: f64) -> Result<f64> {
        let full = self.bracket(onset, patch)?;
        let bracket = if achieved < self.force {
            Bracket::new(d.max(full.lo), full.hi.max(d))?
        } else {
            Bracket::new(full.lo.min(d), d)?
        };

        let target = self.force;
        let solution = brent_root(|d| self.load(onset, patch, d) - target, bracket, &self.settings)?;
        let achieved = self.load(onset, patch, solution.x);
        check_balance(achieved, target, solution.iterations, &self.settings)?;
        debug!(
            d = solution.x,
            iterations = solution.iterations,
            "curvature contact: refined on the grid"
        );
        Ok(solution.x)
    }

    fn solve_numeric(&self, onset: &Field, patch: &ContactPatch<'_>) -> Result<f64> {
        let bracket = self.bracket(onset, patch)?;
        let target = self.force;
        let solution = golden_section_min(
            |d| (self.load(onset, patch, d) - target).powi(2),
            bracket,
            &self.settings,
        )?;
        let achieved = self.load(onset, patch, solution.x);
        check_balance(achieved, target, solution.iterations, &self.settings)?;
        debug!(
            d = solution.x,
            iterations = solution.iterations,
            "curvature contact: numeric solve"
        );
        Ok(solution.x)
    }
}

impl PressureModel for ConstantCurvature {
    fn pressure(&self, patch: &ContactPatch<'_>) -> Result<Field> {
        let equilibrium = self.equilibrium(patch)?;
        let d = match equilibrium {
            Equilibrium::Unloaded => return Ok(patch.zeros()),
            Equilibrium::Uniform => {
                let uniform = self.force / patch.geometry.area;
                return Ok(map(patch.mask, move |m| uniform * m));
            }
            Equilibrium::SmallContact(d) | Equilibrium::FullContact(d) | Equilibrium::Numeric(d) => d,
        };
        let k = self.stiffness;
        let h = map(&self.onset(patch), move |q| k * (d - q).max(0.0));
        Ok(patch.masked(&h))
    }

    fn set_force(&mut self, force: f64) {
        self.force = force;
    }

    fn force(&self) -> f64 {
        self.force
    }

    fn name(&self) -> &'static str {
        "constant_curvature"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use crate::pressure::test_support::{local_grid, round_mask};
    use crate::shape::{Rectangular, Shape};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use mrsim_math::SolverError;
    use nalgebra::Point2;

    const STEP: f64 = 0.0005;

    struct Fixture {
        x: Field,
        y: Field,
        mask: Field,
        geometry: crate::shape::ToolGeometry,
        step: f64,
    }

    impl Fixture {
        fn round(radius: f64) -> Self {
            Self::sampled(radius, 0.06, STEP, 0.0)
        }

        /// Round tool on a grid of spacing `step`, with the tool center
        /// shifted by `offset` along both axes from a grid node.
        fn sampled(radius: f64, half: f64, step: f64, offset: f64) -> Self {
            let (x, y) = local_grid(half, step);
            let x = x.map(|x| x + offset);
            let y = y.map(|y| y + offset);
            let (mask, geometry) = round_mask(radius, &x, &y, step);
            Self {
                x,
                y,
                mask,
                geometry,
                step,
            }
        }

        fn patch(&self) -> ContactPatch<'_> {
            ContactPatch {
                x: &self.x,
                y: &self.y,
                mask: &self.mask,
                geometry: self.geometry,
                cell_area: self.step * self.step,
                center: Point2::origin(),
            }
        }
    }

    fn model(force: f64) -> ConstantCurvature {
        let mut model = ConstantCurvature::new(1e7)
            .unwrap()
            .with_curvature(0.2, 0.4)
            .unwrap();
        model.set_force(force);
        model
    }

    #[test]
    fn test_branch_selection() {
        assert!(matches!(model(5.0).closed_form(0.05), Some(Equilibrium::SmallContact(_))));
        assert_eq!(model(20.0).closed_form(0.05), None);
        assert!(matches!(model(60.0).closed_form(0.05), Some(Equilibrium::FullContact(_))));
        assert_eq!(model(0.0).closed_form(0.05), None);

        let fixture = Fixture::round(0.05);
        assert!(matches!(
            model(20.0).equilibrium(&fixture.patch()).unwrap(),
            Equilibrium::Numeric(_)
        ));
    }

    #[test]
    fn test_force_balance_all_regimes() {
        let fixture = Fixture::round(0.05);
        let patch = fixture.patch();
        for force in [5.0, 20.0, 60.0] {
            let p = model(force).pressure(&patch).unwrap();
            assert_relative_eq!(integrate(&p, patch.cell_area), force, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_closed_form_balances_fine_grid() {
        let fixture = Fixture::sampled(0.05, 0.051, 0.0001, 0.0);
        let patch = fixture.patch();
        let model = model(5.0);
        assert!(matches!(
            model.equilibrium(&patch).unwrap(),
            Equilibrium::SmallContact(_)
        ));
        let p = model.pressure(&patch).unwrap();
        assert_abs_diff_eq!(integrate(&p, patch.cell_area), 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_grid_scale_contact_off_node() {
        // Contact ellipse about one cell wide, tool center between nodes.
        let fixture = Fixture::sampled(0.05, 0.06, 0.001, 0.0005);
        let patch = fixture.patch();
        for force in [1e-7, 1e-6] {
            let model = model(force);
            assert!(matches!(model.closed_form(0.05), Some(Equilibrium::SmallContact(_))));
            assert!(matches!(
                model.equilibrium(&patch).unwrap(),
                Equilibrium::Numeric(_)
            ));
            let p = model.pressure(&patch).unwrap();
            assert!(p.iter().any(|&p| p > 0.0));
            assert_relative_eq!(integrate(&p, patch.cell_area), force, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_small_contact_depth() {
        let d = model(5.0).closed_form(0.05).unwrap().penetration().unwrap();
        let expected = (5.0 * 0.08f64.sqrt() / (PI * 1e7)).sqrt();
        assert_relative_eq!(d, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_zero_outside_mask() {
        let fixture = Fixture::round(0.03);
        let patch = fixture.patch();
        for force in [5.0, 20.0, 60.0] {
            let p = model(force).pressure(&patch).unwrap();
            for (&p, &m) in p.iter().zip(fixture.mask.iter()) {
                if m == 0.0 {
                    assert_eq!(p, 0.0);
                }
                assert!(p >= 0.0);
            }
        }
    }

    #[test]
    fn test_zero_curvature_is_uniform() {
        let fixture = Fixture::round(0.05);
        let patch = fixture.patch();
        let mut model = ConstantCurvature::new(1e7).unwrap();
        model.set_force(12.0);
        assert_eq!(model.equilibrium(&patch).unwrap(), Equilibrium::Uniform);

        let p = model.pressure(&patch).unwrap();
        let uniform = 12.0 / fixture.geometry.area;
        for (&p, &m) in p.iter().zip(fixture.mask.iter()) {
            assert_abs_diff_eq!(p, uniform * m, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_force() {
        let fixture = Fixture::round(0.05);
        let patch = fixture.patch();
        let model = model(0.0);
        assert_eq!(model.equilibrium(&patch).unwrap(), Equilibrium::Unloaded);
        assert!(model.pressure(&patch).unwrap().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_saddle_is_solved_numerically() {
        let fixture = Fixture::round(0.05);
        let patch = fixture.patch();
        let mut model = ConstantCurvature::new(1e7)
            .unwrap()
            .with_curvature(0.3, -0.2)
            .unwrap();
        model.set_force(15.0);
        assert!(matches!(
            model.equilibrium(&patch).unwrap(),
            Equilibrium::Numeric(_)
        ));
        let p = model.pressure(&patch).unwrap();
        assert_relative_eq!(integrate(&p, patch.cell_area), 15.0, max_relative = 1e-6);
    }

    #[test]
    fn test_rectangular_tool() {
        let mut rect = Rectangular::new(0.08, 0.04).unwrap();
        rect.antialias_mut().resolve(STEP.hypot(STEP));
        let (x, y) = local_grid(0.06, STEP);
        let mask = rect.shape(&x, &y);
        let patch = ContactPatch {
            x: &x,
            y: &y,
            mask: &mask,
            geometry: rect.geometry(),
            cell_area: STEP * STEP,
            center: Point2::origin(),
        };
        let p = model(8.0).pressure(&patch).unwrap();
        assert_relative_eq!(integrate(&p, patch.cell_area), 8.0, max_relative = 1e-6);
    }

    #[test]
    fn test_bracket_without_equilibrium() {
        let fixture = Fixture::round(0.05);
        let patch = fixture.patch();
        let model = model(20.0).with_bracket(Bracket::new(0.0, 1e-5).unwrap());
        assert!(matches!(
            model.pressure(&patch),
            Err(SimError::Solver(SolverError::NotConverged { .. }))
        ));
    }

    #[test]
    fn test_iteration_budget() {
        let fixture = Fixture::round(0.05);
        let patch = fixture.patch();
        let settings = SolverSettings {
            max_iterations: 3,
            ..SolverSettings::default()
        };
        let model = model(20.0).with_settings(settings);
        assert!(matches!(
            model.pressure(&patch),
            Err(SimError::Solver(SolverError::NotConverged { .. }))
        ));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(matches!(
            ConstantCurvature::new(0.0),
            Err(ConfigError::InvalidParameter { name: "stiffness", .. })
        ));
        assert!(ConstantCurvature::new(1.0)
            .unwrap()
            .with_curvature(f64::NAN, 0.0)
            .is_err());
    }
}
