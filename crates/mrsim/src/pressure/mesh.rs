//! Contact against an arbitrary workpiece surface.
//!
//! Both models level the tool on the tangent plane at the surface point
//! nearest the tool center, read surface heights from a sampled
//! [`HeightField`] patch, and solve for the tool offset `d` along the
//! vertical that carries the commanded force.

use mrsim_math::{brent_root, integrate, Bracket, Field, SolverSettings};
use mrsim_mesh::{HeightField, Sampling, SharedSurface, SurfaceQuery};
use tracing::debug;

use super::{check_balance, ContactPatch, PressureModel};
use crate::error::{require_positive, ConfigError, Result, SimError};

/// Default number of height samples per side of the surface patch.
pub const DEFAULT_PATCH_SAMPLES: usize = 33;

/// Heights of the surface above the tangent plane, per grid cell.
///
/// Cells outside the mask, or with no surface beneath them, are
/// `NEG_INFINITY` so they never come into contact.
fn surface_gap<Q>(
    surface: &Q,
    patch: &ContactPatch<'_>,
    samples: usize,
    sampling: Sampling,
) -> Result<Field>
where
    Q: SurfaceQuery + ?Sized,
{
    let (cx, cy) = (patch.center.x, patch.center.y);
    let no_surface = SimError::NoSurface { x: cx, y: cy };
    let hit = surface.nearest(cx, cy).ok_or(no_surface)?;
    let n = hit.normal;
    if n.z <= 1e-9 {
        return Err(SimError::NoSurface { x: cx, y: cy });
    }

    let half_extent = patch
        .x
        .iter()
        .zip(patch.y.iter())
        .zip(patch.mask.iter())
        .filter(|&(_, &m)| m > 0.0)
        .fold(0.0f64, |acc, ((x, y), _)| acc.max(x.abs()).max(y.abs()));
    let heights = HeightField::sample(surface, cx, cy, half_extent, samples);

    let p = hit.point;
    let plane = |wx: f64, wy: f64| p.z - (n.x * (wx - p.x) + n.y * (wy - p.y)) / n.z;

    Ok(Field::from_fn(patch.mask.nrows(), patch.mask.ncols(), |r, c| {
        if patch.mask[(r, c)] <= 0.0 {
            return f64::NEG_INFINITY;
        }
        let wx = cx + patch.x[(r, c)];
        let wy = cy + patch.y[(r, c)];
        heights
            .lookup(wx, wy, sampling)
            .map_or(f64::NEG_INFINITY, |z| z - plane(wx, wy))
    }))
}

/// Offset interval over which the interpenetration volume rises from zero
/// past `volume`.
fn offset_bracket(gap: &Field, patch: &ContactPatch<'_>, volume: f64) -> Result<Bracket> {
    let mut area = 0.0;
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for (&g, &m) in gap.iter().zip(patch.mask.iter()) {
        if g.is_finite() {
            area += m;
            lo = lo.min(g);
            hi = hi.max(g);
        }
    }
    area *= patch.cell_area;
    if area <= 0.0 {
        return Err(SimError::NoSurface {
            x: patch.center.x,
            y: patch.center.y,
        });
    }
    // At the upper end every touching cell sinks by twice the mean depth.
    Ok(Bracket::new(-hi, -lo + 2.0 * volume / area)?)
}

/// Sum of `f(g + d) · mask · dA` over cells that can touch.
fn contact_integral(gap: &Field, patch: &ContactPatch<'_>, d: f64, f: impl Fn(f64) -> f64) -> f64 {
    let sum: f64 = gap
        .iter()
        .zip(patch.mask.iter())
        .filter(|(g, _)| g.is_finite())
        .map(|(&g, &m)| f(g + d) * m)
        .sum();
    sum * patch.cell_area
}

/// Elastic tool on a meshed surface.
///
/// `p = k · max(g + d, 0) · mask`, with `d` found by root finding on
/// `Σ p · dA = F`. Heights between patch samples are interpolated
/// bilinearly.
#[derive(Clone)]
pub struct MeshStiffness<Q = SharedSurface> {
    surface: Q,
    force: f64,
    stiffness: f64,
    samples: usize,
    settings: SolverSettings,
}

impl<Q: SurfaceQuery> MeshStiffness<Q> {
    /// Press a tool of stiffness `k` onto `surface`.
    pub fn new(surface: Q, stiffness: f64) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            surface,
            force: 0.0,
            stiffness: require_positive("stiffness", stiffness)?,
            samples: DEFAULT_PATCH_SAMPLES,
            settings: SolverSettings::default(),
        })
    }

    /// Samples per side of the height patch.
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Override solver tolerances.
    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The surface being pressed.
    pub fn surface(&self) -> &Q {
        &self.surface
    }

    /// Solve for the tool offset on `patch`.
    pub fn offset(&self, patch: &ContactPatch<'_>) -> Result<Option<(f64, Field)>> {
        if self.force <= 0.0 || patch.is_empty() {
            return Ok(None);
        }
        let gap = surface_gap(&self.surface, patch, self.samples, Sampling::Linear)?;
        let bracket = offset_bracket(&gap, patch, self.force / self.stiffness)?;

        let k = self.stiffness;
        let target = self.force;
        let load = |d: f64| contact_integral(&gap, patch, d, |h| k * h.max(0.0));
        let solution = brent_root(|d| load(d) - target, bracket, &self.settings)?;
        check_balance(load(solution.x), target, solution.iterations, &self.settings)?;
        debug!(
            d = solution.x,
            iterations = solution.iterations,
            "mesh stiffness contact solved"
        );
        Ok(Some((solution.x, gap)))
    }
}

impl<Q: SurfaceQuery> PressureModel for MeshStiffness<Q> {
    fn pressure(&self, patch: &ContactPatch<'_>) -> Result<Field> {
        let Some((d, gap)) = self.offset(patch)? else {
            return Ok(patch.zeros());
        };
        let k = self.stiffness;
        let h = gap.map(|g| if g.is_finite() { k * (g + d).max(0.0) } else { 0.0 });
        Ok(patch.masked(&h))
    }

    fn set_force(&mut self, force: f64) {
        self.force = force;
    }

    fn force(&self) -> f64 {
        self.force
    }

    fn requires_radius(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "mesh_stiffness"
    }
}

/// Rigid tool on a meshed surface.
///
/// The offset `d` makes the interpenetration volume `Σ max(g + d, 0) ·
/// mask · dA` equal `F / k`; the force is then spread uniformly over the
/// cells in contact. Heights come from the nearest patch sample.
#[derive(Clone)]
pub struct MeshVolume<Q = SharedSurface> {
    surface: Q,
    force: f64,
    stiffness: f64,
    samples: usize,
    settings: SolverSettings,
}

impl<Q: SurfaceQuery> MeshVolume<Q> {
    /// Press a rigid tool onto `surface`; `stiffness` relates force to
    /// interpenetration volume.
    pub fn new(surface: Q, stiffness: f64) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            surface,
            force: 0.0,
            stiffness: require_positive("stiffness", stiffness)?,
            samples: DEFAULT_PATCH_SAMPLES,
            settings: SolverSettings::default(),
        })
    }

    /// Samples per side of the height patch.
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Override solver tolerances.
    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The surface being pressed.
    pub fn surface(&self) -> &Q {
        &self.surface
    }
}

impl<Q: SurfaceQuery> PressureModel for MeshVolume<Q> {
    fn pressure(&self, patch: &ContactPatch<'_>) -> Result<Field> {
        if self.force <= 0.0 || patch.is_empty() {
            return Ok(patch.zeros());
        }
        let gap = surface_gap(&self.surface, patch, self.samples, Sampling::Nearest)?;
        let target = self.force / self.stiffness;
        let bracket = offset_bracket(&gap, patch, target)?;

        let volume = |d: f64| contact_integral(&gap, patch, d, |h| h.max(0.0));
        let solution = brent_root(|d| volume(d) - target, bracket, &self.settings)?;
        check_balance(volume(solution.x), target, solution.iterations, &self.settings)?;

        let d = solution.x;
        let in_contact = gap.map(|g| if g.is_finite() && g + d > 0.0 { 1.0 } else { 0.0 });
        let contact = patch.masked(&in_contact);
        let contact_area = integrate(&contact, patch.cell_area);
        debug!(d, contact_area, "mesh volume contact solved");
        if contact_area <= 0.0 {
            return Ok(patch.zeros());
        }
        let uniform = self.force / contact_area;
        Ok(contact.map(|m| uniform * m))
    }

    fn set_force(&mut self, force: f64) {
        self.force = force;
    }

    fn force(&self) -> f64 {
        self.force
    }

    fn requires_radius(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "mesh_volume"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::test_support::{local_grid, round_mask};
    use crate::shape::ToolGeometry;
    use approx::assert_relative_eq;
    use mrsim_mesh::TriangleSurface;
    use nalgebra::Point2;

    const STEP: f64 = 0.001;

    struct Fixture {
        x: Field,
        y: Field,
        mask: Field,
        geometry: ToolGeometry,
    }

    impl Fixture {
        fn new() -> Self {
            let (x, y) = local_grid(0.03, STEP);
            let (mask, geometry) = round_mask(0.025, &x, &y, STEP);
            Self { x, y, mask, geometry }
        }

        fn patch(&self, cx: f64, cy: f64) -> ContactPatch<'_> {
            ContactPatch {
                x: &self.x,
                y: &self.y,
                mask: &self.mask,
                geometry: self.geometry,
                cell_area: STEP * STEP,
                center: Point2::new(cx, cy),
            }
        }
    }

    fn surface(height: impl Fn(f64, f64) -> f64) -> TriangleSurface {
        TriangleSurface::from_height_fn([-0.2, -0.2, 0.2, 0.2], 81, 81, height).unwrap()
    }

    #[test]
    fn test_stiffness_flat_surface_is_uniform() {
        let fixture = Fixture::new();
        let patch = fixture.patch(0.01, -0.02);
        let mut model = MeshStiffness::new(surface(|_, _| 0.5), 1e7).unwrap();
        model.set_force(10.0);

        let p = model.pressure(&patch).unwrap();
        assert_relative_eq!(integrate(&p, patch.cell_area), 10.0, max_relative = 1e-6);
        let uniform = 10.0 / patch.mask_area();
        for (&p, &m) in p.iter().zip(fixture.mask.iter()) {
            assert_relative_eq!(p, uniform * m, max_relative = 1e-6, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_stiffness_tilted_plane_is_uniform() {
        let fixture = Fixture::new();
        let patch = fixture.patch(0.0, 0.0);
        let mut model = MeshStiffness::new(surface(|x, y| 0.1 * x + 0.2 * y), 1e7).unwrap();
        model.set_force(4.0);

        let p = model.pressure(&patch).unwrap();
        assert_relative_eq!(integrate(&p, patch.cell_area), 4.0, max_relative = 1e-6);
        let uniform = 4.0 / patch.mask_area();
        for (&p, &m) in p.iter().zip(fixture.mask.iter()) {
            assert_relative_eq!(p, uniform * m, max_relative = 1e-4, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_stiffness_dome_peaks_at_center() {
        let fixture = Fixture::new();
        let patch = fixture.patch(0.0, 0.0);
        let mut model = MeshStiffness::new(surface(|x, y| -(x * x + y * y)), 1e7).unwrap();
        model.set_force(2.0);

        let p = model.pressure(&patch).unwrap();
        assert_relative_eq!(integrate(&p, patch.cell_area), 2.0, max_relative = 1e-6);
        // Facets tilt the tangent plane slightly, so the peak may sit a few
        // cells off center.
        let (mut peak, mut at) = (0.0, (0, 0));
        for r in 0..p.nrows() {
            for c in 0..p.ncols() {
                if p[(r, c)] > peak {
                    peak = p[(r, c)];
                    at = (r, c);
                }
            }
        }
        assert!(at.0.abs_diff(30) <= 5 && at.1.abs_diff(30) <= 5);
        assert_eq!(p[(30, 52)], 0.0);
    }

    #[test]
    fn test_volume_uniform_over_contact() {
        let fixture = Fixture::new();
        let patch = fixture.patch(0.0, 0.0);
        let mut model = MeshVolume::new(surface(|x, y| -(x * x + y * y)), 1e9).unwrap();
        model.set_force(2.0);

        let p = model.pressure(&patch).unwrap();
        assert_relative_eq!(integrate(&p, patch.cell_area), 2.0, max_relative = 1e-9);
        let peak = p.max();
        for (&p, &m) in p.iter().zip(fixture.mask.iter()) {
            if p > 0.0 && m == 1.0 {
                assert_relative_eq!(p, peak, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_zero_outside_mask() {
        let fixture = Fixture::new();
        let patch = fixture.patch(0.0, 0.0);
        let dome = surface(|x, y| -(x * x + y * y));
        let mut stiff = MeshStiffness::new(&dome, 1e7).unwrap();
        let mut rigid = MeshVolume::new(&dome, 1e9).unwrap();
        stiff.set_force(3.0);
        rigid.set_force(3.0);
        let p1 = stiff.pressure(&patch).unwrap();
        let p2 = rigid.pressure(&patch).unwrap();
        for ((&a, &b), &m) in p1.iter().zip(p2.iter()).zip(fixture.mask.iter()) {
            if m == 0.0 {
                assert_eq!(a, 0.0);
                assert_eq!(b, 0.0);
            }
        }
    }

    #[test]
    fn test_no_surface_under_tool() {
        let fixture = Fixture::new();
        let patch = fixture.patch(5.0, 5.0);
        let empty = TriangleSurface::from_height_fn([-0.01, -0.01, 0.01, 0.01], 2, 2, |_, _| 0.0).unwrap();
        let mut model = MeshStiffness::new(&empty, 1e7).unwrap();
        model.set_force(1.0);
        // Nothing of the mesh lies under the tool footprint.
        let err = model.pressure(&patch).unwrap_err();
        assert!(matches!(err, SimError::NoSurface { .. }));
    }

    #[test]
    fn test_unloaded_is_zero() {
        let fixture = Fixture::new();
        let patch = fixture.patch(0.0, 0.0);
        let model = MeshVolume::new(surface(|_, _| 0.0), 1e9).unwrap();
        assert!(model.pressure(&patch).unwrap().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_requires_radius() {
        let model = MeshStiffness::new(surface(|_, _| 0.0), 1.0).unwrap();
        assert!(model.requires_radius());
        assert!(MeshVolume::new(surface(|_, _| 0.0), 0.0).is_err());
    }
}
