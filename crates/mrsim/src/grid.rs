//! Workpiece grid and tool state.

use mrsim_math::{map, Field};
use nalgebra::{Point2, Vector2};

use crate::error::{require_positive, ConfigError};

/// The discretized workpiece surface.
///
/// Coordinates are centered on the workpiece: column `i` sits at
/// `x = -size_x / 2 + i * dx`, row `j` at `y = -size_y / 2 + j * dy`.
#[derive(Debug, Clone)]
pub struct SurfaceGrid {
    x: Field,
    y: Field,
    dx: f64,
    dy: f64,
}

impl SurfaceGrid {
    /// Create a grid covering `size_x` by `size_y` with spacing `dx`, `dy`.
    pub fn new(size_x: f64, size_y: f64, dx: f64, dy: f64) -> Result<Self, ConfigError> {
        let size_x = require_positive("size_x", size_x)?;
        let size_y = require_positive("size_y", size_y)?;
        let dx = require_positive("dx", dx)?;
        let dy = require_positive("dy", dy)?;

        let nx = sample_count(size_x, dx);
        let ny = sample_count(size_y, dy);
        let x0 = -size_x / 2.0;
        let y0 = -size_y / 2.0;

        Ok(Self {
            x: Field::from_fn(ny, nx, |_, i| x0 + i as f64 * dx),
            y: Field::from_fn(ny, nx, |j, _| y0 + j as f64 * dy),
            dx,
            dy,
        })
    }

    /// X coordinate of every cell.
    pub fn x(&self) -> &Field {
        &self.x
    }

    /// Y coordinate of every cell.
    pub fn y(&self) -> &Field {
        &self.y
    }

    /// Spacing along X.
    pub fn dx(&self) -> f64 {
        self.dx
    }

    /// Spacing along Y.
    pub fn dy(&self) -> f64 {
        self.dy
    }

    /// Area represented by one cell.
    pub fn cell_area(&self) -> f64 {
        self.dx * self.dy
    }

    /// Length of a cell diagonal.
    pub fn diagonal(&self) -> f64 {
        self.dx.hypot(self.dy)
    }

    /// `(rows, columns)`, i.e. `(ny, nx)`.
    pub fn shape(&self) -> (usize, usize) {
        self.x.shape()
    }

    /// `[x_min, x_max, y_min, y_max]` over cell coordinates.
    pub fn extent(&self) -> [f64; 4] {
        [self.x.min(), self.x.max(), self.y.min(), self.y.max()]
    }

    /// Grid coordinates relative to a tool centered at `center`.
    pub fn local(&self, center: Point2<f64>) -> (Field, Field) {
        (map(&self.x, |x| x - center.x), map(&self.y, |y| y - center.y))
    }
}

/// Number of samples in `[-size/2, size/2)` with spacing `step`.
///
/// Quotients within round-off of an integer count as exact so that
/// `0.3 / 0.001` yields 300 cells rather than 301.
fn sample_count(size: f64, step: f64) -> usize {
    let raw = size / step;
    let nearest = raw.round();
    let count = if (raw - nearest).abs() <= 1e-9 * nearest.max(1.0) {
        nearest
    } else {
        raw.ceil()
    };
    (count as usize).max(1)
}

/// Position and feed velocity of the tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolState {
    location: Option<Point2<f64>>,
    velocity: Vector2<f64>,
    dt: f64,
    auto_velocity: bool,
}

impl ToolState {
    /// Create a tool with no location and zero velocity.
    pub fn new(dt: f64, auto_velocity: bool) -> Result<Self, ConfigError> {
        Ok(Self {
            location: None,
            velocity: Vector2::zeros(),
            dt: require_positive("dt", dt)?,
            auto_velocity,
        })
    }

    /// Move the tool center to `(x, y)`.
    ///
    /// With auto-velocity the feed becomes the backward difference
    /// `(new - old) / dt`; the first placement only seeds the position. The
    /// estimate therefore lags the true motion by one step. This is a known
    /// approximation and is kept as-is.
    pub fn set_location(&mut self, x: f64, y: f64) {
        let next = Point2::new(x, y);
        if self.auto_velocity {
            let previous = self.location.unwrap_or(next);
            self.velocity = (next - previous) / self.dt;
        }
        self.location = Some(next);
    }

    /// Override the feed velocity.
    ///
    /// Only meaningful without auto-velocity; the next `set_location` would
    /// overwrite it otherwise.
    pub fn set_velocity(&mut self, x: f64, y: f64) {
        self.velocity = Vector2::new(x, y);
    }

    /// Current tool center, if placed.
    pub fn location(&self) -> Option<Point2<f64>> {
        self.location
    }

    /// Current feed velocity.
    pub fn velocity(&self) -> Vector2<f64> {
        self.velocity
    }

    /// Timestep.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Whether the feed is derived from successive locations.
    pub fn auto_velocity(&self) -> bool {
        self.auto_velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_grid_shape() {
        let grid = SurfaceGrid::new(1.0, 2.0, 0.001, 0.001).unwrap();
        assert_eq!(grid.shape(), (2000, 1000));

        let grid = SurfaceGrid::new(4.0, 3.0, 0.005, 0.002).unwrap();
        assert_eq!(grid.shape(), (1500, 800));
    }

    #[test]
    fn test_grid_round_off_sizes() {
        let grid = SurfaceGrid::new(0.3, 0.1, 0.001, 0.001).unwrap();
        assert_eq!(grid.shape(), (100, 300));
    }

    #[test]
    fn test_grid_partial_cell() {
        // arange(-0.5, 0.5, 0.3) has 4 samples.
        let grid = SurfaceGrid::new(1.0, 1.0, 0.3, 0.3).unwrap();
        assert_eq!(grid.shape(), (4, 4));
    }

    #[test]
    fn test_grid_coordinates() {
        let grid = SurfaceGrid::new(1.0, 1.0, 0.002, 0.002).unwrap();
        assert_abs_diff_eq!(grid.x()[(0, 0)], -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(grid.x()[(0, 1)] - grid.x()[(0, 0)], 0.002, epsilon = 1e-12);
        assert_abs_diff_eq!(grid.y()[(1, 0)] - grid.y()[(0, 0)], 0.002, epsilon = 1e-12);
        assert_abs_diff_eq!(grid.x()[(7, 3)], grid.x()[(0, 3)], epsilon = 0.0);

        let [x_min, x_max, y_min, y_max] = grid.extent();
        assert_abs_diff_eq!(x_min, -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(x_max, 0.498, epsilon = 1e-12);
        assert_abs_diff_eq!(y_min, -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(y_max, 0.498, epsilon = 1e-12);
    }

    #[test]
    fn test_grid_rejects_bad_sizes() {
        assert!(matches!(
            SurfaceGrid::new(0.0, 1.0, 0.1, 0.1),
            Err(ConfigError::InvalidParameter { name: "size_x", .. })
        ));
        assert!(matches!(
            SurfaceGrid::new(1.0, 1.0, 0.1, f64::NAN),
            Err(ConfigError::InvalidParameter { name: "dy", .. })
        ));
    }

    #[test]
    fn test_local_grid() {
        let grid = SurfaceGrid::new(2.0, 1.0, 0.01, 0.01).unwrap();
        let (x, y) = grid.local(Point2::new(0.75, 0.25));
        assert_abs_diff_eq!(x, grid.x().map(|v| v - 0.75), epsilon = 1e-12);
        assert_abs_diff_eq!(y, grid.y().map(|v| v - 0.25), epsilon = 1e-12);
    }

    #[test]
    fn test_location_manual_velocity() {
        let mut tool = ToolState::new(1.0, false).unwrap();
        assert!(tool.location().is_none());
        tool.set_location(3.0, 4.0);
        assert_eq!(tool.location(), Some(Point2::new(3.0, 4.0)));
        assert_eq!(tool.velocity(), Vector2::zeros());

        tool.set_velocity(5.0, -1.0);
        tool.set_location(1.0, 1.0);
        assert_eq!(tool.velocity(), Vector2::new(5.0, -1.0));
    }

    #[test]
    fn test_auto_velocity() {
        let mut tool = ToolState::new(0.1, true).unwrap();
        tool.set_location(3.0, 6.0);
        assert_eq!(tool.velocity(), Vector2::zeros());

        tool.set_location(1.0, 7.0);
        assert_abs_diff_eq!(tool.velocity().x, -20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(tool.velocity().y, 10.0, epsilon = 1e-9);

        // Standing still brings the estimate back to zero one step later.
        tool.set_location(1.0, 7.0);
        assert_eq!(tool.velocity(), Vector2::zeros());
    }

    #[test]
    fn test_tool_rejects_bad_dt() {
        assert!(ToolState::new(0.0, false).is_err());
        assert!(ToolState::new(-1.0, true).is_err());
    }
}
