//! Regular height samples over a small patch of the surface.

use serde::{Deserialize, Serialize};

use crate::SurfaceQuery;

/// How a [`HeightField`] is read between its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Value of the closest sample.
    Nearest,
    /// Bilinear blend of the four surrounding samples.
    Linear,
}

/// A 2D grid of surface heights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightField {
    /// Number of samples in X direction.
    pub nx: usize,
    /// Number of samples in Y direction.
    pub ny: usize,
    /// Bounding box [min_x, min_y, max_x, max_y].
    pub bounds: [f64; 4],
    /// Heights, row-major (Y outer, X inner); `None` where there is no surface.
    pub heights: Vec<Option<f64>>,
}

impl HeightField {
    /// Create a height field with every sample set to `initial`.
    pub fn new(nx: usize, ny: usize, bounds: [f64; 4], initial: Option<f64>) -> Self {
        Self {
            nx,
            ny,
            bounds,
            heights: vec![initial; nx * ny],
        }
    }

    /// Sample `surface` on an `n * n` grid covering the square of half-width
    /// `half_extent` centered at `(cx, cy)`.
    pub fn sample<Q: SurfaceQuery + ?Sized>(
        surface: &Q,
        cx: f64,
        cy: f64,
        half_extent: f64,
        n: usize,
    ) -> Self {
        let n = n.max(2);
        let bounds = [
            cx - half_extent,
            cy - half_extent,
            cx + half_extent,
            cy + half_extent,
        ];
        let mut field = Self::new(n, n, bounds, None);
        for iy in 0..n {
            for ix in 0..n {
                let (x, y) = field.xy_at(ix, iy);
                field.set(ix, iy, surface.height(x, y));
            }
        }
        field
    }

    /// Spacing between samples in X.
    pub fn dx(&self) -> f64 {
        if self.nx <= 1 {
            0.0
        } else {
            (self.bounds[2] - self.bounds[0]) / (self.nx - 1) as f64
        }
    }

    /// Spacing between samples in Y.
    pub fn dy(&self) -> f64 {
        if self.ny <= 1 {
            0.0
        } else {
            (self.bounds[3] - self.bounds[1]) / (self.ny - 1) as f64
        }
    }

    /// Coordinates of sample `(ix, iy)`.
    pub fn xy_at(&self, ix: usize, iy: usize) -> (f64, f64) {
        (
            self.bounds[0] + ix as f64 * self.dx(),
            self.bounds[1] + iy as f64 * self.dy(),
        )
    }

    /// Height of sample `(ix, iy)`.
    pub fn get(&self, ix: usize, iy: usize) -> Option<f64> {
        self.heights[iy * self.nx + ix]
    }

    /// Set the height of sample `(ix, iy)`.
    pub fn set(&mut self, ix: usize, iy: usize, z: Option<f64>) {
        self.heights[iy * self.nx + ix] = z;
    }

    /// Read the field at `(x, y)`; `None` outside the bounds or where a
    /// required sample has no surface.
    pub fn lookup(&self, x: f64, y: f64, sampling: Sampling) -> Option<f64> {
        match sampling {
            Sampling::Nearest => self.nearest(x, y),
            Sampling::Linear => self.interpolate(x, y),
        }
    }

    /// Value of the sample closest to `(x, y)`.
    pub fn nearest(&self, x: f64, y: f64) -> Option<f64> {
        let (fx, fy) = self.fractional_index(x, y)?;
        let ix = (fx.round() as usize).min(self.nx - 1);
        let iy = (fy.round() as usize).min(self.ny - 1);
        self.get(ix, iy)
    }

    /// Bilinear interpolation at `(x, y)`.
    pub fn interpolate(&self, x: f64, y: f64) -> Option<f64> {
        let (fx, fy) = self.fractional_index(x, y)?;

        let ix0 = (fx.floor() as usize).min(self.nx - 1);
        let iy0 = (fy.floor() as usize).min(self.ny - 1);
        let ix1 = (ix0 + 1).min(self.nx - 1);
        let iy1 = (iy0 + 1).min(self.ny - 1);

        let tx = fx - ix0 as f64;
        let ty = fy - iy0 as f64;

        let z00 = self.get(ix0, iy0)?;
        let z10 = self.get(ix1, iy0)?;
        let z01 = self.get(ix0, iy1)?;
        let z11 = self.get(ix1, iy1)?;

        let z0 = z00 * (1.0 - tx) + z10 * tx;
        let z1 = z01 * (1.0 - tx) + z11 * tx;
        Some(z0 * (1.0 - ty) + z1 * ty)
    }

    fn fractional_index(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if self.nx == 0
            || self.ny == 0
            || x < self.bounds[0]
            || x > self.bounds[2]
            || y < self.bounds[1]
            || y > self.bounds[3]
        {
            return None;
        }
        let dx = self.dx();
        let dy = self.dy();
        let fx = if dx > 0.0 { (x - self.bounds[0]) / dx } else { 0.0 };
        let fy = if dy > 0.0 { (y - self.bounds[1]) / dy } else { 0.0 };
        Some((fx, fy))
    }
}
