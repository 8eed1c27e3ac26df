//! Triangle-mesh workpiece surface with a 2D spatial hash.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

use crate::{MeshError, SurfacePoint, SurfaceQuery};

/// A mesh triangle with its supporting plane.
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Vertex positions.
    pub v: [Point3<f64>; 3],
    /// Unit normal, flipped so that Z is non-negative.
    pub normal: Vector3<f64>,
    /// Plane offset: `normal · p = d`.
    pub d: f64,
    /// Plan-view bounding box `[min_x, min_y, max_x, max_y]`.
    pub bbox: [f64; 4],
}

impl Triangle {
    /// Create a triangle from its vertices.
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        let n = (v1 - v0).cross(&(v2 - v0));
        let len = n.norm();
        let mut normal = if len > 1e-12 { n / len } else { Vector3::z() };
        if normal.z < 0.0 {
            normal = -normal;
        }
        let d = normal.dot(&v0.coords);

        let bbox = [
            v0.x.min(v1.x).min(v2.x),
            v0.y.min(v1.y).min(v2.y),
            v0.x.max(v1.x).max(v2.x),
            v0.y.max(v1.y).max(v2.y),
        ];

        Self {
            v: [v0, v1, v2],
            normal,
            d,
            bbox,
        }
    }

    /// Height of the triangle plane at `(x, y)`, `None` for vertical triangles.
    pub fn z_at_xy(&self, x: f64, y: f64) -> Option<f64> {
        if self.normal.z.abs() < 1e-10 {
            return None;
        }
        Some((self.d - self.normal.x * x - self.normal.y * y) / self.normal.z)
    }

    /// Whether `(x, y)` falls inside the triangle in plan view.
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        let [v0, v1, v2] = &self.v;
        let e1 = (v1.x - v0.x, v1.y - v0.y);
        let e2 = (v2.x - v0.x, v2.y - v0.y);
        let p = (x - v0.x, y - v0.y);

        let d00 = e1.0 * e1.0 + e1.1 * e1.1;
        let d01 = e1.0 * e2.0 + e1.1 * e2.1;
        let d11 = e2.0 * e2.0 + e2.1 * e2.1;
        let d20 = p.0 * e1.0 + p.1 * e1.1;
        let d21 = p.0 * e2.0 + p.1 * e2.1;

        let denom = d00 * d11 - d01 * d01;
        if denom.abs() < 1e-20 {
            return false;
        }

        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        let u = 1.0 - v - w;

        // Tolerate round-off on shared edges.
        let eps = -1e-9;
        u >= eps && v >= eps && w >= eps
    }

    /// Closest point of the triangle to `(x, y)` in plan view.
    pub fn closest_xy(&self, x: f64, y: f64) -> Point3<f64> {
        if self.contains_xy(x, y) {
            if let Some(z) = self.z_at_xy(x, y) {
                return Point3::new(x, y, z);
            }
        }

        let mut best = self.v[0];
        let mut best_dist = f64::INFINITY;
        for i in 0..3 {
            let p = closest_on_edge(x, y, self.v[i], self.v[(i + 1) % 3]);
            let dist = (p.x - x).powi(2) + (p.y - y).powi(2);
            if dist < best_dist {
                best_dist = dist;
                best = p;
            }
        }
        best
    }
}

/// Closest point on segment `a-b` to `(x, y)` in plan view, Z interpolated.
fn closest_on_edge(x: f64, y: f64, a: Point3<f64>, b: Point3<f64>) -> Point3<f64> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-20 {
        return a;
    }
    let t = (((x - a.x) * dx + (y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    a + (b - a) * t
}

/// A triangle mesh answering [`SurfaceQuery`] through a uniform plan-view grid.
#[derive(Debug, Clone)]
pub struct TriangleSurface {
    triangles: Vec<Triangle>,
    cell_size: f64,
    bounds: [f64; 4],
    grid_nx: usize,
    grid_ny: usize,
    cells: HashMap<(usize, usize), Vec<usize>>,
}

impl TriangleSurface {
    /// Build a surface from vertex positions and triangle indices.
    ///
    /// # Arguments
    ///
    /// * `vertices` - Vertex positions as `[x, y, z]`
    /// * `indices` - Triangle indices, three per triangle
    /// * `cell_size` - Edge length of the spatial hash cells
    pub fn new(vertices: &[[f64; 3]], indices: &[u32], cell_size: f64) -> Result<Self, MeshError> {
        if !(cell_size > 0.0 && cell_size.is_finite()) {
            return Err(MeshError::InvalidCellSize(cell_size));
        }

        let mut triangles = Vec::with_capacity(indices.len() / 3);
        for chunk in indices.chunks_exact(3) {
            let mut corners = [Point3::origin(); 3];
            for (corner, &index) in corners.iter_mut().zip(chunk) {
                let v = vertices.get(index as usize).ok_or(MeshError::IndexOutOfRange {
                    index,
                    vertex_count: vertices.len(),
                })?;
                *corner = Point3::new(v[0], v[1], v[2]);
            }
            triangles.push(Triangle::new(corners[0], corners[1], corners[2]));
        }
        if triangles.is_empty() {
            return Err(MeshError::EmptyMesh);
        }

        let mut bounds = [
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        ];
        for tri in &triangles {
            bounds[0] = bounds[0].min(tri.bbox[0]);
            bounds[1] = bounds[1].min(tri.bbox[1]);
            bounds[2] = bounds[2].max(tri.bbox[2]);
            bounds[3] = bounds[3].max(tri.bbox[3]);
        }
        let padding = cell_size * 0.1;
        bounds[0] -= padding;
        bounds[1] -= padding;
        bounds[2] += padding;
        bounds[3] += padding;

        let grid_nx = ((bounds[2] - bounds[0]) / cell_size).ceil() as usize + 1;
        let grid_ny = ((bounds[3] - bounds[1]) / cell_size).ceil() as usize + 1;

        let mut cells: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (tri_idx, tri) in triangles.iter().enumerate() {
            let x0 = ((tri.bbox[0] - bounds[0]) / cell_size).floor() as usize;
            let y0 = ((tri.bbox[1] - bounds[1]) / cell_size).floor() as usize;
            let x1 = ((tri.bbox[2] - bounds[0]) / cell_size).floor() as usize;
            let y1 = ((tri.bbox[3] - bounds[1]) / cell_size).floor() as usize;

            for iy in y0..=y1.min(grid_ny - 1) {
                for ix in x0..=x1.min(grid_nx - 1) {
                    cells.entry((ix, iy)).or_default().push(tri_idx);
                }
            }
        }

        Ok(Self {
            triangles,
            cell_size,
            bounds,
            grid_nx,
            grid_ny,
            cells,
        })
    }

    /// Build a surface by triangulating a regular grid of heights.
    ///
    /// `height(x, y)` is sampled on `nx * ny` nodes spanning `bounds`
    /// (`[min_x, min_y, max_x, max_y]`); each grid cell becomes two triangles.
    pub fn from_height_fn<F>(bounds: [f64; 4], nx: usize, ny: usize, height: F) -> Result<Self, MeshError>
    where
        F: Fn(f64, f64) -> f64,
    {
        if nx < 2 || ny < 2 {
            return Err(MeshError::EmptyMesh);
        }
        let step_x = (bounds[2] - bounds[0]) / (nx - 1) as f64;
        let step_y = (bounds[3] - bounds[1]) / (ny - 1) as f64;

        let mut vertices = Vec::with_capacity(nx * ny);
        for iy in 0..ny {
            for ix in 0..nx {
                let x = bounds[0] + ix as f64 * step_x;
                let y = bounds[1] + iy as f64 * step_y;
                vertices.push([x, y, height(x, y)]);
            }
        }

        let mut indices = Vec::with_capacity((nx - 1) * (ny - 1) * 6);
        for iy in 0..ny - 1 {
            for ix in 0..nx - 1 {
                let i00 = (iy * nx + ix) as u32;
                let i10 = i00 + 1;
                let i01 = i00 + nx as u32;
                let i11 = i01 + 1;
                indices.extend_from_slice(&[i00, i10, i11, i00, i11, i01]);
            }
        }

        Self::new(&vertices, &indices, 2.0 * step_x.max(step_y))
    }

    /// Triangles whose plan-view boxes may overlap the square around `(x, y)`.
    pub fn query_circle(&self, x: f64, y: f64, radius: f64) -> Vec<usize> {
        let x0 = ((x - radius - self.bounds[0]) / self.cell_size).floor() as isize;
        let y0 = ((y - radius - self.bounds[1]) / self.cell_size).floor() as isize;
        let x1 = ((x + radius - self.bounds[0]) / self.cell_size).floor() as isize;
        let y1 = ((y + radius - self.bounds[1]) / self.cell_size).floor() as isize;

        let mut result = Vec::new();
        for iy in y0.max(0)..=y1.min(self.grid_ny as isize - 1) {
            for ix in x0.max(0)..=x1.min(self.grid_nx as isize - 1) {
                if let Some(indices) = self.cells.get(&(ix as usize, iy as usize)) {
                    result.extend_from_slice(indices);
                }
            }
        }
        result.sort_unstable();
        result.dedup();
        result
    }

    /// Get a triangle by index.
    pub fn triangle(&self, idx: usize) -> &Triangle {
        &self.triangles[idx]
    }

    /// All triangles.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Padded plan-view bounds `[min_x, min_y, max_x, max_y]`.
    pub fn bounds(&self) -> [f64; 4] {
        self.bounds
    }

    /// Topmost triangle covering `(x, y)` and its height there.
    fn top_at(&self, x: f64, y: f64) -> Option<(usize, f64)> {
        self.query_circle(x, y, 0.0)
            .into_iter()
            .filter(|&idx| self.triangles[idx].contains_xy(x, y))
            .filter_map(|idx| self.triangles[idx].z_at_xy(x, y).map(|z| (idx, z)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }
}

impl SurfaceQuery for TriangleSurface {
    fn nearest(&self, x: f64, y: f64) -> Option<SurfacePoint> {
        if let Some((idx, z)) = self.top_at(x, y) {
            return Some(SurfacePoint {
                point: Point3::new(x, y, z),
                normal: self.triangles[idx].normal,
            });
        }

        // Off the mesh: widen the search until the best hit is provably nearest.
        let outside_x = (self.bounds[0] - x).max(x - self.bounds[2]).max(0.0);
        let outside_y = (self.bounds[1] - y).max(y - self.bounds[3]).max(0.0);
        let reach = (outside_x + self.bounds[2] - self.bounds[0])
            .hypot(outside_y + self.bounds[3] - self.bounds[1]);

        let mut radius = self.cell_size;
        loop {
            let best = self
                .query_circle(x, y, radius)
                .into_iter()
                .map(|idx| {
                    let p = self.triangles[idx].closest_xy(x, y);
                    (idx, p, (p.x - x).hypot(p.y - y))
                })
                .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

            match best {
                Some((idx, point, dist)) if dist <= radius || radius > reach => {
                    return Some(SurfacePoint {
                        point,
                        normal: self.triangles[idx].normal,
                    });
                }
                _ if radius > reach => return None,
                _ => radius *= 2.0,
            }
        }
    }

    fn height(&self, x: f64, y: f64) -> Option<f64> {
        self.top_at(x, y).map(|(_, z)| z)
    }
}
