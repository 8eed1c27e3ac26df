#![warn(missing_docs)]

//! Workpiece surface queries for mesh-based contact pressure.
//!
//! The simulation kernel never reads mesh files. It only needs three answers
//! about the workpiece surface near the tool, captured by [`SurfaceQuery`]:
//! the nearest surface point, the local normal there, and interpolated
//! heights over a neighborhood (via [`HeightField`]).
//!
//! [`TriangleSurface`] answers them for an in-memory triangle mesh.
//!
//! # Example
//!
//! ```
//! use mrsim_mesh::{SurfaceQuery, TriangleSurface};
//!
//! let vertices = [
//!     [-1.0, -1.0, 0.5],
//!     [1.0, -1.0, 0.5],
//!     [1.0, 1.0, 0.5],
//!     [-1.0, 1.0, 0.5],
//! ];
//! let surface = TriangleSurface::new(&vertices, &[0, 1, 2, 0, 2, 3], 0.5).unwrap();
//!
//! assert_eq!(surface.height(0.2, 0.3), Some(0.5));
//! let hit = surface.nearest(0.2, 0.3).unwrap();
//! assert!((hit.normal.z - 1.0).abs() < 1e-12);
//! ```

mod patch;
mod triangle;

pub use patch::{HeightField, Sampling};
pub use triangle::{Triangle, TriangleSurface};

use std::sync::Arc;

use nalgebra::{Point3, Vector3};
use thiserror::Error;

/// A point on the workpiece surface with its unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    /// Position on the surface.
    pub point: Point3<f64>,
    /// Unit normal, oriented with a non-negative Z component.
    pub normal: Vector3<f64>,
}

/// Read-only queries against a workpiece surface.
pub trait SurfaceQuery {
    /// The surface point closest to `(x, y)` in plan view.
    fn nearest(&self, x: f64, y: f64) -> Option<SurfacePoint>;

    /// Surface height at `(x, y)`, or `None` where there is no surface.
    fn height(&self, x: f64, y: f64) -> Option<f64>;
}

/// A surface handle that can be shared between simulations.
pub type SharedSurface = Arc<dyn SurfaceQuery + Send + Sync>;

impl<T: SurfaceQuery + ?Sized> SurfaceQuery for &T {
    fn nearest(&self, x: f64, y: f64) -> Option<SurfacePoint> {
        (**self).nearest(x, y)
    }

    fn height(&self, x: f64, y: f64) -> Option<f64> {
        (**self).height(x, y)
    }
}

impl<T: SurfaceQuery + ?Sized> SurfaceQuery for Box<T> {
    fn nearest(&self, x: f64, y: f64) -> Option<SurfacePoint> {
        (**self).nearest(x, y)
    }

    fn height(&self, x: f64, y: f64) -> Option<f64> {
        (**self).height(x, y)
    }
}

impl<T: SurfaceQuery + ?Sized> SurfaceQuery for Arc<T> {
    fn nearest(&self, x: f64, y: f64) -> Option<SurfacePoint> {
        (**self).nearest(x, y)
    }

    fn height(&self, x: f64, y: f64) -> Option<f64> {
        (**self).height(x, y)
    }
}

/// Errors building a mesh surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    /// Mesh has no triangles.
    #[error("mesh is empty")]
    EmptyMesh,

    /// Triangle index points past the vertex list.
    #[error("triangle index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index.
        index: u32,
        /// Number of vertices supplied.
        vertex_count: usize,
    },

    /// Spatial hash cell size must be positive and finite.
    #[error("invalid cell size: {0}")]
    InvalidCellSize(f64),
}
