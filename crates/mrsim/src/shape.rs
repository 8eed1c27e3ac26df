//! Tool footprints and contact masks.
//!
//! A [`Shape`] turns tool-local coordinates into a contact weight per cell.
//! Weights are 1 well inside the footprint, 0 well outside, and ramp
//! linearly across a band of width [`Antialias::distance`] centered on the
//! boundary.

use std::f64::consts::PI;

use mrsim_math::{zip_map, Field};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{require_positive, ConfigError};

/// Boundary smoothing of a contact mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Antialias {
    /// Blend boundary cells instead of cutting them off.
    pub enabled: bool,
    /// Width of the blend band. `None` uses the grid cell diagonal.
    pub distance: Option<f64>,
}

impl Default for Antialias {
    fn default() -> Self {
        Self {
            enabled: true,
            distance: None,
        }
    }
}

impl Antialias {
    /// A hard-edged mask.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            distance: None,
        }
    }

    /// Blend over a band of the given width.
    pub fn with_distance(distance: f64) -> Self {
        Self {
            enabled: true,
            distance: Some(distance),
        }
    }

    /// Fill in the default band width from the grid diagonal.
    pub fn resolve(&mut self, diagonal: f64) {
        if self.distance.is_none() {
            self.distance = Some(diagonal);
        }
        if self.enabled && self.distance.map_or(true, |d| !(d > 0.0)) {
            warn!(distance = ?self.distance, "antialias distance is not positive, using a hard edge");
        }
    }

    /// Contact weight for an inside-positive signed distance to the boundary.
    pub fn weight(&self, signed_distance: f64) -> f64 {
        match self.distance {
            Some(d) if self.enabled && d > 0.0 => (0.5 + signed_distance / d).clamp(0.0, 1.0),
            _ => {
                if signed_distance >= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Derived footprint properties, consistent with the current dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolGeometry {
    /// Footprint area.
    pub area: f64,
    /// Second moment of area about the X axis.
    pub ix: f64,
    /// Second moment of area about the Y axis.
    pub iy: f64,
    /// Radius, for round tools only.
    pub radius: Option<f64>,
}

impl ToolGeometry {
    /// Disc of radius `r`.
    pub fn round(r: f64) -> Self {
        let moment = PI * r.powi(4) / 4.0;
        Self {
            area: PI * r * r,
            ix: moment,
            iy: moment,
            radius: Some(r),
        }
    }

    /// Rectangle `w` wide (along X) and `h` high (along Y).
    pub fn rectangular(w: f64, h: f64) -> Self {
        Self {
            area: w * h,
            ix: w * h.powi(3) / 12.0,
            iy: w.powi(3) * h / 12.0,
            radius: None,
        }
    }
}

/// A tool footprint.
pub trait Shape {
    /// Current area, second moments and radius.
    fn geometry(&self) -> ToolGeometry;

    /// Contact weight in `[0, 1]` for each cell of the tool-local grid.
    fn shape(&self, x: &Field, y: &Field) -> Field;

    /// Boundary smoothing settings.
    fn antialias(&self) -> &Antialias;

    /// Mutable boundary smoothing settings.
    fn antialias_mut(&mut self) -> &mut Antialias;

    /// Tool radius, if this is a round tool.
    fn radius(&self) -> Option<f64> {
        self.geometry().radius
    }

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Circular tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    radius: f64,
    geometry: ToolGeometry,
    antialias: Antialias,
}

impl Round {
    /// Create a round tool of the given radius.
    pub fn new(radius: f64) -> Result<Self, ConfigError> {
        let radius = require_positive("radius", radius)?;
        Ok(Self {
            radius,
            geometry: ToolGeometry::round(radius),
            antialias: Antialias::default(),
        })
    }

    /// Replace the antialias settings.
    pub fn with_antialias(mut self, antialias: Antialias) -> Self {
        self.antialias = antialias;
        self
    }

    /// Change the radius.
    pub fn set_radius(&mut self, radius: f64) -> Result<(), ConfigError> {
        self.radius = require_positive("radius", radius)?;
        self.geometry = ToolGeometry::round(self.radius);
        Ok(())
    }
}

impl Shape for Round {
    fn geometry(&self) -> ToolGeometry {
        self.geometry
    }

    fn shape(&self, x: &Field, y: &Field) -> Field {
        let r = self.radius;
        let aa = self.antialias;
        zip_map(x, y, move |x, y| aa.weight(r - x.hypot(y)))
    }

    fn antialias(&self) -> &Antialias {
        &self.antialias
    }

    fn antialias_mut(&mut self) -> &mut Antialias {
        &mut self.antialias
    }

    fn name(&self) -> &'static str {
        "round"
    }
}

/// Axis-aligned rectangular tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectangular {
    width: f64,
    height: f64,
    geometry: ToolGeometry,
    antialias: Antialias,
}

impl Rectangular {
    /// Create a rectangular tool.
    pub fn new(width: f64, height: f64) -> Result<Self, ConfigError> {
        let width = require_positive("width", width)?;
        let height = require_positive("height", height)?;
        Ok(Self {
            width,
            height,
            geometry: ToolGeometry::rectangular(width, height),
            antialias: Antialias::default(),
        })
    }

    /// Replace the antialias settings.
    pub fn with_antialias(mut self, antialias: Antialias) -> Self {
        self.antialias = antialias;
        self
    }

    /// Change both dimensions.
    pub fn set_size(&mut self, width: f64, height: f64) -> Result<(), ConfigError> {
        let width = require_positive("width", width)?;
        let height = require_positive("height", height)?;
        self.width = width;
        self.height = height;
        self.geometry = ToolGeometry::rectangular(width, height);
        Ok(())
    }

    /// Extent along X.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Extent along Y.
    pub fn height(&self) -> f64 {
        self.height
    }
}

impl Shape for Rectangular {
    fn geometry(&self) -> ToolGeometry {
        self.geometry
    }

    fn shape(&self, x: &Field, y: &Field) -> Field {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        let aa = self.antialias;
        zip_map(x, y, move |x, y| {
            aa.weight(hw + x) * aa.weight(hw - x) * aa.weight(hh + y) * aa.weight(hh - y)
        })
    }

    fn antialias(&self) -> &Antialias {
        &self.antialias
    }

    fn antialias_mut(&mut self) -> &mut Antialias {
        &mut self.antialias
    }

    fn name(&self) -> &'static str {
        "rectangular"
    }
}

/// Square tool: a rectangle whose sides stay equal.
#[derive(Debug, Clone, PartialEq)]
pub struct Square {
    inner: Rectangular,
}

impl Square {
    /// Create a square tool with side `width`.
    pub fn new(width: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: Rectangular::new(width, width)?,
        })
    }

    /// Replace the antialias settings.
    pub fn with_antialias(mut self, antialias: Antialias) -> Self {
        self.inner.antialias = antialias;
        self
    }

    /// Change the side length.
    pub fn set_size(&mut self, width: f64) -> Result<(), ConfigError> {
        self.inner.set_size(width, width)
    }

    /// Side length.
    pub fn width(&self) -> f64 {
        self.inner.width
    }
}

impl Shape for Square {
    fn geometry(&self) -> ToolGeometry {
        self.inner.geometry
    }

    fn shape(&self, x: &Field, y: &Field) -> Field {
        self.inner.shape(x, y)
    }

    fn antialias(&self) -> &Antialias {
        self.inner.antialias()
    }

    fn antialias_mut(&mut self) -> &mut Antialias {
        self.inner.antialias_mut()
    }

    fn name(&self) -> &'static str {
        "square"
    }
}
