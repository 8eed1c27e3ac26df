//! Relative sliding speed between tool and workpiece.
//!
//! Each model combines its own tool motion with the feed velocity of the
//! tool center in quadrature, treating the components as independent.

use mrsim_math::{map, zip_map, Field};
use nalgebra::Vector2;

use crate::error::{require_finite, require_non_negative, ConfigError};

/// Sliding speed over the tool face.
pub trait VelocityModel {
    /// Speed at every cell of the tool-local grid, given the feed velocity.
    fn velocity(&self, x: &Field, y: &Field, feed: Vector2<f64>) -> Field;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Random-orbit sander: an eccentric orbit plus free rotation of the pad.
///
/// `v = sqrt((e·ωo)² + (x² + y²)·ωr² + |feed|²)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orbital {
    eccentricity: f64,
    orbital_speed: f64,
    rotational_speed: f64,
}

impl Orbital {
    /// A stationary orbital tool with the given eccentricity. Zero
    /// eccentricity leaves pure pad rotation.
    pub fn new(eccentricity: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            eccentricity: require_non_negative("eccentricity", eccentricity)?,
            orbital_speed: 0.0,
            rotational_speed: 0.0,
        })
    }

    /// Set the orbital and pad rotation speeds.
    pub fn set_speed(&mut self, orbital: f64, rotational: f64) -> Result<(), ConfigError> {
        let orbital = require_finite("orbital_speed", orbital)?;
        let rotational = require_finite("rotational_speed", rotational)?;
        self.orbital_speed = orbital;
        self.rotational_speed = rotational;
        Ok(())
    }

    /// Orbit eccentricity.
    pub fn eccentricity(&self) -> f64 {
        self.eccentricity
    }

    /// Orbital and rotational speeds.
    pub fn speed(&self) -> (f64, f64) {
        (self.orbital_speed, self.rotational_speed)
    }
}

impl VelocityModel for Orbital {
    fn velocity(&self, x: &Field, y: &Field, feed: Vector2<f64>) -> Field {
        let orbit = (self.eccentricity * self.orbital_speed).powi(2) + feed.norm_squared();
        let w2 = self.rotational_speed.powi(2);
        zip_map(x, y, move |x, y| (orbit + (x * x + y * y) * w2).sqrt())
    }

    fn name(&self) -> &'static str {
        "orbital"
    }
}

/// Belt sander: uniform speed over the face.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Belt {
    speed: f64,
}

impl Belt {
    /// A belt running at `speed`.
    pub fn new(speed: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            speed: require_finite("speed", speed)?,
        })
    }

    /// Set the belt speed.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), ConfigError> {
        self.speed = require_finite("speed", speed)?;
        Ok(())
    }

    /// Belt speed.
    pub fn speed(&self) -> f64 {
        self.speed
    }
}

impl VelocityModel for Belt {
    fn velocity(&self, x: &Field, _y: &Field, feed: Vector2<f64>) -> Field {
        let v = (self.speed.powi(2) + feed.norm_squared()).sqrt();
        map(x, move |_| v)
    }

    fn name(&self) -> &'static str {
        "belt"
    }
}

/// Rotary pad spinning about the tool center.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rotary {
    speed: f64,
}

impl Rotary {
    /// A pad spinning at angular `speed`.
    pub fn new(speed: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            speed: require_finite("speed", speed)?,
        })
    }

    /// Set the angular speed.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), ConfigError> {
        self.speed = require_finite("speed", speed)?;
        Ok(())
    }

    /// Angular speed.
    pub fn speed(&self) -> f64 {
        self.speed
    }
}

impl VelocityModel for Rotary {
    fn velocity(&self, x: &Field, y: &Field, feed: Vector2<f64>) -> Field {
        let f2 = feed.norm_squared();
        let w2 = self.speed.powi(2);
        zip_map(x, y, move |x, y| ((x * x + y * y) * w2 + f2).sqrt())
    }

    fn name(&self) -> &'static str {
        "rotary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> (Field, Field) {
        let x = Field::from_fn(5, 7, |_, i| -0.3 + i as f64 * 0.1);
        let y = Field::from_fn(5, 7, |j, _| -0.2 + j as f64 * 0.1);
        (x, y)
    }

    #[test]
    fn test_rotary_closed_form() {
        let (x, y) = grid();
        let rotary = Rotary::new(5.0).unwrap();
        let v = rotary.velocity(&x, &y, Vector2::new(4.0, 2.0));
        for ((&v, &x), &y) in v.iter().zip(x.iter()).zip(y.iter()) {
            assert_relative_eq!(v, ((x * x + y * y) * 25.0 + 16.0 + 4.0).sqrt(), max_relative = 1e-12);
        }
    }

    #[test]
    fn test_belt_uniform() {
        let (x, y) = grid();
        let mut belt = Belt::default();
        belt.set_speed(3.0).unwrap();
        let v = belt.velocity(&x, &y, Vector2::new(0.0, 4.0));
        assert!(v.iter().all(|&v| (v - 5.0).abs() < 1e-12));
        assert_eq!(v.shape(), x.shape());
    }

    #[test]
    fn test_orbital_closed_form() {
        let (x, y) = grid();
        let mut orbital = Orbital::new(0.005).unwrap();
        orbital.set_speed(600.0, 20.0).unwrap();
        assert_eq!(orbital.speed(), (600.0, 20.0));
        let v = orbital.velocity(&x, &y, Vector2::new(0.1, -0.2));
        for ((&v, &x), &y) in v.iter().zip(x.iter()).zip(y.iter()) {
            let expected =
                ((0.005f64 * 600.0).powi(2) + (x * x + y * y) * 400.0 + 0.01 + 0.04).sqrt();
            assert_relative_eq!(v, expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_stationary_tool_moves_with_feed() {
        let (x, y) = grid();
        let feed = Vector2::new(0.3, 0.4);
        let orbital = Orbital::new(0.01).unwrap();
        for v in [
            orbital.velocity(&x, &y, feed),
            Rotary::new(0.0).unwrap().velocity(&x, &y, feed),
            Belt::new(0.0).unwrap().velocity(&x, &y, feed),
        ] {
            assert!(v.iter().all(|&v| (v - 0.5).abs() < 1e-12));
        }
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(matches!(
            Orbital::new(-0.01),
            Err(ConfigError::InvalidParameter { name: "eccentricity", .. })
        ));
        assert!(Orbital::new(f64::NAN).is_err());
        assert!(matches!(
            Belt::new(f64::INFINITY),
            Err(ConfigError::InvalidParameter { name: "speed", .. })
        ));
        assert!(Rotary::new(f64::NAN).is_err());

        let mut rotary = Rotary::new(1.0).unwrap();
        assert!(rotary.set_speed(f64::NAN).is_err());
        assert_eq!(rotary.speed(), 1.0);
    }

    #[test]
    fn test_zero_eccentricity_is_pure_rotation() {
        let (x, y) = grid();
        let mut orbital = Orbital::new(0.0).unwrap();
        orbital.set_speed(600.0, 20.0).unwrap();
        let mut rotary = Rotary::new(20.0).unwrap();
        let feed = Vector2::new(0.1, 0.0);
        let expected = rotary.velocity(&x, &y, feed);
        for (&v, &e) in orbital.velocity(&x, &y, feed).iter().zip(expected.iter()) {
            assert_relative_eq!(v, e, max_relative = 1e-12);
        }
        rotary.set_speed(0.0).unwrap();
        assert_eq!(rotary.speed(), 0.0);
    }

    #[test]
    fn test_failed_speed_update_keeps_both_speeds() {
        let mut orbital = Orbital::new(0.005).unwrap();
        orbital.set_speed(600.0, 20.0).unwrap();
        assert!(matches!(
            orbital.set_speed(300.0, f64::NAN),
            Err(ConfigError::InvalidParameter { name: "rotational_speed", .. })
        ));
        assert_eq!(orbital.speed(), (600.0, 20.0));
    }
}
