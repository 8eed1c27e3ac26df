//! Material removal laws.

use mrsim_math::{zip_map, Field};
use serde::{Deserialize, Serialize};

use crate::error::{require_finite, ConfigError};

/// Maps contact pressure and sliding speed to a removal rate.
pub trait RemovalLaw {
    /// Removal rate (depth per unit time) per cell.
    fn removal_rate(&self, pressure: &Field, velocity: &Field) -> Field;
}

/// Preston's law: `rate = kp · p · v`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preston {
    /// Preston coefficient.
    pub kp: f64,
}

impl Default for Preston {
    fn default() -> Self {
        Self { kp: 1.0 }
    }
}

impl Preston {
    /// Preston's law with coefficient `kp`.
    pub fn new(kp: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            kp: require_finite("kp", kp)?,
        })
    }
}

impl RemovalLaw for Preston {
    fn removal_rate(&self, pressure: &Field, velocity: &Field) -> Field {
        let kp = self.kp;
        zip_map(pressure, velocity, move |p, v| kp * p * v)
    }
}
