//! Error types for the simulation.

use mrsim_math::SolverError;
use thiserror::Error;

/// A simulation could not be assembled from its parameters.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required parameter was not given.
    #[error("{0} must be set")]
    MissingParameter(&'static str),

    /// A parameter is out of range or not finite.
    #[error("invalid {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// A pressure model that needs a tool radius was paired with another shape.
    #[error("{pressure} pressure requires a round tool, got {shape}")]
    RequiresRoundTool {
        /// Pressure model name.
        pressure: &'static str,
        /// Shape name.
        shape: &'static str,
    },

    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors raised while stepping or querying a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The tool has never been placed on the workpiece.
    #[error("tool location has not been set")]
    NoLocation,

    /// A contact equilibrium could not be solved.
    #[error("contact equilibrium failed: {0}")]
    Solver(#[from] SolverError),

    /// The surface query found nothing usable under the tool.
    #[error("no workpiece surface under the tool at ({x}, {y})")]
    NoSurface {
        /// Tool X position.
        x: f64,
        /// Tool Y position.
        y: f64,
    },

    /// The component does not accept this command.
    #[error("{component} does not support {command}")]
    UnsupportedCommand {
        /// Command name.
        command: &'static str,
        /// Component name.
        component: &'static str,
    },
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Check that `value` is finite and strictly positive.
pub(crate) fn require_positive(name: &'static str, value: f64) -> std::result::Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter { name, value })
    }
}

/// Check that `value` is finite and not negative.
pub(crate) fn require_non_negative(name: &'static str, value: f64) -> std::result::Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter { name, value })
    }
}

/// Check that `value` is finite.
pub(crate) fn require_finite(name: &'static str, value: f64) -> std::result::Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter { name, value })
    }
}
