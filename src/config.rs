//! Runtime configuration for the boolean kernel.

use crate::float_types::{EPSILON, Real};
use thiserror::Error;

/// Tolerances threaded into every plane classification.
///
/// ```
/// use bsp_csg::config::CsgConfig;
/// let cfg = CsgConfig::new(1e-6).unwrap();
/// assert_eq!(cfg.epsilon, 1e-6);
/// assert!(CsgConfig::new(-1.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CsgConfig {
    /// Distance below which a point counts as lying on a plane.
    pub epsilon: Real,
}

impl CsgConfig {
    pub fn new(epsilon: Real) -> Result<Self, ConfigError> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(ConfigError::InvalidEpsilon(epsilon));
        }
        Ok(Self { epsilon })
    }
}

impl Default for CsgConfig {
    fn default() -> Self {
        Self { epsilon: EPSILON }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("epsilon must be finite and positive, got {0}")]
    InvalidEpsilon(Real),
}
