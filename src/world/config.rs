//! World configuration.

use serde::{Deserialize, Serialize};

use crate::error::KinematicError;
use crate::transform::EPSILON;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Tolerance absorbing floating accumulation, in radians or metres.
    pub epsilon: f64,
    /// A hinge stops at a limit once it is within
    /// `epsilon * speed * limit_tolerance_scale` of it.
    pub limit_tolerance_scale: f64,
    /// Move auxiliary-parent followers every step.
    pub follow_auxiliary_parents: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            epsilon: EPSILON,
            limit_tolerance_scale: 10.0,
            follow_auxiliary_parents: true,
        }
    }
}

impl WorldConfig {
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    #[must_use]
    pub fn with_limit_tolerance_scale(mut self, scale: f64) -> Self {
        self.limit_tolerance_scale = scale;
        self
    }

    #[must_use]
    pub fn without_auxiliary_parents(mut self) -> Self {
        self.follow_auxiliary_parents = false;
        self
    }

    pub fn validate(&self) -> Result<(), KinematicError> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(KinematicError::invalid_config(
                "epsilon must be positive and finite",
            ));
        }
        if !self.limit_tolerance_scale.is_finite() || self.limit_tolerance_scale < 0.0 {
            return Err(KinematicError::invalid_config(
                "limit_tolerance_scale cannot be negative",
            ));
        }
        Ok(())
    }
}
