//! # Target manager configuration
//!
//! All values are resolved once when the manager is created; nothing here is
//! hot-reloadable.
//!
//! ```toml
//! world_frame_id = "/world"
//! target_frame_id = "/target"
//! min_height = 0.4
//!
//! [trajectory]
//! safe_corridor_radius = 0.2
//! safe_point_count = 2
//! objective_derivative_order = 3
//! polynomial_order = 6
//! deviation_weight = 0.005
//! waypoints_are_soft_constraints = false
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Options handed unchanged to every trajectory fitting call
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrajectoryOptions {
    pub safe_corridor_radius: f64,
    pub safe_point_count: u32,
    pub objective_derivative_order: u32,
    pub polynomial_order: u32,
    pub deviation_weight: f64,
    pub waypoints_are_soft_constraints: bool,
}

impl Default for TrajectoryOptions {
    fn default() -> Self {
        Self {
            safe_corridor_radius: 0.2,
            safe_point_count: 2,
            objective_derivative_order: 3,
            polynomial_order: 6,
            deviation_weight: 0.005,
            waypoints_are_soft_constraints: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetManagerConfig {
    pub world_frame_id: String,
    pub target_frame_id: String,
    /// Height floor applied to exported waypoints
    pub min_height: f64,
    /// Time step (s) used to discretize the global path for publishing
    pub path_resolution: f64,
    pub trajectory: TrajectoryOptions,
}

impl Default for TargetManagerConfig {
    fn default() -> Self {
        Self {
            world_frame_id: "/world".to_string(),
            target_frame_id: "/target".to_string(),
            min_height: 0.4,
            path_resolution: 0.05,
            trajectory: TrajectoryOptions::default(),
        }
    }
}

impl TargetManagerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: TargetManagerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_frame_id.trim().is_empty() {
            return Err(ConfigError::Invalid("world_frame_id must not be empty".into()));
        }
        if self.target_frame_id.trim().is_empty() {
            return Err(ConfigError::Invalid("target_frame_id must not be empty".into()));
        }
        if self.world_frame_id == self.target_frame_id {
            return Err(ConfigError::Invalid(format!(
                "world and target frames are both '{}'",
                self.world_frame_id
            )));
        }
        if !self.min_height.is_finite() {
            return Err(ConfigError::Invalid("min_height must be finite".into()));
        }
        if !self.path_resolution.is_finite() || self.path_resolution <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "path_resolution must be positive, got {}",
                self.path_resolution
            )));
        }

        let traj = &self.trajectory;
        if traj.safe_corridor_radius < 0.0 {
            return Err(ConfigError::Invalid(
                "trajectory.safe_corridor_radius must be non-negative".into(),
            ));
        }
        if traj.deviation_weight < 0.0 {
            return Err(ConfigError::Invalid(
                "trajectory.deviation_weight must be non-negative".into(),
            ));
        }
        if traj.polynomial_order == 0 {
            return Err(ConfigError::Invalid(
                "trajectory.polynomial_order must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
