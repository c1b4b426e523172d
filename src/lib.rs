//! Warebot - reactive warehouse robot control
//!
//! This library drives an autonomous differential-drive robot through a
//! repeating pickup -> shelf -> delivery -> (charge) task cycle, using only
//! onboard position, heading, and proximity sensing. The core is a
//! fixed-rate control loop combining:
//! - Closed-loop heading control toward the current goal zone
//! - Reactive obstacle avoidance that overrides goal seeking
//! - Stall detection with a bounded, non-blocking recovery protocol
//! - A battery-aware task state machine that preempts for charging
//!
//! Sensors, actuators, task assignment, and telemetry are external
//! collaborators behind traits; the crate ships a kinematic simulation
//! harness and an offline assigner so the full cycle runs standalone.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod control;
pub mod geometry;
pub mod navigation;
pub mod sensors;
pub mod sim;
pub mod tasking;
pub mod telemetry;

// Re-export commonly used items for easier access
pub use control::{
    BatteryConfig, BatteryModel, Controller, ControllerConfig, ControllerError, Metrics,
    StallConfig, StallDetector, TaskContext, TaskState,
};
pub use geometry::{GroundPlane, GroundPoint, Pose, WarehouseLayout, Zone};
pub use navigation::{
    GoalNavigator, NavigationConfig, ObstacleConfig, ObstacleEvaluator, ObstacleReport,
    WheelSpeeds,
};
pub use sensors::{SensorConfig, SensorHub};
pub use tasking::{Assignment, LocalAssigner, TaskAssigner};
pub use telemetry::{CompletionReporter, TelemetrySink};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration for one robot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Robot identifier used in telemetry and assignment requests
    pub robot_id: String,
    /// Control-loop cadence settings
    pub controller: ControllerConfig,
    /// Goal navigation parameters
    pub navigation: NavigationConfig,
    /// Obstacle evaluator thresholds
    pub obstacles: ObstacleConfig,
    /// Battery model parameters
    pub battery: BatteryConfig,
    /// Stall detection and recovery tuning
    pub stall: StallConfig,
    /// Sensor boundary calibration
    pub sensors: SensorConfig,
    /// Fixed RNG seed for reproducible runs; entropy-seeded when absent
    pub rng_seed: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            robot_id: "warebot_1".to_string(),
            controller: ControllerConfig::default(),
            navigation: NavigationConfig::default(),
            obstacles: ObstacleConfig::default(),
            battery: BatteryConfig::default(),
            stall: StallConfig::default(),
            sensors: SensorConfig::default(),
            rng_seed: None,
        }
    }
}

impl BotConfig {
    /// Loads a configuration from a YAML file. Missing fields fall back to
    /// their defaults, so partial override files are fine.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config: BotConfig =
            serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field consistency the serde layer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sensors
            .ground_plane
            .validate()
            .map_err(ConfigError::Invalid)?;
        if self.navigation.max_speed <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max speed must be positive, got {}",
                self.navigation.max_speed
            )));
        }
        if self.navigation.cruise_speed > self.navigation.max_speed {
            return Err(ConfigError::Invalid(format!(
                "cruise speed {} exceeds max speed {}",
                self.navigation.cruise_speed, self.navigation.max_speed
            )));
        }
        Ok(())
    }
}

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    /// File could not be read
    Io(String),
    /// File is not valid YAML for a configuration
    Parse(String),
    /// Values are inconsistent
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config io error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
