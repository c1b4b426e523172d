//! Sensor and actuator boundary for Warebot
//!
//! This module defines the collaborator contracts the controller consumes:
//! - Reading the raw 3D position fix and heading fix
//! - Reading the proximity sensor ring
//! - Commanding differential-drive wheel velocities
//!
//! Hardware (or the simulator) implements the traits; `SensorHub` wraps them
//! with the degrade-don't-fail policy: a transient sensor error falls back to
//! the last known value (or a zero default) and never propagates into the
//! control loop.

use crate::geometry::{GroundPlane, GroundPoint, Pose};
use log::warn;
use nalgebra::Vector3;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

/// Supplies the absolute 3D position fix each tick.
#[cfg_attr(test, automock)]
pub trait PositionProvider {
    /// Reads the current raw position vector.
    fn read(&mut self) -> Result<Vector3<f64>, SensorError>;
}

/// Supplies the absolute heading fix each tick.
#[cfg_attr(test, automock)]
pub trait HeadingProvider {
    /// Reads the current heading in radians.
    fn read(&mut self) -> Result<f64, SensorError>;
}

/// Supplies the ordered ring of raw proximity readings.
///
/// The returned slice is order-significant: the first half covers the
/// front-left arc, the second half the front-right arc. Larger values mean a
/// closer obstacle; zero means no reading.
#[cfg_attr(test, automock)]
pub trait ObstacleSensorArray {
    /// Reads the raw proximity values.
    fn read(&mut self) -> Result<Vec<f64>, SensorError>;
}

/// Accepts fire-and-forget wheel velocity commands, bounded by the platform's
/// maximum wheel speed.
#[cfg_attr(test, automock)]
pub trait MotorActuator {
    /// Commands the left and right wheel velocities.
    fn set(&mut self, left: f64, right: f64);
}

/// Sensor boundary errors. These are always recoverable: the hub degrades to
/// a default and the loop continues.
#[derive(Debug)]
pub enum SensorError {
    /// Device did not answer this tick
    Unavailable(String),
    /// Device answered with unusable data
    Invalid(String),
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SensorError::Unavailable(msg) => write!(f, "sensor unavailable: {}", msg),
            SensorError::Invalid(msg) => write!(f, "invalid sensor data: {}", msg),
        }
    }
}

impl std::error::Error for SensorError {}

/// Sensor boundary configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Which raw axes form the ground plane
    pub ground_plane: GroundPlane,
    /// Calibrated lateral offset subtracted from the position fix
    pub offset_x: f64,
    /// Calibrated forward offset subtracted from the position fix
    pub offset_z: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            ground_plane: GroundPlane::default(),
            offset_x: -0.0002,
            offset_z: -0.0002,
        }
    }
}

/// Wraps the raw providers and applies projection, calibration offsets, and
/// the last-known-value fallback policy.
pub struct SensorHub {
    position: Box<dyn PositionProvider>,
    heading: Box<dyn HeadingProvider>,
    obstacles: Box<dyn ObstacleSensorArray>,
    config: SensorConfig,
    last_pose: Option<Pose>,
}

impl SensorHub {
    /// Creates a hub over the given providers.
    pub fn new(
        position: Box<dyn PositionProvider>,
        heading: Box<dyn HeadingProvider>,
        obstacles: Box<dyn ObstacleSensorArray>,
        config: SensorConfig,
    ) -> Self {
        SensorHub {
            position,
            heading,
            obstacles,
            config,
            last_pose: None,
        }
    }

    /// Samples the current pose.
    ///
    /// On provider failure this returns the last good pose, or the origin
    /// pose if no fix has ever been received. The control loop always gets a
    /// usable pose.
    pub fn sample_pose(&mut self) -> Pose {
        let position = match self.position.read() {
            Ok(raw) => {
                let projected = self.config.ground_plane.project(&raw);
                GroundPoint::new(
                    projected.x - self.config.offset_x,
                    projected.y - self.config.offset_z,
                )
            }
            Err(e) => {
                warn!("Position fix failed, holding last known: {}", e);
                self.last_pose
                    .map(|p| p.position)
                    .unwrap_or_else(|| GroundPoint::new(0.0, 0.0))
            }
        };

        let heading = match self.heading.read() {
            Ok(angle) => angle,
            Err(e) => {
                warn!("Heading fix failed, holding last known: {}", e);
                self.last_pose.map(|p| p.heading).unwrap_or(0.0)
            }
        };

        let pose = Pose::new(position.x, position.y, heading);
        self.last_pose = Some(pose);
        pose
    }

    /// Samples the proximity ring. A failed read degrades to an empty slice,
    /// which the obstacle evaluator treats as all-clear.
    pub fn sample_obstacles(&mut self) -> Vec<f64> {
        match self.obstacles.read() {
            Ok(readings) => readings,
            Err(e) => {
                warn!("Proximity read failed, assuming clear: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hub_with(
        position: MockPositionProvider,
        heading: MockHeadingProvider,
        obstacles: MockObstacleSensorArray,
    ) -> SensorHub {
        SensorHub::new(
            Box::new(position),
            Box::new(heading),
            Box::new(obstacles),
            SensorConfig {
                ground_plane: GroundPlane::default(),
                offset_x: 0.0,
                offset_z: 0.0,
            },
        )
    }

    #[test]
    fn pose_is_projected_from_raw_fix() {
        let mut position = MockPositionProvider::new();
        position
            .expect_read()
            .returning(|| Ok(Vector3::new(1.0, 55.0, -2.0)));
        let mut heading = MockHeadingProvider::new();
        heading.expect_read().returning(|| Ok(0.25));
        let mut obstacles = MockObstacleSensorArray::new();
        obstacles.expect_read().returning(|| Ok(vec![0.0; 8]));

        let mut hub = hub_with(position, heading, obstacles);
        let pose = hub.sample_pose();
        assert_relative_eq!(pose.position.x, 1.0);
        assert_relative_eq!(pose.position.y, -2.0);
        assert_relative_eq!(pose.heading, 0.25);
    }

    #[test]
    fn failed_fix_degrades_to_last_known() {
        let mut position = MockPositionProvider::new();
        let mut seq = mockall::Sequence::new();
        position
            .expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Vector3::new(3.0, 0.0, 4.0)));
        position
            .expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(SensorError::Unavailable("gps".into())));
        let mut heading = MockHeadingProvider::new();
        heading.expect_read().returning(|| Ok(1.0));
        let mut obstacles = MockObstacleSensorArray::new();
        obstacles.expect_read().returning(|| Ok(Vec::new()));

        let mut hub = hub_with(position, heading, obstacles);
        let first = hub.sample_pose();
        let second = hub.sample_pose();
        assert_eq!(first.position, second.position);
    }

    #[test]
    fn failed_fix_with_no_history_reads_origin() {
        let mut position = MockPositionProvider::new();
        position
            .expect_read()
            .returning(|| Err(SensorError::Unavailable("gps".into())));
        let mut heading = MockHeadingProvider::new();
        heading
            .expect_read()
            .returning(|| Err(SensorError::Unavailable("compass".into())));
        let mut obstacles = MockObstacleSensorArray::new();
        obstacles
            .expect_read()
            .returning(|| Err(SensorError::Unavailable("sonar".into())));

        let mut hub = hub_with(position, heading, obstacles);
        let pose = hub.sample_pose();
        assert_relative_eq!(pose.position.x, 0.0);
        assert_relative_eq!(pose.position.y, 0.0);
        assert_relative_eq!(pose.heading, 0.0);
        assert!(hub.sample_obstacles().is_empty());
    }
}
