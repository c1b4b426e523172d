//! Kinematic simulation harness
//!
//! A minimal differential-drive world used by the demo binary and the
//! end-to-end tests: wheel commands integrate into a pose, and the pose is
//! read back through the same sensor traits real hardware would implement.
//! Heading zero points down the +z ground axis, matching the navigator's
//! `atan2(dx, dz)` heading convention.

use crate::geometry::{normalize_angle, Pose};
use crate::navigation::WheelSpeeds;
use crate::sensors::{
    HeadingProvider, MotorActuator, ObstacleSensorArray, PositionProvider, SensorError,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Simulated platform parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Drive wheel radius, in meters
    pub wheel_radius: f64,
    /// Distance between the drive wheels, in meters
    pub wheel_base: f64,
    /// Integration step, in seconds
    pub time_step_s: f64,
    /// Number of proximity sensors in the front ring
    pub sensor_count: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            wheel_radius: 0.0975,
            wheel_base: 0.33,
            time_step_s: 0.032,
            sensor_count: 8,
        }
    }
}

/// One robot's kinematic state.
#[derive(Debug, Clone)]
pub struct KinematicSim {
    config: SimConfig,
    pose: Pose,
    command: WheelSpeeds,
    proximity: Vec<f64>,
}

impl KinematicSim {
    /// Creates a simulated robot at the given pose with clear surroundings.
    pub fn new(config: SimConfig, initial_pose: Pose) -> Self {
        KinematicSim {
            proximity: vec![0.0; config.sensor_count],
            config,
            pose: initial_pose,
            command: WheelSpeeds::stop(),
        }
    }

    /// Integrates one time step of the last wheel command.
    pub fn step(&mut self) {
        let dt = self.config.time_step_s;
        let linear = self.config.wheel_radius * (self.command.left + self.command.right) / 2.0;
        let angular =
            self.config.wheel_radius * (self.command.right - self.command.left) / self.config.wheel_base;

        let heading = normalize_angle(self.pose.heading + angular * dt);
        let x = self.pose.position.x + linear * heading.sin() * dt;
        let z = self.pose.position.y + linear * heading.cos() * dt;
        self.pose = Pose::new(x, z, heading);
    }

    /// Current simulated pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Replaces the proximity readings, e.g. to stage an obstacle.
    pub fn set_proximity(&mut self, readings: Vec<f64>) {
        self.proximity = readings;
    }
}

/// Shared handle over a simulated robot, cloneable into each collaborator
/// slot of the sensor boundary.
#[derive(Clone)]
pub struct SharedSim(Arc<Mutex<KinematicSim>>);

impl SharedSim {
    /// Wraps a simulated robot for shared access.
    pub fn new(sim: KinematicSim) -> Self {
        SharedSim(Arc::new(Mutex::new(sim)))
    }

    /// Integrates one time step.
    pub fn step(&self) {
        self.0.lock().expect("sim state poisoned").step();
    }

    /// Current simulated pose.
    pub fn pose(&self) -> Pose {
        self.0.lock().expect("sim state poisoned").pose()
    }

    /// Replaces the proximity readings.
    pub fn set_proximity(&self, readings: Vec<f64>) {
        self.0
            .lock()
            .expect("sim state poisoned")
            .set_proximity(readings);
    }
}

impl PositionProvider for SharedSim {
    fn read(&mut self) -> Result<Vector3<f64>, SensorError> {
        let sim = self
            .0
            .lock()
            .map_err(|_| SensorError::Unavailable("sim state poisoned".to_string()))?;
        let p = sim.pose().position;
        // Raw fix is (lateral, height, forward), matching the default
        // ground-plane projection.
        Ok(Vector3::new(p.x, 0.0, p.y))
    }
}

impl HeadingProvider for SharedSim {
    fn read(&mut self) -> Result<f64, SensorError> {
        let sim = self
            .0
            .lock()
            .map_err(|_| SensorError::Unavailable("sim state poisoned".to_string()))?;
        Ok(sim.pose().heading)
    }
}

impl ObstacleSensorArray for SharedSim {
    fn read(&mut self) -> Result<Vec<f64>, SensorError> {
        let sim = self
            .0
            .lock()
            .map_err(|_| SensorError::Unavailable("sim state poisoned".to_string()))?;
        Ok(sim.proximity.clone())
    }
}

impl MotorActuator for SharedSim {
    fn set(&mut self, left: f64, right: f64) {
        if let Ok(mut sim) = self.0.lock() {
            sim.command = WheelSpeeds { left, right };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn heading_zero_drives_forward_along_z() {
        let mut sim = KinematicSim::new(SimConfig::default(), Pose::new(0.0, 0.0, 0.0));
        sim.command = WheelSpeeds {
            left: 3.0,
            right: 3.0,
        };
        for _ in 0..100 {
            sim.step();
        }
        let pose = sim.pose();
        assert_relative_eq!(pose.position.x, 0.0, epsilon = 1e-9);
        assert!(pose.position.y > 0.5);
        assert_relative_eq!(pose.heading, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn faster_right_wheel_increases_heading() {
        let mut sim = KinematicSim::new(SimConfig::default(), Pose::new(0.0, 0.0, 0.0));
        sim.command = WheelSpeeds {
            left: 1.0,
            right: 2.0,
        };
        sim.step();
        assert!(sim.pose().heading > 0.0);
    }

    #[test]
    fn stopped_robot_stays_put() {
        let start = Pose::new(1.0, -2.0, 0.5);
        let mut sim = KinematicSim::new(SimConfig::default(), start);
        for _ in 0..10 {
            sim.step();
        }
        assert_eq!(sim.pose(), start);
    }

    #[test]
    fn shared_handle_round_trips_commands() {
        let shared = SharedSim::new(KinematicSim::new(
            SimConfig::default(),
            Pose::new(0.0, 0.0, 0.0),
        ));
        let mut actuator = shared.clone();
        actuator.set(2.0, 2.0);
        shared.step();
        assert!(shared.pose().position.y > 0.0);
    }
}
