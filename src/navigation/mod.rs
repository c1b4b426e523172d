//! Reactive goal navigation for Warebot
//!
//! Two layers run each tick, in strict priority order:
//! 1. Reactive obstacle avoidance: the proximity ring is collapsed into
//!    left/right/front threat levels, and a blocked front hard-overrides goal
//!    seeking with a fixed turn away from the obstructed side.
//! 2. Deliberative goal seeking: proportional-derivative heading control
//!    toward the goal center, with speed tiers that slow the robot down to
//!    turn and a soft-braking ramp near the goal.
//!
//! The output is always a clamped differential-drive wheel speed pair.

use crate::geometry::{normalize_angle, Pose, Zone};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Differential-drive wheel velocity command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSpeeds {
    /// Left wheel velocity
    pub left: f64,
    /// Right wheel velocity
    pub right: f64,
}

impl WheelSpeeds {
    /// The zero command: both wheels stopped.
    pub fn stop() -> Self {
        WheelSpeeds {
            left: 0.0,
            right: 0.0,
        }
    }
}

/// Obstacle evaluator configuration. Raw readings are unitless, larger means
/// closer; the linear mapping and thresholds come from the platform's sonar
/// characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleConfig {
    /// Readings below this value are treated as noise and ignored
    pub noise_floor: f64,
    /// Maximum raw reading the sensors can return
    pub reading_max: f64,
    /// Distance corresponding to a zero reading, in meters
    pub range_max: f64,
    /// Obstacles farther than this do not contribute threat
    pub min_safe_distance: f64,
    /// Cumulative side threat above which that side counts as obstructed
    pub side_threat_threshold: f64,
    /// Maximum single threat above which the front is not clear
    pub front_threat_threshold: f64,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        ObstacleConfig {
            noise_floor: 50.0,
            reading_max: 1024.0,
            range_max: 5.0,
            min_safe_distance: 0.8,
            side_threat_threshold: 0.5,
            front_threat_threshold: 0.3,
        }
    }
}

/// Aggregated obstacle picture for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleReport {
    /// Front-left arc is obstructed
    pub left_obstacle: bool,
    /// Front-right arc is obstructed
    pub right_obstacle: bool,
    /// No threat ahead worth overriding goal seeking for
    pub front_clear: bool,
}

impl ObstacleReport {
    /// An all-clear report.
    pub fn clear() -> Self {
        ObstacleReport {
            left_obstacle: false,
            right_obstacle: false,
            front_clear: true,
        }
    }
}

/// Collapses the ordered proximity ring into side and front threat levels.
///
/// Threat is cumulative per side rather than a single max reading, so several
/// simultaneously triggered sensors (a wall corner, a shelf leg cluster)
/// register more strongly than one marginal echo.
#[derive(Debug, Clone)]
pub struct ObstacleEvaluator {
    config: ObstacleConfig,
}

impl ObstacleEvaluator {
    /// Creates an evaluator with the given thresholds.
    pub fn new(config: ObstacleConfig) -> Self {
        ObstacleEvaluator { config }
    }

    /// Evaluates one tick of raw readings. The first half of the slice is the
    /// front-left arc, the second half the front-right arc. An empty slice
    /// reads as all-clear.
    pub fn evaluate(&self, readings: &[f64]) -> ObstacleReport {
        let (left_half, right_half) = readings.split_at(readings.len() / 2);

        let mut front_threat: f64 = 0.0;
        let left_threat = self.side_threat(left_half, &mut front_threat);
        let right_threat = self.side_threat(right_half, &mut front_threat);

        ObstacleReport {
            left_obstacle: left_threat > self.config.side_threat_threshold,
            right_obstacle: right_threat > self.config.side_threat_threshold,
            front_clear: front_threat < self.config.front_threat_threshold,
        }
    }

    fn side_threat(&self, readings: &[f64], front_threat: &mut f64) -> f64 {
        let mut cumulative = 0.0;
        for &value in readings {
            if value < self.config.noise_floor {
                continue;
            }
            let distance = self.config.range_max * (1.0 - value / self.config.reading_max);
            if distance < self.config.min_safe_distance {
                let threat = 1.0 - distance / self.config.min_safe_distance;
                cumulative += threat;
                *front_threat = front_threat.max(threat);
            }
        }
        cumulative
    }
}

/// Navigation controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Hard wheel speed limit
    pub max_speed: f64,
    /// Nominal straight-line cruise speed
    pub cruise_speed: f64,
    /// Distance between the drive wheels, in meters
    pub wheel_base: f64,
    /// Proportional gain on heading error
    pub kp_angular: f64,
    /// Derivative gain on heading error
    pub kd_angular: f64,
    /// Distance at which a goal counts as reached
    pub goal_tolerance: f64,
    /// Distance below which linear speed ramps down toward the goal
    pub brake_radius: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            max_speed: 5.24,
            cruise_speed: 3.0,
            wheel_base: 0.33,
            kp_angular: 2.0,
            kd_angular: 0.08,
            goal_tolerance: 0.5,
            brake_radius: 1.0,
        }
    }
}

/// Closed-loop heading controller producing wheel speeds toward a goal zone.
///
/// Owns the previous heading error for the derivative term; all other inputs
/// arrive fresh each call.
#[derive(Debug, Clone)]
pub struct GoalNavigator {
    config: NavigationConfig,
    previous_heading_error: f64,
}

impl GoalNavigator {
    /// Creates a navigator with zeroed derivative history.
    pub fn new(config: NavigationConfig) -> Self {
        GoalNavigator {
            config,
            previous_heading_error: 0.0,
        }
    }

    /// Computes the wheel command for this tick.
    ///
    /// Returns the stop command when there is no goal or the goal is already
    /// within tolerance. When the front is not clear the reactive turn takes
    /// over and the goal is ignored for the tick.
    pub fn steer(
        &mut self,
        pose: &Pose,
        goal: Option<&Zone>,
        obstacles: &ObstacleReport,
    ) -> WheelSpeeds {
        let Some(goal) = goal else {
            return WheelSpeeds::stop();
        };

        let distance = goal.distance_to(&pose.position);
        if distance < self.config.goal_tolerance {
            return WheelSpeeds::stop();
        }

        if !obstacles.front_clear {
            return self.avoidance_turn(obstacles);
        }

        self.seek(pose, goal, distance)
    }

    /// Fixed reactive turn away from the obstructed side, at reduced speed.
    fn avoidance_turn(&self, obstacles: &ObstacleReport) -> WheelSpeeds {
        let cruise = self.config.cruise_speed;
        if obstacles.left_obstacle && !obstacles.right_obstacle {
            WheelSpeeds {
                left: cruise * 0.6,
                right: -cruise * 0.6,
            }
        } else if obstacles.right_obstacle && !obstacles.left_obstacle {
            WheelSpeeds {
                left: -cruise * 0.6,
                right: cruise * 0.6,
            }
        } else {
            // Both sides obstructed (or a blocked front with neither side
            // dominant): spin in place in the default direction until a gap
            // opens.
            WheelSpeeds {
                left: -cruise * 0.4,
                right: cruise * 0.4,
            }
        }
    }

    /// Deliberative PD heading control toward the goal center.
    fn seek(&mut self, pose: &Pose, goal: &Zone, distance: f64) -> WheelSpeeds {
        let dx = goal.x - pose.position.x;
        let dz = goal.z - pose.position.y;
        let desired_heading = dx.atan2(dz);
        let heading_error = normalize_angle(desired_heading - pose.heading);

        let angular_velocity = self.config.kp_angular * heading_error
            + self.config.kd_angular * (heading_error - self.previous_heading_error);
        self.previous_heading_error = heading_error;

        // Slow down to turn: sharp heading errors get a reduced cruise speed
        // so the robot does not overshoot the arc.
        let mut linear_velocity = if heading_error.abs() > PI / 4.0 {
            self.config.cruise_speed * 0.5
        } else if heading_error.abs() > PI / 6.0 {
            self.config.cruise_speed * 0.7
        } else {
            self.config.cruise_speed
        };

        if distance < self.config.brake_radius {
            linear_velocity *= distance / self.config.brake_radius;
        }

        let half_base = self.config.wheel_base / 2.0;
        WheelSpeeds {
            left: (linear_velocity - angular_velocity * half_base)
                .clamp(-self.config.max_speed, self.config.max_speed),
            right: (linear_velocity + angular_velocity * half_base)
                .clamp(-self.config.max_speed, self.config.max_speed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn evaluator() -> ObstacleEvaluator {
        ObstacleEvaluator::new(ObstacleConfig::default())
    }

    #[test]
    fn empty_ring_reads_all_clear() {
        let report = evaluator().evaluate(&[]);
        assert!(report.front_clear);
        assert!(!report.left_obstacle);
        assert!(!report.right_obstacle);
    }

    #[test]
    fn noise_floor_readings_are_ignored() {
        let report = evaluator().evaluate(&[49.0, 49.0, 49.0, 49.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(report.front_clear);
    }

    #[test]
    fn close_readings_obstruct_their_side() {
        // 1000/1024 maps to ~0.12 m, well inside the safe distance.
        let report = evaluator().evaluate(&[1000.0, 1000.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(report.left_obstacle);
        assert!(!report.right_obstacle);
        assert!(!report.front_clear);
    }

    #[test]
    fn cumulative_threat_triggers_where_single_reading_would_not() {
        // Each reading alone is a marginal threat; four together cross the
        // side threshold.
        let marginal = 900.0; // ~0.61 m -> threat ~0.24
        let report =
            evaluator().evaluate(&[0.0, 0.0, 0.0, 0.0, marginal, marginal, marginal, marginal]);
        assert!(report.right_obstacle);
        assert!(!report.left_obstacle);
    }

    #[test]
    fn steer_without_goal_stops() {
        let mut nav = GoalNavigator::new(NavigationConfig::default());
        let pose = Pose::new(0.0, 0.0, 0.0);
        assert_eq!(
            nav.steer(&pose, None, &ObstacleReport::clear()),
            WheelSpeeds::stop()
        );
    }

    #[test]
    fn steer_inside_tolerance_stops() {
        let mut nav = GoalNavigator::new(NavigationConfig::default());
        let goal = Zone::new("g", 0.1, 0.1, 0.6);
        let pose = Pose::new(0.0, 0.0, 0.0);
        assert_eq!(
            nav.steer(&pose, Some(&goal), &ObstacleReport::clear()),
            WheelSpeeds::stop()
        );
    }

    #[test]
    fn straight_ahead_goal_drives_both_wheels_at_cruise() {
        let config = NavigationConfig::default();
        let mut nav = GoalNavigator::new(config);
        let goal = Zone::new("g", 0.0, 5.0, 0.6);
        let pose = Pose::new(0.0, 0.0, 0.0);
        let speeds = nav.steer(&pose, Some(&goal), &ObstacleReport::clear());
        assert_relative_eq!(speeds.left, config.cruise_speed, epsilon = 1e-9);
        assert_relative_eq!(speeds.right, config.cruise_speed, epsilon = 1e-9);
    }

    #[rstest]
    // error just over 45 degrees -> half cruise
    #[case(PI / 4.0 + 0.05, 0.5)]
    // error between 30 and 45 degrees -> 70% cruise
    #[case(PI / 5.0, 0.7)]
    // small error -> full cruise
    #[case(0.1, 1.0)]
    fn linear_speed_tiers_follow_heading_error(#[case] error: f64, #[case] factor: f64) {
        let config = NavigationConfig::default();
        let mut nav = GoalNavigator::new(config);
        // Goal straight down +z from origin; the pose heading supplies the
        // error.
        let goal = Zone::new("g", 0.0, 10.0, 0.6);
        let pose = Pose::new(0.0, 0.0, -error);
        let speeds = nav.steer(&pose, Some(&goal), &ObstacleReport::clear());
        let linear = (speeds.left + speeds.right) / 2.0;
        assert_relative_eq!(linear, config.cruise_speed * factor, epsilon = 1e-9);
    }

    #[test]
    fn soft_braking_scales_speed_near_goal() {
        let config = NavigationConfig::default();
        let mut nav = GoalNavigator::new(config);
        let goal = Zone::new("g", 0.0, 0.8, 0.6);
        let pose = Pose::new(0.0, 0.0, 0.0);
        let speeds = nav.steer(&pose, Some(&goal), &ObstacleReport::clear());
        let linear = (speeds.left + speeds.right) / 2.0;
        assert_relative_eq!(linear, config.cruise_speed * 0.8, epsilon = 1e-9);
    }

    #[test]
    fn blocked_front_ignores_goal_entirely() {
        let blocked = ObstacleReport {
            left_obstacle: true,
            right_obstacle: false,
            front_clear: false,
        };
        let pose = Pose::new(0.0, 0.0, 0.0);
        let near = Zone::new("near", 0.0, 2.0, 0.6);
        let far = Zone::new("far", -7.0, -9.0, 0.6);

        let mut nav_a = GoalNavigator::new(NavigationConfig::default());
        let mut nav_b = GoalNavigator::new(NavigationConfig::default());
        let a = nav_a.steer(&pose, Some(&near), &blocked);
        let b = nav_b.steer(&pose, Some(&far), &blocked);
        assert_eq!(a, b);
        // Turning away from the left obstruction
        assert!(a.left > 0.0 && a.right < 0.0);
    }

    #[test]
    fn both_sides_blocked_spins_in_default_direction() {
        let blocked = ObstacleReport {
            left_obstacle: true,
            right_obstacle: true,
            front_clear: false,
        };
        let mut nav = GoalNavigator::new(NavigationConfig::default());
        let pose = Pose::new(0.0, 0.0, 0.0);
        let goal = Zone::new("g", 3.0, 3.0, 0.6);
        let speeds = nav.steer(&pose, Some(&goal), &blocked);
        assert!(speeds.left < 0.0 && speeds.right > 0.0);
    }

    #[test]
    fn steer_is_deterministic_for_identical_state() {
        let pose = Pose::new(1.0, -2.0, 0.7);
        let goal = Zone::new("g", -3.0, 4.0, 0.6);
        let mut nav_a = GoalNavigator::new(NavigationConfig::default());
        let mut nav_b = GoalNavigator::new(NavigationConfig::default());
        assert_eq!(
            nav_a.steer(&pose, Some(&goal), &ObstacleReport::clear()),
            nav_b.steer(&pose, Some(&goal), &ObstacleReport::clear())
        );
    }

    #[test]
    fn wheel_speeds_are_clamped() {
        let config = NavigationConfig::default();
        let mut nav = GoalNavigator::new(config);
        // Goal directly behind: maximum heading error, large angular command.
        let goal = Zone::new("g", 0.0, -50.0, 0.6);
        let pose = Pose::new(0.0, 0.0, 0.0);
        let speeds = nav.steer(&pose, Some(&goal), &ObstacleReport::clear());
        assert!(speeds.left.abs() <= config.max_speed);
        assert!(speeds.right.abs() <= config.max_speed);
    }
}
