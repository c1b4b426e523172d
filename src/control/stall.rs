// control/stall.rs

// Stall detection: a rolling counter of ticks without measurable
// displacement while the robot is supposed to be moving. Recovery policy
// (maneuvers, escalation) lives in the controller; this type only decides
// when a stall has happened.

use crate::geometry::GroundPoint;
use serde::{Deserialize, Serialize};

/// Stall detection and recovery tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StallConfig {
    /// Displacement per tick below which the robot counts as not moving
    pub min_motion: f64,
    /// Consecutive motionless ticks before a stall event fires
    pub window_ticks: u32,
    /// Recovery maneuvers tried before the task is abandoned
    pub max_recovery_attempts: u32,
    /// Ticks spent reversing during a recovery maneuver
    pub reverse_ticks: u32,
    /// Ticks spent pivot-turning during a recovery maneuver
    pub turn_ticks: u32,
    /// Reverse speed as a fraction of max speed
    pub reverse_speed_factor: f64,
    /// Pivot speed as a fraction of max speed
    pub turn_speed_factor: f64,
}

impl Default for StallConfig {
    fn default() -> Self {
        StallConfig {
            min_motion: 0.005,
            window_ticks: 250,
            max_recovery_attempts: 5,
            reverse_ticks: 40,
            turn_ticks: 30,
            reverse_speed_factor: 0.6,
            turn_speed_factor: 0.8,
        }
    }
}

/// Result of one tick of stall observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StallObservation {
    /// Ground distance moved since the previous tick (zero on the first)
    pub displacement: f64,
    /// A stall event fired this tick; the counter has been reset
    pub stalled: bool,
}

/// Rolling motionless-tick counter.
#[derive(Debug, Clone)]
pub struct StallDetector {
    config: StallConfig,
    counter: u32,
    last_position: Option<GroundPoint>,
}

impl StallDetector {
    /// Creates a detector with no position history.
    pub fn new(config: StallConfig) -> Self {
        StallDetector {
            config,
            counter: 0,
            last_position: None,
        }
    }

    /// Records this tick's position and reports displacement and stall.
    ///
    /// The counter only advances while `pursuing` is true (the robot is in a
    /// goal-seeking state); any tick with displacement at or above the
    /// minimum-motion threshold resets it. When the counter exceeds the
    /// window the event fires once and the counter restarts from zero.
    pub fn observe(&mut self, position: &GroundPoint, pursuing: bool) -> StallObservation {
        let displacement = match self.last_position {
            Some(last) => nalgebra::distance(&last, position),
            None => 0.0,
        };
        let had_history = self.last_position.is_some();
        self.last_position = Some(*position);

        if !had_history {
            return StallObservation {
                displacement,
                stalled: false,
            };
        }

        if pursuing && displacement < self.config.min_motion {
            self.counter += 1;
            if self.counter > self.config.window_ticks {
                self.counter = 0;
                return StallObservation {
                    displacement,
                    stalled: true,
                };
            }
        } else {
            self.counter = 0;
        }

        StallObservation {
            displacement,
            stalled: false,
        }
    }

    /// Current consecutive motionless tick count.
    pub fn counter(&self) -> u32 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> StallDetector {
        StallDetector::new(StallConfig::default())
    }

    #[test]
    fn first_observation_never_stalls() {
        let mut d = detector();
        let obs = d.observe(&GroundPoint::new(1.0, 1.0), true);
        assert_eq!(obs.displacement, 0.0);
        assert!(!obs.stalled);
    }

    #[test]
    fn motionless_window_fires_exactly_once() {
        let config = StallConfig::default();
        let mut d = StallDetector::new(config);
        let p = GroundPoint::new(0.0, 0.0);
        let mut events = 0;
        // First call primes the history, then window + 1 motionless ticks
        // are needed for one event.
        for _ in 0..=(config.window_ticks + 1) {
            if d.observe(&p, true).stalled {
                events += 1;
            }
        }
        assert_eq!(events, 1);
        assert_eq!(d.counter(), 0);
    }

    #[test]
    fn movement_resets_the_counter() {
        let mut d = detector();
        let p = GroundPoint::new(0.0, 0.0);
        d.observe(&p, true);
        for _ in 0..100 {
            d.observe(&p, true);
        }
        assert_eq!(d.counter(), 100);
        // A single tick of real motion clears the window
        d.observe(&GroundPoint::new(0.1, 0.0), true);
        assert_eq!(d.counter(), 0);
    }

    #[test]
    fn counter_holds_only_while_pursuing() {
        let mut d = detector();
        let p = GroundPoint::new(0.0, 0.0);
        d.observe(&p, true);
        for _ in 0..50 {
            d.observe(&p, true);
        }
        // Dwelling at a zone is not a stall
        d.observe(&p, false);
        assert_eq!(d.counter(), 0);
    }
}
