// control/battery.rs

// Battery model: monotonic drain while active, recovery while charging, and
// the critical threshold that preempts any in-progress task.

use serde::{Deserialize, Serialize};

/// Battery parameters, in percent and percent-per-tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    /// Charge level at startup
    pub initial_level: f64,
    /// Level subtracted every non-charging tick
    pub drain_rate: f64,
    /// Level added every charging tick
    pub charge_rate: f64,
    /// Below this level any active task is preempted for charging
    pub critical_threshold: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        BatteryConfig {
            initial_level: 100.0,
            drain_rate: 0.008,
            charge_rate: 0.3,
            critical_threshold: 15.0,
        }
    }
}

/// Running battery level, mutated once per tick.
#[derive(Debug, Clone)]
pub struct BatteryModel {
    level: f64,
    config: BatteryConfig,
}

impl BatteryModel {
    /// Creates a battery at the configured initial level.
    pub fn new(config: BatteryConfig) -> Self {
        BatteryModel {
            level: config.initial_level,
            config,
        }
    }

    /// Applies one tick of drain and returns the amount drained.
    ///
    /// The level is intentionally not clamped at zero: the reference platform
    /// behaves the same way, and a negative level is a visible signal in
    /// telemetry that the charging policy failed. Preemption is expected to
    /// keep the level well above this regime.
    pub fn drain(&mut self) -> f64 {
        self.level -= self.config.drain_rate;
        self.config.drain_rate
    }

    /// Applies one tick of charging, capped at 100.
    pub fn charge(&mut self) {
        self.level = (self.level + self.config.charge_rate).min(100.0);
    }

    /// Whether the level is below the critical threshold.
    pub fn is_critical(&self) -> bool {
        self.level < self.config.critical_threshold
    }

    /// Whether charging has completed.
    pub fn is_full(&self) -> bool {
        self.level >= 100.0
    }

    /// Current charge level in percent.
    pub fn level(&self) -> f64 {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn drain_lowers_level_by_rate() {
        let mut battery = BatteryModel::new(BatteryConfig::default());
        let drained = battery.drain();
        assert_relative_eq!(drained, 0.008);
        assert_relative_eq!(battery.level(), 99.992);
    }

    #[test]
    fn charge_clamps_at_one_hundred() {
        let mut battery = BatteryModel::new(BatteryConfig {
            initial_level: 99.8,
            ..BatteryConfig::default()
        });
        battery.charge();
        assert_relative_eq!(battery.level(), 100.0);
        assert!(battery.is_full());
        // Repeated charging never exceeds the cap
        for _ in 0..100 {
            battery.charge();
        }
        assert_relative_eq!(battery.level(), 100.0);
    }

    #[test]
    fn critical_is_strictly_below_threshold() {
        let config = BatteryConfig::default();
        let mut battery = BatteryModel::new(BatteryConfig {
            initial_level: config.critical_threshold,
            ..config
        });
        assert!(!battery.is_critical());
        battery.drain();
        assert!(battery.is_critical());
    }
}
