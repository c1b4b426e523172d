//! Ground-plane geometry for Warebot
//!
//! The robot navigates on two horizontal axes of the simulated world; the
//! third axis is height and carries no task logic. Everything in this module
//! works on the projected 2D ground plane, and the projection itself is an
//! explicit, configurable conversion at the sensor boundary rather than
//! implicit indexing into raw sensor vectors.

mod zone;

pub use zone::{nearest_zone, WarehouseLayout, Zone};

use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A point on the warehouse ground plane (lateral x, forward z).
pub type GroundPoint = Point2<f64>;

/// Robot pose on the ground plane: position plus heading in radians,
/// wrapped to (-pi, pi].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Ground-plane position
    pub position: GroundPoint,
    /// Heading angle in radians
    pub heading: f64,
}

impl Pose {
    /// Creates a pose from raw coordinates, normalizing the heading.
    pub fn new(x: f64, z: f64, heading: f64) -> Self {
        Pose {
            position: GroundPoint::new(x, z),
            heading: normalize_angle(heading),
        }
    }
}

/// Wraps an angle into (-pi, pi].
pub fn normalize_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// World axis of a raw 3D sensor vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// First component of the raw vector
    X,
    /// Second component of the raw vector
    Y,
    /// Third component of the raw vector
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Which two axes of the raw position vector form the ground plane.
///
/// The warehouse world reports position as a 3D vector and the pair of
/// horizontal axes differs between simulator setups, so the projection is a
/// calibrated configuration value, not a hard-coded index pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundPlane {
    /// Axis mapped to the lateral (x) ground coordinate
    pub lateral: Axis,
    /// Axis mapped to the forward (z) ground coordinate
    pub forward: Axis,
}

impl Default for GroundPlane {
    fn default() -> Self {
        GroundPlane {
            lateral: Axis::X,
            forward: Axis::Z,
        }
    }
}

impl GroundPlane {
    /// Rejects degenerate configurations where both ground coordinates would
    /// read from the same world axis.
    pub fn validate(&self) -> Result<(), String> {
        if self.lateral == self.forward {
            return Err(format!(
                "ground plane axes must differ, got {:?}/{:?}",
                self.lateral, self.forward
            ));
        }
        Ok(())
    }

    /// Projects a raw 3D position vector onto the ground plane.
    pub fn project(&self, raw: &Vector3<f64>) -> GroundPoint {
        GroundPoint::new(raw[self.lateral.index()], raw[self.forward.index()])
    }
}
