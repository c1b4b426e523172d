// geometry/zone.rs

// Circular zones of interest (pickup, shelf, delivery, charger) and the
// calibrated warehouse layout. Zone records mirror the calibration output
// format so a layout file produced by the calibration run loads directly.

use super::GroundPoint;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A circular inclusion region on the ground plane.
///
/// A position is inside the zone iff its 2D Euclidean distance to the center
/// is strictly less than the radius. Height is never consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone identifier, e.g. `pickup_A`
    pub id: String,
    /// Lateral center coordinate
    pub x: f64,
    /// Forward center coordinate
    pub z: f64,
    /// Inclusion radius, must be positive
    pub radius: f64,
}

impl Zone {
    /// Creates a zone from its calibrated center and radius.
    pub fn new(id: &str, x: f64, z: f64, radius: f64) -> Self {
        Zone {
            id: id.to_string(),
            x,
            z,
            radius,
        }
    }

    /// Zone center as a ground-plane point.
    pub fn center(&self) -> GroundPoint {
        GroundPoint::new(self.x, self.z)
    }

    /// Whether `position` lies inside the zone.
    pub fn contains(&self, position: &GroundPoint) -> bool {
        nalgebra::distance(position, &self.center()) < self.radius
    }

    /// Ground distance from `position` to the zone center.
    pub fn distance_to(&self, position: &GroundPoint) -> f64 {
        nalgebra::distance(position, &self.center())
    }
}

/// Returns the zone nearest to `position`, or `None` for an empty slice.
pub fn nearest_zone<'a>(zones: &'a [Zone], position: &GroundPoint) -> Option<&'a Zone> {
    zones.iter().min_by(|a, b| {
        a.distance_to(position)
            .total_cmp(&b.distance_to(position))
    })
}

/// The full set of warehouse zones, grouped by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseLayout {
    /// Pickup zones where packages are collected
    pub pickups: Vec<Zone>,
    /// Shelf zones where packages are stored
    pub shelves: Vec<Zone>,
    /// Delivery zones where packages are dropped off
    pub deliveries: Vec<Zone>,
    /// Charging stations
    pub chargers: Vec<Zone>,
}

impl Default for WarehouseLayout {
    /// Calibrated zone coordinates from the reference warehouse world.
    fn default() -> Self {
        WarehouseLayout {
            pickups: vec![
                Zone::new("pickup_A", -3.038, 0.1941, 0.6),
                Zone::new("pickup_B", -3.0552, 0.1952, 0.6),
                Zone::new("pickup_C", -3.0569, 0.1955, 0.6),
            ],
            shelves: vec![
                Zone::new("shelf_1", 1.53, 0.20, 0.6),
                Zone::new("shelf_2", 2.03, 0.19, 0.6),
                Zone::new("shelf_3", 1.69, 0.19, 0.6),
            ],
            deliveries: vec![
                Zone::new("delivery_north", -0.07, 0.19, 0.6),
                Zone::new("delivery_south", -0.11, 0.19, 0.6),
            ],
            chargers: vec![
                Zone::new("charger_1", 3.71146, 0.178767, 0.6),
                Zone::new("charger_2", 4.09787, 1.69041, 0.6),
            ],
        }
    }
}

impl WarehouseLayout {
    /// Loads a layout from a YAML file.
    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| LayoutError::Io(format!("{}: {}", path.display(), e)))?;
        let layout: WarehouseLayout =
            serde_yaml::from_str(&raw).map_err(|e| LayoutError::Parse(e.to_string()))?;
        layout.validate()?;
        info!(
            "Loaded warehouse layout: {} pickups, {} shelves, {} deliveries, {} chargers",
            layout.pickups.len(),
            layout.shelves.len(),
            layout.deliveries.len(),
            layout.chargers.len()
        );
        Ok(layout)
    }

    /// Checks that every zone group is usable: non-empty, positive radii.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let groups: [(&str, &[Zone]); 4] = [
            ("pickups", &self.pickups),
            ("shelves", &self.shelves),
            ("deliveries", &self.deliveries),
            ("chargers", &self.chargers),
        ];
        for (name, zones) in groups {
            if zones.is_empty() {
                return Err(LayoutError::Invalid(format!("no {name} zones defined")));
            }
            for zone in zones {
                if zone.radius <= 0.0 {
                    return Err(LayoutError::Invalid(format!(
                        "zone {} has non-positive radius {}",
                        zone.id, zone.radius
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Layout loading/validation errors.
#[derive(Debug)]
pub enum LayoutError {
    /// File could not be read
    Io(String),
    /// File is not valid YAML for a layout
    Parse(String),
    /// Layout contents are unusable
    Invalid(String),
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LayoutError::Io(msg) => write!(f, "layout io error: {}", msg),
            LayoutError::Parse(msg) => write!(f, "layout parse error: {}", msg),
            LayoutError::Invalid(msg) => write!(f, "invalid layout: {}", msg),
        }
    }
}

impl std::error::Error for LayoutError {}
