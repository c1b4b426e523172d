//! Task assignment boundary for Warebot
//!
//! The controller never plans routes itself: each task cycle it asks an
//! assigner for a pickup/shelf/delivery triple. The assigner may be remote
//! and slow or down; its contract is request/response with a short timeout,
//! and every failure degrades to the local policy (nearest pickup by ground
//! distance, uniform random shelf and delivery) so navigation always has a
//! valid goal.

use crate::geometry::{nearest_zone, GroundPoint, WarehouseLayout, Zone};
use log::debug;
#[cfg(test)]
use mockall::automock;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

/// Robot state snapshot sent with an assignment request.
#[derive(Debug, Clone, Serialize)]
pub struct RobotSnapshot {
    /// Robot identifier
    pub robot_id: String,
    /// Lateral ground position
    pub x: f64,
    /// Forward ground position
    pub z: f64,
    /// Battery level in percent
    pub battery: f64,
    /// Current task state wire name
    pub task_state: String,
}

/// A pickup -> shelf -> delivery goal triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Zone to collect the package from
    pub pickup: Zone,
    /// Zone to store the package at
    pub shelf: Zone,
    /// Zone to deliver the package to
    pub delivery: Zone,
}

/// Assignment request failures. Both are recoverable; the caller falls back
/// to the local policy.
#[derive(Debug)]
pub enum AssignError {
    /// The assigner did not answer within its timeout
    Timeout,
    /// The assigner is unreachable or answered with garbage
    Unavailable(String),
}

impl std::fmt::Display for AssignError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AssignError::Timeout => write!(f, "assignment request timed out"),
            AssignError::Unavailable(msg) => write!(f, "assigner unavailable: {}", msg),
        }
    }
}

impl std::error::Error for AssignError {}

/// Maps a robot snapshot to its next goal triple. May be backed by a remote
/// allocator service; implementations must bound their own wait.
#[cfg_attr(test, automock)]
pub trait TaskAssigner {
    /// Requests the next task for the given robot state.
    fn request(
        &mut self,
        snapshot: &RobotSnapshot,
        layout: &WarehouseLayout,
    ) -> Result<Assignment, AssignError>;
}

/// The local fallback policy: nearest pickup by ground distance, uniformly
/// random shelf and delivery. Returns `None` only for an unusable layout
/// (empty zone group), which layout validation rules out up front.
pub fn fallback_assignment(
    rng: &mut StdRng,
    position: &GroundPoint,
    layout: &WarehouseLayout,
) -> Option<Assignment> {
    let pickup = nearest_zone(&layout.pickups, position)?.clone();
    let shelf = layout.shelves.choose(rng)?.clone();
    let delivery = layout.deliveries.choose(rng)?.clone();
    debug!(
        "Local fallback assignment: {} -> {} -> {}",
        pickup.id, shelf.id, delivery.id
    );
    Some(Assignment {
        pickup,
        shelf,
        delivery,
    })
}

/// Offline assigner used when no allocator backend is configured. Applies
/// the same policy as the fallback path with its own seedable RNG.
pub struct LocalAssigner {
    rng: StdRng,
}

impl LocalAssigner {
    /// Creates an assigner seeded from entropy.
    pub fn new() -> Self {
        LocalAssigner {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates an assigner with a fixed seed, for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        LocalAssigner {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for LocalAssigner {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskAssigner for LocalAssigner {
    fn request(
        &mut self,
        snapshot: &RobotSnapshot,
        layout: &WarehouseLayout,
    ) -> Result<Assignment, AssignError> {
        let position = GroundPoint::new(snapshot.x, snapshot.z);
        fallback_assignment(&mut self.rng, &position, layout)
            .ok_or_else(|| AssignError::Unavailable("no zones configured".to_string()))
    }
}
