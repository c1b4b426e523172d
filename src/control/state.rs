// control/state.rs

// Task lifecycle states and the per-task context. The cycle is
// Initializing -> GoingToPickup -> AtPickup -> GoingToShelf -> AtShelf ->
// GoingToDelivery -> AtDelivery -> {next task | GoingToCharge -> Charging},
// with the two recovery sub-states spliced in when a stall fires.

use crate::geometry::Zone;

/// Task lifecycle state. There is no terminal state; the controller cycles
/// indefinitely and every failure path resolves into a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting out the randomized startup delay, motors held at zero
    Initializing,
    /// Driving to the assigned pickup zone
    GoingToPickup,
    /// Dwelling at the pickup zone (loading)
    AtPickup,
    /// Driving to the assigned shelf zone
    GoingToShelf,
    /// Dwelling at the shelf zone (storing)
    AtShelf,
    /// Driving to the assigned delivery zone
    GoingToDelivery,
    /// Dwelling at the delivery zone (unloading)
    AtDelivery,
    /// Driving to the selected charging station
    GoingToCharge,
    /// Parked on the charger, accumulating battery
    Charging,
    /// Recovery maneuver, phase one: backing away from the blockage
    RecoveringReverse,
    /// Recovery maneuver, phase two: pivot-turning to a new bearing
    RecoveringTurn,
}

impl TaskState {
    /// Whether the robot is pursuing a goal point this state.
    pub fn is_going(self) -> bool {
        matches!(
            self,
            TaskState::GoingToPickup
                | TaskState::GoingToShelf
                | TaskState::GoingToDelivery
                | TaskState::GoingToCharge
        )
    }

    /// Whether the robot is mid recovery maneuver.
    pub fn is_recovering(self) -> bool {
        matches!(self, TaskState::RecoveringReverse | TaskState::RecoveringTurn)
    }

    /// Stable wire name for telemetry, matching the backend's vocabulary.
    pub fn name(self) -> &'static str {
        match self {
            TaskState::Initializing => "INITIALIZING",
            TaskState::GoingToPickup => "GOING_TO_PICKUP",
            TaskState::AtPickup => "AT_PICKUP",
            TaskState::GoingToShelf => "GOING_TO_SHELF",
            TaskState::AtShelf => "AT_SHELF",
            TaskState::GoingToDelivery => "GOING_TO_DELIVERY",
            TaskState::AtDelivery => "AT_DELIVERY",
            TaskState::GoingToCharge => "GOING_TO_CHARGE",
            TaskState::Charging => "CHARGING",
            TaskState::RecoveringReverse => "RECOVERING_REVERSE",
            TaskState::RecoveringTurn => "RECOVERING_TURN",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One assigned pickup -> shelf -> delivery task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskContext {
    /// Sequence number of this task for the robot (zero-based)
    pub task_index: u32,
    /// Assigned pickup zone
    pub pickup: Zone,
    /// Assigned shelf zone
    pub shelf: Zone,
    /// Assigned delivery zone
    pub delivery: Zone,
    /// Simulated time when the task was assigned, in seconds
    pub start_time: f64,
    /// Stall events recorded against this task
    pub failure_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn going_states_are_exactly_the_four_travel_legs() {
        let going = [
            TaskState::GoingToPickup,
            TaskState::GoingToShelf,
            TaskState::GoingToDelivery,
            TaskState::GoingToCharge,
        ];
        for state in going {
            assert!(state.is_going(), "{state} should be a going state");
        }
        for state in [
            TaskState::Initializing,
            TaskState::AtPickup,
            TaskState::Charging,
            TaskState::RecoveringReverse,
        ] {
            assert!(!state.is_going(), "{state} should not be a going state");
        }
    }

    #[test]
    fn wire_names_match_backend_vocabulary() {
        assert_eq!(TaskState::GoingToPickup.name(), "GOING_TO_PICKUP");
        assert_eq!(TaskState::Charging.name(), "CHARGING");
        assert_eq!(TaskState::RecoveringTurn.name(), "RECOVERING_TURN");
    }
}
