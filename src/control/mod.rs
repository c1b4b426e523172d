// control/mod.rs

// The task-lifecycle layer: battery model, stall detection, the task state
// machine, and the top-level per-tick controller that orchestrates them.

mod battery;
mod stall;
mod state;
mod supervisor;

pub use battery::{BatteryConfig, BatteryModel};
pub use stall::{StallConfig, StallDetector, StallObservation};
pub use state::{TaskContext, TaskState};
pub use supervisor::{Controller, ControllerConfig, ControllerError, Metrics};
