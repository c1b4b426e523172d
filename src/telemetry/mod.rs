//! Telemetry and reporting boundary for Warebot
//!
//! Everything here is best-effort and fire-and-forget from the controller's
//! point of view: a sink failure is logged at its call site and swallowed,
//! never retried, and never allowed to stall the control loop. The payload
//! shapes mirror what the monitoring backend ingests.

#[cfg(test)]
use mockall::automock;
use log::debug;
use serde::Serialize;

/// Periodic robot state snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    /// Robot identifier
    pub robot_id: String,
    /// Run session identifier, when a backend session is open
    pub run_id: Option<String>,
    /// Lateral ground position
    pub position_x: f64,
    /// Forward ground position
    pub position_z: f64,
    /// Battery level in percent
    pub battery: f64,
    /// Task state wire name
    pub task_state: String,
    /// Identifier of the current goal zone, if any
    pub current_goal: Option<String>,
    /// Ground distance to the current goal, zero when idle
    pub distance_to_goal: f64,
    /// Tasks completed so far this run
    pub tasks_completed: u32,
    /// Stall events recorded this run
    pub task_failures: u32,
    /// Accumulated battery drain this run
    pub total_energy: f64,
}

/// Report emitted when a task cycle completes.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    /// Robot identifier
    pub robot_id: String,
    /// Completed task count including this one
    pub task_number: u32,
    /// Pickup zone id
    pub pickup: String,
    /// Shelf zone id
    pub shelf: String,
    /// Delivery zone id
    pub delivery: String,
    /// Task duration in simulated seconds
    pub duration: f64,
    /// Battery drain accumulated over the run so far
    pub energy_used: f64,
    /// Stall events recorded over the run so far
    pub failures: u32,
    /// Whether the task finished its full cycle
    pub success: bool,
}

/// Report emitted when a stall event fires.
#[derive(Debug, Clone, Serialize)]
pub struct StallEvent {
    /// Robot identifier
    pub robot_id: String,
    /// Lateral position where the robot stalled
    pub x: f64,
    /// Forward position where the robot stalled
    pub z: f64,
    /// Task state at the time of the stall
    pub task_state: String,
    /// Total stall events including this one
    pub failures: u32,
}

/// Telemetry delivery failures. Always swallowed by the caller.
#[derive(Debug)]
pub enum TelemetryError {
    /// Sink did not answer within its timeout
    Timeout,
    /// Sink is unreachable
    Unavailable(String),
}

impl std::fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TelemetryError::Timeout => write!(f, "telemetry request timed out"),
            TelemetryError::Unavailable(msg) => write!(f, "telemetry sink unavailable: {}", msg),
        }
    }
}

impl std::error::Error for TelemetryError {}

/// Receives periodic snapshots and stall events. Implementations must bound
/// their own wait; the controller treats every error as transient.
#[cfg_attr(test, automock)]
pub trait TelemetrySink {
    /// Opens a run session and returns its identifier.
    fn open_run(&mut self) -> Result<String, TelemetryError>;

    /// Delivers one snapshot.
    fn emit(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), TelemetryError>;

    /// Delivers one stall event.
    fn stall(&mut self, event: &StallEvent) -> Result<(), TelemetryError>;
}

/// Receives task completion reports.
#[cfg_attr(test, automock)]
pub trait CompletionReporter {
    /// Delivers one completion report.
    fn report(&mut self, report: &TaskReport) -> Result<(), TelemetryError>;
}

/// Log-backed sink for offline runs: snapshots and events go to the debug
/// log, and no run session exists.
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn open_run(&mut self) -> Result<String, TelemetryError> {
        Err(TelemetryError::Unavailable(
            "offline mode, no monitoring backend".to_string(),
        ))
    }

    fn emit(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), TelemetryError> {
        debug!("Telemetry: {:?}", snapshot);
        Ok(())
    }

    fn stall(&mut self, event: &StallEvent) -> Result<(), TelemetryError> {
        debug!("Stall event: {:?}", event);
        Ok(())
    }
}

/// Log-backed completion reporter for offline runs.
pub struct LogReporter;

impl CompletionReporter for LogReporter {
    fn report(&mut self, report: &TaskReport) -> Result<(), TelemetryError> {
        debug!("Task report: {:?}", report);
        Ok(())
    }
}
