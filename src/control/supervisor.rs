// control/supervisor.rs

// The top-level controller: one call per simulation tick, producing exactly
// one wheel command. Orchestrates battery accounting, stall detection and
// recovery, battery preemption, the task state machine, goal navigation, and
// telemetry cadence. All mutable task context lives here; the components it
// drives are either stateless per tick or own a single piece of rolling
// state (navigator derivative history, stall counter, battery level).

use super::{BatteryModel, StallDetector, TaskContext, TaskState};
use crate::geometry::{nearest_zone, Pose, WarehouseLayout, Zone};
use crate::navigation::{GoalNavigator, ObstacleEvaluator, WheelSpeeds};
use crate::tasking::{fallback_assignment, RobotSnapshot, TaskAssigner};
use crate::telemetry::{CompletionReporter, StallEvent, TaskReport, TelemetrySink, TelemetrySnapshot};
use crate::BotConfig;
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Control-loop cadence settings, in ticks of the fixed time step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Simulated duration of one tick, in seconds
    pub time_step_s: f64,
    /// Minimum randomized startup delay (desynchronizes robot fleets)
    pub startup_delay_min_ticks: u32,
    /// Maximum randomized startup delay
    pub startup_delay_max_ticks: u32,
    /// Ticks spent dwelling at a pickup/shelf/delivery zone
    pub dwell_ticks: u32,
    /// Ticks between telemetry snapshots
    pub telemetry_interval_ticks: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            time_step_s: 0.032,
            startup_delay_min_ticks: 20,
            startup_delay_max_ticks: 50,
            dwell_ticks: 40,
            telemetry_interval_ticks: 200,
        }
    }
}

/// Lifetime run metrics, exposed for telemetry and reporting.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Metrics {
    /// Tasks completed this run
    pub tasks_completed: u32,
    /// Stall events recorded this run
    pub task_failures: u32,
    /// Ground distance traveled, in meters
    pub total_distance: f64,
    /// Battery drain accumulated, in percent
    pub total_energy: f64,
}

/// Controller construction errors.
#[derive(Debug)]
pub enum ControllerError {
    /// Warehouse layout is unusable
    InvalidLayout(String),
    /// Configuration values are inconsistent
    InvalidConfig(String),
}

impl std::fmt::Display for ControllerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ControllerError::InvalidLayout(msg) => write!(f, "invalid layout: {}", msg),
            ControllerError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ControllerError {}

/// In-flight recovery maneuver bookkeeping.
#[derive(Debug, Clone, Copy)]
struct Recovery {
    /// Ticks left in the current phase
    remaining: u32,
    /// Pivot direction for the turn phase
    clockwise: bool,
    /// State to resume once the maneuver finishes
    resume: TaskState,
}

/// The task-lifecycle controller. Call [`Controller::tick`] once per
/// simulation step with a fresh pose and proximity readings; it returns the
/// wheel command for that step. Never panics and never refuses to produce a
/// command: every failure path resolves into a state transition.
pub struct Controller {
    config: BotConfig,
    layout: WarehouseLayout,
    navigator: GoalNavigator,
    evaluator: ObstacleEvaluator,
    battery: BatteryModel,
    stall: StallDetector,
    state: TaskState,
    task: Option<TaskContext>,
    charger: Option<Zone>,
    recovery: Option<Recovery>,
    recovery_attempts: u32,
    wait_counter: u32,
    startup_delay: u32,
    telemetry_counter: u32,
    task_counter: u32,
    ticks: u64,
    metrics: Metrics,
    run_id: Option<String>,
    rng: StdRng,
    assigner: Box<dyn TaskAssigner>,
    telemetry: Box<dyn TelemetrySink>,
    reporter: Box<dyn CompletionReporter>,
}

impl Controller {
    /// Builds a controller over the given layout and collaborators.
    ///
    /// Opens a telemetry run session if the sink is reachable; offline sinks
    /// are fine and the controller runs without a run id.
    pub fn new(
        config: BotConfig,
        layout: WarehouseLayout,
        assigner: Box<dyn TaskAssigner>,
        mut telemetry: Box<dyn TelemetrySink>,
        reporter: Box<dyn CompletionReporter>,
    ) -> Result<Self, ControllerError> {
        layout
            .validate()
            .map_err(|e| ControllerError::InvalidLayout(e.to_string()))?;
        let cadence = config.controller;
        if cadence.time_step_s <= 0.0 {
            return Err(ControllerError::InvalidConfig(format!(
                "time step must be positive, got {}",
                cadence.time_step_s
            )));
        }
        if cadence.startup_delay_min_ticks > cadence.startup_delay_max_ticks {
            return Err(ControllerError::InvalidConfig(
                "startup delay range is inverted".to_string(),
            ));
        }

        let mut rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let startup_delay =
            rng.gen_range(cadence.startup_delay_min_ticks..=cadence.startup_delay_max_ticks);

        let run_id = match telemetry.open_run() {
            Ok(id) => {
                info!("Monitoring run opened: {}", id);
                Some(id)
            }
            Err(e) => {
                info!("Running without monitoring backend: {}", e);
                None
            }
        };

        Ok(Controller {
            navigator: GoalNavigator::new(config.navigation),
            evaluator: ObstacleEvaluator::new(config.obstacles),
            battery: BatteryModel::new(config.battery),
            stall: StallDetector::new(config.stall),
            config,
            layout,
            state: TaskState::Initializing,
            task: None,
            charger: None,
            recovery: None,
            recovery_attempts: 0,
            wait_counter: 0,
            startup_delay,
            telemetry_counter: 0,
            task_counter: 0,
            ticks: 0,
            metrics: Metrics::default(),
            run_id,
            rng,
            assigner,
            telemetry,
            reporter,
        })
    }

    /// Advances the controller by one tick and returns the wheel command.
    pub fn tick(&mut self, pose: &Pose, readings: &[f64]) -> WheelSpeeds {
        self.ticks += 1;

        // Battery accounting runs every tick regardless of state.
        if self.state == TaskState::Charging {
            self.battery.charge();
        } else {
            let drained = self.battery.drain();
            self.metrics.total_energy += drained;
        }

        let observation = self.stall.observe(&pose.position, self.state.is_going());
        self.metrics.total_distance += observation.displacement;

        let speeds = if observation.stalled && self.handle_stall(pose) {
            // The stall escalated into a full reassignment; this tick's
            // output is the reassignment itself.
            WheelSpeeds::stop()
        } else {
            if !self.state.is_recovering() {
                self.preempt_for_battery(pose);
            }
            self.dispatch(pose, readings)
        };

        self.telemetry_counter += 1;
        if self.telemetry_counter >= self.config.controller.telemetry_interval_ticks {
            self.telemetry_counter = 0;
            let snapshot = self.build_snapshot(pose);
            if let Err(e) = self.telemetry.emit(&snapshot) {
                warn!("Telemetry snapshot dropped: {}", e);
            }
        }

        speeds
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Current battery level in percent.
    pub fn battery_level(&self) -> f64 {
        self.battery.level()
    }

    /// Recovery attempts consumed against the current task.
    pub fn recovery_attempts(&self) -> u32 {
        self.recovery_attempts
    }

    /// The task currently being worked, if any.
    pub fn task(&self) -> Option<&TaskContext> {
        self.task.as_ref()
    }

    /// The charger currently targeted, if any.
    pub fn charger(&self) -> Option<&Zone> {
        self.charger.as_ref()
    }

    /// Lifetime run metrics.
    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    /// Simulated time since startup, in seconds.
    pub fn sim_time(&self) -> f64 {
        self.ticks as f64 * self.config.controller.time_step_s
    }

    /// Handles a fired stall event. Returns true when the stall escalated
    /// into a full task reassignment instead of a recovery maneuver.
    fn handle_stall(&mut self, pose: &Pose) -> bool {
        self.metrics.task_failures += 1;
        if let Some(task) = self.task.as_mut() {
            task.failure_count += 1;
        }
        self.recovery_attempts += 1;

        let event = StallEvent {
            robot_id: self.config.robot_id.clone(),
            x: pose.position.x,
            z: pose.position.y,
            task_state: self.state.name().to_string(),
            failures: self.metrics.task_failures,
        };
        if let Err(e) = self.telemetry.stall(&event) {
            warn!("Stall report dropped: {}", e);
        }

        if self.recovery_attempts > self.config.stall.max_recovery_attempts {
            warn!(
                "Task failed after {} recovery attempts, requesting reassignment",
                self.config.stall.max_recovery_attempts
            );
            self.recovery_attempts = 0;
            self.assign_task(pose);
            return true;
        }

        info!(
            "Stall detected in {}, recovery attempt #{}",
            self.state, self.recovery_attempts
        );
        self.recovery = Some(Recovery {
            remaining: self.config.stall.reverse_ticks,
            clockwise: self.rng.gen_bool(0.5),
            resume: self.state,
        });
        self.state = TaskState::RecoveringReverse;
        false
    }

    /// Forces a course change to the nearest charger when the battery goes
    /// critical. The in-progress task is abandoned, not failed. Recovery
    /// sub-states are left alone; the maneuver finishes first.
    fn preempt_for_battery(&mut self, pose: &Pose) {
        if !self.battery.is_critical()
            || matches!(self.state, TaskState::GoingToCharge | TaskState::Charging)
        {
            return;
        }
        let charger = nearest_zone(&self.layout.chargers, &pose.position).cloned();
        match charger {
            Some(charger) => {
                warn!(
                    "Battery critical at {:.1}%, preempting {} to charge at {}",
                    self.battery.level(),
                    self.state,
                    charger.id
                );
                self.charger = Some(charger);
                self.state = TaskState::GoingToCharge;
                self.wait_counter = 0;
            }
            None => error!("Battery critical but no chargers in layout"),
        }
    }

    /// Runs the state machine for this tick and produces the wheel command.
    fn dispatch(&mut self, pose: &Pose, readings: &[f64]) -> WheelSpeeds {
        match self.state {
            TaskState::Initializing => {
                self.wait_counter += 1;
                if self.wait_counter > self.startup_delay {
                    self.assign_task(pose);
                }
                WheelSpeeds::stop()
            }

            TaskState::GoingToPickup => {
                let goal = self.task.as_ref().map(|t| t.pickup.clone());
                self.travel(pose, readings, goal, TaskState::AtPickup)
            }
            TaskState::AtPickup => {
                let next_id = self.task.as_ref().map(|t| t.shelf.id.clone());
                self.dwell(TaskState::GoingToShelf, "Loaded", next_id)
            }

            TaskState::GoingToShelf => {
                let goal = self.task.as_ref().map(|t| t.shelf.clone());
                self.travel(pose, readings, goal, TaskState::AtShelf)
            }
            TaskState::AtShelf => {
                let next_id = self.task.as_ref().map(|t| t.delivery.id.clone());
                self.dwell(TaskState::GoingToDelivery, "Stored", next_id)
            }

            TaskState::GoingToDelivery => {
                let goal = self.task.as_ref().map(|t| t.delivery.clone());
                self.travel(pose, readings, goal, TaskState::AtDelivery)
            }
            TaskState::AtDelivery => {
                self.wait_counter += 1;
                if self.wait_counter > self.config.controller.dwell_ticks {
                    self.complete_task(pose);
                }
                WheelSpeeds::stop()
            }

            TaskState::GoingToCharge => {
                let goal = self.charger.clone();
                self.travel(pose, readings, goal, TaskState::Charging)
            }
            TaskState::Charging => {
                if self.battery.is_full() {
                    info!("Battery charged, requesting next task");
                    self.assign_task(pose);
                }
                WheelSpeeds::stop()
            }

            TaskState::RecoveringReverse => self.recovery_reverse(),
            TaskState::RecoveringTurn => self.recovery_turn(),
        }
    }

    /// Drives toward `goal`, transitioning to `arrived` on zone containment.
    fn travel(
        &mut self,
        pose: &Pose,
        readings: &[f64],
        goal: Option<Zone>,
        arrived: TaskState,
    ) -> WheelSpeeds {
        let Some(goal) = goal else {
            // Goal state without a goal means the task context was lost;
            // resolve it the same way a terminal stall is resolved.
            error!("{} has no goal, requesting reassignment", self.state);
            self.assign_task(pose);
            return WheelSpeeds::stop();
        };

        if goal.contains(&pose.position) {
            info!("Reached {}", goal.id);
            self.state = arrived;
            self.wait_counter = 0;
            return WheelSpeeds::stop();
        }

        let report = self.evaluator.evaluate(readings);
        self.navigator.steer(pose, Some(&goal), &report)
    }

    /// Dwells at a zone for the configured load/unload time.
    fn dwell(&mut self, next: TaskState, verb: &str, next_id: Option<String>) -> WheelSpeeds {
        self.wait_counter += 1;
        if self.wait_counter > self.config.controller.dwell_ticks {
            self.wait_counter = 0;
            self.state = next;
            match next_id {
                Some(id) => info!("{}, heading to {}", verb, id),
                None => info!("{}, heading to {}", verb, next),
            }
        }
        WheelSpeeds::stop()
    }

    /// Finishes the delivery dwell: report completion, then next task or
    /// charge depending on battery.
    fn complete_task(&mut self, pose: &Pose) {
        self.metrics.tasks_completed += 1;
        self.wait_counter = 0;

        if let Some(task) = self.task.clone() {
            let duration = self.sim_time() - task.start_time;
            info!(
                "Task #{} complete in {:.1}s, battery {:.1}%",
                self.metrics.tasks_completed,
                duration,
                self.battery.level()
            );
            let report = TaskReport {
                robot_id: self.config.robot_id.clone(),
                task_number: self.metrics.tasks_completed,
                pickup: task.pickup.id,
                shelf: task.shelf.id,
                delivery: task.delivery.id,
                duration,
                energy_used: self.metrics.total_energy,
                failures: self.metrics.task_failures,
                success: true,
            };
            if let Err(e) = self.reporter.report(&report) {
                warn!("Completion report dropped: {}", e);
            }
        }

        if self.battery.is_critical() {
            self.preempt_for_battery(pose);
        } else {
            self.assign_task(pose);
        }
    }

    /// Requests the next task, falling back to the local policy on assigner
    /// failure, and enters `GoingToPickup`.
    fn assign_task(&mut self, pose: &Pose) {
        self.recovery_attempts = 0;
        self.recovery = None;

        let snapshot = self.build_robot_snapshot(pose);
        let assignment = match self.assigner.request(&snapshot, &self.layout) {
            Ok(assignment) => assignment,
            Err(e) => {
                warn!("Assignment request failed ({}), using local fallback", e);
                match fallback_assignment(&mut self.rng, &pose.position, &self.layout) {
                    Some(assignment) => assignment,
                    None => {
                        // Unreachable after layout validation, but never
                        // leave the robot without a next action.
                        error!("No zones available for fallback assignment");
                        self.task = None;
                        self.state = TaskState::Initializing;
                        return;
                    }
                }
            }
        };

        let task_index = self.task_counter;
        self.task_counter += 1;
        info!(
            "Task #{}: route {} -> {} -> {}",
            task_index + 1,
            assignment.pickup.id,
            assignment.shelf.id,
            assignment.delivery.id
        );
        self.task = Some(TaskContext {
            task_index,
            pickup: assignment.pickup,
            shelf: assignment.shelf,
            delivery: assignment.delivery,
            start_time: self.sim_time(),
            failure_count: 0,
        });
        self.state = TaskState::GoingToPickup;
        self.wait_counter = 0;
    }

    /// One tick of the reverse phase of the recovery maneuver.
    fn recovery_reverse(&mut self) -> WheelSpeeds {
        let stall_cfg = self.config.stall;
        let speed = -self.config.navigation.max_speed * stall_cfg.reverse_speed_factor;
        match self.recovery.as_mut() {
            Some(recovery) => {
                recovery.remaining = recovery.remaining.saturating_sub(1);
                if recovery.remaining == 0 {
                    recovery.remaining = stall_cfg.turn_ticks;
                    self.state = TaskState::RecoveringTurn;
                }
                WheelSpeeds {
                    left: speed,
                    right: speed,
                }
            }
            None => self.abort_recovery(),
        }
    }

    /// One tick of the pivot-turn phase of the recovery maneuver.
    fn recovery_turn(&mut self) -> WheelSpeeds {
        let magnitude = self.config.navigation.max_speed * self.config.stall.turn_speed_factor;
        match self.recovery {
            Some(recovery) => {
                let speeds = if recovery.clockwise {
                    WheelSpeeds {
                        left: magnitude,
                        right: -magnitude,
                    }
                } else {
                    WheelSpeeds {
                        left: -magnitude,
                        right: magnitude,
                    }
                };
                let remaining = recovery.remaining.saturating_sub(1);
                if remaining == 0 {
                    info!("Recovery complete, resuming {}", recovery.resume);
                    self.state = recovery.resume;
                    self.recovery = None;
                } else if let Some(r) = self.recovery.as_mut() {
                    r.remaining = remaining;
                }
                speeds
            }
            None => self.abort_recovery(),
        }
    }

    /// Bails out of a recovery state whose context has been lost.
    fn abort_recovery(&mut self) -> WheelSpeeds {
        error!("Recovery state without context, reinitializing");
        self.state = TaskState::Initializing;
        WheelSpeeds::stop()
    }

    fn build_robot_snapshot(&self, pose: &Pose) -> RobotSnapshot {
        RobotSnapshot {
            robot_id: self.config.robot_id.clone(),
            x: pose.position.x,
            z: pose.position.y,
            battery: self.battery.level(),
            task_state: self.state.name().to_string(),
        }
    }

    fn build_snapshot(&self, pose: &Pose) -> TelemetrySnapshot {
        let goal = self.current_goal();
        TelemetrySnapshot {
            robot_id: self.config.robot_id.clone(),
            run_id: self.run_id.clone(),
            position_x: pose.position.x,
            position_z: pose.position.y,
            battery: self.battery.level(),
            task_state: self.state.name().to_string(),
            current_goal: goal.as_ref().map(|z| z.id.clone()),
            distance_to_goal: goal
                .as_ref()
                .map(|z| z.distance_to(&pose.position))
                .unwrap_or(0.0),
            tasks_completed: self.metrics.tasks_completed,
            task_failures: self.metrics.task_failures,
            total_energy: self.metrics.total_energy,
        }
    }

    /// The goal zone for the current state, if the state has one.
    fn current_goal(&self) -> Option<Zone> {
        match self.state {
            TaskState::GoingToPickup => self.task.as_ref().map(|t| t.pickup.clone()),
            TaskState::GoingToShelf => self.task.as_ref().map(|t| t.shelf.clone()),
            TaskState::GoingToDelivery => self.task.as_ref().map(|t| t.delivery.clone()),
            TaskState::GoingToCharge => self.charger.clone(),
            _ => None,
        }
    }
}
