// src/main.rs
// Entry point for Warebot, running the full task cycle against the built-in
// kinematic simulation with the offline assigner and log-backed telemetry.
//
// Usage: warebot [config.yaml] [layout.yaml]
// Both files are optional; missing ones fall back to the built-in defaults.

use log::info;
use std::env;
use std::error::Error;
use std::path::Path;
use warebot::control::Controller;
use warebot::geometry::{Pose, WarehouseLayout};
use warebot::sensors::{MotorActuator, SensorHub};
use warebot::sim::{KinematicSim, SharedSim, SimConfig};
use warebot::tasking::LocalAssigner;
use warebot::telemetry::{LogReporter, LogSink};
use warebot::BotConfig;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    info!("Starting Warebot controller...");

    let mut args = env::args().skip(1);
    let config = match args.next() {
        Some(path) => BotConfig::load(Path::new(&path))?,
        None => BotConfig::default(),
    };
    let layout = match args.next() {
        Some(path) => WarehouseLayout::load(Path::new(&path))?,
        None => WarehouseLayout::default(),
    };
    info!(
        "Robot {} in a layout with {} pickups, {} shelves, {} deliveries, {} chargers",
        config.robot_id,
        layout.pickups.len(),
        layout.shelves.len(),
        layout.deliveries.len(),
        layout.chargers.len()
    );

    let sim = SharedSim::new(KinematicSim::new(
        SimConfig {
            time_step_s: config.controller.time_step_s,
            ..SimConfig::default()
        },
        Pose::new(0.0, 0.0, 0.0),
    ));
    let mut hub = SensorHub::new(
        Box::new(sim.clone()),
        Box::new(sim.clone()),
        Box::new(sim.clone()),
        config.sensors,
    );
    let mut actuator = sim.clone();

    let mut controller = Controller::new(
        config,
        layout,
        Box::new(LocalAssigner::new()),
        Box::new(LogSink),
        Box::new(LogReporter),
    )?;

    // Bounded demo run: roughly ten minutes of simulated time.
    let demo_ticks = 20_000;
    for _ in 0..demo_ticks {
        let pose = hub.sample_pose();
        let readings = hub.sample_obstacles();
        let speeds = controller.tick(&pose, &readings);
        actuator.set(speeds.left, speeds.right);
        sim.step();
    }

    let metrics = controller.metrics();
    info!(
        "Demo finished after {:.0}s: {} tasks completed, {} stalls, {:.1}m traveled, battery {:.1}%",
        controller.sim_time(),
        metrics.tasks_completed,
        metrics.task_failures,
        metrics.total_distance,
        controller.battery_level()
    );
    Ok(())
}
