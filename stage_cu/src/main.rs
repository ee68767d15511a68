//! # XY Stage Control Unit
//!
//! Demo binary: loads the TOML configuration, wires the bundled stage
//! simulator, and drives either a waypoint trajectory or a position hold at
//! the configured tick rate. Real deployments replace the simulator with an
//! adapter implementing `stage_cu::hw::StageHardware` over the vendor
//! serial link; everything else is unchanged.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use stage_common::axis::AxisId;
use stage_common::event::EventBuf;
use stage_common::trajectory::Waypoint;
use stage_cu::config::load_config;
use stage_cu::cycle::{CycleRunner, log_events, rt_setup};
use stage_cu::exec::StageController;
use stage_cu::sim::SimulatedStage;

/// XY Stage Control Unit — dual-axis PI trajectory follower
#[derive(Parser, Debug)]
#[command(name = "stage_cu")]
#[command(version)]
#[command(about = "Closed-loop XY stage trajectory controller (simulated rig)")]
struct Args {
    /// Path to the stage configuration TOML.
    #[arg(long, default_value = "config/stage.toml")]
    config: PathBuf,

    /// Trajectory waypoint as `x,y` [physical units]; repeatable.
    #[arg(long = "waypoint", value_parser = parse_waypoint)]
    waypoints: Vec<Waypoint>,

    /// Hold both axes at a fixed `x,y` target instead of running waypoints
    /// (runs until Ctrl-C).
    #[arg(long, value_parser = parse_waypoint, conflicts_with = "waypoints")]
    hold: Option<Waypoint>,

    /// Strict settling tolerance [physical units].
    #[arg(long, default_value_t = 25.0)]
    tolerance: f64,

    /// Pause between accepted waypoints [ms]; defaults to the config value.
    #[arg(long)]
    pause_ms: Option<u64>,

    /// Starting carriage position as `x,y` [physical units].
    #[arg(long, value_parser = parse_waypoint, default_value = "0,0")]
    start: Waypoint,

    /// CPU core to pin the loop to (rt builds only).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (rt builds only).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn parse_waypoint(s: &str) -> Result<Waypoint, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x in `{s}`: {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y in `{s}`: {e}"))?;
    Ok(Waypoint::new(x, y))
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("stage control unit v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("stage control unit shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    info!(
        period_ms = config.cycle.period_ms,
        "config OK: {}",
        args.config.display()
    );

    rt_setup(args.cpu_core, args.rt_priority)?;

    let x = config
        .axes
        .get(AxisId::X)
        .ok_or("axis X must be configured")?;
    let y = config
        .axes
        .get(AxisId::Y)
        .ok_or("axis Y must be configured")?;
    let dt = config.cycle.period_ms as f64 / 1000.0;

    let mut sim = SimulatedStage::new([x.calibration, y.calibration], dt);
    sim.set_position(AxisId::X, args.start.x);
    sim.set_position(AxisId::Y, args.start.y);

    let mut controller = StageController::new(config);
    let mut events = EventBuf::new();

    if let Some(target) = args.hold {
        controller.start_position_hold(target.x, target.y, &mut events)?;
    } else {
        let points = if args.waypoints.is_empty() {
            demo_serpentine()
        } else {
            args.waypoints.clone()
        };
        let pause = Duration::from_millis(args.pause_ms.unwrap_or(config.cycle.default_pause_ms));
        controller.start_trajectory(points, args.tolerance, pause, &mut events)?;
    }
    log_events(&events);

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })?;

    let mut runner = CycleRunner::new(controller, sim, stop);
    runner.run();

    let stats = runner.stats();
    info!(
        cycles = stats.cycle_count,
        overruns = stats.overruns,
        avg_cycle_ns = stats.avg_cycle_ns(),
        "run complete"
    );
    Ok(())
}

/// Built-in demo path: a short serpentine over the stage travel.
fn demo_serpentine() -> Vec<Waypoint> {
    vec![
        Waypoint::new(500.0, 500.0),
        Waypoint::new(1500.0, 500.0),
        Waypoint::new(1500.0, 1000.0),
        Waypoint::new(500.0, 1000.0),
        Waypoint::new(500.0, 1500.0),
        Waypoint::new(1500.0, 1500.0),
    ]
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
