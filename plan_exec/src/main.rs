//! Main planner executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Main loop (one dedicated planning thread, fixed control period):
//!         - Acquire the data store lock for the full cycle
//!         - Refresh the world snapshot (demo driver stands in for the
//!           vision/referee links here)
//!         - Run the plan manager over all slots in priority order
//!         - Publish the trajectory array and debug draw frame
//!         - Release the lock, sleep out the remainder of the period
//!
//! A cycle that overruns its period is reported and counted but never
//! preempted; the next cycle simply starts late.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use nalgebra::{Point2, Vector2};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// Internal
use plan_lib::{
    data_store::DataStore,
    draw::SessionSink,
    geom::{Pose, Shape, Twist},
    goal::{MotionGoal, RobotIntent},
    plan_mgr::{params::PlanMgrParams, PlanMgr},
    traj::RobotInstant,
    world::GameState,
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one planning cycle.
const CYCLE_PERIOD_S: f64 = 0.05;

/// Simulated time driven by the demo scenario before the exec exits.
const DEMO_DURATION_S: f64 = 10.0;

/// Trajectories are archived into the session at this cycle interval.
const ARCHIVE_CYCLE_INTERVAL: u128 = 20;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    let session = Session::new("plan_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    info!("Kestrel Planner Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: PlanMgrParams =
        util::params::load("plan_mgr.toml").wrap_err("Could not load plan manager params")?;

    info!("Plan manager parameters loaded");

    // ---- INITIALISE MODULES ----

    let mut plan_mgr = PlanMgr::new(params);
    let mut sink = SessionSink::new();

    let store = Arc::new(Mutex::new(DataStore::default()));

    init_demo_scenario(
        &mut *store
            .lock()
            .map_err(|_| eyre!("Data store lock poisoned"))?,
    );

    info!("Starting planning loop at {} Hz\n", 1.0 / CYCLE_PERIOD_S);

    // ---- MAIN LOOP ----

    let cycle_period = Duration::from_secs_f64(CYCLE_PERIOD_S);
    let mut num_consec_overruns: u64 = 0;

    loop {
        let cycle_start = Instant::now();

        let done = {
            // Coarse lock held for the entire planning cycle, so external
            // readers only ever observe complete, consistent output arrays
            let mut ds = store
                .lock()
                .map_err(|_| eyre!("Data store lock poisoned"))?;

            ds.num_consec_cycle_overruns = num_consec_overruns;

            step_demo_world(&mut ds, CYCLE_PERIOD_S);

            let trajectories = plan_mgr.proc(
                &ds.world,
                ds.game_state,
                &ds.intents,
                &ds.field_obstacles,
                Some(&mut sink),
            );
            ds.trajectories = trajectories;
            ds.num_cycles += 1;

            sink.flush(ds.num_cycles);

            if ds.num_cycles % ARCHIVE_CYCLE_INTERVAL == 0 {
                util::session::save(
                    format!("trajectories/cycle_{:06}.json", ds.num_cycles),
                    ds.trajectories.clone(),
                );
            }

            ds.world.timestamp_s >= DEMO_DURATION_S
        };

        if done {
            break;
        }

        // Cycle overrun accounting: late cycles are reported, never
        // preempted
        let elapsed = cycle_start.elapsed();
        if elapsed > cycle_period {
            num_consec_overruns += 1;
            warn!(
                "Cycle overran its period: {:.1} ms (limit {:.1} ms), {} consecutive",
                elapsed.as_secs_f64() * 1e3,
                CYCLE_PERIOD_S * 1e3,
                num_consec_overruns
            );
        } else {
            num_consec_overruns = 0;
            std::thread::sleep(cycle_period - elapsed);
        }
    }

    // ---- SHUTDOWN ----

    {
        let ds = store
            .lock()
            .map_err(|_| eyre!("Data store lock poisoned"))?;
        info!(
            "Demo complete after {} cycles ({:.1} s simulated)",
            ds.num_cycles, ds.world.timestamp_s
        );
    }

    session.exit();

    Ok(())
}

/// Seed the demo scenario: four active robots with mixed goals, a rolling
/// ball, and a keep-out zone in midfield.
fn init_demo_scenario(ds: &mut DataStore) {
    ds.game_state = GameState::Running;

    let poses = [
        Pose::new(Point2::new(-3.0, 0.0), 0.0),
        Pose::new(Point2::new(0.0, -2.0), 0.0),
        Pose::new(Point2::new(-2.0, 2.0), 0.0),
        Pose::new(Point2::new(-3.5, -1.0), 0.0),
    ];
    for (slot, pose) in poses.iter().enumerate() {
        ds.world.our_robots[slot].pose = *pose;
        ds.world.our_robots[slot].visible = true;
    }

    ds.world.ball.position_m = Point2::new(1.0, 1.0);
    ds.world.ball.velocity_mps = Vector2::new(-0.3, 0.0);

    ds.intents[0] = RobotIntent {
        goal: MotionGoal::PathTarget {
            goal: RobotInstant::stationary(Pose::new(Point2::new(3.0, 0.0), 0.0)),
        },
        priority: 3,
        ..Default::default()
    };
    ds.intents[1] = RobotIntent {
        goal: MotionGoal::Collect,
        priority: 2,
        ..Default::default()
    };
    ds.intents[2] = RobotIntent {
        goal: MotionGoal::PathTarget {
            goal: RobotInstant::stationary(Pose::new(Point2::new(2.5, -1.5), 1.6)),
        },
        priority: 1,
        ..Default::default()
    };
    ds.intents[3] = RobotIntent {
        goal: MotionGoal::WorldVel {
            vel: Twist::new(Vector2::new(0.5, 0.2), 0.0),
        },
        priority: 0,
        ..Default::default()
    };

    // Midfield keep-out, stands in for a real defense area
    ds.field_obstacles
        .add(Shape::circle(Point2::new(0.0, 0.0), 0.5));
}

/// Propagate the simulated world by one period: robots track their published
/// trajectories, the ball rolls on at constant velocity.
fn step_demo_world(ds: &mut DataStore, dt_s: f64) {
    ds.world.timestamp_s += dt_s;
    let now_s = ds.world.timestamp_s;

    for slot in 0..ds.world.our_robots.len() {
        let traj = &ds.trajectories[slot];
        if traj.is_empty() {
            continue;
        }

        let rel_s = now_s - traj.start_time_s();
        if let Some(instant) = traj.eval(rel_s) {
            ds.world.our_robots[slot].pose = instant.pose;
            ds.world.our_robots[slot].twist = instant.twist;
        } else if let Some(end) = traj.end() {
            if rel_s > 0.0 {
                ds.world.our_robots[slot].pose = end.pose;
                ds.world.our_robots[slot].twist = Twist::zero();
            }
        }
        ds.world.our_robots[slot].timestamp_s = now_s;
    }

    let ball_vel = ds.world.ball.velocity_mps;
    ds.world.ball.position_m += ball_vel * dt_s;
}
