//! # Plan requests and obstacle aggregation
//!
//! A [`PlanRequest`] bundles everything a planner needs to produce one
//! robot's trajectory for one cycle. Requests are built fresh by the cycle
//! orchestrator and never persisted.
//!
//! [`fill_obstacles`] turns a request into the concrete obstacle sets a
//! planner avoids: a static shape set for everything that isn't moving this
//! cycle, and a list of dynamic obstacles derived from the trajectories of
//! robots which have already been planned (and optionally the ball).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

// Internal
use crate::draw::DebugSink;
use crate::geom::{Shape, ShapeSet};
use crate::goal::MotionGoal;
use crate::traj::{RobotInstant, Trajectory};
use crate::world::{WorldSnapshot, BALL_RADIUS_M, NUM_SLOTS, ROBOT_RADIUS_M};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Horizon over which the ball is extrapolated when it must be avoided.
pub const BALL_AVOID_HORIZON_S: f64 = 1.0;

/// Waypoint spacing of the extrapolated ball trajectory.
pub const BALL_AVOID_STEP_S: f64 = 0.1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematic limits applied when profiling a trajectory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConstraints {
    pub max_speed_mps: f64,
    pub max_accel_mps2: f64,
    pub max_ang_speed_radps: f64,
    pub max_ang_accel_radps2: f64,
}

/// Everything needed to plan one robot's trajectory for one cycle.
pub struct PlanRequest<'a, 's, 'd> {
    /// The robot's state at the start of the plan.
    pub start: RobotInstant,

    /// The goal to plan for.
    pub goal: MotionGoal,

    /// Kinematic limits for this robot.
    pub constraints: RobotConstraints,

    /// Global static field obstacles.
    pub field_obstacles: &'a ShapeSet,

    /// Robot-local virtual obstacles from gameplay.
    pub virtual_obstacles: &'a ShapeSet,

    /// Trajectories of robots already planned this cycle. `None` for slots
    /// which have not been planned yet.
    pub planned: &'a [Option<Trajectory>; NUM_SLOTS],

    /// This robot's slot id.
    pub slot: usize,

    /// Read-only snapshot of the world.
    pub world: &'a WorldSnapshot,

    /// Planning priority of this request.
    pub priority: i8,

    /// Absolute time of this cycle, seconds.
    pub now_s: f64,

    /// Optional debug draw sink. `None` disables all drawing.
    pub sink: Option<&'s mut (dyn DebugSink + 'd)>,
}

/// A moving exclusion region derived from another robot's (or the ball's)
/// trajectory.
pub struct DynamicObstacle<'t> {
    pub traj: &'t Trajectory,
    pub radius_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for RobotConstraints {
    fn default() -> Self {
        Self {
            max_speed_mps: 3.0,
            max_accel_mps2: 3.0,
            max_ang_speed_radps: 10.0,
            max_ang_accel_radps2: 30.0,
        }
    }
}

impl RobotConstraints {
    /// Return a copy with accelerations scaled by the given factor.
    pub fn scaled_accel(&self, scale: f64) -> Self {
        Self {
            max_accel_mps2: self.max_accel_mps2 * scale,
            max_ang_accel_radps2: self.max_ang_accel_radps2 * scale,
            ..*self
        }
    }
}

impl DynamicObstacle<'_> {
    /// The obstacle's exclusion circle at the given absolute time.
    ///
    /// Before the trajectory starts the first waypoint is used, after it
    /// ends the last, so a robot that has finished its plan keeps excluding
    /// its final position.
    pub fn circle_at(&self, abs_time_s: f64) -> Shape {
        let rel_s = abs_time_s - self.traj.start_time_s();

        let position_m = match self.traj.eval(rel_s) {
            Some(instant) => instant.position_m(),
            None => {
                let boundary = if rel_s <= 0.0 {
                    self.traj.start()
                } else {
                    self.traj.end()
                };
                boundary
                    .map(|i| i.position_m())
                    .unwrap_or_else(Point2::origin)
            }
        };

        Shape::circle(position_m, self.radius_m)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the static and dynamic obstacle sets for a plan request.
///
/// The static set holds field obstacles, the request's virtual obstacles, a
/// circular exclusion for every visible own robot which has not been planned
/// yet, and one for every visible opposing robot. The dynamic list holds one
/// entry per already-planned own robot with a non-empty trajectory.
///
/// If `avoid_ball` is set, a short constant-velocity extrapolation of the
/// ball is written into `ball_storage`, which must outlive the returned
/// dynamic list, and referenced as an additional dynamic obstacle.
pub fn fill_obstacles<'t>(
    req: &'t PlanRequest<'_, '_, '_>,
    avoid_ball: bool,
    ball_storage: &'t mut Option<Trajectory>,
) -> (ShapeSet, Vec<DynamicObstacle<'t>>) {
    let mut static_set = ShapeSet::new();
    static_set.extend(req.field_obstacles);
    static_set.extend(req.virtual_obstacles);

    let mut dynamic = Vec::new();

    for slot in 0..NUM_SLOTS {
        if slot == req.slot {
            continue;
        }

        match req.planned[slot] {
            // Robots planned earlier this cycle move along their published
            // trajectories
            Some(ref traj) if !traj.is_empty() => {
                dynamic.push(DynamicObstacle {
                    traj,
                    radius_m: ROBOT_RADIUS_M,
                });
            }
            // Everyone else is a static exclusion at their current position,
            // if vision can see them
            _ => {
                let robot = &req.world.our_robots[slot];
                if robot.visible {
                    static_set.add(Shape::circle(robot.pose.position_m, ROBOT_RADIUS_M));
                }
            }
        }
    }

    for opp in req.world.opp_robots.iter() {
        if opp.visible {
            static_set.add(Shape::circle(opp.pose.position_m, ROBOT_RADIUS_M));
        }
    }

    if avoid_ball {
        let mut ball_traj = Trajectory::new();
        ball_traj.set_start_time_s(req.now_s);

        let mut t_s = 0.0;
        while t_s <= BALL_AVOID_HORIZON_S + 1e-9 {
            let instant = RobotInstant::new(
                crate::geom::Pose::new(req.world.ball.predict(t_s), 0.0),
                crate::geom::Twist::new(req.world.ball.velocity_mps, 0.0),
            );
            ball_traj.push(t_s, instant);
            t_s += BALL_AVOID_STEP_S;
        }

        *ball_storage = Some(ball_traj);
    } else {
        *ball_storage = None;
    }

    if let Some(ball_traj) = ball_storage.as_ref() {
        dynamic.push(DynamicObstacle {
            traj: ball_traj,
            radius_m: BALL_RADIUS_M,
        });
    }

    (static_set, dynamic)
}

/// Check a candidate trajectory against a list of dynamic obstacles.
///
/// Mirrors [`Trajectory::hit`]: the scan starts at the first waypoint
/// strictly after `elapsed_s`, obstacles already overlapping the robot there
/// are exempt for the whole query, and the first new overlap is reported
/// with the offending waypoint's relative time. The robot's own radius is
/// added to every obstacle circle.
pub fn hit_dynamic(
    traj: &Trajectory,
    dynamic: &[DynamicObstacle],
    elapsed_s: f64,
) -> Option<f64> {
    let waypoints = traj.waypoints();

    let start = waypoints
        .iter()
        .position(|w| w.time_s > elapsed_s)
        .unwrap_or(waypoints.len());

    if start >= waypoints.len() {
        return None;
    }

    let start_abs_s = traj.start_time_s() + waypoints[start].time_s;
    let start_pos = waypoints[start].instant.position_m();

    let exempt: Vec<bool> = dynamic
        .iter()
        .map(|d| {
            d.circle_at(start_abs_s)
                .inflated(ROBOT_RADIUS_M)
                .contains(&start_pos)
        })
        .collect();

    for w in &waypoints[start..] {
        let abs_s = traj.start_time_s() + w.time_s;
        for (i, d) in dynamic.iter().enumerate() {
            if exempt[i] {
                continue;
            }
            if d.circle_at(abs_s)
                .inflated(ROBOT_RADIUS_M)
                .contains(&w.instant.position_m())
            {
                return Some(w.time_s);
            }
        }
    }

    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::Pose;
    use nalgebra::Point2;

    #[test]
    fn test_dynamic_obstacle_clamps_to_ends() {
        let mut traj = Trajectory::new();
        traj.set_start_time_s(10.0);
        traj.push(
            0.0,
            RobotInstant::stationary(Pose::new(Point2::new(0.0, 0.0), 0.0)),
        );
        traj.push(
            2.0,
            RobotInstant::stationary(Pose::new(Point2::new(2.0, 0.0), 0.0)),
        );

        let obs = DynamicObstacle {
            traj: &traj,
            radius_m: 0.1,
        };

        // Before the start, at the midpoint, and after the end
        assert!(obs.circle_at(5.0).contains(&Point2::new(0.0, 0.0)));
        assert!(obs.circle_at(11.0).contains(&Point2::new(1.0, 0.0)));
        assert!(obs.circle_at(20.0).contains(&Point2::new(2.0, 0.0)));
    }
}
