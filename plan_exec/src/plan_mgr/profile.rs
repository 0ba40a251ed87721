//! # Velocity profiling
//!
//! Turns a discrete, obstacle-free waypoint sequence into a
//! time-parameterized trajectory respecting the robot's velocity and
//! acceleration limits, with a heading profile blended from the start
//! heading to the goal heading along the path.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Point2, Vector2};

// Internal
use crate::geom::{Pose, Twist};
use crate::plan_mgr::request::RobotConstraints;
use crate::traj::{RobotInstant, Trajectory};
use util::maths::ang_sep;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum spacing between profiled waypoints. Input segments longer than
/// this are subdivided so the trapezoidal passes have room to ramp.
const MAX_SPACING_M: f64 = 0.10;

/// Paths shorter than this collapse to a stationary hold.
const MIN_PATH_LENGTH_M: f64 = 1e-6;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Profile a waypoint path into a trajectory.
///
/// `points_m` must start at the robot's current position and end at the goal
/// position. The start speed is taken from `start`, the final velocity and
/// heading from `goal`. When `smooth` is set the interior of the path is
/// rounded with one corner-cutting pass before profiling.
///
/// The result always carries a heading profile and a creation timestamp.
pub fn profile_path(
    points_m: &[Point2<f64>],
    start: &RobotInstant,
    goal: &RobotInstant,
    constraints: &RobotConstraints,
    now_s: f64,
    smooth: bool,
) -> Trajectory {
    let points = if smooth {
        subdivide(&chaikin(points_m))
    } else {
        subdivide(points_m)
    };

    // Cumulative arc length
    let mut dist_m = vec![0.0; points.len()];
    for i in 1..points.len() {
        dist_m[i] = dist_m[i - 1] + (points[i] - points[i - 1]).norm();
    }
    let total_m = *dist_m.last().unwrap_or(&0.0);

    let goal_heading_rad = goal.pose.heading_rad;

    if points.len() < 2 || total_m < MIN_PATH_LENGTH_M {
        // Nothing to drive, hold at the goal heading
        let pose = Pose::new(
            points.last().copied().unwrap_or(start.position_m()),
            goal_heading_rad,
        );
        let mut traj = Trajectory::hold(RobotInstant::stationary(pose), now_s);
        traj.set_angles_valid(true);
        traj.stamp(now_s);
        return traj;
    }

    // Trapezoidal speed profile: seed the endpoints, cap at the speed limit,
    // then forward/backward passes bound each step by the acceleration limit
    let n = points.len();
    let mut speed_mps = vec![constraints.max_speed_mps; n];
    speed_mps[0] = start.twist.linear_mps.norm().min(constraints.max_speed_mps);
    speed_mps[n - 1] = goal.twist.linear_mps.norm().min(constraints.max_speed_mps);

    for i in 1..n {
        let ds = dist_m[i] - dist_m[i - 1];
        let reachable =
            (speed_mps[i - 1].powi(2) + 2.0 * constraints.max_accel_mps2 * ds).sqrt();
        speed_mps[i] = speed_mps[i].min(reachable);
    }
    for i in (0..n - 1).rev() {
        let ds = dist_m[i + 1] - dist_m[i];
        let reachable =
            (speed_mps[i + 1].powi(2) + 2.0 * constraints.max_accel_mps2 * ds).sqrt();
        speed_mps[i] = speed_mps[i].min(reachable);
    }

    // Segment times from average speeds, guarded against a fully stationary
    // segment (short path with zero end speeds)
    let mut time_s = vec![0.0; n];
    for i in 1..n {
        let ds = dist_m[i] - dist_m[i - 1];
        let avg = ((speed_mps[i - 1] + speed_mps[i]) * 0.5)
            .max((constraints.max_accel_mps2 * ds).sqrt() * 0.5)
            .max(1e-6);
        time_s[i] = time_s[i - 1] + ds / avg;
    }

    // Heading profile blended along the path, shortest way round
    let heading_delta_rad = ang_sep(start.pose.heading_rad, goal_heading_rad);
    let heading = |frac: f64| start.pose.heading_rad + heading_delta_rad * frac;

    let mut traj = Trajectory::new();
    traj.set_start_time_s(now_s);

    for i in 0..n {
        let frac = dist_m[i] / total_m;
        let heading_rad = heading(frac);

        let dir: Vector2<f64> = if i < n - 1 {
            let seg = points[i + 1] - points[i];
            let norm = seg.norm();
            if norm > 1e-9 {
                seg / norm
            } else {
                Vector2::zeros()
            }
        } else {
            let seg = points[i] - points[i - 1];
            let norm = seg.norm();
            if norm > 1e-9 {
                seg / norm
            } else {
                Vector2::zeros()
            }
        };

        let twist = if i == n - 1 {
            // Terminal velocity matches the commanded goal exactly
            goal.twist
        } else {
            let dt = time_s[i + 1] - time_s[i];
            let angular = if dt > 1e-9 {
                let next_frac = dist_m[i + 1] / total_m;
                (heading(next_frac) - heading_rad) / dt
            } else {
                0.0
            };
            Twist::new(dir * speed_mps[i], angular)
        };

        traj.push(
            time_s[i],
            RobotInstant::new(Pose::new(points[i], heading_rad), twist),
        );
    }

    traj.set_angles_valid(true);
    traj.stamp(now_s);
    traj
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Subdivide segments longer than [`MAX_SPACING_M`].
fn subdivide(points_m: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut out = Vec::new();

    for pair in points_m.windows(2) {
        let seg = pair[1] - pair[0];
        let len = seg.norm();
        let pieces = (len / MAX_SPACING_M).ceil().max(1.0) as usize;

        for j in 0..pieces {
            out.push(pair[0] + seg * (j as f64 / pieces as f64));
        }
    }

    if let Some(last) = points_m.last() {
        out.push(*last);
    }

    out
}

/// One corner-cutting pass over the interior of the path. Endpoints are
/// preserved.
fn chaikin(points_m: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if points_m.len() < 3 {
        return points_m.to_vec();
    }

    let mut out = vec![points_m[0]];
    for pair in points_m.windows(2) {
        out.push(pair[0] + (pair[1] - pair[0]) * 0.25);
        out.push(pair[0] + (pair[1] - pair[0]) * 0.75);
    }
    out.push(*points_m.last().unwrap());
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_profile_respects_limits() {
        let start = RobotInstant::stationary(Pose::new(Point2::new(0.0, 0.0), 0.0));
        let goal = RobotInstant::stationary(Pose::new(Point2::new(5.0, 0.0), 1.0));
        let constraints = RobotConstraints::default();

        let traj = profile_path(
            &[Point2::new(0.0, 0.0), Point2::new(5.0, 0.0)],
            &start,
            &goal,
            &constraints,
            0.0,
            false,
        );

        assert!(traj.angles_valid());
        assert!(traj.time_created_s().is_some());
        assert!(traj.num_waypoints() >= 2);

        // Times strictly increase and speeds stay within limits
        let mut prev_t = -1.0;
        for w in traj.waypoints() {
            assert!(w.time_s > prev_t);
            prev_t = w.time_s;
            assert!(w.instant.twist.linear_mps.norm() <= constraints.max_speed_mps + 1e-9);
        }

        // Starts and ends at rest, at the right places
        assert!(traj.start().unwrap().twist.linear_mps.norm() < 1e-9);
        assert!(traj.end().unwrap().twist.linear_mps.norm() < 1e-9);
        assert!((traj.end().unwrap().position_m() - Point2::new(5.0, 0.0)).norm() < 1e-9);
        assert!((traj.end().unwrap().pose.heading_rad - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_profile_degenerate_path_holds() {
        let start = RobotInstant::stationary(Pose::new(Point2::new(1.0, 1.0), 0.0));
        let goal = RobotInstant::stationary(Pose::new(Point2::new(1.0, 1.0), 0.5));

        let traj = profile_path(
            &[Point2::new(1.0, 1.0), Point2::new(1.0, 1.0)],
            &start,
            &goal,
            &RobotConstraints::default(),
            2.0,
            false,
        );

        assert_eq!(traj.num_waypoints(), 1);
        assert!(traj.angles_valid());
        assert!(traj.time_created_s().is_some());
        assert_eq!(traj.start_time_s(), 2.0);
    }
}
