//! # Path-target planner
//!
//! Plans obstacle-avoiding trajectories to a target instant. Each cycle the
//! previous cycle's trajectory is trimmed to the current time and reused if
//! the goal hasn't moved and the remainder is still collision-free;
//! otherwise the sampling search collaborator is invoked and its waypoints
//! are profiled into a fresh trajectory.
//!
//! Also serves direct (unsearched, unsmoothed) targets and tuning paths,
//! and acts as the movement delegate for the ball-handling planners.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::Planner;
use crate::goal::MotionGoal;
use crate::plan_mgr::profile::profile_path;
use crate::plan_mgr::request::{fill_obstacles, hit_dynamic, PlanRequest, RobotConstraints};
use crate::plan_mgr::search::PathSearch;
use crate::traj::{RobotInstant, Trajectory};
use crate::world::ROBOT_RADIUS_M;
use util::maths::ang_sep;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathTargetParams {
    /// Goal position change below which the previous plan may be reused.
    pub goal_pos_tolerance_m: f64,

    /// Goal heading change below which the previous plan may be reused.
    pub goal_heading_tolerance_rad: f64,

    /// Goal velocity change below which the previous plan may be reused.
    pub goal_vel_tolerance_mps: f64,
}

pub struct PathTargetPlanner {
    params: PathTargetParams,
    search: Box<dyn PathSearch>,

    /// The previous cycle's trajectory, candidate for reuse.
    previous: Option<Trajectory>,

    /// The goal the previous trajectory was planned for.
    previous_goal: Option<RobotInstant>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PathTargetParams {
    fn default() -> Self {
        Self {
            goal_pos_tolerance_m: 0.05,
            goal_heading_tolerance_rad: 0.1,
            goal_vel_tolerance_mps: 0.2,
        }
    }
}

impl PathTargetPlanner {
    pub fn new(params: PathTargetParams, search: Box<dyn PathSearch>) -> Self {
        Self {
            params,
            search,
            previous: None,
            previous_goal: None,
        }
    }

    fn goal_unchanged(&self, a: &RobotInstant, b: &RobotInstant) -> bool {
        (a.position_m() - b.position_m()).norm() <= self.params.goal_pos_tolerance_m
            && ang_sep(a.pose.heading_rad, b.pose.heading_rad).abs()
                <= self.params.goal_heading_tolerance_rad
            && (a.twist.linear_mps - b.twist.linear_mps).norm()
                <= self.params.goal_vel_tolerance_mps
    }

    /// Plan towards an explicit goal instant.
    ///
    /// This is the shared entry point used both for path-target goals and by
    /// the ball-handling planners, which synthesize their own goal and
    /// constraint scaling. `direct` skips the search and smoothing stages
    /// and drives a straight line.
    pub fn plan_to_goal(
        &mut self,
        req: &mut PlanRequest,
        goal: &RobotInstant,
        constraints: &RobotConstraints,
        avoid_ball: bool,
        direct: bool,
    ) -> Trajectory {
        let start_pos = req.start.position_m();

        let mut ball_storage = None;
        let (static_set, dynamic) = fill_obstacles(req, avoid_ball, &mut ball_storage);
        let inflated = static_set.inflated(ROBOT_RADIUS_M);

        // Reuse the previous plan if the goal hasn't moved and the remainder
        // of the path is still clear of the current obstacle set
        if let (Some(prev), Some(prev_goal)) = (&self.previous, &self.previous_goal) {
            if self.goal_unchanged(prev_goal, goal) {
                let elapsed_s = req.now_s - prev.start_time_s();

                if elapsed_s >= 0.0 && elapsed_s < prev.duration_s() {
                    if let Ok(trimmed) = prev.sub_trajectory(elapsed_s, prev.duration_s()) {
                        if !trimmed.is_empty()
                            && trimmed.hit(&inflated, 0.0).is_none()
                            && hit_dynamic(&trimmed, &dynamic, 0.0).is_none()
                        {
                            self.previous = Some(trimmed.clone());
                            return trimmed;
                        }
                    }
                }
            }
        }

        // Replan from scratch
        let points = if direct {
            vec![start_pos, goal.position_m()]
        } else {
            self.search.search(start_pos, goal.position_m(), &inflated)
        };

        if points.len() < 2 {
            self.previous = None;
            self.previous_goal = None;
            return Trajectory::new();
        }

        let mut traj = profile_path(&points, &req.start, goal, constraints, req.now_s, !direct);

        // If the candidate runs into a moving obstacle, retry the search once
        // with each offender frozen at its conflict-time position
        if !direct {
            if let Some(hit_s) = hit_dynamic(&traj, &dynamic, 0.0) {
                let mut blocked = inflated.clone();
                for d in &dynamic {
                    blocked.add(d.circle_at(req.now_s + hit_s).inflated(ROBOT_RADIUS_M));
                }

                let retry = self.search.search(start_pos, goal.position_m(), &blocked);
                if retry.len() >= 2 {
                    let candidate =
                        profile_path(&retry, &req.start, goal, constraints, req.now_s, true);
                    if hit_dynamic(&candidate, &dynamic, 0.0).is_none() {
                        traj = candidate;
                    }
                }
            }
        }

        self.previous = Some(traj.clone());
        self.previous_goal = Some(*goal);
        traj
    }
}

impl Planner for PathTargetPlanner {
    fn name(&self) -> &'static str {
        "PathTargetPlanner"
    }

    fn is_applicable(&self, goal: &MotionGoal) -> bool {
        matches!(
            goal,
            MotionGoal::PathTarget { .. }
                | MotionGoal::DirectPathTarget { .. }
                | MotionGoal::TuningPath { .. }
        )
    }

    fn plan(&mut self, req: &mut PlanRequest) -> Trajectory {
        let (goal, direct) = match &req.goal {
            MotionGoal::PathTarget { goal } => (*goal, false),
            MotionGoal::DirectPathTarget { goal } => (*goal, true),
            MotionGoal::TuningPath { goal } => (*goal, true),
            _ => return Trajectory::new(),
        };

        let constraints = req.constraints;
        self.plan_to_goal(req, &goal, &constraints, false, direct)
    }

    fn reset(&mut self) {
        self.previous = None;
        self.previous_goal = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::{Pose, ShapeSet};
    use crate::world::{WorldSnapshot, NUM_SLOTS};
    use nalgebra::Point2;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Search stub which counts invocations and returns a straight line.
    struct CountingSearch {
        calls: Arc<AtomicUsize>,
    }

    impl PathSearch for CountingSearch {
        fn search(
            &mut self,
            start_m: Point2<f64>,
            goal_m: Point2<f64>,
            _obstacles: &ShapeSet,
        ) -> Vec<Point2<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![start_m, goal_m]
        }
    }

    #[test]
    fn test_unchanged_goal_reuses_without_search() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut planner = PathTargetPlanner::new(
            PathTargetParams::default(),
            Box::new(CountingSearch {
                calls: calls.clone(),
            }),
        );

        let goal_instant =
            RobotInstant::stationary(Pose::new(Point2::new(3.0, 0.0), 0.0));
        let goal = MotionGoal::PathTarget { goal: goal_instant };

        let mut world = WorldSnapshot::default();
        world.our_robots[0].visible = true;

        let field = ShapeSet::new();
        let local = ShapeSet::new();
        let planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();

        // First cycle plans fresh
        let first = {
            let mut req = PlanRequest {
                start: RobotInstant::stationary(Pose::default()),
                goal: goal.clone(),
                constraints: RobotConstraints::default(),
                field_obstacles: &field,
                virtual_obstacles: &local,
                planned: &planned,
                slot: 0,
                world: &world,
                priority: 1,
                now_s: 0.0,
                sink: None,
            };
            planner.plan(&mut req)
        };

        assert!(!first.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Second cycle, a little later, same goal: the previous trajectory
        // is trimmed and reused, the search collaborator is not invoked
        world.timestamp_s = 0.1;
        let second = {
            let mut req = PlanRequest {
                start: first.eval(0.1).unwrap(),
                goal,
                constraints: RobotConstraints::default(),
                field_obstacles: &field,
                virtual_obstacles: &local,
                planned: &planned,
                slot: 0,
                world: &world,
                priority: 1,
                now_s: 0.1,
                sink: None,
            };
            planner.plan(&mut req)
        };

        assert!(!second.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!((second.start_time_s() - 0.1).abs() < 1e-9);
        assert!((second.duration_s() - (first.duration_s() - 0.1)).abs() < 1e-5);
    }

    #[test]
    fn test_changed_goal_replans() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut planner = PathTargetPlanner::new(
            PathTargetParams::default(),
            Box::new(CountingSearch {
                calls: calls.clone(),
            }),
        );

        let world = WorldSnapshot::default();
        let field = ShapeSet::new();
        let local = ShapeSet::new();
        let planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();

        for (now_s, x) in &[(0.0, 3.0), (0.1, -3.0)] {
            let mut req = PlanRequest {
                start: RobotInstant::stationary(Pose::default()),
                goal: MotionGoal::PathTarget {
                    goal: RobotInstant::stationary(Pose::new(Point2::new(*x, 0.0), 0.0)),
                },
                constraints: RobotConstraints::default(),
                field_obstacles: &field,
                virtual_obstacles: &local,
                planned: &planned,
                slot: 0,
                world: &world,
                priority: 1,
                now_s: *now_s,
                sink: None,
            };
            let traj = planner.plan(&mut req);
            assert!(!traj.is_empty());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
