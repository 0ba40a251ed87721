//! # Line-kick planner
//!
//! Plans a kick along the line from the ball to a target point. The robot
//! first stages at a standoff point behind the ball on that line, avoiding
//! the ball on the way in, then makes a straight final approach through the
//! ball at the configured kick approach speed. A robot that drifts away
//! from the ball, or a kick target that moves, re-arms the staging phase.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use super::path_target::PathTargetPlanner;
use super::Planner;
use crate::geom::{Pose, Twist};
use crate::goal::MotionGoal;
use crate::plan_mgr::request::PlanRequest;
use crate::traj::{RobotInstant, Trajectory};
use crate::world::{BALL_RADIUS_M, ROBOT_RADIUS_M};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineKickParams {
    /// Standoff behind the ball on the kick line, beyond contact distance.
    pub stage_dist_m: f64,

    /// Position tolerance for the staging point.
    pub stage_tolerance_m: f64,

    /// Speed below which staging counts as settled.
    pub stage_speed_tolerance_mps: f64,

    /// Speed driven through the ball on the final approach.
    pub approach_speed_mps: f64,

    /// How far past the ball centre the final approach aims.
    pub overshoot_m: f64,

    /// Distance from the ball above which the final approach re-arms.
    pub rearm_dist_m: f64,

    /// Kick-target movement which invalidates an armed final approach.
    pub target_change_tolerance_m: f64,
}

pub struct LineKickPlanner {
    params: LineKickParams,

    /// True once the robot is staged and driving through the ball.
    final_approach: bool,

    /// Kick target the final approach was armed for.
    target_kick_pos: Option<Point2<f64>>,

    path_target: PathTargetPlanner,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LineKickParams {
    fn default() -> Self {
        Self {
            stage_dist_m: 0.15,
            stage_tolerance_m: 0.05,
            stage_speed_tolerance_mps: 0.2,
            approach_speed_mps: 0.5,
            overshoot_m: 0.05,
            rearm_dist_m: 0.5,
            target_change_tolerance_m: 0.1,
        }
    }
}

impl LineKickPlanner {
    pub fn new(params: LineKickParams, path_target: PathTargetPlanner) -> Self {
        Self {
            params,
            final_approach: false,
            target_kick_pos: None,
            path_target,
        }
    }
}

impl Planner for LineKickPlanner {
    fn name(&self) -> &'static str {
        "LineKickPlanner"
    }

    fn is_applicable(&self, goal: &MotionGoal) -> bool {
        matches!(goal, MotionGoal::LineKick { .. })
    }

    fn plan(&mut self, req: &mut PlanRequest) -> Trajectory {
        let target_m = match req.goal {
            MotionGoal::LineKick { target_m } => target_m,
            _ => return Trajectory::new(),
        };

        let ball = req.world.ball;
        let robot_pos = req.start.position_m();
        let contact_m = ROBOT_RADIUS_M + BALL_RADIUS_M;

        let to_target = target_m - ball.position_m;
        let kick_dir: Vector2<f64> = if to_target.norm() > 1e-6 {
            to_target / to_target.norm()
        } else {
            Vector2::new(
                req.start.pose.heading_rad.cos(),
                req.start.pose.heading_rad.sin(),
            )
        };

        let stage_pos = ball.position_m - kick_dir * (contact_m + self.params.stage_dist_m);
        let heading_rad = kick_dir.y.atan2(kick_dir.x);

        // Re-arm if the ball got away or the kick target moved
        if self.final_approach {
            let drifted = (robot_pos - ball.position_m).norm() > self.params.rearm_dist_m;
            let retargeted = self
                .target_kick_pos
                .map(|t| (t - target_m).norm() > self.params.target_change_tolerance_m)
                .unwrap_or(true);

            if drifted || retargeted {
                self.final_approach = false;
                self.target_kick_pos = None;
            }
        }

        if !self.final_approach
            && (robot_pos - stage_pos).norm() <= self.params.stage_tolerance_m
            && req.start.twist.linear_mps.norm() <= self.params.stage_speed_tolerance_mps
        {
            self.final_approach = true;
            self.target_kick_pos = Some(target_m);
        }

        let constraints = req.constraints;

        if self.final_approach {
            // Straight through the ball towards the kick target
            let goal = RobotInstant::new(
                Pose::new(
                    ball.position_m + kick_dir * self.params.overshoot_m,
                    heading_rad,
                ),
                Twist::new(kick_dir * self.params.approach_speed_mps, 0.0),
            );
            self.path_target
                .plan_to_goal(req, &goal, &constraints, false, true)
        } else {
            // Stage behind the ball, avoiding it on the way
            let goal = RobotInstant::stationary(Pose::new(stage_pos, heading_rad));
            self.path_target
                .plan_to_goal(req, &goal, &constraints, true, false)
        }
    }

    fn reset(&mut self) {
        self.final_approach = false;
        self.target_kick_pos = None;
        self.path_target.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::ShapeSet;
    use crate::plan_mgr::planners::path_target::PathTargetParams;
    use crate::plan_mgr::request::RobotConstraints;
    use crate::plan_mgr::search::{RrtSearch, SearchParams};
    use crate::world::{WorldSnapshot, NUM_SLOTS};

    fn make_planner() -> LineKickPlanner {
        LineKickPlanner::new(
            LineKickParams::default(),
            PathTargetPlanner::new(
                PathTargetParams::default(),
                Box::new(RrtSearch::new(SearchParams::default())),
            ),
        )
    }

    #[test]
    fn test_stages_then_kicks() {
        let mut planner = make_planner();

        let mut world = WorldSnapshot::default();
        world.ball.position_m = Point2::new(0.0, 0.0);

        let target = Point2::new(2.0, 0.0);
        let contact = ROBOT_RADIUS_M + BALL_RADIUS_M;
        let stage_x = -(contact + LineKickParams::default().stage_dist_m);

        let field = ShapeSet::new();
        let local = ShapeSet::new();
        let planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();

        // Far from the staging point: the plan ends there, no kick yet
        let traj = {
            let mut req = PlanRequest {
                start: RobotInstant::stationary(Pose::new(Point2::new(-1.0, 1.0), 0.0)),
                goal: MotionGoal::LineKick { target_m: target },
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
        assert!(!traj.is_empty());
        assert!(!planner.final_approach);
        let end = traj.end().unwrap().position_m();
        assert!((end - Point2::new(stage_x, 0.0)).norm() < 1e-6);

        // At the staging point and settled: final approach drives through
        // the ball towards the target
        let traj = {
            let mut req = PlanRequest {
                start: RobotInstant::stationary(Pose::new(Point2::new(stage_x, 0.0), 0.0)),
                goal: MotionGoal::LineKick { target_m: target },
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
        assert!(planner.final_approach);

        let end = traj.end().unwrap();
        assert!(end.position_m().x > 0.0);
        let speed = LineKickParams::default().approach_speed_mps;
        assert!((end.twist.linear_mps - Vector2::new(speed, 0.0)).norm() < 1e-9);
    }
}
