//! # Settle planner
//!
//! Intercepts a moving ball and dampens it. The planner scans along the
//! ball's predicted line for the earliest point the robot can reach before
//! the ball does, then drives there arriving with a small fraction of the
//! ball's velocity so the impact is absorbed rather than bounced.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
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
pub struct SettleParams {
    /// Exponential smoothing gain for the ball velocity.
    pub ball_vel_gain: f64,

    /// Ball speeds below this are treated as stationary and met in place.
    pub slow_ball_speed_mps: f64,

    /// How far ahead along the ball line to look for an intercept.
    pub max_intercept_time_s: f64,

    /// Scan step along the ball line.
    pub intercept_step_s: f64,

    /// Travel-time margin required on top of the straight-line estimate.
    pub reach_margin_s: f64,

    /// Fraction of the ball velocity to carry at the moment of contact.
    pub damp_vel_scale: f64,
}

pub struct SettlePlanner {
    params: SettleParams,

    /// Smoothed ball velocity, cleared on reset.
    avg_ball_vel_mps: Option<Vector2<f64>>,

    path_target: PathTargetPlanner,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SettleParams {
    fn default() -> Self {
        Self {
            ball_vel_gain: 0.8,
            slow_ball_speed_mps: 0.15,
            max_intercept_time_s: 4.0,
            intercept_step_s: 0.1,
            reach_margin_s: 0.1,
            damp_vel_scale: 0.3,
        }
    }
}

impl SettlePlanner {
    pub fn new(params: SettleParams, path_target: PathTargetPlanner) -> Self {
        Self {
            params,
            avg_ball_vel_mps: None,
            path_target,
        }
    }

    fn smooth_ball_vel(&mut self, vel_mps: Vector2<f64>) -> Vector2<f64> {
        let avg = match self.avg_ball_vel_mps {
            Some(old) => {
                vel_mps * self.params.ball_vel_gain + old * (1.0 - self.params.ball_vel_gain)
            }
            None => vel_mps,
        };
        self.avg_ball_vel_mps = Some(avg);
        avg
    }
}

impl Planner for SettlePlanner {
    fn name(&self) -> &'static str {
        "SettlePlanner"
    }

    fn is_applicable(&self, goal: &MotionGoal) -> bool {
        matches!(goal, MotionGoal::Settle)
    }

    fn plan(&mut self, req: &mut PlanRequest) -> Trajectory {
        if !matches!(req.goal, MotionGoal::Settle) {
            return Trajectory::new();
        }

        let ball = req.world.ball;
        let avg_vel = self.smooth_ball_vel(ball.velocity_mps);
        let ball_speed = avg_vel.norm();

        let robot_pos = req.start.position_m();
        let contact_m = ROBOT_RADIUS_M + BALL_RADIUS_M;

        let (target_m, face_dir, arrive_vel) = if ball_speed < self.params.slow_ball_speed_mps {
            // Slow ball: meet it where it lies
            let to_ball = ball.position_m - robot_pos;
            let dir = if to_ball.norm() > 1e-6 {
                to_ball / to_ball.norm()
            } else {
                Vector2::new(1.0, 0.0)
            };
            (ball.position_m - dir * contact_m, dir, Vector2::zeros())
        } else {
            // Moving ball: earliest point on its line we can beat it to
            let vel_dir = avg_vel / ball_speed;
            let max_speed = req.constraints.max_speed_mps.max(1e-6);

            let mut intercept_m = ball.position_m + avg_vel * self.params.max_intercept_time_s;
            let mut t_s = self.params.intercept_step_s;
            while t_s <= self.params.max_intercept_time_s {
                let candidate = ball.position_m + avg_vel * t_s;
                let standoff = candidate + vel_dir * contact_m;
                let travel_s = (standoff - robot_pos).norm() / max_speed;
                if travel_s + self.params.reach_margin_s <= t_s {
                    intercept_m = candidate;
                    break;
                }
                t_s += self.params.intercept_step_s;
            }

            (
                intercept_m + vel_dir * contact_m,
                -vel_dir,
                avg_vel * self.params.damp_vel_scale,
            )
        };

        // Face the incoming ball
        let heading_rad = face_dir.y.atan2(face_dir.x);

        let goal = RobotInstant::new(
            Pose::new(target_m, heading_rad),
            Twist::new(arrive_vel, 0.0),
        );

        let constraints = req.constraints;
        self.path_target
            .plan_to_goal(req, &goal, &constraints, false, false)
    }

    fn reset(&mut self) {
        self.avg_ball_vel_mps = None;
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
    use nalgebra::Point2;

    #[test]
    fn test_intercepts_ahead_of_moving_ball() {
        let mut planner = SettlePlanner::new(
            SettleParams::default(),
            PathTargetPlanner::new(
                PathTargetParams::default(),
                Box::new(RrtSearch::new(SearchParams::default())),
            ),
        );

        let mut world = WorldSnapshot::default();
        world.ball.position_m = Point2::new(0.0, 2.0);
        world.ball.velocity_mps = Vector2::new(1.0, 0.0);

        let field = ShapeSet::new();
        let local = ShapeSet::new();
        let planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();

        let mut req = PlanRequest {
            start: RobotInstant::stationary(Pose::new(Point2::new(1.0, 0.0), 0.0)),
            goal: MotionGoal::Settle,
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

        let traj = planner.plan(&mut req);
        assert!(!traj.is_empty());

        // The intercept point lies ahead of the ball along +X, and the robot
        // arrives moving with (a fraction of) the ball's velocity
        let end = traj.end().unwrap();
        assert!(end.position_m().x > world.ball.position_m.x);
        assert!((end.position_m().y - 2.0).abs() < 0.2);
        let damp = SettleParams::default().damp_vel_scale;
        assert!((end.twist.linear_mps - Vector2::new(damp, 0.0)).norm() < 1e-9);
    }
}
