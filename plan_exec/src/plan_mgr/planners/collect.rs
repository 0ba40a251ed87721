//! # Collect planner
//!
//! Moves onto and gains control of the ball. The behaviour is a three state
//! machine:
//!
//! - `Approach`: coarse, fast movement to a point just short of the ball.
//! - `Touch`: fine approach, arriving at the ball with a small speed delta
//!   so contact doesn't knock it away.
//! - `Control`: drive through the ball at reduced acceleration, matching its
//!   velocity and decelerating to a stop with the ball possessed.
//!
//! Any state drops back to `Approach` if the ball gets away again. The ball
//! velocity is exponentially smoothed across cycles before use, since the
//! frame-to-frame vision estimate is noisy.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use super::path_target::PathTargetPlanner;
use super::Planner;
use crate::geom::Pose;
use crate::goal::MotionGoal;
use crate::plan_mgr::request::PlanRequest;
use crate::traj::{RobotInstant, Trajectory};
use crate::world::{BALL_RADIUS_M, ROBOT_RADIUS_M};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectParams {
    /// Ball speed below which the robot aims straight at the ball, above
    /// which it aims behind the ball along its velocity to intercept.
    pub ball_speed_approach_cutoff_mps: f64,

    /// Acceleration scale used from the start of the approach until contact.
    pub approach_accel_scale: f64,

    /// Acceleration scale used from contact to full stop. Lower this if the
    /// robot decelerates too hard for the dribbler to keep back spin on.
    pub control_accel_scale: f64,

    /// Extra standoff short of contact targeted by the coarse approach.
    pub approach_dist_target_m: f64,

    /// Speed delta relative to the ball at the moment of contact.
    pub touch_delta_speed_mps: f64,

    /// Distance above which the behaviour restarts from `Approach`.
    pub dist_cutoff_to_approach_m: f64,

    /// Distance below which `Touch` may hand over to `Control`.
    pub dist_cutoff_to_control_m: f64,

    /// Speed error below which `Touch` may hand over to `Control`.
    pub vel_cutoff_to_control_mps: f64,

    /// Scale on the minimum stopping distance driven through the ball while
    /// in `Control`.
    pub stop_dist_scale: f64,

    /// Exponential smoothing gain for the ball velocity,
    /// `a*new + (1-a)*old`.
    pub ball_vel_gain: f64,
}

pub struct CollectPlanner {
    params: CollectParams,
    state: CollectState,

    /// Smoothed ball velocity, reset when the planner becomes inapplicable.
    avg_ball_vel_mps: Option<Vector2<f64>>,

    path_target: PathTargetPlanner,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectState {
    Approach,
    Touch,
    Control,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CollectParams {
    fn default() -> Self {
        Self {
            ball_speed_approach_cutoff_mps: 0.2,
            approach_accel_scale: 0.7,
            control_accel_scale: 0.5,
            approach_dist_target_m: 0.04,
            touch_delta_speed_mps: 0.1,
            dist_cutoff_to_approach_m: 0.3,
            dist_cutoff_to_control_m: 0.05,
            vel_cutoff_to_control_mps: 0.3,
            stop_dist_scale: 0.6,
            ball_vel_gain: 0.8,
        }
    }
}

impl CollectPlanner {
    pub fn new(params: CollectParams, path_target: PathTargetPlanner) -> Self {
        Self {
            params,
            state: CollectState::Approach,
            avg_ball_vel_mps: None,
            path_target,
        }
    }

    pub fn state(&self) -> CollectState {
        self.state
    }

    fn smooth_ball_vel(&mut self, vel_mps: Vector2<f64>) -> Vector2<f64> {
        let avg = match self.avg_ball_vel_mps {
            Some(old) => vel_mps * self.params.ball_vel_gain
                + old * (1.0 - self.params.ball_vel_gain),
            None => vel_mps,
        };
        self.avg_ball_vel_mps = Some(avg);
        avg
    }

    fn process_transitions(&mut self, dist_m: f64, speed_err_mps: f64) {
        // A missed attempt restarts the behaviour
        if dist_m > self.params.dist_cutoff_to_approach_m {
            self.state = CollectState::Approach;
        }

        if self.state == CollectState::Approach && dist_m <= self.params.dist_cutoff_to_approach_m
        {
            self.state = CollectState::Touch;
        }

        if self.state == CollectState::Touch
            && dist_m <= self.params.dist_cutoff_to_control_m
            && speed_err_mps <= self.params.vel_cutoff_to_control_mps
        {
            self.state = CollectState::Control;
        }
    }
}

impl Planner for CollectPlanner {
    fn name(&self) -> &'static str {
        "CollectPlanner"
    }

    fn is_applicable(&self, goal: &MotionGoal) -> bool {
        matches!(goal, MotionGoal::Collect)
    }

    fn plan(&mut self, req: &mut PlanRequest) -> Trajectory {
        if !matches!(req.goal, MotionGoal::Collect) {
            return Trajectory::new();
        }

        let ball = req.world.ball;
        let avg_vel = self.smooth_ball_vel(ball.velocity_mps);
        let ball_speed = avg_vel.norm();

        let robot_pos = req.start.position_m();
        let to_ball = ball.position_m - robot_pos;
        let contact_m = ROBOT_RADIUS_M + BALL_RADIUS_M;
        let dist_m = (to_ball.norm() - contact_m).max(0.0);

        let robot_speed = req.start.twist.linear_mps.norm();
        let target_speed = ball_speed + self.params.touch_delta_speed_mps;
        let speed_err_mps = (robot_speed - target_speed).abs();

        self.process_transitions(dist_m, speed_err_mps);

        // Approach direction blends "straight at the ball" with "in behind
        // along its velocity", weighted by how fast the ball is moving
        let dir_to_ball = if to_ball.norm() > 1e-6 {
            to_ball / to_ball.norm()
        } else {
            Vector2::new(req.start.pose.heading_rad.cos(), req.start.pose.heading_rad.sin())
        };
        let vel_dir = if ball_speed > 1e-6 {
            avg_vel / ball_speed
        } else {
            dir_to_ball
        };
        let blend = (ball_speed / self.params.ball_speed_approach_cutoff_mps).min(1.0);
        let approach_dir = {
            let mixed = dir_to_ball * (1.0 - blend) + vel_dir * blend;
            if mixed.norm() > 1e-6 {
                mixed / mixed.norm()
            } else {
                dir_to_ball
            }
        };

        let heading_rad = to_ball.y.atan2(to_ball.x);

        match self.state {
            CollectState::Approach => {
                let target_m = ball.position_m
                    - approach_dir * (contact_m + self.params.approach_dist_target_m);
                let goal = RobotInstant::new(
                    Pose::new(target_m, heading_rad),
                    crate::geom::Twist::new(avg_vel, 0.0),
                );
                let constraints = req
                    .constraints
                    .scaled_accel(self.params.approach_accel_scale);
                self.path_target
                    .plan_to_goal(req, &goal, &constraints, true, false)
            }
            CollectState::Touch => {
                let target_m = ball.position_m - approach_dir * contact_m;
                let touch_vel =
                    avg_vel + approach_dir * self.params.touch_delta_speed_mps;
                let goal = RobotInstant::new(
                    Pose::new(target_m, heading_rad),
                    crate::geom::Twist::new(touch_vel, 0.0),
                );
                let constraints = req
                    .constraints
                    .scaled_accel(self.params.approach_accel_scale);
                self.path_target
                    .plan_to_goal(req, &goal, &constraints, false, true)
            }
            CollectState::Control => {
                // Drive through the ball far enough to stop with it held
                let accel = (req.constraints.max_accel_mps2 * self.params.control_accel_scale)
                    .max(1e-6);
                let speed = robot_speed.max(ball_speed);
                let stop_dist_m =
                    contact_m + self.params.stop_dist_scale * speed.powi(2) / (2.0 * accel);

                let target_m = ball.position_m + approach_dir * stop_dist_m;
                let goal = RobotInstant::stationary(Pose::new(target_m, heading_rad));
                let constraints = req
                    .constraints
                    .scaled_accel(self.params.control_accel_scale);
                self.path_target
                    .plan_to_goal(req, &goal, &constraints, false, true)
            }
        }
    }

    fn reset(&mut self) {
        self.state = CollectState::Approach;
        self.avg_ball_vel_mps = None;
        self.path_target.reset();
    }
}
