//! # World-velocity planner
//!
//! Holds a commanded world-frame velocity for a short horizon. The output is
//! re-issued every cycle from the robot's fresh state, so the horizon only
//! needs to outlast one control period.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::Planner;
use crate::geom::{Pose, Twist};
use crate::goal::MotionGoal;
use crate::plan_mgr::request::PlanRequest;
use crate::traj::{RobotInstant, Trajectory};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldVelParams {
    /// How far ahead the constant-velocity segment extends.
    pub horizon_s: f64,
}

pub struct WorldVelPlanner {
    params: WorldVelParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for WorldVelParams {
    fn default() -> Self {
        Self { horizon_s: 0.5 }
    }
}

impl WorldVelPlanner {
    pub fn new(params: WorldVelParams) -> Self {
        Self { params }
    }
}

impl Planner for WorldVelPlanner {
    fn name(&self) -> &'static str {
        "WorldVelPlanner"
    }

    fn is_applicable(&self, goal: &MotionGoal) -> bool {
        matches!(goal, MotionGoal::WorldVel { .. })
    }

    fn plan(&mut self, req: &mut PlanRequest) -> Trajectory {
        let vel = match &req.goal {
            MotionGoal::WorldVel { vel } => *vel,
            _ => return Trajectory::new(),
        };

        // Saturate the command against the robot's limits
        let linear = {
            let speed = vel.linear_mps.norm();
            if speed > req.constraints.max_speed_mps {
                vel.linear_mps * (req.constraints.max_speed_mps / speed)
            } else {
                vel.linear_mps
            }
        };
        let angular = vel
            .angular_radps
            .max(-req.constraints.max_ang_speed_radps)
            .min(req.constraints.max_ang_speed_radps);
        let twist = Twist::new(linear, angular);

        let horizon_s = self.params.horizon_s;
        let start_pose = req.start.pose;

        let mut traj = Trajectory::new();
        traj.set_start_time_s(req.now_s);
        traj.push(0.0, RobotInstant::new(start_pose, twist));
        traj.push(
            horizon_s,
            RobotInstant::new(
                Pose::new(
                    start_pose.position_m + linear * horizon_s,
                    start_pose.heading_rad + angular * horizon_s,
                ),
                twist,
            ),
        );

        traj.set_angles_valid(true);
        traj.stamp(req.now_s);
        traj
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::ShapeSet;
    use crate::plan_mgr::request::RobotConstraints;
    use crate::world::{WorldSnapshot, NUM_SLOTS};
    use nalgebra::{Point2, Vector2};

    #[test]
    fn test_holds_commanded_velocity() {
        let mut planner = WorldVelPlanner::new(WorldVelParams::default());

        let world = WorldSnapshot::default();
        let field = ShapeSet::new();
        let local = ShapeSet::new();
        let planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();

        let mut req = PlanRequest {
            start: RobotInstant::stationary(Pose::new(Point2::new(1.0, 1.0), 0.0)),
            goal: MotionGoal::WorldVel {
                vel: Twist::new(Vector2::new(1.0, 0.0), 0.0),
            },
            constraints: RobotConstraints::default(),
            field_obstacles: &field,
            virtual_obstacles: &local,
            planned: &planned,
            slot: 0,
            world: &world,
            priority: 0,
            now_s: 0.0,
            sink: None,
        };

        let traj = planner.plan(&mut req);
        assert_eq!(traj.num_waypoints(), 2);

        let mid = traj.eval(0.25).unwrap();
        assert!((mid.twist.linear_mps - Vector2::new(1.0, 0.0)).norm() < 1e-9);
        assert!((mid.position_m() - Point2::new(1.25, 1.0)).norm() < 1e-9);
    }

    #[test]
    fn test_saturates_overspeed_command() {
        let mut planner = WorldVelPlanner::new(WorldVelParams::default());

        let world = WorldSnapshot::default();
        let field = ShapeSet::new();
        let local = ShapeSet::new();
        let planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();

        let constraints = RobotConstraints::default();
        let mut req = PlanRequest {
            start: RobotInstant::stationary(Pose::default()),
            goal: MotionGoal::WorldVel {
                vel: Twist::new(Vector2::new(100.0, 0.0), 0.0),
            },
            constraints,
            field_obstacles: &field,
            virtual_obstacles: &local,
            planned: &planned,
            slot: 0,
            world: &world,
            priority: 0,
            now_s: 0.0,
            sink: None,
        };

        let traj = planner.plan(&mut req);
        let speed = traj.start().unwrap().twist.linear_mps.norm();
        assert!((speed - constraints.max_speed_mps).abs() < 1e-9);
    }
}
