//! # Escape-obstacles planner
//!
//! The unconditional fallback at the end of every planner chain. If the
//! robot finds itself inside a static obstacle it drives straight to the
//! nearest free point, found by sampling outwards in rings; otherwise it
//! holds position. Always applicable, never returns an empty trajectory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use super::Planner;
use crate::geom::Pose;
use crate::goal::MotionGoal;
use crate::plan_mgr::profile::profile_path;
use crate::plan_mgr::request::{fill_obstacles, PlanRequest};
use crate::traj::{RobotInstant, Trajectory};
use crate::world::ROBOT_RADIUS_M;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscapeParams {
    /// Radial spacing of the free-point search rings.
    pub radius_step_m: f64,

    /// Give-up radius for the free-point search.
    pub max_radius_m: f64,

    /// Number of directions sampled per ring.
    pub angle_samples: usize,
}

pub struct EscapePlanner {
    params: EscapeParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for EscapeParams {
    fn default() -> Self {
        Self {
            radius_step_m: 0.1,
            max_radius_m: 2.0,
            angle_samples: 16,
        }
    }
}

impl EscapePlanner {
    pub fn new(params: EscapeParams) -> Self {
        Self { params }
    }

    /// Sample outwards in rings for the nearest obstacle-free point.
    fn nearest_free_point(
        &self,
        from_m: Point2<f64>,
        obstacles: &crate::geom::ShapeSet,
    ) -> Option<Point2<f64>> {
        let mut radius_m = self.params.radius_step_m;

        while radius_m <= self.params.max_radius_m {
            for i in 0..self.params.angle_samples {
                let angle = std::f64::consts::TAU * i as f64 / self.params.angle_samples as f64;
                let candidate = from_m + Vector2::new(angle.cos(), angle.sin()) * radius_m;
                if !obstacles.contains(&candidate) {
                    return Some(candidate);
                }
            }
            radius_m += self.params.radius_step_m;
        }

        None
    }
}

impl Planner for EscapePlanner {
    fn name(&self) -> &'static str {
        "EscapeObstaclesPlanner"
    }

    fn is_applicable(&self, _goal: &MotionGoal) -> bool {
        true
    }

    fn plan(&mut self, req: &mut PlanRequest) -> Trajectory {
        let mut ball_storage = None;
        let (static_set, _dynamic) = fill_obstacles(req, false, &mut ball_storage);
        let inflated = static_set.inflated(ROBOT_RADIUS_M);

        let robot_pos = req.start.position_m();

        if inflated.contains(&robot_pos) {
            if let Some(free_m) = self.nearest_free_point(robot_pos, &inflated) {
                let heading = req.start.pose.heading_rad;
                let goal = RobotInstant::stationary(Pose::new(free_m, heading));
                let mut traj = profile_path(
                    &[robot_pos, free_m],
                    &req.start,
                    &goal,
                    &req.constraints,
                    req.now_s,
                    false,
                );
                traj.set_debug_text("Escape");
                return traj;
            }
        }

        // Nothing to escape from (or nowhere to go): hold position
        let mut hold = Trajectory::hold(RobotInstant::stationary(req.start.pose), req.now_s);
        hold.set_angles_valid(true);
        hold.stamp(req.now_s);
        hold.set_debug_text("Hold");
        hold
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::{Shape, ShapeSet};
    use crate::plan_mgr::request::RobotConstraints;
    use crate::world::{WorldSnapshot, NUM_SLOTS};

    fn plan_with_field(field: &ShapeSet, start_pos: Point2<f64>) -> Trajectory {
        let mut planner = EscapePlanner::new(EscapeParams::default());

        let world = WorldSnapshot::default();
        let local = ShapeSet::new();
        let planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();

        let mut req = PlanRequest {
            start: RobotInstant::stationary(Pose::new(start_pos, 0.0)),
            goal: MotionGoal::Idle,
            constraints: RobotConstraints::default(),
            field_obstacles: field,
            virtual_obstacles: &local,
            planned: &planned,
            slot: 0,
            world: &world,
            priority: 0,
            now_s: 0.0,
            sink: None,
        };

        planner.plan(&mut req)
    }

    #[test]
    fn test_holds_when_clear() {
        let field = ShapeSet::new();
        let traj = plan_with_field(&field, Point2::new(1.0, 1.0));

        assert_eq!(traj.num_waypoints(), 1);
        assert!(traj.angles_valid());
        assert!(traj.time_created_s().is_some());
    }

    #[test]
    fn test_escapes_containing_obstacle() {
        let mut field = ShapeSet::new();
        field.add(Shape::circle(Point2::new(0.0, 0.0), 0.3));

        let traj = plan_with_field(&field, Point2::new(0.0, 0.0));

        assert!(!traj.is_empty());
        let end = traj.end().unwrap().position_m();

        // Ends clear of the inflated obstacle
        assert!((end - Point2::new(0.0, 0.0)).norm() > 0.3 + ROBOT_RADIUS_M - 1e-9);
    }

    #[test]
    fn test_always_applicable() {
        let planner = EscapePlanner::new(EscapeParams::default());
        assert!(planner.is_applicable(&MotionGoal::Idle));
        assert!(planner.is_applicable(&MotionGoal::Collect));
    }
}
