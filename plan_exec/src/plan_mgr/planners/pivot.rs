//! # Pivot planner
//!
//! Orbits a point (usually the ball) at a fixed radius until the robot sits
//! on the far side of it from the pivot target, facing the point the whole
//! way round. The arc is regenerated only when the commanded target moves;
//! otherwise the previous cycle's arc is trimmed and reused.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use super::Planner;
use crate::geom::{Pose, Twist};
use crate::goal::MotionGoal;
use crate::plan_mgr::request::PlanRequest;
use crate::traj::{RobotInstant, Trajectory};
use util::maths::ang_sep;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotParams {
    /// Scale applied to the commanded pivot radius.
    pub radius_multiplier: f64,

    /// Angular spacing of arc waypoints.
    pub angle_step_rad: f64,

    /// End-angle change below which the previous arc is reused.
    pub target_tolerance_rad: f64,
}

pub struct PivotPlanner {
    params: PivotParams,

    /// The previous cycle's arc, candidate for reuse.
    previous: Option<Trajectory>,

    /// The end angle the previous arc was generated for.
    previous_end_angle_rad: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PivotParams {
    fn default() -> Self {
        Self {
            radius_multiplier: 1.0,
            angle_step_rad: 0.2,
            target_tolerance_rad: 0.05,
        }
    }
}

impl PivotPlanner {
    pub fn new(params: PivotParams) -> Self {
        Self {
            params,
            previous: None,
            previous_end_angle_rad: None,
        }
    }
}

impl Planner for PivotPlanner {
    fn name(&self) -> &'static str {
        "PivotPlanner"
    }

    fn is_applicable(&self, goal: &MotionGoal) -> bool {
        matches!(goal, MotionGoal::Pivot { .. })
    }

    fn plan(&mut self, req: &mut PlanRequest) -> Trajectory {
        let (point_m, target_m, radius_m) = match req.goal {
            MotionGoal::Pivot {
                point_m,
                target_m,
                radius_m,
            } => (point_m, target_m, radius_m),
            _ => return Trajectory::new(),
        };

        let r_m = radius_m * self.params.radius_multiplier;
        let robot_pos = req.start.position_m();

        // The robot finishes behind the pivot point as seen from the target,
        // so that point, pivot and target line up for the next action
        let away: Vector2<f64> = point_m - target_m;
        let end_angle_rad = if away.norm() > 1e-6 {
            away.y.atan2(away.x)
        } else {
            (robot_pos - point_m).y.atan2((robot_pos - point_m).x)
        };

        // Reuse the previous arc while the target stays put
        if let (Some(prev), Some(prev_end)) = (&self.previous, self.previous_end_angle_rad) {
            if ang_sep(prev_end, end_angle_rad).abs() <= self.params.target_tolerance_rad {
                let elapsed_s = req.now_s - prev.start_time_s();
                if elapsed_s >= 0.0 && elapsed_s < prev.duration_s() {
                    if let Ok(trimmed) = prev.sub_trajectory(elapsed_s, prev.duration_s()) {
                        if !trimmed.is_empty() {
                            self.previous = Some(trimmed.clone());
                            return trimmed;
                        }
                    }
                }
            }
        }

        let offset = robot_pos - point_m;
        let start_angle_rad = if offset.norm() > 1e-6 {
            offset.y.atan2(offset.x)
        } else {
            end_angle_rad
        };

        let delta_rad = ang_sep(start_angle_rad, end_angle_rad);
        let steps = ((delta_rad.abs() / self.params.angle_step_rad).ceil() as usize).max(1);

        // Angular rate bounded by both the spin limit and the tangential
        // speed limit at this radius
        let omega_radps = req
            .constraints
            .max_ang_speed_radps
            .min(req.constraints.max_speed_mps / r_m.max(1e-3));
        let dt_s = (delta_rad.abs() / steps as f64) / omega_radps.max(1e-6);

        let mut traj = Trajectory::new();
        traj.set_start_time_s(req.now_s);

        // Lead in from wherever the robot actually is onto the arc
        let arc_start = point_m + Vector2::new(start_angle_rad.cos(), start_angle_rad.sin()) * r_m;
        let lead_in_m = (arc_start - robot_pos).norm();
        let lead_in_s = if lead_in_m > 1e-6 {
            lead_in_m / (0.5 * req.constraints.max_speed_mps).max(1e-6)
        } else {
            0.0
        };

        traj.push(0.0, RobotInstant::stationary(req.start.pose));

        let spin_sign = delta_rad.signum();
        for i in 0..=steps {
            let angle_rad = start_angle_rad + delta_rad * i as f64 / steps as f64;
            let radial = Vector2::new(angle_rad.cos(), angle_rad.sin());
            let position_m: Point2<f64> = point_m + radial * r_m;

            // Face the pivot point throughout
            let heading_rad = angle_rad + std::f64::consts::PI;

            let twist = if i == steps {
                Twist::zero()
            } else {
                let tangent = Vector2::new(-angle_rad.sin(), angle_rad.cos()) * spin_sign;
                Twist::new(tangent * omega_radps * r_m, spin_sign * omega_radps)
            };

            let time_s = lead_in_s + dt_s * i as f64;
            traj.push(time_s.max(1e-6 * (i + 1) as f64), RobotInstant::new(
                Pose::new(position_m, heading_rad),
                twist,
            ));
        }

        traj.set_angles_valid(true);
        traj.stamp(req.now_s);

        self.previous = Some(traj.clone());
        self.previous_end_angle_rad = Some(end_angle_rad);
        traj
    }

    fn reset(&mut self) {
        self.previous = None;
        self.previous_end_angle_rad = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::ShapeSet;
    use crate::plan_mgr::request::RobotConstraints;
    use crate::world::{WorldSnapshot, NUM_SLOTS};

    #[test]
    fn test_arc_ends_behind_pivot_point() {
        let mut planner = PivotPlanner::new(PivotParams::default());

        let world = WorldSnapshot::default();
        let field = ShapeSet::new();
        let local = ShapeSet::new();
        let planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();

        let point = Point2::new(1.0, 0.0);
        let target = Point2::new(3.0, 0.0);
        let radius = 0.12;

        let mut req = PlanRequest {
            start: RobotInstant::stationary(Pose::new(Point2::new(1.0, 0.12), 0.0)),
            goal: MotionGoal::Pivot {
                point_m: point,
                target_m: target,
                radius_m: radius,
            },
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
        assert!(traj.angles_valid());

        // Ends on the target-opposite side of the pivot point, stationary
        let end = traj.end().unwrap();
        assert!((end.position_m() - Point2::new(1.0 - radius, 0.0)).norm() < 1e-9);
        assert!(end.twist.linear_mps.norm() < 1e-9);

        // Every waypoint stays on the pivot circle (after the lead-in)
        for w in &traj.waypoints()[1..] {
            let d = (w.instant.position_m() - point).norm();
            assert!((d - radius).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unchanged_target_reuses_arc() {
        let mut planner = PivotPlanner::new(PivotParams::default());

        let world = WorldSnapshot::default();
        let field = ShapeSet::new();
        let local = ShapeSet::new();
        let planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();

        let goal = MotionGoal::Pivot {
            point_m: Point2::new(1.0, 0.0),
            target_m: Point2::new(3.0, 0.0),
            radius_m: 0.12,
        };

        let mut req = PlanRequest {
            start: RobotInstant::stationary(Pose::new(Point2::new(1.0, 0.12), 0.0)),
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
        let first = planner.plan(&mut req);

        let mut req = PlanRequest {
            start: RobotInstant::stationary(Pose::new(Point2::new(1.0, 0.12), 0.0)),
            goal,
            constraints: RobotConstraints::default(),
            field_obstacles: &field,
            virtual_obstacles: &local,
            planned: &planned,
            slot: 0,
            world: &world,
            priority: 1,
            now_s: 0.05,
            sink: None,
        };
        let second = planner.plan(&mut req);

        // Trimmed continuation of the same arc
        assert!((second.duration_s() - (first.duration_s() - 0.05)).abs() < 1e-5);
        assert!((second.start_time_s() - 0.05).abs() < 1e-9);
    }
}
