//! # Planner chain
//!
//! Each robot slot owns one chain: an ordered list of specialized planners
//! tried in fixed precedence until one produces a non-empty trajectory, with
//! the escape-obstacles fallback last because it always succeeds. Precedence
//! is the explicit construction order, nothing else.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::error;

// Internal
use super::params::PlanMgrParams;
use super::planners::{
    CollectPlanner, EscapePlanner, LineKickPlanner, PathTargetPlanner, PivotPlanner, Planner,
    SettlePlanner, WorldVelPlanner,
};
use super::request::PlanRequest;
use super::search::RrtSearch;
use crate::traj::{RobotInstant, Trajectory};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The per-slot ordered planner list.
pub struct PlannerChain {
    planners: Vec<Box<dyn Planner>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PlannerChain {
    /// Build the chain in its fixed precedence order, most specific first.
    ///
    /// The escape planner must always be last: it is applicable to every
    /// goal and never returns an empty trajectory.
    pub fn new(params: &PlanMgrParams) -> Self {
        let path_target = |p: &PlanMgrParams| {
            PathTargetPlanner::new(
                p.path_target.clone(),
                Box::new(RrtSearch::new(p.search.clone())),
            )
        };

        let planners: Vec<Box<dyn Planner>> = vec![
            Box::new(path_target(params)),
            Box::new(SettlePlanner::new(params.settle.clone(), path_target(params))),
            Box::new(CollectPlanner::new(
                params.collect.clone(),
                path_target(params),
            )),
            Box::new(LineKickPlanner::new(
                params.line_kick.clone(),
                path_target(params),
            )),
            Box::new(PivotPlanner::new(params.pivot.clone())),
            Box::new(WorldVelPlanner::new(params.world_vel.clone())),
            Box::new(EscapePlanner::new(params.escape.clone())),
        ];

        Self { planners }
    }

    /// Build a chain from an explicit planner list. Used by tests.
    pub fn with_planners(planners: Vec<Box<dyn Planner>>) -> Self {
        Self { planners }
    }

    /// Run the chain for one request.
    ///
    /// Planners are tried in order; a planner is skipped if it declares
    /// itself inapplicable to the request's goal. While no result exists yet
    /// every planner passed over (skipped or failed) has its hysteresis
    /// state reset, so a planner whose goal variant went away drops its
    /// cached state. A non-empty result must carry a heading profile and a
    /// creation timestamp; a violation is a fatal contract error for this
    /// slot's cycle and degrades to a stamped single-point hold rather than
    /// propagating corrupted data.
    pub fn plan(&mut self, req: &mut PlanRequest) -> Trajectory {
        let mut result = Trajectory::new();

        for planner in &mut self.planners {
            if result.is_empty() && planner.is_applicable(&req.goal) {
                result = planner.plan(req);

                if !result.is_empty() {
                    if !result.angles_valid() {
                        error!(
                            "Trajectory returned from {} for slot {} has no angle profile",
                            planner.name(),
                            req.slot
                        );
                        return error_trajectory(req, "Error: No Angle Profile");
                    }
                    if result.time_created_s().is_none() {
                        error!(
                            "Trajectory returned from {} for slot {} has no creation timestamp",
                            planner.name(),
                            req.slot
                        );
                        return error_trajectory(req, "Error: No Timestamp");
                    }
                }
            }

            if result.is_empty() {
                planner.reset();
            }
        }

        if result.is_empty() {
            // The escape fallback is always applicable and never empty, so
            // arriving here means the chain is misconfigured
            error!(
                "No valid planner for slot {}! Did you forget the fallback planner?",
                req.slot
            );
            return error_trajectory(req, "Error: No Valid Planners");
        }

        result
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// A known-safe degenerate trajectory: a stamped hold at the start instant.
fn error_trajectory(req: &PlanRequest, text: &str) -> Trajectory {
    let mut traj = Trajectory::hold(RobotInstant::stationary(req.start.pose), req.now_s);
    traj.set_angles_valid(true);
    traj.stamp(req.now_s);
    traj.set_debug_text(text);
    traj
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::{Pose, ShapeSet};
    use crate::goal::MotionGoal;
    use crate::plan_mgr::request::RobotConstraints;
    use crate::world::{WorldSnapshot, NUM_SLOTS};
    use nalgebra::Point2;

    /// A planner which claims every goal but violates the post-condition
    /// contract by omitting the angle profile.
    struct BrokenPlanner;

    impl Planner for BrokenPlanner {
        fn name(&self) -> &'static str {
            "BrokenPlanner"
        }
        fn is_applicable(&self, _goal: &MotionGoal) -> bool {
            true
        }
        fn plan(&mut self, req: &mut PlanRequest) -> Trajectory {
            // Non-empty but missing angles and timestamp
            Trajectory::hold(req.start, req.now_s)
        }
        fn reset(&mut self) {}
    }

    fn run_chain(chain: &mut PlannerChain, goal: MotionGoal) -> Trajectory {
        let world = WorldSnapshot::default();
        let field = ShapeSet::new();
        let local = ShapeSet::new();
        let planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();

        let mut req = PlanRequest {
            start: crate::traj::RobotInstant::stationary(Pose::new(Point2::new(1.0, 1.0), 0.0)),
            goal,
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

        chain.plan(&mut req)
    }

    #[test]
    fn test_fallback_handles_idle() {
        let mut chain = PlannerChain::new(&crate::plan_mgr::params::PlanMgrParams::default());
        let traj = run_chain(&mut chain, MotionGoal::Idle);

        // The escape fallback produces a hold, never an empty trajectory
        assert!(!traj.is_empty());
        assert!(traj.angles_valid());
        assert!(traj.time_created_s().is_some());
    }

    #[test]
    fn test_contract_violation_degrades_safely() {
        let mut chain = PlannerChain::with_planners(vec![Box::new(BrokenPlanner)]);
        let traj = run_chain(&mut chain, MotionGoal::Idle);

        // Degenerate single-point hold, flagged in the debug text
        assert_eq!(traj.num_waypoints(), 1);
        assert!(traj.angles_valid());
        assert!(traj.time_created_s().is_some());
        assert!(traj.debug_text().unwrap().contains("Error"));
    }

    #[test]
    fn test_empty_chain_reports_no_valid_planner() {
        let mut chain = PlannerChain::with_planners(vec![]);
        let traj = run_chain(&mut chain, MotionGoal::Idle);

        assert_eq!(traj.num_waypoints(), 1);
        assert_eq!(traj.debug_text(), Some("Error: No Valid Planners"));
    }
}
