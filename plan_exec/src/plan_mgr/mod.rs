//! # Plan manager
//!
//! The per-cycle trajectory planning orchestrator. Once per control cycle
//! the manager sequences the team by intent priority and plans each robot in
//! turn, so that every robot sees the completed plans of all higher-priority
//! robots as moving obstacles, never the reverse. The published result is
//! one trajectory per slot, overwritten wholesale every cycle.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod chain;
pub mod params;
pub mod planners;
pub mod profile;
pub mod request;
pub mod search;

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

// External
use log::debug;

// Internal
use crate::draw::{Colour, DebugSink};
use crate::geom::ShapeSet;
use crate::goal::RobotIntent;
use crate::traj::{RobotInstant, Trajectory};
use crate::world::{GameState, WorldSnapshot, NUM_SLOTS};
use chain::PlannerChain;
use params::PlanMgrParams;
use request::PlanRequest;

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// The cycle orchestrator. Owns one persistent planner chain per robot slot,
/// created once at startup and never destroyed during normal operation.
pub struct PlanMgr {
    params: PlanMgrParams,
    chains: Vec<PlannerChain>,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl PlanMgr {
    /// Create a new plan manager with one planner chain per slot.
    pub fn new(params: PlanMgrParams) -> Self {
        let chains = (0..NUM_SLOTS).map(|_| PlannerChain::new(&params)).collect();
        Self { params, chains }
    }

    /// Run one planning cycle.
    ///
    /// Robots are processed in descending intent priority, ties broken by
    /// ascending slot id so results are reproducible. Invisible robots
    /// publish the empty trajectory and contribute no obstacle. Each robot's
    /// request sees the `planned` array exactly as filled in so far, which
    /// is the mechanism making higher-priority robots moving obstacles for
    /// lower-priority ones.
    pub fn proc(
        &mut self,
        world: &WorldSnapshot,
        game_state: GameState,
        intents: &[RobotIntent; NUM_SLOTS],
        field_obstacles: &ShapeSet,
        mut sink: Option<&mut dyn DebugSink>,
    ) -> [Trajectory; NUM_SLOTS] {
        // A halted game short-circuits all planning
        if game_state.is_halted() {
            return Default::default();
        }

        // Processing order: descending priority, stable in slot id
        let mut order: Vec<usize> = (0..NUM_SLOTS).collect();
        order.sort_by_key(|&slot| std::cmp::Reverse(intents[slot].priority));

        let mut planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();

        for &slot in &order {
            let robot = &world.our_robots[slot];
            let intent = &intents[slot];

            if !robot.visible {
                // Invisible robots get the empty sentinel and are marked
                // planned so they are not treated as static obstacles either
                planned[slot] = Some(Trajectory::new());
                continue;
            }

            let traj = {
                let mut req = PlanRequest {
                    start: RobotInstant::new(robot.pose, robot.twist),
                    goal: intent.goal.clone(),
                    constraints: self.params.constraints,
                    field_obstacles,
                    virtual_obstacles: &intent.local_obstacles,
                    planned: &planned,
                    slot,
                    world,
                    priority: intent.priority,
                    now_s: world.timestamp_s,
                    sink: sink.as_deref_mut(),
                };

                self.chains[slot].plan(&mut req)
            };

            debug!(
                "Slot {} planned: {} waypoints, {:.2} s",
                slot,
                traj.num_waypoints(),
                traj.duration_s()
            );

            if let Some(sink) = sink.as_mut() {
                traj.draw(&mut **sink, Colour::BLUE, "Planning");
            }

            planned[slot] = Some(traj);
        }

        let mut out: [Trajectory; NUM_SLOTS] = Default::default();
        for (slot, entry) in planned.iter_mut().enumerate() {
            out[slot] = entry.take().unwrap_or_default();
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::Pose;
    use crate::goal::MotionGoal;
    use crate::plan_mgr::request::fill_obstacles;
    use crate::plan_mgr::request::RobotConstraints;
    use nalgebra::Point2;

    fn visible_robot(x: f64, y: f64) -> crate::world::RobotState {
        crate::world::RobotState {
            pose: Pose::new(Point2::new(x, y), 0.0),
            visible: true,
            ..Default::default()
        }
    }

    fn goto(x: f64, y: f64, priority: i8) -> RobotIntent {
        RobotIntent {
            goal: MotionGoal::PathTarget {
                goal: RobotInstant::stationary(Pose::new(Point2::new(x, y), 0.0)),
            },
            priority,
            ..Default::default()
        }
    }

    #[test]
    fn test_halt_publishes_all_empty() {
        let mut mgr = PlanMgr::new(PlanMgrParams::default());

        let mut world = WorldSnapshot::default();
        for slot in 0..NUM_SLOTS {
            world.our_robots[slot] = visible_robot(slot as f64, 0.0);
        }

        let mut intents: [RobotIntent; NUM_SLOTS] = Default::default();
        for (slot, intent) in intents.iter_mut().enumerate() {
            *intent = goto(slot as f64, 2.0, 1);
        }

        let field = ShapeSet::new();
        let out = mgr.proc(&world, GameState::Halt, &intents, &field, None);

        assert!(out.iter().all(|t| t.is_empty()));
    }

    #[test]
    fn test_invisible_robot_publishes_empty() {
        let mut mgr = PlanMgr::new(PlanMgrParams::default());

        let mut world = WorldSnapshot::default();
        world.our_robots[0] = visible_robot(0.0, 0.0);
        // Slot 1 stays invisible

        let mut intents: [RobotIntent; NUM_SLOTS] = Default::default();
        intents[0] = goto(2.0, 0.0, 1);
        intents[1] = goto(2.0, 2.0, 2);

        let field = ShapeSet::new();
        let out = mgr.proc(&world, GameState::Running, &intents, &field, None);

        assert!(!out[0].is_empty());
        assert!(out[1].is_empty());
    }

    #[test]
    fn test_priority_ordering_and_dynamic_obstacles() {
        // Slot 0 at priority 2 ("A") is planned before slot 1 at priority 1
        // ("B"); both head for overlapping destinations. A must ignore B
        // entirely, while B's request must see exactly one dynamic obstacle:
        // A's trajectory.
        let mut mgr = PlanMgr::new(PlanMgrParams::default());

        let mut world = WorldSnapshot::default();
        world.our_robots[0] = visible_robot(0.0, 0.5);
        world.our_robots[1] = visible_robot(0.0, -0.5);

        let mut intents: [RobotIntent; NUM_SLOTS] = Default::default();
        intents[0] = goto(2.0, 0.0, 2);
        intents[1] = goto(2.0, 0.1, 1);

        let field = ShapeSet::new();
        let out = mgr.proc(&world, GameState::Running, &intents, &field, None);

        assert!(!out[0].is_empty());
        assert!(!out[1].is_empty());

        // Reconstruct B's view of the cycle: A planned, B not yet
        let mut planned: [Option<Trajectory>; NUM_SLOTS] = Default::default();
        planned[0] = Some(out[0].clone());

        let local = ShapeSet::new();
        let req = PlanRequest {
            start: RobotInstant::stationary(world.our_robots[1].pose),
            goal: intents[1].goal.clone(),
            constraints: RobotConstraints::default(),
            field_obstacles: &field,
            virtual_obstacles: &local,
            planned: &planned,
            slot: 1,
            world: &world,
            priority: 1,
            now_s: 0.0,
            sink: None,
        };

        let mut ball_storage = None;
        let (_static_set, dynamic) = fill_obstacles(&req, false, &mut ball_storage);

        assert_eq!(dynamic.len(), 1);
        assert!(std::ptr::eq(dynamic[0].traj, planned[0].as_ref().unwrap()));
    }

    #[test]
    fn test_equal_priority_is_slot_ordered() {
        // With equal priorities the stable sort keeps ascending slot order,
        // so slot 0 is planned first and becomes slot 1's obstacle
        let mut intents: [RobotIntent; NUM_SLOTS] = Default::default();
        for (slot, intent) in intents.iter_mut().enumerate() {
            *intent = goto(slot as f64, 2.0, 3);
        }

        let mut order: Vec<usize> = (0..NUM_SLOTS).collect();
        order.sort_by_key(|&slot| std::cmp::Reverse(intents[slot].priority));

        assert_eq!(order, (0..NUM_SLOTS).collect::<Vec<_>>());
    }
}
