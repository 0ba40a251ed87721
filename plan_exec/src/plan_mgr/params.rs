//! Plan manager parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::planners::collect::CollectParams;
use super::planners::escape::EscapeParams;
use super::planners::line_kick::LineKickParams;
use super::planners::path_target::PathTargetParams;
use super::planners::pivot::PivotParams;
use super::planners::settle::SettleParams;
use super::planners::world_vel::WorldVelParams;
use super::request::RobotConstraints;
use super::search::SearchParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the plan manager and every planner in the chain.
///
/// Loaded from `plan_mgr.toml`. Every section has sensible defaults so a
/// partial file (or none at all, in tests) is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanMgrParams {
    /// Kinematic limits applied to every robot.
    pub constraints: RobotConstraints,

    pub search: SearchParams,
    pub path_target: PathTargetParams,
    pub settle: SettleParams,
    pub collect: CollectParams,
    pub line_kick: LineKickParams,
    pub pivot: PivotParams,
    pub world_vel: WorldVelParams,
    pub escape: EscapeParams,
}
