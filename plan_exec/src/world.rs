//! # World state
//!
//! Immutable per-cycle snapshots of everything perception knows: our robots,
//! the opposition, and the ball. Snapshots are produced by the vision link
//! and handed to the planner read-only; the planner never writes back.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use crate::geom::{Pose, Twist};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of robot slots in the team roster.
pub const NUM_SLOTS: usize = 6;

/// Radius of an SSL robot in meters.
pub const ROBOT_RADIUS_M: f64 = 0.09;

/// Radius of the golf ball in meters.
pub const BALL_RADIUS_M: f64 = 0.0215;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The tracked state of a single robot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RobotState {
    pub pose: Pose,
    pub twist: Twist,

    /// False if vision has lost this robot. An invisible robot is neither
    /// planned for nor treated as an obstacle.
    pub visible: bool,

    /// Vision timestamp of this observation, seconds.
    pub timestamp_s: f64,
}

/// The tracked state of the ball.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BallState {
    pub position_m: Point2<f64>,
    pub velocity_mps: Vector2<f64>,
}

/// A full snapshot of the world at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Snapshot timestamp, seconds. Used as "now" by the planners.
    pub timestamp_s: f64,

    pub our_robots: [RobotState; NUM_SLOTS],
    pub opp_robots: [RobotState; NUM_SLOTS],
    pub ball: BallState,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Referee-derived game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    /// All robots must stop immediately, no planning is performed.
    Halt,
    /// Play is stopped but robots may reposition.
    Stop,
    /// Normal play.
    Running,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BallState {
    /// Predicted ball position after `dt_s` seconds of constant-velocity
    /// motion.
    pub fn predict(&self, dt_s: f64) -> Point2<f64> {
        self.position_m + self.velocity_mps * dt_s
    }

    pub fn speed_mps(&self) -> f64 {
        self.velocity_mps.norm()
    }
}

impl Default for BallState {
    fn default() -> Self {
        Self {
            position_m: Point2::origin(),
            velocity_mps: Vector2::zeros(),
        }
    }
}

impl Default for WorldSnapshot {
    fn default() -> Self {
        Self {
            timestamp_s: 0.0,
            our_robots: [RobotState::default(); NUM_SLOTS],
            opp_robots: [RobotState::default(); NUM_SLOTS],
            ball: BallState::default(),
        }
    }
}

impl GameState {
    /// True if the game state forbids all robot motion.
    pub fn is_halted(&self) -> bool {
        matches!(self, GameState::Halt)
    }
}
