//! # Motion goals
//!
//! The closed set of motion commands gameplay can issue to a robot, plus the
//! per-slot intent bundle carrying a goal together with its planning
//! priority and any robot-local virtual obstacles.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

// Internal
use crate::geom::{ShapeSet, Twist};
use crate::traj::RobotInstant;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A motion command for a single robot.
///
/// Each variant carries only the parameters its planner needs. The set is
/// closed by design: planner precedence is an explicit list over these tags,
/// never runtime type inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MotionGoal {
    /// No commanded motion, the robot holds position.
    Idle,

    /// Move to a target instant, avoiding obstacles.
    PathTarget { goal: RobotInstant },

    /// Move straight to a target instant with no obstacle avoidance.
    DirectPathTarget { goal: RobotInstant },

    /// Drive an unsmoothed straight path for controller tuning.
    TuningPath { goal: RobotInstant },

    /// Hold a world-frame velocity.
    WorldVel { vel: Twist },

    /// Orbit a point at a given radius until facing the target.
    Pivot {
        point_m: Point2<f64>,
        target_m: Point2<f64>,
        radius_m: f64,
    },

    /// Intercept and dampen a moving ball.
    Settle,

    /// Approach, touch and gain control of the ball.
    Collect,

    /// Drive through the ball towards a kick target.
    LineKick { target_m: Point2<f64> },
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Per-slot planning intent, supplied fresh each cycle by gameplay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotIntent {
    pub goal: MotionGoal,

    /// Planning priority. Higher priorities are planned first and become
    /// moving obstacles for everyone planned after them.
    pub priority: i8,

    /// Soft-constraint obstacles local to this robot.
    pub local_obstacles: ShapeSet,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for RobotIntent {
    fn default() -> Self {
        Self {
            goal: MotionGoal::Idle,
            priority: 0,
            local_obstacles: ShapeSet::new(),
        }
    }
}
