//! # Trajectory
//!
//! This module defines the time-parameterized trajectory produced by the
//! planners for each robot.
//!
//! A trajectory is an absolute start time plus an ordered sequence of
//! waypoints, each a kinematic instant (pose and velocity) at a relative
//! time offset. Offsets are non-decreasing and the first waypoint sits at
//! offset zero. An empty trajectory is the "no plan" sentinel, and a single
//! waypoint trajectory is a stationary hold.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Point2;
use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

// Internal
use crate::draw::{Colour, DebugSink};
use crate::geom::{point_segment_dist, Pose, ShapeSet, Twist};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Times closer together than this are treated as coincident when deciding
/// whether a sub-range extraction needs an interpolated boundary waypoint.
const BOUNDARY_EPSILON_S: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The kinematic state of a robot at one instant: pose plus velocity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotInstant {
    pub pose: Pose,
    pub twist: Twist,
}

/// One trajectory entry: a kinematic instant at a relative time offset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Waypoint {
    /// Time offset from the trajectory start, seconds.
    pub time_s: f64,
    pub instant: RobotInstant,
}

/// A time-parameterized robot motion plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trajectory {
    /// Absolute start time, seconds.
    start_time_s: f64,

    waypoints: Vec<Waypoint>,

    /// True once a planner has filled in a heading profile. Required by the
    /// planner chain post-condition for any non-empty result.
    angles_valid: bool,

    /// Absolute time this trajectory was created, seconds. Required by the
    /// planner chain post-condition for any non-empty result.
    time_created_s: Option<f64>,

    /// Free-form annotation shown by the debug drawer.
    debug_text: Option<String>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by trajectory range operations.
#[derive(Debug, thiserror::Error)]
pub enum TrajError {
    /// The caller supplied malformed bounds. This is a bug at the call site
    /// and should fail fast.
    #[error("Invalid sub-range arguments: {0}")]
    InvalidArgument(String),

    /// The requested sub-range starts at or beyond the end of the
    /// trajectory. Callers should degrade to an empty trajectory and report
    /// the condition rather than crash.
    #[error("Sub-range start {start_s} s is at or beyond the trajectory duration {duration_s} s")]
    StartPastEnd { start_s: f64, duration_s: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RobotInstant {
    pub fn new(pose: Pose, twist: Twist) -> Self {
        Self { pose, twist }
    }

    /// An instant at the given pose with zero velocity.
    pub fn stationary(pose: Pose) -> Self {
        Self {
            pose,
            twist: Twist::zero(),
        }
    }

    pub fn position_m(&self) -> Point2<f64> {
        self.pose.position_m
    }

    /// Linearly interpolate between two instants, treating pose and twist as
    /// flat numeric vectors.
    ///
    /// Heading is interpolated as a plain component with no angle wrapping,
    /// matching the rest of the trajectory maths. Planners emit heading
    /// profiles whose adjacent waypoints never differ by more than pi, so
    /// the flat lerp is well behaved on real plans.
    pub fn lerp(a: &RobotInstant, b: &RobotInstant, t: f64) -> RobotInstant {
        RobotInstant {
            pose: Pose::from_vector(a.pose.to_vector() * (1.0 - t) + b.pose.to_vector() * t),
            twist: Twist::from_vector(a.twist.to_vector() * (1.0 - t) + b.twist.to_vector() * t),
        }
    }
}

impl Trajectory {
    /// Create a new empty trajectory, the "no plan" sentinel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a single-waypoint trajectory holding the given instant.
    pub fn hold(instant: RobotInstant, start_time_s: f64) -> Self {
        let mut traj = Self::new();
        traj.start_time_s = start_time_s;
        traj.push(0.0, instant);
        traj
    }

    /// Append a waypoint at the given relative time.
    ///
    /// Times must be non-decreasing, and the first waypoint must sit at time
    /// zero (within the boundary epsilon, for sub-range cuts landing on an
    /// existing waypoint).
    pub fn push(&mut self, time_s: f64, instant: RobotInstant) {
        debug_assert!(
            self.waypoints
                .last()
                .map_or(time_s.abs() <= BOUNDARY_EPSILON_S, |w| time_s >= w.time_s),
            "waypoint times must be non-decreasing and start at zero"
        );
        self.waypoints.push(Waypoint { time_s, instant });
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn num_waypoints(&self) -> usize {
        self.waypoints.len()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn start_time_s(&self) -> f64 {
        self.start_time_s
    }

    pub fn set_start_time_s(&mut self, start_time_s: f64) {
        self.start_time_s = start_time_s;
    }

    /// Relative time of the final waypoint, or 0 for an empty trajectory.
    pub fn duration_s(&self) -> f64 {
        self.waypoints.last().map_or(0.0, |w| w.time_s)
    }

    /// Absolute time of the final waypoint.
    pub fn end_time_s(&self) -> f64 {
        self.start_time_s + self.duration_s()
    }

    pub fn start(&self) -> Option<&RobotInstant> {
        self.waypoints.first().map(|w| &w.instant)
    }

    pub fn end(&self) -> Option<&RobotInstant> {
        self.waypoints.last().map(|w| &w.instant)
    }

    pub fn angles_valid(&self) -> bool {
        self.angles_valid
    }

    pub fn set_angles_valid(&mut self, valid: bool) {
        self.angles_valid = valid;
    }

    pub fn time_created_s(&self) -> Option<f64> {
        self.time_created_s
    }

    /// Record the absolute creation time of this trajectory.
    pub fn stamp(&mut self, now_s: f64) {
        self.time_created_s = Some(now_s);
    }

    pub fn debug_text(&self) -> Option<&str> {
        self.debug_text.as_deref()
    }

    pub fn set_debug_text<S: Into<String>>(&mut self, text: S) {
        self.debug_text = Some(text.into());
    }

    /// Sum of consecutive waypoint distances over the index range
    /// `[start, end]`.
    ///
    /// Returns 0 for a trajectory with fewer than two waypoints or a start
    /// index at or beyond the final waypoint.
    pub fn length_between(&self, start: usize, end: usize) -> f64 {
        if self.waypoints.is_empty() || start >= self.waypoints.len() - 1 {
            return 0.0;
        }

        let end = end.min(self.waypoints.len() - 1);

        let mut length_m = 0.0;
        for i in start..end {
            length_m += (self.waypoints[i + 1].instant.position_m()
                - self.waypoints[i].instant.position_m())
            .norm();
        }
        length_m
    }

    /// Total path length from the given waypoint index to the end.
    pub fn length_from(&self, start: usize) -> f64 {
        self.length_between(start, self.waypoints.len().saturating_sub(1))
    }

    /// Total path length of the trajectory.
    pub fn length(&self) -> f64 {
        self.length_from(0)
    }

    /// Index of the waypoint whose position is nearest to `point_m`, or
    /// `None` for an empty trajectory.
    pub fn nearest_index(&self, point_m: &Point2<f64>) -> Option<usize> {
        self.waypoints
            .iter()
            .enumerate()
            .min_by_key(|(_, w)| {
                NotNan::new((w.instant.position_m() - point_m).norm())
                    .unwrap_or_else(|_| NotNan::new(f64::MAX).unwrap())
            })
            .map(|(i, _)| i)
    }

    /// Minimum distance from `point_m` to any segment of the trajectory, or
    /// `None` if the trajectory has fewer than two waypoints.
    pub fn distance_to(&self, point_m: &Point2<f64>) -> Option<f64> {
        if self.waypoints.len() < 2 {
            return None;
        }

        let mut dist_m = f64::MAX;
        for pair in self.waypoints.windows(2) {
            let d = point_segment_dist(
                point_m,
                &pair[0].instant.position_m(),
                &pair[1].instant.position_m(),
            );
            if d < dist_m {
                dist_m = d;
            }
        }

        Some(dist_m)
    }

    /// Check the trajectory for collisions against a set of static
    /// obstacles, starting `elapsed_s` seconds into the path.
    ///
    /// Obstacles which already contain the starting position are exempt for
    /// the whole query, so a robot that finds itself inside an obstacle is
    /// free to drive out of it. Returns the relative time of the waypoint
    /// beginning the first colliding segment, or `None` if the path is clear,
    /// empty, or starts at/after its end.
    pub fn hit(&self, obstacles: &ShapeSet, elapsed_s: f64) -> Option<f64> {
        // Index of the first waypoint strictly after the elapsed time
        let start = self
            .waypoints
            .iter()
            .position(|w| w.time_s > elapsed_s)
            .unwrap_or(self.waypoints.len());

        if start >= self.waypoints.len() {
            return None;
        }

        let exempt = obstacles.hit_set(&self.waypoints[start].instant.position_m());

        for i in start..self.waypoints.len() - 1 {
            let hits = obstacles.segment_hits(
                &self.waypoints[i].instant.position_m(),
                &self.waypoints[i + 1].instant.position_m(),
            );

            if hits.iter().any(|h| !exempt.contains(h)) {
                return Some(self.waypoints[i].time_s);
            }
        }

        None
    }

    /// Evaluate the trajectory at relative time `t_s`.
    ///
    /// Returns `None` if the trajectory has fewer than two waypoints, if
    /// `t_s` precedes the first waypoint, or if it is beyond the last.
    /// Otherwise the bracketing waypoint pair is located by binary search and
    /// the instant is linearly interpolated between them (see
    /// [`RobotInstant::lerp`] for the heading caveat).
    pub fn eval(&self, t_s: f64) -> Option<RobotInstant> {
        if self.waypoints.len() < 2 || t_s < self.waypoints[0].time_s {
            return None;
        }

        // First waypoint with time >= t_s
        let idx = self.waypoints.partition_point(|w| w.time_s < t_s);

        if idx >= self.waypoints.len() {
            return None;
        }
        if idx == 0 {
            return Some(self.waypoints[0].instant);
        }

        let w0 = &self.waypoints[idx - 1];
        let w1 = &self.waypoints[idx];

        let dt_s = w1.time_s - w0.time_s;
        if dt_s <= 0.0 {
            // Coincident times, the instants should match; return the earlier
            return Some(w0.instant);
        }

        let t = (t_s - w0.time_s) / dt_s;
        Some(RobotInstant::lerp(&w0.instant, &w1.instant, t))
    }

    /// Extract the sub-range `[start_s, end_s]` as a new trajectory.
    ///
    /// Boundary waypoints are interpolated where the range cuts through a
    /// segment, waypoint times are re-based so the new trajectory starts at
    /// zero, and the new absolute start time is offset by `start_s`.
    ///
    /// Fails with [`TrajError::InvalidArgument`] for negative or inverted
    /// bounds, and with [`TrajError::StartPastEnd`] if `start_s` is at or
    /// beyond the trajectory's duration.
    pub fn sub_trajectory(&self, start_s: f64, end_s: f64) -> Result<Trajectory, TrajError> {
        if start_s < 0.0 {
            return Err(TrajError::InvalidArgument(format!(
                "start time ({}) can't be less than zero",
                start_s
            )));
        }
        if end_s < 0.0 {
            return Err(TrajError::InvalidArgument(format!(
                "end time ({}) can't be less than zero",
                end_s
            )));
        }
        if start_s > end_s {
            return Err(TrajError::InvalidArgument(format!(
                "start time ({}) can't be after end time ({})",
                start_s, end_s
            )));
        }

        let duration_s = self.duration_s();

        if start_s >= duration_s {
            return Err(TrajError::StartPastEnd {
                start_s,
                duration_s,
            });
        }

        // Whole range requested, return a full copy
        if start_s == 0.0 && end_s >= duration_s {
            return Ok(self.clone());
        }

        let end_s = end_s.min(duration_s);

        let mut sub = Trajectory {
            start_time_s: self.start_time_s + start_s,
            waypoints: Vec::new(),
            angles_valid: self.angles_valid,
            time_created_s: self.time_created_s,
            debug_text: self.debug_text.clone(),
        };

        // First original waypoint at or after the range start
        let mut idx = self.waypoints.partition_point(|w| w.time_s < start_s);

        // Synthesize an interpolated first waypoint if the range starts
        // strictly inside a segment
        if idx > 0 && start_s + BOUNDARY_EPSILON_S < self.waypoints[idx].time_s {
            let w0 = &self.waypoints[idx - 1];
            let w1 = &self.waypoints[idx];
            let dt_s = w1.time_s - w0.time_s;
            if dt_s > 0.0 {
                let t = (start_s - w0.time_s) / dt_s;
                sub.push(0.0, RobotInstant::lerp(&w0.instant, &w1.instant, t));
            }
        }

        // Copy through all original waypoints strictly inside the range
        while idx < self.waypoints.len() && self.waypoints[idx].time_s < end_s {
            sub.push(
                self.waypoints[idx].time_s - start_s,
                self.waypoints[idx].instant,
            );
            idx += 1;
        }

        // Synthesize a final interpolated waypoint if the range ends before
        // the last copied segment boundary
        if idx < self.waypoints.len() {
            if idx == 0 {
                // Degenerate zero-length range at the very start
                sub.push(0.0, self.waypoints[0].instant);
            } else {
                let w0 = &self.waypoints[idx - 1];
                let w1 = &self.waypoints[idx];
                let dt_s = w1.time_s - w0.time_s;
                if dt_s > 0.0 {
                    let t = (end_s - w0.time_s) / dt_s;
                    sub.push(
                        end_s - start_s,
                        RobotInstant::lerp(&w0.instant, &w1.instant, t),
                    );
                }
            }
        }

        debug_assert!(
            (sub.duration_s() - (duration_s - start_s).min(end_s - start_s)).abs() < 1e-5,
            "sub-trajectory duration drifted beyond tolerance"
        );

        Ok(sub)
    }

    /// Draw the trajectory as a polyline with per-waypoint velocity vectors.
    ///
    /// No-op if the trajectory has one waypoint or fewer.
    pub fn draw(&self, sink: &mut dyn DebugSink, colour: Colour, layer: &str) {
        if self.waypoints.len() <= 1 {
            return;
        }

        let points: Vec<Point2<f64>> = self
            .waypoints
            .iter()
            .map(|w| w.instant.position_m())
            .collect();
        sink.polyline(layer, colour, &points);

        for w in &self.waypoints {
            sink.vector(
                layer,
                colour,
                w.instant.position_m(),
                w.instant.twist.linear_mps,
            );
        }

        if let Some(ref text) = self.debug_text {
            sink.text(layer, colour, self.waypoints[0].instant.position_m(), text);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::Shape;
    use nalgebra::{Point2, Vector2};

    /// Two waypoints, (0,0) at t=0 and (10,0) at t=2, zero velocity.
    fn straight_traj() -> Trajectory {
        let mut traj = Trajectory::new();
        traj.push(
            0.0,
            RobotInstant::stationary(Pose::new(Point2::new(0.0, 0.0), 0.0)),
        );
        traj.push(
            2.0,
            RobotInstant::stationary(Pose::new(Point2::new(10.0, 0.0), 0.0)),
        );
        traj
    }

    #[test]
    fn test_length() {
        let traj = straight_traj();
        assert!((traj.length() - 10.0).abs() < 1e-12);

        let single = Trajectory::hold(
            RobotInstant::stationary(Pose::new(Point2::new(1.0, 1.0), 0.0)),
            0.0,
        );
        assert_eq!(single.length(), 0.0);

        // Out-of-range start index
        assert_eq!(traj.length_from(5), 0.0);
    }

    #[test]
    fn test_eval_midpoint() {
        let traj = straight_traj();

        let instant = traj.eval(1.0).unwrap();
        assert!((instant.position_m() - Point2::new(5.0, 0.0)).norm() < 1e-12);
        assert!(instant.pose.heading_rad.abs() < 1e-12);
    }

    #[test]
    fn test_eval_linear_consistency() {
        let mut traj = Trajectory::new();
        traj.push(
            0.0,
            RobotInstant::new(
                Pose::new(Point2::new(0.0, 0.0), 0.0),
                Twist::new(Vector2::new(1.0, 0.0), 0.0),
            ),
        );
        traj.push(
            4.0,
            RobotInstant::new(
                Pose::new(Point2::new(4.0, 2.0), 1.0),
                Twist::new(Vector2::new(3.0, 0.0), 0.5),
            ),
        );

        let instant = traj.eval(1.0).unwrap();
        assert!((instant.position_m() - Point2::new(1.0, 0.5)).norm() < 1e-12);
        assert!((instant.pose.heading_rad - 0.25).abs() < 1e-12);
        assert!((instant.twist.linear_mps.x - 1.5).abs() < 1e-12);
        assert!((instant.twist.angular_radps - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_eval_none_cases() {
        let traj = straight_traj();
        assert!(traj.eval(-0.1).is_none());
        assert!(traj.eval(2.5).is_none());

        let single = Trajectory::hold(RobotInstant::default(), 0.0);
        assert!(single.eval(0.0).is_none());

        let empty = Trajectory::new();
        assert!(empty.eval(0.0).is_none());
    }

    #[test]
    fn test_nearest_index() {
        let traj = straight_traj();
        assert_eq!(traj.nearest_index(&Point2::new(1.0, 1.0)), Some(0));
        assert_eq!(traj.nearest_index(&Point2::new(9.0, -1.0)), Some(1));
        assert_eq!(Trajectory::new().nearest_index(&Point2::origin()), None);
    }

    #[test]
    fn test_distance_to() {
        let traj = straight_traj();
        assert!((traj.distance_to(&Point2::new(5.0, 3.0)).unwrap() - 3.0).abs() < 1e-12);

        let single = Trajectory::hold(RobotInstant::default(), 0.0);
        assert!(single.distance_to(&Point2::new(1.0, 0.0)).is_none());
    }

    #[test]
    fn test_sub_trajectory_full_copy() {
        let traj = straight_traj();
        let sub = traj.sub_trajectory(0.0, traj.duration_s()).unwrap();

        assert!((sub.duration_s() - traj.duration_s()).abs() < 1e-12);
        assert_eq!(sub.start().unwrap(), traj.start().unwrap());
        assert_eq!(sub.end().unwrap(), traj.end().unwrap());
    }

    #[test]
    fn test_sub_trajectory_duration_property() {
        let traj = straight_traj();
        let duration = traj.duration_s();

        for &(a, b) in &[(0.0, 1.0), (0.5, 1.5), (0.25, 2.0), (1.0, 5.0), (0.0, 0.0)] {
            let sub = traj.sub_trajectory(a, b).unwrap();
            let expected = (duration - a).min(b - a);
            assert!(
                (sub.duration_s() - expected).abs() < 1e-5,
                "sub-range [{}, {}] duration {} != {}",
                a,
                b,
                sub.duration_s(),
                expected
            );
        }
    }

    #[test]
    fn test_sub_trajectory_interpolates_boundaries() {
        let traj = straight_traj();
        let sub = traj.sub_trajectory(0.5, 1.5).unwrap();

        // Boundary waypoints interpolated at exactly the range edges
        assert!((sub.start().unwrap().position_m() - Point2::new(2.5, 0.0)).norm() < 1e-12);
        assert!((sub.end().unwrap().position_m() - Point2::new(7.5, 0.0)).norm() < 1e-12);

        // Start time shifted by the range start
        assert!((sub.start_time_s() - (traj.start_time_s() + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_sub_trajectory_errors() {
        let traj = straight_traj();

        assert!(matches!(
            traj.sub_trajectory(-1.0, 1.0),
            Err(TrajError::InvalidArgument(_))
        ));
        assert!(matches!(
            traj.sub_trajectory(1.0, 0.5),
            Err(TrajError::InvalidArgument(_))
        ));
        assert!(matches!(
            traj.sub_trajectory(2.0, 3.0),
            Err(TrajError::StartPastEnd { .. })
        ));
    }

    /// Eleven waypoints along +X at 1 m/s, one per second.
    fn dense_traj() -> Trajectory {
        let mut traj = Trajectory::new();
        for i in 0..=10 {
            traj.push(
                i as f64,
                RobotInstant::stationary(Pose::new(Point2::new(i as f64, 0.0), 0.0)),
            );
        }
        traj
    }

    #[test]
    fn test_hit_exempts_start_obstacles() {
        let traj = dense_traj();

        let mut obstacles = ShapeSet::new();
        // Contains the query's starting waypoint, exempted for the whole scan
        obstacles.add(Shape::circle(Point2::new(1.0, 0.0), 0.5));

        assert!(traj.hit(&obstacles, 0.0).is_none());

        // A second obstacle along the path is reported with the time of the
        // waypoint beginning the colliding segment
        obstacles.add(Shape::circle(Point2::new(8.0, 0.0), 0.3));
        let hit_time = traj.hit(&obstacles, 0.0).unwrap();
        assert!((hit_time - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_hit_past_end() {
        let traj = dense_traj();
        let mut obstacles = ShapeSet::new();
        obstacles.add(Shape::circle(Point2::new(5.0, 0.0), 1.0));

        // Query starting beyond the final waypoint reports nothing
        assert!(traj.hit(&obstacles, 11.0).is_none());
        assert!(Trajectory::new().hit(&obstacles, 0.0).is_none());
    }

    #[test]
    fn test_hold_is_stationary_hold() {
        let instant = RobotInstant::stationary(Pose::new(Point2::new(2.0, 3.0), 1.0));
        let traj = Trajectory::hold(instant, 10.0);

        assert_eq!(traj.num_waypoints(), 1);
        assert_eq!(traj.duration_s(), 0.0);
        assert_eq!(traj.start_time_s(), 10.0);
        assert!(!traj.is_empty());
    }
}
