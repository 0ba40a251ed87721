//! # Geometry primitives
//!
//! Planar poses, velocities and obstacle shapes used throughout the planning
//! stack. All positions are in meters in the field frame, with headings in
//! radians measured anticlockwise from the +X axis.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Point2, Vector2, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A planar pose: position plus heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position_m: Point2<f64>,
    pub heading_rad: f64,
}

/// A planar velocity: linear plus angular rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear_mps: Vector2<f64>,
    pub angular_radps: f64,
}

/// An obstacle shape in the field frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Shape {
    Circle {
        centre_m: Point2<f64>,
        radius_m: f64,
    },
    Rect {
        min_m: Point2<f64>,
        max_m: Point2<f64>,
    },
}

/// A set of obstacle shapes.
///
/// Shapes are identified by their index within the set, which is stable for
/// the lifetime of the set. Collision queries report these indices so callers
/// can distinguish between shapes (e.g. to exempt those containing a start
/// position).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShapeSet {
    shapes: Vec<Shape>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(position_m: Point2<f64>, heading_rad: f64) -> Self {
        Self {
            position_m,
            heading_rad,
        }
    }

    /// Pack the pose as a flat `[x, y, heading]` vector for interpolation.
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.position_m.x, self.position_m.y, self.heading_rad)
    }

    pub fn from_vector(v: Vector3<f64>) -> Self {
        Self {
            position_m: Point2::new(v.x, v.y),
            heading_rad: v.z,
        }
    }
}

impl Twist {
    pub fn new(linear_mps: Vector2<f64>, angular_radps: f64) -> Self {
        Self {
            linear_mps,
            angular_radps,
        }
    }

    pub fn zero() -> Self {
        Self {
            linear_mps: Vector2::zeros(),
            angular_radps: 0.0,
        }
    }

    /// Pack the twist as a flat `[vx, vy, omega]` vector for interpolation.
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.linear_mps.x, self.linear_mps.y, self.angular_radps)
    }

    pub fn from_vector(v: Vector3<f64>) -> Self {
        Self {
            linear_mps: Vector2::new(v.x, v.y),
            angular_radps: v.z,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position_m: Point2::origin(),
            heading_rad: 0.0,
        }
    }
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Shape {
    pub fn circle(centre_m: Point2<f64>, radius_m: f64) -> Self {
        Shape::Circle { centre_m, radius_m }
    }

    /// True if the shape contains the given point.
    pub fn contains(&self, point_m: &Point2<f64>) -> bool {
        match self {
            Shape::Circle { centre_m, radius_m } => (point_m - centre_m).norm() <= *radius_m,
            Shape::Rect { min_m, max_m } => {
                point_m.x >= min_m.x
                    && point_m.x <= max_m.x
                    && point_m.y >= min_m.y
                    && point_m.y <= max_m.y
            }
        }
    }

    /// True if the shape intersects the segment from `a` to `b`.
    pub fn hits_segment(&self, a: &Point2<f64>, b: &Point2<f64>) -> bool {
        match self {
            Shape::Circle { centre_m, radius_m } => {
                point_segment_dist(centre_m, a, b) <= *radius_m
            }
            Shape::Rect { min_m, max_m } => {
                if self.contains(a) || self.contains(b) {
                    return true;
                }

                // Otherwise the segment must cross one of the four edges
                let corners = [
                    Point2::new(min_m.x, min_m.y),
                    Point2::new(max_m.x, min_m.y),
                    Point2::new(max_m.x, max_m.y),
                    Point2::new(min_m.x, max_m.y),
                ];
                (0..4).any(|i| segments_intersect(a, b, &corners[i], &corners[(i + 1) % 4]))
            }
        }
    }

    /// Return a copy of the shape grown outwards by the given margin.
    pub fn inflated(&self, margin_m: f64) -> Self {
        match self {
            Shape::Circle { centre_m, radius_m } => Shape::Circle {
                centre_m: *centre_m,
                radius_m: radius_m + margin_m,
            },
            Shape::Rect { min_m, max_m } => Shape::Rect {
                min_m: Point2::new(min_m.x - margin_m, min_m.y - margin_m),
                max_m: Point2::new(max_m.x + margin_m, max_m.y + margin_m),
            },
        }
    }
}

impl ShapeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    /// Append all shapes from another set.
    pub fn extend(&mut self, other: &ShapeSet) {
        self.shapes.extend_from_slice(&other.shapes);
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter()
    }

    /// Indices of all shapes containing the given point.
    pub fn hit_set(&self, point_m: &Point2<f64>) -> Vec<usize> {
        self.shapes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.contains(point_m))
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of all shapes intersecting the segment from `a` to `b`.
    pub fn segment_hits(&self, a: &Point2<f64>, b: &Point2<f64>) -> Vec<usize> {
        self.shapes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.hits_segment(a, b))
            .map(|(i, _)| i)
            .collect()
    }

    /// True if any shape contains the given point.
    pub fn contains(&self, point_m: &Point2<f64>) -> bool {
        self.shapes.iter().any(|s| s.contains(point_m))
    }

    /// Return a copy of the set with every shape grown by the given margin.
    pub fn inflated(&self, margin_m: f64) -> ShapeSet {
        ShapeSet {
            shapes: self.shapes.iter().map(|s| s.inflated(margin_m)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Minimum distance from a point to the segment from `a` to `b`.
pub fn point_segment_dist(point_m: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();

    // Degenerate segment, distance to the single point
    if len_sq <= std::f64::EPSILON {
        return (point_m - a).norm();
    }

    let t = ((point_m - a).dot(&ab) / len_sq).max(0.0).min(1.0);
    (point_m - (a + ab * t)).norm()
}

/// True if segment `a0`-`a1` intersects segment `b0`-`b1`.
pub fn segments_intersect(
    a0: &Point2<f64>,
    a1: &Point2<f64>,
    b0: &Point2<f64>,
    b1: &Point2<f64>,
) -> bool {
    let orient = |p: &Point2<f64>, q: &Point2<f64>, r: &Point2<f64>| -> f64 {
        (q - p).perp(&(r - p))
    };

    let o1 = orient(a0, a1, b0);
    let o2 = orient(a0, a1, b1);
    let o3 = orient(b0, b1, a0);
    let o4 = orient(b0, b1, a1);

    if o1 * o2 < 0.0 && o3 * o4 < 0.0 {
        return true;
    }

    // Collinear cases: check if an endpoint lies on the other segment
    let on_segment = |p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>| -> bool {
        point_segment_dist(p, a, b) <= 1e-12
    };

    (o1.abs() <= std::f64::EPSILON && on_segment(b0, a0, a1))
        || (o2.abs() <= std::f64::EPSILON && on_segment(b1, a0, a1))
        || (o3.abs() <= std::f64::EPSILON && on_segment(a0, b0, b1))
        || (o4.abs() <= std::f64::EPSILON && on_segment(a1, b0, b1))
}
