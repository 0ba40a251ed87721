//! # Sampling-based path search
//!
//! The planners treat path search as an external collaborator behind the
//! [`PathSearch`] trait: given a start, a goal and a static obstacle set it
//! returns a discrete obstacle-free waypoint sequence, or an empty vector if
//! no path was found.
//!
//! [`RrtSearch`] is the production implementation, a goal-biased RRT over
//! the field bounds with a line-of-sight pruning pass. The RNG is explicitly
//! seeded so planning cycles are reproducible.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Point2;
use ordered_float::NotNan;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// Internal
use crate::geom::ShapeSet;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// An obstacle-aware waypoint search engine.
pub trait PathSearch: Send {
    /// Search for an obstacle-free waypoint sequence from `start_m` to
    /// `goal_m`.
    ///
    /// A successful result starts at `start_m` and ends at `goal_m`. An
    /// empty vector means no path was found.
    fn search(
        &mut self,
        start_m: Point2<f64>,
        goal_m: Point2<f64>,
        obstacles: &ShapeSet,
    ) -> Vec<Point2<f64>>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for [`RrtSearch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Tree extension step size.
    pub step_size_m: f64,

    /// Probability of sampling the goal instead of a random point.
    pub goal_bias: f64,

    /// Iteration cap before the search gives up.
    pub max_iterations: usize,

    /// Lower corner of the sampling region.
    pub field_min_m: [f64; 2],

    /// Upper corner of the sampling region.
    pub field_max_m: [f64; 2],

    /// RNG seed.
    pub seed: u64,
}

/// Goal-biased RRT search over the field.
pub struct RrtSearch {
    params: SearchParams,
    rng: SmallRng,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            step_size_m: 0.25,
            goal_bias: 0.3,
            max_iterations: 2000,
            // Division B field is 9 x 6 m, sample a little beyond the lines
            field_min_m: [-4.8, -3.3],
            field_max_m: [4.8, 3.3],
            seed: 0x4b53,
        }
    }
}

impl RrtSearch {
    pub fn new(params: SearchParams) -> Self {
        let rng = SmallRng::seed_from_u64(params.seed);
        Self { params, rng }
    }

    fn sample(&mut self, goal_m: &Point2<f64>) -> Point2<f64> {
        if self.rng.gen::<f64>() < self.params.goal_bias {
            *goal_m
        } else {
            Point2::new(
                self.rng
                    .gen_range(self.params.field_min_m[0]..self.params.field_max_m[0]),
                self.rng
                    .gen_range(self.params.field_min_m[1]..self.params.field_max_m[1]),
            )
        }
    }
}

impl PathSearch for RrtSearch {
    fn search(
        &mut self,
        start_m: Point2<f64>,
        goal_m: Point2<f64>,
        obstacles: &ShapeSet,
    ) -> Vec<Point2<f64>> {
        // An occupied goal is unreachable
        if obstacles.contains(&goal_m) {
            return Vec::new();
        }

        // Try the trivial connection first
        if obstacles.segment_hits(&start_m, &goal_m).is_empty() {
            return vec![start_m, goal_m];
        }

        // Tree nodes as (position, parent index)
        let mut nodes: Vec<(Point2<f64>, usize)> = vec![(start_m, 0)];

        for _ in 0..self.params.max_iterations {
            let sample = self.sample(&goal_m);

            // Nearest existing node
            let nearest_idx = nodes
                .iter()
                .enumerate()
                .min_by_key(|(_, (p, _))| {
                    NotNan::new((sample - p).norm())
                        .unwrap_or_else(|_| NotNan::new(f64::MAX).unwrap())
                })
                .map(|(i, _)| i)
                .unwrap_or(0);

            let nearest = nodes[nearest_idx].0;
            let offset = sample - nearest;
            let dist = offset.norm();
            if dist < 1e-9 {
                continue;
            }

            let new = nearest + offset / dist * dist.min(self.params.step_size_m);

            if !obstacles.segment_hits(&nearest, &new).is_empty() {
                continue;
            }

            nodes.push((new, nearest_idx));
            let new_idx = nodes.len() - 1;

            // Close enough to try connecting to the goal
            if (goal_m - new).norm() <= self.params.step_size_m
                && obstacles.segment_hits(&new, &goal_m).is_empty()
            {
                nodes.push((goal_m, new_idx));

                // Walk back to the root
                let mut path = Vec::new();
                let mut idx = nodes.len() - 1;
                loop {
                    path.push(nodes[idx].0);
                    if idx == 0 {
                        break;
                    }
                    idx = nodes[idx].1;
                }
                path.reverse();

                return prune(&path, obstacles);
            }
        }

        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Greedy line-of-sight pruning: from each kept waypoint, jump to the
/// furthest waypoint still directly reachable.
fn prune(path: &[Point2<f64>], obstacles: &ShapeSet) -> Vec<Point2<f64>> {
    if path.len() <= 2 {
        return path.to_vec();
    }

    let mut out = vec![path[0]];
    let mut i = 0;

    while i < path.len() - 1 {
        let mut j = path.len() - 1;
        while j > i + 1 && !obstacles.segment_hits(&path[i], &path[j]).is_empty() {
            j -= 1;
        }
        out.push(path[j]);
        i = j;
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::Shape;

    #[test]
    fn test_trivial_connection() {
        let mut search = RrtSearch::new(SearchParams::default());
        let path = search.search(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            &ShapeSet::new(),
        );

        assert_eq!(path.len(), 2);
        assert_eq!(path[0], Point2::new(0.0, 0.0));
        assert_eq!(path[1], Point2::new(1.0, 0.0));
    }

    #[test]
    fn test_routes_around_obstacle() {
        let mut obstacles = ShapeSet::new();
        obstacles.add(Shape::circle(Point2::new(1.0, 0.0), 0.4));

        let mut search = RrtSearch::new(SearchParams::default());
        let start = Point2::new(0.0, 0.0);
        let goal = Point2::new(2.0, 0.0);
        let path = search.search(start, goal, &obstacles);

        assert!(path.len() >= 2, "expected a path, got none");
        assert_eq!(path[0], start);
        assert_eq!(*path.last().unwrap(), goal);

        // Every segment of the result is collision free
        for pair in path.windows(2) {
            assert!(obstacles.segment_hits(&pair[0], &pair[1]).is_empty());
        }
    }

    #[test]
    fn test_blocked_goal_fails() {
        let mut obstacles = ShapeSet::new();
        obstacles.add(Shape::circle(Point2::new(2.0, 0.0), 0.5));

        let mut search = RrtSearch::new(SearchParams::default());
        let path = search.search(Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), &obstacles);

        assert!(path.is_empty());
    }
}
