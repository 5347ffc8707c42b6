//! Heuristic objective shared by every search strategy.

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingTable;
use crate::graph::{NodeId, Point};

/// Distance metric used for the `H` score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// Plain Dijkstra ordering.
    None,
    #[default]
    Euclidean,
    Manhattan,
    Octile,
    Chebyshev,
}

/// Axis-aligned box a heuristic measures towards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point,
    pub max: Point,
}

impl Aabb {
    pub fn point(point: Point) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Smallest box containing every point, `None` when `points` is empty.
    pub fn enclosing<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::point(first), |mut acc, p| {
            acc.min = Point::new(acc.min.x.min(p.x), acc.min.y.min(p.y), acc.min.z.min(p.z));
            acc.max = Point::new(acc.max.x.max(p.x), acc.max.y.max(p.y), acc.max.z.max(p.z));
            acc
        }))
    }

    /// Point of the box closest to `point`.
    pub fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
            point.z.clamp(self.min.z, self.max.z),
        )
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        )
    }
}

/// Immutable per-search description of what `H` estimates.
///
/// `h(node) = max(scale * metric(node, target box), landmark(node, target))`.
/// The landmark term is only used with a single target node and a landmark
/// table snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicObjective {
    pub target: Aabb,
    pub target_node: Option<NodeId>,
    pub heuristic: Heuristic,
    pub scale: f64,
}

impl HeuristicObjective {
    /// Objective that always estimates zero.
    pub fn disabled() -> Self {
        Self {
            target: Aabb::point(Point::default()),
            target_node: None,
            heuristic: Heuristic::None,
            scale: 0.0,
        }
    }

    pub fn towards(target: Aabb, heuristic: Heuristic, scale: f64) -> Self {
        Self {
            target,
            target_node: None,
            heuristic,
            scale,
        }
    }

    pub fn with_target_node(mut self, node: Option<NodeId>) -> Self {
        self.target_node = node;
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.heuristic == Heuristic::None
    }

    /// Unscaled metric distance to the target box (Euclidean when disabled).
    pub fn distance(&self, position: Point) -> f64 {
        let closest = self.target.clamp(position);
        match self.heuristic {
            Heuristic::None | Heuristic::Euclidean => position.distance_to(&closest),
            Heuristic::Manhattan => position.manhattan_to(&closest),
            Heuristic::Octile => position.octile_to(&closest),
            Heuristic::Chebyshev => position.chebyshev_to(&closest),
        }
    }

    pub fn estimate(
        &self,
        position: Point,
        node: Option<NodeId>,
        landmarks: Option<&EmbeddingTable>,
    ) -> f64 {
        if self.is_disabled() {
            return 0.0;
        }

        let mut h = self.scale * self.distance(position);
        if let (Some(table), Some(target), Some(node)) = (landmarks, self.target_node, node) {
            h = h.max(table.heuristic(node, target));
        }
        h
    }
}
