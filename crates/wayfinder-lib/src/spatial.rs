//! KD-tree nearest-node lookup used to resolve world-space points to nodes.
//!
//! Every node of the graph is indexed, walkable or not; traversability is
//! checked against the live graph through a [`NodeConstraint`] at query time,
//! so walkability changes never require a rebuild. Positions are assumed
//! fixed for the lifetime of the index.
//!
//! # Example
//!
//! ```
//! use wayfinder_lib::{GridGraph, GridOptions, NodeConstraint, Point, SpatialIndex};
//!
//! let grid = GridGraph::new(4, 4, GridOptions::default()).unwrap();
//! let index = SpatialIndex::build(&grid);
//! let nearest = index
//!     .nearest(&grid, Point::planar(2.2, 0.9), &NodeConstraint::default())
//!     .unwrap();
//! assert_eq!(nearest.node, grid.node_at(2, 1).unwrap());
//! ```

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::graph::{GraphOracle, NodeId, Point};

/// KD-tree bucket size (kiddo default).
const BUCKET_SIZE: usize = 32;

/// Candidates fetched by the first nearest-node probe.
const INITIAL_FETCH: usize = 8;

/// Per-node offset applied to stored coordinates.
///
/// kiddo's mutable tree cannot hold more than `BUCKET_SIZE` items sharing a
/// value on one axis, and planar graphs share `z` everywhere (grid rows and
/// columns share `x`/`y` too). The offset keeps every stored coordinate
/// distinct while staying far below any sensible cell size; candidates are
/// re-ranked by exact distance.
const TIE_OFFSET: f64 = 1e-9;

/// Traversal filter applied to nearest-node queries and to search expansion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeConstraint {
    /// Reject unwalkable nodes.
    pub walkable_only: bool,
    /// Bit `t` set means nodes tagged `t` may be used.
    pub tag_mask: u32,
    /// Reject nearest-node matches further away than this.
    pub max_distance: Option<f64>,
}

impl Default for NodeConstraint {
    fn default() -> Self {
        Self {
            walkable_only: true,
            tag_mask: u32::MAX,
            max_distance: None,
        }
    }
}

impl NodeConstraint {
    /// Constraint that accepts every node, walkable or not.
    pub fn any() -> Self {
        Self {
            walkable_only: false,
            ..Self::default()
        }
    }

    /// Restrict to nodes whose tag bit is set in `mask`.
    pub fn with_tags(mut self, mask: u32) -> Self {
        self.tag_mask = mask;
        self
    }

    pub fn can_traverse<G: GraphOracle + ?Sized>(&self, graph: &G, node: NodeId) -> bool {
        if self.walkable_only && !graph.is_walkable(node) {
            return false;
        }
        let tag = graph.tag(node).min(31);
        self.tag_mask & (1 << tag) != 0
    }
}

/// Result of a nearest-node query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestNode {
    pub node: NodeId,
    /// Position the query point snaps to (the node position).
    pub position: Point,
    pub distance: f64,
}

/// Nearest-node index over all node positions of a graph.
pub struct SpatialIndex {
    tree: KdTree<f64, usize, 3, BUCKET_SIZE, u32>,
    positions: Vec<Point>,
}

impl SpatialIndex {
    /// Index every node of `graph`.
    pub fn build<G: GraphOracle + ?Sized>(graph: &G) -> Self {
        let count = graph.node_count();
        let mut positions = Vec::with_capacity(count);
        let mut tree: KdTree<f64, usize, 3, BUCKET_SIZE, u32> = KdTree::new();

        for index in 0..count {
            let position = graph.position(NodeId(index as u32));
            let offset = index as f64 * TIE_OFFSET;
            let coords = [
                position.x + offset,
                position.y + offset,
                position.z + offset,
            ];
            tree.add(&coords, index);
            positions.push(position);
        }

        info!(node_count = count, "built nearest-node index");

        Self { tree, positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Closest node to `point` that satisfies `constraint`.
    ///
    /// Probes a handful of candidates first and widens the probe until a
    /// node passes the constraint or every node has been considered.
    pub fn nearest<G: GraphOracle + ?Sized>(
        &self,
        graph: &G,
        point: Point,
        constraint: &NodeConstraint,
    ) -> Option<NearestNode> {
        if self.positions.is_empty() {
            return None;
        }

        let query = point.as_array();
        let mut fetch = INITIAL_FETCH.min(self.positions.len());

        loop {
            let mut candidates: Vec<(usize, f64)> = self
                .tree
                .nearest_n::<SquaredEuclidean>(&query, fetch)
                .into_iter()
                .map(|neighbour| (neighbour.item, self.positions[neighbour.item].distance_to(&point)))
                .collect();
            candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

            for &(index, distance) in &candidates {
                if let Some(limit) = constraint.max_distance {
                    if distance > limit {
                        return None;
                    }
                }
                let node = NodeId(index as u32);
                if constraint.can_traverse(graph, node) {
                    return Some(NearestNode {
                        node,
                        position: self.positions[index],
                        distance,
                    });
                }
            }

            if fetch >= self.positions.len() {
                return None;
            }
            fetch = fetch.saturating_mul(4).min(self.positions.len());
        }
    }

    /// All nodes within `radius` of `point`, sorted by distance.
    pub fn within_radius(&self, point: Point, radius: f64) -> Vec<(NodeId, f64)> {
        if radius <= 0.0 || self.positions.is_empty() {
            return Vec::new();
        }

        // Widen slightly so the stored offsets never drop a boundary node.
        let slack = self.positions.len() as f64 * TIE_OFFSET * 2.0;
        let squared = (radius + slack) * (radius + slack);
        let mut found: Vec<(NodeId, f64)> = self
            .tree
            .within::<SquaredEuclidean>(&point.as_array(), squared)
            .into_iter()
            .map(|neighbour| {
                let distance = self.positions[neighbour.item].distance_to(&point);
                (NodeId(neighbour.item as u32), distance)
            })
            .filter(|&(_, distance)| distance <= radius)
            .collect();

        found.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        found
    }
}
