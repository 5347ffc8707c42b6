//! Radius flood and replay against its recorded parent tree.
//!
//! A [`FloodSearch`] closes every node whose cost from the origin is within
//! the budget and keeps the resulting parent tree in a [`FloodRecord`]. The
//! record can then answer "path from node X back to the origin" without
//! searching, as long as the graph has not changed since it was recorded.

use std::ops::ControlFlow;
use std::sync::Arc;

use crate::error::SearchError;
use crate::graph::{GraphOracle, NodeId, Point};
use crate::request::{CompletionState, SearchOptions, SearchResult};
use crate::search::heuristic::HeuristicObjective;
use crate::search::kernel::{dedup_points, Kernel, SearchHooks, TempKind, TemporaryNode, TracedPath, NO_PARENT};
use crate::search::{SearchEnv, SearchStrategy};

/// Parent tree and costs recorded by a flood.
#[derive(Debug, Clone, PartialEq)]
pub struct FloodRecord {
    origin: NodeId,
    origin_point: Point,
    parents: Vec<u32>,
    costs: Vec<f64>,
    order: Vec<NodeId>,
    graph_version: u64,
    max_cost: Option<f64>,
}

impl FloodRecord {
    /// Node the flood started from.
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    /// World position the flood was requested from.
    pub fn origin_point(&self) -> Point {
        self.origin_point
    }

    pub fn graph_version(&self) -> u64 {
        self.graph_version
    }

    pub fn max_cost(&self) -> Option<f64> {
        self.max_cost
    }

    /// Nodes in the order they were closed.
    pub fn visited(&self) -> &[NodeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.cost_to(node).is_some()
    }

    /// Cost from the origin point to `node`, if the flood reached it.
    pub fn cost_to(&self, node: NodeId) -> Option<f64> {
        self.costs
            .get(node.index())
            .copied()
            .filter(|cost| cost.is_finite())
    }

    pub fn is_stale<G: GraphOracle + ?Sized>(&self, graph: &G) -> bool {
        graph.version() != self.graph_version
    }

    fn check_fresh<G: GraphOracle + ?Sized>(&self, graph: &G) -> Result<(), SearchError> {
        if self.is_stale(graph) {
            return Err(SearchError::StaleCachedFlood {
                recorded: self.graph_version,
                current: graph.version(),
            });
        }
        Ok(())
    }

    /// Nodes from `node` back to the origin, both inclusive.
    pub fn trace_to_origin<G: GraphOracle + ?Sized>(
        &self,
        graph: &G,
        node: NodeId,
    ) -> Result<Vec<NodeId>, SearchError> {
        self.check_fresh(graph)?;
        if !self.is_reachable(node) {
            return Err(SearchError::NotReachableFromFlood);
        }

        let mut path = vec![node];
        let mut cursor = node.index();
        while let Some(&parent) = self.parents.get(cursor) {
            if parent == NO_PARENT {
                break;
            }
            path.push(NodeId(parent));
            cursor = parent as usize;
        }
        Ok(path)
    }

    /// Nodes from the origin to `node`, both inclusive.
    pub fn trace_from_origin<G: GraphOracle + ?Sized>(
        &self,
        graph: &G,
        node: NodeId,
    ) -> Result<Vec<NodeId>, SearchError> {
        let mut path = self.trace_to_origin(graph, node)?;
        path.reverse();
        Ok(path)
    }
}

/// Dijkstra flood from a point, bounded by an optional cost budget.
///
/// Nodes with a cost up to and including `max_cost` are recorded.
#[derive(Debug, Clone)]
pub struct FloodSearch {
    start: Point,
    max_cost: Option<f64>,
    origin: Option<NodeId>,
    visited: Vec<u32>,
}

impl FloodSearch {
    pub fn new(start: Point) -> Self {
        Self {
            start,
            max_cost: None,
            origin: None,
            visited: Vec::new(),
        }
    }

    pub fn max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }
}

impl SearchHooks for FloodSearch {
    fn on_visit_node<G: GraphOracle + ?Sized>(
        &mut self,
        kernel: &mut Kernel,
        _graph: &G,
        slot: u32,
    ) -> ControlFlow<()> {
        if let Some(limit) = self.max_cost {
            if kernel.g(slot) > limit {
                return ControlFlow::Break(());
            }
        }
        self.visited.push(slot);
        ControlFlow::Continue(())
    }

    fn on_frontier_exhausted<G: GraphOracle + ?Sized>(&mut self, _kernel: &mut Kernel, _graph: &G) {}
}

impl SearchStrategy for FloodSearch {
    const NAME: &'static str = "flood";

    fn prepare<G: GraphOracle + ?Sized>(
        &mut self,
        kernel: &mut Kernel,
        env: &SearchEnv<'_, G>,
        options: &SearchOptions,
    ) -> Result<(), SearchError> {
        self.visited.clear();
        let start = env
            .index
            .nearest(env.graph, self.start, &options.constraint)
            .ok_or(SearchError::NoStartNode)?;
        self.origin = Some(start.node);

        let start_slot = kernel.add_temp(TemporaryNode {
            kind: TempKind::Start,
            associated: start.node,
            position: self.start,
            target_index: 0,
        });
        kernel.objective = HeuristicObjective::disabled();
        kernel.seed(env.graph, start_slot);
        Ok(())
    }

    fn finish<G: GraphOracle + ?Sized>(&mut self, kernel: &Kernel, graph: &G) -> SearchResult {
        let Some(origin) = self.origin else {
            return SearchResult::failed(SearchError::NoStartNode, kernel.searched_nodes);
        };

        let count = graph.node_count();
        let mut parents = vec![NO_PARENT; count];
        let mut costs = vec![f64::INFINITY; count];
        let mut order = Vec::with_capacity(self.visited.len());

        for &slot in &self.visited {
            let index = slot as usize;
            costs[index] = kernel.g(slot);
            parents[index] = kernel
                .parent(slot)
                .filter(|&parent| kernel.temp(parent).is_none())
                .unwrap_or(NO_PARENT);
            order.push(NodeId(slot));
        }

        let record = FloodRecord {
            origin,
            origin_point: self.start,
            parents,
            costs,
            order,
            graph_version: graph.version(),
            max_cost: self.max_cost,
        };

        SearchResult {
            state: CompletionState::Complete,
            searched_nodes: kernel.searched_nodes,
            flood: Some(Arc::new(record)),
            ..SearchResult::default()
        }
    }
}

/// Path from a point back to the origin of a previously recorded flood.
///
/// No search is performed; the flood's parent tree is replayed.
#[derive(Debug, Clone)]
pub struct FloodTraceSearch {
    flood: Arc<FloodRecord>,
    start: Point,
    path: Option<TracedPath>,
}

impl FloodTraceSearch {
    pub fn new(flood: Arc<FloodRecord>, start: Point) -> Self {
        Self {
            flood,
            start,
            path: None,
        }
    }
}

impl SearchHooks for FloodTraceSearch {
    fn on_frontier_exhausted<G: GraphOracle + ?Sized>(&mut self, _kernel: &mut Kernel, _graph: &G) {}
}

impl SearchStrategy for FloodTraceSearch {
    const NAME: &'static str = "flood-trace";

    fn prepare<G: GraphOracle + ?Sized>(
        &mut self,
        _kernel: &mut Kernel,
        env: &SearchEnv<'_, G>,
        options: &SearchOptions,
    ) -> Result<(), SearchError> {
        let graph = env.graph;
        self.flood.check_fresh(graph)?;

        let start = env
            .index
            .nearest(graph, self.start, &options.constraint)
            .ok_or(SearchError::NoStartNode)?;
        let nodes = self.flood.trace_to_origin(graph, start.node)?;
        let node_cost = self.flood.cost_to(start.node).unwrap_or_default();

        let mut points = Vec::with_capacity(nodes.len() + 2);
        points.push(self.start);
        points.extend(nodes.iter().map(|&node| graph.position(node)));
        points.push(self.flood.origin_point());
        dedup_points(&mut points);

        self.path = Some(TracedPath {
            nodes,
            points,
            cost: node_cost + self.start.distance_to(&start.position),
        });
        Ok(())
    }

    fn finish<G: GraphOracle + ?Sized>(&mut self, kernel: &Kernel, _graph: &G) -> SearchResult {
        match self.path.take() {
            Some(path) => SearchResult::from_path(CompletionState::Complete, path, kernel.searched_nodes),
            None => SearchResult::failed(SearchError::NotReachableFromFlood, kernel.searched_nodes),
        }
    }
}
