//! Point-to-point search between two world positions.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::error::SearchError;
use crate::graph::{GraphOracle, NodeId, Point};
use crate::request::{CompletionState, SearchOptions, SearchResult};
use crate::search::heuristic::{Aabb, HeuristicObjective};
use crate::search::kernel::{Kernel, SearchHooks, TempKind, TemporaryNode};
use crate::search::{resolve_end, SearchEnv, SearchStrategy};

/// Custom completion test for point-to-point searches.
///
/// Checked against every real node as it is closed; the first node that
/// satisfies it ends the search.
pub trait EndingCondition: Send + Sync + fmt::Debug {
    fn target_found(&self, node: NodeId, position: Point, cost: f64) -> bool;
}

/// Stop at the first node within `radius` of `point`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WithinDistance {
    pub point: Point,
    pub radius: f64,
}

impl EndingCondition for WithinDistance {
    fn target_found(&self, _node: NodeId, position: Point, _cost: f64) -> bool {
        position.distance_to(&self.point) <= self.radius
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    /// An end temporary node was popped.
    Reached(u32),
    /// The ending condition accepted a real node.
    Satisfied(u32),
    Partial(u32),
    Failed(SearchError),
}

/// Shortest path from a start point to an end point.
#[derive(Debug, Clone)]
pub struct PointSearch {
    start: Point,
    end: Point,
    ending: Option<Arc<dyn EndingCondition>>,
    calculate_partial: bool,
    closest: Option<(f64, u32)>,
    outcome: Option<Outcome>,
}

impl PointSearch {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            ending: None,
            calculate_partial: false,
            closest: None,
            outcome: None,
        }
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }
}

impl SearchHooks for PointSearch {
    fn on_visit_node<G: GraphOracle + ?Sized>(
        &mut self,
        kernel: &mut Kernel,
        graph: &G,
        slot: u32,
    ) -> ControlFlow<()> {
        let node = NodeId(slot);
        let position = graph.position(node);

        if let Some(condition) = &self.ending {
            if condition.target_found(node, position, kernel.g(slot)) {
                self.outcome = Some(Outcome::Satisfied(slot));
                return ControlFlow::Break(());
            }
        }

        if self.calculate_partial {
            let distance = kernel.objective.distance(position);
            if self.closest.map_or(true, |(best, _)| distance < best) {
                self.closest = Some((distance, slot));
            }
        }

        ControlFlow::Continue(())
    }

    fn on_found_target<G: GraphOracle + ?Sized>(
        &mut self,
        _kernel: &mut Kernel,
        _graph: &G,
        slot: u32,
    ) -> ControlFlow<()> {
        self.outcome = Some(Outcome::Reached(slot));
        ControlFlow::Break(())
    }

    fn on_frontier_exhausted<G: GraphOracle + ?Sized>(&mut self, _kernel: &mut Kernel, _graph: &G) {
        self.outcome = Some(match self.closest {
            Some((_, slot)) if self.calculate_partial => Outcome::Partial(slot),
            _ => Outcome::Failed(SearchError::StartUnreachableFromEnd),
        });
    }
}

impl SearchStrategy for PointSearch {
    const NAME: &'static str = "point-to-point";

    fn supports_ending_condition(&self) -> bool {
        true
    }

    fn prepare<G: GraphOracle + ?Sized>(
        &mut self,
        kernel: &mut Kernel,
        env: &SearchEnv<'_, G>,
        options: &SearchOptions,
    ) -> Result<(), SearchError> {
        self.ending = options.ending_condition.clone();
        self.calculate_partial = options.calculate_partial;
        self.closest = None;
        self.outcome = None;

        let graph = env.graph;
        let start = env
            .index
            .nearest(graph, self.start, &options.constraint)
            .ok_or(SearchError::NoStartNode)?;
        let ends = resolve_end(env, self.end, &options.constraint);
        if ends.nodes.is_empty() {
            return Err(SearchError::NoEndNode);
        }

        let start_slot = kernel.add_temp(TemporaryNode {
            kind: TempKind::Start,
            associated: start.node,
            position: self.start,
            target_index: 0,
        });

        let mut end_positions = Vec::with_capacity(ends.nodes.len());
        for &node in &ends.nodes {
            let position = ends.end_position(graph, node, self.end);
            end_positions.push(position);
            kernel.add_temp(TemporaryNode {
                kind: TempKind::End,
                associated: node,
                position,
                target_index: 0,
            });
        }

        // Every candidate end sits inside the target box, so the estimate is
        // zero at each of them.
        let target = Aabb::enclosing(end_positions).unwrap_or_else(|| Aabb::point(self.end));
        kernel.objective = HeuristicObjective::towards(target, options.heuristic, options.heuristic_scale)
            .with_target_node(ends.single_node());
        kernel.seed(graph, start_slot);
        Ok(())
    }

    fn finish<G: GraphOracle + ?Sized>(&mut self, kernel: &Kernel, graph: &G) -> SearchResult {
        let searched = kernel.searched_nodes;
        match self.outcome {
            Some(Outcome::Reached(slot)) => {
                SearchResult::from_path(CompletionState::Complete, kernel.trace_target(graph, slot), searched)
            }
            Some(Outcome::Satisfied(slot)) => {
                SearchResult::from_path(CompletionState::Complete, kernel.trace_node(graph, slot), searched)
            }
            Some(Outcome::Partial(slot)) => {
                SearchResult::from_path(CompletionState::Partial, kernel.trace_node(graph, slot), searched)
            }
            Some(Outcome::Failed(ref error)) => SearchResult::failed(error.clone(), searched),
            None => SearchResult::failed(SearchError::StartUnreachableFromEnd, searched),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GridGraph, GridOptions};
    use crate::search::heuristic::Heuristic;
    use crate::search::Searcher;
    use crate::spatial::SpatialIndex;
    use crate::SearchRequest;

    fn run(grid: &GridGraph, request: SearchRequest) -> SearchResult {
        let index = SpatialIndex::build(grid);
        Searcher::new().run(&SearchEnv::new(grid, &index), request)
    }

    #[test]
    fn straight_corridor() {
        let grid = GridGraph::new(6, 1, GridOptions::four_connected()).unwrap();
        let result = run(
            &grid,
            SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(5.0, 0.0)),
        );
        assert_eq!(result.state, CompletionState::Complete);
        assert_eq!(result.nodes.len(), 6);
        assert_eq!(result.cost, 5.0);
    }

    #[test]
    fn off_grid_points_add_connection_cost() {
        let grid = GridGraph::new(3, 1, GridOptions::four_connected()).unwrap();
        let result = run(
            &grid,
            SearchRequest::path(Point::planar(-0.5, 0.0), Point::planar(2.0, 0.25)),
        );
        assert_eq!(result.state, CompletionState::Complete);
        assert!((result.cost - 2.75).abs() < 1e-9);
        assert_eq!(result.points.first(), Some(&Point::planar(-0.5, 0.0)));
        assert_eq!(result.points.last(), Some(&Point::planar(2.0, 0.25)));
    }

    #[test]
    fn unreachable_end_without_partial_fails() {
        let grid = GridGraph::from_ascii("..#..", GridOptions::four_connected()).unwrap();
        let result = run(
            &grid,
            SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(4.0, 0.0)),
        );
        assert_eq!(result.state, CompletionState::Error);
        assert_eq!(result.error, Some(SearchError::StartUnreachableFromEnd));
    }

    #[test]
    fn partial_path_ends_next_to_the_wall() {
        let grid = GridGraph::from_ascii("..#..", GridOptions::four_connected()).unwrap();
        let result = run(
            &grid,
            SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(4.0, 0.0)).calculate_partial(true),
        );
        assert_eq!(result.state, CompletionState::Partial);
        assert_eq!(result.nodes.last(), grid.node_at(1, 0).as_ref());
    }

    #[test]
    fn ending_condition_stops_early() {
        let grid = GridGraph::new(10, 1, GridOptions::four_connected()).unwrap();
        let condition = Arc::new(WithinDistance {
            point: Point::planar(3.0, 0.0),
            radius: 0.5,
        });
        let result = run(
            &grid,
            SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(9.0, 0.0))
                .heuristic(Heuristic::None)
                .ending_condition(condition),
        );
        assert_eq!(result.state, CompletionState::Complete);
        assert_eq!(result.nodes.last(), grid.node_at(3, 0).as_ref());
        assert_eq!(result.cost, 3.0);
    }

    #[test]
    fn missing_start_node_is_reported() {
        let grid = GridGraph::from_ascii("#", GridOptions::four_connected()).unwrap();
        let result = run(
            &grid,
            SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(0.0, 0.0)),
        );
        assert_eq!(result.error, Some(SearchError::NoStartNode));
    }
}
