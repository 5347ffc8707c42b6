//! One origin, many targets.
//!
//! All targets share a single expansion. Each target gets one or more end
//! temporary nodes; when one is popped the target is resolved and its other
//! ends are ignored. The heuristic points either at the next unresolved
//! target ([`TargetHeuristic::Sequential`]) or at the box spanning every
//! unresolved target ([`TargetHeuristic::Envelope`]), and the frontier is
//! re-keyed whenever that objective changes.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SearchError;
use crate::graph::{GraphOracle, NodeId, Point};
use crate::request::{CompletionState, SearchOptions, SearchResult, TargetPath};
use crate::search::heuristic::{Aabb, Heuristic, HeuristicObjective};
use crate::search::kernel::{Kernel, SearchHooks, TempKind, TemporaryNode};
use crate::search::{resolve_end, SearchEnv, SearchStrategy};

/// When a multi-target search is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MultiTargetMode {
    /// Resolve every reachable target.
    #[default]
    AllTargets,
    /// Stop at the first target reached; runs as plain Dijkstra.
    FirstTarget,
}

/// What the heuristic aims at while targets remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetHeuristic {
    /// The first unresolved target, in request order.
    #[default]
    Sequential,
    /// The bounding box of all unresolved targets.
    Envelope,
}

#[derive(Debug, Clone)]
struct TargetSlot {
    point: Point,
    valid: bool,
    bounds: Option<Aabb>,
    landmark: Option<NodeId>,
    path: Option<TargetPath>,
}

/// Search from one origin towards a list of targets.
#[derive(Debug, Clone)]
pub struct MultiTargetSearch {
    origin: Point,
    mode: MultiTargetMode,
    target_heuristic: TargetHeuristic,
    reversed: bool,
    targets: Vec<TargetSlot>,
    heuristic: Heuristic,
    scale: f64,
    remaining: usize,
    pending: Vec<usize>,
}

impl MultiTargetSearch {
    pub fn new(origin: Point, targets: impl IntoIterator<Item = Point>) -> Self {
        Self {
            origin,
            mode: MultiTargetMode::default(),
            target_heuristic: TargetHeuristic::default(),
            reversed: false,
            targets: targets
                .into_iter()
                .map(|point| TargetSlot {
                    point,
                    valid: false,
                    bounds: None,
                    landmark: None,
                    path: None,
                })
                .collect(),
            heuristic: Heuristic::None,
            scale: 1.0,
            remaining: 0,
            pending: Vec::new(),
        }
    }

    pub fn mode(mut self, mode: MultiTargetMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn target_heuristic(mut self, target_heuristic: TargetHeuristic) -> Self {
        self.target_heuristic = target_heuristic;
        self
    }

    /// Report paths from each target to the origin instead of the other way
    /// round. Edge costs are assumed symmetric.
    pub fn reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    fn objective(&self) -> HeuristicObjective {
        if self.heuristic == Heuristic::None {
            return HeuristicObjective::disabled();
        }

        let mut open = self
            .targets
            .iter()
            .filter(|target| target.valid && target.path.is_none());

        match self.target_heuristic {
            TargetHeuristic::Sequential => match open.next() {
                Some(target) => HeuristicObjective::towards(
                    target.bounds.unwrap_or_else(|| Aabb::point(target.point)),
                    self.heuristic,
                    self.scale,
                )
                .with_target_node(target.landmark),
                None => HeuristicObjective::disabled(),
            },
            TargetHeuristic::Envelope => {
                let corners = open
                    .filter_map(|target| target.bounds)
                    .flat_map(|bounds| [bounds.min, bounds.max]);
                match Aabb::enclosing(corners) {
                    Some(envelope) => HeuristicObjective::towards(envelope, self.heuristic, self.scale),
                    None => HeuristicObjective::disabled(),
                }
            }
        }
    }

    fn start_error(&self) -> SearchError {
        if self.reversed {
            SearchError::NoEndNode
        } else {
            SearchError::NoStartNode
        }
    }

    fn target_error(&self) -> SearchError {
        if self.reversed {
            SearchError::NoStartNode
        } else {
            SearchError::NoEndNode
        }
    }
}

impl SearchHooks for MultiTargetSearch {
    fn on_found_target<G: GraphOracle + ?Sized>(
        &mut self,
        kernel: &mut Kernel,
        graph: &G,
        slot: u32,
    ) -> ControlFlow<()> {
        let Some(index) = kernel.temp(slot).map(|temp| temp.target_index) else {
            return ControlFlow::Continue(());
        };

        let mut path = kernel.trace_target(graph, slot);
        if self.reversed {
            path = path.reversed();
        }
        trace!(target = index, cost = path.cost, "target reached");

        self.targets[index].path = Some(TargetPath::from(path));
        self.pending.push(index);
        kernel.ignore_target(index);
        self.remaining = self.remaining.saturating_sub(1);

        if self.mode == MultiTargetMode::FirstTarget || self.remaining == 0 {
            return ControlFlow::Break(());
        }

        let next = self.objective();
        if next != kernel.objective {
            kernel.objective = next;
            kernel.rekey(graph);
        }
        ControlFlow::Continue(())
    }

    fn on_frontier_exhausted<G: GraphOracle + ?Sized>(&mut self, _kernel: &mut Kernel, _graph: &G) {}
}

impl SearchStrategy for MultiTargetSearch {
    const NAME: &'static str = "multi-target";

    fn prepare<G: GraphOracle + ?Sized>(
        &mut self,
        kernel: &mut Kernel,
        env: &SearchEnv<'_, G>,
        options: &SearchOptions,
    ) -> Result<(), SearchError> {
        let graph = env.graph;
        self.pending.clear();
        self.heuristic = match self.mode {
            MultiTargetMode::FirstTarget => Heuristic::None,
            MultiTargetMode::AllTargets => options.heuristic,
        };
        self.scale = options.heuristic_scale;

        let origin = env
            .index
            .nearest(graph, self.origin, &options.constraint)
            .ok_or_else(|| self.start_error())?;
        let origin_slot = kernel.add_temp(TemporaryNode {
            kind: TempKind::Start,
            associated: origin.node,
            position: self.origin,
            target_index: 0,
        });

        self.remaining = 0;
        for (index, target) in self.targets.iter_mut().enumerate() {
            target.path = None;
            let ends = resolve_end(env, target.point, &options.constraint);
            target.valid = !ends.nodes.is_empty();
            if !target.valid {
                continue;
            }

            let mut positions = Vec::with_capacity(ends.nodes.len());
            for &node in &ends.nodes {
                let position = ends.end_position(graph, node, target.point);
                positions.push(position);
                kernel.add_temp(TemporaryNode {
                    kind: TempKind::End,
                    associated: node,
                    position,
                    target_index: index,
                });
            }
            target.bounds = Aabb::enclosing(positions);
            target.landmark = ends.single_node();
            self.remaining += 1;
        }

        if self.remaining == 0 {
            return Err(self.target_error());
        }

        kernel.objective = self.objective();
        kernel.seed(graph, origin_slot);
        Ok(())
    }

    fn finish<G: GraphOracle + ?Sized>(&mut self, kernel: &Kernel, _graph: &G) -> SearchResult {
        let searched = kernel.searched_nodes;
        let found = self.targets.iter().filter(|target| target.path.is_some()).count();
        let valid = self.targets.iter().filter(|target| target.valid).count();
        if found == 0 {
            return SearchResult::failed(SearchError::StartUnreachableFromEnd, searched);
        }

        let state = if self.mode == MultiTargetMode::FirstTarget || found == valid {
            CompletionState::Complete
        } else {
            CompletionState::Partial
        };

        let targets: Vec<Option<TargetPath>> = self.targets.iter().map(|target| target.path.clone()).collect();
        let primary = targets
            .iter()
            .flatten()
            .min_by(|a, b| a.cost.total_cmp(&b.cost))
            .cloned()
            .unwrap_or_else(|| TargetPath {
                nodes: Vec::new(),
                points: Vec::new(),
                cost: 0.0,
            });

        SearchResult {
            state,
            error: None,
            nodes: primary.nodes,
            points: primary.points,
            cost: primary.cost,
            searched_nodes: searched,
            targets,
            flood: None,
        }
    }

    fn drain_found(&mut self) -> Vec<(usize, TargetPath)> {
        let targets = &self.targets;
        self.pending
            .drain(..)
            .filter_map(|index| targets[index].path.clone().map(|path| (index, path)))
            .collect()
    }
}
