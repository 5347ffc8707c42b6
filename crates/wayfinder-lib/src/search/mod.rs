//! Incremental search strategies built on a shared A*/Dijkstra kernel.
//!
//! Every request runs through [`ActiveSearch`], which prepares the strategy
//! (resolving points to nodes, creating temporary start/end nodes) and then
//! advances the kernel one budgeted slice at a time. The same driver backs
//! the synchronous [`Searcher`] and the threaded
//! [`PathProcessor`](crate::PathProcessor).

pub mod flood;
pub mod heuristic;
pub mod kernel;
pub mod multi;
pub mod point;
pub mod random;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedding::EmbeddingTable;
use crate::error::SearchError;
use crate::graph::{GraphOracle, NodeId, Point};
use crate::pool::Pool;
use crate::request::{SearchOptions, SearchRequest, SearchResult, TargetPath};
use crate::spatial::{NodeConstraint, SpatialIndex};

use self::flood::{FloodSearch, FloodTraceSearch};
use self::kernel::{run_slice, Kernel, SearchHooks, SearchScratch, SliceOutcome, TickBudget};
use self::multi::MultiTargetSearch;
use self::point::PointSearch;
use self::random::RandomSearch;

/// Read-only view of the world a search runs against.
pub struct SearchEnv<'a, G: GraphOracle + ?Sized> {
    pub graph: &'a G,
    pub index: &'a SpatialIndex,
    /// Landmark table snapshot, if one is available.
    pub landmarks: Option<Arc<EmbeddingTable>>,
}

impl<'a, G: GraphOracle + ?Sized> SearchEnv<'a, G> {
    pub fn new(graph: &'a G, index: &'a SpatialIndex) -> Self {
        Self {
            graph,
            index,
            landmarks: None,
        }
    }

    pub fn with_landmarks(mut self, landmarks: Option<Arc<EmbeddingTable>>) -> Self {
        self.landmarks = landmarks;
        self
    }
}

/// Behaviour every strategy provides on top of the kernel hooks.
pub(crate) trait SearchStrategy: SearchHooks {
    const NAME: &'static str;

    /// Whether a custom ending condition may be attached.
    fn supports_ending_condition(&self) -> bool {
        false
    }

    /// Resolve points, create temporary nodes and seed the frontier.
    fn prepare<G: GraphOracle + ?Sized>(
        &mut self,
        kernel: &mut Kernel,
        env: &SearchEnv<'_, G>,
        options: &SearchOptions,
    ) -> Result<(), SearchError>;

    /// Build the result once the kernel loop has finished.
    fn finish<G: GraphOracle + ?Sized>(&mut self, kernel: &Kernel, graph: &G) -> SearchResult;

    /// Targets resolved since the last call.
    fn drain_found(&mut self) -> Vec<(usize, TargetPath)> {
        Vec::new()
    }
}

/// Search strategy carried by a request.
#[derive(Debug, Clone)]
pub enum Strategy {
    PointToPoint(PointSearch),
    MultiTarget(MultiTargetSearch),
    Random(RandomSearch),
    Flood(FloodSearch),
    FloodTrace(FloodTraceSearch),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::PointToPoint(_) => PointSearch::NAME,
            Strategy::MultiTarget(_) => MultiTargetSearch::NAME,
            Strategy::Random(_) => RandomSearch::NAME,
            Strategy::Flood(_) => FloodSearch::NAME,
            Strategy::FloodTrace(_) => FloodTraceSearch::NAME,
        }
    }
}

macro_rules! impl_strategy_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(impl From<$ty> for Strategy {
            fn from(search: $ty) -> Self {
                Strategy::$variant(search)
            }
        })*
    };
}

impl_strategy_from! {
    PointToPoint => PointSearch,
    MultiTarget => MultiTargetSearch,
    Random => RandomSearch,
    Flood => FloodSearch,
    FloodTrace => FloodTraceSearch,
}

macro_rules! dispatch {
    ($strategy:expr, $search:ident => $body:expr) => {
        match $strategy {
            Strategy::PointToPoint($search) => $body,
            Strategy::MultiTarget($search) => $body,
            Strategy::Random($search) => $body,
            Strategy::Flood($search) => $body,
            Strategy::FloodTrace($search) => $body,
        }
    };
}

/// Outcome of one [`ActiveSearch::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// More slices are needed.
    Pending,
    /// The result is ready.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Processing,
    Finished,
}

/// A search in progress, advanced one budgeted slice at a time.
#[derive(Debug)]
pub struct ActiveSearch {
    strategy: Strategy,
    options: SearchOptions,
    kernel: Kernel,
    phase: Phase,
    result: Option<SearchResult>,
}

impl ActiveSearch {
    pub fn new(strategy: Strategy, options: SearchOptions, scratch: SearchScratch) -> Self {
        let kernel = Kernel::new(scratch, options.constraint);
        Self {
            strategy,
            options,
            kernel,
            phase: Phase::Created,
            result: None,
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Advance the search by at most one slice of `budget`.
    ///
    /// Cancellation is observed between frontier pops; a cancelled search
    /// finishes with [`SearchError::Cancelled`].
    pub fn step<G: GraphOracle + ?Sized>(
        &mut self,
        env: &SearchEnv<'_, G>,
        budget: TickBudget,
        cancel: &AtomicBool,
    ) -> StepStatus {
        if self.phase == Phase::Created {
            if let Err(error) = self.prepare(env) {
                debug!(strategy = self.strategy.name(), %error, "search failed during preparation");
                self.finish_with(SearchResult::failed(error, 0));
                return StepStatus::Finished;
            }
            self.phase = Phase::Processing;
        }
        if self.phase == Phase::Finished {
            return StepStatus::Finished;
        }

        let kernel = &mut self.kernel;
        let outcome = dispatch!(&mut self.strategy, search => run_slice(kernel, env.graph, search, budget, cancel));

        match outcome {
            SliceOutcome::Suspended => StepStatus::Pending,
            SliceOutcome::Finished => {
                let kernel = &self.kernel;
                let result = dispatch!(&mut self.strategy, search => search.finish(kernel, env.graph));
                self.finish_with(result);
                StepStatus::Finished
            }
            SliceOutcome::Cancelled => {
                let searched = self.kernel.searched_nodes;
                self.finish_with(SearchResult::failed(SearchError::Cancelled, searched));
                StepStatus::Finished
            }
        }
    }

    fn prepare<G: GraphOracle + ?Sized>(&mut self, env: &SearchEnv<'_, G>) -> Result<(), SearchError> {
        let supported = dispatch!(&self.strategy, search => search.supports_ending_condition());
        if self.options.ending_condition.is_some() && !supported {
            return Err(SearchError::CustomEndingConditionUnsupported {
                strategy: self.strategy.name(),
            });
        }

        self.kernel.begin(env.graph.node_count());
        self.kernel.constraint = self.options.constraint;
        self.kernel.landmarks = match &env.landmarks {
            Some(table) if self.options.use_landmarks => {
                if table.is_stale(env.graph) {
                    warn!(
                        strategy = self.strategy.name(),
                        table_version = table.graph_version(),
                        graph_version = env.graph.version(),
                        "landmark table is stale; searching without it"
                    );
                    None
                } else {
                    Some(table.clone())
                }
            }
            _ => None,
        };

        let kernel = &mut self.kernel;
        let options = &self.options;
        dispatch!(&mut self.strategy, search => search.prepare(kernel, env, options))
    }

    fn finish_with(&mut self, result: SearchResult) {
        debug!(
            strategy = self.strategy.name(),
            state = ?result.state,
            searched_nodes = result.searched_nodes,
            "search finished"
        );
        self.result = Some(result);
        self.phase = Phase::Finished;
    }

    /// Targets found since the last call (multi-target searches only).
    pub fn take_found_targets(&mut self) -> Vec<(usize, TargetPath)> {
        dispatch!(&mut self.strategy, search => search.drain_found())
    }

    pub fn take_result(&mut self) -> Option<SearchResult> {
        self.result.take()
    }

    /// Recover the scratch memory for reuse.
    pub fn into_scratch(self) -> SearchScratch {
        self.kernel.into_scratch()
    }
}

/// Synchronous front end that runs requests to completion on the caller's
/// thread, reusing scratch memory between calls.
pub struct Searcher {
    scratch: Pool<SearchScratch>,
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Searcher {
    pub fn new() -> Self {
        Self {
            scratch: Pool::new(),
        }
    }

    /// Run `request` to completion and return its result.
    ///
    /// Callbacks attached to the request are invoked before returning.
    pub fn run<G: GraphOracle + ?Sized>(
        &mut self,
        env: &SearchEnv<'_, G>,
        request: SearchRequest,
    ) -> SearchResult {
        let (strategy, options, mut callbacks) = request.into_parts();
        let mut search = ActiveSearch::new(strategy, options, self.scratch.acquire());
        let never = AtomicBool::new(false);
        while search.step(env, TickBudget::Unlimited, &never) == StepStatus::Pending {}

        for (index, path) in search.take_found_targets() {
            callbacks.target_found(index, &path);
        }
        let result = search
            .take_result()
            .unwrap_or_else(|| SearchResult::failed(SearchError::Cancelled, 0));
        callbacks.completed(&result);
        self.scratch.release(search.into_scratch());
        result
    }
}

/// Nodes an end point resolves to.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct EndResolution {
    pub nodes: Vec<NodeId>,
    /// The point lies on an unwalkable cell and `nodes` are its walkable
    /// surroundings.
    pub around_blocked: bool,
}

impl EndResolution {
    /// Position the temporary end for `node` should take.
    pub(crate) fn end_position<G: GraphOracle + ?Sized>(&self, graph: &G, node: NodeId, point: Point) -> Point {
        if self.around_blocked {
            graph.position(node)
        } else {
            point
        }
    }

    /// Landmark target when the end resolved to a single node.
    pub(crate) fn single_node(&self) -> Option<NodeId> {
        match self.nodes.as_slice() {
            [node] if !self.around_blocked => Some(*node),
            _ => None,
        }
    }
}

/// Resolve an end point to candidate nodes.
///
/// When the node nearest to `point` is an unwalkable grid cell, its walkable
/// surrounding cells all become candidates and the search settles on
/// whichever is cheapest to reach. Otherwise the nearest traversable node is
/// used.
pub(crate) fn resolve_end<G: GraphOracle + ?Sized>(
    env: &SearchEnv<'_, G>,
    point: Point,
    constraint: &NodeConstraint,
) -> EndResolution {
    let any = NodeConstraint {
        walkable_only: false,
        ..*constraint
    };
    if let Some(nearest) = env.index.nearest(env.graph, point, &any) {
        if constraint.can_traverse(env.graph, nearest.node) {
            return EndResolution {
                nodes: vec![nearest.node],
                around_blocked: false,
            };
        }
        if !env.graph.is_walkable(nearest.node) {
            let around: Vec<NodeId> = env
                .graph
                .surrounding_cells(nearest.node)
                .into_iter()
                .filter(|&cell| constraint.can_traverse(env.graph, cell))
                .collect();
            if !around.is_empty() {
                return EndResolution {
                    nodes: around,
                    around_blocked: true,
                };
            }
        }
    }

    EndResolution {
        nodes: env
            .index
            .nearest(env.graph, point, constraint)
            .map(|nearest| vec![nearest.node])
            .unwrap_or_default(),
        around_blocked: false,
    }
}
