use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingTable;
use crate::graph::{Edge, GraphOracle, NodeId, Point};
use crate::pool::Reset;
use crate::search::heuristic::HeuristicObjective;
use crate::spatial::NodeConstraint;

/// Parent marker for slots without a predecessor.
pub(crate) const NO_PARENT: u32 = u32::MAX;

/// Pops between clock samples for time-based budgets.
const CLOCK_SAMPLE_INTERVAL: usize = 16;

/// Points closer than this are treated as the same path vertex.
const POINT_EPSILON: f64 = 1e-9;

/// Work allowed per processing slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickBudget {
    /// Stop after this many frontier pops.
    Nodes(usize),
    /// Stop once this many milliseconds have elapsed.
    Millis(u64),
    /// Run the search to completion.
    Unlimited,
}

impl Default for TickBudget {
    fn default() -> Self {
        TickBudget::Millis(2)
    }
}

/// Runtime view of a [`TickBudget`] for one slice.
///
/// At least one node is always popped per slice so that tiny budgets still
/// make progress.
#[derive(Debug)]
pub(crate) struct SliceClock {
    remaining: Option<usize>,
    deadline: Option<Instant>,
    pops: usize,
}

impl SliceClock {
    pub(crate) fn start(budget: TickBudget) -> Self {
        let (remaining, deadline) = match budget {
            TickBudget::Nodes(count) => (Some(count.max(1)), None),
            TickBudget::Millis(ms) => (None, Some(Instant::now() + Duration::from_millis(ms))),
            TickBudget::Unlimited => (None, None),
        };
        Self {
            remaining,
            deadline,
            pops: 0,
        }
    }

    fn expired(&self) -> bool {
        if self.pops == 0 {
            return false;
        }
        if let Some(remaining) = self.remaining {
            return remaining == 0;
        }
        if let Some(deadline) = self.deadline {
            if self.pops % CLOCK_SAMPLE_INTERVAL == 0 {
                return Instant::now() >= deadline;
            }
        }
        false
    }

    fn record_pop(&mut self) {
        self.pops += 1;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }
}

/// How a processing slice ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SliceOutcome {
    /// Budget ran out; call again to continue.
    Suspended,
    /// A hook ended the search or the frontier ran dry.
    Finished,
    Cancelled,
}

/// Role of a temporary node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempKind {
    Start,
    End,
    /// Former end whose target has already been resolved.
    Ignore,
}

/// Per-search node standing for an off-graph start or end point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporaryNode {
    pub kind: TempKind,
    /// Real node this temporary node connects to.
    pub associated: NodeId,
    pub position: Point,
    /// Index of the target this end belongs to (multi-target searches).
    pub target_index: usize,
}

#[derive(Debug, Clone, Copy)]
struct NodeRecord {
    g: f64,
    h: f64,
    parent: u32,
    search_id: u32,
    closed: bool,
}

impl NodeRecord {
    fn fresh(search_id: u32) -> Self {
        Self {
            g: f64::INFINITY,
            h: 0.0,
            parent: NO_PARENT,
            search_id,
            closed: false,
        }
    }
}

impl Default for NodeRecord {
    fn default() -> Self {
        Self::fresh(0)
    }
}

#[derive(Copy, Clone, Debug)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Frontier entry; stale copies are skipped when popped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct OpenEntry {
    f: FloatOrd,
    h: FloatOrd,
    g: FloatOrd,
    sequence: u64,
    slot: u32,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops lowest F, then lowest H, then oldest.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reusable per-worker search memory.
///
/// Records are invalidated by bumping a search id instead of being cleared,
/// so starting a search costs nothing proportional to the graph size.
#[derive(Debug, Default)]
pub struct SearchScratch {
    records: Vec<NodeRecord>,
    search_id: u32,
    heap: BinaryHeap<OpenEntry>,
    sequence: u64,
    node_count: usize,
    temps: Vec<TemporaryNode>,
    end_links: HashMap<u32, Vec<u32>>,
    edges: Vec<Edge>,
    links: Vec<u32>,
}

impl SearchScratch {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin(&mut self, node_count: usize) {
        self.reset();
        self.node_count = node_count;
        if self.search_id == u32::MAX {
            self.records.iter_mut().for_each(|record| record.search_id = 0);
            self.search_id = 0;
        }
        self.search_id += 1;
        if self.records.len() < node_count {
            self.records.resize(node_count, NodeRecord::default());
        }
    }

    fn record(&self, slot: u32) -> NodeRecord {
        match self.records.get(slot as usize) {
            Some(record) if record.search_id == self.search_id => *record,
            _ => NodeRecord::fresh(self.search_id),
        }
    }

    fn record_mut(&mut self, slot: u32) -> &mut NodeRecord {
        let id = self.search_id;
        let record = &mut self.records[slot as usize];
        if record.search_id != id {
            *record = NodeRecord::fresh(id);
        }
        record
    }

    fn push(&mut self, slot: u32, g: f64, h: f64) {
        let sequence = self.sequence;
        self.sequence += 1;
        self.heap.push(OpenEntry {
            f: FloatOrd(g + h),
            h: FloatOrd(h),
            g: FloatOrd(g),
            sequence,
            slot,
        });
    }
}

impl Reset for SearchScratch {
    fn reset(&mut self) {
        self.heap.clear();
        self.sequence = 0;
        self.node_count = 0;
        self.temps.clear();
        self.end_links.clear();
        self.edges.clear();
        self.links.clear();
    }
}

/// Drop consecutive points that coincide.
pub(crate) fn dedup_points(points: &mut Vec<Point>) {
    points.dedup_by(|b, a| a.distance_to(b) <= POINT_EPSILON);
}

/// Path recovered from parent pointers.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TracedPath {
    pub nodes: Vec<NodeId>,
    pub points: Vec<Point>,
    pub cost: f64,
}

impl TracedPath {
    pub(crate) fn reversed(mut self) -> Self {
        self.nodes.reverse();
        self.points.reverse();
        self
    }
}

/// Hooks a strategy plugs into the shared expansion loop.
pub(crate) trait SearchHooks {
    /// Called for every real node when it is closed, before expansion.
    fn on_visit_node<G: GraphOracle + ?Sized>(
        &mut self,
        _kernel: &mut Kernel,
        _graph: &G,
        _slot: u32,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called when an end temporary node is popped.
    fn on_found_target<G: GraphOracle + ?Sized>(
        &mut self,
        _kernel: &mut Kernel,
        _graph: &G,
        _slot: u32,
    ) -> ControlFlow<()> {
        ControlFlow::Break(())
    }

    /// Called once when the open set runs dry.
    fn on_frontier_exhausted<G: GraphOracle + ?Sized>(&mut self, kernel: &mut Kernel, graph: &G);
}

/// A*/Dijkstra core shared by every strategy.
#[derive(Debug)]
pub(crate) struct Kernel {
    scratch: SearchScratch,
    pub objective: HeuristicObjective,
    pub constraint: NodeConstraint,
    pub landmarks: Option<Arc<EmbeddingTable>>,
    pub searched_nodes: usize,
}

impl Kernel {
    pub(crate) fn new(scratch: SearchScratch, constraint: NodeConstraint) -> Self {
        Self {
            scratch,
            objective: HeuristicObjective::disabled(),
            constraint,
            landmarks: None,
            searched_nodes: 0,
        }
    }

    pub(crate) fn begin(&mut self, node_count: usize) {
        self.scratch.begin(node_count);
        self.searched_nodes = 0;
    }

    pub(crate) fn into_scratch(mut self) -> SearchScratch {
        self.scratch.reset();
        self.scratch
    }

    pub(crate) fn add_temp(&mut self, temp: TemporaryNode) -> u32 {
        let scratch = &mut self.scratch;
        let slot = (scratch.node_count + scratch.temps.len()) as u32;
        if scratch.records.len() <= slot as usize {
            scratch.records.resize(slot as usize + 1, NodeRecord::default());
        }
        if temp.kind == TempKind::End {
            scratch
                .end_links
                .entry(temp.associated.0)
                .or_default()
                .push(slot);
        }
        scratch.temps.push(temp);
        slot
    }

    pub(crate) fn temp(&self, slot: u32) -> Option<&TemporaryNode> {
        (slot as usize)
            .checked_sub(self.scratch.node_count)
            .and_then(|index| self.scratch.temps.get(index))
    }

    /// Mark every end of `target_index` as resolved.
    pub(crate) fn ignore_target(&mut self, target_index: usize) {
        for temp in self.scratch.temps.iter_mut() {
            if temp.kind == TempKind::End && temp.target_index == target_index {
                temp.kind = TempKind::Ignore;
            }
        }
    }

    pub(crate) fn node_of(&self, slot: u32) -> NodeId {
        match self.temp(slot) {
            Some(temp) => temp.associated,
            None => NodeId(slot),
        }
    }

    pub(crate) fn position_of<G: GraphOracle + ?Sized>(&self, graph: &G, slot: u32) -> Point {
        match self.temp(slot) {
            Some(temp) => temp.position,
            None => graph.position(NodeId(slot)),
        }
    }

    pub(crate) fn g(&self, slot: u32) -> f64 {
        self.scratch.record(slot).g
    }

    pub(crate) fn parent(&self, slot: u32) -> Option<u32> {
        let parent = self.scratch.record(slot).parent;
        (parent != NO_PARENT).then_some(parent)
    }

    fn estimate<G: GraphOracle + ?Sized>(&self, graph: &G, slot: u32) -> f64 {
        self.objective.estimate(
            self.position_of(graph, slot),
            Some(self.node_of(slot)),
            self.landmarks.as_deref(),
        )
    }

    /// Open `slot` as a search root with zero cost.
    pub(crate) fn seed<G: GraphOracle + ?Sized>(&mut self, graph: &G, slot: u32) {
        let h = self.estimate(graph, slot);
        let record = self.scratch.record_mut(slot);
        record.g = 0.0;
        record.h = h;
        record.parent = NO_PARENT;
        self.scratch.push(slot, 0.0, h);
    }

    fn relax<G: GraphOracle + ?Sized>(&mut self, graph: &G, from: u32, to: u32, cost: f64) {
        let g = self.scratch.record(from).g + cost;
        let current = self.scratch.record(to);
        if current.closed || g >= current.g {
            return;
        }
        let h = if current.g.is_infinite() {
            self.estimate(graph, to)
        } else {
            current.h
        };
        let record = self.scratch.record_mut(to);
        record.g = g;
        record.h = h;
        record.parent = from;
        self.scratch.push(to, g, h);
    }

    /// Recompute `H` for every open slot after the objective changed.
    pub(crate) fn rekey<G: GraphOracle + ?Sized>(&mut self, graph: &G) {
        let entries = std::mem::take(&mut self.scratch.heap).into_vec();
        let mut rebuilt = Vec::with_capacity(entries.len());
        for entry in entries {
            let record = self.scratch.record(entry.slot);
            if record.closed || entry.g.0 > record.g {
                continue;
            }
            let h = self.estimate(graph, entry.slot);
            self.scratch.record_mut(entry.slot).h = h;
            rebuilt.push(OpenEntry {
                f: FloatOrd(record.g + h),
                h: FloatOrd(h),
                ..entry
            });
        }
        self.scratch.heap = BinaryHeap::from(rebuilt);
    }

    fn expand<G: GraphOracle + ?Sized>(&mut self, graph: &G, slot: u32) {
        if let Some(temp) = self.temp(slot).copied() {
            if temp.kind == TempKind::Start
                && self.constraint.can_traverse(graph, temp.associated)
            {
                let cost = temp.position.distance_to(&graph.position(temp.associated));
                self.relax(graph, slot, temp.associated.0, cost);
            }
            return;
        }

        let node = NodeId(slot);
        let mut edges = std::mem::take(&mut self.scratch.edges);
        edges.clear();
        graph.neighbours(node, &mut edges);
        for edge in &edges {
            if self.constraint.can_traverse(graph, edge.target) {
                self.relax(graph, slot, edge.target.0, edge.cost);
            }
        }
        self.scratch.edges = edges;

        let mut links = std::mem::take(&mut self.scratch.links);
        links.clear();
        if let Some(ends) = self.scratch.end_links.get(&slot) {
            links.extend_from_slice(ends);
        }
        let position = graph.position(node);
        for &end in &links {
            if let Some(temp) = self.temp(end).copied() {
                if temp.kind == TempKind::End {
                    self.relax(graph, slot, end, position.distance_to(&temp.position));
                }
            }
        }
        self.scratch.links = links;
    }

    /// Path from the search root to a real node.
    pub(crate) fn trace_node<G: GraphOracle + ?Sized>(&self, graph: &G, slot: u32) -> TracedPath {
        assert!(self.temp(slot).is_none(), "trace_node called on a temporary slot");
        self.trace(graph, slot)
    }

    /// Path from the search root to an end temporary node.
    pub(crate) fn trace_target<G: GraphOracle + ?Sized>(&self, graph: &G, slot: u32) -> TracedPath {
        let temp = self.temp(slot).expect("trace_target called on a real node");
        assert!(
            matches!(temp.kind, TempKind::End | TempKind::Ignore),
            "trace_target called on a start node"
        );
        self.trace(graph, slot)
    }

    fn trace<G: GraphOracle + ?Sized>(&self, graph: &G, slot: u32) -> TracedPath {
        let mut nodes = Vec::new();
        let mut start_point = None;
        let end_point = self.temp(slot).map(|temp| temp.position);
        let mut cursor = slot;

        loop {
            match self.temp(cursor) {
                Some(temp) if temp.kind == TempKind::Start => start_point = Some(temp.position),
                Some(_) => {}
                None => nodes.push(NodeId(cursor)),
            }
            match self.parent(cursor) {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        nodes.reverse();

        let mut points = Vec::with_capacity(nodes.len() + 2);
        points.extend(start_point);
        points.extend(nodes.iter().map(|&node| graph.position(node)));
        points.extend(end_point);
        dedup_points(&mut points);

        TracedPath {
            nodes,
            points,
            cost: self.g(slot),
        }
    }
}

/// Run the expansion loop until the budget, a hook or cancellation stops it.
///
/// Budget and cancellation are both checked once per frontier pop.
pub(crate) fn run_slice<G, H>(
    kernel: &mut Kernel,
    graph: &G,
    hooks: &mut H,
    budget: TickBudget,
    cancel: &AtomicBool,
) -> SliceOutcome
where
    G: GraphOracle + ?Sized,
    H: SearchHooks,
{
    let mut clock = SliceClock::start(budget);

    loop {
        if cancel.load(AtomicOrdering::Acquire) {
            return SliceOutcome::Cancelled;
        }
        if clock.expired() {
            return SliceOutcome::Suspended;
        }

        let Some(entry) = kernel.scratch.heap.pop() else {
            hooks.on_frontier_exhausted(kernel, graph);
            return SliceOutcome::Finished;
        };

        let slot = entry.slot;
        let record = kernel.scratch.record(slot);
        if record.closed || entry.g.0 > record.g {
            continue;
        }
        kernel.scratch.record_mut(slot).closed = true;
        clock.record_pop();

        match kernel.temp(slot).map(|temp| temp.kind) {
            Some(TempKind::End) => {
                if hooks.on_found_target(kernel, graph, slot).is_break() {
                    return SliceOutcome::Finished;
                }
            }
            Some(TempKind::Ignore) => {}
            Some(TempKind::Start) => kernel.expand(graph, slot),
            None => {
                kernel.searched_nodes += 1;
                if hooks.on_visit_node(kernel, graph, slot).is_break() {
                    return SliceOutcome::Finished;
                }
                kernel.expand(graph, slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GridGraph, GridOptions};

    struct StopAtTarget {
        found: Option<u32>,
        exhausted: bool,
    }

    impl SearchHooks for StopAtTarget {
        fn on_found_target<G: GraphOracle + ?Sized>(
            &mut self,
            _kernel: &mut Kernel,
            _graph: &G,
            slot: u32,
        ) -> ControlFlow<()> {
            self.found = Some(slot);
            ControlFlow::Break(())
        }

        fn on_frontier_exhausted<G: GraphOracle + ?Sized>(&mut self, _kernel: &mut Kernel, _graph: &G) {
            self.exhausted = true;
        }
    }

    fn line_kernel(grid: &GridGraph, from: (usize, usize), to: (usize, usize)) -> (Kernel, u32) {
        let mut kernel = Kernel::new(SearchScratch::new(), NodeConstraint::default());
        kernel.begin(grid.node_count());
        let start = grid.node_at(from.0, from.1).unwrap();
        let end = grid.node_at(to.0, to.1).unwrap();
        let start_slot = kernel.add_temp(TemporaryNode {
            kind: TempKind::Start,
            associated: start,
            position: grid.position(start),
            target_index: 0,
        });
        kernel.add_temp(TemporaryNode {
            kind: TempKind::End,
            associated: end,
            position: grid.position(end),
            target_index: 0,
        });
        kernel.seed(grid, start_slot);
        (kernel, start_slot)
    }

    #[test]
    fn heap_prefers_lower_h_on_equal_f() {
        let mut heap = BinaryHeap::new();
        let make = |f: f64, h: f64, sequence: u64| OpenEntry {
            f: FloatOrd(f),
            h: FloatOrd(h),
            g: FloatOrd(f - h),
            sequence,
            slot: sequence as u32,
        };
        heap.push(make(5.0, 3.0, 0));
        heap.push(make(5.0, 1.0, 1));
        heap.push(make(5.0, 1.0, 2));
        heap.push(make(4.0, 4.0, 3));
        let order: Vec<u32> = std::iter::from_fn(|| heap.pop().map(|e| e.slot)).collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn finds_straight_line_target() {
        let grid = GridGraph::new(5, 1, GridOptions::four_connected()).unwrap();
        let (mut kernel, _) = line_kernel(&grid, (0, 0), (4, 0));
        let mut hooks = StopAtTarget {
            found: None,
            exhausted: false,
        };
        let outcome = run_slice(
            &mut kernel,
            &grid,
            &mut hooks,
            TickBudget::Unlimited,
            &AtomicBool::new(false),
        );
        assert_eq!(outcome, SliceOutcome::Finished);
        let path = kernel.trace_target(&grid, hooks.found.unwrap());
        assert_eq!(path.nodes.len(), 5);
        assert_eq!(path.cost, 4.0);
        assert_eq!(path.points.len(), 5);
    }

    #[test]
    fn node_budget_suspends_and_resumes() {
        let grid = GridGraph::new(8, 1, GridOptions::four_connected()).unwrap();
        let (mut kernel, _) = line_kernel(&grid, (0, 0), (7, 0));
        let mut hooks = StopAtTarget {
            found: None,
            exhausted: false,
        };
        let cancel = AtomicBool::new(false);
        let mut slices = 0;
        loop {
            slices += 1;
            match run_slice(&mut kernel, &grid, &mut hooks, TickBudget::Nodes(2), &cancel) {
                SliceOutcome::Suspended => continue,
                outcome => {
                    assert_eq!(outcome, SliceOutcome::Finished);
                    break;
                }
            }
        }
        assert!(slices > 1);
        assert_eq!(kernel.trace_target(&grid, hooks.found.unwrap()).cost, 7.0);
    }

    #[test]
    fn recorded_costs_only_decrease_between_slices() {
        let mut grid = GridGraph::new(6, 6, GridOptions::default()).unwrap();
        for (x, y, penalty) in [(1, 1, 4.0), (2, 1, 2.5), (3, 3, 6.0), (4, 2, 1.0), (1, 4, 3.0)] {
            grid.set_penalty(grid.node_at(x, y).unwrap(), penalty);
        }
        grid.set_walkable(grid.node_at(2, 3).unwrap(), false);

        let origin = grid.node_at(0, 0).unwrap();
        let mut kernel = Kernel::new(SearchScratch::new(), NodeConstraint::default());
        kernel.begin(grid.node_count());
        let start = kernel.add_temp(TemporaryNode {
            kind: TempKind::Start,
            associated: origin,
            position: grid.position(origin),
            target_index: 0,
        });
        kernel.seed(&grid, start);

        let mut hooks = StopAtTarget {
            found: None,
            exhausted: false,
        };
        let cancel = AtomicBool::new(false);
        let snapshot = |kernel: &Kernel| -> Vec<f64> {
            (0..grid.node_count() as u32).map(|slot| kernel.g(slot)).collect()
        };

        let mut previous = snapshot(&kernel);
        loop {
            let outcome = run_slice(&mut kernel, &grid, &mut hooks, TickBudget::Nodes(1), &cancel);
            let current = snapshot(&kernel);
            for (slot, (before, after)) in previous.iter().zip(&current).enumerate() {
                assert!(after <= before, "slot {slot} went from {before} to {after}");
            }
            previous = current;
            if outcome != SliceOutcome::Suspended {
                assert_eq!(outcome, SliceOutcome::Finished);
                break;
            }
        }

        assert!(hooks.exhausted);
        let expected = crate::embedding::flood_costs(&grid, origin);
        for (slot, (got, want)) in previous.iter().zip(&expected).enumerate() {
            if want.is_finite() {
                assert!((got - want).abs() < 1e-9, "slot {slot}: {got} vs {want}");
            } else {
                assert!(got.is_infinite(), "slot {slot} should be unreached");
            }
        }
    }

    #[test]
    fn cancellation_is_observed_before_popping() {
        let grid = GridGraph::new(3, 3, GridOptions::default()).unwrap();
        let (mut kernel, _) = line_kernel(&grid, (0, 0), (2, 2));
        let mut hooks = StopAtTarget {
            found: None,
            exhausted: false,
        };
        let outcome = run_slice(
            &mut kernel,
            &grid,
            &mut hooks,
            TickBudget::Unlimited,
            &AtomicBool::new(true),
        );
        assert_eq!(outcome, SliceOutcome::Cancelled);
        assert_eq!(kernel.searched_nodes, 0);
    }

    #[test]
    fn disconnected_target_exhausts_frontier() {
        let mut grid = GridGraph::new(3, 1, GridOptions::four_connected()).unwrap();
        grid.set_walkable(grid.node_at(1, 0).unwrap(), false);
        let (mut kernel, _) = line_kernel(&grid, (0, 0), (2, 0));
        let mut hooks = StopAtTarget {
            found: None,
            exhausted: false,
        };
        run_slice(
            &mut kernel,
            &grid,
            &mut hooks,
            TickBudget::Unlimited,
            &AtomicBool::new(false),
        );
        assert!(hooks.exhausted);
        assert!(hooks.found.is_none());
    }

    #[test]
    fn scratch_reuse_forgets_previous_search() {
        let grid = GridGraph::new(4, 1, GridOptions::four_connected()).unwrap();
        let (kernel, _) = line_kernel(&grid, (0, 0), (3, 0));
        let scratch = kernel.into_scratch();
        let mut kernel = Kernel::new(scratch, NodeConstraint::default());
        kernel.begin(grid.node_count());
        assert!(kernel.g(0).is_infinite());
        assert!(kernel.temp(4).is_none());
    }

    #[test]
    #[should_panic(expected = "start node")]
    fn tracing_from_start_temp_panics() {
        let grid = GridGraph::new(2, 1, GridOptions::four_connected()).unwrap();
        let (kernel, start) = line_kernel(&grid, (0, 0), (1, 0));
        kernel.trace_target(&grid, start);
    }
}
