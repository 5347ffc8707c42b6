//! Common test utilities and fixture helpers.
//!
//! Fixture maps live in `docs/fixtures`; [`shortest_costs`] is a plain
//! Dijkstra used as the reference answer for search results.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::PathBuf;

use wayfinder_lib::{
    Edge, GraphOracle, GridGraph, GridOptions, NodeId, SearchEnv, SearchRequest, SearchResult,
    Searcher, SpatialIndex,
};

/// Path to the fixtures directory shared with the CLI tests.
#[allow(dead_code)]
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

/// Load one of the ASCII fixture maps.
#[allow(dead_code)]
pub fn fixture_grid(name: &str, options: GridOptions) -> GridGraph {
    let path = fixtures_dir().join(name);
    let text = std::fs::read_to_string(&path).expect("read fixture map");
    GridGraph::from_ascii(&text, options).expect("parse fixture map")
}

/// Open grid where diagonal and orthogonal steps both cost 1.
#[allow(dead_code)]
pub fn uniform_grid(width: usize, height: usize) -> GridGraph {
    let options = GridOptions {
        diagonal_cost: 1.0,
        ..GridOptions::default()
    };
    GridGraph::new(width, height, options).expect("valid grid")
}

/// Run a request to completion with a fresh index.
#[allow(dead_code)]
pub fn run<G: GraphOracle>(graph: &G, request: SearchRequest) -> SearchResult {
    let index = SpatialIndex::build(graph);
    Searcher::new().run(&SearchEnv::new(graph, &index), request)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cost(f64);

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Cost from `source` to every node; `f64::INFINITY` when unreachable.
#[allow(dead_code)]
pub fn shortest_costs<G: GraphOracle>(graph: &G, source: NodeId) -> Vec<f64> {
    let mut costs = vec![f64::INFINITY; graph.node_count()];
    let mut heap = BinaryHeap::new();
    let mut edges: Vec<Edge> = Vec::new();

    costs[source.index()] = 0.0;
    heap.push(Reverse((Cost(0.0), source)));

    while let Some(Reverse((Cost(cost), node))) = heap.pop() {
        if cost > costs[node.index()] {
            continue;
        }
        edges.clear();
        graph.neighbours(node, &mut edges);
        for edge in &edges {
            let next = cost + edge.cost;
            if next < costs[edge.target.index()] {
                costs[edge.target.index()] = next;
                heap.push(Reverse((Cost(next), edge.target)));
            }
        }
    }

    costs
}

/// Sum of edge costs along `nodes`, panicking if two consecutive nodes are
/// not connected.
#[allow(dead_code)]
pub fn path_cost<G: GraphOracle>(graph: &G, nodes: &[NodeId]) -> f64 {
    let mut edges = Vec::new();
    nodes
        .windows(2)
        .map(|pair| {
            edges.clear();
            graph.neighbours(pair[0], &mut edges);
            edges
                .iter()
                .find(|edge| edge.target == pair[1])
                .map(|edge| edge.cost)
                .unwrap_or_else(|| panic!("{} and {} are not adjacent", pair[0], pair[1]))
        })
        .sum()
}

#[allow(dead_code)]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
