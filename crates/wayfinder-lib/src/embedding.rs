//! Landmark (differential) heuristic embedding.
//!
//! For a set of pivot nodes the exact cost from every pivot to every node is
//! precomputed. Because edge costs are symmetric, the triangle inequality
//! gives the admissible estimate
//! `h(a, b) = max_p |cost(a, p) - cost(b, p)|`.
//!
//! Pivot floods run in parallel with rayon. Unwalkable cells, which no flood
//! reaches, receive the cheapest cost of their walkable surrounding cells
//! afterwards so that heuristic queries towards them still return useful
//! values.
//!
//! Tables can be written to disk for reuse:
//!   - 16-byte header: magic `WFLE`, version, flags, pivot count, node count
//!   - postcard-serialized table, zstd compressed
//!   - SHA-256 checksum of the compressed body

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Error, Result, SearchError};
use crate::graph::{Edge, GraphOracle, NodeId, Point};
use crate::spatial::{NodeConstraint, SpatialIndex};

const TABLE_MAGIC: &[u8; 4] = b"WFLE";
const TABLE_VERSION: u8 = 1;
const FLAG_PATCHED: u8 = 0x01;
const HEADER_SIZE: usize = 16;
const CHECKSUM_SIZE: usize = 32;
const COMPRESSION_LEVEL: i32 = 3;

/// How pivots are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotSelection {
    /// Exactly these nodes.
    Fixed(Vec<NodeId>),
    /// The nearest walkable node to each point.
    FixedPoints(Vec<Point>),
    /// `count` walkable nodes chosen uniformly.
    Random { count: usize, seed: Option<u64> },
    /// A random first pivot, then repeatedly the node furthest from every
    /// pivot chosen so far.
    RandomSpreadOut { count: usize, seed: Option<u64> },
}

/// Pivot-to-node cost table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingTable {
    pivots: Vec<NodeId>,
    node_count: usize,
    /// Pivot-major; `f64::INFINITY` where a pivot cannot reach a node.
    costs: Vec<f64>,
    graph_version: u64,
}

impl EmbeddingTable {
    /// Select pivots and flood from each of them.
    pub fn build<G: GraphOracle + ?Sized>(
        graph: &G,
        index: &SpatialIndex,
        selection: &PivotSelection,
    ) -> std::result::Result<Self, SearchError> {
        let node_count = graph.node_count();
        let (pivots, mut rows) = match selection {
            PivotSelection::Fixed(nodes) => (validate_pivots(graph, nodes.clone())?, Vec::new()),
            PivotSelection::FixedPoints(points) => {
                let nodes = points
                    .iter()
                    .map(|&point| {
                        index
                            .nearest(graph, point, &NodeConstraint::default())
                            .map(|nearest| nearest.node)
                            .ok_or_else(|| SearchError::InvalidPivotSet {
                                reason: format!("no walkable node near {point:?}"),
                            })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                (validate_pivots(graph, nodes)?, Vec::new())
            }
            PivotSelection::Random { count, seed } => {
                let mut rng = seeded(*seed);
                let mut walkable = walkable_nodes(graph);
                walkable.shuffle(&mut rng);
                walkable.truncate(*count);
                (validate_pivots(graph, walkable)?, Vec::new())
            }
            PivotSelection::RandomSpreadOut { count, seed } => spread_out(graph, *count, *seed)?,
        };

        if rows.len() != pivots.len() {
            rows = pivots
                .par_iter()
                .map(|&pivot| flood_costs(graph, pivot))
                .collect();
        }

        for (&pivot, row) in pivots.iter().zip(&rows) {
            if unreached_pivot(row) {
                warn!(%pivot, "landmark pivot reached no other node");
            }
        }

        let mut costs = Vec::with_capacity(pivots.len() * node_count);
        for row in rows {
            costs.extend(row);
        }

        let mut table = Self {
            pivots,
            node_count,
            costs,
            graph_version: graph.version(),
        };
        table.patch_unwalkable(graph);

        info!(
            pivots = table.pivots.len(),
            nodes = node_count,
            "built landmark table"
        );
        Ok(table)
    }

    /// Give unwalkable cells the cheapest cost among their walkable
    /// surroundings. Runs after all floods have finished.
    fn patch_unwalkable<G: GraphOracle + ?Sized>(&mut self, graph: &G) {
        let n = self.node_count;
        for node in (0..n).map(|index| NodeId(index as u32)) {
            if graph.is_walkable(node) {
                continue;
            }
            let around: Vec<NodeId> = graph
                .surrounding_cells(node)
                .into_iter()
                .filter(|&cell| graph.is_walkable(cell))
                .collect();
            for pivot in 0..self.pivots.len() {
                let row = &mut self.costs[pivot * n..(pivot + 1) * n];
                let best = around
                    .iter()
                    .map(|cell| row[cell.index()])
                    .fold(f64::INFINITY, f64::min);
                row[node.index()] = best;
            }
        }
    }

    pub fn pivots(&self) -> &[NodeId] {
        &self.pivots
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn graph_version(&self) -> u64 {
        self.graph_version
    }

    /// Whether the graph changed since the table was built.
    pub fn is_stale<G: GraphOracle + ?Sized>(&self, graph: &G) -> bool {
        graph.version() != self.graph_version || graph.node_count() != self.node_count
    }

    /// Cost from pivot number `pivot` to `node`.
    pub fn cost(&self, pivot: usize, node: NodeId) -> Option<f64> {
        if pivot >= self.pivots.len() || node.index() >= self.node_count {
            return None;
        }
        Some(self.costs[pivot * self.node_count + node.index()]).filter(|cost| cost.is_finite())
    }

    /// Lower bound on the cost between `a` and `b`.
    ///
    /// Pivots that cannot reach both nodes are ignored; zero when none can.
    pub fn heuristic(&self, a: NodeId, b: NodeId) -> f64 {
        let n = self.node_count;
        if a.index() >= n || b.index() >= n {
            return 0.0;
        }
        self.costs
            .chunks_exact(n)
            .map(|row| (row[a.index()], row[b.index()]))
            .filter(|(ca, cb)| ca.is_finite() && cb.is_finite())
            .map(|(ca, cb)| (ca - cb).abs())
            .fold(0.0, f64::max)
    }

    /// Serialize the table to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), pivots = self.pivots.len(), "saving landmark table");

        let serialized = postcard::to_allocvec(self).map_err(|e| Error::EmbeddingSerialize {
            message: format!("postcard serialization failed: {e}"),
        })?;
        let compressed = zstd::encode_all(serialized.as_slice(), COMPRESSION_LEVEL).map_err(|e| {
            Error::EmbeddingSerialize {
                message: format!("zstd compression failed: {e}"),
            }
        })?;
        let checksum = Sha256::digest(&compressed);

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(TABLE_MAGIC);
        header[4] = TABLE_VERSION;
        header[5] = FLAG_PATCHED;
        header[6..8].copy_from_slice(&(self.pivots.len() as u16).to_le_bytes());
        header[8..12].copy_from_slice(&(self.node_count as u32).to_le_bytes());
        // bytes 12-15 reserved

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&header)?;
        writer.write_all(&compressed)?;
        writer.write_all(&checksum)?;
        writer.flush()?;

        debug!(compressed_size = compressed.len(), "landmark table saved");
        Ok(())
    }

    /// Load a table written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self> {
        let fail = |message: String| Error::EmbeddingLoad {
            path: path.to_path_buf(),
            message,
        };

        let file = File::open(path).map_err(|e| fail(format!("failed to open file: {e}")))?;
        let mut bytes = Vec::new();
        BufReader::new(file)
            .read_to_end(&mut bytes)
            .map_err(|e| fail(format!("failed to read file: {e}")))?;

        if bytes.len() < HEADER_SIZE + CHECKSUM_SIZE {
            return Err(fail("file too short".to_string()));
        }
        let (header, rest) = bytes.split_at(HEADER_SIZE);
        if &header[0..4] != TABLE_MAGIC {
            return Err(fail("invalid magic bytes".to_string()));
        }
        if header[4] != TABLE_VERSION {
            return Err(fail(format!(
                "unsupported version {} (expected {})",
                header[4], TABLE_VERSION
            )));
        }
        let pivot_count = u16::from_le_bytes([header[6], header[7]]) as usize;
        let node_count = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;

        let (compressed, stored_checksum) = rest.split_at(rest.len() - CHECKSUM_SIZE);
        if Sha256::digest(compressed).as_slice() != stored_checksum {
            return Err(fail("checksum mismatch - file may be corrupted".to_string()));
        }

        let decompressed =
            zstd::decode_all(compressed).map_err(|e| fail(format!("zstd decompression failed: {e}")))?;
        let table: Self = postcard::from_bytes(&decompressed)
            .map_err(|e| fail(format!("postcard deserialization failed: {e}")))?;

        if table.pivots.len() != pivot_count || table.node_count != node_count {
            warn!(
                expected_pivots = pivot_count,
                actual_pivots = table.pivots.len(),
                expected_nodes = node_count,
                actual_nodes = table.node_count,
                "landmark table header does not match body"
            );
        }
        if table.costs.len() != table.pivots.len() * table.node_count {
            return Err(fail("cost table has the wrong size".to_string()));
        }

        info!(pivots = table.pivots.len(), nodes = table.node_count, "loaded landmark table");
        Ok(table)
    }
}

/// Shared, rebuildable landmark table.
///
/// Searches take an [`Arc`] snapshot, so a rebuild never disturbs searches
/// that are already running.
#[derive(Debug)]
pub struct LandmarkEmbedding {
    selection: PivotSelection,
    table: RwLock<Arc<EmbeddingTable>>,
}

impl LandmarkEmbedding {
    pub fn build<G: GraphOracle + ?Sized>(
        graph: &G,
        index: &SpatialIndex,
        selection: PivotSelection,
    ) -> std::result::Result<Self, SearchError> {
        let table = EmbeddingTable::build(graph, index, &selection)?;
        Ok(Self::from_table(selection, table))
    }

    pub fn from_table(selection: PivotSelection, table: EmbeddingTable) -> Self {
        Self {
            selection,
            table: RwLock::new(Arc::new(table)),
        }
    }

    pub fn selection(&self) -> &PivotSelection {
        &self.selection
    }

    pub fn snapshot(&self) -> Arc<EmbeddingTable> {
        self.table.read().clone()
    }

    pub fn is_stale<G: GraphOracle + ?Sized>(&self, graph: &G) -> bool {
        self.table.read().is_stale(graph)
    }

    /// Recompute the table for the current graph.
    pub fn rebuild<G: GraphOracle + ?Sized>(
        &self,
        graph: &G,
        index: &SpatialIndex,
    ) -> std::result::Result<(), SearchError> {
        let table = EmbeddingTable::build(graph, index, &self.selection)?;
        *self.table.write() = Arc::new(table);
        Ok(())
    }

    pub fn heuristic(&self, a: NodeId, b: NodeId) -> f64 {
        self.table.read().heuristic(a, b)
    }
}

fn seeded(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn walkable_nodes<G: GraphOracle + ?Sized>(graph: &G) -> Vec<NodeId> {
    (0..graph.node_count())
        .map(|index| NodeId(index as u32))
        .filter(|&node| graph.is_walkable(node))
        .collect()
}

fn validate_pivots<G: GraphOracle + ?Sized>(
    graph: &G,
    mut pivots: Vec<NodeId>,
) -> std::result::Result<Vec<NodeId>, SearchError> {
    let mut seen = std::collections::HashSet::new();
    pivots.retain(|node| seen.insert(*node));

    if pivots.is_empty() {
        return Err(SearchError::InvalidPivotSet {
            reason: "no pivots selected".to_string(),
        });
    }
    if let Some(node) = pivots.iter().find(|node| node.index() >= graph.node_count()) {
        return Err(SearchError::InvalidPivotSet {
            reason: format!("pivot {node} is not part of the graph"),
        });
    }
    if let Some(node) = pivots.iter().find(|&&node| !graph.is_walkable(node)) {
        return Err(SearchError::InvalidPivotSet {
            reason: format!("pivot {node} is not walkable"),
        });
    }
    Ok(pivots)
}

fn spread_out<G: GraphOracle + ?Sized>(
    graph: &G,
    count: usize,
    seed: Option<u64>,
) -> std::result::Result<(Vec<NodeId>, Vec<Vec<f64>>), SearchError> {
    let walkable = walkable_nodes(graph);
    if count == 0 || walkable.is_empty() {
        return Err(SearchError::InvalidPivotSet {
            reason: "no pivots selected".to_string(),
        });
    }

    let mut rng = seeded(seed);
    let first = walkable[rng.gen_range(0..walkable.len())];
    let mut pivots = vec![first];
    let mut rows = vec![flood_costs(graph, first)];
    let mut nearest_pivot: Vec<f64> = rows[0].clone();

    while pivots.len() < count {
        let next = walkable
            .iter()
            .copied()
            .filter(|node| nearest_pivot[node.index()].is_finite())
            .max_by(|a, b| {
                nearest_pivot[a.index()]
                    .total_cmp(&nearest_pivot[b.index()])
                    .then_with(|| b.cmp(a))
            });
        let Some(next) = next.filter(|node| nearest_pivot[node.index()] > 0.0) else {
            break;
        };

        let row = flood_costs(graph, next);
        for (best, cost) in nearest_pivot.iter_mut().zip(&row) {
            *best = best.min(*cost);
        }
        pivots.push(next);
        rows.push(row);
    }

    debug!(requested = count, selected = pivots.len(), "spread-out pivots chosen");
    Ok((pivots, rows))
}

/// A flood row where nothing besides the pivot itself has a finite cost.
fn unreached_pivot(row: &[f64]) -> bool {
    row.iter().filter(|cost| cost.is_finite()).count() <= 1
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier(f64);

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Exact cost from `pivot` to every walkable node it can reach.
pub(crate) fn flood_costs<G: GraphOracle + ?Sized>(graph: &G, pivot: NodeId) -> Vec<f64> {
    let mut costs = vec![f64::INFINITY; graph.node_count()];
    let mut heap = BinaryHeap::new();
    let mut edges: Vec<Edge> = Vec::new();

    costs[pivot.index()] = 0.0;
    heap.push(Reverse((Frontier(0.0), pivot)));

    while let Some(Reverse((Frontier(cost), node))) = heap.pop() {
        if cost > costs[node.index()] {
            continue;
        }
        edges.clear();
        graph.neighbours(node, &mut edges);
        for edge in &edges {
            if !graph.is_walkable(edge.target) {
                continue;
            }
            let next = cost + edge.cost;
            if next < costs[edge.target.index()] {
                costs[edge.target.index()] = next;
                heap.push(Reverse((Frontier(next), edge.target)));
            }
        }
    }

    costs
}
