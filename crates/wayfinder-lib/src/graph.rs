//! Graph oracle contract and the two in-crate graphs the engine ships with.
//!
//! The search engine never owns nodes: it only asks a [`GraphOracle`] for
//! neighbours, walkability, positions and tags. [`GridGraph`] covers the
//! common rasterised case (and the grid-adjacency special case of the
//! point-to-point search); [`AdjacencyGraph`] is an explicit weighted graph
//! for synthetic topologies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense node identifier, `0..graph.node_count()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// World-space point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Point on the `z = 0` plane.
    pub const fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let (dx, dy, dz) = self.deltas(other);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn manhattan_to(&self, other: &Point) -> f64 {
        let (dx, dy, dz) = self.deltas(other);
        dx + dy + dz
    }

    pub fn chebyshev_to(&self, other: &Point) -> f64 {
        let (dx, dy, dz) = self.deltas(other);
        dx.max(dy).max(dz)
    }

    /// Octile distance on the dominant plane plus the remaining axis.
    pub fn octile_to(&self, other: &Point) -> f64 {
        let (dx, dy, dz) = self.deltas(other);
        let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
        hi + (std::f64::consts::SQRT_2 - 1.0) * lo + dz
    }

    fn deltas(&self, other: &Point) -> (f64, f64, f64) {
        (
            (self.x - other.x).abs(),
            (self.y - other.y).abs(),
            (self.z - other.z).abs(),
        )
    }

    pub(crate) fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Outgoing connection reported by the graph oracle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub target: NodeId,
    pub cost: f64,
}

/// Read-only view of a graph consumed by every search strategy.
///
/// Edge costs must be non-negative. The landmark heuristic additionally
/// assumes symmetric costs (`cost(a, b) == cost(b, a)`), and the metric
/// heuristics assume costs are at least the scaled distance between node
/// positions.
pub trait GraphOracle: Send + Sync {
    /// Number of nodes; node ids are dense in `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Append the outgoing connections of `node` to `out`.
    fn neighbours(&self, node: NodeId, out: &mut Vec<Edge>);

    fn is_walkable(&self, node: NodeId) -> bool;

    fn position(&self, node: NodeId) -> Point;

    /// Tag (area) index used by traversal filters, `0..32`.
    fn tag(&self, _node: NodeId) -> u32 {
        0
    }

    /// Monotonic counter bumped on every mutation.
    fn version(&self) -> u64 {
        0
    }

    /// Cells geometrically adjacent to `node`, walkable or not.
    ///
    /// Only grid-like graphs report anything here; it drives the
    /// unwalkable-destination special case of point-to-point searches and the
    /// landmark table patch.
    fn surrounding_cells(&self, _node: NodeId) -> Vec<NodeId> {
        Vec::new()
    }
}

/// Neighbour layout of a [`GridGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

/// Options used when constructing a [`GridGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridOptions {
    /// World-space size of one cell; also the cost of an orthogonal step.
    pub cell_size: f64,
    pub connectivity: Connectivity,
    /// Multiplier applied to `cell_size` for diagonal steps.
    pub diagonal_cost: f64,
    /// Allow diagonal moves past a blocked orthogonal neighbour.
    pub cut_corners: bool,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            connectivity: Connectivity::Eight,
            diagonal_cost: std::f64::consts::SQRT_2,
            cut_corners: false,
        }
    }
}

impl GridOptions {
    pub fn four_connected() -> Self {
        Self {
            connectivity: Connectivity::Four,
            ..Self::default()
        }
    }
}

const ORTHOGONAL: [(i64, i64); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const DIAGONAL: [(i64, i64); 4] = [(1, -1), (1, 1), (-1, 1), (-1, -1)];

#[derive(Debug, Clone, Copy)]
struct Cell {
    walkable: bool,
    penalty: f64,
    tag: u32,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            walkable: true,
            penalty: 0.0,
            tag: 0,
        }
    }
}

/// Rectangular grid of cells laid out on the `z = 0` plane.
///
/// Cell `(x, y)` is node `y * width + x` and sits at
/// `(x * cell_size, y * cell_size, 0)`. Penalties are split evenly between
/// the two ends of a step so costs stay symmetric.
#[derive(Debug, Clone)]
pub struct GridGraph {
    width: usize,
    height: usize,
    options: GridOptions,
    cells: Vec<Cell>,
    version: u64,
}

impl GridGraph {
    /// Build a fully walkable grid.
    pub fn new(width: usize, height: usize, options: GridOptions) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidGrid {
                message: format!("dimensions must be positive, got {width}x{height}"),
            });
        }
        if width.saturating_mul(height) > u32::MAX as usize / 2 {
            return Err(Error::InvalidGrid {
                message: format!("{width}x{height} exceeds the node id range"),
            });
        }
        if options.cell_size <= 0.0 || options.diagonal_cost < 0.0 {
            return Err(Error::InvalidGrid {
                message: "cell size must be positive and diagonal cost non-negative".to_string(),
            });
        }

        Ok(Self {
            width,
            height,
            options,
            cells: vec![Cell::default(); width * height],
            version: 0,
        })
    }

    /// Parse an ASCII map.
    ///
    /// `.` is walkable, `#` is blocked, `1`-`9` are walkable with that
    /// penalty, and `a`-`z` are walkable cells tagged `1..=26`. Row 0 is the
    /// first line.
    pub fn from_ascii(text: &str, options: GridOptions) -> Result<Self> {
        let rows: Vec<&str> = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .collect();

        let Some(first) = rows.first() else {
            return Err(Error::GridParse {
                line: 1,
                message: "map is empty".to_string(),
            });
        };
        let width = first.chars().count();
        let mut grid = Self::new(width, rows.len(), options)?;

        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(Error::GridParse {
                    line: y + 1,
                    message: format!("expected {} columns, found {}", width, row.chars().count()),
                });
            }
            for (x, ch) in row.chars().enumerate() {
                let cell = &mut grid.cells[y * width + x];
                match ch {
                    '.' => {}
                    '#' => cell.walkable = false,
                    '1'..='9' => cell.penalty = f64::from(ch as u32 - '0' as u32),
                    'a'..='z' => cell.tag = ch as u32 - 'a' as u32 + 1,
                    other => {
                        return Err(Error::GridParse {
                            line: y + 1,
                            message: format!("unexpected character {other:?} at column {}", x + 1),
                        })
                    }
                }
            }
        }

        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    /// Node for cell `(x, y)`, if it is inside the grid.
    pub fn node_at(&self, x: usize, y: usize) -> Option<NodeId> {
        (x < self.width && y < self.height).then(|| NodeId((y * self.width + x) as u32))
    }

    /// Cell coordinates of `node`.
    pub fn coords(&self, node: NodeId) -> (usize, usize) {
        let index = node.index();
        (index % self.width, index / self.width)
    }

    /// World-space centre of cell `(x, y)`.
    pub fn cell_position(&self, x: usize, y: usize) -> Point {
        Point::planar(
            x as f64 * self.options.cell_size,
            y as f64 * self.options.cell_size,
        )
    }

    pub fn set_walkable(&mut self, node: NodeId, walkable: bool) {
        self.cells[node.index()].walkable = walkable;
        self.version += 1;
    }

    pub fn set_penalty(&mut self, node: NodeId, penalty: f64) {
        self.cells[node.index()].penalty = penalty.max(0.0);
        self.version += 1;
    }

    pub fn set_tag(&mut self, node: NodeId, tag: u32) {
        self.cells[node.index()].tag = tag.min(31);
        self.version += 1;
    }

    fn offset(&self, node: NodeId, dx: i64, dy: i64) -> Option<NodeId> {
        let (x, y) = self.coords(node);
        let nx = x as i64 + dx;
        let ny = y as i64 + dy;
        if nx < 0 || ny < 0 {
            return None;
        }
        self.node_at(nx as usize, ny as usize)
    }

    fn walkable_offset(&self, node: NodeId, dx: i64, dy: i64) -> Option<NodeId> {
        self.offset(node, dx, dy)
            .filter(|&target| self.cells[target.index()].walkable)
    }

    fn step_cost(&self, from: NodeId, to: NodeId, base: f64) -> f64 {
        base + (self.cells[from.index()].penalty + self.cells[to.index()].penalty) / 2.0
    }
}

impl GraphOracle for GridGraph {
    fn node_count(&self) -> usize {
        self.cells.len()
    }

    fn neighbours(&self, node: NodeId, out: &mut Vec<Edge>) {
        if !self.cells[node.index()].walkable {
            return;
        }

        let straight = self.options.cell_size;
        for (dx, dy) in ORTHOGONAL {
            if let Some(target) = self.walkable_offset(node, dx, dy) {
                out.push(Edge {
                    target,
                    cost: self.step_cost(node, target, straight),
                });
            }
        }

        if self.options.connectivity == Connectivity::Four {
            return;
        }

        let diagonal = self.options.cell_size * self.options.diagonal_cost;
        for (dx, dy) in DIAGONAL {
            let Some(target) = self.walkable_offset(node, dx, dy) else {
                continue;
            };
            if !self.options.cut_corners
                && (self.walkable_offset(node, dx, 0).is_none()
                    || self.walkable_offset(node, 0, dy).is_none())
            {
                continue;
            }
            out.push(Edge {
                target,
                cost: self.step_cost(node, target, diagonal),
            });
        }
    }

    fn is_walkable(&self, node: NodeId) -> bool {
        self.cells[node.index()].walkable
    }

    fn position(&self, node: NodeId) -> Point {
        let (x, y) = self.coords(node);
        self.cell_position(x, y)
    }

    fn tag(&self, node: NodeId) -> u32 {
        self.cells[node.index()].tag
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn surrounding_cells(&self, node: NodeId) -> Vec<NodeId> {
        let diagonals: &[(i64, i64)] = match self.options.connectivity {
            Connectivity::Four => &[],
            Connectivity::Eight => &DIAGONAL,
        };
        ORTHOGONAL
            .iter()
            .chain(diagonals)
            .filter_map(|&(dx, dy)| self.offset(node, dx, dy))
            .collect()
    }
}

#[derive(Debug, Clone)]
struct AdjacencyNode {
    position: Point,
    walkable: bool,
    tag: u32,
}

/// Explicit weighted graph built edge by edge.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyGraph {
    nodes: Vec<AdjacencyNode>,
    adjacency: Vec<Vec<Edge>>,
    version: u64,
}

impl AdjacencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, position: Point) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(AdjacencyNode {
            position,
            walkable: true,
            tag: 0,
        });
        self.adjacency.push(Vec::new());
        self.version += 1;
        id
    }

    /// Add a directed edge, replacing an existing `from -> to` edge when the
    /// new one is cheaper.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, cost: f64) {
        let edges = &mut self.adjacency[from.index()];
        if let Some(existing) = edges.iter_mut().find(|edge| edge.target == to) {
            if cost < existing.cost {
                existing.cost = cost;
            }
        } else {
            edges.push(Edge { target: to, cost });
        }
        self.version += 1;
    }

    pub fn add_undirected_edge(&mut self, a: NodeId, b: NodeId, cost: f64) {
        self.add_edge(a, b, cost);
        self.add_edge(b, a, cost);
    }

    pub fn set_walkable(&mut self, node: NodeId, walkable: bool) {
        self.nodes[node.index()].walkable = walkable;
        self.version += 1;
    }

    pub fn set_tag(&mut self, node: NodeId, tag: u32) {
        self.nodes[node.index()].tag = tag.min(31);
        self.version += 1;
    }
}

impl GraphOracle for AdjacencyGraph {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn neighbours(&self, node: NodeId, out: &mut Vec<Edge>) {
        out.extend_from_slice(&self.adjacency[node.index()]);
    }

    fn is_walkable(&self, node: NodeId) -> bool {
        self.nodes[node.index()].walkable
    }

    fn position(&self, node: NodeId) -> Point {
        self.nodes[node.index()].position
    }

    fn tag(&self, node: NodeId) -> u32 {
        self.nodes[node.index()].tag
    }

    fn version(&self) -> u64 {
        self.version
    }
}
