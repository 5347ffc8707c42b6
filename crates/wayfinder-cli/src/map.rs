//! ASCII map loading and path overlays.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use wayfinder_lib::{GraphOracle, GridGraph, GridOptions, NodeId, Point};

/// Grid cell given on the command line as `x,y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    /// World-space position of the cell centre.
    pub fn point(self, grid: &GridGraph) -> Point {
        grid.cell_position(self.x, self.y)
    }

    pub fn of(grid: &GridGraph, node: NodeId) -> Self {
        let (x, y) = grid.coords(node);
        Self { x, y }
    }
}

impl FromStr for Cell {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let (x, y) = value
            .split_once(',')
            .ok_or_else(|| format!("expected `x,y`, got {value:?}"))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|err| format!("invalid coordinate {part:?}: {err}"))
        };
        Ok(Self {
            x: parse(x)?,
            y: parse(y)?,
        })
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Read and parse an ASCII map file.
pub fn load_map(path: &Path, four_connected: bool) -> Result<GridGraph> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read map {}", path.display()))?;
    let options = if four_connected {
        GridOptions::four_connected()
    } else {
        GridOptions::default()
    };
    let grid = GridGraph::from_ascii(&text, options)
        .with_context(|| format!("failed to parse map {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        width = grid.width(),
        height = grid.height(),
        "map loaded"
    );
    Ok(grid)
}

/// Draw the map with `nodes` marked: `S` first, `E` last, `*` in between.
pub fn render_overlay(grid: &GridGraph, nodes: &[NodeId]) -> String {
    let mut rows: Vec<Vec<char>> = (0..grid.height())
        .map(|y| {
            (0..grid.width())
                .map(|x| match grid.node_at(x, y) {
                    Some(node) if grid.is_walkable(node) => '.',
                    _ => '#',
                })
                .collect()
        })
        .collect();

    let last = nodes.len().saturating_sub(1);
    for (step, &node) in nodes.iter().enumerate() {
        let (x, y) = grid.coords(node);
        rows[y][x] = match step {
            0 => 'S',
            _ if step == last => 'E',
            _ => '*',
        };
    }

    let mut out = String::with_capacity(grid.height() * (grid.width() + 1));
    for row in rows {
        out.extend(row);
        out.push('\n');
    }
    out
}
