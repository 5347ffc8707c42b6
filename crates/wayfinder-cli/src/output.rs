//! Output formatting for search results.

use std::fmt::Write as _;

use clap::ValueEnum;
use serde::Serialize;
use wayfinder_lib::{CompletionState, GridGraph, SearchResult, TargetPath};

use crate::map::{render_overlay, Cell};
use crate::terminal::{format_with_separators, ColorPalette};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary with a map overlay.
    #[default]
    Text,
    /// One JSON document on stdout.
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub index: usize,
    pub cost: f64,
    pub cells: Vec<[usize; 2]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FloodReport {
    pub origin: [usize; 2],
    pub reached: usize,
    pub max_cost: Option<f64>,
}

/// Serializable view of a [`SearchResult`] in grid coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub command: &'static str,
    pub state: CompletionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cost: f64,
    pub length: f64,
    pub searched_nodes: usize,
    pub cells: Vec<[usize; 2]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Option<TargetReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flood: Option<FloodReport>,
    #[serde(skip)]
    overlay: Option<String>,
}

fn cells_of(grid: &GridGraph, nodes: &[wayfinder_lib::NodeId]) -> Vec<[usize; 2]> {
    nodes
        .iter()
        .map(|&node| {
            let cell = Cell::of(grid, node);
            [cell.x, cell.y]
        })
        .collect()
}

impl SearchReport {
    pub fn from_result(command: &'static str, grid: &GridGraph, result: &SearchResult) -> Self {
        let targets = result
            .targets
            .iter()
            .enumerate()
            .map(|(index, path)| {
                path.as_ref().map(|path: &TargetPath| TargetReport {
                    index,
                    cost: path.cost,
                    cells: cells_of(grid, &path.nodes),
                })
            })
            .collect();
        let flood = result.flood.as_ref().map(|record| {
            let origin = Cell::of(grid, record.origin());
            FloodReport {
                origin: [origin.x, origin.y],
                reached: record.len(),
                max_cost: record.max_cost(),
            }
        });
        let overlay = (!result.nodes.is_empty()).then(|| render_overlay(grid, &result.nodes));

        Self {
            command,
            state: result.state,
            error: result.error.as_ref().map(ToString::to_string),
            cost: result.cost,
            length: result.length(),
            searched_nodes: result.searched_nodes,
            cells: cells_of(grid, &result.nodes),
            targets,
            flood,
            overlay,
        }
    }

    pub fn is_error(&self) -> bool {
        self.state == CompletionState::Error
    }

    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)? + "\n"),
            OutputFormat::Text => Ok(self.render_text(&ColorPalette::detect())),
        }
    }

    pub fn render_text(&self, palette: &ColorPalette) -> String {
        let (state_color, state_label) = palette.state(self.state);

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}{}{} search: {}{}{}",
            palette.heading, self.command, palette.reset, state_color, state_label, palette.reset
        );
        if let Some(error) = &self.error {
            let _ = writeln!(out, "  {}{}{}", palette.bad, error, palette.reset);
        }
        if !self.cells.is_empty() {
            let _ = writeln!(out, "  cost:     {:.3}", self.cost);
            let _ = writeln!(out, "  length:   {:.3}", self.length);
            let _ = writeln!(out, "  steps:    {}", self.cells.len().saturating_sub(1));
        }
        let _ = writeln!(
            out,
            "  searched: {}",
            format_with_separators(self.searched_nodes as u64)
        );

        for (index, target) in self.targets.iter().enumerate() {
            match target {
                Some(target) => {
                    let _ = writeln!(out, "  target {index}: cost {:.3}", target.cost);
                }
                None => {
                    let _ = writeln!(
                        out,
                        "  target {index}: {}unreached{}",
                        palette.muted, palette.reset
                    );
                }
            }
        }

        if let Some(flood) = &self.flood {
            let _ = writeln!(
                out,
                "  flood:    {} nodes from {},{}",
                format_with_separators(flood.reached as u64),
                flood.origin[0],
                flood.origin[1]
            );
        }

        if let Some(overlay) = &self.overlay {
            out.push('\n');
            for line in overlay.lines() {
                let _ = writeln!(out, "{}", colorize_overlay(line, palette));
            }
        }
        out
    }
}

fn colorize_overlay(line: &str, palette: &ColorPalette) -> String {
    let mut out = String::with_capacity(line.len());
    for ch in line.chars() {
        match ch {
            'S' | 'E' | '*' => {
                out.push_str(palette.good);
                out.push(ch);
                out.push_str(palette.reset);
            }
            '#' => {
                out.push_str(palette.muted);
                out.push(ch);
                out.push_str(palette.reset);
            }
            _ => out.push(ch),
        }
    }
    out
}
