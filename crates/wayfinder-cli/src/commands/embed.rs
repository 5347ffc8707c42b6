//! `embed` subcommand: build and save a landmark table for a map.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use sha2::{Digest, Sha256};
use wayfinder_lib::{EmbeddingTable, PivotSelection, SpatialIndex};

use super::GlobalOptions;
use crate::map::{load_map, Cell};
use crate::output::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PivotMode {
    /// Uniformly random walkable pivots.
    Random,
    /// Each pivot as far as possible from the previous ones.
    #[default]
    Spread,
}

#[derive(Args, Debug, Clone)]
pub struct EmbedArgs {
    /// Number of landmark pivots.
    #[arg(long, default_value_t = 8)]
    pub pivots: usize,
    #[arg(long, value_enum, default_value_t = PivotMode::Spread)]
    pub mode: PivotMode,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Output file for the table.
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, Serialize)]
struct EmbedSummary {
    path: String,
    pivots: Vec<[usize; 2]>,
    nodes: usize,
    bytes: u64,
    checksum: String,
}

pub fn handle_embed(options: &GlobalOptions, args: &EmbedArgs) -> Result<()> {
    let grid = load_map(&options.map, options.four_connected)?;
    let index = SpatialIndex::build(&grid);
    let selection = match args.mode {
        PivotMode::Random => PivotSelection::Random {
            count: args.pivots,
            seed: args.seed,
        },
        PivotMode::Spread => PivotSelection::RandomSpreadOut {
            count: args.pivots,
            seed: args.seed,
        },
    };

    let table = EmbeddingTable::build(&grid, &index, &selection)
        .context("failed to build the landmark table")?;
    table
        .save(&args.out)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    let bytes = fs::read(&args.out)
        .with_context(|| format!("failed to read back {}", args.out.display()))?;
    let digest = Sha256::digest(&bytes);
    let summary = EmbedSummary {
        path: args.out.display().to_string(),
        pivots: table
            .pivots()
            .iter()
            .map(|&node| {
                let cell = Cell::of(&grid, node);
                [cell.x, cell.y]
            })
            .collect(),
        nodes: table.node_count(),
        bytes: bytes.len() as u64,
        checksum: hex::encode(&digest[..8]),
    };

    match options.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!("Landmark table written to {}", summary.path);
            println!("  pivots:   {}", summary.pivots.len());
            for [x, y] in &summary.pivots {
                println!("    - {x},{y}");
            }
            println!("  nodes:    {}", summary.nodes);
            println!("  size:     {} bytes", summary.bytes);
            println!("  checksum: {}", summary.checksum);
        }
    }
    Ok(())
}
