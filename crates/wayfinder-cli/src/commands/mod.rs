//! CLI subcommand handlers.
//!
//! Every search command loads the map, runs one or more requests through a
//! caller-driven [`PathProcessor`] and prints a [`SearchReport`].

pub mod embed;
pub mod flood;
pub mod multi;
pub mod path;
pub mod random;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use tracing::{debug, warn};
use wayfinder_lib::{
    EmbeddingTable, GridGraph, Heuristic, LandmarkEmbedding, PathProcessor, PivotSelection,
    ProcessorConfig, SearchRequest, SearchResult, TickBudget,
};

use crate::map::load_map;
use crate::output::{OutputFormat, SearchReport};

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub map: PathBuf,
    pub four_connected: bool,
    pub format: OutputFormat,
    pub embedding: Option<PathBuf>,
    /// Frontier pops per processing slice.
    pub slice: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HeuristicArg {
    /// Plain Dijkstra.
    None,
    Euclidean,
    Manhattan,
    #[default]
    Octile,
    Chebyshev,
}

impl From<HeuristicArg> for Heuristic {
    fn from(arg: HeuristicArg) -> Self {
        match arg {
            HeuristicArg::None => Heuristic::None,
            HeuristicArg::Euclidean => Heuristic::Euclidean,
            HeuristicArg::Manhattan => Heuristic::Manhattan,
            HeuristicArg::Octile => Heuristic::Octile,
            HeuristicArg::Chebyshev => Heuristic::Chebyshev,
        }
    }
}

/// Loaded map plus the processor searching it.
pub struct Session {
    pub grid: GridGraph,
    pub processor: PathProcessor<GridGraph>,
    pub format: OutputFormat,
}

impl Session {
    pub fn open(options: &GlobalOptions) -> Result<Self> {
        let grid = load_map(&options.map, options.four_connected)?;
        let config = ProcessorConfig::manual(TickBudget::Nodes(options.slice.max(1)));

        let landmarks = match &options.embedding {
            Some(path) => load_landmarks(path, &grid)?,
            None => None,
        };
        let processor = match landmarks {
            Some(embedding) => PathProcessor::with_landmarks(grid.clone(), embedding, config),
            None => PathProcessor::new(grid.clone(), config),
        }
        .context("failed to start the path processor")?;

        Ok(Self {
            grid,
            processor,
            format: options.format,
        })
    }

    /// Run one request to completion and deliver its callbacks.
    pub fn run(&self, request: SearchRequest) -> Result<SearchResult> {
        let handle = self.processor.submit(request);
        self.processor
            .block_until_complete(handle)
            .context("search did not finish")?;
        let result = self
            .processor
            .result(handle)?
            .ok_or_else(|| anyhow!("search {handle} finished without a result"))?;
        self.processor.process_returns();
        self.processor.release(handle)?;
        debug!(
            %handle,
            state = ?result.state,
            searched = result.searched_nodes,
            "search finished"
        );
        Ok(result)
    }

    /// Print a report and fail the command when the search failed.
    pub fn emit(&self, report: &SearchReport) -> Result<()> {
        print!("{}", report.render(self.format)?);
        match &report.error {
            Some(error) if report.is_error() => Err(anyhow!("{} search failed: {error}", report.command)),
            _ => Ok(()),
        }
    }
}

fn load_landmarks(path: &Path, grid: &GridGraph) -> Result<Option<LandmarkEmbedding>> {
    let table = EmbeddingTable::load(path)
        .with_context(|| format!("failed to load landmarks from {}", path.display()))?;
    if table.is_stale(grid) {
        warn!(
            path = %path.display(),
            "landmark table does not match the map; searching without landmarks"
        );
        return Ok(None);
    }
    let selection = PivotSelection::Fixed(table.pivots().to_vec());
    Ok(Some(LandmarkEmbedding::from_table(selection, table)))
}
