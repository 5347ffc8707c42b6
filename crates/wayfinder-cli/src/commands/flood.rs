//! `flood` subcommand: cost-bounded flood, optionally replayed to a cell.

use anyhow::{anyhow, Result};
use clap::Args;
use wayfinder_lib::{FloodSearch, FloodTraceSearch, SearchRequest};

use super::{GlobalOptions, Session};
use crate::map::Cell;
use crate::output::SearchReport;

#[derive(Args, Debug, Clone)]
pub struct FloodArgs {
    /// Origin cell as `x,y`.
    #[arg(long)]
    pub from: Cell,
    /// Maximum accumulated cost; unbounded when absent.
    #[arg(long)]
    pub budget: Option<f64>,
    /// Replay the recorded parent tree from this cell back to the origin.
    #[arg(long)]
    pub trace: Option<Cell>,
}

pub fn handle_flood(options: &GlobalOptions, args: &FloodArgs) -> Result<()> {
    let session = Session::open(options)?;
    let grid = &session.grid;

    let mut search = FloodSearch::new(args.from.point(grid));
    if let Some(budget) = args.budget {
        search = search.max_cost(budget);
    }
    let flooded = session.run(SearchRequest::new(search))?;
    let Some(trace) = args.trace else {
        return session.emit(&SearchReport::from_result("flood", grid, &flooded));
    };
    if flooded.is_error() {
        return session.emit(&SearchReport::from_result("flood", grid, &flooded));
    }

    let record = flooded
        .flood
        .clone()
        .ok_or_else(|| anyhow!("flood finished without a record"))?;
    let mut traced = session.run(SearchRequest::new(FloodTraceSearch::new(
        record,
        trace.point(grid),
    )))?;
    traced.flood = flooded.flood;
    traced.searched_nodes = flooded.searched_nodes;
    session.emit(&SearchReport::from_result("flood-trace", grid, &traced))
}
