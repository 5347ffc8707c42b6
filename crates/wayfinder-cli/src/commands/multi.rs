//! `multi` subcommand: one origin, several targets.

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;
use wayfinder_lib::{MultiTargetMode, MultiTargetSearch, SearchRequest, TargetHeuristic};

use super::{GlobalOptions, HeuristicArg, Session};
use crate::map::Cell;
use crate::output::SearchReport;

#[derive(Args, Debug, Clone)]
pub struct MultiArgs {
    /// Origin cell as `x,y`.
    #[arg(long)]
    pub from: Cell,
    /// Target cell as `x,y`; repeat for more targets.
    #[arg(long = "to", num_args = 1..)]
    pub to: Vec<Cell>,
    /// Stop at the first target reached.
    #[arg(long)]
    pub first: bool,
    /// Report paths from each target back to the origin.
    #[arg(long)]
    pub reversed: bool,
    /// Aim at the bounding box of all remaining targets.
    #[arg(long)]
    pub envelope: bool,
    #[arg(long, value_enum, default_value_t = HeuristicArg::Octile)]
    pub heuristic: HeuristicArg,
}

pub fn handle_multi(options: &GlobalOptions, args: &MultiArgs) -> Result<()> {
    if args.to.is_empty() {
        bail!("multi needs at least one --to target");
    }
    let session = Session::open(options)?;
    let grid = &session.grid;

    let mode = if args.first {
        MultiTargetMode::FirstTarget
    } else {
        MultiTargetMode::AllTargets
    };
    let target_heuristic = if args.envelope {
        TargetHeuristic::Envelope
    } else {
        TargetHeuristic::Sequential
    };
    let search = MultiTargetSearch::new(
        args.from.point(grid),
        args.to.iter().map(|cell| cell.point(grid)),
    )
    .mode(mode)
    .target_heuristic(target_heuristic)
    .reversed(args.reversed);

    let request = SearchRequest::new(search)
        .heuristic(args.heuristic.into())
        .on_target(|index, path| info!(target = index, cost = path.cost, "target reached"));
    let result = session.run(request)?;
    session.emit(&SearchReport::from_result("multi", grid, &result))
}
