//! `path` subcommand: point-to-point search between two cells.

use anyhow::Result;
use clap::Args;
use wayfinder_lib::SearchRequest;

use super::{GlobalOptions, HeuristicArg, Session};
use crate::map::Cell;
use crate::output::SearchReport;

#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Start cell as `x,y`.
    #[arg(long)]
    pub from: Cell,
    /// End cell as `x,y`.
    #[arg(long)]
    pub to: Cell,
    /// Return the path to the closest node when the end is unreachable.
    #[arg(long)]
    pub partial: bool,
    #[arg(long, value_enum, default_value_t = HeuristicArg::Octile)]
    pub heuristic: HeuristicArg,
}

pub fn handle_path(options: &GlobalOptions, args: &PathArgs) -> Result<()> {
    let session = Session::open(options)?;
    let request = SearchRequest::path(args.from.point(&session.grid), args.to.point(&session.grid))
        .heuristic(args.heuristic.into())
        .calculate_partial(args.partial);
    let result = session.run(request)?;
    session.emit(&SearchReport::from_result("path", &session.grid, &result))
}
