//! `random` subcommand: pick a node at roughly a given cost from the start.

use anyhow::Result;
use clap::Args;
use wayfinder_lib::{RandomSearch, SearchRequest};

use super::{GlobalOptions, Session};
use crate::map::Cell;
use crate::output::SearchReport;

#[derive(Args, Debug, Clone)]
pub struct RandomArgs {
    /// Start cell as `x,y`.
    #[arg(long)]
    pub from: Cell,
    /// Minimum path cost of the chosen node.
    #[arg(long)]
    pub length: f64,
    /// Width of the accepted cost band above `--length`.
    #[arg(long, default_value_t = 0.0)]
    pub spread: f64,
    /// Bias the walk towards this cell.
    #[arg(long)]
    pub aim: Option<Cell>,
    #[arg(long, default_value_t = 1.0)]
    pub aim_strength: f64,
    /// Seed for a reproducible choice.
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn handle_random(options: &GlobalOptions, args: &RandomArgs) -> Result<()> {
    let session = Session::open(options)?;
    let grid = &session.grid;

    let mut search = RandomSearch::new(args.from.point(grid), args.length).spread(args.spread);
    if let Some(aim) = args.aim {
        search = search.aim(aim.point(grid), args.aim_strength);
    }
    let mut request = SearchRequest::new(search);
    if let Some(seed) = args.seed {
        request = request.seed(seed);
    }

    let result = session.run(request)?;
    session.emit(&SearchReport::from_result("random", grid, &result))
}
