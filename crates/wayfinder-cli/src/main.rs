use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use wayfinder_cli::commands::embed::{handle_embed, EmbedArgs};
use wayfinder_cli::commands::flood::{handle_flood, FloodArgs};
use wayfinder_cli::commands::multi::{handle_multi, MultiArgs};
use wayfinder_cli::commands::path::{handle_path, PathArgs};
use wayfinder_cli::commands::random::{handle_random, RandomArgs};
use wayfinder_cli::commands::GlobalOptions;
use wayfinder_cli::logging::{init_logging, LoggingConfig};
use wayfinder_cli::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about = "Incremental grid search utilities")]
struct Cli {
    /// ASCII map file (`.` open, `#` blocked, `1`-`9` penalty, `a`-`z` tag).
    #[arg(long, global = true, default_value = "map.txt")]
    map: PathBuf,

    /// Use 4-connected movement instead of 8-connected.
    #[arg(long, global = true)]
    four: bool,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Landmark table written by `embed`, used to guide searches.
    #[arg(long, global = true)]
    embedding: Option<PathBuf>,

    /// Frontier pops per processing slice.
    #[arg(long, global = true, default_value_t = 256)]
    slice: usize,

    /// Log at debug level unless `RUST_LOG` is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shortest path between two cells.
    Path(PathArgs),
    /// Paths from one cell to several targets.
    Multi(MultiArgs),
    /// A random cell at roughly the given path cost.
    Random(RandomArgs),
    /// Every cell reachable within a cost budget.
    Flood(FloodArgs),
    /// Build a landmark table for the map.
    Embed(EmbedArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LoggingConfig::from_env().verbose(cli.verbose));

    let options = GlobalOptions {
        map: cli.map,
        four_connected: cli.four,
        format: cli.format,
        embedding: cli.embedding,
        slice: cli.slice,
    };

    match &cli.command {
        Command::Path(args) => handle_path(&options, args),
        Command::Multi(args) => handle_multi(&options, args),
        Command::Random(args) => handle_random(&options, args),
        Command::Flood(args) => handle_flood(&options, args),
        Command::Embed(args) => handle_embed(&options, args),
    }
}
