use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias for the Wayfinder library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
///
/// Search failures are not reported through this type while a search runs;
/// they end up in the request's [`crate::SearchResult`]. This enum covers API
/// misuse, persistence and map parsing.
#[derive(Debug, Error)]
pub enum Error {
    /// A search failure surfaced through a synchronous helper.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Raised when a request handle no longer refers to a live request.
    #[error("stale search handle {index}:{generation}")]
    StaleHandle { index: u32, generation: u32 },

    /// Raised when the processor was asked to wait for a request it can never
    /// finish (for example after shutdown).
    #[error("search handle {index}:{generation} is not scheduled")]
    NotScheduled { index: u32, generation: u32 },

    /// Raised when an ASCII grid map could not be parsed.
    #[error("invalid grid map at line {line}: {message}")]
    GridParse { line: usize, message: String },

    /// Raised when grid dimensions or options are unusable.
    #[error("invalid grid: {message}")]
    InvalidGrid { message: String },

    /// Raised when serializing a landmark table fails.
    #[error("failed to serialize landmark table: {message}")]
    EmbeddingSerialize { message: String },

    /// Raised when loading a landmark table from a file fails.
    #[error("failed to load landmark table from {path}: {message}")]
    EmbeddingLoad { path: PathBuf, message: String },

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Local failure of a single search request.
///
/// Stored in the request result together with
/// [`crate::CompletionState::Error`]; never raised on the caller's thread.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// No traversable node close to the start point.
    #[error("no traversable node found near the start point")]
    NoStartNode,

    /// No traversable node close to the end point (or to any target).
    #[error("no traversable node found near the end point")]
    NoEndNode,

    /// The frontier was exhausted without reaching the target.
    #[error("start is unreachable from the end (disjoint graph regions)")]
    StartUnreachableFromEnd,

    /// The request type cannot honour a custom ending condition.
    #[error("{strategy} searches do not support a custom ending condition")]
    CustomEndingConditionUnsupported { strategy: &'static str },

    /// Replay against a flood whose graph has changed since it was recorded.
    #[error("cached flood is stale (recorded at graph version {recorded}, graph is at {current})")]
    StaleCachedFlood { recorded: u64, current: u64 },

    /// The flood does not contain the requested node.
    #[error("node is not reachable within the cached flood")]
    NotReachableFromFlood,

    /// The bounded random search found no candidate at all.
    #[error("no node found to use as a random target")]
    NoRandomTarget,

    /// Landmark pivots that are missing or unwalkable.
    #[error("invalid pivot set: {reason}")]
    InvalidPivotSet { reason: String },

    /// The request was cancelled before it completed.
    #[error("search was cancelled")]
    Cancelled,
}
