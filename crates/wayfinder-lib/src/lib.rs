//! Wayfinder library entry points.
//!
//! Incremental graph search over any graph that implements [`GraphOracle`]:
//! point-to-point A*, multi-target searches, bounded random walks, radius
//! floods with replayable parent trees, and an optional landmark heuristic.
//! Searches run on a shared kernel that can be advanced in budgeted slices,
//! either synchronously through [`Searcher`] or concurrently through
//! [`PathProcessor`]. Consumers (the CLI, embedding applications) should only
//! depend on the items exported here.
//!
//! ```
//! use wayfinder_lib::{
//!     CompletionState, GridGraph, GridOptions, Point, SearchEnv, SearchRequest, Searcher,
//!     SpatialIndex,
//! };
//!
//! let grid = GridGraph::from_ascii("....\n.##.\n....", GridOptions::default()).unwrap();
//! let index = SpatialIndex::build(&grid);
//! let result = Searcher::new().run(
//!     &SearchEnv::new(&grid, &index),
//!     SearchRequest::path(Point::planar(0.0, 1.0), Point::planar(3.0, 1.0)),
//! );
//! assert_eq!(result.state, CompletionState::Complete);
//! ```

pub mod embedding;
pub mod error;
pub mod graph;
pub mod pool;
pub mod processor;
pub mod request;
pub mod search;
pub mod spatial;

pub use embedding::{EmbeddingTable, LandmarkEmbedding, PivotSelection};
pub use error::{Error, Result, SearchError};
pub use graph::{AdjacencyGraph, Connectivity, Edge, GraphOracle, GridGraph, GridOptions, NodeId, Point};
pub use pool::{Pool, Reset, Slab, SlabHandle};
pub use processor::{PathProcessor, ProcessorConfig, SearchEvent, SearchHandle};
pub use request::{CompletionState, SearchOptions, SearchRequest, SearchResult, SearchState, TargetPath};
pub use search::flood::{FloodRecord, FloodSearch, FloodTraceSearch};
pub use search::heuristic::{Aabb, Heuristic, HeuristicObjective};
pub use search::kernel::{SearchScratch, TickBudget};
pub use search::multi::{MultiTargetMode, MultiTargetSearch, TargetHeuristic};
pub use search::point::{EndingCondition, PointSearch, WithinDistance};
pub use search::random::RandomSearch;
pub use search::{ActiveSearch, SearchEnv, Searcher, StepStatus, Strategy};
pub use spatial::{NearestNode, NodeConstraint, SpatialIndex};
