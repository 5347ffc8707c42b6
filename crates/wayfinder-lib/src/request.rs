//! Search requests, options and results.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::graph::{NodeId, Point};
use crate::search::flood::FloodRecord;
use crate::search::heuristic::Heuristic;
use crate::search::kernel::TracedPath;
use crate::search::point::{EndingCondition, PointSearch};
use crate::search::Strategy;
use crate::spatial::NodeConstraint;

/// How a finished request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    #[default]
    Complete,
    /// Only part of what was asked for was reached.
    Partial,
    Error,
}

/// Lifecycle of a request inside the processor.
///
/// States only ever move forward, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchState {
    Created,
    /// Picked up by a worker; start and end are being resolved.
    Preparing,
    Processing,
    /// Finished, waiting for callbacks to be delivered.
    ReturnQueue,
    /// Callbacks are running.
    Returning,
    Returned,
}

impl SearchState {
    /// Whether the result is available.
    pub fn is_finished(self) -> bool {
        self >= SearchState::ReturnQueue
    }
}

/// Tuning shared by every strategy.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub heuristic: Heuristic,
    /// Multiplier applied to the metric part of `H`.
    pub heuristic_scale: f64,
    pub constraint: NodeConstraint,
    /// Return a path to the closest reached node when the end is unreachable
    /// (point-to-point only).
    pub calculate_partial: bool,
    /// Use the processor's landmark table when one is available.
    pub use_landmarks: bool,
    /// Seed for randomised strategies; entropy when absent.
    pub seed: Option<u64>,
    #[serde(skip)]
    pub ending_condition: Option<Arc<dyn EndingCondition>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            heuristic: Heuristic::default(),
            heuristic_scale: 1.0,
            constraint: NodeConstraint::default(),
            calculate_partial: false,
            use_landmarks: true,
            seed: None,
            ending_condition: None,
        }
    }
}

impl fmt::Debug for SearchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOptions")
            .field("heuristic", &self.heuristic)
            .field("heuristic_scale", &self.heuristic_scale)
            .field("constraint", &self.constraint)
            .field("calculate_partial", &self.calculate_partial)
            .field("use_landmarks", &self.use_landmarks)
            .field("seed", &self.seed)
            .field("ending_condition", &self.ending_condition.is_some())
            .finish()
    }
}

/// Path to one target of a multi-target search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetPath {
    pub nodes: Vec<NodeId>,
    pub points: Vec<Point>,
    pub cost: f64,
}

impl From<TracedPath> for TargetPath {
    fn from(path: TracedPath) -> Self {
        Self {
            nodes: path.nodes,
            points: path.points,
            cost: path.cost,
        }
    }
}

/// Outcome of a search request.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub state: CompletionState,
    pub error: Option<SearchError>,
    /// Real nodes of the primary path, start first.
    pub nodes: Vec<NodeId>,
    /// Start point, node positions, end point; consecutive duplicates removed.
    pub points: Vec<Point>,
    /// Cost of the primary path; zero when there is none.
    pub cost: f64,
    /// Real nodes closed by the search.
    pub searched_nodes: usize,
    /// Per-target paths of a multi-target search, `None` when unreached.
    pub targets: Vec<Option<TargetPath>>,
    /// Flood record produced by a flood search.
    pub flood: Option<Arc<FloodRecord>>,
}

impl SearchResult {
    pub(crate) fn failed(error: SearchError, searched_nodes: usize) -> Self {
        Self {
            state: CompletionState::Error,
            error: Some(error),
            searched_nodes,
            ..Self::default()
        }
    }

    pub(crate) fn from_path(state: CompletionState, path: TracedPath, searched_nodes: usize) -> Self {
        Self {
            state,
            error: None,
            nodes: path.nodes,
            points: path.points,
            cost: path.cost,
            searched_nodes,
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.state == CompletionState::Error
    }

    /// Human-readable error, empty when the search did not fail.
    pub fn error_message(&self) -> String {
        self.error.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    /// Path length measured along `points`.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| pair[0].distance_to(&pair[1]))
            .sum()
    }
}

pub type CompleteCallback = Box<dyn FnOnce(&SearchResult) + Send>;
pub type TargetCallback = Box<dyn FnMut(usize, &TargetPath) + Send>;

/// Callbacks delivered on the thread that returns results.
#[derive(Default)]
pub(crate) struct Callbacks {
    on_complete: Option<CompleteCallback>,
    on_target: Option<TargetCallback>,
}

impl Callbacks {
    pub(crate) fn target_found(&mut self, index: usize, path: &TargetPath) {
        if let Some(callback) = self.on_target.as_mut() {
            callback(index, path);
        }
    }

    /// Fires the completion callback; later calls do nothing.
    pub(crate) fn completed(&mut self, result: &SearchResult) {
        if let Some(callback) = self.on_complete.take() {
            callback(result);
        }
    }
}

/// A search to run, with its options and callbacks.
///
/// ```
/// use wayfinder_lib::{Heuristic, Point, SearchRequest};
///
/// let request = SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(4.0, 4.0))
///     .heuristic(Heuristic::Octile)
///     .calculate_partial(true);
/// assert_eq!(request.strategy().name(), "point-to-point");
/// ```
pub struct SearchRequest {
    strategy: Strategy,
    options: SearchOptions,
    callbacks: Callbacks,
}

impl SearchRequest {
    pub fn new(strategy: impl Into<Strategy>) -> Self {
        Self {
            strategy: strategy.into(),
            options: SearchOptions::default(),
            callbacks: Callbacks::default(),
        }
    }

    /// Point-to-point request between two world positions.
    pub fn path(start: Point, end: Point) -> Self {
        Self::new(PointSearch::new(start, end))
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn heuristic(mut self, heuristic: Heuristic) -> Self {
        self.options.heuristic = heuristic;
        self
    }

    pub fn heuristic_scale(mut self, scale: f64) -> Self {
        self.options.heuristic_scale = scale;
        self
    }

    pub fn constraint(mut self, constraint: NodeConstraint) -> Self {
        self.options.constraint = constraint;
        self
    }

    pub fn calculate_partial(mut self, enabled: bool) -> Self {
        self.options.calculate_partial = enabled;
        self
    }

    pub fn use_landmarks(mut self, enabled: bool) -> Self {
        self.options.use_landmarks = enabled;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = Some(seed);
        self
    }

    pub fn ending_condition(mut self, condition: Arc<dyn EndingCondition>) -> Self {
        self.options.ending_condition = Some(condition);
        self
    }

    /// Called once with the final result.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&SearchResult) + Send + 'static,
    {
        self.callbacks.on_complete = Some(Box::new(callback));
        self
    }

    /// Called once per target as multi-target searches resolve them.
    pub fn on_target<F>(mut self, callback: F) -> Self
    where
        F: FnMut(usize, &TargetPath) + Send + 'static,
    {
        self.callbacks.on_target = Some(Box::new(callback));
        self
    }

    pub(crate) fn into_parts(self) -> (Strategy, SearchOptions, Callbacks) {
        (self.strategy, self.options, self.callbacks)
    }
}

impl fmt::Debug for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchRequest")
            .field("strategy", &self.strategy.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
