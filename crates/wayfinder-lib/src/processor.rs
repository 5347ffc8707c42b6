//! Threaded (or caller-driven) request processor.
//!
//! Requests are queued and handed to workers, which advance one request at a
//! time slice by slice. Finished requests wait in a return queue until
//! [`PathProcessor::process_returns`] delivers their callbacks on the
//! caller's thread. Request slots live in a generation-checked slab: once the
//! last claim is released after the result has been returned, the slot is
//! recycled and old handles report [`Error::StaleHandle`].
//!
//! With `threads == 0` no worker threads are spawned and the caller drives
//! the processor through [`PathProcessor::tick`], one slice per call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::embedding::{LandmarkEmbedding, PivotSelection};
use crate::error::{Error, Result, SearchError};
use crate::graph::GraphOracle;
use crate::pool::{Pool, Slab, SlabHandle};
use crate::request::{Callbacks, CompletionState, SearchOptions, SearchRequest, SearchResult, SearchState, TargetPath};
use crate::search::kernel::{SearchScratch, TickBudget};
use crate::search::{ActiveSearch, SearchEnv, StepStatus, Strategy};
use crate::spatial::SpatialIndex;

/// Handle to a submitted request.
pub type SearchHandle = SlabHandle;

/// Processor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Worker threads; `0` means the caller drives work with `tick`.
    pub threads: usize,
    /// Work done per slice before a worker re-checks the queue.
    pub slice_budget: TickBudget,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(1);
        Self {
            threads,
            slice_budget: TickBudget::default(),
        }
    }
}

impl ProcessorConfig {
    /// Caller-driven configuration.
    pub fn manual(slice_budget: TickBudget) -> Self {
        Self {
            threads: 0,
            slice_budget,
        }
    }
}

/// Progress notification broadcast to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    TargetFound {
        handle: SearchHandle,
        target_index: usize,
        cost: f64,
    },
    Completed {
        handle: SearchHandle,
        state: CompletionState,
    },
}

struct Entry {
    state: SearchState,
    job: Option<(Strategy, SearchOptions)>,
    callbacks: Callbacks,
    cancel: Arc<AtomicBool>,
    targets: Vec<(usize, TargetPath)>,
    result: Option<SearchResult>,
    claims: u32,
}

struct Queue {
    entries: Slab<Entry>,
    pending: VecDeque<SearchHandle>,
    returns: VecDeque<SearchHandle>,
    scratch: Pool<SearchScratch>,
    subscribers: Vec<Sender<SearchEvent>>,
    shutdown: bool,
}

impl Queue {
    fn broadcast(&mut self, event: SearchEvent) {
        self.subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn entry(&self, handle: SearchHandle) -> Result<&Entry> {
        self.entries.get(handle).ok_or_else(|| handle.stale())
    }

    fn recycle_if_unclaimed(&mut self, handle: SearchHandle) {
        let recycle = self
            .entries
            .get(handle)
            .is_some_and(|entry| entry.claims == 0 && entry.state == SearchState::Returned);
        if recycle {
            self.entries.remove(handle);
            trace!(%handle, "request slot recycled");
        }
    }
}

struct Running {
    handle: SearchHandle,
    search: ActiveSearch,
    cancel: Arc<AtomicBool>,
}

struct Shared<G> {
    queue: Mutex<Queue>,
    work_ready: Condvar,
    finished: Condvar,
    graph: RwLock<G>,
    index: SpatialIndex,
    embedding: Option<LandmarkEmbedding>,
    budget: TickBudget,
}

impl<G: GraphOracle> Shared<G> {
    fn next_job(&self, queue: &mut Queue) -> Option<Running> {
        while let Some(handle) = queue.pending.pop_front() {
            let Some(entry) = queue.entries.get_mut(handle) else {
                continue;
            };
            let Some((strategy, options)) = entry.job.take() else {
                continue;
            };
            entry.state = SearchState::Preparing;
            let cancel = entry.cancel.clone();
            let scratch = queue.scratch.acquire();
            trace!(%handle, strategy = strategy.name(), "request picked up");
            return Some(Running {
                handle,
                search: ActiveSearch::new(strategy, options, scratch),
                cancel,
            });
        }
        None
    }

    /// Run one slice; `true` once the search has finished.
    fn run_slice(&self, running: &mut Running) -> bool {
        let status = {
            let graph = self.graph.read();
            let env = SearchEnv::new(&*graph, &self.index)
                .with_landmarks(self.embedding.as_ref().map(LandmarkEmbedding::snapshot));
            running.search.step(&env, self.budget, &running.cancel)
        };

        let found = running.search.take_found_targets();
        let mut queue = self.queue.lock();
        for (target_index, path) in &found {
            queue.broadcast(SearchEvent::TargetFound {
                handle: running.handle,
                target_index: *target_index,
                cost: path.cost,
            });
        }
        if let Some(entry) = queue.entries.get_mut(running.handle) {
            if entry.state == SearchState::Preparing {
                entry.state = SearchState::Processing;
            }
            entry.targets.extend(found);
        }

        status == StepStatus::Finished
    }

    fn complete(&self, mut running: Running) {
        let result = running
            .search
            .take_result()
            .unwrap_or_else(|| SearchResult::failed(SearchError::Cancelled, 0));
        let state = result.state;
        let handle = running.handle;

        {
            let mut queue = self.queue.lock();
            queue.scratch.release(running.search.into_scratch());
            if let Some(entry) = queue.entries.get_mut(handle) {
                entry.result = Some(result);
                entry.state = SearchState::ReturnQueue;
            }
            queue.returns.push_back(handle);
            queue.broadcast(SearchEvent::Completed { handle, state });
        }
        self.finished.notify_all();
    }
}

fn worker_loop<G: GraphOracle>(shared: Arc<Shared<G>>, worker: usize) {
    debug!(worker, "search worker started");
    loop {
        let mut running = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.shutdown {
                    debug!(worker, "search worker stopping");
                    return;
                }
                if let Some(running) = shared.next_job(&mut queue) {
                    break running;
                }
                shared.work_ready.wait(&mut queue);
            }
        };

        while !shared.run_slice(&mut running) {
            std::thread::yield_now();
        }
        shared.complete(running);
    }
}

/// Multi-request search service over a shared graph.
pub struct PathProcessor<G: GraphOracle + 'static> {
    shared: Arc<Shared<G>>,
    workers: Vec<JoinHandle<()>>,
    ticker: Mutex<Option<Running>>,
}

impl<G: GraphOracle + 'static> PathProcessor<G> {
    pub fn new(graph: G, config: ProcessorConfig) -> Result<Self> {
        let index = SpatialIndex::build(&graph);
        Self::start(graph, index, None, config)
    }

    /// Build a landmark table for `graph` and use it in every search.
    pub fn with_embedding(graph: G, selection: PivotSelection, config: ProcessorConfig) -> Result<Self> {
        let index = SpatialIndex::build(&graph);
        let embedding = LandmarkEmbedding::build(&graph, &index, selection)?;
        Self::start(graph, index, Some(embedding), config)
    }

    /// Use an existing landmark table, for example one loaded from disk.
    pub fn with_landmarks(graph: G, embedding: LandmarkEmbedding, config: ProcessorConfig) -> Result<Self> {
        let index = SpatialIndex::build(&graph);
        Self::start(graph, index, Some(embedding), config)
    }

    fn start(
        graph: G,
        index: SpatialIndex,
        embedding: Option<LandmarkEmbedding>,
        config: ProcessorConfig,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                entries: Slab::new(),
                pending: VecDeque::new(),
                returns: VecDeque::new(),
                scratch: Pool::new(),
                subscribers: Vec::new(),
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            finished: Condvar::new(),
            graph: RwLock::new(graph),
            index,
            embedding,
            budget: config.slice_budget,
        });

        let mut workers = Vec::with_capacity(config.threads);
        for worker in 0..config.threads {
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("wayfinder-worker-{worker}"))
                .spawn(move || worker_loop(shared, worker))?;
            workers.push(handle);
        }

        info!(
            threads = config.threads,
            budget = ?config.slice_budget,
            landmarks = shared.embedding.is_some(),
            "path processor started"
        );

        Ok(Self {
            shared,
            workers,
            ticker: Mutex::new(None),
        })
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.shared.index
    }

    pub fn embedding(&self) -> Option<&LandmarkEmbedding> {
        self.shared.embedding.as_ref()
    }

    /// Shared read access to the graph.
    pub fn graph(&self) -> RwLockReadGuard<'_, G> {
        self.shared.graph.read()
    }

    /// Mutate the graph between slices.
    ///
    /// Searches already running continue against the modified graph;
    /// landmark tables and flood records become stale. New searches skip a
    /// stale landmark table until [`Self::rebuild_embedding`] runs.
    pub fn update_graph<R>(&self, update: impl FnOnce(&mut G) -> R) -> R {
        let mut graph = self.shared.graph.write();
        update(&mut *graph)
    }

    /// Recompute the landmark table; `false` when there is none.
    pub fn rebuild_embedding(&self) -> Result<bool> {
        let Some(embedding) = self.shared.embedding.as_ref() else {
            return Ok(false);
        };
        let graph = self.shared.graph.read();
        embedding.rebuild(&*graph, &self.shared.index)?;
        Ok(true)
    }

    /// Queue a request. The returned handle carries one claim.
    pub fn submit(&self, request: SearchRequest) -> SearchHandle {
        let (strategy, options, callbacks) = request.into_parts();
        let name = strategy.name();
        let handle = {
            let mut queue = self.shared.queue.lock();
            let handle = queue.entries.insert(Entry {
                state: SearchState::Created,
                job: Some((strategy, options)),
                callbacks,
                cancel: Arc::new(AtomicBool::new(false)),
                targets: Vec::new(),
                result: None,
                claims: 1,
            });
            queue.pending.push_back(handle);
            handle
        };
        self.shared.work_ready.notify_one();
        debug!(%handle, strategy = name, "search submitted");
        handle
    }

    pub fn state(&self, handle: SearchHandle) -> Result<SearchState> {
        Ok(self.shared.queue.lock().entry(handle)?.state)
    }

    /// The result, once the request has finished.
    pub fn result(&self, handle: SearchHandle) -> Result<Option<SearchResult>> {
        Ok(self.shared.queue.lock().entry(handle)?.result.clone())
    }

    /// Add a claim so the slot outlives another [`release`](Self::release).
    pub fn claim(&self, handle: SearchHandle) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        queue.entries.try_get_mut(handle)?.claims += 1;
        Ok(())
    }

    /// Drop a claim. The slot is recycled once no claims remain and the
    /// result has been returned.
    pub fn release(&self, handle: SearchHandle) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        let entry = queue.entries.try_get_mut(handle)?;
        entry.claims = entry.claims.saturating_sub(1);
        queue.recycle_if_unclaimed(handle);
        Ok(())
    }

    /// Ask the request to stop. Queued requests finish immediately; running
    /// ones stop at their next frontier pop.
    pub fn cancel(&self, handle: SearchHandle) -> Result<()> {
        let cancelled_before_start = {
            let mut queue = self.shared.queue.lock();
            let entry = queue.entries.try_get_mut(handle)?;
            entry.cancel.store(true, Ordering::Release);
            if entry.state != SearchState::Created {
                false
            } else {
                entry.job = None;
                entry.result = Some(SearchResult::failed(SearchError::Cancelled, 0));
                entry.state = SearchState::ReturnQueue;
                queue.pending.retain(|&pending| pending != handle);
                queue.returns.push_back(handle);
                queue.broadcast(SearchEvent::Completed {
                    handle,
                    state: CompletionState::Error,
                });
                true
            }
        };

        if cancelled_before_start {
            self.shared.finished.notify_all();
        }
        debug!(%handle, "search cancelled");
        Ok(())
    }

    /// Wait until the request's result is available.
    ///
    /// In caller-driven mode this drives [`tick`](Self::tick) until then.
    pub fn block_until_complete(&self, handle: SearchHandle) -> Result<()> {
        if self.workers.is_empty() {
            loop {
                if self.state(handle)?.is_finished() {
                    return Ok(());
                }
                if !self.tick() {
                    return Err(Error::NotScheduled {
                        index: handle.index,
                        generation: handle.generation,
                    });
                }
            }
        }

        let mut queue = self.shared.queue.lock();
        loop {
            if queue.entry(handle)?.state.is_finished() {
                return Ok(());
            }
            if queue.shutdown {
                return Err(Error::NotScheduled {
                    index: handle.index,
                    generation: handle.generation,
                });
            }
            self.shared.finished.wait(&mut queue);
        }
    }

    /// Advance caller-driven processing by one slice.
    ///
    /// Returns `false` when there was nothing to do. Always `false` when
    /// worker threads are running.
    pub fn tick(&self) -> bool {
        if !self.workers.is_empty() {
            return false;
        }

        let mut ticker = self.ticker.lock();
        if ticker.is_none() {
            let mut queue = self.shared.queue.lock();
            *ticker = self.shared.next_job(&mut queue);
        }
        let Some(running) = ticker.as_mut() else {
            return false;
        };
        if self.shared.run_slice(running) {
            if let Some(running) = ticker.take() {
                self.shared.complete(running);
            }
        }
        true
    }

    /// Deliver callbacks of finished requests on the calling thread.
    ///
    /// Each request's target callbacks run in discovery order, followed by
    /// its completion callback, exactly once. Returns how many requests were
    /// returned.
    pub fn process_returns(&self) -> usize {
        let mut returned = 0;
        loop {
            let (handle, targets, mut callbacks, result) = {
                let mut queue = self.shared.queue.lock();
                let Some(handle) = queue.returns.pop_front() else {
                    break;
                };
                let Some(entry) = queue.entries.get_mut(handle) else {
                    continue;
                };
                entry.state = SearchState::Returning;
                (
                    handle,
                    std::mem::take(&mut entry.targets),
                    std::mem::take(&mut entry.callbacks),
                    entry.result.clone().unwrap_or_default(),
                )
            };

            for (index, path) in &targets {
                callbacks.target_found(*index, path);
            }
            callbacks.completed(&result);

            let mut queue = self.shared.queue.lock();
            if let Some(entry) = queue.entries.get_mut(handle) {
                entry.state = SearchState::Returned;
            }
            queue.recycle_if_unclaimed(handle);
            returned += 1;
        }
        returned
    }

    /// Receive progress events for every request from now on.
    pub fn subscribe(&self) -> Receiver<SearchEvent> {
        let (sender, receiver) = mpsc::channel();
        self.shared.queue.lock().subscribers.push(sender);
        receiver
    }

    /// Requests not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().pending.len()
    }

    /// Request slots currently alive.
    pub fn live_requests(&self) -> usize {
        self.shared.queue.lock().entries.len()
    }

    /// Request slots ever allocated; stays flat while slots are recycled.
    pub fn slot_capacity(&self) -> usize {
        self.shared.queue.lock().entries.capacity()
    }
}

impl<G: GraphOracle + 'static> Drop for PathProcessor<G> {
    fn drop(&mut self) {
        self.shared.queue.lock().shutdown = true;
        self.shared.work_ready.notify_all();
        self.shared.finished.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GridGraph, GridOptions, Point};

    fn manual() -> PathProcessor<GridGraph> {
        let grid = GridGraph::new(8, 8, GridOptions::default()).unwrap();
        PathProcessor::new(grid, ProcessorConfig::manual(TickBudget::Nodes(4))).unwrap()
    }

    #[test]
    fn tick_mode_advances_in_slices() {
        let processor = manual();
        let handle = processor.submit(SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(7.0, 7.0)));
        assert_eq!(processor.state(handle).unwrap(), SearchState::Created);

        assert!(processor.tick());
        assert_eq!(processor.state(handle).unwrap(), SearchState::Processing);

        processor.block_until_complete(handle).unwrap();
        assert_eq!(processor.state(handle).unwrap(), SearchState::ReturnQueue);
        let result = processor.result(handle).unwrap().unwrap();
        assert_eq!(result.state, CompletionState::Complete);
    }

    #[test]
    fn idle_tick_reports_no_work() {
        let processor = manual();
        assert!(!processor.tick());
    }

    #[test]
    fn cancelled_before_start_finishes_immediately() {
        let processor = manual();
        let handle = processor.submit(SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(7.0, 7.0)));
        processor.cancel(handle).unwrap();
        assert_eq!(processor.pending(), 0);
        let result = processor.result(handle).unwrap().unwrap();
        assert_eq!(result.error, Some(SearchError::Cancelled));
    }

    #[test]
    fn released_handle_goes_stale_after_return() {
        let processor = manual();
        let handle = processor.submit(SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(1.0, 0.0)));
        processor.block_until_complete(handle).unwrap();
        assert_eq!(processor.process_returns(), 1);
        processor.release(handle).unwrap();
        assert!(matches!(processor.state(handle), Err(Error::StaleHandle { .. })));
        assert!(matches!(processor.release(handle), Err(Error::StaleHandle { .. })));
    }
}
