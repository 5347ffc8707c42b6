mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{approx_eq, fixture_grid, run};
use wayfinder_lib::{
    CompletionState, Error, FloodSearch, FloodTraceSearch, GridGraph, GridOptions, Heuristic,
    MultiTargetSearch, PathProcessor, Point, ProcessorConfig, SearchError, SearchEvent,
    SearchRequest, SearchState, TickBudget,
};

fn maze() -> GridGraph {
    fixture_grid("maze.txt", GridOptions::default())
}

fn endpoints() -> Vec<(Point, Point)> {
    vec![
        (Point::planar(0.0, 0.0), Point::planar(19.0, 16.0)),
        (Point::planar(19.0, 0.0), Point::planar(0.0, 16.0)),
        (Point::planar(9.0, 6.0), Point::planar(11.0, 10.0)),
        (Point::planar(4.0, 14.0), Point::planar(18.0, 2.0)),
        (Point::planar(0.0, 16.0), Point::planar(9.0, 8.0)),
    ]
}

#[test]
fn threaded_results_match_synchronous_runs() {
    let grid = maze();
    let config = ProcessorConfig {
        threads: 3,
        slice_budget: TickBudget::Nodes(16),
    };
    let processor = PathProcessor::new(grid.clone(), config).expect("processor starts");
    assert_eq!(processor.threads(), 3);

    let handles: Vec<_> = endpoints()
        .into_iter()
        .cycle()
        .take(20)
        .map(|(from, to)| processor.submit(SearchRequest::path(from, to)))
        .collect();

    for (handle, (from, to)) in handles.iter().zip(endpoints().into_iter().cycle()) {
        processor.block_until_complete(*handle).expect("request finishes");
        let result = processor.result(*handle).expect("live handle").expect("result published");
        let expected = run(&grid, SearchRequest::path(from, to));
        assert_eq!(result.state, CompletionState::Complete);
        assert!(approx_eq(result.cost, expected.cost));
    }

    assert_eq!(processor.process_returns(), 20);
    for handle in handles {
        assert_eq!(processor.state(handle).expect("claimed"), SearchState::Returned);
        processor.release(handle).expect("release");
    }
    assert_eq!(processor.live_requests(), 0);
}

#[test]
fn callbacks_run_once_on_process_returns() {
    let processor = PathProcessor::new(maze(), ProcessorConfig::manual(TickBudget::Nodes(8)))
        .expect("processor starts");
    let completed = Arc::new(AtomicUsize::new(0));
    let targets = Arc::new(Mutex::new(Vec::new()));

    let completed_sink = completed.clone();
    let target_sink = targets.clone();
    let search = MultiTargetSearch::new(
        Point::planar(0.0, 0.0),
        vec![Point::planar(5.0, 0.0), Point::planar(2.0, 0.0)],
    );
    let handle = processor.submit(
        SearchRequest::new(search)
            .on_target(move |index, path| target_sink.lock().unwrap().push((index, path.cost)))
            .on_complete(move |result| {
                assert_eq!(result.state, CompletionState::Complete);
                completed_sink.fetch_add(1, Ordering::SeqCst);
            }),
    );

    processor.block_until_complete(handle).expect("request finishes");
    assert_eq!(completed.load(Ordering::SeqCst), 0, "callbacks wait for process_returns");

    assert_eq!(processor.process_returns(), 1);
    assert_eq!(processor.process_returns(), 0);
    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert_eq!(*targets.lock().unwrap(), vec![(1, 2.0), (0, 5.0)]);
}

#[test]
fn subscribers_see_targets_then_completion() {
    let processor = PathProcessor::new(maze(), ProcessorConfig::manual(TickBudget::Nodes(4)))
        .expect("processor starts");
    let events = processor.subscribe();

    let search = MultiTargetSearch::new(
        Point::planar(0.0, 0.0),
        vec![Point::planar(5.0, 0.0), Point::planar(2.0, 0.0)],
    );
    let handle = processor.submit(SearchRequest::new(search));
    processor.block_until_complete(handle).expect("request finishes");

    let received: Vec<SearchEvent> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![
            SearchEvent::TargetFound { handle, target_index: 1, cost: 2.0 },
            SearchEvent::TargetFound { handle, target_index: 0, cost: 5.0 },
            SearchEvent::Completed { handle, state: CompletionState::Complete },
        ]
    );
}

#[test]
fn recycled_slots_keep_capacity_flat() {
    let processor = PathProcessor::new(maze(), ProcessorConfig::manual(TickBudget::Unlimited))
        .expect("processor starts");
    let mut previous = None;

    for (from, to) in endpoints().into_iter().cycle().take(30) {
        let handle = processor.submit(SearchRequest::path(from, to));
        processor.block_until_complete(handle).expect("request finishes");
        processor.process_returns();
        processor.release(handle).expect("release");

        if let Some(old) = previous {
            assert!(matches!(processor.state(old), Err(Error::StaleHandle { .. })));
        }
        previous = Some(handle);
    }

    assert_eq!(processor.slot_capacity(), 1);
    assert_eq!(processor.live_requests(), 0);
}

#[test]
fn reused_scratch_carries_no_state_between_requests() {
    let processor = PathProcessor::new(
        fixture_grid("islands.txt", GridOptions::default()),
        ProcessorConfig::manual(TickBudget::Unlimited),
    )
    .expect("processor starts");

    let finish = |request: SearchRequest| {
        let handle = processor.submit(request);
        processor.block_until_complete(handle).expect("request finishes");
        let result = processor.result(handle).expect("live").expect("published");
        processor.process_returns();
        processor.release(handle).expect("release");
        result
    };

    let fresh = finish(SearchRequest::path(Point::planar(8.0, 4.0), Point::planar(5.0, 4.0)));
    let failed = finish(SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(8.0, 0.0)));
    let flood = finish(SearchRequest::new(FloodSearch::new(Point::planar(0.0, 4.0))));
    let again = finish(SearchRequest::path(Point::planar(8.0, 4.0), Point::planar(5.0, 4.0)));

    assert_eq!(failed.error, Some(SearchError::StartUnreachableFromEnd));
    assert_eq!(flood.flood.as_ref().map(|record| record.len()), Some(4));
    assert_eq!(fresh.nodes, again.nodes);
    assert_eq!(fresh.points, again.points);
    assert_eq!(fresh.searched_nodes, again.searched_nodes);
    assert_eq!(fresh.cost, again.cost);
}

#[test]
fn extra_claims_delay_recycling() {
    let processor = PathProcessor::new(maze(), ProcessorConfig::manual(TickBudget::Unlimited))
        .expect("processor starts");
    let handle = processor.submit(SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(3.0, 0.0)));
    processor.claim(handle).expect("claim");
    processor.block_until_complete(handle).expect("request finishes");
    processor.process_returns();

    processor.release(handle).expect("first release");
    assert!(processor.result(handle).expect("still claimed").is_some());
    processor.release(handle).expect("second release");
    assert!(matches!(processor.result(handle), Err(Error::StaleHandle { .. })));
}

#[test]
fn running_search_observes_cancellation() {
    let grid = GridGraph::new(120, 120, GridOptions::default()).expect("grid");
    let processor = PathProcessor::new(grid, ProcessorConfig::manual(TickBudget::Nodes(10)))
        .expect("processor starts");
    let handle = processor.submit(
        SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(119.0, 119.0))
            .heuristic(Heuristic::None),
    );

    assert!(processor.tick());
    assert!(processor.tick());
    assert_eq!(processor.state(handle).expect("live"), SearchState::Processing);

    processor.cancel(handle).expect("cancel");
    assert!(processor.tick());
    let result = processor.result(handle).expect("live").expect("published");
    assert_eq!(result.error, Some(SearchError::Cancelled));
    assert!(result.searched_nodes >= 10);
}

#[test]
fn threaded_cancel_and_shutdown() {
    let grid = GridGraph::new(200, 200, GridOptions::default()).expect("grid");
    let config = ProcessorConfig {
        threads: 1,
        slice_budget: TickBudget::Nodes(32),
    };
    let processor = PathProcessor::new(grid, config).expect("processor starts");
    let slow = processor.submit(SearchRequest::new(FloodSearch::new(Point::planar(0.0, 0.0))));
    let queued = processor.submit(SearchRequest::path(Point::planar(0.0, 0.0), Point::planar(1.0, 1.0)));

    processor.cancel(queued).expect("cancel queued");
    processor.cancel(slow).expect("cancel running");
    processor.block_until_complete(queued).expect("finished");
    processor.block_until_complete(slow).expect("finished");

    let queued_result = processor.result(queued).expect("live").expect("published");
    assert_eq!(queued_result.error, Some(SearchError::Cancelled));
    drop(processor);
}

#[test]
fn graph_updates_invalidate_cached_floods() {
    let processor = PathProcessor::new(maze(), ProcessorConfig::manual(TickBudget::Unlimited))
        .expect("processor starts");
    let flood_handle = processor.submit(SearchRequest::new(FloodSearch::new(Point::planar(0.0, 0.0))));
    processor.block_until_complete(flood_handle).expect("flood finishes");
    let record = processor
        .result(flood_handle)
        .expect("live")
        .and_then(|result| result.flood)
        .expect("flood record");

    let trace = |processor: &PathProcessor<GridGraph>| {
        let handle = processor.submit(SearchRequest::new(FloodTraceSearch::new(
            record.clone(),
            Point::planar(19.0, 16.0),
        )));
        processor.block_until_complete(handle).expect("trace finishes");
        processor.result(handle).expect("live").expect("published")
    };

    assert_eq!(trace(&processor).state, CompletionState::Complete);
    processor.update_graph(|grid| {
        let node = grid.node_at(0, 16).expect("cell");
        grid.set_penalty(node, 3.0);
    });
    assert!(matches!(
        trace(&processor).error,
        Some(SearchError::StaleCachedFlood { .. })
    ));
}
