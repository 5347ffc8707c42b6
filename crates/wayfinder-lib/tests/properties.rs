mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use common::{run, shortest_costs};
use proptest::prelude::*;
use wayfinder_lib::{
    ActiveSearch, CompletionState, Connectivity, EmbeddingTable, FloodSearch, GraphOracle,
    GridGraph, GridOptions, Heuristic, MultiTargetMode, MultiTargetSearch, NodeId, PivotSelection,
    PointSearch, SearchEnv, SearchOptions, SearchRequest, SearchScratch, Searcher, SpatialIndex,
    StepStatus, Strategy as SearchStrategy, TickBudget,
};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Scenario {
    grid: GridGraph,
    start: NodeId,
    end: NodeId,
}

/// Small grids with random walls and penalties; start and end are walkable.
fn scenario() -> impl Strategy<Value = Scenario> {
    (3usize..9, 3usize..9, any::<bool>())
        .prop_flat_map(|(width, height, eight)| {
            let cells = width * height;
            (
                Just((width, height, eight)),
                prop::collection::vec(0u8..12, cells),
                0..cells,
                0..cells,
            )
        })
        .prop_map(|((width, height, eight), codes, start, end)| {
            let options = GridOptions {
                connectivity: if eight { Connectivity::Eight } else { Connectivity::Four },
                ..GridOptions::default()
            };
            let mut grid = GridGraph::new(width, height, options).expect("grid");
            for (index, code) in codes.into_iter().enumerate() {
                let node = NodeId(index as u32);
                match code {
                    0..=2 => grid.set_walkable(node, false),
                    10 => grid.set_penalty(node, 2.0),
                    11 => grid.set_penalty(node, 5.0),
                    _ => {}
                }
            }
            let start = NodeId(start as u32);
            let end = NodeId(end as u32);
            grid.set_walkable(start, true);
            grid.set_walkable(end, true);
            Scenario { grid, start, end }
        })
}

fn walkable(grid: &GridGraph) -> Vec<NodeId> {
    (0..grid.node_count())
        .map(|index| NodeId(index as u32))
        .filter(|&node| grid.is_walkable(node))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn point_search_is_optimal(scenario in scenario(), heuristic_index in 0usize..3) {
        let Scenario { grid, start, end } = scenario;
        let heuristic = [Heuristic::None, Heuristic::Euclidean, Heuristic::Octile][heuristic_index];
        let expected = shortest_costs(&grid, start)[end.index()];

        let request = SearchRequest::path(grid.position(start), grid.position(end)).heuristic(heuristic);
        let result = run(&grid, request);

        if expected.is_finite() {
            prop_assert_eq!(result.state, CompletionState::Complete);
            prop_assert!((result.cost - expected).abs() < EPSILON, "cost {} expected {}", result.cost, expected);
            prop_assert_eq!(result.nodes.first(), Some(&start));
            prop_assert_eq!(result.nodes.last(), Some(&end));
        } else {
            prop_assert_eq!(result.state, CompletionState::Error);
        }
    }

    #[test]
    fn landmark_heuristic_is_admissible(scenario in scenario(), seed in any::<u64>(), spread in any::<bool>()) {
        let grid = scenario.grid;
        let index = SpatialIndex::build(&grid);
        let selection = if spread {
            PivotSelection::RandomSpreadOut { count: 3, seed: Some(seed) }
        } else {
            PivotSelection::Random { count: 3, seed: Some(seed) }
        };
        let table = EmbeddingTable::build(&grid, &index, &selection).expect("walkable pivots exist");

        let nodes = walkable(&grid);
        for &a in &nodes {
            let costs = shortest_costs(&grid, a);
            for &b in &nodes {
                let estimate = table.heuristic(a, b);
                prop_assert!(estimate >= 0.0);
                prop_assert!(
                    estimate <= costs[b.index()] + EPSILON,
                    "h({}, {}) = {} exceeds {}", a, b, estimate, costs[b.index()]
                );
            }
        }
    }

    #[test]
    fn landmarks_keep_paths_optimal(scenario in scenario(), seed in any::<u64>()) {
        let Scenario { grid, start, end } = scenario;
        let index = SpatialIndex::build(&grid);
        let table = EmbeddingTable::build(&grid, &index, &PivotSelection::Random { count: 2, seed: Some(seed) })
            .expect("walkable pivots exist");
        let env = SearchEnv::new(&grid, &index).with_landmarks(Some(Arc::new(table)));

        let plain = run(&grid, SearchRequest::path(grid.position(start), grid.position(end)));
        let guided = Searcher::new().run(&env, SearchRequest::path(grid.position(start), grid.position(end)));

        prop_assert_eq!(plain.state, guided.state);
        prop_assert!((plain.cost - guided.cost).abs() < EPSILON);
    }

    #[test]
    fn flood_costs_are_final_shortest_costs(scenario in scenario()) {
        let Scenario { grid, start, .. } = scenario;
        let expected = shortest_costs(&grid, start);
        let result = run(&grid, SearchRequest::new(FloodSearch::new(grid.position(start))));
        let record = result.flood.expect("flood record");

        for (index, &cost) in expected.iter().enumerate() {
            let node = NodeId(index as u32);
            match record.cost_to(node) {
                Some(recorded) => prop_assert!((recorded - cost).abs() < EPSILON),
                None => prop_assert!(cost.is_infinite()),
            }
        }
    }

    #[test]
    fn first_target_mode_picks_minimum(scenario in scenario(), extra in prop::collection::vec(0usize..64, 1..4)) {
        let Scenario { grid, start, end } = scenario;
        let costs = shortest_costs(&grid, start);
        let mut targets = vec![end];
        targets.extend(
            extra
                .into_iter()
                .map(|index| NodeId((index % grid.node_count()) as u32))
                .filter(|&node| grid.is_walkable(node)),
        );
        let expected = targets
            .iter()
            .map(|node| costs[node.index()])
            .fold(f64::INFINITY, f64::min);

        let search = MultiTargetSearch::new(grid.position(start), targets.iter().map(|&node| grid.position(node)))
            .mode(MultiTargetMode::FirstTarget);
        let result = run(&grid, SearchRequest::new(search));

        if expected.is_finite() {
            prop_assert!((result.cost - expected).abs() < EPSILON);
        } else {
            prop_assert_eq!(result.state, CompletionState::Error);
        }
    }

    #[test]
    fn sliced_search_matches_unsliced(scenario in scenario(), slice in 1usize..5) {
        let Scenario { grid, start, end } = scenario;
        let index = SpatialIndex::build(&grid);
        let env = SearchEnv::new(&grid, &index);
        let never = AtomicBool::new(false);

        let strategy = || SearchStrategy::from(PointSearch::new(grid.position(start), grid.position(end)));
        let mut sliced = ActiveSearch::new(strategy(), SearchOptions::default(), SearchScratch::new());
        let mut slices = 0;
        while sliced.step(&env, TickBudget::Nodes(slice), &never) == StepStatus::Pending {
            slices += 1;
        }
        let mut whole = ActiveSearch::new(strategy(), SearchOptions::default(), SearchScratch::new());
        prop_assert_eq!(whole.step(&env, TickBudget::Unlimited, &never), StepStatus::Finished);

        let sliced = sliced.take_result().expect("finished");
        let whole = whole.take_result().expect("finished");
        prop_assert_eq!(&sliced.nodes, &whole.nodes);
        prop_assert_eq!(sliced.searched_nodes, whole.searched_nodes);
        prop_assert!(slices * slice <= whole.searched_nodes + grid.node_count());
    }
}
