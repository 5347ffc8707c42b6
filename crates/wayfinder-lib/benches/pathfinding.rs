use criterion::{criterion_group, criterion_main, Criterion};
use once_cell::sync::Lazy;
use std::hint::black_box;
use std::sync::Arc;
use wayfinder_lib::{
    EmbeddingTable, FloodSearch, GridGraph, GridOptions, Heuristic, MultiTargetSearch,
    PivotSelection, Point, SearchEnv, SearchRequest, Searcher, SpatialIndex,
};

const SIZE: usize = 128;

/// Open grid with a few long walls so searches have to route around them.
static GRID: Lazy<GridGraph> = Lazy::new(|| {
    let mut grid = GridGraph::new(SIZE, SIZE, GridOptions::default()).expect("grid");
    for wall in 1..4 {
        let x = wall * SIZE / 4;
        let gap = if wall % 2 == 0 { 0 } else { SIZE - 1 };
        for y in 0..SIZE {
            if y != gap {
                let node = grid.node_at(x, y).expect("cell");
                grid.set_walkable(node, false);
            }
        }
    }
    grid
});
static INDEX: Lazy<SpatialIndex> = Lazy::new(|| SpatialIndex::build(&*GRID));
static LANDMARKS: Lazy<Arc<EmbeddingTable>> = Lazy::new(|| {
    let selection = PivotSelection::RandomSpreadOut {
        count: 8,
        seed: Some(42),
    };
    Arc::new(EmbeddingTable::build(&*GRID, &*INDEX, &selection).expect("landmarks"))
});

fn corner_to_corner() -> SearchRequest {
    SearchRequest::path(
        Point::planar(0.0, 0.0),
        Point::planar((SIZE - 1) as f64, (SIZE - 1) as f64),
    )
}

fn benchmark_pathfinding(c: &mut Criterion) {
    let grid = &*GRID;
    let index = &*INDEX;
    let mut searcher = Searcher::new();

    c.bench_function("dijkstra_corner_to_corner", |b| {
        let env = SearchEnv::new(grid, index);
        b.iter(|| {
            let result = searcher.run(&env, corner_to_corner().heuristic(Heuristic::None));
            black_box(result.cost)
        });
    });

    c.bench_function("astar_octile_corner_to_corner", |b| {
        let env = SearchEnv::new(grid, index);
        b.iter(|| {
            let result = searcher.run(&env, corner_to_corner().heuristic(Heuristic::Octile));
            black_box(result.searched_nodes)
        });
    });

    c.bench_function("astar_landmarks_corner_to_corner", |b| {
        let env = SearchEnv::new(grid, index).with_landmarks(Some(LANDMARKS.clone()));
        b.iter(|| {
            let result = searcher.run(&env, corner_to_corner().heuristic(Heuristic::Octile));
            black_box(result.searched_nodes)
        });
    });

    c.bench_function("flood_budget_60", |b| {
        let env = SearchEnv::new(grid, index);
        b.iter(|| {
            let request = SearchRequest::new(FloodSearch::new(Point::planar(64.0, 64.0)).max_cost(60.0));
            let result = searcher.run(&env, request);
            black_box(result.flood.map(|record| record.len()))
        });
    });

    c.bench_function("multi_target_four_corners", |b| {
        let env = SearchEnv::new(grid, index);
        let last = (SIZE - 1) as f64;
        b.iter(|| {
            let search = MultiTargetSearch::new(
                Point::planar(64.0, 64.0),
                vec![
                    Point::planar(0.0, 0.0),
                    Point::planar(last, 0.0),
                    Point::planar(0.0, last),
                    Point::planar(last, last),
                ],
            );
            let result = searcher.run(&env, SearchRequest::new(search).heuristic(Heuristic::Octile));
            black_box(result.cost)
        });
    });
}

criterion_group!(benches, benchmark_pathfinding);
criterion_main!(benches);
