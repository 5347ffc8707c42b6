//! Random destination within a cost band.

use std::ops::ControlFlow;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::SearchError;
use crate::graph::{GraphOracle, Point};
use crate::request::{CompletionState, SearchOptions, SearchResult};
use crate::search::heuristic::{Aabb, HeuristicObjective};
use crate::search::kernel::{Kernel, SearchHooks, TempKind, TemporaryNode};
use crate::search::{SearchEnv, SearchStrategy};

/// Picks a uniformly random node whose cost lies in
/// `[length, length + spread]` and returns the path to it.
///
/// Nodes in the band are sampled with a single-slot reservoir, so every
/// closed candidate is equally likely. The first node closed beyond the band
/// ends the search. If the band is never reached the most expensive node
/// closed below it is used instead.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    start: Point,
    length: f64,
    spread: f64,
    aim: Option<Point>,
    aim_strength: f64,
    rng: Option<ChaCha8Rng>,
    candidates: u64,
    chosen: Option<u32>,
    furthest: Option<(f64, u32)>,
}

impl RandomSearch {
    pub fn new(start: Point, length: f64) -> Self {
        Self {
            start,
            length: length.max(0.0),
            spread: 0.0,
            aim: None,
            aim_strength: 0.0,
            rng: None,
            candidates: 0,
            chosen: None,
            furthest: None,
        }
    }

    /// Widen the accepted band above `length`.
    pub fn spread(mut self, spread: f64) -> Self {
        self.spread = spread.max(0.0);
        self
    }

    /// Bias exploration towards `point`; `strength` scales the heuristic.
    pub fn aim(mut self, point: Point, strength: f64) -> Self {
        self.aim = Some(point);
        self.aim_strength = strength.max(0.0);
        self
    }

    fn upper(&self) -> f64 {
        self.length + self.spread
    }
}

impl SearchHooks for RandomSearch {
    fn on_visit_node<G: GraphOracle + ?Sized>(
        &mut self,
        kernel: &mut Kernel,
        _graph: &G,
        slot: u32,
    ) -> ControlFlow<()> {
        let g = kernel.g(slot);

        if g > self.upper() {
            self.chosen.get_or_insert(slot);
            return ControlFlow::Break(());
        }

        if g >= self.length {
            self.candidates += 1;
            let pick = match self.rng.as_mut() {
                Some(rng) => rng.gen_range(0..self.candidates) == 0,
                None => self.candidates == 1,
            };
            if pick {
                self.chosen = Some(slot);
            }
        } else if self.furthest.map_or(true, |(best, _)| g > best) {
            self.furthest = Some((g, slot));
        }

        ControlFlow::Continue(())
    }

    fn on_frontier_exhausted<G: GraphOracle + ?Sized>(&mut self, _kernel: &mut Kernel, _graph: &G) {}
}

impl SearchStrategy for RandomSearch {
    const NAME: &'static str = "random";

    fn prepare<G: GraphOracle + ?Sized>(
        &mut self,
        kernel: &mut Kernel,
        env: &SearchEnv<'_, G>,
        options: &SearchOptions,
    ) -> Result<(), SearchError> {
        self.candidates = 0;
        self.chosen = None;
        self.furthest = None;
        self.rng = Some(match options.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        });

        let start = env
            .index
            .nearest(env.graph, self.start, &options.constraint)
            .ok_or(SearchError::NoStartNode)?;
        let start_slot = kernel.add_temp(TemporaryNode {
            kind: TempKind::Start,
            associated: start.node,
            position: self.start,
            target_index: 0,
        });

        kernel.objective = match self.aim {
            Some(aim) => HeuristicObjective::towards(Aabb::point(aim), options.heuristic, self.aim_strength),
            None => HeuristicObjective::disabled(),
        };
        kernel.seed(env.graph, start_slot);
        Ok(())
    }

    fn finish<G: GraphOracle + ?Sized>(&mut self, kernel: &Kernel, graph: &G) -> SearchResult {
        let searched = kernel.searched_nodes;
        match self.chosen.or(self.furthest.map(|(_, slot)| slot)) {
            Some(slot) => {
                SearchResult::from_path(CompletionState::Complete, kernel.trace_node(graph, slot), searched)
            }
            None => SearchResult::failed(SearchError::NoRandomTarget, searched),
        }
    }
}
