use fxhash::{FxHashMap, FxHashSet};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, instrument};

use crate::{
    problem::stop::StopIdx,
    solver::{
        cost::COST_EPSILON,
        insertion::best_insertion,
        moves::{
            inter_relocate::InterRelocateOperator,
            inter_swap::InterSwapOperator,
            r#move::{Move, NeighborhoodOperator},
            or_opt::OrOptOperator,
            two_opt::TwoOptOperator,
            two_opt_star::TwoOptStarOperator,
        },
        solution::{route::RouteIdx, working_solution::WorkingSolution},
    },
};

type RoutePair = (RouteIdx, RouteIdx);

/// Versions of both routes of a pair. Route versions are unique across
/// clones, so an entry stays valid for any solution holding these routes.
type PairKey = (u64, u64);

/// Best-improvement descent over every neighborhood operator.
///
/// Route pairs are evaluated in parallel, the best move of each pair is
/// cached by route versions so only pairs touching a changed route are
/// evaluated again after a move.
pub struct LocalSearch {
    scope: Option<FxHashSet<RouteIdx>>,
    insert_unassigned: bool,
    cache: FxHashMap<PairKey, Option<(f64, Move)>>,
    /// Route versions and unassigned count of the last failed attempt at
    /// placing unassigned stops.
    insertion_snapshot: Option<(Vec<u64>, usize)>,
}

impl Default for LocalSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSearch {
    pub fn new() -> Self {
        LocalSearch {
            scope: None,
            insert_unassigned: true,
            cache: FxHashMap::default(),
            insertion_snapshot: None,
        }
    }

    /// Only moves between the given routes are considered.
    pub fn scoped(routes: impl IntoIterator<Item = RouteIdx>) -> Self {
        LocalSearch {
            scope: Some(routes.into_iter().collect()),
            ..Self::new()
        }
    }

    /// Unassigned stops stay unassigned, only planned stops move.
    pub fn keep_unassigned(mut self) -> Self {
        self.insert_unassigned = false;
        self
    }

    fn in_scope(&self, route_id: RouteIdx) -> bool {
        self.scope
            .as_ref()
            .is_none_or(|scope| scope.contains(&route_id))
    }

    fn pairs(&self, solution: &WorkingSolution) -> Vec<RoutePair> {
        let route_ids: Vec<RouteIdx> = solution
            .route_ids()
            .filter(|&route_id| self.in_scope(route_id))
            .collect();

        let mut pairs = Vec::with_capacity(route_ids.len() * route_ids.len());
        for &r1 in &route_ids {
            for &r2 in &route_ids {
                if solution.route(r1).is_empty() && solution.route(r2).is_empty() {
                    continue;
                }
                pairs.push((r1, r2));
            }
        }
        pairs
    }

    fn key(solution: &WorkingSolution, (r1, r2): RoutePair) -> PairKey {
        (solution.route(r1).version(), solution.route(r2).version())
    }

    /// Applies the best improving move, `None` at a local optimum.
    pub fn step(&mut self, solution: &mut WorkingSolution) -> Option<Move> {
        if self.insert_unassigned
            && let Some(mv) = self.best_unassigned_insertion(solution)
        {
            let _ = mv.apply(solution);
            return Some(mv);
        }

        let pairs = self.pairs(solution);
        let missing: Vec<RoutePair> = pairs
            .iter()
            .copied()
            .filter(|&pair| !self.cache.contains_key(&Self::key(solution, pair)))
            .collect();

        let evaluated: Vec<(PairKey, Option<(f64, Move)>)> = missing
            .par_iter()
            .map(|&pair| {
                let best = best_pair_move(solution, pair, |_, delta| delta < -COST_EPSILON);
                (Self::key(solution, pair), best)
            })
            .collect();
        self.cache.extend(evaluated);

        let mut best: Option<(f64, &Move)> = None;
        for pair in &pairs {
            if let Some(Some((delta, mv))) = self.cache.get(&Self::key(solution, *pair))
                && best.is_none_or(|(best_delta, _)| *delta < best_delta)
            {
                best = Some((*delta, mv));
            }
        }

        let (delta, mv) = best.map(|(delta, mv)| (delta, mv.clone()))?;
        debug!(delta, "Apply {} {:?}", mv.operator_name(), mv);
        let _ = mv.apply(solution);

        if self.cache.len() > 4 * pairs.len() {
            self.clear_stale(solution);
        }

        Some(mv)
    }

    /// Runs `step` until a local optimum or `max_iterations` moves. Returns
    /// the applied moves.
    #[instrument(skip_all, level = "debug")]
    pub fn descend(&mut self, solution: &mut WorkingSolution, max_iterations: usize) -> Vec<Move> {
        let mut applied = Vec::new();
        while applied.len() < max_iterations {
            match self.step(solution) {
                Some(mv) => applied.push(mv),
                None => break,
            }
        }
        applied
    }

    /// Best move of the neighborhood accepted by `admissible`, improving or
    /// not. Used by tabu search, nothing is cached.
    pub fn best_admissible_move<F>(&self, solution: &WorkingSolution, admissible: F) -> Option<(f64, Move)>
    where
        F: Fn(&Move, f64) -> bool + Sync,
    {
        let mut candidates: Vec<(f64, Move)> = self
            .pairs(solution)
            .par_iter()
            .filter_map(|&pair| best_pair_move(solution, pair, &admissible))
            .collect();

        for stop_id in solution.unassigned().iter().copied() {
            if let Some((delta, mv)) = self.unassigned_insertion(solution, stop_id)
                && admissible(&mv, delta)
            {
                candidates.push((delta, mv));
            }
        }

        candidates
            .into_iter()
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
    }

    fn unassigned_insertion(&self, solution: &WorkingSolution, stop_id: StopIdx) -> Option<(f64, Move)> {
        let enforce_zones = solution.constraints().hard().enforce_zones;
        let candidates: Vec<RouteIdx> = solution
            .problem()
            .eligible_resources(stop_id, enforce_zones)
            .map(RouteIdx::from)
            .filter(|&route_id| self.in_scope(route_id))
            .collect();

        best_insertion(solution, stop_id, candidates).map(|insertion| {
            (
                insertion.added_cost - solution.unassigned_stop_penalty(stop_id),
                insertion.into_move(),
            )
        })
    }

    fn best_unassigned_insertion(&mut self, solution: &WorkingSolution) -> Option<Move> {
        if !solution.has_unassigned() {
            return None;
        }

        let snapshot = (
            solution.routes().iter().map(|route| route.version()).collect(),
            solution.unassigned().len(),
        );
        if self.insertion_snapshot.as_ref() == Some(&snapshot) {
            return None;
        }

        let best = solution
            .unassigned()
            .iter()
            .filter_map(|&stop_id| self.unassigned_insertion(solution, stop_id))
            .filter(|(delta, _)| *delta < -COST_EPSILON)
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, mv)| mv);

        if best.is_none() {
            self.insertion_snapshot = Some(snapshot);
        }
        best
    }

    fn clear_stale(&mut self, solution: &WorkingSolution) {
        let versions: FxHashSet<u64> = solution.routes().iter().map(|route| route.version()).collect();
        self.cache
            .retain(|(v1, v2), _| versions.contains(v1) && versions.contains(v2));
    }
}

fn scan<O, F>(
    solution: &WorkingSolution,
    pair: RoutePair,
    wrap: fn(O) -> Move,
    admissible: &F,
    best: &mut Option<(f64, Move)>,
) where
    O: NeighborhoodOperator,
    F: Fn(&Move, f64) -> bool,
{
    O::generate_moves(solution, pair, |op| {
        let Some(delta) = op.delta_cost(solution) else {
            return;
        };
        if best.as_ref().is_some_and(|(best_delta, _)| delta >= *best_delta) {
            return;
        }

        let mv = wrap(op);
        if admissible(&mv, delta) {
            *best = Some((delta, mv));
        }
    });
}

/// Best admissible move between two routes (the same route for intra-route
/// operators).
fn best_pair_move<F>(solution: &WorkingSolution, pair: RoutePair, admissible: F) -> Option<(f64, Move)>
where
    F: Fn(&Move, f64) -> bool,
{
    let mut best = None;
    scan::<TwoOptOperator, _>(solution, pair, Move::TwoOpt, &admissible, &mut best);
    scan::<OrOptOperator, _>(solution, pair, Move::OrOpt, &admissible, &mut best);
    scan::<InterRelocateOperator, _>(solution, pair, Move::InterRelocate, &admissible, &mut best);
    scan::<InterSwapOperator, _>(solution, pair, Move::InterSwap, &admissible, &mut best);
    scan::<TwoOptStarOperator, _>(solution, pair, Move::TwoOptStar, &admissible, &mut best);
    best
}
