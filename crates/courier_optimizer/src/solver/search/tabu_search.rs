use fxhash::FxHashMap;
use tracing::{info, instrument};

use crate::{
    problem::stop::StopIdx,
    solver::{
        cost::COST_EPSILON, moves::r#move::Move, solution::working_solution::WorkingSolution,
        solver_params::TabuParams,
    },
};

use super::{
    improve_solution::{ImproveSolution, SearchContext},
    local_search::LocalSearch,
    termination::StopReason,
};

/// Applies the best non-tabu move of the neighborhood at every iteration,
/// worsening moves included. Stops moved by a move stay tabu for `tenure`
/// iterations unless moving them again beats the best solution.
pub struct TabuSearch {
    params: TabuParams,
}

impl TabuSearch {
    pub fn new(params: TabuParams) -> Self {
        if params.tenure == 0 {
            panic!("TabuSearch: tenure must be positive")
        }

        TabuSearch { params }
    }
}

impl ImproveSolution for TabuSearch {
    #[instrument(skip_all, level = "debug")]
    fn improve(&self, solution: &mut WorkingSolution, context: &mut SearchContext) {
        let local_search = LocalSearch::new();
        // Iteration until which each stop is tabu
        let mut tabu: FxHashMap<StopIdx, usize> = FxHashMap::default();

        for iteration in 0..self.params.max_iterations {
            if context.should_stop() {
                return;
            }

            let best_total = context.incumbent.cost().total();
            let current_total = solution.cost().total();
            let admissible = |mv: &Move, delta: f64| {
                let is_tabu = mv
                    .moved_stops(solution)
                    .iter()
                    .any(|stop_id| tabu.get(stop_id).is_some_and(|&until| until > iteration));

                !is_tabu || current_total + delta < best_total - COST_EPSILON
            };

            let Some((_, mv)) = local_search.best_admissible_move(solution, admissible) else {
                info!(iteration, "No admissible move left");
                context.termination.finish(StopReason::Exhausted);
                return;
            };

            for stop_id in mv.moved_stops(solution) {
                tabu.insert(stop_id, iteration + self.params.tenure);
            }
            let _ = mv.apply(solution);
            context.record_move(&mv);
            context.after_iteration(solution);
        }

        context.termination.finish(StopReason::Iterations);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, atomic::AtomicBool};

    use rand::{SeedableRng, rngs::SmallRng};

    use super::*;
    use crate::{
        problem::capacity::Capacity,
        solver::{
            search::termination::{Termination, TerminationState},
            solver_params::SolverParams,
        },
        test_utils::{self, TestRoute},
    };

    #[test]
    fn test_tabu_search_keeps_best_solution() {
        let problem = test_utils::create_default_problem(9, 2, Capacity::weight(10.0));
        let mut solution = test_utils::create_test_working_solution(
            problem,
            vec![
                TestRoute {
                    resource_id: 0,
                    stop_ids: vec![8, 0, 6, 2],
                },
                TestRoute {
                    resource_id: 1,
                    stop_ids: vec![1, 7, 3, 5, 4],
                },
            ],
        );
        let seed_cost = solution.cost();

        let params = SolverParams::default();
        let termination = TerminationState::new(
            vec![Termination::Iterations(10_000)],
            Arc::new(AtomicBool::new(false)),
        );
        let mut context =
            SearchContext::new(&params, SmallRng::seed_from_u64(0), termination, &solution);

        TabuSearch::new(TabuParams {
            tenure: 5,
            max_iterations: 60,
        })
        .improve(&mut solution, &mut context);

        assert!(context.termination.reason().is_some());
        assert!(context.incumbent.cost().is_better_than(&seed_cost));
        assert!(!solution.cost().is_better_than(context.incumbent.cost()));
        assert!(context.statistics.iterations <= 60);
    }
}
