use tracing::{info, instrument};

use crate::solver::solution::working_solution::WorkingSolution;

use super::{
    improve_solution::{ImproveSolution, SearchContext},
    local_search::LocalSearch,
    termination::StopReason,
};

/// Best-improvement descent, stops at the first local optimum.
pub struct HillClimbing {
    max_iterations: usize,
}

impl HillClimbing {
    pub fn new(max_iterations: usize) -> Self {
        HillClimbing { max_iterations }
    }
}

impl ImproveSolution for HillClimbing {
    #[instrument(skip_all, level = "debug")]
    fn improve(&self, solution: &mut WorkingSolution, context: &mut SearchContext) {
        let mut local_search = LocalSearch::new();
        let mut moves = 0;

        while !context.should_stop() {
            if moves >= self.max_iterations {
                context.termination.finish(StopReason::Iterations);
                break;
            }

            let Some(mv) = local_search.step(solution) else {
                info!(moves, "Hill climbing reached a local optimum");
                context.termination.finish(StopReason::Exhausted);
                break;
            };

            moves += 1;
            context.record_move(&mv);
            context.after_iteration(solution);
        }
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
    fn test_hill_climbing_reaches_local_optimum() {
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

        HillClimbing::new(10_000).improve(&mut solution, &mut context);

        assert_eq!(context.termination.reason(), Some(StopReason::Exhausted));
        assert!(context.incumbent.cost().is_better_than(&seed_cost));
        assert!(solution.cost().approx_eq(context.incumbent.cost(), 1e-6));
        assert!(context.statistics.accepted_moves > 0);
    }
}
