use rand::Rng;
use tracing::{debug, info, instrument};

use crate::{
    solver::{solution::working_solution::WorkingSolution, solver_params::AnnealingParams},
    utils::stats::mean,
};

use super::{
    improve_solution::{ImproveSolution, SearchContext},
    neighborhood::random_move,
    termination::StopReason,
};

const TEMPERATURE_SAMPLES: usize = 100;

/// Random neighbor moves accepted by the Metropolis criterion under a
/// geometric cooling schedule.
///
/// After `reheat_after` iterations without a new best solution, the search
/// restarts from the best solution with a higher temperature, at most
/// `max_reheats` times.
pub struct SimulatedAnnealing {
    params: AnnealingParams,
}

impl SimulatedAnnealing {
    pub fn new(params: AnnealingParams) -> Self {
        if !(0.0..1.0).contains(&params.cooling_rate) {
            panic!("SimulatedAnnealing: cooling rate must be in [0, 1)")
        }

        SimulatedAnnealing { params }
    }

    /// Temperature at which an average worsening move is accepted half of the
    /// time.
    fn initial_temperature(&self, solution: &WorkingSolution, context: &mut SearchContext) -> f64 {
        if let Some(temperature) = self.params.initial_temperature {
            return temperature;
        }

        let worsening: Vec<f64> = (0..TEMPERATURE_SAMPLES)
            .filter_map(|_| random_move(solution, &mut context.rng))
            .filter_map(|mv| mv.delta_cost(solution))
            .filter(|&delta| delta > 0.0)
            .collect();

        if worsening.is_empty() {
            1.0
        } else {
            mean(worsening.iter().copied()) / std::f64::consts::LN_2
        }
    }
}

impl ImproveSolution for SimulatedAnnealing {
    #[instrument(skip_all, level = "debug")]
    fn improve(&self, solution: &mut WorkingSolution, context: &mut SearchContext) {
        let initial_temperature = self.initial_temperature(solution, context);
        let mut temperature = initial_temperature;
        let mut since_best = 0;
        let mut reheats = 0;
        info!(initial_temperature, "Start simulated annealing");

        'search: loop {
            for _ in 0..self.params.iterations_per_temperature {
                if context.should_stop() {
                    break 'search;
                }

                if let Some(mv) = random_move(solution, &mut context.rng)
                    && let Some(delta) = mv.delta_cost(solution)
                    && (delta <= 0.0
                        || context.rng.random::<f64>() < (-delta / temperature).exp())
                {
                    let _ = mv.apply(solution);
                    context.record_move(&mv);
                }

                if context.after_iteration(solution) {
                    since_best = 0;
                } else {
                    since_best += 1;
                }

                if since_best >= self.params.reheat_after && reheats < self.params.max_reheats {
                    reheats += 1;
                    since_best = 0;
                    *solution = context.incumbent.solution().clone();
                    temperature = temperature.max(initial_temperature / (reheats + 1) as f64);
                    debug!(reheats, temperature, "Reheat from best solution");
                }
            }

            temperature *= self.params.cooling_rate;
            if temperature < self.params.min_temperature {
                info!(temperature, "Temperature floor reached");
                context.termination.finish(StopReason::Exhausted);
                break;
            }
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
    fn test_annealing_never_loses_seed() {
        let problem = test_utils::create_default_problem(16, 3, Capacity::weight(10.0));
        let mut solution = test_utils::create_test_working_solution(
            problem,
            vec![
                TestRoute {
                    resource_id: 0,
                    stop_ids: vec![15, 0, 9, 4, 12],
                },
                TestRoute {
                    resource_id: 1,
                    stop_ids: vec![1, 14, 7, 10, 3],
                },
                TestRoute {
                    resource_id: 2,
                    stop_ids: vec![6, 2, 13, 5, 11, 8],
                },
            ],
        );
        let seed_cost = solution.cost();

        let mut params = SolverParams::default();
        params.annealing.cooling_rate = 0.8;
        params.annealing.iterations_per_temperature = 50;
        let termination = TerminationState::new(
            vec![Termination::Iterations(5_000)],
            Arc::new(AtomicBool::new(false)),
        );
        let mut context =
            SearchContext::new(&params, SmallRng::seed_from_u64(11), termination, &solution);

        SimulatedAnnealing::new(params.annealing.clone()).improve(&mut solution, &mut context);

        assert!(context.termination.reason().is_some());
        assert!(!seed_cost.is_better_than(context.incumbent.cost()));
        assert!(context.incumbent.cost().is_better_than(&seed_cost));

        let best = context.incumbent.solution();
        assert!(best.cost().approx_eq(&best.evaluate(), 1e-6));
    }
}
