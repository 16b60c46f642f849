use fxhash::FxHashSet;
use rand::{
    Rng, RngCore, SeedableRng,
    rngs::SmallRng,
    seq::{IndexedRandom, IteratorRandom},
};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::{
    problem::stop::StopIdx,
    solver::{
        constraints::constraint::{check_route, check_solution},
        insertion::{CheapestInsertion, InsertionOrder},
        solution::{route::RouteIdx, working_solution::WorkingSolution},
        solver_params::GeneticParams,
    },
};

use super::{
    improve_solution::{ImproveSolution, SearchContext},
    local_search::LocalSearch,
    termination::StopReason,
};

/// Local search moves applied to each child before it joins the population.
const CHILD_DESCENT_ITERATIONS: usize = 25;

/// Steady-state genetic search. Every generation breeds children in
/// parallel from binary-tournament parents (route-based crossover, then a
/// ruin-and-recreate mutation and a short descent), each child replacing
/// the worst member of the population when it beats it.
pub struct GeneticSearch {
    params: GeneticParams,
}

impl GeneticSearch {
    pub fn new(params: GeneticParams) -> Self {
        if params.population_size < 2 {
            panic!("GeneticSearch: population needs at least two members")
        }

        GeneticSearch { params }
    }

    fn initial_population(&self, seed: &WorkingSolution, rng: &mut SmallRng) -> Vec<WorkingSolution> {
        let mut population = vec![seed.clone()];
        while population.len() < self.params.population_size {
            let mut member = seed.clone();
            self.mutate(&mut member, rng);
            population.push(member);
        }

        sort_population(&mut population);
        population
    }

    fn select<'a>(&self, population: &'a [WorkingSolution], rng: &mut SmallRng) -> &'a WorkingSolution {
        let candidates = population.iter().choose_multiple(rng, 2);
        match candidates.as_slice() {
            [first, second] if second.cost().is_better_than(&first.cost()) => *second,
            [first, ..] => *first,
            [] => &population[0],
        }
    }

    /// Keeps a random half of the first parent's routes as they are and
    /// fills the other routes with the second parent's sequences, minus
    /// stops already placed. Stops that break a hard constraint in their new
    /// route are dropped, then every stop left out is reinserted cheapest
    /// first.
    fn crossover(
        &self,
        first: &WorkingSolution,
        second: &WorkingSolution,
        rng: &mut SmallRng,
    ) -> WorkingSolution {
        let inherited: FxHashSet<RouteIdx> = first
            .route_ids()
            .filter(|&route_id| !first.route(route_id).is_empty() && rng.random_bool(0.5))
            .collect();

        let placed: FxHashSet<StopIdx> = inherited
            .iter()
            .flat_map(|&route_id| first.route(route_id).stops().iter().copied())
            .collect();

        let sequences = first
            .route_ids()
            .map(|route_id| {
                let stops = if inherited.contains(&route_id) {
                    first.route(route_id).stops().to_vec()
                } else {
                    second
                        .route(route_id)
                        .stops()
                        .iter()
                        .copied()
                        .filter(|stop_id| !placed.contains(stop_id))
                        .collect()
                };
                (route_id, stops)
            })
            .collect();

        let mut child = WorkingSolution::from_sequences(
            first.problem_arc().clone(),
            first.constraints_arc().clone(),
            sequences,
        );
        drop_infeasible_stops(&mut child);
        CheapestInsertion::new(InsertionOrder::Random).insert_unassigned(&mut child, rng);
        child
    }

    /// Radial ruin around a random stop, then cheapest reinsertion in random
    /// order.
    fn mutate(&self, solution: &mut WorkingSolution, rng: &mut SmallRng) {
        let assigned = solution.problem().num_stops() - solution.unassigned().len();
        let to_remove = ((assigned as f64 * self.params.ruin_ratio).ceil() as usize).max(1);

        let Some(center) = solution
            .problem()
            .stop_ids()
            .filter(|&stop_id| !solution.is_unassigned(stop_id))
            .choose(rng)
        else {
            return;
        };

        let problem = solution.problem_arc().clone();
        let location = problem.location(problem.stop(center).location_id());
        let mut removed = 0;
        for stop_id in problem.stop_index().nearest(location) {
            if removed == to_remove {
                break;
            }

            if let Some((route_id, position)) = solution.locate(stop_id)
                && position >= solution.route(route_id).frozen()
            {
                solution.remove_stop(route_id, position);
                removed += 1;
            }
        }

        CheapestInsertion::new(InsertionOrder::Random).insert_unassigned(solution, rng);
    }

    fn breed(
        &self,
        first: &WorkingSolution,
        second: &WorkingSolution,
        seed: u64,
    ) -> WorkingSolution {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut child = self.crossover(first, second, &mut rng);
        if rng.random_bool(self.params.mutation_rate) {
            self.mutate(&mut child, &mut rng);
        }

        LocalSearch::new().descend(&mut child, CHILD_DESCENT_ITERATIONS);
        child
    }
}

/// Unassigns stops until every route satisfies the hard constraints. Blamed
/// stops go first, otherwise the last movable stop of the route.
fn drop_infeasible_stops(solution: &mut WorkingSolution) {
    for route_id in solution.route_ids() {
        loop {
            let route = solution.route(route_id);
            let violations = check_route(solution.problem(), solution.constraints(), route);
            let Some(violation) = violations.first() else {
                break;
            };

            let movable = route.frozen()..route.len();
            let position = violation
                .stop_id
                .and_then(|stop_id| route.stops().iter().position(|&other| other == stop_id))
                .filter(|position| movable.contains(position))
                .or_else(|| route.len().checked_sub(1).filter(|last| movable.contains(last)));

            match position {
                Some(position) => {
                    solution.remove_stop(route_id, position);
                }
                None => break,
            }
        }
    }
}

fn sort_population(population: &mut [WorkingSolution]) {
    population.sort_by(|a, b| a.cost().compare(&b.cost()));
}

impl ImproveSolution for GeneticSearch {
    #[instrument(skip_all, level = "debug")]
    fn improve(&self, solution: &mut WorkingSolution, context: &mut SearchContext) {
        let mut population = self.initial_population(solution, &mut context.rng);
        let mut since_best = 0;

        for generation in 0..self.params.max_generations {
            if context.should_stop() {
                break;
            }

            let parents: Vec<(&WorkingSolution, &WorkingSolution, u64)> = (0..self
                .params
                .offspring_per_generation)
                .map(|_| {
                    (
                        self.select(&population, &mut context.rng),
                        self.select(&population, &mut context.rng),
                        context.rng.next_u64(),
                    )
                })
                .collect();

            let children: Vec<WorkingSolution> = parents
                .into_par_iter()
                .map(|(first, second, seed)| self.breed(first, second, seed))
                .collect();

            let mut improved = false;
            for mut child in children {
                if !check_solution(&child).is_empty() {
                    debug!(generation, "Infeasible child discarded");
                    continue;
                }
                improved |= context.after_iteration(&mut child);

                let worst = population.len() - 1;
                let is_duplicate = population.iter().any(|member| member.is_identical(&child));
                if !is_duplicate && child.cost().is_better_than(&population[worst].cost()) {
                    population[worst] = child;
                    sort_population(&mut population);
                }
            }

            if improved {
                since_best = 0;
                debug!(generation, cost = context.incumbent.cost().total(), "New best solution");
            } else {
                since_best += 1;
            }

            if since_best >= self.params.plateau_generations {
                info!(generation, "Fitness plateau reached");
                context.termination.finish(StopReason::Plateau);
                break;
            }
        }

        context.termination.finish(StopReason::Exhausted);
        if let Some(best) = population.first()
            && best.cost().is_better_than(&solution.cost())
        {
            *solution = best.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, atomic::AtomicBool};

    use super::*;
    use crate::{
        problem::capacity::Capacity,
        solver::{
            constraints::constraint::ViolationKind,
            construction::construct_solution::ConstructionStrategy,
            search::termination::{Termination, TerminationState},
            solver_params::SolverParams,
        },
        test_utils::{self, TestRoute},
    };

    #[test]
    fn test_crossover_keeps_every_stop_once() {
        let problem = test_utils::create_default_problem(20, 3, Capacity::weight(10.0));
        let mut rng = SmallRng::seed_from_u64(5);
        let mut first = test_utils::create_test_working_solution(problem.clone(), vec![]);
        ConstructionStrategy::NearestNeighbor.construct(&mut first, &mut rng);
        let mut second = test_utils::create_test_working_solution(problem, vec![]);
        ConstructionStrategy::Savings.construct(&mut second, &mut rng);

        let genetic = GeneticSearch::new(GeneticParams::default());
        let child = genetic.crossover(&first, &second, &mut rng);

        let mut seen = FxHashSet::default();
        for route in child.routes() {
            for &stop_id in route.stops() {
                assert!(seen.insert(stop_id));
            }
        }
        assert_eq!(seen.len() + child.unassigned().len(), 20);
        assert!(child.cost().approx_eq(&child.evaluate(), 1e-6));
    }

    #[test]
    fn test_late_stop_is_dropped_from_child() {
        let problem = test_utils::create_tight_window_problem();
        let mut child = test_utils::create_test_working_solution(
            problem,
            vec![TestRoute {
                resource_id: 0,
                stop_ids: vec![0, 1],
            }],
        );
        assert!(
            check_solution(&child)
                .iter()
                .any(|violation| violation.kind == ViolationKind::Lateness)
        );

        drop_infeasible_stops(&mut child);

        assert!(check_solution(&child).is_empty());
        assert_eq!(child.route(RouteIdx::new(0)).stops(), &[StopIdx::new(0)]);
        assert!(child.is_unassigned(StopIdx::new(1)));
        assert!(child.cost().approx_eq(&child.evaluate(), 1e-6));
    }

    #[test]
    fn test_overloaded_child_route_is_trimmed() {
        let problem = test_utils::create_default_problem(6, 1, Capacity::weight(3.0));
        let mut child = test_utils::create_test_working_solution(
            problem,
            vec![TestRoute {
                resource_id: 0,
                stop_ids: vec![0, 1, 2, 3, 4, 5],
            }],
        );

        drop_infeasible_stops(&mut child);

        assert!(check_solution(&child).is_empty());
        assert_eq!(child.route(RouteIdx::new(0)).len(), 3);
        assert_eq!(child.unassigned().len(), 3);
    }

    #[test]
    fn test_genetic_search_never_worse_than_seed() {
        let problem = test_utils::create_default_problem(20, 3, Capacity::weight(10.0));
        let mut rng = SmallRng::seed_from_u64(9);
        let mut solution = test_utils::create_test_working_solution(problem, vec![]);
        ConstructionStrategy::ClusterFirst.construct(&mut solution, &mut rng);
        let seed_cost = solution.cost();

        let mut params = SolverParams::default();
        params.genetic.max_generations = 5;
        params.genetic.population_size = 4;
        params.genetic.offspring_per_generation = 4;
        let termination = TerminationState::new(
            vec![Termination::Iterations(1_000)],
            Arc::new(AtomicBool::new(false)),
        );
        let mut context = SearchContext::new(&params, rng, termination, &solution);

        GeneticSearch::new(params.genetic.clone()).improve(&mut solution, &mut context);

        assert!(!seed_cost.is_better_than(context.incumbent.cost()));
        assert!(!seed_cost.is_better_than(&solution.cost()));
        assert!(context.statistics.iterations > 0);
        assert!(check_solution(&solution).is_empty());
        assert!(check_solution(context.incumbent.solution()).is_empty());
    }
}
