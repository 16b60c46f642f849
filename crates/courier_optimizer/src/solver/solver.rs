use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use jiff::Timestamp;
use parking_lot::RwLock;
use rand::{SeedableRng, rngs::SmallRng};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    error::{EngineError, InfeasibleInput},
    problem::planning_problem::PlanningProblem,
    timer_debug,
};

use super::{
    constraints::constraint_set::ConstraintSet,
    construction::construct_solution::ConstructionStrategy,
    plan_result::{PlanResult, PlanSummary},
    search::{
        improve_solution::{SearchContext, SearchStrategy},
        termination::TerminationState,
    },
    solution::working_solution::WorkingSolution,
    solver_params::SolverParams,
    validator::Validator,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub enum SolverStatus {
    Pending,
    Running,
    Completed,
}

/// One planning run: construction, metaheuristic search, validation.
///
/// The run is single-threaded apart from move evaluation, which uses a
/// dedicated rayon pool sized by `SolverParams::local_search_threads`.
pub struct Solver {
    problem: Arc<PlanningProblem>,
    constraints: Arc<ConstraintSet>,
    params: SolverParams,
    status: RwLock<SolverStatus>,
    cancelled: Arc<AtomicBool>,
    created_at: Timestamp,
}

impl Solver {
    pub fn new(problem: PlanningProblem, constraints: ConstraintSet, params: SolverParams) -> Self {
        Solver {
            problem: Arc::new(problem),
            constraints: Arc::new(constraints),
            params,
            status: RwLock::new(SolverStatus::Pending),
            cancelled: Arc::new(AtomicBool::new(false)),
            created_at: Timestamp::now(),
        }
    }

    pub fn problem(&self) -> &Arc<PlanningProblem> {
        &self.problem
    }

    pub fn status(&self) -> SolverStatus {
        *self.status.read()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Asks a running search to stop at its next outer iteration. The plan
    /// is still validated and returned, flagged as not converged.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn solve(&self) -> Result<PlanResult, EngineError> {
        self.solve_with_solution().map(|(result, _)| result)
    }

    /// Like `solve`, also returning the validated solution the dispatch
    /// controller starts from.
    pub fn solve_with_solution(&self) -> Result<(PlanResult, WorkingSolution), EngineError> {
        check_input(&self.problem, &self.constraints)?;

        *self.status.write() = SolverStatus::Running;
        let threads = self.params.local_search_threads.number_of_threads();
        let result = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| self.run()),
            Err(error) => {
                warn!("Could not build the evaluation pool ({error}), using the global one");
                self.run()
            }
        };
        *self.status.write() = SolverStatus::Completed;

        Ok(result)
    }

    #[instrument(skip_all, fields(depot = self.problem.depot_id(), stops = self.problem.num_stops()))]
    fn run(&self) -> (PlanResult, WorkingSolution) {
        let started_at = Timestamp::now();
        let seed = self
            .params
            .seed
            .unwrap_or_else(|| Timestamp::now().as_nanosecond() as u64);
        let mut rng = SmallRng::seed_from_u64(seed);

        let num_stops = self.problem.num_stops();
        let construction = self
            .params
            .construction
            .unwrap_or_else(|| ConstructionStrategy::for_stop_count(num_stops));
        let search = self
            .params
            .search
            .unwrap_or_else(|| SearchStrategy::select(num_stops, self.params.time_budget()));
        info!(seed, %construction, %search, "Start planning run");

        let mut solution = WorkingSolution::new(
            Arc::clone(&self.problem),
            Arc::clone(&self.constraints),
        );
        construction.construct(&mut solution, &mut rng);
        let construction_duration = Timestamp::now().duration_since(started_at);

        let termination =
            TerminationState::new(self.params.terminations.clone(), self.cancellation_flag());
        let mut context = SearchContext::new(&self.params, rng, termination, &solution);
        timer_debug!("Search", {
            search.improve(&mut solution, &mut context);
        });

        let SearchContext {
            termination,
            mut statistics,
            incumbent,
            ..
        } = context;
        statistics.construction_duration = construction_duration;
        statistics.search_duration = termination.elapsed();

        let mut best = incumbent.into_solution();
        let drift = best.resync();
        statistics.record_resync(drift);

        let validation_started_at = Timestamp::now();
        let validation = Validator::new(self.params.validator.clone()).validate(&mut best);
        statistics.validation_duration = Timestamp::now().duration_since(validation_started_at);

        let degraded_routes = best.routes().iter().filter(|route| route.is_degraded()).count();
        if degraded_routes > 0 {
            warn!(
                degraded_routes,
                estimated_legs = best.estimated_legs(),
                "Plan uses estimated travel costs"
            );
        }

        let summary = PlanSummary {
            seed,
            construction_strategy: construction,
            search_strategy: search,
            stop_reason: termination.reason(),
            converged: termination.converged(),
            elapsed: Timestamp::now().duration_since(started_at),
        };

        info!(
            cost = best.cost().total(),
            unassigned = best.unassigned().len(),
            iterations = statistics.iterations,
            converged = summary.converged,
            "Planning run done"
        );

        (PlanResult::new(&best, summary, validation, statistics), best)
    }
}

/// Rejects inputs no plan can serve: a positive demand without any fleet
/// capacity, a stop no resource may serve, a stop heavier than every vehicle
/// allowed to carry it. A fleet merely too small for every stop is not an
/// error, the run returns a partial plan.
pub fn check_input(problem: &PlanningProblem, constraints: &ConstraintSet) -> Result<(), InfeasibleInput> {
    let total_demand = problem.total_demand();
    let total_capacity = problem.total_fleet_capacity();

    if problem.num_stops() > 0 && (problem.resources().is_empty() || total_capacity.is_empty()) {
        return Err(InfeasibleInput::NoFleet(total_demand));
    }

    let enforce_zones = constraints.hard().enforce_zones;
    for stop_id in problem.stop_ids() {
        let stop = problem.stop(stop_id);
        let mut eligible = problem.eligible_resources(stop_id, enforce_zones).peekable();
        if eligible.peek().is_none() {
            return Err(InfeasibleInput::NoEligibleResource {
                stop_id: stop.external_id().to_owned(),
            });
        }

        let fits = eligible.any(|resource_id| {
            let vehicle = problem.resource_vehicle(resource_id);
            stop.demand()
                .fits_within(&constraints.capacity_limit(vehicle.capacity()))
        });
        if !fits {
            return Err(InfeasibleInput::DemandExceedsCapacity {
                stop_id: stop.external_id().to_owned(),
            });
        }
    }

    if !total_demand.fits_within(&total_capacity) {
        warn!(
            ?total_demand,
            ?total_capacity,
            "Demand exceeds fleet capacity, some stops will stay unassigned"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use fxhash::FxHashSet;

    use super::*;
    use crate::{
        problem::{
            capacity::Capacity, location::LocationIdx, skill::Skill, stop::StopBuilder,
        },
        solver::search::termination::Termination,
        test_utils,
    };

    fn params() -> SolverParams {
        SolverParams {
            seed: Some(7),
            terminations: vec![Termination::Iterations(500)],
            ..SolverParams::default()
        }
    }

    #[test]
    fn test_solve_small_instance() {
        let problem = test_utils::create_default_problem(12, 2, Capacity::weight(10.0));
        let solver = Solver::new(problem, ConstraintSet::default(), params());

        let result = solver.solve().unwrap();

        assert_eq!(solver.status(), SolverStatus::Completed);
        assert_eq!(result.metrics.seed, 7);
        assert_eq!(result.metrics.search_strategy, SearchStrategy::HillClimbing);
        assert_eq!(
            result.metrics.construction_strategy,
            ConstructionStrategy::NearestNeighbor
        );
        assert!(result.unassigned.is_empty());
        assert!(result.converged);
        assert!(!result.degraded);
        assert_eq!(
            result.routes.iter().map(|route| route.visits.len()).sum::<usize>(),
            12
        );
    }

    #[test]
    fn test_undersized_fleet_gives_partial_plan() {
        let problem = test_utils::create_default_problem(10, 1, Capacity::weight(8.0));
        let solver = Solver::new(problem, ConstraintSet::default(), params());

        let result = solver.solve().unwrap();

        assert_eq!(result.unassigned.len(), 2);
        assert_eq!(result.routes[0].visits.len(), 8);
    }

    #[test]
    fn test_tight_window_ends_late_not_unassigned() {
        let solver = Solver::new(
            test_utils::create_tight_window_problem(),
            ConstraintSet::default(),
            SolverParams {
                seed: Some(1),
                ..params()
            },
        );

        let result = solver.solve().unwrap();

        let late = result
            .routes
            .iter()
            .flat_map(|route| &route.visits)
            .filter(|visit| visit.lateness.is_positive())
            .count();
        assert!(late >= 1);
        assert!(result.unassigned.is_empty());
        assert!(result.metrics.soft_violation_count >= 1);
        assert!(result.validation.is_relaxed());
    }

    #[test]
    fn test_zero_capacity_fleet_is_infeasible() {
        let problem = test_utils::create_default_problem(3, 2, Capacity::default());
        let solver = Solver::new(problem, ConstraintSet::default(), params());

        assert!(matches!(
            solver.solve(),
            Err(EngineError::InfeasibleInput(InfeasibleInput::NoFleet(_)))
        ));
        assert_eq!(solver.status(), SolverStatus::Pending);
    }

    #[test]
    fn test_stop_without_eligible_resource_is_infeasible() {
        let locations = test_utils::create_location_grid(2, 2);
        let mut stops = test_utils::create_basic_stops(&locations, 2);
        let mut certified = StopBuilder::default();
        certified
            .set_external_id("certified")
            .set_location_id(LocationIdx::new(3))
            .set_demand(Capacity::weight(1.0))
            .set_required_skills(FxHashSet::from_iter([Skill::new("adr")]));
        stops.push(certified.build());

        let problem = test_utils::create_test_problem(
            locations,
            stops,
            test_utils::create_basic_vehicles(1, Capacity::weight(10.0)),
            test_utils::create_basic_drivers(1),
        );

        let error = check_input(&problem, &ConstraintSet::default()).unwrap_err();
        assert_eq!(
            error,
            InfeasibleInput::NoEligibleResource {
                stop_id: String::from("certified")
            }
        );
    }

    #[test]
    fn test_oversized_stop_is_infeasible() {
        let locations = test_utils::create_location_grid(2, 2);
        let mut stops = test_utils::create_basic_stops(&locations, 1);
        let mut heavy = StopBuilder::default();
        heavy
            .set_external_id("heavy")
            .set_location_id(LocationIdx::new(2))
            .set_demand(Capacity::weight(50.0));
        stops.push(heavy.build());

        let problem = test_utils::create_test_problem(
            locations,
            stops,
            test_utils::create_basic_vehicles(2, Capacity::weight(10.0)),
            test_utils::create_basic_drivers(2),
        );

        assert!(matches!(
            check_input(&problem, &ConstraintSet::default()),
            Err(InfeasibleInput::DemandExceedsCapacity { .. })
        ));
    }
}
