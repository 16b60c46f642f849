use std::sync::Arc;

use courier_optimizer::{
    problem::{capacity::Capacity, location::Location, time_window::TimeWindow},
    solver::{
        constraints::constraint_set::ConstraintSet,
        construction::construct_solution::ConstructionStrategy,
        plan_result::PlanResult,
        search::termination::Termination,
        solution::working_solution::WorkingSolution,
        solver::Solver,
        validator::RelaxationStep,
    },
};
use rand::{SeedableRng, rngs::SmallRng};

mod test_utils;

#[test]
fn test_fleet_too_small_leaves_stops_unassigned() {
    let problem = test_utils::create_grid_problem(10, 1, Capacity::weight(8.0));
    let solver = Solver::new(problem, ConstraintSet::default(), test_utils::solver_params(3));

    let plan = solver.solve().unwrap();

    assert_eq!(plan.routes.len(), 1);
    assert_eq!(plan.routes[0].visits.len(), 8);
    assert_eq!(plan.unassigned.len(), 2);
    assert_eq!(plan.metrics.unassigned_count, 2);
    assert!(plan.routes[0].load.fits_within(&Capacity::weight(8.0)));
}

#[test]
fn test_unreachable_window_is_softened() {
    // Two hours of driving to a stop closing at 09:00, shift starts at 08:00
    let locations = vec![
        Location::from_cartesian(0.0, 0.0),
        Location::from_cartesian(120.0, 0.0),
        Location::from_cartesian(2.0, 0.0),
    ];
    let stops = test_utils::create_stops(2, |index, builder| {
        if index == 0 {
            builder.set_time_window(TimeWindow::between(
                test_utils::at(8, 0),
                test_utils::at(9, 0),
            ));
        }
    });
    let problem = test_utils::create_problem(
        locations,
        stops,
        test_utils::create_vehicles(1, Capacity::weight(10.0)),
        test_utils::create_drivers(1),
    );

    let plan = Solver::new(problem, ConstraintSet::default(), test_utils::solver_params(11))
        .solve()
        .unwrap();

    let late = plan
        .routes
        .iter()
        .flat_map(|route| route.visits.iter())
        .filter(|visit| visit.lateness.is_positive())
        .count();

    assert!(late >= 1);
    assert!(plan.unassigned.is_empty());
    assert!(plan.metrics.soft_violation_count >= 1);
    assert!(
        plan.validation
            .steps
            .iter()
            .any(|step| matches!(step, RelaxationStep::WidenLateness { .. }))
    );
    assert!(plan.validation.remaining_violations.is_empty());
}

#[test]
fn test_search_never_worsens_seed() {
    let seed = 17;
    let problem = test_utils::create_grid_problem(30, 3, Capacity::weight(12.0));

    let mut seed_solution = WorkingSolution::new(
        Arc::new(problem.clone()),
        Arc::new(ConstraintSet::default()),
    );
    ConstructionStrategy::for_stop_count(problem.num_stops())
        .construct(&mut seed_solution, &mut SmallRng::seed_from_u64(seed));

    let solver = Solver::new(problem, ConstraintSet::default(), test_utils::solver_params(seed));
    let plan = solver.solve().unwrap();

    assert!(plan.metrics.cost.total() <= seed_solution.cost().total() + 1e-6);
    assert!(
        plan.statistics
            .cost_evolution
            .windows(2)
            .all(|rows| rows[1].cost.total() <= rows[0].cost.total() + 1e-9)
    );
}

#[test]
fn test_final_solution_is_consistent() {
    let problem = test_utils::create_grid_problem(24, 3, Capacity::weight(9.0));
    let solver = Solver::new(problem, ConstraintSet::default(), test_utils::solver_params(5));

    let (plan, solution) = solver.solve_with_solution().unwrap();

    assert!(solution.cost().approx_eq(&solution.evaluate(), 1e-6));
    assert!(plan.unassigned.is_empty());

    let problem = solution.problem();
    for route in solution.routes() {
        let capacity = problem.resource_vehicle(route.resource_id()).capacity();
        let mut remaining = route.load();
        assert!(remaining.fits_within(capacity));
        for &stop_id in route.stops() {
            remaining = remaining - problem.stop(stop_id).demand();
            assert!(remaining.fits_within(capacity));
        }
    }
}

#[test]
fn test_same_seed_same_plan() {
    let plan = |seed| {
        let problem = test_utils::create_grid_problem(20, 2, Capacity::weight(12.0));
        let mut params = test_utils::solver_params(seed);
        params.terminations = vec![Termination::Iterations(300)];
        Solver::new(problem, ConstraintSet::default(), params)
            .solve()
            .unwrap()
    };

    let first = plan(42);
    let second = plan(42);

    let stops = |plan: &PlanResult| {
        plan.routes
            .iter()
            .map(|route| route.visits.iter().map(|visit| visit.stop_id.clone()).collect::<Vec<_>>())
            .collect::<Vec<_>>()
    };
    assert_eq!(stops(&first), stops(&second));
    assert_eq!(first.metrics.seed, 42);
}
