use crate::{
    problem::{planning_problem::PlanningProblem, stop::StopIdx},
    solver::solution::route::{Route, RouteIdx},
};

use super::{
    constraint::{RouteConstraint, Violation, ViolationKind},
    constraint_set::ConstraintSet,
};

/// Deliveries only: the load leaving the depot is the largest load the
/// vehicle carries, so checking the route total covers every prefix.
#[derive(Clone, Copy)]
pub struct CapacityConstraint;

pub fn is_capacity_feasible(
    problem: &PlanningProblem,
    constraints: &ConstraintSet,
    route: &Route,
    stop_id: StopIdx,
) -> bool {
    let vehicle = problem.resource_vehicle(route.resource_id());
    let load = route.load() + problem.stop(stop_id).demand();
    load.fits_within(&constraints.capacity_limit(vehicle.capacity()))
}

impl RouteConstraint for CapacityConstraint {
    fn constraint_name(&self) -> &'static str {
        "capacity"
    }

    fn check_route(
        &self,
        problem: &PlanningProblem,
        constraints: &ConstraintSet,
        route: &Route,
        violations: &mut Vec<Violation>,
    ) {
        let vehicle = problem.resource_vehicle(route.resource_id());
        let limit = constraints.capacity_limit(vehicle.capacity());
        if route.load().fits_within(&limit) {
            return;
        }

        // Blame the last stop of the prefix that first exceeds the limit
        let mut load = route
            .anchor()
            .map(|anchor| anchor.committed_load)
            .unwrap_or_default();
        let offending = route.stops().iter().copied().find(|&stop_id| {
            load += problem.stop(stop_id).demand();
            !load.fits_within(&limit)
        });

        violations.push(Violation {
            route_id: RouteIdx::from(route.resource_id()),
            stop_id: offending,
            kind: ViolationKind::Capacity,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        problem::capacity::Capacity,
        solver::constraints::constraint_set::Relaxation,
        test_utils::{self, TestRoute},
    };

    #[test]
    fn test_is_capacity_feasible_respects_overage() {
        let problem = test_utils::create_default_problem(5, 1, Capacity::weight(4.0));
        let solution = test_utils::create_test_working_solution(
            problem,
            vec![TestRoute {
                resource_id: 0,
                stop_ids: vec![0, 1, 2, 3],
            }],
        );
        let route = solution.route(RouteIdx::new(0));

        assert!(!is_capacity_feasible(
            solution.problem(),
            solution.constraints(),
            route,
            StopIdx::new(4)
        ));

        let relaxed = solution.constraints().relaxed(Relaxation {
            capacity_overage_ratio: 0.25,
            ..Relaxation::default()
        });
        assert!(is_capacity_feasible(
            solution.problem(),
            &relaxed,
            route,
            StopIdx::new(4)
        ));
    }

    #[test]
    fn test_check_route_blames_first_overflowing_stop() {
        let problem = test_utils::create_default_problem(5, 1, Capacity::weight(3.0));
        let solution = test_utils::create_test_working_solution(
            problem,
            vec![TestRoute {
                resource_id: 0,
                stop_ids: vec![2, 0, 4, 1],
            }],
        );

        let mut violations = Vec::new();
        CapacityConstraint.check_route(
            solution.problem(),
            solution.constraints(),
            solution.route(RouteIdx::new(0)),
            &mut violations,
        );

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].stop_id, Some(StopIdx::new(1)));
    }
}
