use jiff::SignedDuration;

use crate::{
    problem::planning_problem::PlanningProblem,
    solver::solution::route::{Route, RouteIdx},
};

use super::{
    constraint::{RouteConstraint, Violation, ViolationKind},
    constraint_set::ConstraintSet,
};

/// Shift end, vehicle driving limit and driver working limit.
#[derive(Clone, Copy)]
pub struct DriverHoursConstraint;

/// Time the resource can still add to the route before hitting its shift end
/// or, when enforced, its driving or working limit. Negative when a limit is
/// already exceeded.
pub fn driver_hours_remaining(
    problem: &PlanningProblem,
    constraints: &ConstraintSet,
    route: &Route,
) -> SignedDuration {
    let vehicle = problem.resource_vehicle(route.resource_id());
    let mut remaining = vehicle.shift().end.duration_since(route.end());

    if constraints.hard().enforce_driver_hours {
        if let Some(maximum) = vehicle.maximum_driving_duration() {
            remaining = remaining.min(maximum - route.driving());
        }

        if let Some(maximum) = problem.resource_driver(route.resource_id()).maximum_working_duration() {
            remaining = remaining.min(maximum - route.duration());
        }
    }

    remaining
}

impl RouteConstraint for DriverHoursConstraint {
    fn constraint_name(&self) -> &'static str {
        "driver_hours"
    }

    fn check_route(
        &self,
        problem: &PlanningProblem,
        constraints: &ConstraintSet,
        route: &Route,
        violations: &mut Vec<Violation>,
    ) {
        let route_id = RouteIdx::from(route.resource_id());
        let vehicle = problem.resource_vehicle(route.resource_id());
        let mut report = |kind| {
            violations.push(Violation {
                route_id,
                stop_id: None,
                kind,
            })
        };

        if route.end() > vehicle.shift().end {
            report(ViolationKind::ShiftEnd);
        }

        if !constraints.hard().enforce_driver_hours {
            return;
        }

        if let Some(maximum) = vehicle.maximum_driving_duration()
            && route.driving() > maximum
        {
            report(ViolationKind::DrivingDuration);
        }

        if let Some(maximum) = problem.resource_driver(route.resource_id()).maximum_working_duration()
            && route.duration() > maximum
        {
            report(ViolationKind::WorkingDuration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        problem::{capacity::Capacity, driver::DriverBuilder},
        test_utils::{self, TestRoute},
    };

    #[test]
    fn test_working_limit_reduces_remaining_hours() {
        let locations = test_utils::create_location_grid(4, 4);
        let vehicles = test_utils::create_basic_vehicles(1, Capacity::weight(10.0));
        let mut driver = DriverBuilder::default();
        driver
            .set_external_id("driver-0")
            .set_maximum_working_duration(SignedDuration::from_mins(20));
        let stops = test_utils::create_basic_stops(&locations, 4);
        let problem = test_utils::create_test_problem(locations, stops, vehicles, vec![driver.build()]);

        let solution = test_utils::create_test_working_solution(
            problem,
            vec![TestRoute {
                resource_id: 0,
                stop_ids: vec![0, 1, 2, 3],
            }],
        );
        let route = solution.route(RouteIdx::new(0));

        let remaining = driver_hours_remaining(solution.problem(), solution.constraints(), route);
        assert_eq!(remaining, SignedDuration::from_mins(20) - route.duration());

        let mut violations = Vec::new();
        DriverHoursConstraint.check_route(
            solution.problem(),
            solution.constraints(),
            route,
            &mut violations,
        );
        assert_eq!(
            violations.is_empty(),
            route.duration() <= SignedDuration::from_mins(20)
        );
    }
}
