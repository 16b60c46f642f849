use jiff::SignedDuration;

use crate::{
    problem::{
        planning_problem::PlanningProblem,
        stop::{Stop, StopIdx},
    },
    solver::solution::route::{Route, RouteIdx},
    utils::time::minutes,
};

use super::{
    constraint::{RouteConstraint, Violation, ViolationKind},
    constraint_set::ConstraintSet,
};

#[derive(Clone, Copy)]
pub struct TimeWindowConstraint;

/// Soft penalty for arriving `lateness` after the window closed, weighted by
/// the stop priority.
#[inline]
pub fn lateness_penalty(constraints: &ConstraintSet, stop: &Stop, lateness: SignedDuration) -> f64 {
    if !lateness.is_positive() {
        return 0.0;
    }

    constraints.weights().lateness_per_minute * minutes(lateness) * stop.priority().weight()
}

/// Penalty `stop_id` would get if it were served at `position` of `route`,
/// ignoring the effect on the stops after it.
pub fn time_window_penalty(
    problem: &PlanningProblem,
    constraints: &ConstraintSet,
    route: &Route,
    stop_id: StopIdx,
    position: usize,
) -> f64 {
    let stop = problem.stop(stop_id);

    let (from, departure) = if position == 0 {
        match route.anchor() {
            Some(anchor) => (anchor.location_id, anchor.departure),
            None => {
                let vehicle = problem.resource_vehicle(route.resource_id());
                (vehicle.start_location_id(), vehicle.shift().start)
            }
        }
    } else {
        let previous = route.stop(position - 1);
        (
            problem.stop(previous).location_id(),
            route.visit(position - 1).departure,
        )
    };

    let arrival = departure + problem.travel(from, stop.location_id()).duration() + route.delay(stop_id);
    lateness_penalty(constraints, stop, stop.time_window().lateness(arrival))
}

impl RouteConstraint for TimeWindowConstraint {
    fn constraint_name(&self) -> &'static str {
        "time_window"
    }

    fn check_route(
        &self,
        _problem: &PlanningProblem,
        constraints: &ConstraintSet,
        route: &Route,
        violations: &mut Vec<Violation>,
    ) {
        let tolerance = constraints.lateness_tolerance();
        for (position, visit) in route.visits().iter().enumerate() {
            if visit.lateness > tolerance {
                violations.push(Violation {
                    route_id: RouteIdx::from(route.resource_id()),
                    stop_id: Some(route.stop(position)),
                    kind: ViolationKind::Lateness,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        problem::{location::LocationIdx, stop::{Priority, StopBuilder}},
        test_utils::{self, TestRoute},
    };

    #[test]
    fn test_lateness_penalty_is_weighted_by_priority() {
        let constraints = ConstraintSet::default();

        let mut builder = StopBuilder::default();
        builder
            .set_external_id("urgent")
            .set_location_id(LocationIdx::new(0))
            .set_priority(Priority::Urgent);
        let urgent = builder.build();

        let mut builder = StopBuilder::default();
        builder
            .set_external_id("normal")
            .set_location_id(LocationIdx::new(0));
        let normal = builder.build();

        let lateness = SignedDuration::from_mins(10);
        assert_eq!(lateness_penalty(&constraints, &normal, lateness), 20.0);
        assert_eq!(lateness_penalty(&constraints, &urgent, lateness), 60.0);
        assert_eq!(lateness_penalty(&constraints, &urgent, SignedDuration::ZERO), 0.0);
    }

    #[test]
    fn test_tight_window_reports_beyond_tolerance() {
        let problem = test_utils::create_tight_window_problem();
        let solution = test_utils::create_test_working_solution(
            problem,
            vec![TestRoute {
                resource_id: 0,
                stop_ids: vec![0, 1],
            }],
        );
        let route = solution.route(RouteIdx::new(0));

        assert!(time_window_penalty(solution.problem(), solution.constraints(), route, StopIdx::new(1), 1) > 0.0);
        assert_eq!(
            time_window_penalty(solution.problem(), solution.constraints(), route, StopIdx::new(0), 0),
            0.0
        );

        let mut violations = Vec::new();
        TimeWindowConstraint.check_route(
            solution.problem(),
            solution.constraints(),
            route,
            &mut violations,
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].stop_id, Some(StopIdx::new(1)));
    }
}
