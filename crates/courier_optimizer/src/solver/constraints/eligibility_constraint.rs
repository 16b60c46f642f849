use crate::{
    problem::{planning_problem::PlanningProblem, resource::ResourceIdx, stop::StopIdx},
    solver::solution::route::{Route, RouteIdx},
};

use super::{
    constraint::{RouteConstraint, Violation, ViolationKind},
    constraint_set::ConstraintSet,
};

#[derive(Clone, Copy)]
pub struct EligibilityConstraint;

/// Product, vehicle class, driver skills and, unless disabled, zone.
#[inline]
pub fn is_eligible(
    problem: &PlanningProblem,
    constraints: &ConstraintSet,
    resource_id: ResourceIdx,
    stop_id: StopIdx,
) -> bool {
    problem.is_eligible(resource_id, stop_id, constraints.hard().enforce_zones)
}

impl RouteConstraint for EligibilityConstraint {
    fn constraint_name(&self) -> &'static str {
        "eligibility"
    }

    fn check_route(
        &self,
        problem: &PlanningProblem,
        constraints: &ConstraintSet,
        route: &Route,
        violations: &mut Vec<Violation>,
    ) {
        // Confirmed-but-frozen stops were eligible when dispatched
        for &stop_id in &route.stops()[route.frozen()..] {
            if !is_eligible(problem, constraints, route.resource_id(), stop_id) {
                violations.push(Violation {
                    route_id: RouteIdx::from(route.resource_id()),
                    stop_id: Some(stop_id),
                    kind: ViolationKind::Ineligible,
                });
            }
        }
    }
}
