use serde::Serialize;

use crate::{
    problem::{planning_problem::PlanningProblem, stop::StopIdx},
    solver::solution::{
        route::{Route, RouteIdx},
        working_solution::WorkingSolution,
    },
};

use super::{
    capacity_constraint::CapacityConstraint, constraint_set::ConstraintSet,
    driver_hours_constraint::DriverHoursConstraint, eligibility_constraint::EligibilityConstraint,
    time_window_constraint::TimeWindowConstraint,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Capacity,
    Lateness,
    ShiftEnd,
    DrivingDuration,
    WorkingDuration,
    Ineligible,
}

/// A hard constraint broken by a route. `stop_id` points at the offending
/// stop when the violation can be blamed on one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub route_id: RouteIdx,
    pub stop_id: Option<StopIdx>,
    pub kind: ViolationKind,
}

pub trait RouteConstraint {
    fn constraint_name(&self) -> &'static str;

    fn check_route(
        &self,
        problem: &PlanningProblem,
        constraints: &ConstraintSet,
        route: &Route,
        violations: &mut Vec<Violation>,
    );
}

#[derive(Clone, Copy)]
pub enum Constraint {
    Capacity(CapacityConstraint),
    TimeWindow(TimeWindowConstraint),
    Eligibility(EligibilityConstraint),
    DriverHours(DriverHoursConstraint),
}

impl Constraint {
    pub const ALL: [Constraint; 4] = [
        Constraint::Capacity(CapacityConstraint),
        Constraint::TimeWindow(TimeWindowConstraint),
        Constraint::Eligibility(EligibilityConstraint),
        Constraint::DriverHours(DriverHoursConstraint),
    ];

    pub fn constraint_name(&self) -> &'static str {
        match self {
            Constraint::Capacity(c) => c.constraint_name(),
            Constraint::TimeWindow(c) => c.constraint_name(),
            Constraint::Eligibility(c) => c.constraint_name(),
            Constraint::DriverHours(c) => c.constraint_name(),
        }
    }

    pub fn check_route(
        &self,
        problem: &PlanningProblem,
        constraints: &ConstraintSet,
        route: &Route,
        violations: &mut Vec<Violation>,
    ) {
        match self {
            Constraint::Capacity(c) => c.check_route(problem, constraints, route, violations),
            Constraint::TimeWindow(c) => c.check_route(problem, constraints, route, violations),
            Constraint::Eligibility(c) => c.check_route(problem, constraints, route, violations),
            Constraint::DriverHours(c) => c.check_route(problem, constraints, route, violations),
        }
    }
}

pub fn check_route(
    problem: &PlanningProblem,
    constraints: &ConstraintSet,
    route: &Route,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    if route.is_idle() {
        return violations;
    }

    for constraint in &Constraint::ALL {
        constraint.check_route(problem, constraints, route, &mut violations);
    }

    violations
}

/// Every hard constraint broken in the solution under its current
/// constraint set.
pub fn check_solution(solution: &WorkingSolution) -> Vec<Violation> {
    solution
        .routes()
        .iter()
        .flat_map(|route| check_route(solution.problem(), solution.constraints(), route))
        .collect()
}
