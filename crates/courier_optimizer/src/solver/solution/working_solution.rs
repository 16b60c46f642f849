use std::{collections::BTreeSet, sync::Arc};

use jiff::Timestamp;

use crate::{
    problem::{planning_problem::PlanningProblem, resource::ResourceIdx, stop::StopIdx},
    solver::{constraints::constraint_set::ConstraintSet, cost::SolutionCost},
    utils::{enumerate_idx::EnumerateIdx, stats::variance, time::hours},
};

use super::route::{Route, RouteIdx};

/// Routes (one per resource, same index) and the stops nobody serves.
///
/// The sum of route costs and the unassigned penalty are maintained
/// incrementally by the mutators; `evaluate` recomputes them from scratch.
#[derive(Clone)]
pub struct WorkingSolution {
    problem: Arc<PlanningProblem>,
    constraints: Arc<ConstraintSet>,
    routes: Vec<Route>,
    unassigned: BTreeSet<StopIdx>,
    routes_cost: f64,
    unassigned_penalty: f64,
}

impl WorkingSolution {
    pub fn new(problem: Arc<PlanningProblem>, constraints: Arc<ConstraintSet>) -> Self {
        let routes = problem
            .resources()
            .iter()
            .enumerate_idx()
            .map(|(resource_id, _)| Route::empty(&problem, resource_id))
            .collect();
        let unassigned: BTreeSet<StopIdx> = problem.stop_ids().collect();

        let mut solution = WorkingSolution {
            problem,
            constraints,
            routes,
            unassigned,
            routes_cost: 0.0,
            unassigned_penalty: 0.0,
        };
        solution.resync();
        solution
    }

    /// Builds a solution from one stop sequence per resource. Stops missing
    /// from every sequence are unassigned. Feasibility is not checked.
    pub fn from_sequences(
        problem: Arc<PlanningProblem>,
        constraints: Arc<ConstraintSet>,
        sequences: Vec<(RouteIdx, Vec<StopIdx>)>,
    ) -> Self {
        let mut solution = WorkingSolution::new(problem, constraints);
        for (route_id, stops) in sequences {
            for stop_id in &stops {
                solution.unassigned.remove(stop_id);
            }
            solution.routes[route_id].replace(
                &solution.problem,
                &solution.constraints,
                &stops,
                0,
                0,
            );
        }
        solution.resync();
        solution
    }

    pub fn problem(&self) -> &PlanningProblem {
        &self.problem
    }

    pub fn problem_arc(&self) -> &Arc<PlanningProblem> {
        &self.problem
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn constraints_arc(&self) -> &Arc<ConstraintSet> {
        &self.constraints
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route(&self, route_id: RouteIdx) -> &Route {
        &self.routes[route_id]
    }

    pub fn route_ids(&self) -> impl Iterator<Item = RouteIdx> + use<> {
        RouteIdx::all(self.routes.len())
    }

    pub fn non_empty_routes_iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|route| !route.is_empty())
    }

    pub fn route_of_resource(&self, resource_id: ResourceIdx) -> &Route {
        &self.routes[RouteIdx::from(resource_id)]
    }

    pub fn unassigned(&self) -> &BTreeSet<StopIdx> {
        &self.unassigned
    }

    pub fn is_unassigned(&self, stop_id: StopIdx) -> bool {
        self.unassigned.contains(&stop_id)
    }

    pub fn has_unassigned(&self) -> bool {
        !self.unassigned.is_empty()
    }

    /// Route and position currently serving `stop_id`.
    pub fn locate(&self, stop_id: StopIdx) -> Option<(RouteIdx, usize)> {
        self.routes
            .iter()
            .enumerate_idx()
            .find_map(|(route_id, route): (RouteIdx, &Route)| {
                route.position_of(stop_id).map(|position| (route_id, position))
            })
    }

    pub fn unassigned_stop_penalty(&self, stop_id: StopIdx) -> f64 {
        self.constraints.weights().unassigned_stop * self.problem.stop(stop_id).priority().weight()
    }

    pub fn total_distance(&self) -> f64 {
        self.routes.iter().map(|route| route.distance()).sum()
    }

    pub fn soft_violations(&self) -> usize {
        self.routes.iter().map(|route| route.soft_violations()).sum()
    }

    pub fn estimated_legs(&self) -> usize {
        self.routes.iter().map(|route| route.estimated_legs()).sum()
    }

    pub fn cost(&self) -> SolutionCost {
        SolutionCost {
            routes: self.routes_cost,
            unassigned_penalty: self.unassigned_penalty,
            unassigned: self.unassigned.len(),
            soft_penalty: self.routes.iter().map(|route| route.lateness_penalty()).sum(),
            workload_variance: self.workload_variance(),
        }
    }

    fn workload_variance(&self) -> f64 {
        variance(
            self.routes
                .iter()
                .filter(|route| !route.is_idle())
                .map(|route| hours(route.duration())),
        )
    }

    /// Ground truth: every route re-simulated, nothing read from caches.
    pub fn evaluate(&self) -> SolutionCost {
        let mut routes = 0.0;
        let mut soft_penalty = 0.0;
        for route in &self.routes {
            let mut route = route.clone();
            route.update(&self.problem, &self.constraints);
            routes += route.cost();
            soft_penalty += route.lateness_penalty();
        }

        SolutionCost {
            routes,
            unassigned_penalty: self.compute_unassigned_penalty(),
            unassigned: self.unassigned.len(),
            soft_penalty,
            workload_variance: self.workload_variance(),
        }
    }

    fn compute_unassigned_penalty(&self) -> f64 {
        self.unassigned
            .iter()
            .map(|&stop_id| self.unassigned_stop_penalty(stop_id))
            .sum()
    }

    /// Recomputes every route and the running sums. Returns the drift that
    /// had accumulated in the running total.
    pub fn resync(&mut self) -> f64 {
        let before = self.routes_cost + self.unassigned_penalty;

        for route in &mut self.routes {
            route.update(&self.problem, &self.constraints);
        }
        self.routes_cost = self.routes.iter().map(|route| route.cost()).sum();
        self.unassigned_penalty = self.compute_unassigned_penalty();

        (self.routes_cost + self.unassigned_penalty - before).abs()
    }

    pub(crate) fn set_constraints(&mut self, constraints: Arc<ConstraintSet>) {
        self.constraints = constraints;
        self.resync();
    }

    /// Switches to a problem that extends the current one. Stops it adds are
    /// unassigned.
    pub(crate) fn rebind_problem(&mut self, problem: Arc<PlanningProblem>) {
        let previous = self.problem.num_stops();
        debug_assert!(problem.num_stops() >= previous);

        self.unassigned
            .extend((previous..problem.num_stops()).map(StopIdx::new));
        self.problem = problem;
        self.resync();
    }

    /// Rewrites `stops[start..end]` of a route. Stops only move between
    /// routes, the unassigned bucket is untouched.
    pub(crate) fn replace_segment(
        &mut self,
        route_id: RouteIdx,
        replacement: &[StopIdx],
        start: usize,
        end: usize,
    ) -> Vec<StopIdx> {
        let route = &mut self.routes[route_id];
        let previous_cost = route.cost();
        let removed = route.replace(&self.problem, &self.constraints, replacement, start, end);
        self.routes_cost += route.cost() - previous_cost;
        removed
    }

    pub(crate) fn insert_stop(&mut self, route_id: RouteIdx, stop_id: StopIdx, position: usize) {
        if self.unassigned.remove(&stop_id) {
            self.unassigned_penalty -= self.unassigned_stop_penalty(stop_id);
        }
        self.replace_segment(route_id, &[stop_id], position, position);
    }

    pub(crate) fn remove_stop(&mut self, route_id: RouteIdx, position: usize) -> StopIdx {
        let stop_id = self.routes[route_id].stop(position);
        self.replace_segment(route_id, &[], position, position + 1);
        if self.unassigned.insert(stop_id) {
            self.unassigned_penalty += self.unassigned_stop_penalty(stop_id);
        }
        stop_id
    }

    /// Removes every stop from `from` on and unassigns them.
    pub(crate) fn unassign_tail(&mut self, route_id: RouteIdx, from: usize) -> Vec<StopIdx> {
        let end = self.routes[route_id].len();
        let removed = self.replace_segment(route_id, &[], from, end);
        for &stop_id in &removed {
            if self.unassigned.insert(stop_id) {
                self.unassigned_penalty += self.unassigned_stop_penalty(stop_id);
            }
        }
        removed
    }

    /// Takes a served stop out of its route for good, the route continues
    /// from the stop location.
    pub(crate) fn confirm_stop(
        &mut self,
        route_id: RouteIdx,
        position: usize,
        confirmed_at: Timestamp,
    ) -> StopIdx {
        let route = &mut self.routes[route_id];
        let previous_cost = route.cost();
        let stop_id = route.confirm_stop(&self.problem, &self.constraints, position, confirmed_at);
        self.routes_cost += route.cost() - previous_cost;
        stop_id
    }

    /// Removes a stop from the unassigned bucket without planning it.
    pub(crate) fn forget_unassigned(&mut self, stop_id: StopIdx) {
        if self.unassigned.remove(&stop_id) {
            self.unassigned_penalty -= self.unassigned_stop_penalty(stop_id);
        }
    }

    /// Mutable access for dispatch bookkeeping (frozen prefix, anchor,
    /// delays). Callers must `refresh_route` afterwards.
    pub(crate) fn route_mut(&mut self, route_id: RouteIdx) -> &mut Route {
        &mut self.routes[route_id]
    }

    pub(crate) fn refresh_route(&mut self, route_id: RouteIdx) {
        let route = &mut self.routes[route_id];
        let previous_cost = route.cost();
        route.update(&self.problem, &self.constraints);
        self.routes_cost += route.cost() - previous_cost;
    }

    pub fn sequences(&self) -> Vec<(RouteIdx, Vec<StopIdx>)> {
        self.routes
            .iter()
            .enumerate_idx()
            .filter(|(_, route): &(RouteIdx, &Route)| !route.is_empty())
            .map(|(route_id, route)| (route_id, route.stops().to_vec()))
            .collect()
    }

    pub fn is_identical(&self, other: &WorkingSolution) -> bool {
        self.routes.len() == other.routes.len()
            && self
                .routes
                .iter()
                .zip(&other.routes)
                .all(|(route, other)| route.stops() == other.stops())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        problem::capacity::Capacity,
        test_utils::{self, TestRoute},
    };

    #[test]
    fn test_new_solution_unassigns_everything() {
        let problem = Arc::new(test_utils::create_default_problem(4, 2, Capacity::weight(10.0)));
        let solution = WorkingSolution::new(problem, Arc::new(ConstraintSet::default()));

        let cost = solution.cost();
        assert_eq!(cost.unassigned, 4);
        assert_eq!(cost.routes, 0.0);
        assert_eq!(cost.unassigned_penalty, 400_000.0);
        assert_eq!(solution.routes().len(), 2);
    }

    #[test]
    fn test_mutations_keep_running_cost_in_sync() {
        let problem = test_utils::create_default_problem(8, 2, Capacity::weight(10.0));
        let mut solution = test_utils::create_test_working_solution(
            problem,
            vec![
                TestRoute {
                    resource_id: 0,
                    stop_ids: vec![0, 1, 2],
                },
                TestRoute {
                    resource_id: 1,
                    stop_ids: vec![3, 4],
                },
            ],
        );

        solution.insert_stop(RouteIdx::new(0), StopIdx::new(5), 1);
        solution.remove_stop(RouteIdx::new(1), 0);
        solution.replace_segment(
            RouteIdx::new(0),
            &[StopIdx::new(2), StopIdx::new(1), StopIdx::new(5)],
            1,
            4,
        );
        solution.unassign_tail(RouteIdx::new(0), 2);

        let incremental = solution.cost();
        let evaluated = solution.evaluate();
        assert!(incremental.approx_eq(&evaluated, 1e-6));
        assert!(solution.is_unassigned(StopIdx::new(3)));
        assert!(!solution.is_unassigned(StopIdx::new(2)));
        assert_eq!(solution.locate(StopIdx::new(4)), Some((RouteIdx::new(1), 0)));
    }

    #[test]
    fn test_rebind_problem_unassigns_new_stops() {
        let problem = test_utils::create_default_problem(3, 1, Capacity::weight(10.0));
        let mut solution = test_utils::create_test_working_solution(
            problem,
            vec![TestRoute {
                resource_id: 0,
                stop_ids: vec![0, 1, 2],
            }],
        );

        let mut builder = crate::problem::stop::StopBuilder::default();
        builder.set_external_id("late-order");
        let (extended, stop_id) = solution
            .problem()
            .with_additional_stop(crate::problem::location::Location::from_cartesian(2.0, 2.0), builder);

        solution.rebind_problem(Arc::new(extended));

        assert!(solution.is_unassigned(stop_id));
        assert_eq!(solution.unassigned().len(), 1);
        assert_eq!(solution.route(RouteIdx::new(0)).len(), 3);
    }
}
