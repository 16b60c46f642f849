use std::collections::BTreeSet;

use rand::rngs::SmallRng;

use crate::{
    problem::stop::StopIdx,
    solver::{
        moves::{insert::InsertOperator, r#move::Move},
        solution::{route::RouteIdx, working_solution::WorkingSolution},
    },
};

use super::construct_solution::ConstructSolution;

/// Fills the routes one after the other, always driving to the closest stop
/// that can still be appended. Equally close stops are taken by earliest
/// deadline.
pub struct NearestNeighbor;

impl ConstructSolution for NearestNeighbor {
    fn construct(&self, solution: &mut WorkingSolution, _rng: &mut SmallRng) {
        let candidates = solution.unassigned().clone();
        for route_id in solution.route_ids() {
            extend_route(solution, route_id, &candidates);
        }
    }
}

/// Appends the nearest feasible stop of `candidates` until none fits.
pub(super) fn extend_route(
    solution: &mut WorkingSolution,
    route_id: RouteIdx,
    candidates: &BTreeSet<StopIdx>,
) {
    while let Some(stop_id) = next_stop(solution, route_id, candidates) {
        let position = solution.route(route_id).len();
        let _ = Move::Insert(InsertOperator::new(route_id, stop_id, position)).apply(solution);
    }
}

fn next_stop(
    solution: &WorkingSolution,
    route_id: RouteIdx,
    candidates: &BTreeSet<StopIdx>,
) -> Option<StopIdx> {
    let problem = solution.problem();
    let constraints = solution.constraints();
    let route = solution.route(route_id);

    let current = match route.stops().last() {
        Some(&stop_id) => problem.stop(stop_id).location_id(),
        None => route.anchor().map_or_else(
            || problem.resource_vehicle(route.resource_id()).start_location_id(),
            |anchor| anchor.location_id,
        ),
    };
    let current = problem.location(current);

    let mut best: Option<(StopIdx, f64)> = None;
    for stop_id in problem.stop_index().nearest(current) {
        if !candidates.contains(&stop_id) || !solution.is_unassigned(stop_id) {
            continue;
        }

        let distance = current.euclidean_distance(problem.location(problem.stop(stop_id).location_id()));
        if let Some((best_id, best_distance)) = best {
            if distance > best_distance + f64::EPSILON {
                break;
            }
            if !is_earlier_deadline(solution, stop_id, best_id) {
                continue;
            }
        }

        let position = route.len();
        if route
            .evaluate_change(problem, constraints, &[stop_id], position, position)
            .is_some()
        {
            best = Some((stop_id, distance));
        }
    }

    best.map(|(stop_id, _)| stop_id)
}

fn is_earlier_deadline(solution: &WorkingSolution, stop_id: StopIdx, other: StopIdx) -> bool {
    let deadline = solution.problem().stop(stop_id).time_window().end();
    let other = solution.problem().stop(other).time_window().end();
    match (deadline, other) {
        (Some(deadline), Some(other)) => deadline < other,
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::{problem::capacity::Capacity, test_utils};

    #[test]
    fn test_builds_routes_along_a_line() {
        let problem = test_utils::create_line_problem(5, Capacity::weight(10.0));
        let mut solution = test_utils::create_test_working_solution(problem, vec![]);

        NearestNeighbor.construct(&mut solution, &mut SmallRng::seed_from_u64(0));

        let stops: Vec<usize> = solution
            .route(RouteIdx::new(0))
            .stops()
            .iter()
            .map(StopIdx::get)
            .collect();
        assert_eq!(stops, vec![0, 1, 2, 3, 4]);
        assert!(!solution.has_unassigned());
    }

    #[test]
    fn test_stops_when_capacity_is_full() {
        let problem = test_utils::create_default_problem(10, 1, Capacity::weight(8.0));
        let mut solution = test_utils::create_test_working_solution(problem, vec![]);

        NearestNeighbor.construct(&mut solution, &mut SmallRng::seed_from_u64(0));

        assert_eq!(solution.route(RouteIdx::new(0)).len(), 8);
        assert_eq!(solution.unassigned().len(), 2);
    }
}
