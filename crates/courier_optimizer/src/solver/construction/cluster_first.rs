use std::collections::BTreeSet;

use rand::rngs::SmallRng;
use tracing::debug;

use crate::{
    problem::{resource::ResourceIdx, stop::StopIdx},
    solver::solution::working_solution::WorkingSolution,
};

use super::{construct_solution::ConstructSolution, nearest_neighbor::extend_route};

/// Sweep: stops are sorted by their angle around the depot and cut into
/// consecutive clusters, one per route, sized by the route's capacity. Each
/// cluster is then sequenced by nearest neighbor.
pub struct ClusterFirst;

impl ConstructSolution for ClusterFirst {
    fn construct(&self, solution: &mut WorkingSolution, _rng: &mut SmallRng) {
        let problem = solution.problem();
        if problem.resources().is_empty() {
            return;
        }

        let depot = problem.location(
            problem
                .resource_vehicle(ResourceIdx::new(0))
                .start_location_id(),
        );

        let mut stops: Vec<(f64, StopIdx)> = solution
            .unassigned()
            .iter()
            .map(|&stop_id| {
                let location = problem.location(problem.stop(stop_id).location_id());
                (depot.planar_angle(location), stop_id)
            })
            .collect();
        stops.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut clusters = Vec::new();
        let mut remaining = stops.into_iter().map(|(_, stop_id)| stop_id).peekable();
        for route_id in solution.route_ids() {
            let route = solution.route(route_id);
            let vehicle = problem.resource_vehicle(route.resource_id());
            let limit = solution.constraints().capacity_limit(vehicle.capacity());

            let mut load = route.load();
            let mut cluster = BTreeSet::new();
            while let Some(&stop_id) = remaining.peek() {
                let demand = problem.stop(stop_id).demand();
                if !(load + demand).fits_within(&limit) && !cluster.is_empty() {
                    break;
                }
                load += demand;
                cluster.insert(stop_id);
                remaining.next();
            }

            if cluster.is_empty() {
                continue;
            }
            clusters.push((route_id, cluster));
        }
        debug!("ClusterFirst: {} clusters", clusters.len());

        for (route_id, cluster) in clusters {
            extend_route(solution, route_id, &cluster);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::{problem::capacity::Capacity, test_utils};

    #[test]
    fn test_sweep_fills_routes_by_capacity() {
        let problem = test_utils::create_default_problem(24, 3, Capacity::weight(8.0));
        let mut solution = test_utils::create_test_working_solution(problem, vec![]);

        ClusterFirst.construct(&mut solution, &mut SmallRng::seed_from_u64(0));

        assert!(!solution.has_unassigned());
        for route in solution.routes() {
            assert_eq!(route.len(), 8);
        }
    }
}
