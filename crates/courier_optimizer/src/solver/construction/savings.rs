use rand::rngs::SmallRng;
use tracing::debug;

use fxhash::FxHashMap;

use crate::{
    problem::{capacity::Capacity, resource::ResourceIdx, stop::StopIdx},
    solver::solution::{route::RouteIdx, working_solution::WorkingSolution},
};

use super::construct_solution::ConstructSolution;

/// Clarke-Wright savings. Stops start as single-stop chains around the depot
/// and chains are merged end-to-start by decreasing savings
/// `d(depot, i) + d(depot, j) - d(i, j)` while the merged demand fits the
/// largest vehicle. Chains are then given to the routes where they add the
/// least cost.
pub struct Savings;

struct Chain {
    stops: Vec<StopIdx>,
    demand: Capacity,
}

impl ConstructSolution for Savings {
    fn construct(&self, solution: &mut WorkingSolution, _rng: &mut SmallRng) {
        let problem = solution.problem();
        if problem.resources().is_empty() {
            return;
        }

        let depot = problem
            .resource_vehicle(ResourceIdx::new(0))
            .start_location_id();
        let capacity_limit = problem
            .vehicles()
            .iter()
            .map(|vehicle| solution.constraints().capacity_limit(vehicle.capacity()))
            .fold(Capacity::EMPTY, |max, capacity| Capacity {
                weight: max.weight.max(capacity.weight),
                volume: max.volume.max(capacity.volume),
            });

        let stops: Vec<StopIdx> = solution.unassigned().iter().copied().collect();
        let mut chains: Vec<Option<Chain>> = stops
            .iter()
            .map(|&stop_id| {
                Some(Chain {
                    stops: vec![stop_id],
                    demand: problem.stop(stop_id).demand(),
                })
            })
            .collect();
        // Chain holding each stop, indexed like `stops`
        let mut chain_of: Vec<usize> = (0..stops.len()).collect();
        let index_of: FxHashMap<StopIdx, usize> = stops
            .iter()
            .enumerate()
            .map(|(index, &stop_id)| (stop_id, index))
            .collect();

        let mut savings = Vec::with_capacity(stops.len() * stops.len().saturating_sub(1) / 2);
        for i in 0..stops.len() {
            let location_i = problem.stop(stops[i]).location_id();
            let from_depot_i = problem.travel(depot, location_i).distance;
            for j in (i + 1)..stops.len() {
                let location_j = problem.stop(stops[j]).location_id();
                let saving = from_depot_i + problem.travel(depot, location_j).distance
                    - problem.travel(location_i, location_j).distance;
                if saving > 0.0 {
                    savings.push((saving, i, j));
                }
            }
        }
        savings.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| (a.1, a.2).cmp(&(b.1, b.2))));

        for (_, i, j) in savings {
            let (ci, cj) = (chain_of[i], chain_of[j]);
            if ci == cj {
                continue;
            }

            let (Some(first), Some(second)) = (&chains[ci], &chains[cj]) else {
                continue;
            };
            if !(first.demand + second.demand).fits_within(&capacity_limit) {
                continue;
            }

            // i must end its chain and j start the other one, in either order
            let (head, tail) = if first.stops.last() == Some(&stops[i])
                && second.stops.first() == Some(&stops[j])
            {
                (ci, cj)
            } else if second.stops.last() == Some(&stops[j])
                && first.stops.first() == Some(&stops[i])
            {
                (cj, ci)
            } else {
                continue;
            };

            if let Some(tail_chain) = chains[tail].take()
                && let Some(head_chain) = chains[head].as_mut()
            {
                for stop_id in &tail_chain.stops {
                    chain_of[index_of[stop_id]] = head;
                }
                head_chain.stops.extend(tail_chain.stops);
                head_chain.demand += tail_chain.demand;
            }
        }

        let mut chains: Vec<Chain> = chains.into_iter().flatten().collect();
        chains.sort_by(|a, b| {
            b.demand
                .weight
                .total_cmp(&a.demand.weight)
                .then_with(|| b.stops.len().cmp(&a.stops.len()))
        });
        debug!("Savings: {} chains from {} stops", chains.len(), stops.len());

        for chain in chains {
            place_chain(solution, &chain.stops);
        }
    }
}

/// Appends the chain to the route where it is feasible and cheapest. Chains
/// that fit nowhere are left to the repair pass.
fn place_chain(solution: &mut WorkingSolution, chain: &[StopIdx]) {
    let problem = solution.problem();
    let constraints = solution.constraints();

    let best = solution
        .route_ids()
        .filter_map(|route_id| {
            let route = solution.route(route_id);
            let position = route.len();
            route
                .evaluate_change(problem, constraints, chain, position, position)
                .map(|change| (route_id, change.cost - route.cost()))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1));

    if let Some((route_id, _)) = best {
        insert_chain(solution, route_id, chain);
    }
}

fn insert_chain(solution: &mut WorkingSolution, route_id: RouteIdx, chain: &[StopIdx]) {
    for &stop_id in chain {
        solution.forget_unassigned(stop_id);
    }
    let position = solution.route(route_id).len();
    solution.replace_segment(route_id, chain, position, position);
}
