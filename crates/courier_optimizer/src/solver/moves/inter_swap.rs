use crate::solver::solution::{route::RouteIdx, working_solution::WorkingSolution};

use super::r#move::{MoveOperator, NeighborhoodOperator, RouteEdit};

/// **Inter-Route Swap**
///
/// Exchanges one stop of each route, positions are kept.
///
/// ```text
/// BEFORE:
///    R1: ... (A) -> [first] -> (B) ...
///    R2: ... (X) -> [second] -> (Y) ...
///
/// AFTER:
///    R1: ... (A) -> [second] -> (B) ...
///    R2: ... (X) -> [first] -> (Y) ...
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InterSwapOperator {
    params: InterSwapParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterSwapParams {
    pub first_route_id: RouteIdx,
    pub first_position: usize,
    pub second_route_id: RouteIdx,
    pub second_position: usize,
}

impl InterSwapOperator {
    pub fn new(params: InterSwapParams) -> Self {
        if params.first_route_id == params.second_route_id {
            panic!("InterSwapOperator cannot be used for intra-route swap");
        }

        Self { params }
    }

    pub fn params(&self) -> &InterSwapParams {
        &self.params
    }
}

impl MoveOperator for InterSwapOperator {
    fn edits(&self, solution: &WorkingSolution) -> Vec<RouteEdit> {
        let params = &self.params;
        let first = solution.route(params.first_route_id).stop(params.first_position);
        let second = solution.route(params.second_route_id).stop(params.second_position);

        vec![
            RouteEdit {
                route_id: params.first_route_id,
                replacement: vec![second],
                start: params.first_position,
                end: params.first_position + 1,
            },
            RouteEdit {
                route_id: params.second_route_id,
                replacement: vec![first],
                start: params.second_position,
                end: params.second_position + 1,
            },
        ]
    }

    fn updated_routes(&self) -> Vec<RouteIdx> {
        vec![self.params.first_route_id, self.params.second_route_id]
    }
}

impl NeighborhoodOperator for InterSwapOperator {
    fn generate_moves<C>(solution: &WorkingSolution, (r1, r2): (RouteIdx, RouteIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        // Symmetric, one direction is enough
        if r1 >= r2 {
            return;
        }

        let problem = solution.problem();
        let enforce_zones = solution.constraints().hard().enforce_zones;
        let first_route = solution.route(r1);
        let second_route = solution.route(r2);

        for first_position in first_route.frozen()..first_route.len() {
            let first = first_route.stop(first_position);
            if !problem.is_eligible(second_route.resource_id(), first, enforce_zones) {
                continue;
            }

            for second_position in second_route.frozen()..second_route.len() {
                let second = second_route.stop(second_position);
                if !problem.is_eligible(first_route.resource_id(), second, enforce_zones) {
                    continue;
                }

                consumer(InterSwapOperator::new(InterSwapParams {
                    first_route_id: r1,
                    first_position,
                    second_route_id: r2,
                    second_position,
                }));
            }
        }
    }
}
