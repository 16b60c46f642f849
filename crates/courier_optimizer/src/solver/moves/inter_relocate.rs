use crate::solver::{
    constraints::capacity_constraint::is_capacity_feasible,
    solution::{route::RouteIdx, working_solution::WorkingSolution},
};

use super::r#move::{MoveOperator, NeighborhoodOperator, RouteEdit};

/// **Inter-Route Relocate**
///
/// Moves the stop at `from_position` of `from_route_id` to `to_position` of
/// `to_route_id`.
///
/// ```text
/// BEFORE:
///    R1: ... (A) -> [from] -> (B) ...
///    R2: ... (X) -> (Y) ...
///
/// AFTER:
///    R1: ... (A) -> (B) ...
///    R2: ... (X) -> [from] -> (Y) ...
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InterRelocateOperator {
    params: InterRelocateParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterRelocateParams {
    pub from_route_id: RouteIdx,
    pub from_position: usize,
    pub to_route_id: RouteIdx,
    pub to_position: usize,
}

impl InterRelocateOperator {
    pub fn new(params: InterRelocateParams) -> Self {
        if params.from_route_id == params.to_route_id {
            panic!("InterRelocateOperator cannot be used for intra-route relocation");
        }

        Self { params }
    }

    pub fn params(&self) -> &InterRelocateParams {
        &self.params
    }
}

impl MoveOperator for InterRelocateOperator {
    fn edits(&self, solution: &WorkingSolution) -> Vec<RouteEdit> {
        let params = &self.params;
        let stop_id = solution.route(params.from_route_id).stop(params.from_position);

        vec![
            RouteEdit {
                route_id: params.from_route_id,
                replacement: Vec::new(),
                start: params.from_position,
                end: params.from_position + 1,
            },
            RouteEdit {
                route_id: params.to_route_id,
                replacement: vec![stop_id],
                start: params.to_position,
                end: params.to_position,
            },
        ]
    }

    fn updated_routes(&self) -> Vec<RouteIdx> {
        vec![self.params.from_route_id, self.params.to_route_id]
    }
}

impl NeighborhoodOperator for InterRelocateOperator {
    fn generate_moves<C>(solution: &WorkingSolution, (r1, r2): (RouteIdx, RouteIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 == r2 {
            return;
        }

        let problem = solution.problem();
        let constraints = solution.constraints();
        let from_route = solution.route(r1);
        let to_route = solution.route(r2);
        let enforce_zones = constraints.hard().enforce_zones;

        for from_position in from_route.frozen()..from_route.len() {
            let stop_id = from_route.stop(from_position);
            if !problem.is_eligible(to_route.resource_id(), stop_id, enforce_zones)
                || !is_capacity_feasible(problem, constraints, to_route, stop_id)
            {
                continue;
            }

            for to_position in to_route.frozen()..=to_route.len() {
                consumer(InterRelocateOperator::new(InterRelocateParams {
                    from_route_id: r1,
                    from_position,
                    to_route_id: r2,
                    to_position,
                }));
            }
        }
    }
}
