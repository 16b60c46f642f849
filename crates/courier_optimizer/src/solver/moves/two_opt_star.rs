use crate::solver::solution::{route::RouteIdx, working_solution::WorkingSolution};

use super::r#move::{MoveOperator, NeighborhoodOperator, RouteEdit};

/// **Inter-Route 2-Opt\***
///
/// Exchanges the tails of two routes, cut before `first_position` and
/// `second_position`.
///
/// ```text
/// BEFORE:
///    R1: (A1) -> (A2) --x--> (A3) -> (A4)
///    R2: (B1) --x--> (B2) -> (B3)
///
/// AFTER:
///    R1: (A1) -> (A2) -----> (B2) -> (B3)
///    R2: (B1) -----> (A3) -> (A4)
/// ```
///
/// Applying the same move again restores both routes.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoOptStarOperator {
    params: TwoOptStarParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwoOptStarParams {
    pub first_route_id: RouteIdx,
    pub first_position: usize,
    pub second_route_id: RouteIdx,
    pub second_position: usize,
}

impl TwoOptStarOperator {
    pub fn new(params: TwoOptStarParams) -> Self {
        if params.first_route_id == params.second_route_id {
            panic!("TwoOptStarOperator needs two different routes");
        }

        Self { params }
    }

    pub fn params(&self) -> &TwoOptStarParams {
        &self.params
    }
}

impl MoveOperator for TwoOptStarOperator {
    fn edits(&self, solution: &WorkingSolution) -> Vec<RouteEdit> {
        let params = &self.params;
        let first = solution.route(params.first_route_id).stops();
        let second = solution.route(params.second_route_id).stops();

        vec![
            RouteEdit {
                route_id: params.first_route_id,
                replacement: second[params.second_position..].to_vec(),
                start: params.first_position,
                end: first.len(),
            },
            RouteEdit {
                route_id: params.second_route_id,
                replacement: first[params.first_position..].to_vec(),
                start: params.second_position,
                end: second.len(),
            },
        ]
    }

    fn updated_routes(&self) -> Vec<RouteIdx> {
        vec![self.params.first_route_id, self.params.second_route_id]
    }
}

impl NeighborhoodOperator for TwoOptStarOperator {
    fn generate_moves<C>(solution: &WorkingSolution, (r1, r2): (RouteIdx, RouteIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 >= r2 {
            return;
        }

        let first_route = solution.route(r1);
        let second_route = solution.route(r2);

        for first_position in first_route.frozen()..=first_route.len() {
            for second_position in second_route.frozen()..=second_route.len() {
                let first_tail = first_route.len() - first_position;
                let second_tail = second_route.len() - second_position;

                // Nothing or everything exchanged
                if first_tail == 0 && second_tail == 0 {
                    continue;
                }
                if first_position == 0 && second_position == 0 {
                    continue;
                }

                consumer(TwoOptStarOperator::new(TwoOptStarParams {
                    first_route_id: r1,
                    first_position,
                    second_route_id: r2,
                    second_position,
                }));
            }
        }
    }
}
