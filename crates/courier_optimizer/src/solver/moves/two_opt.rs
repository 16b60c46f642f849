use crate::solver::solution::{route::RouteIdx, working_solution::WorkingSolution};

use super::r#move::{MoveOperator, NeighborhoodOperator, RouteEdit};

/// **Intra-Route 2-Opt**
///
/// Reverses the stops between `from` and `to` (inclusive), removing a
/// crossing inside one route.
///
/// ```text
/// BEFORE:
///    ... (prev) --x--> [from] -> ... -> [to] --x--> (next) ...
///
/// AFTER:
///    ... (prev) -----> [to] -> ... -> [from] -----> (next) ...
/// ```
///
/// Applying the same move again restores the route.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoOptOperator {
    params: TwoOptParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwoOptParams {
    pub route_id: RouteIdx,
    pub from: usize,
    pub to: usize,
}

impl TwoOptOperator {
    pub fn new(params: TwoOptParams) -> Self {
        if params.from >= params.to {
            panic!("TwoOpt: cannot have from >= to")
        }

        TwoOptOperator { params }
    }

    pub fn params(&self) -> &TwoOptParams {
        &self.params
    }
}

impl MoveOperator for TwoOptOperator {
    fn edits(&self, solution: &WorkingSolution) -> Vec<RouteEdit> {
        let route = solution.route(self.params.route_id);
        let replacement = route.stops()[self.params.from..=self.params.to]
            .iter()
            .rev()
            .copied()
            .collect();

        vec![RouteEdit {
            route_id: self.params.route_id,
            replacement,
            start: self.params.from,
            end: self.params.to + 1,
        }]
    }

    fn updated_routes(&self) -> Vec<RouteIdx> {
        vec![self.params.route_id]
    }
}

impl NeighborhoodOperator for TwoOptOperator {
    fn generate_moves<C>(solution: &WorkingSolution, (r1, r2): (RouteIdx, RouteIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 != r2 {
            return;
        }

        let route = solution.route(r1);
        if route.len() < 2 {
            return;
        }

        for from in route.frozen()..route.len() - 1 {
            for to in (from + 1)..route.len() {
                consumer(TwoOptOperator::new(TwoOptParams {
                    route_id: r1,
                    from,
                    to,
                }));
            }
        }
    }
}
