use crate::solver::solution::{route::RouteIdx, working_solution::WorkingSolution};

use super::r#move::{MoveOperator, NeighborhoodOperator, RouteEdit};

pub const MAX_SEGMENT_LENGTH: usize = 3;

/// **Intra-Route Or-Opt**
///
/// Moves the segment `[from, from + length)` so that it starts at `to` in the
/// route without the segment. With `length == 1` this is a plain relocate.
///
/// ```text
/// BEFORE:
///    (A) -> [S1 -> S2] -> (B) -> ... -> (X) -> (Y)
///
/// AFTER:
///    (A) -> (B) -> ... -> (X) -> [S1 -> S2] -> (Y)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OrOptOperator {
    params: OrOptParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrOptParams {
    pub route_id: RouteIdx,
    pub from: usize,
    pub length: usize,
    pub to: usize,
}

impl OrOptOperator {
    pub fn new(params: OrOptParams) -> Self {
        if params.length == 0 || params.from == params.to {
            panic!("OrOpt: segment must be non-empty and actually move")
        }

        OrOptOperator { params }
    }

    pub fn params(&self) -> &OrOptParams {
        &self.params
    }

    pub fn length(&self) -> usize {
        self.params.length
    }
}

impl MoveOperator for OrOptOperator {
    fn edits(&self, solution: &WorkingSolution) -> Vec<RouteEdit> {
        let stops = solution.route(self.params.route_id).stops();
        let OrOptParams {
            route_id,
            from,
            length,
            to,
        } = self.params;
        let segment = &stops[from..from + length];

        let (replacement, start, end) = if to < from {
            let mut replacement = segment.to_vec();
            replacement.extend_from_slice(&stops[to..from]);
            (replacement, to, from + length)
        } else {
            let mut replacement = stops[from + length..to + length].to_vec();
            replacement.extend_from_slice(segment);
            (replacement, from, to + length)
        };

        vec![RouteEdit {
            route_id,
            replacement,
            start,
            end,
        }]
    }

    fn updated_routes(&self) -> Vec<RouteIdx> {
        vec![self.params.route_id]
    }
}

impl NeighborhoodOperator for OrOptOperator {
    fn generate_moves<C>(solution: &WorkingSolution, (r1, r2): (RouteIdx, RouteIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 != r2 {
            return;
        }

        let route = solution.route(r1);
        let frozen = route.frozen();

        for length in 1..=MAX_SEGMENT_LENGTH {
            if route.len() < frozen + length + 1 {
                break;
            }

            let reduced_len = route.len() - length;
            for from in frozen..=reduced_len {
                for to in frozen..=reduced_len {
                    if to == from {
                        continue;
                    }

                    consumer(OrOptOperator::new(OrOptParams {
                        route_id: r1,
                        from,
                        length,
                        to,
                    }));
                }
            }
        }
    }
}
