use crate::solver::solution::{route::RouteIdx, working_solution::WorkingSolution};

use super::r#move::{MoveOperator, RouteEdit};

/// Takes the stop at `position` out of the route, it becomes unassigned.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveOperator {
    route_id: RouteIdx,
    position: usize,
}

impl RemoveOperator {
    pub fn new(route_id: RouteIdx, position: usize) -> Self {
        RemoveOperator { route_id, position }
    }

    pub fn route_id(&self) -> RouteIdx {
        self.route_id
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl MoveOperator for RemoveOperator {
    fn edits(&self, _solution: &WorkingSolution) -> Vec<RouteEdit> {
        vec![RouteEdit {
            route_id: self.route_id,
            replacement: Vec::new(),
            start: self.position,
            end: self.position + 1,
        }]
    }

    fn updated_routes(&self) -> Vec<RouteIdx> {
        vec![self.route_id]
    }

    fn unassigned_delta(&self, solution: &WorkingSolution) -> f64 {
        let stop_id = solution.route(self.route_id).stop(self.position);
        solution.unassigned_stop_penalty(stop_id)
    }
}
