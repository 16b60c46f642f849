use crate::{
    problem::stop::StopIdx,
    solver::solution::{route::RouteIdx, working_solution::WorkingSolution},
};

use super::r#move::{MoveOperator, RouteEdit};

/// Places `stop_id` at `position`, shifting the stops after it.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOperator {
    route_id: RouteIdx,
    stop_id: StopIdx,
    position: usize,
}

impl InsertOperator {
    pub fn new(route_id: RouteIdx, stop_id: StopIdx, position: usize) -> Self {
        InsertOperator {
            route_id,
            stop_id,
            position,
        }
    }

    pub fn route_id(&self) -> RouteIdx {
        self.route_id
    }

    pub fn stop_id(&self) -> StopIdx {
        self.stop_id
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl MoveOperator for InsertOperator {
    fn edits(&self, _solution: &WorkingSolution) -> Vec<RouteEdit> {
        vec![RouteEdit {
            route_id: self.route_id,
            replacement: vec![self.stop_id],
            start: self.position,
            end: self.position,
        }]
    }

    fn updated_routes(&self) -> Vec<RouteIdx> {
        vec![self.route_id]
    }

    fn unassigned_delta(&self, solution: &WorkingSolution) -> f64 {
        if solution.is_unassigned(self.stop_id) {
            -solution.unassigned_stop_penalty(self.stop_id)
        } else {
            0.0
        }
    }
}
