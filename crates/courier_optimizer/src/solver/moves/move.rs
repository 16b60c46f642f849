use crate::{
    problem::stop::StopIdx,
    solver::solution::{route::RouteIdx, working_solution::WorkingSolution},
};

use super::{
    insert::InsertOperator,
    inter_relocate::{InterRelocateOperator, InterRelocateParams},
    inter_swap::InterSwapOperator,
    or_opt::{OrOptOperator, OrOptParams},
    remove::RemoveOperator,
    two_opt::TwoOptOperator,
    two_opt_star::TwoOptStarOperator,
};

/// Replacement of `stops[start..end]` in one route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEdit {
    pub route_id: RouteIdx,
    pub replacement: Vec<StopIdx>,
    pub start: usize,
    pub end: usize,
}

pub trait MoveOperator {
    /// Route edits the move performs, in application order.
    fn edits(&self, solution: &WorkingSolution) -> Vec<RouteEdit>;

    fn updated_routes(&self) -> Vec<RouteIdx>;

    /// Change of the unassigned penalty.
    fn unassigned_delta(&self, _solution: &WorkingSolution) -> f64 {
        0.0
    }

    /// Cost difference if the move was applied, `None` when it breaks a hard
    /// constraint. Only the touched routes are re-simulated, from the first
    /// changed position on.
    fn delta_cost(&self, solution: &WorkingSolution) -> Option<f64> {
        let problem = solution.problem();
        let constraints = solution.constraints();

        let mut delta = self.unassigned_delta(solution);
        for edit in self.edits(solution) {
            let route = solution.route(edit.route_id);
            let change = route.evaluate_change(
                problem,
                constraints,
                &edit.replacement,
                edit.start,
                edit.end,
            )?;
            delta += change.cost - route.cost();
        }

        Some(delta)
    }
}

/// Operators that enumerate their own neighborhood for a pair of routes.
pub trait NeighborhoodOperator: MoveOperator + Sized {
    fn generate_moves<C>(solution: &WorkingSolution, routes: (RouteIdx, RouteIdx), consumer: C)
    where
        C: FnMut(Self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Move {
    /// Places an unassigned stop in a route.
    Insert(InsertOperator),
    /// Takes a stop out of its route into the unassigned bucket.
    Remove(RemoveOperator),
    /// Reverses a segment of a route.
    TwoOpt(TwoOptOperator),
    /// Moves a segment of one to three stops inside a route, a single stop
    /// being the intra-route relocate.
    OrOpt(OrOptOperator),
    /// Moves a stop to another route.
    InterRelocate(InterRelocateOperator),
    /// Exchanges two stops of different routes.
    InterSwap(InterSwapOperator),
    /// Exchanges the tails of two routes.
    TwoOptStar(TwoOptStarOperator),
}

/// Returned by `Move::apply`, holds the move restoring the previous state.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct MoveUndo(Move);

impl MoveUndo {
    pub fn undo(self, solution: &mut WorkingSolution) {
        // Undoing the undo is not needed
        let _ = self.0.apply(solution);
    }

    pub fn inverse(&self) -> &Move {
        &self.0
    }
}

macro_rules! dispatch_move {
    ($self:ident, $op:ident => $body:expr) => {
        match $self {
            Move::Insert($op) => $body,
            Move::Remove($op) => $body,
            Move::TwoOpt($op) => $body,
            Move::OrOpt($op) => $body,
            Move::InterRelocate($op) => $body,
            Move::InterSwap($op) => $body,
            Move::TwoOptStar($op) => $body,
        }
    };
}

impl Move {
    pub fn operator_name(&self) -> &'static str {
        match self {
            Move::Insert(_) => "Insert",
            Move::Remove(_) => "Remove",
            Move::TwoOpt(_) => "Two-Opt",
            Move::OrOpt(op) if op.length() == 1 => "Relocate",
            Move::OrOpt(_) => "Or-Opt",
            Move::InterRelocate(_) => "Inter-Relocate",
            Move::InterSwap(_) => "Inter-Swap",
            Move::TwoOptStar(_) => "Two-Opt*",
        }
    }

    pub fn delta_cost(&self, solution: &WorkingSolution) -> Option<f64> {
        dispatch_move!(self, op => op.delta_cost(solution))
    }

    pub fn updated_routes(&self) -> Vec<RouteIdx> {
        dispatch_move!(self, op => op.updated_routes())
    }

    /// Stops whose route changes, used as tabu attributes.
    pub fn moved_stops(&self, solution: &WorkingSolution) -> Vec<StopIdx> {
        match self {
            Move::Insert(op) => vec![op.stop_id()],
            Move::Remove(op) => vec![solution.route(op.route_id()).stop(op.position())],
            Move::InterRelocate(op) => {
                vec![solution.route(op.params().from_route_id).stop(op.params().from_position)]
            }
            Move::InterSwap(op) => {
                let params = op.params();
                vec![
                    solution.route(params.first_route_id).stop(params.first_position),
                    solution.route(params.second_route_id).stop(params.second_position),
                ]
            }
            _ => dispatch_move!(self, op => op
                .edits(solution)
                .into_iter()
                .flat_map(|edit| edit.replacement)
                .collect()),
        }
    }

    /// Applies the move and returns what is needed to revert it.
    pub fn apply(&self, solution: &mut WorkingSolution) -> MoveUndo {
        let inverse = match self {
            Move::Insert(op) => {
                solution.insert_stop(op.route_id(), op.stop_id(), op.position());
                Move::Remove(RemoveOperator::new(op.route_id(), op.position()))
            }
            Move::Remove(op) => {
                let stop_id = solution.remove_stop(op.route_id(), op.position());
                Move::Insert(InsertOperator::new(op.route_id(), stop_id, op.position()))
            }
            Move::TwoOpt(op) => {
                apply_edits(op.edits(solution), solution);
                Move::TwoOpt(op.clone())
            }
            Move::OrOpt(op) => {
                apply_edits(op.edits(solution), solution);
                let params = op.params();
                Move::OrOpt(OrOptOperator::new(OrOptParams {
                    route_id: params.route_id,
                    from: params.to,
                    length: params.length,
                    to: params.from,
                }))
            }
            Move::InterRelocate(op) => {
                apply_edits(op.edits(solution), solution);
                let params = op.params();
                Move::InterRelocate(InterRelocateOperator::new(InterRelocateParams {
                    from_route_id: params.to_route_id,
                    from_position: params.to_position,
                    to_route_id: params.from_route_id,
                    to_position: params.from_position,
                }))
            }
            Move::InterSwap(op) => {
                apply_edits(op.edits(solution), solution);
                Move::InterSwap(op.clone())
            }
            Move::TwoOptStar(op) => {
                apply_edits(op.edits(solution), solution);
                Move::TwoOptStar(op.clone())
            }
        };

        MoveUndo(inverse)
    }
}

fn apply_edits(edits: Vec<RouteEdit>, solution: &mut WorkingSolution) {
    for edit in edits {
        solution.replace_segment(edit.route_id, &edit.replacement, edit.start, edit.end);
    }
}
