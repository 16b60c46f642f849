use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    problem::{planning_problem::PlanningProblem, stop::StopIdx},
    solver::{
        constraints::constraint_set::ConstraintSet, insertion::Insertion,
        solution::working_solution::WorkingSolution,
    },
    utils::time::{minutes, positive},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    /// Waits for `accept_insertion`.
    UrgentInsertion,
    /// Already applied when a route was handed over.
    Reassignment,
}

/// Where a stop could go and what it costs the route taking it.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct InsertionProposal {
    pub id: Uuid,
    pub kind: ProposalKind,
    pub route_id: usize,
    pub vehicle_id: String,
    pub driver_id: String,
    pub stop_id: String,
    pub position: usize,
    pub estimated_arrival: Timestamp,
    /// Route cost increase.
    pub added_cost: f64,
    /// How much later the stop following the insertion is reached.
    pub added_delay: SignedDuration,
    /// Added cost plus the delay penalty weighted by the stop urgency,
    /// proposals are sorted on it.
    pub score: f64,
    /// The route would use straight-line estimates for some legs.
    pub degraded: bool,
}

/// Cost of pushing the rest of a route later, heavier for more urgent stops.
pub fn delay_penalty(constraints: &ConstraintSet, urgency: f64, delay: SignedDuration) -> f64 {
    constraints.weights().lateness_per_minute * urgency * minutes(positive(delay))
}

pub(crate) fn rank_insertion(solution: &WorkingSolution, insertion: &Insertion) -> f64 {
    let urgency = solution.problem().stop(insertion.stop_id).priority().weight();
    insertion.added_cost + delay_penalty(solution.constraints(), urgency, insertion.change.first_shift)
}

pub(crate) fn build_proposal(
    solution: &WorkingSolution,
    kind: ProposalKind,
    insertion: &Insertion,
) -> InsertionProposal {
    let problem = solution.problem();
    let route = solution.route(insertion.route_id);

    let mut preview = route.clone();
    preview.replace(
        problem,
        solution.constraints(),
        &[insertion.stop_id],
        insertion.position,
        insertion.position,
    );

    InsertionProposal {
        id: Uuid::new_v4(),
        kind,
        route_id: insertion.route_id.get(),
        vehicle_id: problem
            .resource_vehicle(route.resource_id())
            .external_id()
            .to_owned(),
        driver_id: problem
            .resource_driver(route.resource_id())
            .external_id()
            .to_owned(),
        stop_id: problem.stop(insertion.stop_id).external_id().to_owned(),
        position: insertion.position,
        estimated_arrival: preview.visit(insertion.position).arrival,
        added_cost: insertion.added_cost,
        added_delay: insertion.change.first_shift,
        score: rank_insertion(solution, insertion),
        degraded: preview.is_degraded(),
    }
}

/// Proposal waiting for acceptance, with what is needed to apply it.
#[derive(Clone)]
pub(crate) struct PendingInsertion {
    pub proposal: InsertionProposal,
    pub stop_id: StopIdx,
    /// Version of the target route when the proposal was computed.
    pub route_version: u64,
    /// Stop count of the active plan the proposal extends.
    pub base_stops: usize,
    /// Sequence number of the `insert_urgent` call that made the proposal.
    pub request: u64,
    pub problem: Arc<PlanningProblem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_penalty_weighs_urgency() {
        let constraints = ConstraintSet::default();
        let delay = SignedDuration::from_mins(10);

        assert_eq!(delay_penalty(&constraints, 1.0, delay), 20.0);
        assert_eq!(delay_penalty(&constraints, 3.0, delay), 60.0);
        assert_eq!(delay_penalty(&constraints, 3.0, -delay), 0.0);
    }
}
