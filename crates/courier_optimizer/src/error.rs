use thiserror::Error;

use crate::{dispatch::route_state::RouteStatus, problem::capacity::Capacity};

/// Inputs no plan can be built for. Optimization does not start.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InfeasibleInput {
    #[error("no vehicle with capacity for a total demand of {0:?}")]
    NoFleet(Capacity),

    #[error("stop {stop_id} has no eligible resource")]
    NoEligibleResource { stop_id: String },

    #[error("stop {stop_id} demand exceeds the capacity of every eligible vehicle")]
    DemandExceedsCapacity { stop_id: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("infeasible input: {0}")]
    InfeasibleInput(#[from] InfeasibleInput),

    #[error("failed to fetch {what}: {source}")]
    Collaborator {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("travel matrix unavailable: {0}")]
    TravelMatrix(#[source] anyhow::Error),

    #[error("planning task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("unknown route {0}")]
    UnknownRoute(usize),

    #[error("unknown stop {0}")]
    UnknownStop(String),

    #[error("stop {0} already exists")]
    DuplicateStop(String),

    #[error("stop {0} is not planned on any active route")]
    StopNotPlanned(String),

    #[error("unknown or expired insertion proposal {0}")]
    UnknownProposal(uuid::Uuid),

    #[error("proposal {0} was computed on a route that changed since")]
    StaleProposal(uuid::Uuid),

    #[error("delay of {0} minutes, only positive delays are reported")]
    InvalidDelay(i64),

    #[error("route {route_id} cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        route_id: usize,
        from: RouteStatus,
        to: RouteStatus,
    },

    #[error("no plan is loaded")]
    NoActivePlan,

    #[error("dispatch controller stopped")]
    ControllerClosed,
}
