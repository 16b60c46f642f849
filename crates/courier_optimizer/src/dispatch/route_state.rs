use std::fmt::Display;

use fxhash::FxHashSet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{error::DispatchError, problem::stop::StopIdx, solver::solution::route::RouteIdx};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Planned,
    Dispatched,
    InProgress,
    Completed,
}

impl RouteStatus {
    pub fn can_transition_to(self, next: RouteStatus) -> bool {
        matches!(
            (self, next),
            (RouteStatus::Planned, RouteStatus::Dispatched)
                | (RouteStatus::Dispatched, RouteStatus::InProgress)
                | (RouteStatus::InProgress, RouteStatus::Completed)
                // Nothing left to drive, or the route was handed over
                | (RouteStatus::Dispatched, RouteStatus::Completed)
                | (RouteStatus::Planned, RouteStatus::Completed)
        )
    }

    /// Routes that can still take stops.
    pub fn is_active(self) -> bool {
        !matches!(self, RouteStatus::Completed)
    }

    pub fn is_dispatched(self) -> bool {
        matches!(self, RouteStatus::Dispatched | RouteStatus::InProgress)
    }
}

impl Display for RouteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planned => write!(f, "planned"),
            Self::Dispatched => write!(f, "dispatched"),
            Self::InProgress => write!(f, "in progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Execution state the controller keeps next to each route.
#[derive(Debug, Clone)]
pub struct RouteState {
    route_id: RouteIdx,
    status: RouteStatus,
    /// Stops the driver has been told about, in the order they were given.
    communicated: FxHashSet<StopIdx>,
    completed: Vec<StopIdx>,
    closed_reason: Option<String>,
}

impl RouteState {
    pub fn new(route_id: RouteIdx) -> Self {
        RouteState {
            route_id,
            status: RouteStatus::Planned,
            communicated: FxHashSet::default(),
            completed: Vec::new(),
            closed_reason: None,
        }
    }

    pub fn route_id(&self) -> RouteIdx {
        self.route_id
    }

    pub fn status(&self) -> RouteStatus {
        self.status
    }

    pub fn is_communicated(&self, stop_id: StopIdx) -> bool {
        self.communicated.contains(&stop_id)
    }

    pub fn completed(&self) -> &[StopIdx] {
        &self.completed
    }

    pub fn closed_reason(&self) -> Option<&str> {
        self.closed_reason.as_deref()
    }

    pub fn transition(&mut self, next: RouteStatus) -> Result<(), DispatchError> {
        if !self.status.can_transition_to(next) {
            return Err(DispatchError::InvalidTransition {
                route_id: self.route_id.get(),
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        Ok(())
    }

    pub(crate) fn communicate(&mut self, stops: impl IntoIterator<Item = StopIdx>) {
        self.communicated.extend(stops);
    }

    pub(crate) fn record_completed(&mut self, stop_id: StopIdx) {
        self.communicated.remove(&stop_id);
        self.completed.push(stop_id);
    }

    pub(crate) fn forget(&mut self, stop_id: StopIdx) {
        self.communicated.remove(&stop_id);
    }

    pub(crate) fn close(&mut self, reason: impl Into<String>) {
        self.communicated.clear();
        self.closed_reason = Some(reason.into());
        self.status = RouteStatus::Completed;
    }

    /// One past the last communicated stop in `stops`, 0 when none was
    /// communicated. Positions before it keep their relative order.
    pub(crate) fn communicated_prefix(&self, stops: &[StopIdx]) -> usize {
        stops
            .iter()
            .rposition(|stop_id| self.communicated.contains(stop_id))
            .map_or(0, |position| position + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut state = RouteState::new(RouteIdx::new(0));

        assert!(state.transition(RouteStatus::InProgress).is_err());
        state.transition(RouteStatus::Dispatched).unwrap();
        state.transition(RouteStatus::InProgress).unwrap();
        assert_eq!(
            state.transition(RouteStatus::Planned),
            Err(DispatchError::InvalidTransition {
                route_id: 0,
                from: RouteStatus::InProgress,
                to: RouteStatus::Planned,
            })
        );
        state.transition(RouteStatus::Completed).unwrap();
        assert!(!state.status().is_active());
    }

    #[test]
    fn test_communicated_prefix() {
        let mut state = RouteState::new(RouteIdx::new(0));
        let stops: Vec<StopIdx> = [4, 2, 7, 1].into_iter().map(StopIdx::new).collect();

        assert_eq!(state.communicated_prefix(&stops), 0);

        state.communicate([StopIdx::new(4), StopIdx::new(7)]);
        assert_eq!(state.communicated_prefix(&stops), 3);

        state.record_completed(StopIdx::new(7));
        assert_eq!(state.communicated_prefix(&stops), 1);
        assert_eq!(state.completed(), &[StopIdx::new(7)]);
    }
}
