use std::sync::Arc;

use fxhash::FxHashMap;
use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::DispatchError,
    problem::{
        location::Location,
        stop::{Stop, StopBuilder, StopIdx, StopOutcome},
    },
    solver::{
        constraints::{
            constraint::{Violation, check_route},
            driver_hours_constraint::driver_hours_remaining,
        },
        insertion::{Insertion, for_each_insertion},
        plan_result::PlannedRoute,
        search::local_search::LocalSearch,
        solution::{route::RouteIdx, working_solution::WorkingSolution},
    },
    utils::enumerate_idx::EnumerateIdx,
};

use super::{
    proposal::{InsertionProposal, PendingInsertion, ProposalKind, build_proposal, rank_insertion},
    route_state::{RouteState, RouteStatus},
};

#[derive(Clone, Debug)]
pub struct DispatchParams {
    /// Moves of the local search run on a route after it took a stop.
    pub repair_iterations: usize,
    /// Proposals returned by `insert_urgent`, best first.
    pub max_proposals: usize,
    /// Urgent requests whose proposals are kept for acceptance, older ones
    /// are dropped first.
    pub max_open_requests: usize,
}

impl Default for DispatchParams {
    fn default() -> Self {
        DispatchParams {
            repair_iterations: 100,
            max_proposals: 3,
            max_open_requests: 8,
        }
    }
}

/// New stop to fit into the running plan.
#[derive(Clone)]
pub struct UrgentStop {
    pub location: Location,
    pub stop: StopBuilder,
}

#[derive(Serialize, Debug, Clone)]
pub struct DelayImpact {
    pub route_id: usize,
    pub stop_id: String,
    pub delay: SignedDuration,
    pub route_end: Timestamp,
    /// Stops now reached after their window.
    pub late_stops: Vec<String>,
    pub violations: Vec<Violation>,
}

#[derive(Serialize, Debug, Clone)]
pub struct RouteView {
    pub status: RouteStatus,
    pub closed_reason: Option<String>,
    pub completed_stops: Vec<String>,
    pub route: PlannedRoute,
}

/// Owns the plan being executed and applies the day's events to it. The
/// dispatch actor feeds it one event at a time, in arrival order.
pub struct DispatchController {
    solution: WorkingSolution,
    states: Vec<RouteState>,
    stop_ids: FxHashMap<String, StopIdx>,
    outcomes: FxHashMap<StopIdx, StopOutcome>,
    pending: FxHashMap<Uuid, PendingInsertion>,
    requests: u64,
    params: DispatchParams,
}

impl DispatchController {
    pub fn new(solution: WorkingSolution, params: DispatchParams) -> Self {
        let states = solution.route_ids().map(RouteState::new).collect();
        let stop_ids = solution
            .problem()
            .stops()
            .iter()
            .enumerate_idx()
            .map(|(stop_id, stop): (StopIdx, _)| (stop.external_id().to_owned(), stop_id))
            .collect();

        DispatchController {
            solution,
            states,
            stop_ids,
            outcomes: FxHashMap::default(),
            pending: FxHashMap::default(),
            requests: 0,
            params,
        }
    }

    pub fn solution(&self) -> &WorkingSolution {
        &self.solution
    }

    pub fn route_status(&self, route_id: usize) -> Result<RouteStatus, DispatchError> {
        let route_id = self.route_index(route_id)?;
        Ok(self.states[route_id.get()].status())
    }

    pub fn outcome(&self, stop_id: &str) -> Option<StopOutcome> {
        let stop_id = self.stop_ids.get(stop_id)?;
        self.outcomes.get(stop_id).copied()
    }

    pub fn unassigned(&self) -> Vec<String> {
        self.solution
            .unassigned()
            .iter()
            .map(|&stop_id| self.solution.problem().stop(stop_id).external_id().to_owned())
            .collect()
    }

    pub fn routes(&self) -> Vec<RouteView> {
        self.states
            .iter()
            .map(|state| RouteView {
                status: state.status(),
                closed_reason: state.closed_reason().map(str::to_owned),
                completed_stops: state
                    .completed()
                    .iter()
                    .map(|&stop_id| self.external_id(stop_id))
                    .collect(),
                route: self.planned_route(state.route_id()),
            })
            .collect()
    }

    pub fn route(&self, route_id: usize) -> Result<PlannedRoute, DispatchError> {
        let route_id = self.route_index(route_id)?;
        Ok(self.planned_route(route_id))
    }

    fn planned_route(&self, route_id: RouteIdx) -> PlannedRoute {
        PlannedRoute::from_route(&self.solution, route_id.get(), self.solution.route(route_id))
    }

    fn external_id(&self, stop_id: StopIdx) -> String {
        self.solution.problem().stop(stop_id).external_id().to_owned()
    }

    fn route_index(&self, route_id: usize) -> Result<RouteIdx, DispatchError> {
        if route_id < self.states.len() {
            Ok(RouteIdx::new(route_id))
        } else {
            Err(DispatchError::UnknownRoute(route_id))
        }
    }

    fn stop_index(&self, stop_id: &str) -> Result<StopIdx, DispatchError> {
        self.stop_ids
            .get(stop_id)
            .copied()
            .ok_or_else(|| DispatchError::UnknownStop(stop_id.to_owned()))
    }

    fn state_mut(&mut self, route_id: RouteIdx) -> &mut RouteState {
        &mut self.states[route_id.get()]
    }

    /// Hands the route to its driver, every planned stop is communicated.
    pub fn dispatch(&mut self, route_id: usize) -> Result<PlannedRoute, DispatchError> {
        let route_id = self.route_index(route_id)?;
        let stops = self.solution.route(route_id).stops().to_vec();

        let state = self.state_mut(route_id);
        state.transition(RouteStatus::Dispatched)?;
        state.communicate(stops.iter().copied());

        info!(route_id = route_id.get(), stops = stops.len(), "Route dispatched");
        Ok(self.planned_route(route_id))
    }

    /// The vehicle left, the first stop is now locked.
    pub fn start_route(&mut self, route_id: usize) -> Result<PlannedRoute, DispatchError> {
        let route_id = self.route_index(route_id)?;
        self.state_mut(route_id).transition(RouteStatus::InProgress)?;
        self.lock_next_stop(route_id);

        info!(route_id = route_id.get(), "Route started");
        Ok(self.planned_route(route_id))
    }

    /// Keeps the stop the driver is heading to out of reach of any change.
    fn lock_next_stop(&mut self, route_id: RouteIdx) {
        let in_progress = self.states[route_id.get()].status() == RouteStatus::InProgress;
        let route = self.solution.route_mut(route_id);
        let frozen = if in_progress && !route.is_empty() { 1 } else { 0 };
        route.set_frozen(frozen);
        self.solution.refresh_route(route_id);
    }

    #[instrument(skip(self), level = "debug")]
    pub fn on_delivery_confirmed(
        &mut self,
        stop_id: &str,
        outcome: StopOutcome,
        confirmed_at: Timestamp,
    ) -> Result<PlannedRoute, DispatchError> {
        let stop = self.stop_index(stop_id)?;
        let (route_id, position) = self
            .solution
            .locate(stop)
            .ok_or_else(|| DispatchError::StopNotPlanned(stop_id.to_owned()))?;

        let state = self.state_mut(route_id);
        if state.status() == RouteStatus::Dispatched {
            state.transition(RouteStatus::InProgress)?;
        } else if state.status() != RouteStatus::InProgress {
            return Err(DispatchError::InvalidTransition {
                route_id: route_id.get(),
                from: state.status(),
                to: RouteStatus::InProgress,
            });
        }

        match outcome {
            StopOutcome::Delivered | StopOutcome::Failed => {
                self.solution.confirm_stop(route_id, position, confirmed_at);
            }
            // The driver never went there, the route does not move
            StopOutcome::Rescheduled => {
                self.solution.remove_stop(route_id, position);
                self.solution.forget_unassigned(stop);
            }
        }

        self.outcomes.insert(stop, outcome);
        self.state_mut(route_id).record_completed(stop);
        self.lock_next_stop(route_id);

        if self.solution.route(route_id).is_empty() {
            self.state_mut(route_id).transition(RouteStatus::Completed)?;
            info!(route_id = route_id.get(), "Route completed");
        }

        info!(stop_id, ?outcome, route_id = route_id.get(), "Stop confirmed");
        Ok(self.planned_route(route_id))
    }

    /// Shifts the schedule of `route_id` from `stop_id` on.
    pub fn emit_delay_event(
        &mut self,
        route_id: usize,
        stop_id: &str,
        delay_minutes: i64,
    ) -> Result<DelayImpact, DispatchError> {
        if delay_minutes <= 0 {
            return Err(DispatchError::InvalidDelay(delay_minutes));
        }
        let route_id = self.route_index(route_id)?;
        let stop = self.stop_index(stop_id)?;
        let position = self
            .solution
            .route(route_id)
            .position_of(stop)
            .ok_or_else(|| DispatchError::StopNotPlanned(stop_id.to_owned()))?;

        let delay = SignedDuration::from_mins(delay_minutes);
        self.solution.route_mut(route_id).add_delay(stop, delay);
        self.solution.refresh_route(route_id);

        let route = self.solution.route(route_id);
        let late_stops: Vec<String> = route.stops()[position..]
            .iter()
            .zip(&route.visits()[position..])
            .filter(|(_, visit)| visit.lateness.is_positive())
            .map(|(&stop_id, _)| self.external_id(stop_id))
            .collect();
        let violations = check_route(self.solution.problem(), self.solution.constraints(), route);

        if violations.is_empty() {
            info!(route_id = route_id.get(), stop_id, %delay, "Delay applied");
        } else {
            warn!(
                route_id = route_id.get(),
                stop_id,
                %delay,
                violations = violations.len(),
                "Delay breaks hard constraints"
            );
        }

        Ok(DelayImpact {
            route_id: route_id.get(),
            stop_id: stop_id.to_owned(),
            delay,
            route_end: route.end(),
            late_stops,
            violations,
        })
    }

    /// Routes that may take a stop: still active and with time left.
    fn candidate_routes(
        &self,
        solution: &WorkingSolution,
        requested: Option<&[usize]>,
    ) -> Result<Vec<RouteIdx>, DispatchError> {
        let route_ids: Vec<RouteIdx> = match requested {
            Some(requested) => requested
                .iter()
                .map(|&route_id| self.route_index(route_id))
                .collect::<Result<_, _>>()?,
            None => solution.route_ids().collect(),
        };

        let problem = solution.problem();
        Ok(route_ids
            .into_iter()
            .filter(|&route_id| {
                let route = solution.route(route_id);
                self.states[route_id.get()].status().is_active()
                    && problem.resource_driver(route.resource_id()).is_available()
                    && driver_hours_remaining(problem, solution.constraints(), route).is_positive()
            })
            .collect())
    }

    /// Proposals for fitting a new stop into the active routes. Existing stops
    /// keep their order, visited and locked stops are never moved. Nothing
    /// changes until a proposal is accepted.
    #[instrument(skip_all, level = "debug")]
    pub fn insert_urgent(
        &mut self,
        request: UrgentStop,
        route_candidates: Option<Vec<usize>>,
    ) -> Result<Vec<InsertionProposal>, DispatchError> {
        let (problem, stop_id) = self
            .solution
            .problem()
            .with_additional_stop(request.location, request.stop);
        let external_id = problem.stop(stop_id).external_id().to_owned();
        if self.stop_ids.contains_key(&external_id) {
            return Err(DispatchError::DuplicateStop(external_id));
        }

        // A new request for the same stop supersedes its previous proposals
        self.drop_stale_proposals();
        self.pending
            .retain(|_, pending| pending.proposal.stop_id != external_id);

        let mut extended = self.solution.clone();
        extended.rebind_problem(Arc::new(problem));

        let mut insertions: Vec<(f64, Insertion)> = self
            .candidate_routes(&extended, route_candidates.as_deref())?
            .into_iter()
            .filter_map(|route_id| best_ranked_insertion(&extended, stop_id, route_id))
            .collect();
        insertions.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        insertions.truncate(self.params.max_proposals);

        if insertions.is_empty() {
            warn!(stop_id = external_id, "Insertion rejected, no feasible route");
            return Ok(Vec::new());
        }

        let base_stops = self.solution.problem().num_stops();
        self.requests += 1;
        let request = self.requests;
        let proposals: Vec<InsertionProposal> = insertions
            .iter()
            .map(|(_, insertion)| {
                let proposal = build_proposal(&extended, ProposalKind::UrgentInsertion, insertion);
                self.pending.insert(
                    proposal.id,
                    PendingInsertion {
                        proposal: proposal.clone(),
                        stop_id,
                        route_version: self.solution.route(insertion.route_id).version(),
                        base_stops,
                        request,
                        problem: Arc::clone(extended.problem_arc()),
                    },
                );
                proposal
            })
            .collect();
        self.drop_oldest_requests();

        info!(
            stop_id = external_id,
            proposals = proposals.len(),
            best_route = proposals[0].route_id,
            "Urgent stop proposals"
        );
        Ok(proposals)
    }

    /// Forgets a proposal from `insert_urgent` the caller turned down.
    pub fn reject_insertion(&mut self, proposal_id: Uuid) -> Result<(), DispatchError> {
        let pending = self
            .pending
            .remove(&proposal_id)
            .ok_or(DispatchError::UnknownProposal(proposal_id))?;

        info!(
            stop_id = pending.proposal.stop_id,
            route_id = pending.proposal.route_id,
            "Urgent stop proposal rejected"
        );
        Ok(())
    }

    /// Number of proposals waiting for acceptance.
    pub fn pending_proposals(&self) -> usize {
        self.pending.len()
    }

    fn is_stale(&self, pending: &PendingInsertion) -> bool {
        let route_id = RouteIdx::new(pending.proposal.route_id);
        self.solution.problem().num_stops() != pending.base_stops
            || self.solution.route(route_id).version() != pending.route_version
            || !self.states[route_id.get()].status().is_active()
    }

    /// Drops proposals computed on a plan that changed since.
    fn drop_stale_proposals(&mut self) {
        let stale: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|(_, pending)| self.is_stale(pending))
            .map(|(&proposal_id, _)| proposal_id)
            .collect();

        for proposal_id in stale {
            self.pending.remove(&proposal_id);
        }
    }

    fn drop_oldest_requests(&mut self) {
        let mut requests: Vec<u64> = self.pending.values().map(|pending| pending.request).collect();
        requests.sort_unstable();
        requests.dedup();

        let open = self.params.max_open_requests.max(1);
        if requests.len() > open {
            let oldest_kept = requests[requests.len() - open];
            self.pending.retain(|_, pending| pending.request >= oldest_kept);
        }
    }

    /// Applies a proposal from `insert_urgent`. Fails when the plan changed
    /// since the proposal was made.
    pub fn accept_insertion(&mut self, proposal_id: Uuid) -> Result<PlannedRoute, DispatchError> {
        let pending = self
            .pending
            .remove(&proposal_id)
            .ok_or(DispatchError::UnknownProposal(proposal_id))?;
        let route_id = RouteIdx::new(pending.proposal.route_id);

        if self.is_stale(&pending) {
            return Err(DispatchError::StaleProposal(proposal_id));
        }

        self.pending
            .retain(|_, other| other.proposal.stop_id != pending.proposal.stop_id);
        self.solution.rebind_problem(pending.problem);
        self.stop_ids
            .insert(pending.proposal.stop_id.clone(), pending.stop_id);
        self.solution
            .insert_stop(route_id, pending.stop_id, pending.proposal.position);
        self.reoptimize_tail(route_id);
        self.drop_stale_proposals();

        let state = self.state_mut(route_id);
        if state.status().is_dispatched() {
            state.communicate([pending.stop_id]);
        }

        info!(
            stop_id = pending.proposal.stop_id,
            route_id = route_id.get(),
            "Urgent stop accepted"
        );
        Ok(self.planned_route(route_id))
    }

    /// Local search on the stops after the last communicated one.
    fn reoptimize_tail(&mut self, route_id: RouteIdx) {
        let route = self.solution.route(route_id);
        let frozen = route.frozen();
        let locked = self.states[route_id.get()]
            .communicated_prefix(route.stops())
            .max(frozen);

        self.solution.route_mut(route_id).set_frozen(locked);
        self.solution.refresh_route(route_id);

        LocalSearch::scoped([route_id])
            .keep_unassigned()
            .descend(&mut self.solution, self.params.repair_iterations);

        self.solution.route_mut(route_id).set_frozen(frozen);
        self.solution.refresh_route(route_id);
    }

    /// Takes the route away from its resource and moves its remaining stops
    /// to other active or standby routes. Confirmed stops are history and are
    /// not touched. Stops no route can take stay unassigned.
    #[instrument(skip(self), level = "debug")]
    pub fn reassign_route(
        &mut self,
        route_id: usize,
        reason: &str,
    ) -> Result<Vec<InsertionProposal>, DispatchError> {
        let route_id = self.route_index(route_id)?;
        let state = &self.states[route_id.get()];
        if !state.status().is_active() {
            return Err(DispatchError::InvalidTransition {
                route_id: route_id.get(),
                from: state.status(),
                to: RouteStatus::Completed,
            });
        }

        let resource_id = self.solution.route(route_id).resource_id();
        let driver_id = self.solution.problem().resource(resource_id).driver_id();
        let problem = self.solution.problem().with_unavailable_driver(driver_id);
        self.solution.rebind_problem(Arc::new(problem));
        self.pending
            .retain(|_, pending| pending.proposal.route_id != route_id.get());

        self.solution.route_mut(route_id).set_frozen(0);
        self.solution.refresh_route(route_id);
        let mut orphans = self.solution.unassign_tail(route_id, 0);
        self.state_mut(route_id).close(reason);
        warn!(
            route_id = route_id.get(),
            reason,
            stops = orphans.len(),
            "Route taken out of service"
        );

        let problem = Arc::clone(self.solution.problem_arc());
        orphans.sort_by(|&a, &b| {
            let (a, b) = (problem.stop(a), problem.stop(b));
            b.priority()
                .weight()
                .total_cmp(&a.priority().weight())
                .then_with(|| {
                    let deadline = |stop: &Stop| stop.time_window().end().unwrap_or(Timestamp::MAX);
                    deadline(a).cmp(&deadline(b))
                })
        });

        let mut proposals = Vec::new();
        let mut touched = Vec::new();
        for stop_id in orphans {
            let candidates = self.candidate_routes(&self.solution, None)?;
            let best = candidates
                .into_iter()
                .filter_map(|candidate| best_ranked_insertion(&self.solution, stop_id, candidate))
                .min_by(|(a, _), (b, _)| a.total_cmp(b));

            let Some((_, insertion)) = best else {
                warn!(stop_id = self.external_id(stop_id), "No route can take the stop");
                continue;
            };

            proposals.push(build_proposal(&self.solution, ProposalKind::Reassignment, &insertion));
            let _ = insertion.into_move().apply(&mut self.solution);
            if !touched.contains(&insertion.route_id) {
                touched.push(insertion.route_id);
            }
        }

        for &target in &touched {
            self.reoptimize_tail(target);
        }

        for proposal in &mut proposals {
            let target = RouteIdx::new(proposal.route_id);
            let stop_id = self.stop_index(&proposal.stop_id)?;
            let route = self.solution.route(target);
            if let Some(position) = route.position_of(stop_id) {
                proposal.position = position;
                proposal.estimated_arrival = route.visit(position).arrival;
            }

            let state = self.state_mut(target);
            if state.status().is_dispatched() {
                state.communicate([stop_id]);
            }
        }

        info!(
            route_id = route_id.get(),
            reassigned = proposals.len(),
            unassigned = self.solution.unassigned().len(),
            "Route reassigned"
        );
        Ok(proposals)
    }
}

/// Position in `route_id` with the lowest cost plus delay penalty.
fn best_ranked_insertion(
    solution: &WorkingSolution,
    stop_id: StopIdx,
    route_id: RouteIdx,
) -> Option<(f64, Insertion)> {
    let mut best: Option<(f64, Insertion)> = None;
    for_each_insertion(solution, stop_id, route_id, |insertion| {
        let score = rank_insertion(solution, &insertion);
        if best.is_none_or(|(best_score, _)| score < best_score) {
            best = Some((score, insertion));
        }
    });
    best
}
