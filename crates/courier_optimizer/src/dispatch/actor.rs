use jiff::Timestamp;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{error::DispatchError, problem::stop::StopOutcome, solver::plan_result::PlannedRoute};

use super::{
    controller::{DelayImpact, DispatchController, RouteView, UrgentStop},
    proposal::InsertionProposal,
};

type Reply<T> = oneshot::Sender<Result<T, DispatchError>>;

enum DispatchCommand {
    Dispatch {
        route_id: usize,
        reply: Reply<PlannedRoute>,
    },
    StartRoute {
        route_id: usize,
        reply: Reply<PlannedRoute>,
    },
    DeliveryConfirmed {
        stop_id: String,
        outcome: StopOutcome,
        confirmed_at: Timestamp,
        reply: Reply<PlannedRoute>,
    },
    Delay {
        route_id: usize,
        stop_id: String,
        delay_minutes: i64,
        reply: Reply<DelayImpact>,
    },
    InsertUrgent {
        request: UrgentStop,
        route_candidates: Option<Vec<usize>>,
        reply: Reply<Vec<InsertionProposal>>,
    },
    AcceptInsertion {
        proposal_id: Uuid,
        reply: Reply<PlannedRoute>,
    },
    RejectInsertion {
        proposal_id: Uuid,
        reply: Reply<()>,
    },
    ReassignRoute {
        route_id: usize,
        reason: String,
        reply: Reply<Vec<InsertionProposal>>,
    },
    Routes {
        reply: Reply<Vec<RouteView>>,
    },
}

impl DispatchCommand {
    fn name(&self) -> &'static str {
        match self {
            DispatchCommand::Dispatch { .. } => "dispatch",
            DispatchCommand::StartRoute { .. } => "start_route",
            DispatchCommand::DeliveryConfirmed { .. } => "delivery_confirmed",
            DispatchCommand::Delay { .. } => "delay",
            DispatchCommand::InsertUrgent { .. } => "insert_urgent",
            DispatchCommand::AcceptInsertion { .. } => "accept_insertion",
            DispatchCommand::RejectInsertion { .. } => "reject_insertion",
            DispatchCommand::ReassignRoute { .. } => "reassign_route",
            DispatchCommand::Routes { .. } => "routes",
        }
    }
}

/// Single writer of a running plan. Commands are applied strictly in the
/// order they were sent.
struct DispatchActor {
    controller: DispatchController,
    receiver: mpsc::Receiver<DispatchCommand>,
}

impl DispatchActor {
    async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            debug!("Handle {}", command.name());
            self.handle(command);
        }
        info!("Dispatch actor stopped");
    }

    fn handle(&mut self, command: DispatchCommand) {
        let controller = &mut self.controller;
        // A dropped receiver means the caller gave up, nothing to do
        match command {
            DispatchCommand::Dispatch { route_id, reply } => {
                let _ = reply.send(controller.dispatch(route_id));
            }
            DispatchCommand::StartRoute { route_id, reply } => {
                let _ = reply.send(controller.start_route(route_id));
            }
            DispatchCommand::DeliveryConfirmed {
                stop_id,
                outcome,
                confirmed_at,
                reply,
            } => {
                let _ = reply.send(controller.on_delivery_confirmed(&stop_id, outcome, confirmed_at));
            }
            DispatchCommand::Delay {
                route_id,
                stop_id,
                delay_minutes,
                reply,
            } => {
                let _ = reply.send(controller.emit_delay_event(route_id, &stop_id, delay_minutes));
            }
            DispatchCommand::InsertUrgent {
                request,
                route_candidates,
                reply,
            } => {
                let _ = reply.send(controller.insert_urgent(request, route_candidates));
            }
            DispatchCommand::AcceptInsertion { proposal_id, reply } => {
                let _ = reply.send(controller.accept_insertion(proposal_id));
            }
            DispatchCommand::RejectInsertion { proposal_id, reply } => {
                let _ = reply.send(controller.reject_insertion(proposal_id));
            }
            DispatchCommand::ReassignRoute {
                route_id,
                reason,
                reply,
            } => {
                let _ = reply.send(controller.reassign_route(route_id, &reason));
            }
            DispatchCommand::Routes { reply } => {
                let _ = reply.send(Ok(controller.routes()));
            }
        }
    }
}

/// Cloneable handle to a dispatch actor. The actor stops once every handle
/// is dropped.
#[derive(Clone)]
pub struct DispatchHandle {
    sender: mpsc::Sender<DispatchCommand>,
}

impl DispatchHandle {
    /// Spawns the actor on the current tokio runtime.
    pub fn spawn(controller: DispatchController, buffer: usize) -> Self {
        let (sender, receiver) = mpsc::channel(buffer);
        let actor = DispatchActor {
            controller,
            receiver,
        };
        tokio::spawn(actor.run());

        DispatchHandle { sender }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> DispatchCommand,
    ) -> Result<T, DispatchError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| DispatchError::ControllerClosed)?;

        response.await.map_err(|_| DispatchError::ControllerClosed)?
    }

    pub async fn dispatch(&self, route_id: usize) -> Result<PlannedRoute, DispatchError> {
        self.request(|reply| DispatchCommand::Dispatch { route_id, reply })
            .await
    }

    pub async fn start_route(&self, route_id: usize) -> Result<PlannedRoute, DispatchError> {
        self.request(|reply| DispatchCommand::StartRoute { route_id, reply })
            .await
    }

    pub async fn on_delivery_confirmed(
        &self,
        stop_id: impl Into<String>,
        outcome: StopOutcome,
        confirmed_at: Timestamp,
    ) -> Result<PlannedRoute, DispatchError> {
        let stop_id = stop_id.into();
        self.request(|reply| DispatchCommand::DeliveryConfirmed {
            stop_id,
            outcome,
            confirmed_at,
            reply,
        })
        .await
    }

    pub async fn emit_delay_event(
        &self,
        route_id: usize,
        stop_id: impl Into<String>,
        delay_minutes: i64,
    ) -> Result<DelayImpact, DispatchError> {
        let stop_id = stop_id.into();
        self.request(|reply| DispatchCommand::Delay {
            route_id,
            stop_id,
            delay_minutes,
            reply,
        })
        .await
    }

    pub async fn insert_urgent(
        &self,
        request: UrgentStop,
        route_candidates: Option<Vec<usize>>,
    ) -> Result<Vec<InsertionProposal>, DispatchError> {
        self.request(|reply| DispatchCommand::InsertUrgent {
            request,
            route_candidates,
            reply,
        })
        .await
    }

    pub async fn accept_insertion(&self, proposal_id: Uuid) -> Result<PlannedRoute, DispatchError> {
        self.request(|reply| DispatchCommand::AcceptInsertion { proposal_id, reply })
            .await
    }

    pub async fn reject_insertion(&self, proposal_id: Uuid) -> Result<(), DispatchError> {
        self.request(|reply| DispatchCommand::RejectInsertion { proposal_id, reply })
            .await
    }

    pub async fn reassign_route(
        &self,
        route_id: usize,
        reason: impl Into<String>,
    ) -> Result<Vec<InsertionProposal>, DispatchError> {
        let reason = reason.into();
        self.request(|reply| DispatchCommand::ReassignRoute {
            route_id,
            reason,
            reply,
        })
        .await
    }

    pub async fn routes(&self) -> Result<Vec<RouteView>, DispatchError> {
        self.request(|reply| DispatchCommand::Routes { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatch::{controller::DispatchParams, route_state::RouteStatus},
        problem::{capacity::Capacity, location::Location, stop::StopBuilder},
        test_utils::{self, TestRoute},
    };

    fn handle() -> DispatchHandle {
        let problem = test_utils::create_default_problem(4, 1, Capacity::weight(10.0));
        let solution = test_utils::create_test_working_solution(
            problem,
            vec![TestRoute {
                resource_id: 0,
                stop_ids: vec![0, 1, 2, 3],
            }],
        );
        DispatchHandle::spawn(DispatchController::new(solution, DispatchParams::default()), 16)
    }

    #[tokio::test]
    async fn test_events_are_applied_in_order() {
        let handle = handle();

        let route = handle.dispatch(0).await.unwrap();
        let first = route.visits[0].clone();
        let second = route.visits[1].clone();

        let (confirmed, delayed) = tokio::join!(
            handle.on_delivery_confirmed(first.stop_id.clone(), StopOutcome::Delivered, first.departure),
            handle.emit_delay_event(0, second.stop_id.clone(), 10),
        );

        assert_eq!(confirmed.unwrap().visits.len(), 3);
        assert_eq!(delayed.unwrap().stop_id, second.stop_id);

        let routes = handle.routes().await.unwrap();
        assert_eq!(routes[0].status, RouteStatus::InProgress);
        assert_eq!(routes[0].completed_stops, vec![first.stop_id]);
    }

    #[tokio::test]
    async fn test_rejected_proposal_cannot_be_accepted() {
        let handle = handle();
        let mut stop = StopBuilder::default();
        stop.set_external_id("urgent-1")
            .set_demand(Capacity::weight(1.0));

        let proposals = handle
            .insert_urgent(
                UrgentStop {
                    location: Location::from_cartesian(1.0, 1.0),
                    stop,
                },
                None,
            )
            .await
            .unwrap();
        let proposal_id = proposals[0].id;

        handle.reject_insertion(proposal_id).await.unwrap();

        assert_eq!(
            handle.accept_insertion(proposal_id).await.unwrap_err(),
            DispatchError::UnknownProposal(proposal_id)
        );
    }

    #[tokio::test]
    async fn test_errors_are_returned_to_the_caller() {
        let handle = handle();

        assert_eq!(
            handle.start_route(0).await.unwrap_err(),
            DispatchError::InvalidTransition {
                route_id: 0,
                from: RouteStatus::Planned,
                to: RouteStatus::InProgress,
            }
        );
        assert_eq!(
            handle.dispatch(3).await.unwrap_err(),
            DispatchError::UnknownRoute(3)
        );
    }
}
