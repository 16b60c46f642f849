use std::sync::Arc;

use courier_matrix_providers::{
    travel_matrix_client::TravelMatrixClient, travel_matrix_provider::TravelMatrixProvider,
};
use futures::future::join_all;
use jiff::civil::Date;
use tracing::{info, instrument};

use crate::{
    dispatch::{
        actor::DispatchHandle,
        controller::{DispatchController, DispatchParams},
    },
    error::EngineError,
    json::types::JsonPlanningRequest,
    problem::planning_problem::PlanningProblem,
    solver::{
        constraints::constraint_set::ConstraintSet,
        plan_result::PlanResult,
        solution::working_solution::WorkingSolution,
        solver::Solver,
        solver_params::SolverParams,
    },
};

use super::collaborators::{DispatchSink, OrderSource, RosterSource};

const DISPATCH_BUFFER: usize = 64;

/// Plans depots from the orders and rosters of its collaborators.
///
/// Every run snapshots its inputs and owns its own state, runs for different
/// depots or days proceed concurrently on the blocking pool.
pub struct PlanningService<O, R, S> {
    orders: O,
    roster: R,
    sink: S,
    client: Arc<TravelMatrixClient>,
    provider: TravelMatrixProvider,
    params: SolverParams,
    dispatch_params: DispatchParams,
}

impl<O, R, S> PlanningService<O, R, S>
where
    O: OrderSource,
    R: RosterSource,
    S: DispatchSink,
{
    pub fn new(orders: O, roster: R, sink: S) -> Self {
        PlanningService {
            orders,
            roster,
            sink,
            client: Arc::new(TravelMatrixClient::default()),
            provider: TravelMatrixProvider::from_env(),
            params: SolverParams::default(),
            dispatch_params: DispatchParams::default(),
        }
    }

    pub fn with_matrix_client(mut self, client: Arc<TravelMatrixClient>) -> Self {
        self.client = client;
        self
    }

    pub fn with_provider(mut self, provider: TravelMatrixProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_solver_params(mut self, params: SolverParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_dispatch_params(mut self, params: DispatchParams) -> Self {
        self.dispatch_params = params;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Plans one depot for one day and pushes the routes to the sink.
    pub async fn optimize(
        &self,
        depot_id: &str,
        date: Date,
        constraint_set: ConstraintSet,
    ) -> Result<PlanResult, EngineError> {
        self.plan(depot_id, date, constraint_set)
            .await
            .map(|(plan, _)| plan)
    }

    /// Like `optimize`, then hands the plan over to a dispatch actor for the
    /// rest of the day.
    pub async fn optimize_and_dispatch(
        &self,
        depot_id: &str,
        date: Date,
        constraint_set: ConstraintSet,
    ) -> Result<(PlanResult, DispatchHandle), EngineError> {
        let (plan, solution) = self.plan(depot_id, date, constraint_set).await?;
        let controller = DispatchController::new(solution, self.dispatch_params.clone());

        Ok((plan, DispatchHandle::spawn(controller, DISPATCH_BUFFER)))
    }

    /// Independent runs, each with its own constraint set. Results come back
    /// in the order of `runs`.
    pub async fn optimize_many(
        &self,
        runs: Vec<(String, Date, ConstraintSet)>,
    ) -> Vec<Result<PlanResult, EngineError>> {
        join_all(
            runs.into_iter()
                .map(|(depot_id, date, constraint_set)| async move {
                    self.optimize(&depot_id, date, constraint_set).await
                }),
        )
        .await
    }

    #[instrument(skip(self, constraint_set), level = "debug")]
    async fn plan(
        &self,
        depot_id: &str,
        date: Date,
        constraint_set: ConstraintSet,
    ) -> Result<(PlanResult, WorkingSolution), EngineError> {
        let problem = self.build_problem(depot_id, date).await?;
        let params = self.params.clone();

        let (plan, solution) = tokio::task::spawn_blocking(move || {
            Solver::new(problem, constraint_set, params).solve_with_solution()
        })
        .await??;

        info!(
            routes = plan.routes.len(),
            unassigned = plan.unassigned.len(),
            converged = plan.converged,
            degraded = plan.degraded,
            "Planned {depot_id} on {date}"
        );

        self.sink
            .push_routes(depot_id, date, &plan)
            .await
            .map_err(|source| EngineError::Collaborator {
                what: "dispatch sink",
                source,
            })?;

        Ok((plan, solution))
    }

    async fn build_problem(&self, depot_id: &str, date: Date) -> Result<PlanningProblem, EngineError> {
        let (stops, roster) = futures::join!(
            self.orders.fetch_pending_orders(depot_id, date),
            self.roster.fetch_roster(depot_id, date)
        );
        let stops = stops.map_err(|source| EngineError::Collaborator {
            what: "pending orders",
            source,
        })?;
        let roster = roster.map_err(|source| EngineError::Collaborator {
            what: "roster",
            source,
        })?;

        let request = JsonPlanningRequest {
            depot_id: depot_id.to_owned(),
            date,
            depot: roster.depot,
            stops,
            vehicles: roster.vehicles,
            drivers: roster.drivers,
            cost_provider: Some(self.provider.clone()),
            constraints: None,
        };

        request
            .build_problem(&self.client, self.params.matrix_threshold)
            .await
            .map_err(EngineError::TravelMatrix)
    }
}
