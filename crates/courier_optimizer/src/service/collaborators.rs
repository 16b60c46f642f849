
use std::sync::Arc;

use fxhash::FxHashMap;
use jiff::civil::Date;
use parking_lot::Mutex;

use crate::{
    json::types::{JsonDriver, JsonLocation, JsonPlanningRequest, JsonStop, JsonVehicle},
    solver::plan_result::PlanResult,
};

/// Vehicles and drivers working out of a depot on a given day.
#[derive(Clone, Debug)]
pub struct Roster {
    pub depot: JsonLocation,
    pub vehicles: Vec<JsonVehicle>,
    pub drivers: Vec<JsonDriver>,
}

pub trait OrderSource: Send + Sync {
    fn fetch_pending_orders(
        &self,
        depot_id: &str,
        date: Date,
    ) -> impl Future<Output = anyhow::Result<Vec<JsonStop>>> + Send;
}

pub trait RosterSource: Send + Sync {
    fn fetch_roster(
        &self,
        depot_id: &str,
        date: Date,
    ) -> impl Future<Output = anyhow::Result<Roster>> + Send;
}

/// Receives finalized plans.
pub trait DispatchSink: Send + Sync {
    fn push_routes(
        &self,
        depot_id: &str,
        date: Date,
        plan: &PlanResult,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl<T: OrderSource> OrderSource for Arc<T> {
    fn fetch_pending_orders(
        &self,
        depot_id: &str,
        date: Date,
    ) -> impl Future<Output = anyhow::Result<Vec<JsonStop>>> + Send {
        (**self).fetch_pending_orders(depot_id, date)
    }
}

impl<T: RosterSource> RosterSource for Arc<T> {
    fn fetch_roster(
        &self,
        depot_id: &str,
        date: Date,
    ) -> impl Future<Output = anyhow::Result<Roster>> + Send {
        (**self).fetch_roster(depot_id, date)
    }
}

impl<T: DispatchSink> DispatchSink for Arc<T> {
    fn push_routes(
        &self,
        depot_id: &str,
        date: Date,
        plan: &PlanResult,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).push_routes(depot_id, date, plan)
    }
}

/// Orders and rosters read from planning requests kept in memory, plans are
/// kept as they are pushed.
#[derive(Default)]
pub struct InMemoryCollaborators {
    requests: FxHashMap<(String, Date), JsonPlanningRequest>,
    pushed: Mutex<Vec<(String, Date, PlanResult)>>,
}

impl InMemoryCollaborators {
    pub fn add_request(&mut self, request: JsonPlanningRequest) -> &mut InMemoryCollaborators {
        self.requests
            .insert((request.depot_id.clone(), request.date), request);
        self
    }

    pub fn request(&self, depot_id: &str, date: Date) -> anyhow::Result<&JsonPlanningRequest> {
        self.requests
            .get(&(depot_id.to_owned(), date))
            .ok_or_else(|| anyhow::anyhow!("No planning request for depot {depot_id} on {date}"))
    }

    pub fn pushed(&self) -> Vec<(String, Date, PlanResult)> {
        self.pushed.lock().clone()
    }
}

impl OrderSource for InMemoryCollaborators {
    async fn fetch_pending_orders(&self, depot_id: &str, date: Date) -> anyhow::Result<Vec<JsonStop>> {
        Ok(self.request(depot_id, date)?.stops.clone())
    }
}

impl RosterSource for InMemoryCollaborators {
    async fn fetch_roster(&self, depot_id: &str, date: Date) -> anyhow::Result<Roster> {
        let request = self.request(depot_id, date)?;
        Ok(Roster {
            depot: request.depot,
            vehicles: request.vehicles.clone(),
            drivers: request.drivers.clone(),
        })
    }
}

impl DispatchSink for InMemoryCollaborators {
    async fn push_routes(&self, depot_id: &str, date: Date, plan: &PlanResult) -> anyhow::Result<()> {
        self.pushed
            .lock()
            .push((depot_id.to_owned(), date, plan.clone()));
        Ok(())
    }
}
