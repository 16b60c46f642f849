use jiff::{SignedDuration, Timestamp};
use serde::Serialize;

use crate::{
    problem::{capacity::Capacity, stop::Priority},
    solver::{
        construction::construct_solution::ConstructionStrategy,
        cost::SolutionCost,
        search::{improve_solution::SearchStrategy, termination::StopReason},
        solution::{
            route::{Route, RouteIdx},
            working_solution::WorkingSolution,
        },
        statistics::SolverStatistics,
        validator::ValidationReport,
    },
    utils::enumerate_idx::EnumerateIdx,
};

#[derive(Serialize, Debug, Clone)]
pub struct PlannedVisit {
    pub stop_id: String,
    pub arrival: Timestamp,
    pub service_start: Timestamp,
    pub departure: Timestamp,
    pub lateness: SignedDuration,
}

#[derive(Serialize, Debug, Clone)]
pub struct PlannedRoute {
    pub route_id: usize,
    pub vehicle_id: String,
    pub driver_id: String,
    pub visits: Vec<PlannedVisit>,
    pub start: Timestamp,
    pub end: Timestamp,
    pub duration: SignedDuration,
    /// Meters.
    pub distance: f64,
    pub load: Capacity,
    /// Load over vehicle capacity, in percent.
    pub utilization: f64,
    pub cost: f64,
    /// At least one leg uses an estimated travel cost.
    pub degraded: bool,
}

impl PlannedRoute {
    pub fn from_route(solution: &WorkingSolution, route_id: usize, route: &Route) -> Self {
        let problem = solution.problem();
        let vehicle = problem.resource_vehicle(route.resource_id());
        let driver = problem.resource_driver(route.resource_id());

        PlannedRoute {
            route_id,
            vehicle_id: vehicle.external_id().to_owned(),
            driver_id: driver.external_id().to_owned(),
            visits: route
                .stops()
                .iter()
                .zip(route.visits())
                .map(|(&stop_id, visit)| PlannedVisit {
                    stop_id: problem.stop(stop_id).external_id().to_owned(),
                    arrival: visit.arrival,
                    service_start: visit.service_start,
                    departure: visit.departure,
                    lateness: visit.lateness,
                })
                .collect(),
            start: route.start(),
            end: route.end(),
            duration: route.duration(),
            distance: route.distance(),
            load: route.load(),
            utilization: route.load().utilization(vehicle.capacity()) * 100.0,
            cost: route.cost(),
            degraded: route.is_degraded(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct UnassignedStop {
    pub stop_id: String,
    pub priority: Priority,
}

#[derive(Serialize, Debug, Clone)]
pub struct PlanMetrics {
    pub cost: SolutionCost,
    /// Meters.
    pub total_distance: f64,
    pub total_duration: SignedDuration,
    pub unassigned_count: usize,
    pub soft_violation_count: usize,
    pub degraded: bool,
    pub estimated_pairs: usize,
    pub seed: u64,
    pub construction_strategy: ConstructionStrategy,
    pub search_strategy: SearchStrategy,
    pub stop_reason: Option<StopReason>,
    pub iterations: usize,
    pub elapsed: SignedDuration,
    pub constraint_version: u32,
}

/// Finalized plan, only built after the validator pass.
#[derive(Serialize, Debug, Clone)]
pub struct PlanResult {
    pub routes: Vec<PlannedRoute>,
    pub unassigned: Vec<UnassignedStop>,
    pub metrics: PlanMetrics,
    /// False when the run was cut by its wall-clock budget or cancelled.
    pub converged: bool,
    pub degraded: bool,
    pub validation: ValidationReport,
    pub statistics: SolverStatistics,
}

pub struct PlanSummary {
    pub seed: u64,
    pub construction_strategy: ConstructionStrategy,
    pub search_strategy: SearchStrategy,
    pub stop_reason: Option<StopReason>,
    pub converged: bool,
    pub elapsed: SignedDuration,
}

impl PlanResult {
    pub fn new(
        solution: &WorkingSolution,
        summary: PlanSummary,
        validation: ValidationReport,
        statistics: SolverStatistics,
    ) -> Self {
        let problem = solution.problem();
        let routes: Vec<PlannedRoute> = solution
            .routes()
            .iter()
            .enumerate_idx()
            .filter(|(_, route): &(RouteIdx, &Route)| !route.is_empty())
            .map(|(route_id, route)| PlannedRoute::from_route(solution, route_id.get(), route))
            .collect();

        let unassigned = solution
            .unassigned()
            .iter()
            .map(|&stop_id| {
                let stop = problem.stop(stop_id);
                UnassignedStop {
                    stop_id: stop.external_id().to_owned(),
                    priority: stop.priority(),
                }
            })
            .collect();

        let estimated_pairs = problem.travel_costs().estimated_pairs();
        let degraded = routes.iter().any(|route| route.degraded);

        let metrics = PlanMetrics {
            cost: solution.cost(),
            total_distance: solution.total_distance(),
            total_duration: routes
                .iter()
                .map(|route| route.duration)
                .fold(SignedDuration::ZERO, |total, duration| total + duration),
            unassigned_count: solution.unassigned().len(),
            soft_violation_count: solution.soft_violations(),
            degraded,
            estimated_pairs,
            seed: summary.seed,
            construction_strategy: summary.construction_strategy,
            search_strategy: summary.search_strategy,
            stop_reason: summary.stop_reason,
            iterations: statistics.iterations,
            elapsed: summary.elapsed,
            constraint_version: solution.constraints().version(),
        };

        PlanResult {
            routes,
            unassigned,
            metrics,
            converged: summary.converged,
            degraded,
            validation,
            statistics,
        }
    }
}
