use std::sync::Arc;

use fxhash::FxHashSet;
use jiff::SignedDuration;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    problem::stop::StopIdx,
    solver::{
        constraints::{
            constraint::{Violation, ViolationKind, check_route, check_solution},
            constraint_set::Relaxation,
        },
        insertion::best_insertion,
        search::local_search::LocalSearch,
        solution::{route::RouteIdx, working_solution::WorkingSolution},
        solver_params::ValidatorParams,
    },
};

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelaxationStep {
    WidenLateness { extra_lateness: SignedDuration },
    AllowCapacityOverage { ratio: f64 },
    Unassign { stop_ids: Vec<StopIdx> },
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct ValidationReport {
    /// Violations found before any relaxation.
    pub initial_violations: Vec<Violation>,
    pub steps: Vec<RelaxationStep>,
    pub relaxation: Relaxation,
    /// Stops the validator had to take out of their route.
    pub unassigned: Vec<StopIdx>,
    /// Unassigned stops placed once the lateness tolerance was widened.
    pub reinserted: Vec<StopIdx>,
    /// Violations left on frozen stops the validator may not touch.
    pub remaining_violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_relaxed(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// Final feasibility pass. Hard violations are resolved by relaxing the
/// constraint set in a fixed order: wider lateness tolerance, then capacity
/// overage with surcharge, then unassigning the offending stops. Each step
/// runs a bounded local search over the affected routes only.
///
/// Stops left unassigned because every position was too late are treated as
/// lateness violations: the tolerance is widened until they fit.
pub struct Validator {
    params: ValidatorParams,
}

impl Validator {
    pub fn new(params: ValidatorParams) -> Self {
        Validator { params }
    }

    #[instrument(skip_all, level = "debug")]
    pub fn validate(&self, solution: &mut WorkingSolution) -> ValidationReport {
        let mut violations = check_solution(solution);
        let mut report = ValidationReport {
            initial_violations: violations.clone(),
            relaxation: solution.constraints().relaxation().clone(),
            ..ValidationReport::default()
        };
        let mut stranded = self.stranded_by_lateness(solution);

        if violations.is_empty() && stranded.is_empty() {
            return report;
        }
        if !violations.is_empty() {
            warn!("Found {} hard constraint violations", violations.len());
        }
        if !stranded.is_empty() {
            warn!("{} unassigned stops only fit with a wider lateness tolerance", stranded.len());
        }

        while (has_kind(&violations, ViolationKind::Lateness) || !stranded.is_empty())
            && report.relaxation.extra_lateness < self.params.max_extra_lateness
        {
            let extra_lateness = (report.relaxation.extra_lateness + self.params.lateness_step)
                .min(self.params.max_extra_lateness);
            report.relaxation.extra_lateness = extra_lateness;
            info!(%extra_lateness, "Relax lateness tolerance");
            report
                .steps
                .push(RelaxationStep::WidenLateness { extra_lateness });

            let constraints = solution.constraints().relaxed(report.relaxation.clone());
            solution.set_constraints(Arc::new(constraints));
            let mut routes = affected_routes(&violations);
            for (route_id, stop_id) in reinsert(solution, &mut stranded) {
                report.reinserted.push(stop_id);
                if !routes.contains(&route_id) {
                    routes.push(route_id);
                }
            }
            self.repair(solution, &routes);
            violations = check_solution(solution);
        }

        if has_kind(&violations, ViolationKind::Capacity)
            && report.relaxation.capacity_overage_ratio < self.params.capacity_overage_ratio
        {
            let ratio = self.params.capacity_overage_ratio;
            report.relaxation.capacity_overage_ratio = ratio;
            info!(ratio, "Allow capacity overage");
            report
                .steps
                .push(RelaxationStep::AllowCapacityOverage { ratio });

            violations = self.relax(solution, &report.relaxation, &violations);
        }

        if !violations.is_empty() {
            let affected = affected_routes(&violations);
            let mut unassigned = Vec::new();
            for &route_id in &affected {
                unassigned.extend(unassign_offending(solution, route_id));
            }

            if !unassigned.is_empty() {
                warn!("Unassigned {} stops to restore feasibility", unassigned.len());
                report.steps.push(RelaxationStep::Unassign {
                    stop_ids: unassigned.clone(),
                });
            }

            self.repair(solution, &affected);
            // The repair only inserts at feasible positions
            unassigned.retain(|&stop_id| solution.is_unassigned(stop_id));
            report.unassigned = unassigned;
            violations = check_solution(solution);
        }

        if !violations.is_empty() {
            warn!(
                "{} violations remain on frozen stops",
                violations.len()
            );
        }
        report.remaining_violations = violations;
        report
    }

    fn relax(
        &self,
        solution: &mut WorkingSolution,
        relaxation: &Relaxation,
        violations: &[Violation],
    ) -> Vec<Violation> {
        let constraints = solution.constraints().relaxed(relaxation.clone());
        solution.set_constraints(Arc::new(constraints));
        self.repair(solution, &affected_routes(violations));
        check_solution(solution)
    }

    fn repair(&self, solution: &mut WorkingSolution, routes: &[RouteIdx]) {
        LocalSearch::scoped(routes.iter().copied()).descend(solution, self.params.repair_iterations);
    }

    /// Unassigned stops with a feasible position under the widest lateness
    /// tolerance the validator may grant.
    fn stranded_by_lateness(&self, solution: &WorkingSolution) -> Vec<StopIdx> {
        if !solution.has_unassigned()
            || solution.constraints().relaxation().extra_lateness >= self.params.max_extra_lateness
        {
            return Vec::new();
        }

        let mut relaxation = solution.constraints().relaxation().clone();
        relaxation.extra_lateness = self.params.max_extra_lateness;
        let mut widened = solution.clone();
        widened.set_constraints(Arc::new(solution.constraints().relaxed(relaxation)));

        let enforce_zones = widened.constraints().hard().enforce_zones;
        widened
            .unassigned()
            .iter()
            .copied()
            .filter(|&stop_id| {
                let candidates = widened
                    .problem()
                    .eligible_resources(stop_id, enforce_zones)
                    .map(RouteIdx::from);
                best_insertion(&widened, stop_id, candidates).is_some()
            })
            .collect()
    }
}

/// Places the stranded stops that fit under the current tolerance, cheapest
/// first. Returns where each placed stop went.
fn reinsert(solution: &mut WorkingSolution, stranded: &mut Vec<StopIdx>) -> Vec<(RouteIdx, StopIdx)> {
    let enforce_zones = solution.constraints().hard().enforce_zones;
    let mut placed = Vec::new();

    stranded.retain(|&stop_id| {
        let candidates: Vec<RouteIdx> = solution
            .problem()
            .eligible_resources(stop_id, enforce_zones)
            .map(RouteIdx::from)
            .collect();

        match best_insertion(solution, stop_id, candidates) {
            Some(insertion) => {
                let _ = insertion.into_move().apply(solution);
                placed.push((insertion.route_id, stop_id));
                false
            }
            None => true,
        }
    });

    placed
}

fn has_kind(violations: &[Violation], kind: ViolationKind) -> bool {
    violations.iter().any(|violation| violation.kind == kind)
}

fn affected_routes(violations: &[Violation]) -> Vec<RouteIdx> {
    let mut seen = FxHashSet::default();
    violations
        .iter()
        .map(|violation| violation.route_id)
        .filter(|&route_id| seen.insert(route_id))
        .collect()
}

/// Removes stops from the route until it is feasible: the blamed stop when
/// there is one, the last unfrozen stop otherwise.
fn unassign_offending(solution: &mut WorkingSolution, route_id: RouteIdx) -> Vec<StopIdx> {
    let mut removed = Vec::new();
    loop {
        let route = solution.route(route_id);
        let violations = check_route(solution.problem(), solution.constraints(), route);
        if violations.is_empty() || route.len() <= route.frozen() {
            return removed;
        }

        let blamed = violations
            .iter()
            .filter_map(|violation| violation.stop_id)
            .filter_map(|stop_id| route.position_of(stop_id))
            .find(|&position| position >= route.frozen());
        let position = blamed.unwrap_or(route.len() - 1);

        removed.push(solution.remove_stop(route_id, position));
    }
}
