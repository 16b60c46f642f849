use std::sync::atomic::{AtomicU64, Ordering};

use fxhash::FxHashMap;
use jiff::{SignedDuration, Timestamp};

use crate::{
    define_index_newtype,
    problem::{
        capacity::Capacity, location::LocationIdx, planning_problem::PlanningProblem,
        resource::ResourceIdx, stop::StopIdx,
    },
    solver::constraints::constraint_set::ConstraintSet,
    utils::time::hours,
};

use super::schedule::{ScheduleCursor, Visit};

define_index_newtype!(RouteIdx, Route);

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// Versions are unique across all routes of all solutions, equal versions
/// mean equal stop sequences and schedules.
fn next_version() -> u64 {
    NEXT_VERSION.fetch_add(1, Ordering::Relaxed)
}

impl From<ResourceIdx> for RouteIdx {
    fn from(resource_id: ResourceIdx) -> Self {
        RouteIdx::new(resource_id.get())
    }
}

/// Where an executing route currently stands: the last confirmed stop and
/// what has been consumed to reach it. Schedules of the remaining stops
/// start from here.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAnchor {
    pub location_id: LocationIdx,
    pub departure: Timestamp,
    pub started_at: Timestamp,
    pub distance: f64,
    pub driving: SignedDuration,
    /// Load already handed over, it still counted against capacity when the
    /// vehicle left the depot.
    pub committed_load: Capacity,
}

/// Outcome of evaluating a modified stop sequence without applying it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteChange {
    pub cost: f64,
    pub distance: f64,
    pub driving: SignedDuration,
    pub start: Timestamp,
    pub end: Timestamp,
    pub load: Capacity,
    pub lateness_penalty: f64,
    pub max_lateness: SignedDuration,
    /// How much later the first stop after the change is reached, or the
    /// route end when no stop follows.
    pub first_shift: SignedDuration,
}

#[derive(Debug, Clone)]
pub struct Route {
    resource_id: ResourceIdx,
    stops: Vec<StopIdx>,
    visits: Vec<Visit>,
    anchor: Option<RouteAnchor>,
    frozen: usize,
    delays: FxHashMap<StopIdx, SignedDuration>,

    start: Timestamp,
    end: Timestamp,
    load: Capacity,
    /// Distance and driving seconds from the origin (anchor or depot), end
    /// leg included.
    trip_distance: f64,
    trip_driving: f64,
    /// Distance and driving seconds on arrival at each position.
    cum_distance: Vec<f64>,
    cum_driving: Vec<f64>,
    /// Penalty and worst lateness of positions before `i`, `len + 1` entries.
    prefix_penalty: Vec<f64>,
    prefix_max_lateness: Vec<SignedDuration>,
    /// Worst lateness of positions from `i` on, `len + 1` entries.
    suffix_max_lateness: Vec<SignedDuration>,
    lateness_penalty: f64,
    soft_violations: usize,
    estimated_legs: usize,
    cost: f64,
    version: u64,
}

impl Route {
    pub fn empty(problem: &PlanningProblem, resource_id: ResourceIdx) -> Self {
        let shift_start = problem.resource_vehicle(resource_id).shift().start;
        Route {
            resource_id,
            stops: Vec::new(),
            visits: Vec::new(),
            anchor: None,
            frozen: 0,
            delays: FxHashMap::default(),
            start: shift_start,
            end: shift_start,
            load: Capacity::EMPTY,
            trip_distance: 0.0,
            trip_driving: 0.0,
            cum_distance: Vec::new(),
            cum_driving: Vec::new(),
            prefix_penalty: vec![0.0],
            prefix_max_lateness: vec![SignedDuration::ZERO],
            suffix_max_lateness: vec![SignedDuration::ZERO],
            lateness_penalty: 0.0,
            soft_violations: 0,
            estimated_legs: 0,
            cost: 0.0,
            version: next_version(),
        }
    }

    pub fn resource_id(&self) -> ResourceIdx {
        self.resource_id
    }

    pub fn stops(&self) -> &[StopIdx] {
        &self.stops
    }

    pub fn stop(&self, position: usize) -> StopIdx {
        self.stops[position]
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// No stops left and never started.
    pub fn is_idle(&self) -> bool {
        self.stops.is_empty() && self.anchor.is_none()
    }

    pub fn contains(&self, stop_id: StopIdx) -> bool {
        self.stops.contains(&stop_id)
    }

    pub fn position_of(&self, stop_id: StopIdx) -> Option<usize> {
        self.stops.iter().position(|&s| s == stop_id)
    }

    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    pub fn visit(&self, position: usize) -> &Visit {
        &self.visits[position]
    }

    pub fn anchor(&self) -> Option<&RouteAnchor> {
        self.anchor.as_ref()
    }

    /// Positions before this index cannot be changed.
    pub fn frozen(&self) -> usize {
        self.frozen
    }

    pub fn delay(&self, stop_id: StopIdx) -> SignedDuration {
        self.delays
            .get(&stop_id)
            .copied()
            .unwrap_or(SignedDuration::ZERO)
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn duration(&self) -> SignedDuration {
        self.end.duration_since(self.start)
    }

    pub fn distance(&self) -> f64 {
        self.anchor.as_ref().map_or(0.0, |anchor| anchor.distance) + self.trip_distance
    }

    pub fn driving(&self) -> SignedDuration {
        self.anchor
            .as_ref()
            .map_or(SignedDuration::ZERO, |anchor| anchor.driving)
            + SignedDuration::from_secs_f64(self.trip_driving)
    }

    pub fn load(&self) -> Capacity {
        self.load
    }

    pub fn lateness_penalty(&self) -> f64 {
        self.lateness_penalty
    }

    pub fn max_lateness(&self) -> SignedDuration {
        self.suffix_max_lateness[0]
    }

    pub fn soft_violations(&self) -> usize {
        self.soft_violations
    }

    pub fn estimated_legs(&self) -> usize {
        self.estimated_legs
    }

    pub fn is_degraded(&self) -> bool {
        self.estimated_legs > 0
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn capacity_overage(&self, problem: &PlanningProblem) -> f64 {
        self.load
            .overage(problem.resource_vehicle(self.resource_id).capacity())
    }

    fn origin(&self, problem: &PlanningProblem, first_stop: Option<StopIdx>) -> (LocationIdx, Timestamp) {
        if let Some(anchor) = &self.anchor {
            return (anchor.location_id, anchor.departure);
        }

        let vehicle = problem.resource_vehicle(self.resource_id);
        let depot = vehicle.start_location_id();
        let shift_start = vehicle.shift().start;

        // Leave late enough not to wait at the first stop
        let start = first_stop
            .and_then(|stop_id| {
                let stop = problem.stop(stop_id);
                let opening = stop.time_window().start()?;
                let leg = problem.travel(depot, stop.location_id());
                Some((opening - leg.duration()).max(shift_start))
            })
            .unwrap_or(shift_start);

        (depot, start)
    }

    fn base_load(&self) -> Capacity {
        self.anchor
            .as_ref()
            .map_or(Capacity::EMPTY, |anchor| anchor.committed_load)
    }

    /// Recomputes every cached value from the stop sequence.
    pub(crate) fn update(&mut self, problem: &PlanningProblem, constraints: &ConstraintSet) {
        self.version = next_version();

        let vehicle = problem.resource_vehicle(self.resource_id);
        let (location, time) = self.origin(problem, self.stops.first().copied());
        self.start = self.anchor.as_ref().map_or(time, |anchor| anchor.started_at);

        self.visits.clear();
        self.cum_distance.clear();
        self.cum_driving.clear();
        self.prefix_penalty.clear();
        self.prefix_max_lateness.clear();
        self.prefix_penalty.push(0.0);
        self.prefix_max_lateness.push(SignedDuration::ZERO);
        self.soft_violations = 0;

        let mut cursor = ScheduleCursor::new(problem, constraints, &self.delays, location, time);
        for &stop_id in &self.stops {
            let visit = cursor.visit(stop_id);
            if visit.lateness.is_positive() {
                self.soft_violations += 1;
            }
            self.visits.push(visit);
            self.cum_distance.push(cursor.distance);
            self.cum_driving.push(cursor.driving);
            self.prefix_penalty.push(cursor.penalty);
            self.prefix_max_lateness.push(cursor.max_lateness);
        }

        self.end = if self.is_idle() {
            time
        } else {
            cursor.finish(vehicle)
        };

        self.trip_distance = cursor.distance;
        self.trip_driving = cursor.driving;
        self.lateness_penalty = cursor.penalty;
        self.estimated_legs = cursor.estimated_legs;

        self.suffix_max_lateness.clear();
        self.suffix_max_lateness
            .resize(self.stops.len() + 1, SignedDuration::ZERO);
        for position in (0..self.stops.len()).rev() {
            self.suffix_max_lateness[position] =
                self.visits[position].lateness.max(self.suffix_max_lateness[position + 1]);
        }

        self.load = self.base_load()
            + self
                .stops
                .iter()
                .map(|&stop_id| problem.stop(stop_id).demand())
                .sum();

        self.cost = if self.is_idle() {
            0.0
        } else {
            route_cost(
                problem,
                constraints,
                self.resource_id,
                self.distance(),
                self.start,
                self.end,
                self.lateness_penalty,
                self.load,
            )
        };
    }

    /// Evaluates replacing `stops[start..end]` with `replacement`. Returns
    /// `None` when the resulting route breaks a hard constraint or touches a
    /// frozen position.
    ///
    /// The schedule is re-simulated from `start` and stops as soon as a visit
    /// departs at the same time as before, the remainder is read from the
    /// cached prefix sums.
    pub fn evaluate_change(
        &self,
        problem: &PlanningProblem,
        constraints: &ConstraintSet,
        replacement: &[StopIdx],
        start: usize,
        end: usize,
    ) -> Option<RouteChange> {
        debug_assert!(start <= end && end <= self.stops.len());

        if start < self.frozen {
            return None;
        }

        let enforce_zones = constraints.hard().enforce_zones;
        if replacement
            .iter()
            .any(|&stop_id| !problem.is_eligible(self.resource_id, stop_id, enforce_zones))
        {
            return None;
        }

        let vehicle = problem.resource_vehicle(self.resource_id);
        let removed: Capacity = self.stops[start..end]
            .iter()
            .map(|&stop_id| problem.stop(stop_id).demand())
            .sum();
        let added: Capacity = replacement
            .iter()
            .map(|&stop_id| problem.stop(stop_id).demand())
            .sum();
        let load = self.load - removed + added;

        if !load.fits_within(&constraints.capacity_limit(vehicle.capacity())) {
            return None;
        }

        let new_len = self.stops.len() - (end - start) + replacement.len();
        if new_len == 0 && self.anchor.is_none() {
            let shift_start = vehicle.shift().start;
            return Some(RouteChange {
                cost: 0.0,
                distance: 0.0,
                driving: SignedDuration::ZERO,
                start: shift_start,
                end: shift_start,
                load: Capacity::EMPTY,
                lateness_penalty: 0.0,
                max_lateness: SignedDuration::ZERO,
                first_shift: SignedDuration::ZERO,
            });
        }

        let (location, time) = if start == 0 {
            let first = replacement.first().or_else(|| self.stops.get(end)).copied();
            self.origin(problem, first)
        } else {
            let previous = start - 1;
            (
                problem.stop(self.stops[previous]).location_id(),
                self.visits[previous].departure,
            )
        };
        let work_start = match (&self.anchor, start) {
            (Some(anchor), _) => anchor.started_at,
            (None, 0) => time,
            (None, _) => self.start,
        };

        let mut cursor = ScheduleCursor::new(problem, constraints, &self.delays, location, time);
        if start > 0 {
            cursor.distance = self.cum_distance[start - 1];
            cursor.driving = self.cum_driving[start - 1];
            cursor.penalty = self.prefix_penalty[start];
            cursor.max_lateness = self.prefix_max_lateness[start];
        }

        for &stop_id in replacement {
            cursor.visit(stop_id);
        }

        let len = self.stops.len();
        let mut first_shift = None;
        let mut converged = false;
        for position in end..len {
            let previous = &self.visits[position];
            let visit = cursor.visit(self.stops[position]);

            if first_shift.is_none() {
                first_shift = Some(visit.arrival.duration_since(previous.arrival));
            }

            if visit.departure == previous.departure {
                cursor.penalty += self.prefix_penalty[len] - self.prefix_penalty[position + 1];
                cursor.max_lateness = cursor
                    .max_lateness
                    .max(self.suffix_max_lateness[position + 1]);
                cursor.distance += self.trip_distance - self.cum_distance[position];
                cursor.driving += self.trip_driving - self.cum_driving[position];
                converged = true;
                break;
            }
        }

        let end_time = if converged {
            self.end
        } else {
            cursor.finish(vehicle)
        };
        let first_shift = first_shift.unwrap_or_else(|| end_time.duration_since(self.end));

        let anchor_distance = self.anchor.as_ref().map_or(0.0, |anchor| anchor.distance);
        let anchor_driving = self
            .anchor
            .as_ref()
            .map_or(SignedDuration::ZERO, |anchor| anchor.driving);
        let distance = anchor_distance + cursor.distance;
        let driving = anchor_driving + SignedDuration::from_secs_f64(cursor.driving);

        if cursor.max_lateness > constraints.lateness_tolerance() || end_time > vehicle.shift().end {
            return None;
        }

        if constraints.hard().enforce_driver_hours {
            if let Some(maximum) = vehicle.maximum_driving_duration()
                && driving > maximum
            {
                return None;
            }

            let driver = problem.resource_driver(self.resource_id);
            if let Some(maximum) = driver.maximum_working_duration()
                && end_time.duration_since(work_start) > maximum
            {
                return None;
            }
        }

        Some(RouteChange {
            cost: route_cost(
                problem,
                constraints,
                self.resource_id,
                distance,
                work_start,
                end_time,
                cursor.penalty,
                load,
            ),
            distance,
            driving,
            start: work_start,
            end: end_time,
            load,
            lateness_penalty: cursor.penalty,
            max_lateness: cursor.max_lateness,
            first_shift,
        })
    }

    /// Replaces `stops[start..end]` with `replacement` and refreshes the caches.
    pub(crate) fn replace(
        &mut self,
        problem: &PlanningProblem,
        constraints: &ConstraintSet,
        replacement: &[StopIdx],
        start: usize,
        end: usize,
    ) -> Vec<StopIdx> {
        let removed = self
            .stops
            .splice(start..end, replacement.iter().copied())
            .collect();
        self.update(problem, constraints);
        removed
    }

    pub(crate) fn set_frozen(&mut self, frozen: usize) {
        self.frozen = frozen.min(self.stops.len());
    }

    pub(crate) fn set_anchor(&mut self, anchor: RouteAnchor) {
        self.anchor = Some(anchor);
    }

    pub(crate) fn add_delay(&mut self, stop_id: StopIdx, delay: SignedDuration) {
        *self.delays.entry(stop_id).or_insert(SignedDuration::ZERO) += delay;
    }

    /// Drops the first stop after it was confirmed, re-anchoring the route
    /// on it.
    pub(crate) fn confirm_stop(
        &mut self,
        problem: &PlanningProblem,
        constraints: &ConstraintSet,
        position: usize,
        confirmed_at: Timestamp,
    ) -> StopIdx {
        let stop_id = self.stops[position];
        let stop = problem.stop(stop_id);

        let anchor = RouteAnchor {
            location_id: stop.location_id(),
            departure: confirmed_at.max(self.visits[position].service_start),
            started_at: self.start,
            distance: self.anchor.as_ref().map_or(0.0, |anchor| anchor.distance)
                + self.cum_distance[position],
            driving: self
                .anchor
                .as_ref()
                .map_or(SignedDuration::ZERO, |anchor| anchor.driving)
                + SignedDuration::from_secs_f64(self.cum_driving[position]),
            committed_load: self.base_load() + stop.demand(),
        };

        self.stops.remove(position);
        self.delays.remove(&stop_id);
        self.anchor = Some(anchor);
        self.frozen = self.frozen.saturating_sub(1);
        self.update(problem, constraints);

        stop_id
    }
}

#[allow(clippy::too_many_arguments)]
fn route_cost(
    problem: &PlanningProblem,
    constraints: &ConstraintSet,
    resource_id: ResourceIdx,
    distance: f64,
    start: Timestamp,
    end: Timestamp,
    lateness_penalty: f64,
    load: Capacity,
) -> f64 {
    let weights = constraints.weights();
    let capacity = problem.resource_vehicle(resource_id).capacity();
    let duration = hours(end.duration_since(start));

    weights.distance_per_km * distance / 1000.0
        + weights.duration_per_hour * duration
        + lateness_penalty
        + weights.capacity_overage_per_unit * load.overage(capacity)
        + weights.workload_balance * duration * duration
}
