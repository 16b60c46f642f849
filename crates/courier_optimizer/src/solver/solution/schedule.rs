use fxhash::FxHashMap;
use jiff::{SignedDuration, Timestamp};
use serde::Serialize;

use crate::{
    problem::{
        location::LocationIdx, planning_problem::PlanningProblem, stop::StopIdx, vehicle::Vehicle,
    },
    solver::constraints::{constraint_set::ConstraintSet, time_window_constraint::lateness_penalty},
};

/// Timing of one stop in a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Visit {
    pub arrival: Timestamp,
    pub service_start: Timestamp,
    pub departure: Timestamp,
    pub lateness: SignedDuration,
}

/// Walks a stop sequence accumulating travel, waiting and service.
pub(crate) struct ScheduleCursor<'a> {
    problem: &'a PlanningProblem,
    constraints: &'a ConstraintSet,
    delays: &'a FxHashMap<StopIdx, SignedDuration>,
    pub location: LocationIdx,
    pub time: Timestamp,
    /// Meters since the route origin.
    pub distance: f64,
    /// Seconds of driving since the route origin.
    pub driving: f64,
    pub penalty: f64,
    pub max_lateness: SignedDuration,
    pub estimated_legs: usize,
}

impl<'a> ScheduleCursor<'a> {
    pub fn new(
        problem: &'a PlanningProblem,
        constraints: &'a ConstraintSet,
        delays: &'a FxHashMap<StopIdx, SignedDuration>,
        location: LocationIdx,
        time: Timestamp,
    ) -> Self {
        ScheduleCursor {
            problem,
            constraints,
            delays,
            location,
            time,
            distance: 0.0,
            driving: 0.0,
            penalty: 0.0,
            max_lateness: SignedDuration::ZERO,
            estimated_legs: 0,
        }
    }

    pub fn visit(&mut self, stop_id: StopIdx) -> Visit {
        let stop = self.problem.stop(stop_id);
        let leg = self.problem.travel(self.location, stop.location_id());
        let delay = self
            .delays
            .get(&stop_id)
            .copied()
            .unwrap_or(SignedDuration::ZERO);

        let arrival = self.time + leg.duration() + delay;
        let service_start = stop.time_window().service_start(arrival);
        let lateness = stop.time_window().lateness(arrival);
        let departure = service_start + stop.service_duration();

        self.distance += leg.distance;
        self.driving += leg.time;
        if leg.estimated {
            self.estimated_legs += 1;
        }
        self.penalty += lateness_penalty(self.constraints, stop, lateness);
        self.max_lateness = self.max_lateness.max(lateness);
        self.location = stop.location_id();
        self.time = departure;

        Visit {
            arrival,
            service_start,
            departure,
            lateness,
        }
    }

    /// Drives back to the depot when the vehicle has to, returns the end time.
    pub fn finish(&mut self, vehicle: &Vehicle) -> Timestamp {
        if vehicle.should_return_to_depot() {
            let leg = self
                .problem
                .travel(self.location, vehicle.start_location_id());
            self.distance += leg.distance;
            self.driving += leg.time;
            if leg.estimated {
                self.estimated_legs += 1;
            }
            self.location = vehicle.start_location_id();
            self.time += leg.duration();
        }

        self.time
    }
}
