#![allow(dead_code)]

use courier_optimizer::{
    problem::{
        capacity::Capacity,
        driver::{Driver, DriverBuilder},
        location::{Location, LocationIdx},
        planning_problem::{PlanningProblem, PlanningProblemBuilder},
        stop::{Stop, StopBuilder},
        travel_costs::TravelCosts,
        vehicle::{Vehicle, VehicleBuilder, VehicleShift},
    },
    solver::{search::termination::Termination, solver_params::SolverParams},
};
use jiff::{SignedDuration, Timestamp};

//
//  Locations are laid out on a cartesian grid, one unit takes a minute to
//  drive. Location 0 is the depot, stop `i` sits on location `i + 1`.
//
pub const SECONDS_PER_UNIT: f64 = 60.0;

pub fn at(hour: i8, minute: i8) -> Timestamp {
    jiff::civil::date(2025, 3, 14)
        .at(hour, minute, 0, 0)
        .to_zoned(jiff::tz::TimeZone::UTC)
        .unwrap()
        .timestamp()
}

pub fn create_location_grid(rows: usize, cols: usize) -> Vec<Location> {
    let mut locations = Vec::new();

    for y in 0..rows {
        for x in 0..cols {
            locations.push(Location::from_cartesian(x as f64, y as f64));
        }
    }

    locations
}

pub fn create_stops(count: usize, configure: impl Fn(usize, &mut StopBuilder)) -> Vec<Stop> {
    (0..count)
        .map(|index| {
            let mut builder = StopBuilder::default();
            builder
                .set_external_id(format!("stop-{index}"))
                .set_location_id(LocationIdx::new(index + 1))
                .set_demand(Capacity::weight(1.0))
                .set_service_duration(SignedDuration::from_mins(5));
            configure(index, &mut builder);
            builder.build()
        })
        .collect()
}

pub fn create_vehicles(count: usize, capacity: Capacity) -> Vec<Vehicle> {
    (0..count)
        .map(|index| {
            let mut builder = VehicleBuilder::default();
            builder
                .set_external_id(format!("vehicle-{index}"))
                .set_capacity(capacity)
                .set_start_location_id(LocationIdx::new(0))
                .set_shift(VehicleShift {
                    start: at(8, 0),
                    end: at(20, 0),
                });
            builder.build()
        })
        .collect()
}

pub fn create_drivers(count: usize) -> Vec<Driver> {
    (0..count)
        .map(|index| {
            let mut builder = DriverBuilder::default();
            builder.set_external_id(format!("driver-{index}"));
            builder.build()
        })
        .collect()
}

pub fn create_problem(
    locations: Vec<Location>,
    stops: Vec<Stop>,
    vehicles: Vec<Vehicle>,
    drivers: Vec<Driver>,
) -> PlanningProblem {
    let mut builder = PlanningProblemBuilder::default();
    builder
        .set_depot_id("test-depot")
        .set_date(jiff::civil::date(2025, 3, 14))
        .set_locations(locations)
        .set_stops(stops)
        .set_vehicles(vehicles)
        .set_drivers(drivers)
        .set_travel_costs(TravelCosts::euclidean(SECONDS_PER_UNIT));

    builder.build()
}

/// `num_stops` stops on a grid, served by `num_vehicles` identical vehicles.
pub fn create_grid_problem(num_stops: usize, num_vehicles: usize, capacity: Capacity) -> PlanningProblem {
    let side = (1..)
        .find(|side: &usize| side * side > num_stops)
        .unwrap_or(1);

    create_problem(
        create_location_grid(side, side),
        create_stops(num_stops, |_, _| {}),
        create_vehicles(num_vehicles, capacity),
        create_drivers(num_vehicles),
    )
}

pub fn solver_params(seed: u64) -> SolverParams {
    SolverParams {
        terminations: vec![
            Termination::Iterations(1_000),
            Termination::Duration(SignedDuration::from_secs(5)),
        ],
        seed: Some(seed),
        ..SolverParams::default()
    }
}
