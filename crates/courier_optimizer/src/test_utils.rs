use std::sync::Arc;

use courier_matrix_providers::travel_matrices::TravelMatrices;
use jiff::{SignedDuration, Timestamp, civil::Date};

use crate::{
    problem::{
        capacity::Capacity,
        driver::{Driver, DriverBuilder},
        location::{Location, LocationIdx},
        planning_problem::{PlanningProblem, PlanningProblemBuilder},
        provider_oracle::NoOracle,
        stop::{Stop, StopBuilder, StopIdx},
        time_window::TimeWindow,
        travel_costs::{StraightLineOracle, TravelCosts},
        vehicle::{Vehicle, VehicleBuilder, VehicleShift},
    },
    solver::{
        constraints::constraint_set::ConstraintSet,
        solution::{route::RouteIdx, working_solution::WorkingSolution},
    },
};

/// Seconds needed to travel one unit of the cartesian test plane.
pub const SECONDS_PER_UNIT: f64 = 60.0;

pub fn test_date() -> Date {
    jiff::civil::date(2025, 3, 14)
}

pub fn at(hour: i8, minute: i8) -> Timestamp {
    test_date()
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

/// Shift from 08:00 to 20:00, starting and ending at location 0.
pub fn vehicle_with(configure: impl FnOnce(&mut VehicleBuilder)) -> Vehicle {
    let mut builder = VehicleBuilder::default();
    builder
        .set_external_id("vehicle")
        .set_capacity(Capacity::weight(10.0))
        .set_start_location_id(LocationIdx::new(0))
        .set_should_return_to_depot(true)
        .set_maximum_driving_duration(SignedDuration::from_hours(12))
        .set_shift(VehicleShift {
            start: at(8, 0),
            end: at(20, 0),
        });

    configure(&mut builder);
    builder.build()
}

pub fn create_basic_vehicles(count: usize, capacity: Capacity) -> Vec<Vehicle> {
    (0..count)
        .map(|index| {
            vehicle_with(|builder| {
                builder
                    .set_external_id(format!("vehicle-{index}"))
                    .set_capacity(capacity);
            })
        })
        .collect()
}

pub fn create_basic_drivers(count: usize) -> Vec<Driver> {
    (0..count)
        .map(|index| {
            let mut builder = DriverBuilder::default();
            builder.set_external_id(format!("driver-{index}"));
            builder.build()
        })
        .collect()
}

/// Stop `i` sits on location `i + 1`, location 0 being the depot.
pub fn create_basic_stops(locations: &[Location], count: usize) -> Vec<Stop> {
    assert!(count < locations.len(), "Not enough locations for {count} stops");

    (0..count)
        .map(|index| {
            let mut builder = StopBuilder::default();
            builder
                .set_external_id(format!("stop-{index}"))
                .set_location_id(LocationIdx::new(index + 1))
                .set_demand(Capacity::weight(1.0))
                .set_service_duration(SignedDuration::from_mins(5));
            builder.build()
        })
        .collect()
}

pub fn create_test_problem(
    locations: Vec<Location>,
    stops: Vec<Stop>,
    vehicles: Vec<Vehicle>,
    drivers: Vec<Driver>,
) -> PlanningProblem {
    create_test_problem_with_costs(
        locations,
        stops,
        vehicles,
        drivers,
        TravelCosts::euclidean(SECONDS_PER_UNIT),
    )
}

pub fn create_test_problem_with_costs(
    locations: Vec<Location>,
    stops: Vec<Stop>,
    vehicles: Vec<Vehicle>,
    drivers: Vec<Driver>,
    travel_costs: TravelCosts,
) -> PlanningProblem {
    let mut builder = PlanningProblemBuilder::default();
    builder
        .set_depot_id("test-depot")
        .set_date(test_date())
        .set_locations(locations)
        .set_stops(stops)
        .set_vehicles(vehicles)
        .set_drivers(drivers)
        .set_travel_costs(travel_costs);

    builder.build()
}

/// Stops spread over the smallest square grid holding them and the depot.
pub fn create_default_problem(num_stops: usize, num_vehicles: usize, capacity: Capacity) -> PlanningProblem {
    let side = (1..)
        .find(|side: &usize| side * side > num_stops)
        .unwrap_or(1);
    let locations = create_location_grid(side, side);
    let stops = create_basic_stops(&locations, num_stops);

    create_test_problem(
        locations,
        stops,
        create_basic_vehicles(num_vehicles, capacity),
        create_basic_drivers(num_vehicles),
    )
}

/// Same layout as `create_default_problem`, with every pair of the grid in a
/// precomputed matrix and no provider for locations added later.
pub fn create_matrix_problem(num_stops: usize, num_vehicles: usize, capacity: Capacity) -> PlanningProblem {
    let side = (1..)
        .find(|side: &usize| side * side > num_stops)
        .unwrap_or(1);
    let locations = create_location_grid(side, side);
    let distances: Vec<f64> = locations
        .iter()
        .flat_map(|from| locations.iter().map(|to| from.euclidean_distance(to)))
        .collect();
    let matrices = TravelMatrices {
        times: distances.iter().map(|distance| distance * SECONDS_PER_UNIT).collect(),
        distances,
        estimated: Vec::new(),
    };
    let travel_costs = TravelCosts::from_matrices(
        matrices,
        Arc::new(NoOracle),
        StraightLineOracle::euclidean_with_unit_time(SECONDS_PER_UNIT),
    );
    let stops = create_basic_stops(&locations, num_stops);

    create_test_problem_with_costs(
        locations,
        stops,
        create_basic_vehicles(num_vehicles, capacity),
        create_basic_drivers(num_vehicles),
        travel_costs,
    )
}

/// Depot at x = 0 and stop `i` at x = i + 1, one vehicle.
pub fn create_line_problem(num_stops: usize, capacity: Capacity) -> PlanningProblem {
    let locations = (0..=num_stops)
        .map(|x| Location::from_cartesian(x as f64, 0.0))
        .collect::<Vec<_>>();
    let stops = create_basic_stops(&locations, num_stops);

    create_test_problem(
        locations,
        stops,
        create_basic_vehicles(1, capacity),
        create_basic_drivers(1),
    )
}

/// Two stops one hour apart, both due between 08:00 and 09:00. Served in
/// order, the first is reached at 09:00 and the second at 10:05.
pub fn create_tight_window_problem() -> PlanningProblem {
    let locations = vec![
        Location::from_cartesian(0.0, 0.0),
        Location::from_cartesian(60.0, 0.0),
        Location::from_cartesian(120.0, 0.0),
    ];

    let stops = (0..2)
        .map(|index| {
            let mut builder = StopBuilder::default();
            builder
                .set_external_id(format!("stop-{index}"))
                .set_location_id(LocationIdx::new(index + 1))
                .set_demand(Capacity::weight(1.0))
                .set_service_duration(SignedDuration::from_mins(5))
                .set_time_window(TimeWindow::between(at(8, 0), at(9, 0)));
            builder.build()
        })
        .collect();

    create_test_problem(
        locations,
        stops,
        create_basic_vehicles(1, Capacity::weight(10.0)),
        create_basic_drivers(1),
    )
}

pub struct TestRoute {
    pub resource_id: usize,
    pub stop_ids: Vec<usize>,
}

pub fn create_test_working_solution(problem: PlanningProblem, routes: Vec<TestRoute>) -> WorkingSolution {
    let sequences = routes
        .into_iter()
        .map(|route| {
            (
                RouteIdx::new(route.resource_id),
                route.stop_ids.into_iter().map(StopIdx::new).collect(),
            )
        })
        .collect();

    WorkingSolution::from_sequences(
        Arc::new(problem),
        Arc::new(ConstraintSet::default()),
        sequences,
    )
}
