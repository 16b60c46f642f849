use std::sync::Arc;

use fixedbitset::FixedBitSet;
use jiff::civil::Date;

use super::{
    capacity::Capacity,
    driver::{Driver, DriverIdx},
    location::{Location, LocationIdx},
    resource::{Resource, ResourceIdx, pair_resources},
    stop::{Stop, StopBuilder, StopIdx},
    stop_index::StopIndex,
    travel_costs::{TravelCost, TravelCosts},
    vehicle::{Vehicle, VehicleIdx},
};

/// Snapshot of everything one planning run needs: the depot's stops for a
/// day, the resources able to serve them and the travel costs between their
/// locations.
#[derive(Clone)]
pub struct PlanningProblem {
    depot_id: String,
    date: Date,
    locations: Vec<Location>,
    stops: Vec<Stop>,
    vehicles: Vec<Vehicle>,
    drivers: Vec<Driver>,
    resources: Vec<Resource>,
    travel_costs: Arc<TravelCosts>,
    /// Product, vehicle class and skill compatibility, `stop * resources + resource`.
    eligible: FixedBitSet,
    /// Zone compatibility, same layout.
    zone_eligible: FixedBitSet,
    stop_index: StopIndex,
}

impl PlanningProblem {
    pub fn depot_id(&self) -> &str {
        &self.depot_id
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn location(&self, location_id: LocationIdx) -> &Location {
        &self.locations[location_id]
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn stop(&self, stop_id: StopIdx) -> &Stop {
        &self.stops[stop_id]
    }

    pub fn num_stops(&self) -> usize {
        self.stops.len()
    }

    pub fn stop_ids(&self) -> impl Iterator<Item = StopIdx> + use<> {
        StopIdx::all(self.stops.len())
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, vehicle_id: VehicleIdx) -> &Vehicle {
        &self.vehicles[vehicle_id]
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    pub fn driver(&self, driver_id: DriverIdx) -> &Driver {
        &self.drivers[driver_id]
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, resource_id: ResourceIdx) -> &Resource {
        &self.resources[resource_id]
    }

    pub fn resource_vehicle(&self, resource_id: ResourceIdx) -> &Vehicle {
        self.vehicle(self.resource(resource_id).vehicle_id())
    }

    pub fn resource_driver(&self, resource_id: ResourceIdx) -> &Driver {
        self.driver(self.resource(resource_id).driver_id())
    }

    pub fn travel_costs(&self) -> &TravelCosts {
        &self.travel_costs
    }

    #[inline]
    pub fn travel(&self, from: LocationIdx, to: LocationIdx) -> TravelCost {
        self.travel_costs.cost(&self.locations, from, to)
    }

    pub fn stop_index(&self) -> &StopIndex {
        &self.stop_index
    }

    pub fn is_eligible(&self, resource_id: ResourceIdx, stop_id: StopIdx, enforce_zones: bool) -> bool {
        let index = stop_id.get() * self.resources.len() + resource_id.get();
        self.eligible.contains(index) && (!enforce_zones || self.zone_eligible.contains(index))
    }

    pub fn eligible_resources(
        &self,
        stop_id: StopIdx,
        enforce_zones: bool,
    ) -> impl Iterator<Item = ResourceIdx> + '_ {
        ResourceIdx::all(self.resources.len())
            .filter(move |&resource_id| self.is_eligible(resource_id, stop_id, enforce_zones))
    }

    pub fn total_demand(&self) -> Capacity {
        self.stops.iter().map(|stop| stop.demand()).sum()
    }

    pub fn total_fleet_capacity(&self) -> Capacity {
        self.resources
            .iter()
            .map(|resource| *self.vehicle(resource.vehicle_id()).capacity())
            .sum()
    }

    /// Copy of the problem with one more stop at a new location. Existing
    /// indices stay valid and the travel costs are shared.
    pub fn with_additional_stop(
        &self,
        location: Location,
        mut builder: StopBuilder,
    ) -> (PlanningProblem, StopIdx) {
        let mut problem = self.clone();

        let location_id = LocationIdx::new(problem.locations.len());
        problem.locations.push(location);

        builder.set_location_id(location_id);
        let stop = builder.build();
        let stop_id = StopIdx::new(problem.stops.len());

        let num_resources = problem.resources.len();
        let offset = stop_id.get() * num_resources;
        problem.eligible.grow(offset + num_resources);
        problem.zone_eligible.grow(offset + num_resources);
        for (index, resource) in problem.resources.iter().enumerate() {
            let vehicle = &problem.vehicles[resource.vehicle_id()];
            let driver = &problem.drivers[resource.driver_id()];
            problem
                .eligible
                .set(offset + index, is_compatible(vehicle, driver, &stop));
            problem
                .zone_eligible
                .set(offset + index, vehicle.serves_zone(stop.zone()));
        }

        problem.stop_index.insert(&location, stop_id);
        problem.stops.push(stop);

        (problem, stop_id)
    }

    /// Marks a driver unavailable. Resources keep their indices, the
    /// driver's resources are no longer eligible for any stop.
    pub fn with_unavailable_driver(&self, driver_id: DriverIdx) -> PlanningProblem {
        let mut problem = self.clone();
        problem.drivers[driver_id].set_available(false);

        let num_resources = problem.resources.len();
        for (resource_index, resource) in problem.resources.iter().enumerate() {
            if resource.driver_id() != driver_id {
                continue;
            }
            for stop_index in 0..problem.stops.len() {
                problem
                    .eligible
                    .set(stop_index * num_resources + resource_index, false);
            }
        }
        problem
    }
}

fn is_compatible(vehicle: &Vehicle, driver: &Driver, stop: &Stop) -> bool {
    driver.is_available()
        && vehicle.carries(stop.product())
        && stop.accepts_class(vehicle.class())
        && driver.has_skills(stop.required_skills())
}

#[derive(Default)]
pub struct PlanningProblemBuilder {
    depot_id: Option<String>,
    date: Option<Date>,
    locations: Option<Vec<Location>>,
    stops: Option<Vec<Stop>>,
    vehicles: Option<Vec<Vehicle>>,
    drivers: Option<Vec<Driver>>,
    travel_costs: Option<TravelCosts>,
}

impl PlanningProblemBuilder {
    pub fn set_depot_id(&mut self, depot_id: impl Into<String>) -> &mut PlanningProblemBuilder {
        self.depot_id = Some(depot_id.into());
        self
    }

    pub fn set_date(&mut self, date: Date) -> &mut PlanningProblemBuilder {
        self.date = Some(date);
        self
    }

    pub fn set_locations(&mut self, locations: Vec<Location>) -> &mut PlanningProblemBuilder {
        self.locations = Some(locations);
        self
    }

    pub fn set_stops(&mut self, stops: Vec<Stop>) -> &mut PlanningProblemBuilder {
        self.stops = Some(stops);
        self
    }

    pub fn set_vehicles(&mut self, vehicles: Vec<Vehicle>) -> &mut PlanningProblemBuilder {
        self.vehicles = Some(vehicles);
        self
    }

    pub fn set_drivers(&mut self, drivers: Vec<Driver>) -> &mut PlanningProblemBuilder {
        self.drivers = Some(drivers);
        self
    }

    pub fn set_travel_costs(&mut self, travel_costs: TravelCosts) -> &mut PlanningProblemBuilder {
        self.travel_costs = Some(travel_costs);
        self
    }

    pub fn build(self) -> PlanningProblem {
        let locations = self.locations.expect("Expected list of locations");
        let stops = self.stops.unwrap_or_default();
        let vehicles = self.vehicles.expect("Expected list of vehicles");
        let drivers = self.drivers.expect("Expected list of drivers");
        let resources = pair_resources(&vehicles, &drivers);

        let mut eligible = FixedBitSet::with_capacity(stops.len() * resources.len());
        let mut zone_eligible = FixedBitSet::with_capacity(stops.len() * resources.len());
        for (stop_index, stop) in stops.iter().enumerate() {
            for (resource_index, resource) in resources.iter().enumerate() {
                let vehicle = &vehicles[resource.vehicle_id()];
                let driver = &drivers[resource.driver_id()];
                let index = stop_index * resources.len() + resource_index;
                eligible.set(index, is_compatible(vehicle, driver, stop));
                zone_eligible.set(index, vehicle.serves_zone(stop.zone()));
            }
        }

        let stop_index = StopIndex::new(&locations, &stops);

        PlanningProblem {
            depot_id: self.depot_id.unwrap_or_default(),
            date: self.date.unwrap_or_else(|| jiff::Zoned::now().date()),
            travel_costs: Arc::new(self.travel_costs.expect("Expected travel costs")),
            locations,
            stops,
            vehicles,
            drivers,
            resources,
            eligible,
            zone_eligible,
            stop_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use fxhash::FxHashSet;

    use super::*;
    use crate::{
        problem::{
            product::ProductType, skill::Skill, vehicle::VehicleClass, zone::Zone,
        },
        test_utils::{self, create_test_problem},
    };

    #[test]
    fn test_eligibility() {
        let locations = test_utils::create_location_grid(3, 3);
        let mut vehicles = test_utils::create_basic_vehicles(2, Capacity::weight(10.0));
        let drivers = test_utils::create_basic_drivers(2);

        vehicles[1] = test_utils::vehicle_with(|builder| {
            builder
                .set_external_id("truck")
                .set_class(VehicleClass::Truck)
                .set_zones(FxHashSet::from_iter([Zone::new("north")]))
                .set_products(FxHashSet::from_iter([ProductType::new("propane")]));
        });

        let mut hazmat = StopBuilder::default();
        hazmat
            .set_external_id("hazmat")
            .set_location_id(LocationIdx::new(1))
            .set_required_skills(FxHashSet::from_iter([Skill::new("adr")]));

        let mut southern = StopBuilder::default();
        southern
            .set_external_id("south")
            .set_location_id(LocationIdx::new(2))
            .set_zone(Zone::new("south"));

        let mut propane = StopBuilder::default();
        propane
            .set_external_id("propane")
            .set_location_id(LocationIdx::new(3))
            .set_product(ProductType::new("propane"))
            .set_allowed_classes(vec![VehicleClass::Truck]);

        let problem = create_test_problem(
            locations,
            vec![hazmat.build(), southern.build(), propane.build()],
            vehicles,
            drivers,
        );

        let first = ResourceIdx::new(0);
        let truck = ResourceIdx::new(1);

        assert!(!problem.is_eligible(first, StopIdx::new(0), true));
        assert!(problem.is_eligible(first, StopIdx::new(1), true));
        assert!(!problem.is_eligible(truck, StopIdx::new(1), true));
        assert!(problem.is_eligible(truck, StopIdx::new(1), false));
        assert!(!problem.is_eligible(first, StopIdx::new(2), true));
        assert!(problem.is_eligible(truck, StopIdx::new(2), true));
        assert_eq!(problem.eligible_resources(StopIdx::new(0), true).count(), 0);
    }

    #[test]
    fn test_with_additional_stop() {
        let problem = test_utils::create_default_problem(4, 1, Capacity::weight(10.0));

        let mut builder = StopBuilder::default();
        builder.set_external_id("urgent");
        let (extended, stop_id) =
            problem.with_additional_stop(Location::from_cartesian(1.0, 1.0), builder);

        assert_eq!(stop_id, StopIdx::new(4));
        assert_eq!(extended.num_stops(), 5);
        assert_eq!(extended.locations().len(), problem.locations().len() + 1);
        assert!(extended.is_eligible(ResourceIdx::new(0), stop_id, true));
        assert_eq!(extended.stop_index().len(), 5);
        assert_eq!(problem.num_stops(), 4);
    }
}
