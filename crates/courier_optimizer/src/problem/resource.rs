use fxhash::FxHashSet;

use crate::{define_index_newtype, utils::enumerate_idx::EnumerateIdx};

use super::{
    driver::{Driver, DriverIdx},
    vehicle::{Vehicle, VehicleIdx},
};

define_index_newtype!(ResourceIdx, Resource);

/// A driver in a vehicle: the unit one route is planned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    vehicle_id: VehicleIdx,
    driver_id: DriverIdx,
}

impl Resource {
    pub fn new(vehicle_id: VehicleIdx, driver_id: DriverIdx) -> Self {
        Resource {
            vehicle_id,
            driver_id,
        }
    }

    pub fn vehicle_id(&self) -> VehicleIdx {
        self.vehicle_id
    }

    pub fn driver_id(&self) -> DriverIdx {
        self.driver_id
    }
}

/// Pairs available drivers with vehicles. Drivers assigned to a vehicle are
/// paired first, the others take the remaining vehicles in order. Each
/// vehicle is used at most once.
pub fn pair_resources(vehicles: &[Vehicle], drivers: &[Driver]) -> Vec<Resource> {
    let mut claimed: FxHashSet<VehicleIdx> = FxHashSet::default();
    let mut resources = Vec::new();

    let mut claim = |driver_id: DriverIdx, matches: &dyn Fn(&Vehicle) -> bool| {
        let vehicle_id = vehicles
            .iter()
            .enumerate()
            .map(|(index, vehicle)| (VehicleIdx::new(index), vehicle))
            .find(|(vehicle_id, vehicle)| !claimed.contains(vehicle_id) && matches(vehicle))
            .map(|(vehicle_id, _)| vehicle_id);

        if let Some(vehicle_id) = vehicle_id {
            claimed.insert(vehicle_id);
            resources.push(Resource::new(vehicle_id, driver_id));
        }
    };

    for (driver_id, driver) in drivers.iter().enumerate_idx() {
        if let (true, Some(assigned)) = (driver.is_available(), driver.vehicle_id()) {
            claim(driver_id, &|vehicle| vehicle.external_id() == assigned);
        }
    }

    for (driver_id, driver) in drivers.iter().enumerate_idx() {
        if driver.is_available() && driver.vehicle_id().is_none() {
            claim(driver_id, &|_| true);
        }
    }

    resources
}

#[cfg(test)]
mod tests {
    use jiff::{SignedDuration, Timestamp};

    use super::*;
    use crate::problem::{
        capacity::Capacity,
        driver::DriverBuilder,
        location::LocationIdx,
        vehicle::{VehicleBuilder, VehicleShift},
    };

    fn vehicle(id: &str) -> Vehicle {
        let start: Timestamp = "2025-06-10T08:00:00Z".parse().unwrap();
        let mut builder = VehicleBuilder::default();
        builder
            .set_external_id(id)
            .set_capacity(Capacity::weight(10.0))
            .set_start_location_id(LocationIdx::new(0))
            .set_shift(VehicleShift {
                start,
                end: start + SignedDuration::from_hours(8),
            });
        builder.build()
    }

    fn driver(id: &str, vehicle: Option<&str>, available: bool) -> Driver {
        let mut builder = DriverBuilder::default();
        builder.set_external_id(id).set_available(available);
        if let Some(vehicle) = vehicle {
            builder.set_vehicle_id(vehicle);
        }
        builder.build()
    }

    #[test]
    fn test_pair_resources() {
        let vehicles = vec![vehicle("v1"), vehicle("v2"), vehicle("v3")];
        let drivers = vec![
            driver("d1", None, true),
            driver("d2", Some("v2"), true),
            driver("d3", Some("v3"), false),
            driver("d4", Some("v2"), true),
        ];

        let resources = pair_resources(&vehicles, &drivers);

        assert_eq!(
            resources,
            vec![
                Resource::new(VehicleIdx::new(1), DriverIdx::new(1)),
                Resource::new(VehicleIdx::new(0), DriverIdx::new(0)),
            ]
        );
    }
}
