use courier_matrix_providers::travel_matrix_provider::TravelMatrixProvider;
use fxhash::FxHashSet;
use jiff::{SignedDuration, civil::Date};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    problem::{
        capacity::Capacity,
        driver::{Driver, DriverBuilder},
        location::{Location, LocationIdx},
        product::ProductType,
        skill::Skill,
        stop::{Priority, Stop, StopBuilder},
        time_window::TimeWindow,
        vehicle::{Vehicle, VehicleBuilder, VehicleClass, VehicleShift},
        zone::Zone,
    },
    solver::constraints::constraint_set::ConstraintSet,
};

/// One depot, one day: the orders to deliver and the roster to deliver them.
#[derive(Serialize, Deserialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields, rename = "PlanningRequest")]
pub struct JsonPlanningRequest {
    pub depot_id: String,
    pub date: Date,
    pub depot: JsonLocation,
    pub stops: Vec<JsonStop>,
    pub vehicles: Vec<JsonVehicle>,
    pub drivers: Vec<JsonDriver>,
    /// Defaults to straight lines at 40 km/h.
    pub cost_provider: Option<TravelMatrixProvider>,
    pub constraints: Option<ConstraintSet>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields, rename = "Location")]
pub struct JsonLocation {
    /// Longitude, latitude.
    pub coordinates: [f64; 2],
}

impl From<&JsonLocation> for Location {
    fn from(value: &JsonLocation) -> Self {
        Location::from_lat_lon(value.coordinates[1], value.coordinates[0])
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(deny_unknown_fields, rename = "Stop")]
pub struct JsonStop {
    pub id: String,
    pub location: JsonLocation,
    pub demand: Option<Capacity>,
    pub product: Option<String>,
    pub time_window: Option<TimeWindow>,
    pub service_duration: Option<SignedDuration>,
    pub priority: Option<Priority>,
    pub zone: Option<String>,
    pub skills: Option<Vec<String>>,
    /// Vehicle classes allowed to serve the stop, any when absent.
    pub vehicle_classes: Option<Vec<VehicleClass>>,
}

impl JsonStop {
    pub fn into_builder(self) -> StopBuilder {
        let mut builder = StopBuilder::default();
        builder.set_external_id(self.id);

        if let Some(demand) = self.demand {
            builder.set_demand(demand);
        }

        if let Some(product) = self.product {
            builder.set_product(ProductType::new(product));
        }

        if let Some(time_window) = self.time_window {
            builder.set_time_window(time_window);
        }

        if let Some(service_duration) = self.service_duration {
            builder.set_service_duration(service_duration);
        }

        if let Some(priority) = self.priority {
            builder.set_priority(priority);
        }

        if let Some(zone) = self.zone {
            builder.set_zone(Zone::new(zone));
        }

        if let Some(skills) = self.skills {
            builder.set_required_skills(skills.into_iter().map(Skill::new).collect());
        }

        if let Some(classes) = self.vehicle_classes {
            builder.set_allowed_classes(classes);
        }

        builder
    }

    pub fn into_stop(self, location_id: LocationIdx) -> Stop {
        let mut builder = self.into_builder();
        builder.set_location_id(location_id);
        builder.build()
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(deny_unknown_fields, rename = "Vehicle")]
pub struct JsonVehicle {
    pub id: String,
    pub class: Option<VehicleClass>,
    pub capacity: Capacity,
    /// Starts from the depot when absent.
    pub start_location: Option<JsonLocation>,
    pub shift: VehicleShift,
    pub maximum_driving_duration: Option<SignedDuration>,
    /// Any zone when absent.
    pub zones: Option<Vec<String>>,
    /// Any product when absent.
    pub products: Option<Vec<String>>,
    pub should_return_to_depot: Option<bool>,
}

impl JsonVehicle {
    pub fn into_vehicle(self, start_location_id: LocationIdx) -> Vehicle {
        let mut builder = VehicleBuilder::default();
        builder
            .set_external_id(self.id)
            .set_capacity(self.capacity)
            .set_shift(self.shift)
            .set_start_location_id(start_location_id);

        if let Some(class) = self.class {
            builder.set_class(class);
        }

        if let Some(duration) = self.maximum_driving_duration {
            builder.set_maximum_driving_duration(duration);
        }

        if let Some(zones) = self.zones {
            builder.set_zones(zones.into_iter().map(Zone::new).collect::<FxHashSet<_>>());
        }

        if let Some(products) = self.products {
            builder.set_products(
                products
                    .into_iter()
                    .map(ProductType::new)
                    .collect::<FxHashSet<_>>(),
            );
        }

        if let Some(should_return) = self.should_return_to_depot {
            builder.set_should_return_to_depot(should_return);
        }

        builder.build()
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone)]
#[serde(deny_unknown_fields, rename = "Driver")]
pub struct JsonDriver {
    pub id: String,
    pub skills: Option<Vec<String>>,
    pub available: Option<bool>,
    pub maximum_working_duration: Option<SignedDuration>,
    /// External id of the vehicle the driver is assigned to.
    pub vehicle_id: Option<String>,
}

impl From<JsonDriver> for Driver {
    fn from(value: JsonDriver) -> Self {
        let mut builder = DriverBuilder::default();
        builder.set_external_id(value.id);

        if let Some(skills) = value.skills {
            builder.set_skills(skills.into_iter().map(Skill::new).collect());
        }

        if let Some(available) = value.available {
            builder.set_available(available);
        }

        if let Some(duration) = value.maximum_working_duration {
            builder.set_maximum_working_duration(duration);
        }

        if let Some(vehicle_id) = value.vehicle_id {
            builder.set_vehicle_id(vehicle_id);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let request: JsonPlanningRequest = serde_json::from_str(
            r#"{
                "depot_id": "brussels-1",
                "date": "2025-03-14",
                "depot": { "coordinates": [4.35, 50.85] },
                "stops": [
                    {
                        "id": "order-1",
                        "location": { "coordinates": [4.36, 50.84] },
                        "demand": { "weight": 12.5 },
                        "time_window": { "start": "2025-03-14T09:00:00Z", "end": "2025-03-14T11:00:00Z" },
                        "service_duration": "PT5M",
                        "priority": "urgent",
                        "skills": ["adr"]
                    }
                ],
                "vehicles": [
                    {
                        "id": "van-1",
                        "class": "van",
                        "capacity": { "weight": 800, "volume": 6 },
                        "shift": { "start": "2025-03-14T07:00:00Z", "end": "2025-03-14T17:00:00Z" }
                    }
                ],
                "drivers": [{ "id": "alice", "skills": ["adr"] }]
            }"#,
        )
        .unwrap();

        assert_eq!(request.date, jiff::civil::date(2025, 3, 14));
        assert!(request.cost_provider.is_none());

        let stop = request.stops[0].clone().into_stop(LocationIdx::new(1));
        assert_eq!(stop.external_id(), "order-1");
        assert_eq!(stop.demand(), Capacity::weight(12.5));
        assert_eq!(stop.priority(), Priority::Urgent);
        assert_eq!(stop.service_duration(), SignedDuration::from_mins(5));

        let driver = Driver::from(request.drivers[0].clone());
        assert!(driver.is_available());
        assert!(driver.has_skills(stop.required_skills()));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<JsonDriver, _> =
            serde_json::from_str(r#"{ "id": "bob", "licence": "C" }"#);
        assert!(result.is_err());
    }
}
