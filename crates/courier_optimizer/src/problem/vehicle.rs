use fxhash::FxHashSet;
use jiff::{SignedDuration, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::define_index_newtype;

use super::{capacity::Capacity, location::LocationIdx, product::ProductType, zone::Zone};

define_index_newtype!(VehicleIdx, Vehicle);

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Motorcycle,
    Van,
    Truck,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleShift {
    pub start: Timestamp,
    pub end: Timestamp,
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    external_id: String,
    class: VehicleClass,
    capacity: Capacity,
    start_location_id: LocationIdx,
    should_return_to_depot: bool,
    shift: VehicleShift,
    maximum_driving_duration: Option<SignedDuration>,
    zones: FxHashSet<Zone>,
    products: FxHashSet<ProductType>,
}

impl Vehicle {
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn class(&self) -> VehicleClass {
        self.class
    }

    pub fn capacity(&self) -> &Capacity {
        &self.capacity
    }

    pub fn start_location_id(&self) -> LocationIdx {
        self.start_location_id
    }

    pub fn should_return_to_depot(&self) -> bool {
        self.should_return_to_depot
    }

    pub fn shift(&self) -> &VehicleShift {
        &self.shift
    }

    pub fn maximum_driving_duration(&self) -> Option<SignedDuration> {
        self.maximum_driving_duration
    }

    /// An empty zone list serves every zone.
    pub fn serves_zone(&self, zone: Option<&Zone>) -> bool {
        match zone {
            Some(zone) => self.zones.is_empty() || self.zones.contains(zone),
            None => true,
        }
    }

    /// An empty product list carries every product.
    pub fn carries(&self, product: Option<&ProductType>) -> bool {
        match product {
            Some(product) => self.products.is_empty() || self.products.contains(product),
            None => true,
        }
    }
}

#[derive(Default)]
pub struct VehicleBuilder {
    external_id: Option<String>,
    class: Option<VehicleClass>,
    capacity: Option<Capacity>,
    start_location_id: Option<LocationIdx>,
    should_return_to_depot: Option<bool>,
    shift: Option<VehicleShift>,
    maximum_driving_duration: Option<SignedDuration>,
    zones: Option<FxHashSet<Zone>>,
    products: Option<FxHashSet<ProductType>>,
}

impl VehicleBuilder {
    pub fn set_external_id(&mut self, external_id: impl Into<String>) -> &mut VehicleBuilder {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn set_class(&mut self, class: VehicleClass) -> &mut VehicleBuilder {
        self.class = Some(class);
        self
    }

    pub fn set_capacity(&mut self, capacity: Capacity) -> &mut VehicleBuilder {
        self.capacity = Some(capacity);
        self
    }

    pub fn set_start_location_id(&mut self, location_id: LocationIdx) -> &mut VehicleBuilder {
        self.start_location_id = Some(location_id);
        self
    }

    pub fn set_should_return_to_depot(&mut self, value: bool) -> &mut VehicleBuilder {
        self.should_return_to_depot = Some(value);
        self
    }

    pub fn set_shift(&mut self, shift: VehicleShift) -> &mut VehicleBuilder {
        self.shift = Some(shift);
        self
    }

    pub fn set_maximum_driving_duration(&mut self, duration: SignedDuration) -> &mut VehicleBuilder {
        self.maximum_driving_duration = Some(duration);
        self
    }

    pub fn set_zones(&mut self, zones: FxHashSet<Zone>) -> &mut VehicleBuilder {
        self.zones = Some(zones);
        self
    }

    pub fn set_products(&mut self, products: FxHashSet<ProductType>) -> &mut VehicleBuilder {
        self.products = Some(products);
        self
    }

    pub fn build(self) -> Vehicle {
        Vehicle {
            external_id: self.external_id.expect("Expected vehicle id"),
            class: self.class.unwrap_or(VehicleClass::Van),
            capacity: self.capacity.expect("Expected vehicle capacity"),
            start_location_id: self.start_location_id.expect("Expected start location"),
            should_return_to_depot: self.should_return_to_depot.unwrap_or(true),
            shift: self.shift.expect("Expected vehicle shift"),
            maximum_driving_duration: self.maximum_driving_duration,
            zones: self.zones.unwrap_or_default(),
            products: self.products.unwrap_or_default(),
        }
    }
}
