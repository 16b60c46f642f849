use fxhash::FxHashSet;
use jiff::SignedDuration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::define_index_newtype;

use super::{
    capacity::Capacity, location::LocationIdx, product::ProductType, skill::Skill,
    time_window::TimeWindow, vehicle::VehicleClass, zone::Zone,
};

define_index_newtype!(StopIdx, Stop);

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
    Scheduled,
}

impl Priority {
    /// Multiplier applied to lateness and to the unassigned penalty.
    pub fn weight(&self) -> f64 {
        match self {
            Priority::Normal => 1.0,
            Priority::Scheduled => 2.0,
            Priority::Urgent => 3.0,
        }
    }
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    Delivered,
    Failed,
    Rescheduled,
}

#[derive(Debug, Clone)]
pub struct Stop {
    external_id: String,
    location_id: LocationIdx,
    demand: Capacity,
    product: Option<ProductType>,
    time_window: TimeWindow,
    service_duration: SignedDuration,
    priority: Priority,
    zone: Option<Zone>,
    required_skills: FxHashSet<Skill>,
    allowed_classes: Vec<VehicleClass>,
}

impl Stop {
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn location_id(&self) -> LocationIdx {
        self.location_id
    }

    pub fn demand(&self) -> Capacity {
        self.demand
    }

    pub fn product(&self) -> Option<&ProductType> {
        self.product.as_ref()
    }

    pub fn time_window(&self) -> &TimeWindow {
        &self.time_window
    }

    pub fn has_time_window(&self) -> bool {
        !self.time_window.is_empty()
    }

    pub fn service_duration(&self) -> SignedDuration {
        self.service_duration
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn zone(&self) -> Option<&Zone> {
        self.zone.as_ref()
    }

    pub fn required_skills(&self) -> &FxHashSet<Skill> {
        &self.required_skills
    }

    pub fn accepts_class(&self, class: VehicleClass) -> bool {
        self.allowed_classes.is_empty() || self.allowed_classes.contains(&class)
    }
}

#[derive(Default, Clone)]
pub struct StopBuilder {
    external_id: Option<String>,
    location_id: Option<LocationIdx>,
    demand: Option<Capacity>,
    product: Option<ProductType>,
    time_window: Option<TimeWindow>,
    service_duration: Option<SignedDuration>,
    priority: Option<Priority>,
    zone: Option<Zone>,
    required_skills: Option<FxHashSet<Skill>>,
    allowed_classes: Option<Vec<VehicleClass>>,
}

impl StopBuilder {
    pub fn set_external_id(&mut self, external_id: impl Into<String>) -> &mut StopBuilder {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn set_location_id(&mut self, location_id: LocationIdx) -> &mut StopBuilder {
        self.location_id = Some(location_id);
        self
    }

    pub fn set_demand(&mut self, demand: Capacity) -> &mut StopBuilder {
        self.demand = Some(demand);
        self
    }

    pub fn set_product(&mut self, product: ProductType) -> &mut StopBuilder {
        self.product = Some(product);
        self
    }

    pub fn set_time_window(&mut self, time_window: TimeWindow) -> &mut StopBuilder {
        self.time_window = Some(time_window);
        self
    }

    pub fn set_service_duration(&mut self, service_duration: SignedDuration) -> &mut StopBuilder {
        self.service_duration = Some(service_duration);
        self
    }

    pub fn set_priority(&mut self, priority: Priority) -> &mut StopBuilder {
        self.priority = Some(priority);
        self
    }

    pub fn set_zone(&mut self, zone: Zone) -> &mut StopBuilder {
        self.zone = Some(zone);
        self
    }

    pub fn set_required_skills(&mut self, skills: FxHashSet<Skill>) -> &mut StopBuilder {
        self.required_skills = Some(skills);
        self
    }

    pub fn set_allowed_classes(&mut self, classes: Vec<VehicleClass>) -> &mut StopBuilder {
        self.allowed_classes = Some(classes);
        self
    }

    pub fn build(self) -> Stop {
        Stop {
            external_id: self.external_id.expect("Expected stop id"),
            location_id: self.location_id.expect("Expected location id"),
            demand: self.demand.unwrap_or_default(),
            product: self.product,
            time_window: self.time_window.unwrap_or_default(),
            service_duration: self.service_duration.unwrap_or(SignedDuration::ZERO),
            priority: self.priority.unwrap_or_default(),
            zone: self.zone,
            required_skills: self.required_skills.unwrap_or_default(),
            allowed_classes: self.allowed_classes.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let mut builder = StopBuilder::default();
        builder
            .set_external_id("order-1")
            .set_location_id(LocationIdx::new(3));
        let stop = builder.build();

        assert_eq!(stop.external_id(), "order-1");
        assert_eq!(stop.location_id(), LocationIdx::new(3));
        assert_eq!(stop.priority(), Priority::Normal);
        assert!(stop.demand().is_empty());
        assert!(!stop.has_time_window());
        assert!(stop.accepts_class(VehicleClass::Truck));
    }

    #[test]
    fn test_allowed_classes() {
        let mut builder = StopBuilder::default();
        builder
            .set_external_id("order-2")
            .set_location_id(LocationIdx::new(0))
            .set_allowed_classes(vec![VehicleClass::Motorcycle]);
        let stop = builder.build();

        assert!(stop.accepts_class(VehicleClass::Motorcycle));
        assert!(!stop.accepts_class(VehicleClass::Van));
    }
}
