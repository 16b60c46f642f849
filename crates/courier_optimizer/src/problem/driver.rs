use fxhash::FxHashSet;
use jiff::SignedDuration;

use crate::define_index_newtype;

use super::skill::Skill;

define_index_newtype!(DriverIdx, Driver);

#[derive(Debug, Clone)]
pub struct Driver {
    external_id: String,
    skills: FxHashSet<Skill>,
    available: bool,
    maximum_working_duration: Option<SignedDuration>,
    vehicle_id: Option<String>,
}

impl Driver {
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn skills(&self) -> &FxHashSet<Skill> {
        &self.skills
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn maximum_working_duration(&self) -> Option<SignedDuration> {
        self.maximum_working_duration
    }

    /// External id of the vehicle the driver is assigned to, if any.
    pub fn vehicle_id(&self) -> Option<&str> {
        self.vehicle_id.as_deref()
    }

    pub fn has_skills(&self, required: &FxHashSet<Skill>) -> bool {
        required.is_subset(&self.skills)
    }

    pub(crate) fn set_available(&mut self, available: bool) {
        self.available = available;
    }
}

#[derive(Default)]
pub struct DriverBuilder {
    external_id: Option<String>,
    skills: Option<FxHashSet<Skill>>,
    available: Option<bool>,
    maximum_working_duration: Option<SignedDuration>,
    vehicle_id: Option<String>,
}

impl DriverBuilder {
    pub fn set_external_id(&mut self, external_id: impl Into<String>) -> &mut DriverBuilder {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn set_skills(&mut self, skills: FxHashSet<Skill>) -> &mut DriverBuilder {
        self.skills = Some(skills);
        self
    }

    pub fn set_available(&mut self, available: bool) -> &mut DriverBuilder {
        self.available = Some(available);
        self
    }

    pub fn set_maximum_working_duration(&mut self, duration: SignedDuration) -> &mut DriverBuilder {
        self.maximum_working_duration = Some(duration);
        self
    }

    pub fn set_vehicle_id(&mut self, vehicle_id: impl Into<String>) -> &mut DriverBuilder {
        self.vehicle_id = Some(vehicle_id.into());
        self
    }

    pub fn build(self) -> Driver {
        Driver {
            external_id: self.external_id.expect("Expected driver id"),
            skills: self.skills.unwrap_or_default(),
            available: self.available.unwrap_or(true),
            maximum_working_duration: self.maximum_working_duration,
            vehicle_id: self.vehicle_id,
        }
    }
}
