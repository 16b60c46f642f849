use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Zone(String);

impl Zone {
    pub fn new(zone: impl Into<String>) -> Self {
        Zone(zone.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
