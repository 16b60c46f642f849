use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Product carried to a stop, e.g. a cylinder type.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductType(String);

impl ProductType {
    pub fn new(product: impl Into<String>) -> Self {
        ProductType(product.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
