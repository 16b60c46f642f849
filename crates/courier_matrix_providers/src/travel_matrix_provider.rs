use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::travel_matrices::TravelMatrices;

pub const HTTP_TABLE_URL_ENV_VAR: &str = "COURIER_HTTP_TABLE_URL";
pub const HTTP_TABLE_PROFILE_ENV_VAR: &str = "COURIER_HTTP_TABLE_PROFILE";

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum TravelMatrixProvider {
    /// OSRM-compatible `/table/v1/{profile}` endpoint.
    HttpTable {
        url: String,
        profile: String,
    },
    AsTheCrowFlies {
        speed_kmh: f64,
    },
    Custom {
        matrices: TravelMatrices,
    },
}

impl Default for TravelMatrixProvider {
    fn default() -> Self {
        TravelMatrixProvider::AsTheCrowFlies { speed_kmh: 40.0 }
    }
}

impl TravelMatrixProvider {
    /// Table service from `COURIER_HTTP_TABLE_URL`, straight lines when unset.
    pub fn from_env() -> Self {
        match std::env::var(HTTP_TABLE_URL_ENV_VAR) {
            Ok(url) if !url.is_empty() => TravelMatrixProvider::HttpTable {
                url,
                profile: std::env::var(HTTP_TABLE_PROFILE_ENV_VAR)
                    .unwrap_or_else(|_| String::from("driving")),
            },
            _ => TravelMatrixProvider::default(),
        }
    }

    pub fn is_cacheable(&self) -> bool {
        matches!(self, TravelMatrixProvider::HttpTable { .. })
    }
}

impl std::hash::Hash for TravelMatrixProvider {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            TravelMatrixProvider::HttpTable { url, profile } => {
                state.write_u8(0);
                url.hash(state);
                profile.hash(state);
            }
            TravelMatrixProvider::AsTheCrowFlies { speed_kmh } => {
                state.write_u8(1);
                state.write_u64(speed_kmh.to_bits());
            }
            TravelMatrixProvider::Custom { matrices } => {
                state.write_u8(2);
                matrices.hash(state);
            }
        }
    }
}
