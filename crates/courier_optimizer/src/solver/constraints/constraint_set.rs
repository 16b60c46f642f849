use jiff::{SignedDuration, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::problem::capacity::Capacity;

/// Versioned snapshot of hard constraints and soft weights, captured once
/// per run. Relaxation only ever produces a new version.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct ConstraintSet {
    #[serde(default)]
    version: u32,
    #[serde(default = "Timestamp::now")]
    created_at: Timestamp,
    #[serde(default)]
    hard: HardConstraints,
    #[serde(default)]
    weights: CostWeights,
    #[serde(default)]
    relaxation: Relaxation,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HardConstraints {
    /// Lateness tolerated beyond a stop's latest arrival. Lateness within the
    /// tolerance is penalized, beyond it the position is infeasible.
    pub max_lateness: SignedDuration,
    pub enforce_driver_hours: bool,
    pub enforce_zones: bool,
}

impl Default for HardConstraints {
    fn default() -> Self {
        HardConstraints {
            max_lateness: SignedDuration::from_mins(30),
            enforce_driver_hours: true,
            enforce_zones: true,
        }
    }
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CostWeights {
    pub distance_per_km: f64,
    pub duration_per_hour: f64,
    pub lateness_per_minute: f64,
    pub capacity_overage_per_unit: f64,
    /// Applied to the square of each route's duration in hours.
    pub workload_balance: f64,
    pub unassigned_stop: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        CostWeights {
            distance_per_km: 1.0,
            duration_per_hour: 20.0,
            lateness_per_minute: 2.0,
            capacity_overage_per_unit: 50.0,
            workload_balance: 0.0,
            unassigned_stop: 100_000.0,
        }
    }
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Relaxation {
    pub extra_lateness: SignedDuration,
    pub capacity_overage_ratio: f64,
}

impl Default for ConstraintSet {
    fn default() -> Self {
        ConstraintSet::new(HardConstraints::default(), CostWeights::default())
    }
}

impl ConstraintSet {
    pub fn new(hard: HardConstraints, weights: CostWeights) -> Self {
        ConstraintSet {
            version: 1,
            created_at: Timestamp::now(),
            hard,
            weights,
            relaxation: Relaxation::default(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn hard(&self) -> &HardConstraints {
        &self.hard
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    pub fn relaxation(&self) -> &Relaxation {
        &self.relaxation
    }

    pub fn is_relaxed(&self) -> bool {
        self.relaxation != Relaxation::default()
    }

    pub fn lateness_tolerance(&self) -> SignedDuration {
        self.hard.max_lateness + self.relaxation.extra_lateness
    }

    /// Load a vehicle may carry, overage included.
    pub fn capacity_limit(&self, capacity: &Capacity) -> Capacity {
        capacity.scaled(1.0 + self.relaxation.capacity_overage_ratio)
    }

    pub fn relaxed(&self, relaxation: Relaxation) -> ConstraintSet {
        ConstraintSet {
            version: self.version + 1,
            created_at: Timestamp::now(),
            hard: self.hard.clone(),
            weights: self.weights.clone(),
            relaxation,
        }
    }
}
