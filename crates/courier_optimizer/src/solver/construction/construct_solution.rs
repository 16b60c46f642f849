use std::fmt::Display;

use rand::rngs::SmallRng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    solver::{insertion::CheapestInsertion, solution::working_solution::WorkingSolution},
    timer_debug,
};

use super::{
    cluster_first::ClusterFirst, nearest_neighbor::NearestNeighbor, savings::Savings,
};

pub const NEAREST_NEIGHBOR_MAX_STOPS: usize = 50;
pub const SAVINGS_MAX_STOPS: usize = 200;

pub trait ConstructSolution {
    /// Builds routes out of the unassigned stops. Stops that do not fit stay
    /// unassigned.
    fn construct(&self, solution: &mut WorkingSolution, rng: &mut SmallRng);
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionStrategy {
    NearestNeighbor,
    Savings,
    ClusterFirst,
}

impl Display for ConstructionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NearestNeighbor => write!(f, "NearestNeighbor"),
            Self::Savings => write!(f, "Savings"),
            Self::ClusterFirst => write!(f, "ClusterFirst"),
        }
    }
}

impl ConstructionStrategy {
    pub fn for_stop_count(num_stops: usize) -> Self {
        if num_stops <= NEAREST_NEIGHBOR_MAX_STOPS {
            ConstructionStrategy::NearestNeighbor
        } else if num_stops <= SAVINGS_MAX_STOPS {
            ConstructionStrategy::Savings
        } else {
            ConstructionStrategy::ClusterFirst
        }
    }

    /// Runs the heuristic, then the cheapest insertion repair on whatever is
    /// left.
    #[instrument(skip_all, level = "debug", fields(strategy = %self))]
    pub fn construct(&self, solution: &mut WorkingSolution, rng: &mut SmallRng) {
        timer_debug!("Construction", {
            match self {
                ConstructionStrategy::NearestNeighbor => NearestNeighbor.construct(solution, rng),
                ConstructionStrategy::Savings => Savings.construct(solution, rng),
                ConstructionStrategy::ClusterFirst => ClusterFirst.construct(solution, rng),
            }
        });

        let leftovers = solution.unassigned().len();
        if leftovers > 0 {
            let inserted = CheapestInsertion::default().insert_unassigned(solution, rng);
            debug!("Repair placed {inserted}/{leftovers} leftover stops");
        }

        info!(
            "Constructed solution with {} strategy: cost {:.2}, {} unassigned",
            self,
            solution.cost().total(),
            solution.unassigned().len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_depends_on_stop_count() {
        assert_eq!(
            ConstructionStrategy::for_stop_count(50),
            ConstructionStrategy::NearestNeighbor
        );
        assert_eq!(
            ConstructionStrategy::for_stop_count(51),
            ConstructionStrategy::Savings
        );
        assert_eq!(
            ConstructionStrategy::for_stop_count(201),
            ConstructionStrategy::ClusterFirst
        );
    }
}
