use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use courier_matrix_providers::travel_matrices::TravelMatrices;
use fxhash::FxHashMap;
use jiff::SignedDuration;
use parking_lot::RwLock;
use thiserror::Error;

use super::location::{Location, LocationIdx};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelCost {
    /// Meters.
    pub distance: f64,
    /// Seconds.
    pub time: f64,
    pub estimated: bool,
}

impl TravelCost {
    pub const ZERO: TravelCost = TravelCost {
        distance: 0.0,
        time: 0.0,
        estimated: false,
    };

    #[inline]
    pub fn duration(&self) -> SignedDuration {
        SignedDuration::from_secs_f64(self.time)
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("no route between the locations")]
    Unroutable,

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// Answers single location pairs, used when costs are computed lazily.
pub trait PairOracle: Send + Sync {
    /// Returns `(meters, seconds)`.
    fn cost(&self, from: &Location, to: &Location) -> Result<(f64, f64), OracleError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Haversine,
    Euclidean,
}

#[derive(Debug, Clone, Copy)]
pub struct StraightLineOracle {
    metric: DistanceMetric,
    seconds_per_meter: f64,
}

impl StraightLineOracle {
    pub fn new(metric: DistanceMetric, speed_kmh: f64) -> Self {
        StraightLineOracle {
            metric,
            seconds_per_meter: if speed_kmh > 0.0 { 3.6 / speed_kmh } else { 0.0 },
        }
    }

    /// Cartesian coordinates where one unit of distance takes
    /// `seconds_per_unit` to travel.
    pub fn euclidean_with_unit_time(seconds_per_unit: f64) -> Self {
        StraightLineOracle {
            metric: DistanceMetric::Euclidean,
            seconds_per_meter: seconds_per_unit,
        }
    }

    #[inline]
    fn estimate(&self, from: &Location, to: &Location) -> (f64, f64) {
        let distance = match self.metric {
            DistanceMetric::Haversine => from.haversine_distance(to),
            DistanceMetric::Euclidean => from.euclidean_distance(to),
        };

        (distance, distance * self.seconds_per_meter)
    }
}

impl PairOracle for StraightLineOracle {
    fn cost(&self, from: &Location, to: &Location) -> Result<(f64, f64), OracleError> {
        Ok(self.estimate(from, to))
    }
}

struct DenseMatrix {
    num_locations: usize,
    distances: Vec<f64>,
    times: Vec<f64>,
    estimated: Vec<bool>,
}

/// Pairwise travel costs for one run. Pairs covered by the precomputed
/// matrix are read directly, any other pair goes through the oracle once and
/// is memoized. A failing oracle answer is replaced by the straight-line
/// estimate and flagged.
pub struct TravelCosts {
    matrix: Option<DenseMatrix>,
    oracle: Arc<dyn PairOracle>,
    fallback: StraightLineOracle,
    memo: RwLock<FxHashMap<(usize, usize), TravelCost>>,
    estimated_lookups: AtomicUsize,
}

impl TravelCosts {
    pub fn from_matrices(
        matrices: TravelMatrices,
        oracle: Arc<dyn PairOracle>,
        fallback: StraightLineOracle,
    ) -> Self {
        let num_locations = matrices.num_locations();
        TravelCosts {
            matrix: Some(DenseMatrix {
                num_locations,
                distances: matrices.distances,
                times: matrices.times,
                estimated: matrices.estimated,
            }),
            oracle,
            fallback,
            memo: RwLock::new(FxHashMap::default()),
            estimated_lookups: AtomicUsize::new(0),
        }
    }

    pub fn lazy(oracle: Arc<dyn PairOracle>, fallback: StraightLineOracle) -> Self {
        TravelCosts {
            matrix: None,
            oracle,
            fallback,
            memo: RwLock::new(FxHashMap::default()),
            estimated_lookups: AtomicUsize::new(0),
        }
    }

    /// Straight-line costs over cartesian coordinates, mostly for tests and
    /// synthetic instances.
    pub fn euclidean(seconds_per_unit: f64) -> Self {
        let oracle = StraightLineOracle::euclidean_with_unit_time(seconds_per_unit);
        Self::lazy(Arc::new(oracle), oracle)
    }

    pub fn is_precomputed(&self) -> bool {
        self.matrix.is_some()
    }

    #[inline]
    pub fn cost(&self, locations: &[Location], from: LocationIdx, to: LocationIdx) -> TravelCost {
        if from == to {
            return TravelCost::ZERO;
        }

        if let Some(matrix) = &self.matrix
            && from.get() < matrix.num_locations
            && to.get() < matrix.num_locations
        {
            let index = from.get() * matrix.num_locations + to.get();
            return TravelCost {
                distance: matrix.distances[index],
                time: matrix.times[index],
                estimated: matrix.estimated.get(index).copied().unwrap_or(false),
            };
        }

        let key = (from.get(), to.get());
        if let Some(cost) = self.memo.read().get(&key) {
            return *cost;
        }

        let from_location = &locations[from];
        let to_location = &locations[to];
        let cost = match self.oracle.cost(from_location, to_location) {
            Ok((distance, time)) => TravelCost {
                distance,
                time,
                estimated: false,
            },
            Err(_) => {
                let (distance, time) = self.fallback.estimate(from_location, to_location);
                TravelCost {
                    distance,
                    time,
                    estimated: true,
                }
            }
        };

        *self.memo.write().entry(key).or_insert_with(|| {
            if cost.estimated {
                self.estimated_lookups.fetch_add(1, Ordering::Relaxed);
            }
            cost
        })
    }

    /// Number of location pairs whose cost is an estimate.
    pub fn estimated_pairs(&self) -> usize {
        let in_matrix = self
            .matrix
            .as_ref()
            .map(|matrix| matrix.estimated.iter().filter(|&&e| e).count())
            .unwrap_or(0);

        in_matrix + self.estimated_lookups.load(Ordering::Relaxed)
    }

    pub fn memoized_pairs(&self) -> usize {
        self.memo.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingOracle;

    impl PairOracle for FailingOracle {
        fn cost(&self, _from: &Location, _to: &Location) -> Result<(f64, f64), OracleError> {
            Err(OracleError::Unavailable(String::from("offline")))
        }
    }

    fn locations() -> Vec<Location> {
        vec![
            Location::from_cartesian(0.0, 0.0),
            Location::from_cartesian(3.0, 4.0),
            Location::from_cartesian(6.0, 8.0),
        ]
    }

    #[test]
    fn test_lazy_costs_are_memoized() {
        let costs = TravelCosts::euclidean(60.0);
        let locations = locations();

        let cost = costs.cost(&locations, LocationIdx::new(0), LocationIdx::new(1));
        assert_eq!(cost.distance, 5.0);
        assert_eq!(cost.time, 300.0);
        assert!(!cost.estimated);
        assert_eq!(costs.memoized_pairs(), 1);

        costs.cost(&locations, LocationIdx::new(0), LocationIdx::new(1));
        assert_eq!(costs.memoized_pairs(), 1);
        assert_eq!(
            costs.cost(&locations, LocationIdx::new(2), LocationIdx::new(2)),
            TravelCost::ZERO
        );
    }

    #[test]
    fn test_failing_oracle_falls_back_to_estimates() {
        let costs = TravelCosts::lazy(
            Arc::new(FailingOracle),
            StraightLineOracle::euclidean_with_unit_time(1.0),
        );
        let locations = locations();

        let cost = costs.cost(&locations, LocationIdx::new(0), LocationIdx::new(2));
        assert!(cost.estimated);
        assert_eq!(cost.distance, 10.0);
        assert_eq!(costs.estimated_pairs(), 1);
    }

    #[test]
    fn test_matrix_lookup_and_extension() {
        let matrices = TravelMatrices {
            distances: vec![0.0, 100.0, 120.0, 0.0],
            times: vec![0.0, 10.0, 12.0, 0.0],
            estimated: vec![false, false, true, false],
        };
        let oracle = StraightLineOracle::euclidean_with_unit_time(1.0);
        let costs = TravelCosts::from_matrices(matrices, Arc::new(oracle), oracle);
        let locations = locations();

        let cost = costs.cost(&locations, LocationIdx::new(0), LocationIdx::new(1));
        assert_eq!((cost.distance, cost.time), (100.0, 10.0));
        assert!(costs.cost(&locations, LocationIdx::new(1), LocationIdx::new(0)).estimated);

        // Location 2 is outside the matrix
        let extension = costs.cost(&locations, LocationIdx::new(1), LocationIdx::new(2));
        assert_eq!(extension.distance, 5.0);
        assert!(!extension.estimated);
        assert_eq!(costs.estimated_pairs(), 1);
    }
}
