use std::ops::{Add, AddAssign, Sub, SubAssign};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Weight and volume carried by a vehicle or demanded by a stop.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, Default, PartialEq)]
pub struct Capacity {
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Capacity {
    pub const EMPTY: Capacity = Capacity {
        weight: 0.0,
        volume: 0.0,
    };

    pub fn new(weight: f64, volume: f64) -> Self {
        Capacity { weight, volume }
    }

    pub fn weight(weight: f64) -> Self {
        Capacity {
            weight,
            volume: 0.0,
        }
    }

    pub fn fits_within(&self, limit: &Capacity) -> bool {
        self.weight <= limit.weight + f64::EPSILON && self.volume <= limit.volume + f64::EPSILON
    }

    /// Sum of the amounts exceeding `limit`, 0 when it fits.
    pub fn overage(&self, limit: &Capacity) -> f64 {
        (self.weight - limit.weight).max(0.0) + (self.volume - limit.volume).max(0.0)
    }

    pub fn scaled(&self, ratio: f64) -> Capacity {
        Capacity {
            weight: self.weight * ratio,
            volume: self.volume * ratio,
        }
    }

    /// Highest fill ratio over both dimensions, dimensions with a zero limit
    /// are ignored.
    pub fn utilization(&self, limit: &Capacity) -> f64 {
        let ratio = |amount: f64, limit: f64| if limit > 0.0 { amount / limit } else { 0.0 };
        ratio(self.weight, limit.weight).max(ratio(self.volume, limit.volume))
    }

    pub fn is_empty(&self) -> bool {
        self.weight == 0.0 && self.volume == 0.0
    }
}

impl Add for Capacity {
    type Output = Capacity;

    fn add(self, rhs: Capacity) -> Capacity {
        Capacity {
            weight: self.weight + rhs.weight,
            volume: self.volume + rhs.volume,
        }
    }
}

impl Sub for Capacity {
    type Output = Capacity;

    fn sub(self, rhs: Capacity) -> Capacity {
        Capacity {
            weight: self.weight - rhs.weight,
            volume: self.volume - rhs.volume,
        }
    }
}

impl AddAssign for Capacity {
    fn add_assign(&mut self, rhs: Capacity) {
        self.weight += rhs.weight;
        self.volume += rhs.volume;
    }
}

impl SubAssign for Capacity {
    fn sub_assign(&mut self, rhs: Capacity) {
        self.weight -= rhs.weight;
        self.volume -= rhs.volume;
    }
}

impl std::iter::Sum for Capacity {
    fn sum<I: Iterator<Item = Capacity>>(iter: I) -> Self {
        iter.fold(Capacity::EMPTY, |acc, capacity| acc + capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_within() {
        let limit = Capacity::new(100.0, 10.0);

        assert!(Capacity::new(100.0, 10.0).fits_within(&limit));
        assert!(!Capacity::new(100.5, 1.0).fits_within(&limit));
        assert!(!Capacity::new(1.0, 11.0).fits_within(&limit));
    }

    #[test]
    fn test_overage_and_utilization() {
        let limit = Capacity::new(100.0, 10.0);
        let load = Capacity::new(110.0, 5.0);

        assert_eq!(load.overage(&limit), 10.0);
        assert_eq!(load.utilization(&limit), 1.1);
        assert_eq!(Capacity::weight(50.0).utilization(&Capacity::weight(0.0)), 0.0);
    }

    #[test]
    fn test_sum() {
        let total: Capacity = [Capacity::new(1.0, 2.0), Capacity::new(3.0, 4.0)]
            .into_iter()
            .sum();
        assert_eq!(total, Capacity::new(4.0, 6.0));
    }
}
