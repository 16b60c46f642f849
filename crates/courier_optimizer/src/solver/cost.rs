use std::cmp::Ordering;

use serde::Serialize;

/// Cost differences below this are treated as ties.
pub const COST_EPSILON: f64 = 1e-6;

/// Cost of a whole solution. The total drives the search, the remaining
/// fields break ties between solutions of equal total.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Default)]
pub struct SolutionCost {
    /// Distance, duration, lateness, capacity surcharge and workload terms of
    /// every route.
    pub routes: f64,
    pub unassigned_penalty: f64,
    pub unassigned: usize,
    pub soft_penalty: f64,
    /// Variance of route durations in hours, non-empty routes only.
    pub workload_variance: f64,
}

impl SolutionCost {
    pub fn total(&self) -> f64 {
        self.routes + self.unassigned_penalty
    }

    fn quantized_total(&self) -> i64 {
        (self.total() / COST_EPSILON).round() as i64
    }

    /// Lexicographic order: total (at `COST_EPSILON` precision), then fewer
    /// unassigned stops, lower soft penalty, more balanced routes.
    pub fn compare(&self, other: &SolutionCost) -> Ordering {
        self.quantized_total()
            .cmp(&other.quantized_total())
            .then_with(|| self.unassigned.cmp(&other.unassigned))
            .then_with(|| self.soft_penalty.total_cmp(&other.soft_penalty))
            .then_with(|| self.workload_variance.total_cmp(&other.workload_variance))
    }

    pub fn is_better_than(&self, other: &SolutionCost) -> bool {
        self.compare(other) == Ordering::Less
    }

    pub fn approx_eq(&self, other: &SolutionCost, epsilon: f64) -> bool {
        (self.total() - other.total()).abs() <= epsilon && self.unassigned == other.unassigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cost(routes: f64, unassigned: usize, soft_penalty: f64, workload_variance: f64) -> SolutionCost {
        SolutionCost {
            routes,
            unassigned_penalty: 0.0,
            unassigned,
            soft_penalty,
            workload_variance,
        }
    }

    #[test]
    fn test_total_decides_first() {
        assert!(cost(10.0, 3, 5.0, 1.0).is_better_than(&cost(11.0, 0, 0.0, 0.0)));
    }

    #[test]
    fn test_ties_prefer_fewer_unassigned_then_soft_then_balance() {
        let base = cost(10.0, 1, 5.0, 1.0);

        assert!(cost(10.0, 0, 9.0, 9.0).is_better_than(&base));
        assert!(cost(10.0, 1, 4.0, 9.0).is_better_than(&base));
        assert!(cost(10.0 + COST_EPSILON / 10.0, 1, 5.0, 0.5).is_better_than(&base));
        assert!(!base.is_better_than(&base));
    }
}
