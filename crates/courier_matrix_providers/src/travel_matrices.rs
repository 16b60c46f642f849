use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Pairwise distances (meters) and travel times (seconds) for a point set.
/// Stored as flat row-major vectors.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct TravelMatrices {
    pub distances: Vec<f64>,
    pub times: Vec<f64>,

    /// Pairs that were not answered by the provider and were filled with a
    /// straight-line estimate. Empty when every pair is authoritative.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub estimated: Vec<bool>,
}

impl TravelMatrices {
    pub fn num_locations(&self) -> usize {
        self.distances.len().isqrt()
    }

    pub fn is_square(&self) -> bool {
        let n = self.num_locations();
        n * n == self.distances.len()
            && self.times.len() == self.distances.len()
            && (self.estimated.is_empty() || self.estimated.len() == self.distances.len())
    }

    #[inline]
    pub fn is_estimated(&self, index: usize) -> bool {
        self.estimated.get(index).copied().unwrap_or(false)
    }

    pub fn estimated_pairs(&self) -> usize {
        self.estimated.iter().filter(|&&estimated| estimated).count()
    }

    pub fn mark_all_estimated(&mut self) {
        let n = self.num_locations();
        self.estimated = (0..n * n).map(|index| index / n != index % n).collect();
    }
}

impl std::hash::Hash for TravelMatrices {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for d in &self.distances {
            state.write_u64(d.to_bits());
        }
        for t in &self.times {
            state.write_u64(t.to_bits());
        }
        for e in &self.estimated {
            state.write_u8(*e as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_all_estimated_skips_diagonal() {
        let mut matrices = TravelMatrices {
            distances: vec![0.0, 1.0, 1.0, 0.0],
            times: vec![0.0, 1.0, 1.0, 0.0],
            estimated: vec![],
        };

        assert_eq!(matrices.estimated_pairs(), 0);
        matrices.mark_all_estimated();

        assert_eq!(matrices.estimated, vec![false, true, true, false]);
        assert_eq!(matrices.estimated_pairs(), 2);
        assert!(matrices.is_square());
    }
}
