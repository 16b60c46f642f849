use fxhash::FxHashMap;
use jiff::{SignedDuration, Timestamp};
use serde::Serialize;

use super::cost::SolutionCost;

#[derive(Serialize, Debug, Clone)]
pub struct CostEvolutionRow {
    pub timestamp: Timestamp,
    pub iteration: usize,
    pub cost: SolutionCost,
}

/// Counters of one run, reported with the plan.
#[derive(Serialize, Debug, Clone, Default)]
pub struct SolverStatistics {
    pub iterations: usize,
    pub accepted_moves: usize,
    pub improvements: usize,
    pub resyncs: usize,
    /// Largest gap found between the running cost and a full re-evaluation.
    pub max_drift: f64,
    pub cost_evolution: Vec<CostEvolutionRow>,
    pub moves_by_operator: FxHashMap<&'static str, usize>,
    pub construction_duration: SignedDuration,
    pub search_duration: SignedDuration,
    pub validation_duration: SignedDuration,
}

impl SolverStatistics {
    pub fn record_move(&mut self, operator_name: &'static str) {
        self.accepted_moves += 1;
        self.moves_by_operator
            .entry(operator_name)
            .and_modify(|entry| *entry += 1)
            .or_insert(1);
    }

    pub fn record_best(&mut self, iteration: usize, cost: SolutionCost) {
        self.improvements += 1;
        self.cost_evolution.push(CostEvolutionRow {
            timestamp: Timestamp::now(),
            iteration,
            cost,
        });
    }

    pub fn record_resync(&mut self, drift: f64) {
        self.resyncs += 1;
        self.max_drift = self.max_drift.max(drift);
    }
}
