use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use jiff::{SignedDuration, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Iterations(usize),
    Duration(SignedDuration),
    /// Stops once the total cost is at or below the target.
    TargetCost(f64),
    IterationsWithoutImprovement(usize),
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Iterations,
    Duration,
    TargetCost,
    Plateau,
    Cancelled,
    /// The strategy itself ran out of moves: local optimum, temperature
    /// floor, no admissible tabu move, generation cap.
    Exhausted,
}

/// Tracks the run against its terminations, the first one reached wins.
pub struct TerminationState {
    terminations: Vec<Termination>,
    started_at: Timestamp,
    iterations: usize,
    iterations_since_improvement: usize,
    cancelled: Arc<AtomicBool>,
    reason: Option<StopReason>,
}

impl TerminationState {
    pub fn new(terminations: Vec<Termination>, cancelled: Arc<AtomicBool>) -> Self {
        TerminationState {
            terminations,
            started_at: Timestamp::now(),
            iterations: 0,
            iterations_since_improvement: 0,
            cancelled,
            reason: None,
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn elapsed(&self) -> SignedDuration {
        Timestamp::now().duration_since(self.started_at)
    }

    pub fn record_iteration(&mut self, improved: bool) {
        self.iterations += 1;
        if improved {
            self.iterations_since_improvement = 0;
        } else {
            self.iterations_since_improvement += 1;
        }
    }

    /// Checked between outer iterations.
    pub fn should_stop(&mut self, best_cost: f64) -> bool {
        if self.reason.is_some() {
            return true;
        }

        if self.cancelled.load(Ordering::Relaxed) {
            self.reason = Some(StopReason::Cancelled);
            return true;
        }

        for termination in &self.terminations {
            let reached = match termination {
                Termination::Iterations(max) => {
                    (self.iterations >= *max).then_some(StopReason::Iterations)
                }
                Termination::Duration(duration) => {
                    (self.elapsed() >= *duration).then_some(StopReason::Duration)
                }
                Termination::TargetCost(target) => {
                    (best_cost <= *target).then_some(StopReason::TargetCost)
                }
                Termination::IterationsWithoutImprovement(max) => {
                    (self.iterations_since_improvement >= *max).then_some(StopReason::Plateau)
                }
            };

            if let Some(reason) = reached {
                self.reason = Some(reason);
                return true;
            }
        }

        false
    }

    /// Lets a strategy stop the run on its own criterion, unless a
    /// termination already fired.
    pub fn finish(&mut self, reason: StopReason) {
        self.reason.get_or_insert(reason);
    }

    /// Lets the next strategy run after one that finished on its own.
    pub fn resume(&mut self) {
        if self.reason == Some(StopReason::Exhausted) {
            self.reason = None;
        }
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.reason
    }

    /// False when the run was cut by its wall-clock budget or cancelled.
    pub fn converged(&self) -> bool {
        !matches!(
            self.reason,
            Some(StopReason::Duration) | Some(StopReason::Cancelled)
        )
    }
}
