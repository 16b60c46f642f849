use std::fmt::Display;

use jiff::SignedDuration;
use rand::rngs::SmallRng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::solver::{
    moves::r#move::Move, solution::working_solution::WorkingSolution,
    solver_params::SolverParams, statistics::SolverStatistics,
};

use super::{
    genetic::GeneticSearch, hill_climbing::HillClimbing, incumbent::Incumbent,
    simulated_annealing::SimulatedAnnealing, tabu_search::TabuSearch,
    termination::TerminationState,
};

pub const HILL_CLIMBING_MAX_STOPS: usize = 50;
pub const ANNEALING_MAX_STOPS: usize = 200;
/// Medium instances switch from annealing to tabu search at this budget.
pub const TABU_MIN_BUDGET: SignedDuration = SignedDuration::from_secs(30);

pub trait ImproveSolution {
    /// Improves `solution` in place until a termination fires or the strategy
    /// runs out of moves. The best solution seen is kept in the context's
    /// incumbent, `solution` may end on a worse one.
    fn improve(&self, solution: &mut WorkingSolution, context: &mut SearchContext);
}

/// State shared by every strategy of one run.
pub struct SearchContext<'a> {
    pub params: &'a SolverParams,
    pub rng: SmallRng,
    pub termination: TerminationState,
    pub statistics: SolverStatistics,
    pub incumbent: Incumbent,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        params: &'a SolverParams,
        rng: SmallRng,
        termination: TerminationState,
        seed_solution: &WorkingSolution,
    ) -> Self {
        SearchContext {
            params,
            rng,
            termination,
            statistics: SolverStatistics::default(),
            incumbent: Incumbent::new(seed_solution.clone()),
        }
    }

    pub fn should_stop(&mut self) -> bool {
        self.termination
            .should_stop(self.incumbent.cost().total())
    }

    pub fn record_move(&mut self, mv: &Move) {
        self.statistics.record_move(mv.operator_name());
    }

    /// Counts one iteration, offers the solution to the incumbent and
    /// re-evaluates it from scratch every `resync_interval` iterations.
    /// Returns whether the incumbent improved.
    pub fn after_iteration(&mut self, solution: &mut WorkingSolution) -> bool {
        let iteration = self.termination.iterations() + 1;
        if self.params.resync_interval > 0 && iteration % self.params.resync_interval == 0 {
            let drift = solution.resync();
            self.statistics.record_resync(drift);
        }

        let improved = self.incumbent.offer(solution);
        if improved {
            self.statistics
                .record_best(iteration, *self.incumbent.cost());
        }

        self.termination.record_iteration(improved);
        self.statistics.iterations = self.termination.iterations();
        improved
    }
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    HillClimbing,
    SimulatedAnnealing,
    TabuSearch,
    Genetic,
}

impl SearchStrategy {
    /// Pure function of the instance size and the wall-clock budget.
    pub fn select(num_stops: usize, budget: Option<SignedDuration>) -> Self {
        if num_stops < HILL_CLIMBING_MAX_STOPS {
            SearchStrategy::HillClimbing
        } else if num_stops <= ANNEALING_MAX_STOPS {
            match budget {
                Some(budget) if budget < TABU_MIN_BUDGET => SearchStrategy::SimulatedAnnealing,
                _ => SearchStrategy::TabuSearch,
            }
        } else {
            SearchStrategy::Genetic
        }
    }

    pub fn improve(&self, solution: &mut WorkingSolution, context: &mut SearchContext) {
        let params = context.params;
        match self {
            SearchStrategy::HillClimbing => {
                HillClimbing::new(params.hill_climbing_max_iterations).improve(solution, context)
            }
            SearchStrategy::SimulatedAnnealing => {
                SimulatedAnnealing::new(params.annealing.clone()).improve(solution, context)
            }
            SearchStrategy::TabuSearch => {
                TabuSearch::new(params.tabu.clone()).improve(solution, context)
            }
            SearchStrategy::Genetic => {
                GeneticSearch::new(params.genetic.clone()).improve(solution, context)
            }
        }
    }
}

impl Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HillClimbing => write!(f, "HillClimbing"),
            Self::SimulatedAnnealing => write!(f, "SimulatedAnnealing"),
            Self::TabuSearch => write!(f, "TabuSearch"),
            Self::Genetic => write!(f, "Genetic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_selection() {
        let short = Some(SignedDuration::from_secs(10));
        let long = Some(SignedDuration::from_secs(60));

        assert_eq!(SearchStrategy::select(10, long), SearchStrategy::HillClimbing);
        assert_eq!(SearchStrategy::select(49, short), SearchStrategy::HillClimbing);
        assert_eq!(SearchStrategy::select(50, short), SearchStrategy::SimulatedAnnealing);
        assert_eq!(SearchStrategy::select(120, long), SearchStrategy::TabuSearch);
        assert_eq!(SearchStrategy::select(200, None), SearchStrategy::TabuSearch);
        assert_eq!(SearchStrategy::select(201, short), SearchStrategy::Genetic);
    }
}
