use jiff::SignedDuration;

use super::{
    construction::construct_solution::ConstructionStrategy,
    search::{improve_solution::SearchStrategy, termination::Termination},
};

#[derive(Clone, Debug)]
pub struct SolverParams {
    pub terminations: Vec<Termination>,
    /// Seed of the run, derived from the clock when absent.
    pub seed: Option<u64>,

    /// Forces a construction heuristic instead of picking one by stop count.
    pub construction: Option<ConstructionStrategy>,
    /// Forces a metaheuristic instead of picking one by stop count and budget.
    pub search: Option<SearchStrategy>,

    /// Largest location count for which the full travel matrix is fetched up
    /// front, larger problems ask the oracle pair by pair.
    pub matrix_threshold: usize,
    /// Iterations between two full re-evaluations of the solution.
    pub resync_interval: usize,
    pub local_search_threads: Threads,
    pub hill_climbing_max_iterations: usize,

    pub annealing: AnnealingParams,
    pub tabu: TabuParams,
    pub genetic: GeneticParams,
    pub validator: ValidatorParams,
}

#[derive(Clone, Debug)]
pub enum Threads {
    Single,
    Auto,
    Multi(usize),
}

impl Threads {
    pub fn number_of_threads(&self) -> usize {
        match self {
            Threads::Single => 1,
            Threads::Multi(num) => *num,
            Threads::Auto => std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AnnealingParams {
    /// Derived from sampled move deltas when absent.
    pub initial_temperature: Option<f64>,
    pub cooling_rate: f64,
    pub iterations_per_temperature: usize,
    pub min_temperature: f64,
    /// Non-improving iterations before rolling back to the best solution and
    /// reheating.
    pub reheat_after: usize,
    pub max_reheats: usize,
}

#[derive(Clone, Debug)]
pub struct TabuParams {
    pub tenure: usize,
    pub max_iterations: usize,
}

#[derive(Clone, Debug)]
pub struct GeneticParams {
    pub population_size: usize,
    pub offspring_per_generation: usize,
    pub mutation_rate: f64,
    /// Share of the stops removed by the ruin-and-recreate mutation.
    pub ruin_ratio: f64,
    pub max_generations: usize,
    pub plateau_generations: usize,
}

#[derive(Clone, Debug)]
pub struct ValidatorParams {
    pub lateness_step: SignedDuration,
    pub max_extra_lateness: SignedDuration,
    pub capacity_overage_ratio: f64,
    /// Local search iterations after each relaxation step.
    pub repair_iterations: usize,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            terminations: vec![
                Termination::IterationsWithoutImprovement(5_000),
                Termination::Iterations(100_000),
                Termination::Duration(SignedDuration::from_secs(30)),
            ],
            seed: None,
            construction: None,
            search: None,
            matrix_threshold: 300,
            resync_interval: 500,
            local_search_threads: Threads::Auto,
            hill_climbing_max_iterations: 10_000,
            annealing: AnnealingParams::default(),
            tabu: TabuParams::default(),
            genetic: GeneticParams::default(),
            validator: ValidatorParams::default(),
        }
    }
}

impl Default for AnnealingParams {
    fn default() -> Self {
        Self {
            initial_temperature: None,
            cooling_rate: 0.95,
            iterations_per_temperature: 100,
            min_temperature: 1e-3,
            reheat_after: 2_000,
            max_reheats: 3,
        }
    }
}

impl Default for TabuParams {
    fn default() -> Self {
        Self {
            tenure: 10,
            max_iterations: 2_000,
        }
    }
}

impl Default for GeneticParams {
    fn default() -> Self {
        Self {
            population_size: 12,
            offspring_per_generation: 8,
            mutation_rate: 0.3,
            ruin_ratio: 0.1,
            max_generations: 500,
            plateau_generations: 50,
        }
    }
}

impl Default for ValidatorParams {
    fn default() -> Self {
        Self {
            lateness_step: SignedDuration::from_mins(15),
            max_extra_lateness: SignedDuration::from_mins(60),
            capacity_overage_ratio: 0.1,
            repair_iterations: 200,
        }
    }
}

impl SolverParams {
    /// Wall-clock budget of the run, the shortest duration termination.
    pub fn time_budget(&self) -> Option<SignedDuration> {
        self.terminations
            .iter()
            .filter_map(|termination| match termination {
                Termination::Duration(duration) => Some(*duration),
                _ => None,
            })
            .min()
    }

    pub fn with_time_budget(mut self, budget: SignedDuration) -> Self {
        self.terminations
            .retain(|termination| !matches!(termination, Termination::Duration(_)));
        self.terminations.push(Termination::Duration(budget));
        self
    }
}
