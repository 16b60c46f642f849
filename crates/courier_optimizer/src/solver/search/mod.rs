pub mod genetic;
pub mod hill_climbing;
pub mod improve_solution;
pub mod incumbent;
pub mod local_search;
pub mod neighborhood;
pub mod simulated_annealing;
pub mod tabu_search;
pub mod termination;
