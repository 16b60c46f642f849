pub mod cluster_first;
pub mod construct_solution;
pub mod nearest_neighbor;
pub mod savings;
