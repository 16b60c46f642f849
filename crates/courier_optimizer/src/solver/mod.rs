pub mod constraints;
pub mod construction;
pub mod cost;
pub mod insertion;
pub mod moves;
pub mod plan_result;
pub mod search;
pub mod solution;
pub mod solver;
pub mod solver_params;
pub mod statistics;
pub mod validator;
