pub mod route;
pub mod schedule;
pub mod working_solution;
