pub mod actor;
pub mod controller;
pub mod proposal;
pub mod route_state;
