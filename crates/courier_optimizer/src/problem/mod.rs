pub mod capacity;
pub mod driver;
pub mod location;
pub mod planning_problem;
pub mod product;
pub mod provider_oracle;
pub mod resource;
pub mod skill;
pub mod stop;
pub mod stop_index;
pub mod time_window;
pub mod travel_costs;
pub mod vehicle;
pub mod zone;
