pub mod planning_request;
pub mod schema;
pub mod types;
