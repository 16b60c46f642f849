pub mod collaborators;
pub mod planning_service;
