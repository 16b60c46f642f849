pub mod capacity_constraint;
pub mod constraint;
pub mod constraint_set;
pub mod driver_hours_constraint;
pub mod eligibility_constraint;
pub mod time_window_constraint;
