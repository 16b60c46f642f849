pub mod insert;
pub mod inter_relocate;
pub mod inter_swap;
pub mod r#move;
pub mod or_opt;
pub mod remove;
pub mod two_opt;
pub mod two_opt_star;
