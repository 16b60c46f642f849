pub mod dispatch;
pub mod error;
pub mod json;
pub mod problem;
pub mod service;
pub mod solver;
mod utils;

#[cfg(test)]
pub(crate) mod test_utils;
