pub mod enumerate_idx;
pub mod newtype_index;
pub mod stats;
pub mod time;
