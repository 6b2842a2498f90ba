//! Data models for the volunteer opportunity service.
//!
//! Field names follow the camelCase wire format the frontend already reads.

pub mod active_flag;
mod opportunity;
mod stats;

pub use opportunity::*;
pub use stats::*;
