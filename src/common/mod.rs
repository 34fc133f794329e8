//! Shared error types and primitives

pub mod errors;
pub mod timing_safe;
