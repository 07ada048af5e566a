//! Shared runtime helpers for the attendance console workspace.

pub mod env;
pub mod utils;
