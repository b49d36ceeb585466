//! CLI command implementations

pub mod pipeline;
pub mod predict;
