//! CLI command implementations.

pub mod paths;
pub mod plan;
pub mod serve;
pub mod sync;
