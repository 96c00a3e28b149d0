//! Subcommand implementations

pub mod cache;
pub mod info;
pub mod plan;
pub mod scan;
