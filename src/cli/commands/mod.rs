//! CLI subcommand implementations

pub mod analyze;
pub mod clean;
pub mod config;
pub mod scan;
