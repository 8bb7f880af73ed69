//! CLI module - argument parsing and command runners

pub mod args;
pub mod clean;
pub mod profile;
pub mod search;
pub mod stages;

pub use args::{Cli, Commands, EstimatorChoice};
