//! creditpipe: Credit Risk Data Pipeline Library
//!
//! Fetches the Home Credit tables, copies them into a processed directory,
//! joins them into one wide table, cleans features and searches classifier
//! hyperparameters with successive halving.

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod utils;
pub mod viz;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
