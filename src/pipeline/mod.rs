//! Pipeline module - the fetch, prepare, merge and cleaning stages

pub mod clean;
pub mod fetch;
pub mod impute;
pub mod loader;
pub mod merge;
pub mod prepare;

pub use clean::*;
pub use fetch::*;
pub use impute::*;
pub use loader::*;
pub use merge::*;
pub use prepare::*;
