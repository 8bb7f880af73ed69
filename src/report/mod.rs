//! Report module - summarizing pipeline and search results

pub mod search_export;
pub mod summary;

pub use search_export::*;
pub use summary::*;
