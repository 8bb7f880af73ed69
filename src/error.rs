//! Error types for the pipeline stages.
//!
//! Every stage returns [`PipelineError`]. The first five variants are the
//! failure modes callers are expected to match on; the rest wrap errors from
//! the libraries the stages are built on.

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by the fetch, prepare, merge, clean and model stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required environment variable is unset or empty.
    #[error("Missing required configuration: environment variable '{0}' is not set")]
    Configuration(String),

    /// The archive could not be downloaded (transport failure or non-success status).
    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// The archive is unreadable or one of its members is corrupt.
    #[error("Failed to extract archive: {0}")]
    Extraction(String),

    /// An expected raw, processed or merged file is missing on disk.
    #[error("Expected file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Input data or an estimator does not meet an operation's requirements.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Shorthand for a [`PipelineError::Validation`] with a formatted message.
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_includes_path() {
        let err = PipelineError::NotFound(PathBuf::from("/data/raw/bureau.csv"));
        assert_eq!(
            err.to_string(),
            "Expected file not found: /data/raw/bureau.csv"
        );
    }

    #[test]
    fn test_configuration_display_names_variable() {
        let err = PipelineError::Configuration("ZIP_FILE_URL".to_string());
        assert!(err.to_string().contains("ZIP_FILE_URL"));
    }

    #[test]
    fn test_download_display() {
        let err = PipelineError::Download {
            url: "http://example.test/data.zip".to_string(),
            reason: "HTTP status 404 Not Found".to_string(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("example.test"));
    }
}
