//! Command-line argument definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// creditpipe - Fetch, merge and clean the Home Credit tables and search classifier hyperparameters
#[derive(Parser, Debug)]
#[command(name = "creditpipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level for stderr output (error, warn, info, debug, trace).
    /// RUST_LOG takes precedence when set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download and extract the dataset archive into RAW_DATA_PATH
    Fetch,

    /// Copy every raw table into PROCESSED_DATA_PATH
    Prepare,

    /// Join the processed tables into merged.csv
    Merge {
        /// Persist the merged table after every join instead of holding it in memory
        #[arg(long, default_value = "false")]
        checkpointed: bool,
    },

    /// Run fetch, prepare and merge in order
    Run {
        /// Persist the merged table after every join instead of holding it in memory
        #[arg(long, default_value = "false")]
        checkpointed: bool,
    },

    /// Clean a table: range constraints, IQR outliers, scaling and imputation
    Clean {
        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (CSV or Parquet, determined by extension)
        #[arg(short, long)]
        output: PathBuf,

        /// JSON file mapping column names to {"min": .., "max": ..} bounds
        #[arg(long)]
        constraints: Option<PathBuf>,

        /// Columns whose IQR outliers are replaced by nulls (comma-separated)
        #[arg(long, value_delimiter = ',')]
        outliers: Vec<String>,

        /// Standardize every column to zero mean and unit variance
        #[arg(long, default_value = "false")]
        scale: bool,

        /// Fill missing values with the iterative imputer
        #[arg(long, default_value = "false")]
        impute: bool,
    },

    /// Search classifier hyperparameters with successive halving
    Search {
        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Binary 0/1 target column
        #[arg(short, long)]
        target: String,

        /// JSON file mapping parameter names to candidate values
        #[arg(long)]
        grid: Option<PathBuf>,

        /// Classifier to tune
        #[arg(long, value_enum, default_value = "logistic")]
        estimator: EstimatorChoice,

        /// Share of rows held out for the final evaluation
        #[arg(long, default_value = "0.2", value_parser = validate_test_size)]
        test_size: f64,

        /// Impute missing feature values before searching
        #[arg(long, default_value = "false")]
        impute: bool,

        /// Write the search report as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Profile a table: empty values, distributions and PCA
    Profile {
        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Column used to split distributions (for example TARGET)
        #[arg(long)]
        categorical: Option<String>,

        /// Number of principal components to project onto
        #[arg(long)]
        pca: Option<usize>,

        /// Write all plot data as JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimatorChoice {
    /// Logistic regression (probability scores)
    Logistic,
    /// Linear SVM (decision function scores)
    Svm,
}

/// Validator for test_size parameter
fn validate_test_size(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("test_size must be between 0.0 and 1.0 (exclusive), got {}", value))
    }
}
