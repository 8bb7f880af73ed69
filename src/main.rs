//! creditpipe: Credit Risk Data Pipeline CLI
//!
//! Runs the fetch, prepare and merge stages, and the cleaning, search and
//! profiling tools built on them.

use anyhow::Result;
use clap::Parser;

use creditpipe::cli::clean::{run_clean, CleanOptions};
use creditpipe::cli::profile::run_profile;
use creditpipe::cli::search::{run_search, SearchOptions};
use creditpipe::cli::stages::{run_all, run_fetch, run_merge, run_prepare};
use creditpipe::cli::{Cli, Commands};
use creditpipe::utils::{init_logging, print_banner};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    print_banner(env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Fetch => run_fetch(),
        Commands::Prepare => run_prepare(),
        Commands::Merge { checkpointed } => run_merge(*checkpointed),
        Commands::Run { checkpointed } => run_all(*checkpointed),
        Commands::Clean {
            input,
            output,
            constraints,
            outliers,
            scale,
            impute,
        } => run_clean(
            input,
            output,
            &CleanOptions {
                constraints: constraints.as_deref(),
                outliers,
                scale: *scale,
                impute: *impute,
            },
        ),
        Commands::Search {
            input,
            target,
            grid,
            estimator,
            test_size,
            impute,
            output,
        } => run_search(
            input,
            &SearchOptions {
                target,
                grid: grid.as_deref(),
                estimator: *estimator,
                test_size: *test_size,
                impute: *impute,
                output: output.as_deref(),
            },
        ),
        Commands::Profile {
            input,
            categorical,
            pca,
            json,
        } => run_profile(input, categorical.as_deref(), *pca, json.as_deref()),
    }
}
