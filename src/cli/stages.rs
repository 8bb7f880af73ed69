//! Fetch, prepare and merge commands

use std::time::Instant;

use anyhow::{Context, Result};

use crate::config::PipelineConfig;
use crate::pipeline::{
    fetch_dataset, merge_dataset, process_raw_files, FetchOutcome, HttpArchiveSource,
    Identity, MergeStrategy, StageOutcome,
};
use crate::report::PipelineSummary;
use crate::utils::{
    create_spinner, finish_with_success, print_completion, print_config, print_count,
    print_info, print_step_header,
};

fn load_config() -> Result<PipelineConfig> {
    PipelineConfig::from_env().context("Failed to load pipeline configuration")
}

fn strategy(checkpointed: bool) -> MergeStrategy {
    if checkpointed {
        MergeStrategy::Checkpointed
    } else {
        MergeStrategy::InMemory
    }
}

fn fetch_step(config: &PipelineConfig, summary: &mut PipelineSummary) -> Result<()> {
    let start = Instant::now();
    let source = HttpArchiveSource::new().context("Failed to create HTTP client")?;

    let spinner = create_spinner("Checking raw files...");
    let outcome = fetch_dataset(config, &source)
        .with_context(|| format!("Failed to fetch {}", config.zip_file_url))?;
    match outcome {
        FetchOutcome::Cached => finish_with_success(&spinner, "Raw files already present"),
        FetchOutcome::Downloaded { members } => {
            finish_with_success(&spinner, &format!("Extracted {} files", members))
        }
    }

    summary.add_fetch(&outcome, start.elapsed());
    Ok(())
}

fn prepare_step(config: &PipelineConfig, summary: &mut PipelineSummary) -> Result<()> {
    let start = Instant::now();
    let spinner = create_spinner("Processing raw tables...");
    let outcomes =
        process_raw_files(config, &Identity).context("Failed to process raw tables")?;
    finish_with_success(&spinner, "Raw tables processed");

    let written = outcomes.iter().filter(|(_, o)| !o.is_cached()).count();
    print_count("tables written", written, Some(&format!("({} cached)", outcomes.len() - written)));

    summary.add_prepare(&outcomes, start.elapsed());
    Ok(())
}

fn merge_step(
    config: &PipelineConfig,
    checkpointed: bool,
    summary: &mut PipelineSummary,
) -> Result<()> {
    let start = Instant::now();
    let spinner = create_spinner("Merging tables...");
    let outcome = merge_dataset(config, strategy(checkpointed)).context("Failed to merge tables")?;
    match outcome {
        StageOutcome::Cached => finish_with_success(&spinner, "Merged table already present"),
        StageOutcome::Written { rows, cols } => finish_with_success(
            &spinner,
            &format!("Merged table written ({} rows x {} columns)", rows, cols),
        ),
    }
    print_info(&format!("Merged table: {}", config.merged_path().display()));

    summary.add_merge(&outcome, start.elapsed());
    Ok(())
}

pub fn run_fetch() -> Result<()> {
    let config = load_config()?;
    let mut summary = PipelineSummary::new();
    fetch_step(&config, &mut summary)?;
    summary.display();
    Ok(())
}

pub fn run_prepare() -> Result<()> {
    let config = load_config()?;
    let mut summary = PipelineSummary::new();
    prepare_step(&config, &mut summary)?;
    summary.display();
    Ok(())
}

pub fn run_merge(checkpointed: bool) -> Result<()> {
    let config = load_config()?;
    let mut summary = PipelineSummary::new();
    merge_step(&config, checkpointed, &mut summary)?;
    summary.display();
    Ok(())
}

/// Fetch, prepare and merge in order, stopping at the first failure.
pub fn run_all(checkpointed: bool) -> Result<()> {
    let config = load_config()?;
    print_config(
        &config.zip_file_url,
        &config.raw_root,
        &config.processed_root,
        config.relations.len(),
    );

    let mut summary = PipelineSummary::new();

    print_step_header(1, "Fetch Dataset");
    fetch_step(&config, &mut summary)?;

    print_step_header(2, "Prepare Raw Tables");
    prepare_step(&config, &mut summary)?;

    print_step_header(3, "Merge Tables");
    merge_step(&config, checkpointed, &mut summary)?;

    summary.display();
    print_completion("Pipeline complete!");
    Ok(())
}
