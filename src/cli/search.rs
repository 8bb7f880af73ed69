//! Search command: hyperparameter search on a table with a binary target

use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

use crate::cli::args::EstimatorChoice;
use crate::model::{
    extract_binary_labels, find_best_params_classifier, frame_to_matrix, load_param_grid,
    numeric_feature_columns, select_rows, select_values, stratified_train_test_split,
    Estimator, LinearSvm, LogisticRegression, ParamGrid,
};
use crate::pipeline::{impute_missing_values, load_dataset};
use crate::report::{display_search_outcome, export_search_report, ReportParams, SearchReport};
use crate::utils::{
    create_spinner, finish_with_success, print_completion, print_count, print_info,
    print_step_header,
};

const SPLIT_SEED: u64 = 42;

pub struct SearchOptions<'a> {
    pub target: &'a str,
    pub grid: Option<&'a Path>,
    pub estimator: EstimatorChoice,
    pub test_size: f64,
    pub impute: bool,
    pub output: Option<&'a Path>,
}

fn build_estimator(choice: EstimatorChoice) -> Box<dyn Estimator> {
    match choice {
        EstimatorChoice::Logistic => Box::new(LogisticRegression::new()),
        EstimatorChoice::Svm => Box::new(LinearSvm::new()),
    }
}

pub fn run_search(input: &Path, options: &SearchOptions) -> Result<()> {
    print_step_header(1, "Load Data");
    let spinner = create_spinner("Loading dataset...");
    let df = load_dataset(input).with_context(|| format!("Failed to load {}", input.display()))?;
    finish_with_success(
        &spinner,
        &format!("Loaded {} rows x {} columns", df.height(), df.width()),
    );

    let labels = extract_binary_labels(&df, options.target)
        .with_context(|| format!("Invalid target column '{}'", options.target))?;
    let features = numeric_feature_columns(&df, &[options.target]);
    print_count("numeric features", features.len(), None);
    if features.is_empty() {
        anyhow::bail!("No numeric feature columns besides '{}'", options.target);
    }

    let mut feature_df = df.select(features.iter().map(String::as_str))?;
    if options.impute {
        let spinner = create_spinner("Imputing missing values...");
        feature_df = impute_missing_values(&feature_df).context("Failed to impute features")?;
        finish_with_success(&spinner, "Missing values imputed");
    }
    let x = frame_to_matrix(&feature_df, &features)
        .context("Features must be complete; rerun with --impute")?;

    let (train_idx, test_idx) =
        stratified_train_test_split(&labels, options.test_size, SPLIT_SEED)?;
    let x_train = select_rows(&x, &train_idx);
    let y_train = select_values(&labels, &train_idx);
    let x_test = select_rows(&x, &test_idx);
    let y_test = select_values(&labels, &test_idx);
    print_info(&format!(
        "Train rows: {}, test rows: {}",
        train_idx.len(),
        test_idx.len()
    ));

    let grid: ParamGrid = match options.grid {
        Some(path) => load_param_grid(path)
            .with_context(|| format!("Failed to load parameter grid from {}", path.display()))?,
        None => ParamGrid::new(),
    };

    print_step_header(2, "Halving Random Search");
    let estimator = build_estimator(options.estimator);
    let outcome = find_best_params_classifier(
        &x_train,
        &y_train,
        &x_test,
        &y_test,
        estimator.as_ref(),
        &grid,
    )
    .context("Hyperparameter search failed")?;

    display_search_outcome(&outcome);

    if let Some(output) = options.output {
        let report = SearchReport::new(
            &outcome,
            &ReportParams {
                input_file: &input.display().to_string(),
                target_column: options.target,
                train_rows: train_idx.len(),
                test_rows: test_idx.len(),
                features: &features,
            },
        );
        export_search_report(&report, output)
            .with_context(|| format!("Failed to write report to {}", output.display()))?;
        print_info(&format!("Report: {}", output.display()));
    }

    print_completion("Search complete!");
    Ok(())
}
