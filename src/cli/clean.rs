//! Clean command: range constraints, outliers, scaling and imputation

use std::path::Path;

use anyhow::{Context, Result};

use crate::pipeline::{
    drop_impossible_values, drop_outliers, impute_missing_values, load_constraints, load_dataset,
    save_dataset, scale_variables,
};
use crate::utils::{
    create_spinner, finish_with_success, print_completion, print_count, print_info,
    print_step_header,
};

pub struct CleanOptions<'a> {
    pub constraints: Option<&'a Path>,
    pub outliers: &'a [String],
    pub scale: bool,
    pub impute: bool,
}

pub fn run_clean(input: &Path, output: &Path, options: &CleanOptions) -> Result<()> {
    let spinner = create_spinner("Loading dataset...");
    let mut df = load_dataset(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    finish_with_success(
        &spinner,
        &format!("Loaded {} rows x {} columns", df.height(), df.width()),
    );

    let mut step = 1;

    if let Some(path) = options.constraints {
        print_step_header(step, "Drop Impossible Values");
        step += 1;
        let constraints = load_constraints(path)
            .with_context(|| format!("Failed to load constraints from {}", path.display()))?;
        let before = df.height();
        df = drop_impossible_values(&df, &constraints).context("Failed to apply constraints")?;
        print_count(
            "rows outside their bounds",
            before - df.height(),
            Some(&format!("({} constraints)", constraints.len())),
        );
    }

    if !options.outliers.is_empty() {
        print_step_header(step, "Null IQR Outliers");
        step += 1;
        let columns: Vec<&str> = options.outliers.iter().map(String::as_str).collect();
        let nulls_before: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
        df = drop_outliers(&df, &columns).context("Failed to drop outliers")?;
        let nulls_after: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
        print_count("outlier values nulled", nulls_after - nulls_before, None);
    }

    if options.impute {
        print_step_header(step, "Impute Missing Values");
        step += 1;
        let spinner = create_spinner("Running iterative imputer...");
        df = impute_missing_values(&df).context("Failed to impute missing values")?;
        finish_with_success(&spinner, "Missing values imputed");
    }

    if options.scale {
        print_step_header(step, "Scale Variables");
        df = scale_variables(&df).context("Failed to scale variables")?;
        print_info("Columns standardized to zero mean and unit variance");
    }

    save_dataset(&mut df, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    print_info(&format!("Output: {}", output.display()));
    print_completion("Cleaning complete!");
    Ok(())
}
