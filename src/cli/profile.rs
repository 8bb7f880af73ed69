//! Profile command: empty values, distributions and PCA of a table

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use crate::pipeline::load_dataset;
use crate::utils::{create_spinner, finish_with_success, print_info, print_step_header};
use crate::viz::{
    box_statistics, box_statistics_table, category_bars, category_bars_table,
    empty_values_profile, empty_values_table, export_plot_json, pca_projection, pca_table,
    print_indented, PlotData,
};

pub fn run_profile(
    input: &Path,
    categorical: Option<&str>,
    pca_components: Option<usize>,
    json: Option<&Path>,
) -> Result<()> {
    let spinner = create_spinner("Loading dataset...");
    let df = load_dataset(input).with_context(|| format!("Failed to load {}", input.display()))?;
    finish_with_success(
        &spinner,
        &format!("Loaded {} rows x {} columns", df.height(), df.width()),
    );

    let mut data = PlotData::default();

    print_step_header(1, "Empty Values");
    data.empty_values = empty_values_profile(&df).context("Failed to profile empty values")?;
    print_indented(&empty_values_table(&data.empty_values));

    print_step_header(2, "Categories");
    data.category_bars =
        category_bars(&df, None, categorical).context("Failed to count categories")?;
    if data.category_bars.is_empty() {
        print_info("No boolean or string columns");
    }
    for chart in &data.category_bars {
        println!();
        println!("    {}", style(&chart.column).cyan().bold());
        print_indented(&category_bars_table(chart));
    }

    print_step_header(3, "Numeric Distributions");
    data.box_statistics =
        box_statistics(&df, None, categorical).context("Failed to summarize distributions")?;
    print_indented(&box_statistics_table(&data.box_statistics));

    if let Some(n_components) = pca_components {
        print_step_header(4, "Principal Components");
        let projection = pca_projection(&df, n_components).context("Failed to run PCA")?;
        print_indented(&pca_table(&projection));
        data.pca = Some(projection);
    }

    if let Some(path) = json {
        export_plot_json(&data, path)
            .with_context(|| format!("Failed to write plot data to {}", path.display()))?;
        print_info(&format!("Plot data: {}", path.display()));
    }

    Ok(())
}
