//! Visualization module - exploratory views as terminal tables and JSON plot data

pub mod distribution;
pub mod emptiness;
pub mod pca;

pub use distribution::*;
pub use emptiness::*;
pub use pca::*;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use serde::Serialize;

use crate::error::{PipelineError, Result};

/// Everything `profile` can export in one JSON document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlotData {
    pub empty_values: Vec<EmptyValues>,
    pub category_bars: Vec<CategoryBars>,
    pub box_statistics: Vec<BoxStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pca: Option<PcaProjection>,
}

/// Write plot data as pretty JSON for an external plotting tool.
pub fn export_plot_json(data: &PlotData, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), data)?;
    tracing::info!(path = %path.display(), "Plot data exported");
    Ok(())
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table(names: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(names));
    table
}

pub fn empty_values_table(profile: &[EmptyValues]) -> Table {
    let mut table = new_table(&["Column", "Empty", "% Empty"]);
    for entry in profile {
        let color = if entry.percent > 50.0 {
            Color::Red
        } else if entry.percent > 0.0 {
            Color::Yellow
        } else {
            Color::Green
        };
        table.add_row(vec![
            Cell::new(&entry.column),
            Cell::new(entry.count),
            Cell::new(format!("{:.1}%", entry.percent)).fg(color),
        ]);
    }
    table
}

pub fn category_bars_table(chart: &CategoryBars) -> Table {
    let class_header = chart.categorical.as_deref().unwrap_or("Class");
    let mut table = new_table(&[&chart.column, class_header, "Count", "Percentage"]);
    for bar in &chart.bars {
        table.add_row(vec![
            Cell::new(&bar.value),
            Cell::new(&bar.class),
            Cell::new(bar.count),
            Cell::new(format!("{:.1}%", bar.percentage)),
        ]);
    }
    table
}

pub fn box_statistics_table(stats: &[BoxStatistics]) -> Table {
    let mut table = new_table(&[
        "Column", "Class", "N", "Min", "Q1", "Median", "Q3", "Max", "Mean", "Std",
    ]);
    for s in stats {
        table.add_row(vec![
            Cell::new(&s.column),
            Cell::new(&s.class),
            Cell::new(s.count),
            Cell::new(format!("{:.4}", s.min)),
            Cell::new(format!("{:.4}", s.q1)),
            Cell::new(format!("{:.4}", s.median)),
            Cell::new(format!("{:.4}", s.q3)),
            Cell::new(format!("{:.4}", s.max)),
            Cell::new(format!("{:.4}", s.mean)),
            Cell::new(format!("{:.4}", s.std)),
        ]);
    }
    table
}

pub fn pca_table(pca: &PcaProjection) -> Table {
    let mut table = new_table(&["Component", "Eigenvalue", "Explained variance"]);
    for (i, (ev, ratio)) in pca
        .eigenvalues
        .iter()
        .zip(&pca.explained_variance_ratio)
        .enumerate()
    {
        table.add_row(vec![
            Cell::new(format!("PC{}", i + 1)),
            Cell::new(format!("{:.4}", ev)),
            Cell::new(format!("{:.1}%", ratio * 100.0)).fg(Color::Cyan),
        ]);
    }
    table
}

/// Print a table indented to line up with the step headers.
pub fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_plot_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots").join("profile.json");
        let data = PlotData {
            empty_values: vec![EmptyValues {
                column: "a".to_string(),
                count: 1,
                percent: 50.0,
            }],
            ..Default::default()
        };

        export_plot_json(&data, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["empty_values"][0]["column"], "a");
        assert!(json.get("pca").is_none());
    }

    #[test]
    fn test_empty_values_table_has_row_per_column() {
        let table = empty_values_table(&[
            EmptyValues {
                column: "a".to_string(),
                count: 0,
                percent: 0.0,
            },
            EmptyValues {
                column: "b".to_string(),
                count: 2,
                percent: 100.0,
            },
        ]);
        assert_eq!(table.row_iter().count(), 2);
    }
}
