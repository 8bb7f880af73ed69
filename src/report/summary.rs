//! Pipeline summary report generation

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::model::SearchOutcome;
use crate::pipeline::{FetchOutcome, StageOutcome};

/// What happened in one stage of a run
#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    Cached,
    Done(String),
}

/// One row of the summary table
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: String,
    pub status: StageStatus,
    pub elapsed: Duration,
}

/// Summary of a pipeline run
#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub stages: Vec<StageRecord>,
}

impl PipelineSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: impl Into<String>, status: StageStatus, elapsed: Duration) {
        self.stages.push(StageRecord {
            stage: stage.into(),
            status,
            elapsed,
        });
    }

    pub fn add_fetch(&mut self, outcome: &FetchOutcome, elapsed: Duration) {
        let status = match outcome {
            FetchOutcome::Cached => StageStatus::Cached,
            FetchOutcome::Downloaded { members } => {
                StageStatus::Done(format!("{} files extracted", members))
            }
        };
        self.record("Fetch", status, elapsed);
    }

    pub fn add_prepare(&mut self, outcomes: &[(String, StageOutcome)], elapsed: Duration) {
        let written = outcomes.iter().filter(|(_, o)| !o.is_cached()).count();
        let status = if written == 0 {
            StageStatus::Cached
        } else {
            StageStatus::Done(format!("{} of {} tables written", written, outcomes.len()))
        };
        self.record("Prepare", status, elapsed);
    }

    pub fn add_merge(&mut self, outcome: &StageOutcome, elapsed: Duration) {
        let status = match outcome {
            StageOutcome::Cached => StageStatus::Cached,
            StageOutcome::Written { rows, cols } => {
                StageStatus::Done(format!("{} rows x {} columns", rows, cols))
            }
        };
        self.record("Merge", status, elapsed);
    }

    pub fn total_elapsed(&self) -> Duration {
        self.stages.iter().map(|s| s.elapsed).sum()
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("PIPELINE SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Stage").add_attribute(Attribute::Bold),
            Cell::new("Result").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
        ]);

        for record in &self.stages {
            let result = match &record.status {
                StageStatus::Cached => Cell::new("cached").fg(Color::Cyan),
                StageStatus::Done(detail) => Cell::new(detail).fg(Color::Green),
            };
            table.add_row(vec![
                Cell::new(&record.stage),
                result,
                Cell::new(format_duration(record.elapsed)),
            ]);
        }

        table.add_row(vec![
            Cell::new("Total").add_attribute(Attribute::Bold),
            Cell::new(""),
            Cell::new(format_duration(self.total_elapsed())).add_attribute(Attribute::Bold),
        ]);

        for line in table.to_string().lines() {
            println!("    {}", line);
        }
    }
}

/// Print the held-out metrics of a search
pub fn display_search_outcome(outcome: &SearchOutcome) {
    println!();
    println!(
        "    {} {}",
        style("📋").cyan(),
        style("SEARCH RESULTS").white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Metric").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);

    let best_params = crate::model::format_params(&outcome.params);
    table.add_row(vec![
        Cell::new("🎯 Best Params"),
        Cell::new(if best_params.is_empty() {
            "(defaults)".to_string()
        } else {
            best_params
        }),
    ]);
    table.add_row(vec![
        Cell::new("📈 CV F1"),
        Cell::new(format!("{:.4}", outcome.score))
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
    ]);

    let metrics = [
        ("Test F1", outcome.f1),
        ("Accuracy", outcome.accuracy),
        ("Precision", outcome.precision),
        ("Recall", outcome.recall),
        ("Average Precision", outcome.average_precision),
        ("ROC AUC", outcome.roc_auc_score),
    ];
    for (name, value) in metrics {
        table.add_row(vec![Cell::new(name), Cell::new(format!("{:.4}", value))]);
    }

    let cm = outcome.confusion_matrix;
    table.add_row(vec![
        Cell::new("Confusion [[tn, fp], [fn, tp]]"),
        Cell::new(format!("[[{}, {}], [{}, {}]]", cm.tn, cm.fp, cm.fn_, cm.tp)),
    ]);
    table.add_row(vec![
        Cell::new("⏱  Predict Time"),
        Cell::new(format_duration(outcome.predict_time)),
    ]);

    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs >= 60.0 {
        format!("{}m {:.1}s", (secs / 60.0).floor(), secs % 60.0)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}ms", secs * 1000.0)
    }
}
