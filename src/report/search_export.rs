//! Hyperparameter search report export

use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::model::{
    ConfusionMatrix, EstimatorKind, ParamSet, PrecisionRecallCurve, RocCurve, SearchOutcome,
    SearchTrace,
};

/// Metadata about the search run
#[derive(Serialize)]
pub struct SearchMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    pub creditpipe_version: String,
    pub input_file: String,
    pub target_column: String,
    pub estimator: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub features: Vec<String>,
}

/// Held-out evaluation of the refitted model
#[derive(Serialize)]
pub struct HoldoutMetrics {
    pub confusion_matrix: ConfusionMatrix,
    pub f1: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub average_precision: f64,
    pub roc_auc_score: f64,
    pub predict_time_ms: f64,
}

/// Everything in a [`SearchOutcome`] except the fitted model itself
#[derive(Serialize)]
pub struct SearchReport {
    pub metadata: SearchMetadata,
    pub best_params: ParamSet,
    /// Mean cross-validated F1 of the selected candidate
    pub best_score: f64,
    pub holdout: HoldoutMetrics,
    pub precision_recall_curve: PrecisionRecallCurve,
    pub roc_curve: RocCurve,
    pub cv_results: SearchTrace,
}

/// Context the outcome does not carry
pub struct ReportParams<'a> {
    pub input_file: &'a str,
    pub target_column: &'a str,
    pub train_rows: usize,
    pub test_rows: usize,
    pub features: &'a [String],
}

impl SearchReport {
    pub fn new(outcome: &SearchOutcome, params: &ReportParams) -> Self {
        let estimator = match outcome.model.kind() {
            EstimatorKind::Classifier => outcome.model.name().to_string(),
            EstimatorKind::Regressor => format!("{} (regressor)", outcome.model.name()),
        };

        Self {
            metadata: SearchMetadata {
                timestamp: Utc::now().to_rfc3339(),
                creditpipe_version: env!("CARGO_PKG_VERSION").to_string(),
                input_file: params.input_file.to_string(),
                target_column: params.target_column.to_string(),
                estimator,
                train_rows: params.train_rows,
                test_rows: params.test_rows,
                features: params.features.to_vec(),
            },
            best_params: outcome.params.clone(),
            best_score: outcome.score,
            holdout: HoldoutMetrics {
                confusion_matrix: outcome.confusion_matrix,
                f1: outcome.f1,
                accuracy: outcome.accuracy,
                precision: outcome.precision,
                recall: outcome.recall,
                average_precision: outcome.average_precision,
                roc_auc_score: outcome.roc_auc_score,
                predict_time_ms: outcome.predict_time.as_secs_f64() * 1000.0,
            },
            precision_recall_curve: outcome.precision_recall_curve.clone(),
            roc_curve: outcome.roc_curve.clone(),
            cv_results: outcome.cv_results.clone(),
        }
    }
}

/// Write the search report as pretty JSON.
pub fn export_search_report(report: &SearchReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    std::fs::write(output_path, json).map_err(|e| PipelineError::io(output_path, e))?;

    tracing::info!(path = %output_path.display(), "Search report written");
    Ok(())
}
