//! Dataset loading and saving for CSV and Parquet files

use std::path::Path;

use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Load a dataset from a file (CSV or Parquet based on extension).
///
/// CSV column types are inferred from every row, so a late decimal or a key
/// that is empty for a long prefix still gets the right dtype. A missing file
/// is reported as [`PipelineError::NotFound`] before polars is asked to open it.
pub fn load_dataset(path: &Path) -> Result<DataFrame> {
    load_dataset_with_schema_length(path, 0)
}

/// Load a dataset, inferring CSV column types from the first
/// `infer_schema_length` rows (0 means a full scan).
pub fn load_dataset_with_schema_length(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::NotFound(path.to_path_buf()));
    }

    let schema_length = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    let lf = match file_extension(path).as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(schema_length)
            .finish()?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())?,
        other => {
            return Err(PipelineError::validation(format!(
                "Unsupported file format: '{}'. Supported formats: csv, parquet",
                other
            )))
        }
    };

    let df = lf.collect()?;
    tracing::debug!(
        path = %path.display(),
        rows = df.height(),
        cols = df.width(),
        "Loaded dataset"
    );
    Ok(df)
}

/// Save dataset to file (CSV or Parquet based on extension), creating the
/// parent directory when absent.
pub fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }

    match file_extension(path).as_str() {
        "csv" => {
            let mut file =
                std::fs::File::create(path).map_err(|e| PipelineError::io(path, e))?;
            CsvWriter::new(&mut file).finish(df)?;
        }
        "parquet" => {
            let file = std::fs::File::create(path).map_err(|e| PipelineError::io(path, e))?;
            ParquetWriter::new(file).finish(df)?;
        }
        other => {
            return Err(PipelineError::validation(format!(
                "Unsupported output format: '{}'. Supported formats: csv, parquet",
                other
            )))
        }
    }

    tracing::debug!(
        path = %path.display(),
        rows = df.height(),
        cols = df.width(),
        "Saved dataset"
    );
    Ok(())
}

/// Read only the column names of a dataset.
pub fn get_column_names(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(PipelineError::NotFound(path.to_path_buf()));
    }

    let mut lf = match file_extension(path).as_str() {
        "csv" => LazyCsvReader::new(path).finish()?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())?,
        other => {
            return Err(PipelineError::validation(format!(
                "Unsupported file format: '{}'. Supported formats: csv, parquet",
                other
            )))
        }
    };

    let schema = lf.collect_schema()?;
    Ok(schema.iter_names().map(|n| n.to_string()).collect())
}

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
