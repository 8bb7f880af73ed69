//! Raw-to-processed copy of every manifest table

use polars::prelude::*;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::loader::{load_dataset, save_dataset};

/// A transformation applied to each raw table before it is persisted.
pub trait TableTransform {
    fn apply(&self, name: &str, df: DataFrame) -> Result<DataFrame>;
}

/// Leaves tables untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl TableTransform for Identity {
    fn apply(&self, _name: &str, df: DataFrame) -> Result<DataFrame> {
        Ok(df)
    }
}

impl<F> TableTransform for F
where
    F: Fn(&str, DataFrame) -> Result<DataFrame>,
{
    fn apply(&self, name: &str, df: DataFrame) -> Result<DataFrame> {
        self(name, df)
    }
}

/// Outcome for a single table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The output already existed; nothing was read or written.
    Cached,
    Written { rows: usize, cols: usize },
}

impl StageOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, StageOutcome::Cached)
    }
}

/// Copy one raw table to the processed root through `transform`.
pub fn process_file<T>(config: &PipelineConfig, name: &str, transform: &T) -> Result<StageOutcome>
where
    T: TableTransform + ?Sized,
{
    let processed = config.processed_path(name);
    if processed.exists() {
        tracing::debug!(file = name, "Processed file present, skipping");
        return Ok(StageOutcome::Cached);
    }

    let raw = config.raw_path(name);
    if !raw.exists() {
        return Err(PipelineError::NotFound(raw));
    }

    let df = load_dataset(&raw)?;
    let mut df = transform.apply(name, df)?;
    save_dataset(&mut df, &processed)?;

    let (rows, cols) = df.shape();
    tracing::info!(file = name, rows, cols, "Processed raw table");
    Ok(StageOutcome::Written { rows, cols })
}

/// Run the prepare stage over the whole manifest, in manifest order.
pub fn process_raw_files<T>(config: &PipelineConfig, transform: &T) -> Result<Vec<(String, StageOutcome)>>
where
    T: TableTransform + ?Sized,
{
    config
        .manifest
        .names()
        .map(|name| Ok((name.to_string(), process_file(config, name, transform)?)))
        .collect()
}
