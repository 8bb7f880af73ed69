//! Left-join chain that folds every subordinate table into the base table

use std::path::Path;

use polars::prelude::*;

use crate::config::{PipelineConfig, Relation};
use crate::error::{PipelineError, Result};
use crate::pipeline::loader::{get_column_names, load_dataset, save_dataset};
use crate::pipeline::prepare::StageOutcome;

/// How the running merged table is kept between joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Hold the merged table in memory and persist once at the end.
    #[default]
    InMemory,
    /// Persist after every join and reload before the next one, so at most
    /// two tables are resident at a time.
    Checkpointed,
}

/// Left-join `left` with `right` on `keys`.
///
/// Every key must be a column of both tables. Unmatched rows of `left` keep
/// nulls for the new columns; duplicate keys in `right` fan out rows of
/// `left`. Non-key columns of `right` that clash with `left` get `suffix`.
/// A key of `left` that is entirely null takes the dtype of `right`'s key;
/// any other dtype mismatch is a validation error.
pub fn left_join(mut left: DataFrame, right: DataFrame, keys: &[String], suffix: &str) -> Result<DataFrame> {
    if keys.is_empty() {
        return Err(PipelineError::validation("Join requires at least one key column"));
    }

    for key in keys {
        for (side, df) in [("merged", &left), ("subordinate", &right)] {
            if df.column(key).is_err() {
                return Err(PipelineError::validation(format!(
                    "Join key '{}' not found in {} table",
                    key, side
                )));
            }
        }
    }

    for key in keys {
        let left_key = left.column(key)?;
        let right_dtype = right.column(key)?.dtype().clone();
        if left_key.dtype() == &right_dtype {
            continue;
        }
        if left_key.null_count() == left_key.len() {
            let aligned = left_key.cast(&right_dtype)?;
            left.with_column(aligned)?;
        } else {
            return Err(PipelineError::validation(format!(
                "Join key '{}' is {} in merged table but {} in subordinate table",
                key,
                left_key.dtype(),
                right_dtype
            )));
        }
    }

    let on: Vec<Expr> = keys.iter().map(|k| col(k.as_str())).collect();
    let args = JoinArgs::new(JoinType::Left).with_suffix(Some(suffix.into()));

    let joined = left
        .lazy()
        .join(right.lazy(), on.clone(), on, args)
        .collect()?;

    Ok(joined)
}

/// Fail before loading `path` when its header lacks one of `keys`.
fn ensure_keys_in_header(path: &Path, keys: &[String]) -> Result<()> {
    let names = get_column_names(path)?;
    match keys.iter().find(|key| !names.contains(*key)) {
        Some(key) => Err(PipelineError::validation(format!(
            "Join key '{}' not found in subordinate table {}",
            key,
            path.display()
        ))),
        None => Ok(()),
    }
}

/// Suffix for clashing columns from `relation`'s table.
fn relation_suffix(relation: &Relation) -> String {
    format!("_{}", relation.file_name)
}

/// Build `merged.csv` from the processed base table and the relation chain.
///
/// Skips without loading anything when the merged file already exists.
pub fn merge_dataset(config: &PipelineConfig, strategy: MergeStrategy) -> Result<StageOutcome> {
    let merged_path = config.merged_path();
    if merged_path.exists() {
        tracing::info!(path = %merged_path.display(), "Merged file present, skipping merge");
        return Ok(StageOutcome::Cached);
    }

    let base_path = config.processed_path(&config.base_file);
    if !base_path.exists() {
        return Err(PipelineError::NotFound(base_path));
    }

    tracing::info!(
        base = %config.base_file,
        relations = config.relations.len(),
        ?strategy,
        "Merging dataset"
    );

    let (rows, cols) = match strategy {
        MergeStrategy::InMemory => merge_in_memory(config)?,
        MergeStrategy::Checkpointed => merge_checkpointed(config)?,
    };

    tracing::info!(rows, cols, path = %merged_path.display(), "Merged dataset written");
    Ok(StageOutcome::Written { rows, cols })
}

fn merge_in_memory(config: &PipelineConfig) -> Result<(usize, usize)> {
    let mut merged = load_dataset(&config.processed_path(&config.base_file))?;

    for relation in &config.relations {
        let sub_path = config.processed_path(&relation.file_name);
        if !sub_path.exists() {
            return Err(PipelineError::NotFound(sub_path));
        }
        ensure_keys_in_header(&sub_path, &relation.keys)?;
        let subordinate = load_dataset(&sub_path)?;

        merged = left_join(merged, subordinate, &relation.keys, &relation_suffix(relation))?;
        tracing::debug!(
            file = %relation.file_name,
            rows = merged.height(),
            cols = merged.width(),
            "Joined relation"
        );
    }

    save_dataset(&mut merged, &config.merged_path())?;
    Ok(merged.shape())
}

fn merge_checkpointed(config: &PipelineConfig) -> Result<(usize, usize)> {
    let merged_path = config.merged_path();

    let mut base = load_dataset(&config.processed_path(&config.base_file))?;
    save_dataset(&mut base, &merged_path)?;
    let mut shape = base.shape();
    drop(base);

    for relation in &config.relations {
        let sub_path = config.processed_path(&relation.file_name);
        for path in [&merged_path, &sub_path] {
            if !path.exists() {
                return Err(PipelineError::NotFound(path.to_path_buf()));
            }
        }
        ensure_keys_in_header(&sub_path, &relation.keys)?;

        let current = load_dataset(&merged_path)?;
        let subordinate = load_dataset(&sub_path)?;

        let mut joined = left_join(current, subordinate, &relation.keys, &relation_suffix(relation))?;
        save_dataset(&mut joined, &merged_path)?;
        shape = joined.shape();
        tracing::debug!(
            file = %relation.file_name,
            rows = shape.0,
            cols = shape.1,
            "Joined relation and checkpointed"
        );
    }

    Ok(shape)
}
