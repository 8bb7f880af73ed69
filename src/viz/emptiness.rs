//! Per-column empty value profile

use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;

/// Empty cells of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmptyValues {
    pub column: String,
    pub count: usize,
    /// Share of rows, 0 to 100.
    pub percent: f64,
}

/// Count nulls (and float NaNs) per column, fewest first.
///
/// Ties keep the table's column order. An empty table yields an empty
/// profile.
pub fn empty_values_profile(df: &DataFrame) -> Result<Vec<EmptyValues>> {
    let n_rows = df.height();
    if n_rows == 0 {
        tracing::warn!("No rows to profile");
        return Ok(Vec::new());
    }

    let mut profile = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let nan_count = if column.dtype().is_float() {
            let float_col = column.cast(&DataType::Float64)?;
            float_col.f64()?.iter().flatten().filter(|v| v.is_nan()).count()
        } else {
            0
        };
        let count = column.null_count() + nan_count;

        profile.push(EmptyValues {
            column: column.name().to_string(),
            count,
            percent: 100.0 * count as f64 / n_rows as f64,
        });
    }

    profile.sort_by_key(|entry| entry.count);
    Ok(profile)
}
