//! Feature cleaning: range constraints, IQR outliers and standard scaling
//!
//! Two outlier policies live side by side. [`drop_impossible_values`] removes
//! whole rows; [`drop_outliers`] nulls individual values and keeps every row.
//! Callers pick whichever suits the column.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Multiplier applied to the inter-quartile range to derive outlier bounds.
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Inclusive bounds for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `min <= name <= max`; null when the value is null.
    pub fn mask(&self, name: &str) -> Expr {
        col(name)
            .gt_eq(lit(self.min))
            .and(col(name).lt_eq(lit(self.max)))
    }
}

/// Column name → allowed range.
pub type ConstraintMap = BTreeMap<String, Bounds>;

/// Read a constraint map from JSON, e.g. `{"age": {"min": 18, "max": 60}}`.
pub fn load_constraints(path: &Path) -> Result<ConstraintMap> {
    if !path.exists() {
        return Err(PipelineError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let constraints: ConstraintMap = serde_json::from_str(&content)?;

    for (column, bounds) in &constraints {
        if bounds.min > bounds.max {
            return Err(PipelineError::validation(format!(
                "Constraint for '{}' has min {} greater than max {}",
                column, bounds.min, bounds.max
            )));
        }
    }
    Ok(constraints)
}

/// Drop rows whose value in a constrained column falls outside its bounds.
///
/// Only columns present in both the table and `constraints` are filtered.
/// Null values never satisfy a bound, so rows with a null in a constrained
/// column are dropped as well.
pub fn drop_impossible_values(df: &DataFrame, constraints: &ConstraintMap) -> Result<DataFrame> {
    let mut predicate: Option<Expr> = None;

    for column in df.get_columns() {
        let name = column.name().as_str();
        let Some(bounds) = constraints.get(name) else {
            continue;
        };
        ensure_numeric(column)?;

        let mask = bounds.mask(name);
        predicate = Some(match predicate {
            Some(acc) => acc.and(mask),
            None => mask,
        });
    }

    let Some(predicate) = predicate else {
        return Ok(df.clone());
    };

    let filtered = df.clone().lazy().filter(predicate).collect()?;
    tracing::debug!(
        before = df.height(),
        after = filtered.height(),
        "Dropped out-of-range rows"
    );
    Ok(filtered)
}

/// Null every value of `columns` outside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`.
///
/// Row count and column types are preserved; the input is not modified.
/// A column listed more than once is processed once.
pub fn drop_outliers(df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
    let mut exprs = Vec::with_capacity(columns.len());
    let mut seen = BTreeSet::new();

    for &name in columns {
        if !seen.insert(name) {
            continue;
        }
        let column = df
            .column(name)
            .map_err(|_| PipelineError::validation(format!("Column '{}' not found", name)))?;
        ensure_numeric(column)?;

        let values = sorted_values(column)?;
        let Some(bounds) = iqr_bounds(&values) else {
            tracing::warn!(column = name, "No values to compute quartiles, leaving column as is");
            continue;
        };

        exprs.push(
            when(bounds.mask(name).not())
                .then(lit(NULL).cast(column.dtype().clone()))
                .otherwise(col(name))
                .alias(name),
        );
    }

    if exprs.is_empty() {
        return Ok(df.clone());
    }

    Ok(df.clone().lazy().with_columns(exprs).collect()?)
}

/// Outlier bounds from sorted, non-null values.
pub fn iqr_bounds(sorted: &[f64]) -> Option<Bounds> {
    let q1 = quantile(sorted, 0.25)?;
    let q3 = quantile(sorted, 0.75)?;
    let iqr = q3 - q1;
    Some(Bounds::new(q1 - IQR_MULTIPLIER * iqr, q3 + IQR_MULTIPLIER * iqr))
}

/// Quantile of sorted values with linear interpolation between order statistics.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Standardize every column to zero mean and unit variance.
///
/// Statistics are fit on `df` alone. Fails without producing output when a
/// column is not numeric. Nulls stay null; constant columns are centred only.
pub fn scale_variables(df: &DataFrame) -> Result<DataFrame> {
    let non_numeric: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| !c.dtype().is_primitive_numeric())
        .map(|c| c.name().to_string())
        .collect();
    if !non_numeric.is_empty() {
        return Err(PipelineError::validation(format!(
            "Cannot scale non-numeric columns: {:?}",
            non_numeric
        )));
    }

    let mut scaled: Vec<Column> = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let float_col = column.cast(&DataType::Float64)?;
        let ca = float_col.f64()?;

        let (mean, std) = mean_and_std(ca.iter().flatten());
        let scale = if std > 0.0 { std } else { 1.0 };

        let values: Vec<Option<f64>> = ca.iter().map(|v| v.map(|x| (x - mean) / scale)).collect();
        scaled.push(Column::new(column.name().clone(), values));
    }

    Ok(DataFrame::new(scaled)?)
}

/// Population mean and standard deviation.
pub(crate) fn mean_and_std<I>(values: I) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
{
    // Welford's online update
    let mut n = 0.0;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for x in values {
        if x.is_nan() {
            continue;
        }
        n += 1.0;
        let delta = x - mean;
        mean += delta / n;
        m2 += delta * (x - mean);
    }
    if n == 0.0 {
        return (0.0, 0.0);
    }
    (mean, (m2 / n).sqrt())
}

pub(crate) fn ensure_numeric(column: &Column) -> Result<()> {
    if column.dtype().is_primitive_numeric() {
        Ok(())
    } else {
        Err(PipelineError::validation(format!(
            "Column '{}' must be numeric, found {}",
            column.name(),
            column.dtype()
        )))
    }
}

/// Non-null, non-NaN values of a numeric column in ascending order.
pub(crate) fn sorted_values(column: &Column) -> Result<Vec<f64>> {
    let float_col = column.cast(&DataType::Float64)?;
    let mut values: Vec<f64> = float_col
        .f64()?
        .iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Ok(values)
}
