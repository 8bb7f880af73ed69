//! Conversions between polars tables and dense feature matrices

use faer::Mat;
use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Tolerance for floating point comparison when checking binary 0/1 values
const TOLERANCE: f64 = 1e-9;

/// Extract a binary 0/1 target column as labels.
///
/// The column must exist, contain no nulls and hold only 0 and 1 (integer
/// or float).
pub fn extract_binary_labels(df: &DataFrame, target: &str) -> Result<Vec<f64>> {
    let target_col = df
        .column(target)
        .map_err(|_| PipelineError::validation(format!("Target column '{}' not found", target)))?;

    if target_col.len() == 0 {
        return Err(PipelineError::validation(format!(
            "Target column '{}' is empty",
            target
        )));
    }
    if target_col.null_count() > 0 {
        return Err(PipelineError::validation(format!(
            "Target column '{}' contains {} null value(s)",
            target,
            target_col.null_count()
        )));
    }
    if !target_col.dtype().is_primitive_numeric() {
        return Err(PipelineError::validation(format!(
            "Target column '{}' must be numeric 0/1, found {}",
            target,
            target_col.dtype()
        )));
    }

    let float_col = target_col.cast(&DataType::Float64)?;
    let labels: Vec<f64> = float_col.f64()?.iter().flatten().collect();

    if let Some(bad) = labels
        .iter()
        .find(|&&v| (v - 0.0).abs() >= TOLERANCE && (v - 1.0).abs() >= TOLERANCE)
    {
        return Err(PipelineError::validation(format!(
            "Target column '{}' must be binary (0/1), found value {}",
            target, bad
        )));
    }

    Ok(labels.into_iter().map(f64::round).collect())
}

/// Numeric columns of `df`, excluding `exclude`.
pub fn numeric_feature_columns(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| c.dtype().is_primitive_numeric() && !exclude.contains(&c.name().as_str()))
        .map(|c| c.name().to_string())
        .collect()
}

/// Dense `rows x columns` matrix of the named columns.
///
/// Every column must be numeric and free of nulls and NaNs; impute first
/// otherwise.
pub fn frame_to_matrix(df: &DataFrame, columns: &[String]) -> Result<Mat<f64>> {
    let mut data: Vec<Vec<f64>> = Vec::with_capacity(columns.len());

    for name in columns {
        let column = df
            .column(name)
            .map_err(|_| PipelineError::validation(format!("Column '{}' not found", name)))?;
        if !column.dtype().is_primitive_numeric() {
            return Err(PipelineError::validation(format!(
                "Feature '{}' must be numeric, found {}",
                name,
                column.dtype()
            )));
        }
        if column.null_count() > 0 {
            return Err(PipelineError::validation(format!(
                "Feature '{}' has {} missing value(s); impute before modelling",
                name,
                column.null_count()
            )));
        }

        let float_col = column.cast(&DataType::Float64)?;
        let values: Vec<f64> = float_col.f64()?.iter().flatten().collect();
        if values.iter().any(|v| v.is_nan()) {
            return Err(PipelineError::validation(format!(
                "Feature '{}' contains NaN values",
                name
            )));
        }
        data.push(values);
    }

    Ok(Mat::<f64>::from_fn(df.height(), columns.len(), |i, j| data[j][i]))
}

/// Rows `indices` of `x`, in the given order.
pub fn select_rows(x: &Mat<f64>, indices: &[usize]) -> Mat<f64> {
    Mat::<f64>::from_fn(indices.len(), x.ncols(), |i, j| x[(indices[i], j)])
}

/// Entries `indices` of `values`, in the given order.
pub fn select_values(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| values[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_binary_labels() {
        let df = df! { "target" => [0i32, 1, 1, 0] }.unwrap();
        assert_eq!(extract_binary_labels(&df, "target").unwrap(), vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_extract_binary_labels_rejects_other_values() {
        let df = df! { "target" => [0i32, 1, 2] }.unwrap();
        assert!(matches!(
            extract_binary_labels(&df, "target"),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_extract_binary_labels_rejects_nulls() {
        let df = df! { "target" => [Some(0i32), None, Some(1)] }.unwrap();
        assert!(extract_binary_labels(&df, "target").is_err());
    }

    #[test]
    fn test_frame_to_matrix_layout() {
        let df = df! {
            "a" => [1i64, 2, 3],
            "b" => [0.5f64, 1.5, 2.5],
        }
        .unwrap();

        let x = frame_to_matrix(&df, &["a".to_string(), "b".to_string()]).unwrap();

        assert_eq!((x.nrows(), x.ncols()), (3, 2));
        assert_eq!(x[(2, 0)], 3.0);
        assert_eq!(x[(1, 1)], 1.5);
    }

    #[test]
    fn test_frame_to_matrix_rejects_nulls_and_strings() {
        let df = df! {
            "a" => [Some(1.0f64), None],
            "s" => ["x", "y"],
        }
        .unwrap();

        assert!(frame_to_matrix(&df, &["a".to_string()]).is_err());
        assert!(frame_to_matrix(&df, &["s".to_string()]).is_err());
    }

    #[test]
    fn test_numeric_feature_columns_excludes_target() {
        let df = df! {
            "target" => [0i32, 1],
            "x" => [1.0f64, 2.0],
            "s" => ["a", "b"],
        }
        .unwrap();

        assert_eq!(numeric_feature_columns(&df, &["target"]), vec!["x".to_string()]);
    }
}
