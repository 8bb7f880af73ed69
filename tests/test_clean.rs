//! Tests for the feature cleaning operations

use creditpipe::pipeline::{
    drop_impossible_values, drop_outliers, impute_missing_values, load_constraints,
    scale_variables, Bounds, ConstraintMap,
};
use creditpipe::PipelineError;
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

fn constraints(entries: &[(&str, f64, f64)]) -> ConstraintMap {
    entries
        .iter()
        .map(|(name, min, max)| (name.to_string(), Bounds::new(*min, *max)))
        .collect()
}

#[test]
fn test_range_filter_cases() {
    let df = df! {
        "DAYS_BIRTH" => [-10000i64, 1, -40000, -20000],
        "CNT" => [0i64, 1, 2, 3],
    }
    .unwrap();

    let out = drop_impossible_values(&df, &constraints(&[("DAYS_BIRTH", -30000.0, 0.0)])).unwrap();

    let kept: Vec<i64> = out.column("DAYS_BIRTH").unwrap().i64().unwrap().into_no_null_iter().collect();
    assert_eq!(kept, vec![-10000, -20000]);
    assert_eq!(out.width(), 2);
}

#[test]
fn test_bounds_are_inclusive() {
    let df = df! { "X" => [0.0f64, 10.0, 10.5, -0.5] }.unwrap();

    let out = drop_impossible_values(&df, &constraints(&[("X", 0.0, 10.0)])).unwrap();

    assert_eq!(out.height(), 2);
}

#[test]
fn test_unconstrained_columns_never_filter() {
    let df = df! {
        "A" => [Some(1.0f64), None, Some(3.0)],
        "B" => [5i64, 6, 7],
    }
    .unwrap();

    let out = drop_impossible_values(&df, &constraints(&[("B", 0.0, 100.0), ("MISSING", 0.0, 1.0)]))
        .unwrap();

    assert_eq!(out.height(), 3, "nulls in A are irrelevant, MISSING is ignored");
}

#[test]
fn test_null_in_constrained_column_is_dropped() {
    let df = df! { "A" => [Some(1.0f64), None, Some(3.0)] }.unwrap();

    let out = drop_impossible_values(&df, &constraints(&[("A", 0.0, 5.0)])).unwrap();

    assert_eq!(out.height(), 2);
}

#[test]
fn test_constraints_from_json() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("constraints.json");
    std::fs::write(&path, r#"{"DAYS_BIRTH": {"min": -30000, "max": 0}}"#).unwrap();

    let map = load_constraints(&path).unwrap();

    assert_eq!(map["DAYS_BIRTH"], Bounds::new(-30000.0, 0.0));
}

#[test]
fn test_outliers_become_null_row_count_kept() {
    let df = df! {
        "AMT" => [1.0f64, 2.0, 3.0, 4.0, 100.0],
        "OTHER" => [1i64, 2, 3, 4, 5],
    }
    .unwrap();

    let out = drop_outliers(&df, &["AMT"]).unwrap();

    assert_eq!(out.height(), 5);
    let amt: Vec<Option<f64>> = out.column("AMT").unwrap().f64().unwrap().iter().collect();
    assert_eq!(amt, vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), None]);
    assert!(out.column("OTHER").unwrap().equals(df.column("OTHER").unwrap()));
    assert_eq!(df.column("AMT").unwrap().null_count(), 0, "input must be untouched");
}

#[test]
fn test_outliers_keep_integer_dtype() {
    let df = df! { "N" => [10i64, 11, 12, 13, -500] }.unwrap();

    let out = drop_outliers(&df, &["N"]).unwrap();

    assert_eq!(out.column("N").unwrap().dtype(), &DataType::Int64);
    assert_eq!(out.column("N").unwrap().null_count(), 1);
}

#[test]
fn test_outliers_unknown_column() {
    let df = df! { "A" => [1.0f64] }.unwrap();
    assert!(matches!(drop_outliers(&df, &["B"]), Err(PipelineError::Validation(_))));
}

#[test]
fn test_scaling_rejects_non_numeric() {
    let df = df! {
        "A" => [1.0f64, 2.0],
        "NAME" => ["x", "y"],
    }
    .unwrap();

    match scale_variables(&df) {
        Err(PipelineError::Validation(msg)) => assert!(msg.contains("NAME")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_scaling_standardizes() {
    let df = df! {
        "A" => [1.0f64, 2.0, 3.0],
        "C" => [7i64, 7, 7],
    }
    .unwrap();

    let out = scale_variables(&df).unwrap();

    let a: Vec<f64> = out.column("A").unwrap().f64().unwrap().into_no_null_iter().collect();
    let expected = 1.0 / (2.0f64 / 3.0).sqrt();
    assert!((a[0] + expected).abs() < 1e-12);
    assert!(a[1].abs() < 1e-12);
    assert!((a[2] - expected).abs() < 1e-12);
    let c: Vec<f64> = out.column("C").unwrap().f64().unwrap().into_no_null_iter().collect();
    assert_eq!(c, vec![0.0, 0.0, 0.0]);
}

#[test]
fn test_clean_then_impute_leaves_no_nulls() {
    let df = df! {
        "A" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        "B" => [2.1f64, 3.9, 6.2, 8.1, 9.8, 12.2, 13.9, 16.1, 18.0, 500.0],
    }
    .unwrap();

    let nulled = drop_outliers(&df, &["B"]).unwrap();
    assert_eq!(nulled.column("B").unwrap().null_count(), 1);

    let imputed = impute_missing_values(&nulled).unwrap();

    assert_eq!(imputed.shape(), df.shape());
    assert_eq!(imputed.column("B").unwrap().null_count(), 0);
    let filled = imputed.column("B").unwrap().f64().unwrap().get(9).unwrap();
    assert!(filled > 15.0 && filled < 25.0, "imputed value {} should follow the trend", filled);
}
