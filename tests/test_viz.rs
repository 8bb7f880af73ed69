//! Tests for the exploratory views

use creditpipe::viz::{
    box_statistics, category_bars, empty_values_profile, export_plot_json, pca_projection,
    PlotData,
};
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

fn applications() -> DataFrame {
    df! {
        "TARGET" => [0i32, 1, 0, 0, 1, 0],
        "CODE_GENDER" => ["F", "M", "F", "M", "F", "F"],
        "AMT_INCOME" => [Some(100.0f64), Some(250.0), None, Some(120.0), Some(300.0), Some(90.0)],
        "EXT_SOURCE" => [None, None, Some(0.4f64), None, Some(0.7), Some(0.2)],
    }
    .unwrap()
}

#[test]
fn test_emptiness_order_and_percentages() {
    let profile = empty_values_profile(&applications()).unwrap();

    let ordered: Vec<(&str, usize)> = profile.iter().map(|e| (e.column.as_str(), e.count)).collect();
    assert_eq!(
        ordered,
        vec![("TARGET", 0), ("CODE_GENDER", 0), ("AMT_INCOME", 1), ("EXT_SOURCE", 3)]
    );
    assert!((profile[3].percent - 50.0).abs() < 1e-12);
}

#[test]
fn test_category_bars_default_columns() {
    let charts = category_bars(&applications(), None, Some("TARGET")).unwrap();

    assert_eq!(charts.len(), 1);
    let gender = &charts[0];
    assert_eq!(gender.column, "CODE_GENDER");
    assert_eq!(gender.bars.iter().map(|b| b.count).sum::<usize>(), 6);

    // Percentages are within each gender value
    for value in ["F", "M"] {
        let total: f64 = gender
            .bars
            .iter()
            .filter(|b| b.value == value)
            .map(|b| b.percentage)
            .sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    let counts: Vec<usize> = gender.bars.iter().map(|b| b.count).collect();
    let mut sorted = counts.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(counts, sorted);
}

#[test]
fn test_box_statistics_skip_nulls() {
    let stats = box_statistics(&applications(), Some(&["AMT_INCOME"]), Some("TARGET")).unwrap();

    let positives = stats.iter().find(|s| s.class == "1").unwrap();
    assert_eq!(positives.count, 2);
    assert_eq!((positives.min, positives.max), (250.0, 300.0));
    let negatives = stats.iter().find(|s| s.class == "0").unwrap();
    assert_eq!(negatives.count, 3);
}

#[test]
fn test_pca_exports_with_profile() {
    let df = common::create_classification_dataframe(40);
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("plots.json");

    let pca = pca_projection(&df, 2).unwrap();
    assert_eq!(pca.embedding.len(), 40);
    let total: f64 = pca.explained_variance_ratio.iter().sum();
    assert!(total > 0.0 && total <= 1.0 + 1e-9);
    assert!(pca.explained_variance_ratio[0] >= pca.explained_variance_ratio[1]);

    let data = PlotData {
        empty_values: empty_values_profile(&df).unwrap(),
        pca: Some(pca),
        ..Default::default()
    };
    export_plot_json(&data, &path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["pca"]["embedding"].as_array().unwrap().len(), 40);
    assert_eq!(json["empty_values"].as_array().unwrap().len(), 4);
}
