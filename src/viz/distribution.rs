//! Distribution summaries split by a categorical column

use std::collections::BTreeMap;

use polars::prelude::*;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::pipeline::clean::{ensure_numeric, mean_and_std, quantile, sorted_values};

/// Group label used when no categorical column is given.
pub const ALL_ROWS: &str = "all";
/// Label for a missing value or class.
pub const NULL_LABEL: &str = "null";

/// Rows with one value of a column and one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBar {
    pub value: String,
    pub class: String,
    pub count: usize,
    /// Share of the rows holding `value`, 0 to 100.
    pub percentage: f64,
}

/// Bar chart data for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBars {
    pub column: String,
    pub categorical: Option<String>,
    pub bars: Vec<CategoryBar>,
}

/// Five-number summary plus mean and standard deviation for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStatistics {
    pub column: String,
    pub class: String,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
}

fn is_categorical_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Boolean | DataType::String | DataType::Categorical(..) | DataType::Enum(..)
    )
}

fn resolve_columns(
    df: &DataFrame,
    columns: Option<&[&str]>,
    categorical: Option<&str>,
    default_filter: impl Fn(&DataType) -> bool,
) -> Result<Vec<String>> {
    if let Some(cat) = categorical {
        if df.column(cat).is_err() {
            return Err(PipelineError::validation(format!(
                "Categorical column '{}' not found",
                cat
            )));
        }
    }

    match columns {
        Some(names) => names
            .iter()
            .map(|name| {
                df.column(name)
                    .map(|_| name.to_string())
                    .map_err(|_| PipelineError::validation(format!("Column '{}' not found", name)))
            })
            .collect(),
        None => Ok(df
            .get_columns()
            .iter()
            .filter(|c| default_filter(c.dtype()) && Some(c.name().as_str()) != categorical)
            .map(|c| c.name().to_string())
            .collect()),
    }
}

/// Text labels of a column, nulls as [`NULL_LABEL`].
fn labels(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let as_text = df.column(name)?.cast(&DataType::String)?;
    Ok(as_text
        .str()?
        .iter()
        .map(|v| v.unwrap_or(NULL_LABEL).to_string())
        .collect())
}

fn class_labels(df: &DataFrame, categorical: Option<&str>) -> Result<Vec<String>> {
    match categorical {
        Some(cat) => labels(df, cat),
        None => Ok(vec![ALL_ROWS.to_string(); df.height()]),
    }
}

/// Count rows per (value, class) for each column.
///
/// Defaults to every boolean, string and categorical column. Bars are sorted
/// by count, then percentage, descending.
pub fn category_bars(
    df: &DataFrame,
    columns: Option<&[&str]>,
    categorical: Option<&str>,
) -> Result<Vec<CategoryBars>> {
    let columns = resolve_columns(df, columns, categorical, is_categorical_dtype)?;
    let classes = class_labels(df, categorical)?;

    let mut charts = Vec::with_capacity(columns.len());
    for name in columns {
        let values = labels(df, &name)?;

        let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        let mut value_totals: BTreeMap<&str, usize> = BTreeMap::new();
        for (value, class) in values.iter().zip(&classes) {
            *counts.entry((value.as_str(), class.as_str())).or_default() += 1;
            *value_totals.entry(value.as_str()).or_default() += 1;
        }

        let mut bars: Vec<CategoryBar> = counts
            .into_iter()
            .map(|((value, class), count)| CategoryBar {
                value: value.to_string(),
                class: class.to_string(),
                count,
                percentage: 100.0 * count as f64 / value_totals[value] as f64,
            })
            .collect();
        bars.sort_by(|a, b| {
            b.count.cmp(&a.count).then(
                b.percentage
                    .partial_cmp(&a.percentage)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });

        charts.push(CategoryBars {
            column: name,
            categorical: categorical.map(str::to_string),
            bars,
        });
    }

    Ok(charts)
}

/// Box plot statistics per (column, class).
///
/// Defaults to every numeric column. Nulls are ignored; a class with no
/// values for a column is skipped.
pub fn box_statistics(
    df: &DataFrame,
    columns: Option<&[&str]>,
    categorical: Option<&str>,
) -> Result<Vec<BoxStatistics>> {
    let columns = resolve_columns(df, columns, categorical, DataType::is_primitive_numeric)?;
    let classes = class_labels(df, categorical)?;

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (row, class) in classes.iter().enumerate() {
        groups.entry(class.as_str()).or_default().push(row);
    }

    let mut stats = Vec::new();
    for name in columns {
        let column = df.column(&name)?;
        ensure_numeric(column)?;

        for (class, rows) in &groups {
            let idx = IdxCa::from_vec("idx".into(), rows.iter().map(|&r| r as IdxSize).collect());
            let subset = column.take(&idx)?;
            let sorted = sorted_values(&subset)?;
            let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
                continue;
            };
            let (mean, std) = mean_and_std(sorted.iter().copied());

            stats.push(BoxStatistics {
                column: name.clone(),
                class: class.to_string(),
                count: sorted.len(),
                min: *first,
                q1: quantile(&sorted, 0.25).unwrap_or(*first),
                median: quantile(&sorted, 0.5).unwrap_or(*first),
                q3: quantile(&sorted, 0.75).unwrap_or(*last),
                max: *last,
                mean,
                std,
            });
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df! {
            "TARGET" => [0i32, 0, 1, 1, 0],
            "FLAG" => [true, true, true, false, false],
            "AMOUNT" => [1.0f64, 2.0, 3.0, 4.0, 5.0],
        }
        .unwrap()
    }

    #[test]
    fn test_category_bars_counts_and_percentages() {
        let charts = category_bars(&sample(), None, Some("TARGET")).unwrap();

        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].column, "FLAG");
        let top = &charts[0].bars[0];
        assert_eq!((top.value.as_str(), top.class.as_str(), top.count), ("true", "0", 2));
        assert!((top.percentage - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(charts[0].bars.iter().map(|b| b.count).sum::<usize>(), 5);
    }

    #[test]
    fn test_box_statistics_per_class() {
        let stats = box_statistics(&sample(), None, Some("TARGET")).unwrap();

        assert_eq!(stats.len(), 2);
        let zero = stats.iter().find(|s| s.class == "0").unwrap();
        assert_eq!(zero.count, 3);
        assert_eq!((zero.min, zero.median, zero.max), (1.0, 2.0, 5.0));
        assert!((zero.mean - 8.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_box_statistics_without_categorical() {
        let stats = box_statistics(&sample(), Some(&["AMOUNT"]), None).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].class, ALL_ROWS);
        assert_eq!(stats[0].q1, 2.0);
        assert_eq!(stats[0].q3, 4.0);
    }

    #[test]
    fn test_unknown_column_rejected() {
        assert!(category_bars(&sample(), Some(&["NOPE"]), None).is_err());
        assert!(box_statistics(&sample(), None, Some("NOPE")).is_err());
    }
}
