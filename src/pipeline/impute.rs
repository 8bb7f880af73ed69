//! Round-robin iterative imputation
//!
//! Every column with gaps is modelled as a ridge regression on the columns it
//! correlates with most, and its gaps are refilled from the predictions until
//! the fills stop moving.

use faer::Mat;
use polars::prelude::*;

use crate::error::Result;
use crate::model::data::select_rows;
use crate::model::estimator::Estimator;
use crate::model::linear::RidgeRegression;
use crate::pipeline::clean::{ensure_numeric, mean_and_std};

/// Iterative imputer settings.
#[derive(Debug, Clone, Copy)]
pub struct IterativeImputer {
    /// Upper bound on full imputation rounds.
    pub max_iter: usize,
    /// Stop once the largest change is below `tol * max|X|`.
    pub tol: f64,
    /// Predictors per column, picked by absolute correlation.
    pub n_nearest_features: usize,
    /// Ridge penalty of the per-column regressions.
    pub alpha: f64,
}

impl Default for IterativeImputer {
    fn default() -> Self {
        Self {
            max_iter: 10,
            tol: 1e-3,
            n_nearest_features: 20,
            alpha: 1.0,
        }
    }
}

impl IterativeImputer {
    /// Fill every null (and NaN) in a numeric table.
    ///
    /// Output keeps shape and column order; every column becomes Float64.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        for column in df.get_columns() {
            ensure_numeric(column)?;
        }

        let n_rows = df.height();
        let names: Vec<PlSmallStr> = df.get_columns().iter().map(|c| c.name().clone()).collect();

        let mut observed: Vec<Vec<Option<f64>>> = Vec::with_capacity(names.len());
        for column in df.get_columns() {
            let float_col = column.cast(&DataType::Float64)?;
            observed.push(
                float_col
                    .f64()?
                    .iter()
                    .map(|v| v.filter(|x| !x.is_nan()))
                    .collect(),
            );
        }

        let mut x = Mat::<f64>::zeros(n_rows, names.len());
        let mut missing_rows: Vec<Vec<usize>> = Vec::with_capacity(names.len());
        let mut max_abs = 0.0f64;

        for (j, values) in observed.iter().enumerate() {
            let (mean, _) = mean_and_std(values.iter().flatten().copied());
            let gaps: Vec<usize> = (0..n_rows).filter(|&i| values[i].is_none()).collect();
            if !gaps.is_empty() && gaps.len() == n_rows {
                tracing::warn!(column = %names[j], "Column has no observed values, filling with 0");
            }
            for (i, v) in values.iter().enumerate() {
                x[(i, j)] = v.unwrap_or(mean);
                if let Some(v) = v {
                    max_abs = max_abs.max(v.abs());
                }
            }
            missing_rows.push(gaps);
        }

        // Fewest gaps first; all-null columns keep their zero fill.
        let mut order: Vec<usize> = (0..names.len())
            .filter(|&j| !missing_rows[j].is_empty() && missing_rows[j].len() < n_rows)
            .collect();
        order.sort_by_key(|&j| missing_rows[j].len());

        if order.is_empty() {
            return to_frame(&x, &names);
        }

        let corr = abs_correlation(&x);
        let threshold = self.tol * max_abs;

        for round in 0..self.max_iter {
            let mut max_change = 0.0f64;

            for &j in &order {
                let predictors = self.nearest_features(&corr, j);
                if predictors.is_empty() {
                    continue;
                }

                let gaps = &missing_rows[j];
                let train: Vec<usize> = (0..n_rows).filter(|i| gaps.binary_search(i).is_err()).collect();

                let features = Mat::<f64>::from_fn(n_rows, predictors.len(), |i, k| x[(i, predictors[k])]);
                let y_train: Vec<f64> = train.iter().map(|&i| x[(i, j)]).collect();

                let mut model = RidgeRegression::new(self.alpha);
                model.fit(&select_rows(&features, &train), &y_train)?;
                let predicted = model.predict(&select_rows(&features, gaps))?;

                for (&i, value) in gaps.iter().zip(predicted) {
                    max_change = max_change.max((value - x[(i, j)]).abs());
                    x[(i, j)] = value;
                }
            }

            tracing::debug!(round, max_change, threshold, "Imputation round finished");
            if max_change < threshold {
                tracing::info!(rounds = round + 1, "Imputation converged");
                return to_frame(&x, &names);
            }
        }

        tracing::warn!(
            max_iter = self.max_iter,
            "Imputation reached the round limit before converging"
        );
        to_frame(&x, &names)
    }

    /// Up to `n_nearest_features` other columns with nonzero correlation to
    /// `target`, strongest first.
    fn nearest_features(&self, corr: &Mat<f64>, target: usize) -> Vec<usize> {
        let mut candidates: Vec<usize> = (0..corr.ncols())
            .filter(|&k| k != target && corr[(target, k)] > 0.0)
            .collect();
        candidates.sort_by(|&a, &b| {
            corr[(target, b)]
                .partial_cmp(&corr[(target, a)])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(self.n_nearest_features);
        candidates
    }
}

/// Impute with the default [`IterativeImputer`].
pub fn impute_missing_values(df: &DataFrame) -> Result<DataFrame> {
    IterativeImputer::default().transform(df)
}

/// Absolute Pearson correlation between the columns of `x`.
///
/// Standardizes then forms `Z^T Z / n`. Constant columns correlate 0 with
/// everything.
fn abs_correlation(x: &Mat<f64>) -> Mat<f64> {
    let n = x.nrows();
    let p = x.ncols();

    let stats: Vec<(f64, f64)> = (0..p)
        .map(|j| mean_and_std((0..n).map(|i| x[(i, j)])))
        .collect();
    let z = Mat::<f64>::from_fn(n, p, |i, j| {
        let (mean, std) = stats[j];
        if std > 0.0 {
            (x[(i, j)] - mean) / std
        } else {
            0.0
        }
    });

    let gram = z.transpose() * &z;
    Mat::<f64>::from_fn(p, p, |a, b| (gram[(a, b)] / n as f64).abs().min(1.0))
}

fn to_frame(x: &Mat<f64>, names: &[PlSmallStr]) -> Result<DataFrame> {
    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<f64> = (0..x.nrows()).map(|i| x[(i, j)]).collect();
            Column::new(name.clone(), values)
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}
