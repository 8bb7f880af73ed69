//! Principal component projection for 2D scatter views
//!
//! Standardizes the numeric columns, builds their covariance matrix and
//! extracts the leading eigenvectors by power iteration with deflation.

use faer::Mat;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::model::data::{frame_to_matrix, numeric_feature_columns};
use crate::pipeline::clean::mean_and_std;

const MAX_POWER_ITER: usize = 300;
const POWER_TOL: f64 = 1e-10;
const RANDOM_STATE: u64 = 42;

/// Projection of every row onto the leading components.
#[derive(Debug, Clone, Serialize)]
pub struct PcaProjection {
    /// Input columns, in order.
    pub columns: Vec<String>,
    /// One row per sample, `n_components` values each.
    pub embedding: Vec<Vec<f64>>,
    pub explained_variance_ratio: Vec<f64>,
    pub eigenvalues: Vec<f64>,
    /// Unit-length loadings, one per component.
    pub components: Vec<Vec<f64>>,
}

/// Project the numeric columns of `df` onto `n_components` principal axes.
///
/// Nulls are rejected; impute first. `n_components` is capped at the number
/// of columns.
pub fn pca_projection(df: &DataFrame, n_components: usize) -> Result<PcaProjection> {
    let columns = numeric_feature_columns(df, &[]);
    let n = df.height();
    let d = columns.len();
    if n < 2 {
        return Err(PipelineError::validation("PCA requires at least 2 rows"));
    }
    if d == 0 {
        return Err(PipelineError::validation("PCA requires at least 1 numeric column"));
    }
    if n_components == 0 {
        return Err(PipelineError::validation("n_components must be at least 1"));
    }
    let k = n_components.min(d);

    let x = frame_to_matrix(df, &columns)?;
    let stats: Vec<(f64, f64)> = (0..d)
        .map(|j| mean_and_std((0..n).map(|i| x[(i, j)])))
        .collect();
    let z = Mat::<f64>::from_fn(n, d, |i, j| {
        let (mean, std) = stats[j];
        (x[(i, j)] - mean) / std.max(1e-12)
    });

    let scale = 1.0 / (n as f64 - 1.0);
    let cov_raw = z.transpose() * &z;
    let mut work = Mat::<f64>::from_fn(d, d, |a, b| cov_raw[(a, b)] * scale);
    let total_variance: f64 = (0..d).map(|i| work[(i, i)]).sum::<f64>().max(1e-12);

    let mut rng = StdRng::seed_from_u64(RANDOM_STATE);
    let mut eigenvalues = Vec::with_capacity(k);
    let mut components: Vec<Vec<f64>> = Vec::with_capacity(k);

    for _ in 0..k {
        let (value, vector) = dominant_eigenpair(&work, &mut rng);
        for a in 0..d {
            for b in 0..d {
                work[(a, b)] -= value * vector[a] * vector[b];
            }
        }
        eigenvalues.push(value.max(0.0));
        components.push(vector);
    }

    let embedding: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            components
                .iter()
                .map(|v| (0..d).map(|j| z[(i, j)] * v[j]).sum())
                .collect()
        })
        .collect();

    let explained_variance_ratio = eigenvalues.iter().map(|ev| ev / total_variance).collect();

    Ok(PcaProjection {
        columns,
        embedding,
        explained_variance_ratio,
        eigenvalues,
        components,
    })
}

fn dominant_eigenpair(a: &Mat<f64>, rng: &mut StdRng) -> (f64, Vec<f64>) {
    let d = a.nrows();
    let mut v: Vec<f64> = (0..d).map(|_| rng.gen::<f64>() - 0.5).collect();
    normalize(&mut v);

    let mut eigenvalue = 0.0;
    for _ in 0..MAX_POWER_ITER {
        let mut next: Vec<f64> = (0..d)
            .map(|r| (0..d).map(|c| a[(r, c)] * v[c]).sum())
            .collect();
        let norm = normalize(&mut next);
        if norm < 1e-15 {
            return (0.0, v);
        }

        let converged = v
            .iter()
            .zip(&next)
            .map(|(old, new)| (old - new).abs())
            .fold(0.0, f64::max)
            < POWER_TOL;
        v = next;
        eigenvalue = norm;
        if converged {
            break;
        }
    }

    // Rayleigh quotient recovers the sign lost by the norm
    let av: Vec<f64> = (0..d)
        .map(|r| (0..d).map(|c| a[(r, c)] * v[c]).sum())
        .collect();
    let rayleigh: f64 = v.iter().zip(&av).map(|(x, y)| x * y).sum();
    if rayleigh.is_finite() {
        eigenvalue = rayleigh;
    }
    (eigenvalue, v)
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}
