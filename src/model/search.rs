//! Successive-halving randomized hyperparameter search
//!
//! Candidates are sampled from a parameter grid, scored with stratified
//! k-fold F1 on a growing subsample of the training rows, and the best third
//! survives each round. The winner is refitted on all training rows and
//! evaluated once on the held-out set.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use faer::Mat;
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::model::cv::{n_classes, stratified_subsample, CvSplit, StratifiedKFold};
use crate::model::data::{select_rows, select_values};
use crate::model::estimator::{format_params, Estimator, EstimatorKind, ParamGrid, ParamSet};
use crate::model::metrics::{
    accuracy_score, average_precision_score, confusion_matrix, f1_score, precision_recall_curve,
    precision_score, recall_score, roc_auc_score, roc_curve, ConfusionMatrix,
    PrecisionRecallCurve, RocCurve,
};
use crate::utils::create_progress_bar;

/// Settings for [`HalvingRandomSearch`].
#[derive(Debug, Clone, Copy)]
pub struct HalvingConfig {
    /// Survivors per round are `ceil(candidates / factor)`; resources grow by `factor`.
    pub factor: usize,
    pub cv: StratifiedKFold,
    pub random_state: u64,
    /// Samples in the first round; defaults to `2 * n_splits * n_classes`.
    pub min_resources: Option<usize>,
    /// Candidates in the first round; defaults to `max_resources / min_resources`.
    pub n_candidates: Option<usize>,
}

impl Default for HalvingConfig {
    fn default() -> Self {
        Self {
            factor: 3,
            cv: StratifiedKFold::new(5, true, 42),
            random_state: 42,
            min_resources: None,
            n_candidates: None,
        }
    }
}

/// One candidate evaluated in one round.
#[derive(Debug, Clone, Serialize)]
pub struct CvResultEntry {
    pub iter: usize,
    pub n_resources: usize,
    pub params: ParamSet,
    pub split_test_scores: Vec<f64>,
    pub mean_test_score: f64,
    pub std_test_score: f64,
    /// Rank within the round, 1 is best.
    pub rank_test_score: usize,
}

/// Full record of a search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchTrace {
    pub entries: Vec<CvResultEntry>,
    /// Index into `entries` of the selected candidate.
    pub best_index: usize,
    pub n_iterations: usize,
    /// Candidates evaluated per round.
    pub n_candidates: Vec<usize>,
    /// Samples used per round.
    pub n_resources: Vec<usize>,
    pub min_resources: usize,
    pub max_resources: usize,
}

/// The refitted winner of a search.
#[derive(Debug)]
pub struct SearchResult {
    pub best_estimator: Box<dyn Estimator>,
    pub best_params: ParamSet,
    pub best_score: f64,
    pub trace: SearchTrace,
}

/// Successive-halving search over randomly sampled grid candidates.
#[derive(Debug, Clone, Default)]
pub struct HalvingRandomSearch {
    pub config: HalvingConfig,
}

impl HalvingRandomSearch {
    pub fn new(config: HalvingConfig) -> Self {
        Self { config }
    }

    /// Run the search and refit the best candidate on all of `x`.
    pub fn fit(
        &self,
        estimator: &dyn Estimator,
        grid: &ParamGrid,
        x: &Mat<f64>,
        y: &[f64],
    ) -> Result<SearchResult> {
        let config = &self.config;
        if config.factor < 2 {
            return Err(PipelineError::validation("Halving factor must be at least 2"));
        }
        if x.nrows() != y.len() {
            return Err(PipelineError::validation(format!(
                "Feature rows ({}) and labels ({}) differ in length",
                x.nrows(),
                y.len()
            )));
        }

        let max_resources = x.nrows();
        let min_resources = config
            .min_resources
            .unwrap_or(2 * config.cv.n_splits * n_classes(y).max(2));
        if min_resources > max_resources {
            return Err(PipelineError::validation(format!(
                "min_resources ({}) is greater than the number of samples ({})",
                min_resources, max_resources
            )));
        }

        let n_candidates = config
            .n_candidates
            .unwrap_or(max_resources / min_resources)
            .max(1);
        let mut candidates = sample_candidates(grid, n_candidates, config.random_state);

        let n_required = 1 + log_floor(candidates.len(), config.factor);
        let n_possible = 1 + log_floor(max_resources / min_resources, config.factor);
        let n_iterations = n_required.min(n_possible);

        tracing::info!(
            candidates = candidates.len(),
            n_iterations,
            min_resources,
            max_resources,
            "Starting halving search"
        );

        let splits = config.cv.split(y)?;
        let mut entries: Vec<CvResultEntry> = Vec::new();
        let mut trace_candidates = Vec::with_capacity(n_iterations);
        let mut trace_resources = Vec::with_capacity(n_iterations);
        let mut last_round: Vec<usize> = Vec::new();

        for itr in 0..n_iterations {
            let n_resources = (config.factor.pow(itr as u32) * min_resources).min(max_resources);
            let fraction = n_resources as f64 / max_resources as f64;
            let round_splits =
                subsample_splits(&splits, y, fraction, config.random_state + itr as u64);

            tracing::debug!(
                iter = itr,
                n_resources,
                candidates = candidates.len(),
                "Evaluating round"
            );

            let scores = evaluate_round(estimator, &candidates, &round_splits, x, y)?;

            let ranks = rank_descending(&scores.iter().map(|s| s.0).collect::<Vec<_>>());
            let round_start = entries.len();
            for ((params, (mean, std, split_scores)), rank) in
                candidates.iter().zip(scores).zip(ranks)
            {
                entries.push(CvResultEntry {
                    iter: itr,
                    n_resources,
                    params: params.clone(),
                    split_test_scores: split_scores,
                    mean_test_score: mean,
                    std_test_score: std,
                    rank_test_score: rank,
                });
            }
            last_round = (round_start..entries.len()).collect();
            trace_candidates.push(candidates.len());
            trace_resources.push(n_resources);

            let keep = candidates.len().div_ceil(config.factor);
            let mut order: Vec<usize> = (0..candidates.len()).collect();
            order.sort_by_key(|&i| entries[round_start + i].rank_test_score);
            candidates = order
                .into_iter()
                .take(keep)
                .map(|i| candidates[i].clone())
                .collect();
        }

        let best_index = last_round
            .iter()
            .copied()
            .min_by_key(|&i| entries[i].rank_test_score)
            .ok_or_else(|| PipelineError::validation("Search evaluated no candidates"))?;
        let best = &entries[best_index];
        if best.mean_test_score.is_nan() {
            return Err(PipelineError::validation(
                "Every candidate failed to fit during cross-validation",
            ));
        }

        let best_params = best.params.clone();
        let best_score = best.mean_test_score;
        tracing::info!(params = %format_params(&best_params), best_score, "Refitting best candidate");

        let mut best_estimator = estimator.boxed_clone();
        best_estimator.set_params(&best_params)?;
        best_estimator.fit(x, y)?;

        Ok(SearchResult {
            best_estimator,
            best_params,
            best_score,
            trace: SearchTrace {
                entries,
                best_index,
                n_iterations,
                n_candidates: trace_candidates,
                n_resources: trace_resources,
                min_resources,
                max_resources,
            },
        })
    }
}

/// `floor(log_base(n))`, 0 for `n <= 1`.
fn log_floor(n: usize, base: usize) -> usize {
    let mut power = 0;
    let mut value = n;
    while value >= base {
        value /= base;
        power += 1;
    }
    power
}

/// Number of grid combinations, `None` when it overflows `usize`.
fn grid_size(grid: &ParamGrid) -> Option<usize> {
    grid.values()
        .try_fold(1usize, |acc, values| acc.checked_mul(values.len()))
}

/// The combination at `index`, reading the index as a mixed-radix number
/// whose digits are value positions, last parameter least significant.
fn combination_at(grid: &ParamGrid, mut index: usize) -> ParamSet {
    let mut set = ParamSet::new();
    for (name, values) in grid.iter().rev() {
        set.insert(name.clone(), values[index % values.len()].clone());
        index /= values.len();
    }
    set
}

/// `n` distinct grid combinations drawn without replacement.
///
/// Only grids with at most `n` combinations are enumerated; larger grids are
/// sampled by index so the full product is never built.
fn sample_candidates(grid: &ParamGrid, n: usize, seed: u64) -> Vec<ParamSet> {
    let mut rng = StdRng::seed_from_u64(seed);

    match grid_size(grid) {
        Some(size) if size <= n => {
            if size < n {
                tracing::debug!(
                    grid_size = size,
                    requested = n,
                    "Grid has fewer combinations than requested candidates"
                );
            }
            let mut combos: Vec<ParamSet> = (0..size).map(|i| combination_at(grid, i)).collect();
            combos.shuffle(&mut rng);
            combos
        }
        Some(size) => index::sample(&mut rng, size, n)
            .into_iter()
            .map(|i| combination_at(grid, i))
            .collect(),
        None => {
            // Product overflows usize: draw value positions per parameter.
            let mut seen: HashSet<Vec<usize>> = HashSet::with_capacity(n);
            let mut combos = Vec::with_capacity(n);
            while combos.len() < n {
                let positions: Vec<usize> =
                    grid.values().map(|values| rng.gen_range(0..values.len())).collect();
                if seen.insert(positions.clone()) {
                    let set = grid
                        .iter()
                        .zip(&positions)
                        .map(|((name, values), &pos)| (name.clone(), values[pos].clone()))
                        .collect();
                    combos.push(set);
                }
            }
            combos
        }
    }
}

/// Shrink the train and test side of every split to `fraction` of its rows,
/// keeping class proportions.
fn subsample_splits(splits: &[CvSplit], y: &[f64], fraction: f64, seed: u64) -> Vec<CvSplit> {
    if fraction >= 1.0 {
        return splits.to_vec();
    }

    let shrink = |indices: &[usize], seed: u64| -> Vec<usize> {
        let labels = select_values(y, indices);
        let n = ((indices.len() as f64 * fraction).round() as usize).max(1);
        stratified_subsample(&labels, n, seed)
            .into_iter()
            .map(|pos| indices[pos])
            .collect()
    };

    splits
        .iter()
        .map(|split| CvSplit {
            train_indices: shrink(&split.train_indices, seed.wrapping_mul(31) + split.fold_idx as u64),
            test_indices: shrink(&split.test_indices, seed.wrapping_mul(17) + split.fold_idx as u64),
            fold_idx: split.fold_idx,
        })
        .collect()
}

/// `(mean, std, per-split scores)` for every candidate, fits run in parallel.
fn evaluate_round(
    estimator: &dyn Estimator,
    candidates: &[ParamSet],
    splits: &[CvSplit],
    x: &Mat<f64>,
    y: &[f64],
) -> Result<Vec<(f64, f64, Vec<f64>)>> {
    // Reject malformed parameter sets before spending any fits on them.
    for params in candidates {
        estimator.boxed_clone().set_params(params)?;
    }

    let jobs: Vec<(usize, usize)> = (0..candidates.len())
        .flat_map(|c| (0..splits.len()).map(move |s| (c, s)))
        .collect();

    let pb = create_progress_bar(jobs.len() as u64, "   Cross-validating");

    let results: Vec<(usize, usize, f64)> = jobs
        .par_iter()
        .map(|&(c, s)| {
            let score = fit_and_score(estimator, &candidates[c], &splits[s], x, y)
                .unwrap_or_else(|e| {
                    tracing::warn!(params = %format_params(&candidates[c]), error = %e, "Fit failed, scoring as NaN");
                    f64::NAN
                });
            pb.inc(1);
            (c, s, score)
        })
        .collect();
    pb.finish_and_clear();

    let mut per_candidate = vec![vec![f64::NAN; splits.len()]; candidates.len()];
    for (c, s, score) in results {
        per_candidate[c][s] = score;
    }

    Ok(per_candidate
        .into_iter()
        .map(|scores| {
            let n = scores.len() as f64;
            let mean = scores.iter().sum::<f64>() / n;
            let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
            (mean, var.sqrt(), scores)
        })
        .collect())
}

fn fit_and_score(
    estimator: &dyn Estimator,
    params: &ParamSet,
    split: &CvSplit,
    x: &Mat<f64>,
    y: &[f64],
) -> Result<f64> {
    let mut model = estimator.boxed_clone();
    model.set_params(params)?;

    let x_train = select_rows(x, &split.train_indices);
    let y_train = select_values(y, &split.train_indices);
    model.fit(&x_train, &y_train)?;

    let x_test = select_rows(x, &split.test_indices);
    let y_test = select_values(y, &split.test_indices);
    let y_pred = model.predict(&x_test)?;
    Ok(f1_score(&y_test, &y_pred))
}

/// Competition ranks, highest score first; NaN ranks last.
fn rank_descending(scores: &[f64]) -> Vec<usize> {
    let key = |s: f64| if s.is_nan() { f64::NEG_INFINITY } else { s };
    scores
        .iter()
        .map(|&s| 1 + scores.iter().filter(|&&o| key(o) > key(s)).count())
        .collect()
}

/// Everything [`find_best_params_classifier`] reports.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Best estimator, refitted on the full training set.
    pub model: Box<dyn Estimator>,
    pub params: ParamSet,
    /// Mean cross-validated F1 of the best candidate.
    pub score: f64,
    /// Wall time of one `predict` pass over the test set.
    pub predict_time: Duration,
    pub cv_results: SearchTrace,
    pub confusion_matrix: ConfusionMatrix,
    pub f1: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub average_precision: f64,
    pub precision_recall_curve: PrecisionRecallCurve,
    pub roc_auc_score: f64,
    pub roc_curve: RocCurve,
}

/// Search hyperparameters of a classifier and evaluate the winner on a
/// held-out set.
///
/// Uses [`HalvingRandomSearch`] with 5-fold stratified shuffled CV (seed 42)
/// optimizing F1. Fails with a validation error when `estimator` is not a
/// classifier.
pub fn find_best_params_classifier(
    x_train: &Mat<f64>,
    y_train: &[f64],
    x_test: &Mat<f64>,
    y_test: &[f64],
    estimator: &dyn Estimator,
    params: &ParamGrid,
) -> Result<SearchOutcome> {
    find_best_params_classifier_with(
        &HalvingRandomSearch::default(),
        x_train,
        y_train,
        x_test,
        y_test,
        estimator,
        params,
    )
}

/// [`find_best_params_classifier`] with a caller-supplied search.
pub fn find_best_params_classifier_with(
    search: &HalvingRandomSearch,
    x_train: &Mat<f64>,
    y_train: &[f64],
    x_test: &Mat<f64>,
    y_test: &[f64],
    estimator: &dyn Estimator,
    params: &ParamGrid,
) -> Result<SearchOutcome> {
    if estimator.kind() != EstimatorKind::Classifier {
        tracing::error!(estimator = estimator.name(), "Estimator is not a classifier");
        return Err(PipelineError::validation(format!(
            "{} is not a classifier",
            estimator.name()
        )));
    }
    if x_test.nrows() != y_test.len() {
        return Err(PipelineError::validation(format!(
            "Test rows ({}) and labels ({}) differ in length",
            x_test.nrows(),
            y_test.len()
        )));
    }

    let result = search.fit(estimator, params, x_train, y_train)?;
    let model = result.best_estimator;

    let start = Instant::now();
    let y_pred = model.predict(x_test)?;
    let predict_time = start.elapsed();

    let scores = model.predict_scores(x_test)?;
    if scores.values().len() != y_test.len() {
        return Err(PipelineError::validation(format!(
            "{} returned {} scores for {} test rows",
            estimator.name(),
            scores.values().len(),
            y_test.len()
        )));
    }
    tracing::debug!(source = scores.source(), "Derived ranking scores");
    let y_score = scores.into_values();

    Ok(SearchOutcome {
        params: result.best_params,
        score: result.best_score,
        predict_time,
        cv_results: result.trace,
        confusion_matrix: confusion_matrix(y_test, &y_pred),
        f1: f1_score(y_test, &y_pred),
        accuracy: accuracy_score(y_test, &y_pred),
        precision: precision_score(y_test, &y_pred),
        recall: recall_score(y_test, &y_pred),
        average_precision: average_precision_score(y_test, &y_score),
        precision_recall_curve: precision_recall_curve(y_test, &y_score),
        roc_auc_score: roc_auc_score(y_test, &y_score)?,
        roc_curve: roc_curve(y_test, &y_score),
        model,
    })
}
