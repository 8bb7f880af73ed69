//! Stratified splitting: k-fold cross-validation, subsampling and holdout

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{PipelineError, Result};

/// A single train/test split of row indices.
#[derive(Debug, Clone)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified k-fold splitter: every fold keeps roughly the class
/// proportions of the whole label vector.
#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: u64,
}

impl Default for StratifiedKFold {
    fn default() -> Self {
        Self {
            n_splits: 5,
            shuffle: true,
            random_state: 42,
        }
    }
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, shuffle: bool, random_state: u64) -> Self {
        Self {
            n_splits,
            shuffle,
            random_state,
        }
    }

    /// Split positions `0..labels.len()`.
    pub fn split(&self, labels: &[f64]) -> Result<Vec<CvSplit>> {
        if self.n_splits < 2 {
            return Err(PipelineError::validation("n_splits must be at least 2"));
        }
        if labels.len() < self.n_splits {
            return Err(PipelineError::validation(format!(
                "n_samples ({}) must be >= n_splits ({})",
                labels.len(),
                self.n_splits
            )));
        }

        let mut by_class = group_by_class(labels);
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.random_state);
            for indices in by_class.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal each class round-robin, continuing where the previous class stopped
        // so fold sizes stay balanced.
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        let mut next = 0;
        for indices in by_class.values() {
            for &idx in indices {
                folds[next % self.n_splits].push(idx);
                next += 1;
            }
        }

        Ok((0..self.n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CvSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect())
    }
}

/// Row indices grouped by class label, in ascending index order.
pub fn group_by_class(labels: &[f64]) -> BTreeMap<i64, Vec<usize>> {
    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        by_class.entry(label.round() as i64).or_default().push(idx);
    }
    by_class
}

/// Number of distinct classes.
pub fn n_classes(labels: &[f64]) -> usize {
    group_by_class(labels).len()
}

/// Draw `n` row indices preserving class proportions (largest-remainder
/// allocation, at least one row per class when `n` allows).
pub fn stratified_subsample(labels: &[f64], n: usize, seed: u64) -> Vec<usize> {
    if n >= labels.len() {
        return (0..labels.len()).collect();
    }

    let by_class = group_by_class(labels);
    let total = labels.len() as f64;

    let mut quotas: Vec<(i64, usize, f64)> = by_class
        .iter()
        .map(|(class, idx)| {
            let exact = n as f64 * idx.len() as f64 / total;
            (*class, exact.floor() as usize, exact.fract())
        })
        .collect();

    let mut allocated: usize = quotas.iter().map(|(_, q, _)| q).sum();
    let mut order: Vec<usize> = (0..quotas.len()).collect();
    order.sort_by(|a, b| {
        quotas[*b]
            .2
            .partial_cmp(&quotas[*a].2)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for &i in order.iter().cycle().take(quotas.len() * 2) {
        if allocated >= n {
            break;
        }
        let available = by_class[&quotas[i].0].len();
        if quotas[i].1 < available {
            quotas[i].1 += 1;
            allocated += 1;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut chosen: Vec<usize> = quotas
        .iter()
        .flat_map(|(class, quota, _)| {
            let mut idx = by_class[class].clone();
            idx.shuffle(&mut rng);
            idx.truncate(*quota);
            idx
        })
        .collect();
    chosen.sort_unstable();
    chosen
}

/// Stratified holdout split: returns `(train_indices, test_indices)`.
pub fn stratified_train_test_split(
    labels: &[f64],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0 < test_size && test_size < 1.0) {
        return Err(PipelineError::validation(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    let n_test = ((labels.len() as f64) * test_size).ceil() as usize;
    if n_test == 0 || n_test >= labels.len() {
        return Err(PipelineError::validation(format!(
            "Cannot hold out {} of {} rows",
            n_test,
            labels.len()
        )));
    }

    let test = stratified_subsample(labels, n_test, seed);
    let mut is_test = vec![false; labels.len()];
    for &i in &test {
        is_test[i] = true;
    }
    let train = (0..labels.len()).filter(|i| !is_test[*i]).collect();
    Ok((train, test))
}
