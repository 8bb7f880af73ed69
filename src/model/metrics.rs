//! Binary classification metrics
//!
//! Labels are `0.0`/`1.0`; `1.0` is the positive class. Ratios with a zero
//! denominator evaluate to `0.0`.

use serde::Serialize;

use crate::error::{PipelineError, Result};

fn is_positive(label: f64) -> bool {
    label >= 0.5
}

/// 2x2 confusion matrix, rows are true labels, columns predicted labels:
/// `[[tn, fp], [fn, tp]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn as_array(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }
}

pub fn confusion_matrix(y_true: &[f64], y_pred: &[f64]) -> ConfusionMatrix {
    let mut cm = ConfusionMatrix {
        tn: 0,
        fp: 0,
        fn_: 0,
        tp: 0,
    };
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (is_positive(t), is_positive(p)) {
            (false, false) => cm.tn += 1,
            (false, true) => cm.fp += 1,
            (true, false) => cm.fn_ += 1,
            (true, true) => cm.tp += 1,
        }
    }
    cm
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn accuracy_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let cm = confusion_matrix(y_true, y_pred);
    ratio(cm.tp + cm.tn, cm.total())
}

pub fn precision_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let cm = confusion_matrix(y_true, y_pred);
    ratio(cm.tp, cm.tp + cm.fp)
}

pub fn recall_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let cm = confusion_matrix(y_true, y_pred);
    ratio(cm.tp, cm.tp + cm.fn_)
}

pub fn f1_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let cm = confusion_matrix(y_true, y_pred);
    ratio(2 * cm.tp, 2 * cm.tp + cm.fp + cm.fn_)
}

/// Cumulative false/true positive counts at each distinct score threshold,
/// thresholds in decreasing order.
fn binary_clf_curve(y_true: &[f64], y_score: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| {
        y_score[b]
            .partial_cmp(&y_score[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut fps = Vec::new();
    let mut tps = Vec::new();
    let mut thresholds = Vec::new();
    let mut tp = 0.0;
    let mut fp = 0.0;

    for (pos, &i) in order.iter().enumerate() {
        if is_positive(y_true[i]) {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_group = order
            .get(pos + 1)
            .map_or(true, |&next| y_score[next] != y_score[i]);
        if last_of_group {
            fps.push(fp);
            tps.push(tp);
            thresholds.push(y_score[i]);
        }
    }

    (fps, tps, thresholds)
}

/// Points of the precision-recall curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecisionRecallCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    /// Increasing; one shorter than `precision` and `recall`.
    pub thresholds: Vec<f64>,
}

/// Precision and recall for every distinct threshold, ending at `(1, 0)`.
pub fn precision_recall_curve(y_true: &[f64], y_score: &[f64]) -> PrecisionRecallCurve {
    let (fps, tps, thresholds) = binary_clf_curve(y_true, y_score);
    let total_pos = tps.last().copied().unwrap_or(0.0);

    let mut precision: Vec<f64> = tps
        .iter()
        .zip(&fps)
        .map(|(tp, fp)| if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 })
        .collect();
    let mut recall: Vec<f64> = tps
        .iter()
        .map(|tp| if total_pos > 0.0 { tp / total_pos } else { 1.0 })
        .collect();
    let mut thresholds = thresholds;

    precision.reverse();
    recall.reverse();
    thresholds.reverse();
    precision.push(1.0);
    recall.push(0.0);

    PrecisionRecallCurve {
        precision,
        recall,
        thresholds,
    }
}

/// Area under the precision-recall curve as the weighted mean of precisions,
/// weighted by the recall increase at each threshold.
pub fn average_precision_score(y_true: &[f64], y_score: &[f64]) -> f64 {
    let curve = precision_recall_curve(y_true, y_score);
    -curve
        .recall
        .windows(2)
        .zip(&curve.precision)
        .map(|(r, p)| (r[1] - r[0]) * p)
        .sum::<f64>()
}

/// Points of the ROC curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Decreasing; the first entry is `+inf` (serialised as `null`).
    pub thresholds: Vec<f64>,
}

/// ROC curve with collinear intermediate points dropped.
pub fn roc_curve(y_true: &[f64], y_score: &[f64]) -> RocCurve {
    let (mut fps, mut tps, mut thresholds) = binary_clf_curve(y_true, y_score);

    if fps.len() > 2 {
        let n = fps.len();
        let keep: Vec<usize> = (0..n)
            .filter(|&i| {
                if i == 0 || i == n - 1 {
                    return true;
                }
                let second_diff = |v: &[f64]| v[i + 1] - 2.0 * v[i] + v[i - 1];
                second_diff(&fps) != 0.0 || second_diff(&tps) != 0.0
            })
            .collect();
        fps = keep.iter().map(|&i| fps[i]).collect();
        tps = keep.iter().map(|&i| tps[i]).collect();
        thresholds = keep.iter().map(|&i| thresholds[i]).collect();
    }

    fps.insert(0, 0.0);
    tps.insert(0, 0.0);
    thresholds.insert(0, f64::INFINITY);

    let total_neg = fps.last().copied().unwrap_or(0.0);
    let total_pos = tps.last().copied().unwrap_or(0.0);

    RocCurve {
        fpr: fps.iter().map(|v| v / total_neg).collect(),
        tpr: tps.iter().map(|v| v / total_pos).collect(),
        thresholds,
    }
}

/// Area under the ROC curve (trapezoid rule).
///
/// Undefined when `y_true` holds a single class.
pub fn roc_auc_score(y_true: &[f64], y_score: &[f64]) -> Result<f64> {
    let positives = y_true.iter().filter(|&&t| is_positive(t)).count();
    if positives == 0 || positives == y_true.len() {
        return Err(PipelineError::validation(
            "Only one class present in y_true; ROC AUC is undefined",
        ));
    }

    let curve = roc_curve(y_true, y_score);
    Ok(curve
        .fpr
        .windows(2)
        .zip(curve.tpr.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    const Y_TRUE: [f64; 4] = [0.0, 0.0, 1.0, 1.0];
    const Y_SCORE: [f64; 4] = [0.1, 0.4, 0.35, 0.8];

    #[test]
    fn test_confusion_matrix_layout() {
        let cm = confusion_matrix(&[0.0, 0.0, 1.0, 1.0, 1.0], &[0.0, 1.0, 0.0, 1.0, 1.0]);
        assert_eq!(cm.as_array(), [[1, 1], [1, 2]]);
    }

    #[test]
    fn test_classification_scores() {
        let y_true = [0.0, 0.0, 1.0, 1.0, 1.0];
        let y_pred = [0.0, 1.0, 0.0, 1.0, 1.0];

        assert!((accuracy_score(&y_true, &y_pred) - 0.6).abs() < 1e-12);
        assert!((precision_score(&y_true, &y_pred) - 2.0 / 3.0).abs() < 1e-12);
        assert!((recall_score(&y_true, &y_pred) - 2.0 / 3.0).abs() < 1e-12);
        assert!((f1_score(&y_true, &y_pred) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_is_zero() {
        let y_true = [0.0, 0.0];
        let y_pred = [0.0, 0.0];
        assert_eq!(precision_score(&y_true, &y_pred), 0.0);
        assert_eq!(recall_score(&y_true, &y_pred), 0.0);
        assert_eq!(f1_score(&y_true, &y_pred), 0.0);
    }

    #[test]
    fn test_roc_auc_known_value() {
        let auc = roc_auc_score(&Y_TRUE, &Y_SCORE).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_curve_points() {
        let curve = roc_curve(&Y_TRUE, &Y_SCORE);
        assert_eq!(curve.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!(curve.thresholds[0].is_infinite());
        assert_eq!(&curve.thresholds[1..], &[0.8, 0.4, 0.35, 0.1]);
    }

    #[test]
    fn test_precision_recall_curve_points() {
        let curve = precision_recall_curve(&Y_TRUE, &Y_SCORE);
        assert_eq!(curve.thresholds, vec![0.1, 0.35, 0.4, 0.8]);
        assert_eq!(curve.recall, vec![1.0, 1.0, 0.5, 0.5, 0.0]);
        let expected_precision = [0.5, 2.0 / 3.0, 0.5, 1.0, 1.0];
        for (p, e) in curve.precision.iter().zip(expected_precision) {
            assert!((p - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_average_precision_known_value() {
        let ap = average_precision_score(&Y_TRUE, &Y_SCORE);
        assert!((ap - 0.8333333333333333).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class_fails() {
        assert!(roc_auc_score(&[1.0, 1.0], &[0.2, 0.9]).is_err());
    }

    #[test]
    fn test_perfect_ranking() {
        let auc = roc_auc_score(&[0.0, 0.0, 1.0, 1.0], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
        let ap = average_precision_score(&[0.0, 0.0, 1.0, 1.0], &[0.1, 0.2, 0.8, 0.9]);
        assert!((ap - 1.0).abs() < 1e-12);
    }
}
