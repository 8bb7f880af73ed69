//! Linear estimators: logistic regression, linear SVM and ridge regression

use faer::Mat;

use crate::error::{PipelineError, Result};
use crate::model::estimator::{
    bad_param, check_fit_input, unknown_param, Estimator, EstimatorKind, ParamSet, ParamValue,
    Scores,
};

/// Convergence threshold on the gradient norm for gradient descent.
const GRADIENT_TOLERANCE: f64 = 1e-6;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// `X w + b` for every row.
fn linear_response(x: &Mat<f64>, weights: &[f64], bias: f64) -> Vec<f64> {
    (0..x.nrows())
        .map(|i| {
            weights
                .iter()
                .enumerate()
                .fold(bias, |acc, (j, w)| acc + w * x[(i, j)])
        })
        .collect()
}

fn check_predict_input(name: &str, x: &Mat<f64>, weights: &Option<Vec<f64>>) -> Result<()> {
    match weights {
        None => Err(PipelineError::validation(format!("{} is not fitted", name))),
        Some(w) if w.len() != x.ncols() => Err(PipelineError::validation(format!(
            "{} was fitted on {} features, got {}",
            name,
            w.len(),
            x.ncols()
        ))),
        Some(_) => Ok(()),
    }
}

/// L2-regularised logistic regression fitted by batch gradient descent.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub learning_rate: f64,
    pub max_iter: usize,
    pub l2: f64,
    pub fit_intercept: bool,
    weights: Option<Vec<f64>>,
    bias: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_iter: 200,
            l2: 1e-4,
            fit_intercept: true,
            weights: None,
            bias: 0.0,
        }
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positive-class probability per row.
    pub fn predict_proba(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        check_predict_input(self.name(), x, &self.weights)?;
        let weights = self.weights.as_deref().unwrap_or_default();
        Ok(linear_response(x, weights, self.bias)
            .into_iter()
            .map(sigmoid)
            .collect())
    }
}

impl Estimator for LogisticRegression {
    fn name(&self) -> &'static str {
        "LogisticRegression"
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Classifier
    }

    fn params(&self) -> ParamSet {
        ParamSet::from([
            ("learning_rate".to_string(), ParamValue::Float(self.learning_rate)),
            ("max_iter".to_string(), ParamValue::Int(self.max_iter as i64)),
            ("l2".to_string(), ParamValue::Float(self.l2)),
            ("fit_intercept".to_string(), ParamValue::Bool(self.fit_intercept)),
        ])
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            match name.as_str() {
                "learning_rate" => {
                    self.learning_rate = value
                        .as_f64()
                        .filter(|v| *v > 0.0)
                        .ok_or_else(|| bad_param(self.name(), name, value))?
                }
                "max_iter" => {
                    self.max_iter = value
                        .as_usize()
                        .filter(|v| *v > 0)
                        .ok_or_else(|| bad_param(self.name(), name, value))?
                }
                "l2" => {
                    self.l2 = value
                        .as_f64()
                        .filter(|v| *v >= 0.0)
                        .ok_or_else(|| bad_param(self.name(), name, value))?
                }
                "fit_intercept" => {
                    self.fit_intercept = value
                        .as_bool()
                        .ok_or_else(|| bad_param(self.name(), name, value))?
                }
                _ => return Err(unknown_param(self.name(), name)),
            }
        }
        Ok(())
    }

    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<()> {
        check_fit_input(x, y)?;
        let n = x.nrows() as f64;
        let p = x.ncols();

        let mut weights = vec![0.0; p];
        let mut bias = 0.0;

        for _ in 0..self.max_iter {
            let errors: Vec<f64> = linear_response(x, &weights, bias)
                .into_iter()
                .zip(y)
                .map(|(z, &t)| sigmoid(z) - t)
                .collect();

            let grad_w: Vec<f64> = (0..p)
                .map(|j| {
                    let g: f64 = errors.iter().enumerate().map(|(i, e)| e * x[(i, j)]).sum();
                    g / n + self.l2 * weights[j]
                })
                .collect();
            let grad_b = if self.fit_intercept {
                errors.iter().sum::<f64>() / n
            } else {
                0.0
            };

            let norm = (grad_w.iter().map(|g| g * g).sum::<f64>() + grad_b * grad_b).sqrt();
            if norm < GRADIENT_TOLERANCE {
                break;
            }

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * g;
            }
            bias -= self.learning_rate * grad_b;
        }

        self.weights = Some(weights);
        self.bias = bias;
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| if p >= 0.5 { 1.0 } else { 0.0 })
            .collect())
    }

    fn predict_scores(&self, x: &Mat<f64>) -> Result<Scores> {
        Ok(Scores::Probability(self.predict_proba(x)?))
    }

    fn boxed_clone(&self) -> Box<dyn Estimator> {
        Box::new(Self {
            weights: None,
            bias: 0.0,
            ..self.clone()
        })
    }
}

/// Linear SVM (hinge loss) fitted by full-batch subgradient descent.
///
/// Exposes a decision function but no probabilities.
#[derive(Debug, Clone)]
pub struct LinearSvm {
    pub learning_rate: f64,
    pub epochs: usize,
    /// Inverse regularisation strength.
    pub c: f64,
    weights: Option<Vec<f64>>,
    bias: f64,
}

impl Default for LinearSvm {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            epochs: 200,
            c: 1.0,
            weights: None,
            bias: 0.0,
        }
    }
}

impl LinearSvm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decision_function(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        check_predict_input(self.name(), x, &self.weights)?;
        let weights = self.weights.as_deref().unwrap_or_default();
        Ok(linear_response(x, weights, self.bias))
    }
}

impl Estimator for LinearSvm {
    fn name(&self) -> &'static str {
        "LinearSvm"
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Classifier
    }

    fn params(&self) -> ParamSet {
        ParamSet::from([
            ("learning_rate".to_string(), ParamValue::Float(self.learning_rate)),
            ("epochs".to_string(), ParamValue::Int(self.epochs as i64)),
            ("c".to_string(), ParamValue::Float(self.c)),
        ])
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            match name.as_str() {
                "learning_rate" => {
                    self.learning_rate = value
                        .as_f64()
                        .filter(|v| *v > 0.0)
                        .ok_or_else(|| bad_param(self.name(), name, value))?
                }
                "epochs" => {
                    self.epochs = value
                        .as_usize()
                        .filter(|v| *v > 0)
                        .ok_or_else(|| bad_param(self.name(), name, value))?
                }
                "c" => {
                    self.c = value
                        .as_f64()
                        .filter(|v| *v > 0.0)
                        .ok_or_else(|| bad_param(self.name(), name, value))?
                }
                _ => return Err(unknown_param(self.name(), name)),
            }
        }
        Ok(())
    }

    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<()> {
        check_fit_input(x, y)?;
        let n = x.nrows() as f64;
        let p = x.ncols();
        let lambda = 1.0 / (self.c * n);

        // Labels in {-1, +1}
        let signed: Vec<f64> = y.iter().map(|&t| if t >= 0.5 { 1.0 } else { -1.0 }).collect();

        let mut weights = vec![0.0; p];
        let mut bias = 0.0;

        for _ in 0..self.epochs {
            let margins = linear_response(x, &weights, bias);

            let mut grad_w: Vec<f64> = weights.iter().map(|w| lambda * w).collect();
            let mut grad_b = 0.0;
            for (i, (m, t)) in margins.iter().zip(&signed).enumerate() {
                if t * m < 1.0 {
                    for (j, g) in grad_w.iter_mut().enumerate() {
                        *g -= t * x[(i, j)] / n;
                    }
                    grad_b -= t / n;
                }
            }

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * g;
            }
            bias -= self.learning_rate * grad_b;
        }

        self.weights = Some(weights);
        self.bias = bias;
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|d| if d >= 0.0 { 1.0 } else { 0.0 })
            .collect())
    }

    fn predict_scores(&self, x: &Mat<f64>) -> Result<Scores> {
        Ok(Scores::Decision(self.decision_function(x)?))
    }

    fn boxed_clone(&self) -> Box<dyn Estimator> {
        Box::new(Self {
            weights: None,
            bias: 0.0,
            ..self.clone()
        })
    }
}

/// Ridge regression solved in closed form on centred data.
#[derive(Debug, Clone)]
pub struct RidgeRegression {
    pub alpha: f64,
    weights: Option<Vec<f64>>,
    intercept: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            weights: None,
            intercept: 0.0,
        }
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Estimator for RidgeRegression {
    fn name(&self) -> &'static str {
        "RidgeRegression"
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Regressor
    }

    fn params(&self) -> ParamSet {
        ParamSet::from([("alpha".to_string(), ParamValue::Float(self.alpha))])
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            match name.as_str() {
                "alpha" => {
                    self.alpha = value
                        .as_f64()
                        .filter(|v| *v >= 0.0)
                        .ok_or_else(|| bad_param(self.name(), name, value))?
                }
                _ => return Err(unknown_param(self.name(), name)),
            }
        }
        Ok(())
    }

    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<()> {
        check_fit_input(x, y)?;
        let n = x.nrows();
        let p = x.ncols();

        let x_means: Vec<f64> = (0..p)
            .map(|j| (0..n).map(|i| x[(i, j)]).sum::<f64>() / n as f64)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n as f64;

        let xc = Mat::<f64>::from_fn(n, p, |i, j| x[(i, j)] - x_means[j]);
        let yc = Mat::<f64>::from_fn(n, 1, |i, _| y[i] - y_mean);

        let mut gram = xc.transpose() * &xc;
        for j in 0..p {
            gram[(j, j)] += self.alpha;
        }
        let rhs = xc.transpose() * &yc;
        let rhs: Vec<f64> = (0..p).map(|j| rhs[(j, 0)]).collect();

        let weights = cholesky_solve(&gram, &rhs).ok_or_else(|| {
            PipelineError::validation("Ridge system is singular; increase alpha")
        })?;

        self.intercept = y_mean
            - weights
                .iter()
                .zip(&x_means)
                .map(|(w, m)| w * m)
                .sum::<f64>();
        self.weights = Some(weights);
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        check_predict_input(self.name(), x, &self.weights)?;
        let weights = self.weights.as_deref().unwrap_or_default();
        Ok(linear_response(x, weights, self.intercept))
    }

    fn boxed_clone(&self) -> Box<dyn Estimator> {
        Box::new(Self::new(self.alpha))
    }
}

/// Solve `A x = b` for symmetric positive-definite `A` via Cholesky.
///
/// Returns `None` when `A` is not positive definite.
pub(crate) fn cholesky_solve(a: &Mat<f64>, b: &[f64]) -> Option<Vec<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut l = Mat::<f64>::zeros(n, n);
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[(i, k)] * l[(j, k)]).sum();
            if i == j {
                let diag = a[(i, i)] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[(i, j)] = diag.sqrt();
            } else {
                l[(i, j)] = (a[(i, j)] - sum) / l[(j, j)];
            }
        }
    }

    // L z = b
    let mut z = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[(i, j)] * z[j]).sum();
        z[i] = (b[i] - sum) / l[(i, i)];
    }

    // L^T x = z
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[(j, i)] * x[j]).sum();
        x[i] = (z[i] - sum) / l[(i, i)];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Mat<f64>, Vec<f64>) {
        let xs = [-3.0, -2.0, -1.5, -1.0, 1.0, 1.5, 2.0, 3.0];
        let x = Mat::<f64>::from_fn(xs.len(), 1, |i, _| xs[i]);
        let y = xs.iter().map(|v| if *v > 0.0 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_logistic_regression_separates_classes() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(proba[0] < proba[7]);
    }

    #[test]
    fn test_linear_svm_separates_classes() {
        let (x, y) = separable();
        let mut model = LinearSvm::new();
        model.set_params(&ParamSet::from([("learning_rate".to_string(), ParamValue::Float(0.1))]))
            .unwrap();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        assert!(matches!(model.predict_scores(&x).unwrap(), Scores::Decision(_)));
    }

    #[test]
    fn test_ridge_recovers_linear_relation() {
        // y = 2 x + 1
        let x = Mat::<f64>::from_fn(5, 1, |i, _| i as f64);
        let y: Vec<f64> = (0..5).map(|i| 2.0 * i as f64 + 1.0).collect();

        let mut model = RidgeRegression::new(1e-9);
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-6);
        assert!((model.intercept() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let x = Mat::<f64>::zeros(2, 1);
        assert!(LogisticRegression::new().predict(&x).is_err());
    }

    #[test]
    fn test_unknown_param_rejected() {
        let mut model = LogisticRegression::new();
        let params = ParamSet::from([("depth".to_string(), ParamValue::Int(3))]);
        assert!(matches!(model.set_params(&params), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_boxed_clone_is_unfitted_with_same_params() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new();
        model.max_iter = 50;
        model.fit(&x, &y).unwrap();

        let clone = model.boxed_clone();
        assert_eq!(clone.params(), model.params());
        assert!(clone.predict(&x).is_err());
    }

    #[test]
    fn test_cholesky_solve() {
        let a = Mat::<f64>::from_fn(2, 2, |i, j| [[4.0, 2.0], [2.0, 3.0]][i][j]);
        let x = cholesky_solve(&a, &[2.0, 5.0]).unwrap();
        // 4x + 2y = 2, 2x + 3y = 5 -> x = -0.5, y = 2
        assert!((x[0] + 0.5).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }
}
