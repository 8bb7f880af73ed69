//! The estimator capability interface and hyperparameter values

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use faer::Mat;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Some(*v as usize),
            ParamValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "{}", v),
        }
    }
}

/// One concrete assignment of hyperparameters.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Candidate values per hyperparameter.
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// Read a parameter grid from JSON, e.g. `{"learning_rate": [0.01, 0.1]}`.
pub fn load_param_grid(path: &Path) -> Result<ParamGrid> {
    if !path.exists() {
        return Err(PipelineError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let grid: ParamGrid = serde_json::from_str(&content)?;

    if let Some((name, _)) = grid.iter().find(|(_, values)| values.is_empty()) {
        return Err(PipelineError::validation(format!(
            "Parameter '{}' has no candidate values",
            name
        )));
    }
    Ok(grid)
}

/// Render a parameter set as `a=1, b=0.1`.
pub fn format_params(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// What an estimator predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    Classifier,
    Regressor,
}

/// Continuous scores for ranking metrics, best source first.
#[derive(Debug, Clone, PartialEq)]
pub enum Scores {
    /// Probability of the positive class.
    Probability(Vec<f64>),
    /// Signed distance from the decision boundary.
    Decision(Vec<f64>),
    /// Hard labels, when the estimator offers nothing better.
    Label(Vec<f64>),
}

impl Scores {
    pub fn values(&self) -> &[f64] {
        match self {
            Scores::Probability(v) | Scores::Decision(v) | Scores::Label(v) => v,
        }
    }

    pub fn into_values(self) -> Vec<f64> {
        match self {
            Scores::Probability(v) | Scores::Decision(v) | Scores::Label(v) => v,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Scores::Probability(_) => "probability",
            Scores::Decision(_) => "decision_function",
            Scores::Label(_) => "label",
        }
    }
}

/// Anything that can be fitted, searched over, and asked for predictions.
///
/// Features are row-major samples in a dense matrix; labels are `0.0`/`1.0`
/// for classifiers.
pub trait Estimator: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> EstimatorKind;

    /// Current hyperparameters.
    fn params(&self) -> ParamSet;

    /// Apply hyperparameters; unknown names or bad values are rejected.
    fn set_params(&mut self, params: &ParamSet) -> Result<()>;

    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<()>;

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>>;

    /// Probability if available, else decision function, else hard label.
    fn predict_scores(&self, x: &Mat<f64>) -> Result<Scores> {
        Ok(Scores::Label(self.predict(x)?))
    }

    /// Unfitted copy carrying the same hyperparameters.
    fn boxed_clone(&self) -> Box<dyn Estimator>;
}

impl fmt::Debug for dyn Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), format_params(&self.params()))
    }
}

pub(crate) fn unknown_param(estimator: &str, name: &str) -> PipelineError {
    PipelineError::validation(format!("{} has no hyperparameter '{}'", estimator, name))
}

pub(crate) fn bad_param(estimator: &str, name: &str, value: &ParamValue) -> PipelineError {
    PipelineError::validation(format!(
        "{}: invalid value '{}' for hyperparameter '{}'",
        estimator, value, name
    ))
}

pub(crate) fn check_fit_input(x: &Mat<f64>, y: &[f64]) -> Result<()> {
    if x.nrows() == 0 {
        return Err(PipelineError::validation("Cannot fit on zero samples"));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::validation(format!(
            "Feature rows ({}) and labels ({}) differ in length",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_grid_from_json() {
        let json = r#"{"learning_rate": [0.01, 0.1], "max_iter": [100, 200], "fit_intercept": [true]}"#;
        let grid: ParamGrid = serde_json::from_str(json).unwrap();

        assert_eq!(grid["learning_rate"], vec![ParamValue::Float(0.01), ParamValue::Float(0.1)]);
        assert_eq!(grid["max_iter"], vec![ParamValue::Int(100), ParamValue::Int(200)]);
        assert_eq!(grid["fit_intercept"], vec![ParamValue::Bool(true)]);
    }

    #[test]
    fn test_param_value_conversions() {
        assert_eq!(ParamValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(ParamValue::Float(200.0).as_usize(), Some(200));
        assert_eq!(ParamValue::Float(0.5).as_usize(), None);
        assert_eq!(ParamValue::Str("x".into()).as_f64(), None);
    }

    #[test]
    fn test_format_params_sorted_by_name() {
        let mut params = ParamSet::new();
        params.insert("b".into(), ParamValue::Int(2));
        params.insert("a".into(), ParamValue::Float(0.5));
        assert_eq!(format_params(&params), "a=0.5, b=2");
    }
}
