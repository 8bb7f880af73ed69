//! Model module - estimators, validation splits, metrics and hyperparameter search

pub mod cv;
pub mod data;
pub mod estimator;
pub mod linear;
pub mod metrics;
pub mod search;

pub use cv::{stratified_train_test_split, CvSplit, StratifiedKFold};
pub use data::*;
pub use estimator::*;
pub use linear::{LinearSvm, LogisticRegression, RidgeRegression};
pub use metrics::*;
pub use search::*;
