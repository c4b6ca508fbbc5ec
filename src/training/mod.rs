//! Model training module
//!
//! Provides the estimators and the fit / predict / cross-validation
//! workflow built on top of them:
//! - Linear models (OLS, Ridge, Logistic)
//! - K-Nearest Neighbors
//! - Fold generation (K-Fold, Stratified, Time series, Groups)
//! - Metrics and score summaries

mod engine;
mod models;
pub mod cross_validation;
pub mod knn;
pub mod linear_models;
pub mod metrics;

pub use cross_validation::{make_folds, CVStrategy, CrossValidator, Fold, FoldGenerator, Folds};
pub use engine::{cv, cv_to, fit, get_key, get_x, get_xy, get_y, predict, CvResult, Prediction};
pub use knn::{DistanceMetric, KnnClassifier, KnnRegressor, WeightScheme};
pub use linear_models::{LinearRegression, LogisticRegression};
pub use metrics::{format_scores, print_scores, write_scores, Metric, MetricScores, ScoreSummary};
pub use models::{Estimator, FittedModel, Model, ModelSpec};
