//! Estimator specifications and fitted models

use super::knn::{DistanceMetric, KnnClassifier, KnnRegressor, WeightScheme};
use super::linear_models::{LinearRegression, LogisticRegression};
use crate::error::{RampError, Result};
use crate::features::PrepData;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait for ML models
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Fitted linear coefficients and intercept (if the model has them)
    fn coefficients(&self) -> Option<(&Array1<f64>, f64)> {
        None
    }
}

impl Model for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LinearRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LinearRegression::predict(self, x)
    }

    fn coefficients(&self) -> Option<(&Array1<f64>, f64)> {
        self.coefficients.as_ref().map(|c| (c, self.intercept.unwrap_or(0.0)))
    }
}

impl Model for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LogisticRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LogisticRegression::predict(self, x)
    }

    fn coefficients(&self) -> Option<(&Array1<f64>, f64)> {
        self.coefficients.as_ref().map(|c| (c, self.intercept.unwrap_or(0.0)))
    }
}

impl Model for KnnRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        KnnRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KnnRegressor::predict(self, x)
    }
}

impl Model for KnnClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        KnnClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KnnClassifier::predict(self, x)
    }
}

fn default_true() -> bool {
    true
}

fn default_logistic_alpha() -> f64 {
    0.01
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_max_iter() -> usize {
    1000
}

fn default_neighbors() -> usize {
    5
}

/// Unfitted estimator and its hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    LinearRegression {
        #[serde(default = "default_true")]
        fit_intercept: bool,
    },
    Ridge {
        alpha: f64,
        #[serde(default = "default_true")]
        fit_intercept: bool,
    },
    LogisticRegression {
        #[serde(default = "default_logistic_alpha")]
        alpha: f64,
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
        #[serde(default = "default_max_iter")]
        max_iter: usize,
    },
    KnnRegressor {
        #[serde(default = "default_neighbors")]
        n_neighbors: usize,
        #[serde(default)]
        weights: WeightScheme,
        #[serde(default)]
        metric: DistanceMetric,
    },
    KnnClassifier {
        #[serde(default = "default_neighbors")]
        n_neighbors: usize,
        #[serde(default)]
        weights: WeightScheme,
        #[serde(default)]
        metric: DistanceMetric,
    },
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::linear_regression()
    }
}

impl ModelSpec {
    pub fn linear_regression() -> Self {
        ModelSpec::LinearRegression { fit_intercept: true }
    }

    pub fn ridge(alpha: f64) -> Self {
        ModelSpec::Ridge {
            alpha,
            fit_intercept: true,
        }
    }

    pub fn logistic_regression() -> Self {
        ModelSpec::LogisticRegression {
            alpha: default_logistic_alpha(),
            learning_rate: default_learning_rate(),
            max_iter: default_max_iter(),
        }
    }

    pub fn knn_regressor(n_neighbors: usize) -> Self {
        ModelSpec::KnnRegressor {
            n_neighbors,
            weights: WeightScheme::Uniform,
            metric: DistanceMetric::Euclidean,
        }
    }

    pub fn knn_classifier(n_neighbors: usize) -> Self {
        ModelSpec::KnnClassifier {
            n_neighbors,
            weights: WeightScheme::Uniform,
            metric: DistanceMetric::Euclidean,
        }
    }

    /// Fresh, unfitted estimator
    pub fn build(&self) -> Estimator {
        match self {
            ModelSpec::LinearRegression { fit_intercept } => Estimator::Linear(
                LinearRegression::new().with_fit_intercept(*fit_intercept),
            ),
            ModelSpec::Ridge { alpha, fit_intercept } => Estimator::Linear(
                LinearRegression::new()
                    .with_alpha(*alpha)
                    .with_fit_intercept(*fit_intercept),
            ),
            ModelSpec::LogisticRegression {
                alpha,
                learning_rate,
                max_iter,
            } => Estimator::Logistic(
                LogisticRegression::new()
                    .with_alpha(*alpha)
                    .with_learning_rate(*learning_rate)
                    .with_max_iter(*max_iter),
            ),
            ModelSpec::KnnRegressor {
                n_neighbors,
                weights,
                metric,
            } => Estimator::KnnRegressor(
                KnnRegressor::with_k(*n_neighbors)
                    .with_weights(*weights)
                    .with_metric(*metric),
            ),
            ModelSpec::KnnClassifier {
                n_neighbors,
                weights,
                metric,
            } => Estimator::KnnClassifier(
                KnnClassifier::with_k(*n_neighbors)
                    .with_weights(*weights)
                    .with_metric(*metric),
            ),
        }
    }

    /// Fit a new estimator on `x`/`y`, recording the feature column names.
    pub fn fit(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        column_names: Vec<String>,
    ) -> Result<FittedModel> {
        if x.nrows() == 0 {
            return Err(RampError::TrainingError("no training rows".to_string()));
        }
        if column_names.len() != x.ncols() {
            return Err(RampError::ShapeError {
                expected: format!("{} column names", x.ncols()),
                actual: format!("{} column names", column_names.len()),
            });
        }
        if let Some(row) = x.rows().into_iter().position(|r| r.iter().any(|v| !v.is_finite())) {
            return Err(RampError::InvalidInput(format!(
                "non-finite feature value in training row {}",
                row
            )));
        }
        if let Some(row) = y.iter().position(|v| !v.is_finite()) {
            return Err(RampError::InvalidInput(format!(
                "non-finite target value in training row {}",
                row
            )));
        }

        let mut estimator = self.build();
        estimator.fit(x, y)?;

        Ok(FittedModel {
            spec: self.clone(),
            column_names,
            estimator,
            prep: PrepData::default(),
        })
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSpec::LinearRegression { fit_intercept } => {
                write!(f, "LinearRegression(fit_intercept={})", fit_intercept)
            }
            ModelSpec::Ridge { alpha, fit_intercept } => {
                write!(f, "Ridge(alpha={}, fit_intercept={})", alpha, fit_intercept)
            }
            ModelSpec::LogisticRegression {
                alpha,
                learning_rate,
                max_iter,
            } => write!(
                f,
                "LogisticRegression(alpha={}, learning_rate={}, max_iter={})",
                alpha, learning_rate, max_iter
            ),
            ModelSpec::KnnRegressor {
                n_neighbors,
                weights,
                metric,
            } => write!(
                f,
                "KnnRegressor(n_neighbors={}, weights={:?}, metric={:?})",
                n_neighbors, weights, metric
            ),
            ModelSpec::KnnClassifier {
                n_neighbors,
                weights,
                metric,
            } => write!(
                f,
                "KnnClassifier(n_neighbors={}, weights={:?}, metric={:?})",
                n_neighbors, weights, metric
            ),
        }
    }
}

/// Enum to hold estimator variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    Linear(LinearRegression),
    Logistic(LogisticRegression),
    KnnRegressor(KnnRegressor),
    KnnClassifier(KnnClassifier),
}

impl Estimator {
    fn inner(&self) -> &dyn Model {
        match self {
            Estimator::Linear(m) => m,
            Estimator::Logistic(m) => m,
            Estimator::KnnRegressor(m) => m,
            Estimator::KnnClassifier(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Model {
        match self {
            Estimator::Linear(m) => m,
            Estimator::Logistic(m) => m,
            Estimator::KnnRegressor(m) => m,
            Estimator::KnnClassifier(m) => m,
        }
    }
}

impl Model for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn coefficients(&self) -> Option<(&Array1<f64>, f64)> {
        self.inner().coefficients()
    }
}

/// A fitted estimator together with the feature columns it was fitted on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    pub spec: ModelSpec,
    pub column_names: Vec<String>,
    pub estimator: Estimator,
    /// Normalization statistics of the training rows
    #[serde(default)]
    pub prep: PrepData,
}

impl FittedModel {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.column_names.len() {
            return Err(RampError::ShapeError {
                expected: format!("{} features", self.column_names.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        self.estimator.predict(x)
    }

    /// Human-readable summary: the spec, then coefficients by column if any
    pub fn describe(&self) -> String {
        let mut out = self.spec.to_string();
        match self.estimator.coefficients() {
            Some((coef, intercept)) => {
                out.push_str(&format!("\n  intercept: {:.4}", intercept));
                for (name, c) in self.column_names.iter().zip(coef.iter()) {
                    out.push_str(&format!("\n  {}: {:.4}", name, c));
                }
            }
            None => {
                out.push_str(&format!("\n  columns: {}", self.column_names.join(", ")));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_spec_fit_records_columns() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0]];
        let y = array![2.0, 5.0, 6.0, 9.0];
        let model = ModelSpec::linear_regression()
            .fit(&x, &y, vec!["a".into(), "b".into()])
            .unwrap();

        assert_eq!(model.column_names, vec!["a", "b"]);
        let description = model.describe();
        assert!(description.starts_with("LinearRegression(fit_intercept=true)"));
        assert!(description.contains("a: 2.0000"));
        assert!(description.contains("b: 1.0000"));
    }

    #[test]
    fn test_fit_rejects_non_finite() {
        let x = array![[1.0], [f64::NAN]];
        let y = array![1.0, 2.0];
        let err = ModelSpec::linear_regression()
            .fit(&x, &y, vec!["a".into()])
            .unwrap_err();
        assert!(matches!(err, RampError::InvalidInput(_)));
    }

    #[test]
    fn test_fit_rejects_empty() {
        let x = Array2::<f64>::zeros((0, 1));
        let y = Array1::<f64>::zeros(0);
        assert!(ModelSpec::ridge(1.0).fit(&x, &y, vec!["a".into()]).is_err());
    }

    #[test]
    fn test_predict_checks_width() {
        let model = ModelSpec::knn_regressor(1)
            .fit(&array![[1.0], [2.0]], &array![1.0, 2.0], vec!["a".into()])
            .unwrap();
        assert!(model.predict(&array![[1.0, 2.0]]).is_err());
        assert!(model.describe().contains("columns: a"));
    }

    #[test]
    fn test_knn_metric_reaches_estimator() {
        let x = array![[2.0, 2.0], [3.0, 0.0]];
        let y = array![1.0, 2.0];
        let query = array![[0.0, 0.0]];

        let euclidean = ModelSpec::knn_regressor(1)
            .fit(&x, &y, vec!["a".into(), "b".into()])
            .unwrap();
        assert_eq!(euclidean.predict(&query).unwrap()[0], 1.0);

        let manhattan = ModelSpec::KnnRegressor {
            n_neighbors: 1,
            weights: WeightScheme::Uniform,
            metric: DistanceMetric::Manhattan,
        }
        .fit(&x, &y, vec!["a".into(), "b".into()])
        .unwrap();
        assert_eq!(manhattan.predict(&query).unwrap()[0], 2.0);
    }

    #[test]
    fn test_spec_serde() {
        let spec: ModelSpec = serde_json::from_str(r#"{"kind": "ridge", "alpha": 0.5}"#).unwrap();
        assert_eq!(spec, ModelSpec::ridge(0.5));
        assert_eq!(spec.to_string(), "Ridge(alpha=0.5, fit_intercept=true)");

        let knn: ModelSpec =
            serde_json::from_str(r#"{"kind": "knn_classifier", "weights": "distance"}"#).unwrap();
        assert_eq!(
            knn,
            ModelSpec::KnnClassifier {
                n_neighbors: 5,
                weights: WeightScheme::Distance,
                metric: DistanceMetric::Euclidean,
            }
        );

        let manhattan: ModelSpec =
            serde_json::from_str(r#"{"kind": "knn_regressor", "n_neighbors": 1, "metric": "manhattan"}"#)
                .unwrap();
        assert_eq!(
            manhattan.to_string(),
            "KnnRegressor(n_neighbors=1, weights=Uniform, metric=Manhattan)"
        );
    }
}
