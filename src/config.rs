//! Model configuration
//!
//! A [`ModelConfig`] declares everything needed to fit and evaluate one
//! model: the estimator, the features and target, metrics and reporters.
//! Configurations are usually read from JSON.

use crate::context::DataContext;
use crate::error::Result;
use crate::features::Feature;
use crate::frame::{FeatureMatrix, LabeledSeries};
use crate::reporters::{deserialize_reporters, Reporter};
use crate::training::{FittedModel, Metric, ModelSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

fn default_predictions_name() -> String {
    "predictions".to_string()
}

/// Configuration for one model
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Estimator to fit
    pub model: ModelSpec,

    /// Feature columns
    pub features: Vec<Feature>,

    /// Target column
    pub target: Feature,

    /// Restrict the built featureset to these columns
    #[serde(default)]
    pub column_subset: Option<Vec<String>>,

    /// Post-processing applied to raw predictions. It may reference the raw
    /// predictions through the column named by `predictions_name`.
    #[serde(default)]
    pub prediction: Option<Feature>,

    /// Column the raw predictions are written to before post-processing
    #[serde(default = "default_predictions_name")]
    pub predictions_name: String,

    /// Metrics computed for every cross-validation fold
    #[serde(default)]
    pub metrics: Vec<Metric>,

    #[serde(
        default,
        skip_serializing,
        deserialize_with = "deserialize_reporters"
    )]
    pub reporters: Vec<Box<dyn Reporter>>,

    /// Most recently fitted or loaded model
    #[serde(skip)]
    pub fitted: Option<FittedModel>,
}

impl ModelConfig {
    pub fn new(model: ModelSpec, features: Vec<Feature>, target: Feature) -> Self {
        Self {
            model,
            features,
            target,
            column_subset: None,
            prediction: None,
            predictions_name: default_predictions_name(),
            metrics: Vec::new(),
            reporters: Vec::new(),
            fitted: None,
        }
    }

    pub fn with_column_subset(mut self, columns: Vec<String>) -> Self {
        self.column_subset = Some(columns);
        self
    }

    pub fn with_prediction(mut self, prediction: Feature) -> Self {
        self.prediction = Some(prediction);
        self
    }

    pub fn with_predictions_name(mut self, name: impl Into<String>) -> Self {
        self.predictions_name = name.into();
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Canonical JSON of the fields that determine the fitted model
    pub fn fingerprint_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn update_reporters_with_model(&mut self, model: &FittedModel) {
        for reporter in &mut self.reporters {
            reporter.update_with_model(model);
        }
    }

    pub fn update_reporters_with_predictions(
        &mut self,
        ctx: &DataContext,
        x: &FeatureMatrix,
        actuals: &LabeledSeries,
        preds: &LabeledSeries,
    ) {
        for reporter in &mut self.reporters {
            reporter.update_with_predictions(ctx, x, actuals, preds);
        }
    }
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model: {}", self.model)?;
        let features: Vec<String> = self.features.iter().map(|x| x.name()).collect();
        writeln!(f, "features: [{}]", features.join(", "))?;
        writeln!(f, "target: {}", self.target)?;
        if let Some(subset) = &self.column_subset {
            writeln!(f, "column subset: [{}]", subset.join(", "))?;
        }
        if let Some(prediction) = &self.prediction {
            writeln!(f, "prediction: {} (raw in '{}')", prediction, self.predictions_name)?;
        }
        let metrics: Vec<&str> = self.metrics.iter().map(|m| m.name()).collect();
        write!(f, "metrics: [{}]", metrics.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "model": {"kind": "ridge", "alpha": 1.0},
        "features": [
            {"type": "column", "name": "x1"},
            {"type": "log", "of": {"type": "column", "name": "x2"}}
        ],
        "target": {"type": "column", "name": "y"},
        "metrics": ["rmse", "r2"],
        "reporters": ["prediction_stats"]
    }"#;

    #[test]
    fn test_parse_config() {
        let config = ModelConfig::from_json_str(CONFIG).unwrap();
        assert_eq!(config.model, ModelSpec::ridge(1.0));
        assert_eq!(config.features.len(), 2);
        assert_eq!(config.predictions_name, "predictions");
        assert_eq!(config.metrics, vec![Metric::Rmse, Metric::R2]);
        assert_eq!(config.reporters.len(), 1);
        assert!(config.fitted.is_none());
    }

    #[test]
    fn test_fingerprint_ignores_reporters() {
        let a = ModelConfig::from_json_str(CONFIG).unwrap();
        let mut b = ModelConfig::from_json_str(CONFIG).unwrap();
        b.reporters.clear();
        assert_eq!(a.fingerprint_json().unwrap(), b.fingerprint_json().unwrap());

        let c = ModelConfig::from_json_str(CONFIG)
            .unwrap()
            .with_column_subset(vec!["x1".into()]);
        assert_ne!(a.fingerprint_json().unwrap(), c.fingerprint_json().unwrap());
    }

    #[test]
    fn test_display() {
        let config = ModelConfig::from_json_str(CONFIG).unwrap();
        let text = config.to_string();
        assert!(text.contains("model: Ridge(alpha=1, fit_intercept=true)"));
        assert!(text.contains("features: [x1, log(x2)]"));
        assert!(text.ends_with("metrics: [rmse, r2]"));
    }

    #[test]
    fn test_missing_file() {
        assert!(ModelConfig::from_json_file("/nonexistent/config.json").is_err());
    }
}
