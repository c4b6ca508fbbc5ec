//! Feature builders
//!
//! Features are declared in configuration and evaluated against a
//! [`DataContext`]. Each feature yields one labelled column; a featureset
//! is the matrix of all of them.

use crate::context::DataContext;
use crate::error::{RampError, Result};
use crate::frame::{FeatureMatrix, LabeledSeries};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// A derived column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Feature {
    /// Raw numeric column
    Column { name: String },
    /// Natural logarithm; non-positive values map to NaN
    Log { of: Box<Feature> },
    /// Raise to a power
    Power { of: Box<Feature>, exponent: f64 },
    /// Z-score using statistics of the training rows
    Normalize { of: Box<Feature> },
    /// Element-wise product
    Product { of: Vec<Feature> },
    /// Constant column
    Constant { value: f64 },
}

impl Feature {
    pub fn column(name: impl Into<String>) -> Self {
        Feature::Column { name: name.into() }
    }

    pub fn log(of: Feature) -> Self {
        Feature::Log { of: Box::new(of) }
    }

    pub fn power(of: Feature, exponent: f64) -> Self {
        Feature::Power {
            of: Box::new(of),
            exponent,
        }
    }

    pub fn normalize(of: Feature) -> Self {
        Feature::Normalize { of: Box::new(of) }
    }

    pub fn product(of: Vec<Feature>) -> Self {
        Feature::Product { of }
    }

    /// Column name of the built feature
    pub fn name(&self) -> String {
        match self {
            Feature::Column { name } => name.clone(),
            Feature::Log { of } => format!("log({})", of.name()),
            Feature::Power { of, exponent } => format!("{}^{}", of.name(), exponent),
            Feature::Normalize { of } => format!("normalize({})", of.name()),
            Feature::Product { of } => {
                let names: Vec<String> = of.iter().map(|f| f.name()).collect();
                format!("product({})", names.join(", "))
            }
            Feature::Constant { value } => format!("constant({})", value),
        }
    }

    /// Evaluate over every row of the context
    pub fn build(&self, ctx: &DataContext) -> Result<LabeledSeries> {
        self.build_with(ctx, None)
    }

    /// Evaluate over every row of the context. Normalization statistics
    /// found in `prep` are used as-is; missing ones are computed from the
    /// context's training rows.
    pub fn build_with(&self, ctx: &DataContext, prep: Option<&PrepData>) -> Result<LabeledSeries> {
        let values = match self {
            Feature::Column { name } => ctx.column_values(name)?.values,
            Feature::Log { of } => of
                .build_with(ctx, prep)?
                .values
                .mapv(|v| if v > 0.0 { v.ln() } else { f64::NAN }),
            Feature::Power { of, exponent } => of
                .build_with(ctx, prep)?
                .values
                .mapv(|v| v.powf(*exponent)),
            Feature::Normalize { of } => {
                let inner = of.build_with(ctx, prep)?;
                let stats = match prep.and_then(|p| p.normalize.get(&self.name())) {
                    Some(stats) => *stats,
                    None => NormStats::from_rows(&inner, &ctx.train_rows()),
                };
                stats.apply(&inner.values)
            }
            Feature::Product { of } => {
                if of.is_empty() {
                    return Err(RampError::ConfigError(
                        "product feature needs at least one input".to_string(),
                    ));
                }
                let mut acc = Array1::from_elem(ctx.index.len(), 1.0);
                for f in of {
                    acc = acc * &f.build_with(ctx, prep)?.values;
                }
                acc
            }
            Feature::Constant { value } => Array1::from_elem(ctx.index.len(), *value),
        };

        LabeledSeries::new(self.name(), ctx.index.clone(), values)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Mean and population standard deviation of a normalized feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormStats {
    pub mean: f64,
    pub std: f64,
}

impl NormStats {
    /// Statistics over `train_rows`, or over all finite values when none of
    /// the training rows are available. A zero spread is replaced by 1.
    pub fn from_rows(series: &LabeledSeries, train_rows: &[usize]) -> Self {
        let reference: Vec<f64> = if train_rows.is_empty() {
            series.values.iter().copied().filter(|v| v.is_finite()).collect()
        } else {
            series
                .reindex(train_rows)
                .values
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .collect()
        };

        if reference.is_empty() {
            return Self {
                mean: f64::NAN,
                std: 1.0,
            };
        }

        let n = reference.len() as f64;
        let mean = reference.iter().sum::<f64>() / n;
        let std = (reference.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        Self {
            mean,
            std: if std > 0.0 { std } else { 1.0 },
        }
    }

    fn apply(&self, values: &Array1<f64>) -> Array1<f64> {
        values.mapv(|v| (v - self.mean) / self.std)
    }
}

/// Statistics learned from the training rows at fit time, keyed by feature
/// name. Stored with the fitted model so features rebuilt on other rows are
/// scaled the same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrepData {
    pub normalize: BTreeMap<String, NormStats>,
}

impl PrepData {
    /// Learn statistics for every normalized feature (nested ones included)
    pub fn learn<'a, I>(features: I, ctx: &DataContext) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Feature>,
    {
        let mut prep = PrepData::default();
        for feature in features {
            prep.learn_feature(feature, ctx)?;
        }
        Ok(prep)
    }

    fn learn_feature(&mut self, feature: &Feature, ctx: &DataContext) -> Result<()> {
        match feature {
            Feature::Column { .. } | Feature::Constant { .. } => {}
            Feature::Log { of } | Feature::Power { of, .. } => self.learn_feature(of, ctx)?,
            Feature::Product { of } => {
                for f in of {
                    self.learn_feature(f, ctx)?;
                }
            }
            Feature::Normalize { of } => {
                // inner statistics first, the outer ones depend on them
                self.learn_feature(of, ctx)?;
                let name = feature.name();
                if !self.normalize.contains_key(&name) {
                    let inner = of.build_with(ctx, Some(&*self))?;
                    self.normalize
                        .insert(name, NormStats::from_rows(&inner, &ctx.train_rows()));
                }
            }
        }
        Ok(())
    }
}

/// Build every feature into a matrix over the context's rows
pub fn build_featureset(features: &[Feature], ctx: &DataContext) -> Result<FeatureMatrix> {
    build_featureset_with(features, ctx, None)
}

/// [`build_featureset`] reusing previously learned statistics
pub fn build_featureset_with(
    features: &[Feature],
    ctx: &DataContext,
    prep: Option<&PrepData>,
) -> Result<FeatureMatrix> {
    if features.is_empty() {
        return Err(RampError::ConfigError("no features configured".to_string()));
    }

    let mut seen = HashSet::new();
    for feature in features {
        let name = feature.name();
        if !seen.insert(name.clone()) {
            return Err(RampError::ConfigError(format!("duplicate feature '{}'", name)));
        }
    }

    let columns = features
        .par_iter()
        .map(|f| f.build_with(ctx, prep))
        .collect::<Result<Vec<_>>>()?;

    FeatureMatrix::from_series(ctx.index.clone(), &columns)
}

/// Build the target column
pub fn build_target(target: &Feature, ctx: &DataContext) -> Result<LabeledSeries> {
    target.build(ctx)
}

pub fn build_target_with(
    target: &Feature,
    ctx: &DataContext,
    prep: Option<&PrepData>,
) -> Result<LabeledSeries> {
    target.build_with(ctx, prep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use polars::prelude::*;
    use std::sync::Arc;

    fn context() -> DataContext {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0],
            "z" => &[0.0, 1.0, -1.0, 2.0]
        )
        .unwrap();
        DataContext::new(df, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_log_and_power() {
        let ctx = context();
        let log = Feature::log(Feature::column("z")).build(&ctx).unwrap();
        assert!(log.values[0].is_nan());
        assert_eq!(log.values[1], 0.0);
        assert!(log.values[2].is_nan());

        let sq = Feature::power(Feature::column("x"), 2.0).build(&ctx).unwrap();
        assert_eq!(sq.values.to_vec(), vec![1.0, 4.0, 9.0, 16.0]);
        assert_eq!(sq.name, "x^2");
    }

    #[test]
    fn test_normalize_uses_training_rows() {
        let ctx = context().with_train_index(vec![0, 1]);
        let n = Feature::normalize(Feature::column("x")).build(&ctx).unwrap();
        // train mean 1.5, std 0.5
        assert!((n.values[0] + 1.0).abs() < 1e-12);
        assert!((n.values[3] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_learned_stats_survive_subsetting() {
        let ctx = context().with_train_index(vec![0, 1]);
        let feature = Feature::normalize(Feature::column("x"));
        let prep = PrepData::learn([&feature], &ctx).unwrap();
        assert_eq!(prep.normalize["normalize(x)"], NormStats { mean: 1.5, std: 0.5 });

        // the subset has no training rows; learned stats still apply
        let sub = ctx.subset(&[2, 3]).unwrap();
        let n = feature.build_with(&sub, Some(&prep)).unwrap();
        assert!((n.values[0] - 3.0).abs() < 1e-12);
        assert!((n.values[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_nested_normalize_learns_inner_first() {
        let ctx = context().with_train_index(vec![0, 1, 2, 3]);
        let feature = Feature::normalize(Feature::power(
            Feature::normalize(Feature::column("x")),
            2.0,
        ));
        let prep = PrepData::learn([&feature], &ctx).unwrap();
        assert_eq!(prep.normalize.len(), 2);

        let direct = feature.build(&ctx).unwrap();
        let reused = feature.build_with(&ctx, Some(&prep)).unwrap();
        assert_eq!(direct, reused);
    }

    #[test]
    fn test_featureset_rejects_duplicates() {
        let ctx = context();
        let err = build_featureset(&[Feature::column("x"), Feature::column("x")], &ctx).unwrap_err();
        assert!(matches!(err, RampError::ConfigError(_)));
    }

    #[test]
    fn test_featureset_shape() {
        let ctx = context();
        let x = build_featureset(
            &[
                Feature::column("x"),
                Feature::product(vec![Feature::column("x"), Feature::column("z")]),
                Feature::Constant { value: 1.0 },
            ],
            &ctx,
        )
        .unwrap();
        assert_eq!(x.nrows(), 4);
        assert_eq!(x.columns, vec!["x", "product(x, z)", "constant(1)"]);
        assert_eq!(x.values[[3, 1]], 8.0);
    }

    #[test]
    fn test_missing_column_is_not_found() {
        let ctx = context();
        let err = build_target(&Feature::column("y"), &ctx).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_feature_serde_tagging() {
        let f: Feature =
            serde_json::from_str(r#"{"type": "log", "of": {"type": "column", "name": "x"}}"#).unwrap();
        assert_eq!(f, Feature::log(Feature::column("x")));
    }
}
