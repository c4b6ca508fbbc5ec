//! Fit / predict / cross-validate
//!
//! These functions sequence feature building, model fitting, the model
//! store and scoring for a [`ModelConfig`] against a [`DataContext`].

use super::cross_validation::{make_folds, Folds};
use super::metrics::{write_scores, MetricScores};
use super::models::FittedModel;
use crate::config::ModelConfig;
use crate::context::DataContext;
use crate::error::{RampError, Result};
use crate::features::{build_featureset_with, build_target, build_target_with, PrepData};
use crate::frame::{intersect, FeatureMatrix, LabeledSeries};
use crate::reporters::render_report_table;
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Write;
use std::iter;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Featureset for the context, narrowed to `column_subset` when set
pub fn get_x(config: &ModelConfig, ctx: &DataContext) -> Result<FeatureMatrix> {
    get_x_with(config, ctx, None)
}

fn get_x_with(
    config: &ModelConfig,
    ctx: &DataContext,
    prep: Option<&PrepData>,
) -> Result<FeatureMatrix> {
    let x = build_featureset_with(&config.features, ctx, prep)?;
    match &config.column_subset {
        Some(columns) if !columns.is_empty() => x.select(columns),
        _ => Ok(x),
    }
}

pub fn get_y(config: &ModelConfig, ctx: &DataContext) -> Result<LabeledSeries> {
    build_target(&config.target, ctx)
}

fn get_y_with(
    config: &ModelConfig,
    ctx: &DataContext,
    prep: Option<&PrepData>,
) -> Result<LabeledSeries> {
    build_target_with(&config.target, ctx, prep)
}

pub fn get_xy(config: &ModelConfig, ctx: &DataContext) -> Result<(FeatureMatrix, LabeledSeries)> {
    Ok((get_x(config, ctx)?, get_y(config, ctx)?))
}

/// Model store key: configuration fingerprint joined with the context key
pub fn get_key(config: &ModelConfig, ctx: &DataContext) -> Result<String> {
    let digest = Sha256::digest(config.fingerprint_json()?.as_bytes());
    Ok(format!("{:x}-{}", digest, ctx.create_key()?))
}

/// Fit the configured model on the context's training rows, or load it
/// from the store if this configuration and context were fitted before.
///
/// Returns the full featureset and target when they had to be built, and
/// `(None, None)` on a store hit.
pub fn fit(
    config: &mut ModelConfig,
    ctx: &DataContext,
) -> Result<(Option<FeatureMatrix>, Option<LabeledSeries>)> {
    let key = get_key(config, ctx)?;

    let (model, x, y) = match ctx.store.load(&key)? {
        Some(model) => {
            info!("loading stored model...");
            (model, None, None)
        }
        None => {
            // statistics of the training rows travel with the model
            let inputs = config.features.iter().chain(iter::once(&config.target));
            let prep = PrepData::learn(inputs, ctx)?;
            let x = get_x_with(config, ctx, Some(&prep))?;
            let y = get_y_with(config, ctx, Some(&prep))?;
            let train_rows = ctx.train_rows();
            let train_x = x.reindex(&train_rows);
            let train_y = y.reindex(&train_rows);
            debug!(
                n_rows = train_x.nrows(),
                columns = ?train_x.columns,
                "Training matrix built"
            );

            info!(model = %config.model, "Fitting model");
            let start = Instant::now();
            let mut model = config
                .model
                .fit(&train_x.values, &train_y.values, train_x.columns.clone())?;
            model.prep = prep;
            ctx.store.save(&key, &model)?;
            info!(elapsed_ms = start.elapsed().as_millis() as u64, "Model fitted");

            (model, Some(x), Some(y))
        }
    };

    config.update_reporters_with_model(&model);
    config.fitted = Some(model);

    Ok((x, y))
}

/// Output of [`predict`]
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Predictions for the requested labels (unnamed)
    pub preds: LabeledSeries,
    /// Featureset the predictions were made from
    pub x: FeatureMatrix,
    /// Target, when it could be built
    pub y: Option<LabeledSeries>,
}

/// Predict for the rows labelled `predict_index`.
///
/// With `fit_model` the model is (re)fitted or loaded first; otherwise the
/// model already held by `config` is used. When `config.prediction` is set
/// the raw predictions are written to `ctx.data[predictions_name]` and the
/// prediction feature is evaluated to produce the final values.
pub fn predict(
    config: &mut ModelConfig,
    ctx: &mut DataContext,
    predict_index: &[usize],
    fit_model: bool,
) -> Result<Prediction> {
    let overlap = intersect(&ctx.train_index, predict_index);
    if !overlap.is_empty() {
        warn!(n_overlap = overlap.len(), "train and predict indices overlap");
    }

    let (mut x, mut y) = (None, None);
    if fit_model {
        (x, y) = fit(config, ctx)?;
    }

    let model = config.fitted.as_ref().ok_or(RampError::ModelNotFitted)?;
    let x = match x {
        Some(x) => x,
        None => {
            // only the rows being predicted are needed
            let sub = ctx.subset(predict_index)?;
            let x = get_x_with(config, &sub, Some(&model.prep))?;
            y = match get_y_with(config, &sub, Some(&model.prep)) {
                Ok(y) => Some(y),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
            x
        }
    };

    if model.column_names != x.columns {
        return Err(RampError::ValidationError(format!(
            "model was fitted on columns {:?}, featureset has {:?}",
            model.column_names, x.columns
        )));
    }

    let predict_x = x.reindex(predict_index);
    info!(n_rows = predict_x.nrows(), "Making predictions");
    let values = predict_rows(model, &predict_x)?;
    let mut preds = LabeledSeries::new("", predict_index.to_vec(), values)?;

    if let Some(prediction) = &config.prediction {
        ctx.set_column(&config.predictions_name, &preds)?;
        preds = build_target(prediction, ctx)?.reindex(predict_index);
    }
    preds.name = String::new();

    Ok(Prediction { preds, x, y })
}

/// Rows with any non-finite feature are not sent to the model; they
/// predict NaN.
fn predict_rows(model: &FittedModel, x: &FeatureMatrix) -> Result<Array1<f64>> {
    let complete: Vec<usize> = (0..x.nrows()).filter(|&i| x.row_is_finite(i)).collect();
    let mut out = Array1::from_elem(x.nrows(), f64::NAN);
    if complete.len() < x.nrows() {
        debug!(n_incomplete = x.nrows() - complete.len(), "Skipping rows with missing features");
    }
    if complete.is_empty() {
        return Ok(out);
    }

    let rows = x.values.select(Axis(0), &complete);
    let preds = model.predict(&rows)?;
    for (k, &i) in complete.iter().enumerate() {
        out[i] = preds[k];
    }
    Ok(out)
}

/// Result of [`cv`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvResult {
    /// Printed form of the evaluated configuration
    pub config: String,
    /// Per-metric fold scores, in configuration order
    pub scores: Vec<MetricScores>,
    /// Reporter table rendered after the last fold
    pub report: String,
}

impl CvResult {
    pub fn scores_for(&self, metric: &str) -> Option<&[f64]> {
        self.scores
            .iter()
            .find(|s| s.metric == metric)
            .map(|s| s.scores.as_slice())
    }
}

/// Cross-validate, writing the reporter table (and with `print_results`
/// the configuration and score summaries) to stdout.
pub fn cv(
    config: &mut ModelConfig,
    ctx: &DataContext,
    folds: impl Into<Folds>,
    repeat: usize,
    print_results: bool,
) -> Result<CvResult> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    cv_to(config, ctx, folds, repeat, print_results, &mut out)
}

/// [`cv`] with an explicit output
pub fn cv_to(
    config: &mut ModelConfig,
    ctx: &DataContext,
    folds: impl Into<Folds>,
    repeat: usize,
    print_results: bool,
    out: &mut dyn Write,
) -> Result<CvResult> {
    let folds = match folds.into() {
        Folds::Count(n) => make_folds(&ctx.index, n, repeat, None)?,
        Folds::Custom(mut generator) => {
            generator.set_context(config, ctx)?;
            generator.folds()?
        }
    };
    if folds.is_empty() {
        return Err(RampError::ValidationError("no folds to evaluate".to_string()));
    }

    let repeat = repeat.max(1);
    let k = (folds.len() / repeat).max(1);

    // one score list per metric name
    let mut metrics = config.metrics.clone();
    let mut seen = HashSet::new();
    metrics.retain(|m| seen.insert(m.name()));
    let mut scores: Vec<MetricScores> = metrics.iter().map(|m| MetricScores::new(m.name())).collect();

    // folds overwrite the train/test labels, so work on a copy
    let mut fold_ctx = ctx.copy();

    for (i, fold) in folds.into_iter().enumerate() {
        info!(
            "Cross-Validation fold {}/{} round {}/{}",
            i % k + 1,
            k,
            i / k + 1,
            repeat
        );

        fold_ctx.train_index = fold.train;
        fold_ctx.test_index = Some(fold.test.clone());

        let Prediction { preds, x, y } = predict(config, &mut fold_ctx, &fold.test, true)?;
        let actuals = y.ok_or(RampError::MissingTarget)?.reindex(&fold.test);

        config.update_reporters_with_predictions(&fold_ctx, &x, &actuals, &preds);
        for (metric, entry) in metrics.iter().zip(scores.iter_mut()) {
            entry.scores.push(metric.score(&actuals, &preds));
        }
    }

    let report = render_report_table(config.reporters.iter().map(|r| (r.name(), r.report())));
    for reporter in &mut config.reporters {
        reporter.reset();
    }
    out.write_all(report.as_bytes())?;

    if print_results {
        writeln!(out, "\n{}", config)?;
        write_scores(&scores, out)?;
    }

    Ok(CvResult {
        config: config.to_string(),
        scores,
        report,
    })
}
