//! Reporters
//!
//! Reporters observe each fitted model and each batch of predictions made
//! during cross-validation, then summarize what they saw.

use crate::context::DataContext;
use crate::frame::{FeatureMatrix, LabeledSeries};
use crate::training::{FittedModel, ScoreSummary};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Observer of fitted models and predictions
pub trait Reporter: Send + fmt::Debug {
    /// Name shown in the report table
    fn name(&self) -> &str;

    fn update_with_model(&mut self, _model: &FittedModel) {}

    fn update_with_predictions(
        &mut self,
        _ctx: &DataContext,
        _x: &FeatureMatrix,
        _actuals: &LabeledSeries,
        _preds: &LabeledSeries,
    ) {
    }

    /// Summary of everything observed since the last reset
    fn report(&self) -> String;

    fn reset(&mut self);
}

/// Built-in reporters selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReporterKind {
    ModelSummary,
    PredictionStats,
    ResidualStats,
}

impl ReporterKind {
    pub fn build(self) -> Box<dyn Reporter> {
        match self {
            ReporterKind::ModelSummary => Box::new(ModelSummary::default()),
            ReporterKind::PredictionStats => Box::new(PredictionStats::default()),
            ReporterKind::ResidualStats => Box::new(ResidualStats::default()),
        }
    }
}

pub(crate) fn deserialize_reporters<'de, D>(deserializer: D) -> Result<Vec<Box<dyn Reporter>>, D::Error>
where
    D: Deserializer<'de>,
{
    let kinds = Vec::<ReporterKind>::deserialize(deserializer)?;
    Ok(kinds.into_iter().map(ReporterKind::build).collect())
}

/// Describes the most recently fitted model
#[derive(Debug, Default)]
pub struct ModelSummary {
    fits: usize,
    last: Option<String>,
}

impl Reporter for ModelSummary {
    fn name(&self) -> &str {
        "ModelSummary"
    }

    fn update_with_model(&mut self, model: &FittedModel) {
        self.fits += 1;
        self.last = Some(model.describe());
    }

    fn report(&self) -> String {
        match &self.last {
            Some(description) => format!("models seen: {}\n{}", self.fits, description),
            None => "no model fitted".to_string(),
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Distribution of all predictions made
#[derive(Debug, Default)]
pub struct PredictionStats {
    values: Vec<f64>,
    missing: usize,
}

impl Reporter for PredictionStats {
    fn name(&self) -> &str {
        "PredictionStats"
    }

    fn update_with_predictions(
        &mut self,
        _ctx: &DataContext,
        _x: &FeatureMatrix,
        _actuals: &LabeledSeries,
        preds: &LabeledSeries,
    ) {
        for &p in preds.values.iter() {
            if p.is_finite() {
                self.values.push(p);
            } else {
                self.missing += 1;
            }
        }
    }

    fn report(&self) -> String {
        if self.values.is_empty() {
            return format!("no predictions (missing: {})", self.missing);
        }
        let s = ScoreSummary::from_scores(&self.values);
        format!(
            "n: {} (missing: {})\nmean: {:.4} std: {:.4}\nrange: [{:.4}, {:.4}]",
            s.n, self.missing, s.mean, s.std, s.min, s.max
        )
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Error distribution of predictions against actuals
#[derive(Debug, Default)]
pub struct ResidualStats {
    residuals: Vec<f64>,
}

impl Reporter for ResidualStats {
    fn name(&self) -> &str {
        "ResidualStats"
    }

    fn update_with_predictions(
        &mut self,
        _ctx: &DataContext,
        _x: &FeatureMatrix,
        actuals: &LabeledSeries,
        preds: &LabeledSeries,
    ) {
        let aligned = preds.reindex(&actuals.index);
        self.residuals.extend(
            actuals
                .values
                .iter()
                .zip(aligned.values.iter())
                .map(|(a, p)| a - p)
                .filter(|r| r.is_finite()),
        );
    }

    fn report(&self) -> String {
        if self.residuals.is_empty() {
            return "no residuals".to_string();
        }
        let n = self.residuals.len() as f64;
        let bias = self.residuals.iter().sum::<f64>() / n;
        let mae = self.residuals.iter().map(|r| r.abs()).sum::<f64>() / n;
        let worst = self.residuals.iter().map(|r| r.abs()).fold(0.0, f64::max);
        format!(
            "n: {}\nbias: {:.4} mae: {:.4}\nmax abs error: {:.4}",
            self.residuals.len(),
            bias,
            mae,
            worst
        )
    }

    fn reset(&mut self) {
        self.residuals.clear();
    }
}

/// Two-column "Reporter | Report" table with a rule between every row.
/// Multi-line reports span several table lines.
pub fn render_report_table<'a, I>(rows: I) -> String
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let header = ("Reporter".to_string(), "Report".to_string());
    let rows: Vec<(String, String)> = rows
        .into_iter()
        .map(|(name, report)| (name.to_string(), report))
        .collect();

    let width = |s: &str| s.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    let left = rows
        .iter()
        .map(|(n, _)| width(n))
        .chain(std::iter::once(width(&header.0)))
        .max()
        .unwrap_or(0);
    let right = rows
        .iter()
        .map(|(_, r)| width(r))
        .chain(std::iter::once(width(&header.1)))
        .max()
        .unwrap_or(0);

    let rule = format!("+{}+{}+\n", "-".repeat(left + 2), "-".repeat(right + 2));
    let mut out = rule.clone();

    for (name, report) in std::iter::once(&header).chain(rows.iter()) {
        let names: Vec<&str> = name.lines().collect();
        let reports: Vec<&str> = report.lines().collect();
        let height = names.len().max(reports.len()).max(1);
        for i in 0..height {
            let l = names.get(i).copied().unwrap_or("");
            let r = reports.get(i).copied().unwrap_or("");
            out.push_str(&format!(
                "| {}{} | {}{} |\n",
                l,
                " ".repeat(left - l.chars().count()),
                r,
                " ".repeat(right - r.chars().count())
            ));
        }
        out.push_str(&rule);
    }

    out
}
