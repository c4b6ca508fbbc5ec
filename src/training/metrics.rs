//! Scoring metrics and score summaries

use crate::frame::LabeledSeries;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Metric comparing actual values with predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Mean Squared Error
    Mse,
    /// Root Mean Squared Error
    Rmse,
    /// Mean Absolute Error
    Mae,
    /// Coefficient of determination
    R2,
    /// Fraction of predictions within 0.5 of the actual label
    Accuracy,
    /// Binary cross-entropy; predictions are clipped probabilities
    LogLoss,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Mse => "mse",
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::R2 => "r2",
            Metric::Accuracy => "accuracy",
            Metric::LogLoss => "log_loss",
        }
    }

    /// Score predictions against actuals, matched by label. Pairs where
    /// either side is missing are skipped; NaN when nothing is left.
    pub fn score(&self, actuals: &LabeledSeries, preds: &LabeledSeries) -> f64 {
        let aligned = preds.reindex(&actuals.index);
        let pairs: Vec<(f64, f64)> = actuals
            .values
            .iter()
            .zip(aligned.values.iter())
            .filter(|(t, p)| t.is_finite() && p.is_finite())
            .map(|(&t, &p)| (t, p))
            .collect();

        if pairs.is_empty() {
            return f64::NAN;
        }
        let n = pairs.len() as f64;

        match self {
            Metric::Mse => pairs.iter().map(|(t, p)| (t - p).powi(2)).sum::<f64>() / n,
            Metric::Rmse => (pairs.iter().map(|(t, p)| (t - p).powi(2)).sum::<f64>() / n).sqrt(),
            Metric::Mae => pairs.iter().map(|(t, p)| (t - p).abs()).sum::<f64>() / n,
            Metric::R2 => {
                let mean = pairs.iter().map(|(t, _)| t).sum::<f64>() / n;
                let ss_tot: f64 = pairs.iter().map(|(t, _)| (t - mean).powi(2)).sum();
                let ss_res: f64 = pairs.iter().map(|(t, p)| (t - p).powi(2)).sum();
                if ss_tot > 0.0 {
                    1.0 - ss_res / ss_tot
                } else {
                    0.0
                }
            }
            Metric::Accuracy => {
                pairs.iter().filter(|(t, p)| (t - p).abs() < 0.5).count() as f64 / n
            }
            Metric::LogLoss => {
                let eps = 1e-15;
                -pairs
                    .iter()
                    .map(|(t, p)| {
                        let p = p.clamp(eps, 1.0 - eps);
                        t * p.ln() + (1.0 - t) * (1.0 - p).ln()
                    })
                    .sum::<f64>()
                    / n
            }
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scores collected for one metric across folds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScores {
    pub metric: String,
    pub scores: Vec<f64>,
}

impl MetricScores {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            scores: Vec::new(),
        }
    }

    pub fn summary(&self) -> ScoreSummary {
        ScoreSummary::from_scores(&self.scores)
    }
}

/// Mean, population standard deviation and range of a score list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl ScoreSummary {
    pub fn from_scores(scores: &[f64]) -> Self {
        let n = scores.len();
        if n == 0 {
            return Self {
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
                n,
            };
        }

        let mean = scores.iter().sum::<f64>() / n as f64;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
        // any NaN score makes min and max NaN
        let (min, max) = if scores.iter().any(|s| s.is_nan()) {
            (f64::NAN, f64::NAN)
        } else {
            (
                scores.iter().copied().fold(f64::INFINITY, f64::min),
                scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        Self {
            mean,
            std: variance.sqrt(),
            min,
            max,
            n,
        }
    }
}

impl fmt::Display for ScoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4} (+/- {:.4}) [{:.4},{:.4}]",
            self.mean, self.std, self.min, self.max
        )
    }
}

/// Render per-metric summaries, one block per metric
pub fn format_scores(scores: &[MetricScores]) -> String {
    let mut out = String::new();
    for entry in scores {
        out.push_str(&entry.metric);
        out.push('\n');
        out.push_str(&entry.summary().to_string());
        out.push_str("\n\n");
    }
    out
}

/// Write per-metric summaries to `out`
pub fn write_scores(scores: &[MetricScores], out: &mut dyn Write) -> std::io::Result<()> {
    out.write_all(format_scores(scores).as_bytes())
}

/// Print per-metric summaries to stdout
pub fn print_scores(scores: &[MetricScores]) {
    print!("{}", format_scores(scores));
}
