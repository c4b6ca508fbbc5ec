//! Cross-validation fold generation
//!
//! Folds are expressed in row labels. Splitting happens on positions
//! `0..n` and positions are then mapped back to the context's labels.

use crate::config::ModelConfig;
use crate::context::DataContext;
use crate::error::{RampError, Result};
use crate::frame::{LabeledSeries, RowIndex};
use crate::training::engine::get_y;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub train: RowIndex,
    pub test: RowIndex,
}

/// Source of folds that may need to look at the data before splitting
pub trait FoldGenerator: Send {
    /// Inspect the configuration and context the folds will be used with
    fn set_context(&mut self, config: &ModelConfig, ctx: &DataContext) -> Result<()>;

    /// Produce the folds, in evaluation order
    fn folds(&self) -> Result<Vec<Fold>>;
}

/// How `cv` obtains its folds
pub enum Folds {
    /// Shuffled K-fold with this many folds per repetition
    Count(usize),
    /// Caller-provided generator
    Custom(Box<dyn FoldGenerator>),
}

impl From<usize> for Folds {
    fn from(n: usize) -> Self {
        Folds::Count(n)
    }
}

impl From<CrossValidator> for Folds {
    fn from(cv: CrossValidator) -> Self {
        Folds::Custom(Box::new(cv))
    }
}

/// Shuffled K-fold over `index`, repeated `repeat` times with a fresh
/// shuffle each time. Yields `n_folds * repeat` folds.
pub fn make_folds(
    index: &[usize],
    n_folds: usize,
    repeat: usize,
    seed: Option<u64>,
) -> Result<Vec<Fold>> {
    if repeat == 0 {
        return Err(RampError::ValidationError("repeat must be at least 1".to_string()));
    }
    let splitter = CrossValidator::new(CVStrategy::RepeatedKFold {
        n_splits: n_folds,
        n_repeats: repeat,
    });
    let splitter = match seed {
        Some(s) => splitter.with_random_state(s),
        None => splitter,
    };
    splitter.split_labels(index, None, None)
}

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution of the target)
    StratifiedKFold { n_splits: usize, shuffle: bool },
    /// Expanding-window split that respects row order
    TimeSeriesSplit {
        n_splits: usize,
        max_train_size: Option<usize>,
    },
    /// Leave-one-out cross-validation
    LeaveOneOut,
    /// Group K-Fold; rows sharing a value of `column` stay together
    GroupKFold { n_splits: usize, column: String },
    /// Repeated shuffled K-Fold
    RepeatedKFold { n_splits: usize, n_repeats: usize },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold {
            n_splits: 5,
            shuffle: true,
        }
    }
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
    labels: Option<RowIndex>,
    target: Option<LabeledSeries>,
    groups: Option<LabeledSeries>,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
            labels: None,
            target: None,
            groups: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    /// Split `labels`. Stratified folds need `target`, group folds `groups`,
    /// both aligned with `labels`.
    pub fn split_labels(
        &self,
        labels: &[usize],
        target: Option<&LabeledSeries>,
        groups: Option<&LabeledSeries>,
    ) -> Result<Vec<Fold>> {
        let n = labels.len();
        let positions = match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                self.k_fold_split(n, *n_splits, *shuffle, self.random_state)?
            }
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = target.ok_or_else(|| {
                    RampError::ValidationError("StratifiedKFold requires a target".to_string())
                })?;
                self.stratified_k_fold_split(&y.reindex(labels).values.to_vec(), *n_splits, *shuffle)?
            }
            CVStrategy::TimeSeriesSplit {
                n_splits,
                max_train_size,
            } => self.time_series_split(n, *n_splits, *max_train_size)?,
            CVStrategy::LeaveOneOut => self.leave_one_out_split(n)?,
            CVStrategy::GroupKFold { n_splits, column } => {
                let g = groups.ok_or_else(|| {
                    RampError::ValidationError(format!("GroupKFold requires group column '{}'", column))
                })?;
                self.group_k_fold_split(&g.reindex(labels).values.to_vec(), *n_splits)?
            }
            CVStrategy::RepeatedKFold {
                n_splits,
                n_repeats,
            } => self.repeated_k_fold_split(n, *n_splits, *n_repeats)?,
        };

        Ok(positions
            .into_iter()
            .map(|(train, test)| Fold {
                train: train.into_iter().map(|p| labels[p]).collect(),
                test: test.into_iter().map(|p| labels[p]).collect(),
            })
            .collect())
    }

    fn rng(seed: Option<u64>) -> ChaCha8Rng {
        match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn k_fold_split(
        &self,
        n_samples: usize,
        n_splits: usize,
        shuffle: bool,
        seed: Option<u64>,
    ) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if n_splits < 2 {
            return Err(RampError::ValidationError("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(RampError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut Self::rng(seed));
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test = indices[current..current + fold_size].to_vec();
            let train = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();
            splits.push((train, test));
            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold_split(
        &self,
        y: &[f64],
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if n_splits < 2 {
            return Err(RampError::ValidationError("n_splits must be at least 2".to_string()));
        }

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            if !val.is_finite() {
                return Err(RampError::ValidationError(format!(
                    "StratifiedKFold target missing at position {}",
                    idx
                )));
            }
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if shuffle {
            let mut rng = Self::rng(self.random_state);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal each class round-robin, continuing where the previous class stopped
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }

        Ok(Self::folds_to_splits(&folds))
    }

    fn time_series_split(
        &self,
        n_samples: usize,
        n_splits: usize,
        max_train_size: Option<usize>,
    ) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if n_splits < 2 {
            return Err(RampError::ValidationError("n_splits must be at least 2".to_string()));
        }
        let test_size = n_samples / (n_splits + 1);
        if test_size == 0 {
            return Err(RampError::ValidationError(format!(
                "too few samples ({}) for {} time series splits",
                n_samples, n_splits
            )));
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let test_start = (fold_idx + 1) * test_size;
                let test_end = if fold_idx + 1 == n_splits {
                    n_samples
                } else {
                    test_start + test_size
                };
                let train_start = max_train_size.map_or(0, |max| test_start.saturating_sub(max));
                ((train_start..test_start).collect(), (test_start..test_end).collect())
            })
            .collect();

        Ok(splits)
    }

    fn leave_one_out_split(&self, n_samples: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if n_samples < 2 {
            return Err(RampError::ValidationError(
                "LeaveOneOut needs at least 2 samples".to_string(),
            ));
        }
        Ok((0..n_samples)
            .map(|i| ((0..n_samples).filter(|&j| j != i).collect(), vec![i]))
            .collect())
    }

    fn group_k_fold_split(
        &self,
        groups: &[f64],
        n_splits: usize,
    ) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if n_splits < 2 {
            return Err(RampError::ValidationError("n_splits must be at least 2".to_string()));
        }

        // NaN groups are keyed by their bit pattern so they form one group
        let keys: Vec<u64> = groups.iter().map(|g| g.to_bits()).collect();
        let mut unique: Vec<u64> = keys.clone();
        unique.sort_unstable();
        unique.dedup();

        if unique.len() < n_splits {
            return Err(RampError::ValidationError(format!(
                "Number of groups ({}) must be >= n_splits ({})",
                unique.len(),
                n_splits
            )));
        }

        let group_to_fold: BTreeMap<u64, usize> = unique
            .iter()
            .enumerate()
            .map(|(i, &g)| (g, i % n_splits))
            .collect();

        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        for (i, key) in keys.iter().enumerate() {
            folds[group_to_fold[key]].push(i);
        }

        Ok(Self::folds_to_splits(&folds))
    }

    fn repeated_k_fold_split(
        &self,
        n_samples: usize,
        n_splits: usize,
        n_repeats: usize,
    ) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        let mut all = Vec::with_capacity(n_splits * n_repeats);
        for repeat in 0..n_repeats {
            let seed = self.random_state.map(|s| s.wrapping_add(repeat as u64));
            all.extend(self.k_fold_split(n_samples, n_splits, true, seed)?);
        }
        Ok(all)
    }

    fn folds_to_splits(folds: &[Vec<usize>]) -> Vec<(Vec<usize>, Vec<usize>)> {
        (0..folds.len())
            .map(|fold_idx| {
                let mut train: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train.sort_unstable();
                let mut test = folds[fold_idx].clone();
                test.sort_unstable();
                (train, test)
            })
            .collect()
    }
}

impl FoldGenerator for CrossValidator {
    fn set_context(&mut self, config: &ModelConfig, ctx: &DataContext) -> Result<()> {
        self.labels = Some(ctx.index.clone());
        match &self.strategy {
            CVStrategy::StratifiedKFold { .. } => {
                self.target = Some(get_y(config, ctx)?);
            }
            CVStrategy::GroupKFold { column, .. } => {
                self.groups = Some(ctx.column_values(column)?);
            }
            _ => {}
        }
        Ok(())
    }

    fn folds(&self) -> Result<Vec<Fold>> {
        let labels = self.labels.as_ref().ok_or_else(|| {
            RampError::ValidationError("fold generator used before set_context".to_string())
        })?;
        self.split_labels(labels, self.target.as_ref(), self.groups.as_ref())
    }
}
