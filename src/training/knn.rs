//! K-Nearest Neighbors
//!
//! Classifier and regressor that keep the training rows and answer each
//! query from the `k` closest of them.

use crate::error::{RampError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// Stored training data shared by both KNN variants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Memory {
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Memory {
    fn store(&mut self, x: &Array2<f64>, y: &Array1<f64>, k: usize) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(RampError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if k == 0 {
            return Err(RampError::InvalidInput("n_neighbors must be at least 1".to_string()));
        }
        if x.nrows() == 0 {
            return Err(RampError::TrainingError("empty training set".to_string()));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Apply `reduce` to the neighbours of every query row, in parallel
    fn query<F>(&self, x: &Array2<f64>, k: usize, metric: DistanceMetric, reduce: F) -> Result<Array1<f64>>
    where
        F: Fn(&[(f64, f64)]) -> f64 + Sync,
    {
        let x_train = self.x_train.as_ref().ok_or(RampError::ModelNotFitted)?;
        let y_train = self.y_train.as_ref().ok_or(RampError::ModelNotFitted)?;
        if x.ncols() != x_train.ncols() {
            return Err(RampError::ShapeError {
                expected: format!("{} features", x_train.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k, metric);
                reduce(&neighbors)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }
}

/// K-Nearest Neighbors regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnRegressor {
    pub n_neighbors: usize,
    pub weights: WeightScheme,
    pub metric: DistanceMetric,
    memory: Memory,
}

impl KnnRegressor {
    pub fn with_k(k: usize) -> Self {
        Self {
            n_neighbors: k,
            weights: WeightScheme::default(),
            metric: DistanceMetric::default(),
            memory: Memory::default(),
        }
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.memory.store(x, y, self.n_neighbors)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.weights;
        self.memory
            .query(x, self.n_neighbors, self.metric, |n| weighted_mean(n, weights))
    }
}

/// K-Nearest Neighbors classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    pub n_neighbors: usize,
    pub weights: WeightScheme,
    pub metric: DistanceMetric,
    memory: Memory,
}

impl KnnClassifier {
    pub fn with_k(k: usize) -> Self {
        Self {
            n_neighbors: k,
            weights: WeightScheme::default(),
            metric: DistanceMetric::default(),
            memory: Memory::default(),
        }
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.memory.store(x, y, self.n_neighbors)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.weights;
        self.memory
            .query(x, self.n_neighbors, self.metric, |n| vote(n, weights))
    }
}

/// Max-heap entry keeping the k smallest distances
#[derive(PartialEq)]
struct DistLabel(f64, f64);

impl Eq for DistLabel {}

impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// (distance, label) of the k nearest training rows, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (i, row) in x_train.rows().into_iter().enumerate() {
        let dist = distance(point, row, metric);
        if heap.len() < k {
            heap.push(DistLabel(dist, y_train[i]));
        } else if let Some(top) = heap.peek() {
            if dist < top.0 {
                heap.pop();
                heap.push(DistLabel(dist, y_train[i]));
            }
        }
    }

    heap.into_iter().map(|dl| (dl.0, dl.1)).collect()
}

fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi) * (ai - bi))
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs()).sum(),
    }
}

fn weight_of(dist: f64, weights: WeightScheme) -> f64 {
    match weights {
        WeightScheme::Uniform => 1.0,
        WeightScheme::Distance => 1.0 / (dist + 1e-10),
    }
}

/// Weighted majority vote; ties go to the smallest label
fn vote(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let mut votes: BTreeMap<i64, f64> = BTreeMap::new();
    for &(dist, label) in neighbors {
        *votes.entry(label.round() as i64).or_insert(0.0) += weight_of(dist, weights);
    }

    let mut best: Option<(i64, f64)> = None;
    for (label, score) in votes {
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((label, score));
        }
    }
    best.map_or(f64::NAN, |(label, _)| label as f64)
}

fn weighted_mean(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let (sum, total) = neighbors.iter().fold((0.0, 0.0), |(s, t), &(dist, y)| {
        let w = weight_of(dist, weights);
        (s + w * y, t + w)
    });
    if total > 0.0 {
        sum / total
    } else {
        f64::NAN
    }
}
