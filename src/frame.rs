//! Label-indexed numeric containers
//!
//! Features, targets and predictions travel between stages keyed by row
//! label rather than by position, so that a matrix built over the whole
//! context can be narrowed to the rows of a training or test fold.

use crate::error::{RampError, Result};
use ndarray::{Array1, Array2, Axis};
use std::collections::{HashMap, HashSet};

/// Ordered row labels
pub type RowIndex = Vec<usize>;

/// Labels present in both `a` and `b`, in the order of `a`
pub fn intersect(a: &[usize], b: &[usize]) -> RowIndex {
    let lookup: HashSet<usize> = b.iter().copied().collect();
    a.iter().copied().filter(|label| lookup.contains(label)).collect()
}

fn positions(index: &[usize]) -> HashMap<usize, usize> {
    index.iter().enumerate().map(|(pos, &label)| (label, pos)).collect()
}

/// A named column of values keyed by row label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSeries {
    pub name: String,
    pub index: RowIndex,
    pub values: Array1<f64>,
}

impl LabeledSeries {
    pub fn new(name: impl Into<String>, index: RowIndex, values: Array1<f64>) -> Result<Self> {
        if index.len() != values.len() {
            return Err(RampError::ShapeError {
                expected: format!("{} values", index.len()),
                actual: format!("{} values", values.len()),
            });
        }
        Ok(Self {
            name: name.into(),
            index,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value for a label, if present
    pub fn get(&self, label: usize) -> Option<f64> {
        self.index.iter().position(|&l| l == label).map(|pos| self.values[pos])
    }

    /// Conform to `labels`. Labels not present in the series become NaN.
    pub fn reindex(&self, labels: &[usize]) -> LabeledSeries {
        let lookup = positions(&self.index);
        let values: Array1<f64> = labels
            .iter()
            .map(|label| lookup.get(label).map_or(f64::NAN, |&pos| self.values[pos]))
            .collect();

        LabeledSeries {
            name: self.name.clone(),
            index: labels.to_vec(),
            values,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A matrix of feature columns keyed by row label
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub index: RowIndex,
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(index: RowIndex, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != index.len() || values.ncols() != columns.len() {
            return Err(RampError::ShapeError {
                expected: format!("{} x {}", index.len(), columns.len()),
                actual: format!("{} x {}", values.nrows(), values.ncols()),
            });
        }
        Ok(Self { index, columns, values })
    }

    /// Assemble a matrix from series sharing one index
    pub fn from_series(index: RowIndex, series: &[LabeledSeries]) -> Result<Self> {
        let mut values = Array2::from_elem((index.len(), series.len()), f64::NAN);
        for (j, s) in series.iter().enumerate() {
            let aligned = if s.index == index { s.clone() } else { s.reindex(&index) };
            values.column_mut(j).assign(&aligned.values);
        }
        let columns = series.iter().map(|s| s.name.clone()).collect();
        Self::new(index, columns, values)
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Conform rows to `labels`; unknown labels produce a row of NaN.
    pub fn reindex(&self, labels: &[usize]) -> FeatureMatrix {
        let lookup = positions(&self.index);
        let mut values = Array2::from_elem((labels.len(), self.ncols()), f64::NAN);
        for (i, label) in labels.iter().enumerate() {
            if let Some(&pos) = lookup.get(label) {
                values.row_mut(i).assign(&self.values.row(pos));
            }
        }

        FeatureMatrix {
            index: labels.to_vec(),
            columns: self.columns.clone(),
            values,
        }
    }

    /// Keep only the named columns, in the order given
    pub fn select(&self, columns: &[String]) -> Result<FeatureMatrix> {
        let picks = columns
            .iter()
            .map(|name| {
                self.columns
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| RampError::FeatureNotFound(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FeatureMatrix {
            index: self.index.clone(),
            columns: columns.to_vec(),
            values: self.values.select(Axis(1), &picks),
        })
    }

    /// Named column as a series
    pub fn column(&self, name: &str) -> Result<LabeledSeries> {
        let j = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| RampError::FeatureNotFound(name.to_string()))?;
        LabeledSeries::new(name, self.index.clone(), self.values.column(j).to_owned())
    }

    /// Whether every value in row `i` is finite
    pub fn row_is_finite(&self, i: usize) -> bool {
        self.values.row(i).iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_series_reindex_fills_missing() {
        let s = LabeledSeries::new("y", vec![10, 11, 12], array![1.0, 2.0, 3.0]).unwrap();
        let r = s.reindex(&[12, 99, 10]);
        assert_eq!(r.index, vec![12, 99, 10]);
        assert_eq!(r.values[0], 3.0);
        assert!(r.values[1].is_nan());
        assert_eq!(r.values[2], 1.0);
    }

    #[test]
    fn test_matrix_reindex_and_select() {
        let m = FeatureMatrix::new(
            vec![0, 1, 2],
            vec!["a".into(), "b".into()],
            array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]],
        )
        .unwrap();

        let r = m.reindex(&[2, 5]);
        assert_eq!(r.values.row(0).to_vec(), vec![3.0, 30.0]);
        assert!(!r.row_is_finite(1));

        let b = m.select(&["b".to_string()]).unwrap();
        assert_eq!(b.columns, vec!["b".to_string()]);
        assert_eq!(b.values.column(0).to_vec(), vec![10.0, 20.0, 30.0]);

        let err = m.select(&["zzz".to_string()]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_intersect_keeps_order() {
        assert_eq!(intersect(&[5, 3, 1], &[1, 5]), vec![5, 1]);
        assert!(intersect(&[1, 2], &[3]).is_empty());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        assert!(LabeledSeries::new("y", vec![0, 1], array![1.0]).is_err());
    }
}
