//! Data context
//!
//! A context couples a DataFrame with the row labels used for training and
//! evaluation, plus the store that caches fitted models.

use crate::error::{RampError, Result};
use crate::frame::{intersect, LabeledSeries, RowIndex};
use crate::store::ModelStore;
use polars::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Data plus row bookkeeping for one modelling run
#[derive(Clone)]
pub struct DataContext {
    /// Source data
    pub data: DataFrame,
    /// Row labels, parallel to `data` rows
    pub index: RowIndex,
    /// Labels the model is fitted on
    pub train_index: RowIndex,
    /// Labels held out for evaluation, if any
    pub test_index: Option<RowIndex>,
    /// Fitted model cache
    pub store: Arc<dyn ModelStore>,
}

impl fmt::Debug for DataContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataContext")
            .field("shape", &self.data.shape())
            .field("n_train", &self.train_index.len())
            .field("n_test", &self.test_index.as_ref().map(|t| t.len()))
            .finish()
    }
}

impl DataContext {
    /// Create a context over `data`. Rows are labelled `0..height` and all
    /// rows are used for training.
    pub fn new(data: DataFrame, store: Arc<dyn ModelStore>) -> Self {
        let index: RowIndex = (0..data.height()).collect();
        Self {
            data,
            train_index: index.clone(),
            index,
            test_index: None,
            store,
        }
    }

    /// Relabel rows. Resets the training rows to all rows.
    pub fn with_index(mut self, index: RowIndex) -> Result<Self> {
        if index.len() != self.data.height() {
            return Err(RampError::ShapeError {
                expected: format!("{} labels", self.data.height()),
                actual: format!("{} labels", index.len()),
            });
        }
        self.train_index = index.clone();
        self.index = index;
        Ok(self)
    }

    pub fn with_train_index(mut self, train_index: RowIndex) -> Self {
        self.train_index = train_index;
        self
    }

    pub fn with_test_index(mut self, test_index: RowIndex) -> Self {
        self.test_index = Some(test_index);
        self
    }

    /// Independent copy sharing the same store
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Training labels that are present in this context's data
    pub fn train_rows(&self) -> RowIndex {
        intersect(&self.train_index, &self.index)
    }

    /// Copy restricted to the rows with the given labels, in that order.
    /// Labels not present in the data are skipped.
    pub fn subset(&self, labels: &[usize]) -> Result<Self> {
        let lookup: HashMap<usize, usize> = self
            .index
            .iter()
            .enumerate()
            .map(|(pos, &label)| (label, pos))
            .collect();

        let (kept, rows): (Vec<usize>, Vec<IdxSize>) = labels
            .iter()
            .filter_map(|label| lookup.get(label).map(|&pos| (*label, pos as IdxSize)))
            .unzip();

        let take = IdxCa::from_vec("rows".into(), rows);
        let data = self.data.take(&take)?;

        Ok(Self {
            data,
            index: kept,
            train_index: self.train_index.clone(),
            test_index: self.test_index.clone(),
            store: Arc::clone(&self.store),
        })
    }

    /// A numeric column as a labelled series. Nulls become NaN.
    pub fn column_values(&self, name: &str) -> Result<LabeledSeries> {
        let column = self
            .data
            .column(name)
            .map_err(|_| RampError::FeatureNotFound(name.to_string()))?;
        let series = column
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|e| RampError::DataError(format!("column '{}': {}", name, e)))?;
        let values = series
            .f64()
            .map_err(|e| RampError::DataError(e.to_string()))?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();

        LabeledSeries::new(name, self.index.clone(), values)
    }

    /// Write `series` into the data as column `name`, aligned by label.
    /// Rows without a value receive NaN.
    pub fn set_column(&mut self, name: &str, series: &LabeledSeries) -> Result<()> {
        let aligned = series.reindex(&self.index);
        let column = Series::new(name.into(), aligned.values.to_vec());
        self.data.with_column(column)?;
        Ok(())
    }

    /// Fingerprint of the data and training rows, used in model cache keys.
    pub fn create_key(&self) -> Result<String> {
        let mut hasher = Sha256::new();

        for column in self.data.get_columns() {
            hasher.update(column.name().as_str().as_bytes());
            hasher.update(column.dtype().to_string().as_bytes());

            let as_text = column
                .as_materialized_series()
                .cast(&DataType::String)
                .map_err(|e| RampError::DataError(e.to_string()))?;
            for value in as_text.str().map_err(|e| RampError::DataError(e.to_string()))? {
                match value {
                    Some(v) => hasher.update(v.as_bytes()),
                    None => hasher.update([0xff]),
                }
                hasher.update([0x1f]);
            }
        }

        hasher.update(b"index");
        for label in &self.index {
            hasher.update(label.to_le_bytes());
        }
        hasher.update(b"train");
        for label in &self.train_index {
            hasher.update(label.to_le_bytes());
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}
