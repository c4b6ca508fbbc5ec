//! ramp - declarative feature engineering and model evaluation
//!
//! A model is described by a [`config::ModelConfig`]: an estimator, the
//! features it consumes, the target, and how it is scored. Configurations
//! are evaluated against a [`context::DataContext`], which couples a polars
//! DataFrame with the row labels used for training and testing and a
//! [`store::ModelStore`] that caches fitted models.
//!
//! # Modules
//!
//! - [`frame`] - Label-indexed series and feature matrices
//! - [`context`] - Data plus train/test row bookkeeping
//! - [`features`] - Declarative feature definitions
//! - [`config`] - Model configuration
//! - [`training`] - Estimators, folds, metrics and the fit/predict/cv workflow
//! - [`reporters`] - Observers summarizing models and predictions
//! - [`store`] - In-memory and on-disk fitted model stores
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod frame;
pub mod context;
pub mod features;

// Modelling
pub mod config;
pub mod training;
pub mod reporters;
pub mod store;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{RampError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{RampError, Result};

    // Data
    pub use crate::context::DataContext;
    pub use crate::features::{build_featureset, build_target, Feature, PrepData};
    pub use crate::frame::{FeatureMatrix, LabeledSeries, RowIndex};

    // Modelling
    pub use crate::config::ModelConfig;
    pub use crate::reporters::{Reporter, ReporterKind};
    pub use crate::store::{DiskStore, MemoryStore, ModelStore};
    pub use crate::training::{
        cv, cv_to, fit, get_key, get_x, get_xy, get_y, make_folds, predict, CVStrategy,
        CrossValidator, CvResult, FittedModel, FoldGenerator, Folds, Metric, ModelSpec,
        Prediction,
    };
}
