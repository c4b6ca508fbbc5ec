//! Model stores
//!
//! Fitted models are cached under a key derived from the model
//! configuration and the data context. A store is a plain key/value map;
//! nothing is ever evicted or invalidated.

use crate::error::{RampError, Result};
use crate::training::FittedModel;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Storage backend for fitted models
pub trait ModelStore: Send + Sync {
    /// Load a model stored under `key`. `Ok(None)` on a miss.
    fn load(&self, key: &str) -> Result<Option<FittedModel>>;

    /// Store a model under `key`, replacing any previous entry.
    fn save(&self, key: &str, model: &FittedModel) -> Result<()>;

    /// Whether `key` is present
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.load(key)?.is_some())
    }
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    models: RwLock<HashMap<String, FittedModel>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}

impl ModelStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<FittedModel>> {
        Ok(self.models.read().get(key).cloned())
    }

    fn save(&self, key: &str, model: &FittedModel) -> Result<()> {
        self.models.write().insert(key.to_string(), model.clone());
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.models.read().contains_key(key))
    }
}

/// Local file system store, one JSON document per key
pub struct DiskStore {
    base_dir: PathBuf,
}

impl DiskStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|e| {
            RampError::StoreError(format!("Failed to create {}: {}", base_dir.display(), e))
        })?;
        Ok(Self { base_dir })
    }

    fn model_file(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.base_dir.join(format!("{:x}.json", digest))
    }
}

impl ModelStore for DiskStore {
    fn load(&self, key: &str) -> Result<Option<FittedModel>> {
        let path = self.model_file(key);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)?;
        let model: FittedModel = serde_json::from_str(&json)?;
        debug!(path = %path.display(), "Loaded model from disk");
        Ok(Some(model))
    }

    fn save(&self, key: &str, model: &FittedModel) -> Result<()> {
        let path = self.model_file(key);
        let json = serde_json::to_string(model)?;
        fs::write(&path, json).map_err(|e| {
            RampError::StoreError(format!("Failed to write {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Saved model to disk");
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.model_file(key).exists())
    }
}
