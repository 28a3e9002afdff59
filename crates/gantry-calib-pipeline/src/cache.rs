//! Persistence of fitted parameter vectors between runs.
//!
//! Steps consult the cache before optimizing and store their result after.
//! A missing entry is not an error; a present but unreadable one is.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gantry_calib_core::Real;
use log::debug;

/// Key/value store of parameter vectors.
pub trait ParamCache {
    /// Stored vector for `key`, if any.
    fn lookup(&self, key: &str) -> Result<Option<Vec<Real>>>;

    fn store(&mut self, key: &str, values: &[Real]) -> Result<()>;

    /// Drop `key`. Returns whether an entry existed.
    fn remove(&mut self, key: &str) -> Result<bool>;
}

/// One JSON array file per key, under a root directory.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    root: PathBuf,
}

impl JsonFileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ParamCache for JsonFileCache {
    fn lookup(&self, key: &str) -> Result<Option<Vec<Real>>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read cached parameters {}", path.display()))?;
        let values = serde_json::from_str(&text)
            .with_context(|| format!("invalid cached parameters {}", path.display()))?;
        debug!("loaded cached parameters from {}", path.display());
        Ok(Some(values))
    }

    fn store(&mut self, key: &str, values: &[Real]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, serde_json::to_string_pretty(values)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!("stored parameters in {}", path.display());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
        Ok(true)
    }
}

/// In-memory cache, mostly for tests and one-shot runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: HashMap<String, Vec<Real>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ParamCache for MemoryCache {
    fn lookup(&self, key: &str) -> Result<Option<Vec<Real>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn store(&mut self, key: &str, values: &[Real]) -> Result<()> {
        self.entries.insert(key.to_string(), values.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}
