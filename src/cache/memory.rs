//! In-memory selection cache
//!
//! Remembers which working directory each key resolved to for the lifetime
//! of one resolver, so repeated requests skip the persistent cache and the
//! version control system entirely. Nothing is evicted and nothing is
//! written to disk.

use crate::cache::CacheKey;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Per-invocation map from cache key to working directory
#[derive(Debug, Default)]
pub struct VersionSelectionCache {
    selections: RwLock<HashMap<CacheKey, PathBuf>>,
}

impl VersionSelectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Working directory previously recorded for `key`
    pub fn get(&self, key: &CacheKey) -> Option<PathBuf> {
        self.selections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Record the working directory for `key`, replacing any previous one
    pub fn put(&self, key: &CacheKey, working_dir: PathBuf) {
        self.selections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), working_dir);
    }

    pub fn len(&self) -> usize {
        self.selections.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
