//! Persistent metadata cache
//!
//! One JSON file per cache key under `metadata/entries/`. Writes go to a
//! temporary file in the same directory and are renamed into place, so a
//! concurrent reader in another process sees either the old entry or the
//! new one, never a torn file. Reads never create files, so the cache can
//! be consulted from a read-only location.

use crate::cache::naming::CacheLayout;
use crate::cache::CacheKey;
use crate::error::{VcsError, VcsResult};
use crate::repository::RepositorySpec;
use crate::version::{ResolvedVersion, VersionConstraint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// A recorded resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub repository: RepositorySpec,
    pub constraint: VersionConstraint,
    pub working_dir: PathBuf,
    pub selected_version: ResolvedVersion,
    /// Refreshed whenever the working directory is reused
    pub last_used: DateTime<Utc>,
}

impl CacheEntry {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.repository, &self.constraint)
    }
}

/// A reusable working directory and the version checked out in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDir {
    pub working_dir: PathBuf,
    pub selected_version: ResolvedVersion,
}

/// Disk-backed cache surviving across builds
#[derive(Debug, Clone)]
pub struct PersistentMetadataCache {
    layout: CacheLayout,
}

impl PersistentMetadataCache {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Working directory recorded for `key`
    ///
    /// Missing, unreadable or corrupt entries are misses, as are entries whose
    /// directory has since been removed.
    pub async fn get(&self, key: &CacheKey) -> Option<WorkingDir> {
        let path = self.layout.entry_path(key);
        let entry = read_entry(&path).await?;

        if entry.repository != key.spec || entry.constraint != key.constraint {
            warn!("Ignoring cache entry {} recorded for another key", path.display());
            return None;
        }

        if !fs::try_exists(&entry.working_dir).await.unwrap_or(false) {
            debug!(
                "Cached working directory {} no longer exists",
                entry.working_dir.display()
            );
            return None;
        }

        Some(WorkingDir {
            working_dir: entry.working_dir,
            selected_version: entry.selected_version,
        })
    }

    /// Record the working directory and version for `key`
    pub async fn put(
        &self,
        key: &CacheKey,
        working_dir: &Path,
        version: &ResolvedVersion,
    ) -> VcsResult<()> {
        let entry = CacheEntry {
            repository: key.spec.clone(),
            constraint: key.constraint.clone(),
            working_dir: working_dir.to_path_buf(),
            selected_version: version.clone(),
            last_used: Utc::now(),
        };

        write_entry(&self.layout.entry_path(key), &entry).await?;
        debug!("Recorded {} -> {} ({})", key, working_dir.display(), version);
        Ok(())
    }

    /// Mark the entry for `key` as used now, if it still records `working_dir`
    ///
    /// Only the caller's own entry is rewritten, so the caller must hold the
    /// lock for `key`. An entry that has since moved to another directory is
    /// left alone. Returns whether an entry was refreshed.
    pub async fn touch(&self, key: &CacheKey, working_dir: &Path) -> VcsResult<bool> {
        let path = self.layout.entry_path(key);
        let Some(mut entry) = read_entry(&path).await else {
            return Ok(false);
        };

        if entry.key() != *key || entry.working_dir != working_dir {
            debug!("Not touching {}: entry now records another directory", key);
            return Ok(false);
        }

        entry.last_used = Utc::now();
        write_entry(&path, &entry).await?;
        debug!("Touched {} at {}", key, working_dir.display());
        Ok(true)
    }

    /// Every readable entry
    pub async fn entries(&self) -> VcsResult<Vec<CacheEntry>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect())
    }

    /// Delete the entry for `key`, returning whether one existed
    pub async fn remove(&self, key: &CacheKey) -> VcsResult<bool> {
        let path = self.layout.entry_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(VcsError::io(
                format!("removing cache entry {}", path.display()),
                e,
            )),
        }
    }

    async fn read_all(&self) -> VcsResult<Vec<(PathBuf, CacheEntry)>> {
        let dir = self.layout.entries_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(VcsError::io("reading cache entries directory", e)),
        };

        let mut found = vec![];
        while let Some(item) = entries
            .next_entry()
            .await
            .map_err(|e| VcsError::io("reading cache entry", e))?
        {
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(entry) = read_entry(&path).await {
                    found.push((path, entry));
                }
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }
}

async fn read_entry(path: &Path) -> Option<CacheEntry> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Cannot read cache entry {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
            None
        }
    }
}

/// Atomic single-entry upsert: write a sibling temp file, then rename over
async fn write_entry(path: &Path, entry: &CacheEntry) -> VcsResult<()> {
    let write_err = |source| VcsError::CacheWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .ok_or_else(|| VcsError::Internal(format!("entry path {} has no parent", path.display())))?;
    fs::create_dir_all(dir).await.map_err(write_err)?;

    let content = serde_json::to_string_pretty(entry)?;
    let temp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
    fs::write(&temp, content).await.map_err(write_err)?;

    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(write_err(e));
    }

    Ok(())
}
