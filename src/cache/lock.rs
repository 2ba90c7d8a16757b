//! Per-key mutual exclusion
//!
//! [`KeyedLocks`] serializes resolutions of the same key within a process
//! while letting different keys proceed in parallel. [`ProcessLock`] does the
//! same across processes sharing a cache root, using an advisory file lock.

use crate::error::{VcsError, VcsResult};
use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, trace};

/// Map from key to a lock, created on first use and dropped once unused
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Weak<AsyncMutex<()>>>>,
}

/// Held while a key is being resolved; releases on drop
#[derive(Debug)]
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `key`
    ///
    /// Dropping the returned future before it completes gives up the wait
    /// without affecting other waiters.
    pub async fn lock(&self, key: &K) -> KeyGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| lock.strong_count() > 0);

            match locks.get(key).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let created = Arc::new(AsyncMutex::new(()));
                    locks.insert(key.clone(), Arc::downgrade(&created));
                    created
                }
            }
        };

        KeyGuard {
            _guard: mutex.lock_owned().await,
        }
    }

    /// Number of keys currently locked or waited on
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|lock| lock.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Advisory lock on a file, shared by every process using the same cache root
pub struct ProcessLock {
    path: PathBuf,
    _file: fslock::LockFile,
}

impl ProcessLock {
    /// Block until the lock file at `path` is held by this process
    ///
    /// The wait runs on the blocking pool. If the caller is cancelled, the
    /// lock is released as soon as the pending acquisition completes.
    pub async fn acquire(path: &Path) -> VcsResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| VcsError::CacheLock {
                    path: path.to_path_buf(),
                    source,
                })?;
        }

        let lock_path = path.to_path_buf();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<fslock::LockFile> {
            let mut file = fslock::LockFile::open(&lock_path)?;
            file.lock()?;
            Ok(file)
        })
        .await
        .map_err(|e| VcsError::Internal(format!("Lock task failed: {}", e)))?
        .map_err(|source| VcsError::CacheLock {
            path: path.to_path_buf(),
            source,
        })?;

        trace!("Acquired {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for ProcessLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessLock").field("path", &self.path).finish()
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        debug!("Released {}", self.path.display());
    }
}
