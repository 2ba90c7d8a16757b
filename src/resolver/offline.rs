//! Offline resolution: reuse what earlier online runs recorded

use crate::cache::{CacheKey, KeyedLocks, PersistentMetadataCache, VersionSelectionCache};
use crate::error::{VcsError, VcsResult};
use crate::repository::{ModuleSelector, RepositorySpec};
use crate::resolver::WorkingDirResolver;
use crate::vcs::VersionControlSystem;
use crate::version::VersionConstraint;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolver that never contacts a version control system
///
/// Recorded checkouts are returned as they are on disk, without a reset.
/// A miss is an error and writes nothing.
pub struct OfflineWorkingDirResolver {
    memory: Arc<VersionSelectionCache>,
    persistent: PersistentMetadataCache,
    locks: KeyedLocks<CacheKey>,
}

impl OfflineWorkingDirResolver {
    pub fn new(memory: Arc<VersionSelectionCache>, persistent: PersistentMetadataCache) -> Self {
        Self {
            memory,
            persistent,
            locks: KeyedLocks::new(),
        }
    }
}

#[async_trait]
impl WorkingDirResolver for OfflineWorkingDirResolver {
    async fn select_version(
        &self,
        selector: &ModuleSelector,
        spec: &RepositorySpec,
        constraint: &VersionConstraint,
        _vcs: &dyn VersionControlSystem,
    ) -> VcsResult<PathBuf> {
        let key = CacheKey::new(spec, constraint);

        if let Some(dir) = self.memory.get(&key) {
            return Ok(spec.content_dir(&dir));
        }

        let _guard = self.locks.lock(&key).await;
        if let Some(dir) = self.memory.get(&key) {
            return Ok(spec.content_dir(&dir));
        }

        let Some(recorded) = self.persistent.get(&key).await else {
            debug!("No recorded checkout for {}", key);
            return Err(VcsError::OfflineResolution {
                selector: selector.display_name(),
                repository: spec.display_name(),
            });
        };

        // The cache may live on read-only storage
        if let Err(e) = self.persistent.touch(&key, &recorded.working_dir).await {
            warn!("Could not mark {} as used: {}", recorded.working_dir.display(), e);
        }

        info!(
            "Using {} ({}) offline for {}",
            recorded.working_dir.display(),
            recorded.selected_version,
            selector
        );
        self.memory.put(&key, recorded.working_dir.clone());
        Ok(spec.content_dir(&recorded.working_dir))
    }
}
