//! Online resolution: select, check out, record

use crate::cache::{
    CacheKey, CacheLayout, KeyGuard, KeyedLocks, PersistentMetadataCache, ProcessLock,
    VersionSelectionCache, WorkingDir,
};
use crate::error::{VcsError, VcsResult};
use crate::repository::{ModuleSelector, RepositorySpec};
use crate::resolver::WorkingDirResolver;
use crate::vcs::VersionControlSystem;
use crate::version::{select_version, ResolvedVersion, VersionConstraint};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Resolver allowed to talk to version control systems
pub struct OnlineWorkingDirResolver {
    memory: Arc<VersionSelectionCache>,
    persistent: PersistentMetadataCache,
    locks: KeyedLocks<CacheKey>,
    /// Keys resolving to the same commit share a checkout directory
    checkouts: KeyedLocks<PathBuf>,
    cross_process_lock: bool,
}

/// Exclusive use of one checkout directory
struct CheckoutGuard {
    _process_lock: Option<ProcessLock>,
    _guard: KeyGuard,
}

impl OnlineWorkingDirResolver {
    pub fn new(
        memory: Arc<VersionSelectionCache>,
        persistent: PersistentMetadataCache,
        cross_process_lock: bool,
    ) -> Self {
        Self {
            memory,
            persistent,
            locks: KeyedLocks::new(),
            checkouts: KeyedLocks::new(),
            cross_process_lock,
        }
    }

    fn layout(&self) -> &CacheLayout {
        self.persistent.layout()
    }

    /// Wait until no other resolution is changing `working_dir`
    ///
    /// Always taken after the key lock, never the other way round.
    async fn lock_checkout(&self, working_dir: &Path) -> VcsResult<CheckoutGuard> {
        let guard = self.checkouts.lock(&working_dir.to_path_buf()).await;
        let process_lock = if self.cross_process_lock {
            let path = self.layout().checkout_lock_path(working_dir);
            Some(ProcessLock::acquire(&path).await?)
        } else {
            None
        };

        Ok(CheckoutGuard {
            _process_lock: process_lock,
            _guard: guard,
        })
    }

    /// Bring a recorded checkout up to date with the constraint
    async fn refresh(
        &self,
        key: &CacheKey,
        recorded: WorkingDir,
        vcs: &dyn VersionControlSystem,
    ) -> VcsResult<PathBuf> {
        let (spec, constraint) = (&key.spec, &key.constraint);

        let version = if constraint.is_mutable() {
            select_version(constraint, spec, vcs).await?
        } else {
            recorded.selected_version.clone()
        };

        if version.id != recorded.selected_version.id {
            info!(
                "{} moved from {} to {}",
                key, recorded.selected_version, version
            );
            let working_dir = self.materialize(spec, &version, vcs).await?;
            self.persistent.put(key, &working_dir, &version).await?;
            return Ok(working_dir);
        }

        {
            let _checkout = self.lock_checkout(&recorded.working_dir).await?;
            vcs.reset(&recorded.working_dir, &version, spec).await?;
        }
        if version.label != recorded.selected_version.label {
            self.persistent.put(key, &recorded.working_dir, &version).await?;
        } else {
            self.persistent.touch(key, &recorded.working_dir).await?;
        }
        Ok(recorded.working_dir)
    }

    /// Ensure the named directory for `version` holds that version
    async fn materialize(
        &self,
        spec: &RepositorySpec,
        version: &ResolvedVersion,
        vcs: &dyn VersionControlSystem,
    ) -> VcsResult<PathBuf> {
        let target = self.layout().working_dir(spec, version);
        let _checkout = self.lock_checkout(&target).await?;

        if fs::try_exists(&target).await.unwrap_or(false) {
            debug!("Reusing checkout {} for {}", target.display(), version);
            vcs.reset(&target, version, spec).await?;
            return Ok(target);
        }

        let repository_dir = self.layout().repository_dir(spec);
        fs::create_dir_all(&repository_dir).await.map_err(|e| {
            VcsError::io(format!("creating {}", repository_dir.display()), e)
        })?;

        let staging = StagingDir::new(self.layout().staging_dir(spec));
        vcs.checkout(spec, version, staging.path()).await?;

        let renamed = fs::rename(staging.path(), &target).await;
        match renamed {
            Ok(()) => staging.commit(),
            Err(e) if fs::try_exists(&target).await.unwrap_or(false) => {
                // Another process finished the same checkout first
                debug!("{} appeared during checkout: {}", target.display(), e);
                vcs.reset(&target, version, spec).await?;
            }
            Err(e) => {
                return Err(VcsError::io(
                    format!("moving checkout into {}", target.display()),
                    e,
                ))
            }
        }

        Ok(target)
    }
}

#[async_trait]
impl WorkingDirResolver for OnlineWorkingDirResolver {
    async fn select_version(
        &self,
        selector: &ModuleSelector,
        spec: &RepositorySpec,
        constraint: &VersionConstraint,
        vcs: &dyn VersionControlSystem,
    ) -> VcsResult<PathBuf> {
        let key = CacheKey::new(spec, constraint);

        if let Some(dir) = self.memory.get(&key) {
            debug!("{} already resolved for {}", key, selector);
            return Ok(spec.content_dir(&dir));
        }

        let _guard = self.locks.lock(&key).await;
        if let Some(dir) = self.memory.get(&key) {
            debug!("{} resolved while waiting", key);
            return Ok(spec.content_dir(&dir));
        }

        let _process_lock = if self.cross_process_lock {
            Some(ProcessLock::acquire(&self.layout().lock_path(&key)).await?)
        } else {
            None
        };

        let working_dir = match self.persistent.get(&key).await {
            Some(recorded) => {
                debug!("{} recorded at {}", key, recorded.working_dir.display());
                self.refresh(&key, recorded, vcs).await?
            }
            None => {
                let version = select_version(constraint, spec, vcs).await?;
                let working_dir = self.materialize(spec, &version, vcs).await?;
                self.persistent.put(&key, &working_dir, &version).await?;
                working_dir
            }
        };

        info!(
            "Resolved {} for {} to {}",
            key,
            selector,
            working_dir.display()
        );
        self.memory.put(&key, working_dir.clone());
        Ok(spec.content_dir(&working_dir))
    }
}

/// Checkout destination removed on drop unless committed
struct StagingDir {
    path: PathBuf,
    committed: bool,
}

impl StagingDir {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_staging(&path));
            }
            Err(_) => remove_staging(&path),
        }
    }
}

/// Attempts at removing an abandoned staging dir before leaving it to GC
const STAGING_REMOVE_ATTEMPTS: u32 = 3;

/// Remove a staging dir, retrying while a killed git process may still be
/// flushing files into it
fn remove_staging(path: &Path) {
    for attempt in 1..=STAGING_REMOVE_ATTEMPTS {
        match std::fs::remove_dir_all(path) {
            Ok(()) => {
                debug!("Removed staging dir {}", path.display());
                return;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) if attempt == STAGING_REMOVE_ATTEMPTS => {
                warn!("Failed to remove staging dir {}: {}", path.display(), e);
            }
            Err(_) => std::thread::sleep(std::time::Duration::from_millis(100 * u64::from(attempt))),
        }
    }
}
