//! Resolver facade
//!
//! Owns the caches, picks the strategy for the configured mode and the
//! adapter for each repository's kind.

use crate::cache::{CacheLayout, PersistentMetadataCache, VersionSelectionCache};
use crate::config::Config;
use crate::error::VcsResult;
use crate::repository::{ModuleSelector, RepositorySpec};
use crate::resolver::{
    OfflineWorkingDirResolver, OnlineWorkingDirResolver, ResolutionMode, WorkingDirResolver,
};
use crate::vcs::VcsRegistry;
use crate::version::VersionConstraint;
use futures_util::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Tunables for the online strategy
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Serialize resolutions of one key across processes sharing the cache
    pub cross_process_lock: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            cross_process_lock: true,
        }
    }
}

impl ResolverOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cross_process_lock: config.resolution.cross_process_lock,
        }
    }
}

/// One dependency to resolve
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub selector: ModuleSelector,
    pub spec: RepositorySpec,
    pub constraint: VersionConstraint,
}

impl ResolveRequest {
    pub fn new(
        selector: ModuleSelector,
        spec: RepositorySpec,
        constraint: VersionConstraint,
    ) -> Self {
        Self {
            selector,
            spec,
            constraint,
        }
    }
}

/// Entry point for resolving repositories to working directories
pub struct VcsResolver {
    mode: ResolutionMode,
    registry: VcsRegistry,
    memory: Arc<VersionSelectionCache>,
    persistent: PersistentMetadataCache,
    strategy: Box<dyn WorkingDirResolver>,
}

impl VcsResolver {
    pub fn new(
        mode: ResolutionMode,
        layout: CacheLayout,
        registry: VcsRegistry,
        options: ResolverOptions,
    ) -> Self {
        let memory = Arc::new(VersionSelectionCache::new());
        let persistent = PersistentMetadataCache::new(layout);

        let strategy: Box<dyn WorkingDirResolver> = match mode {
            ResolutionMode::Online => Box::new(OnlineWorkingDirResolver::new(
                memory.clone(),
                persistent.clone(),
                options.cross_process_lock,
            )),
            ResolutionMode::Offline => Box::new(OfflineWorkingDirResolver::new(
                memory.clone(),
                persistent.clone(),
            )),
        };

        debug!(
            "Resolver {} with cache at {}",
            mode,
            persistent.layout().root().display()
        );

        Self {
            mode,
            registry,
            memory,
            persistent,
            strategy,
        }
    }

    /// Local directory holding `spec` at a version matching `constraint`
    pub async fn resolve_working_dir(
        &self,
        selector: &ModuleSelector,
        spec: &RepositorySpec,
        constraint: &VersionConstraint,
    ) -> VcsResult<PathBuf> {
        let vcs = self.registry.get(spec.kind())?;
        self.strategy
            .select_version(selector, spec, constraint, vcs.as_ref())
            .await
    }

    /// Resolve several requests concurrently, one result per request in order
    pub async fn resolve_all(&self, requests: &[ResolveRequest]) -> Vec<VcsResult<PathBuf>> {
        join_all(
            requests
                .iter()
                .map(|r| self.resolve_working_dir(&r.selector, &r.spec, &r.constraint)),
        )
        .await
    }

    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    pub fn memory_cache(&self) -> &VersionSelectionCache {
        &self.memory
    }

    pub fn persistent_cache(&self) -> &PersistentMetadataCache {
        &self.persistent
    }
}
