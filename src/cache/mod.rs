//! Checkout caches
//!
//! Two layers sit in front of the version control systems:
//!
//! | Layer | Lifetime | Maps key to |
//! |-------|----------|-------------|
//! | [`VersionSelectionCache`] | one resolver | working directory |
//! | [`PersistentMetadataCache`] | across builds | working directory, selected version, last use |
//!
//! Both are keyed by [`CacheKey`], the structural pair of repository spec and
//! version constraint. Checkout directories are named by [`CacheLayout`] and
//! reclaimed out of band by [`gc::collect_garbage`].

pub mod gc;
pub mod lock;
pub mod memory;
pub mod naming;
pub mod persistent;

pub use gc::{collect_garbage, GcSummary};
pub use lock::{KeyGuard, KeyedLocks, ProcessLock};
pub use memory::VersionSelectionCache;
pub use naming::CacheLayout;
pub use persistent::{CacheEntry, PersistentMetadataCache, WorkingDir};

use crate::repository::RepositorySpec;
use crate::version::VersionConstraint;
use std::fmt;

/// Identity of one resolution: a repository spec and a version constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub spec: RepositorySpec,
    pub constraint: VersionConstraint,
}

impl CacheKey {
    pub fn new(spec: &RepositorySpec, constraint: &VersionConstraint) -> Self {
        Self {
            spec: spec.clone(),
            constraint: constraint.clone(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.spec.url(), self.constraint)?;
        if !self.spec.root_dir().is_empty() {
            write!(f, " ({})", self.spec.root_dir())?;
        }
        Ok(())
    }
}
