//! Working-directory resolution
//!
//! Turns a (repository, constraint) request into a local directory holding
//! the selected version. Two strategies share the same lookup order
//! (in-memory selections, then persistent metadata) and differ in what they
//! do on a miss:
//! - online: select a version, check it out, record it
//! - offline: fail without touching the network or the disk
//!
//! [`VcsResolver`] picks the strategy once from a [`ResolutionMode`].

mod facade;
mod offline;
mod online;

pub use facade::{ResolveRequest, ResolverOptions, VcsResolver};
pub use offline::OfflineWorkingDirResolver;
pub use online::OnlineWorkingDirResolver;

use crate::error::VcsResult;
use crate::repository::{ModuleSelector, RepositorySpec};
use crate::vcs::VersionControlSystem;
use crate::version::VersionConstraint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Whether resolution may contact version control systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    #[default]
    Online,
    Offline,
}

impl ResolutionMode {
    pub fn from_offline(offline: bool) -> Self {
        if offline {
            Self::Offline
        } else {
            Self::Online
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy turning a request into a content directory
///
/// The returned path is the checkout directory joined with the spec's root
/// directory.
#[async_trait]
pub trait WorkingDirResolver: Send + Sync {
    async fn select_version(
        &self,
        selector: &ModuleSelector,
        spec: &RepositorySpec,
        constraint: &VersionConstraint,
        vcs: &dyn VersionControlSystem,
    ) -> VcsResult<PathBuf>;
}
