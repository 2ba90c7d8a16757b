//! Version control adapters
//!
//! Each supported version control system implements [`VersionControlSystem`];
//! a [`VcsRegistry`] picks the implementation for a repository's declared kind.
//! - git: the `git` command line program

mod git;
mod registry;

pub use git::GitVcs;
pub use registry::VcsRegistry;

use crate::error::VcsResult;
use crate::repository::{RepositorySpec, VcsKind};
use crate::version::{ResolvedVersion, VersionRef};
use async_trait::async_trait;
use std::path::Path;

/// Capabilities the resolver needs from a version control system
///
/// `list_versions`, `checkout` and `reset` may block on network or disk for
/// an unbounded time.
#[async_trait]
pub trait VersionControlSystem: Send + Sync {
    /// Enumerate the tags, branches and default head the repository exposes
    async fn list_versions(&self, spec: &RepositorySpec) -> VcsResult<Vec<VersionRef>>;

    /// Materialize `version` into an empty or missing `destination`
    async fn checkout(
        &self,
        spec: &RepositorySpec,
        version: &ResolvedVersion,
        destination: &Path,
    ) -> VcsResult<()>;

    /// Bring an existing checkout to `version`, discarding local changes
    ///
    /// Must succeed without changes when the directory already matches.
    async fn reset(
        &self,
        working_dir: &Path,
        version: &ResolvedVersion,
        spec: &RepositorySpec,
    ) -> VcsResult<()>;

    /// The kind of repository this implementation handles
    fn kind(&self) -> VcsKind;
}
