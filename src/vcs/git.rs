//! Git adapter
//!
//! Implements [`VersionControlSystem`] by running the `git` program. Network
//! access, credentials and transports are whatever the installed git does.

use crate::error::{VcsError, VcsResult};
use crate::repository::{RepositorySpec, VcsKind};
use crate::vcs::VersionControlSystem;
use crate::version::{ResolvedVersion, VersionRef};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

/// stderr fragments git prints when a revision does not exist
const MISSING_REVISION_MARKERS: &[&str] = &[
    "did not match any",
    "unknown revision",
    "not a tree",
    "couldn't find remote ref",
    "not our ref",
    "invalid reference",
];

/// Version control adapter backed by the git command line
#[derive(Debug, Clone)]
pub struct GitVcs {
    program: String,
}

impl GitVcs {
    /// Create an adapter running the given git executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run git with `args`, optionally inside `dir`
    async fn exec(&self, dir: Option<&Path>, args: &[&str]) -> VcsResult<Output> {
        debug!("Executing: {} {:?}", self.program, args);

        let mut command = Command::new(&self.program);
        if let Some(dir) = dir {
            command.arg("-C").arg(dir);
        }

        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                VcsError::access(
                    format!("{} {:?}", self.program, args),
                    format!("failed to run git: {}", e),
                )
            })
    }

    /// Run git and map a non-zero exit to an access or content error
    async fn run(
        &self,
        dir: Option<&Path>,
        args: &[&str],
        spec: &RepositorySpec,
        version: Option<&ResolvedVersion>,
    ) -> VcsResult<String> {
        let output = self.exec(dir, args).await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify_failure(spec, version, &stderr))
    }
}

impl Default for GitVcs {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl VersionControlSystem for GitVcs {
    async fn list_versions(&self, spec: &RepositorySpec) -> VcsResult<Vec<VersionRef>> {
        let stdout = self.run(None, &["ls-remote", spec.url()], spec, None).await?;
        let refs = parse_ls_remote(&stdout);
        debug!("Listed {} refs from {}", refs.len(), spec.url());
        Ok(refs)
    }

    async fn checkout(
        &self,
        spec: &RepositorySpec,
        version: &ResolvedVersion,
        destination: &Path,
    ) -> VcsResult<()> {
        info!("Cloning {} @ {}", spec.url(), version);

        let destination_str = destination.to_string_lossy();
        self.run(
            None,
            &["clone", "--quiet", "--no-checkout", spec.url(), &destination_str],
            spec,
            None,
        )
        .await?;

        self.run(
            Some(destination),
            &["checkout", "--quiet", "--detach", &version.id],
            spec,
            Some(version),
        )
        .await?;

        Ok(())
    }

    async fn reset(
        &self,
        working_dir: &Path,
        version: &ResolvedVersion,
        spec: &RepositorySpec,
    ) -> VcsResult<()> {
        debug!("Resetting {} to {}", working_dir.display(), version);

        self.run(
            Some(working_dir),
            &["fetch", "--quiet", "--tags", "--force", "origin"],
            spec,
            None,
        )
        .await?;
        self.run(
            Some(working_dir),
            &["reset", "--quiet", "--hard", &version.id],
            spec,
            Some(version),
        )
        .await?;
        self.run(Some(working_dir), &["clean", "-fdxq"], spec, None)
            .await?;

        Ok(())
    }

    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }
}

fn classify_failure(
    spec: &RepositorySpec,
    version: Option<&ResolvedVersion>,
    stderr: &str,
) -> VcsError {
    let lowered = stderr.to_ascii_lowercase();
    let missing = MISSING_REVISION_MARKERS.iter().any(|m| lowered.contains(m));

    match version {
        Some(version) if missing => {
            VcsError::content(spec.display_name(), version.label.clone(), stderr)
        }
        _ => VcsError::access(spec.display_name(), stderr),
    }
}

/// Parse `git ls-remote` output into refs
///
/// Peeled tag lines (`refs/tags/x^{}`) carry the commit an annotated tag
/// points at and replace the tag object id. Other refs are ignored.
fn parse_ls_remote(stdout: &str) -> Vec<VersionRef> {
    let mut tags: HashMap<String, String> = HashMap::new();
    let mut peeled: HashMap<String, String> = HashMap::new();
    let mut refs = Vec::new();

    for line in stdout.lines() {
        let mut parts = line.split_whitespace();
        let (Some(commit), Some(name)) = (parts.next(), parts.next()) else {
            continue;
        };

        if name == "HEAD" {
            refs.push(VersionRef::head(commit));
        } else if let Some(branch) = name.strip_prefix("refs/heads/") {
            refs.push(VersionRef::branch(branch, commit));
        } else if let Some(tag) = name.strip_prefix("refs/tags/") {
            match tag.strip_suffix("^{}") {
                Some(tag) => {
                    peeled.insert(tag.to_string(), commit.to_string());
                }
                None => {
                    tags.insert(tag.to_string(), commit.to_string());
                }
            }
        }
    }

    let mut tag_refs: Vec<VersionRef> = tags
        .into_iter()
        .map(|(name, commit)| {
            let commit = peeled.remove(&name).unwrap_or(commit);
            VersionRef::tag(name, commit)
        })
        .collect();
    tag_refs.sort_by(|a, b| a.name.cmp(&b.name));
    refs.extend(tag_refs);

    refs
}
