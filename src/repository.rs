//! Repository identity and requesting-module types

use crate::error::{VcsError, VcsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

/// Supported version control systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Mercurial,
    Subversion,
}

impl VcsKind {
    /// Short lowercase name used in paths and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Mercurial => "hg",
            Self::Subversion => "svn",
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VcsKind {
    type Err = VcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "git" => Ok(Self::Git),
            "hg" | "mercurial" => Ok(Self::Mercurial),
            "svn" | "subversion" => Ok(Self::Subversion),
            other => Err(VcsError::UnsupportedVcs(other.to_string())),
        }
    }
}

/// A version-control repository plus the directory inside it that holds
/// the dependency's content.
///
/// Equality is structural and every cache key includes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositorySpec {
    kind: VcsKind,
    url: String,
    #[serde(default)]
    root_dir: String,
}

impl RepositorySpec {
    /// Create a spec for a repository, validating the content root
    pub fn new(kind: VcsKind, url: impl Into<String>, root_dir: impl Into<String>) -> VcsResult<Self> {
        let url = url.into();
        let root_dir = normalize_root(&url, &root_dir.into())?;

        if url.trim().is_empty() {
            return Err(VcsError::InvalidSpec {
                url,
                reason: "repository URL cannot be empty".to_string(),
            });
        }

        Ok(Self {
            kind,
            url: url.trim().to_string(),
            root_dir,
        })
    }

    /// Git repository rooted at its top-level directory
    pub fn git(url: impl Into<String>) -> VcsResult<Self> {
        Self::new(VcsKind::Git, url, "")
    }

    /// Same repository with a different content root
    pub fn with_root(&self, root_dir: impl Into<String>) -> VcsResult<Self> {
        Self::new(self.kind, self.url.clone(), root_dir)
    }

    pub fn kind(&self) -> VcsKind {
        self.kind
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Repository-relative content root ("" for the checkout root)
    pub fn root_dir(&self) -> &str {
        &self.root_dir
    }

    /// Address used for directory naming, ignoring trailing slashes
    pub fn canonical_address(&self) -> String {
        format!("{}+{}", self.kind, self.url.trim_end_matches('/'))
    }

    /// Short readable name derived from the last URL segment
    pub fn short_name(&self) -> String {
        let segment = self
            .url
            .trim_end_matches('/')
            .rsplit(&['/', ':', '\\'][..])
            .next()
            .unwrap_or("repo");
        let segment = segment.strip_suffix(".git").unwrap_or(segment);

        let slug: String = segment
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .take(32)
            .collect();

        if slug.is_empty() {
            "repo".to_string()
        } else {
            slug
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} repository {}", self.kind, self.url)
    }

    /// Join the content root onto a checkout directory
    pub fn content_dir(&self, working_dir: &Path) -> std::path::PathBuf {
        if self.root_dir.is_empty() {
            working_dir.to_path_buf()
        } else {
            working_dir.join(&self.root_dir)
        }
    }
}

impl fmt::Display for RepositorySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Reject absolute roots and parent traversal; normalize separators
fn normalize_root(url: &str, root: &str) -> VcsResult<String> {
    let trimmed = root.trim().trim_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        return Ok(String::new());
    }

    let invalid = |reason: &str| VcsError::InvalidSpec {
        url: url.to_string(),
        reason: format!("root directory '{}' {}", root, reason),
    };

    if root.trim().starts_with('/') || Path::new(trimmed).is_absolute() {
        return Err(invalid("must be relative"));
    }

    let mut parts = Vec::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(invalid("must not leave the repository")),
        }
    }

    Ok(parts.join("/"))
}

/// The dependency that asked for a repository, used in messages and logs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleSelector {
    pub group: String,
    pub module: String,
    pub version: String,
}

impl ModuleSelector {
    pub fn new(
        group: impl Into<String>,
        module: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            module: module.into(),
            version: version.into(),
        }
    }

    /// Selector for a repository requested directly (no owning module)
    pub fn for_repository(spec: &RepositorySpec, version: impl Into<String>) -> Self {
        Self::new(spec.kind().as_str(), spec.short_name(), version)
    }

    pub fn display_name(&self) -> String {
        format!("{}:{}:{}", self.group, self.module, self.version)
    }
}

impl fmt::Display for ModuleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
