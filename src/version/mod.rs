//! Versions: declared constraints, refs reported by a repository, and the
//! concrete version selected for a checkout.

pub mod constraint;
pub mod select;

pub use constraint::{VersionConstraint, VersionRange};
pub use select::{select_from, select_version};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of ref a repository reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Tag,
    Branch,
    Head,
}

/// A named ref and the commit it points at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRef {
    pub name: String,
    pub kind: RefKind,
    pub commit: String,
}

impl VersionRef {
    pub fn tag(name: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RefKind::Tag,
            commit: commit.into(),
        }
    }

    pub fn branch(name: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RefKind::Branch,
            commit: commit.into(),
        }
    }

    pub fn head(commit: impl Into<String>) -> Self {
        Self {
            name: "HEAD".to_string(),
            kind: RefKind::Head,
            commit: commit.into(),
        }
    }
}

/// Exactly one point in a repository's history
///
/// `id` is what the version control system checks out (a commit id, or
/// the exact ref the user asked for). `label` is the ref name shown to
/// people.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedVersion {
    pub id: String,
    pub label: String,
}

impl ResolvedVersion {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// A version addressed directly by ref or commit
    pub fn exact(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        Self {
            id: reference.clone(),
            label: reference,
        }
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id == self.label {
            f.write_str(&self.label)
        } else {
            let short = self.id.get(..10).unwrap_or(&self.id);
            write!(f, "{} ({})", self.label, short)
        }
    }
}
