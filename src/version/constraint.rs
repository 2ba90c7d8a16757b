//! Version constraint parsing
//!
//! Text forms accepted for a dependency's declared version:
//!
//! | Text | Constraint |
//! |------|------------|
//! | `v1.2.0`, `a1b2c3d` | exact tag or commit |
//! | `branch:main` | branch head |
//! | `latest`, `latest.integration`, `HEAD` | default branch head |
//! | `latest.release` | highest tag |
//! | `1.2.+`, `+` | highest tag with prefix |
//! | `^1.2`, `>=1.0, <2.0` | highest tag matching a semver requirement |

use crate::error::{VcsError, VcsResult};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const BRANCH_PREFIX: &str = "branch:";
const RANGE_OPERATORS: &[char] = &['^', '~', '=', '>', '<', '*'];

/// A declared specification of acceptable versions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionConstraint {
    /// A tag name or commit id, used as-is
    Exact(String),
    /// The current head of a named branch
    Branch(String),
    /// The current head of the default branch
    Latest,
    /// The highest tag within a range
    Range(VersionRange),
}

/// Range constraints over tag names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionRange {
    /// Semver requirement, matched against tags with any leading `v` removed
    Semver(VersionReq),
    /// Tags starting with a prefix (empty prefix matches every tag)
    Prefix(String),
}

impl VersionConstraint {
    /// Whether the selected version can change while the constraint stays the same
    pub fn is_mutable(&self) -> bool {
        !matches!(self, Self::Exact(_))
    }
}

impl VersionRange {
    /// Whether a tag name falls inside this range
    pub fn matches(&self, tag: &str) -> bool {
        match self {
            Self::Semver(req) => parse_tag_version(tag).is_some_and(|v| req.matches(&v)),
            Self::Prefix(prefix) => strip_v(tag).starts_with(strip_v(prefix)),
        }
    }
}

/// Drop a single leading `v`/`V` when followed by a digit
pub(crate) fn strip_v(tag: &str) -> &str {
    match tag.strip_prefix(&['v', 'V'][..]) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => tag,
    }
}

/// Read a tag as a version, treating `v1.2` as `1.2.0` and `v1` as `1.0.0`
pub(crate) fn parse_tag_version(tag: &str) -> Option<Version> {
    let bare = strip_v(tag);
    if let Ok(version) = Version::parse(bare) {
        return Some(version);
    }

    let (core, suffix) = bare.split_at(bare.find(&['-', '+'][..]).unwrap_or(bare.len()));
    let components = core.split('.').collect::<Vec<_>>();
    let numeric = |c: &&str| !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit());
    if components.len() > 2 || !components.iter().all(numeric) {
        return None;
    }

    let padded = format!("{}{}{}", core, ".0".repeat(3 - components.len()), suffix);
    Version::parse(&padded).ok()
}

impl FromStr for VersionConstraint {
    type Err = VcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = |reason: String| VcsError::InvalidConstraint {
            constraint: s.to_string(),
            reason,
        };

        if text.is_empty() {
            return Err(invalid("constraint cannot be empty".to_string()));
        }

        match text {
            "latest" | "latest.integration" | "HEAD" => return Ok(Self::Latest),
            "latest.release" => return Ok(Self::Range(VersionRange::Prefix(String::new()))),
            _ => {}
        }

        if let Some(branch) = text.strip_prefix(BRANCH_PREFIX) {
            let branch = branch.trim();
            if branch.is_empty() {
                return Err(invalid("branch name cannot be empty".to_string()));
            }
            return Ok(Self::Branch(branch.to_string()));
        }

        if let Some(prefix) = text.strip_suffix('+') {
            return Ok(Self::Range(VersionRange::Prefix(prefix.to_string())));
        }

        if text.starts_with(RANGE_OPERATORS) || text.contains(',') {
            let req = VersionReq::parse(text).map_err(|e| invalid(e.to_string()))?;
            return Ok(Self::Range(VersionRange::Semver(req)));
        }

        Ok(Self::Exact(text.to_string()))
    }
}

impl TryFrom<String> for VersionConstraint {
    type Error = VcsError;

    fn try_from(value: String) -> VcsResult<Self> {
        value.parse()
    }
}

impl From<VersionConstraint> for String {
    fn from(value: VersionConstraint) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(r) => f.write_str(r),
            Self::Branch(b) => write!(f, "{}{}", BRANCH_PREFIX, b),
            Self::Latest => f.write_str("latest"),
            Self::Range(VersionRange::Prefix(p)) if p.is_empty() => f.write_str("latest.release"),
            Self::Range(VersionRange::Prefix(p)) => write!(f, "{}+", p),
            Self::Range(VersionRange::Semver(req)) => write!(f, "{}", req),
        }
    }
}
