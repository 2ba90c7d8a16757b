//! Version selection
//!
//! Picks exactly one [`ResolvedVersion`] for a constraint from the refs a
//! repository reports. Selection is deterministic: the same constraint and
//! the same set of refs always produce the same version, regardless of the
//! order the refs were listed in.

use crate::error::{VcsError, VcsResult};
use crate::repository::RepositorySpec;
use crate::vcs::VersionControlSystem;
use crate::version::constraint::{parse_tag_version, VersionConstraint, VersionRange};
use crate::version::{RefKind, ResolvedVersion, VersionRef};
use std::cmp::Ordering;
use tracing::debug;

/// Branches tried, in order, when a repository does not report `HEAD`
const DEFAULT_BRANCHES: &[&str] = &["main", "master"];

/// Select a version, listing the repository only when the constraint needs it
pub async fn select_version(
    constraint: &VersionConstraint,
    spec: &RepositorySpec,
    vcs: &dyn VersionControlSystem,
) -> VcsResult<ResolvedVersion> {
    if let VersionConstraint::Exact(reference) = constraint {
        return Ok(ResolvedVersion::exact(reference.clone()));
    }

    let refs = vcs.list_versions(spec).await?;
    debug!("{} reported {} refs", spec, refs.len());
    select_from(constraint, spec, &refs)
}

/// Select a version from refs that have already been listed
pub fn select_from(
    constraint: &VersionConstraint,
    spec: &RepositorySpec,
    refs: &[VersionRef],
) -> VcsResult<ResolvedVersion> {
    let selected = match constraint {
        VersionConstraint::Exact(reference) => return Ok(ResolvedVersion::exact(reference.clone())),
        VersionConstraint::Branch(branch) => refs
            .iter()
            .find(|r| r.kind == RefKind::Branch && r.name == *branch)
            .ok_or_else(|| {
                VcsError::content(spec.display_name(), branch.clone(), "branch does not exist")
            })?,
        VersionConstraint::Latest => default_head(refs).ok_or_else(|| {
            VcsError::content(spec.display_name(), "HEAD", "repository has no default branch")
        })?,
        VersionConstraint::Range(range) => highest_tag(range, refs).ok_or_else(|| {
            VcsError::NoMatchingVersion {
                constraint: constraint.to_string(),
                repository: spec.display_name(),
                available: available_tags(refs),
            }
        })?,
    };

    Ok(ResolvedVersion::new(
        selected.commit.clone(),
        preferred_label(&selected.commit, refs),
    ))
}

fn default_head(refs: &[VersionRef]) -> Option<&VersionRef> {
    refs.iter().find(|r| r.kind == RefKind::Head).or_else(|| {
        DEFAULT_BRANCHES.iter().find_map(|name| {
            refs.iter()
                .find(|r| r.kind == RefKind::Branch && r.name == *name)
        })
    })
}

fn highest_tag<'a>(range: &VersionRange, refs: &'a [VersionRef]) -> Option<&'a VersionRef> {
    refs.iter()
        .filter(|r| r.kind == RefKind::Tag && range.matches(&r.name))
        .max_by(|a, b| compare_tags(&a.name, &b.name))
}

/// Total order over tag names: semver-aware where both parse, lexical otherwise
///
/// Tags that parse as versions sort above tags that don't.
pub fn compare_tags(a: &str, b: &str) -> Ordering {
    let va = parse_tag_version(a);
    let vb = parse_tag_version(b);
    match (va, vb) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Most specific name for a commit: highest tag, then first branch, then HEAD
fn preferred_label(commit: &str, refs: &[VersionRef]) -> String {
    let same_commit = refs.iter().filter(|r| r.commit == commit);

    same_commit
        .min_by(|a, b| {
            a.kind.cmp(&b.kind).then_with(|| match a.kind {
                RefKind::Tag => compare_tags(&b.name, &a.name),
                _ => a.name.cmp(&b.name),
            })
        })
        .map(|r| r.name.clone())
        .unwrap_or_else(|| commit.to_string())
}

fn available_tags(refs: &[VersionRef]) -> String {
    let mut tags: Vec<&str> = refs
        .iter()
        .filter(|r| r.kind == RefKind::Tag)
        .map(|r| r.name.as_str())
        .collect();
    if tags.is_empty() {
        return "no tags".to_string();
    }
    tags.sort_by(|a, b| compare_tags(a, b));
    tags.join(", ")
}
