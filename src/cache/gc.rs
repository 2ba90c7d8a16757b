//! Garbage collection of stale checkouts
//!
//! Resolution never deletes anything. Collection is a separate pass that
//! drops entries unused for longer than a cutoff, then removes checkout
//! directories no remaining entry points at. Directories without any entry
//! (interrupted runs, abandoned staging dirs) are only removed once their
//! modification time is also past the cutoff, so a checkout that is being
//! recorded right now is left alone.

use crate::cache::naming::STAGING_PREFIX;
use crate::cache::persistent::PersistentMetadataCache;
use crate::error::{VcsError, VcsResult};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Outcome of a collection pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcSummary {
    pub entries_removed: usize,
    pub dirs_removed: Vec<PathBuf>,
    pub bytes_freed: u64,
    pub dry_run: bool,
}

impl GcSummary {
    pub fn is_empty(&self) -> bool {
        self.entries_removed == 0 && self.dirs_removed.is_empty()
    }
}

/// Remove entries unused for `max_age` and the checkouts only they used
///
/// With `dry_run` nothing is deleted and the summary reports what would be.
pub async fn collect_garbage(
    cache: &PersistentMetadataCache,
    max_age: Duration,
    dry_run: bool,
) -> VcsResult<GcSummary> {
    let cutoff = Utc::now() - max_age;
    let mut summary = GcSummary {
        dry_run,
        ..Default::default()
    };

    let entries = cache.entries().await?;
    let (stale, live): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|entry| entry.last_used < cutoff);

    let live_dirs: HashSet<PathBuf> = live.iter().map(|e| e.working_dir.clone()).collect();
    let mut referenced: HashSet<PathBuf> = live_dirs.clone();
    let mut candidates = BTreeSet::new();

    for entry in &stale {
        debug!(
            "Entry {} last used {}",
            entry.key(),
            entry.last_used.to_rfc3339()
        );
        if !dry_run {
            cache.remove(&entry.key()).await?;
        }
        summary.entries_removed += 1;
        referenced.insert(entry.working_dir.clone());

        if !live_dirs.contains(&entry.working_dir) {
            candidates.insert(entry.working_dir.clone());
        }
    }

    for dir in unreferenced_dirs(&cache.layout().checkouts_dir(), &referenced, cutoff).await? {
        candidates.insert(dir);
    }

    for dir in candidates {
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            continue;
        }

        let size = dir_size(&dir).await;
        if !dry_run {
            if let Err(e) = fs::remove_dir_all(&dir).await {
                warn!("Failed to remove {}: {}", dir.display(), e);
                continue;
            }
            if let Some(parent) = dir.parent() {
                // Fails while other checkouts of the repository remain
                let _ = fs::remove_dir(parent).await;
            }
        }

        summary.bytes_freed += size;
        summary.dirs_removed.push(dir);
    }

    info!(
        "GC {}: {} entries, {} directories, {}",
        if dry_run { "dry run" } else { "complete" },
        summary.entries_removed,
        summary.dirs_removed.len(),
        format_bytes(summary.bytes_freed)
    );

    Ok(summary)
}

/// Checkout and staging dirs with no entry, last modified before `cutoff`
async fn unreferenced_dirs(
    checkouts: &Path,
    referenced: &HashSet<PathBuf>,
    cutoff: DateTime<Utc>,
) -> VcsResult<Vec<PathBuf>> {
    let mut found = vec![];

    for repo_dir in list_dirs(checkouts).await? {
        for dir in list_dirs(&repo_dir).await? {
            if referenced.contains(&dir) {
                continue;
            }

            let modified = match fs::metadata(&dir).await.and_then(|m| m.modified()) {
                Ok(time) => DateTime::<Utc>::from(time),
                Err(e) => {
                    warn!("Cannot stat {}: {}", dir.display(), e);
                    continue;
                }
            };

            if modified < cutoff {
                let staging = dir
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(STAGING_PREFIX));
                debug!(
                    "{} {} is unreferenced",
                    if staging { "Staging dir" } else { "Checkout" },
                    dir.display()
                );
                found.push(dir);
            }
        }
    }

    Ok(found)
}

async fn list_dirs(dir: &Path) -> VcsResult<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(VcsError::io(format!("reading {}", dir.display()), e)),
    };

    let mut dirs = vec![];
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| VcsError::io(format!("reading {}", dir.display()), e))?
    {
        if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Total size of regular files under `dir`, best effort
async fn dir_size(dir: &Path) -> u64 {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || walk_size(&dir))
        .await
        .unwrap_or(0)
}

fn walk_size(dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .map(|entry| match entry.file_type() {
            Ok(t) if t.is_dir() => walk_size(&entry.path()),
            Ok(t) if t.is_file() => entry.metadata().map(|m| m.len()).unwrap_or(0),
            _ => 0,
        })
        .sum()
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
