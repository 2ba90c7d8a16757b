//! Cache directory layout and working-directory naming
//!
//! ```text
//! <root>/
//!   checkouts/<repo>-<hash(address)>/<hash(version)>/   one checkout per version
//!   checkouts/<repo>-<hash(address)>/.tmp-<uuid>/       checkout in progress
//!   metadata/entries/<hash(key)>.json                   persistent cache entries
//!   metadata/locks/<hash(key)>.lock                     cross-process locks per key
//!   metadata/locks/checkout-<hash(dir)>.lock            cross-process locks per checkout
//! ```
//!
//! Every function here is pure: no I/O and no locking.

use crate::cache::CacheKey;
use crate::repository::RepositorySpec;
use crate::version::ResolvedVersion;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const CHECKOUTS_DIR: &str = "checkouts";
const METADATA_DIR: &str = "metadata";
const ENTRIES_DIR: &str = "entries";
const LOCKS_DIR: &str = "locks";

/// Prefix of checkout directories that are still being written
pub const STAGING_PREFIX: &str = ".tmp-";

/// Hex chars of SHA256 used for directory names
const DIR_HASH_LEN: usize = 12;
/// Hex chars of SHA256 used for cache key file names
const KEY_HASH_LEN: usize = 16;

/// Paths inside a cache root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checkouts_dir(&self) -> PathBuf {
        self.root.join(CHECKOUTS_DIR)
    }

    pub fn entries_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR).join(ENTRIES_DIR)
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR).join(LOCKS_DIR)
    }

    /// Directory holding every checkout of one repository
    ///
    /// The content root is not part of the name, so specs that differ only
    /// in root share checkouts.
    pub fn repository_dir(&self, spec: &RepositorySpec) -> PathBuf {
        let address = spec.canonical_address();
        self.checkouts_dir().join(format!(
            "{}-{}",
            spec.short_name(),
            hash_hex(&[&address], DIR_HASH_LEN)
        ))
    }

    /// Checkout directory for one version of one repository
    pub fn working_dir(&self, spec: &RepositorySpec, version: &ResolvedVersion) -> PathBuf {
        self.repository_dir(spec)
            .join(hash_hex(&[&version.id], DIR_HASH_LEN))
    }

    /// Fresh sibling directory a checkout is written to before it is moved into place
    pub fn staging_dir(&self, spec: &RepositorySpec) -> PathBuf {
        self.repository_dir(spec)
            .join(format!("{}{}", STAGING_PREFIX, uuid::Uuid::new_v4()))
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.entries_dir().join(format!("{}.json", key_id(key)))
    }

    pub fn lock_path(&self, key: &CacheKey) -> PathBuf {
        self.locks_dir().join(format!("{}.lock", key_id(key)))
    }

    /// Lock file guarding changes to one checkout directory
    ///
    /// Several keys can map to the same checkout, so this is separate from
    /// [`CacheLayout::lock_path`].
    pub fn checkout_lock_path(&self, working_dir: &Path) -> PathBuf {
        let dir = working_dir.to_string_lossy();
        self.locks_dir()
            .join(format!("checkout-{}.lock", hash_hex(&[&dir], KEY_HASH_LEN)))
    }
}

/// Stable identifier of a cache key, used for entry and lock file names
pub fn key_id(key: &CacheKey) -> String {
    let constraint = key.constraint.to_string();
    hash_hex(
        &[
            key.spec.kind().as_str(),
            key.spec.url(),
            key.spec.root_dir(),
            &constraint,
        ],
        KEY_HASH_LEN,
    )
}

/// SHA256 over NUL-separated parts, truncated to `len` hex chars
fn hash_hex(parts: &[&str], len: usize) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    digest[..len].to_string()
}
