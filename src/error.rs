//! Error types for vcsdeps
//!
//! All modules use `VcsResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for vcsdeps operations
pub type VcsResult<T> = Result<T, VcsError>;

/// All errors that can occur while resolving version-control dependencies
#[derive(Error, Debug)]
pub enum VcsError {
    // Version control errors
    #[error("Could not access {repository}: {reason}")]
    VcsAccess { repository: String, reason: String },

    #[error("Version '{version}' not found in {repository}: {reason}")]
    VcsContent {
        repository: String,
        version: String,
        reason: String,
    },

    #[error("No version of {repository} matches '{constraint}' (available: {available})")]
    NoMatchingVersion {
        constraint: String,
        repository: String,
        available: String,
    },

    #[error("Cannot resolve {selector} from {repository} in offline mode.")]
    OfflineResolution { selector: String, repository: String },

    #[error("No version control system registered for '{0}'")]
    UnsupportedVcs(String),

    // Input errors
    #[error("Invalid repository specification {url}: {reason}")]
    InvalidSpec { url: String, reason: String },

    #[error("Invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    // Cache errors
    #[error("Failed to record cache entry {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to lock {path}: {source}")]
    CacheLock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl VcsError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a VCS access error for a repository
    pub fn access(repository: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::VcsAccess {
            repository: repository.into(),
            reason: reason.into(),
        }
    }

    /// Create a VCS content error for a missing version
    pub fn content(
        repository: impl Into<String>,
        version: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::VcsContent {
            repository: repository.into(),
            version: version.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from talking to a version control system
    pub fn is_vcs_failure(&self) -> bool {
        matches!(
            self,
            Self::VcsAccess { .. } | Self::VcsContent { .. } | Self::NoMatchingVersion { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::OfflineResolution { .. } => {
                Some("Run once without --offline to populate the checkout cache")
            }
            Self::VcsAccess { .. } => Some("Check the repository URL and your credentials"),
            Self::UnsupportedVcs(_) => Some("Only git repositories are supported by default"),
            Self::CacheWrite { .. } => Some("Check permissions of the cache directory"),
            _ => None,
        }
    }
}
