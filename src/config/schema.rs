//! Configuration schema for vcsdeps
//!
//! Configuration is stored at `~/.config/vcsdeps/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Checkout cache settings
    pub cache: CacheConfig,

    /// Resolution behaviour
    pub resolution: ResolutionConfig,

    /// Version control programs
    pub vcs: VcsConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Checkout cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root (defaults to the platform cache directory)
    pub dir: Option<PathBuf>,

    /// `cache gc` removes checkouts unused for N days
    pub gc_max_age_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            gc_max_age_days: 30,
        }
    }
}

/// Resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Never contact a repository; only reuse cached checkouts
    pub offline: bool,

    /// Serialize checkouts of the same dependency across processes
    pub cross_process_lock: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            offline: false,
            cross_process_lock: true,
        }
    }
}

/// Version control program configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VcsConfig {
    /// Git executable name or path
    pub git_program: String,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            git_program: "git".to_string(),
        }
    }
}
