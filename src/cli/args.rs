//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// vcsdeps - resolve source repository dependencies to local checkouts
///
/// Checkouts are cached and reused across builds; once a dependency has been
/// resolved online it can be resolved again with --offline.
#[derive(Parser, Debug)]
#[command(name = "vcsdeps")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "VCSDEPS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Checkout cache root (overrides cache.dir)
    #[arg(long, global = true, env = "VCSDEPS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a repository at one or more version constraints
    Resolve(ResolveArgs),

    /// Inspect and clean the checkout cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Repository URL
    pub url: String,

    /// Version constraints (tag, commit, branch:NAME, latest, 1.2.+, ^1.2)
    #[arg(required = true)]
    pub constraints: Vec<String>,

    /// Directory inside the repository holding the dependency
    #[arg(long, default_value = "")]
    pub root: String,

    /// Version control system of the repository
    #[arg(long, default_value = "git")]
    pub kind: String,

    /// Only reuse cached checkouts, never contact the repository
    #[arg(long)]
    pub offline: bool,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., resolution.offline)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for resolve and cache list
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List recorded checkouts
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove checkouts unused for a number of days
    Gc {
        /// Remove checkouts unused for N days (default: from config)
        #[arg(long)]
        days: Option<u32>,

        /// Dry run - show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete every checkout and cache entry
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the cache root
    Path,
}
