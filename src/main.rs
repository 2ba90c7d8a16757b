//! vcsdeps - version-control dependency resolver
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vcsdeps::cli::{Cli, Commands};
use vcsdeps::config::ConfigManager;
use vcsdeps::error::VcsResult;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> VcsResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config.general.log_format);
    debug!("Loaded configuration from {}", config_manager.path().display());

    let cache_root = ConfigManager::cache_dir(&config, cli.cache_dir.as_deref());
    debug!("Cache root: {}", cache_root.display());

    match cli.command {
        Commands::Resolve(args) => vcsdeps::cli::commands::resolve(args, &config, &cache_root).await,
        Commands::Cache(args) => vcsdeps::cli::commands::cache(args, &config, &cache_root).await,
        Commands::Config(args) => {
            vcsdeps::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug; logs go to stderr
fn init_logging(verbose: u8, format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("vcsdeps=warn"),
        1 => EnvFilter::new("vcsdeps=info"),
        _ => EnvFilter::new("vcsdeps=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
