//! Resolve command - materialize a repository at one or more constraints

use crate::cache::{CacheKey, CacheLayout};
use crate::cli::args::{OutputFormat, ResolveArgs};
use crate::config::Config;
use crate::error::{VcsError, VcsResult};
use crate::repository::{ModuleSelector, RepositorySpec, VcsKind};
use crate::resolver::{ResolutionMode, ResolveRequest, ResolverOptions, VcsResolver};
use crate::ui::{self, TaskSpinner, UiContext};
use crate::vcs::VcsRegistry;
use crate::version::VersionConstraint;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One line of resolve output
#[derive(Debug, Serialize)]
struct Resolution {
    repository: String,
    constraint: String,
    version: Option<String>,
    working_dir: PathBuf,
}

/// Execute the resolve command
pub async fn execute(args: ResolveArgs, config: &Config, cache_root: &Path) -> VcsResult<()> {
    let ctx = UiContext::detect();
    let kind: VcsKind = args.kind.parse()?;
    let spec = RepositorySpec::new(kind, args.url.as_str(), args.root.as_str())?;
    let constraints = args
        .constraints
        .iter()
        .map(|c| c.parse::<VersionConstraint>())
        .collect::<VcsResult<Vec<_>>>()?;

    let mode = ResolutionMode::from_offline(args.offline || config.resolution.offline);
    let resolver = VcsResolver::new(
        mode,
        CacheLayout::new(cache_root),
        VcsRegistry::with_defaults(&config.vcs),
        ResolverOptions::from_config(config),
    );

    let requests: Vec<ResolveRequest> = constraints
        .iter()
        .map(|constraint| {
            ResolveRequest::new(
                ModuleSelector::for_repository(&spec, constraint.to_string()),
                spec.clone(),
                constraint.clone(),
            )
        })
        .collect();

    debug!("Resolving {} request(s) {}", requests.len(), mode);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Resolving {} ({})...", spec.url(), mode));

    let results = tokio::select! {
        results = resolver.resolve_all(&requests) => results,
        _ = tokio::signal::ctrl_c() => {
            spinner.stop_error("Interrupted");
            return Err(VcsError::User("Resolution interrupted".to_string()));
        }
    };

    let mut resolved = vec![];
    let mut failures = vec![];
    for (request, result) in requests.iter().zip(results) {
        match result {
            Ok(working_dir) => {
                let key = CacheKey::new(&request.spec, &request.constraint);
                let version = resolver
                    .persistent_cache()
                    .get(&key)
                    .await
                    .map(|w| w.selected_version.to_string());
                resolved.push(Resolution {
                    repository: request.spec.url().to_string(),
                    constraint: request.constraint.to_string(),
                    version,
                    working_dir,
                });
            }
            Err(e) => failures.push((request, e)),
        }
    }

    if failures.is_empty() {
        spinner.stop(&format!("Resolved {} constraint(s)", resolved.len()));
    } else {
        spinner.stop_error(&format!(
            "{} of {} constraint(s) failed",
            failures.len(),
            requests.len()
        ));
    }

    match args.format {
        OutputFormat::Table => print_table(&resolved),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
        OutputFormat::Plain => {
            for resolution in &resolved {
                println!("{}", resolution.working_dir.display());
            }
        }
    }

    let mut failures = failures.into_iter();
    match failures.next() {
        None => Ok(()),
        Some((_, first)) => {
            for (request, error) in failures {
                ui::step_error_detail(&ctx, &request.constraint.to_string(), &error.to_string());
            }
            Err(first)
        }
    }
}

fn print_table(resolved: &[Resolution]) {
    if resolved.is_empty() {
        return;
    }

    println!("{:<20} {:<28} {}", "CONSTRAINT", "VERSION", "DIRECTORY");
    println!("{}", "-".repeat(80));

    for resolution in resolved {
        println!(
            "{:<20} {:<28} {}",
            resolution.constraint,
            resolution.version.as_deref().unwrap_or("-"),
            resolution.working_dir.display()
        );
    }
}
