//! Cache command - inspect and clean the checkout cache

use crate::cache::gc::format_bytes;
use crate::cache::{collect_garbage, CacheEntry, CacheLayout, PersistentMetadataCache};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{VcsError, VcsResult};
use crate::ui::UiContext;
use chrono::Duration;
use console::style;
use std::io::{self, Write};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config, cache_root: &Path) -> VcsResult<()> {
    let cache = PersistentMetadataCache::new(CacheLayout::new(cache_root));

    match args.action {
        CacheAction::List { format } => list_entries(&cache, format).await,
        CacheAction::Gc { days, dry_run } => gc_checkouts(&cache, config, days, dry_run).await,
        CacheAction::Clear { yes } => {
            let ctx = UiContext::detect().with_auto_yes(yes);
            clear_cache(&ctx, &cache).await
        }
        CacheAction::Path => {
            println!("{}", cache_root.display());
            Ok(())
        }
    }
}

/// List recorded checkouts
async fn list_entries(cache: &PersistentMetadataCache, format: OutputFormat) -> VcsResult<()> {
    let mut entries = cache.entries().await?;
    entries.sort_by(|a, b| b.last_used.cmp(&a.last_used));

    if entries.is_empty() && !matches!(format, OutputFormat::Json) {
        println!("No cached checkouts found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_entry_table(&entries),
        OutputFormat::Json => print_entry_json(&entries)?,
        OutputFormat::Plain => print_entry_plain(&entries),
    }

    Ok(())
}

fn print_entry_table(entries: &[CacheEntry]) {
    println!(
        "{:<44} {:<16} {:<24} {:<17}",
        "REPOSITORY", "CONSTRAINT", "VERSION", "LAST USED"
    );
    println!("{}", "-".repeat(104));

    for entry in entries {
        let present = entry.working_dir.exists();
        let version = if present {
            style(entry.selected_version.to_string()).green().to_string()
        } else {
            style(format!("{} (missing)", entry.selected_version)).dim().to_string()
        };

        println!(
            "{:<44} {:<16} {:<24} {:<17}",
            truncate(entry.repository.url(), 44),
            truncate(&entry.constraint.to_string(), 16),
            version,
            entry.last_used.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("Total: {} checkout(s)", entries.len());
}

fn print_entry_json(entries: &[CacheEntry]) -> VcsResult<()> {
    println!("{}", serde_json::to_string_pretty(entries)?);
    Ok(())
}

fn print_entry_plain(entries: &[CacheEntry]) {
    for entry in entries {
        println!("{}", entry.working_dir.display());
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Remove checkouts unused for longer than the configured age
async fn gc_checkouts(
    cache: &PersistentMetadataCache,
    config: &Config,
    days_override: Option<u32>,
    dry_run: bool,
) -> VcsResult<()> {
    let gc_days = days_override.unwrap_or(config.cache.gc_max_age_days);

    if gc_days == 0 {
        println!("Cache GC is disabled (gc_max_age_days = 0)");
        return Ok(());
    }

    let summary = collect_garbage(cache, Duration::days(i64::from(gc_days)), dry_run).await?;

    if summary.is_empty() {
        println!("No checkouts unused for {} days.", gc_days);
        return Ok(());
    }

    for dir in &summary.dirs_removed {
        println!("  {} {}", style("•").red(), dir.display());
    }

    if dry_run {
        println!();
        println!(
            "Dry run - would remove {} entr(ies) and {} checkout(s), freeing {}.",
            summary.entries_removed,
            summary.dirs_removed.len(),
            format_bytes(summary.bytes_freed)
        );
        return Ok(());
    }

    println!(
        "{} removed {} entr(ies) and {} checkout(s), freed {}",
        style("✓").green(),
        summary.entries_removed,
        summary.dirs_removed.len(),
        format_bytes(summary.bytes_freed)
    );

    Ok(())
}

/// Delete every checkout and entry under the cache root
async fn clear_cache(ctx: &UiContext, cache: &PersistentMetadataCache) -> VcsResult<()> {
    let layout = cache.layout();
    let targets = [layout.checkouts_dir(), layout.entries_dir(), layout.locks_dir()];

    let mut existing = vec![];
    for target in targets {
        if fs::try_exists(&target).await.unwrap_or(false) {
            existing.push(target);
        }
    }

    if existing.is_empty() {
        println!("Cache at {} is already empty.", layout.root().display());
        return Ok(());
    }

    let entries = cache.entries().await?.len();
    println!(
        "This will remove {} cache entr(ies) and every checkout under {}",
        entries,
        layout.root().display()
    );
    println!();

    if !ctx.auto_yes() {
        if !ctx.is_interactive() {
            return Err(VcsError::User(
                "Refusing to clear the cache without confirmation".to_string(),
            ));
        }

        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    for target in existing {
        debug!("Removing {}", target.display());
        fs::remove_dir_all(&target)
            .await
            .map_err(|e| VcsError::io(format!("removing {}", target.display()), e))?;
    }

    println!(
        "{} cleared cache at {}",
        style("✓").green(),
        layout.root().display()
    );

    Ok(())
}
