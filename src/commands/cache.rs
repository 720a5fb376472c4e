//! # Cache Command Implementation
//!
//! This module implements the `cache` subcommand, which provides functionality
//! for managing the persistent fragment cache shared by every shell.
//!
//! ## Subcommands
//!
//! - **`stats`**: Display the location, size and row counts of the cache
//! - **`clear`**: Remove every cached entry
//! - **`prewarm`**: Analyze every planned fragment now so the next shell
//!   startup finds all of its entries in the cache

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use profile_fragments::cache::FragmentCache;
use profile_fragments::defaults::{default_cache_dir, BUSY_TIMEOUT, STORE_FILE_NAME};
use profile_fragments::session::Session;
use profile_fragments::store::StoreRows;
use profile_fragments::suggestions;

use super::{resolve_plan, startup_options, StoreArgs};

/// Manage the persistent fragment cache
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// The directory for the persistent cache.
    ///
    /// If not provided, it defaults to the system's cache directory
    /// (e.g., `~/.cache/profile-fragments` on Linux).
    /// Can also be set with the `PROFILE_FRAGMENTS_CACHE` environment variable.
    #[arg(long, value_name = "DIR", env = "PROFILE_FRAGMENTS_CACHE")]
    pub cache_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// Show cache location, size and entry counts
    Stats(StatsArgs),
    /// Remove every cached entry
    Clear(ClearArgs),
    /// Fill the cache for the current fragment plan
    Prewarm(PrewarmArgs),
}

/// Arguments for the cache stats command
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the cache clear command
#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Show what would be deleted without actually deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt and delete immediately
    #[arg(long)]
    pub yes: bool,
}

/// Arguments for the cache prewarm command
#[derive(Args, Debug)]
pub struct PrewarmArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

/// Execute the `cache` command.
pub fn execute(args: CacheArgs) -> Result<()> {
    let cache_dir = args.cache_dir.unwrap_or_else(default_cache_dir);
    match args.command {
        CacheSubcommand::Stats(stats_args) => execute_stats(&cache_dir, stats_args),
        CacheSubcommand::Clear(clear_args) => execute_clear(&cache_dir, clear_args),
        CacheSubcommand::Prewarm(prewarm_args) => execute_prewarm(&cache_dir, prewarm_args),
    }
}

/// Execute the `cache stats` command.
fn execute_stats(cache_dir: &Path, args: StatsArgs) -> Result<()> {
    let db_path = cache_dir.join(STORE_FILE_NAME);
    let rows = if db_path.exists() {
        Some(read_rows(cache_dir)?)
    } else {
        None
    };
    let size = fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    if args.json {
        let value = json!({
            "path": db_path,
            "exists": rows.is_some(),
            "size": size,
            "content_entries": rows.map(|r| r.content).unwrap_or(0),
            "ast_entries": rows.map(|r| r.ast).unwrap_or(0),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match rows {
        None => {
            println!("Cache does not exist: {}", db_path.display());
            println!("No cached fragments found.");
        }
        Some(rows) => {
            println!("Cache: {}", db_path.display());
            println!("  Size:            {}", format_size(size));
            println!("  Content entries: {}", rows.content);
            println!("  Command entries: {}", rows.ast);
        }
    }
    Ok(())
}

/// Execute the `cache clear` command.
fn execute_clear(cache_dir: &Path, args: ClearArgs) -> Result<()> {
    let db_path = cache_dir.join(STORE_FILE_NAME);
    if !db_path.exists() {
        println!("Cache does not exist: {}", db_path.display());
        println!("No cached fragments to clear.");
        return Ok(());
    }

    let rows = read_rows(cache_dir)?;
    let total = rows.content + rows.ast;
    if total == 0 {
        println!("Cache is already empty: {}", db_path.display());
        return Ok(());
    }

    println!(
        "Cache entries to be deleted: {} content, {} command ({} total)",
        rows.content, rows.ast, total
    );

    if args.dry_run {
        println!("\nDry run mode - no changes were made.");
        return Ok(());
    }

    // Confirm deletion unless --yes flag is used
    if !args.yes {
        print!("\nDo you want to delete these cache entries? (y/N): ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input != "y" && input != "yes" {
            println!("Clear cancelled.");
            return Ok(());
        }
    }

    let cache = open_cache(cache_dir)?;
    let removed = cache.clear_persistent()?;
    println!("Deleted {} cache entries.", removed);
    Ok(())
}

/// Execute the `cache prewarm` command.
fn execute_prewarm(cache_dir: &Path, args: PrewarmArgs) -> Result<()> {
    let options = startup_options(&args.store, None);
    let plan = resolve_plan(&options, true)?;
    let session = Session::new(open_cache(cache_dir)?, options.mode)?;

    let mut failed = 0;
    for fragment in plan.fragments() {
        if let Err(e) = session.analyze(fragment) {
            failed += 1;
            eprintln!("  Skipped {}: {}", fragment.name, e);
        }
    }

    let stats = session.cache().stats();
    println!(
        "Cached {} of {} fragments ({} mode, {} entries written)",
        plan.len() - failed,
        plan.len(),
        options.mode,
        stats.persistent_writes
    );
    Ok(())
}

fn open_cache(cache_dir: &Path) -> Result<FragmentCache> {
    let cache = FragmentCache::open(cache_dir, BUSY_TIMEOUT);
    if !cache.is_persistent_store_available() {
        return Err(suggestions::cache_unavailable(cache_dir));
    }
    Ok(cache)
}

fn read_rows(cache_dir: &Path) -> Result<StoreRows> {
    let cache = open_cache(cache_dir)?;
    cache
        .stats()
        .persistent_rows
        .ok_or_else(|| anyhow::anyhow!("Failed to read cache statistics"))
}

/// Format size in human-readable format
fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn prewarm_args(dir: &Path) -> PrewarmArgs {
        PrewarmArgs {
            store: StoreArgs {
                dir: Some(dir.to_path_buf()),
                environment: None,
                parser: super::super::ParserArg::Regex,
            },
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_stats_without_cache_does_not_create_it() {
        let temp = TempDir::new().unwrap();
        let cache_dir = temp.path().join("cache");
        execute_stats(&cache_dir, StatsArgs { json: false }).unwrap();
        assert!(!cache_dir.join(STORE_FILE_NAME).exists());
    }

    #[test]
    fn test_prewarm_then_clear() {
        let store = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        fs::write(store.path().join("10-env.sh"), "export A=1\n").unwrap();
        fs::write(store.path().join("20-git.sh"), "alias g=git\n").unwrap();

        execute_prewarm(cache.path(), prewarm_args(store.path())).unwrap();
        assert_eq!(read_rows(cache.path()).unwrap().content, 2);

        execute_clear(
            cache.path(),
            ClearArgs {
                dry_run: true,
                yes: true,
            },
        )
        .unwrap();
        assert_eq!(read_rows(cache.path()).unwrap().content, 2);

        execute_clear(
            cache.path(),
            ClearArgs {
                dry_run: false,
                yes: true,
            },
        )
        .unwrap();
        assert_eq!(read_rows(cache.path()).unwrap().content, 0);
    }

    #[test]
    fn test_prewarm_missing_store() {
        let temp = TempDir::new().unwrap();
        let err = execute_prewarm(temp.path(), prewarm_args(&temp.path().join("missing")))
            .unwrap_err();
        assert!(err.to_string().contains("Fragment store not found"));
    }
}
