//! # Load Command Implementation
//!
//! This module implements the `load` subcommand, which runs a complete
//! startup with every fragment executed in a child shell. Nothing it does
//! changes the calling shell; it is how a fragment store is checked for
//! fragments that fail, are slow, or never get loaded.
//!
//! ## Process
//!
//! 1.  **Plan**: Discover and order the fragments in the store.
//! 2.  **Pre-warm**: Fill the memory cache from the persistent cache.
//! 3.  **Load**: Run each fragment with `<shell> <fragment>` and record the
//!     outcome and duration.
//! 4.  **Report**: Print one line per fragment followed by a summary. With
//!     `--strict`, any failure makes the command exit non-zero.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use profile_fragments::executor::ShellExecutor;
use profile_fragments::output::{millis, outcome_marker, warning_prefix, OutputConfig};
use profile_fragments::phases::loading::{LoadOutcome, LoadReport};
use profile_fragments::phases::orchestrator::{self, StartupReport};
use profile_fragments::suggestions;

use super::plan::print_warnings;
use super::{resolve_plan, startup_options, CacheDirArgs, StoreArgs};

/// Run every planned fragment in a child shell and report the results
#[derive(Args, Debug)]
pub struct LoadArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub cache: CacheDirArgs,

    /// Shell used to run each fragment.
    ///
    /// Defaults to `$SHELL`, or `/bin/sh` when it is not set.
    #[arg(long, value_name = "PATH")]
    pub shell: Option<PathBuf>,

    /// Exit with an error if any fragment fails.
    #[arg(long)]
    pub strict: bool,

    /// Output in JSON format.
    #[arg(long)]
    pub json: bool,
}

/// Execute the `load` command.
pub fn execute(args: LoadArgs, output: &OutputConfig) -> Result<()> {
    let options = startup_options(&args.store, Some(&args.cache));
    // Surface a missing store or duplicate names before opening the cache
    resolve_plan(&options, true)?;

    let session = orchestrator::open_session(&options)?;
    if let Some(cache_dir) = &options.cache_dir {
        if !session.cache().is_persistent_store_available() {
            eprintln!(
                "{} {}",
                warning_prefix(output),
                suggestions::cache_unavailable(cache_dir)
            );
        }
    }

    let executor = args
        .shell
        .as_ref()
        .map(ShellExecutor::new)
        .unwrap_or_else(ShellExecutor::from_env);
    let report = orchestrator::execute_startup(&session, &options, &executor)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report, output);
        print_warnings(&report.plan, output);
    }

    let failed = report.load.failed();
    if args.strict && failed > 0 {
        anyhow::bail!(
            "{} of {} fragments failed to load",
            failed,
            report.load.fragments.len()
        );
    }
    Ok(())
}

fn print_report(report: &StartupReport, output: &OutputConfig) {
    for fragment in &report.load.fragments {
        let detail = match &fragment.outcome {
            LoadOutcome::Failed(e) => format!("  {}", e),
            _ => String::new(),
        };
        println!(
            "{} {:<16} {:>9}{}",
            outcome_marker(output, &fragment.outcome),
            fragment.name,
            millis(fragment.duration),
            detail
        );
    }
    println!();
    println!("{}", summary(report));
}

fn summary(report: &StartupReport) -> String {
    let load: &LoadReport = &report.load;
    format!(
        "{} loaded, {} failed, {} skipped in {} (cache: {}, {} entries pre-warmed)",
        load.loaded(),
        load.failed(),
        load.skipped(),
        millis(report.elapsed),
        if report.persistent_cache {
            "persistent"
        } else {
            "memory only"
        },
        report.prewarm.total()
    )
}

fn report_json(report: &StartupReport) -> serde_json::Value {
    let fragments: Vec<serde_json::Value> = report
        .load
        .fragments
        .iter()
        .map(|f| {
            let error = match &f.outcome {
                LoadOutcome::Failed(e) => Some(e.to_string()),
                _ => None,
            };
            json!({
                "name": f.name,
                "outcome": f.outcome.label(),
                "duration_ms": f.duration.as_secs_f64() * 1000.0,
                "error": error,
            })
        })
        .collect();

    json!({
        "fragments": fragments,
        "loaded": report.load.loaded(),
        "failed": report.load.failed(),
        "skipped": report.load.skipped(),
        "warnings": report.plan.warnings(),
        "cycles": report.plan.cycles(),
        "persistent_cache": report.persistent_cache,
        "prewarmed": report.prewarm.total(),
        "elapsed_ms": report.elapsed.as_secs_f64() * 1000.0,
    })
}
