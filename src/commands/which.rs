//! # Which Command Implementation
//!
//! This module implements the `which` subcommand, which answers "which
//! fragment provides this command?" and, with `--load`, prints the shell code
//! that loads it on demand.
//!
//! ## Process
//!
//! 1.  **Plan**: Discover and order the fragments in the store.
//! 2.  **Index**: Register the commands of every planned fragment without
//!     executing anything.
//! 3.  **Lookup**: Find the fragment registered for the command.
//! 4.  **Load** (`--load`): Source the fragment's unloaded dependencies and
//!     then the fragment itself, skipping anything passed in `--loaded`.
//!     The script ends by updating the shell's `PROFILE_FRAGMENTS_LOADED`.
//!
//! The stubs written by `init --lazy` call `which --load` the first time one
//! of their commands is used, passing the calling shell's list explicitly.

use anyhow::Result;
use clap::Args;

use profile_fragments::executor::ScriptExecutor;
use profile_fragments::output::{status_label, OutputConfig};
use profile_fragments::parser::CommandKind;
use profile_fragments::phases::orchestrator;
use profile_fragments::suggestions;

use super::init::{loaded_assignment, mark_already_loaded, report_failures};
use super::{resolve_plan, startup_options, CacheDirArgs, StoreArgs};

/// Show which fragment provides a command
#[derive(Args, Debug)]
pub struct WhichArgs {
    /// The command (function or alias) to look up.
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Print shell code that loads the providing fragment.
    #[arg(long)]
    pub load: bool,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub cache: CacheDirArgs,

    /// Fragments the calling shell has already sourced.
    #[arg(long, hide = true, value_delimiter = ':')]
    pub loaded: Vec<String>,
}

/// Execute the `which` command.
pub fn execute(args: WhichArgs, output: &OutputConfig) -> Result<()> {
    let options = startup_options(&args.store, Some(&args.cache));
    let plan = resolve_plan(&options, !args.load)?;
    let session = orchestrator::open_session(&options)?;
    mark_already_loaded(&session, &args.loaded);
    session.prewarm(&plan);
    session.index_commands(&plan);

    let Some(entry) = session.registry().entry(&args.command) else {
        return Err(suggestions::unknown_command(
            &args.command,
            &session.registry().command_names(),
        ));
    };

    if args.load {
        let executor = ScriptExecutor::new();
        if let Some(report) = session.load_fragment_for_command(&args.command, &plan, &executor) {
            report_failures(&report);
        }
        let mut script = executor.into_script();
        script.push_str(&loaded_assignment(&session));
        print!("{}", script);
        return Ok(());
    }

    let kind = match entry.kind {
        CommandKind::Function => "function",
        CommandKind::Alias => "alias",
    };
    let path = plan
        .get(&entry.fragment)
        .map(|f| f.path.display().to_string())
        .unwrap_or_default();
    println!(
        "{}: {} defined by '{}' ({}), {}",
        entry.command,
        kind,
        entry.fragment,
        path,
        status_label(output, session.status(&entry.fragment))
    );

    let dependencies = plan.dependency_closure(&entry.fragment);
    if !dependencies.is_empty() {
        let names: Vec<&str> = dependencies.iter().map(|f| f.name.as_str()).collect();
        println!("  loads first: {}", names.join(", "));
    }
    Ok(())
}
