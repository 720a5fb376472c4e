//! # Init Command Implementation
//!
//! This module implements the `init` subcommand, which prints the shell code
//! that applies a fragment store to the calling shell:
//!
//! ```bash
//! # In ~/.bashrc or ~/.zshrc
//! eval "$(profile-fragments init)"
//! ```
//!
//! ## Modes
//!
//! - **Eager** (default): Every planned fragment is sourced in load order.
//! - **Lazy** (`--lazy`): Fragments that define commands are not sourced.
//!   Instead each of their commands gets a small stub function that loads the
//!   owning fragment (and its dependencies) the first time it is called, via
//!   `profile-fragments which --load`. Fragments without commands are still
//!   sourced eagerly since they only have side effects.
//!
//! The names of fragments sourced so far are kept in the shell variable
//! `PROFILE_FRAGMENTS_LOADED` so a later on-demand load never sources a
//! fragment twice. The variable is never exported: functions and aliases are
//! not inherited, so a nested shell must start from an empty list.

use std::collections::BTreeSet;

use anyhow::Result;
use clap::Args;
use log::warn;

use profile_fragments::error::FragmentError;
use profile_fragments::executor::{shell_quote, ScriptExecutor};
use profile_fragments::phases::loading::{load_fragment, LoadOutcome, LoadReport};
use profile_fragments::phases::orchestrator;
use profile_fragments::phases::LoadPlan;
use profile_fragments::session::Session;

use super::{resolve_plan, startup_options, CacheDirArgs, StoreArgs, BINARY_NAME};

/// Shell variable holding the colon-separated names of sourced fragments.
pub const LOADED_VAR: &str = "PROFILE_FRAGMENTS_LOADED";

/// Print shell code that loads the fragment store
#[derive(Args, Debug)]
pub struct InitArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub cache: CacheDirArgs,

    /// Define stubs that load each fragment on first use instead of
    /// sourcing everything now.
    #[arg(long)]
    pub lazy: bool,

    /// Fragments this shell has already sourced.
    #[arg(long, hide = true, value_delimiter = ':')]
    pub loaded: Vec<String>,
}

/// Execute the `init` command.
pub fn execute(args: InitArgs) -> Result<()> {
    let options = startup_options(&args.store, Some(&args.cache));
    let plan = resolve_plan(&options, false)?;
    let session = orchestrator::open_session(&options)?;
    mark_already_loaded(&session, &args.loaded);
    session.prewarm(&plan);

    let script = if args.lazy {
        lazy_script(&session, &plan)
    } else {
        let executor = ScriptExecutor::new();
        let report = session.load_all(&plan, &executor);
        report_failures(&report);
        let mut script = executor.into_script();
        script.push_str(&loaded_assignment(&session));
        script
    };

    print!("{}", script);
    Ok(())
}

/// Mark fragments the calling shell has already sourced.
pub fn mark_already_loaded(session: &Session, loaded: &[String]) {
    for name in loaded.iter().filter(|n| !n.is_empty()) {
        session.mark_loaded(name);
    }
}

/// Shell-local assignment recording every fragment the session has admitted.
pub fn loaded_assignment(session: &Session) -> String {
    let loaded = session.tracker().loaded();
    if loaded.is_empty() {
        return String::new();
    }
    format!("{}={}\n", LOADED_VAR, shell_quote(&loaded.join(":")))
}

/// Fragments that failed before producing any shell code (unreadable files,
/// syntax errors in `ast` mode) are reported on stderr.
pub fn report_failures(report: &LoadReport) {
    for (name, error) in report.failures() {
        report_failure(name, error);
    }
}

fn report_failure(name: &str, error: &FragmentError) {
    warn!("Fragment '{}' was not loaded: {}", name, error);
    eprintln!("{}: fragment '{}' was not loaded: {}", BINARY_NAME, name, error);
}

/// Fragments sourced immediately in lazy mode: those without commands, and
/// everything they depend on.
fn eager_fragments(session: &Session, plan: &LoadPlan) -> BTreeSet<String> {
    let mut eager = BTreeSet::new();
    for fragment in plan.fragments() {
        if session.registry().commands_for(&fragment.name).is_empty() {
            eager.insert(fragment.name.clone());
            eager.extend(
                plan.dependency_closure(&fragment.name)
                    .into_iter()
                    .map(|f| f.name.clone()),
            );
        }
    }
    eager
}

fn lazy_script(session: &Session, plan: &LoadPlan) -> String {
    session.index_commands(plan);
    let eager = eager_fragments(session, plan);

    let executor = ScriptExecutor::new();
    let mut stubs = String::new();
    for fragment in plan.fragments() {
        if eager.contains(&fragment.name) {
            if let LoadOutcome::Failed(e) = load_fragment(session, fragment, &executor) {
                report_failure(&fragment.name, &e);
            }
        } else if !session.tracker().is_loaded(&fragment.name) {
            for entry in session.registry().commands_for(&fragment.name) {
                stubs.push_str(&stub(&entry.command));
            }
        }
    }

    let mut script = executor.into_script();
    script.push_str(&stubs);
    script.push_str(&loaded_assignment(session));
    script
}

/// A function that replaces itself with the real command on first call.
fn stub(command: &str) -> String {
    format!(
        "{cmd}() {{ unset -f {cmd}; eval \"$(command {bin} which --load --loaded=\"${{{var}-}}\" {quoted})\" && eval '{cmd} \"$@\"'; }}\n",
        cmd = command,
        bin = BINARY_NAME,
        var = LOADED_VAR,
        quoted = shell_quote(command),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use profile_fragments::parser::ParsingMode;
    use profile_fragments::phases::orchestrator::StartupOptions;
    use std::fs;
    use tempfile::TempDir;

    fn store(files: &[(&str, &str)]) -> (TempDir, LoadPlan) {
        let dir = TempDir::new().unwrap();
        for (file, body) in files {
            fs::write(dir.path().join(file), body).unwrap();
        }
        let plan = orchestrator::plan(&StartupOptions::new(dir.path())).unwrap();
        (dir, plan)
    }

    #[test]
    fn test_stub_reloads_through_which() {
        assert_eq!(
            stub("gst"),
            "gst() { unset -f gst; eval \"$(command profile-fragments which --load --loaded=\"${PROFILE_FRAGMENTS_LOADED-}\" 'gst')\" && eval 'gst \"$@\"'; }\n"
        );
    }

    #[test]
    fn test_loaded_assignment_lists_admitted_fragments() {
        let session = Session::in_memory(ParsingMode::Regex).unwrap();
        assert_eq!(loaded_assignment(&session), "");
        mark_already_loaded(&session, &["git".to_string(), String::new(), "env".to_string()]);
        assert_eq!(
            loaded_assignment(&session),
            "PROFILE_FRAGMENTS_LOADED='env:git'\n"
        );
    }

    #[test]
    fn test_lazy_script_sources_side_effects_and_stubs_commands() {
        let (_dir, plan) = store(&[
            ("00-env.sh", "export EDITOR=vi\n"),
            ("10-git.sh", "alias g=git\ngst() { git status; }\n"),
            ("20-prompt.sh", "# requires: colors\nPS1='> '\n"),
            ("15-colors.sh", "colorize() { :; }\n"),
        ]);
        let session = Session::in_memory(ParsingMode::Regex).unwrap();
        let script = lazy_script(&session, &plan);

        assert!(script.contains("00-env.sh"));
        assert!(script.contains("20-prompt.sh"));
        // Required by an eagerly sourced fragment
        assert!(script.contains("15-colors.sh"));
        assert!(!script.contains("10-git.sh"));
        assert!(script.contains("g() { unset -f g;"));
        assert!(script.contains("gst() { unset -f gst;"));
        assert!(!script.contains("colorize() { unset"));
        assert!(script.ends_with("\nPROFILE_FRAGMENTS_LOADED='colors:env:prompt'\n"));
    }

    #[test]
    fn test_lazy_script_skips_already_loaded() {
        let (_dir, plan) = store(&[
            ("00-env.sh", "export EDITOR=vi\n"),
            ("10-git.sh", "alias g=git\n"),
        ]);
        let session = Session::in_memory(ParsingMode::Regex).unwrap();
        mark_already_loaded(&session, &["env".to_string(), "git".to_string()]);

        let script = lazy_script(&session, &plan);
        assert!(!script.contains(". '"));
        assert!(!script.contains("g() {"));
    }
}
