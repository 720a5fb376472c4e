//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `profile-fragments` command-line tool. Each subcommand is defined in its
//! own file to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic.
//!
//! Arguments shared by several commands (where the fragment store and cache
//! live, which environment and parser to use) are defined here.

pub mod cache;
pub mod completions;
pub mod init;
pub mod load;
pub mod plan;
pub mod which;

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use profile_fragments::defaults::{default_cache_dir, default_store_root, BUSY_TIMEOUT};
use profile_fragments::error::Error;
use profile_fragments::parser::ParsingMode;
use profile_fragments::phases::orchestrator::{self, StartupOptions};
use profile_fragments::phases::LoadPlan;
use profile_fragments::suggestions;

/// Name the binary is invoked by in generated shell code.
pub const BINARY_NAME: &str = "profile-fragments";

/// Parser selection for the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ParserArg {
    /// Line-oriented regex scan
    #[default]
    Regex,
    /// Structural parse; rejects fragments with syntax errors
    Ast,
}

impl From<ParserArg> for ParsingMode {
    fn from(arg: ParserArg) -> Self {
        match arg {
            ParserArg::Regex => ParsingMode::Regex,
            ParserArg::Ast => ParsingMode::Ast,
        }
    }
}

/// Where the fragments are and which of them to use
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// The fragment store directory.
    ///
    /// Defaults to `~/.config/profile-fragments/fragments.d` on Linux.
    /// Can also be set with the `PROFILE_FRAGMENTS_DIR` environment variable.
    #[arg(short = 'd', long = "dir", value_name = "DIR", env = "PROFILE_FRAGMENTS_DIR")]
    pub dir: Option<PathBuf>,

    /// Active environment (a named subset of fragments).
    #[arg(
        short = 'e',
        long,
        value_name = "NAME",
        env = "PROFILE_FRAGMENTS_ENV"
    )]
    pub environment: Option<String>,

    /// How fragment commands are extracted.
    #[arg(
        long,
        value_enum,
        value_name = "MODE",
        env = "PROFILE_FRAGMENTS_PARSER",
        default_value = "regex",
        ignore_case = true
    )]
    pub parser: ParserArg,
}

impl StoreArgs {
    pub fn store_root(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_store_root)
    }
}

/// Where the persistent cache lives
#[derive(Args, Debug, Clone)]
pub struct CacheDirArgs {
    /// The directory for the persistent cache.
    ///
    /// Defaults to `~/.cache/profile-fragments` on Linux.
    /// Can also be set with the `PROFILE_FRAGMENTS_CACHE` environment variable.
    #[arg(long, value_name = "DIR", env = "PROFILE_FRAGMENTS_CACHE")]
    pub cache_dir: Option<PathBuf>,

    /// Do not use the persistent cache for this run.
    #[arg(long)]
    pub no_cache: bool,
}

impl CacheDirArgs {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }
}

/// Startup options for a command from its store and cache arguments.
pub fn startup_options(store: &StoreArgs, cache: Option<&CacheDirArgs>) -> StartupOptions {
    StartupOptions {
        store_root: store.store_root(),
        cache_dir: cache.filter(|c| !c.no_cache).map(CacheDirArgs::cache_dir),
        environment: store.environment.clone().filter(|e| !e.is_empty()),
        mode: store.parser.into(),
        busy_timeout: BUSY_TIMEOUT,
    }
}

/// Resolve the load plan, turning structural errors into hinted messages.
///
/// With `require_store`, a missing store root is an error instead of an
/// empty plan.
pub fn resolve_plan(options: &StartupOptions, require_store: bool) -> anyhow::Result<LoadPlan> {
    if require_store && !options.store_root.exists() {
        return Err(suggestions::store_not_found(&options.store_root));
    }
    orchestrator::plan(options).map_err(|e| match e {
        Error::DuplicateFragment {
            name,
            first,
            second,
        } => suggestions::duplicate_fragment(&name, &first, &second),
        other => anyhow::Error::new(other).context(format!(
            "Failed to plan fragments in {}",
            options.store_root.display()
        )),
    })
}
