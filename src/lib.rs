//! # Profile Fragments Library
//!
//! This library provides the fragment loading and caching engine behind the
//! `profile-fragments` command-line tool. A shell profile is split into
//! independent "fragments" (small scripts) kept in one directory; the engine
//! decides which of them to load, in what order, and keeps the work needed to
//! do so cheap across many shell launches.
//!
//! ## Quick Example
//!
//! ```
//! use profile_fragments::config::DisabledSet;
//! use profile_fragments::fragment::Fragment;
//! use profile_fragments::phases::ordering::resolve;
//!
//! let fragments = vec![
//!     Fragment::new("prompt", "/profile/20-prompt.sh").with_dependencies(["git"]),
//!     Fragment::new("git", "/profile/10-git.sh"),
//! ];
//!
//! let plan = resolve(fragments, &DisabledSet::default()).unwrap();
//! assert_eq!(plan.names(), vec!["git", "prompt"]);
//! ```
//!
//! ## Core Concepts
//!
//! - **Fragments (`fragment`, `parser`)**: A fragment's name, order hint and
//!   declared dependencies come from its file name and header comments; the
//!   commands it defines are extracted by a regex scan or a structural parse.
//! - **Configuration (`config`)**: The optional `fragments.json` lists
//!   disabled fragments and named environments.
//! - **Cache (`cache`, `store`)**: A two-tier cache of fragment content and
//!   command lists. The memory tier lives for one process; the SQLite tier is
//!   shared by every shell on the host.
//! - **Session (`session`, `tracker`, `registry`)**: Per-process state. Each
//!   fragment loads at most once, and every exposed command maps back to the
//!   fragment that defines it so fragments can also be loaded on demand.
//! - **Execution (`executor`)**: How a fragment actually takes effect is
//!   pluggable; the CLI renders a sourcing script for the user's shell.
//!
//! ## Execution Flow
//!
//! The main entry point is `phases::orchestrator`, which executes:
//!
//! 1.  **Discovery**: List the store root and read header directives.
//! 2.  **Ordering**: Apply the disabled set and active environment, exclude
//!     dependency cycles and compute a deterministic load order.
//! 3.  **Pre-warm**: Copy persistent cache entries for the plan into memory in
//!     one batch.
//! 4.  **Loading**: Execute each fragment, isolating failures, and register
//!     its commands.

pub mod cache;
pub mod config;
pub mod defaults;
pub mod error;
pub mod executor;
pub mod fragment;
pub mod output;
pub mod parser;
pub mod phases;
pub mod registry;
pub mod session;
pub mod store;
pub mod suggestions;
pub mod tracker;

#[cfg(test)]
mod resolver_proptest;
