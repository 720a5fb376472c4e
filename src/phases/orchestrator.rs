//! Orchestrator for a complete shell startup
//!
//! This module coordinates all phases to provide a clean API for one startup:
//! plan the fragments in a store, open a session with the configured cache,
//! pre-warm it and load everything.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::debug;

use super::loading::LoadReport;
use super::prewarm::PrewarmReport;
use super::{discovery, ordering, LoadPlan};
use crate::cache::FragmentCache;
use crate::config;
use crate::defaults::{default_cache_dir, default_store_root, BUSY_TIMEOUT};
use crate::error::Result;
use crate::executor::FragmentExecutor;
use crate::parser::ParsingMode;
use crate::session::Session;

/// Everything a startup needs to know about its environment.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    /// Directory holding the fragments and `fragments.json`
    pub store_root: PathBuf,
    /// Directory for the persistent cache; `None` runs memory-only
    pub cache_dir: Option<PathBuf>,
    /// Active environment, overriding the configured default
    pub environment: Option<String>,
    pub mode: ParsingMode,
    pub busy_timeout: Duration,
}

impl StartupOptions {
    pub fn new(store_root: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
            cache_dir: None,
            environment: None,
            mode: ParsingMode::default(),
            busy_timeout: BUSY_TIMEOUT,
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_mode(mut self, mode: ParsingMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self::new(default_store_root()).with_cache_dir(default_cache_dir())
    }
}

/// Outcome of [`execute_startup`].
#[derive(Debug, Clone)]
pub struct StartupReport {
    pub plan: LoadPlan,
    pub prewarm: PrewarmReport,
    pub load: LoadReport,
    pub persistent_cache: bool,
    pub elapsed: Duration,
}

/// Run Phases 1 and 2: discover the store and resolve the load plan.
pub fn plan(options: &StartupOptions) -> Result<LoadPlan> {
    // Phase 1: Discovery
    let fragments = discovery::execute(&options.store_root)?;

    // Phase 2: Ordering
    let config = config::load(&options.store_root);
    ordering::execute(fragments, &config, options.environment.as_deref())
}

/// Create the session a startup runs in.
pub fn open_session(options: &StartupOptions) -> Result<Session> {
    let cache = match &options.cache_dir {
        Some(dir) => FragmentCache::open(dir, options.busy_timeout),
        None => FragmentCache::memory_only(),
    };
    Session::new(cache, options.mode)
}

/// Execute a complete startup (Phases 1-4) in `session`.
///
/// This orchestrates the pipeline:
/// 1. Discover fragments in the store root
/// 2. Filter and order them
/// 3. Pre-warm the memory cache from the persistent store
/// 4. Load each fragment through `executor`
///
/// Only structurally invalid input (an unreadable store root or duplicate
/// fragment names) is an error; everything else is reported.
pub fn execute_startup(
    session: &Session,
    options: &StartupOptions,
    executor: &dyn FragmentExecutor,
) -> Result<StartupReport> {
    let started = Instant::now();

    // Phases 1-2: Discovery and Ordering
    let plan = plan(options)?;

    // Phase 3: Pre-warm
    let prewarm = session.prewarm(&plan);

    // Phase 4: Loading
    let load = session.load_all(&plan, executor);

    let report = StartupReport {
        persistent_cache: session.cache().is_persistent_store_available(),
        plan,
        prewarm,
        load,
        elapsed: started.elapsed(),
    };
    debug!(
        "Startup finished in {:?}: {} loaded, {} failed",
        report.elapsed,
        report.load.loaded(),
        report.load.failed()
    );
    Ok(report)
}
