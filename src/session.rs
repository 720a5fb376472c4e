//! # Session
//!
//! A [`Session`] is everything one process knows about its fragments: the
//! idempotency tracker, the command registry, the status of each fragment and
//! the two-tier cache. It is created once per process and passed explicitly
//! to every operation that reads or changes that state.
//!
//! All interior state is behind `std::sync::Mutex`, so a session is `Sync`
//! and check-and-set operations stay atomic if loading is ever parallelized.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::cache::{CacheKey, FragmentCache};
use crate::error::{FragmentError, Result};
use crate::executor::FragmentExecutor;
use crate::fragment::{Fragment, FragmentStatus};
use crate::parser::{parse_commands, CommandScanner, ExposedCommand, ParsingMode};
use crate::phases::loading::{self, LoadReport};
use crate::phases::prewarm::{self, PrewarmReport};
use crate::phases::LoadPlan;
use crate::registry::CommandRegistry;
use crate::tracker::IdempotencyTracker;

/// Per-process fragment state.
#[derive(Debug)]
pub struct Session {
    tracker: IdempotencyTracker,
    registry: CommandRegistry,
    cache: FragmentCache,
    statuses: Mutex<HashMap<String, FragmentStatus>>,
    scanner: CommandScanner,
    mode: ParsingMode,
}

impl Session {
    pub fn new(cache: FragmentCache, mode: ParsingMode) -> Result<Self> {
        Ok(Self {
            tracker: IdempotencyTracker::new(),
            registry: CommandRegistry::new(),
            cache,
            statuses: Mutex::new(HashMap::new()),
            scanner: CommandScanner::new()?,
            mode,
        })
    }

    /// A session with a memory-only cache.
    pub fn in_memory(mode: ParsingMode) -> Result<Self> {
        Self::new(FragmentCache::memory_only(), mode)
    }

    pub fn tracker(&self) -> &IdempotencyTracker {
        &self.tracker
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &FragmentCache {
        &self.cache
    }

    pub fn mode(&self) -> ParsingMode {
        self.mode
    }

    /// Status of `name`; fragments never seen are `Unloaded`.
    pub fn status(&self, name: &str) -> FragmentStatus {
        self.lock_statuses()
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn set_status(&self, name: &str, status: FragmentStatus) {
        self.lock_statuses().insert(name.to_string(), status);
    }

    /// Record `name` as loaded by an earlier process without executing it.
    ///
    /// Returns `false` if the tracker had already admitted it.
    pub fn mark_loaded(&self, name: &str) -> bool {
        if !self.tracker.try_begin_load(name) {
            return false;
        }
        self.set_status(name, FragmentStatus::Loaded);
        true
    }

    /// Every status recorded so far, sorted by fragment name.
    pub fn statuses(&self) -> BTreeMap<String, FragmentStatus> {
        self.lock_statuses()
            .iter()
            .map(|(name, status)| (name.clone(), *status))
            .collect()
    }

    /// Commands `fragment` defines, served from the cache when possible.
    ///
    /// In `Regex` mode the raw content is cached and scanned on every call; in
    /// `Ast` mode the parsed command list itself is cached. A parse failure is
    /// returned and nothing is cached for the fragment.
    pub fn analyze(&self, fragment: &Fragment) -> std::result::Result<Vec<ExposedCommand>, FragmentError> {
        let key = CacheKey::for_fragment(fragment, self.mode);
        match self.mode {
            ParsingMode::Regex => {
                let content = match self.cache.get_content(&key) {
                    Some(content) => content,
                    None => {
                        let content = read_fragment(fragment)?;
                        self.cache.set_content(&key, &content);
                        content
                    }
                };
                Ok(self.scanner.scan(&content))
            }
            ParsingMode::Ast => {
                if let Some(commands) = self.cache.get_ast(&key) {
                    return Ok(commands);
                }
                let content = read_fragment(fragment)?;
                let commands = parse_commands(&content)?;
                self.cache.set_ast(&key, &commands);
                Ok(commands)
            }
        }
    }

    /// Pre-warm the memory tier for every fragment in `plan`.
    pub fn prewarm(&self, plan: &LoadPlan) -> PrewarmReport {
        prewarm::execute(&self.cache, &prewarm::candidates(plan), self.mode)
    }

    /// Load every fragment in `plan`, in order.
    pub fn load_all(&self, plan: &LoadPlan, executor: &dyn FragmentExecutor) -> LoadReport {
        loading::execute(self, plan, executor)
    }

    /// Load the fragment that defines `command`, after its unloaded
    /// dependencies. Returns `None` if no fragment in `plan` defines it.
    pub fn load_fragment_for_command(
        &self,
        command: &str,
        plan: &LoadPlan,
        executor: &dyn FragmentExecutor,
    ) -> Option<LoadReport> {
        loading::load_for_command(self, plan, command, executor)
    }

    /// Register the commands of every fragment in `plan` without executing
    /// anything. Returns the number of commands registered.
    pub fn index_commands(&self, plan: &LoadPlan) -> usize {
        loading::index_commands(self, plan)
    }

    fn lock_statuses(&self) -> MutexGuard<'_, HashMap<String, FragmentStatus>> {
        self.statuses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_fragment(fragment: &Fragment) -> std::result::Result<String, FragmentError> {
    debug!("Reading fragment {}", fragment.path.display());
    fs::read_to_string(&fragment.path).map_err(|e| FragmentError::Read {
        path: fragment.path.clone(),
        message: e.to_string(),
    })
}
