//! Phase 3: Cache Pre-warm
//!
//! This is the third phase of a startup. Before any fragment runs, the
//! persistent cache entries for every fragment in the plan are copied into the
//! memory tier in a single batch, so the loading phase is served entirely from
//! memory for fragments that were analyzed by an earlier shell.
//!
//! ## Process
//!
//! 1.  **Candidates**: One `(path, modified)` pair per planned fragment.
//!
//! 2.  **Batch Load**: The cache keys for the active parsing mode are looked up
//!     in one read transaction. `Regex` mode caches raw content and `Ast` mode
//!     caches command lists, so only the table the loader will consult is read.
//!
//! An unavailable persistent store is not an error; the report is all zeros.

use std::path::PathBuf;

use log::debug;

use super::LoadPlan;
use crate::cache::{CacheKey, FragmentCache};
use crate::parser::ParsingMode;

/// A fragment whose cache entries are worth pre-loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheCandidate {
    pub path: PathBuf,
    pub modified_ns: i64,
}

/// How many entries a pre-warm pass copied into memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrewarmReport {
    pub content_prewarmed: usize,
    pub ast_prewarmed: usize,
}

impl PrewarmReport {
    pub fn total(&self) -> usize {
        self.content_prewarmed + self.ast_prewarmed
    }
}

/// Candidates for every fragment in `plan`, in plan order.
pub fn candidates(plan: &LoadPlan) -> Vec<CacheCandidate> {
    plan.fragments()
        .iter()
        .map(|f| CacheCandidate {
            path: f.path.clone(),
            modified_ns: f.modified_ns,
        })
        .collect()
}

/// Execute Phase 3: pre-warm `cache` for `candidates`.
pub fn execute(
    cache: &FragmentCache,
    candidates: &[CacheCandidate],
    mode: ParsingMode,
) -> PrewarmReport {
    if candidates.is_empty() || !cache.is_persistent_store_available() {
        return PrewarmReport::default();
    }

    let keys: Vec<CacheKey> = candidates
        .iter()
        .map(|c| CacheKey::new(c.path.clone(), c.modified_ns, mode))
        .collect();

    let report = match mode {
        ParsingMode::Regex => PrewarmReport {
            content_prewarmed: cache.prewarm_content(&keys),
            ast_prewarmed: 0,
        },
        ParsingMode::Ast => PrewarmReport {
            content_prewarmed: 0,
            ast_prewarmed: cache.prewarm_ast(&keys),
        },
    };

    debug!(
        "Pre-warmed {} of {} cache entries ({} mode)",
        report.total(),
        keys.len(),
        mode
    );
    report
}
