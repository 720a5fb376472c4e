//! Per-session record of which fragments have started loading

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Idempotency tracker: a fragment may begin loading at most once per session.
#[derive(Debug, Default)]
pub struct IdempotencyTracker {
    loaded: Mutex<BTreeSet<String>>,
}

impl IdempotencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically mark `name` as loaded.
    ///
    /// Returns `true` the first time it is called for a name and `false` on
    /// every later call, until [`clear_loaded`](Self::clear_loaded) resets it.
    pub fn try_begin_load(&self, name: &str) -> bool {
        self.lock().insert(name.to_string())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    /// Forget that `name` was loaded. Intended for tests and explicit resets.
    pub fn clear_loaded(&self, name: &str) -> bool {
        self.lock().remove(name)
    }

    /// Names marked so far, sorted.
    pub fn loaded(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The set stays consistent even if a holder panicked: every mutation is a
    // single insert or remove.
    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_try_begin_load_is_true_once() {
        let tracker = IdempotencyTracker::new();
        assert!(tracker.try_begin_load("git"));
        assert!(!tracker.try_begin_load("git"));
        assert!(tracker.is_loaded("git"));
        assert!(!tracker.is_loaded("env"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_clear_loaded_allows_reload() {
        let tracker = IdempotencyTracker::new();
        assert!(tracker.try_begin_load("git"));
        assert!(tracker.clear_loaded("git"));
        assert!(!tracker.clear_loaded("git"));
        assert!(tracker.try_begin_load("git"));
    }

    #[test]
    fn test_concurrent_begin_load_has_single_winner() {
        let tracker = Arc::new(IdempotencyTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || tracker.try_begin_load("prompt"))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(tracker.loaded(), vec!["prompt".to_string()]);
    }
}
