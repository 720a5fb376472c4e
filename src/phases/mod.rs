//! Implementation of the phases of a shell startup.
//!
//! ## Overview
//!
//! A startup runs these phases in order:
//! 1. Discovery - List fragment files in the store root and read their header directives
//! 2. Ordering - Filter by configuration and environment, then compute a deterministic load order
//! 3. Pre-warm - Bulk-load persistent cache entries for the plan into the memory tier
//! 4. Loading - Execute each fragment at most once, isolating failures, and register its commands
//!
//! Phases 1 and 2 produce an immutable [`LoadPlan`]; phases 3 and 4 operate on
//! a [`Session`](crate::session::Session), which owns all per-process state.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use serde::Serialize;

use crate::error::Error;
use crate::fragment::Fragment;

pub mod discovery;
pub mod loading;
pub mod orchestrator;
pub mod ordering;
pub mod prewarm;

/// A resolver warning. None of these stop a fragment from loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanWarning {
    /// The dependency names no discovered fragment.
    MissingDependency { fragment: String, dependency: String },
    /// The dependency exists but is disabled.
    DisabledDependency { fragment: String, dependency: String },
    /// The dependency was excluded as part of a cycle.
    CyclicDependency { fragment: String, dependency: String },
}

impl PlanWarning {
    pub fn fragment(&self) -> &str {
        match self {
            PlanWarning::MissingDependency { fragment, .. }
            | PlanWarning::DisabledDependency { fragment, .. }
            | PlanWarning::CyclicDependency { fragment, .. } => fragment,
        }
    }
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanWarning::MissingDependency {
                fragment,
                dependency,
            } => write!(f, "{} requires missing fragment '{}'", fragment, dependency),
            PlanWarning::DisabledDependency {
                fragment,
                dependency,
            } => write!(f, "{} requires disabled fragment '{}'", fragment, dependency),
            PlanWarning::CyclicDependency {
                fragment,
                dependency,
            } => write!(
                f,
                "{} requires '{}', which is part of a dependency cycle",
                fragment, dependency
            ),
        }
    }
}

/// Ordered, immutable result of resolving one discovery snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadPlan {
    fragments: Vec<Fragment>,
    warnings: Vec<PlanWarning>,
    cycles: Vec<Vec<String>>,
}

impl LoadPlan {
    pub fn new(
        fragments: Vec<Fragment>,
        warnings: Vec<PlanWarning>,
        cycles: Vec<Vec<String>>,
    ) -> Self {
        Self {
            fragments,
            warnings,
            cycles,
        }
    }

    /// Fragments in load order.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn names(&self) -> Vec<&str> {
        self.fragments.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fragments.iter().position(|f| f.name == name)
    }

    pub fn warnings(&self) -> &[PlanWarning] {
        &self.warnings
    }

    /// Members of each excluded cycle, one entry per strongly connected
    /// component.
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    pub fn cycle_errors(&self) -> Vec<Error> {
        self.cycles
            .iter()
            .map(|members| Error::CycleDetected {
                cycle: describe_cycle(members),
            })
            .collect()
    }

    /// Transitive dependencies of `name` that are part of this plan, in plan
    /// order. `name` itself is not included.
    pub fn dependency_closure(&self, name: &str) -> Vec<&Fragment> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        if let Some(root) = self.get(name) {
            queue.extend(root.dependencies.iter().cloned());
        }

        while let Some(dep) = queue.pop_front() {
            if dep == name || !seen.insert(dep.clone()) {
                continue;
            }
            if let Some(fragment) = self.get(&dep) {
                queue.extend(fragment.dependencies.iter().cloned());
            }
        }

        self.fragments
            .iter()
            .filter(|f| seen.contains(&f.name))
            .collect()
    }
}

/// Render a cycle as `a -> b -> a`.
pub fn describe_cycle(members: &[String]) -> String {
    match members.first() {
        Some(first) => {
            let mut parts: Vec<&str> = members.iter().map(String::as_str).collect();
            parts.push(first);
            parts.join(" -> ")
        }
        None => String::new(),
    }
}
