//! Phase 4: Loading
//!
//! This is the final phase of a startup. It walks the [`LoadPlan`] in order
//! and loads each fragment into the session.
//!
//! ## Process
//!
//! For each fragment:
//!
//! 1.  **Idempotency Check**: The session's tracker admits a fragment exactly
//!     once. A fragment that was already admitted (including one currently
//!     loading further up the stack) is reported as `Skipped`.
//!
//! 2.  **Analysis**: The fragment's commands are extracted through the cache.
//!     In `Ast` mode a syntax error fails the fragment.
//!
//! 3.  **Execution**: The fragment is handed to the [`FragmentExecutor`].
//!     Errors and panics are caught and recorded; they never stop the
//!     remaining fragments from loading.
//!
//! 4.  **Registration**: The fragment's commands are added to the command
//!     registry and the fragment is marked `Loaded`.
//!
//! The same single-fragment path backs on-demand loading, where a fragment is
//! loaded the first time one of its commands is used.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::{LoadPlan, PlanWarning};
use crate::error::FragmentError;
use crate::executor::FragmentExecutor;
use crate::fragment::{Fragment, FragmentStatus};
use crate::session::Session;

/// What happened to one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// Already loaded (or loading) in this session.
    Skipped,
    Failed(FragmentError),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoadOutcome::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoadOutcome::Loaded => "loaded",
            LoadOutcome::Skipped => "skipped",
            LoadOutcome::Failed(_) => "failed",
        }
    }
}

/// Result for one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentReport {
    pub name: String,
    pub outcome: LoadOutcome,
    pub duration: Duration,
}

/// Result of a loading pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub fragments: Vec<FragmentReport>,
    pub warnings: Vec<PlanWarning>,
    pub cycles: Vec<Vec<String>>,
}

impl LoadReport {
    fn for_plan(plan: &LoadPlan) -> Self {
        Self {
            fragments: Vec::with_capacity(plan.len()),
            warnings: plan.warnings().to_vec(),
            cycles: plan.cycles().to_vec(),
        }
    }

    pub fn outcome(&self, name: &str) -> Option<&LoadOutcome> {
        self.fragments
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.outcome)
    }

    pub fn loaded(&self) -> usize {
        self.count(|o| matches!(o, LoadOutcome::Loaded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, LoadOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(LoadOutcome::is_failed)
    }

    /// Failed fragments with their errors.
    pub fn failures(&self) -> Vec<(&str, &FragmentError)> {
        self.fragments
            .iter()
            .filter_map(|r| match &r.outcome {
                LoadOutcome::Failed(e) => Some((r.name.as_str(), e)),
                _ => None,
            })
            .collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.fragments.iter().map(|r| r.duration).sum()
    }

    fn count(&self, predicate: impl Fn(&LoadOutcome) -> bool) -> usize {
        self.fragments
            .iter()
            .filter(|r| predicate(&r.outcome))
            .count()
    }

    fn record(&mut self, fragment: &Fragment, outcome: LoadOutcome, duration: Duration) {
        self.fragments.push(FragmentReport {
            name: fragment.name.clone(),
            outcome,
            duration,
        });
    }
}

/// Execute Phase 4: load every fragment in `plan`.
pub fn execute(session: &Session, plan: &LoadPlan, executor: &dyn FragmentExecutor) -> LoadReport {
    let mut report = LoadReport::for_plan(plan);
    for fragment in plan.fragments() {
        let started = Instant::now();
        let outcome = load_fragment(session, fragment, executor);
        report.record(fragment, outcome, started.elapsed());
    }
    debug!(
        "Loaded {} fragments ({} failed, {} skipped) in {:?}",
        report.loaded(),
        report.failed(),
        report.skipped(),
        report.total_duration()
    );
    report
}

/// Load a single fragment into `session`.
pub fn load_fragment(
    session: &Session,
    fragment: &Fragment,
    executor: &dyn FragmentExecutor,
) -> LoadOutcome {
    if !session.tracker().try_begin_load(&fragment.name) {
        debug!("Fragment '{}' already loaded; skipping", fragment.name);
        return LoadOutcome::Skipped;
    }
    session.set_status(&fragment.name, FragmentStatus::Loading);

    let result = session
        .analyze(fragment)
        .and_then(|commands| run_executor(executor, fragment).map(|()| commands));

    match result {
        Ok(commands) => {
            for command in &commands {
                session
                    .registry()
                    .register(&command.name, &fragment.name, command.kind);
            }
            session.set_status(&fragment.name, FragmentStatus::Loaded);
            debug!(
                "Loaded fragment '{}' ({} commands)",
                fragment.name,
                commands.len()
            );
            LoadOutcome::Loaded
        }
        Err(e) => {
            warn!("Fragment '{}' failed: {}", fragment.name, e);
            session.set_status(&fragment.name, FragmentStatus::Failed);
            LoadOutcome::Failed(e)
        }
    }
}

/// Load the fragment that defines `command`, preceded by its unloaded
/// dependencies in plan order.
///
/// Returns `None` when no fragment in `plan` is registered for `command`.
pub fn load_for_command(
    session: &Session,
    plan: &LoadPlan,
    command: &str,
    executor: &dyn FragmentExecutor,
) -> Option<LoadReport> {
    let owner_name = session.registry().lookup(command)?;
    let Some(owner) = plan.get(&owner_name) else {
        debug!(
            "Command '{}' belongs to '{}', which is not in the plan",
            command, owner_name
        );
        return None;
    };

    let mut report = LoadReport::for_plan(plan);
    for dependency in plan.dependency_closure(&owner.name) {
        if session.status(&dependency.name) != FragmentStatus::Unloaded {
            continue;
        }
        let started = Instant::now();
        let outcome = load_fragment(session, dependency, executor);
        report.record(dependency, outcome, started.elapsed());
    }

    let started = Instant::now();
    let outcome = if session.status(&owner.name) == FragmentStatus::Unloaded {
        debug!("Loading '{}' on demand for '{}'", owner.name, command);
        load_fragment(session, owner, executor)
    } else {
        LoadOutcome::Skipped
    };
    report.record(owner, outcome, started.elapsed());
    Some(report)
}

/// Register the commands of every fragment in `plan` without executing any
/// of them. Fragments that cannot be analyzed are left out.
pub fn index_commands(session: &Session, plan: &LoadPlan) -> usize {
    let mut registered = 0;
    for fragment in plan.fragments() {
        match session.analyze(fragment) {
            Ok(commands) => {
                for command in &commands {
                    session
                        .registry()
                        .register(&command.name, &fragment.name, command.kind);
                }
                registered += commands.len();
            }
            Err(e) => debug!("Not indexing '{}': {}", fragment.name, e),
        }
    }
    registered
}

fn run_executor(
    executor: &dyn FragmentExecutor,
    fragment: &Fragment,
) -> Result<(), FragmentError> {
    match panic::catch_unwind(AssertUnwindSafe(|| executor.execute(fragment))) {
        Ok(result) => result,
        Err(payload) => Err(FragmentError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
