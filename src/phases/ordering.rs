//! Phase 2: Ordering
//!
//! This is the second phase of a startup. It turns the discovered fragments
//! into a [`LoadPlan`]: the fragments to load and a deterministic order that
//! respects every declared dependency.
//!
//! ## Process
//!
//! 1.  **Filtering**: Fragments that are disabled (by name or glob in the
//!     configuration, or by an `enabled: false` directive) are dropped. When
//!     an environment is active, only fragments it selects are kept, together
//!     with everything they transitively require.
//!
//! 2.  **Dependency Warnings**: A dependency on a missing or disabled fragment
//!     is treated as satisfied and recorded as a [`PlanWarning`].
//!
//! 3.  **Cycle Containment**: Strongly connected components are found with
//!     Tarjan's algorithm. Every fragment in a cycle (including one that
//!     requires itself) is excluded and the cycle is reported. Fragments that
//!     merely depend on a cycle member are still scheduled, with a warning.
//!
//! 4.  **Topological Sort**: Kahn's algorithm over the remaining graph. The
//!     ready set is ordered by order hint, then name, then path, so the same
//!     input always produces the same plan regardless of discovery order.
//!
//! Duplicate fragment names are the only hard failure.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;

use log::{debug, warn};

use super::{describe_cycle, LoadPlan, PlanWarning};
use crate::config::{DisabledSet, FragmentConfig};
use crate::error::{Error, Result};
use crate::fragment::Fragment;

/// Execute Phase 2: filter and order `fragments`.
///
/// `environment` overrides the configuration's default environment. An
/// environment known neither to the configuration nor to any fragment's
/// `environments` directive is ignored with a warning.
pub fn execute(
    fragments: Vec<Fragment>,
    config: &FragmentConfig,
    environment: Option<&str>,
) -> Result<LoadPlan> {
    let environment = environment
        .or(config.environment.as_deref())
        .filter(|env| !env.is_empty());
    let selection = environment.and_then(|env| environment_selection(&fragments, config, env));
    build_plan(fragments, &config.disabled_set(), selection)
}

/// Order `fragments` without environment filtering.
pub fn resolve(fragments: Vec<Fragment>, disabled: &DisabledSet) -> Result<LoadPlan> {
    build_plan(fragments, disabled, None)
}

/// Names an environment selects directly, or `None` if it is unknown.
fn environment_selection(
    fragments: &[Fragment],
    config: &FragmentConfig,
    environment: &str,
) -> Option<BTreeSet<String>> {
    let tagged = fragments
        .iter()
        .filter(|f| f.environments.contains(environment))
        .map(|f| f.name.clone());
    let configured = config.environment_members(environment);

    let mut seeds: BTreeSet<String> = tagged.collect();
    let known = configured.is_some() || !seeds.is_empty();
    if !known {
        warn!(
            "Unknown environment '{}'; loading all fragments",
            environment
        );
        return None;
    }
    if let Some(members) = configured {
        seeds.extend(members.iter().cloned());
    }
    debug!(
        "Environment '{}' selects {} fragments directly",
        environment,
        seeds.len()
    );
    Some(seeds)
}

fn build_plan(
    mut fragments: Vec<Fragment>,
    disabled: &DisabledSet,
    selection: Option<BTreeSet<String>>,
) -> Result<LoadPlan> {
    fragments.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    check_duplicates(&fragments)?;

    let all_names: BTreeSet<String> = fragments.iter().map(|f| f.name.clone()).collect();
    let (active, inactive): (Vec<Fragment>, Vec<Fragment>) = fragments
        .into_iter()
        .partition(|f| f.enabled && !disabled.contains(&f.name));
    let inactive_names: BTreeSet<String> = inactive
        .iter()
        .map(|f| {
            debug!("Skipping disabled fragment '{}'", f.name);
            f.name.clone()
        })
        .collect();

    let active = match selection {
        Some(seeds) => select_with_dependencies(active, &seeds),
        None => active,
    };

    let mut warnings = dependency_warnings(&active, &all_names, &inactive_names);

    let positions: HashMap<&str, usize> = active
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.as_str(), i))
        .collect();
    let edges: Vec<Vec<usize>> = active
        .iter()
        .map(|f| {
            f.dependencies
                .iter()
                .filter_map(|dep| positions.get(dep.as_str()).copied())
                .collect()
        })
        .collect();

    let mut cyclic = vec![false; active.len()];
    let mut cycles: Vec<Vec<usize>> = strongly_connected(&edges)
        .into_iter()
        .filter(|component| match component.as_slice() {
            [single] => edges[*single].contains(single),
            _ => true,
        })
        .map(|mut component| {
            component.sort_unstable();
            component
        })
        .collect();
    cycles.sort();
    for component in &cycles {
        for &member in component {
            cyclic[member] = true;
        }
    }

    let cycle_names: Vec<Vec<String>> = cycles
        .iter()
        .map(|component| {
            component
                .iter()
                .map(|&i| active[i].name.clone())
                .collect()
        })
        .collect();
    for members in &cycle_names {
        warn!(
            "Excluding fragments in dependency cycle: {}",
            describe_cycle(members)
        );
    }

    // Kahn's algorithm; indices follow sort order so the smallest ready
    // index is the lowest hint, then name, then path.
    let mut in_degree = vec![0usize; active.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); active.len()];
    for (i, deps) in edges.iter().enumerate() {
        if cyclic[i] {
            continue;
        }
        for &dep in deps {
            if cyclic[dep] {
                let warning = PlanWarning::CyclicDependency {
                    fragment: active[i].name.clone(),
                    dependency: active[dep].name.clone(),
                };
                warn!("{}", warning);
                warnings.push(warning);
                continue;
            }
            in_degree[i] += 1;
            dependents[dep].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..active.len())
        .filter(|&i| !cyclic[i] && in_degree[i] == 0)
        .collect();
    let mut order = Vec::with_capacity(active.len());
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    let mut slots: Vec<Option<Fragment>> = active.into_iter().map(Some).collect();
    let ordered: Vec<Fragment> = order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect();

    debug!(
        "Resolved load order: {}",
        ordered
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(LoadPlan::new(ordered, warnings, cycle_names))
}

fn check_duplicates(fragments: &[Fragment]) -> Result<()> {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for fragment in fragments {
        if let Some(first) = seen.insert(&fragment.name, &fragment.path) {
            return Err(Error::DuplicateFragment {
                name: fragment.name.clone(),
                first: first.to_path_buf(),
                second: fragment.path.clone(),
            });
        }
    }
    Ok(())
}

/// Keep fragments named in `seeds` and everything they transitively require.
fn select_with_dependencies(active: Vec<Fragment>, seeds: &BTreeSet<String>) -> Vec<Fragment> {
    let by_name: HashMap<&str, &Fragment> =
        active.iter().map(|f| (f.name.as_str(), f)).collect();

    let mut selected: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<&str> = seeds
        .iter()
        .map(String::as_str)
        .filter(|name| by_name.contains_key(name))
        .collect();
    while let Some(name) = queue.pop_front() {
        if !selected.insert(name.to_string()) {
            continue;
        }
        if let Some(fragment) = by_name.get(name) {
            queue.extend(
                fragment
                    .dependencies
                    .iter()
                    .map(String::as_str)
                    .filter(|dep| by_name.contains_key(dep)),
            );
        }
    }

    active
        .into_iter()
        .filter(|f| {
            let keep = selected.contains(&f.name);
            if !keep {
                debug!("Fragment '{}' not selected by environment", f.name);
            }
            keep
        })
        .collect()
}

fn dependency_warnings(
    active: &[Fragment],
    all_names: &BTreeSet<String>,
    inactive_names: &BTreeSet<String>,
) -> Vec<PlanWarning> {
    let active_names: BTreeSet<&str> = active.iter().map(|f| f.name.as_str()).collect();
    let mut warnings = Vec::new();

    for fragment in active {
        for dep in &fragment.dependencies {
            if active_names.contains(dep.as_str()) {
                continue;
            }
            let warning = if inactive_names.contains(dep) {
                PlanWarning::DisabledDependency {
                    fragment: fragment.name.clone(),
                    dependency: dep.clone(),
                }
            } else if !all_names.contains(dep) {
                PlanWarning::MissingDependency {
                    fragment: fragment.name.clone(),
                    dependency: dep.clone(),
                }
            } else {
                continue;
            };
            match warning {
                PlanWarning::DisabledDependency { .. } => debug!("{}", warning),
                _ => warn!("{}", warning),
            }
            warnings.push(warning);
        }
    }
    warnings
}

/// Tarjan's strongly connected components over an adjacency list.
fn strongly_connected(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut tarjan = Tarjan {
        edges,
        indices: vec![None; edges.len()],
        lowlink: vec![0; edges.len()],
        on_stack: vec![false; edges.len()],
        stack: Vec::new(),
        next_index: 0,
        components: Vec::new(),
    };
    for v in 0..edges.len() {
        if tarjan.indices[v].is_none() {
            tarjan.visit(v);
        }
    }
    tarjan.components
}

struct Tarjan<'a> {
    edges: &'a [Vec<usize>],
    indices: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl Tarjan<'_> {
    fn visit(&mut self, v: usize) {
        self.indices[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        let edges = self.edges;
        for &w in &edges[v] {
            match self.indices[w] {
                None => {
                    self.visit(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                }
                Some(index) if self.on_stack[w] => {
                    self.lowlink[v] = self.lowlink[v].min(index);
                }
                Some(_) => {}
            }
        }

        if self.indices[v] == Some(self.lowlink[v]) {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
