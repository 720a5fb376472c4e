//! # Plan Command Implementation
//!
//! This module implements the `plan` subcommand, which shows which fragments
//! a startup would load and in what order, without executing any of them.
//!
//! ## Functionality
//!
//! - **Ordered List**: Each planned fragment with its file and dependencies
//! - **Dependency Tree**: `--tree` renders each fragment with the fragments it
//!   requires nested below it
//! - **JSON Output**: `--json` for scripting
//! - **Warnings**: Missing, disabled and cyclic dependencies are reported
//!
//! This command is a safe, read-only operation.

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, TreeItem};
use serde_json::json;

use profile_fragments::output::{warning_prefix, OutputConfig};
use profile_fragments::phases::{describe_cycle, LoadPlan};

use super::{resolve_plan, startup_options, StoreArgs};

/// Show the fragments a startup would load, in order
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Show dependencies as a tree.
    #[arg(long, conflicts_with = "json")]
    pub tree: bool,

    /// Output in JSON format.
    #[arg(long)]
    pub json: bool,
}

/// Execute the `plan` command.
pub fn execute(args: PlanArgs, output: &OutputConfig) -> Result<()> {
    let options = startup_options(&args.store, None);
    let plan = resolve_plan(&options, true)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan_json(&plan))?);
        return Ok(());
    }

    if plan.is_empty() {
        println!(
            "No fragments to load in {}",
            options.store_root.display()
        );
    } else if args.tree {
        for root in dependency_roots(&plan) {
            print_tree(&build_tree_node(&plan, root, &mut Vec::new()))
                .map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;
        }
    } else {
        println!(
            "Load order for {} ({} fragments):",
            options.store_root.display(),
            plan.len()
        );
        let width = plan.len().to_string().len();
        for (index, fragment) in plan.fragments().iter().enumerate() {
            let requires = if fragment.dependencies.is_empty() {
                String::new()
            } else {
                let deps: Vec<&str> = fragment.dependencies.iter().map(String::as_str).collect();
                format!("  (requires: {})", deps.join(", "))
            };
            println!(
                "  {:>width$}. {:<16} {}{}",
                index + 1,
                fragment.name,
                fragment.path.display(),
                requires,
                width = width
            );
        }
    }

    print_warnings(&plan, output);
    Ok(())
}

/// Print plan warnings and excluded cycles to stderr.
pub fn print_warnings(plan: &LoadPlan, output: &OutputConfig) {
    for warning in plan.warnings() {
        eprintln!("{} {}", warning_prefix(output), warning);
    }
    for cycle in plan.cycles() {
        eprintln!(
            "{} dependency cycle excluded: {}",
            warning_prefix(output),
            describe_cycle(cycle)
        );
    }
}

fn plan_json(plan: &LoadPlan) -> serde_json::Value {
    let fragments: Vec<serde_json::Value> = plan
        .fragments()
        .iter()
        .enumerate()
        .map(|(index, f)| {
            json!({
                "position": index + 1,
                "name": f.name,
                "path": f.path,
                "dependencies": f.dependencies,
                "environments": f.environments,
            })
        })
        .collect();

    json!({
        "fragments": fragments,
        "warnings": plan.warnings(),
        "cycles": plan.cycles(),
    })
}

/// Fragments no other planned fragment depends on, in plan order.
fn dependency_roots(plan: &LoadPlan) -> Vec<&str> {
    plan.fragments()
        .iter()
        .filter(|candidate| {
            !plan
                .fragments()
                .iter()
                .any(|f| f.dependencies.contains(&candidate.name))
        })
        .map(|f| f.name.as_str())
        .collect()
}

fn build_tree_node(plan: &LoadPlan, name: &str, path: &mut Vec<String>) -> TreeNode {
    let Some(fragment) = plan.get(name) else {
        return TreeNode {
            label: format!("{} (not loaded)", name),
            children: vec![],
        };
    };

    path.push(name.to_string());
    let pending: Vec<&String> = fragment
        .dependencies
        .iter()
        .filter(|dep| !path.contains(dep))
        .collect();
    let children = pending
        .into_iter()
        .map(|dep| build_tree_node(plan, dep, path))
        .collect();
    path.pop();

    TreeNode {
        label: format!("{} ({})", fragment.name, fragment.path.display()),
        children,
    }
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
