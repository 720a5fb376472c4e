//! End-to-end tests for the `plan` command.
//!
//! These tests invoke the actual CLI binary and validate the reported load
//! order from a user's perspective.

mod common;
use common::prelude::*;

/// Test that plan --help flag shows help information
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_plan_help() {
    let mut cmd = cargo_bin_cmd!("profile-fragments");

    cmd.arg("plan")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Show the fragments a startup would load",
        ));
}

/// Test that dependencies are listed before their dependents
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_plan_orders_dependencies_first() {
    let fixture = TestFixture::new()
        .with_fragment("05-prompt.sh", fragments::PROMPT)
        .with_fragment("10-git.sh", fragments::GIT)
        .with_fragment("20-env.sh", fragments::ENV);

    fixture
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?s)1\. env .*2\. git .*3\. prompt").unwrap())
        .stdout(predicate::str::contains("(requires: env)"));
}

/// Test that disabled fragments are left out and reported as warnings
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_plan_disabled_dependency_warns() {
    let fixture = TestFixture::new()
        .with_fragment("00-env.sh", fragments::ENV)
        .with_fragment("10-git.sh", fragments::GIT)
        .with_config(r#"{ "disabled": ["env"] }"#);

    fixture
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("git"))
        .stdout(predicate::str::contains("00-env.sh").not())
        .stderr(predicate::str::contains(
            "warning: git requires disabled fragment 'env'",
        ));
}

/// Test that cycles are excluded without stopping the rest of the plan
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_plan_excludes_cycles() {
    let fixture = TestFixture::new()
        .with_fragment("00-env.sh", fragments::ENV)
        .with_fragment("10-a.sh", "# requires: b\n")
        .with_fragment("20-b.sh", "# requires: a\n");

    fixture
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 fragments"))
        .stderr(predicate::str::contains("dependency cycle excluded: a -> b -> a"));
}

/// Test that an environment limits the plan to its members
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_plan_environment_flag() {
    let fixture = TestFixture::new()
        .with_fragment("00-env.sh", fragments::ENV)
        .with_fragment("10-git.sh", fragments::GIT)
        .with_fragment("20-prompt.sh", fragments::PROMPT)
        .with_config(r#"{ "environments": { "minimal": ["env"] } }"#);

    fixture
        .command()
        .args(["plan", "--environment", "minimal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 fragments"))
        .stdout(predicate::str::contains("prompt").not());
}

/// Test JSON output for scripting
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_plan_json() {
    let fixture = TestFixture::new()
        .with_fragment("00-env.sh", fragments::ENV)
        .with_fragment("10-git.sh", "# requires: env, ghost\n");

    let output = fixture
        .command()
        .args(["plan", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["fragments"][0]["name"], "env");
    assert_eq!(value["fragments"][1]["dependencies"][1], "ghost");
    assert_eq!(value["warnings"][0]["kind"], "missing_dependency");
    assert_eq!(value["warnings"][0]["dependency"], "ghost");
}

/// Test the dependency tree view
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_plan_tree() {
    let fixture = TestFixture::new()
        .with_fragment("00-env.sh", fragments::ENV)
        .with_fragment("10-git.sh", fragments::GIT)
        .with_fragment("20-prompt.sh", fragments::PROMPT);

    fixture
        .command()
        .args(["plan", "--tree"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prompt ("))
        .stdout(predicate::str::contains("git ("))
        .stdout(predicate::str::contains("env ("));
}

/// Test that the first of two files with the same fragment name wins
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_plan_duplicate_names_keep_first() {
    let fixture = TestFixture::new()
        .with_fragment("10-git.sh", fragments::GIT)
        .with_fragment("20-git.zsh", fragments::GIT)
        .with_fragment("00-env.sh", fragments::ENV);

    fixture
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("10-git.sh"))
        .stdout(predicate::str::contains("20-git.zsh").not())
        .stderr(predicate::str::contains("already defined"));
}

/// Test that a missing store is an error with hints
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_plan_missing_store() {
    let temp = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("profile-fragments");

    cmd.arg("plan")
        .arg("--dir")
        .arg(temp.child("missing").path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Fragment store not found"))
        .stderr(predicate::str::contains("PROFILE_FRAGMENTS_DIR"));
}
