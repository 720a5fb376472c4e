//! End-to-end tests for the `cache` and `completions` commands.
//!
//! These tests invoke the actual CLI binary and validate cache command behavior
//! from a user's perspective.

mod common;
use common::prelude::*;

/// Test that cache --help flag shows help information
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_cache_help() {
    let mut cmd = cargo_bin_cmd!("profile-fragments");

    cmd.arg("cache")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Manage the persistent fragment cache"));
}

/// Test that stats on a cache that was never created says so
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_cache_stats_nonexistent() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached fragments found."));
    assert!(!fixture.cache().exists());
}

/// Test prewarm followed by stats
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_cache_prewarm_and_stats() {
    let fixture = TestFixture::new()
        .with_fragment("00-env.sh", fragments::ENV)
        .with_fragment("10-git.sh", fragments::GIT);

    fixture
        .command()
        .args(["cache", "prewarm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cached 2 of 2 fragments (regex mode"));

    fixture
        .command()
        .args(["cache", "prewarm", "--parser", "ast"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(ast mode"));

    let output = fixture
        .command()
        .args(["cache", "stats", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["exists"], true);
    assert_eq!(value["content_entries"], 2);
    assert_eq!(value["ast_entries"], 2);
}

/// Test that prewarm reports fragments it could not analyze
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_cache_prewarm_skips_unparseable() {
    let fixture = TestFixture::new()
        .with_fragment("00-env.sh", fragments::ENV)
        .with_fragment("10-oops.sh", fragments::UNPARSEABLE);

    fixture
        .command()
        .args(["cache", "prewarm", "--parser", "ast"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cached 1 of 2 fragments"))
        .stderr(predicate::str::contains("Skipped oops"));
}

/// Test clearing with --dry-run and --yes
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_cache_clear() {
    let fixture = TestFixture::new().with_fragment("00-env.sh", fragments::ENV);
    fixture.command().args(["cache", "prewarm"]).assert().success();

    fixture
        .command()
        .args(["cache", "clear", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 content, 0 command (1 total)"))
        .stdout(predicate::str::contains("no changes were made"));

    fixture
        .command()
        .args(["cache", "clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 cache entries."));

    fixture
        .command()
        .args(["cache", "clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache is already empty"));
}

/// Test that declining the confirmation keeps the cache
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_cache_clear_cancelled() {
    let fixture = TestFixture::new().with_fragment("00-env.sh", fragments::ENV);
    fixture.command().args(["cache", "prewarm"]).assert().success();

    fixture
        .command()
        .args(["cache", "clear"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Clear cancelled."));
}

/// Test that completions are generated for the binary name
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_completions_bash() {
    let mut cmd = cargo_bin_cmd!("profile-fragments");

    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("profile-fragments").and(predicate::str::contains("prewarm")));
}

/// Test that an unsupported shell is rejected by argument parsing
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_completions_invalid_shell() {
    let mut cmd = cargo_bin_cmd!("profile-fragments");

    cmd.args(["completions", "tcsh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'tcsh'"));
}
