//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_fragment("10-git.sh", fragments::GIT);
//!     fixture.command().arg("plan").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::fragments;
    pub use super::TestFixture;
}

/// Common fragment bodies for testing.
#[allow(dead_code)]
pub mod fragments {
    /// Environment setup with no commands.
    pub const ENV: &str = "export EDITOR=vi\nexport PAGER=less\n";

    /// Git helpers: one alias, one function, requires `env`.
    pub const GIT: &str = "# requires: env\nalias g=git\ngst() {\n  git status \"$@\"\n}\n";

    /// A prompt that requires `git`.
    pub const PROMPT: &str = "# requires: git\nPS1='$ '\n";

    /// A fragment that always fails when run.
    pub const BROKEN: &str = "echo 'broken fragment' >&2\nexit 3\n";

    /// A fragment with a syntax error (unterminated quote).
    pub const UNPARSEABLE: &str = "oops() {\n  echo 'unterminated\n}\n";
}

/// A temporary fragment store plus a separate cache directory.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_fragment("00-env.sh", fragments::ENV)
///     .with_config(r#"{ "disabled": ["slow"] }"#);
///
/// fixture.command().arg("plan").assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new fixture with an empty fragment store.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        temp_dir
            .child("fragments.d")
            .create_dir_all()
            .expect("Failed to create store directory");
        Self { temp_dir }
    }

    /// Add a fragment file with the given name and content.
    pub fn with_fragment(self, file: &str, content: &str) -> Self {
        self.temp_dir
            .child("fragments.d")
            .child(file)
            .write_str(content)
            .expect("Failed to write fragment");
        self
    }

    /// Add a `fragments.json` configuration file with the given content.
    #[allow(dead_code)]
    pub fn with_config(self, content: &str) -> Self {
        self.with_fragment("fragments.json", content)
    }

    /// The fragment store directory.
    pub fn store(&self) -> PathBuf {
        self.temp_dir.path().join("fragments.d")
    }

    /// The persistent cache directory.
    pub fn cache(&self) -> PathBuf {
        self.temp_dir.path().join("cache")
    }

    /// Get the path to the temporary directory.
    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A command for the binary with the store, cache and a quiet
    /// environment set up.
    #[allow(dead_code)]
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("profile-fragments");
        cmd.env("PROFILE_FRAGMENTS_DIR", self.store())
            .env("PROFILE_FRAGMENTS_CACHE", self.cache())
            .env("SHELL", "/bin/sh")
            .env("NO_COLOR", "1")
            .env_remove("PROFILE_FRAGMENTS_ENV")
            .env_remove("PROFILE_FRAGMENTS_PARSER")
            .env_remove("PROFILE_FRAGMENTS_LOADED")
            .env_remove("PROFILE_FRAGMENTS_DEBUG");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
