//! # Fragment Execution
//!
//! The loader never runs a fragment itself; it hands each one to a
//! [`FragmentExecutor`]. This keeps the ordering, caching and idempotency
//! logic independent of how a fragment actually takes effect, and lets tests
//! substitute a closure that records calls or fails on demand.
//!
//! Two implementations ship with the crate:
//!
//! - **`ShellExecutor`**: runs each fragment in a child shell and reports a
//!   non-zero exit status as a failure. Used to check that fragments are
//!   runnable.
//! - **`ScriptExecutor`**: renders a sourcing script for the user's own
//!   interactive shell, which is how fragments are applied at startup:
//!   `eval "$(profile-fragments init)"`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};

use log::debug;

use crate::error::FragmentError;
use crate::fragment::Fragment;

/// Executes one fragment.
pub trait FragmentExecutor: Send + Sync {
    fn execute(&self, fragment: &Fragment) -> Result<(), FragmentError>;
}

impl<F> FragmentExecutor for F
where
    F: Fn(&Fragment) -> Result<(), FragmentError> + Send + Sync,
{
    fn execute(&self, fragment: &Fragment) -> Result<(), FragmentError> {
        self(fragment)
    }
}

/// Runs each fragment with `<shell> <path>` in a child process.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: PathBuf,
}

impl ShellExecutor {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Use `$SHELL`, falling back to `/bin/sh`.
    pub fn from_env() -> Self {
        let shell = std::env::var_os("SHELL")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/bin/sh"));
        Self::new(shell)
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }
}

impl FragmentExecutor for ShellExecutor {
    fn execute(&self, fragment: &Fragment) -> Result<(), FragmentError> {
        debug!(
            "Running {} with {}",
            fragment.path.display(),
            self.shell.display()
        );
        let output = Command::new(&self.shell)
            .arg(&fragment.path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                FragmentError::execution(format!(
                    "failed to start {}: {}",
                    self.shell.display(),
                    e
                ))
            })?;

        if output.status.success() {
            return Ok(());
        }

        Err(FragmentError::Exit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Collects a POSIX sourcing script instead of running anything.
///
/// Each fragment becomes a guarded `.` command so one failing fragment does
/// not abort the rest of the script in the user's shell.
#[derive(Debug, Default)]
pub struct ScriptExecutor {
    script: Mutex<String>,
}

impl ScriptExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The script rendered so far.
    pub fn script(&self) -> String {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn into_script(self) -> String {
        self.script
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl FragmentExecutor for ScriptExecutor {
    fn execute(&self, fragment: &Fragment) -> Result<(), FragmentError> {
        let path = fragment.path.to_str().ok_or_else(|| {
            FragmentError::execution(format!(
                "path is not valid UTF-8: {}",
                fragment.path.display()
            ))
        })?;

        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        script.push_str(&format!(
            "if ! . {path}; then\n  printf 'profile-fragments: fragment %s failed\\n' {name} >&2\nfi\n",
            path = shell_quote(path),
            name = shell_quote(&fragment.name),
        ));
        Ok(())
    }
}

/// Quote `value` for a POSIX shell.
///
/// ```
/// use profile_fragments::executor::shell_quote;
///
/// assert_eq!(shell_quote("it's"), r"'it'\''s'");
/// ```
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Restores `SHELL` when dropped.
    struct ShellVar(Option<std::ffi::OsString>);

    impl ShellVar {
        fn set(value: Option<&str>) -> Self {
            let previous = std::env::var_os("SHELL");
            match value {
                Some(v) => std::env::set_var("SHELL", v),
                None => std::env::remove_var("SHELL"),
            }
            Self(previous)
        }
    }

    impl Drop for ShellVar {
        fn drop(&mut self) {
            match &self.0 {
                Some(v) => std::env::set_var("SHELL", v),
                None => std::env::remove_var("SHELL"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_env_uses_shell_variable() {
        let _guard = ShellVar::set(Some("/usr/bin/zsh"));
        assert_eq!(ShellExecutor::from_env().shell(), Path::new("/usr/bin/zsh"));
    }

    #[test]
    #[serial]
    fn test_from_env_falls_back_to_sh() {
        let _guard = ShellVar::set(None);
        assert_eq!(ShellExecutor::from_env().shell(), Path::new("/bin/sh"));

        let _guard = ShellVar::set(Some(""));
        assert_eq!(ShellExecutor::from_env().shell(), Path::new("/bin/sh"));
    }

    fn write_fragment(dir: &TempDir, file: &str, body: &str) -> Fragment {
        let path = dir.path().join(file);
        std::fs::write(&path, body).unwrap();
        Fragment::new(file.trim_end_matches(".sh"), path)
    }

    #[test]
    fn test_closure_executor() {
        let calls = AtomicUsize::new(0);
        let executor = |_: &Fragment| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<(), FragmentError>(())
        };
        let fragment = Fragment::new("env", "/f/env.sh");
        executor.execute(&fragment).unwrap();
        executor.execute(&fragment).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_script_executor_renders_guarded_source() {
        let executor = ScriptExecutor::new();
        executor
            .execute(&Fragment::new("git", "/profile/10-git.sh"))
            .unwrap();
        executor
            .execute(&Fragment::new("o'brien", "/profile/o'brien.sh"))
            .unwrap();

        let script = executor.into_script();
        assert!(script.contains("if ! . '/profile/10-git.sh'; then"));
        assert!(script.contains(r"'o'\''brien'"));
        assert_eq!(script.matches("fi\n").count(), 2);
    }

    #[test]
    fn test_shell_quote_plain() {
        assert_eq!(shell_quote("/a b/c"), "'/a b/c'");
        assert_eq!(shell_quote(""), "''");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_executor_success_and_failure() {
        let dir = TempDir::new().unwrap();
        let executor = ShellExecutor::new("/bin/sh");

        let ok = write_fragment(&dir, "ok.sh", "alias ll='ls -l'\n");
        assert!(executor.execute(&ok).is_ok());

        let failing = write_fragment(&dir, "bad.sh", "echo broken >&2\nexit 3\n");
        match executor.execute(&failing) {
            Err(FragmentError::Exit { code, stderr }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("expected exit failure, got {:?}", other),
        }
    }

    #[test]
    fn test_shell_executor_missing_shell() {
        let executor = ShellExecutor::new("/nonexistent/shell");
        let err = executor
            .execute(&Fragment::new("env", "/f/env.sh"))
            .unwrap_err();
        assert!(matches!(err, FragmentError::Execution { .. }));
        assert!(err.to_string().contains("failed to start"));
    }
}
