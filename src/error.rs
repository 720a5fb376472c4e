//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! `profile-fragments` engine. It uses the `thiserror` library to create two
//! error enums:
//!
//! - **`Error`**: failures of the engine itself (configuration, resolution,
//!   cache store, I/O). Most of these are absorbed by the layer that detects
//!   them; only structurally invalid requests reach the caller.
//!
//! - **`FragmentError`**: failures raised while analyzing or executing a
//!   single fragment. These are never propagated out of the loader; they are
//!   recorded per fragment in the `LoadReport` so that one broken fragment
//!   cannot abort shell startup.
//!
//! The `Result` type alias is used to return `Result<T, Error>` from
//! functions, making it easy to handle errors and propagate them up the
//! call stack.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for profile-fragments operations
#[derive(Error, Debug)]
pub enum Error {
    /// The `fragments.json` configuration could not be parsed.
    ///
    /// Callers of `config::load` never see this: it is logged and replaced
    /// with the default configuration.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A circular dependency was detected between fragments.
    #[error("Cycle detected in fragment dependencies: {cycle}")]
    CycleDetected { cycle: String },

    /// Two fragments resolved to the same name.
    #[error("Duplicate fragment name '{name}': {first} and {second}")]
    DuplicateFragment {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// The fragment store directory could not be read.
    #[error("Fragment store error for {path}: {message}")]
    StoreRoot { path: PathBuf, message: String },

    /// The persistent cache store is unavailable or corrupt.
    #[error("Cache store error: {message}")]
    CacheStore { message: String },

    /// A fragment failed to analyze or execute.
    #[error(transparent)]
    Fragment(#[from] FragmentError),

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An SQLite error, wrapped from `rusqlite::Error`.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },
}

/// A failure attributed to one fragment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    /// The fragment file could not be read.
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// The fragment could not be parsed.
    #[error("syntax error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The executor reported a failure.
    #[error("{message}")]
    Execution { message: String },

    /// The fragment ran but exited unsuccessfully.
    #[error("exited with status {}{}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()), if stderr.is_empty() { String::new() } else { format!(": {}", stderr) })]
    Exit { code: Option<i32>, stderr: String },

    /// The executor panicked while running the fragment.
    #[error("executor panicked: {message}")]
    Panicked { message: String },
}

impl FragmentError {
    /// Shorthand for an executor-reported failure.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config_parse() {
        let error = Error::ConfigParse {
            message: "expected value at line 1 column 1".to_string(),
            hint: None,
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration parsing error"));
        assert!(display.contains("expected value"));
        assert!(!display.contains("hint:"));
    }

    #[test]
    fn test_error_display_config_parse_with_hint() {
        let error = Error::ConfigParse {
            message: "invalid type".to_string(),
            hint: Some("'disabled' must be an array of names".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("hint:"));
        assert!(display.contains("'disabled' must be an array"));
    }

    #[test]
    fn test_error_display_cycle_detected() {
        let error = Error::CycleDetected {
            cycle: "a -> b -> a".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Cycle detected"));
        assert!(display.contains("a -> b -> a"));
    }

    #[test]
    fn test_error_display_duplicate_fragment() {
        let error = Error::DuplicateFragment {
            name: "git".to_string(),
            first: PathBuf::from("10-git.sh"),
            second: PathBuf::from("20-git.sh"),
        };
        let display = format!("{}", error);
        assert!(display.contains("Duplicate fragment name 'git'"));
        assert!(display.contains("10-git.sh"));
        assert!(display.contains("20-git.sh"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: Error = json_error.into();
        assert!(format!("{}", error).contains("JSON error"));
    }

    #[test]
    fn test_fragment_error_exit_display() {
        let error = FragmentError::Exit {
            code: Some(2),
            stderr: "command not found".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "exited with status 2: command not found"
        );

        let killed = FragmentError::Exit {
            code: None,
            stderr: String::new(),
        };
        assert_eq!(format!("{}", killed), "exited with status signal");
    }

    #[test]
    fn test_fragment_error_is_transparent_in_error() {
        let error: Error = FragmentError::Parse {
            line: 3,
            message: "unterminated quote".to_string(),
        }
        .into();
        assert_eq!(
            format!("{}", error),
            "syntax error at line 3: unterminated quote"
        );
    }
}
