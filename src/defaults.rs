//! Default values for profile-fragments configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;
use std::time::Duration;

/// Name of the optional JSON configuration file inside the store root.
pub const CONFIG_FILE_NAME: &str = "fragments.json";

/// Name of the persistent cache database inside the cache directory.
pub const STORE_FILE_NAME: &str = "fragments.sqlite3";

/// File extensions treated as fragments. Files without an extension are
/// accepted as well.
pub const FRAGMENT_EXTENSIONS: &[&str] = &["sh", "bash", "zsh"];

/// How long a persistent cache operation waits on another process's lock
/// before failing soft.
pub const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Returns the default fragment store directory.
///
/// Uses the platform-appropriate configuration directory:
/// - Linux: `~/.config/profile-fragments/fragments.d`
/// - macOS: `~/Library/Application Support/profile-fragments/fragments.d`
///
/// Falls back to `.profile-fragments/fragments.d` in the current directory if
/// the platform directory cannot be determined. This can be overridden by the
/// `--dir` flag or the `PROFILE_FRAGMENTS_DIR` environment variable.
pub fn default_store_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".profile-fragments"))
        .join("profile-fragments")
        .join("fragments.d")
}

/// Returns the default cache directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/profile-fragments` (XDG Base Directory)
/// - macOS: `~/Library/Caches/profile-fragments`
/// - Windows: `{FOLDERID_LocalAppData}\profile-fragments`
///
/// Falls back to `.profile-fragments-cache` in the current directory if the
/// platform cache directory cannot be determined. This can be overridden by
/// the `--cache-dir` flag or the `PROFILE_FRAGMENTS_CACHE` environment
/// variable.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".profile-fragments-cache"))
        .join("profile-fragments")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_dir_returns_path() {
        let cache_dir = default_cache_dir();
        assert!(cache_dir.ends_with("profile-fragments"));
    }

    #[test]
    fn test_default_cache_dir_is_absolute_or_fallback() {
        let cache_dir = default_cache_dir();
        assert!(
            cache_dir.is_absolute() || cache_dir.starts_with(".profile-fragments-cache"),
            "Expected absolute path or fallback, got: {:?}",
            cache_dir
        );
    }

    #[test]
    fn test_default_store_root_ends_with_fragments_dir() {
        assert!(default_store_root().ends_with("profile-fragments/fragments.d"));
    }
}
