//! Fragment identity, ordering hints and load status

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Ordering hint derived from a fragment's file name.
///
/// `10-git.sh` carries `Numeric(10)`; a file without a numeric prefix carries
/// its whole stem as `Lexical`. Numeric hints sort before lexical ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderHint {
    Numeric(u64),
    Lexical(String),
}

impl Ord for OrderHint {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (OrderHint::Numeric(a), OrderHint::Numeric(b)) => a.cmp(b),
            (OrderHint::Numeric(_), OrderHint::Lexical(_)) => Ordering::Less,
            (OrderHint::Lexical(_), OrderHint::Numeric(_)) => Ordering::Greater,
            (OrderHint::Lexical(a), OrderHint::Lexical(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for OrderHint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for OrderHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderHint::Numeric(n) => write!(f, "{}", n),
            OrderHint::Lexical(s) => write!(f, "{}", s),
        }
    }
}

/// Split a file stem into its ordering hint and fragment name.
///
/// ```
/// use profile_fragments::fragment::{split_stem, OrderHint};
///
/// assert_eq!(split_stem("10-git"), (OrderHint::Numeric(10), "git".to_string()));
/// assert_eq!(split_stem("env"), (OrderHint::Lexical("env".to_string()), "env".to_string()));
/// ```
pub fn split_stem(stem: &str) -> (OrderHint, String) {
    if let Some(idx) = stem.find(['-', '_']) {
        let (prefix, rest) = (&stem[..idx], &stem[idx + 1..]);
        if !prefix.is_empty() && !rest.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = prefix.parse::<u64>() {
                return (OrderHint::Numeric(n), rest.to_string());
            }
        }
    }
    (OrderHint::Lexical(stem.to_string()), stem.to_string())
}

/// Load status of a fragment within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentStatus {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

impl fmt::Display for FragmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FragmentStatus::Unloaded => "unloaded",
            FragmentStatus::Loading => "loading",
            FragmentStatus::Loaded => "loaded",
            FragmentStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One discoverable, independently loadable unit of shell configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Stable identifier, derived from the file name
    pub name: String,
    /// Absolute or store-relative path of the fragment file
    pub path: PathBuf,
    pub order_hint: OrderHint,
    /// Names of fragments that must load before this one
    pub dependencies: BTreeSet<String>,
    /// Named environments this fragment belongs to
    pub environments: BTreeSet<String>,
    pub enabled: bool,
    /// Last write time in nanoseconds since the Unix epoch
    pub modified_ns: i64,
}

impl Fragment {
    /// Create an enabled fragment with no dependencies.
    ///
    /// The order hint is derived from the file stem of `path` when it has one,
    /// otherwise from `name`.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let path = path.into();
        let order_hint = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|stem| split_stem(stem).0)
            .unwrap_or_else(|| OrderHint::Lexical(name.clone()));
        Self {
            name,
            path,
            order_hint,
            dependencies: BTreeSet::new(),
            environments: BTreeSet::new(),
            enabled: true,
            modified_ns: 0,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_environments<I, S>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments.extend(envs.into_iter().map(Into::into));
        self
    }

    pub fn with_order_hint(mut self, hint: OrderHint) -> Self {
        self.order_hint = hint;
        self
    }

    pub fn with_modified_ns(mut self, modified_ns: i64) -> Self {
        self.modified_ns = modified_ns;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Key used for deterministic ordering: hint, then name, then path.
    pub fn sort_key(&self) -> (&OrderHint, &str, &Path) {
        (&self.order_hint, &self.name, &self.path)
    }
}

/// Convert a modification time into the nanosecond timestamp used in cache keys.
///
/// Times before the epoch map to negative values; out-of-range values saturate.
pub fn modified_ns(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_nanos())
            .map(|n| -n)
            .unwrap_or(i64::MIN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_split_stem_numeric_prefix() {
        assert_eq!(
            split_stem("00-bootstrap"),
            (OrderHint::Numeric(0), "bootstrap".to_string())
        );
        assert_eq!(
            split_stem("20_git-aliases"),
            (OrderHint::Numeric(20), "git-aliases".to_string())
        );
    }

    #[test]
    fn test_split_stem_without_numeric_prefix() {
        assert_eq!(
            split_stem("git-aliases"),
            (
                OrderHint::Lexical("git-aliases".to_string()),
                "git-aliases".to_string()
            )
        );
        // A bare number is a name, not a prefix
        assert_eq!(
            split_stem("42"),
            (OrderHint::Lexical("42".to_string()), "42".to_string())
        );
        assert_eq!(
            split_stem("10-"),
            (OrderHint::Lexical("10-".to_string()), "10-".to_string())
        );
    }

    #[test]
    fn test_order_hint_ordering() {
        let mut hints = vec![
            OrderHint::Lexical("b".to_string()),
            OrderHint::Numeric(100),
            OrderHint::Lexical("a".to_string()),
            OrderHint::Numeric(9),
        ];
        hints.sort();
        assert_eq!(
            hints,
            vec![
                OrderHint::Numeric(9),
                OrderHint::Numeric(100),
                OrderHint::Lexical("a".to_string()),
                OrderHint::Lexical("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_fragment_new_derives_hint_from_path() {
        let fragment = Fragment::new("git", "/profile/30-git.sh");
        assert_eq!(fragment.order_hint, OrderHint::Numeric(30));
        assert!(fragment.enabled);
        assert!(fragment.dependencies.is_empty());
    }

    #[test]
    fn test_fragment_builders() {
        let fragment = Fragment::new("prompt", "prompt.sh")
            .with_dependencies(["env", "git"])
            .with_environments(["full"])
            .with_modified_ns(42)
            .disabled();
        assert_eq!(fragment.dependencies.len(), 2);
        assert!(fragment.environments.contains("full"));
        assert_eq!(fragment.modified_ns, 42);
        assert!(!fragment.enabled);
    }

    #[test]
    fn test_modified_ns() {
        assert_eq!(modified_ns(UNIX_EPOCH), 0);
        assert_eq!(modified_ns(UNIX_EPOCH + Duration::from_nanos(1_500)), 1_500);
        assert_eq!(modified_ns(UNIX_EPOCH - Duration::from_nanos(7)), -7);
    }

    #[test]
    fn test_status_default_and_display() {
        assert_eq!(FragmentStatus::default(), FragmentStatus::Unloaded);
        assert_eq!(FragmentStatus::Failed.to_string(), "failed");
    }
}
