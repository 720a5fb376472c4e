//! # Fragment Configuration
//!
//! This module reads the optional `fragments.json` document that lives next to
//! the fragments in the store root:
//!
//! ```json
//! {
//!   "disabled": ["work-*", "slow-prompt"],
//!   "environments": {
//!     "minimal": ["bootstrap", "env"]
//!   },
//!   "environment": "minimal"
//! }
//! ```
//!
//! - **`disabled`**: fragment names (or glob patterns) that are never loaded.
//! - **`environments`**: named fragment subsets, selected by the active
//!   environment name.
//! - **`environment`**: the default active environment when none is given on
//!   the command line or in `PROFILE_FRAGMENTS_ENV`.
//!
//! Configuration problems must never block shell startup. `load` therefore
//! never fails: a missing file yields the default configuration, and a
//! malformed one is logged and treated as absent. `parse` and `from_file` are
//! the strict variants used by tests and tooling.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use glob::Pattern;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::defaults::CONFIG_FILE_NAME;
use crate::error::{Error, Result};

/// Parsed contents of `fragments.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentConfig {
    /// Fragment names or glob patterns excluded from loading
    pub disabled: BTreeSet<String>,
    /// Named fragment subsets
    pub environments: BTreeMap<String, BTreeSet<String>>,
    /// Default active environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl FragmentConfig {
    /// Compile the `disabled` entries into a matcher.
    pub fn disabled_set(&self) -> DisabledSet {
        DisabledSet::new(&self.disabled)
    }

    /// Fragment names the config assigns to `environment`, if it defines it.
    pub fn environment_members(&self, environment: &str) -> Option<&BTreeSet<String>> {
        self.environments.get(environment)
    }
}

/// Matcher for disabled fragment names.
///
/// Entries containing glob metacharacters are compiled with the `glob` crate;
/// anything else (including patterns that fail to compile) is matched exactly.
#[derive(Debug, Clone, Default)]
pub struct DisabledSet {
    names: BTreeSet<String>,
    patterns: Vec<Pattern>,
}

impl DisabledSet {
    pub fn new<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut set = Self::default();
        for entry in entries {
            if entry.contains(['*', '?', '[']) {
                match Pattern::new(entry) {
                    Ok(pattern) => {
                        set.patterns.push(pattern);
                        continue;
                    }
                    Err(e) => {
                        warn!("Ignoring invalid glob '{}' in disabled list: {}", entry, e);
                    }
                }
            }
            set.names.insert(entry.clone());
        }
        set
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name) || self.patterns.iter().any(|p| p.matches(name))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.patterns.is_empty()
    }
}

/// Parse a JSON configuration document.
pub fn parse(json: &str) -> Result<FragmentConfig> {
    serde_json::from_str(json).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
        hint: Some(
            "'disabled' must be an array of names and 'environments' a map of name arrays"
                .to_string(),
        ),
    })
}

/// Read and parse a configuration file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FragmentConfig> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

/// Load the configuration for a fragment store, falling back to defaults.
pub fn load(store_root: &Path) -> FragmentConfig {
    let path = store_root.join(CONFIG_FILE_NAME);
    if !path.is_file() {
        debug!("No configuration at {}; using defaults", path.display());
        return FragmentConfig::default();
    }

    match from_file(&path) {
        Ok(config) => {
            debug!(
                "Loaded {} ({} disabled, {} environments)",
                path.display(),
                config.disabled.len(),
                config.environments.len()
            );
            config
        }
        Err(e) => {
            warn!("Ignoring {}: {}", path.display(), e);
            FragmentConfig::default()
        }
    }
}
