//! Phase 1: Discovery
//!
//! This is the first phase of a startup. Its responsibility is to turn the
//! store root directory into a list of [`Fragment`] values.
//!
//! ## Process
//!
//! 1.  **Listing**: The store root is listed non-recursively. Hidden files,
//!     editor backups (`~`), the configuration file and files with an
//!     extension other than `.sh`, `.bash` or `.zsh` are skipped.
//!
//! 2.  **Identity**: Each file's stem is split into an order hint and a name
//!     (`10-git.sh` is `git` with hint `10`), and its last write time is
//!     captured for cache keys.
//!
//! 3.  **Directives**: The leading comment block is read for `requires`,
//!     `environments` and `enabled` directives. Fragment bodies are not read
//!     here.
//!
//! 4.  **De-duplication**: Fragments are sorted by order hint, name and path.
//!     If two files map to the same name the first one wins and the other is
//!     reported with a warning.
//!
//! A missing store root is an empty store. A store root that exists but
//! cannot be listed is an error, since nothing sensible can be loaded from it.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::defaults::{CONFIG_FILE_NAME, FRAGMENT_EXTENSIONS};
use crate::error::{Error, Result};
use crate::fragment::{modified_ns, split_stem, Fragment};
use crate::parser::{read_directives, Directives};

/// Executes Phase 1: discover the fragments in `store_root`.
///
/// The result is sorted by order hint, then name, then path, and contains
/// no duplicate names.
pub fn execute(store_root: &Path) -> Result<Vec<Fragment>> {
    if !store_root.exists() {
        debug!(
            "Fragment store {} does not exist; nothing to load",
            store_root.display()
        );
        return Ok(Vec::new());
    }

    fs::read_dir(store_root).map_err(|e| Error::StoreRoot {
        path: store_root.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut fragments = Vec::new();
    for entry in WalkDir::new(store_root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", store_root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_fragment_file(&entry) {
            continue;
        }
        if let Some(fragment) = fragment_from_entry(&entry) {
            fragments.push(fragment);
        }
    }

    let fragments = dedupe(fragments);
    debug!(
        "Discovered {} fragments in {}",
        fragments.len(),
        store_root.display()
    );
    Ok(fragments)
}

/// Whether a directory entry looks like a fragment by name alone.
pub fn is_fragment_name(file_name: &str) -> bool {
    if file_name.is_empty()
        || file_name.starts_with('.')
        || file_name.ends_with('~')
        || file_name == CONFIG_FILE_NAME
    {
        return false;
    }
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => FRAGMENT_EXTENSIONS.contains(&ext),
        None => true,
    }
}

fn is_fragment_file(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(is_fragment_name)
}

fn fragment_from_entry(entry: &DirEntry) -> Option<Fragment> {
    let path = entry.path();
    let stem = path.file_stem()?.to_str()?;
    let (hint, name) = split_stem(stem);

    let modified = match entry
        .metadata()
        .map_err(|e| e.to_string())
        .and_then(|m| m.modified().map_err(|e| e.to_string()))
    {
        Ok(time) => modified_ns(time),
        Err(e) => {
            warn!("Skipping {}: cannot read metadata: {}", path.display(), e);
            return None;
        }
    };

    let directives = read_directives(path).unwrap_or_else(|e| {
        debug!("Cannot read directives from {}: {}", path.display(), e);
        Directives::default()
    });

    let mut fragment = Fragment::new(name, path)
        .with_order_hint(hint)
        .with_modified_ns(modified)
        .with_dependencies(directives.requires)
        .with_environments(directives.environments);
    if !directives.enabled {
        fragment = fragment.disabled();
    }
    Some(fragment)
}

fn dedupe(mut fragments: Vec<Fragment>) -> Vec<Fragment> {
    fragments.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut seen = HashSet::new();
    let mut kept: Vec<Fragment> = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        if seen.insert(fragment.name.clone()) {
            kept.push(fragment);
        } else if let Some(first) = kept.iter().find(|f| f.name == fragment.name) {
            warn!(
                "Ignoring {}: fragment '{}' is already defined by {}",
                fragment.path.display(),
                fragment.name,
                first.path.display()
            );
        }
    }
    kept
}
