//! # Error Suggestions
//!
//! Helper functions for CLI errors that say what went wrong AND how to fix
//! it. Each returns an `anyhow::Error` whose message ends with `hint:` lines.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use profile_fragments::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Unknown command: {}", command);
//!
//! // Use:
//! return Err(suggestions::unknown_command(command, &known));
//! ```

use std::path::Path;

/// Error for a fragment store directory that does not exist.
pub fn store_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Fragment store not found: {path}\n\n\
         hint: Create the directory and add fragments such as 10-env.sh\n\
         hint: Use -d/--dir to point at a different directory\n\
         hint: Set the PROFILE_FRAGMENTS_DIR environment variable",
        path = path.display()
    )
}

/// Error for a command no fragment in the plan defines.
///
/// Suggests the closest known command when there is one.
pub fn unknown_command(command: &str, known: &[String]) -> anyhow::Error {
    let candidates: Vec<&str> = known.iter().map(String::as_str).collect();
    let did_you_mean = find_similar(command, &candidates)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "No fragment defines command: {command}{did_you_mean}\n\n\
         hint: Run 'profile-fragments plan' to see which fragments are active\n\
         hint: Disabled fragments and fragments outside the active environment are not indexed"
    )
}

/// Error for two fragment files that map to the same name.
pub fn duplicate_fragment(name: &str, first: &Path, second: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Duplicate fragment name '{name}': {first} and {second}\n\n\
         hint: Rename one of the files; the order prefix is not part of the name",
        first = first.display(),
        second = second.display()
    )
}

/// Error for a persistent cache that cannot be opened.
pub fn cache_unavailable(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Persistent cache is not available: {path}\n\n\
         hint: Check that the directory is writable\n\
         hint: Use --cache-dir or PROFILE_FRAGMENTS_CACHE to choose another location",
        path = path.display()
    )
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    // Single rolling row
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    for (i, a_char) in a_chars.iter().enumerate() {
        let mut current = vec![i + 1; b_chars.len() + 1];
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        previous = current;
    }

    previous[b_chars.len()]
}
