//! Ignore rules published in repository metadata.

use bridge_traits::{IgnoreEntry, RepositoryMetadata};
use regex::Regex;

/// Whether the package version matches any ignore entry of the metadata.
pub fn should_ignore_package(
    metadata: Option<&RepositoryMetadata>,
    name: &str,
    version: &str,
) -> bool {
    metadata
        .map(|md| md.ignore.iter().any(|entry| matches_entry(entry, name, version)))
        .unwrap_or(false)
}

/// Name must match exactly; an empty package version matches any entry
/// with that name. Otherwise the entry version is an unanchored regular
/// expression, and an invalid one never matches.
pub fn matches_entry(entry: &IgnoreEntry, name: &str, version: &str) -> bool {
    if entry.name != name {
        return false;
    }
    if version.is_empty() {
        return true;
    }
    Regex::new(&entry.version)
        .map(|re| re.is_match(version))
        .unwrap_or(false)
}
