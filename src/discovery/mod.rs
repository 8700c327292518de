//! Selects which snapshot entries make it into the digest.
//!
//! Filters run in a fixed order: the VCS directory is skipped first, then the
//! subpath restriction, the pattern filter, and finally the size limit. Only
//! files are filtered; directories are rebuilt from the ancestors of the files
//! that survive, so every listed directory contains at least one kept file.

use crate::core_types::{RawEntry, TreeEntry};
use crate::filtering::{is_vcs_path, passes_size_filter, PatternSet};
use log::debug;
use std::collections::BTreeSet;

/// Files to read and the tree entries to render, both unsorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub files: Vec<RawEntry>,
    pub tree: Vec<TreeEntry>,
}

/// Applies every path and size filter to `entries`.
///
/// Paths stay relative to the repository root even when `subpath` is set.
///
/// # Examples
///
/// ```
/// use repodigest::core_types::RawEntry;
/// use repodigest::discovery::select_entries;
/// use repodigest::filtering::PatternSet;
///
/// let entries = vec![
///     RawEntry::file("README.md", 10),
///     RawEntry::file("src/lib.rs", 20),
///     RawEntry::file("src/big.rs", 5_000),
///     RawEntry::file(".git/HEAD", 5),
/// ];
/// let patterns = PatternSet::new(&[], &[]).unwrap();
/// let selection = select_entries(&entries, Some("src"), &patterns, 1_000);
///
/// let files: Vec<&str> = selection.files.iter().map(|f| f.path.as_str()).collect();
/// assert_eq!(files, vec!["src/lib.rs"]);
/// assert_eq!(selection.tree.len(), 2); // "src/" and "src/lib.rs"
/// ```
pub fn select_entries(
    entries: &[RawEntry],
    subpath: Option<&str>,
    patterns: &PatternSet,
    max_file_size: u64,
) -> Selection {
    let subpath = subpath
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty());

    let mut files = Vec::new();
    for entry in entries.iter().filter(|e| !e.is_dir) {
        if is_vcs_path(&entry.path) {
            continue;
        }
        if let Some(sub) = subpath {
            if !within_subpath(&entry.path, sub) {
                continue;
            }
        }
        if !patterns.should_include(&entry.path) {
            debug!("Filtered out by patterns: {}", entry.path);
            continue;
        }
        if !passes_size_filter(entry.size, max_file_size) {
            debug!(
                "Skipping oversized file: {} ({} > {} bytes)",
                entry.path, entry.size, max_file_size
            );
            continue;
        }
        files.push(entry.clone());
    }

    let mut dirs = BTreeSet::new();
    for file in &files {
        let mut path = file.path.as_str();
        while let Some((parent, _)) = path.rsplit_once('/') {
            if !dirs.insert(parent.to_string()) {
                break;
            }
            path = parent;
        }
    }

    let mut tree: Vec<TreeEntry> = dirs.into_iter().map(TreeEntry::dir).collect();
    tree.extend(files.iter().map(|f| TreeEntry::file(f.path.clone())));
    debug!(
        "Selected {} of {} entries ({} tree lines)",
        files.len(),
        entries.len(),
        tree.len()
    );
    Selection { files, tree }
}

/// `true` when some listed entry is `subpath` or lies beneath it.
///
/// A blank subpath always exists.
pub fn subpath_exists(entries: &[RawEntry], subpath: &str) -> bool {
    let sub = subpath.trim_matches('/');
    sub.is_empty()
        || entries
            .iter()
            .any(|e| !is_vcs_path(&e.path) && within_subpath(&e.path, sub))
}

/// `path` is the subpath itself or lies beneath it.
fn within_subpath(path: &str, subpath: &str) -> bool {
    path == subpath
        || (path.starts_with(subpath) && path.as_bytes().get(subpath.len()) == Some(&b'/'))
}
