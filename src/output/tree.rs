// src/output/tree.rs

use crate::constants::TREE_HEADER;
use crate::core_types::TreeEntry;
use std::cmp::Ordering;

/// Orders two paths component by component.
///
/// At the first differing component a directory sorts before a file; two
/// components of the same kind compare lexicographically. A parent sorts
/// before anything beneath it.
pub fn compare_paths(a: &str, a_is_dir: bool, b: &str, b_is_dir: bool) -> Ordering {
    let a_parts: Vec<&str> = a.split('/').collect();
    let b_parts: Vec<&str> = b.split('/').collect();

    for (i, (x, y)) in a_parts.iter().zip(b_parts.iter()).enumerate() {
        if x == y {
            continue;
        }
        let x_dir = i + 1 < a_parts.len() || a_is_dir;
        let y_dir = i + 1 < b_parts.len() || b_is_dir;
        return match (x_dir, y_dir) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => x.cmp(y),
        };
    }
    a_parts.len().cmp(&b_parts.len())
}

/// Sorts entries into tree order (see [`compare_paths`]).
pub fn sort_entries(entries: &mut [TreeEntry]) {
    entries.sort_by(|a, b| compare_paths(&a.path, a.is_dir, &b.path, b.is_dir));
}

/// Renders sorted entries as an indented tree under `root_label`.
///
/// Each entry shows its last path component, indented four spaces per `/`
/// in its path.
///
/// # Examples
///
/// ```
/// use repodigest::core_types::TreeEntry;
/// use repodigest::output::{build_tree, sort_entries};
///
/// let mut entries = vec![
///     TreeEntry::file("README.md"),
///     TreeEntry::file("src/main.rs"),
///     TreeEntry::dir("src"),
/// ];
/// sort_entries(&mut entries);
/// let tree = build_tree(&entries, "demo");
/// assert_eq!(
///     tree,
///     "Directory structure:\n└── demo/\n├── src/\n    ├── main.rs\n├── README.md"
/// );
/// ```
pub fn build_tree(entries: &[TreeEntry], root_label: &str) -> String {
    let mut lines = Vec::with_capacity(entries.len() + 2);
    lines.push(TREE_HEADER.to_string());
    lines.push(format!("└── {}/", root_label));
    for entry in entries {
        let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
        let indent = " ".repeat(4 * entry.depth());
        let suffix = if entry.is_dir { "/" } else { "" };
        lines.push(format!("{}├── {}{}", indent, name, suffix));
    }
    lines.join("\n")
}
