// src/output/summary.rs

use crate::core_types::FileRecord;
use crate::reference::RepoReference;

/// Builds the human-readable summary block for one ingestion.
///
/// `branch` is the branch actually fetched; `None` prints `default`. The
/// `Subpath:` line only appears when the reference names one.
///
/// # Examples
///
/// ```
/// use repodigest::core_types::{FileContent, FileRecord};
/// use repodigest::output::summarize;
/// use repodigest::reference::RepoReference;
///
/// let reference = RepoReference::resolve("octocat/Hello-World").unwrap();
/// let files = vec![FileRecord {
///     path: "README".into(),
///     size: 2048,
///     content: FileContent::Text("hi".into()),
/// }];
/// let summary = summarize(&reference, &files, Some("master"));
/// assert_eq!(
///     summary,
///     "Repository: octocat/Hello-World\nProvider: GitHub\nHost: github.com\n\
///      Branch: master\nFiles analyzed: 1\nTotal size: 2.00 KB"
/// );
/// ```
pub fn summarize(reference: &RepoReference, files: &[FileRecord], branch: Option<&str>) -> String {
    let mut lines = vec![
        format!("Repository: {}", reference.short_name()),
        format!("Provider: {}", reference.provider),
        format!("Host: {}", reference.host),
        format!("Branch: {}", branch.unwrap_or("default")),
    ];
    if let Some(subpath) = reference.subpath.as_deref() {
        lines.push(format!("Subpath: {}", subpath));
    }
    let total: u64 = files.iter().map(|f| f.size).sum();
    lines.push(format!("Files analyzed: {}", files.len()));
    lines.push(format!("Total size: {:.2} KB", total as f64 / 1024.0));
    lines.join("\n")
}

/// Appends the `Estimated tokens:` line; `None` renders as `unavailable`.
pub fn with_token_estimate(summary: &str, estimate: Option<&str>) -> String {
    format!(
        "{}\nEstimated tokens: {}",
        summary,
        estimate.unwrap_or("unavailable")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::FileContent;

    fn record(path: &str, size: u64) -> FileRecord {
        FileRecord {
            path: path.into(),
            size,
            content: FileContent::Binary,
        }
    }

    #[test]
    fn test_default_branch_and_subpath() {
        let reference =
            RepoReference::resolve("https://github.com/rust-lang/cargo/tree/master/src/bin")
                .unwrap()
                .with_branch_override(None);
        let summary = summarize(&reference, &[record("a", 512), record("b", 1024)], None);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "Repository: rust-lang/cargo");
        assert_eq!(lines[3], "Branch: default");
        assert_eq!(lines[4], "Subpath: src/bin");
        assert_eq!(lines[5], "Files analyzed: 2");
        assert_eq!(lines[6], "Total size: 1.50 KB");
    }

    #[test]
    fn test_no_subpath_line_without_subpath() {
        let reference = RepoReference::resolve("octocat/Hello-World").unwrap();
        let summary = summarize(&reference, &[], None);
        assert!(!summary.contains("Subpath:"));
        assert!(summary.ends_with("Total size: 0.00 KB"));
    }

    #[test]
    fn test_token_estimate_line() {
        assert_eq!(with_token_estimate("S", Some("1.5k")), "S\nEstimated tokens: 1.5k");
        assert_eq!(
            with_token_estimate("S", None),
            "S\nEstimated tokens: unavailable"
        );
    }
}
