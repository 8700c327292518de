//! Defines core data structures used throughout the ingestion pipeline.
//!
//! `RawEntry` is what an acquisition strategy lists, `TreeEntry` and
//! `FileRecord` are what survives filtering, and `IngestResult` is the
//! finished digest handed to the caller.

use crate::constants::BINARY_SENTINEL;
use serde::Serialize;
use std::fmt;

/// A path listed by an acquisition strategy, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    pub is_dir: bool,
    /// Size in bytes. Zero for directories.
    pub size: u64,
}

impl RawEntry {
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            size,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            size: 0,
        }
    }
}

/// One line of the rendered directory tree.
///
/// # Examples
///
/// ```
/// use repodigest::core_types::TreeEntry;
///
/// let entry = TreeEntry::dir("src/bin");
/// assert_eq!(entry.depth(), 1);
/// assert!(entry.is_dir);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TreeEntry {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    pub is_dir: bool,
}

impl TreeEntry {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
        }
    }

    /// Number of `/` separators in the path.
    pub fn depth(&self) -> usize {
        self.path.matches('/').count()
    }
}

/// Decoded content of a kept file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum FileContent {
    Text(String),
    /// Bytes that are not valid UTF-8 text.
    Binary,
}

impl FileContent {
    pub fn as_str(&self) -> &str {
        match self {
            FileContent::Text(text) => text,
            FileContent::Binary => BINARY_SENTINEL,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, FileContent::Binary)
    }
}

impl fmt::Display for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file that passed every filter and the size limit, with its content.
///
/// # Examples
///
/// ```
/// use repodigest::core_types::{FileContent, FileRecord};
///
/// let record = FileRecord {
///     path: "README.md".to_string(),
///     size: 12,
///     content: FileContent::Text("Hello World!".to_string()),
/// };
/// assert_eq!(record.content.as_str(), "Hello World!");
///
/// let blob = FileRecord { path: "logo.bin".into(), size: 3, content: FileContent::Binary };
/// assert_eq!(blob.content.as_str(), "[Binary file]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: String,
    pub size: u64,
    pub content: FileContent,
}

/// The finished digest of one ingestion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    /// Canonical `https://host/owner/repo` URL.
    pub repo_url: String,
    /// `owner/repo`.
    pub short_repo_url: String,
    pub summary: String,
    pub tree: String,
    pub content: String,
}

impl IngestResult {
    /// The text meant for a language-model prompt: tree, a blank line, then content.
    pub fn digest(&self) -> String {
        format!("{}\n\n{}", self.tree, self.content)
    }
}
