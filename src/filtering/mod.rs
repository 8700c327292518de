// src/filtering/mod.rs

//! Provides standalone functions for path and content filtering.
//!
//! These are used by the traversal stage to decide which repository paths end
//! up in the digest and how their bytes are decoded. They are exposed publicly
//! to allow for their use in other contexts.

mod pattern;
mod text_detection;

pub use pattern::{compile_patterns, default_patterns, should_include, CompiledPattern, PatternSet};
pub use text_detection::{decode_content, is_likely_text_from_buffer};

/// Checks if a file's size is within the configured limit.
///
/// Files exactly at the limit are kept; oversized files are dropped, never truncated.
#[inline]
pub fn passes_size_filter(size: u64, max_file_size: u64) -> bool {
    size <= max_file_size
}

/// `true` when the first path segment is the VCS metadata directory.
#[inline]
pub fn is_vcs_path(path: &str) -> bool {
    path.split('/').next() == Some(crate::constants::VCS_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_filter_boundary() {
        assert!(passes_size_filter(100, 100));
        assert!(!passes_size_filter(101, 100));
        assert!(passes_size_filter(0, 0));
    }

    #[test]
    fn test_vcs_path_only_matches_first_segment() {
        assert!(is_vcs_path(".git"));
        assert!(is_vcs_path(".git/HEAD"));
        assert!(!is_vcs_path("src/.git/HEAD"));
        assert!(!is_vcs_path(".github/workflows/ci.yml"));
    }
}
