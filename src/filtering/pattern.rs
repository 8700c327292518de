// src/filtering/pattern.rs

//! Glob emulation on top of `regex`.
//!
//! A pattern matches a path when either its anchored regex translation matches
//! the whole path, or the pattern with its wildcards removed occurs anywhere
//! in the path. The second rule lets partial paths like `node_modules/` hit
//! nested directories without a leading `*`.

use crate::constants::DEFAULT_IGNORE_PATTERNS;
use crate::errors::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// A single compiled glob.
///
/// # Examples
/// ```
/// use repodigest::filtering::CompiledPattern;
///
/// let p = CompiledPattern::new("*.md").unwrap();
/// assert!(p.matches("README.md"));
/// assert!(p.matches("docs/guide.md"));
/// assert!(!p.matches("src/main.rs"));
///
/// // Partial paths match anywhere via the substring rule.
/// let p = CompiledPattern::new("node_modules/").unwrap();
/// assert!(p.matches("web/node_modules/react/index.js"));
/// ```
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
    literal: String,
}

impl CompiledPattern {
    /// Compiles a glob: `*` is any run of characters, `?` one character,
    /// everything else literal.
    pub fn new(pattern: &str) -> Result<Self> {
        let mut translated = String::with_capacity(pattern.len() + 8);
        translated.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => translated.push_str(".*"),
                '?' => translated.push('.'),
                other => translated.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        translated.push('$');

        let regex = Regex::new(&translated)
            .map_err(|e| Error::Config(format!("Invalid pattern '{}': {}", pattern, e)))?;
        let literal = pattern.replace(['*', '?'], "");

        Ok(Self {
            source: pattern.to_string(),
            regex,
            literal,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Full-path regex match OR wildcard-stripped substring match.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path) || path.contains(&self.literal)
    }
}

static DEFAULT_PATTERNS: Lazy<Vec<CompiledPattern>> = Lazy::new(|| {
    DEFAULT_IGNORE_PATTERNS
        .iter()
        .map(|p| CompiledPattern::new(p).expect("default ignore patterns are valid globs"))
        .collect()
});

/// The compiled default-ignore list.
pub fn default_patterns() -> &'static [CompiledPattern] {
    &DEFAULT_PATTERNS
}

/// Compiles user patterns, dropping blank entries.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<CompiledPattern>> {
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(CompiledPattern::new)
        .collect()
}

/// Decides whether `path` is kept.
///
/// Deny-then-allow: a path hitting any default or exclude pattern is dropped,
/// even when an include pattern also matches. With include patterns present,
/// a surviving path must match at least one of them.
pub fn should_include(
    path: &str,
    default_patterns: &[CompiledPattern],
    exclude_patterns: &[CompiledPattern],
    include_patterns: &[CompiledPattern],
) -> bool {
    if default_patterns.iter().any(|p| p.matches(path)) {
        return false;
    }
    if exclude_patterns.iter().any(|p| p.matches(path)) {
        return false;
    }
    include_patterns.is_empty() || include_patterns.iter().any(|p| p.matches(path))
}

/// Default, exclude and include patterns compiled once per request.
#[derive(Debug, Clone)]
pub struct PatternSet {
    exclude: Vec<CompiledPattern>,
    include: Vec<CompiledPattern>,
}

impl PatternSet {
    /// Compiles the user patterns of a request.
    ///
    /// # Errors
    /// Returns `Error::Config` if a pattern cannot be compiled.
    pub fn new(exclude: &[String], include: &[String]) -> Result<Self> {
        Ok(Self {
            exclude: compile_patterns(exclude)?,
            include: compile_patterns(include)?,
        })
    }

    pub fn has_include_patterns(&self) -> bool {
        !self.include.is_empty()
    }

    /// See [`should_include`]; the default list is always applied.
    pub fn should_include(&self, path: &str) -> bool {
        should_include(path, default_patterns(), &self.exclude, &self.include)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(exclude: &[&str], include: &[&str]) -> PatternSet {
        let ex: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        let inc: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        PatternSet::new(&ex, &inc).unwrap()
    }

    #[test]
    fn test_question_mark_matches_one_char() {
        let p = CompiledPattern::new("file?.txt").unwrap();
        assert!(p.matches("file1.txt"));
        assert!(!p.matches("file12.txt"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = CompiledPattern::new("a+b(c).txt").unwrap();
        assert!(p.matches("a+b(c).txt"));
        assert!(!p.matches("aab(c).txt"));
    }

    #[test]
    fn test_default_ignores_always_apply() {
        let s = set(&[], &[]);
        assert!(!s.should_include(".git/config"));
        assert!(!s.should_include("web/node_modules/x/index.js"));
        assert!(!s.should_include("assets/logo.png"));
        assert!(!s.should_include("package-lock.json"));
        assert!(s.should_include("src/main.rs"));
    }

    #[test]
    fn test_default_ignores_beat_include_patterns() {
        let s = set(&[], &["*.png"]);
        assert!(!s.should_include("logo.png"));
    }

    #[test]
    fn test_exclude_then_include() {
        let s = set(&["tests/"], &["*.rs"]);
        assert!(s.should_include("src/lib.rs"));
        assert!(!s.should_include("tests/it.rs"));
        assert!(!s.should_include("README.md"));
    }

    #[test]
    fn test_substring_rule_for_partial_paths() {
        let s = set(&["docs"], &[]);
        assert!(!s.should_include("project/docs/intro.md"));
        assert!(s.should_include("project/src/intro.md"));
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let s = set(&["*.md", "scripts/"], &[]);
        let paths = vec![
            "README.md",
            "src/lib.rs",
            "scripts/build.sh",
            "Cargo.toml",
            "docs/a.md",
            "node_modules/x.js",
        ];
        let once: Vec<&str> = paths.iter().copied().filter(|p| s.should_include(p)).collect();
        let twice: Vec<&str> = once.iter().copied().filter(|p| s.should_include(p)).collect();
        assert_eq!(once, twice);
        assert_eq!(once, vec!["src/lib.rs", "Cargo.toml"]);
    }

    #[test]
    fn test_blank_patterns_are_dropped() {
        let s = set(&["", "  "], &[" "]);
        assert!(!s.has_include_patterns());
        assert!(s.should_include("src/main.rs"));
    }

    #[test]
    fn test_default_list_size() {
        assert_eq!(default_patterns().len(), 24);
    }
}
