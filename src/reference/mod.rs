// src/reference/mod.rs
//! Parses free-form repository references.
//!
//! Accepted inputs include full URLs (`https://gitlab.com/group/project/-/tree/dev/src`),
//! bare host paths (`codeberg.org/owner/repo`) and GitHub short forms
//! (`owner/repo`).

mod provider;

pub use provider::Provider;

use crate::constants::DEFAULT_HOST;
use crate::errors::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::Url;

/// `owner/repo[/...]` with no dot in the owner, i.e. not a bare `host/path`.
/// Anything after the repository goes through the same branch/subpath split as URLs.
static SHORT_REFERENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+/[A-Za-z0-9_.-]+(?:/\S*)?$").unwrap());

/// A parsed repository reference.
///
/// Created once per request by [`RepoReference::resolve`] and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoReference {
    /// `http` or `https`.
    pub scheme: String,
    /// Hostname without port.
    pub host: String,
    pub port: Option<u16>,
    pub owner: String,
    pub repo: String,
    /// `None` means "use the repository default branch".
    pub branch: Option<String>,
    /// Path inside the repository the digest is restricted to.
    pub subpath: Option<String>,
    pub provider: Provider,
}

impl RepoReference {
    /// Parses a reference string.
    ///
    /// # Errors
    /// Returns [`Error::InvalidReference`] if the input is neither a URL, a bare
    /// `host/owner/repo` path, nor an `owner/repo` pair, or if it names fewer
    /// than two path segments.
    ///
    /// # Examples
    /// ```
    /// use repodigest::reference::{Provider, RepoReference};
    ///
    /// let r = RepoReference::resolve("octocat/Hello-World").unwrap();
    /// assert_eq!(r.host, "github.com");
    /// assert_eq!(r.short_name(), "octocat/Hello-World");
    /// assert_eq!(r.branch, None);
    ///
    /// let r = RepoReference::resolve("https://github.com/rust-lang/cargo/tree/master/src/cargo").unwrap();
    /// assert_eq!(r.branch.as_deref(), Some("master"));
    /// assert_eq!(r.subpath.as_deref(), Some("src/cargo"));
    ///
    /// let r = RepoReference::resolve("gitlab.com/inkscape/inkscape.git").unwrap();
    /// assert_eq!(r.provider, Provider::GitLab);
    /// assert_eq!(r.repo, "inkscape");
    ///
    /// assert!(RepoReference::resolve("not a repo").is_err());
    /// ```
    pub fn resolve(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(Error::InvalidReference("empty reference".to_string()));
        }

        let lower = trimmed.to_ascii_lowercase();
        let url_text = if lower.starts_with("http://") || lower.starts_with("https://") {
            trimmed.to_string()
        } else if looks_like_host_path(trimmed) {
            format!("https://{}", trimmed)
        } else if SHORT_REFERENCE_RE.is_match(trimmed) {
            format!("https://{}/{}", DEFAULT_HOST, trimmed)
        } else {
            return Err(Error::InvalidReference(format!(
                "'{}' is not a URL, host path, or owner/repo pair",
                input.trim()
            )));
        };

        let url = Url::parse(&url_text)
            .map_err(|e| Error::InvalidReference(format!("'{}': {}", input.trim(), e)))?;
        Self::from_url(&url)
    }

    fn from_url(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidReference(format!("'{}' has no host", url)))?
            .to_string();

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        if segments.len() < 2 {
            return Err(Error::InvalidReference(format!(
                "'{}' must name both an owner and a repository",
                url
            )));
        }

        let owner = segments[0].to_string();
        let repo = segments[1].trim_end_matches(".git").to_string();
        if repo.is_empty() {
            return Err(Error::InvalidReference(format!(
                "'{}' has an empty repository name",
                url
            )));
        }

        let (branch, subpath) = split_branch_and_subpath(&segments[2..]);
        log::debug!(
            "Resolved reference: host={} owner={} repo={} branch={:?} subpath={:?}",
            host,
            owner,
            repo,
            branch,
            subpath
        );

        Ok(Self {
            scheme: url.scheme().to_string(),
            provider: Provider::from_host(&host),
            host,
            port: url.port(),
            owner,
            repo,
            branch,
            subpath,
        })
    }

    /// `host[:port]`.
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }

    /// Canonical web URL of the repository, e.g. `https://github.com/owner/repo`.
    pub fn url(&self) -> String {
        format!(
            "{}://{}/{}/{}",
            self.scheme,
            self.authority(),
            self.owner,
            self.repo
        )
    }

    /// URL used for cloning, e.g. `https://github.com/owner/repo.git`.
    pub fn clone_url(&self) -> String {
        format!("{}.git", self.url())
    }

    /// `owner/repo`.
    pub fn short_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Returns a copy with `branch` replaced, when an override is given.
    pub fn with_branch_override(&self, branch: Option<&str>) -> Self {
        let mut copy = self.clone();
        if let Some(b) = branch.filter(|b| !b.trim().is_empty()) {
            copy.branch = Some(b.trim().to_string());
        }
        copy
    }
}

/// A bare `host/path` has a dot in its first segment, e.g. `gitlab.com/a/b`.
fn looks_like_host_path(input: &str) -> bool {
    match input.split_once('/') {
        Some((first, _)) => first.contains('.'),
        None => false,
    }
}

/// Extracts branch and subpath from the segments after `owner/repo`.
fn split_branch_and_subpath(rest: &[&str]) -> (Option<String>, Option<String>) {
    let mut rest = rest;
    // GitLab: `-/tree/<branch>/...`
    if rest.first() == Some(&"-") && matches!(rest.get(1), Some(&"tree") | Some(&"blob")) {
        rest = &rest[1..];
    }
    match rest.first() {
        Some(&"tree") | Some(&"blob") | Some(&"-") => {
            let branch = rest.get(1).map(|b| b.to_string());
            let subpath = if rest.len() > 2 {
                Some(rest[2..].join("/"))
            } else {
                None
            };
            (branch, subpath)
        }
        _ => (None, None),
    }
}
