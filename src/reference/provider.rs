// src/reference/provider.rs
//! Classifies Git hosts by hostname.

use serde::Serialize;
use std::fmt;

/// The hosting provider behind a repository reference.
///
/// Classification is a plain substring match on the hostname, so self-hosted
/// instances such as `gitlab.example.com` are recognised too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    GitLab,
    Bitbucket,
    Gitea,
    Codeberg,
    Unknown,
}

impl Provider {
    /// Classifies a hostname.
    ///
    /// # Examples
    /// ```
    /// use repodigest::reference::Provider;
    ///
    /// assert_eq!(Provider::from_host("github.com"), Provider::GitHub);
    /// assert_eq!(Provider::from_host("gitlab.example.org"), Provider::GitLab);
    /// assert_eq!(Provider::from_host("codeberg.org"), Provider::Codeberg);
    /// assert_eq!(Provider::from_host("git.sr.ht"), Provider::Unknown);
    /// ```
    pub fn from_host(host: &str) -> Self {
        let host = host.to_ascii_lowercase();
        if host.contains("github") {
            Provider::GitHub
        } else if host.contains("gitlab") {
            Provider::GitLab
        } else if host.contains("bitbucket") {
            Provider::Bitbucket
        } else if host.contains("codeberg") {
            // Codeberg runs Forgejo/Gitea; check it before the generic match.
            Provider::Codeberg
        } else if host.contains("gitea") {
            Provider::Gitea
        } else {
            Provider::Unknown
        }
    }

    /// The environment variable consulted for a session-wide token.
    pub fn token_env_var(&self) -> Option<&'static str> {
        match self {
            Provider::GitHub => Some("GITHUB_TOKEN"),
            Provider::GitLab => Some("GITLAB_TOKEN"),
            Provider::Bitbucket => Some("BITBUCKET_TOKEN"),
            Provider::Gitea => Some("GITEA_TOKEN"),
            Provider::Codeberg => Some("CODEBERG_TOKEN"),
            Provider::Unknown => None,
        }
    }

    /// Username/password pair used to present `token` over HTTP basic auth
    /// or inside a clone URL.
    ///
    /// # Examples
    /// ```
    /// use repodigest::reference::Provider;
    ///
    /// assert_eq!(Provider::GitLab.basic_auth("t0k"), ("oauth2".to_string(), Some("t0k".to_string())));
    /// assert_eq!(Provider::GitHub.basic_auth("t0k"), ("t0k".to_string(), None));
    /// ```
    pub fn basic_auth(&self, token: &str) -> (String, Option<String>) {
        match self {
            Provider::GitLab => ("oauth2".to_string(), Some(token.to_string())),
            Provider::Bitbucket => ("x-token-auth".to_string(), Some(token.to_string())),
            // GitHub accepts the token as username; unknown hosts get the same treatment.
            _ => (token.to_string(), None),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::GitHub => "GitHub",
            Provider::GitLab => "GitLab",
            Provider::Bitbucket => "Bitbucket",
            Provider::Gitea => "Gitea",
            Provider::Codeberg => "Codeberg",
            Provider::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}
