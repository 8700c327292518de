// src/session.rs

//! Credential lookup shared across requests.
//!
//! A `Session` is owned by the caller (the CLI process, the web server state)
//! and lazily loads one token per provider from the environment the first
//! time a credential is needed. An explicit per-request token always wins.

use crate::reference::Provider;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;

const PROVIDERS: [Provider; 5] = [
    Provider::GitHub,
    Provider::GitLab,
    Provider::Bitbucket,
    Provider::Gitea,
    Provider::Codeberg,
];

/// A token and the provider it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub provider: Provider,
}

impl Credential {
    pub fn new(token: impl Into<String>, provider: Provider) -> Self {
        Self {
            token: token.into(),
            provider,
        }
    }
}

// Never print the token itself.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"***")
            .field("provider", &self.provider)
            .finish()
    }
}

/// Per-process credential table.
///
/// # Examples
///
/// ```
/// use repodigest::reference::Provider;
/// use repodigest::session::{Credential, Session};
///
/// let session = Session::with_credentials(vec![Credential::new("ghp_x", Provider::GitHub)]);
/// assert_eq!(session.token_for(Provider::GitHub, None).as_deref(), Some("ghp_x"));
/// // An explicit token wins over the table.
/// assert_eq!(session.token_for(Provider::GitHub, Some("mine")).as_deref(), Some("mine"));
/// assert_eq!(session.token_for(Provider::GitLab, None), None);
/// ```
#[derive(Debug, Default)]
pub struct Session {
    credentials: OnceCell<HashMap<Provider, Credential>>,
}

impl Session {
    /// A session that reads provider tokens from the environment on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// A session with a fixed table; the environment is never consulted.
    pub fn with_credentials(credentials: Vec<Credential>) -> Self {
        let table = credentials.into_iter().map(|c| (c.provider, c)).collect();
        Self {
            credentials: OnceCell::with_value(table),
        }
    }

    fn table(&self) -> &HashMap<Provider, Credential> {
        self.credentials.get_or_init(load_from_env)
    }

    /// The session credential for `provider`, if any.
    pub fn credential(&self, provider: Provider) -> Option<&Credential> {
        self.table().get(&provider)
    }

    /// Resolves the token to use: `explicit` if non-blank, else the session's.
    pub fn token_for(&self, provider: Provider, explicit: Option<&str>) -> Option<String> {
        if let Some(token) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
            return Some(token.to_string());
        }
        self.credential(provider).map(|c| c.token.clone())
    }
}

fn load_from_env() -> HashMap<Provider, Credential> {
    let mut table = HashMap::new();
    for provider in PROVIDERS {
        let Some(var) = provider.token_env_var() else {
            continue;
        };
        if let Ok(token) = std::env::var(var) {
            let token = token.trim();
            if !token.is_empty() {
                log::debug!("Loaded {} credential from {}", provider, var);
                table.insert(provider, Credential::new(token, provider));
            }
        }
    }
    table
}
