// src/config/builder.rs

use super::{
    max_file_size_from_slider,
    parsing::{env_non_empty, parse_max_size},
    IngestConfig, IngestOptions, Strategy,
};
use crate::cli::IngestArgs;
use crate::errors::{Error, Result};
use std::time::Duration;
use url::Url;

/// Environment variable supplying a default CORS relay for the virtual clone.
pub const CORS_PROXY_ENV: &str = "REPODIGEST_CORS_PROXY";
/// Environment variable overriding the GitHub REST API base URL.
pub const API_BASE_ENV: &str = "REPODIGEST_API_BASE_URL";
/// Environment variable overriding the raw-content base URL.
pub const RAW_BASE_ENV: &str = "REPODIGEST_RAW_BASE_URL";

/// A builder for creating an `IngestConfig` programmatically.
///
/// # Examples
///
/// ```
/// use repodigest::config::{IngestConfigBuilder, Strategy};
/// use std::time::Duration;
///
/// let config = IngestConfigBuilder::new()
///     .strategy(Strategy::RemoteApi)
///     .api_base_url("http://127.0.0.1:8080/")
///     .request_timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
///
/// assert_eq!(config.strategy, Strategy::RemoteApi);
/// assert_eq!(config.api_base_url, "http://127.0.0.1:8080");
/// ```
#[derive(Debug, Default, Clone)]
pub struct IngestConfigBuilder {
    strategy: Option<Strategy>,
    cors_proxy: Option<String>,
    api_base_url: Option<String>,
    raw_base_url: Option<String>,
    request_timeout: Option<Duration>,
    git_executable: Option<String>,
}

impl IngestConfigBuilder {
    /// Creates a new `IngestConfigBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the acquisition strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Sets the CORS relay prefix used by the virtual clone.
    pub fn cors_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.cors_proxy = Some(proxy.into());
        self
    }

    /// Sets the GitHub REST endpoint.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the raw-content endpoint.
    pub fn raw_base_url(mut self, url: impl Into<String>) -> Self {
        self.raw_base_url = Some(url.into());
        self
    }

    /// Sets the whole-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the `git` executable used by the disk clone.
    pub fn git_executable(mut self, exe: impl Into<String>) -> Self {
        self.git_executable = Some(exe.into());
        self
    }

    /// Fills unset endpoints from `REPODIGEST_CORS_PROXY`,
    /// `REPODIGEST_API_BASE_URL` and `REPODIGEST_RAW_BASE_URL`.
    pub fn with_env_defaults(mut self) -> Self {
        if self.cors_proxy.is_none() {
            self.cors_proxy = env_non_empty(CORS_PROXY_ENV);
        }
        if self.api_base_url.is_none() {
            self.api_base_url = env_non_empty(API_BASE_ENV);
        }
        if self.raw_base_url.is_none() {
            self.raw_base_url = env_non_empty(RAW_BASE_ENV);
        }
        self
    }

    /// Validates the settings and builds the `IngestConfig`.
    ///
    /// # Errors
    /// Returns `Error::Config` if a URL does not parse or the timeout is zero.
    pub fn build(self) -> Result<IngestConfig> {
        let defaults = IngestConfig::default();

        let api_base_url = normalize_base_url(self.api_base_url, defaults.api_base_url, "API")?;
        let raw_base_url = normalize_base_url(self.raw_base_url, defaults.raw_base_url, "raw")?;
        let cors_proxy = self
            .cors_proxy
            .filter(|p| !p.trim().is_empty())
            .map(|p| normalize_base_url(Some(p), String::new(), "CORS proxy"))
            .transpose()?;

        let request_timeout = self.request_timeout.unwrap_or(defaults.request_timeout);
        if request_timeout.is_zero() {
            return Err(Error::Config("Request timeout must be positive".to_string()));
        }

        let config = IngestConfig {
            strategy: self.strategy.unwrap_or(defaults.strategy),
            cors_proxy,
            api_base_url,
            raw_base_url,
            request_timeout,
            git_executable: self.git_executable.unwrap_or(defaults.git_executable),
        };
        log::debug!("Built ingest config: {:?}", config);
        Ok(config)
    }
}

fn normalize_base_url(value: Option<String>, default: String, what: &str) -> Result<String> {
    let raw = match value {
        Some(v) => v.trim().trim_end_matches('/').to_string(),
        None => return Ok(default),
    };
    Url::parse(&raw).map_err(|e| Error::Config(format!("Invalid {} URL '{}': {}", what, raw, e)))?;
    Ok(raw)
}

impl TryFrom<&IngestArgs> for IngestConfig {
    type Error = Error;

    fn try_from(args: &IngestArgs) -> Result<Self> {
        let mut builder = IngestConfigBuilder::new().with_env_defaults();
        builder = builder.strategy(args.strategy.parse()?);
        if let Some(proxy) = &args.cors_proxy {
            builder = builder.cors_proxy(proxy.clone());
        }
        if let Some(secs) = args.timeout {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

impl TryFrom<&IngestArgs> for IngestOptions {
    type Error = Error;

    fn try_from(args: &IngestArgs) -> Result<Self> {
        let max_file_size = match (&args.max_size, args.slider) {
            (Some(size), _) => parse_max_size(size)?,
            (None, Some(position)) => max_file_size_from_slider(position),
            (None, None) => IngestOptions::default().max_file_size,
        };
        Ok(IngestOptions {
            max_file_size,
            include_patterns: args.include_patterns.clone(),
            exclude_patterns: args.exclude_patterns.clone(),
            auth_token: args.token.clone().filter(|t| !t.trim().is_empty()),
            branch: args.branch.clone(),
        })
    }
}
