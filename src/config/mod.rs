//! Defines the `IngestOptions` and `IngestConfig` types.
//!
//! `IngestOptions` holds the knobs of one request (size limit, patterns,
//! token, branch). `IngestConfig` holds deployment settings shared by many
//! requests (strategy, endpoints, proxy, timeout).

use crate::constants::{
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SLIDER_POSITION, GITHUB_API_BASE, GITHUB_RAW_BASE,
    SLIDER_MAX,
};
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use builder::{IngestConfigBuilder, API_BASE_ENV, CORS_PROXY_ENV, RAW_BASE_ENV};
mod builder;
mod parsing;

pub use parsing::parse_max_size;

/// Maps a size-slider position in `[1, 500]` to a byte limit.
///
/// The curve is exponential so that the low end has fine granularity:
/// `round(exp(ln(102400) * (p / 500)^1.5))` kilobytes. Positions outside the
/// range are clamped.
///
/// # Examples
/// ```
/// use repodigest::config::max_file_size_from_slider;
///
/// assert_eq!(max_file_size_from_slider(500), 102_400 * 1024);
/// assert_eq!(max_file_size_from_slider(1), 1024);
/// let default_kb = max_file_size_from_slider(243) / 1024;
/// assert!((45..=55).contains(&default_kb));
/// ```
pub fn max_file_size_from_slider(position: u32) -> u64 {
    let p = position.clamp(1, SLIDER_MAX) as f64;
    let max_kb = 102_400f64;
    let kb = (max_kb.ln() * (p / SLIDER_MAX as f64).powf(1.5)).exp().round();
    (kb as u64) * 1024
}

/// Which acquisition strategy fetches the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Shallow clone with the native `git` client into a temporary directory.
    #[default]
    DiskClone,
    /// In-process smart-HTTP fetch into an in-memory object store.
    VirtualClone,
    /// GitHub REST tree listing plus raw-content reads.
    RemoteApi,
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disk" | "disk_clone" | "clone" => Ok(Strategy::DiskClone),
            "virtual" | "virtual_clone" | "memory" => Ok(Strategy::VirtualClone),
            "api" | "remote_api" => Ok(Strategy::RemoteApi),
            other => Err(Error::Config(format!(
                "Unknown strategy '{}' (expected disk, virtual, or api)",
                other
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::DiskClone => "disk",
            Strategy::VirtualClone => "virtual",
            Strategy::RemoteApi => "api",
        })
    }
}

/// Per-request options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Files larger than this many bytes are dropped.
    pub max_file_size: u64,
    /// If non-empty, a path must match at least one of these to be kept.
    pub include_patterns: Vec<String>,
    /// Paths matching any of these are dropped.
    pub exclude_patterns: Vec<String>,
    /// Explicit token. Wins over any session credential.
    pub auth_token: Option<String>,
    /// Overrides the branch parsed from the reference.
    pub branch: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_file_size: max_file_size_from_slider(DEFAULT_SLIDER_POSITION),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            auth_token: None,
            branch: None,
        }
    }
}

/// Deployment-level settings, shared across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub strategy: Strategy,
    /// Relay prefix for the virtual clone, used as `<proxy>/<host>/<path>`.
    pub cors_proxy: Option<String>,
    /// GitHub REST endpoint, without trailing slash.
    pub api_base_url: String,
    /// Raw-content endpoint, without trailing slash.
    pub raw_base_url: String,
    /// Budget for one whole request, enforced by `ingest_with_timeout`.
    pub request_timeout: Duration,
    /// The `git` executable used by the disk clone.
    pub git_executable: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            cors_proxy: None,
            api_base_url: GITHUB_API_BASE.to_string(),
            raw_base_url: GITHUB_RAW_BASE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            git_executable: "git".to_string(),
        }
    }
}

impl IngestConfig {
    /// Starts a builder with default values.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slider_is_monotonic() {
        let mut last = 0;
        for p in 1..=SLIDER_MAX {
            let size = max_file_size_from_slider(p);
            assert!(size >= last, "slider not monotonic at {}", p);
            last = size;
        }
    }

    #[test]
    fn test_slider_clamps_out_of_range() {
        assert_eq!(max_file_size_from_slider(0), max_file_size_from_slider(1));
        assert_eq!(
            max_file_size_from_slider(9_999),
            max_file_size_from_slider(SLIDER_MAX)
        );
    }

    #[test]
    fn test_default_options_use_default_slider() {
        let options = IngestOptions::default();
        assert_eq!(
            options.max_file_size,
            max_file_size_from_slider(DEFAULT_SLIDER_POSITION)
        );
        assert!(options.include_patterns.is_empty());
        assert!(options.auth_token.is_none());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("disk".parse::<Strategy>().unwrap(), Strategy::DiskClone);
        assert_eq!("Virtual".parse::<Strategy>().unwrap(), Strategy::VirtualClone);
        assert_eq!("api".parse::<Strategy>().unwrap(), Strategy::RemoteApi);
        assert!(matches!("ftp".parse::<Strategy>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_strategy_deserializes_snake_case() {
        let s: Strategy = serde_json::from_str("\"remote_api\"").unwrap();
        assert_eq!(s, Strategy::RemoteApi);
    }
}
