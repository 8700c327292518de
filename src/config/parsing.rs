// src/config/parsing.rs

use crate::errors::{Error, Result};
use byte_unit::Byte;
use std::str::FromStr;

/// Parses a human-readable size (`"512k"`, `"1MiB"`, `"2048"`) into bytes.
///
/// # Examples
/// ```
/// use repodigest::config::parse_max_size;
///
/// assert_eq!(parse_max_size("10k").unwrap(), 10_000);
/// assert_eq!(parse_max_size("1MiB").unwrap(), 1024 * 1024);
/// assert!(parse_max_size("lots").is_err());
/// ```
pub fn parse_max_size(max_size_str: &str) -> Result<u64> {
    let bytes = Byte::from_str(max_size_str.trim())
        .map(|b| b.as_u128())
        .map_err(|e| Error::Config(format!("Invalid size format '{}': {}", max_size_str, e)))?;
    u64::try_from(bytes)
        .map_err(|_| Error::Config(format!("Size '{}' is too large", max_size_str)))
}

/// Reads an optional environment variable, treating blank values as unset.
pub(super) fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
