//! Defines the error taxonomy surfaced by the ingestion pipeline.
//!
//! Every failure that reaches the caller is one of a small set of categories,
//! each carrying a human-readable message and mapping onto an HTTP-equivalent
//! status code so that thin shells (CLI, web) can react without inspecting
//! message text.

use thiserror::Error;

/// A convenient `Result` alias for ingestion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while resolving, acquiring, or rendering a repository.
#[derive(Error, Debug)]
pub enum Error {
    /// The reference string could not be parsed. Raised before any network call.
    #[error("Invalid repository reference: {0}")]
    InvalidReference(String),

    /// The host rejected the supplied credentials, or credentials are required.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The repository, branch, or path does not exist (or is not visible).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport or protocol level failure (timeouts, CORS, clone failures).
    #[error("Network or protocol error: {0}")]
    NetworkOrProtocolError(String),

    /// The selected acquisition strategy cannot serve this host.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Error occurring during local file or directory access.
    #[error("I/O error accessing path '{path}': {source}")]
    Io {
        /// The path that caused the I/O error.
        path: String,
        /// The underlying `std::io::Error`.
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration or options supplied by the caller.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Anything unexpected.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// Returns the HTTP-equivalent status code for this error.
    ///
    /// # Examples
    /// ```
    /// use repodigest::errors::Error;
    ///
    /// assert_eq!(Error::InvalidReference("x".into()).status_code(), 400);
    /// assert_eq!(Error::AuthenticationFailed("x".into()).status_code(), 401);
    /// assert_eq!(Error::NotFound("x".into()).status_code(), 404);
    /// assert_eq!(Error::NetworkOrProtocolError("x".into()).status_code(), 500);
    /// ```
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidReference(_) | Error::Config(_) => 400,
            Error::AuthenticationFailed(_) => 401,
            Error::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// A stable, machine-readable name for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidReference(_) => "invalid_reference",
            Error::AuthenticationFailed(_) => "authentication_failed",
            Error::NotFound(_) => "not_found",
            Error::NetworkOrProtocolError(_) => "network_or_protocol_error",
            Error::UnsupportedProvider(_) => "unsupported_provider",
            Error::Io { .. } => "io",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }
}

/// Classifies a remote failure from an optional HTTP status and a message.
///
/// Status codes win over message text. Without a decisive status, the message
/// is searched (case-insensitively) for the phrases hosts and `git` use for
/// authentication and missing-repository failures. Anything else is a
/// network/protocol error.
///
/// # Examples
/// ```
/// use repodigest::errors::{classify_failure, Error};
///
/// assert!(matches!(classify_failure(Some(403), "rate limited"), Error::AuthenticationFailed(_)));
/// assert!(matches!(
///     classify_failure(None, "remote: Repository not found."),
///     Error::NotFound(_)
/// ));
/// assert!(matches!(
///     classify_failure(None, "connection reset"),
///     Error::NetworkOrProtocolError(_)
/// ));
/// ```
pub fn classify_failure(status: Option<u16>, message: &str) -> Error {
    let msg = message.trim().to_string();
    match status {
        Some(401) | Some(403) => return Error::AuthenticationFailed(msg),
        Some(404) => return Error::NotFound(msg),
        _ => {}
    }

    let lower = message.to_lowercase();
    if lower.contains("authentication failed")
        || lower.contains("access denied")
        || lower.contains("could not read username")
        || lower.contains("could not read password")
    {
        Error::AuthenticationFailed(msg)
    } else if lower.contains("not found")
        || lower.contains("does not exist")
        || lower.contains("does not appear to be a git repository")
    {
        Error::NotFound(msg)
    } else {
        Error::NetworkOrProtocolError(msg)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Error::NetworkOrProtocolError(format!("request timed out: {}", err));
        }
        classify_failure(err.status().map(|s| s.as_u16()), &err.to_string())
    }
}

/// Helper function to create an `Error::Io` with path context.
///
/// # Arguments
/// * `source` - The original `std::io::Error`.
/// * `path` - The path associated with the error, convertible to `AsRef<std::path::Path>`.
pub fn io_error_with_path<P: AsRef<std::path::Path>>(source: std::io::Error, path: P) -> Error {
    Error::Io {
        path: path.as_ref().display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io, path::PathBuf};

    #[test]
    fn test_io_error_with_path_helper() {
        let path = PathBuf::from("some/test/path.txt");
        let source_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let err = io_error_with_path(source_error, &path);

        match err {
            Error::Io {
                path: error_path,
                source,
            } => {
                assert!(error_path.contains("some/test/path.txt"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            _ => panic!("Expected Error::Io"),
        }
    }

    #[test]
    fn test_status_codes_cover_taxonomy() {
        assert_eq!(Error::Config("bad".into()).status_code(), 400);
        assert_eq!(Error::UnsupportedProvider("gitlab".into()).status_code(), 500);
        assert_eq!(
            Error::Internal(anyhow::anyhow!("boom")).status_code(),
            500
        );
    }

    #[test]
    fn test_classify_status_beats_message() {
        // A 404 whose body talks about authentication is still a not-found.
        assert!(matches!(
            classify_failure(Some(404), "authentication failed"),
            Error::NotFound(_)
        ));
        assert!(matches!(
            classify_failure(Some(401), "whatever"),
            Error::AuthenticationFailed(_)
        ));
    }

    #[test]
    fn test_classify_git_stderr_messages() {
        assert!(matches!(
            classify_failure(
                None,
                "fatal: could not read Username for 'https://github.com': terminal prompts disabled"
            ),
            Error::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify_failure(None, "fatal: Authentication failed for 'https://x'"),
            Error::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify_failure(None, "fatal: Remote branch nope not found in upstream origin"),
            Error::NotFound(_)
        ));
        assert!(matches!(
            classify_failure(Some(500), "Internal Server Error"),
            Error::NetworkOrProtocolError(_)
        ));
    }

    #[test]
    fn test_kind_names_are_stable() {
        assert_eq!(Error::NotFound("x".into()).kind(), "not_found");
        assert_eq!(
            Error::AuthenticationFailed("x".into()).kind(),
            "authentication_failed"
        );
    }
}
