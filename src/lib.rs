//! `repodigest` is a library and command-line tool that turns a Git repository
//! reference into a single text digest suitable for a Large Language Model
//! prompt: a summary, a directory tree, and the concatenated file contents.
//!
//! As a library, it runs a staged pipeline:
//! 1.  **Resolve**: Parse `owner/repo`, `host/owner/repo` or a full URL into a
//!     [`reference::RepoReference`].
//! 2.  **Acquire**: Fetch a snapshot with one of three strategies (native
//!     `git` clone, in-memory smart-HTTP clone, or the GitHub REST API).
//! 3.  **Select**: Apply the subpath, the glob patterns and the size limit.
//! 4.  **Read**: Decode every kept file, binary files becoming a sentinel.
//! 5.  **Render**: Build the tree, the content block and the summary.
//!
//! Each stage is usable on its own; [`digest_snapshot`] runs stages 3 to 5
//! against any [`acquire::Snapshot`].
//!
//! # Example: Library Usage
//!
//! ```no_run
//! use repodigest::config::{IngestConfig, IngestOptions, Strategy};
//! use repodigest::progress::channel;
//! use futures::StreamExt;
//!
//! # async fn demo() -> repodigest::errors::Result<()> {
//! let config = IngestConfig::builder().strategy(Strategy::RemoteApi).build()?;
//! let options = IngestOptions {
//!     include_patterns: vec!["*.md".to_string()],
//!     ..IngestOptions::default()
//! };
//!
//! let (progress, mut events) = channel();
//! tokio::spawn(async move {
//!     while let Some(event) = events.next().await {
//!         eprintln!("[{:>3}%] {}", event.current, event.message);
//!     }
//! });
//!
//! let result = repodigest::ingest("octocat/Hello-World", &options, &config, Some(progress)).await?;
//! println!("{}\n\n{}", result.summary, result.digest());
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core_types;
pub mod discovery;
pub mod errors;
pub mod filtering;
pub mod output;
pub mod processing;
pub mod progress;
pub mod reference;
pub mod session;
#[cfg(feature = "web")]
pub mod web;

// Re-export key public types for easier use as a library
pub use config::{IngestConfig, IngestConfigBuilder, IngestOptions, Strategy};
pub use core_types::{FileRecord, IngestResult};
pub use errors::{Error, Result};
pub use progress::{Progress, ProgressEvent};
pub use reference::RepoReference;
pub use session::Session;

use crate::acquire::{acquirer_for, Snapshot};
use crate::constants::{PROGRESS_ACQUIRED, PROGRESS_TOTAL};
use crate::discovery::{select_entries, subpath_exists, Selection};
use crate::filtering::PatternSet;
use crate::output::{aggregate, build_tree, compare_paths, sort_entries, summarize, with_token_estimate};
use crate::processing::{estimate_tokens_async, read_files};
use log::{debug, info};
use once_cell::sync::Lazy;

/// Credentials read from the environment, shared by every [`ingest`] call.
static DEFAULT_SESSION: Lazy<Session> = Lazy::new(Session::new);

/// Ingests a repository using the process-wide session for credentials.
///
/// `progress`, when given, receives events from 0 to 100; acquisition covers
/// the first half and reading the second.
///
/// # Errors
/// [`Error::InvalidReference`] before any network call when the reference
/// does not parse; otherwise whatever acquisition or reading reports.
pub async fn ingest(
    reference: &str,
    options: &IngestOptions,
    config: &IngestConfig,
    progress: Option<Progress>,
) -> Result<IngestResult> {
    ingest_with_session(reference, options, config, &DEFAULT_SESSION, progress).await
}

/// Like [`ingest`], with credentials taken from `session`.
pub async fn ingest_with_session(
    reference: &str,
    options: &IngestOptions,
    config: &IngestConfig,
    session: &Session,
    progress: Option<Progress>,
) -> Result<IngestResult> {
    let progress = progress.unwrap_or_else(Progress::disabled);
    let reference =
        RepoReference::resolve(reference)?.with_branch_override(options.branch.as_deref());
    info!(
        "Ingesting {} from {} ({} strategy)",
        reference.short_name(),
        reference.authority(),
        config.strategy
    );
    progress.report(0, format!("Resolved {}", reference.short_name()));

    let token = session.token_for(reference.provider, options.auth_token.as_deref());
    let acquirer = acquirer_for(config)?;
    let snapshot = acquirer
        .acquire(&reference, token.as_deref(), &progress)
        .await?;
    progress.report(PROGRESS_ACQUIRED, "Repository acquired");

    digest_snapshot(&reference, snapshot.as_ref(), options, &progress).await
}

/// Runs [`ingest`] under `config.request_timeout`.
///
/// Dropping the inner future on expiry releases any scratch directory or
/// in-memory store the acquisition created.
///
/// # Errors
/// [`Error::NetworkOrProtocolError`] when the timeout expires.
pub async fn ingest_with_timeout(
    reference: &str,
    options: &IngestOptions,
    config: &IngestConfig,
    progress: Option<Progress>,
) -> Result<IngestResult> {
    let limit = config.request_timeout;
    match tokio::time::timeout(limit, ingest(reference, options, config, progress)).await {
        Ok(result) => result,
        Err(_) => Err(Error::NetworkOrProtocolError(format!(
            "Ingestion timed out after {} seconds",
            limit.as_secs_f64()
        ))),
    }
}

/// Selects, reads and renders an already acquired snapshot.
///
/// Files are read and concatenated in tree order. The tree's root label is the
/// repository name; paths stay relative to the repository root even when the
/// reference names a subpath.
///
/// # Errors
/// [`Error::NotFound`] if the reference names a subpath the snapshot does not
/// contain, [`Error::Config`] for a malformed pattern, or the first failed read.
pub async fn digest_snapshot(
    reference: &RepoReference,
    snapshot: &dyn Snapshot,
    options: &IngestOptions,
    progress: &Progress,
) -> Result<IngestResult> {
    if let Some(subpath) = reference.subpath.as_deref() {
        if !subpath_exists(snapshot.entries(), subpath) {
            return Err(Error::NotFound(format!(
                "Path '{}' does not exist in {}",
                subpath,
                reference.short_name()
            )));
        }
    }

    let patterns = PatternSet::new(&options.exclude_patterns, &options.include_patterns)?;
    let Selection {
        mut files,
        tree: mut tree_entries,
    } = select_entries(
        snapshot.entries(),
        reference.subpath.as_deref(),
        &patterns,
        options.max_file_size,
    );
    sort_entries(&mut tree_entries);
    files.sort_by(|a, b| compare_paths(&a.path, false, &b.path, false));
    debug!("{} files selected for reading", files.len());

    let records = read_files(snapshot, &files, progress).await?;

    let tree = build_tree(&tree_entries, &reference.repo);
    let content = aggregate(&records);
    let branch = snapshot
        .resolved_branch()
        .or(reference.branch.as_deref());
    let summary = summarize(reference, &records, branch);
    let estimate = estimate_tokens_async(format!("{}\n\n{}", tree, content)).await;
    let summary = with_token_estimate(&summary, estimate.as_deref());

    progress.report(PROGRESS_TOTAL, "Digest ready");
    info!(
        "Digest of {} ready: {} files, {} bytes",
        reference.short_name(),
        records.len(),
        content.len()
    );

    Ok(IngestResult {
        repo_url: reference.url(),
        short_repo_url: reference.short_name(),
        summary,
        tree,
        content,
    })
}
