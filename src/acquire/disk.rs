// src/acquire/disk.rs

//! Shallow clone with the native `git` client.

use super::credentials::{authenticated_url, redact};
use super::scratch::ScratchDir;
use super::{Acquirer, Snapshot};
use crate::constants::{PROGRESS_ACQUIRED, VCS_DIR};
use crate::core_types::RawEntry;
use crate::errors::{classify_failure, io_error_with_path, Error, Result};
use crate::progress::Progress;
use crate::reference::RepoReference;
use anyhow::anyhow;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use walkdir::WalkDir;

/// Directory inside the scratch dir that receives the checkout.
const CHECKOUT_DIR: &str = "checkout";

/// Local file reads are cheap; allow more of them in flight than remote fetches.
const DISK_READ_CONCURRENCY: usize = 16;

/// Number of trailing stderr lines kept for error messages.
const STDERR_TAIL: usize = 20;

/// Clones with `git clone --depth 1 --single-branch` into a [`ScratchDir`].
#[derive(Debug, Clone)]
pub struct DiskCloneAcquirer {
    git: String,
    scratch_parent: Option<PathBuf>,
}

impl DiskCloneAcquirer {
    pub fn new(git_executable: impl Into<String>) -> Self {
        Self {
            git: git_executable.into(),
            scratch_parent: None,
        }
    }

    /// Creates scratch directories under `parent` instead of the system temp dir.
    pub fn with_scratch_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.scratch_parent = Some(parent.into());
        self
    }

    /// Runs the clone, streaming `--progress` output from stderr into `progress`.
    async fn run_clone(
        &self,
        url: &str,
        branch: Option<&str>,
        target: &Path,
        token: Option<&str>,
        progress: &Progress,
    ) -> Result<()> {
        let mut command = Command::new(&self.git);
        command
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--single-branch")
            .arg("--progress");
        if let Some(branch) = branch {
            command.arg("--branch").arg(branch);
        }
        command
            .arg(url)
            .arg(target)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::debug!(
            "Running {} clone of {} into {}",
            self.git,
            redact(url, token),
            target.display()
        );
        let mut child = command
            .spawn()
            .map_err(|e| io_error_with_path(e, &self.git))?;

        let mut tail: Vec<String> = Vec::new();
        if let Some(mut stderr) = child.stderr.take() {
            let mut buf = [0u8; 4096];
            let mut pending = String::new();
            loop {
                let n = stderr
                    .read(&mut buf)
                    .await
                    .map_err(|e| Error::Internal(anyhow!("reading git stderr: {}", e)))?;
                if n == 0 {
                    break;
                }
                pending.push_str(&String::from_utf8_lossy(&buf[..n]));
                // git redraws progress with '\r'; treat it like a line break.
                while let Some(pos) = pending.find(['\r', '\n']) {
                    let line: String = pending.drain(..=pos).collect();
                    handle_stderr_line(line.trim(), progress, &mut tail);
                }
            }
            handle_stderr_line(pending.trim(), progress, &mut tail);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| io_error_with_path(e, &self.git))?;
        if status.success() {
            return Ok(());
        }

        let message = redact(&tail.join("\n"), token);
        log::warn!("git clone exited with {}: {}", status, message);
        let message = if message.is_empty() {
            format!("git clone exited with {}", status)
        } else {
            message
        };
        Err(classify_failure(None, &message))
    }
}

fn handle_stderr_line(line: &str, progress: &Progress, tail: &mut Vec<String>) {
    if line.is_empty() {
        return;
    }
    if let Some(percent) = parse_receiving_percent(line) {
        progress.report(
            percent as u64 * PROGRESS_ACQUIRED / 100,
            format!("Receiving objects: {}%", percent),
        );
        return;
    }
    if tail.len() == STDERR_TAIL {
        tail.remove(0);
    }
    tail.push(line.to_string());
}

/// Extracts `N` from a `Receiving objects: N% (...)` progress line.
///
/// # Examples
/// ```
/// use repodigest::acquire::parse_receiving_percent;
///
/// assert_eq!(parse_receiving_percent("Receiving objects:  42% (21/50)"), Some(42));
/// assert_eq!(parse_receiving_percent("remote: Receiving objects: 100% (9/9), done."), Some(100));
/// assert_eq!(parse_receiving_percent("Resolving deltas:  10% (1/10)"), None);
/// ```
pub fn parse_receiving_percent(line: &str) -> Option<u8> {
    let (_, rest) = line.split_once("Receiving objects:")?;
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let value: u8 = digits.parse().ok()?;
    (value <= 100).then_some(value)
}

#[async_trait]
impl Acquirer for DiskCloneAcquirer {
    async fn acquire(
        &self,
        reference: &RepoReference,
        token: Option<&str>,
        progress: &Progress,
    ) -> Result<Box<dyn Snapshot>> {
        progress.report(0, format!("Cloning {}", reference.short_name()));
        let scratch = match &self.scratch_parent {
            Some(parent) => ScratchDir::new_in(parent)?,
            None => ScratchDir::new()?,
        };
        let root = scratch.path().join(CHECKOUT_DIR);
        let url = authenticated_url(&reference.clone_url(), reference.provider, token);

        self.run_clone(&url, reference.branch.as_deref(), &root, token, progress)
            .await?;

        let branch = read_head_branch(&root).await;
        let walk_root = root.clone();
        let entries = tokio::task::spawn_blocking(move || list_checkout(&walk_root))
            .await
            .map_err(|e| Error::Internal(anyhow!("directory walk panicked: {}", e)))??;
        log::info!(
            "Cloned {} ({} entries, branch {:?})",
            reference.short_name(),
            entries.len(),
            branch
        );
        progress.report(PROGRESS_ACQUIRED, "Clone complete");

        Ok(Box::new(DiskSnapshot {
            _scratch: scratch,
            root,
            entries,
            branch,
        }))
    }
}

/// Reads the checked-out branch from `.git/HEAD`. `None` for a detached head.
async fn read_head_branch(root: &Path) -> Option<String> {
    let head = tokio::fs::read_to_string(root.join(VCS_DIR).join("HEAD"))
        .await
        .ok()?;
    head.trim()
        .strip_prefix("ref: refs/heads/")
        .map(|b| b.to_string())
}

/// Lists the checkout, skipping the top-level `.git` directory.
fn list_checkout(root: &Path) -> Result<Vec<RawEntry>> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == VCS_DIR));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            match e.into_io_error() {
                Some(io) => io_error_with_path(io, path),
                None => Error::Internal(anyhow!("filesystem loop at {}", path.display())),
            }
        })?;
        let relative = match relative_path(root, entry.path()) {
            Some(p) => p,
            None => continue,
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            entries.push(RawEntry::dir(relative));
        } else if file_type.is_file() {
            let size = entry
                .metadata()
                .map(|m| m.len())
                .map_err(|e| Error::Internal(anyhow!("metadata for {}: {}", relative, e)))?;
            entries.push(RawEntry::file(relative, size));
        } else {
            log::debug!("Skipping non-regular entry {}", relative);
        }
    }
    Ok(entries)
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// A checkout on disk. Dropping it removes the scratch directory.
struct DiskSnapshot {
    _scratch: ScratchDir,
    root: PathBuf,
    entries: Vec<RawEntry>,
    branch: Option<String>,
}

#[async_trait]
impl Snapshot for DiskSnapshot {
    fn entries(&self) -> &[RawEntry] {
        &self.entries
    }

    fn resolved_branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    fn read_concurrency(&self) -> usize {
        DISK_READ_CONCURRENCY
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.root.join(path);
        tokio::fs::read(&full)
            .await
            .map_err(|e| io_error_with_path(e, &full))
    }
}
