//! Repository acquisition.
//!
//! An [`Acquirer`] turns a [`RepoReference`] into a [`Snapshot`]: a flat list
//! of entries with sizes plus a way to read any listed file. Three strategies
//! exist:
//! - [`DiskCloneAcquirer`] - native `git clone --depth 1` into a scratch directory
//! - [`VirtualCloneAcquirer`] - in-process smart-HTTP fetch into memory
//! - [`RemoteApiAcquirer`] - GitHub tree listing plus raw-content reads
//!
//! Whatever a snapshot holds (a temporary directory, an object store) is
//! released when the snapshot is dropped.

mod api;
mod credentials;
mod disk;
mod http;
mod scratch;
pub mod virtual_clone;

pub use api::RemoteApiAcquirer;
pub use credentials::{authenticated_url, redact};
pub use disk::{parse_receiving_percent, DiskCloneAcquirer};
pub use scratch::ScratchDir;
pub use virtual_clone::VirtualCloneAcquirer;

use crate::config::{IngestConfig, Strategy};
use crate::core_types::RawEntry;
use crate::errors::Result;
use crate::progress::Progress;
use crate::reference::RepoReference;
use async_trait::async_trait;

/// Fetches a repository snapshot.
#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Fetches `reference` (its `branch`, or the default branch when `None`).
    ///
    /// Reports progress in the `0..=50` band.
    async fn acquire(
        &self,
        reference: &RepoReference,
        token: Option<&str>,
        progress: &Progress,
    ) -> Result<Box<dyn Snapshot>>;
}

/// A read-only view of one ref of a repository.
#[async_trait]
pub trait Snapshot: Send + Sync {
    /// Every file and directory, with paths relative to the repository root.
    fn entries(&self) -> &[RawEntry];

    /// The branch that was actually fetched, when known.
    fn resolved_branch(&self) -> Option<&str>;

    /// How many reads the traversal may run at once.
    fn read_concurrency(&self) -> usize {
        1
    }

    /// Reads a listed file.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
}

/// Returns the acquirer selected by `config.strategy`.
pub fn acquirer_for(config: &IngestConfig) -> Result<Box<dyn Acquirer>> {
    log::debug!("Using {} acquisition strategy", config.strategy);
    Ok(match config.strategy {
        Strategy::DiskClone => Box::new(DiskCloneAcquirer::new(config.git_executable.clone())),
        Strategy::VirtualClone => Box::new(VirtualCloneAcquirer::new(config.cors_proxy.clone())?),
        Strategy::RemoteApi => Box::new(RemoteApiAcquirer::new(
            config.api_base_url.clone(),
            config.raw_base_url.clone(),
        )?),
    })
}
