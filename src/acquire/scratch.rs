// src/acquire/scratch.rs

use crate::errors::{io_error_with_path, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::{Builder as TempDirBuilder, TempDir};

/// A uniquely named temporary directory, removed recursively on drop.
///
/// The name carries a millisecond timestamp and a random suffix, e.g.
/// `repodigest-1718000000000-AbC123`. Removal failures are logged, never
/// raised, so they cannot mask the result of the request that owned the
/// directory.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    /// Creates a new scratch directory under the system temp dir.
    pub fn new() -> Result<Self> {
        Self::new_in(std::env::temp_dir())
    }

    /// Creates a new scratch directory under `parent`.
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let prefix = format!("repodigest-{}-", millis);
        let dir = TempDirBuilder::new()
            .prefix(&prefix)
            .tempdir_in(parent.as_ref())
            .map_err(|e| io_error_with_path(e, parent.as_ref()))?;
        let path = dir.path().to_path_buf();
        log::debug!("Created scratch directory {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => log::debug!("Removed scratch directory {}", self.path.display()),
                Err(e) => log::warn!(
                    "Failed to remove scratch directory {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_is_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new_in(parent.path()).unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::create_dir_all(path.join("nested/deeper")).unwrap();
        std::fs::write(path.join("nested/deeper/file.txt"), "x").unwrap();
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_dirs_are_unique() {
        let parent = tempfile::tempdir().unwrap();
        let a = ScratchDir::new_in(parent.path()).unwrap();
        let b = ScratchDir::new_in(parent.path()).unwrap();
        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("repodigest-"));
    }

    #[test]
    fn test_missing_parent_is_an_io_error() {
        let parent = tempfile::tempdir().unwrap();
        let missing = parent.path().join("does-not-exist");
        assert!(matches!(
            ScratchDir::new_in(&missing),
            Err(crate::errors::Error::Io { .. })
        ));
    }
}
