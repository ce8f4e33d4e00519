//! Cross-process lock on a tandem repository.
//!
//! Each CLI invocation loads the data file into memory, changes it and writes
//! it back. The store's own mutex only orders tasks inside one process, so two
//! `tandem claim` processes could otherwise both claim the same feature and the
//! last save would win. [`RepoLock`] holds an exclusive advisory lock on
//! `.tandem/tandem.lock` for as long as it lives, which makes the whole
//! load, mutate and save sequence exclusive across processes.

use crate::error::{Error, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the lock file within .tandem
pub const LOCK_FILE_NAME: &str = "tandem.lock";

/// Exclusive lock on a repository, released on drop.
#[derive(Debug)]
pub struct RepoLock {
    file: File,
    path: PathBuf,
}

impl RepoLock {
    /// Block until the repository in `tandem_dir` is ours.
    ///
    /// The lock file is created if missing and never removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the lock file cannot be opened or locked.
    pub async fn acquire(tandem_dir: &Path) -> Result<Self> {
        let path = tandem_dir.join(LOCK_FILE_NAME);
        let lock_path = path.clone();

        // flock blocks the thread, not the task.
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        debug!(path = %path.display(), "Repository lock acquired");
        Ok(Self { file, path })
    }

    /// Path of the lock file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        // Closing the file would release it as well.
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "Repository lock released");
    }
}
