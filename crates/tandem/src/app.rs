//! Application context for CLI command execution.
//!
//! # Example
//!
//! ```no_run
//! use tandem::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_directory(Path::new(".")).await?;
//!     println!("{:?}", app.scheduler().progress().await?);
//!     Ok(())
//! }
//! ```

use crate::commands::init::find_tandem_root;
use crate::config::{CONFIG_FILE_NAME, TANDEM_DIR_NAME, TandemConfig};
use crate::error::{ConfigError, Result};
use crate::lock::RepoLock;
use crate::scheduler::Scheduler;
use crate::storage::create_store;
use std::path::{Path, PathBuf};

/// Application context for CLI operations.
///
/// Locates the repository, loads its configuration and opens a [`Scheduler`]
/// over the configured store.
///
/// An `App` holds the repository lock from before the data file is read until
/// it is dropped, so one command's load, change and save never interleave with
/// another process's.
pub struct App {
    scheduler: Scheduler,

    /// Path to the tandem directory (.tandem)
    tandem_dir: PathBuf,

    config: TandemConfig,

    // Declared last so it is released after the scheduler is gone.
    lock: RepoLock,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("tandem_dir", &self.tandem_dir)
            .field("config", &self.config)
            .field("scheduler", &"<Scheduler>")
            .field("lock", &self.lock.path())
            .finish()
    }
}

impl App {
    /// Create an App instance from the given working directory.
    ///
    /// Searches up the directory tree to find a `.tandem/` directory, then
    /// waits for the repository lock before reading anything.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No tandem repository is found in the directory tree
    /// - Configuration cannot be loaded
    /// - Storage initialization fails
    pub async fn from_directory(working_dir: &Path) -> Result<Self> {
        let root_dir = find_tandem_root(working_dir).ok_or(ConfigError::NotInitialized)?;

        let tandem_dir = root_dir.join(TANDEM_DIR_NAME);
        let lock = RepoLock::acquire(&tandem_dir).await?;
        let config = TandemConfig::load(&tandem_dir.join(CONFIG_FILE_NAME)).await?;

        let backend = config.to_backend(&root_dir)?;
        let store = create_store(backend).await?;
        let scheduler = Scheduler::open(store, config.scheduler_settings()).await?;

        Ok(Self {
            scheduler,
            tandem_dir,
            config,
            lock,
        })
    }

    /// The scheduler
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Loaded configuration
    #[must_use]
    pub fn config(&self) -> &TandemConfig {
        &self.config
    }

    /// Get the path to the tandem directory.
    #[must_use]
    pub fn tandem_dir(&self) -> &Path {
        &self.tandem_dir
    }

    /// Save scheduler state to persistent storage.
    ///
    /// This should be called after any mutating operations.
    ///
    /// # Errors
    ///
    /// I/O errors from the backend.
    pub async fn save(&self) -> Result<()> {
        self.scheduler.save().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;
    use crate::domain::NewFeature;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_app_from_subdirectory() {
        let temp_dir = TempDir::new().unwrap();
        init::init(temp_dir.path()).await.unwrap();

        let sub_dir = temp_dir.path().join("src").join("lib");
        std::fs::create_dir_all(&sub_dir).unwrap();

        let app = App::from_directory(&sub_dir).await.unwrap();
        assert!(app.tandem_dir().ends_with(".tandem"));
    }

    #[tokio::test]
    async fn test_app_from_uninitialized_directory() {
        let temp_dir = TempDir::new().unwrap();

        let err = App::from_directory(temp_dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("Not a tandem repository"));
    }

    #[tokio::test]
    async fn test_second_app_waits_for_first_to_drop() {
        let temp_dir = TempDir::new().unwrap();
        init::init(temp_dir.path()).await.unwrap();

        let first = App::from_directory(temp_dir.path()).await.unwrap();
        first
            .scheduler()
            .load_features(vec![NewFeature::new(1u64, "Login form", 1)])
            .await
            .unwrap();

        let dir = temp_dir.path().to_path_buf();
        let mut second = tokio::spawn(async move { App::from_directory(&dir).await });
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(200), &mut second).await;
        assert!(waited.is_err(), "second app opened while the first holds the lock");

        first.save().await.unwrap();
        drop(first);

        let second = second.await.unwrap().unwrap();
        assert_eq!(second.scheduler().features().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_app_save_persists_between_sessions() {
        let temp_dir = TempDir::new().unwrap();
        init::init(temp_dir.path()).await.unwrap();

        let app = App::from_directory(temp_dir.path()).await.unwrap();
        app.scheduler()
            .load_features(vec![NewFeature::new(1u64, "Login form", 1)])
            .await
            .unwrap();
        app.save().await.unwrap();
        drop(app);

        let reopened = App::from_directory(temp_dir.path()).await.unwrap();
        assert_eq!(reopened.scheduler().features().await.unwrap().len(), 1);
    }
}
