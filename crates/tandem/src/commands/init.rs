//! Implementation of the `init` command.
//!
//! Creates the `.tandem/` directory with a default configuration, an empty
//! features file and a `.gitignore`.

use crate::config::{CONFIG_FILE_NAME, FEATURES_FILE_NAME, TANDEM_DIR_NAME, TandemConfig};
use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name of the gitignore file within .tandem
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Maximum directory depth to traverse when searching for the tandem root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created tandem directory
    pub tandem_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
    /// Path to the created features file
    pub features_file: PathBuf,
    /// Path to the created gitignore file
    pub gitignore_file: PathBuf,
}

/// Initialize a new tandem repository in the given directory.
///
/// # Errors
///
/// Returns an error if:
/// - The `.tandem/` directory already exists
/// - File system operations fail
pub async fn init(base_dir: &Path) -> Result<InitResult> {
    let tandem_dir = base_dir.join(TANDEM_DIR_NAME);

    if tandem_dir.exists() {
        return Err(ConfigError::AlreadyInitialized(TANDEM_DIR_NAME.to_string()).into());
    }

    fs::create_dir_all(&tandem_dir).await?;

    let config_file = tandem_dir.join(CONFIG_FILE_NAME);
    TandemConfig::default().save(&config_file).await?;

    let features_file = tandem_dir.join(FEATURES_FILE_NAME);
    fs::write(&features_file, "").await?;

    let gitignore_file = tandem_dir.join(GITIGNORE_FILE_NAME);
    let gitignore_content = "\
# Temp files left by an interrupted save
*.tmp
# Held by whichever tandem process is running
tandem.lock
# features.jsonl should be tracked so the whole team sees progress
";
    fs::write(&gitignore_file, gitignore_content).await?;

    tracing::info!(path = %tandem_dir.display(), "Initialized tandem repository");

    Ok(InitResult {
        tandem_dir,
        config_file,
        features_file,
        gitignore_file,
    })
}

/// Check if a directory has been initialized with tandem.
#[must_use]
pub fn is_initialized(base_dir: &Path) -> bool {
    base_dir.join(TANDEM_DIR_NAME).exists()
}

/// Find the tandem root directory by searching up the directory tree.
///
/// Returns the directory containing `.tandem/`, or `None` if the filesystem
/// root or [`MAX_TRAVERSAL_DEPTH`] is reached first.
#[must_use]
pub fn find_tandem_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(TANDEM_DIR_NAME).exists() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_directory_structure() {
        let temp_dir = TempDir::new().unwrap();

        let result = init(temp_dir.path()).await.unwrap();

        assert!(result.tandem_dir.exists());
        assert!(result.config_file.exists());
        assert!(result.features_file.exists());
        assert!(result.gitignore_file.exists());

        let content = tokio::fs::read_to_string(&result.features_file)
            .await
            .unwrap();
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn test_init_writes_loadable_config() {
        let temp_dir = TempDir::new().unwrap();
        let result = init(temp_dir.path()).await.unwrap();

        let config = TandemConfig::load(&result.config_file).await.unwrap();
        assert_eq!(config, TandemConfig::default());
    }

    #[tokio::test]
    async fn test_init_fails_if_already_initialized() {
        let temp_dir = TempDir::new().unwrap();

        init(temp_dir.path()).await.unwrap();
        let result = init(temp_dir.path()).await;

        let err_msg = result.unwrap_err().to_string().to_lowercase();
        assert!(err_msg.contains("already initialized"));
    }

    #[tokio::test]
    async fn test_init_gitignore_ignores_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let result = init(temp_dir.path()).await.unwrap();

        let content = tokio::fs::read_to_string(&result.gitignore_file)
            .await
            .unwrap();
        assert!(content.contains("*.tmp"));
        assert!(content.contains(crate::lock::LOCK_FILE_NAME));
    }

    #[test]
    fn test_is_initialized() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_initialized(temp_dir.path()));

        std::fs::create_dir(temp_dir.path().join(TANDEM_DIR_NAME)).unwrap();
        assert!(is_initialized(temp_dir.path()));
    }

    #[test]
    fn test_find_tandem_root_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(TANDEM_DIR_NAME)).unwrap();

        let sub_dir = temp_dir.path().join("sub").join("nested");
        std::fs::create_dir_all(&sub_dir).unwrap();

        assert_eq!(find_tandem_root(&sub_dir), Some(temp_dir.path().to_path_buf()));
        assert_eq!(
            find_tandem_root(temp_dir.path()),
            Some(temp_dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_find_tandem_root_not_found() {
        let temp_dir = TempDir::new().unwrap();
        assert!(find_tandem_root(temp_dir.path()).is_none());
    }
}
