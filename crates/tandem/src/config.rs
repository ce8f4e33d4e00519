//! Configuration file handling.
//!
//! `.tandem/config.yaml` selects the storage backend and tunes the scheduler:
//!
//! ```yaml
//! storage:
//!   backend: jsonl
//!   data_file: .tandem/features.jsonl
//! scheduler:
//!   impact_max_depth: 3
//!   max_skips: null
//! ingest:
//!   min_confidence: 0.0
//! ```
//!
//! Every section is optional when loading; missing values take the defaults
//! shown above.

use crate::error::{ConfigError, Result};
use crate::graph::DEFAULT_IMPACT_DEPTH;
use crate::scheduler::SchedulerSettings;
use crate::storage::StorageBackend;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Name of the tandem directory
pub const TANDEM_DIR_NAME: &str = ".tandem";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the features data file
pub const FEATURES_FILE_NAME: &str = "features.jsonl";

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TandemConfig {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scheduler tunables
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Edge ingestion tunables
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Storage configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `jsonl` (persistent) or `memory` (ephemeral)
    pub backend: String,

    /// Data file path, relative to the repository root
    pub data_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "jsonl".to_string(),
            data_file: format!("{TANDEM_DIR_NAME}/{FEATURES_FILE_NAME}"),
        }
    }
}

/// Scheduler configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Levels of dependents walked by impact analysis
    pub impact_max_depth: usize,

    /// Park a feature after this many skips; `null` never parks
    pub max_skips: Option<u32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            impact_max_depth: DEFAULT_IMPACT_DEPTH,
            max_skips: None,
        }
    }
}

/// Ingest configuration section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Drop candidates below this confidence
    pub min_confidence: f64,
}

impl TandemConfig {
    /// Load and validate configuration from a file
    ///
    /// # Errors
    ///
    /// `Io` if the file can't be read, `Config` if it can't be parsed or a value
    /// is out of range.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// `Io` if the file can't be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Yaml(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` naming the offending key, or
    /// `ConfigError::UnknownBackend`.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.scheduler.impact_max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.impact_max_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scheduler.max_skips == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.max_skips",
                reason: "must be at least 1, or null to never park".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.ingest.min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "ingest.min_confidence",
                reason: format!("{} is not in [0.0, 1.0]", self.ingest.min_confidence),
            });
        }
        match self.storage.backend.as_str() {
            "jsonl" | "memory" => Ok(()),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }

    /// Resolve the storage backend relative to the repository root.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnknownBackend` for an unrecognised backend name.
    pub fn to_backend(&self, root_dir: &Path) -> std::result::Result<StorageBackend, ConfigError> {
        match self.storage.backend.as_str() {
            "jsonl" => Ok(StorageBackend::Jsonl(root_dir.join(&self.storage.data_file))),
            "memory" => Ok(StorageBackend::InMemory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }

    /// Scheduler settings derived from this configuration
    #[must_use]
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            impact_max_depth: self.scheduler.impact_max_depth,
            max_skips: self.scheduler.max_skips,
            min_confidence: self.ingest.min_confidence,
        }
    }
}
