//! Storage abstraction layer for tandem.
//!
//! This module provides the storage trait the scheduler is built on and a
//! factory for creating storage backends:
//!
//! - **In-memory**: Fast, ephemeral storage behind a single async mutex
//! - **JSONL**: The in-memory backend plus atomic file persistence
//!
//! # Architecture
//!
//! The scheduler never holds a global handle. It receives an
//! `Arc<dyn FeatureStore>` and performs every status change through
//! [`FeatureStore::apply`], which checks the transition table and writes the new
//! state in one atomic step. That single call is the serialization point for
//! concurrent claims: two workers racing for the same feature both call `apply`,
//! and the second one sees a status that no longer permits a claim.
//!
//! A database backend would implement `apply` as a transactional
//! compare-and-swap against the status column.
//!
//! # Example
//!
//! ```no_run
//! use tandem::domain::NewFeature;
//! use tandem::storage::{create_store, StorageBackend};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let store = create_store(StorageBackend::InMemory).await?;
//!     let feature = NewFeature::new(1u64, "Login form", 1).into_feature(chrono::Utc::now());
//!     store.insert_features(vec![feature]).await?;
//!     store.save().await?;
//!     Ok(())
//! }
//! ```

use crate::domain::{DependencyEdge, Feature, FeatureId, FeatureStatus, Transition};
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Storage backend implementations
pub mod in_memory;

/// Result of a successful [`FeatureStore::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Status before the transition
    pub previous: FeatureStatus,
    /// The feature after the transition
    pub feature: Feature,
}

/// Core storage trait for features and dependency edges.
///
/// All methods take `&self`: implementations use interior mutability so that a
/// single store can be shared by many concurrent workers through an `Arc`.
///
/// # Method Categories
///
/// - **Batches**: `commit_batch` (features and edges together)
/// - **Features**: `insert_features`, `get`, `features`
/// - **Status changes**: `apply`
/// - **Edges**: `upsert_edge`, `edges`
/// - **Persistence**: `save`, `reload`
#[async_trait]
pub trait FeatureStore: Send + Sync {
    // ========== Features ==========

    /// Insert new features and upsert edges in one atomic step.
    ///
    /// Either every feature and every edge lands, or nothing does. Edge
    /// endpoints may name features from the same batch. An edge replaces any
    /// existing edge for the same ordered pair.
    ///
    /// # Errors
    ///
    /// - `Error::DuplicateFeature` if any id already exists or appears twice in
    ///   the batch
    /// - `Error::UnknownFeature` if an edge endpoint is in neither the store nor
    ///   the batch
    async fn commit_batch(
        &self,
        features: Vec<Feature>,
        edges: Vec<DependencyEdge>,
    ) -> Result<()>;

    /// Insert a batch of new features, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateFeature` if any id already exists or appears twice
    /// in the batch; nothing is inserted in that case.
    async fn insert_features(&self, features: Vec<Feature>) -> Result<()> {
        self.commit_batch(features, Vec::new()).await
    }

    /// Get a feature by ID.
    ///
    /// Returns `None` if the feature doesn't exist.
    async fn get(&self, id: FeatureId) -> Result<Option<Feature>>;

    /// Snapshot of all features, ordered by id.
    async fn features(&self) -> Result<Vec<Feature>>;

    // ========== Status Changes ==========

    /// Atomically check and apply a status transition.
    ///
    /// The current status is read and the transition written without any other
    /// `apply` interleaving. For `Skip`, the back-of-queue priority
    /// (`max(priority) + 1` over all features) is computed inside the same step.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownFeature` if the feature doesn't exist
    /// - `Error::InvalidTransition` if the current status does not permit it
    async fn apply(&self, id: FeatureId, transition: Transition) -> Result<Applied>;

    // ========== Edges ==========

    /// Insert an edge, replacing any existing edge for the same ordered pair.
    ///
    /// Cycle and confidence rules are enforced by the dependency graph before
    /// this is called; the store only persists the accepted edge.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownFeature` if either endpoint doesn't exist.
    async fn upsert_edge(&self, edge: DependencyEdge) -> Result<()> {
        self.commit_batch(Vec::new(), vec![edge]).await
    }

    /// All edges, ordered by `(feature_id, depends_on_id)`.
    async fn edges(&self) -> Result<Vec<DependencyEdge>>;

    // ========== Persistence ==========

    /// Save changes to persistent storage.
    ///
    /// For the JSONL backend this rewrites the data file atomically.
    /// For in-memory storage it is a no-op.
    async fn save(&self) -> Result<()>;

    /// Reload state from persistent storage, discarding unsaved changes.
    ///
    /// - **JSONL backend**: Re-reads the file and replaces in-memory state
    /// - **In-memory only**: No-op
    ///
    /// # Errors
    ///
    /// Returns an error if the backing file cannot be read.
    async fn reload(&self) -> Result<()>;
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-memory storage (ephemeral)
    InMemory,

    /// JSONL file storage (persistent)
    Jsonl(PathBuf),
}

impl StorageBackend {
    /// Returns the data file path for file-based backends.
    #[must_use]
    pub fn data_path(&self) -> Option<&Path> {
        match self {
            StorageBackend::Jsonl(path) => Some(path),
            StorageBackend::InMemory => None,
        }
    }
}

/// In-memory store whose `save()` writes a JSONL file.
struct JsonlBackedStore {
    inner: in_memory::InMemoryStore,
    path: PathBuf,
}

impl JsonlBackedStore {
    async fn open(path: PathBuf) -> Result<Self> {
        let store = Self {
            inner: in_memory::empty_store(),
            path,
        };
        store.reload().await?;
        Ok(store)
    }
}

#[async_trait]
impl FeatureStore for JsonlBackedStore {
    async fn commit_batch(
        &self,
        features: Vec<Feature>,
        edges: Vec<DependencyEdge>,
    ) -> Result<()> {
        self.inner.commit_batch(features, edges).await
    }

    async fn get(&self, id: FeatureId) -> Result<Option<Feature>> {
        self.inner.get(id).await
    }

    async fn features(&self) -> Result<Vec<Feature>> {
        self.inner.features().await
    }

    async fn apply(&self, id: FeatureId, transition: Transition) -> Result<Applied> {
        self.inner.apply(id, transition).await
    }

    async fn edges(&self) -> Result<Vec<DependencyEdge>> {
        self.inner.edges().await
    }

    async fn save(&self) -> Result<()> {
        // Snapshot under one lock so features and edges agree.
        let snapshot = self.inner.lock().await.clone();
        in_memory::write_state(&snapshot, &self.path).await
    }

    async fn reload(&self) -> Result<()> {
        if self.path.exists() {
            let (state, warnings) = in_memory::read_state(&self.path).await?;
            for warning in &warnings {
                tracing::warn!(warning = ?warning, "JSONL load warning");
            }
            *self.inner.lock().await = state;
        } else {
            // First run: nothing on disk yet
            *self.inner.lock().await = in_memory::StoreState::default();
        }
        Ok(())
    }
}

/// Create a store for the given backend.
///
/// # Errors
///
/// - `Error::Io` if the JSONL file exists but cannot be read
pub async fn create_store(backend: StorageBackend) -> Result<Arc<dyn FeatureStore>> {
    match backend {
        StorageBackend::InMemory => Ok(in_memory::new_in_memory_store()),
        StorageBackend::Jsonl(path) => Ok(Arc::new(JsonlBackedStore::open(path).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewFeature;
    use chrono::Utc;
    use tempfile::TempDir;

    fn feature(id: u64) -> Feature {
        NewFeature::new(id, format!("feature {id}"), 1).into_feature(Utc::now())
    }

    #[tokio::test]
    async fn test_jsonl_save_then_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("features.jsonl");

        let store = create_store(StorageBackend::Jsonl(path.clone()))
            .await
            .unwrap();
        store
            .insert_features(vec![feature(1), feature(2)])
            .await
            .unwrap();
        store
            .upsert_edge(DependencyEdge::explicit(FeatureId(2), FeatureId(1)))
            .await
            .unwrap();
        store.save().await.unwrap();

        let reopened = create_store(StorageBackend::Jsonl(path)).await.unwrap();
        assert_eq!(reopened.features().await.unwrap().len(), 2);
        assert_eq!(
            reopened.edges().await.unwrap(),
            vec![DependencyEdge::explicit(FeatureId(2), FeatureId(1))]
        );
    }

    #[tokio::test]
    async fn test_jsonl_reload_restores_disk_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("features.jsonl");

        let store = create_store(StorageBackend::Jsonl(path)).await.unwrap();
        store.insert_features(vec![feature(1)]).await.unwrap();
        store.save().await.unwrap();

        store
            .apply(
                FeatureId(1),
                Transition::Claim {
                    worker: "w1".into(),
                },
            )
            .await
            .unwrap();
        store.reload().await.unwrap();

        let after = store.get(FeatureId(1)).await.unwrap().unwrap();
        assert_eq!(after.status, FeatureStatus::Pending);
    }

    #[tokio::test]
    async fn test_jsonl_reload_missing_file_resets() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("features.jsonl");

        let store = create_store(StorageBackend::Jsonl(path.clone()))
            .await
            .unwrap();
        store.insert_features(vec![feature(1)]).await.unwrap();
        store.save().await.unwrap();

        std::fs::remove_file(&path).unwrap();
        store.reload().await.unwrap();
        assert!(store.get(FeatureId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_reload_is_noop() {
        let store = create_store(StorageBackend::InMemory).await.unwrap();
        store.insert_features(vec![feature(1)]).await.unwrap();
        store.reload().await.unwrap();
        assert!(store.get(FeatureId(1)).await.unwrap().is_some());
    }

    #[test]
    fn test_data_path() {
        assert!(StorageBackend::InMemory.data_path().is_none());
        let backend = StorageBackend::Jsonl(PathBuf::from("a/b.jsonl"));
        assert_eq!(backend.data_path(), Some(Path::new("a/b.jsonl")));
    }
}
