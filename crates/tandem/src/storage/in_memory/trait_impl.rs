//! `FeatureStore` trait implementation for in-memory storage.

use super::InMemoryStore;
use crate::domain::{DependencyEdge, Feature, FeatureId, Transition};
use crate::error::{Error, Result};
use crate::storage::{Applied, FeatureStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;

#[async_trait]
impl FeatureStore for InMemoryStore {
    async fn commit_batch(
        &self,
        features: Vec<Feature>,
        edges: Vec<DependencyEdge>,
    ) -> Result<()> {
        let mut inner = self.lock().await;

        // === Phase 1: All validations (no mutations) ===
        let mut seen = HashSet::with_capacity(features.len());
        for feature in &features {
            if inner.features.contains_key(&feature.id) || !seen.insert(feature.id) {
                return Err(Error::DuplicateFeature(feature.id));
            }
        }
        for edge in &edges {
            for endpoint in [edge.feature_id, edge.depends_on_id] {
                if !inner.features.contains_key(&endpoint) && !seen.contains(&endpoint) {
                    return Err(Error::UnknownFeature(endpoint));
                }
            }
        }

        // === Phase 2: Insert ===
        for feature in features {
            inner.features.insert(feature.id, feature);
        }
        for edge in edges {
            inner.edges.insert(edge.pair(), edge);
        }
        Ok(())
    }

    async fn get(&self, id: FeatureId) -> Result<Option<Feature>> {
        let inner = self.lock().await;
        Ok(inner.features.get(&id).cloned())
    }

    async fn features(&self) -> Result<Vec<Feature>> {
        let inner = self.lock().await;
        Ok(inner.features.values().cloned().collect())
    }

    async fn apply(&self, id: FeatureId, transition: Transition) -> Result<Applied> {
        let mut inner = self.lock().await;

        // Only a skip moves the priority, so only a skip pays for the scan.
        let back_of_queue = if matches!(transition, Transition::Skip { .. }) {
            inner.back_of_queue()
        } else {
            0
        };

        let feature = inner
            .features
            .get_mut(&id)
            .ok_or(Error::UnknownFeature(id))?;
        let previous = feature.apply(transition, back_of_queue, Utc::now())?;

        Ok(Applied {
            previous,
            feature: feature.clone(),
        })
    }

    async fn edges(&self) -> Result<Vec<DependencyEdge>> {
        let inner = self.lock().await;
        Ok(inner.edges.values().cloned().collect())
    }

    async fn save(&self) -> Result<()> {
        // No-op: use save_to_jsonl() for file persistence
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        // Nothing to reload from
        Ok(())
    }
}
