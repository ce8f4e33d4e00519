//! Core in-memory storage data structures.

use crate::domain::{DependencyEdge, Feature, FeatureId};
use std::collections::BTreeMap;

/// Inner storage structure (not thread-safe).
///
/// Wrapped in `Arc<Mutex<>>` by [`super::InMemoryStore`]. Edges reference
/// features by id; every edge endpoint must be a key of `features`.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
    /// Features indexed by ID
    pub(crate) features: BTreeMap<FeatureId, Feature>,

    /// Edges indexed by `(dependent, prerequisite)`
    pub(crate) edges: BTreeMap<(FeatureId, FeatureId), DependencyEdge>,
}

impl StoreState {
    /// Priority that puts a feature behind every other one.
    ///
    /// `max(priority) + 1`, saturating at `u32::MAX`; zero for an empty store.
    pub(crate) fn back_of_queue(&self) -> u32 {
        self.features
            .values()
            .map(|f| f.priority)
            .max()
            .map_or(0, |max| max.saturating_add(1))
    }
}
