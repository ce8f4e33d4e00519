//! Claim coordination: the only place feature status changes.
//!
//! Workers call [`ClaimCoordinator::claim_next`] concurrently. The coordinator
//! snapshots the store, picks ready `Pending` features in `(priority, id)` order
//! and tries to claim each one with the store's atomic
//! [`FeatureStore::apply`]. Losing a race for a candidate is not an error: the
//! scan moves on to the next candidate.
//!
//! Every transition whose previous status was `InProgress` is reported to the
//! [`PauseDrainController`], which is how a drain learns that in-flight work
//! has finished.

use crate::domain::{BlockerKind, Feature, FeatureId, FeatureStatus, Transition, WorkerId};
use crate::error::{Error, Result};
use crate::gate::PauseDrainController;
use crate::graph::DependencyGraph;
use crate::storage::FeatureStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Result of trying to claim one candidate.
enum ClaimAttempt {
    Won(Feature),
    /// Another worker moved the feature between the snapshot and the claim.
    ClaimConflict,
}

/// Performs every feature status transition.
pub struct ClaimCoordinator {
    store: Arc<dyn FeatureStore>,
    graph: Arc<RwLock<DependencyGraph>>,
    gate: Arc<PauseDrainController>,
    max_skips: Option<u32>,
}

impl ClaimCoordinator {
    /// Create a coordinator over shared components.
    pub fn new(
        store: Arc<dyn FeatureStore>,
        graph: Arc<RwLock<DependencyGraph>>,
        gate: Arc<PauseDrainController>,
    ) -> Self {
        Self {
            store,
            graph,
            gate,
            max_skips: None,
        }
    }

    /// Park a feature as `Skipped` once it has been skipped `limit` times.
    #[must_use]
    pub fn with_max_skips(mut self, limit: Option<u32>) -> Self {
        self.max_skips = limit;
        self
    }

    /// Claim the most urgent ready feature for `worker`.
    ///
    /// Returns `Ok(None)` without waiting when the gate is not running or no
    /// feature is both `Pending` and ready. Two concurrent callers never receive
    /// the same feature.
    ///
    /// The gate is checked again before each candidate and after the store
    /// accepts the claim. A claim that lands after a pause is handed back, so
    /// a `Some` is only returned for a claim that was in place while the gate
    /// was still running. Such a claim counts toward the drain like any other.
    ///
    /// # Errors
    ///
    /// Returns storage errors only; claim races are resolved internally.
    pub async fn claim_next(&self, worker: &WorkerId) -> Result<Option<Feature>> {
        let Some(permit) = self.gate.try_acquire() else {
            debug!(worker = %worker, state = %self.gate.current_state(), "Claims are gated");
            return Ok(None);
        };

        let features = self.store.features().await?;
        let statuses: HashMap<FeatureId, FeatureStatus> =
            features.iter().map(|f| (f.id, f.status)).collect();

        // Held for the whole scan so no edge can be added under a candidate.
        let graph = self.graph.read().await;

        let mut candidates: Vec<&Feature> = features
            .iter()
            .filter(|f| f.status == FeatureStatus::Pending)
            .filter(|f| match graph.is_ready(f.id, |dep| statuses.get(&dep).copied()) {
                Ok(ready) => ready,
                Err(e) => {
                    warn!(
                        feature = %f.id,
                        error = %e,
                        "Stored feature missing from graph; not claimable"
                    );
                    false
                }
            })
            .collect();
        candidates.sort_by_key(|f| (f.priority, f.id));

        for candidate in candidates {
            if !permit.is_live() {
                debug!(worker = %worker, "Pause arrived mid-scan; not claiming");
                return Ok(None);
            }
            match self.try_claim(candidate.id, worker).await? {
                ClaimAttempt::Won(feature) if !permit.is_live() => {
                    self.hand_back(feature.id, worker).await?;
                    return Ok(None);
                }
                ClaimAttempt::Won(feature) => {
                    permit.commit();
                    info!(feature = %feature.id, worker = %worker, "Feature claimed");
                    return Ok(Some(feature));
                }
                ClaimAttempt::ClaimConflict => {
                    debug!(feature = %candidate.id, worker = %worker, "Lost claim race; trying next");
                }
            }
        }

        debug!(worker = %worker, "No eligible feature");
        Ok(None)
    }

    /// Undo a claim that landed after a pause. The caller's permit still holds
    /// the slot, so the gate is settled when that permit drops.
    async fn hand_back(&self, id: FeatureId, worker: &WorkerId) -> Result<()> {
        match self.store.apply(id, Transition::Release).await {
            Ok(_) => {
                debug!(feature = %id, worker = %worker, "Pause arrived during claim; handed back");
                Ok(())
            }
            // Someone already moved it on by id.
            Err(Error::InvalidTransition { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn try_claim(&self, id: FeatureId, worker: &WorkerId) -> Result<ClaimAttempt> {
        let transition = Transition::Claim {
            worker: worker.clone(),
        };
        match self.store.apply(id, transition).await {
            Ok(applied) => Ok(ClaimAttempt::Won(applied.feature)),
            Err(Error::InvalidTransition { .. }) => Ok(ClaimAttempt::ClaimConflict),
            Err(e) => Err(e),
        }
    }

    /// `InProgress` -> `Passing`.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `InvalidTransition`.
    pub async fn mark_passing(&self, id: FeatureId) -> Result<Feature> {
        let feature = self
            .transition(id, Transition::Pass { with_mocks: false })
            .await?;
        info!(feature = %id, "Feature passing");
        Ok(feature)
    }

    /// `InProgress` -> `Passing`, recording that dependencies were mocked.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `InvalidTransition`.
    pub async fn mark_passing_with_mocks(&self, id: FeatureId) -> Result<Feature> {
        let feature = self
            .transition(id, Transition::Pass { with_mocks: true })
            .await?;
        info!(feature = %id, "Feature passing with mocks");
        Ok(feature)
    }

    /// Send a `Pending` or `InProgress` feature to the back of the queue.
    ///
    /// The new priority is one past the current maximum. With a skip limit
    /// configured, the skip that reaches it parks the feature as `Skipped`.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `InvalidTransition`.
    pub async fn skip(&self, id: FeatureId, reason: impl Into<String>) -> Result<Feature> {
        let reason = reason.into();
        let feature = self
            .transition(
                id,
                Transition::Skip {
                    reason: reason.clone(),
                    park_after: self.max_skips,
                },
            )
            .await?;

        info!(
            feature = %id,
            skip_count = feature.skip_count,
            priority = feature.priority,
            status = %feature.status,
            reason = %reason,
            "Feature skipped"
        );
        Ok(feature)
    }

    /// Mark a `Pending` or `InProgress` feature as blocked, or replace the
    /// blocker of one that already is.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `InvalidTransition`.
    pub async fn block(
        &self,
        id: FeatureId,
        kind: BlockerKind,
        description: impl Into<String>,
    ) -> Result<Feature> {
        let feature = self
            .transition(
                id,
                Transition::Block {
                    kind,
                    description: description.into(),
                },
            )
            .await?;
        info!(feature = %id, blocker = %kind, "Feature blocked");
        Ok(feature)
    }

    /// Return a blocked or parked feature to `Pending`.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `InvalidTransition`.
    pub async fn unblock(&self, id: FeatureId) -> Result<Feature> {
        let feature = self.transition(id, Transition::Unblock).await?;
        info!(feature = %id, "Feature unblocked");
        Ok(feature)
    }

    /// Give up a claim: `InProgress` -> `Pending` without a skip penalty.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `InvalidTransition`.
    pub async fn release(&self, id: FeatureId) -> Result<Feature> {
        let feature = self.transition(id, Transition::Release).await?;
        info!(feature = %id, "Claim released");
        Ok(feature)
    }

    async fn transition(&self, id: FeatureId, transition: Transition) -> Result<Feature> {
        let applied = self.store.apply(id, transition).await?;
        if applied.previous == FeatureStatus::InProgress {
            self.gate.record_completion();
        }
        Ok(applied.feature)
    }
}
