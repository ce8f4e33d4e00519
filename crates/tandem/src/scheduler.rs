//! The scheduler facade.
//!
//! [`Scheduler`] wires one store, one dependency graph and one pause/drain gate
//! into the claim coordinator, the impact analyzer and the edge ingestor, and
//! exposes the operations workers and operators call.
//!
//! ```no_run
//! use tandem::domain::{NewFeature, WorkerId};
//! use tandem::scheduler::{Scheduler, SchedulerSettings};
//! use tandem::storage::in_memory::new_in_memory_store;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> tandem::Result<()> {
//!     let scheduler = Scheduler::open(new_in_memory_store(), SchedulerSettings::default()).await?;
//!     scheduler
//!         .load_features(vec![
//!             NewFeature::new(1u64, "Login form", 1),
//!             NewFeature::new(2u64, "Session refresh", 1).depends_on([1]),
//!         ])
//!         .await?;
//!
//!     let worker = WorkerId::new("worker-1");
//!     if let Some(feature) = scheduler.claim_next(&worker).await? {
//!         scheduler.mark_passing(feature.id).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Lock Order
//!
//! The graph lock is always taken before the store's internal lock. Edge writes
//! hold the graph write lock until the store has accepted the edge, so the graph
//! and the store never disagree about the edge set.

use crate::coordinator::ClaimCoordinator;
use crate::domain::{
    BlockerKind, DependencyEdge, Feature, FeatureId, FeatureStatus, GraphExport, NewFeature,
    Progress, WorkerId,
};
use crate::error::{Error, Result};
use crate::gate::{GateStatus, PauseDrainController, RunState};
use crate::graph::{DEFAULT_IMPACT_DEPTH, DependencyGraph, EdgeInsert};
use crate::impact::{CascadeReport, ImpactReport, SkipImpactAnalyzer};
use crate::ingest::{DependencyEdgeIngestor, EdgeCandidateProducer, IngestReport};
use crate::storage::FeatureStore;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tracing::{info, warn};

/// Tunables for a [`Scheduler`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    /// Depth of the impact walk before a skip
    pub impact_max_depth: usize,
    /// Park a feature as `Skipped` after this many skips
    pub max_skips: Option<u32>,
    /// Ingested edge candidates below this confidence are dropped
    pub min_confidence: f64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            impact_max_depth: DEFAULT_IMPACT_DEPTH,
            max_skips: None,
            min_confidence: 0.0,
        }
    }
}

/// Dependency-aware concurrent feature scheduler.
pub struct Scheduler {
    store: Arc<dyn FeatureStore>,
    graph: Arc<RwLock<DependencyGraph>>,
    gate: Arc<PauseDrainController>,
    coordinator: ClaimCoordinator,
    analyzer: SkipImpactAnalyzer,
    settings: SchedulerSettings,
}

impl Scheduler {
    /// Open a scheduler over an existing store.
    ///
    /// Rebuilds the graph from the stored edges and seeds the gate's in-flight
    /// count with the features already in progress. Stored edges that name a
    /// missing feature or close a cycle are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns storage errors from reading the snapshot.
    pub async fn open(store: Arc<dyn FeatureStore>, settings: SchedulerSettings) -> Result<Self> {
        let features = store.features().await?;
        let mut graph = DependencyGraph::new();
        for feature in &features {
            graph.add_feature(feature.id);
        }

        for edge in store.edges().await? {
            if let Err(e) = graph.add_edge(&edge) {
                warn!(
                    from = %edge.feature_id,
                    to = %edge.depends_on_id,
                    error = %e,
                    "Skipping stored edge"
                );
            }
        }

        let in_flight = features
            .iter()
            .filter(|f| f.status == FeatureStatus::InProgress)
            .count();
        info!(
            features = features.len(),
            edges = graph.edge_count(),
            in_flight,
            "Scheduler opened"
        );

        let graph = Arc::new(RwLock::new(graph));
        let gate = Arc::new(PauseDrainController::with_in_flight(in_flight));
        let coordinator = ClaimCoordinator::new(store.clone(), graph.clone(), gate.clone())
            .with_max_skips(settings.max_skips);
        let analyzer = SkipImpactAnalyzer::new(store.clone(), graph.clone());

        Ok(Self {
            store,
            graph,
            gate,
            coordinator,
            analyzer,
            settings,
        })
    }

    /// The settings this scheduler was opened with
    #[must_use]
    pub fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    // ========== Loading ==========

    /// Batch-load new features with their explicit dependencies.
    ///
    /// All or nothing: if any id is taken, any dependency names an unknown
    /// feature or the dependencies form a cycle, nothing is loaded.
    ///
    /// # Errors
    ///
    /// `DuplicateFeature`, `UnknownFeature` or `CycleDetected`.
    pub async fn load_features(&self, batch: Vec<NewFeature>) -> Result<Vec<Feature>> {
        let mut graph = self.graph.write().await;

        // Validate against a scratch copy so a failure leaves the graph alone.
        let mut trial = graph.clone();
        for new in &batch {
            if !trial.add_feature(new.id) {
                return Err(Error::DuplicateFeature(new.id));
            }
        }
        let mut edges = Vec::new();
        for new in &batch {
            for &dep in &new.depends_on {
                let edge = DependencyEdge::explicit(new.id, dep);
                if trial.add_edge(&edge)? == EdgeInsert::Inserted {
                    edges.push(edge);
                }
            }
        }

        let now = Utc::now();
        let features: Vec<Feature> = batch.into_iter().map(|n| n.into_feature(now)).collect();
        // One atomic store write, then the graph: they change together or not at all.
        self.store.commit_batch(features.clone(), edges).await?;
        *graph = trial;

        info!(count = features.len(), "Features loaded");
        Ok(features)
    }

    // ========== Claims and Transitions ==========

    /// Claim the most urgent ready feature, or `None` right away.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub async fn claim_next(&self, worker: &WorkerId) -> Result<Option<Feature>> {
        self.coordinator.claim_next(worker).await
    }

    /// Mark an in-progress feature as passing.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `InvalidTransition`.
    pub async fn mark_passing(&self, id: FeatureId) -> Result<Feature> {
        self.coordinator.mark_passing(id).await
    }

    /// Mark an in-progress feature as passing against mocked dependencies.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `InvalidTransition`.
    pub async fn mark_passing_with_mocks(&self, id: FeatureId) -> Result<Feature> {
        self.coordinator.mark_passing_with_mocks(id).await
    }

    /// Skip a feature and report what the skip delays.
    ///
    /// The impact is computed before the skip is applied.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `InvalidTransition`; nothing is changed on error.
    pub async fn skip(&self, id: FeatureId, reason: impl Into<String>) -> Result<ImpactReport> {
        let report = self
            .analyzer
            .analyze_impact(id, self.settings.impact_max_depth)
            .await?;
        self.coordinator.skip(id, reason).await?;
        Ok(report)
    }

    /// Skip a feature and its direct dependents.
    ///
    /// # Errors
    ///
    /// Fails only if the feature itself cannot be skipped.
    pub async fn cascade_skip(&self, id: FeatureId, reason: &str) -> Result<CascadeReport> {
        self.analyzer
            .cascade_skip(&self.coordinator, id, reason)
            .await
    }

    /// Block a feature on something outside the scheduler.
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
        self.coordinator.block(id, kind, description).await
    }

    /// Return a blocked or parked feature to the queue.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `InvalidTransition`.
    pub async fn unblock(&self, id: FeatureId) -> Result<Feature> {
        self.coordinator.unblock(id).await
    }

    /// Give up a claim without a skip penalty.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `InvalidTransition`.
    pub async fn release(&self, id: FeatureId) -> Result<Feature> {
        self.coordinator.release(id).await
    }

    // ========== Dependencies ==========

    /// Add an explicit, full-confidence dependency `from -> to`.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `CycleDetected`; the graph is unchanged on error.
    pub async fn add_dependency(&self, from: FeatureId, to: FeatureId) -> Result<EdgeInsert> {
        self.add_edge(DependencyEdge::explicit(from, to)).await
    }

    /// Add a dependency edge with full metadata.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` or `CycleDetected`; the graph is unchanged on error.
    pub async fn add_edge(&self, edge: DependencyEdge) -> Result<EdgeInsert> {
        let mut graph = self.graph.write().await;

        // Dry run first so the store never sees an edge the graph would refuse.
        let mut trial = graph.clone();
        let outcome = trial.add_edge(&edge)?;
        if outcome != EdgeInsert::Unchanged {
            self.store.upsert_edge(edge.clone()).await?;
            *graph = trial;
        }

        info!(
            from = %edge.feature_id,
            to = %edge.depends_on_id,
            outcome = ?outcome,
            "Dependency added"
        );
        Ok(outcome)
    }

    /// Ingest edge candidates from an external detector.
    ///
    /// # Errors
    ///
    /// Storage errors from persisting accepted edges; the graph and the store
    /// are then both left as they were. Individual bad candidates are counted in
    /// the report, never returned.
    pub async fn ingest<P>(&self, producer: &P) -> Result<IngestReport>
    where
        P: EdgeCandidateProducer + ?Sized,
    {
        let ingestor = DependencyEdgeIngestor::new(self.settings.min_confidence);
        let mut graph = self.graph.write().await;

        let mut trial = graph.clone();
        let outcome = ingestor.ingest(&mut trial, producer);
        if !outcome.accepted.is_empty() {
            self.store.commit_batch(Vec::new(), outcome.accepted).await?;
        }
        *graph = trial;

        info!(report = ?outcome.report, "Edge candidates ingested");
        Ok(outcome.report)
    }

    // ========== Analysis ==========

    /// Impact of skipping `id`, walking `max_depth` levels of dependents.
    ///
    /// # Errors
    ///
    /// `UnknownFeature`.
    pub async fn analyze_impact(&self, id: FeatureId, max_depth: usize) -> Result<ImpactReport> {
        self.analyzer.analyze_impact(id, max_depth).await
    }

    /// Direct prerequisites of a feature.
    ///
    /// # Errors
    ///
    /// `UnknownFeature`.
    pub async fn dependencies_of(&self, id: FeatureId) -> Result<Vec<FeatureId>> {
        self.graph.read().await.dependencies_of(id)
    }

    /// Direct dependents of a feature.
    ///
    /// # Errors
    ///
    /// `UnknownFeature`.
    pub async fn dependents_of(&self, id: FeatureId) -> Result<Vec<FeatureId>> {
        self.graph.read().await.dependents_of(id)
    }

    // ========== Pause / Drain ==========

    /// Stop new claims; in-flight work continues. Returns the resulting state.
    pub fn pause(&self) -> RunState {
        self.gate.pause()
    }

    /// Accept new claims again.
    pub fn resume(&self) {
        self.gate.resume();
    }

    /// Current gate state
    #[must_use]
    pub fn current_state(&self) -> RunState {
        self.gate.current_state()
    }

    /// Gate state and in-flight count
    #[must_use]
    pub fn gate_status(&self) -> GateStatus {
        self.gate.status()
    }

    /// Observe gate state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GateStatus> {
        self.gate.subscribe()
    }

    /// Wait until a drain has finished.
    pub async fn wait_until_paused(&self) {
        self.gate.wait_until_paused().await;
    }

    // ========== Queries ==========

    /// All features, ordered by id.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn features(&self) -> Result<Vec<Feature>> {
        self.store.features().await
    }

    /// One feature.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` if it doesn't exist.
    pub async fn feature(&self, id: FeatureId) -> Result<Feature> {
        self.store.get(id).await?.ok_or(Error::UnknownFeature(id))
    }

    /// Counts per status.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn progress(&self) -> Result<Progress> {
        Ok(Progress::tally(&self.store.features().await?))
    }

    /// Read-only export of every feature and edge.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn get_graph(&self) -> Result<GraphExport> {
        let graph = self.graph.read().await;
        let nodes = self
            .store
            .features()
            .await?
            .iter()
            .map(Feature::summary)
            .collect();
        Ok(GraphExport {
            nodes,
            edges: graph.edges(),
        })
    }

    /// Persist the store.
    ///
    /// # Errors
    ///
    /// I/O errors from the backend.
    pub async fn save(&self) -> Result<()> {
        self.store.save().await
    }
}
