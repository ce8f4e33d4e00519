//! Skip impact analysis.
//!
//! Skipping a feature delays everything that depends on it. Before a skip, the
//! analyzer walks the dependents breadth-first (default depth
//! [`DEFAULT_IMPACT_DEPTH`]) and recommends how to proceed:
//!
//! | Direct dependents | Total dependents | Recommendation        |
//! |-------------------|------------------|-----------------------|
//! | 0                 | any              | `SafeToSkip`          |
//! | 1..=3             | any              | `ImplementWithMocks`  |
//! | >= 5              | any              | `CascadeSkip`         |
//! | 4                 | >= 10            | `CascadeSkip`         |
//! | 4                 | < 10             | `ReviewDependencies`  |
//!
//! Rules are checked top to bottom and the first match wins.

use crate::coordinator::ClaimCoordinator;
use crate::domain::{Feature, FeatureId, FeatureStatus};
use crate::error::Result;
use crate::graph::{DEFAULT_IMPACT_DEPTH, DependencyGraph};
use crate::storage::FeatureStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// What to do about a feature that is about to be skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipRecommendation {
    /// Nothing depends on it
    SafeToSkip,
    /// A few dependents; they can proceed against mocks
    ImplementWithMocks,
    /// Several dependents; decide case by case
    ReviewDependencies,
    /// Many dependents; skip them too
    CascadeSkip,
}

impl SkipRecommendation {
    /// Pick a recommendation from dependent counts.
    #[must_use]
    pub fn from_counts(direct: usize, total: usize) -> Self {
        match direct {
            0 => SkipRecommendation::SafeToSkip,
            1..=3 => SkipRecommendation::ImplementWithMocks,
            _ if direct >= 5 || total >= 10 => SkipRecommendation::CascadeSkip,
            _ => SkipRecommendation::ReviewDependencies,
        }
    }
}

impl fmt::Display for SkipRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipRecommendation::SafeToSkip => "safe_to_skip",
            SkipRecommendation::ImplementWithMocks => "implement_with_mocks",
            SkipRecommendation::ReviewDependencies => "review_dependencies",
            SkipRecommendation::CascadeSkip => "cascade_skip",
        };
        f.write_str(s)
    }
}

/// A dependent reached by the impact walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactedFeature {
    /// The dependent
    pub id: FeatureId,
    /// Its name
    pub name: String,
    /// 1 for direct dependents
    pub depth: usize,
    /// The feature it was reached through
    pub via: FeatureId,
    /// Confidence of the edge it was reached through
    pub confidence: f64,
    /// Status at analysis time
    pub status: FeatureStatus,
}

/// Result of [`SkipImpactAnalyzer::analyze_impact`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// The feature being skipped
    pub feature_id: FeatureId,
    /// Dependents at depth 1
    pub direct_dependents: Vec<ImpactedFeature>,
    /// Dependents at depth 2 and beyond
    pub transitive_dependents: Vec<ImpactedFeature>,
    /// `direct_dependents.len() + transitive_dependents.len()`
    pub total_impact: usize,
    /// Suggested course of action
    pub recommendation: SkipRecommendation,
}

impl ImpactReport {
    /// All dependents, highest edge confidence first.
    ///
    /// Ties are broken by depth, then id.
    #[must_use]
    pub fn riskiest(&self) -> Vec<&ImpactedFeature> {
        let mut all: Vec<&ImpactedFeature> = self
            .direct_dependents
            .iter()
            .chain(&self.transitive_dependents)
            .collect();
        all.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(a.depth.cmp(&b.depth))
                .then(a.id.cmp(&b.id))
        });
        all
    }
}

/// A dependent that [`SkipImpactAnalyzer::cascade_skip`] could not skip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotSkipped {
    /// The dependent
    pub id: FeatureId,
    /// Why the skip was refused
    pub reason: String,
}

/// Result of [`SkipImpactAnalyzer::cascade_skip`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeReport {
    /// The root feature after its skip
    pub root: Feature,
    /// Direct dependents that were skipped
    pub skipped: Vec<FeatureId>,
    /// Direct dependents left alone
    pub not_skipped: Vec<NotSkipped>,
}

/// Read-only analysis of what a skip would delay.
pub struct SkipImpactAnalyzer {
    store: Arc<dyn FeatureStore>,
    graph: Arc<RwLock<DependencyGraph>>,
}

impl SkipImpactAnalyzer {
    /// Create an analyzer over shared components.
    pub fn new(store: Arc<dyn FeatureStore>, graph: Arc<RwLock<DependencyGraph>>) -> Self {
        Self { store, graph }
    }

    /// Walk the dependents of `id` up to `max_depth` levels.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` if `id` is not in the graph.
    pub async fn analyze_impact(&self, id: FeatureId, max_depth: usize) -> Result<ImpactReport> {
        let reached = self.graph.read().await.transitive_dependents(id, max_depth)?;

        let features: HashMap<FeatureId, Feature> = self
            .store
            .features()
            .await?
            .into_iter()
            .map(|f| (f.id, f))
            .collect();

        let (direct_dependents, transitive_dependents): (Vec<_>, Vec<_>) = reached
            .into_iter()
            .map(|r| {
                let (name, status) = features
                    .get(&r.id)
                    .map_or((String::new(), FeatureStatus::Pending), |f| {
                        (f.name.clone(), f.status)
                    });
                ImpactedFeature {
                    id: r.id,
                    name,
                    depth: r.depth,
                    via: r.via,
                    confidence: r.confidence,
                    status,
                }
            })
            .partition(|f| f.depth == 1);

        let total_impact = direct_dependents.len() + transitive_dependents.len();
        let recommendation = SkipRecommendation::from_counts(direct_dependents.len(), total_impact);

        Ok(ImpactReport {
            feature_id: id,
            direct_dependents,
            transitive_dependents,
            total_impact,
            recommendation,
        })
    }

    /// [`analyze_impact`](Self::analyze_impact) with the default depth.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` if `id` is not in the graph.
    pub async fn analyze_default(&self, id: FeatureId) -> Result<ImpactReport> {
        self.analyze_impact(id, DEFAULT_IMPACT_DEPTH).await
    }

    /// Skip `id` and then each of its direct dependents.
    ///
    /// Only one level is cascaded. A dependent whose status does not allow a
    /// skip (e.g. already passing or blocked) is reported in
    /// [`CascadeReport::not_skipped`] and does not stop the cascade.
    ///
    /// # Errors
    ///
    /// Fails only if the root skip fails, in which case nothing is skipped.
    pub async fn cascade_skip(
        &self,
        coordinator: &ClaimCoordinator,
        id: FeatureId,
        reason: &str,
    ) -> Result<CascadeReport> {
        let dependents = self.graph.read().await.dependents_of(id)?;
        let root = coordinator.skip(id, reason).await?;

        let dependent_reason = format!("dependency {id} skipped: {reason}");
        let mut skipped = Vec::new();
        let mut not_skipped = Vec::new();

        for dependent in dependents {
            match coordinator.skip(dependent, dependent_reason.as_str()).await {
                Ok(_) => skipped.push(dependent),
                Err(e) => {
                    warn!(feature = %dependent, root = %id, error = %e, "Cascade skip refused");
                    not_skipped.push(NotSkipped {
                        id: dependent,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            feature = %id,
            skipped = skipped.len(),
            refused = not_skipped.len(),
            "Cascade skip complete"
        );
        Ok(CascadeReport {
            root,
            skipped,
            not_skipped,
        })
    }
}
