//! Ingestion of externally detected dependency edges.
//!
//! Edge detection (explicit references, keyword overlap, category rules) happens
//! outside tandem. Detectors hand over [`EdgeCandidate`]s through the
//! [`EdgeCandidateProducer`] trait and [`DependencyEdgeIngestor`] turns them into
//! graph edges:
//!
//! 1. Drop candidates that are invalid (self-edges, confidence outside
//!    `[0.0, 1.0]` or NaN) or below the confidence floor
//! 2. Keep the highest-confidence candidate per ordered pair (first seen wins ties)
//! 3. Submit strongest first, so when two candidates would form a cycle the
//!    weaker one is the one rejected
//!
//! One bad candidate never aborts the batch; every outcome is counted in the
//! [`IngestReport`].

use crate::domain::{DependencyEdge, DetectionMethod, FeatureId};
use crate::error::Error;
use crate::graph::{DependencyGraph, EdgeInsert};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// A suggested dependency from an external detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCandidate {
    /// The dependent feature
    pub feature_id: FeatureId,
    /// The suggested prerequisite
    pub depends_on_id: FeatureId,
    /// Detector confidence, expected in `[0.0, 1.0]`
    pub confidence: f64,
    /// How it was detected
    pub method: DetectionMethod,
    /// Matched keywords, if any
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl EdgeCandidate {
    /// A candidate without keywords
    #[must_use]
    pub fn new(
        feature_id: FeatureId,
        depends_on_id: FeatureId,
        confidence: f64,
        method: DetectionMethod,
    ) -> Self {
        Self {
            feature_id,
            depends_on_id,
            confidence,
            method,
            keywords: Vec::new(),
        }
    }

    fn pair(&self) -> (FeatureId, FeatureId) {
        (self.feature_id, self.depends_on_id)
    }

    fn is_valid(&self) -> bool {
        self.feature_id != self.depends_on_id && (0.0..=1.0).contains(&self.confidence)
    }
}

impl From<EdgeCandidate> for DependencyEdge {
    fn from(c: EdgeCandidate) -> Self {
        DependencyEdge {
            feature_id: c.feature_id,
            depends_on_id: c.depends_on_id,
            confidence: c.confidence,
            method: c.method,
            keywords: c.keywords,
        }
    }
}

/// Source of edge candidates.
pub trait EdgeCandidateProducer {
    /// All candidates this producer has to offer.
    fn candidates(&self) -> Vec<EdgeCandidate>;
}

impl EdgeCandidateProducer for Vec<EdgeCandidate> {
    fn candidates(&self) -> Vec<EdgeCandidate> {
        self.clone()
    }
}

impl EdgeCandidateProducer for [EdgeCandidate] {
    fn candidates(&self) -> Vec<EdgeCandidate> {
        self.to_vec()
    }
}

/// Counts for one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// New edges
    pub inserted: usize,
    /// Existing edges whose confidence went up
    pub upgraded: usize,
    /// Existing edges already at equal or higher confidence
    pub unchanged: usize,
    /// Rejected because they would close a cycle
    pub rejected_cycles: usize,
    /// Naming a feature that does not exist
    pub unknown_features: usize,
    /// Self-edges or confidence outside `[0.0, 1.0]`
    pub invalid: usize,
    /// Below the configured confidence floor
    pub below_threshold: usize,
}

/// Outcome of [`DependencyEdgeIngestor::ingest`]
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// Counts
    pub report: IngestReport,
    /// Edges that were inserted or upgraded and must be persisted
    pub accepted: Vec<DependencyEdge>,
}

/// Dedupes candidates and submits them to a graph.
#[derive(Debug, Clone, Copy)]
pub struct DependencyEdgeIngestor {
    min_confidence: f64,
}

impl Default for DependencyEdgeIngestor {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl DependencyEdgeIngestor {
    /// Ingestor that filters candidates below `min_confidence`.
    #[must_use]
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Validate, dedupe and order candidates without touching a graph.
    ///
    /// Returns the edges to submit, strongest first (ties in pair order).
    pub fn prepare(
        &self,
        candidates: Vec<EdgeCandidate>,
        report: &mut IngestReport,
    ) -> Vec<EdgeCandidate> {
        let mut best: HashMap<(FeatureId, FeatureId), EdgeCandidate> = HashMap::new();

        for candidate in candidates {
            if !candidate.is_valid() {
                debug!(
                    from = %candidate.feature_id,
                    to = %candidate.depends_on_id,
                    confidence = candidate.confidence,
                    "Invalid edge candidate"
                );
                report.invalid += 1;
                continue;
            }
            if candidate.confidence < self.min_confidence {
                report.below_threshold += 1;
                continue;
            }

            match best.get(&candidate.pair()) {
                Some(existing) if existing.confidence >= candidate.confidence => {}
                _ => {
                    best.insert(candidate.pair(), candidate);
                }
            }
        }

        let mut ordered: Vec<EdgeCandidate> = best.into_values().collect();
        ordered.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(a.pair().cmp(&b.pair()))
        });
        ordered
    }

    /// Submit all candidates from `producer` to `graph`.
    ///
    /// The caller persists [`IngestOutcome::accepted`].
    pub fn ingest<P>(&self, graph: &mut DependencyGraph, producer: &P) -> IngestOutcome
    where
        P: EdgeCandidateProducer + ?Sized,
    {
        let mut report = IngestReport::default();
        let mut accepted = Vec::new();

        for candidate in self.prepare(producer.candidates(), &mut report) {
            let edge = DependencyEdge::from(candidate);
            match graph.add_edge(&edge) {
                Ok(EdgeInsert::Inserted) => {
                    report.inserted += 1;
                    accepted.push(edge);
                }
                Ok(EdgeInsert::Upgraded) => {
                    report.upgraded += 1;
                    accepted.push(edge);
                }
                Ok(EdgeInsert::Unchanged) => report.unchanged += 1,
                Err(Error::CycleDetected { from, to, .. }) => {
                    debug!(from = %from, to = %to, "Edge candidate closes a cycle");
                    report.rejected_cycles += 1;
                }
                Err(e) => {
                    warn!(
                        from = %edge.feature_id,
                        to = %edge.depends_on_id,
                        error = %e,
                        "Edge candidate names an unknown feature"
                    );
                    report.unknown_features += 1;
                }
            }
        }

        IngestOutcome { report, accepted }
    }
}
