//! Domain types for feature scheduling.
//!
//! This module contains the core domain types: features (units of work), the
//! dependency edges between them, and the closed set of status [`Transition`]s
//! that the claim coordinator is allowed to perform.
//!
//! # Transition Table
//!
//! | Transition | Allowed from            | Result                              |
//! |------------|-------------------------|-------------------------------------|
//! | `Claim`    | `Pending`               | `InProgress`                        |
//! | `Pass`     | `InProgress`            | `Passing`                           |
//! | `Skip`     | `Pending`, `InProgress` | `Pending` (or `Skipped` once parked) |
//! | `Block`    | `Pending`, `InProgress` | `Blocked`                           |
//! | `Unblock`  | `Blocked`, `Skipped`    | `Pending`                           |
//! | `Release`  | `InProgress`            | `Pending`                           |
//!
//! Anything not in the table is rejected with [`Error::InvalidTransition`].
//! `Passing` never appears in an "allowed from" column, so it is terminal.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a feature.
///
/// Identifiers are numeric so that the claim order (priority, then id) is total
/// and reproducible.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FeatureId(pub u64);

impl FeatureId {
    /// Create a new feature ID
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw numeric value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FeatureId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for FeatureId {
    type Err = std::num::ParseIntError;

    /// Accepts `42` as well as `#42`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        digits.parse().map(Self)
    }
}

/// Identifier of a worker that claims features.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    /// Create a new worker ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle status of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    /// Waiting to be claimed
    Pending,

    /// Claimed by exactly one worker
    InProgress,

    /// Completed; terminal for scheduling
    Passing,

    /// Parked after too many skips; ineligible until unblocked
    Skipped,

    /// Waiting on something outside the scheduler
    Blocked,
}

impl FeatureStatus {
    /// All statuses, in display order
    pub const ALL: [FeatureStatus; 5] = [
        FeatureStatus::Pending,
        FeatureStatus::InProgress,
        FeatureStatus::Passing,
        FeatureStatus::Skipped,
        FeatureStatus::Blocked,
    ];

    /// Returns `true` for statuses no transition can leave.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == FeatureStatus::Passing
    }

    /// Snake-case name used in JSONL records and CLI output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureStatus::Pending => "pending",
            FeatureStatus::InProgress => "in_progress",
            FeatureStatus::Passing => "passing",
            FeatureStatus::Skipped => "skipped",
            FeatureStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(FeatureStatus::Pending),
            "in_progress" | "in-progress" => Ok(FeatureStatus::InProgress),
            "passing" => Ok(FeatureStatus::Passing),
            "skipped" => Ok(FeatureStatus::Skipped),
            "blocked" => Ok(FeatureStatus::Blocked),
            other => Err(format!(
                "invalid status '{other}'. Valid values: pending, in_progress, passing, skipped, blocked"
            )),
        }
    }
}

/// Why a feature is blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerKind {
    /// Missing environment variable, credential or local setup
    EnvConfig,

    /// A third-party service is unavailable
    ExternalService,

    /// Needs technical groundwork that is not modelled as a feature
    TechPrerequisite,

    /// Requirements must be clarified by a human
    UnclearRequirements,

    /// Intentionally postponed
    LegitimateDeferral,
}

impl fmt::Display for BlockerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockerKind::EnvConfig => "env_config",
            BlockerKind::ExternalService => "external_service",
            BlockerKind::TechPrerequisite => "tech_prerequisite",
            BlockerKind::UnclearRequirements => "unclear_requirements",
            BlockerKind::LegitimateDeferral => "legitimate_deferral",
        };
        f.write_str(s)
    }
}

/// How a dependency edge was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// The feature text names the other feature directly
    ExplicitReference,

    /// Shared keywords suggest an ordering
    Keyword,

    /// Inferred from feature categories
    Category,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DetectionMethod::ExplicitReference => "explicit_reference",
            DetectionMethod::Keyword => "keyword",
            DetectionMethod::Category => "category",
        };
        f.write_str(s)
    }
}

/// A unit of schedulable work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Unique, stable identifier
    pub id: FeatureId,

    /// Short name
    pub name: String,

    /// Free-form grouping (e.g. "auth", "ui")
    #[serde(default)]
    pub category: String,

    /// Longer description
    #[serde(default)]
    pub description: String,

    /// Lower values are claimed first
    pub priority: u32,

    /// Current status
    pub status: FeatureStatus,

    /// Set on the first skip and never cleared
    #[serde(default)]
    pub was_skipped: bool,

    /// Number of times this feature has been skipped
    #[serde(default)]
    pub skip_count: u32,

    /// Reason given for the most recent skip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// Kind of the current blocker, if blocked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocker_kind: Option<BlockerKind>,

    /// Human-readable description of the current blocker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocker_description: Option<String>,

    /// Passed against mocked dependencies rather than real ones
    #[serde(default)]
    pub passing_with_mocks: bool,

    /// Worker holding the claim while in progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<WorkerId>,

    /// When the current claim was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Feature {
    /// Returns a compact view for graph exports.
    #[must_use]
    pub fn summary(&self) -> FeatureSummary {
        FeatureSummary {
            id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            priority: self.priority,
            status: self.status,
            was_skipped: self.was_skipped,
            skip_count: self.skip_count,
            blocker_kind: self.blocker_kind,
            passing_with_mocks: self.passing_with_mocks,
        }
    }

    /// Apply a transition in place, returning the status held before it.
    ///
    /// `back_of_queue` is the priority a skipped feature receives; store backends
    /// compute it as `max(priority) + 1` inside the same critical section that
    /// calls this method.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidTransition` if the transition table does not allow
    /// `transition` from the current status. The feature is left unchanged.
    pub fn apply(
        &mut self,
        transition: Transition,
        back_of_queue: u32,
        now: DateTime<Utc>,
    ) -> Result<FeatureStatus> {
        let previous = self.status;
        let kind = transition.kind();
        if !kind.permits(previous) {
            return Err(Error::InvalidTransition {
                id: self.id,
                current: previous,
                attempted: kind,
            });
        }

        match transition {
            Transition::Claim { worker } => {
                self.status = FeatureStatus::InProgress;
                self.claimed_by = Some(worker);
                self.claimed_at = Some(now);
            }
            Transition::Pass { with_mocks } => {
                self.status = FeatureStatus::Passing;
                self.passing_with_mocks = with_mocks;
                self.clear_claim();
            }
            Transition::Skip { reason, park_after } => {
                self.skip_count = self.skip_count.saturating_add(1);
                self.was_skipped = true;
                self.skip_reason = Some(reason);
                self.priority = back_of_queue;
                self.status = match park_after {
                    Some(limit) if self.skip_count >= limit => FeatureStatus::Skipped,
                    _ => FeatureStatus::Pending,
                };
                self.clear_claim();
            }
            Transition::Block { kind, description } => {
                self.status = FeatureStatus::Blocked;
                self.blocker_kind = Some(kind);
                self.blocker_description = Some(description);
                self.clear_claim();
            }
            Transition::Unblock => {
                self.status = FeatureStatus::Pending;
                self.blocker_kind = None;
                self.blocker_description = None;
            }
            Transition::Release => {
                self.status = FeatureStatus::Pending;
                self.clear_claim();
            }
        }

        self.updated_at = now;
        Ok(previous)
    }

    fn clear_claim(&mut self) {
        self.claimed_by = None;
        self.claimed_at = None;
    }
}

/// Data for batch-loading a feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeature {
    /// Unique identifier
    pub id: FeatureId,

    /// Short name
    pub name: String,

    /// Grouping
    #[serde(default)]
    pub category: String,

    /// Longer description
    #[serde(default)]
    pub description: String,

    /// Lower values are claimed first
    pub priority: u32,

    /// Explicitly referenced prerequisites
    #[serde(default)]
    pub depends_on: Vec<FeatureId>,
}

impl NewFeature {
    /// Create a feature with no description and no dependencies
    pub fn new(id: impl Into<FeatureId>, name: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: String::new(),
            description: String::new(),
            priority,
            depends_on: Vec::new(),
        }
    }

    /// Add explicit prerequisites
    #[must_use]
    pub fn depends_on(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.depends_on.extend(ids.into_iter().map(FeatureId));
        self
    }

    /// Build the stored feature in its initial `Pending` state.
    #[must_use]
    pub fn into_feature(self, now: DateTime<Utc>) -> Feature {
        Feature {
            id: self.id,
            name: self.name,
            category: self.category,
            description: self.description,
            priority: self.priority,
            status: FeatureStatus::Pending,
            was_skipped: false,
            skip_count: 0,
            skip_reason: None,
            blocker_kind: None,
            blocker_description: None,
            passing_with_mocks: false,
            claimed_by: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Read-only feature view used in graph exports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSummary {
    /// Feature ID
    pub id: FeatureId,
    /// Short name
    pub name: String,
    /// Grouping
    pub category: String,
    /// Priority
    pub priority: u32,
    /// Current status
    pub status: FeatureStatus,
    /// Ever skipped
    pub was_skipped: bool,
    /// Times skipped
    pub skip_count: u32,
    /// Current blocker kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocker_kind: Option<BlockerKind>,
    /// Passed against mocks
    pub passing_with_mocks: bool,
}

/// Directed dependency: `feature_id` cannot start until `depends_on_id` passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// The dependent feature
    pub feature_id: FeatureId,

    /// The prerequisite feature
    pub depends_on_id: FeatureId,

    /// Detection confidence in `[0.0, 1.0]`
    pub confidence: f64,

    /// How the edge was found
    pub method: DetectionMethod,

    /// Keywords that matched, for keyword detection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl DependencyEdge {
    /// An explicit, full-confidence edge
    #[must_use]
    pub fn explicit(feature_id: FeatureId, depends_on_id: FeatureId) -> Self {
        Self {
            feature_id,
            depends_on_id,
            confidence: 1.0,
            method: DetectionMethod::ExplicitReference,
            keywords: Vec::new(),
        }
    }

    /// The ordered `(dependent, prerequisite)` pair
    #[must_use]
    pub fn pair(&self) -> (FeatureId, FeatureId) {
        (self.feature_id, self.depends_on_id)
    }
}

/// Read-only export of the whole graph for visualization collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    /// All features, ordered by id
    pub nodes: Vec<FeatureSummary>,
    /// All edges, ordered by `(feature_id, depends_on_id)`
    pub edges: Vec<DependencyEdge>,
}

/// Feature counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Total features
    pub total: usize,
    /// Pending features
    pub pending: usize,
    /// In-progress features
    pub in_progress: usize,
    /// Passing features
    pub passing: usize,
    /// Parked features
    pub skipped: usize,
    /// Blocked features
    pub blocked: usize,
}

impl Progress {
    /// Count statuses across a set of features
    pub fn tally<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Self {
        features.into_iter().fold(Self::default(), |mut p, f| {
            p.total += 1;
            match f.status {
                FeatureStatus::Pending => p.pending += 1,
                FeatureStatus::InProgress => p.in_progress += 1,
                FeatureStatus::Passing => p.passing += 1,
                FeatureStatus::Skipped => p.skipped += 1,
                FeatureStatus::Blocked => p.blocked += 1,
            }
            p
        })
    }
}

/// A requested status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Take ownership of a pending feature
    Claim {
        /// Claiming worker
        worker: WorkerId,
    },

    /// Complete an in-progress feature
    Pass {
        /// Completed against mocked dependencies
        with_mocks: bool,
    },

    /// Send the feature to the back of the queue
    Skip {
        /// Why it was skipped
        reason: String,
        /// Park as `Skipped` once `skip_count` reaches this value
        park_after: Option<u32>,
    },

    /// Mark as waiting on an external blocker
    Block {
        /// Blocker category
        kind: BlockerKind,
        /// Details for whoever resolves it
        description: String,
    },

    /// Return a blocked or parked feature to the queue
    Unblock,

    /// Give up a claim without a skip penalty
    Release,
}

impl Transition {
    /// The data-free kind of this transition
    #[must_use]
    pub fn kind(&self) -> TransitionKind {
        match self {
            Transition::Claim { .. } => TransitionKind::Claim,
            Transition::Pass { .. } => TransitionKind::Pass,
            Transition::Skip { .. } => TransitionKind::Skip,
            Transition::Block { .. } => TransitionKind::Block,
            Transition::Unblock => TransitionKind::Unblock,
            Transition::Release => TransitionKind::Release,
        }
    }
}

/// Transition name, used for the transition table and error context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Pending -> `InProgress`
    Claim,
    /// `InProgress` -> Passing
    Pass,
    /// Pending/InProgress -> Pending
    Skip,
    /// Pending/InProgress/Blocked -> Blocked
    Block,
    /// Blocked/Skipped -> Pending
    Unblock,
    /// `InProgress` -> Pending
    Release,
}

impl TransitionKind {
    /// Statuses this transition may start from
    #[must_use]
    pub fn allowed_from(self) -> &'static [FeatureStatus] {
        use FeatureStatus::{Blocked, InProgress, Pending, Skipped};
        match self {
            TransitionKind::Claim => &[Pending],
            TransitionKind::Pass | TransitionKind::Release => &[InProgress],
            TransitionKind::Skip => &[Pending, InProgress],
            // Re-blocking replaces the blocker details.
            TransitionKind::Block => &[Pending, InProgress, Blocked],
            TransitionKind::Unblock => &[Blocked, Skipped],
        }
    }

    /// Whether the table allows this transition from `status`
    #[must_use]
    pub fn permits(self, status: FeatureStatus) -> bool {
        self.allowed_from().contains(&status)
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransitionKind::Claim => "claim",
            TransitionKind::Pass => "pass",
            TransitionKind::Skip => "skip",
            TransitionKind::Block => "block",
            TransitionKind::Unblock => "unblock",
            TransitionKind::Release => "release",
        };
        f.write_str(s)
    }
}
