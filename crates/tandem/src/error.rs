//! Error types for tandem operations.
//!
//! The scheduler surfaces three kinds of domain errors to callers:
//!
//! - [`Error::CycleDetected`]: an edge was rejected and the graph is unchanged.
//!   Recoverable; the caller may drop the edge or try a different one.
//! - [`Error::InvalidTransition`]: a status change was requested from a status
//!   that does not allow it. This points at a caller logic bug.
//! - [`Error::UnknownFeature`]: the id is not present.
//!
//! Claim races are resolved inside the coordinator and never appear here.

use crate::domain::{FeatureId, FeatureStatus, TransitionKind};
use std::io;
use thiserror::Error;

/// The error type for tandem operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Adding `from -> to` would close a cycle.
    ///
    /// `path` is the existing chain from `to` back to `from` that the new
    /// edge would complete.
    #[error("Adding dependency {from} -> {to} would create a cycle: {}", format_path(.path))]
    CycleDetected {
        /// Dependent side of the rejected edge
        from: FeatureId,
        /// Prerequisite side of the rejected edge
        to: FeatureId,
        /// Existing path `to -> ... -> from`
        path: Vec<FeatureId>,
    },

    /// A status change is not in the transition table.
    #[error("Cannot {attempted} feature {id}: it is {current}")]
    InvalidTransition {
        /// The feature
        id: FeatureId,
        /// Status at the time of the attempt
        current: FeatureStatus,
        /// What was attempted
        attempted: TransitionKind,
    },

    /// Feature not found.
    #[error("Feature not found: {0}")]
    UnknownFeature(FeatureId),

    /// A batch load named an id that already exists.
    #[error("Feature already exists: {0}")]
    DuplicateFeature(FeatureId),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `.tandem/` directory found walking up from the working directory.
    #[error("Not a tandem repository (or any parent). Run 'tandem init' first.")]
    NotInitialized,

    /// `init` found an existing `.tandem/` directory.
    #[error("Tandem is already initialized in this directory. Found existing '{0}'")]
    AlreadyInitialized(String),

    /// The YAML could not be parsed or written.
    #[error("Invalid configuration: {0}")]
    Yaml(String),

    /// A value is outside its allowed range.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Dotted config key
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Unrecognised storage backend name.
    #[error("Unknown storage backend '{0}'. Valid values: jsonl, memory")]
    UnknownBackend(String),
}

/// Storage-layer problems.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The data file is structurally invalid.
    #[error("Invalid data file format: {0}")]
    InvalidFormat(String),

    /// A record could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// A specialized Result type for tandem operations.
pub type Result<T> = std::result::Result<T, Error>;

fn format_path(path: &[FeatureId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_includes_path() {
        let err = Error::CycleDetected {
            from: FeatureId(12),
            to: FeatureId(10),
            path: vec![FeatureId(10), FeatureId(11), FeatureId(12)],
        };
        assert_eq!(
            err.to_string(),
            "Adding dependency 12 -> 10 would create a cycle: 10 -> 11 -> 12"
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = Error::InvalidTransition {
            id: FeatureId(3),
            current: FeatureStatus::Pending,
            attempted: TransitionKind::Pass,
        };
        assert_eq!(err.to_string(), "Cannot pass feature 3: it is pending");
    }
}
