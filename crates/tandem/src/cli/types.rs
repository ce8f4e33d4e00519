//! CLI value enums and domain type conversions.
//!
//! This module contains the value enums used for CLI argument parsing
//! and their conversions to domain types.

use clap::ValueEnum;

use crate::domain::{BlockerKind, FeatureStatus};

// ============================================================================
// Value Enums
// ============================================================================

/// Feature status for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureStatusArg {
    /// Waiting to be claimed
    Pending,
    /// Claimed by a worker
    #[value(name = "in_progress", alias = "in-progress")]
    InProgress,
    /// Completed
    Passing,
    /// Parked after too many skips
    Skipped,
    /// Waiting on something external
    Blocked,
}

impl std::fmt::Display for FeatureStatusArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", FeatureStatus::from(*self))
    }
}

/// Blocker kind for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockerKindArg {
    /// Missing environment variable or credential
    #[value(name = "env_config", alias = "env-config")]
    EnvConfig,
    /// Third-party service unavailable
    #[value(name = "external_service", alias = "external-service")]
    ExternalService,
    /// Missing technical groundwork
    #[value(name = "tech_prerequisite", alias = "tech-prerequisite")]
    TechPrerequisite,
    /// Requirements need clarification
    #[value(name = "unclear_requirements", alias = "unclear-requirements")]
    UnclearRequirements,
    /// Intentionally postponed
    #[value(name = "legitimate_deferral", alias = "legitimate-deferral")]
    LegitimateDeferral,
}

impl std::fmt::Display for BlockerKindArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", BlockerKind::from(*self))
    }
}

// ============================================================================
// Domain Conversions
// ============================================================================

impl From<FeatureStatusArg> for FeatureStatus {
    fn from(arg: FeatureStatusArg) -> Self {
        match arg {
            FeatureStatusArg::Pending => FeatureStatus::Pending,
            FeatureStatusArg::InProgress => FeatureStatus::InProgress,
            FeatureStatusArg::Passing => FeatureStatus::Passing,
            FeatureStatusArg::Skipped => FeatureStatus::Skipped,
            FeatureStatusArg::Blocked => FeatureStatus::Blocked,
        }
    }
}

impl From<BlockerKindArg> for BlockerKind {
    fn from(arg: BlockerKindArg) -> Self {
        match arg {
            BlockerKindArg::EnvConfig => BlockerKind::EnvConfig,
            BlockerKindArg::ExternalService => BlockerKind::ExternalService,
            BlockerKindArg::TechPrerequisite => BlockerKind::TechPrerequisite,
            BlockerKindArg::UnclearRequirements => BlockerKind::UnclearRequirements,
            BlockerKindArg::LegitimateDeferral => BlockerKind::LegitimateDeferral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_arg_display_matches_domain() {
        for arg in FeatureStatusArg::value_variants() {
            let domain: FeatureStatus = (*arg).into();
            assert_eq!(arg.to_string(), domain.as_str());
        }
    }

    #[test]
    fn test_status_arg_accepts_hyphenated_alias() {
        let parsed = FeatureStatusArg::from_str("in-progress", true).unwrap();
        assert_eq!(parsed, FeatureStatusArg::InProgress);
    }

    #[test]
    fn test_blocker_kind_arg_roundtrips_through_display() {
        for arg in BlockerKindArg::value_variants() {
            let parsed = BlockerKindArg::from_str(&arg.to_string(), false).unwrap();
            assert_eq!(parsed, *arg);
        }
    }
}
