//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation.

use clap::Parser;
use std::path::PathBuf;

use super::types::{BlockerKindArg, FeatureStatusArg};
use super::validators::{validate_depth, validate_feature_id, validate_reason, validate_worker};
use crate::domain::FeatureId;

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `load` command
#[derive(Parser, Debug, Clone)]
pub struct LoadArgs {
    /// JSON file holding an array of features
    ///
    /// Each element has `id`, `name`, `priority` and optionally `category`,
    /// `description` and `depends_on`.
    pub file: PathBuf,
}

/// Arguments for the `list` command
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Filter by status
    #[arg(short, long, value_enum)]
    pub status: Option<FeatureStatusArg>,
}

/// Arguments for the `show` command
#[derive(Parser, Debug, Clone)]
pub struct ShowArgs {
    /// Feature ID
    #[arg(value_parser = validate_feature_id)]
    pub id: FeatureId,
}

/// Arguments for the `dep` command
#[derive(Parser, Debug, Clone)]
pub struct DepArgs {
    /// The dependent feature
    #[arg(value_parser = validate_feature_id)]
    pub from: FeatureId,

    /// The prerequisite it waits for
    #[arg(value_parser = validate_feature_id)]
    pub to: FeatureId,
}

/// Arguments for the `ingest` command
#[derive(Parser, Debug, Clone)]
pub struct IngestArgs {
    /// JSONL file with one edge candidate per line
    pub file: PathBuf,
}

/// Arguments for the `claim` command
#[derive(Parser, Debug, Clone)]
pub struct ClaimArgs {
    /// Worker claiming the feature
    #[arg(value_parser = validate_worker)]
    pub worker: String,
}

/// Arguments for the `pass` command
#[derive(Parser, Debug, Clone)]
pub struct PassArgs {
    /// Feature ID
    #[arg(value_parser = validate_feature_id)]
    pub id: FeatureId,

    /// Passing only because external services were mocked
    #[arg(long)]
    pub mocks: bool,
}

/// Arguments for the `skip` and `cascade-skip` commands
#[derive(Parser, Debug, Clone)]
pub struct SkipArgs {
    /// Feature ID
    #[arg(value_parser = validate_feature_id)]
    pub id: FeatureId,

    /// Why the feature is being skipped
    #[arg(short, long, value_parser = validate_reason)]
    pub reason: String,
}

/// Arguments for the `block` command
#[derive(Parser, Debug, Clone)]
pub struct BlockArgs {
    /// Feature ID
    #[arg(value_parser = validate_feature_id)]
    pub id: FeatureId,

    /// Kind of blocker
    #[arg(short, long, value_enum)]
    pub kind: BlockerKindArg,

    /// What exactly is missing
    #[arg(short = 'D', long, value_parser = validate_reason)]
    pub description: String,
}

/// Arguments for commands that only take a feature ID (`unblock`, `release`)
#[derive(Parser, Debug, Clone)]
pub struct FeatureIdArgs {
    /// Feature ID
    #[arg(value_parser = validate_feature_id)]
    pub id: FeatureId,
}

/// Arguments for the `impact` command
#[derive(Parser, Debug, Clone)]
pub struct ImpactArgs {
    /// Feature ID
    #[arg(value_parser = validate_feature_id)]
    pub id: FeatureId,

    /// Levels of dependents to walk (defaults to the configured depth)
    #[arg(short, long, value_parser = validate_depth)]
    pub depth: Option<usize>,
}

/// Arguments for the `graph` command
#[derive(Parser, Debug, Clone)]
pub struct GraphArgs {}
