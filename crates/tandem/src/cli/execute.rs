//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands. Every command
//! that changes feature state saves the store before printing.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use super::args::{
    BlockArgs, ClaimArgs, DepArgs, FeatureIdArgs, ImpactArgs, IngestArgs, InitArgs, ListArgs,
    LoadArgs, PassArgs, ShowArgs, SkipArgs,
};
use crate::app::App;
use crate::domain::{FeatureId, FeatureStatus, FeatureSummary, NewFeature, WorkerId};
use crate::graph::EdgeInsert;
use crate::ingest::EdgeCandidate;
use crate::output::{self, OutputMode};

/// Execute the init command
pub async fn execute_init(args: &InitArgs, output_mode: OutputMode) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;
    let result = init::init(&current_dir).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "tandem_dir": result.tandem_dir.display().to_string(),
            "config_file": result.config_file.display().to_string(),
            "features_file": result.features_file.display().to_string(),
        }))?,
        OutputMode::Text if !args.quiet => {
            println!("Initialized tandem in {}", result.tandem_dir.display());
            println!("  Config:   {}", result.config_file.display());
            println!("  Features: {}", result.features_file.display());
        }
        OutputMode::Text => {}
    }

    Ok(())
}

/// Execute the load command
pub async fn execute_load(app: &App, args: &LoadArgs, output_mode: OutputMode) -> Result<()> {
    let batch = read_feature_batch(&args.file).await?;
    let loaded = app.scheduler().load_features(batch).await?;
    app.save().await?;

    match output_mode {
        OutputMode::Json => output::print_features(&loaded, output_mode)?,
        OutputMode::Text => println!("Loaded {} feature(s)", loaded.len()),
    }
    Ok(())
}

/// Execute the list command
pub async fn execute_list(app: &App, args: &ListArgs, output_mode: OutputMode) -> Result<()> {
    let mut features = app.scheduler().features().await?;
    if let Some(status) = args.status {
        let status = FeatureStatus::from(status);
        features.retain(|f| f.status == status);
    }

    output::print_features(&features, output_mode)?;
    Ok(())
}

/// Execute the show command
pub async fn execute_show(app: &App, args: &ShowArgs, output_mode: OutputMode) -> Result<()> {
    let scheduler = app.scheduler();
    let feature = scheduler.feature(args.id).await?;

    let summaries: HashMap<FeatureId, FeatureSummary> = scheduler
        .features()
        .await?
        .iter()
        .map(|f| (f.id, f.summary()))
        .collect();
    let lookup = |ids: Vec<FeatureId>| -> Vec<FeatureSummary> {
        ids.iter().filter_map(|id| summaries.get(id).cloned()).collect()
    };

    let dependencies = lookup(scheduler.dependencies_of(args.id).await?);
    let dependents = lookup(scheduler.dependents_of(args.id).await?);

    output::print_feature_details(&feature, &dependencies, &dependents, output_mode)?;
    Ok(())
}

/// Execute the status command
pub async fn execute_status(app: &App, output_mode: OutputMode) -> Result<()> {
    let progress = app.scheduler().progress().await?;
    output::print_progress(&progress, output_mode)?;
    Ok(())
}

/// Execute the dep command
pub async fn execute_dep(app: &App, args: &DepArgs, output_mode: OutputMode) -> Result<()> {
    let outcome = app.scheduler().add_dependency(args.from, args.to).await?;
    app.save().await?;

    let outcome = match outcome {
        EdgeInsert::Inserted => "inserted",
        EdgeInsert::Upgraded => "upgraded",
        EdgeInsert::Unchanged => "unchanged",
    };

    match output_mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "feature_id": args.from,
            "depends_on_id": args.to,
            "outcome": outcome,
        }))?,
        OutputMode::Text => println!("#{} now depends on #{} ({outcome})", args.from, args.to),
    }
    Ok(())
}

/// Execute the ingest command
pub async fn execute_ingest(app: &App, args: &IngestArgs, output_mode: OutputMode) -> Result<()> {
    let candidates = read_edge_candidates(&args.file).await?;
    let report = app.scheduler().ingest(&candidates).await?;
    app.save().await?;

    output::print_ingest(&report, output_mode)?;
    Ok(())
}

/// Execute the claim command
pub async fn execute_claim(app: &App, args: &ClaimArgs, output_mode: OutputMode) -> Result<()> {
    let worker = WorkerId::new(args.worker.as_str());
    let claimed = app.scheduler().claim_next(&worker).await?;

    match claimed {
        Some(feature) => {
            app.save().await?;
            output::print_feature(&feature, output_mode)?;
        }
        None => match output_mode {
            OutputMode::Json => output::print_json(&serde_json::Value::Null)?,
            OutputMode::Text => println!("No feature is ready to claim"),
        },
    }
    Ok(())
}

/// Execute the pass command
pub async fn execute_pass(app: &App, args: &PassArgs, output_mode: OutputMode) -> Result<()> {
    let scheduler = app.scheduler();
    let feature = if args.mocks {
        scheduler.mark_passing_with_mocks(args.id).await?
    } else {
        scheduler.mark_passing(args.id).await?
    };
    app.save().await?;

    output::print_feature(&feature, output_mode)?;
    Ok(())
}

/// Execute the skip command
pub async fn execute_skip(app: &App, args: &SkipArgs, output_mode: OutputMode) -> Result<()> {
    let scheduler = app.scheduler();
    let report = scheduler.skip(args.id, args.reason.as_str()).await?;
    app.save().await?;

    let feature = scheduler.feature(args.id).await?;
    output::print_impact(&report, &feature, output_mode)?;
    Ok(())
}

/// Execute the cascade-skip command
pub async fn execute_cascade_skip(
    app: &App,
    args: &SkipArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let report = app.scheduler().cascade_skip(args.id, &args.reason).await?;
    app.save().await?;

    output::print_cascade(&report, output_mode)?;
    Ok(())
}

/// Execute the block command
pub async fn execute_block(app: &App, args: &BlockArgs, output_mode: OutputMode) -> Result<()> {
    let feature = app
        .scheduler()
        .block(args.id, args.kind.into(), args.description.as_str())
        .await?;
    app.save().await?;

    output::print_feature(&feature, output_mode)?;
    Ok(())
}

/// Execute the unblock command
pub async fn execute_unblock(
    app: &App,
    args: &FeatureIdArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let feature = app.scheduler().unblock(args.id).await?;
    app.save().await?;

    output::print_feature(&feature, output_mode)?;
    Ok(())
}

/// Execute the release command
pub async fn execute_release(
    app: &App,
    args: &FeatureIdArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let feature = app.scheduler().release(args.id).await?;
    app.save().await?;

    output::print_feature(&feature, output_mode)?;
    Ok(())
}

/// Execute the impact command
pub async fn execute_impact(app: &App, args: &ImpactArgs, output_mode: OutputMode) -> Result<()> {
    let scheduler = app.scheduler();
    let depth = args
        .depth
        .unwrap_or_else(|| scheduler.settings().impact_max_depth);

    let feature = scheduler.feature(args.id).await?;
    let report = scheduler.analyze_impact(args.id, depth).await?;

    output::print_impact(&report, &feature, output_mode)?;
    Ok(())
}

/// Execute the graph command
pub async fn execute_graph(app: &App, output_mode: OutputMode) -> Result<()> {
    let export = app.scheduler().get_graph().await?;
    output::print_graph(&export, output_mode)?;
    Ok(())
}

// ============================================================================
// Input Files
// ============================================================================

/// Read a JSON array of features.
pub(crate) async fn read_feature_batch(path: &Path) -> Result<Vec<NewFeature>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of features", path.display()))
}

/// Read edge candidates, one JSON object per line. Blank lines are ignored.
pub(crate) async fn read_edge_candidates(path: &Path) -> Result<Vec<EdgeCandidate>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid edge candidate", path.display(), i + 1))
        })
        .collect()
}
