//! Output formatting for CLI commands.
//!
//! This module provides utilities for formatting command output in both
//! human-readable text format and JSON format for programmatic use.
//!
//! Submodules:
//! - [`color`]: Color and styling helpers (semantic colors, icons)
//! - [`tree`]: Dependent tree rendering with ASCII/Unicode connectors

pub mod color;
pub mod tree;

use crate::domain::{Feature, FeatureSummary, GraphExport, Progress};
use crate::impact::{CascadeReport, ImpactReport};
use crate::ingest::IngestReport;
use serde::Serialize;
use std::io::{self, Write};

pub use color::{error, info, success, warning};
pub use tree::{ImpactTreeNode, impact_tree};

use color::{
    bold, colored_status_icon, colorize_id, colorize_priority, colorize_recommendation,
    colorize_status, dimmed,
};

// ============================================================================
// Output Configuration
// ============================================================================

/// Configuration for output formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use ASCII-only icons instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new `OutputConfig` with explicit values.
    #[must_use]
    pub fn new(use_ascii: bool, use_colors: bool) -> Self {
        Self {
            use_ascii,
            use_colors,
        }
    }

    /// Create an `OutputConfig` by reading from environment variables.
    ///
    /// Reads:
    /// - `TANDEM_ASCII`: Set to "1" or "true" for ASCII-only icons (default: false)
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `TANDEM_COLOR`: Set to "0" or "false" to disable colors (default: true)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let use_ascii = match lookup("TANDEM_ASCII") {
            Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
            Some(v) if v == "0" || v.eq_ignore_ascii_case("false") || v.is_empty() => false,
            Some(v) => {
                tracing::warn!(
                    env_var = "TANDEM_ASCII",
                    value = %v,
                    "Invalid value (expected '1', 'true', '0', or 'false'), using default"
                );
                false
            }
            None => false,
        };

        // Respect NO_COLOR standard (https://no-color.org/)
        let use_colors = lookup("NO_COLOR").is_none()
            && lookup("TANDEM_COLOR").is_none_or(|v| v != "0" && !v.eq_ignore_ascii_case("false"));

        Self {
            use_ascii,
            use_colors,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            use_ascii: false,
            use_colors: true,
        }
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

/// Print a single feature
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_feature(feature: &Feature, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Text => {
            print_feature_text(&mut io::stdout().lock(), feature, &OutputConfig::from_env())
        }
        OutputMode::Json => print_json(feature),
    }
}

/// Print a list of features
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_features(features: &[Feature], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Text => {
            print_features_text(&mut io::stdout().lock(), features, &OutputConfig::from_env())
        }
        OutputMode::Json => print_json(&features),
    }
}

/// Print a feature with its prerequisites and dependents (for show command)
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_feature_details(
    feature: &Feature,
    dependencies: &[FeatureSummary],
    dependents: &[FeatureSummary],
    mode: OutputMode,
) -> io::Result<()> {
    match mode {
        OutputMode::Text => print_feature_details_text(
            &mut io::stdout().lock(),
            feature,
            dependencies,
            dependents,
            &OutputConfig::from_env(),
        ),
        OutputMode::Json => print_json(&serde_json::json!({
            "feature": feature,
            "dependencies": dependencies,
            "dependents": dependents,
        })),
    }
}

/// Print progress counts
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_progress(progress: &Progress, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Text => {
            print_progress_text(&mut io::stdout().lock(), progress, &OutputConfig::from_env())
        }
        OutputMode::Json => print_json(progress),
    }
}

/// Print an impact report as a dependent tree
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_impact(report: &ImpactReport, root: &Feature, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Text => {
            print_impact_text(&mut io::stdout().lock(), report, root, &OutputConfig::from_env())
        }
        OutputMode::Json => print_json(report),
    }
}

/// Print the outcome of a cascading skip
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_cascade(report: &CascadeReport, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Text => {
            print_cascade_text(&mut io::stdout().lock(), report, &OutputConfig::from_env())
        }
        OutputMode::Json => print_json(report),
    }
}

/// Print ingestion counts
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_ingest(report: &IngestReport, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Text => {
            print_ingest_text(&mut io::stdout().lock(), report, &OutputConfig::from_env())
        }
        OutputMode::Json => print_json(report),
    }
}

/// Print the dependency graph
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_graph(export: &GraphExport, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Text => {
            print_graph_text(&mut io::stdout().lock(), export, &OutputConfig::from_env())
        }
        OutputMode::Json => print_json(export),
    }
}

/// Print a simple message
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_message(msg: &str) -> io::Result<()> {
    writeln!(io::stdout().lock(), "{msg}")
}

/// Print a JSON-formatted result for any serializable value
///
/// # Errors
///
/// Returns an error if serialization or writing to stdout fails.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(io::stdout().lock(), "{json}")
}

// ============================================================================
// Text Formatting
// ============================================================================

fn feature_line(feature: &Feature, config: &OutputConfig) -> String {
    format!(
        "{} {}  {}  {}",
        colored_status_icon(feature.status, config),
        colorize_id(feature.id, config),
        colorize_priority(feature.priority, config),
        feature.name
    )
}

fn summary_line(summary: &FeatureSummary, config: &OutputConfig) -> String {
    format!(
        "{} {} {}",
        colored_status_icon(summary.status, config),
        colorize_id(summary.id, config),
        summary.name
    )
}

fn print_feature_text<W: Write>(
    w: &mut W,
    feature: &Feature,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(w, "{}", feature_line(feature, config))?;

    if let Some(worker) = &feature.claimed_by {
        writeln!(w, "  {} {}", dimmed("Claimed by:", config), worker)?;
    }
    if feature.passing_with_mocks {
        writeln!(w, "  {}", warning("passing with mocks", config))?;
    }
    if let Some(reason) = &feature.skip_reason {
        writeln!(
            w,
            "  {} {} (skipped {}x)",
            dimmed("Skip reason:", config),
            reason,
            feature.skip_count
        )?;
    }
    if let (Some(kind), Some(description)) = (feature.blocker_kind, &feature.blocker_description) {
        writeln!(w, "  {} {kind}: {description}", dimmed("Blocker:", config))?;
    }

    Ok(())
}

fn print_features_text<W: Write>(
    w: &mut W,
    features: &[Feature],
    config: &OutputConfig,
) -> io::Result<()> {
    if features.is_empty() {
        writeln!(w, "No features found.")?;
        return Ok(());
    }

    writeln!(w, "Found {} feature(s):", features.len())?;
    writeln!(w)?;

    for feature in features {
        let mut line = feature_line(feature, config);
        if let Some(worker) = &feature.claimed_by {
            line.push_str(&format!("  {}", dimmed(&format!("[{worker}]"), config)));
        }
        writeln!(w, "{line}")?;
    }

    Ok(())
}

fn print_feature_details_text<W: Write>(
    w: &mut W,
    feature: &Feature,
    dependencies: &[FeatureSummary],
    dependents: &[FeatureSummary],
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{} {}: {}",
        colored_status_icon(feature.status, config),
        colorize_id(feature.id, config),
        feature.name
    )?;

    writeln!(
        w,
        "{}  {}    {}  {}",
        dimmed("Status:", config),
        colorize_status(feature.status, config),
        dimmed("Priority:", config),
        colorize_priority(feature.priority, config)
    )?;

    if !feature.category.is_empty() {
        writeln!(w, "{} {}", dimmed("Category:", config), feature.category)?;
    }

    if let Some(worker) = &feature.claimed_by {
        let since = feature
            .claimed_at
            .map(|t| format!(" since {}", t.format("%Y-%m-%d %H:%M")))
            .unwrap_or_default();
        writeln!(w, "{} {worker}{since}", dimmed("Claimed by:", config))?;
    }

    if feature.was_skipped {
        writeln!(
            w,
            "{} {} time(s){}",
            dimmed("Skipped:", config),
            feature.skip_count,
            feature
                .skip_reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default()
        )?;
    }

    if let (Some(kind), Some(description)) = (feature.blocker_kind, &feature.blocker_description) {
        writeln!(w, "{} {kind}: {description}", dimmed("Blocker:", config))?;
    }

    if feature.passing_with_mocks {
        writeln!(w, "{}", warning("Passing against mocked services", config))?;
    }

    writeln!(
        w,
        "{} {}    {} {}",
        dimmed("Created:", config),
        feature.created_at.format("%Y-%m-%d %H:%M"),
        dimmed("Updated:", config),
        feature.updated_at.format("%Y-%m-%d %H:%M")
    )?;

    if !feature.description.trim().is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", bold("Description", config))?;
        for line in feature.description.lines() {
            writeln!(w, "  {line}")?;
        }
    }

    if !dependencies.is_empty() {
        writeln!(w)?;
        writeln!(w, "{} ({}):", bold("Depends on", config), dependencies.len())?;
        for dep in dependencies {
            writeln!(w, "  {} {}", info("→", config), summary_line(dep, config))?;
        }
    }

    if !dependents.is_empty() {
        writeln!(w)?;
        writeln!(w, "{} ({}):", bold("Needed by", config), dependents.len())?;
        for dep in dependents {
            writeln!(w, "  {} {}", warning("←", config), summary_line(dep, config))?;
        }
    }

    Ok(())
}

fn print_progress_text<W: Write>(
    w: &mut W,
    progress: &Progress,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(w, "{}", bold("Progress", config))?;
    writeln!(
        w,
        "  {} / {} passing",
        success(&progress.passing.to_string(), config),
        progress.total
    )?;
    writeln!(
        w,
        "  {} pending, {} in progress, {} skipped, {} blocked",
        progress.pending,
        warning(&progress.in_progress.to_string(), config),
        progress.skipped,
        error(&progress.blocked.to_string(), config)
    )
}

fn print_impact_text<W: Write>(
    w: &mut W,
    report: &ImpactReport,
    root: &Feature,
    config: &OutputConfig,
) -> io::Result<()> {
    tree::print_impact_tree_text(w, root.id, &root.name, report, config)?;
    writeln!(w)?;
    writeln!(
        w,
        "{} {} direct, {} transitive",
        dimmed("Impact:", config),
        report.direct_dependents.len(),
        report.transitive_dependents.len()
    )?;
    writeln!(
        w,
        "{} {}",
        dimmed("Recommendation:", config),
        colorize_recommendation(report.recommendation, config)
    )
}

fn print_cascade_text<W: Write>(
    w: &mut W,
    report: &CascadeReport,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{} {} {}",
        success("Skipped", config),
        colorize_id(report.root.id, config),
        report.root.name
    )?;

    if !report.skipped.is_empty() {
        let ids: Vec<String> = report
            .skipped
            .iter()
            .map(|id| colorize_id(*id, config))
            .collect();
        writeln!(w, "  {} {}", dimmed("Also skipped:", config), ids.join(", "))?;
    }

    for not_skipped in &report.not_skipped {
        writeln!(
            w,
            "  {} {}: {}",
            warning("Left alone", config),
            colorize_id(not_skipped.id, config),
            not_skipped.reason
        )?;
    }

    Ok(())
}

fn print_ingest_text<W: Write>(
    w: &mut W,
    report: &IngestReport,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{} {} inserted, {} upgraded, {} unchanged",
        success("Ingested:", config),
        report.inserted,
        report.upgraded,
        report.unchanged
    )?;

    let dropped = [
        ("would form a cycle", report.rejected_cycles),
        ("unknown feature", report.unknown_features),
        ("invalid", report.invalid),
        ("below threshold", report.below_threshold),
    ];
    for (label, count) in dropped.into_iter().filter(|(_, n)| *n > 0) {
        writeln!(w, "  {} {count} {label}", warning("Dropped:", config))?;
    }

    Ok(())
}

fn print_graph_text<W: Write>(
    w: &mut W,
    export: &GraphExport,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{} ({} features, {} edges)",
        bold("Dependency graph", config),
        export.nodes.len(),
        export.edges.len()
    )?;

    for node in &export.nodes {
        writeln!(w, "  {}", summary_line(node, config))?;
        for edge in export.edges.iter().filter(|e| e.feature_id == node.id) {
            writeln!(
                w,
                "      {} {} {}",
                info("→", config),
                colorize_id(edge.depends_on_id, config),
                dimmed(&format!("({}, {:.2})", edge.method, edge.confidence), config)
            )?;
        }
    }

    Ok(())
}
