//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success/Passing: green   (passing status, safe skips)
//!   - Warning/Active:  yellow  (in_progress, P1 priority, mocks)
//!   - Error/Blocked:   red     (blocked status, P0 priority, cascades)
//!   - Info/Reference:  cyan    (feature IDs, tree root)
//!   - Accent:          magenta (skipped/parked)
//!   - Muted:           dimmed  (field labels, connectors)
//!   - Emphasis:        bold    (section headers, P0)
//!   - Default:         white   (pending status)

use crate::domain::{FeatureId, FeatureStatus};
use crate::impact::SkipRecommendation;
use colored::Colorize;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.red().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Apply semantic "info" color (cyan) to text.
pub fn info(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.cyan().to_string()
}

/// Apply color to status text based on feature status.
pub(crate) fn colorize_status(status: FeatureStatus, config: &OutputConfig) -> String {
    let text = status.to_string();
    if !config.use_colors {
        return text;
    }
    match status {
        FeatureStatus::Pending => text.white().to_string(),
        FeatureStatus::InProgress => text.yellow().to_string(),
        FeatureStatus::Passing => text.green().to_string(),
        FeatureStatus::Skipped => text.magenta().to_string(),
        FeatureStatus::Blocked => text.red().to_string(),
    }
}

/// Apply color to priority text based on priority level.
pub(crate) fn colorize_priority(priority: u32, config: &OutputConfig) -> String {
    let text = format!("P{priority}");
    if !config.use_colors {
        return text;
    }
    match priority {
        0 => text.red().bold().to_string(),
        1 => text.yellow().to_string(),
        _ => text,
    }
}

/// Colorize a feature ID (cyan), rendered as `#42`.
pub(crate) fn colorize_id(id: FeatureId, config: &OutputConfig) -> String {
    let text = format!("#{id}");
    if !config.use_colors {
        return text;
    }
    text.cyan().to_string()
}

/// Get a colored status icon, with ASCII fallback support.
pub(crate) fn colored_status_icon(status: FeatureStatus, config: &OutputConfig) -> String {
    let icon = if config.use_ascii {
        match status {
            FeatureStatus::Pending => "o",
            FeatureStatus::InProgress => ">",
            FeatureStatus::Passing => "+",
            FeatureStatus::Skipped => "~",
            FeatureStatus::Blocked => "x",
        }
    } else {
        match status {
            FeatureStatus::Pending => "○",
            FeatureStatus::InProgress => "▶",
            FeatureStatus::Passing => "✓",
            FeatureStatus::Skipped => "↷",
            FeatureStatus::Blocked => "✗",
        }
    };

    if !config.use_colors {
        return icon.to_string();
    }

    match status {
        FeatureStatus::Pending => icon.white().to_string(),
        FeatureStatus::InProgress => icon.yellow().to_string(),
        FeatureStatus::Passing => icon.green().to_string(),
        FeatureStatus::Skipped => icon.magenta().to_string(),
        FeatureStatus::Blocked => icon.red().to_string(),
    }
}

/// Color a skip recommendation by how disruptive it is.
pub(crate) fn colorize_recommendation(
    recommendation: SkipRecommendation,
    config: &OutputConfig,
) -> String {
    let text = recommendation.to_string();
    if !config.use_colors {
        return text;
    }
    match recommendation {
        SkipRecommendation::SafeToSkip => text.green().to_string(),
        SkipRecommendation::ImplementWithMocks => text.yellow().to_string(),
        SkipRecommendation::ReviewDependencies => text.yellow().bold().to_string(),
        SkipRecommendation::CascadeSkip => text.red().bold().to_string(),
    }
}

/// Apply dimmed style to text (for labels/field names).
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Apply bold style to text (for section headers).
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}
