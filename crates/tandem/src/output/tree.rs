//! Dependent tree rendering for `tandem impact` output.

use std::io::{self, Write};

use colored::Colorize;

use super::OutputConfig;
use super::color::{colored_status_icon, colorize_id, dimmed};
use crate::domain::FeatureId;
use crate::impact::{ImpactReport, ImpactedFeature};

/// A node in a dependent tree for rendering purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactTreeNode<'a> {
    /// The dependent
    pub feature: &'a ImpactedFeature,
    /// Features reached through this one
    pub children: Vec<ImpactTreeNode<'a>>,
}

/// Arrange an impact report into a tree rooted at the analyzed feature.
///
/// Each dependent hangs under the feature it was first reached through, so
/// every dependent appears exactly once.
#[must_use]
pub fn impact_tree(report: &ImpactReport) -> Vec<ImpactTreeNode<'_>> {
    let all: Vec<&ImpactedFeature> = report
        .direct_dependents
        .iter()
        .chain(&report.transitive_dependents)
        .collect();
    children_of(report.feature_id, 1, &all)
}

fn children_of<'a>(
    parent: FeatureId,
    depth: usize,
    all: &[&'a ImpactedFeature],
) -> Vec<ImpactTreeNode<'a>> {
    all.iter()
        .filter(|f| f.via == parent && f.depth == depth)
        .map(|f| ImpactTreeNode {
            feature: f,
            children: children_of(f.id, depth + 1, all),
        })
        .collect()
}

/// Render the dependent tree with ASCII/Unicode connectors.
///
/// ```text
/// ◆ #3 Payment API
/// ├── #5 Checkout (0.90) ○
/// │   └── #8 Receipts (1.00) ○
/// └── #6 Refunds (0.70) ▶
/// ```
pub(crate) fn print_impact_tree_text<W: Write>(
    w: &mut W,
    root_id: FeatureId,
    root_name: &str,
    report: &ImpactReport,
    config: &OutputConfig,
) -> io::Result<()> {
    let root_icon = if config.use_ascii { "*" } else { "◆" };
    let root_icon_str = if config.use_colors {
        root_icon.cyan().bold().to_string()
    } else {
        root_icon.to_string()
    };

    writeln!(
        w,
        "{} {} {}",
        root_icon_str,
        colorize_id(root_id, config),
        root_name
    )?;

    print_children(w, &impact_tree(report), &[], config)
}

/// `prefix_segments` tracks which ancestor levels still have siblings below,
/// used to draw the vertical continuation lines.
fn print_children<W: Write>(
    w: &mut W,
    children: &[ImpactTreeNode<'_>],
    prefix_segments: &[bool],
    config: &OutputConfig,
) -> io::Result<()> {
    let (branch, corner, pipe, space) = if config.use_ascii {
        ("|-- ", "`-- ", "|   ", "    ")
    } else {
        ("├── ", "└── ", "│   ", "    ")
    };

    for (i, child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;

        let mut prefix = String::new();
        for &has_more in prefix_segments {
            prefix.push_str(&dimmed(if has_more { pipe } else { space }, config));
        }
        let connector = dimmed(if is_last { corner } else { branch }, config);

        let feature = child.feature;
        writeln!(
            w,
            "{}{}{} {} {} {}",
            prefix,
            connector,
            colorize_id(feature.id, config),
            feature.name,
            dimmed(&format!("({:.2})", feature.confidence), config),
            colored_status_icon(feature.status, config)
        )?;

        if !child.children.is_empty() {
            let mut next_segments = prefix_segments.to_vec();
            next_segments.push(!is_last);
            print_children(w, &child.children, &next_segments, config)?;
        }
    }

    Ok(())
}
