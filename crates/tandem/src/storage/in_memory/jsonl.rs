//! JSONL persistence for in-memory storage.
//!
//! The data file holds one tagged record per line:
//!
//! ```text
//! {"record":"feature","id":1,"name":"Login form","priority":1,"status":"passing",...}
//! {"record":"edge","feature_id":2,"depends_on_id":1,"confidence":1.0,"method":"explicit_reference"}
//! ```
//!
//! Features are written first, ordered by id, then edges ordered by
//! `(feature_id, depends_on_id)`, so saves of the same state are byte-identical.

use super::inner::StoreState;
use crate::domain::{DependencyEdge, Feature, FeatureId};
use crate::error::{Error, Result, StorageError};
use crate::graph::DependencyGraph;
use crate::storage::FeatureStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;

/// One line of the data file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum StoredRecord {
    Feature(Feature),
    Edge(DependencyEdge),
}

/// Warnings that can occur during JSONL file loading.
///
/// These are non-fatal: the load continues and the offending record is
/// skipped. They indicate data quality problems that may need manual repair,
/// so callers should log or report them.
///
/// ```no_run
/// # use tandem::storage::in_memory::{load_from_jsonl, LoadWarning};
/// # use std::path::Path;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> anyhow::Result<()> {
/// let (_store, warnings) = load_from_jsonl(Path::new(".tandem/features.jsonl")).await?;
///
/// for warning in warnings {
///     if let LoadWarning::CircularDependency { from, to } = warning {
///         eprintln!("Dropped edge {from} -> {to}: it closes a cycle");
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// A line that isn't a valid record
    ///
    /// **Effect**: Line is skipped entirely.
    MalformedJson {
        /// 1-based line number
        line_number: usize,
        /// Parser message
        error: String,
    },

    /// A second feature record with an id already loaded
    ///
    /// **Effect**: The first record wins; later ones are skipped.
    DuplicateFeature {
        /// 1-based line number of the skipped record
        line_number: usize,
        /// The repeated id
        id: FeatureId,
    },

    /// An edge references a feature that doesn't exist in the file
    ///
    /// **Effect**: The edge is skipped; both sides that do exist are still loaded.
    OrphanedDependency {
        /// Dependent side
        from: FeatureId,
        /// Prerequisite side
        to: FeatureId,
    },

    /// An edge would close a cycle with edges loaded before it
    ///
    /// **Effect**: The edge is skipped to break the cycle.
    CircularDependency {
        /// Dependent side
        from: FeatureId,
        /// Prerequisite side
        to: FeatureId,
    },

    /// An edge whose confidence is not a number in `[0.0, 1.0]`
    ///
    /// **Effect**: The edge is skipped.
    InvalidConfidence {
        /// Dependent side
        from: FeatureId,
        /// Prerequisite side
        to: FeatureId,
    },
}

/// Load a store from a JSONL file.
///
/// Returns the store together with every non-fatal problem found; see
/// [`LoadWarning`] for how each kind is handled.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be opened or read.
pub async fn load_from_jsonl(path: &Path) -> Result<(Arc<dyn FeatureStore>, Vec<LoadWarning>)> {
    let (state, warnings) = read_state(path).await?;
    Ok((Arc::new(Arc::new(Mutex::new(state))), warnings))
}

/// Read a data file into a fresh [`StoreState`].
pub(crate) async fn read_state(path: &Path) -> Result<(StoreState, Vec<LoadWarning>)> {
    let file = File::open(path).await.map_err(Error::Io)?;
    let mut lines = BufReader::new(file).lines();

    let mut warnings = Vec::new();
    let mut state = StoreState::default();
    let mut edges = Vec::new();
    let mut line_number = 0;

    // First pass: parse records, keep features, defer edges
    while let Some(line) = lines.next_line().await.map_err(Error::Io)? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<StoredRecord>(&line) {
            Ok(StoredRecord::Feature(feature)) => {
                if state.features.contains_key(&feature.id) {
                    warnings.push(LoadWarning::DuplicateFeature {
                        line_number,
                        id: feature.id,
                    });
                    continue;
                }
                state.features.insert(feature.id, feature);
            }
            Ok(StoredRecord::Edge(edge)) => edges.push(edge),
            Err(e) => warnings.push(LoadWarning::MalformedJson {
                line_number,
                error: e.to_string(),
            }),
        }
    }

    // Second pass: rebuild the graph so cycles are caught in file order
    let mut graph = DependencyGraph::new();
    for id in state.features.keys() {
        graph.add_feature(*id);
    }

    for edge in edges {
        let (from, to) = edge.pair();
        if !(0.0..=1.0).contains(&edge.confidence) {
            warnings.push(LoadWarning::InvalidConfidence { from, to });
            continue;
        }
        if !graph.contains(from) || !graph.contains(to) {
            warnings.push(LoadWarning::OrphanedDependency { from, to });
            continue;
        }
        if let Err(Error::CycleDetected { .. }) = graph.add_edge(&edge) {
            warnings.push(LoadWarning::CircularDependency { from, to });
        }
    }

    // The graph resolved duplicate pairs to the highest confidence.
    state.edges = graph
        .edges()
        .into_iter()
        .map(|edge| (edge.pair(), edge))
        .collect();

    Ok((state, warnings))
}

/// Save a store to a JSONL file with atomic writes.
///
/// The data is written to a uniquely named `.<file>.*.tmp` next to the target
/// and renamed over it, so an interrupted save leaves the original file
/// unchanged and concurrent saves never share a temp file.
///
/// # Errors
///
/// Returns `Error::Io` if the temp file cannot be written or renamed.
pub async fn save_to_jsonl(store: &dyn FeatureStore, path: &Path) -> Result<()> {
    let mut state = StoreState::default();
    for feature in store.features().await? {
        state.features.insert(feature.id, feature);
    }
    for edge in store.edges().await? {
        state.edges.insert(edge.pair(), edge);
    }
    write_state(&state, path).await
}

/// Write a consistent snapshot to `path` atomically.
pub(crate) async fn write_state(state: &StoreState, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Removed on drop unless persisted.
    let temp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(Error::Io)?;

    let file = File::from_std(temp.reopen().map_err(Error::Io)?);
    write_records(state, file).await?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

async fn write_records(state: &StoreState, file: File) -> Result<()> {
    let mut writer = BufWriter::new(file);

    let features = state.features.values().cloned().map(StoredRecord::Feature);
    let edges = state.edges.values().cloned().map(StoredRecord::Edge);

    for record in features.chain(edges) {
        let json = serde_json::to_string(&record).map_err(StorageError::Serialization)?;
        writer.write_all(json.as_bytes()).await.map_err(Error::Io)?;
        writer.write_all(b"\n").await.map_err(Error::Io)?;
    }

    writer.flush().await.map_err(Error::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeatureStatus, NewFeature, Transition, WorkerId};
    use chrono::Utc;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn feature(id: u64) -> Feature {
        NewFeature::new(id, format!("feature {id}"), 1).into_feature(Utc::now())
    }

    fn record(value: &impl Serialize) -> String {
        serde_json::to_string(value).unwrap()
    }

    fn feature_line(id: u64) -> String {
        record(&StoredRecord::Feature(feature(id)))
    }

    fn edge_line(from: u64, to: u64) -> String {
        record(&StoredRecord::Edge(DependencyEdge::explicit(
            FeatureId(from),
            FeatureId(to),
        )))
    }

    fn dir_entries(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn write_lines(dir: &TempDir, lines: &[String]) -> PathBuf {
        let path = dir.path().join("features.jsonl");
        tokio::fs::write(&path, lines.join("\n")).await.unwrap();
        path
    }

    #[test]
    fn test_record_is_tagged() {
        let line = edge_line(2, 1);
        assert!(line.starts_with(r#"{"record":"edge""#), "{line}");
        assert!(feature_line(1).contains(r#""record":"feature""#));
    }

    #[tokio::test]
    async fn test_round_trip_preserves_status_and_edges() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("features.jsonl");

        let store = super::super::empty_store();
        store
            .insert_features(vec![feature(1), feature(2)])
            .await
            .unwrap();
        store
            .apply(
                FeatureId(1),
                Transition::Claim {
                    worker: WorkerId::new("w1"),
                },
            )
            .await
            .unwrap();
        store
            .upsert_edge(DependencyEdge::explicit(FeatureId(2), FeatureId(1)))
            .await
            .unwrap();
        save_to_jsonl(&store, &path).await.unwrap();

        let (loaded, warnings) = load_from_jsonl(&path).await.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(loaded.features().await.unwrap(), store.features().await.unwrap());
        assert_eq!(loaded.edges().await.unwrap(), store.edges().await.unwrap());

        let first = loaded.get(FeatureId(1)).await.unwrap().unwrap();
        assert_eq!(first.status, FeatureStatus::InProgress);
        assert_eq!(dir_entries(&temp_dir), vec!["features.jsonl".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_saves_never_collide() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("features.jsonl");

        let store = super::super::empty_store();
        store
            .insert_features(vec![feature(1), feature(2)])
            .await
            .unwrap();
        let state = store.lock().await.clone();

        let saves = (0..8).map(|_| write_state(&state, &path));
        for result in futures::future::join_all(saves).await {
            result.unwrap();
        }

        let (loaded, warnings) = load_from_jsonl(&path).await.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(loaded.features().await.unwrap().len(), 2);
        assert_eq!(dir_entries(&temp_dir), vec!["features.jsonl".to_string()]);
    }

    #[tokio::test]
    async fn test_saves_are_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("features.jsonl");

        let store = super::super::empty_store();
        store
            .insert_features(vec![feature(3), feature(1), feature(2)])
            .await
            .unwrap();
        store
            .upsert_edge(DependencyEdge::explicit(FeatureId(3), FeatureId(1)))
            .await
            .unwrap();
        store
            .upsert_edge(DependencyEdge::explicit(FeatureId(2), FeatureId(1)))
            .await
            .unwrap();

        save_to_jsonl(&store, &path).await.unwrap();
        let first = tokio::fs::read_to_string(&path).await.unwrap();
        save_to_jsonl(&store, &path).await.unwrap();
        let second = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(first, second);

        let kinds: Vec<&str> = first
            .lines()
            .map(|l| if l.contains(r#""record":"edge""#) { "edge" } else { "feature" })
            .collect();
        assert_eq!(kinds, vec!["feature", "feature", "feature", "edge", "edge"]);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_lines(
            &temp_dir,
            &[
                feature_line(1),
                "{not json".to_string(),
                String::new(),
                r#"{"record":"widget","id":5}"#.to_string(),
                feature_line(2),
            ],
        )
        .await;

        let (state, warnings) = read_state(&path).await.unwrap();
        assert_eq!(state.features.len(), 2);
        let lines: Vec<usize> = warnings
            .iter()
            .map(|w| match w {
                LoadWarning::MalformedJson { line_number, .. } => *line_number,
                other => panic!("unexpected warning {other:?}"),
            })
            .collect();
        assert_eq!(lines, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_orphaned_and_circular_edges_are_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_lines(
            &temp_dir,
            &[
                edge_line(2, 1),
                feature_line(1),
                feature_line(2),
                edge_line(1, 2),
                edge_line(2, 9),
            ],
        )
        .await;

        let (state, warnings) = read_state(&path).await.unwrap();
        assert_eq!(
            state.edges.keys().copied().collect::<Vec<_>>(),
            vec![(FeatureId(2), FeatureId(1))],
            "edges before their features still load"
        );
        assert_eq!(
            warnings,
            vec![
                LoadWarning::CircularDependency {
                    from: FeatureId(1),
                    to: FeatureId(2),
                },
                LoadWarning::OrphanedDependency {
                    from: FeatureId(2),
                    to: FeatureId(9),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_feature_keeps_first() {
        let temp_dir = TempDir::new().unwrap();
        let mut renamed = feature(1);
        renamed.name = "second copy".to_string();
        let path = write_lines(
            &temp_dir,
            &[feature_line(1), record(&StoredRecord::Feature(renamed))],
        )
        .await;

        let (state, warnings) = read_state(&path).await.unwrap();
        assert_eq!(state.features[&FeatureId(1)].name, "feature 1");
        assert_eq!(
            warnings,
            vec![LoadWarning::DuplicateFeature {
                line_number: 2,
                id: FeatureId(1),
            }]
        );
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let bad = DependencyEdge {
            confidence: 1.5,
            ..DependencyEdge::explicit(FeatureId(2), FeatureId(1))
        };
        let path = write_lines(
            &temp_dir,
            &[
                feature_line(1),
                feature_line(2),
                record(&StoredRecord::Edge(bad)),
            ],
        )
        .await;

        let (state, warnings) = read_state(&path).await.unwrap();
        assert!(state.edges.is_empty());
        assert!(matches!(
            warnings.as_slice(),
            [LoadWarning::InvalidConfidence { .. }]
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = read_state(&temp_dir.path().join("absent.jsonl")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
