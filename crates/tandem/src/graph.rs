//! Dependency graph of features.
//!
//! The graph owns the feature node set and the directed dependency edges, and
//! provides the pure algorithms the scheduler needs:
//! - Cycle rejection at edge insertion
//! - Readiness (every prerequisite is passing)
//! - Bounded breadth-first traversal over dependents
//!
//! It has no synchronization of its own; callers hold it behind a lock.
//!
//! # Edge Direction
//!
//! Edges point from **dependent -> prerequisite**, the same direction as a
//! [`DependencyEdge`]: `feature_id -> depends_on_id`. Outgoing edges of a node are
//! its dependencies, incoming edges are its dependents.
//!
//! # Traversal Termination
//!
//! Both the cycle check and the dependents walk are iterative and track a visited
//! set, so each node is expanded at most once. They terminate in at most
//! `feature_count()` expansions even if the edge set were somehow malformed.

use crate::domain::{DependencyEdge, DetectionMethod, FeatureId, FeatureStatus};
use crate::error::{Error, Result};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

/// Default depth for impact traversals.
pub const DEFAULT_IMPACT_DEPTH: usize = 3;

/// Edge weight stored in the graph.
#[derive(Debug, Clone, PartialEq)]
struct EdgeMeta {
    confidence: f64,
    method: DetectionMethod,
    keywords: Vec<String>,
}

impl From<&DependencyEdge> for EdgeMeta {
    fn from(edge: &DependencyEdge) -> Self {
        Self {
            confidence: edge.confidence,
            method: edge.method,
            keywords: edge.keywords.clone(),
        }
    }
}

/// Outcome of [`DependencyGraph::add_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    /// New edge added
    Inserted,
    /// The pair already existed with lower confidence; metadata replaced
    Upgraded,
    /// The pair already existed with equal or higher confidence
    Unchanged,
}

/// A dependent found by [`DependencyGraph::transitive_dependents`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReachedDependent {
    /// The dependent feature
    pub id: FeatureId,
    /// Level at which it was first reached (1 = direct dependent)
    pub depth: usize,
    /// The prerequisite it was reached through
    pub via: FeatureId,
    /// Confidence of the edge `id -> via`
    pub confidence: f64,
}

/// Directed acyclic graph of feature dependencies.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Nodes hold feature IDs, edges hold detection metadata.
    graph: DiGraph<FeatureId, EdgeMeta>,

    /// Every feature in the graph has an entry here.
    node_map: HashMap<FeatureId, NodeIndex>,
}

impl DependencyGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature node. Returns `false` if it was already present.
    pub fn add_feature(&mut self, id: FeatureId) -> bool {
        if self.node_map.contains_key(&id) {
            return false;
        }
        let node = self.graph.add_node(id);
        self.node_map.insert(id, node);
        true
    }

    /// Whether the feature is a node of this graph
    #[must_use]
    pub fn contains(&self, id: FeatureId) -> bool {
        self.node_map.contains_key(&id)
    }

    /// Number of feature nodes
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of dependency edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn node(&self, id: FeatureId) -> Result<NodeIndex> {
        self.node_map
            .get(&id)
            .copied()
            .ok_or(Error::UnknownFeature(id))
    }

    /// Insert a dependency edge.
    ///
    /// If the ordered pair already exists, the edge with the higher confidence is
    /// kept (ties keep the existing edge). Otherwise the edge is inserted unless it
    /// would close a cycle, which is checked by a depth-first search from the
    /// prerequisite back to the dependent.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownFeature` if either endpoint is not in the graph
    /// - `Error::CycleDetected` if the edge would create a cycle, including a
    ///   self-edge; the graph is left unchanged
    pub fn add_edge(&mut self, edge: &DependencyEdge) -> Result<EdgeInsert> {
        let from = self.node(edge.feature_id)?;
        let to = self.node(edge.depends_on_id)?;

        // Duplicate check first: an existing edge is never a new cycle.
        if let Some(existing) = self.graph.find_edge(from, to) {
            let meta = &mut self.graph[existing];
            if edge.confidence > meta.confidence {
                *meta = EdgeMeta::from(edge);
                return Ok(EdgeInsert::Upgraded);
            }
            return Ok(EdgeInsert::Unchanged);
        }

        if let Some(path) = self.path_between(to, from) {
            return Err(Error::CycleDetected {
                from: edge.feature_id,
                to: edge.depends_on_id,
                path,
            });
        }

        self.graph.add_edge(from, to, EdgeMeta::from(edge));
        Ok(EdgeInsert::Inserted)
    }

    /// Check whether adding `from -> to` would create a cycle, without adding it.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownFeature` if either feature is missing.
    pub fn would_cycle(&self, from: FeatureId, to: FeatureId) -> Result<bool> {
        let from_node = self.node(from)?;
        let to_node = self.node(to)?;
        Ok(self.path_between(to_node, from_node).is_some())
    }

    /// Depth-first search along dependency edges from `start` to `target`.
    ///
    /// Returns the path `start -> ... -> target` if one exists. Uses an explicit
    /// stack and a parent map instead of recursion.
    fn path_between(&self, start: NodeIndex, target: NodeIndex) -> Option<Vec<FeatureId>> {
        if start == target {
            return Some(vec![self.graph[start]]);
        }

        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if !visited.insert(next) {
                    continue;
                }
                parent.insert(next, node);
                if next == target {
                    return Some(self.unwind(&parent, start, target));
                }
                stack.push(next);
            }
        }

        None
    }

    fn unwind(
        &self,
        parent: &HashMap<NodeIndex, NodeIndex>,
        start: NodeIndex,
        target: NodeIndex,
    ) -> Vec<FeatureId> {
        let mut path = vec![self.graph[target]];
        let mut current = target;
        while current != start {
            let Some(&prev) = parent.get(&current) else {
                break;
            };
            path.push(self.graph[prev]);
            current = prev;
        }
        path.reverse();
        path
    }

    /// Direct prerequisites of a feature, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownFeature` if the feature is missing.
    pub fn dependencies_of(&self, id: FeatureId) -> Result<Vec<FeatureId>> {
        let node = self.node(id)?;
        let mut ids: Vec<FeatureId> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Direct dependents of a feature, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownFeature` if the feature is missing.
    pub fn dependents_of(&self, id: FeatureId) -> Result<Vec<FeatureId>> {
        Ok(self
            .dependent_edges(id)?
            .into_iter()
            .map(|edge| edge.feature_id)
            .collect())
    }

    /// Edges pointing at `id` (one per direct dependent), ordered by dependent id.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownFeature` if the feature is missing.
    pub fn dependent_edges(&self, id: FeatureId) -> Result<Vec<DependencyEdge>> {
        let node = self.node(id)?;
        let mut edges: Vec<DependencyEdge> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| self.export_edge(e.source(), e.target(), e.weight()))
            .collect();
        edges.sort_by_key(DependencyEdge::pair);
        Ok(edges)
    }

    /// Whether every prerequisite of `id` is passing.
    ///
    /// `status_of` resolves a feature's current status; a prerequisite it cannot
    /// resolve counts as not passing.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownFeature` if the feature is missing.
    pub fn is_ready<F>(&self, id: FeatureId, status_of: F) -> Result<bool>
    where
        F: Fn(FeatureId) -> Option<FeatureStatus>,
    {
        let node = self.node(id)?;
        Ok(self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .all(|dep| status_of(self.graph[dep]) == Some(FeatureStatus::Passing)))
    }

    /// Breadth-first walk over dependents, up to `max_depth` levels.
    ///
    /// Each dependent appears once, annotated with the depth at which it was first
    /// reached, so diamond-shaped graphs are not double counted. Within a level,
    /// nodes are visited in id order.
    ///
    /// For a chain `A <- B <- C <- D <- E`, `transitive_dependents(A, 3)` returns
    /// `B` (1), `C` (2) and `D` (3).
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownFeature` if the feature is missing.
    pub fn transitive_dependents(
        &self,
        id: FeatureId,
        max_depth: usize,
    ) -> Result<Vec<ReachedDependent>> {
        let start = self.node(id)?;

        let mut result = Vec::new();
        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::from([(start, 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }

            let mut incoming: Vec<_> = self
                .graph
                .edges_directed(current, Direction::Incoming)
                .collect();
            incoming.sort_by_key(|e| self.graph[e.source()]);

            for edge in incoming {
                let dependent = edge.source();
                if visited.insert(dependent) {
                    let next_depth = depth + 1;
                    queue.push_back((dependent, next_depth));
                    result.push(ReachedDependent {
                        id: self.graph[dependent],
                        depth: next_depth,
                        via: self.graph[current],
                        confidence: edge.weight().confidence,
                    });
                }
            }
        }

        Ok(result)
    }

    /// Look up the edge for an ordered pair
    #[must_use]
    pub fn edge(&self, from: FeatureId, to: FeatureId) -> Option<DependencyEdge> {
        let from_node = *self.node_map.get(&from)?;
        let to_node = *self.node_map.get(&to)?;
        let edge = self.graph.find_edge(from_node, to_node)?;
        Some(self.export_edge(from_node, to_node, &self.graph[edge]))
    }

    /// All edges, ordered by `(feature_id, depends_on_id)`
    #[must_use]
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges: Vec<DependencyEdge> = self
            .graph
            .edge_references()
            .map(|e| self.export_edge(e.source(), e.target(), e.weight()))
            .collect();
        edges.sort_by_key(DependencyEdge::pair);
        edges
    }

    fn export_edge(&self, from: NodeIndex, to: NodeIndex, meta: &EdgeMeta) -> DependencyEdge {
        DependencyEdge {
            feature_id: self.graph[from],
            depends_on_id: self.graph[to],
            confidence: meta.confidence,
            method: meta.method,
            keywords: meta.keywords.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> FeatureId {
        FeatureId(n)
    }

    fn graph_with(ids: &[u64]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for &n in ids {
            graph.add_feature(id(n));
        }
        graph
    }

    fn dep(graph: &mut DependencyGraph, from: u64, to: u64) {
        graph
            .add_edge(&DependencyEdge::explicit(id(from), id(to)))
            .unwrap();
    }

    #[test]
    fn test_cycle_rejected_and_graph_unchanged() {
        let mut graph = graph_with(&[10, 11, 12]);
        dep(&mut graph, 10, 11);
        dep(&mut graph, 11, 12);
        let before = graph.edges();

        let err = graph
            .add_edge(&DependencyEdge::explicit(id(12), id(10)))
            .unwrap_err();

        match err {
            Error::CycleDetected { from, to, path } => {
                assert_eq!(from, id(12));
                assert_eq!(to, id(10));
                assert_eq!(path, vec![id(10), id(11), id(12)]);
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
        assert_eq!(graph.edges(), before);
    }

    #[test]
    fn test_self_edge_is_a_cycle() {
        let mut graph = graph_with(&[1]);
        let err = graph
            .add_edge(&DependencyEdge::explicit(id(1), id(1)))
            .unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_would_cycle_does_not_mutate() {
        let mut graph = graph_with(&[1, 2, 3]);
        dep(&mut graph, 1, 2);
        dep(&mut graph, 2, 3);

        assert!(graph.would_cycle(id(3), id(1)).unwrap());
        assert!(!graph.would_cycle(id(1), id(3)).unwrap());
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_duplicate_keeps_higher_confidence() {
        let mut graph = graph_with(&[1, 2]);
        let weak = DependencyEdge {
            confidence: 0.4,
            method: DetectionMethod::Keyword,
            keywords: vec!["login".into()],
            ..DependencyEdge::explicit(id(1), id(2))
        };
        assert_eq!(graph.add_edge(&weak).unwrap(), EdgeInsert::Inserted);

        let weaker = DependencyEdge {
            confidence: 0.2,
            ..weak.clone()
        };
        assert_eq!(graph.add_edge(&weaker).unwrap(), EdgeInsert::Unchanged);
        assert!((graph.edge(id(1), id(2)).unwrap().confidence - 0.4).abs() < f64::EPSILON);

        let strong = DependencyEdge::explicit(id(1), id(2));
        assert_eq!(graph.add_edge(&strong).unwrap(), EdgeInsert::Upgraded);
        let stored = graph.edge(id(1), id(2)).unwrap();
        assert!((stored.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(stored.method, DetectionMethod::ExplicitReference);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_unknown_endpoint() {
        let mut graph = graph_with(&[1]);
        let err = graph
            .add_edge(&DependencyEdge::explicit(id(1), id(9)))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownFeature(FeatureId(9))));
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let mut graph = graph_with(&[1, 2, 3]);
        dep(&mut graph, 3, 1);
        dep(&mut graph, 2, 1);
        dep(&mut graph, 3, 2);

        assert_eq!(graph.dependencies_of(id(3)).unwrap(), vec![id(1), id(2)]);
        assert_eq!(graph.dependents_of(id(1)).unwrap(), vec![id(2), id(3)]);
        assert!(graph.dependents_of(id(3)).unwrap().is_empty());
    }

    #[test]
    fn test_is_ready_requires_all_passing() {
        let mut graph = graph_with(&[1, 2, 3]);
        dep(&mut graph, 3, 1);
        dep(&mut graph, 3, 2);

        let statuses: HashMap<FeatureId, FeatureStatus> = HashMap::from([
            (id(1), FeatureStatus::Passing),
            (id(2), FeatureStatus::InProgress),
        ]);
        assert!(!graph.is_ready(id(3), |f| statuses.get(&f).copied()).unwrap());

        let statuses: HashMap<FeatureId, FeatureStatus> = HashMap::from([
            (id(1), FeatureStatus::Passing),
            (id(2), FeatureStatus::Passing),
        ]);
        assert!(graph.is_ready(id(3), |f| statuses.get(&f).copied()).unwrap());

        // No dependencies: always ready
        assert!(graph.is_ready(id(1), |_| None).unwrap());
    }

    #[test]
    fn test_transitive_dependents_chain_is_depth_bounded() {
        // A <- B <- C <- D <- E
        let mut graph = graph_with(&[1, 2, 3, 4, 5]);
        dep(&mut graph, 2, 1);
        dep(&mut graph, 3, 2);
        dep(&mut graph, 4, 3);
        dep(&mut graph, 5, 4);

        let reached = graph.transitive_dependents(id(1), DEFAULT_IMPACT_DEPTH).unwrap();
        let found: Vec<(FeatureId, usize)> = reached.iter().map(|r| (r.id, r.depth)).collect();
        assert_eq!(found, vec![(id(2), 1), (id(3), 2), (id(4), 3)]);
    }

    #[test]
    fn test_transitive_dependents_diamond_counted_once() {
        // B and C depend on A; D depends on both B and C
        let mut graph = graph_with(&[1, 2, 3, 4]);
        dep(&mut graph, 2, 1);
        dep(&mut graph, 3, 1);
        dep(&mut graph, 4, 2);
        dep(&mut graph, 4, 3);

        let reached = graph.transitive_dependents(id(1), 3).unwrap();
        assert_eq!(reached.len(), 3);
        let d = reached.iter().find(|r| r.id == id(4)).unwrap();
        assert_eq!(d.depth, 2);
        assert_eq!(d.via, id(2), "first reached through the lower id");
    }

    #[test]
    fn test_transitive_dependents_carries_edge_confidence() {
        let mut graph = graph_with(&[1, 2]);
        graph
            .add_edge(&DependencyEdge {
                confidence: 0.65,
                method: DetectionMethod::Category,
                ..DependencyEdge::explicit(id(2), id(1))
            })
            .unwrap();

        let reached = graph.transitive_dependents(id(1), 1).unwrap();
        assert_eq!(reached.len(), 1);
        assert!((reached[0].confidence - 0.65).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_depth_returns_nothing() {
        let mut graph = graph_with(&[1, 2]);
        dep(&mut graph, 2, 1);
        assert!(graph.transitive_dependents(id(1), 0).unwrap().is_empty());
    }
}
