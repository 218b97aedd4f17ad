//! In-memory graph store with O(1) id lookup and adjacency indexes.
//!
//! Nodes and edges live in insertion-ordered vectors; the id index and the
//! `(from, to, type)` dedup index are hash maps over positions. Outbound and
//! inbound adjacency lists hold edge positions in insertion order, which is
//! the stable tie-break every traversal relies on.

use ahash::AHashMap;
use serde::Serialize;

use super::edge::{EdgeType, GraphEdge};
use super::node::GraphNode;

/// Outcome of an edge insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    /// New edge stored at this position
    Inserted(usize),
    /// Existing `(from, to, type)` edge raised to the higher confidence
    Upgraded(usize),
    /// Existing edge kept; the new one was not stronger
    Duplicate(usize),
    /// An endpoint does not exist; nothing stored
    Dropped,
}

/// Owned node/edge subset returned by queries and traversals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Directed, typed graph of code entities for one analysis request
#[derive(Debug, Clone, Default)]
pub struct UniversalGraph {
    nodes: Vec<GraphNode>,
    index: AHashMap<String, usize>,
    edges: Vec<GraphEdge>,
    edge_index: AHashMap<(usize, usize, EdgeType), usize>,
    outbound: Vec<Vec<usize>>,
    inbound: Vec<Vec<usize>>,
    dropped_edges: usize,
}

impl UniversalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; a node with the same id is kept as-is.
    ///
    /// Returns the node's position and whether it was newly inserted.
    pub fn add_node(&mut self, node: GraphNode) -> (usize, bool) {
        if let Some(&idx) = self.index.get(&node.id) {
            return (idx, false);
        }
        let idx = self.nodes.len();
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        self.outbound.push(Vec::new());
        self.inbound.push(Vec::new());
        (idx, true)
    }

    /// Add an edge, deduplicating on `(from, to, type)` by highest confidence.
    ///
    /// Edges whose endpoints are unknown are dropped with a warning.
    pub fn add_edge(&mut self, edge: GraphEdge) -> EdgeInsert {
        let (Some(&from), Some(&to)) = (self.index.get(&edge.from_id), self.index.get(&edge.to_id))
        else {
            self.dropped_edges += 1;
            tracing::warn!(
                "Dropping {} edge with unknown endpoint: {} -> {}",
                edge.edge_type.as_str(),
                edge.from_id,
                edge.to_id
            );
            return EdgeInsert::Dropped;
        };

        let key = (from, to, edge.edge_type);
        if let Some(&existing) = self.edge_index.get(&key) {
            let current = &mut self.edges[existing];
            if edge.confidence > current.confidence {
                current.confidence = edge.confidence;
                current.evidence = edge.evidence;
                current.origin = edge.origin;
                return EdgeInsert::Upgraded(existing);
            }
            return EdgeInsert::Duplicate(existing);
        }

        let pos = self.edges.len();
        self.edges.push(edge);
        self.edge_index.insert(key, pos);
        self.outbound[from].push(pos);
        self.inbound[to].push(pos);
        EdgeInsert::Inserted(pos)
    }

    /// Insert a batch of edges, returning how many were newly stored
    pub fn extend_edges(&mut self, edges: impl IntoIterator<Item = GraphEdge>) -> usize {
        let mut inserted = 0;
        for edge in edges {
            if matches!(self.add_edge(edge), EdgeInsert::Inserted(_)) {
                inserted += 1;
            }
        }
        inserted
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        match self.index.get(id) {
            Some(&idx) => Some(&mut self.nodes[idx]),
            None => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node_at(&self, idx: usize) -> &GraphNode {
        &self.nodes[idx]
    }

    pub fn edge_at(&self, idx: usize) -> &GraphEdge {
        &self.edges[idx]
    }

    /// Positions of edges leaving the node at `idx`, insertion-ordered
    pub fn out_edge_positions(&self, idx: usize) -> &[usize] {
        &self.outbound[idx]
    }

    /// Positions of edges entering the node at `idx`, insertion-ordered
    pub fn in_edge_positions(&self, idx: usize) -> &[usize] {
        &self.inbound[idx]
    }

    pub fn outbound(&self, id: &str) -> impl Iterator<Item = &GraphEdge> + '_ {
        let positions: &[usize] = match self.index.get(id) {
            Some(&idx) => &self.outbound[idx],
            None => &[],
        };
        positions.iter().map(move |&pos| &self.edges[pos])
    }

    pub fn inbound(&self, id: &str) -> impl Iterator<Item = &GraphEdge> + '_ {
        let positions: &[usize] = match self.index.get(id) {
            Some(&idx) => &self.inbound[idx],
            None => &[],
        };
        positions.iter().map(move |&pos| &self.edges[pos])
    }

    pub fn find_edge(&self, from_id: &str, to_id: &str, edge_type: EdgeType) -> Option<&GraphEdge> {
        let from = self.node_index(from_id)?;
        let to = self.node_index(to_id)?;
        self.edge_index
            .get(&(from, to, edge_type))
            .map(|&pos| &self.edges[pos])
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.index.get(id).map(|&i| self.inbound[i].len()).unwrap_or(0)
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.index.get(id).map(|&i| self.outbound[i].len()).unwrap_or(0)
    }

    /// In-degree counting only edges accepted by `keep`
    pub fn in_degree_where(&self, id: &str, keep: impl Fn(&GraphEdge) -> bool) -> usize {
        self.inbound(id).filter(|e| keep(e)).count()
    }

    /// Out-degree counting only edges accepted by `keep`
    pub fn out_degree_where(&self, id: &str, keep: impl Fn(&GraphEdge) -> bool) -> usize {
        self.outbound(id).filter(|e| keep(e)).count()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges rejected at insertion because an endpoint was missing
    pub fn dropped_edges(&self) -> usize {
        self.dropped_edges
    }

    /// Nodes in the given order plus every edge between them, in insertion order
    pub fn induced_subgraph<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> SubGraph {
        let mut member = vec![false; self.nodes.len()];
        let mut nodes = Vec::new();
        for id in ids {
            if let Some(&idx) = self.index.get(id) {
                if !member[idx] {
                    member[idx] = true;
                    nodes.push(self.nodes[idx].clone());
                }
            }
        }

        let edges = self
            .edges
            .iter()
            .filter(|e| {
                let from = self.index.get(&e.from_id).copied();
                let to = self.index.get(&e.to_id).copied();
                matches!((from, to), (Some(f), Some(t)) if member[f] && member[t])
            })
            .cloned()
            .collect();

        SubGraph { nodes, edges }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;

    fn func(name: &str) -> GraphNode {
        GraphNode::new("python", "m", NodeKind::Function, name, "m.py", 1)
    }

    fn id(name: &str) -> String {
        GraphNode::make_id("python", "m", NodeKind::Function, name)
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut g = UniversalGraph::new();
        let (a, fresh) = g.add_node(func("a"));
        assert!(fresh);
        let (again, fresh) = g.add_node(func("a"));
        assert!(!fresh);
        assert_eq!(a, again);
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn test_dangling_edge_is_dropped() {
        let mut g = UniversalGraph::new();
        g.add_node(func("a"));
        let result = g.add_edge(GraphEdge::observed(id("a"), id("ghost"), EdgeType::Calls));
        assert_eq!(result, EdgeInsert::Dropped);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.dropped_edges(), 1);
    }

    #[test]
    fn test_dedup_keeps_highest_confidence() {
        let mut g = UniversalGraph::new();
        g.add_node(func("a"));
        g.add_node(func("b"));

        let first = g.add_edge(GraphEdge::inferred(id("a"), id("b"), EdgeType::Calls, 0.5, "weak"));
        assert_eq!(first, EdgeInsert::Inserted(0));
        let up = g.add_edge(GraphEdge::inferred(id("a"), id("b"), EdgeType::Calls, 0.7, "strong"));
        assert_eq!(up, EdgeInsert::Upgraded(0));
        let dup = g.add_edge(GraphEdge::inferred(id("a"), id("b"), EdgeType::Calls, 0.6, "middle"));
        assert_eq!(dup, EdgeInsert::Duplicate(0));

        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edges()[0].confidence, 0.7);
        assert_eq!(g.edges()[0].evidence.as_deref(), Some("strong"));

        // Different type is a different edge
        g.add_edge(GraphEdge::inferred(id("a"), id("b"), EdgeType::SemanticSimilar, 0.6, "names"));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_observed_edge_survives_weaker_inference() {
        let mut g = UniversalGraph::new();
        g.add_node(func("a"));
        g.add_node(func("b"));
        g.add_edge(GraphEdge::observed(id("a"), id("b"), EdgeType::Calls));
        g.add_edge(GraphEdge::inferred(id("a"), id("b"), EdgeType::Calls, 0.7, "heuristic"));
        let edge = g.find_edge(&id("a"), &id("b"), EdgeType::Calls).unwrap();
        assert!(!edge.is_inferred());
        assert_eq!(edge.confidence, 1.0);
    }

    #[test]
    fn test_adjacency_and_degrees() {
        let mut g = UniversalGraph::new();
        for n in ["a", "b", "c"] {
            g.add_node(func(n));
        }
        g.add_edge(GraphEdge::observed(id("a"), id("b"), EdgeType::Calls));
        g.add_edge(GraphEdge::observed(id("a"), id("c"), EdgeType::Calls));
        g.add_edge(GraphEdge::observed(id("b"), id("c"), EdgeType::Calls));

        assert_eq!(g.out_degree(&id("a")), 2);
        assert_eq!(g.in_degree(&id("c")), 2);
        let targets: Vec<_> = g.outbound(&id("a")).map(|e| e.to_id.clone()).collect();
        assert_eq!(targets, vec![id("b"), id("c")]);

        let sub = g.induced_subgraph([id("a").as_str(), id("b").as_str()]);
        assert_eq!(sub.nodes.len(), 2);
        assert_eq!(sub.edges.len(), 1);
    }
}
