//! Bounded traversal: k-hop neighborhoods and transitive chains.
//!
//! Both walks are breadth-first over the store's adjacency lists. Requested
//! bounds are clamped to the tier's caps before the walk starts, and the
//! cancel token is checked at every expansion step; cancellation yields a
//! partial result flagged `truncated`.

use std::collections::{BTreeMap, HashSet, VecDeque};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::{GraphError, Result};
use crate::graph::{EdgeType, GraphEdge, GraphNode, UniversalGraph};
use crate::tier::{AppliedLimits, Clamped, Tier, TierLimiter, ToolKind};

// ============================================================================
// Requests and results
// ============================================================================

/// Which adjacency lists to follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outbound,
    Inbound,
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outbound => "outbound",
            Self::Inbound => "inbound",
            Self::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "outbound" | "out" | "callees" | "forward" => Some(Self::Outbound),
            "inbound" | "in" | "callers" | "backward" => Some(Self::Inbound),
            "both" | "any" => Some(Self::Both),
            _ => None,
        }
    }
}

/// Caller-supplied inputs shared by every bounded operation
pub struct RequestContext<'a> {
    pub limiter: &'a dyn TierLimiter,
    pub tier: Tier,
    /// Per-hop decay applied to edge confidence
    pub decay: f64,
    pub cancel: CancelToken,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodRequest {
    pub center_id: String,
    pub k: usize,
    /// `None` uses the tier cap
    #[serde(default)]
    pub max_nodes: Option<usize>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub min_confidence: f64,
    /// Restrict to these edge types; `None` follows every type
    #[serde(default)]
    pub edge_types: Option<Vec<EdgeType>>,
}

impl NeighborhoodRequest {
    pub fn new(center_id: impl Into<String>, k: usize) -> Self {
        Self {
            center_id: center_id.into(),
            k,
            max_nodes: None,
            direction: Direction::Outbound,
            min_confidence: 0.0,
            edge_types: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighborhood {
    pub center_id: String,
    /// Nodes in admission order (center first)
    pub nodes: Vec<GraphNode>,
    /// Edges between returned nodes, insertion-ordered
    pub edges: Vec<GraphEdge>,
    pub depth_by_node: BTreeMap<String, usize>,
    pub k_clamped: bool,
    pub truncated: bool,
    pub limits: AppliedLimits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRequest {
    pub start_id: String,
    pub max_depth: usize,
    #[serde(default)]
    pub max_chains: Option<usize>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub min_confidence: f64,
    #[serde(default)]
    pub edge_types: Option<Vec<EdgeType>>,
}

impl ChainRequest {
    pub fn new(start_id: impl Into<String>, max_depth: usize) -> Self {
        Self {
            start_id: start_id.into(),
            max_depth,
            max_chains: None,
            direction: Direction::Outbound,
            min_confidence: 0.0,
            edge_types: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chains {
    pub start_id: String,
    /// Node-id paths starting at `start_id`, shortest first
    pub chains: Vec<Vec<String>>,
    pub truncated: bool,
    pub limits: AppliedLimits,
}

// ============================================================================
// Shared helpers
// ============================================================================

fn check_confidence(min_confidence: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&min_confidence) {
        return Err(GraphError::invalid(format!(
            "min_confidence must be within [0, 1], got {}",
            min_confidence
        )));
    }
    Ok(())
}

fn type_allowed(filter: &Option<Vec<EdgeType>>, edge: &GraphEdge) -> bool {
    filter
        .as_ref()
        .map(|types| types.contains(&edge.edge_type))
        .unwrap_or(true)
}

/// Edge positions and the node each one leads to, outbound before inbound
fn steps(graph: &UniversalGraph, idx: usize, direction: Direction) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    if matches!(direction, Direction::Outbound | Direction::Both) {
        for &pos in graph.out_edge_positions(idx) {
            if let Some(to) = graph.node_index(&graph.edge_at(pos).to_id) {
                out.push((pos, to));
            }
        }
    }
    if matches!(direction, Direction::Inbound | Direction::Both) {
        for &pos in graph.in_edge_positions(idx) {
            if let Some(from) = graph.node_index(&graph.edge_at(pos).from_id) {
                out.push((pos, from));
            }
        }
    }
    out
}

// ============================================================================
// Neighborhood
// ============================================================================

/// k-hop neighborhood of `center_id`.
///
/// Each level's candidates are ranked by effective confidence
/// (`confidence * decay^h` for inferred edges, `h` = depth of the node being
/// expanded; observed edges keep their confidence), then
/// by edge insertion order; once `max_nodes` is reached the rest are
/// dropped and the result is flagged `truncated`.
pub fn neighborhood(
    graph: &UniversalGraph,
    request: &NeighborhoodRequest,
    ctx: &RequestContext,
) -> Result<Neighborhood> {
    let center = graph
        .node_index(&request.center_id)
        .ok_or_else(|| GraphError::unknown_node(&request.center_id))?;
    check_confidence(request.min_confidence)?;

    let caps = ctx.limiter.limits_for(ToolKind::Neighborhood, ctx.tier);
    let depth = Clamped::apply(request.k, caps.max_depth);
    let nodes_cap = match request.max_nodes {
        Some(n) => Clamped::apply(n, caps.max_nodes),
        None => Clamped::cap_only(caps.max_nodes),
    };
    if depth.clamped {
        tracing::debug!("Clamped k from {} to {}", depth.requested, depth.effective);
    }
    let max_nodes = nodes_cap.effective.max(1);

    let mut depth_of: Vec<Option<usize>> = vec![None; graph.node_count()];
    depth_of[center] = Some(0);
    let mut admitted = vec![center];
    let mut frontier = vec![center];
    let mut truncated = false;

    'levels: for level in 0..depth.effective {
        if frontier.is_empty() {
            break;
        }
        // neighbor -> (effective confidence, edge position)
        let mut best: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
        for &idx in &frontier {
            if ctx.cancel.is_cancelled() {
                truncated = true;
                break 'levels;
            }
            for (pos, next) in steps(graph, idx, request.direction) {
                if depth_of[next].is_some() {
                    continue;
                }
                let edge = graph.edge_at(pos);
                if !type_allowed(&request.edge_types, edge) {
                    continue;
                }
                let effective = edge.effective_confidence(ctx.decay, level);
                if effective < request.min_confidence {
                    continue;
                }
                best.entry(next)
                    .and_modify(|cur| {
                        if effective > cur.0 || (effective == cur.0 && pos < cur.1) {
                            *cur = (effective, pos);
                        }
                    })
                    .or_insert((effective, pos));
            }
        }

        let mut ranked: Vec<(usize, OrderedFloat<f64>, usize)> = best
            .into_iter()
            .map(|(node, (eff, pos))| (node, OrderedFloat(eff), pos))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        let mut next_frontier = Vec::new();
        for (node, _, _) in ranked.iter().copied() {
            if admitted.len() >= max_nodes {
                truncated = true;
                break;
            }
            depth_of[node] = Some(level + 1);
            admitted.push(node);
            next_frontier.push(node);
        }
        if truncated {
            tracing::debug!(
                "Neighborhood of {} truncated at {} nodes",
                request.center_id,
                max_nodes
            );
            break;
        }
        frontier = next_frontier;
    }

    let ids: Vec<&str> = admitted.iter().map(|&i| graph.node_at(i).id.as_str()).collect();
    let mut sub = graph.induced_subgraph(ids.iter().copied());
    sub.edges.retain(|e| type_allowed(&request.edge_types, e));

    let depth_by_node = admitted
        .iter()
        .filter_map(|&i| depth_of[i].map(|d| (graph.node_at(i).id.clone(), d)))
        .collect();

    Ok(Neighborhood {
        center_id: request.center_id.clone(),
        nodes: sub.nodes,
        edges: sub.edges,
        depth_by_node,
        k_clamped: depth.clamped,
        truncated,
        limits: AppliedLimits {
            tier: ctx.tier,
            tool: ToolKind::Neighborhood,
            depth,
            nodes: nodes_cap,
            chains: None,
        },
    })
}

// ============================================================================
// Chains
// ============================================================================

/// Transitive chains from `start_id`.
///
/// Paths are extended breadth-first and never revisit a node already on
/// the path; a path is emitted when it reaches `max_depth` edges or cannot
/// be extended. Paths are deduplicated by node sequence, and the pending
/// queue is bounded by the tier's node cap.
pub fn chains(graph: &UniversalGraph, request: &ChainRequest, ctx: &RequestContext) -> Result<Chains> {
    let start = graph
        .node_index(&request.start_id)
        .ok_or_else(|| GraphError::unknown_node(&request.start_id))?;
    check_confidence(request.min_confidence)?;

    let caps = ctx.limiter.limits_for(ToolKind::Chains, ctx.tier);
    let depth = Clamped::apply(request.max_depth, caps.max_depth);
    let chain_cap = match request.max_chains {
        Some(n) => Clamped::apply(n, caps.max_chains),
        None => Clamped::cap_only(caps.max_chains),
    };
    let queue_cap = Clamped::cap_only(caps.max_nodes);

    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let mut queue: VecDeque<Vec<usize>> = VecDeque::from([vec![start]]);
    let mut found: Vec<Vec<usize>> = Vec::new();
    let mut truncated = false;

    while let Some(path) = queue.pop_front() {
        if ctx.cancel.is_cancelled() {
            truncated = true;
            break;
        }
        if found.len() >= chain_cap.effective {
            truncated = true;
            break;
        }

        let hops = path.len() - 1;
        let Some(&last) = path.last() else {
            continue;
        };
        let mut extended = false;
        if hops < depth.effective {
            for (pos, next) in steps(graph, last, request.direction) {
                let edge = graph.edge_at(pos);
                if !type_allowed(&request.edge_types, edge)
                    || edge.effective_confidence(ctx.decay, hops) < request.min_confidence
                    || path.contains(&next)
                {
                    continue;
                }
                extended = true;
                let mut longer = path.clone();
                longer.push(next);
                if !seen.insert(longer.clone()) {
                    continue;
                }
                if queue.len() >= queue_cap.effective {
                    truncated = true;
                    continue;
                }
                queue.push_back(longer);
            }
        }

        if !extended && hops > 0 {
            found.push(path);
        }
    }
    if !queue.is_empty() {
        truncated = true;
    }

    let chains = found
        .into_iter()
        .map(|path| path.into_iter().map(|i| graph.node_at(i).id.clone()).collect())
        .collect();

    Ok(Chains {
        start_id: request.start_id.clone(),
        chains,
        truncated,
        limits: AppliedLimits {
            tier: ctx.tier,
            tool: ToolKind::Chains,
            depth,
            nodes: queue_cap,
            chains: Some(chain_cap),
        },
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use crate::tier::ToolLimits;

    struct Fixed(ToolLimits);

    impl TierLimiter for Fixed {
        fn limits_for(&self, _tool: ToolKind, _tier: Tier) -> ToolLimits {
            self.0
        }
    }

    fn id(name: &str) -> String {
        GraphNode::make_id("python", "m", NodeKind::Function, name)
    }

    fn graph(edges: &[(&str, &str, f64)]) -> UniversalGraph {
        let mut g = UniversalGraph::new();
        for (a, b, _) in edges {
            for n in [a, b] {
                g.add_node(GraphNode::new("python", "m", NodeKind::Function, n, "m.py", 1));
            }
        }
        for (a, b, c) in edges {
            let edge = if *c >= 1.0 {
                GraphEdge::observed(id(a), id(b), EdgeType::Calls)
            } else {
                GraphEdge::inferred(id(a), id(b), EdgeType::Calls, *c, "test")
            };
            g.add_edge(edge);
        }
        g
    }

    fn ctx(limiter: &Fixed) -> RequestContext<'_> {
        RequestContext {
            limiter,
            tier: Tier::Community,
            decay: 0.9,
            cancel: CancelToken::new(),
        }
    }

    #[test]
    fn test_chain_of_three() {
        let g = graph(&[("a", "b", 1.0), ("b", "c", 1.0)]);
        let limiter = Fixed(ToolLimits::new(10, 100, 10));
        let mut req = NeighborhoodRequest::new(id("a"), 2);
        req.max_nodes = Some(10);

        let result = neighborhood(&g, &req, &ctx(&limiter)).unwrap();
        assert_eq!(result.depth_by_node.len(), 3);
        assert_eq!(result.depth_by_node[&id("c")], 2);
        assert_eq!(result.edges.len(), 2);

        req.k = 1;
        let result = neighborhood(&g, &req, &ctx(&limiter)).unwrap();
        let ids: Vec<_> = result.depth_by_node.keys().cloned().collect();
        assert_eq!(ids, vec![id("a"), id("b")]);
    }

    #[test]
    fn test_truncation_keeps_highest_confidence() {
        let g = graph(&[("a", "low", 0.5), ("a", "high", 0.9), ("a", "tie", 0.9)]);
        let limiter = Fixed(ToolLimits::new(10, 100, 10));
        let mut req = NeighborhoodRequest::new(id("a"), 1);
        req.max_nodes = Some(2);

        let result = neighborhood(&g, &req, &ctx(&limiter)).unwrap();
        assert!(result.truncated);
        let names: Vec<_> = result.nodes.iter().map(|n| n.display_name.as_str()).collect();
        // equal confidence falls back to edge insertion order
        assert_eq!(names, vec!["a", "high"]);
    }

    #[test]
    fn test_decay_excludes_deep_weak_edges() {
        let g = graph(&[("a", "b", 0.7), ("b", "c", 0.7)]);
        let limiter = Fixed(ToolLimits::new(10, 100, 10));
        let mut req = NeighborhoodRequest::new(id("a"), 3);
        req.min_confidence = 0.65;

        let result = neighborhood(&g, &req, &ctx(&limiter)).unwrap();
        // second hop: 0.7 * 0.9 = 0.63 < 0.65
        assert!(result.depth_by_node.contains_key(&id("b")));
        assert!(!result.depth_by_node.contains_key(&id("c")));
    }

    #[test]
    fn test_observed_chain_survives_high_threshold() {
        let g = graph(&[("a", "b", 1.0), ("b", "c", 1.0), ("c", "d", 1.0), ("a", "guess", 0.96)]);
        let limiter = Fixed(ToolLimits::new(10, 100, 10));
        let mut req = NeighborhoodRequest::new(id("a"), 3);
        req.min_confidence = 0.95;

        let result = neighborhood(&g, &req, &ctx(&limiter)).unwrap();
        assert_eq!(result.depth_by_node[&id("d")], 3);
        // the inferred edge passes at hop 0 only
        assert_eq!(result.depth_by_node[&id("guess")], 1);

        let chain_req = ChainRequest {
            min_confidence: 0.95,
            ..ChainRequest::new(id("a"), 3)
        };
        let result = chains(&g, &chain_req, &ctx(&limiter)).unwrap();
        assert!(result.chains.contains(&vec![id("a"), id("b"), id("c"), id("d")]));
    }

    #[test]
    fn test_k_clamped_to_tier() {
        let g = graph(&[("a", "b", 1.0), ("b", "c", 1.0), ("c", "d", 1.0), ("d", "e", 1.0)]);
        let limiter = Fixed(ToolLimits::new(3, 100, 10));
        let clamped = neighborhood(&g, &NeighborhoodRequest::new(id("a"), 50), &ctx(&limiter)).unwrap();
        let direct = neighborhood(&g, &NeighborhoodRequest::new(id("a"), 3), &ctx(&limiter)).unwrap();
        assert!(clamped.k_clamped);
        assert!(!direct.k_clamped);
        assert_eq!(clamped.depth_by_node, direct.depth_by_node);
        assert_eq!(clamped.limits.depth.effective, 3);
    }

    #[test]
    fn test_unknown_center_and_bad_confidence() {
        let g = graph(&[("a", "b", 1.0)]);
        let limiter = Fixed(ToolLimits::new(3, 100, 10));
        let err = neighborhood(&g, &NeighborhoodRequest::new("nope", 1), &ctx(&limiter)).unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode { .. }));

        let mut req = NeighborhoodRequest::new(id("a"), 1);
        req.min_confidence = 1.5;
        assert!(matches!(
            neighborhood(&g, &req, &ctx(&limiter)),
            Err(GraphError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_cancelled_walk_is_partial() {
        let g = graph(&[("a", "b", 1.0), ("b", "c", 1.0)]);
        let limiter = Fixed(ToolLimits::new(3, 100, 10));
        let context = ctx(&limiter);
        context.cancel.cancel();
        let result = neighborhood(&g, &NeighborhoodRequest::new(id("a"), 2), &context).unwrap();
        assert!(result.truncated);
        assert_eq!(result.nodes.len(), 1);
    }

    #[test]
    fn test_inbound_direction() {
        let g = graph(&[("a", "b", 1.0), ("c", "b", 1.0)]);
        let limiter = Fixed(ToolLimits::new(3, 100, 10));
        let mut req = NeighborhoodRequest::new(id("b"), 1);
        req.direction = Direction::Inbound;
        let result = neighborhood(&g, &req, &ctx(&limiter)).unwrap();
        assert_eq!(result.depth_by_node.len(), 3);
    }

    #[test]
    fn test_chains_stop_at_cycles() {
        let g = graph(&[("a", "b", 1.0), ("b", "c", 1.0), ("c", "a", 1.0), ("b", "d", 1.0)]);
        let limiter = Fixed(ToolLimits::new(10, 100, 10));
        let result = chains(&g, &ChainRequest::new(id("a"), 10), &ctx(&limiter)).unwrap();
        assert!(!result.truncated);
        assert_eq!(
            result.chains,
            vec![vec![id("a"), id("b"), id("c")], vec![id("a"), id("b"), id("d")]]
        );
    }

    #[test]
    fn test_chains_respect_cap() {
        let g = graph(&[("a", "b", 1.0), ("a", "c", 1.0), ("a", "d", 1.0)]);
        let limiter = Fixed(ToolLimits::new(10, 100, 2));
        let mut req = ChainRequest::new(id("a"), 5);
        req.max_chains = Some(10);
        let result = chains(&g, &req, &ctx(&limiter)).unwrap();
        assert_eq!(result.chains.len(), 2);
        assert!(result.truncated);
        assert_eq!(result.limits.chains.map(|c| c.clamped), Some(true));
    }

    #[test]
    fn test_chains_are_deterministic() {
        let g = graph(&[("a", "b", 1.0), ("a", "c", 0.8), ("b", "c", 1.0), ("c", "d", 1.0)]);
        let limiter = Fixed(ToolLimits::new(10, 100, 50));
        let req = ChainRequest::new(id("a"), 4);
        let first = chains(&g, &req, &ctx(&limiter)).unwrap();
        let second = chains(&g, &req, &ctx(&limiter)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
