//! Whole-graph analysis passes
//!
//! Every pass reads only the built graph and returns structured items.
//! Result lists are capped at the analysis tool's `max_nodes`; a cap or a
//! cancellation marks the result truncated.

mod cycles;
mod dead_code;
mod hot_nodes;
mod layers;

pub use cycles::{circular_imports, ImportCycle};
pub use dead_code::{dead_code, DeadCodeCandidate, DeadCodeReport, ExcludedNode};
pub use hot_nodes::{hot_nodes, HotNode};
pub use layers::{layer_violations, LayerViolation, ViolationType};

use serde::{Deserialize, Serialize};

use crate::graph::{EdgeType, GraphEdge};
use crate::tier::{AppliedLimits, Clamped, ToolKind};
use crate::traversal::RequestContext;

/// Hot-node list size when the caller does not ask for one
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    HotNodes,
    DeadCode,
    CircularImports,
    LayerViolations,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HotNodes => "hot_nodes",
            Self::DeadCode => "dead_code",
            Self::CircularImports => "circular_imports",
            Self::LayerViolations => "layer_violations",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "hot_nodes" | "hot" => Some(Self::HotNodes),
            "dead_code" | "dead" => Some(Self::DeadCode),
            "circular_imports" | "cycles" => Some(Self::CircularImports),
            "layer_violations" | "layers" => Some(Self::LayerViolations),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Hot-node list size, clamped to the tier cap
    #[serde(default)]
    pub top_n: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "analysis", content = "result", rename_all = "snake_case")]
pub enum AnalysisOutput {
    HotNodes(Vec<HotNode>),
    DeadCode(DeadCodeReport),
    CircularImports(Vec<ImportCycle>),
    LayerViolations(Vec<LayerViolation>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub output: AnalysisOutput,
    pub truncated: bool,
    pub limits: AppliedLimits,
}

/// Run one analysis pass under the analysis tool's tier caps
pub fn analyze(
    graph: &crate::graph::UniversalGraph,
    kind: AnalysisKind,
    params: &AnalysisParams,
    ctx: &RequestContext,
) -> AnalysisResult {
    let caps = ctx.limiter.limits_for(ToolKind::Analysis, ctx.tier);
    let nodes = match (kind, params.top_n) {
        (AnalysisKind::HotNodes, requested) => {
            Clamped::apply(requested.unwrap_or(DEFAULT_TOP_N), caps.max_nodes)
        }
        _ => Clamped::cap_only(caps.max_nodes),
    };
    let limit = nodes.effective;

    let (output, truncated) = match kind {
        AnalysisKind::HotNodes => {
            let (items, truncated) = hot_nodes(graph, limit, &ctx.cancel);
            (AnalysisOutput::HotNodes(items), truncated)
        }
        AnalysisKind::DeadCode => {
            let (mut report, cancelled) = dead_code(graph, &ctx.cancel);
            let capped = cap(&mut report.candidates, limit);
            (AnalysisOutput::DeadCode(report), cancelled || capped)
        }
        AnalysisKind::CircularImports => {
            let (mut cycles, cancelled) = circular_imports(graph, &ctx.cancel);
            let capped = cap(&mut cycles, limit);
            (AnalysisOutput::CircularImports(cycles), cancelled || capped)
        }
        AnalysisKind::LayerViolations => {
            let (mut violations, cancelled) = layer_violations(graph, &ctx.cancel);
            let capped = cap(&mut violations, limit);
            (AnalysisOutput::LayerViolations(violations), cancelled || capped)
        }
    };

    if truncated {
        tracing::debug!("{} result truncated at {} items", kind.as_str(), limit);
    }
    AnalysisResult {
        output,
        truncated,
        limits: AppliedLimits {
            tier: ctx.tier,
            tool: ToolKind::Analysis,
            depth: Clamped::cap_only(caps.max_depth),
            nodes,
            chains: None,
        },
    }
}

fn cap<T>(items: &mut Vec<T>, limit: usize) -> bool {
    if items.len() > limit {
        items.truncate(limit);
        return true;
    }
    false
}

/// Directly observed edge of the given type
pub(crate) fn is_direct(edge: &GraphEdge, edge_type: EdgeType) -> bool {
    edge.edge_type == edge_type && !edge.is_inferred()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::graph::{GraphNode, NodeKind, UniversalGraph};
    use crate::tier::{Tier, TierLimiter, ToolLimits};

    struct Fixed(ToolLimits);

    impl TierLimiter for Fixed {
        fn limits_for(&self, _tool: ToolKind, _tier: Tier) -> ToolLimits {
            self.0
        }
    }

    fn star(leaves: usize) -> UniversalGraph {
        let mut g = UniversalGraph::new();
        g.add_node(GraphNode::new("python", "m", NodeKind::Function, "hub", "m.py", 1));
        for i in 0..leaves {
            let name = format!("leaf{}", i);
            g.add_node(GraphNode::new("python", "m", NodeKind::Function, &name, "m.py", 2 + i));
            g.add_edge(GraphEdge::observed(
                GraphNode::make_id("python", "m", NodeKind::Function, "hub"),
                GraphNode::make_id("python", "m", NodeKind::Function, &name),
                EdgeType::Calls,
            ));
        }
        g
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(AnalysisKind::parse("hot"), Some(AnalysisKind::HotNodes));
        assert_eq!(AnalysisKind::parse("circular-imports"), Some(AnalysisKind::CircularImports));
        assert_eq!(AnalysisKind::parse("dead_code"), Some(AnalysisKind::DeadCode));
        assert_eq!(AnalysisKind::parse("nope"), None);
    }

    #[test]
    fn test_top_n_clamped_by_tier() {
        let g = star(6);
        let limiter = Fixed(ToolLimits::new(3, 4, 5));
        let ctx = RequestContext {
            limiter: &limiter,
            tier: Tier::Community,
            decay: 0.9,
            cancel: CancelToken::new(),
        };
        let result = analyze(&g, AnalysisKind::HotNodes, &AnalysisParams { top_n: Some(50) }, &ctx);
        let AnalysisOutput::HotNodes(items) = &result.output else {
            panic!("expected hot nodes");
        };
        assert_eq!(items.len(), 4);
        assert!(result.limits.nodes.clamped);
        assert_eq!(result.limits.nodes.effective, 4);
        assert!(result.truncated);
    }

    #[test]
    fn test_dead_code_list_capped() {
        let g = star(6);
        let limiter = Fixed(ToolLimits::new(3, 2, 5));
        let ctx = RequestContext {
            limiter: &limiter,
            tier: Tier::Community,
            decay: 0.9,
            cancel: CancelToken::new(),
        };
        let result = analyze(&g, AnalysisKind::DeadCode, &AnalysisParams::default(), &ctx);
        let AnalysisOutput::DeadCode(report) = &result.output else {
            panic!("expected dead code");
        };
        // only the hub has no callers
        assert_eq!(report.candidates.len(), 1);
        assert!(!result.truncated);
    }
}
