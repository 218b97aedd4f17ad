use serde::Serialize;

use super::is_direct;
use crate::cancel::CancelToken;
use crate::graph::{EdgeType, GraphNode, NodeKind, UniversalGraph};

/// Attached to every report: zero in-degree does not prove unreachability
pub const DEAD_CODE_CAVEAT: &str =
    "heuristic: no inbound calls or inheritance seen statically; reflection, string dispatch and external callers are invisible";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadCodeCandidate {
    pub id: String,
    pub display_name: String,
    pub kind: NodeKind,
    pub file_path: String,
    pub line_number: usize,
}

/// A zero in-degree node kept out of the candidate list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedNode {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadCodeReport {
    pub heuristic: bool,
    pub caveat: &'static str,
    pub candidates: Vec<DeadCodeCandidate>,
    pub excluded: Vec<ExcludedNode>,
}

/// Functions, methods and classes nothing calls or inherits from.
///
/// Any CALLS edge counts, so polymorphism-inferred self-calls keep a method
/// alive. Entry points, dunder methods and trait-impl methods are reported
/// as excluded with the reason.
pub fn dead_code(graph: &UniversalGraph, cancel: &CancelToken) -> (DeadCodeReport, bool) {
    let mut report = DeadCodeReport {
        heuristic: true,
        caveat: DEAD_CODE_CAVEAT,
        candidates: Vec::new(),
        excluded: Vec::new(),
    };

    for node in graph.nodes() {
        if cancel.is_cancelled() {
            sort(&mut report);
            return (report, true);
        }
        if !matches!(node.kind, NodeKind::Function | NodeKind::Method | NodeKind::Class) {
            continue;
        }
        let in_degree = graph.in_degree_where(&node.id, |e| {
            e.edge_type == EdgeType::Calls || is_direct(e, EdgeType::Inherits)
        });
        if in_degree > 0 {
            continue;
        }

        if let Some(reason) = exclusion(node) {
            report.excluded.push(ExcludedNode {
                id: node.id.clone(),
                reason,
            });
            continue;
        }
        report.candidates.push(DeadCodeCandidate {
            id: node.id.clone(),
            display_name: node.display_name.clone(),
            kind: node.kind,
            file_path: node.file_path.clone(),
            line_number: node.line_number,
        });
    }

    sort(&mut report);
    (report, false)
}

fn exclusion(node: &GraphNode) -> Option<String> {
    let meta = &node.metadata;
    if meta.is_entry_point {
        let why = meta.entry_reason.as_deref().unwrap_or("entry point");
        return Some(format!("entry point ({})", why));
    }
    if node.kind == NodeKind::Method {
        let name = node.short_name();
        if name.len() > 4 && name.starts_with("__") && name.ends_with("__") {
            return Some(format!("dunder method {} is invoked implicitly", name));
        }
        if meta.is_trait_impl {
            return Some("trait implementation method, invoked through dispatch".to_string());
        }
    }
    None
}

fn sort(report: &mut DeadCodeReport) {
    report.candidates.sort_by(|a, b| a.id.cmp(&b.id));
    report.excluded.sort_by(|a, b| a.id.cmp(&b.id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphEdge;

    fn add(g: &mut UniversalGraph, kind: NodeKind, name: &str) -> String {
        let node = GraphNode::new("python", "m", kind, name, "m.py", 1);
        let id = node.id.clone();
        g.add_node(node);
        id
    }

    #[test]
    fn test_candidates_and_exclusions() {
        let mut g = UniversalGraph::new();
        let main = add(&mut g, NodeKind::Function, "main");
        let used = add(&mut g, NodeKind::Function, "used");
        let unused = add(&mut g, NodeKind::Function, "unused");
        let base = add(&mut g, NodeKind::Class, "Base");
        let child = add(&mut g, NodeKind::Class, "Child");
        let init = add(&mut g, NodeKind::Method, "Child.__init__");
        let fmt = add(&mut g, NodeKind::Method, "Child.fmt");
        add(&mut g, NodeKind::Module, "m");

        if let Some(node) = g.node_mut(&main) {
            node.metadata.is_entry_point = true;
            node.metadata.entry_reason = Some("main function".into());
        }
        if let Some(node) = g.node_mut(&fmt) {
            node.metadata.is_trait_impl = true;
        }
        g.add_edge(GraphEdge::observed(&main, &used, EdgeType::Calls));
        g.add_edge(GraphEdge::observed(&child, &base, EdgeType::Inherits));

        let (report, cancelled) = dead_code(&g, &CancelToken::new());
        assert!(!cancelled);
        assert!(report.heuristic);
        let ids: Vec<_> = report.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![child.as_str(), unused.as_str()]);

        let excluded: Vec<_> = report.excluded.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(excluded, vec![main.as_str(), init.as_str(), fmt.as_str()]);
        assert!(report.excluded[0].reason.contains("main function"));
        assert!(report.excluded[2].reason.contains("trait"));
    }

    #[test]
    fn test_inferred_self_call_keeps_method_alive() {
        let mut g = UniversalGraph::new();
        let run = add(&mut g, NodeKind::Method, "Svc.run");
        let step = add(&mut g, NodeKind::Method, "Svc.step");
        g.add_edge(GraphEdge::inferred(&run, &step, EdgeType::Calls, 0.7, "heuristic"));
        let (report, _) = dead_code(&g, &CancelToken::new());
        let ids: Vec<_> = report.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![run.as_str()]);
    }
}
