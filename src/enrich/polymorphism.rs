//! Heuristic polymorphism resolution for `self.m()` calls.
//!
//! Without type analysis a self-call is resolved by name only: to `m` on
//! the enclosing class, else to the nearest same-file base class defining
//! `m`, plus any same-file subclass that overrides `m`. Every edge is
//! labeled as unverified dispatch.

use std::collections::{HashSet, VecDeque};

use crate::config::EnrichmentConfig;
use crate::facts::{module_path_for, FactSet};
use crate::graph::{EdgeType, GraphEdge, GraphNode, NodeKind, UniversalGraph};

pub const SELF_CALL_EVIDENCE: &str = "heuristic: same-class self-call, not verified dispatch";

/// Infer CALLS edges for self-qualified calls inside method bodies
pub fn infer(graph: &UniversalGraph, facts: &FactSet, config: &EnrichmentConfig) -> Vec<GraphEdge> {
    let mut edges = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for call in &facts.calls {
        let Some(method) = call.self_target() else {
            continue;
        };
        let Some(caller) = call.caller.as_deref() else {
            continue;
        };
        let Some((class, _)) = caller.rsplit_once('.') else {
            continue;
        };
        let module = module_path_for(&call.file_path);
        let caller_id = GraphNode::make_id(&call.language, &module, NodeKind::Method, caller);
        let class_id = GraphNode::make_id(&call.language, &module, NodeKind::Class, class);
        if !graph.contains(&caller_id) || !graph.contains(&class_id) {
            continue;
        }

        let method_on = |owner: &str| {
            let id = GraphNode::make_id(
                &call.language,
                &module,
                NodeKind::Method,
                &format!("{}.{}", owner, method),
            );
            graph.contains(&id).then_some(id)
        };

        let mut push = |target: String, confidence: f64, evidence: String| {
            if target != caller_id && seen.insert((caller_id.clone(), target.clone())) {
                edges.push(GraphEdge::inferred(
                    caller_id.clone(),
                    target,
                    EdgeType::Calls,
                    confidence,
                    evidence,
                ));
            }
        };

        if let Some(target) = method_on(class) {
            push(target, config.polymorphism_confidence, SELF_CALL_EVIDENCE.to_string());
        } else if let Some((base, target)) = same_file_related(graph, &class_id, &call.file_path, Direction::Bases)
            .into_iter()
            .find_map(|base| method_on(&base).map(|t| (base, t)))
        {
            push(
                target,
                config.polymorphism_confidence,
                format!("heuristic: self-call inherited from {}, not verified dispatch", base),
            );
        }

        for subclass in same_file_related(graph, &class_id, &call.file_path, Direction::Subclasses) {
            if let Some(target) = method_on(&subclass) {
                push(
                    target,
                    config.override_confidence,
                    format!(
                        "heuristic: possible override in subclass {}, not verified dispatch",
                        subclass
                    ),
                );
            }
        }
    }

    tracing::debug!("Polymorphism pass inferred {} edges", edges.len());
    edges
}

#[derive(Clone, Copy)]
enum Direction {
    Bases,
    Subclasses,
}

/// Class names reachable over INHERITS edges within one file, nearest first
fn same_file_related(
    graph: &UniversalGraph,
    class_id: &str,
    file_path: &str,
    direction: Direction,
) -> Vec<String> {
    let mut names = Vec::new();
    let mut visited: HashSet<String> = HashSet::from([class_id.to_string()]);
    let mut queue = VecDeque::from([class_id.to_string()]);

    while let Some(current) = queue.pop_front() {
        let neighbors: Vec<&str> = match direction {
            Direction::Bases => graph
                .outbound(&current)
                .filter(|e| e.edge_type == EdgeType::Inherits)
                .map(|e| e.to_id.as_str())
                .collect(),
            Direction::Subclasses => graph
                .inbound(&current)
                .filter(|e| e.edge_type == EdgeType::Inherits)
                .map(|e| e.from_id.as_str())
                .collect(),
        };
        for id in neighbors {
            let Some(node) = graph.node(id) else {
                continue;
            };
            if node.file_path != file_path || !visited.insert(id.to_string()) {
                continue;
            }
            names.push(node.display_name.clone());
            queue.push_back(id.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::CallFact;

    fn add(graph: &mut UniversalGraph, kind: NodeKind, name: &str) -> String {
        let node = GraphNode::new("python", "shapes", kind, name, "shapes.py", 1);
        let id = node.id.clone();
        graph.add_node(node);
        id
    }

    fn self_call(caller: &str, callee: &str) -> CallFact {
        CallFact {
            language: "python".into(),
            file_path: "shapes.py".into(),
            caller: Some(caller.into()),
            callee: callee.into(),
            line: 3,
        }
    }

    #[test]
    fn test_same_class_base_and_override_edges() {
        let mut graph = UniversalGraph::new();
        let base = add(&mut graph, NodeKind::Class, "Shape");
        let circle = add(&mut graph, NodeKind::Class, "Circle");
        let describe = add(&mut graph, NodeKind::Method, "Shape.describe");
        let base_area = add(&mut graph, NodeKind::Method, "Shape.area");
        let circle_area = add(&mut graph, NodeKind::Method, "Circle.area");
        let circle_show = add(&mut graph, NodeKind::Method, "Circle.show");
        graph.add_edge(GraphEdge::observed(circle.clone(), base.clone(), EdgeType::Inherits));

        let mut facts = FactSet::new();
        facts.calls.push(self_call("Shape.describe", "self.area"));
        facts.calls.push(self_call("Circle.show", "self.describe"));
        facts.calls.push(self_call("Shape.describe", "self.missing"));

        let config = EnrichmentConfig::default();
        let edges = infer(&graph, &facts, &config);
        assert_eq!(edges.len(), 3);

        assert_eq!(edges[0].from_id, describe);
        assert_eq!(edges[0].to_id, base_area);
        assert_eq!(edges[0].confidence, 0.7);
        assert_eq!(edges[0].evidence.as_deref(), Some(SELF_CALL_EVIDENCE));

        assert_eq!(edges[1].to_id, circle_area);
        assert_eq!(edges[1].confidence, 0.5);
        assert!(edges[1].evidence.as_deref().unwrap().contains("subclass Circle"));

        assert_eq!(edges[2].from_id, circle_show);
        assert_eq!(edges[2].to_id, describe);
        assert!(edges.iter().all(|e| e.is_inferred() && e.confidence < 1.0));
    }

    #[test]
    fn test_function_self_call_is_ignored() {
        let mut graph = UniversalGraph::new();
        add(&mut graph, NodeKind::Function, "helper");
        let mut facts = FactSet::new();
        facts.calls.push(self_call("helper", "self.run"));
        assert!(infer(&graph, &facts, &EnrichmentConfig::default()).is_empty());
    }
}
