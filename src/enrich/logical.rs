//! Logical-relationship inference.
//!
//! Three independent patterns, each tagged in the edge evidence:
//! - `test_pair`: `test_parse` -> `parse`, `TestParser` -> `Parser`
//! - `private_helper`: a `_helper` called from exactly one function in its module
//! - `module_sibling`: top-level functions in one module sharing a name token

use std::collections::{BTreeMap, BTreeSet};

use super::tokenize_camel_snake;
use crate::graph::{EdgeType, GraphEdge, GraphNode, NodeKind, UniversalGraph};

pub const TEST_PAIR_CONFIDENCE: f64 = 0.8;
pub const AMBIGUOUS_TEST_PAIR_CONFIDENCE: f64 = 0.5;
pub const PRIVATE_HELPER_CONFIDENCE: f64 = 0.6;
pub const MODULE_SIBLING_CONFIDENCE: f64 = 0.4;

const MAX_TEST_TARGETS: usize = 5;
const MIN_SIBLING_GROUP: usize = 2;
const MAX_SIBLING_GROUP: usize = 6;

/// Name tokens too generic to relate two functions
const TRIVIAL_TOKENS: &[&str] = &[
    "get", "set", "is", "has", "to", "from", "new", "init", "run", "do", "make", "main", "test",
    "tests", "with", "for", "of", "the", "and", "by", "on", "impl", "default", "helper", "util",
];

/// Infer LOGICAL_RELATED edges from naming and call-shape patterns
pub fn infer(graph: &UniversalGraph) -> Vec<GraphEdge> {
    let mut edges = test_pairs(graph);
    edges.extend(private_helpers(graph));
    edges.extend(module_siblings(graph));
    tracing::debug!("Logical pass inferred {} edges", edges.len());
    edges
}

/// Name under test: `test_parse` -> `parse`, `TestParser` -> `Parser`, `testParse` -> `parse`
fn tested_name(node: &GraphNode) -> Option<String> {
    let name = node.short_name();
    if node.kind == NodeKind::Class {
        return name
            .strip_prefix("Test")
            .filter(|rest| rest.starts_with(|c: char| c.is_uppercase()))
            .map(str::to_string);
    }
    if let Some(rest) = name.strip_prefix("test_").filter(|r| !r.is_empty()) {
        return Some(rest.to_string());
    }
    let rest = name.strip_prefix("test")?;
    let mut chars = rest.chars();
    let first = chars.next().filter(|c| c.is_uppercase())?;
    Some(first.to_lowercase().chain(chars).collect())
}

fn test_pairs(graph: &UniversalGraph) -> Vec<GraphEdge> {
    let mut by_name: BTreeMap<(&str, &str), Vec<&GraphNode>> = BTreeMap::new();
    for node in graph.nodes() {
        if matches!(node.kind, NodeKind::Function | NodeKind::Method | NodeKind::Class)
            && tested_name(node).is_none()
        {
            by_name
                .entry((node.language.as_str(), node.short_name()))
                .or_default()
                .push(node);
        }
    }

    let mut edges = Vec::new();
    for test in graph.nodes() {
        let Some(target_name) = tested_name(test) else {
            continue;
        };
        let Some(targets) = by_name.get(&(test.language.as_str(), target_name.as_str())) else {
            continue;
        };
        let mut targets: Vec<&GraphNode> = targets
            .iter()
            .copied()
            .filter(|t| (t.kind == NodeKind::Class) == (test.kind == NodeKind::Class))
            .collect();
        if targets.is_empty() {
            continue;
        }
        targets.sort_by(|a, b| a.id.cmp(&b.id));
        let confidence = if targets.len() == 1 {
            TEST_PAIR_CONFIDENCE
        } else {
            AMBIGUOUS_TEST_PAIR_CONFIDENCE
        };
        for target in targets.into_iter().take(MAX_TEST_TARGETS) {
            edges.push(GraphEdge::inferred(
                test.id.clone(),
                target.id.clone(),
                EdgeType::LogicalRelated,
                confidence,
                format!("test_pair: {} tests {}", test.display_name, target.display_name),
            ));
        }
    }
    edges
}

fn is_private_helper(node: &GraphNode) -> bool {
    let name = node.short_name();
    node.kind.is_callable() && name.starts_with('_') && !(name.starts_with("__") && name.ends_with("__"))
}

fn private_helpers(graph: &UniversalGraph) -> Vec<GraphEdge> {
    let mut edges = Vec::new();
    for helper in graph.nodes().iter().filter(|n| is_private_helper(n)) {
        let callers: BTreeSet<&str> = graph
            .inbound(&helper.id)
            .filter(|e| e.edge_type == EdgeType::Calls && !e.is_inferred())
            .map(|e| e.from_id.as_str())
            .collect();
        if callers.len() != 1 {
            continue;
        }
        let Some(caller) = callers.iter().next().and_then(|id| graph.node(id)) else {
            continue;
        };
        if caller.module_path != helper.module_path || caller.language != helper.language {
            continue;
        }
        edges.push(GraphEdge::inferred(
            caller.id.clone(),
            helper.id.clone(),
            EdgeType::LogicalRelated,
            PRIVATE_HELPER_CONFIDENCE,
            format!(
                "private_helper: {} is only called by {}",
                helper.display_name, caller.display_name
            ),
        ));
    }
    edges
}

fn module_siblings(graph: &UniversalGraph) -> Vec<GraphEdge> {
    // (language, module) -> token -> functions, all in graph order
    let mut groups: BTreeMap<(&str, &str), BTreeMap<String, Vec<&GraphNode>>> = BTreeMap::new();
    for node in graph.nodes().iter().filter(|n| n.kind == NodeKind::Function) {
        let tokens: BTreeSet<String> = tokenize_camel_snake(node.short_name())
            .into_iter()
            .filter(|t| t.len() >= 3 && !TRIVIAL_TOKENS.contains(&t.as_str()))
            .collect();
        let module = groups
            .entry((node.language.as_str(), node.module_path.as_str()))
            .or_default();
        for token in tokens {
            module.entry(token).or_default().push(node);
        }
    }

    let mut edges = Vec::new();
    let mut seen: BTreeSet<(&str, &str)> = BTreeSet::new();
    for ((_, module), tokens) in &groups {
        for (token, members) in tokens {
            if !(MIN_SIBLING_GROUP..=MAX_SIBLING_GROUP).contains(&members.len()) {
                continue;
            }
            for a in members {
                for b in members {
                    if a.id == b.id || !seen.insert((a.id.as_str(), b.id.as_str())) {
                        continue;
                    }
                    edges.push(GraphEdge::inferred(
                        a.id.clone(),
                        b.id.clone(),
                        EdgeType::LogicalRelated,
                        MODULE_SIBLING_CONFIDENCE,
                        format!("module_sibling: share '{}' in {}", token, module),
                    ));
                }
            }
        }
    }
    edges
}
