//! Call-graph builder: one node per function/method/class definition,
//! CALLS edges for call sites that resolve to a known definition and
//! INHERITS edges for resolvable base classes.

use super::entry_points::detect_entry_point;
use super::resolve::SymbolIndex;
use crate::facts::{module_path_for, FactSet, SkippedFile, SymbolFact, SymbolKind};
use crate::graph::{EdgeInsert, EdgeType, GraphEdge, GraphNode, NodeKind, NodeMetadata, UniversalGraph};

/// Counts from one call-graph build
#[derive(Debug, Default)]
pub(crate) struct CallGraphStats {
    pub symbol_nodes: usize,
    pub entry_points: usize,
    pub call_edges: usize,
    pub inherit_edges: usize,
    pub unresolved_calls: usize,
    /// `self.x()` calls left to the polymorphism pass
    pub self_calls: usize,
}

fn symbol_node(fact: &SymbolFact) -> GraphNode {
    let module = module_path_for(&fact.file_path);
    let metadata = NodeMetadata {
        complexity: fact.complexity,
        params: fact.params.clone(),
        doc: fact.doc.clone(),
        decorators: fact.decorators.clone(),
        is_trait_impl: fact.is_trait_impl,
        ..Default::default()
    };
    GraphNode::new(
        &fact.language,
        &module,
        NodeKind::from(fact.kind),
        &fact.qualified_name(),
        &fact.file_path,
        fact.line,
    )
    .with_metadata(metadata)
}

/// Create nodes for every valid symbol; malformed facts are skipped and recorded
pub(crate) fn add_symbol_nodes(
    graph: &mut UniversalGraph,
    index: &mut SymbolIndex,
    facts: &FactSet,
    skipped: &mut Vec<SkippedFile>,
    stats: &mut CallGraphStats,
) {
    for fact in &facts.symbols {
        if let Err(reason) = fact.validate() {
            tracing::warn!("Skipping symbol fact in {}: {}", fact.file_path, reason);
            skipped.push(SkippedFile {
                path: fact.file_path.clone(),
                reason,
            });
            continue;
        }

        let mut node = symbol_node(fact);
        if let Some(reason) = detect_entry_point(fact) {
            node.metadata.is_entry_point = true;
            node.metadata.entry_reason = Some(reason.to_string());
        }
        let is_entry = node.metadata.is_entry_point;

        index.add_symbol(fact);
        if graph.add_node(node).1 {
            stats.symbol_nodes += 1;
            if is_entry {
                stats.entry_points += 1;
            }
        }
    }
}

/// Add CALLS and INHERITS edges for resolvable references
pub(crate) fn add_edges(
    graph: &mut UniversalGraph,
    index: &SymbolIndex,
    facts: &FactSet,
    stats: &mut CallGraphStats,
) {
    for call in &facts.calls {
        let Some(caller) = call.caller.as_deref() else {
            continue;
        };
        if call.self_target().is_some() {
            stats.self_calls += 1;
            continue;
        }

        let module = module_path_for(&call.file_path);
        let Some(caller_id) = index.lookup(&call.language, &module, caller) else {
            stats.unresolved_calls += 1;
            continue;
        };

        let Some(mut target) = index.resolve(&call.language, &call.file_path, &call.callee) else {
            stats.unresolved_calls += 1;
            continue;
        };
        if let Some(ctor) = index.constructor_for(&target) {
            target = ctor.to_string();
        }

        let edge = GraphEdge::observed(caller_id.to_string(), target, EdgeType::Calls)
            .with_evidence(format!("call at line {}", call.line));
        if matches!(graph.add_edge(edge), EdgeInsert::Inserted(_)) {
            stats.call_edges += 1;
        }
    }

    for class in facts
        .symbols
        .iter()
        .filter(|s| s.kind == SymbolKind::Class && !s.bases.is_empty())
    {
        let module = module_path_for(&class.file_path);
        let Some(class_id) = index.lookup(&class.language, &module, &class.name) else {
            continue;
        };
        for base in &class.bases {
            let Some(base_id) = index.resolve(&class.language, &class.file_path, base) else {
                continue;
            };
            let is_class = graph
                .node(&base_id)
                .map(|n| n.kind == NodeKind::Class)
                .unwrap_or(false);
            if !is_class || base_id == class_id {
                continue;
            }
            let edge = GraphEdge::observed(class_id.to_string(), base_id, EdgeType::Inherits)
                .with_evidence(format!("{} extends {}", class.name, base));
            if matches!(graph.add_edge(edge), EdgeInsert::Inserted(_)) {
                stats.inherit_edges += 1;
            }
        }
    }

    if stats.unresolved_calls > 0 {
        tracing::debug!(
            "{} call sites did not resolve to a known definition",
            stats.unresolved_calls
        );
    }
}
