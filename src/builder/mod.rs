//! Graph construction from a fact snapshot.
//!
//! The build runs in fixed phases: module nodes, symbol nodes, import
//! edges (which also record each file's import scope), call and
//! inheritance edges, then the requested enrichment passes. Every phase is
//! best-effort per fact; nothing in here aborts the build.

mod call_graph;
mod entry_points;
mod import_graph;
mod layers;
mod resolve;

pub use entry_points::detect_entry_point;
pub use import_graph::OmittedImport;
pub use layers::classify_layer;

use serde::Serialize;

use crate::config::EnrichmentConfig;
use crate::enrich::{self, EnrichmentFlags};
use crate::facts::{FactSet, SkippedFile};
use crate::graph::UniversalGraph;
use call_graph::CallGraphStats;
use resolve::SymbolIndex;

/// Edges added by each enrichment pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentCounts {
    pub polymorphism: usize,
    pub semantic: usize,
    pub logical: usize,
}

/// Summary of one graph build
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub skipped_files: Vec<SkippedFile>,
    pub node_count: usize,
    pub edge_count: usize,
    pub module_nodes: usize,
    pub symbol_nodes: usize,
    pub entry_points: usize,
    pub call_edges: usize,
    pub import_edges: usize,
    pub inherit_edges: usize,
    pub unresolved_calls: usize,
    pub omitted_imports: Vec<OmittedImport>,
    pub dropped_edges: usize,
    pub enrichment: EnrichmentCounts,
}

/// Build a graph from extracted facts
pub fn build_graph(
    facts: &FactSet,
    flags: EnrichmentFlags,
    config: &EnrichmentConfig,
) -> (UniversalGraph, BuildReport) {
    let mut graph = UniversalGraph::new();
    let mut index = SymbolIndex::new();
    let mut report = BuildReport {
        skipped_files: facts.skipped.clone(),
        ..Default::default()
    };

    report.module_nodes = import_graph::add_module_nodes(&mut graph, &mut index, facts);

    let mut calls = CallGraphStats::default();
    call_graph::add_symbol_nodes(&mut graph, &mut index, facts, &mut report.skipped_files, &mut calls);

    let imports = import_graph::build(&mut graph, &mut index, facts);
    report.import_edges = imports.import_edges;
    report.omitted_imports = imports.omitted;

    call_graph::add_edges(&mut graph, &index, facts, &mut calls);
    report.symbol_nodes = calls.symbol_nodes;
    report.entry_points = calls.entry_points;
    report.call_edges = calls.call_edges;
    report.inherit_edges = calls.inherit_edges;
    report.unresolved_calls = calls.unresolved_calls;

    let inferred = enrich::infer_all(&graph, facts, flags, config);
    report.enrichment = EnrichmentCounts {
        polymorphism: graph.extend_edges(inferred.polymorphism),
        semantic: graph.extend_edges(inferred.semantic),
        logical: graph.extend_edges(inferred.logical),
    };

    report.node_count = graph.node_count();
    report.edge_count = graph.edge_count();
    report.dropped_edges = graph.dropped_edges();

    tracing::info!(
        "Built graph: {} nodes, {} edges ({} skipped, {} omitted imports, {} unresolved calls)",
        report.node_count,
        report.edge_count,
        report.skipped_files.len(),
        report.omitted_imports.len(),
        report.unresolved_calls
    );

    (graph, report)
}
