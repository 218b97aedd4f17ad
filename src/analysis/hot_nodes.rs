use serde::Serialize;

use crate::cancel::CancelToken;
use crate::graph::{NodeKind, UniversalGraph};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotNode {
    pub id: String,
    pub display_name: String,
    pub kind: NodeKind,
    pub file_path: String,
    pub in_degree: usize,
    pub out_degree: usize,
    pub degree: usize,
}

/// Top `limit` nodes by `in_degree + out_degree`, ties broken by id.
///
/// Nodes without any edge are never reported. The flag is set when more
/// nodes qualified than were returned or the token fired mid-scan.
pub fn hot_nodes(graph: &UniversalGraph, limit: usize, cancel: &CancelToken) -> (Vec<HotNode>, bool) {
    let mut ranked = Vec::new();
    for node in graph.nodes() {
        if cancel.is_cancelled() {
            return (finish(ranked, limit).0, true);
        }
        let in_degree = graph.in_degree(&node.id);
        let out_degree = graph.out_degree(&node.id);
        if in_degree + out_degree == 0 {
            continue;
        }
        ranked.push(HotNode {
            id: node.id.clone(),
            display_name: node.display_name.clone(),
            kind: node.kind,
            file_path: node.file_path.clone(),
            in_degree,
            out_degree,
            degree: in_degree + out_degree,
        });
    }
    finish(ranked, limit)
}

fn finish(mut ranked: Vec<HotNode>, limit: usize) -> (Vec<HotNode>, bool) {
    ranked.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.id.cmp(&b.id)));
    let truncated = ranked.len() > limit;
    ranked.truncate(limit);
    (ranked, truncated)
}
