use serde::Serialize;

use super::is_direct;
use crate::builder::classify_layer;
use crate::cancel::CancelToken;
use crate::graph::{EdgeType, GraphNode, Layer, UniversalGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// Presentation reaching the data layer without going through domain
    LayerSkip,
    /// A lower layer depending on a higher one
    UpwardDependency,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerViolation {
    pub from_id: String,
    pub to_id: String,
    pub edge_type: EdgeType,
    pub from_layer: Layer,
    pub to_layer: Layer,
    pub violation: ViolationType,
    pub remediation: String,
}

/// Check every directly observed IMPORTS and CALLS edge against the
/// presentation > domain > data ordering. Nodes of unknown layer never
/// violate anything.
pub fn layer_violations(graph: &UniversalGraph, cancel: &CancelToken) -> (Vec<LayerViolation>, bool) {
    let mut violations = Vec::new();
    for edge in graph.edges() {
        if cancel.is_cancelled() {
            return (violations, true);
        }
        if !is_direct(edge, EdgeType::Imports) && !is_direct(edge, EdgeType::Calls) {
            continue;
        }
        let (Some(from), Some(to)) = (graph.node(&edge.from_id), graph.node(&edge.to_id)) else {
            continue;
        };
        let (from_layer, to_layer) = (layer_of(from), layer_of(to));
        let Some(violation) = classify(from_layer, to_layer) else {
            continue;
        };
        violations.push(LayerViolation {
            from_id: edge.from_id.clone(),
            to_id: edge.to_id.clone(),
            edge_type: edge.edge_type,
            from_layer,
            to_layer,
            violation,
            remediation: remediation(violation, from, to, to_layer),
        });
    }
    (violations, false)
}

/// Module nodes carry their layer; symbols inherit the layer of their file
fn layer_of(node: &GraphNode) -> Layer {
    node.metadata
        .layer
        .unwrap_or_else(|| classify_layer(&node.file_path))
}

fn classify(from: Layer, to: Layer) -> Option<ViolationType> {
    let (Some(from_rank), Some(to_rank)) = (from.rank(), to.rank()) else {
        return None;
    };
    if from == Layer::Presentation && to == Layer::Data {
        return Some(ViolationType::LayerSkip);
    }
    if from_rank > to_rank {
        return Some(ViolationType::UpwardDependency);
    }
    None
}

fn remediation(violation: ViolationType, from: &GraphNode, to: &GraphNode, to_layer: Layer) -> String {
    match violation {
        ViolationType::LayerSkip => format!(
            "Route {} through a domain-layer service instead of reaching {} directly",
            from.display_name, to.display_name
        ),
        ViolationType::UpwardDependency => format!(
            "Invert the dependency: move what {} needs from the {} layer down, or have {} depend on an abstraction it owns",
            from.display_name,
            to_layer.as_str(),
            from.display_name
        ),
    }
}
