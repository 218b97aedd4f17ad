//! Typed, confidence-weighted edges

use serde::{Deserialize, Serialize};

/// Relationship carried by an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Calls,
    Imports,
    Inherits,
    SemanticSimilar,
    LogicalRelated,
}

impl EdgeType {
    pub const ALL: [EdgeType; 5] = [
        EdgeType::Calls,
        EdgeType::Imports,
        EdgeType::Inherits,
        EdgeType::SemanticSimilar,
        EdgeType::LogicalRelated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calls => "CALLS",
            Self::Imports => "IMPORTS",
            Self::Inherits => "INHERITS",
            Self::SemanticSimilar => "SEMANTIC_SIMILAR",
            Self::LogicalRelated => "LOGICAL_RELATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CALLS" => Some(Self::Calls),
            "IMPORTS" => Some(Self::Imports),
            "INHERITS" => Some(Self::Inherits),
            "SEMANTIC_SIMILAR" => Some(Self::SemanticSimilar),
            "LOGICAL_RELATED" => Some(Self::LogicalRelated),
            _ => None,
        }
    }

    /// Edge types only ever produced by heuristic inference
    pub fn is_heuristic_only(&self) -> bool {
        matches!(self, Self::SemanticSimilar | Self::LogicalRelated)
    }
}

/// How an edge came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeOrigin {
    /// Directly observed in source (explicit call, import, base class)
    Observed,
    /// Produced by an enrichment heuristic
    Inferred,
}

/// A directed edge between two existing nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from_id: String,
    pub to_id: String,
    pub edge_type: EdgeType,
    /// Certainty in [0, 1]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    pub origin: EdgeOrigin,
}

impl GraphEdge {
    /// Directly observed relationship at confidence 1.0
    pub fn observed(from_id: impl Into<String>, to_id: impl Into<String>, edge_type: EdgeType) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            edge_type,
            confidence: 1.0,
            evidence: None,
            origin: EdgeOrigin::Observed,
        }
    }

    /// Heuristic relationship; evidence is mandatory
    pub fn inferred(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        edge_type: EdgeType,
        confidence: f64,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            edge_type,
            confidence: clamp_unit(confidence),
            evidence: Some(evidence.into()),
            origin: EdgeOrigin::Inferred,
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    pub fn is_inferred(&self) -> bool {
        self.origin == EdgeOrigin::Inferred
    }

    /// Confidence after `hop` decay steps: `confidence * decay^hop` for
    /// inferred edges. Observed edges never decay.
    pub fn effective_confidence(&self, decay: f64, hop: usize) -> f64 {
        if !self.is_inferred() {
            return self.confidence;
        }
        let decay = clamp_unit(decay);
        let exp = i32::try_from(hop).unwrap_or(i32::MAX);
        self.confidence * decay.powi(exp)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_never_exceeds_base() {
        let edge = GraphEdge::inferred("a", "b", EdgeType::SemanticSimilar, 0.8, "name overlap");
        for hop in 0..10 {
            let eff = edge.effective_confidence(0.9, hop);
            assert!(eff <= edge.confidence);
            assert!((eff - 0.8 * 0.9f64.powi(hop as i32)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_observed_edges_do_not_decay() {
        let edge = GraphEdge::observed("a", "b", EdgeType::Calls);
        for hop in 0..10 {
            assert_eq!(edge.effective_confidence(0.9, hop), 1.0);
        }
    }

    #[test]
    fn test_inferred_confidence_is_clamped() {
        let edge = GraphEdge::inferred("a", "b", EdgeType::LogicalRelated, 1.7, "x");
        assert_eq!(edge.confidence, 1.0);
        let edge = GraphEdge::inferred("a", "b", EdgeType::LogicalRelated, f64::NAN, "x");
        assert_eq!(edge.confidence, 0.0);
    }

    #[test]
    fn test_edge_type_round_trip_names() {
        for ty in EdgeType::ALL {
            assert_eq!(EdgeType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(EdgeType::parse("calls"), Some(EdgeType::Calls));
    }
}
