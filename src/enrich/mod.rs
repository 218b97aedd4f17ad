//! Heuristic enrichment passes.
//!
//! Each pass reads the built graph and returns the edges it infers; none of
//! them mutates the graph. The passes are independent, so they run
//! concurrently and their edge sets are inserted afterwards in a fixed
//! order (polymorphism, semantic, logical). Every inferred edge carries
//! `EdgeOrigin::Inferred`, a confidence below 1.0 and evidence text.

pub mod logical;
pub mod polymorphism;
pub mod semantic;

use crate::config::EnrichmentConfig;
use crate::facts::FactSet;
use crate::graph::{GraphEdge, UniversalGraph};

/// Which enrichment passes to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EnrichmentFlags {
    pub polymorphism: bool,
    /// O(n^2) over the candidate pool; off unless requested
    pub semantic: bool,
    pub logical: bool,
}

impl Default for EnrichmentFlags {
    fn default() -> Self {
        Self {
            polymorphism: true,
            semantic: false,
            logical: true,
        }
    }
}

impl EnrichmentFlags {
    pub fn none() -> Self {
        Self {
            polymorphism: false,
            semantic: false,
            logical: false,
        }
    }

    pub fn all() -> Self {
        Self {
            polymorphism: true,
            semantic: true,
            logical: true,
        }
    }
}

/// Edges inferred by each pass, in emission order
#[derive(Debug, Default)]
pub struct InferredEdges {
    pub polymorphism: Vec<GraphEdge>,
    pub semantic: Vec<GraphEdge>,
    pub logical: Vec<GraphEdge>,
}

/// Run the requested passes concurrently against a finished base graph
pub fn infer_all(
    graph: &UniversalGraph,
    facts: &FactSet,
    flags: EnrichmentFlags,
    config: &EnrichmentConfig,
) -> InferredEdges {
    let (polymorphism, (semantic, logical)) = rayon::join(
        || {
            if flags.polymorphism {
                polymorphism::infer(graph, facts, config)
            } else {
                Vec::new()
            }
        },
        || {
            rayon::join(
                || {
                    if flags.semantic {
                        semantic::infer(graph, config)
                    } else {
                        Vec::new()
                    }
                },
                || {
                    if flags.logical {
                        logical::infer(graph)
                    } else {
                        Vec::new()
                    }
                },
            )
        },
    );

    InferredEdges {
        polymorphism,
        semantic,
        logical,
    }
}

/// Split an identifier into lowercase tokens
///
/// Handles camelCase, PascalCase, snake_case, and kebab-case.
pub(crate) fn tokenize_camel_snake(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch == '.' {
            if !current.is_empty() {
                tokens.push(current.to_lowercase());
                current.clear();
            }
        } else if ch.is_uppercase() && !current.is_empty() && !current.chars().all(char::is_uppercase) {
            tokens.push(current.to_lowercase());
            current.clear();
            current.push(ch);
        } else {
            current.push(ch);
        }
    }

    if !current.is_empty() {
        tokens.push(current.to_lowercase());
    }

    tokens
}

/// Jaccard similarity of two token sets; 0.0 when both are empty
pub(crate) fn jaccard<T: Eq + std::hash::Hash>(a: &[T], b: &[T]) -> f64 {
    use std::collections::HashSet;
    let a: HashSet<&T> = a.iter().collect();
    let b: HashSet<&T> = b.iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_camel_snake() {
        assert_eq!(tokenize_camel_snake("handleUserLogin"), vec!["handle", "user", "login"]);
        assert_eq!(tokenize_camel_snake("parse_config_file"), vec!["parse", "config", "file"]);
        assert_eq!(tokenize_camel_snake("HTTPServer"), vec!["httpserver"]);
        assert_eq!(tokenize_camel_snake("_private"), vec!["private"]);
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard(&["a", "b"], &["a", "b"]), 1.0);
        assert_eq!(jaccard(&["a", "b"], &["b", "c"]), 1.0 / 3.0);
        assert_eq!(jaccard::<&str>(&[], &[]), 0.0);
    }
}
