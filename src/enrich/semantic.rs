//! Semantic-neighbor inference.
//!
//! Callable nodes are compared pairwise on three signals: name tokens,
//! documentation text and parameter shape. The pool is capped and sorted
//! by id so the O(n^2) comparison is bounded and deterministic.

use rayon::prelude::*;

use super::{jaccard, tokenize_camel_snake};
use crate::config::EnrichmentConfig;
use crate::graph::{EdgeType, GraphEdge, GraphNode, UniversalGraph};

/// Tokens too common in docs to count as overlap
const DOC_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "if", "in", "is", "it", "of",
    "on", "or", "the", "this", "to", "with", "returns", "return",
];

struct Candidate<'a> {
    node: &'a GraphNode,
    name_tokens: Vec<String>,
    bigrams: Vec<(char, char)>,
    doc_tokens: Vec<String>,
}

impl<'a> Candidate<'a> {
    fn new(node: &'a GraphNode) -> Self {
        let short = node.short_name().to_lowercase();
        let chars: Vec<char> = short.chars().filter(|c| c.is_alphanumeric()).collect();
        Self {
            node,
            name_tokens: tokenize_camel_snake(node.short_name()),
            bigrams: chars.windows(2).map(|w| (w[0], w[1])).collect(),
            doc_tokens: node
                .metadata
                .doc
                .as_deref()
                .map(doc_tokens)
                .unwrap_or_default(),
        }
    }
}

/// Component scores for one pair; `None` when a signal is absent on either side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub name: f64,
    pub doc: Option<f64>,
    pub params: Option<f64>,
}

impl Similarity {
    /// Weighted mean over the available components
    pub fn combined(&self, config: &EnrichmentConfig) -> f64 {
        let mut total = config.name_weight * self.name;
        let mut weight = config.name_weight;
        if let Some(doc) = self.doc {
            total += config.doc_weight * doc;
            weight += config.doc_weight;
        }
        if let Some(params) = self.params {
            total += config.param_weight * params;
            weight += config.param_weight;
        }
        if weight <= 0.0 {
            return 0.0;
        }
        (total / weight).clamp(0.0, 1.0)
    }
}

fn doc_tokens(doc: &str) -> Vec<String> {
    doc.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .filter(|t| !DOC_STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Sørensen-Dice coefficient over character bigrams
fn dice(a: &[(char, char)], b: &[(char, char)]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut remaining: Vec<(char, char)> = b.to_vec();
    let mut shared = 0usize;
    for bigram in a {
        if let Some(pos) = remaining.iter().position(|x| x == bigram) {
            remaining.swap_remove(pos);
            shared += 1;
        }
    }
    2.0 * shared as f64 / (a.len() + b.len()) as f64
}

fn param_similarity(a: &[String], b: &[String]) -> Option<f64> {
    if a.is_empty() && b.is_empty() {
        return None;
    }
    let overlap = jaccard(a, b);
    let arity = 1.0 - (a.len().abs_diff(b.len()) as f64 / a.len().max(b.len()) as f64);
    Some((overlap + arity) / 2.0)
}

fn similarity(a: &Candidate, b: &Candidate) -> Similarity {
    let token_sim = jaccard(&a.name_tokens, &b.name_tokens);
    let name = (token_sim + dice(&a.bigrams, &b.bigrams)) / 2.0;
    let doc = (!a.doc_tokens.is_empty() && !b.doc_tokens.is_empty())
        .then(|| jaccard(&a.doc_tokens, &b.doc_tokens));
    Similarity {
        name,
        doc,
        params: param_similarity(&a.node.metadata.params, &b.node.metadata.params),
    }
}

/// Score two nodes directly
pub fn score(a: &GraphNode, b: &GraphNode) -> Similarity {
    similarity(&Candidate::new(a), &Candidate::new(b))
}

/// Infer SEMANTIC_SIMILAR edges (both directions) for pairs at or above the threshold
pub fn infer(graph: &UniversalGraph, config: &EnrichmentConfig) -> Vec<GraphEdge> {
    let mut pool: Vec<&GraphNode> = graph.nodes().iter().filter(|n| n.kind.is_callable()).collect();
    pool.sort_by(|a, b| a.id.cmp(&b.id));
    if pool.len() > config.semantic_pool_cap {
        tracing::debug!(
            "Semantic pool capped at {} of {} candidates",
            config.semantic_pool_cap,
            pool.len()
        );
        pool.truncate(config.semantic_pool_cap);
    }
    let candidates: Vec<Candidate> = pool.into_iter().map(Candidate::new).collect();

    let edges: Vec<GraphEdge> = (0..candidates.len())
        .into_par_iter()
        .map(|i| {
            let a = &candidates[i];
            let mut local = Vec::new();
            for b in &candidates[i + 1..] {
                if a.node.language != b.node.language {
                    continue;
                }
                let sim = similarity(a, b);
                if sim.name <= 0.0 {
                    continue;
                }
                let combined = sim.combined(config);
                if combined < config.semantic_threshold {
                    continue;
                }
                let evidence = format!(
                    "heuristic: semantic similarity {:.2} (name {:.2}, doc {}, params {})",
                    combined,
                    sim.name,
                    fmt_component(sim.doc),
                    fmt_component(sim.params)
                );
                local.push(GraphEdge::inferred(
                    a.node.id.clone(),
                    b.node.id.clone(),
                    EdgeType::SemanticSimilar,
                    combined,
                    evidence.clone(),
                ));
                local.push(GraphEdge::inferred(
                    b.node.id.clone(),
                    a.node.id.clone(),
                    EdgeType::SemanticSimilar,
                    combined,
                    evidence,
                ));
            }
            local
        })
        .collect::<Vec<Vec<GraphEdge>>>()
        .into_iter()
        .flatten()
        .collect();

    tracing::debug!("Semantic pass inferred {} edges", edges.len());
    edges
}

fn fmt_component(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "n/a".to_string())
}
