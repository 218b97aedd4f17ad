//! Declarative graph queries.
//!
//! ```text
//! MATCH (a:function)-[e:CALLS]->(b)
//! WHERE a.module = "pkg.util" AND e.confidence >= 0.8
//! RETURN a, b.name ORDER BY b.name LIMIT 20
//! ```

pub mod ast;
pub mod exec;
pub mod lexer;
pub mod parser;

pub use exec::QueryResult;
pub use parser::parse;

use crate::error::Result;
use crate::graph::UniversalGraph;
use crate::traversal::RequestContext;

/// Parse and run a query in one step
pub fn execute(graph: &UniversalGraph, text: &str, ctx: &RequestContext) -> Result<QueryResult> {
    let query = parse(text)?;
    let result = exec::execute(graph, &query, ctx);
    tracing::debug!(
        "Query matched {} rows, returned {} (truncated: {})",
        result.matched_rows,
        result.rows.len(),
        result.truncated
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::error::GraphError;
    use crate::graph::{EdgeType, GraphEdge, GraphNode, MetaValue, NodeKind};
    use crate::tier::{Tier, TierLimiter, ToolKind, ToolLimits};
    use serde_json::json;

    struct Fixed(ToolLimits);

    impl TierLimiter for Fixed {
        fn limits_for(&self, _tool: ToolKind, _tier: Tier) -> ToolLimits {
            self.0
        }
    }

    fn func(name: &str) -> String {
        GraphNode::make_id("python", "m", NodeKind::Function, name)
    }

    fn sample() -> UniversalGraph {
        let mut g = UniversalGraph::new();
        for name in ["foo", "bar", "baz"] {
            g.add_node(GraphNode::new("python", "m", NodeKind::Function, name, "m.py", 1));
        }
        let mut run = GraphNode::new("python", "m", NodeKind::Method, "Svc.run", "m.py", 10);
        run.metadata.extras.insert("owner_team".into(), MetaValue::Text("core".into()));
        g.add_node(run);
        g.add_edge(GraphEdge::observed(func("foo"), func("bar"), EdgeType::Calls));
        g.add_edge(GraphEdge::observed(func("bar"), func("baz"), EdgeType::Calls));
        g.add_edge(GraphEdge::observed(
            GraphNode::make_id("python", "m", NodeKind::Method, "Svc.run"),
            func("foo"),
            EdgeType::Calls,
        ));
        g.add_edge(GraphEdge::inferred(func("foo"), func("baz"), EdgeType::SemanticSimilar, 0.6, "names"));
        g
    }

    fn ctx(limiter: &Fixed) -> RequestContext<'_> {
        RequestContext {
            limiter,
            tier: Tier::Community,
            decay: 0.9,
            cancel: CancelToken::new(),
        }
    }

    fn wide() -> Fixed {
        Fixed(ToolLimits::new(3, 100, 20))
    }

    #[test]
    fn test_match_by_name() {
        let g = sample();
        let limiter = wide();
        let result = execute(&g, r#"MATCH (n:function) WHERE n.name = "foo" RETURN n"#, &ctx(&limiter)).unwrap();
        assert_eq!(result.columns, vec!["n"]);
        assert_eq!(result.rows, vec![vec![json!(func("foo"))]]);
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].id, func("foo"));
        assert!(!result.truncated);
    }

    #[test]
    fn test_unknown_attribute_excludes_row() {
        let g = sample();
        let limiter = wide();
        let c = ctx(&limiter);
        let result = execute(&g, r#"MATCH (n:function) WHERE n.owner_team = "core" RETURN n"#, &c).unwrap();
        assert!(result.rows.is_empty());
        let negated = execute(&g, r#"MATCH (n:function) WHERE NOT n.owner_team = "core" RETURN n"#, &c).unwrap();
        assert!(negated.rows.is_empty());
        let either = execute(
            &g,
            r#"MATCH (n:function) WHERE n.owner_team = "core" OR n.name = "foo" RETURN n"#,
            &c,
        )
        .unwrap();
        assert!(either.rows.is_empty());

        let extras = execute(&g, r#"MATCH (n) WHERE n.owner_team = "core" RETURN n.name"#, &c).unwrap();
        assert_eq!(extras.rows, vec![vec![json!("run")]]);
    }

    #[test]
    fn test_expand_and_order() {
        let g = sample();
        let limiter = wide();
        let result = execute(
            &g,
            "MATCH (a)-[e:CALLS]->(b) RETURN a.name, b.name ORDER BY a.name DESC",
            &ctx(&limiter),
        )
        .unwrap();
        assert_eq!(result.columns, vec!["a.name", "b.name"]);
        assert_eq!(
            result.rows,
            vec![
                vec![json!("run"), json!("foo")],
                vec![json!("foo"), json!("bar")],
                vec![json!("bar"), json!("baz")],
            ]
        );
        assert_eq!(result.matched_rows, 3);
    }

    #[test]
    fn test_edge_type_filter_and_edge_attrs() {
        let g = sample();
        let limiter = wide();
        let result = execute(
            &g,
            "MATCH (a)-[e:SEMANTIC_SIMILAR]->(b) WHERE e.confidence < 0.9 RETURN e, e.inferred",
            &ctx(&limiter),
        )
        .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(
            result.rows[0][0],
            json!({"from": func("foo"), "to": func("baz"), "type": "SEMANTIC_SIMILAR"})
        );
        assert_eq!(result.rows[0][1], json!(true));
        assert_eq!(result.edges.len(), 1);
    }

    #[test]
    fn test_edge_bound_once_per_row() {
        let g = sample();
        let limiter = wide();
        let result = execute(&g, r#"MATCH (x {name: "baz"})--(y)--(x) RETURN y"#, &ctx(&limiter)).unwrap();
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_regex_and_string_operators() {
        let g = sample();
        let limiter = wide();
        let c = ctx(&limiter);
        let result = execute(&g, r#"MATCH (n) WHERE n.name =~ "^ba" RETURN n.name ORDER BY n.name"#, &c).unwrap();
        assert_eq!(result.rows, vec![vec![json!("bar")], vec![json!("baz")]]);

        let result = execute(&g, r#"MATCH (n) WHERE n.id ENDS WITH "Svc.run" RETURN n.kind"#, &c).unwrap();
        assert_eq!(result.rows, vec![vec![json!("method")]]);
    }

    #[test]
    fn test_limit_is_clamped_to_tier() {
        let g = sample();
        let limiter = Fixed(ToolLimits::new(3, 2, 5));
        let result = execute(&g, "MATCH (n) RETURN n LIMIT 10", &ctx(&limiter)).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert!(result.truncated);
        assert_eq!(result.limits.nodes.requested, 10);
        assert_eq!(result.limits.nodes.effective, 2);
        assert!(result.limits.nodes.clamped);
    }

    #[test]
    fn test_skip_limit_distinct() {
        let g = sample();
        let limiter = wide();
        let c = ctx(&limiter);
        let result = execute(&g, "MATCH (n) RETURN n.name ORDER BY n.name SKIP 1 LIMIT 2", &c).unwrap();
        assert_eq!(result.rows, vec![vec![json!("baz")], vec![json!("foo")]]);
        assert!(!result.truncated);

        let result = execute(&g, "MATCH (a)-[:CALLS]->(b) RETURN DISTINCT a.kind", &c).unwrap();
        assert_eq!(result.rows.len(), 2);
        let result = execute(&g, "MATCH (a)-[:CALLS]->(b) RETURN DISTINCT b.kind", &c).unwrap();
        assert_eq!(result.rows, vec![vec![json!("function")]]);
        assert_eq!(result.matched_rows, 3);
    }

    #[test]
    fn test_returned_nodes_carry_induced_edges() {
        let g = sample();
        let limiter = wide();
        let result = execute(&g, r#"MATCH (a {name: "foo"})-[:CALLS]->(b) RETURN a, b"#, &ctx(&limiter)).unwrap();
        assert_eq!(result.nodes.len(), 2);
        assert!(result
            .edges
            .iter()
            .any(|e| e.from_id == func("foo") && e.to_id == func("bar")));
    }

    #[test]
    fn test_cancelled_query_is_truncated() {
        let g = sample();
        let limiter = wide();
        let c = ctx(&limiter);
        c.cancel.cancel();
        let result = execute(&g, "MATCH (n) RETURN n", &c).unwrap();
        assert!(result.rows.is_empty());
        assert!(result.truncated);
    }

    #[test]
    fn test_parse_error_surfaces() {
        let g = sample();
        let limiter = wide();
        let err = execute(&g, "MATCH (n RETURN n", &ctx(&limiter)).unwrap_err();
        assert!(matches!(err, GraphError::QueryParse(_)));
    }
}
