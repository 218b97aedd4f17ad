//! Query execution over a built graph.
//!
//! Patterns compile to a sequence of steps: a scan binds a pattern's first
//! node, each hop expands along the adjacency index of the node bound
//! before it. WHERE conjuncts are attached to the earliest step at which all
//! of their variables are bound, so failing bindings are pruned before any
//! deeper expansion. A comparison with a missing attribute is unknown, and an
//! unknown anywhere in a predicate makes the whole predicate fail for that
//! row, regardless of AND, OR or NOT around it.

use std::cmp::Ordering;
use std::collections::HashMap;

use ahash::AHashSet;
use serde::Serialize;

use super::ast::*;
use crate::graph::{GraphEdge, GraphNode, Layer, MetaValue, UniversalGraph};
use crate::tier::{AppliedLimits, Clamped, ToolKind};
use crate::traversal::RequestContext;

// ============================================================================
// Result types
// ============================================================================

/// Rows and the sub-graph they reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    /// Distinct nodes bound to returned variables, in row order
    pub nodes: Vec<GraphNode>,
    /// Returned edge variables, or the edges induced by `nodes` when none are returned
    pub edges: Vec<GraphEdge>,
    /// Rows that matched before SKIP/LIMIT/caps
    pub matched_rows: usize,
    pub truncated: bool,
    pub limits: AppliedLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Row {
    nodes: Vec<Option<usize>>,
    edges: Vec<Option<usize>>,
}

enum Step<'q> {
    Scan(&'q NodePattern),
    Expand {
        from: usize,
        rel: &'q RelPattern,
        to: &'q NodePattern,
    },
}

enum Flow {
    Continue,
    Stop,
}

struct Executor<'a, 'q> {
    graph: &'a UniversalGraph,
    query: &'q Query,
    ctx: &'a RequestContext<'a>,
    steps: Vec<Step<'q>>,
    /// Conjuncts to evaluate right after each step
    checks: Vec<Vec<Expr>>,
    rows: Vec<Row>,
    cancelled: bool,
}

// ============================================================================
// Planning
// ============================================================================

/// Execute a parsed query
pub fn execute(graph: &UniversalGraph, query: &Query, ctx: &RequestContext) -> QueryResult {
    let mut steps = Vec::new();
    let mut node_slots = 0;
    let mut edge_slots = 0;
    for pattern in &query.patterns {
        steps.push(Step::Scan(&pattern.start));
        node_slots = node_slots.max(pattern.start.slot + 1);
        let mut from = pattern.start.slot;
        for (rel, to) in &pattern.hops {
            steps.push(Step::Expand { from, rel, to });
            node_slots = node_slots.max(to.slot + 1);
            edge_slots = edge_slots.max(rel.slot + 1);
            from = to.slot;
        }
    }

    let mut checks: Vec<Vec<Expr>> = vec![Vec::new(); steps.len()];
    if let Some(predicate) = query.predicate.clone() {
        let bound_at = binding_steps(&steps, query);
        for conjunct in predicate.conjuncts() {
            let at = conjunct
                .variables()
                .iter()
                .filter_map(|v| bound_at.get(*v).copied())
                .max()
                .unwrap_or(0);
            if let Some(slot) = checks.get_mut(at) {
                slot.push(conjunct);
            }
        }
    }

    let mut executor = Executor {
        graph,
        query,
        ctx,
        steps,
        checks,
        rows: Vec::new(),
        cancelled: false,
    };
    let mut row = Row {
        nodes: vec![None; node_slots],
        edges: vec![None; edge_slots],
    };
    executor.run(0, &mut row);
    if executor.cancelled {
        tracing::debug!("Query cancelled after {} rows", executor.rows.len());
    }
    executor.finish()
}

/// Step index at which each named variable is first bound
fn binding_steps<'q>(steps: &[Step<'q>], query: &'q Query) -> HashMap<&'q str, usize> {
    let mut bound_at: HashMap<&str, usize> = HashMap::new();
    for (i, step) in steps.iter().enumerate() {
        let (rel, node) = match step {
            Step::Scan(node) => (None, *node),
            Step::Expand { rel, to, .. } => (Some(*rel), *to),
        };
        for var in rel.and_then(|r| r.var.as_deref()).into_iter().chain(node.var.as_deref()) {
            bound_at.entry(var).or_insert(i);
        }
    }
    // every WHERE variable is validated by the parser, this only guards the map
    for var in &query.variables {
        bound_at.entry(var.name.as_str()).or_insert(0);
    }
    bound_at
}

// ============================================================================
// Execution
// ============================================================================

impl<'a, 'q> Executor<'a, 'q> {
    fn run(&mut self, step: usize, row: &mut Row) -> Flow {
        if step == self.steps.len() {
            self.rows.push(row.clone());
            return Flow::Continue;
        }

        match self.steps[step] {
            Step::Scan(node) => {
                if let Some(bound) = row.nodes[node.slot] {
                    if self.node_matches(node, bound) && self.checks_pass(step, row) {
                        return self.run(step + 1, row);
                    }
                    return Flow::Continue;
                }
                for idx in 0..self.graph.node_count() {
                    if self.ctx.cancel.is_cancelled() {
                        self.cancelled = true;
                        return Flow::Stop;
                    }
                    if !self.node_matches(node, idx) {
                        continue;
                    }
                    row.nodes[node.slot] = Some(idx);
                    let flow = if self.checks_pass(step, row) {
                        self.run(step + 1, row)
                    } else {
                        Flow::Continue
                    };
                    row.nodes[node.slot] = None;
                    if let Flow::Stop = flow {
                        return Flow::Stop;
                    }
                }
                Flow::Continue
            }
            Step::Expand { from, rel, to } => {
                let Some(from_idx) = row.nodes[from] else {
                    return Flow::Continue;
                };
                for (pos, next) in self.expansions(from_idx, rel) {
                    if self.ctx.cancel.is_cancelled() {
                        self.cancelled = true;
                        return Flow::Stop;
                    }
                    match row.edges[rel.slot] {
                        Some(bound) if bound != pos => continue,
                        Some(_) => {}
                        None if row.edges.contains(&Some(pos)) => continue,
                        None => {}
                    }
                    match row.nodes[to.slot] {
                        Some(bound) if bound != next => continue,
                        _ => {}
                    }
                    if !self.node_matches(to, next) {
                        continue;
                    }

                    let set_edge = row.edges[rel.slot].is_none();
                    let set_node = row.nodes[to.slot].is_none();
                    row.edges[rel.slot] = Some(pos);
                    row.nodes[to.slot] = Some(next);
                    let flow = if self.checks_pass(step, row) {
                        self.run(step + 1, row)
                    } else {
                        Flow::Continue
                    };
                    if set_edge {
                        row.edges[rel.slot] = None;
                    }
                    if set_node {
                        row.nodes[to.slot] = None;
                    }
                    if let Flow::Stop = flow {
                        return Flow::Stop;
                    }
                }
                Flow::Continue
            }
        }
    }

    /// (edge position, neighbor index) pairs for one hop, insertion-ordered
    fn expansions(&self, idx: usize, rel: &RelPattern) -> Vec<(usize, usize)> {
        let graph = self.graph;
        let allowed = |pos: usize| rel.types.is_empty() || rel.types.contains(&graph.edge_at(pos).edge_type);
        let mut out = Vec::new();
        if matches!(rel.direction, RelDirection::Out | RelDirection::Either) {
            for &pos in graph.out_edge_positions(idx) {
                if allowed(pos) {
                    if let Some(to) = graph.node_index(&graph.edge_at(pos).to_id) {
                        out.push((pos, to));
                    }
                }
            }
        }
        if matches!(rel.direction, RelDirection::In | RelDirection::Either) {
            for &pos in graph.in_edge_positions(idx) {
                if !allowed(pos) {
                    continue;
                }
                let edge = graph.edge_at(pos);
                // a self-loop was already produced by the outbound pass
                if rel.direction == RelDirection::Either && edge.from_id == edge.to_id {
                    continue;
                }
                if let Some(from) = graph.node_index(&edge.from_id) {
                    out.push((pos, from));
                }
            }
        }
        out
    }

    fn node_matches(&self, pattern: &NodePattern, idx: usize) -> bool {
        let node = self.graph.node_at(idx);
        if !pattern.kinds.is_empty() && !pattern.kinds.contains(&node.kind) {
            return false;
        }
        pattern.properties.iter().all(|(attr, expected)| {
            let actual = node_attr(self.graph, node, attr);
            compare(&actual, CompareOp::Eq, expected) == Some(true)
        })
    }

    fn checks_pass(&self, step: usize, row: &Row) -> bool {
        self.checks[step]
            .iter()
            .all(|expr| self.eval(expr, row) == Some(true))
    }

    fn eval(&self, expr: &Expr, row: &Row) -> Option<bool> {
        match expr {
            // unknown absorbs: a predicate touching a missing attribute never holds
            Expr::And(l, r) => {
                let left = self.eval(l, row)?;
                let right = self.eval(r, row)?;
                Some(left && right)
            }
            Expr::Or(l, r) => {
                let left = self.eval(l, row)?;
                let right = self.eval(r, row)?;
                Some(left || right)
            }
            Expr::Not(inner) => self.eval(inner, row).map(|b| !b),
            Expr::Compare { left, op, right } => {
                compare(&self.operand(left, row), *op, &self.operand(right, row))
            }
            Expr::Matches { operand, regex } => match self.operand(operand, row) {
                Value::Str(s) => Some(regex.is_match(&s)),
                _ => None,
            },
        }
    }

    fn operand(&self, operand: &Operand, row: &Row) -> Value {
        match operand {
            Operand::Literal(value) => value.clone(),
            Operand::Attr(attr) => self.attr(attr, row),
        }
    }

    fn attr(&self, attr: &AttrRef, row: &Row) -> Value {
        let Some(var) = self.query.variables.iter().find(|v| v.name == attr.var) else {
            return Value::Null;
        };
        match var.kind {
            VarKind::Node => row.nodes[var.slot]
                .map(|idx| node_attr(self.graph, self.graph.node_at(idx), &attr.attr))
                .unwrap_or(Value::Null),
            VarKind::Edge => row.edges[var.slot]
                .map(|pos| edge_attr(self.graph.edge_at(pos), &attr.attr))
                .unwrap_or(Value::Null),
        }
    }

    fn projection_items(&self) -> Vec<ProjectionItem> {
        match &self.query.projection {
            Projection::All => self
                .query
                .variables
                .iter()
                .map(|v| ProjectionItem::Var(v.name.clone()))
                .collect(),
            Projection::Items(items) => items.clone(),
        }
    }

    fn project(&self, items: &[ProjectionItem], row: &Row) -> Vec<serde_json::Value> {
        items
            .iter()
            .map(|item| match item {
                ProjectionItem::Attr(attr) => self.attr(attr, row).into(),
                ProjectionItem::Var(name) => {
                    let Some(var) = self.query.variables.iter().find(|v| &v.name == name) else {
                        return serde_json::Value::Null;
                    };
                    match var.kind {
                        VarKind::Node => row.nodes[var.slot]
                            .map(|idx| serde_json::Value::String(self.graph.node_at(idx).id.clone()))
                            .unwrap_or(serde_json::Value::Null),
                        VarKind::Edge => row.edges[var.slot]
                            .map(|pos| {
                                let edge = self.graph.edge_at(pos);
                                serde_json::json!({
                                    "from": edge.from_id,
                                    "to": edge.to_id,
                                    "type": edge.edge_type.as_str(),
                                })
                            })
                            .unwrap_or(serde_json::Value::Null),
                    }
                }
            })
            .collect()
    }

    fn finish(mut self) -> QueryResult {
        let mut rows = std::mem::take(&mut self.rows);
        let matched_rows = rows.len();

        if !self.query.order_by.is_empty() {
            let keys: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| self.query.order_by.iter().map(|k| self.attr(&k.attr, row)).collect())
                .collect();
            let mut order: Vec<usize> = (0..rows.len()).collect();
            order.sort_by(|&a, &b| {
                for (i, key) in self.query.order_by.iter().enumerate() {
                    let ord = keys[a][i].sort_cmp(&keys[b][i]);
                    let ord = if key.descending { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
            let mut slots: Vec<Option<Row>> = rows.into_iter().map(Some).collect();
            rows = order.into_iter().filter_map(|i| slots[i].take()).collect();
        }

        let items = self.projection_items();
        let mut projected: Vec<(Row, Vec<serde_json::Value>)> = rows
            .into_iter()
            .map(|row| {
                let values = self.project(&items, &row);
                (row, values)
            })
            .collect();
        if self.query.distinct {
            let mut seen: AHashSet<String> = AHashSet::with_capacity(projected.len());
            projected.retain(|(_, values)| seen.insert(distinct_key(values)));
        }

        let skip = self.query.skip.unwrap_or(0);
        let mut page: Vec<(Row, Vec<serde_json::Value>)> = projected.into_iter().skip(skip).collect();
        if let Some(limit) = self.query.limit {
            page.truncate(limit);
        }

        let caps = self.ctx.limiter.limits_for(ToolKind::Query, self.ctx.tier);
        let nodes_cap = match self.query.limit {
            Some(limit) => Clamped::apply(limit, caps.max_nodes),
            None => Clamped::cap_only(caps.max_nodes),
        };
        let mut truncated = self.cancelled;
        if page.len() > nodes_cap.effective {
            page.truncate(nodes_cap.effective);
            truncated = true;
        }

        let (nodes, edges) = self.collect_subgraph(&items, &page);
        QueryResult {
            columns: items.iter().map(ProjectionItem::column).collect(),
            rows: page.into_iter().map(|(_, values)| values).collect(),
            nodes,
            edges,
            matched_rows,
            truncated,
            limits: AppliedLimits {
                tier: self.ctx.tier,
                tool: ToolKind::Query,
                depth: Clamped::cap_only(caps.max_depth),
                nodes: nodes_cap,
                chains: None,
            },
        }
    }

    fn collect_subgraph(
        &self,
        items: &[ProjectionItem],
        page: &[(Row, Vec<serde_json::Value>)],
    ) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let vars: Vec<&Variable> = items
            .iter()
            .filter_map(|item| {
                let name = match item {
                    ProjectionItem::Var(name) => name,
                    ProjectionItem::Attr(attr) => &attr.var,
                };
                self.query.variables.iter().find(|v| &v.name == name)
            })
            .collect();

        let mut node_seen = vec![false; self.graph.node_count()];
        let mut node_order = Vec::new();
        let mut edge_positions = Vec::new();
        let edge_vars = vars.iter().any(|v| v.kind == VarKind::Edge);

        for (row, _) in page {
            for var in &vars {
                match var.kind {
                    VarKind::Node => {
                        if let Some(idx) = row.nodes[var.slot] {
                            if !node_seen[idx] {
                                node_seen[idx] = true;
                                node_order.push(idx);
                            }
                        }
                    }
                    VarKind::Edge => {
                        if let Some(pos) = row.edges[var.slot] {
                            if !edge_positions.contains(&pos) {
                                edge_positions.push(pos);
                            }
                        }
                    }
                }
            }
        }

        if edge_vars {
            let nodes = node_order.iter().map(|&i| self.graph.node_at(i).clone()).collect();
            let edges = edge_positions
                .iter()
                .map(|&pos| self.graph.edge_at(pos).clone())
                .collect();
            return (nodes, edges);
        }
        let sub = self
            .graph
            .induced_subgraph(node_order.iter().map(|&i| self.graph.node_at(i).id.as_str()));
        (sub.nodes, sub.edges)
    }
}

// ============================================================================
// Value helpers
// ============================================================================

/// Compare two values; `None` when either side is null or the operator does not apply
fn compare(left: &Value, op: CompareOp, right: &Value) -> Option<bool> {
    if matches!(left, Value::Null) || matches!(right, Value::Null) {
        return None;
    }
    match op {
        CompareOp::Eq => Some(left.partial_compare(right) == Some(Ordering::Equal)),
        CompareOp::Ne => Some(left.partial_compare(right) != Some(Ordering::Equal)),
        CompareOp::Lt => left.partial_compare(right).map(|o| o == Ordering::Less),
        CompareOp::Le => left.partial_compare(right).map(|o| o != Ordering::Greater),
        CompareOp::Gt => left.partial_compare(right).map(|o| o == Ordering::Greater),
        CompareOp::Ge => left.partial_compare(right).map(|o| o != Ordering::Less),
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => match (left, right) {
            (Value::Str(haystack), Value::Str(needle)) => Some(match op {
                CompareOp::Contains => haystack.contains(needle.as_str()),
                CompareOp::StartsWith => haystack.starts_with(needle.as_str()),
                _ => haystack.ends_with(needle.as_str()),
            }),
            _ => None,
        },
    }
}

fn opt_str(value: Option<&str>) -> Value {
    value.map(|s| Value::Str(s.to_string())).unwrap_or(Value::Null)
}

/// Hashable identity of a projected row for DISTINCT
fn distinct_key(values: &[serde_json::Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

// ============================================================================
// Attribute lookup
// ============================================================================

/// Attribute of a node; unknown attributes are null
pub fn node_attr(graph: &UniversalGraph, node: &GraphNode, attr: &str) -> Value {
    let meta = &node.metadata;
    match attr {
        "id" => Value::Str(node.id.clone()),
        "name" => Value::Str(node.short_name().to_string()),
        "display_name" => Value::Str(node.display_name.clone()),
        "kind" => Value::Str(node.kind.as_str().to_string()),
        "file" | "file_path" => Value::Str(node.file_path.clone()),
        "line" | "line_number" => Value::Int(node.line_number as i64),
        "language" => Value::Str(node.language.clone()),
        "module" | "module_path" => Value::Str(node.module_path.clone()),
        "class" | "owner" => opt_str(node.owner_class()),
        "in_degree" => Value::Int(graph.in_degree(&node.id) as i64),
        "out_degree" => Value::Int(graph.out_degree(&node.id) as i64),
        "complexity" => meta
            .complexity
            .map(|c| Value::Int(c as i64))
            .unwrap_or(Value::Null),
        "is_entry_point" => Value::Bool(meta.is_entry_point),
        "entry_reason" => opt_str(meta.entry_reason.as_deref()),
        "layer" => opt_str(meta.layer.as_ref().map(Layer::as_str)),
        "doc" => opt_str(meta.doc.as_deref()),
        "param_count" => Value::Int(meta.params.len() as i64),
        "is_trait_impl" => Value::Bool(meta.is_trait_impl),
        other => match meta.extras.get(other) {
            Some(MetaValue::Bool(b)) => Value::Bool(*b),
            Some(MetaValue::Int(n)) => Value::Int(*n),
            Some(MetaValue::Float(f)) => Value::Float(*f),
            Some(MetaValue::Text(s)) => Value::Str(s.clone()),
            None => Value::Null,
        },
    }
}

/// Attribute of an edge; unknown attributes are null
pub fn edge_attr(edge: &GraphEdge, attr: &str) -> Value {
    match attr {
        "type" | "edge_type" => Value::Str(edge.edge_type.as_str().to_string()),
        "confidence" => Value::Float(edge.confidence),
        "evidence" => opt_str(edge.evidence.as_deref()),
        "from" | "from_id" => Value::Str(edge.from_id.clone()),
        "to" | "to_id" => Value::Str(edge.to_id.clone()),
        "inferred" => Value::Bool(edge.is_inferred()),
        "heuristic" => Value::Bool(edge.edge_type.is_heuristic_only() || edge.is_inferred()),
        _ => Value::Null,
    }
}
