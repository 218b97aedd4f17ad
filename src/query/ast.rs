//! Query AST

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;
use serde::Serialize;

use crate::graph::{EdgeType, NodeKind};

/// `MATCH ... [WHERE ...] RETURN ... [ORDER BY ...] [SKIP n] [LIMIT n]`
#[derive(Debug, Clone)]
pub struct Query {
    pub patterns: Vec<Pattern>,
    pub predicate: Option<Expr>,
    pub distinct: bool,
    pub projection: Projection,
    pub order_by: Vec<OrderKey>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    /// Variables in binding order with what they are bound to
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarKind {
    Node,
    Edge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    /// Slot index among variables of the same kind
    pub slot: usize,
}

/// `(n:function|method {name: "x"})`
#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub var: Option<String>,
    /// Binding slot; anonymous nodes get their own slot
    pub slot: usize,
    pub kinds: Vec<NodeKind>,
    /// Inline `{attr: literal}` equality constraints
    pub properties: Vec<(String, Value)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelDirection {
    /// `-->`
    Out,
    /// `<--`
    In,
    /// `--`
    Either,
}

/// `-[e:CALLS|IMPORTS]->`
#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub var: Option<String>,
    pub slot: usize,
    /// Empty matches every type
    pub types: Vec<EdgeType>,
    pub direction: RelDirection,
}

/// A node followed by zero or more relationship hops
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub start: NodePattern,
    pub hops: Vec<(RelPattern, NodePattern)>,
}

/// `var.attr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrRef {
    pub var: String,
    pub attr: String,
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.var, self.attr)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Attr(AttrRef),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    StartsWith,
    EndsWith,
}

/// Boolean predicate tree
#[derive(Debug, Clone)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Matches {
        operand: Operand,
        regex: Regex,
    },
}

impl Expr {
    /// Split a top-level conjunction into its parts
    pub fn conjuncts(self) -> Vec<Expr> {
        match self {
            Expr::And(left, right) => {
                let mut parts = left.conjuncts();
                parts.extend(right.conjuncts());
                parts
            }
            other => vec![other],
        }
    }

    /// Variables referenced anywhere in the expression
    pub fn variables(&self) -> Vec<&str> {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_vars(out);
                r.collect_vars(out);
            }
            Expr::Not(inner) => inner.collect_vars(out),
            Expr::Compare { left, right, .. } => {
                push_var(left, out);
                push_var(right, out);
            }
            Expr::Matches { operand, .. } => push_var(operand, out),
        }
    }
}

fn push_var<'a>(operand: &'a Operand, out: &mut Vec<&'a str>) {
    if let Operand::Attr(attr) = operand {
        if !out.contains(&attr.var.as_str()) {
            out.push(attr.var.as_str());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionItem {
    /// A bound node or edge variable
    Var(String),
    Attr(AttrRef),
}

impl ProjectionItem {
    pub fn column(&self) -> String {
        match self {
            Self::Var(v) => v.clone(),
            Self::Attr(a) => a.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `RETURN *`: every named variable
    All,
    Items(Vec<ProjectionItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub attr: AttrRef,
    pub descending: bool,
}

/// Scalar value of an attribute or literal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Ordering between comparable values; `None` for null or mixed types
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Total order used by ORDER BY: nulls sort last, then by type.
    /// Numbers use `f64::total_cmp`, so NaN extras still have a fixed place.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self
                    .partial_compare(other)
                    .unwrap_or_else(|| self.type_rank().cmp(&other.type_rank())),
            },
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Str(_) => 2,
            Value::Null => 3,
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(n) => serde_json::Value::from(n),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s),
        }
    }
}
