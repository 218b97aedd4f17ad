//! Recursive-descent parser producing a [`Query`] AST.
//!
//! ```text
//! query      := MATCH pattern (',' pattern)* [WHERE expr]
//!               RETURN [DISTINCT] ('*' | item (',' item)*)
//!               [ORDER BY key (',' key)*] [SKIP int] [LIMIT int]
//! pattern    := node (rel node)*
//! node       := '(' [var] [':' kind ('|' kind)*] ['{' prop (',' prop)* '}'] ')'
//! rel        := '-' ['[' [var] [':' type ('|' type)*] ']'] '-' ['>']
//!             | '<' '-' ['[' ... ']'] '-'
//! expr       := and (OR and)*
//! and        := not (AND not)*
//! not        := NOT not | '(' expr ')' | comparison
//! comparison := operand op operand | operand ('=~' | MATCHES) string
//! ```

use regex::Regex;

use super::ast::*;
use super::lexer::{tokenize, Token, TokenKind};
use crate::error::QueryParseError;
use crate::graph::{EdgeType, NodeKind};

/// Parse query text into an AST, failing at the first unexpected token
pub fn parse(input: &str) -> Result<Query, QueryParseError> {
    let tokens = tokenize(input)?;
    Parser {
        tokens,
        pos: 0,
        variables: Vec::new(),
        node_slots: 0,
        edge_slots: 0,
    }
    .query()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    variables: Vec<Variable>,
    node_slots: usize,
    edge_slots: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends with Eof, and pos never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, expected: impl Into<String>) -> QueryParseError {
        let token = self.peek();
        QueryParseError::new(token.position, expected, token.kind.describe())
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Ident(word) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), QueryParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(keyword))
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), QueryParseError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(kind.describe()))
        }
    }

    fn ident(&mut self, expected: &str) -> Result<(String, usize), QueryParseError> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                let position = self.advance().position;
                Ok((name, position))
            }
            _ => Err(self.error(expected)),
        }
    }

    fn int(&mut self, expected: &str) -> Result<usize, QueryParseError> {
        match *self.peek_kind() {
            TokenKind::Int(n) if n >= 0 => {
                self.advance();
                Ok(n as usize)
            }
            _ => Err(self.error(expected)),
        }
    }

    fn query(mut self) -> Result<Query, QueryParseError> {
        self.expect_keyword("MATCH")?;
        let mut patterns = vec![self.pattern()?];
        while self.eat(&TokenKind::Comma) {
            patterns.push(self.pattern()?);
        }

        let predicate = if self.eat_keyword("WHERE") {
            Some(self.expr()?)
        } else {
            None
        };

        self.expect_keyword("RETURN")?;
        let distinct = self.eat_keyword("DISTINCT");
        let projection = if self.eat(&TokenKind::Star) {
            Projection::All
        } else {
            let mut items = vec![self.projection_item()?];
            while self.eat(&TokenKind::Comma) {
                items.push(self.projection_item()?);
            }
            Projection::Items(items)
        };

        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let attr = self.attr_ref()?;
                let descending = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                order_by.push(OrderKey { attr, descending });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let mut skip = None;
        let mut limit = None;
        loop {
            if skip.is_none() && self.eat_keyword("SKIP") {
                skip = Some(self.int("non-negative integer after SKIP")?);
            } else if limit.is_none() && self.eat_keyword("LIMIT") {
                limit = Some(self.int("non-negative integer after LIMIT")?);
            } else {
                break;
            }
        }

        if *self.peek_kind() != TokenKind::Eof {
            return Err(self.error("end of query"));
        }

        Ok(Query {
            patterns,
            predicate,
            distinct,
            projection,
            order_by,
            skip,
            limit,
            variables: self.variables,
        })
    }

    fn bind(&mut self, name: Option<String>, kind: VarKind, position: usize) -> Result<usize, QueryParseError> {
        let Some(name) = name else {
            return Ok(self.fresh_slot(&kind));
        };
        if let Some(existing) = self.variables.iter().find(|v| v.name == name) {
            if existing.kind != kind {
                let expected = match kind {
                    VarKind::Node => "a variable not already bound to a relationship",
                    VarKind::Edge => "a variable not already bound to a node",
                };
                return Err(QueryParseError::new(position, expected, format!("'{}'", name)));
            }
            return Ok(existing.slot);
        }
        let slot = self.fresh_slot(&kind);
        self.variables.push(Variable { name, kind, slot });
        Ok(slot)
    }

    fn fresh_slot(&mut self, kind: &VarKind) -> usize {
        let counter = match kind {
            VarKind::Node => &mut self.node_slots,
            VarKind::Edge => &mut self.edge_slots,
        };
        *counter += 1;
        *counter - 1
    }

    fn pattern(&mut self) -> Result<Pattern, QueryParseError> {
        let start = self.node_pattern()?;
        let mut hops = Vec::new();
        while matches!(self.peek_kind(), TokenKind::Dash | TokenKind::Lt) {
            let rel = self.rel_pattern()?;
            let node = self.node_pattern()?;
            hops.push((rel, node));
        }
        Ok(Pattern { start, hops })
    }

    fn node_pattern(&mut self) -> Result<NodePattern, QueryParseError> {
        self.expect(TokenKind::LParen)?;

        let position = self.peek().position;
        let var = match self.peek_kind() {
            TokenKind::Ident(_) => Some(self.ident("variable")?.0),
            _ => None,
        };

        let mut kinds = Vec::new();
        if self.eat(&TokenKind::Colon) {
            loop {
                let (label, _) = self.ident("node kind")?;
                match NodeKind::parse(&label) {
                    Some(kind) => kinds.push(kind),
                    None => {
                        self.pos -= 1;
                        return Err(self.error("node kind (function, method, class, module, file)"));
                    }
                }
                if !self.eat(&TokenKind::Pipe) {
                    break;
                }
            }
        }

        let mut properties = Vec::new();
        if self.eat(&TokenKind::LBrace) {
            loop {
                let (key, _) = self.ident("property name")?;
                self.expect(TokenKind::Colon)?;
                properties.push((key, self.literal()?));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBrace)?;
        }

        self.expect(TokenKind::RParen)?;
        let slot = self.bind(var.clone(), VarKind::Node, position)?;
        Ok(NodePattern {
            var,
            slot,
            kinds,
            properties,
        })
    }

    fn rel_pattern(&mut self) -> Result<RelPattern, QueryParseError> {
        let left = self.eat(&TokenKind::Lt);
        self.expect(TokenKind::Dash)?;

        let position = self.peek().position;
        let mut var = None;
        let mut types = Vec::new();
        if self.eat(&TokenKind::LBracket) {
            if let TokenKind::Ident(_) = self.peek_kind() {
                var = Some(self.ident("variable")?.0);
            }
            if self.eat(&TokenKind::Colon) {
                loop {
                    let (label, _) = self.ident("edge type")?;
                    match EdgeType::parse(&label) {
                        Some(edge_type) => types.push(edge_type),
                        None => {
                            self.pos -= 1;
                            return Err(self.error(
                                "edge type (CALLS, IMPORTS, INHERITS, SEMANTIC_SIMILAR, LOGICAL_RELATED)",
                            ));
                        }
                    }
                    if !self.eat(&TokenKind::Pipe) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RBracket)?;
        }
        self.expect(TokenKind::Dash)?;

        let right = if !left && self.eat(&TokenKind::Gt) {
            true
        } else if left && *self.peek_kind() == TokenKind::Gt {
            return Err(self.error("'(' (a relationship has a single direction)"));
        } else {
            false
        };

        let direction = match (left, right) {
            (true, _) => RelDirection::In,
            (false, true) => RelDirection::Out,
            (false, false) => RelDirection::Either,
        };
        let slot = self.bind(var.clone(), VarKind::Edge, position)?;
        Ok(RelPattern {
            var,
            slot,
            types,
            direction,
        })
    }

    fn expr(&mut self) -> Result<Expr, QueryParseError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("OR") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, QueryParseError> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("AND") {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, QueryParseError> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        if self.eat(&TokenKind::LParen) {
            let inner = self.expr()?;
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, QueryParseError> {
        let left = self.operand()?;

        let op = match self.peek_kind() {
            TokenKind::Eq => Some(CompareOp::Eq),
            TokenKind::Ne => Some(CompareOp::Ne),
            TokenKind::Lt => Some(CompareOp::Lt),
            TokenKind::Le => Some(CompareOp::Le),
            TokenKind::Gt => Some(CompareOp::Gt),
            TokenKind::Ge => Some(CompareOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.operand()?;
            return Ok(Expr::Compare { left, op, right });
        }

        if *self.peek_kind() == TokenKind::RegexMatch || self.is_keyword("MATCHES") {
            self.advance();
            let regex = self.regex_literal()?;
            return Ok(Expr::Matches { operand: left, regex });
        }

        let op = if self.eat_keyword("CONTAINS") {
            CompareOp::Contains
        } else if self.eat_keyword("STARTS_WITH") {
            CompareOp::StartsWith
        } else if self.eat_keyword("ENDS_WITH") {
            CompareOp::EndsWith
        } else if self.eat_keyword("STARTS") {
            self.expect_keyword("WITH")?;
            CompareOp::StartsWith
        } else if self.eat_keyword("ENDS") {
            self.expect_keyword("WITH")?;
            CompareOp::EndsWith
        } else {
            return Err(self.error("comparison operator"));
        };
        let right = self.operand()?;
        Ok(Expr::Compare { left, op, right })
    }

    fn regex_literal(&mut self) -> Result<Regex, QueryParseError> {
        let token = self.peek().clone();
        let TokenKind::Str(pattern) = token.kind else {
            return Err(self.error("regular expression string"));
        };
        let regex = Regex::new(&pattern).map_err(|e| {
            QueryParseError::new(
                token.position,
                "valid regular expression",
                e.to_string().lines().last().unwrap_or("invalid regex").trim().to_string(),
            )
        })?;
        self.advance();
        Ok(regex)
    }

    fn operand(&mut self) -> Result<Operand, QueryParseError> {
        let is_attr = match self.peek_kind() {
            TokenKind::Ident(word) => !["true", "false", "null"]
                .iter()
                .any(|k| word.eq_ignore_ascii_case(k)),
            _ => false,
        };
        if is_attr {
            Ok(Operand::Attr(self.attr_ref()?))
        } else {
            Ok(Operand::Literal(self.literal()?))
        }
    }

    fn literal(&mut self) -> Result<Value, QueryParseError> {
        let negative = self.eat(&TokenKind::Dash);
        let value = match self.peek_kind().clone() {
            TokenKind::Int(n) => Value::Int(if negative { -n } else { n }),
            TokenKind::Float(f) => Value::Float(if negative { -f } else { f }),
            TokenKind::Str(s) if !negative => Value::Str(s),
            TokenKind::Ident(word) if !negative => match word.to_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "null" => Value::Null,
                _ => return Err(self.error("literal (string, number, true, false, null)")),
            },
            _ if negative => return Err(self.error("number")),
            _ => return Err(self.error("attribute reference (var.attr) or literal")),
        };
        self.advance();
        Ok(value)
    }

    fn attr_ref(&mut self) -> Result<AttrRef, QueryParseError> {
        let (var, position) = self.ident("attribute reference (var.attr)")?;
        if !self.variables.iter().any(|v| v.name == var) {
            return Err(QueryParseError::new(position, "variable bound in MATCH", format!("'{}'", var)));
        }
        self.expect(TokenKind::Dot)?;
        let (attr, _) = self.ident("attribute name")?;
        Ok(AttrRef { var, attr })
    }

    fn projection_item(&mut self) -> Result<ProjectionItem, QueryParseError> {
        let (var, position) = self.ident("variable to return")?;
        if !self.variables.iter().any(|v| v.name == var) {
            return Err(QueryParseError::new(position, "variable bound in MATCH", format!("'{}'", var)));
        }
        if self.eat(&TokenKind::Dot) {
            let (attr, _) = self.ident("attribute name")?;
            return Ok(ProjectionItem::Attr(AttrRef { var, attr }));
        }
        Ok(ProjectionItem::Var(var))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_query() {
        let q = parse(r#"MATCH (n:function) WHERE n.name = "foo" RETURN n"#).unwrap();
        assert_eq!(q.patterns.len(), 1);
        assert_eq!(q.patterns[0].start.kinds, vec![NodeKind::Function]);
        assert_eq!(q.projection, Projection::Items(vec![ProjectionItem::Var("n".into())]));
        assert!(matches!(
            q.predicate,
            Some(Expr::Compare { op: CompareOp::Eq, .. })
        ));
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let q = parse("match (a)-[e:calls|IMPORTS]->(b) where e.confidence >= 0.5 and not a.name starts with 'test' return distinct a, b.name order by b.name desc skip 2 limit 5").unwrap();
        let (rel, _) = &q.patterns[0].hops[0];
        assert_eq!(rel.types, vec![EdgeType::Calls, EdgeType::Imports]);
        assert_eq!(rel.direction, RelDirection::Out);
        assert!(q.distinct);
        assert_eq!(q.order_by.len(), 1);
        assert!(q.order_by[0].descending);
        assert_eq!((q.skip, q.limit), (Some(2), Some(5)));
    }

    #[test]
    fn test_relationship_forms() {
        let dirs = |text: &str| -> Vec<RelDirection> {
            parse(text).unwrap().patterns[0]
                .hops
                .iter()
                .map(|(r, _)| r.direction)
                .collect()
        };
        assert_eq!(dirs("MATCH (a)-->(b)<--(c)--(d) RETURN a"), vec![
            RelDirection::Out,
            RelDirection::In,
            RelDirection::Either
        ]);
        assert_eq!(dirs("MATCH (a)<-[e]-(b)-[f]-(c) RETURN *"), vec![
            RelDirection::In,
            RelDirection::Either
        ]);
    }

    #[test]
    fn test_shared_variables_reuse_slots() {
        let q = parse("MATCH (a)-->(b), (b)-->(c), (x) RETURN a").unwrap();
        assert_eq!(q.patterns[0].hops[0].1.slot, q.patterns[1].start.slot);
        let names: Vec<_> = q.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "x"]);
    }

    #[test]
    fn test_error_reports_position_and_expectation() {
        let err = parse("MATCH (n:function WHERE").unwrap_err();
        assert_eq!(err.position, 18);
        assert_eq!(err.expected, "')'");
        assert_eq!(err.found, "'WHERE'");

        let err = parse("MATCH (n) RETURN m").unwrap_err();
        assert_eq!(err.position, 17);
        assert_eq!(err.expected, "variable bound in MATCH");

        let err = parse("MATCH (n:widget) RETURN n").unwrap_err();
        assert_eq!(err.position, 9);

        let err = parse("FIND (n) RETURN n").unwrap_err();
        assert_eq!((err.position, err.expected.as_str()), (0, "MATCH"));

        let err = parse("MATCH (n) RETURN n LIMIT").unwrap_err();
        assert_eq!(err.found, "end of input");
    }

    #[test]
    fn test_invalid_regex_is_parse_error() {
        let err = parse(r#"MATCH (n) WHERE n.name =~ "(unclosed" RETURN n"#).unwrap_err();
        assert_eq!(err.position, 26);
        assert_eq!(err.expected, "valid regular expression");
        assert!(parse(r#"MATCH (n) WHERE n.name MATCHES "^get_" RETURN n"#).is_ok());
    }

    #[test]
    fn test_inline_properties_and_negative_numbers() {
        let q = parse(r#"MATCH (n {name: "foo", line: -1}) RETURN n"#).unwrap();
        assert_eq!(
            q.patterns[0].start.properties,
            vec![("name".to_string(), Value::Str("foo".into())), ("line".to_string(), Value::Int(-1))]
        );
    }

    #[test]
    fn test_variable_kind_conflict() {
        let err = parse("MATCH (a)-[a]->(b) RETURN a").unwrap_err();
        assert_eq!(err.expected, "a variable not already bound to a node");
    }
}
