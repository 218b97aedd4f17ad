//! Rust fact extractor (tree-sitter-rust)
//!
//! Only file-level items are read: inline `mod name { .. }` bodies belong to
//! a module that has no file of its own and are skipped.

use tree_sitter::Node;

use super::{cyclomatic, end_line_of, is_plain_path, line_of, node_text, parse_source, visit_all};
use crate::error::Result;
use crate::facts::{CallFact, FactExtractor, FileFacts, ImportFact, ImportedName, SourceFile, SymbolFact, SymbolKind};

const BRANCH_KINDS: &[&str] = &[
    "if_expression",
    "match_arm",
    "for_expression",
    "while_expression",
    "loop_expression",
    "try_expression",
];

// ============================================================================
// Extractor
// ============================================================================

pub struct RustExtractor;

impl FactExtractor for RustExtractor {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn extract_source(&self, rel_path: &str, source: &str) -> Result<FileFacts> {
        let tree = parse_source(tree_sitter_rust::LANGUAGE.into(), rel_path, source)?;
        let mut file = RsFile {
            path: rel_path,
            source,
            facts: FileFacts {
                file: SourceFile {
                    path: rel_path.to_string(),
                    language: "rust".to_string(),
                    content_hash: 0,
                },
                ..FileFacts::default()
            },
            trait_impls: Vec::new(),
        };
        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!("{} has syntax errors, extracting best-effort", rel_path);
        }

        let mut cursor = root.walk();
        for item in root.named_children(&mut cursor) {
            file.item(&item);
        }
        file.attach_trait_impls();
        Ok(file.facts)
    }
}

// ============================================================================
// Syntax walk
// ============================================================================

struct RsFile<'s> {
    path: &'s str,
    source: &'s str,
    facts: FileFacts,
    /// (type, trait) pairs from `impl Trait for Type`
    trait_impls: Vec<(String, String)>,
}

impl<'s> RsFile<'s> {
    fn text(&self, node: &Node) -> &'s str {
        node_text(node, self.source)
    }

    fn item(&mut self, item: &Node) {
        match item.kind() {
            "function_item" => self.function(item, None, false),
            "struct_item" | "enum_item" | "union_item" => {
                self.type_def(item);
            }
            "trait_item" => self.trait_def(item),
            "impl_item" => self.impl_block(item),
            "use_declaration" => {
                let imports = self.use_declaration(item);
                self.facts.imports.extend(imports);
            }
            _ => {}
        }
    }

    fn symbol(&self, node: &Node, name: String, kind: SymbolKind) -> SymbolFact {
        let (decorators, doc) = self.leading_attributes(node);
        SymbolFact {
            language: "rust".into(),
            file_path: self.path.to_string(),
            name,
            kind,
            line: line_of(node),
            end_line: end_line_of(node),
            doc,
            decorators,
            ..SymbolFact::default()
        }
    }

    fn type_def(&mut self, node: &Node) -> Option<()> {
        let name = self.text(&node.child_by_field_name("name")?).to_string();
        let fact = self.symbol(node, name, SymbolKind::Class);
        self.facts.symbols.push(fact);
        Some(())
    }

    fn trait_def(&mut self, node: &Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let mut fact = self.symbol(node, name.clone(), SymbolKind::Class);
        if let Some(bounds) = node.child_by_field_name("bounds") {
            let mut cursor = bounds.walk();
            fact.bases = bounds
                .named_children(&mut cursor)
                .filter_map(|b| type_name(self.text(&b)))
                .collect();
        }
        self.facts.symbols.push(fact);

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.named_children(&mut cursor) {
                if matches!(child.kind(), "function_item" | "function_signature_item") {
                    self.function(&child, Some(name.as_str()), false);
                }
            }
        }
    }

    fn impl_block(&mut self, node: &Node) {
        let Some(target) = node
            .child_by_field_name("type")
            .and_then(|t| type_name(self.text(&t)))
        else {
            return;
        };
        let trait_name = node
            .child_by_field_name("trait")
            .and_then(|t| type_name(self.text(&t)));
        if let Some(trait_name) = &trait_name {
            self.trait_impls.push((target.clone(), trait_name.clone()));
        }

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            if child.kind() == "function_item" {
                self.function(&child, Some(target.as_str()), trait_name.is_some());
            }
        }
    }

    fn function(&mut self, node: &Node, owner: Option<&str>, is_trait_impl: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let kind = if owner.is_some() {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };
        let body = node.child_by_field_name("body");
        let mut fact = self.symbol(node, name, kind);
        fact.enclosing_class = owner.map(str::to_string);
        fact.is_trait_impl = is_trait_impl;
        fact.params = node
            .child_by_field_name("parameters")
            .map(|p| self.params(&p))
            .unwrap_or_default();
        fact.complexity = body.as_ref().map(|b| cyclomatic(b, BRANCH_KINDS));
        let caller = fact.qualified_name();
        self.facts.symbols.push(fact);

        if let Some(body) = body {
            self.calls(&body, &caller);
        }
    }

    fn params(&self, parameters: &Node) -> Vec<String> {
        let mut params = Vec::new();
        let mut cursor = parameters.walk();
        for param in parameters.named_children(&mut cursor) {
            if param.kind() != "parameter" {
                continue;
            }
            let Some(pattern) = param.child_by_field_name("pattern") else {
                continue;
            };
            let text = self.text(&pattern);
            let name = text.strip_prefix("mut ").unwrap_or(text).trim();
            if is_plain_path(name) && !name.contains(['.', ':']) {
                params.push(name.to_string());
            }
        }
        params
    }

    /// Outer attributes and `///` docs directly above an item
    fn leading_attributes(&self, node: &Node) -> (Vec<String>, Option<String>) {
        let mut decorators = Vec::new();
        let mut doc_lines = Vec::new();
        let mut sibling = node.prev_sibling();
        while let Some(prev) = sibling {
            match prev.kind() {
                "attribute_item" => {
                    let text = self.text(&prev);
                    let inner = text
                        .trim_start_matches("#[")
                        .trim_end_matches(']')
                        .trim();
                    decorators.push(inner.to_string());
                }
                "line_comment" => {
                    let text = self.text(&prev).trim();
                    match text.strip_prefix("///") {
                        Some(line) if !text.starts_with("////") => doc_lines.push(line.trim().to_string()),
                        _ => break,
                    }
                }
                _ => break,
            }
            sibling = prev.prev_sibling();
        }
        decorators.reverse();
        doc_lines.reverse();
        let doc = doc_lines.join("\n").trim().to_string();
        (decorators, (!doc.is_empty()).then_some(doc))
    }

    fn calls(&mut self, body: &Node, caller: &str) {
        let mut calls = Vec::new();
        visit_all(body, |n| {
            if n.kind() != "call_expression" {
                return;
            }
            let Some(function) = n.child_by_field_name("function") else {
                return;
            };
            if let Some(callee) = normalize_callee(self.text(&function)) {
                calls.push(CallFact {
                    language: "rust".into(),
                    file_path: self.path.to_string(),
                    caller: Some(caller.to_string()),
                    callee,
                    line: line_of(n),
                });
            }
        });
        self.facts.calls.extend(calls);
    }

    fn use_declaration(&self, node: &Node) -> Vec<ImportFact> {
        let Some(argument) = node.child_by_field_name("argument") else {
            return Vec::new();
        };
        let text = self.text(&argument).split_whitespace().collect::<Vec<_>>().join(" ");
        let mut paths = Vec::new();
        expand_use_tree("", &text, &mut paths);
        paths
            .iter()
            .filter_map(|path| use_path_to_import(path))
            .map(|(module, level, names, alias)| ImportFact {
                language: "rust".into(),
                file_path: self.path.to_string(),
                module,
                level,
                names,
                alias,
                line: line_of(node),
            })
            .collect()
    }

    /// Record `impl Trait for Type` as a base of `Type` when it is declared here
    fn attach_trait_impls(&mut self) {
        for (target, trait_name) in std::mem::take(&mut self.trait_impls) {
            let class = self
                .facts
                .symbols
                .iter_mut()
                .find(|s| s.kind == SymbolKind::Class && s.name == target);
            if let Some(class) = class {
                if !class.bases.contains(&trait_name) {
                    class.bases.push(trait_name);
                }
            }
        }
    }
}

// ============================================================================
// Path and use-tree helpers
// ============================================================================

/// `crate::store::Store<T>` -> `Store`, `&mut Vec<u8>` -> `Vec`
fn type_name(text: &str) -> Option<String> {
    let base = text.split('<').next().unwrap_or(text);
    let base = base.trim_start_matches(['&', ' ']).trim_start_matches("mut ").trim();
    let last = base.rsplit("::").next().unwrap_or(base).trim();
    let valid = !last.is_empty() && last.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then(|| last.to_string())
}

/// `Self::new` -> `self.new`, `crate::util::parse` -> `util.parse`
fn normalize_callee(text: &str) -> Option<String> {
    if !is_plain_path(text) {
        return None;
    }
    let text = text.strip_prefix("crate::").unwrap_or(text);
    let text = text.strip_prefix("self::").unwrap_or(text);
    let normalized = match text.strip_prefix("Self::") {
        Some(rest) => format!("self.{}", rest.replace("::", ".")),
        None => text.replace("::", "."),
    };
    (!normalized.is_empty() && !normalized.contains("..")).then_some(normalized)
}

/// Flatten `a::{b, c::{d, e as f}}` into `a::b`, `a::c::d`, `a::c::e as f`
fn expand_use_tree(prefix: &str, tree: &str, out: &mut Vec<String>) {
    let tree = tree.trim();
    if tree.is_empty() {
        return;
    }
    let Some(open) = tree.find('{') else {
        out.push(format!("{}{}", prefix, tree));
        return;
    };
    let Some(close) = tree.rfind('}') else {
        return;
    };
    if close < open {
        return;
    }
    let head = format!("{}{}", prefix, &tree[..open]);
    for part in split_top_level(&tree[open + 1..close]) {
        expand_use_tree(&head, part, out);
    }
}

fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

type UseImport = (String, usize, Vec<ImportedName>, Option<String>);

/// One flattened use path as (module, level, names, module alias)
fn use_path_to_import(path: &str) -> Option<UseImport> {
    let (path, alias) = match path.split_once(" as ") {
        Some((path, alias)) => (path.trim(), Some(alias.trim().to_string())),
        None => (path.trim(), None),
    };
    let mut segments: Vec<&str> = path
        .trim_start_matches("::")
        .split("::")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut level = 0;
    match segments.first() {
        Some(&"crate") => {
            segments.remove(0);
        }
        Some(&"self") => {
            segments.remove(0);
            level = 1;
        }
        Some(&"super") => {
            level = 1;
            while segments.first() == Some(&"super") {
                segments.remove(0);
                level += 1;
            }
        }
        _ => {}
    }

    let last = segments.pop()?;
    let module = segments.join(".");
    if last == "*" || last == "self" {
        if module.is_empty() && level == 0 {
            return None;
        }
        return Some((module, level, Vec::new(), alias));
    }
    if !last.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let name = ImportedName {
        name: last.to_string(),
        alias,
    };
    Some((module, level, vec![name], None))
}

// ============================================================================
// Tests
// ============================================================================
