//! Python fact extractor (tree-sitter-python)

use tree_sitter::Node;

use super::{cyclomatic, end_line_of, is_plain_path, line_of, node_text, parse_source, visit_all};
use crate::error::Result;
use crate::facts::{CallFact, FactExtractor, FileFacts, ImportFact, ImportedName, SourceFile, SymbolFact, SymbolKind};

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "conditional_expression",
    "boolean_operator",
    "case_clause",
    "list_comprehension",
    "dictionary_comprehension",
    "set_comprehension",
    "generator_expression",
];

pub struct PythonExtractor;

impl FactExtractor for PythonExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn extract_source(&self, rel_path: &str, source: &str) -> Result<FileFacts> {
        let tree = parse_source(tree_sitter_python::LANGUAGE.into(), rel_path, source)?;
        let mut file = PyFile {
            path: rel_path,
            source,
            facts: FileFacts {
                file: SourceFile {
                    path: rel_path.to_string(),
                    language: "python".to_string(),
                    content_hash: 0,
                },
                ..FileFacts::default()
            },
        };
        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!("{} has syntax errors, extracting best-effort", rel_path);
        }
        file.module_body(&root);
        Ok(file.facts)
    }
}

// ============================================================================
// Syntax walk
// ============================================================================

struct PyFile<'s> {
    path: &'s str,
    source: &'s str,
    facts: FileFacts,
}

impl<'s> PyFile<'s> {
    fn text(&self, node: &Node) -> &'s str {
        node_text(node, self.source)
    }

    fn module_body(&mut self, root: &Node) {
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "function_definition" => self.function(&child, None, Vec::new()),
                "class_definition" => self.class(&child, Vec::new()),
                "decorated_definition" => self.decorated(&child, None),
                // module-level statements: imports and calls, including inside if/try blocks
                _ => self.statements(&child, None),
            }
        }
    }

    fn decorated(&mut self, node: &Node, class: Option<&str>) {
        let mut decorators = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "decorator" {
                let text = self.text(&child).trim_start_matches('@').trim();
                // `@app.route("/x")` -> `app.route`
                let name = text.split('(').next().unwrap_or(text).trim();
                decorators.push(name.to_string());
            }
        }
        let Some(definition) = node.child_by_field_name("definition") else {
            return;
        };
        match definition.kind() {
            "function_definition" => self.function(&definition, class, decorators),
            "class_definition" if class.is_none() => self.class(&definition, decorators),
            _ => {}
        }
    }

    fn class(&mut self, node: &Node, decorators: Vec<String>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                // keyword arguments such as `metaclass=ABCMeta` are not bases
                if matches!(base.kind(), "identifier" | "attribute") {
                    bases.push(self.text(&base).to_string());
                }
            }
        }
        let body = node.child_by_field_name("body");
        let fact = SymbolFact {
            language: "python".into(),
            file_path: self.path.to_string(),
            name: name.clone(),
            kind: SymbolKind::Class,
            enclosing_class: None,
            line: line_of(node),
            end_line: end_line_of(node),
            doc: body.as_ref().and_then(|b| self.docstring(b)),
            decorators,
            bases,
            ..SymbolFact::default()
        };
        self.facts.symbols.push(fact);

        let Some(body) = body else {
            return;
        };
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            match child.kind() {
                "function_definition" => self.function(&child, Some(name.as_str()), Vec::new()),
                "decorated_definition" => self.decorated(&child, Some(name.as_str())),
                "class_definition" => {}
                _ => self.statements(&child, None),
            }
        }
    }

    fn function(&mut self, node: &Node, class: Option<&str>, decorators: Vec<String>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let body = node.child_by_field_name("body");
        let fact = SymbolFact {
            language: "python".into(),
            file_path: self.path.to_string(),
            name,
            kind: if class.is_some() {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            },
            enclosing_class: class.map(str::to_string),
            line: line_of(node),
            end_line: end_line_of(node),
            params: node
                .child_by_field_name("parameters")
                .map(|p| self.params(&p))
                .unwrap_or_default(),
            doc: body.as_ref().and_then(|b| self.docstring(b)),
            decorators,
            complexity: body.as_ref().map(|b| cyclomatic(b, BRANCH_KINDS)),
            ..SymbolFact::default()
        };
        let caller = fact.qualified_name();
        self.facts.symbols.push(fact);

        if let Some(body) = body {
            self.statements(&body, Some(&caller));
        }
    }

    fn params(&self, parameters: &Node) -> Vec<String> {
        let mut params = Vec::new();
        let mut cursor = parameters.walk();
        for param in parameters.named_children(&mut cursor) {
            let name_node = match param.kind() {
                "identifier" => Some(param),
                "default_parameter" | "typed_default_parameter" => param.child_by_field_name("name"),
                "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                    param.named_child(0)
                }
                _ => None,
            };
            if let Some(name_node) = name_node {
                let name = self.text(&name_node).trim_start_matches('*');
                if !name.is_empty() && name != "self" && name != "cls" {
                    params.push(name.to_string());
                }
            }
        }
        params
    }

    fn docstring(&self, body: &Node) -> Option<String> {
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0)?;
        if string.kind() != "string" {
            return None;
        }
        let raw = self.text(&string);
        let trimmed = raw
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .trim_matches(|c| c == '"' || c == '\'')
            .trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Calls and imports anywhere below `node`, attributed to `caller`
    fn statements(&mut self, node: &Node, caller: Option<&str>) {
        let mut calls = Vec::new();
        let mut imports = Vec::new();
        visit_all(node, |n| match n.kind() {
            "call" => {
                if let Some(function) = n.child_by_field_name("function") {
                    let callee = self.text(&function);
                    if is_plain_path(callee) && !callee.contains(':') {
                        calls.push(CallFact {
                            language: "python".into(),
                            file_path: self.path.to_string(),
                            caller: caller.map(str::to_string),
                            callee: callee.to_string(),
                            line: line_of(n),
                        });
                    }
                }
            }
            "import_statement" => imports.extend(self.import(n)),
            "import_from_statement" => imports.extend(self.import_from(n)),
            _ => {}
        });
        self.facts.calls.extend(calls);
        self.facts.imports.extend(imports);
    }

    /// `import a.b, c as d`
    fn import(&self, node: &Node) -> Vec<ImportFact> {
        let mut out = Vec::new();
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let (module, alias) = self.aliased(&name);
            out.push(ImportFact {
                language: "python".into(),
                file_path: self.path.to_string(),
                module: module.name,
                level: 0,
                names: Vec::new(),
                alias,
                line: line_of(node),
            });
        }
        out
    }

    /// `from ..pkg import a, b as c`
    fn import_from(&self, node: &Node) -> Option<ImportFact> {
        let module_node = node.child_by_field_name("module_name")?;
        let (module, level) = if module_node.kind() == "relative_import" {
            let mut level = 0;
            let mut module = String::new();
            let mut cursor = module_node.walk();
            for part in module_node.children(&mut cursor) {
                match part.kind() {
                    "import_prefix" => level = self.text(&part).chars().filter(|c| *c == '.').count(),
                    "dotted_name" => module = self.text(&part).to_string(),
                    _ => {}
                }
            }
            (module, level)
        } else {
            (self.text(&module_node).to_string(), 0)
        };

        let mut names = Vec::new();
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let (mut imported, alias) = self.aliased(&name);
            imported.alias = alias;
            names.push(imported);
        }
        Some(ImportFact {
            language: "python".into(),
            file_path: self.path.to_string(),
            module,
            level,
            names,
            alias: None,
            line: line_of(node),
        })
    }

    fn aliased(&self, node: &Node) -> (ImportedName, Option<String>) {
        if node.kind() == "aliased_import" {
            let name = node
                .child_by_field_name("name")
                .map(|n| self.text(&n).to_string())
                .unwrap_or_default();
            let alias = node.child_by_field_name("alias").map(|n| self.text(&n).to_string());
            return (ImportedName { name, alias: None }, alias);
        }
        (
            ImportedName {
                name: self.text(node).to_string(),
                alias: None,
            },
            None,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
import os
from .models import User as U, Order
from .. import shared

class Base:
    pass

class Service(Base, metaclass=Meta):
    """Handles billing."""

    def __init__(self, repo):
        self.repo = repo

    @property
    def total(self, items, *args, rate=0.2):
        if items:
            return sum(items)
        return self.helper(items)

    def helper(self, items):
        return os.path.join("a", "b")

@app.route("/bill")
def bill(request):
    svc = Service(request.repo)
    return svc.total([])

if __name__ == "__main__":
    bill(None)
"#;

    fn facts() -> FileFacts {
        PythonExtractor.extract_source("app/billing.py", SOURCE).unwrap()
    }

    #[test]
    fn test_symbols() {
        let facts = facts();
        let names: Vec<_> = facts.symbols.iter().map(|s| s.qualified_name()).collect();
        assert_eq!(
            names,
            vec!["Base", "Service", "Service.__init__", "Service.total", "Service.helper", "bill"]
        );

        let service = &facts.symbols[1];
        assert_eq!(service.bases, vec!["Base"]);
        assert_eq!(service.doc.as_deref(), Some("Handles billing."));

        let total = &facts.symbols[3];
        assert_eq!(total.kind, SymbolKind::Method);
        assert_eq!(total.params, vec!["items", "args", "rate"]);
        assert_eq!(total.decorators, vec!["property"]);
        assert_eq!(total.complexity, Some(2));

        let bill = &facts.symbols[5];
        assert_eq!(bill.decorators, vec!["app.route"]);
        assert_eq!(bill.kind, SymbolKind::Function);
    }

    #[test]
    fn test_calls() {
        let facts = facts();
        let calls: Vec<_> = facts
            .calls
            .iter()
            .map(|c| (c.caller.as_deref(), c.callee.as_str()))
            .collect();
        assert!(calls.contains(&(Some("Service.total"), "sum")));
        assert!(calls.contains(&(Some("Service.total"), "self.helper")));
        assert!(calls.contains(&(Some("Service.helper"), "os.path.join")));
        assert!(calls.contains(&(Some("bill"), "Service")));
        assert!(calls.contains(&(Some("bill"), "svc.total")));
        assert!(calls.contains(&(None, "bill")));
    }

    #[test]
    fn test_imports() {
        let facts = facts();
        assert_eq!(facts.imports.len(), 3);
        assert_eq!(facts.imports[0].module, "os");
        assert_eq!(facts.imports[0].level, 0);

        let models = &facts.imports[1];
        assert_eq!(models.module, "models");
        assert_eq!(models.level, 1);
        assert_eq!(models.names[0].name, "User");
        assert_eq!(models.names[0].alias.as_deref(), Some("U"));
        assert_eq!(models.names[1].local_name(), "Order");

        let shared = &facts.imports[2];
        assert_eq!(shared.module, "");
        assert_eq!(shared.level, 2);
        assert_eq!(shared.names[0].name, "shared");
    }
}
