//! Import-graph builder: one module node per source file, IMPORTS edges
//! for every import that resolves inside the project.

use serde::Serialize;

use super::layers::classify_layer;
use super::resolve::{join_module, parent_module, FileScope, ImportBinding, SymbolIndex};
use crate::facts::{module_path_for, FactSet, ImportFact};
use crate::graph::{EdgeType, GraphEdge, GraphNode, NodeKind, UniversalGraph};

/// An import that points outside the project (or nowhere)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OmittedImport {
    pub file_path: String,
    /// Module as written, with leading dots for relative imports
    pub module: String,
    pub line: usize,
}

/// Counts from one import-graph build
#[derive(Debug, Default)]
pub(crate) struct ImportGraphStats {
    pub module_nodes: usize,
    pub import_edges: usize,
    pub omitted: Vec<OmittedImport>,
}

/// Root module name for a language
fn root_module(language: &str) -> &'static str {
    if language == "rust" {
        "crate"
    } else {
        "root"
    }
}

fn canonical_module(language: &str, module: String) -> String {
    if module.is_empty() {
        root_module(language).to_string()
    } else {
        module
    }
}

/// Package a relative import is anchored to.
///
/// Python anchors `.` at the importing file's package; Rust anchors `self::`
/// (level 1) at the current module and each `super::` one level higher.
fn relative_base(fact: &ImportFact) -> String {
    let module = module_path_for(&fact.file_path);
    let mut base = if fact.language == "python" && !fact.file_path.ends_with("__init__.py") {
        parent_module(&module).to_string()
    } else {
        module
    };
    if base == root_module(&fact.language) {
        base.clear();
    }
    for _ in 1..fact.level {
        base = parent_module(&base).to_string();
    }
    base
}

pub(crate) fn module_node_id(language: &str, file_path: &str) -> String {
    let module = module_path_for(file_path);
    GraphNode::make_id(language, &module, NodeKind::Module, &module)
}

/// Create module nodes for every file and register them in the index
pub(crate) fn add_module_nodes(
    graph: &mut UniversalGraph,
    index: &mut SymbolIndex,
    facts: &FactSet,
) -> usize {
    let mut created = 0;
    let files = facts
        .files
        .iter()
        .map(|f| (f.language.as_str(), f.path.as_str()))
        .chain(
            facts
                .symbols
                .iter()
                .map(|s| (s.language.as_str(), s.file_path.as_str())),
        );

    for (language, path) in files {
        if path.is_empty() {
            continue;
        }
        let module = module_path_for(path);
        let mut node = GraphNode::new(language, &module, NodeKind::Module, &module, path, 1);
        node.metadata.layer = Some(classify_layer(path));
        if graph.add_node(node).1 {
            created += 1;
        }
        index.add_module(language, &module);
    }
    created
}

/// Resolve every import fact, add IMPORTS edges and record file scopes
pub(crate) fn build(
    graph: &mut UniversalGraph,
    index: &mut SymbolIndex,
    facts: &FactSet,
) -> ImportGraphStats {
    let mut stats = ImportGraphStats::default();
    let mut scopes: Vec<((String, String), FileScope)> = Vec::new();

    for fact in &facts.imports {
        let from_id = module_node_id(&fact.language, &fact.file_path);
        if !graph.contains(&from_id) {
            continue;
        }

        let base = if fact.level > 0 {
            join_module(&relative_base(fact), &fact.module)
        } else {
            fact.module.clone()
        };

        let scope_pos = match scopes
            .iter()
            .position(|((lang, file), _)| lang == &fact.language && file == &fact.file_path)
        {
            Some(pos) => pos,
            None => {
                scopes.push((
                    (fact.language.clone(), fact.file_path.clone()),
                    FileScope::default(),
                ));
                scopes.len() - 1
            }
        };

        let mut targets: Vec<String> = Vec::new();

        if fact.names.is_empty() {
            let module = canonical_module(&fact.language, base.clone());
            if index.has_module(&fact.language, &module) {
                let local = fact.alias.clone().unwrap_or_else(|| fact.module.clone());
                scopes[scope_pos]
                    .1
                    .bindings
                    .insert(local, ImportBinding::Module(module.clone()));
                targets.push(module);
            }
        } else {
            for imported in &fact.names {
                let submodule = join_module(&base, &imported.name);
                let parent = canonical_module(&fact.language, base.clone());
                let local = imported.local_name().to_string();

                if index.has_module(&fact.language, &submodule) {
                    scopes[scope_pos]
                        .1
                        .bindings
                        .insert(local, ImportBinding::Module(submodule.clone()));
                    targets.push(submodule);
                } else if index.has_module(&fact.language, &parent) {
                    scopes[scope_pos].1.bindings.insert(
                        local,
                        ImportBinding::Symbol(parent.clone(), imported.name.clone()),
                    );
                    targets.push(parent);
                }
            }
        }

        if targets.is_empty() {
            stats.omitted.push(OmittedImport {
                file_path: fact.file_path.clone(),
                module: format!("{}{}", ".".repeat(fact.level), fact.module),
                line: fact.line,
            });
            continue;
        }

        for target in targets {
            let to_id = GraphNode::make_id(&fact.language, &target, NodeKind::Module, &target);
            if to_id == from_id {
                continue;
            }
            let edge = GraphEdge::observed(from_id.clone(), to_id, EdgeType::Imports)
                .with_evidence(format!("import at line {}", fact.line));
            if matches!(graph.add_edge(edge), crate::graph::EdgeInsert::Inserted(_)) {
                stats.import_edges += 1;
            }
        }
    }

    for ((language, file), scope) in scopes {
        index.set_scope(&language, &file, scope);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{ImportedName, SourceFile};

    fn file(path: &str) -> SourceFile {
        SourceFile {
            path: path.into(),
            language: "python".into(),
            content_hash: 0,
        }
    }

    fn import(file: &str, module: &str, level: usize, names: &[&str]) -> ImportFact {
        ImportFact {
            language: "python".into(),
            file_path: file.into(),
            module: module.into(),
            level,
            names: names
                .iter()
                .map(|n| ImportedName {
                    name: n.to_string(),
                    alias: None,
                })
                .collect(),
            alias: None,
            line: 1,
        }
    }

    #[test]
    fn test_absolute_relative_and_external_imports() {
        let mut facts = FactSet::new();
        for path in ["pkg/__init__.py", "pkg/api.py", "pkg/db.py", "main.py"] {
            facts.files.push(file(path));
        }
        facts.imports.push(import("main.py", "pkg.api", 0, &[]));
        facts.imports.push(import("pkg/api.py", "", 1, &["db"]));
        facts.imports.push(import("pkg/api.py", "requests", 0, &[]));

        let mut graph = UniversalGraph::new();
        let mut index = SymbolIndex::new();
        assert_eq!(add_module_nodes(&mut graph, &mut index, &facts), 4);
        let stats = build(&mut graph, &mut index, &facts);

        assert_eq!(stats.import_edges, 2);
        assert_eq!(stats.omitted.len(), 1);
        assert_eq!(stats.omitted[0].module, "requests");
        assert!(graph
            .find_edge(
                "python::main::module::main",
                "python::pkg.api::module::pkg.api",
                EdgeType::Imports
            )
            .is_some());
        assert!(graph
            .find_edge(
                "python::pkg.api::module::pkg.api",
                "python::pkg.db::module::pkg.db",
                EdgeType::Imports
            )
            .is_some());
        // every edge endpoint exists
        for edge in graph.edges() {
            assert!(graph.contains(&edge.from_id) && graph.contains(&edge.to_id));
        }
    }

    #[test]
    fn test_relative_base_for_package_init() {
        let fact = import("pkg/sub/__init__.py", "x", 1, &[]);
        assert_eq!(relative_base(&fact), "pkg.sub");
        let fact = import("pkg/sub/mod.py", "x", 2, &[]);
        assert_eq!(relative_base(&fact), "pkg");
    }

    #[test]
    fn test_rust_super_import() {
        let fact = ImportFact {
            language: "rust".into(),
            file_path: "src/graph/store.rs".into(),
            module: "node".into(),
            level: 2,
            names: vec![],
            alias: None,
            line: 3,
        };
        assert_eq!(relative_base(&fact), "graph");
    }
}
