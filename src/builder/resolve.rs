//! Name resolution shared by the call-graph and import-graph builders.
//!
//! Resolution is purely name-based: a per-module symbol table, a per-file
//! import scope, and a global fallback that only accepts unique matches.

use std::collections::{HashMap, HashSet};

use crate::facts::{module_path_for, SymbolFact, SymbolKind};
use crate::graph::{GraphNode, NodeKind};

/// Target of an imported name
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ImportBinding {
    /// `import pkg.util as u` / `from pkg import util` where `util` is a module
    Module(String),
    /// `from pkg.util import parse` -> (module, name)
    Symbol(String, String),
}

/// Local names bound by a file's imports
#[derive(Debug, Clone, Default)]
pub(crate) struct FileScope {
    pub bindings: HashMap<String, ImportBinding>,
}

/// Symbol tables for every module in the fact set
#[derive(Debug, Default)]
pub(crate) struct SymbolIndex {
    /// (language, module) -> qualified name -> node id
    by_module: HashMap<(String, String), HashMap<String, String>>,
    /// (language, name) -> ids of top-level functions and classes
    by_name: HashMap<(String, String), Vec<String>>,
    modules: HashSet<(String, String)>,
    /// (language, file) -> import scope
    scopes: HashMap<(String, String), FileScope>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, language: &str, module: &str) {
        self.modules.insert((language.to_string(), module.to_string()));
    }

    pub fn has_module(&self, language: &str, module: &str) -> bool {
        self.modules
            .contains(&(language.to_string(), module.to_string()))
    }

    /// Register a validated symbol and return its node id
    pub fn add_symbol(&mut self, fact: &SymbolFact) -> String {
        let module = module_path_for(&fact.file_path);
        let qualified = fact.qualified_name();
        let id = GraphNode::make_id(&fact.language, &module, NodeKind::from(fact.kind), &qualified);

        self.by_module
            .entry((fact.language.clone(), module))
            .or_default()
            .entry(qualified)
            .or_insert_with(|| id.clone());

        if fact.kind != SymbolKind::Method {
            let ids = self
                .by_name
                .entry((fact.language.clone(), fact.name.clone()))
                .or_default();
            if !ids.contains(&id) {
                ids.push(id.clone());
            }
        }
        id
    }

    pub fn set_scope(&mut self, language: &str, file_path: &str, scope: FileScope) {
        self.scopes
            .insert((language.to_string(), file_path.to_string()), scope);
    }

    pub fn scope(&self, language: &str, file_path: &str) -> Option<&FileScope> {
        self.scopes
            .get(&(language.to_string(), file_path.to_string()))
    }

    /// Look up a qualified name inside one module
    pub fn lookup(&self, language: &str, module: &str, qualified: &str) -> Option<&str> {
        self.by_module
            .get(&(language.to_string(), module.to_string()))
            .and_then(|table| table.get(qualified))
            .map(String::as_str)
    }

    /// Unique top-level symbol with this name across the project
    pub fn lookup_unique(&self, language: &str, name: &str) -> Option<&str> {
        match self.by_name.get(&(language.to_string(), name.to_string())) {
            Some(ids) if ids.len() == 1 => Some(ids[0].as_str()),
            _ => None,
        }
    }

    /// Resolve a reference written in `file_path` to a node id.
    ///
    /// Order: same module, imported binding, unique global name. Dotted
    /// references resolve their qualifier as a module alias, a local class,
    /// or an imported class.
    pub fn resolve(&self, language: &str, file_path: &str, reference: &str) -> Option<String> {
        let module = module_path_for(file_path);
        let scope = self.scope(language, file_path);

        let Some((qualifier, member)) = reference.rsplit_once('.') else {
            if let Some(id) = self.lookup(language, &module, reference) {
                return Some(id.to_string());
            }
            if let Some(binding) = scope.and_then(|s| s.bindings.get(reference)) {
                if let ImportBinding::Symbol(target_module, name) = binding {
                    if let Some(id) = self.lookup(language, target_module, name) {
                        return Some(id.to_string());
                    }
                }
                return None;
            }
            return self.lookup_unique(language, reference).map(str::to_string);
        };

        if let Some(binding) = scope.and_then(|s| s.bindings.get(qualifier)) {
            return match binding {
                ImportBinding::Module(target_module) => self
                    .lookup(language, target_module, member)
                    .map(str::to_string),
                ImportBinding::Symbol(target_module, class) => self
                    .lookup(language, target_module, &format!("{}.{}", class, member))
                    .map(str::to_string),
            };
        }

        if let Some(id) = self.lookup(language, &module, &format!("{}.{}", qualifier, member)) {
            return Some(id.to_string());
        }

        // Fully dotted module path written inline: `pkg.util.parse`
        if self.has_module(language, qualifier) {
            return self.lookup(language, qualifier, member).map(str::to_string);
        }
        None
    }

    /// Prefer a class's constructor method when one is defined
    pub fn constructor_for(&self, class_id: &str) -> Option<&str> {
        let mut parts = class_id.splitn(4, "::");
        let language = parts.next()?;
        let module = parts.next()?;
        let kind = parts.next()?;
        let name = parts.next()?;
        if kind != NodeKind::Class.as_str() {
            return None;
        }
        ["__init__", "new"]
            .iter()
            .find_map(|ctor| self.lookup(language, module, &format!("{}.{}", name, ctor)))
    }
}

/// Parent module of a dotted path (`a.b.c` -> `a.b`, `a` -> ``)
pub(crate) fn parent_module(module: &str) -> &str {
    module.rsplit_once('.').map(|(parent, _)| parent).unwrap_or("")
}

/// Join module segments, treating an empty base as the project root
pub(crate) fn join_module(base: &str, tail: &str) -> String {
    match (base.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}.{}", base, tail),
    }
}
