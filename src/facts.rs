//! Extracted facts: the input contract between language analyzers and the graph builders.
//!
//! A [`FactExtractor`] turns source files into symbol definitions, call sites
//! and import statements. The builders only ever see these structures, never
//! source text or syntax trees.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ExtractionConfig;
use crate::error::Result;

// FNV-1a constants for 64-bit hash
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Compute a stable FNV-1a hash (deterministic across runs and platforms)
///
/// Used for content fingerprints and graph cache keys.
pub fn fnv1a_hash(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Kind of a symbol definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    #[default]
    Function,
    Method,
    Class,
}

/// A function, method or class definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolFact {
    pub language: String,
    /// Path relative to the project root, `/`-separated
    pub file_path: String,
    /// Unqualified name
    pub name: String,
    pub kind: SymbolKind,
    /// Class (or Rust impl target) that owns a method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_class: Option<String>,
    pub line: usize,
    #[serde(default)]
    pub end_line: usize,
    /// Parameter names, receiver excluded
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Decorators / attributes as written (without `@` / `#[`)
    #[serde(default)]
    pub decorators: Vec<String>,
    /// Base classes or implemented traits (classes only)
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,
    /// Method defined inside a trait impl block
    #[serde(default)]
    pub is_trait_impl: bool,
}

impl SymbolFact {
    /// Name unique within its file: `func` or `Class.method`
    pub fn qualified_name(&self) -> String {
        match (&self.kind, &self.enclosing_class) {
            (SymbolKind::Method, Some(class)) => format!("{}.{}", class, self.name),
            _ => self.name.clone(),
        }
    }

    /// Reject facts the builders cannot place in the graph
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.file_path.is_empty() {
            return Err(format!("symbol '{}' has no file path", self.name));
        }
        if !is_plain_identifier(&self.name) {
            return Err(format!("malformed symbol name '{}'", self.name));
        }
        if self.kind == SymbolKind::Method {
            match &self.enclosing_class {
                Some(class) if is_plain_identifier(class) => {}
                _ => return Err(format!("method '{}' has no enclosing class", self.name)),
            }
        }
        Ok(())
    }
}

/// A call site inside a function body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFact {
    pub language: String,
    pub file_path: String,
    /// Qualified name of the calling function, `None` at module scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    /// Callee as written, dot-normalized: `foo`, `self.bar`, `util.parse`
    pub callee: String,
    pub line: usize,
}

impl CallFact {
    /// `self.x` / `cls.x` calls resolve through the polymorphism pass only
    pub fn self_target(&self) -> Option<&str> {
        self.callee
            .strip_prefix("self.")
            .or_else(|| self.callee.strip_prefix("cls."))
            .filter(|rest| !rest.is_empty() && !rest.contains('.'))
    }
}

/// One name brought in by an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedName {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ImportedName {
    /// Name the import is visible under in the importing file
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An import statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFact {
    pub language: String,
    pub file_path: String,
    /// Dotted module path as written (without leading dots)
    pub module: String,
    /// Relative import depth (`from .. import x` = 2), 0 for absolute
    #[serde(default)]
    pub level: usize,
    /// Names imported from the module; empty for `import module`
    #[serde(default)]
    pub names: Vec<ImportedName>,
    /// Alias for `import module as alias`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub line: usize,
}

/// A source file seen by extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub language: String,
    #[serde(default)]
    pub content_hash: u64,
}

/// A file or fact that could not be used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Facts extracted from a single file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileFacts {
    pub file: SourceFile,
    pub symbols: Vec<SymbolFact>,
    pub calls: Vec<CallFact>,
    pub imports: Vec<ImportFact>,
}

/// Snapshot of all facts for one build request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactSet {
    #[serde(default)]
    pub files: Vec<SourceFile>,
    #[serde(default)]
    pub symbols: Vec<SymbolFact>,
    #[serde(default)]
    pub calls: Vec<CallFact>,
    #[serde(default)]
    pub imports: Vec<ImportFact>,
    #[serde(default)]
    pub skipped: Vec<SkippedFile>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one file's facts
    pub fn push_file(&mut self, facts: FileFacts) {
        self.files.push(facts.file);
        self.symbols.extend(facts.symbols);
        self.calls.extend(facts.calls);
        self.imports.extend(facts.imports);
    }

    pub fn skip(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedFile {
            path: path.into(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.symbols.is_empty() && self.imports.is_empty()
    }

    /// Content fingerprint used as the graph cache key.
    ///
    /// Extracted files contribute their content hashes; hand-built fact sets
    /// (no content hashes) are fingerprinted from their serialized form.
    pub fn fingerprint(&self) -> u64 {
        if !self.files.is_empty() && self.files.iter().all(|f| f.content_hash != 0) {
            let mut keyed: Vec<String> = self
                .files
                .iter()
                .map(|f| format!("{}:{:016x}", f.path, f.content_hash))
                .collect();
            keyed.sort();
            return fnv1a_hash(keyed.join("\n").as_bytes());
        }
        match serde_json::to_vec(self) {
            Ok(bytes) => fnv1a_hash(&bytes),
            Err(_) => 0,
        }
    }
}

/// Per-language static analyzer.
///
/// The graph engine depends on this capability only; each supported
/// language provides one implementation.
pub trait FactExtractor: Send + Sync {
    /// Language tag used in node ids (`python`, `rust`, ...)
    fn language(&self) -> &'static str;

    /// File extensions this extractor handles
    fn extensions(&self) -> &'static [&'static str];

    /// Extract facts from one file's source text
    fn extract_source(&self, rel_path: &str, source: &str) -> Result<FileFacts>;

    fn can_extract(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// Extract every supported file under `root`
    fn extract(&self, root: &Path) -> FactSet
    where
        Self: Sized,
    {
        crate::extract::extract_project(root, &[self as &dyn FactExtractor], &ExtractionConfig::default())
    }
}

/// Derive the dotted module path for a file.
///
/// `pkg/sub/mod.py` -> `pkg.sub.mod`, `pkg/__init__.py` -> `pkg`,
/// `src/graph/mod.rs` -> `graph`, `src/lib.rs` -> `crate`.
pub fn module_path_for(file_path: &str) -> String {
    let normalized = file_path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches("./");
    let is_rust = trimmed.ends_with(".rs");

    let without_ext = match trimmed.rfind('.') {
        Some(dot) if dot > trimmed.rfind('/').map(|s| s + 1).unwrap_or(0) => &trimmed[..dot],
        _ => trimmed,
    };

    let mut parts: Vec<&str> = without_ext.split('/').filter(|p| !p.is_empty()).collect();
    if is_rust {
        if parts.first() == Some(&"src") {
            parts.remove(0);
        }
        match parts.last() {
            Some(&"lib") | Some(&"main") if parts.len() == 1 => return "crate".to_string(),
            Some(&"mod") => {
                parts.pop();
            }
            _ => {}
        }
    } else if parts.last() == Some(&"__init__") {
        parts.pop();
    }

    if parts.is_empty() {
        return "root".to_string();
    }
    parts.join(".")
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
