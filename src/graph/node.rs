//! Graph nodes and their metadata

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::facts::SymbolKind;

/// Kind of code entity a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Function,
    Method,
    Class,
    Module,
    File,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Module => "module",
            Self::File => "file",
        }
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "function" | "fn" | "func" => Some(Self::Function),
            "method" => Some(Self::Method),
            "class" | "struct" | "trait" | "enum" => Some(Self::Class),
            "module" | "mod" => Some(Self::Module),
            "file" => Some(Self::File),
            _ => None,
        }
    }

    /// Function-like nodes participate in the call graph
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function | Self::Method)
    }

    /// File-like nodes participate in the import graph
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Module | Self::File)
    }
}

impl From<SymbolKind> for NodeKind {
    fn from(kind: SymbolKind) -> Self {
        match kind {
            SymbolKind::Function => Self::Function,
            SymbolKind::Method => Self::Method,
            SymbolKind::Class => Self::Class,
        }
    }
}

/// Architectural layer inferred from a file path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Presentation,
    Domain,
    Data,
    #[default]
    Unknown,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Presentation => "presentation",
            Self::Domain => "domain",
            Self::Data => "data",
            Self::Unknown => "unknown",
        }
    }

    /// Position in the layering order, top (0) to bottom; `None` when unknown
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Presentation => Some(0),
            Self::Domain => Some(1),
            Self::Data => Some(2),
            Self::Unknown => None,
        }
    }
}

/// Analyzer-specific metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Node metadata: known keys are typed fields, anything else goes in `extras`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,

    #[serde(default)]
    pub is_entry_point: bool,

    /// Which heuristic flagged the entry point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,

    /// Method of a trait/interface implementation (invoked through dispatch)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_trait_impl: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, MetaValue>,
}

/// A code entity in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// `{language}::{module_path}::{kind}::{name}`
    pub id: String,
    pub kind: NodeKind,
    pub language: String,
    pub module_path: String,
    pub display_name: String,
    pub file_path: String,
    pub line_number: usize,
    #[serde(default)]
    pub metadata: NodeMetadata,
}

impl GraphNode {
    /// Build the stable id for an entity
    pub fn make_id(language: &str, module_path: &str, kind: NodeKind, name: &str) -> String {
        format!("{}::{}::{}::{}", language, module_path, kind.as_str(), name)
    }

    pub fn new(
        language: &str,
        module_path: &str,
        kind: NodeKind,
        name: &str,
        file_path: &str,
        line_number: usize,
    ) -> Self {
        Self {
            id: Self::make_id(language, module_path, kind, name),
            kind,
            language: language.to_string(),
            module_path: module_path.to_string(),
            display_name: name.to_string(),
            file_path: file_path.to_string(),
            line_number,
            metadata: NodeMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Last segment of the display name (`Class.method` -> `method`)
    pub fn short_name(&self) -> &str {
        self.display_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.display_name)
    }

    /// Owning class for methods (`Class.method` -> `Class`)
    pub fn owner_class(&self) -> Option<&str> {
        if self.kind != NodeKind::Method {
            return None;
        }
        self.display_name.rsplit_once('.').map(|(class, _)| class)
    }
}
